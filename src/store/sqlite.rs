use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, QueryBuilder, Row, Sqlite};

use crate::errors::{DbError, DbResult};
use crate::store::{EntityType, FieldMap, Filter, FilterOp, ObjectStore};
use crate::types::EntityId;

/// SQLite-backed object store.
///
/// One `objects` table holds every document as a JSON field map; filters are
/// pushed down with `json_extract`. The schema is a single idempotent DDL
/// statement run at connect time.
#[derive(Debug, Clone)]
pub struct SqliteObjectStore {
    pool: Pool<Sqlite>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS objects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    fields TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_objects_entity_type ON objects(entity_type);
";

impl SqliteObjectStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open (or create) a database at `url` and ensure the schema exists.
    pub async fn connect(url: &str) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn parse_fields(raw: &str) -> DbResult<FieldMap> {
        serde_json::from_str(raw).map_err(|e| DbError::Serialization(e.to_string()))
    }
}

fn push_scalar(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) -> DbResult<()> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                builder.push_bind(i);
            } else if let Some(f) = n.as_f64() {
                builder.push_bind(f);
            } else {
                return Err(DbError::Serialization(format!("unbindable number: {}", n)));
            }
        }
        Value::String(s) => {
            builder.push_bind(s.clone());
        }
        Value::Bool(b) => {
            builder.push_bind(*b);
        }
        other => {
            return Err(DbError::Serialization(format!(
                "unsupported filter value: {}",
                other
            )));
        }
    }
    Ok(())
}

/// Append `AND json_extract(fields, '$.field') <op> ...` for one filter.
///
/// Null handling mirrors the reference matcher: a missing field reads as
/// null, `Ne`/`NotIn` match documents where the field is absent.
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) -> DbResult<()> {
    let path = format!("$.{}", filter.field);
    let extract = |builder: &mut QueryBuilder<'_, Sqlite>| {
        builder.push(" json_extract(fields, ");
        builder.push_bind(path.clone());
        builder.push(")");
    };

    builder.push(" AND");
    match filter.op {
        FilterOp::Eq => {
            extract(builder);
            if filter.value.is_null() {
                builder.push(" IS NULL");
            } else {
                builder.push(" = ");
                push_scalar(builder, &filter.value)?;
            }
        }
        FilterOp::Ne => {
            if filter.value.is_null() {
                extract(builder);
                builder.push(" IS NOT NULL");
            } else {
                builder.push(" (");
                extract(builder);
                builder.push(" IS NULL OR");
                extract(builder);
                builder.push(" != ");
                push_scalar(builder, &filter.value)?;
                builder.push(")");
            }
        }
        FilterOp::In | FilterOp::NotIn => {
            let candidates = match &filter.value {
                Value::Array(values) if !values.is_empty() => values,
                _ => {
                    // Empty IN matches nothing; empty NOT IN matches everything.
                    builder.push(if filter.op == FilterOp::In { " 0" } else { " 1" });
                    return Ok(());
                }
            };
            if filter.op == FilterOp::NotIn {
                builder.push(" (");
                extract(builder);
                builder.push(" IS NULL OR");
            }
            extract(builder);
            builder.push(if filter.op == FilterOp::In { " IN (" } else { " NOT IN (" });
            for (i, candidate) in candidates.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_scalar(builder, candidate)?;
            }
            builder.push(")");
            if filter.op == FilterOp::NotIn {
                builder.push(")");
            }
        }
        FilterOp::Between => {
            let bounds = match &filter.value {
                Value::Array(bounds) if bounds.len() == 2 => bounds,
                _ => return Err(DbError::Serialization("BETWEEN expects [low, high]".into())),
            };
            extract(builder);
            builder.push(" BETWEEN ");
            push_scalar(builder, &bounds[0])?;
            builder.push(" AND ");
            push_scalar(builder, &bounds[1])?;
        }
        FilterOp::Lt => {
            extract(builder);
            builder.push(" < ");
            push_scalar(builder, &filter.value)?;
        }
        FilterOp::Gt => {
            extract(builder);
            builder.push(" > ");
            push_scalar(builder, &filter.value)?;
        }
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    async fn get(&self, entity_type: EntityType, id: EntityId) -> DbResult<Option<FieldMap>> {
        let row = sqlx::query("SELECT fields FROM objects WHERE entity_type = ? AND id = ?")
            .bind(entity_type.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get(0);
                Ok(Some(Self::parse_fields(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn find(&self, entity_type: EntityType, filters: &[Filter]) -> DbResult<Vec<EntityId>> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id FROM objects WHERE entity_type = ");
        builder.push_bind(entity_type.as_str());
        for filter in filters {
            push_filter(&mut builder, filter)?;
        }
        builder.push(" ORDER BY id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| row.get::<i64, _>(0)).collect())
    }

    async fn create(&self, entity_type: EntityType, fields: FieldMap) -> DbResult<EntityId> {
        let raw = serde_json::to_string(&fields)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let result = sqlx::query("INSERT INTO objects (entity_type, fields) VALUES (?, ?)")
            .bind(entity_type.as_str())
            .bind(raw)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn set_field(
        &self,
        entity_type: EntityType,
        id: EntityId,
        field: &str,
        value: Value,
    ) -> DbResult<()> {
        let raw = serde_json::to_string(&value)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE objects SET fields = json_set(fields, ?, json(?)) \
             WHERE entity_type = ? AND id = ?",
        )
        .bind(format!("$.{}", field))
        .bind(raw)
        .bind(entity_type.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(entity_type.as_str(), id));
        }
        Ok(())
    }

    async fn delete(&self, entity_type: EntityType, id: EntityId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM objects WHERE entity_type = ? AND id = ?")
            .bind(entity_type.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(entity_type.as_str(), id));
        }
        Ok(())
    }
}
