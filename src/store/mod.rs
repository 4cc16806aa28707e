use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::errors::DbResult;
use crate::types::EntityId;

pub mod fields;
pub mod memory;
pub mod sqlite;
pub mod timeout;

pub use memory::MemoryObjectStore;
pub use sqlite::SqliteObjectStore;
pub use timeout::TimeoutStore;

/// Type tag carried by every document in the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Organization,
    Project,
    Milestone,
    Invoice,
    InvoiceLineItem,
    TimeEntry,
    ServiceRequest,
    MonthlyReport,
}

impl EntityType {
    /// Every tracked type, in dependency order (parents before children).
    pub const ALL: [EntityType; 8] = [
        EntityType::Organization,
        EntityType::Project,
        EntityType::Milestone,
        EntityType::Invoice,
        EntityType::InvoiceLineItem,
        EntityType::TimeEntry,
        EntityType::ServiceRequest,
        EntityType::MonthlyReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Organization => "organization",
            EntityType::Project => "project",
            EntityType::Milestone => "milestone",
            EntityType::Invoice => "invoice",
            EntityType::InvoiceLineItem => "invoice_line_item",
            EntityType::TimeEntry => "time_entry",
            EntityType::ServiceRequest => "service_request",
            EntityType::MonthlyReport => "monthly_report",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "organization" => Some(EntityType::Organization),
            "project" => Some(EntityType::Project),
            "milestone" => Some(EntityType::Milestone),
            "invoice" => Some(EntityType::Invoice),
            "invoice_line_item" => Some(EntityType::InvoiceLineItem),
            "time_entry" => Some(EntityType::TimeEntry),
            "service_request" => Some(EntityType::ServiceRequest),
            "monthly_report" => Some(EntityType::MonthlyReport),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored document: a free-form field map.
pub type FieldMap = serde_json::Map<String, Value>;

/// Comparison operators supported by [`ObjectStore::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    In,
    NotIn,
    Between,
    Lt,
    Gt,
}

/// A single field predicate. `find` combines all filters with AND.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Ne,
            value: value.into(),
        }
    }

    pub fn is_in(field: &str, values: Vec<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::In,
            value: Value::Array(values),
        }
    }

    pub fn not_in(field: &str, values: Vec<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::NotIn,
            value: Value::Array(values),
        }
    }

    /// Inclusive range over `[low, high]`.
    pub fn between(field: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Between,
            value: Value::Array(vec![low.into(), high.into()]),
        }
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Lt,
            value: value.into(),
        }
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Gt,
            value: value.into(),
        }
    }
}

/// Narrow contract over the external document store.
///
/// Everything persisted by this crate goes through these five calls; the
/// store itself (replication, durability, indexing) is someone else's
/// problem.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a document, `None` when no live document has this id.
    async fn get(&self, entity_type: EntityType, id: EntityId) -> DbResult<Option<FieldMap>>;

    /// Ids of all documents of `entity_type` matching every filter,
    /// ascending by id.
    async fn find(&self, entity_type: EntityType, filters: &[Filter]) -> DbResult<Vec<EntityId>>;

    /// Persist a new document and return its assigned id.
    async fn create(&self, entity_type: EntityType, fields: FieldMap) -> DbResult<EntityId>;

    /// Overwrite a single field on an existing document.
    async fn set_field(
        &self,
        entity_type: EntityType,
        id: EntityId,
        field: &str,
        value: Value,
    ) -> DbResult<()>;

    /// Remove a document permanently.
    async fn delete(&self, entity_type: EntityType, id: EntityId) -> DbResult<()>;
}

/// Compare two scalar field values for filtering purposes.
///
/// Numbers compare numerically; strings that both parse as decimals compare
/// numerically too (amounts are persisted as decimal strings), everything
/// else falls back to lexical order, which is correct for ISO dates.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    use rust_decimal::Decimal;

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().and_then(|x| y.as_f64().and_then(|y| x.partial_cmp(&y)))
        }
        (Value::String(x), Value::String(y)) => {
            match (x.parse::<Decimal>(), y.parse::<Decimal>()) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Evaluate a filter against a document field value; missing fields read as
/// null. The SQLite store mirrors these semantics in SQL.
pub(crate) fn matches_filter(doc_value: &Value, filter: &Filter) -> bool {
    match filter.op {
        FilterOp::Eq => doc_value == &filter.value,
        FilterOp::Ne => doc_value != &filter.value,
        FilterOp::In => match &filter.value {
            Value::Array(candidates) => candidates.contains(doc_value),
            _ => false,
        },
        FilterOp::NotIn => match &filter.value {
            Value::Array(candidates) => !candidates.contains(doc_value),
            _ => false,
        },
        FilterOp::Between => match &filter.value {
            Value::Array(bounds) if bounds.len() == 2 => {
                let low = compare_values(doc_value, &bounds[0]);
                let high = compare_values(doc_value, &bounds[1]);
                matches!(low, Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal))
                    && matches!(high, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal))
            }
            _ => false,
        },
        FilterOp::Lt => {
            matches!(compare_values(doc_value, &filter.value), Some(std::cmp::Ordering::Less))
        }
        FilterOp::Gt => {
            matches!(compare_values(doc_value, &filter.value), Some(std::cmp::Ordering::Greater))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_type_round_trip() {
        for entity_type in EntityType::ALL {
            assert_eq!(EntityType::from_str(entity_type.as_str()), Some(entity_type));
        }
        assert_eq!(EntityType::from_str("page"), None);
    }

    #[test]
    fn test_eq_filter() {
        let filter = Filter::eq("status", "pending");
        assert!(matches_filter(&json!("pending"), &filter));
        assert!(!matches_filter(&json!("paid"), &filter));
        assert!(!matches_filter(&Value::Null, &filter));
    }

    #[test]
    fn test_in_and_not_in_filters() {
        let filter = Filter::is_in("status", vec![json!("draft"), json!("pending")]);
        assert!(matches_filter(&json!("draft"), &filter));
        assert!(!matches_filter(&json!("paid"), &filter));

        let filter = Filter::not_in("status", vec![json!("void"), json!("credited")]);
        assert!(matches_filter(&json!("pending"), &filter));
        assert!(!matches_filter(&json!("void"), &filter));
    }

    #[test]
    fn test_between_on_iso_dates() {
        let filter = Filter::between("entry_date", "2025-11-01", "2025-11-30");
        assert!(matches_filter(&json!("2025-11-01"), &filter));
        assert!(matches_filter(&json!("2025-11-15"), &filter));
        assert!(matches_filter(&json!("2025-11-30"), &filter));
        assert!(!matches_filter(&json!("2025-12-01"), &filter));
        assert!(!matches_filter(&json!("2025-10-31"), &filter));
    }

    #[test]
    fn test_decimal_strings_compare_numerically() {
        let filter = Filter::gt("amount", "99.5");
        assert!(matches_filter(&json!("100.00"), &filter));
        assert!(!matches_filter(&json!("99.00"), &filter));
    }
}
