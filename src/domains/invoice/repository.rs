use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::domains::core::hooks::ChangeDispatcher;
use crate::domains::core::repository::{FindById, HardDeletable, SoftDeletable};
use crate::domains::invoice::types::{
    Invoice, InvoiceLineItem, InvoiceStatus, NewInvoice, NewInvoiceLineItem, PaymentMeta,
    UpdateInvoice,
};
use crate::errors::{DomainError, DomainResult};
use crate::store::fields;
use crate::store::{EntityType, FieldMap, Filter, ObjectStore};
use crate::types::{ChangeEvent, ChangeOrigin, EntityId};

/// Trait defining invoice repository operations
#[async_trait]
pub trait InvoiceRepository:
    FindById<Invoice> + SoftDeletable + HardDeletable + Send + Sync
{
    async fn create(&self, new_invoice: &NewInvoice) -> DomainResult<Invoice>;

    async fn update(&self, id: EntityId, update: &UpdateInvoice) -> DomainResult<Invoice>;

    /// Live invoices for an organization, newest first.
    async fn find_by_organization(&self, organization_id: EntityId) -> DomainResult<Vec<Invoice>>;

    /// Live invoices linked to a milestone.
    async fn find_by_milestone(&self, milestone_id: EntityId) -> DomainResult<Vec<Invoice>>;

    /// Live invoices linked directly to a project (not via milestones).
    async fn find_by_project_direct(&self, project_id: EntityId) -> DomainResult<Vec<Invoice>>;

    /// Live invoices still awaiting money: everything outside draft and the
    /// settled statuses.
    async fn find_pending_by_organization(
        &self,
        organization_id: EntityId,
    ) -> DomainResult<Vec<Invoice>>;

    /// Persist the outcome of a payment in one logical write.
    async fn apply_payment(
        &self,
        id: EntityId,
        amount_paid: Decimal,
        status: InvoiceStatus,
        payment_date: Option<NaiveDate>,
        meta: &PaymentMeta,
    ) -> DomainResult<Invoice>;

    /// Every assigned invoice number, trashed invoices included.
    async fn all_invoice_numbers(&self) -> DomainResult<Vec<String>>;

    /// Persist a freshly generated invoice number (reference-sync write).
    async fn set_invoice_number(&self, id: EntityId, number: &str) -> DomainResult<()>;

    // Line items cascade with their parent invoice.

    async fn create_line_item(&self, new_item: &NewInvoiceLineItem)
        -> DomainResult<InvoiceLineItem>;

    async fn line_items_for_invoice(
        &self,
        invoice_id: EntityId,
    ) -> DomainResult<Vec<InvoiceLineItem>>;
}

/// Object-store implementation for InvoiceRepository
pub struct StoreInvoiceRepository {
    store: Arc<dyn ObjectStore>,
    dispatcher: Arc<ChangeDispatcher>,
}

impl StoreInvoiceRepository {
    pub fn new(store: Arc<dyn ObjectStore>, dispatcher: Arc<ChangeDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    async fn load(&self, id: EntityId) -> DomainResult<Invoice> {
        let map = self
            .store
            .get(EntityType::Invoice, id)
            .await?
            .ok_or(DomainError::EntityNotFound("Invoice", id))?;
        if fields::is_deleted(&map) {
            return Err(DomainError::EntityNotFound("Invoice", id));
        }
        Invoice::from_fields(id, &map)
    }

    /// Newest first: store ids ascend with creation order.
    async fn load_newest_first(&self, mut ids: Vec<EntityId>) -> DomainResult<Vec<Invoice>> {
        ids.sort_unstable_by(|a, b| b.cmp(a));
        let mut invoices = Vec::with_capacity(ids.len());
        for id in ids {
            invoices.push(self.load(id).await?);
        }
        Ok(invoices)
    }

    async fn live_line_item_ids(&self, invoice_id: EntityId) -> DomainResult<Vec<EntityId>> {
        Ok(self
            .store
            .find(
                EntityType::InvoiceLineItem,
                &[
                    Filter::eq("invoice_id", invoice_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?)
    }
}

#[async_trait]
impl FindById<Invoice> for StoreInvoiceRepository {
    async fn find_by_id(&self, id: EntityId) -> DomainResult<Invoice> {
        self.load(id).await
    }
}

#[async_trait]
impl SoftDeletable for StoreInvoiceRepository {
    /// Trashes the invoice and its line items in lockstep.
    async fn soft_delete(&self, id: EntityId) -> DomainResult<()> {
        self.load(id).await?;
        let now = fields::datetime_value(Utc::now());

        for item_id in self.live_line_item_ids(id).await? {
            self.store
                .set_field(EntityType::InvoiceLineItem, item_id, "deleted_at", now.clone())
                .await?;
            self.dispatcher
                .dispatch(ChangeEvent::deleted(EntityType::InvoiceLineItem, item_id))
                .await;
        }

        self.store
            .set_field(EntityType::Invoice, id, "deleted_at", now)
            .await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::Invoice, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl HardDeletable for StoreInvoiceRepository {
    fn entity_name(&self) -> &'static str {
        "invoice"
    }

    /// Destroys the invoice and its line items in lockstep.
    async fn hard_delete(&self, id: EntityId) -> DomainResult<()> {
        let item_ids = self
            .store
            .find(EntityType::InvoiceLineItem, &[Filter::eq("invoice_id", id)])
            .await?;
        for item_id in item_ids {
            self.store.delete(EntityType::InvoiceLineItem, item_id).await?;
            self.dispatcher
                .dispatch(ChangeEvent::deleted(EntityType::InvoiceLineItem, item_id))
                .await;
        }

        self.store.delete(EntityType::Invoice, id).await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::Invoice, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for StoreInvoiceRepository {
    async fn create(&self, new_invoice: &NewInvoice) -> DomainResult<Invoice> {
        let now = Utc::now();
        let mut map = FieldMap::new();
        map.insert(
            "organization_id".to_string(),
            Value::from(new_invoice.organization_id),
        );
        if let Some(project_id) = new_invoice.project_id {
            map.insert("project_id".to_string(), Value::from(project_id));
        }
        if let Some(milestone_id) = new_invoice.milestone_id {
            map.insert("milestone_id".to_string(), Value::from(milestone_id));
        }
        map.insert("amount".to_string(), fields::decimal_value(new_invoice.amount));
        map.insert("amount_paid".to_string(), fields::decimal_value(Decimal::ZERO));
        map.insert(
            "status".to_string(),
            Value::String(new_invoice.status.as_str().to_string()),
        );
        if let Some(due_date) = new_invoice.due_date {
            map.insert("due_date".to_string(), fields::date_value(due_date));
        }
        if let Some(issue_date) = new_invoice.issue_date {
            map.insert("issue_date".to_string(), fields::date_value(issue_date));
        }
        map.insert("created_at".to_string(), fields::datetime_value(now));
        map.insert("updated_at".to_string(), fields::datetime_value(now));

        let id = self.store.create(EntityType::Invoice, map).await?;
        self.dispatcher
            .dispatch(ChangeEvent::created(EntityType::Invoice, id))
            .await;
        self.load(id).await
    }

    async fn update(&self, id: EntityId, update: &UpdateInvoice) -> DomainResult<Invoice> {
        self.load(id).await?;

        if let Some(amount) = update.amount {
            self.store
                .set_field(EntityType::Invoice, id, "amount", fields::decimal_value(amount))
                .await?;
        }
        if let Some(status) = update.status {
            self.store
                .set_field(
                    EntityType::Invoice,
                    id,
                    "status",
                    Value::String(status.as_str().to_string()),
                )
                .await?;
        }
        if let Some(due_date) = &update.due_date {
            let value = match due_date {
                Some(due_date) => fields::date_value(*due_date),
                None => Value::Null,
            };
            self.store
                .set_field(EntityType::Invoice, id, "due_date", value)
                .await?;
        }
        self.store
            .set_field(
                EntityType::Invoice,
                id,
                "updated_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;

        self.dispatcher
            .dispatch(ChangeEvent::updated(EntityType::Invoice, id))
            .await;
        self.load(id).await
    }

    async fn find_by_organization(&self, organization_id: EntityId) -> DomainResult<Vec<Invoice>> {
        let ids = self
            .store
            .find(
                EntityType::Invoice,
                &[
                    Filter::eq("organization_id", organization_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;
        self.load_newest_first(ids).await
    }

    async fn find_by_milestone(&self, milestone_id: EntityId) -> DomainResult<Vec<Invoice>> {
        let ids = self
            .store
            .find(
                EntityType::Invoice,
                &[
                    Filter::eq("milestone_id", milestone_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;
        self.load_newest_first(ids).await
    }

    async fn find_by_project_direct(&self, project_id: EntityId) -> DomainResult<Vec<Invoice>> {
        let ids = self
            .store
            .find(
                EntityType::Invoice,
                &[
                    Filter::eq("project_id", project_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;
        self.load_newest_first(ids).await
    }

    async fn find_pending_by_organization(
        &self,
        organization_id: EntityId,
    ) -> DomainResult<Vec<Invoice>> {
        let ids = self
            .store
            .find(
                EntityType::Invoice,
                &[
                    Filter::eq("organization_id", organization_id),
                    Filter::not_in(
                        "status",
                        vec![json!("draft"), json!("paid"), json!("void"), json!("credited")],
                    ),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;
        self.load_newest_first(ids).await
    }

    async fn apply_payment(
        &self,
        id: EntityId,
        amount_paid: Decimal,
        status: InvoiceStatus,
        payment_date: Option<NaiveDate>,
        meta: &PaymentMeta,
    ) -> DomainResult<Invoice> {
        self.store
            .set_field(
                EntityType::Invoice,
                id,
                "amount_paid",
                fields::decimal_value(amount_paid),
            )
            .await?;
        self.store
            .set_field(
                EntityType::Invoice,
                id,
                "status",
                Value::String(status.as_str().to_string()),
            )
            .await?;
        if let Some(payment_date) = payment_date {
            self.store
                .set_field(
                    EntityType::Invoice,
                    id,
                    "payment_date",
                    fields::date_value(payment_date),
                )
                .await?;
        }
        if let Some(method) = &meta.method {
            self.store
                .set_field(
                    EntityType::Invoice,
                    id,
                    "payment_method",
                    Value::String(method.clone()),
                )
                .await?;
        }
        if let Some(transaction_id) = &meta.transaction_id {
            self.store
                .set_field(
                    EntityType::Invoice,
                    id,
                    "payment_transaction_id",
                    Value::String(transaction_id.clone()),
                )
                .await?;
        }
        if let Some(fee) = meta.processing_fee {
            self.store
                .set_field(EntityType::Invoice, id, "payment_fee", fields::decimal_value(fee))
                .await?;
        }
        self.store
            .set_field(
                EntityType::Invoice,
                id,
                "updated_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;

        self.dispatcher
            .dispatch(ChangeEvent::updated(EntityType::Invoice, id))
            .await;
        self.load(id).await
    }

    async fn all_invoice_numbers(&self) -> DomainResult<Vec<String>> {
        let ids = self
            .store
            .find(EntityType::Invoice, &[Filter::ne("invoice_number", Value::Null)])
            .await?;

        let mut numbers = Vec::with_capacity(ids.len());
        for id in ids {
            let map = self
                .store
                .get(EntityType::Invoice, id)
                .await?
                .ok_or(DomainError::EntityNotFound("Invoice", id))?;
            if let Some(number) = fields::opt_string(&map, "invoice_number") {
                numbers.push(number);
            }
        }
        Ok(numbers)
    }

    async fn set_invoice_number(&self, id: EntityId, number: &str) -> DomainResult<()> {
        self.store
            .set_field(
                EntityType::Invoice,
                id,
                "invoice_number",
                Value::String(number.to_string()),
            )
            .await?;
        self.dispatcher
            .dispatch(
                ChangeEvent::updated(EntityType::Invoice, id)
                    .with_origin(ChangeOrigin::ReferenceSync),
            )
            .await;
        Ok(())
    }

    async fn create_line_item(
        &self,
        new_item: &NewInvoiceLineItem,
    ) -> DomainResult<InvoiceLineItem> {
        // The parent must exist and be live; items never outlive invoices.
        self.load(new_item.invoice_id).await?;

        let now = Utc::now();
        let mut map = FieldMap::new();
        map.insert("invoice_id".to_string(), Value::from(new_item.invoice_id));
        map.insert(
            "line_type".to_string(),
            Value::String(new_item.line_type.as_str().to_string()),
        );
        map.insert(
            "description".to_string(),
            Value::String(new_item.description.clone()),
        );
        map.insert("amount".to_string(), fields::decimal_value(new_item.amount));
        if let Some(quantity) = new_item.quantity {
            map.insert("quantity".to_string(), fields::decimal_value(quantity));
        }
        map.insert("created_at".to_string(), fields::datetime_value(now));
        map.insert("updated_at".to_string(), fields::datetime_value(now));

        let id = self.store.create(EntityType::InvoiceLineItem, map).await?;
        self.dispatcher
            .dispatch(ChangeEvent::created(EntityType::InvoiceLineItem, id))
            .await;

        let map = self
            .store
            .get(EntityType::InvoiceLineItem, id)
            .await?
            .ok_or(DomainError::EntityNotFound("Invoice line item", id))?;
        InvoiceLineItem::from_fields(id, &map)
    }

    async fn line_items_for_invoice(
        &self,
        invoice_id: EntityId,
    ) -> DomainResult<Vec<InvoiceLineItem>> {
        let ids = self.live_line_item_ids(invoice_id).await?;
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let map = self
                .store
                .get(EntityType::InvoiceLineItem, id)
                .await?
                .ok_or(DomainError::EntityNotFound("Invoice line item", id))?;
            items.push(InvoiceLineItem::from_fields(id, &map)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::invoice::types::LineType;
    use crate::store::MemoryObjectStore;
    use rust_decimal_macros::dec;

    fn repo() -> StoreInvoiceRepository {
        StoreInvoiceRepository::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(ChangeDispatcher::new()),
        )
    }

    fn pending_invoice(organization_id: EntityId) -> NewInvoice {
        NewInvoice {
            organization_id,
            project_id: None,
            milestone_id: None,
            amount: dec!(1000),
            status: InvoiceStatus::Pending,
            due_date: None,
            issue_date: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_organization_newest_first() {
        let repo = repo();
        let older = repo.create(&pending_invoice(1)).await.unwrap();
        let newer = repo.create(&pending_invoice(1)).await.unwrap();

        let invoices = repo.find_by_organization(1).await.unwrap();
        let ids: Vec<_> = invoices.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn test_pending_excludes_settled_and_draft() {
        let repo = repo();
        let open = repo.create(&pending_invoice(1)).await.unwrap();
        repo.create(&NewInvoice {
            status: InvoiceStatus::Draft,
            ..pending_invoice(1)
        })
        .await
        .unwrap();
        let paid = repo.create(&pending_invoice(1)).await.unwrap();
        repo.apply_payment(paid.id, dec!(1000), InvoiceStatus::Paid, None, &PaymentMeta::default())
            .await
            .unwrap();

        let pending = repo.find_pending_by_organization(1).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![open.id]);
    }

    #[tokio::test]
    async fn test_line_items_cascade_on_soft_delete() {
        let repo = repo();
        let invoice = repo.create(&pending_invoice(1)).await.unwrap();
        repo.create_line_item(&NewInvoiceLineItem {
            invoice_id: invoice.id,
            line_type: LineType::Support,
            description: "November support".to_string(),
            amount: dec!(300),
            quantity: Some(dec!(2.5)),
        })
        .await
        .unwrap();

        repo.soft_delete(invoice.id).await.unwrap();
        assert!(repo.find_by_id(invoice.id).await.is_err());
        assert!(repo.line_items_for_invoice(invoice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_payment_persists_ledger_fields() {
        let repo = repo();
        let invoice = repo.create(&pending_invoice(1)).await.unwrap();
        let meta = PaymentMeta {
            method: Some("wire".to_string()),
            transaction_id: Some("TXN-88".to_string()),
            processing_fee: Some(dec!(4.20)),
        };
        let paid_on = NaiveDate::from_ymd_opt(2025, 11, 12).unwrap();

        let updated = repo
            .apply_payment(invoice.id, dec!(1000), InvoiceStatus::Paid, Some(paid_on), &meta)
            .await
            .unwrap();

        assert_eq!(updated.amount_paid, dec!(1000));
        assert_eq!(updated.status, InvoiceStatus::Paid);
        assert_eq!(updated.payment_date, Some(paid_on));
        assert_eq!(updated.payment_method.as_deref(), Some("wire"));
        assert_eq!(updated.payment_fee, Some(dec!(4.20)));
    }
}
