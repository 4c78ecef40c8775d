use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{OrderLineInput, OrderStatus, OrderView};
use super::stock::{StockAdjustment, StockEndpoint};

/// Persistence port for orders and their lines.
///
/// Every mutating operation runs as one local transaction: the order
/// mutation, the bulk line replace, and any outbox append are all-or-nothing.
pub trait OrderRepository: Send + Sync + 'static {
    fn list(&self) -> Result<Vec<OrderView>, DomainError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError>;

    /// Create an order with status `ToDo` and emit a `ConsumeStock` record
    /// for the new lines.
    fn create(
        &self,
        delivery_date: NaiveDate,
        lines: Vec<OrderLineInput>,
    ) -> Result<OrderView, DomainError>;

    /// Replace an order's delivery date and lines, emitting `AddStock` for
    /// the old lines and `ConsumeStock` for the new ones. The status guard is
    /// deliberately bypassed: an order can be edited in any status.
    fn update(
        &self,
        id: Uuid,
        delivery_date: NaiveDate,
        lines: Vec<OrderLineInput>,
    ) -> Result<OrderView, DomainError>;

    /// Remove an order and its lines, emitting `AddStock` for the removed
    /// lines. Allowed in any status, like `update`.
    fn delete(&self, id: Uuid) -> Result<(), DomainError>;

    /// Move an order to `target`, validating the move against the central
    /// transition table and emitting whatever stock record it prescribes.
    fn transition(&self, id: Uuid, target: OrderStatus) -> Result<OrderView, DomainError>;
}

/// Persistence port for outbox records.
///
/// Lifecycle operations append records through `OrderRepository`; the
/// dispatcher is the only reader of unsent records and the only writer of the
/// `sent` flag.
pub trait OutboxStore: Send + Sync + 'static {
    fn find_unsent(&self) -> Result<Vec<StockAdjustment>, DomainError>;

    /// Flip `sent` to true. Must be idempotent: marking an already-sent
    /// record again is not an error.
    fn mark_sent(&self, id: Uuid) -> Result<(), DomainError>;
}

/// Failure to deliver a record to the inventory service.
///
/// Recovered locally by leaving the record unsent; never surfaced to request
/// callers.
#[derive(Debug, Error)]
#[error("Stock delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Outbound port to the inventory service.
pub trait InventoryGateway: Send + Sync + 'static {
    /// Deliver one stock adjustment. The inventory service treats each
    /// record's effect as idempotent, so redelivering after a crash between
    /// the call and the `sent` flip is tolerated.
    fn adjust_stock(&self, endpoint: StockEndpoint, payload: &Value) -> Result<(), DeliveryError>;
}
