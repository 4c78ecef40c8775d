use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::errors::DomainError;
use super::stock::StockEndpoint;

/// Lifecycle status of an order.
///
/// The guarded path `ToDo → InProgress → Prepared → Delivered` is strictly
/// linear and forward-only. `Cancelled` is reachable from any status and is
/// the only status from which an order can re-enter `ToDo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    ToDo,
    InProgress,
    Prepared,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::ToDo => "TO_DO",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Prepared => "PREPARED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Central transition table.
    ///
    /// Validates that `target` is reachable from `self` and returns the stock
    /// adjustment the transition must emit for the order's current lines, if
    /// any. Every status-changing operation goes through here; the guards are
    /// not re-implemented per operation.
    pub fn transition_to(self, target: OrderStatus) -> Result<Option<StockEndpoint>, DomainError> {
        let allowed = match target {
            // Re-opening an order is only possible once it has been cancelled.
            OrderStatus::ToDo => self == OrderStatus::Cancelled,
            OrderStatus::InProgress => self == OrderStatus::ToDo,
            OrderStatus::Prepared => self == OrderStatus::InProgress,
            OrderStatus::Delivered => self == OrderStatus::Prepared,
            // Cancelling is allowed from any status, including Delivered.
            OrderStatus::Cancelled => true,
        };

        if !allowed {
            return Err(DomainError::IllegalTransition {
                from: self,
                to: target,
            });
        }

        Ok(match target {
            // Re-opened orders reserve their quantities again.
            OrderStatus::ToDo => Some(StockEndpoint::ConsumeStock),
            // Cancelled orders give their quantities back.
            OrderStatus::Cancelled => Some(StockEndpoint::AddStock),
            _ => None,
        })
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TO_DO" => Ok(OrderStatus::ToDo),
            "IN_PROGRESS" => Ok(OrderStatus::InProgress),
            "PREPARED" => Ok(OrderStatus::Prepared),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::Internal(format!(
                "Unknown order status '{other}'"
            ))),
        }
    }
}

/// One product line submitted by a caller on create/update.
#[derive(Debug, Clone)]
pub struct OrderLineInput {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub id: Uuid,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub delivery_date: NaiveDate,
    pub status: OrderStatus,
    pub price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineView>,
}

/// Price of a single line: `quantity * unit_price`.
pub fn line_total(quantity: i32, unit_price: &BigDecimal) -> BigDecimal {
    unit_price * BigDecimal::from(quantity)
}

/// Total price of an order over the submitted lines.
pub fn order_total(lines: &[OrderLineInput]) -> BigDecimal {
    lines.iter().fold(BigDecimal::from(0), |acc, line| {
        acc + line_total(line.quantity, &line.unit_price)
    })
}
