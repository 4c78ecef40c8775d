use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::DomainError;

/// The two stock-adjustment operations the inventory service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEndpoint {
    /// Return quantities to inventory (cancelled, deleted, replaced lines).
    AddStock,
    /// Deduct quantities from inventory (created or re-opened lines).
    ConsumeStock,
}

impl StockEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockEndpoint::AddStock => "ADD_STOCK",
            StockEndpoint::ConsumeStock => "CONSUME_STOCK",
        }
    }

    /// Path of the inventory service operation, relative to its base URL.
    pub fn uri_path(&self) -> &'static str {
        match self {
            StockEndpoint::AddStock => "stock/add",
            StockEndpoint::ConsumeStock => "stock/consume",
        }
    }
}

impl fmt::Display for StockEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockEndpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD_STOCK" => Ok(StockEndpoint::AddStock),
            "CONSUME_STOCK" => Ok(StockEndpoint::ConsumeStock),
            other => Err(DomainError::Internal(format!(
                "Unknown stock endpoint '{other}'"
            ))),
        }
    }
}

/// One `{productId, stock}` entry of an outbox payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLine {
    pub product_id: i64,
    pub stock: i32,
}

/// A stock adjustment decided by a lifecycle operation but not yet persisted.
///
/// Serializing the instruction is the single emission point for outbox
/// records; a failure here must abort the surrounding transaction.
#[derive(Debug, Clone)]
pub struct StockInstruction {
    pub endpoint: StockEndpoint,
    pub lines: Vec<StockLine>,
}

impl StockInstruction {
    pub fn new(endpoint: StockEndpoint, lines: Vec<StockLine>) -> Self {
        Self { endpoint, lines }
    }

    pub fn payload(&self) -> Result<Value, DomainError> {
        serde_json::to_value(&self.lines).map_err(|e| DomainError::Serialization(e.to_string()))
    }
}

/// A persisted, not-yet-sent outbox record as seen by the dispatcher.
///
/// The payload is delivered verbatim; it was serialized when the record was
/// emitted and is never re-derived from order state.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub id: Uuid,
    pub endpoint: StockEndpoint,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}
