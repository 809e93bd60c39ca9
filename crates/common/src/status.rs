//! Persisted enumerations. Each one round-trips through its `as_str` form,
//! which is what the store writes to text columns.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored or requested status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

/// How a buyer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMode {
    /// Cash on delivery, gated by purchase history.
    #[serde(rename = "COD")]
    CashOnDelivery,

    /// Paid up front through the payment gateway.
    #[serde(rename = "PREPAID")]
    Prepaid,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::CashOnDelivery => "COD",
            PaymentMode::Prepaid => "PREPAID",
        }
    }

    pub fn is_cash_on_delivery(&self) -> bool {
        matches!(self, PaymentMode::CashOnDelivery)
    }
}

impl std::str::FromStr for PaymentMode {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(PaymentMode::CashOnDelivery),
            "PREPAID" => Ok(PaymentMode::Prepaid),
            other => Err(ParseStatusError {
                kind: "payment mode",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement state of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    /// The status a fresh payment starts in for the given mode.
    pub fn initial_for(mode: PaymentMode) -> Self {
        match mode {
            PaymentMode::CashOnDelivery => PaymentStatus::Pending,
            PaymentMode::Prepaid => PaymentStatus::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Completed" => Ok(PaymentStatus::Completed),
            other => Err(ParseStatusError {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fulfillment state of one order item.
///
/// ```text
/// Active ──► Completed   (tracking reached Arrived)
///    │
///    └─────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderItemStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl OrderItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderItemStatus::Active => "Active",
            OrderItemStatus::Completed => "Completed",
            OrderItemStatus::Cancelled => "Cancelled",
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderItemStatus::Completed | OrderItemStatus::Cancelled)
    }
}

impl std::str::FromStr for OrderItemStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(OrderItemStatus::Active),
            "Completed" => Ok(OrderItemStatus::Completed),
            "Cancelled" => Ok(OrderItemStatus::Cancelled),
            other => Err(ParseStatusError {
                kind: "order item status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OrderItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
