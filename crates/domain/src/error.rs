//! Domain error types.

use common::ParseStatusError;
use order_store::StoreError;
use thiserror::Error;

/// Errors surfaced by fulfillment operations.
///
/// Store failures are folded into these four kinds at the service boundary
/// so no backend-specific text reaches callers.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// A referenced entity does not exist or is not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request was malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The request is well-formed but cannot be applied to the current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Something failed on our side. Details are logged, not returned.
    #[error("Internal error")]
    Internal,
}

impl FulfillmentError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        FulfillmentError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        FulfillmentError::InvalidInput(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        FulfillmentError::Conflict(message.into())
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => FulfillmentError::NotFound { entity, id },
            StoreError::InsufficientInventory {
                slot_id,
                requested,
                available,
            } => FulfillmentError::Conflict(format!(
                "insufficient inventory in slot {slot_id}: requested {requested}, available {available}"
            )),
            other => {
                tracing::error!(error = %other, "store operation failed");
                FulfillmentError::Internal
            }
        }
    }
}

impl From<ParseStatusError> for FulfillmentError {
    fn from(err: ParseStatusError) -> Self {
        FulfillmentError::InvalidInput(err.to_string())
    }
}

/// Result type for fulfillment operations.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
