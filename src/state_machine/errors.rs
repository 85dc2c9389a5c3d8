use thiserror::Error;

use super::states::OrderState;
use crate::storage::StoreError;

/// Errors raised while evaluating transition guards
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Order {order_id} is terminal in {current}; rejected transition to {attempted}")]
    TerminalStateRegression {
        order_id: i64,
        current: OrderState,
        attempted: OrderState,
    },

    #[error("Business rule violation: {message}")]
    BusinessRuleViolation { message: String },

    #[error("Invalid state encountered: {state}")]
    InvalidState { state: String },

    #[error("Storage failure during guard evaluation: {message}")]
    StorageFailure { message: String },
}

impl GuardError {
    pub fn business_rule_violation(message: impl Into<String>) -> Self {
        Self::BusinessRuleViolation {
            message: message.into(),
        }
    }

    pub fn terminal_regression(order_id: i64, current: OrderState, attempted: OrderState) -> Self {
        Self::TerminalStateRegression {
            order_id,
            current,
            attempted,
        }
    }
}

impl From<StoreError> for GuardError {
    fn from(error: StoreError) -> Self {
        Self::StorageFailure {
            message: error.to_string(),
        }
    }
}

/// Errors raised while persisting transitions
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage failure during transition persistence: {message}")]
    StorageFailure { message: String },

    #[error("Serialization failure: {message}")]
    SerializationFailure { message: String },
}

impl PersistenceError {
    pub fn storage_failure(message: impl Into<String>) -> Self {
        Self::StorageFailure {
            message: message.into(),
        }
    }
}

impl From<StoreError> for PersistenceError {
    fn from(error: StoreError) -> Self {
        Self::StorageFailure {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationFailure {
            message: error.to_string(),
        }
    }
}

/// Errors raised by post-transition actions
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Failed to publish event: {event_name}")]
    EventPublishFailed { event_name: String },

    #[error("Failed to record audit entry: {message}")]
    AuditFailed { message: String },
}

/// Top-level state machine error
#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("Guard check failed: {0}")]
    Guard(#[from] GuardError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Action failed: {0}")]
    Action(#[from] ActionError),

    #[error("Invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },
}

impl StateMachineError {
    pub fn invalid_transition(
        from: Option<OrderState>,
        to: OrderState,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            from: from.map_or_else(|| "none".to_string(), |s| s.to_string()),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure preserves prior state and warrants operator review
    /// rather than a retry
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            Self::Guard(GuardError::TerminalStateRegression { .. })
        )
    }
}

pub type GuardResult<T> = Result<T, GuardError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;
pub type ActionResult<T> = Result<T, ActionError>;
pub type StateMachineResult<T> = Result<T, StateMachineError>;
