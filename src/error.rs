use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FulfillmentError {
    StorageError(String),
    StateTransitionError(String),
    ValidationError(String),
}

impl fmt::Display for FulfillmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FulfillmentError::StorageError(msg) => write!(f, "Storage error: {msg}"),
            FulfillmentError::StateTransitionError(msg) => {
                write!(f, "State transition error: {msg}")
            }
            FulfillmentError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for FulfillmentError {}

pub type Result<T> = std::result::Result<T, FulfillmentError>;
