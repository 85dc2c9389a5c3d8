// State machine module for order fulfillment tracking
//
// Orders move through an append-only transition log guarded against
// terminal-state regression; station bookkeeping and lifecycle events ride
// along with every persisted transition.

pub mod actions;
pub mod errors;
pub mod events;
pub mod guards;
pub mod order_state_machine;
pub mod persistence;
pub mod states;

// Re-export main types for convenient access
pub use errors::{ActionError, GuardError, PersistenceError, StateMachineError};
pub use events::TransitionRequest;
pub use order_state_machine::{OrderStateMachine, TransitionOutcome};
pub use states::{OrderState, Station};

// Common traits and utilities
pub use actions::StateAction;
pub use guards::StateGuard;
