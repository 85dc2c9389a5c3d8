use async_trait::async_trait;

use super::errors::{GuardError, GuardResult};
use super::events::TransitionRequest;
use super::states::OrderState;
use crate::storage::FulfillmentStore;

/// Trait for implementing state transition guards
#[async_trait]
pub trait StateGuard<S: FulfillmentStore>: Send + Sync {
    /// Check if a transition is allowed
    async fn check(
        &self,
        request: &TransitionRequest,
        current_state: Option<OrderState>,
        store: &S,
    ) -> GuardResult<bool>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard that protects terminal states against carrier-driven regression.
///
/// Late or out-of-order webhooks regularly arrive after delivery; silently
/// applying them would corrupt settled orders, so the transition is rejected
/// and surfaced as an anomaly instead.
pub struct TerminalStateGuard;

#[async_trait]
impl<S: FulfillmentStore> StateGuard<S> for TerminalStateGuard {
    async fn check(
        &self,
        request: &TransitionRequest,
        current_state: Option<OrderState>,
        _store: &S,
    ) -> GuardResult<bool> {
        if let Some(current) = current_state {
            if current.is_terminal() && current != request.target_state {
                return Err(GuardError::terminal_regression(
                    request.order_id,
                    current,
                    request.target_state,
                ));
            }
        }

        Ok(true)
    }

    fn description(&self) -> &'static str {
        "Terminal orders must not be overwritten by later events"
    }
}

/// Guard for the explicit return-reopen path: only delivered orders may be
/// reopened, and only into the return flow
pub struct ReopenEligibilityGuard;

#[async_trait]
impl<S: FulfillmentStore> StateGuard<S> for ReopenEligibilityGuard {
    async fn check(
        &self,
        request: &TransitionRequest,
        current_state: Option<OrderState>,
        _store: &S,
    ) -> GuardResult<bool> {
        match current_state {
            Some(OrderState::Delivered) => {}
            Some(state) => {
                return Err(GuardError::business_rule_violation(format!(
                    "Order {} cannot be reopened from state {state}; must be delivered",
                    request.order_id
                )));
            }
            None => {
                return Err(GuardError::business_rule_violation(format!(
                    "Order {} has no state history to reopen",
                    request.order_id
                )));
            }
        }

        if request.target_state != OrderState::ReturnRequested {
            return Err(GuardError::business_rule_violation(format!(
                "Reopen must target return_requested, got {}",
                request.target_state
            )));
        }

        Ok(true)
    }

    fn description(&self) -> &'static str {
        "Only delivered orders may reopen into the return flow"
    }
}
