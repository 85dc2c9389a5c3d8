use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::errors::{ActionError, ActionResult};
use super::events::TransitionRequest;
use crate::audit;
use crate::constants::{events, transition_event_name};
use crate::events::publisher::EventPublisher;
use crate::models::{NewAuditLogEntry, OrderTransition};
use crate::storage::FulfillmentStore;

/// Trait for implementing post-transition actions
#[async_trait]
pub trait StateAction<S: FulfillmentStore>: Send + Sync {
    /// Execute the action after the transition has been persisted
    async fn execute(
        &self,
        request: &TransitionRequest,
        transition: &OrderTransition,
        station_changed: bool,
        store: &S,
    ) -> ActionResult<()>;

    /// Get a description of this action for logging
    fn description(&self) -> &'static str;
}

/// Action to publish lifecycle events when state transitions occur
pub struct PublishTransitionEventAction {
    event_publisher: EventPublisher,
}

impl PublishTransitionEventAction {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self { event_publisher }
    }
}

#[async_trait]
impl<S: FulfillmentStore> StateAction<S> for PublishTransitionEventAction {
    async fn execute(
        &self,
        _request: &TransitionRequest,
        transition: &OrderTransition,
        station_changed: bool,
        _store: &S,
    ) -> ActionResult<()> {
        let event_name = transition_event_name(transition.from_state, transition.to_state);
        let context = build_transition_context(transition);

        self.event_publisher
            .publish(event_name, context)
            .await
            .map_err(|_| ActionError::EventPublishFailed {
                event_name: event_name.to_string(),
            })?;

        if station_changed {
            if let Some(from_state) = transition.from_state {
                let exited = serde_json::json!({
                    "tenant_id": transition.tenant_id,
                    "order_id": transition.order_id,
                    "station": from_state.station(),
                    "exited_at": transition.occurred_at,
                });
                self.event_publisher
                    .publish(events::STATION_EXITED, exited)
                    .await
                    .map_err(|_| ActionError::EventPublishFailed {
                        event_name: events::STATION_EXITED.to_string(),
                    })?;
            }

            let entered = serde_json::json!({
                "tenant_id": transition.tenant_id,
                "order_id": transition.order_id,
                "station": transition.station,
                "entered_at": transition.occurred_at,
            });
            self.event_publisher
                .publish(events::STATION_ENTERED, entered)
                .await
                .map_err(|_| ActionError::EventPublishFailed {
                    event_name: events::STATION_ENTERED.to_string(),
                })?;
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Publish lifecycle events for order transition"
    }
}

/// Action to record the transition in the audit log.
///
/// Audit writes are best-effort: a failed append is logged and swallowed so
/// an already-persisted transition is never reported as failed.
pub struct AuditTransitionAction;

#[async_trait]
impl<S: FulfillmentStore> StateAction<S> for AuditTransitionAction {
    async fn execute(
        &self,
        request: &TransitionRequest,
        transition: &OrderTransition,
        station_changed: bool,
        store: &S,
    ) -> ActionResult<()> {
        let action = if transition.from_state == Some(crate::state_machine::OrderState::Delivered)
            && transition.to_state == crate::state_machine::OrderState::ReturnRequested
        {
            audit::actions::REOPENED
        } else {
            audit::actions::TRANSITIONED
        };

        let entry = NewAuditLogEntry::new(
            transition.tenant_id,
            audit::event_types::ORDER_TRANSITION,
            audit::entity_types::ORDER,
            transition.order_id.to_string(),
            action,
            serde_json::json!({
                "from_state": transition.from_state,
                "to_state": transition.to_state,
                "station": transition.station,
                "station_changed": station_changed,
                "triggered_by": request.triggered_by,
                "source_event_id": transition.source_event_id,
            }),
        );

        if let Err(error) = store.append_audit_log(entry).await {
            tracing::warn!(
                order_id = transition.order_id,
                error = %error,
                "Audit append failed after transition; continuing"
            );
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Record order transition in the audit log"
    }
}

fn build_transition_context(transition: &OrderTransition) -> Value {
    serde_json::json!({
        "tenant_id": transition.tenant_id,
        "order_id": transition.order_id,
        "from_state": transition.from_state,
        "to_state": transition.to_state,
        "station": transition.station,
        "triggered_by": transition.triggered_by,
        "source_event_id": transition.source_event_id,
        "occurred_at": transition.occurred_at,
        "transitioned_at": Utc::now(),
    })
}
