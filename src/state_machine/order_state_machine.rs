use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::actions::{AuditTransitionAction, PublishTransitionEventAction, StateAction};
use super::errors::{StateMachineError, StateMachineResult};
use super::events::TransitionRequest;
use super::guards::{ReopenEligibilityGuard, StateGuard, TerminalStateGuard};
use super::persistence;
use super::states::{OrderState, Station};
use crate::events::publisher::EventPublisher;
use crate::models::{NewOrderTransition, OrderTransition, TriggeredBy};
use crate::sla::SlaTargets;
use crate::storage::FulfillmentStore;

/// Result of a transition attempt that passed all guards
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// Persisted transition row; None when the order was already in state
    pub transition: Option<OrderTransition>,
    pub from_state: Option<OrderState>,
    pub to_state: OrderState,
    pub station: Station,
    pub station_changed: bool,
    /// True when the request was a no-op against the current state
    pub skipped: bool,
}

impl TransitionOutcome {
    fn applied(transition: OrderTransition, station_changed: bool) -> Self {
        Self {
            from_state: transition.from_state,
            to_state: transition.to_state,
            station: transition.station,
            station_changed,
            skipped: false,
            transition: Some(transition),
        }
    }

    fn noop(state: OrderState) -> Self {
        Self {
            transition: None,
            from_state: Some(state),
            to_state: state,
            station: state.station(),
            station_changed: false,
            skipped: true,
        }
    }

    pub fn transition_id(&self) -> Option<i64> {
        self.transition.as_ref().map(|t| t.id)
    }
}

/// Thread-safe order state machine driving the transition log.
///
/// One instance serves all orders of an engine; per-order identity arrives
/// with each request. Writes append to the transition log and settle station
/// bookkeeping atomically through the storage backend.
pub struct OrderStateMachine<S: FulfillmentStore> {
    store: Arc<S>,
    event_publisher: EventPublisher,
    sla_targets: SlaTargets,
}

impl<S: FulfillmentStore> OrderStateMachine<S> {
    /// Create a new order state machine instance
    pub fn new(store: Arc<S>, event_publisher: EventPublisher, sla_targets: SlaTargets) -> Self {
        Self {
            store,
            event_publisher,
            sla_targets,
        }
    }

    /// Get the current state of an order, None before its first transition
    pub async fn current_state(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StateMachineResult<Option<OrderState>> {
        Ok(persistence::resolve_current_state(self.store.as_ref(), tenant_id, order_id).await?)
    }

    /// Check if the order sits in a terminal state
    pub async fn is_terminal(&self, tenant_id: Uuid, order_id: i64) -> StateMachineResult<bool> {
        let current = self.current_state(tenant_id, order_id).await?;
        Ok(current.is_some_and(|state| state.is_terminal()))
    }

    /// Attempt to transition an order into the requested state.
    ///
    /// Requests targeting the current state succeed as recorded no-ops.
    /// Requests that would move a terminal order fail with a guard error
    /// the caller surfaces as an anomaly; the prior state is preserved.
    pub async fn transition(
        &self,
        request: TransitionRequest,
    ) -> StateMachineResult<TransitionOutcome> {
        let current_state = self
            .current_state(request.tenant_id, request.order_id)
            .await?;

        if persistence::transition_is_noop(current_state, request.target_state) {
            tracing::debug!(
                order_id = request.order_id,
                state = %request.target_state,
                "Order already in target state; transition skipped"
            );
            return Ok(TransitionOutcome::noop(request.target_state));
        }

        self.check_guards(&[&TerminalStateGuard], &request, current_state)
            .await?;

        self.apply(request, current_state).await
    }

    /// Explicitly reopen a delivered order into the return flow.
    ///
    /// This is the single sanctioned exit from a terminal state; carrier
    /// events can never trigger it.
    pub async fn reopen_for_return(
        &self,
        tenant_id: Uuid,
        order_id: i64,
        occurred_at: DateTime<Utc>,
        metadata: Value,
    ) -> StateMachineResult<TransitionOutcome> {
        let request = TransitionRequest {
            tenant_id,
            order_id,
            target_state: OrderState::ReturnRequested,
            triggered_by: TriggeredBy::User,
            source_event_id: None,
            occurred_at,
            metadata,
        };

        let current_state = self.current_state(tenant_id, order_id).await?;
        self.check_guards(&[&ReopenEligibilityGuard], &request, current_state)
            .await?;

        self.apply(request, current_state).await
    }

    /// Check guard conditions for the transition
    async fn check_guards(
        &self,
        guards: &[&dyn StateGuard<S>],
        request: &TransitionRequest,
        current_state: Option<OrderState>,
    ) -> StateMachineResult<()> {
        for guard in guards {
            tracing::debug!(
                order_id = request.order_id,
                guard = guard.description(),
                "Checking transition guard"
            );
            guard
                .check(request, current_state, self.store.as_ref())
                .await?;
        }
        Ok(())
    }

    /// Persist the transition and run post-transition actions
    async fn apply(
        &self,
        request: TransitionRequest,
        current_state: Option<OrderState>,
    ) -> StateMachineResult<TransitionOutcome> {
        let target_station = request.target_state.station();
        let sla_target_minutes = self.sla_targets.target_for(target_station);

        let new_transition = NewOrderTransition {
            tenant_id: request.tenant_id,
            order_id: request.order_id,
            to_state: request.target_state,
            from_state: current_state,
            triggered_by: request.triggered_by,
            source_event_id: request.source_event_id,
            metadata: request.metadata.clone(),
            occurred_at: request.occurred_at,
        };

        let (station_change, station_changed) =
            persistence::plan_station_change(self.store.as_ref(), &new_transition, sla_target_minutes)
                .await?;
        let transition =
            persistence::persist_transition(self.store.as_ref(), new_transition, station_change)
                .await?;

        self.execute_actions(&request, &transition, station_changed)
            .await?;

        let from_state = transition.from_state.map(|state| state.to_string());
        crate::logging::log_transition_operation(
            transition.order_id,
            from_state.as_deref(),
            &transition.to_state.to_string(),
            &transition.station.to_string(),
            None,
        );

        Ok(TransitionOutcome::applied(transition, station_changed))
    }

    /// Execute actions after successful transition
    async fn execute_actions(
        &self,
        request: &TransitionRequest,
        transition: &OrderTransition,
        station_changed: bool,
    ) -> StateMachineResult<()> {
        let actions: Vec<Box<dyn StateAction<S>>> = vec![
            Box::new(PublishTransitionEventAction::new(
                self.event_publisher.clone(),
            )),
            Box::new(AuditTransitionAction),
        ];

        for action in actions {
            action
                .execute(request, transition, station_changed, self.store.as_ref())
                .await?;
        }

        Ok(())
    }
}

impl<S: FulfillmentStore> Clone for OrderStateMachine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            event_publisher: self.event_publisher.clone(),
            sla_targets: self.sla_targets.clone(),
        }
    }
}
