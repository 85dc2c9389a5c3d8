//! Transition persistence helpers shared by the order state machine.
//!
//! Transitions append to an ordered log: each write takes the next
//! `sort_key`, lands with `most_recent = true`, and flips the previous
//! most-recent row. The current state of an order is therefore always the
//! `to_state` of its single most-recent row, and history replays in
//! `sort_key` order. The storage backend performs the append and the
//! station-row bookkeeping as one atomic unit.

use uuid::Uuid;

use super::errors::PersistenceResult;
use super::states::OrderState;
use crate::models::{NewOrderTransition, NewStationMetricsRow, OrderTransition};
use crate::storage::{FulfillmentStore, StationChange};

/// Resolve the current state of an order from its most recent transition
pub async fn resolve_current_state<S: FulfillmentStore>(
    store: &S,
    tenant_id: Uuid,
    order_id: i64,
) -> PersistenceResult<Option<OrderState>> {
    Ok(store.current_order_state(tenant_id, order_id).await?)
}

/// Whether applying `target` on top of `current` would change anything.
/// Distinct carrier events frequently map to the same internal state.
pub fn transition_is_noop(current: Option<OrderState>, target: OrderState) -> bool {
    current == Some(target)
}

/// Work out the station bookkeeping that must ride along with a transition.
///
/// Returns the change instruction plus whether the order is entering a
/// different station. The first transition of an order always opens a row.
pub async fn plan_station_change<S: FulfillmentStore>(
    store: &S,
    new_transition: &NewOrderTransition,
    sla_target_minutes: i64,
) -> PersistenceResult<(StationChange, bool)> {
    let target_station = new_transition.target_station();
    let open_row = store
        .open_station_row(new_transition.tenant_id, new_transition.order_id)
        .await?;

    let enter_row = NewStationMetricsRow {
        tenant_id: new_transition.tenant_id,
        order_id: new_transition.order_id,
        station: target_station,
        state_at_entry: new_transition.to_state,
        entered_at: new_transition.occurred_at,
        sla_target_minutes,
    };

    let change = match open_row {
        Some(row) if row.station == target_station => StationChange::none(),
        Some(_) => StationChange {
            exit_current: true,
            enter: Some(enter_row),
        },
        None => StationChange {
            exit_current: false,
            enter: Some(enter_row),
        },
    };

    let station_changed = change.enter.is_some();
    Ok((change, station_changed))
}

/// Append the transition and apply station bookkeeping atomically
pub async fn persist_transition<S: FulfillmentStore>(
    store: &S,
    new_transition: NewOrderTransition,
    station_change: StationChange,
) -> PersistenceResult<OrderTransition> {
    Ok(store
        .append_order_transition(new_transition, station_change)
        .await?)
}
