//! Proptest strategies for fulfillment domain values.

#![allow(dead_code)]

use fulfillment_core::models::IngestionMode;
use fulfillment_core::state_machine::OrderState;
use proptest::prelude::*;
use serde_json::Value;

/// Carrier-shaped tracking references: a short uppercase prefix followed by
/// a digit run, the same shape the email scanner looks for
pub fn tracking_number_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z]{2,4}[0-9]{6,10}").unwrap()
}

/// Couriers seen across regional deployments
pub fn provider_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("aramex".to_string()),
        Just("dhl".to_string()),
        Just("fedex".to_string()),
        Just("smsa".to_string()),
        Just("ups".to_string()),
    ]
}

/// Statuses covered by the default global mapping rules
pub fn mapped_provider_status_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("pending".to_string()),
        Just("picked_up".to_string()),
        Just("in_transit".to_string()),
        Just("out_for_delivery".to_string()),
        Just("delivered".to_string()),
        Just("returned".to_string()),
        Just("return_received".to_string()),
        Just("cancelled".to_string()),
    ]
}

/// Free-form provider statuses, mapped and unmapped alike
pub fn raw_provider_status_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z_]{2,24}").unwrap()
}

pub fn order_state_strategy() -> impl Strategy<Value = OrderState> {
    proptest::sample::select(vec![
        OrderState::New,
        OrderState::CallCenterPending,
        OrderState::CallCenterConfirmed,
        OrderState::OperationsPending,
        OrderState::OperationsProcessing,
        OrderState::Shipped,
        OrderState::InTransit,
        OrderState::OutForDelivery,
        OrderState::Delivered,
        OrderState::Cancelled,
        OrderState::FinancePending,
        OrderState::FinanceSettled,
        OrderState::ReturnRequested,
        OrderState::ReturnInTransit,
        OrderState::ReturnReceived,
    ])
}

pub fn ingestion_mode_strategy() -> impl Strategy<Value = IngestionMode> {
    prop_oneof![
        Just(IngestionMode::Api),
        Just(IngestionMode::Csv),
        Just(IngestionMode::Email),
        Just(IngestionMode::Manual),
    ]
}

/// Arbitrary JSON documents a few levels deep.
///
/// Leaves stay on null, bool, i64 and short strings so equality is exact
/// across a serialize/parse round trip.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _-]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Counts for courier daily buckets: (delivered, returned, on_time subset,
/// with on_time never exceeding delivered)
pub fn courier_counts_strategy() -> impl Strategy<Value = (u8, u8, u8)> {
    (0u8..40, 0u8..40).prop_flat_map(|(delivered, returned)| {
        (Just(delivered), Just(returned), 0..=delivered)
    })
}
