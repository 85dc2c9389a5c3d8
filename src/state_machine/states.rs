use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal order state definitions shared with the platform's operations UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Initial state when an order is first seen
    New,
    /// Order awaiting call-center confirmation
    CallCenterPending,
    /// Order confirmed by the call center
    CallCenterConfirmed,
    /// Order queued for warehouse processing
    OperationsPending,
    /// Order being picked and packed
    OperationsProcessing,
    /// Package handed to the courier
    Shipped,
    /// Package moving through the courier network
    InTransit,
    /// Package on a vehicle for final delivery
    OutForDelivery,
    /// Package delivered to the customer
    Delivered,
    /// Order cancelled before delivery
    Cancelled,
    /// Delivered order awaiting payment reconciliation
    FinancePending,
    /// Payment reconciled and settled
    FinanceSettled,
    /// Customer requested a return after delivery
    ReturnRequested,
    /// Return package moving back through the courier network
    ReturnInTransit,
    /// Return package received at the warehouse
    ReturnReceived,
}

impl OrderState {
    /// Check if this is a terminal state (no further carrier-driven transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Cancelled | Self::ReturnReceived
        )
    }

    /// Check if this state belongs to the return flow
    pub fn is_return_flow(&self) -> bool {
        matches!(
            self,
            Self::ReturnRequested | Self::ReturnInTransit | Self::ReturnReceived
        )
    }

    /// The operational station responsible for an order in this state.
    ///
    /// Every state routes to exactly one station; this mapping is total by
    /// construction so station metrics can never be orphaned.
    pub fn station(&self) -> Station {
        match self {
            Self::New | Self::CallCenterPending | Self::CallCenterConfirmed => Station::CallCenter,
            Self::OperationsPending
            | Self::OperationsProcessing
            | Self::Shipped
            | Self::InTransit
            | Self::OutForDelivery
            | Self::Cancelled => Station::Operations,
            Self::Delivered | Self::FinancePending | Self::FinanceSettled => Station::Finance,
            Self::ReturnRequested | Self::ReturnInTransit | Self::ReturnReceived => {
                Station::Returns
            }
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::CallCenterPending => write!(f, "call_center_pending"),
            Self::CallCenterConfirmed => write!(f, "call_center_confirmed"),
            Self::OperationsPending => write!(f, "operations_pending"),
            Self::OperationsProcessing => write!(f, "operations_processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::InTransit => write!(f, "in_transit"),
            Self::OutForDelivery => write!(f, "out_for_delivery"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::FinancePending => write!(f, "finance_pending"),
            Self::FinanceSettled => write!(f, "finance_settled"),
            Self::ReturnRequested => write!(f, "return_requested"),
            Self::ReturnInTransit => write!(f, "return_in_transit"),
            Self::ReturnReceived => write!(f, "return_received"),
        }
    }
}

impl std::str::FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "call_center_pending" => Ok(Self::CallCenterPending),
            "call_center_confirmed" => Ok(Self::CallCenterConfirmed),
            "operations_pending" => Ok(Self::OperationsPending),
            "operations_processing" => Ok(Self::OperationsProcessing),
            "shipped" => Ok(Self::Shipped),
            "in_transit" => Ok(Self::InTransit),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "finance_pending" => Ok(Self::FinancePending),
            "finance_settled" => Ok(Self::FinanceSettled),
            "return_requested" => Ok(Self::ReturnRequested),
            "return_in_transit" => Ok(Self::ReturnInTransit),
            "return_received" => Ok(Self::ReturnReceived),
            _ => Err(format!("Invalid order state: {s}")),
        }
    }
}

/// Default state for newly observed orders
impl Default for OrderState {
    fn default() -> Self {
        Self::New
    }
}

/// Operational stations that own orders while they sit in a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Station {
    /// Order confirmation and customer contact
    CallCenter,
    /// Warehouse processing and carrier handoff
    Operations,
    /// Payment reconciliation after delivery
    Finance,
    /// Reverse logistics for returned packages
    Returns,
}

impl Station {
    /// All stations in routing order
    pub fn all() -> [Station; 4] {
        [
            Self::CallCenter,
            Self::Operations,
            Self::Finance,
            Self::Returns,
        ]
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallCenter => write!(f, "call_center"),
            Self::Operations => write!(f, "operations"),
            Self::Finance => write!(f, "finance"),
            Self::Returns => write!(f, "returns"),
        }
    }
}

impl std::str::FromStr for Station {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "call_center" => Ok(Self::CallCenter),
            "operations" => Ok(Self::Operations),
            "finance" => Ok(Self::Finance),
            "returns" => Ok(Self::Returns),
            _ => Err(format!("Invalid station: {s}")),
        }
    }
}
