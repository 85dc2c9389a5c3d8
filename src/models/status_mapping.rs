use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::system::WILDCARD_PROVIDER;
use crate::state_machine::{OrderState, Station};

/// MappingRule translates one provider status string into an internal state.
///
/// Rules live in the runtime mapping table and are resolved in tier order:
/// tenant-scoped rules first, then provider defaults, then the generic
/// wildcard. `tenant_id: None` marks a global rule; `provider: "*"` matches
/// any provider within its tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    pub tenant_id: Option<Uuid>,
    pub provider: String,
    pub provider_status: String,
    pub internal_status: OrderState,
    pub triggers_station: Station,
    pub is_terminal: bool,
}

impl MappingRule {
    /// Build a rule with station and terminal flag derived from the state,
    /// the only self-consistent combination
    pub fn new(
        tenant_id: Option<Uuid>,
        provider: impl Into<String>,
        provider_status: impl Into<String>,
        internal_status: OrderState,
    ) -> Self {
        Self {
            tenant_id,
            provider: provider.into(),
            provider_status: provider_status.into(),
            internal_status,
            triggers_station: internal_status.station(),
            is_terminal: internal_status.is_terminal(),
        }
    }

    /// Global rule matching any provider
    pub fn wildcard(provider_status: impl Into<String>, internal_status: OrderState) -> Self {
        Self::new(None, WILDCARD_PROVIDER, provider_status, internal_status)
    }

    pub fn is_wildcard_provider(&self) -> bool {
        self.provider == WILDCARD_PROVIDER
    }

    pub fn is_global(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Reject rules whose denormalized fields disagree with the state table.
    ///
    /// Terminal statuses must never map onto a non-terminal state and the
    /// station column must match the fixed state-to-station routing.
    pub fn validate(&self) -> Result<(), String> {
        if self.provider_status.trim().is_empty() {
            return Err("provider_status must not be empty".to_string());
        }
        if self.provider.trim().is_empty() {
            return Err("provider must not be empty; use \"*\" for wildcard".to_string());
        }
        if self.triggers_station != self.internal_status.station() {
            return Err(format!(
                "station {} does not match the routing for state {}",
                self.triggers_station, self.internal_status
            ));
        }
        if self.is_terminal != self.internal_status.is_terminal() {
            return Err(format!(
                "terminal flag {} does not match state {}",
                self.is_terminal, self.internal_status
            ));
        }
        Ok(())
    }
}
