//! Status mapping engine.
//!
//! Resolves a raw (provider, provider_status) pair to an internal order
//! state through three explicit tiers evaluated in fixed order: tenant
//! override, provider default, generic wildcard. The tier an answer came
//! from is part of the result, which makes resolution order a directly
//! testable property instead of implicit lookup behavior.
//!
//! Rules live in memory and take effect immediately; operators manage them
//! at runtime without a deploy.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::constants::system::WILDCARD_PROVIDER;
use crate::error::{FulfillmentError, Result};
use crate::models::MappingRule;
use crate::state_machine::{OrderState, Station};

/// Which tier a resolution matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingTier {
    TenantOverride,
    ProviderDefault,
    Wildcard,
}

impl fmt::Display for MappingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MappingTier::TenantOverride => "tenant_override",
            MappingTier::ProviderDefault => "provider_default",
            MappingTier::Wildcard => "wildcard",
        };
        write!(f, "{label}")
    }
}

/// Outcome of a successful mapping lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedMapping {
    pub internal_status: OrderState,
    pub triggers_station: Station,
    pub is_terminal: bool,
    pub matched_tier: MappingTier,
}

impl ResolvedMapping {
    fn from_rule(rule: &MappingRule, matched_tier: MappingTier) -> Self {
        Self {
            internal_status: rule.internal_status,
            triggers_station: rule.triggers_station,
            is_terminal: rule.is_terminal,
            matched_tier,
        }
    }
}

type TenantKey = (Uuid, String, String);
type GlobalKey = (String, String);

/// Concurrent three-tier mapping table.
///
/// Keys are normalized to lowercase so carrier feeds that shout
/// ("DELIVERED") and ones that don't resolve identically.
#[derive(Debug)]
pub struct MappingRegistry {
    tenant_rules: DashMap<TenantKey, MappingRule>,
    global_rules: DashMap<GlobalKey, MappingRule>,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

impl MappingRegistry {
    /// Empty registry with no rules at all
    pub fn new() -> Self {
        Self {
            tenant_rules: DashMap::new(),
            global_rules: DashMap::new(),
        }
    }

    /// Registry seeded with the cross-carrier wildcard defaults
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for (status, state) in [
            ("pending", OrderState::OperationsPending),
            ("picked_up", OrderState::Shipped),
            ("in_transit", OrderState::InTransit),
            ("out_for_delivery", OrderState::OutForDelivery),
            ("delivered", OrderState::Delivered),
            ("returned", OrderState::ReturnInTransit),
            ("return_received", OrderState::ReturnReceived),
            ("cancelled", OrderState::Cancelled),
        ] {
            let rule = MappingRule::wildcard(status, state);
            registry.store(rule);
        }
        registry
    }

    fn store(&self, rule: MappingRule) -> Option<MappingRule> {
        let provider = normalize(&rule.provider);
        let status = normalize(&rule.provider_status);
        match rule.tenant_id {
            Some(tenant_id) => self.tenant_rules.insert((tenant_id, provider, status), rule),
            None => self.global_rules.insert((provider, status), rule),
        }
    }

    /// Insert or replace a rule, returning the rule it replaced.
    ///
    /// Rules are validated first so the table can never hold an entry whose
    /// station or terminal flag disagrees with the state routing table.
    pub fn upsert_rule(&self, rule: MappingRule) -> Result<Option<MappingRule>> {
        rule.validate().map_err(FulfillmentError::ValidationError)?;
        Ok(self.store(rule))
    }

    /// Remove a rule, returning it when one was present
    pub fn remove_rule(
        &self,
        tenant_id: Option<Uuid>,
        provider: &str,
        provider_status: &str,
    ) -> Option<MappingRule> {
        let provider = normalize(provider);
        let status = normalize(provider_status);
        match tenant_id {
            Some(tenant_id) => self
                .tenant_rules
                .remove(&(tenant_id, provider, status))
                .map(|(_, rule)| rule),
            None => self
                .global_rules
                .remove(&(provider, status))
                .map(|(_, rule)| rule),
        }
    }

    /// Resolve a provider status for a tenant, or None when unmapped.
    ///
    /// Tier order: tenant rule for the exact provider, tenant rule for any
    /// provider, global rule for the exact provider, global wildcard. A
    /// miss is not an error; callers store the event unresolved and surface
    /// it for manual mapping.
    pub fn resolve(
        &self,
        tenant_id: Uuid,
        provider: Option<&str>,
        provider_status: &str,
    ) -> Option<ResolvedMapping> {
        let status = normalize(provider_status);
        if status.is_empty() {
            return None;
        }
        let provider = provider.map(normalize).filter(|p| !p.is_empty());

        if let Some(p) = &provider {
            if let Some(rule) = self.tenant_rules.get(&(tenant_id, p.clone(), status.clone())) {
                return Some(ResolvedMapping::from_rule(&rule, MappingTier::TenantOverride));
            }
        }
        if let Some(rule) =
            self.tenant_rules
                .get(&(tenant_id, WILDCARD_PROVIDER.to_string(), status.clone()))
        {
            return Some(ResolvedMapping::from_rule(&rule, MappingTier::TenantOverride));
        }
        if let Some(p) = &provider {
            if p != WILDCARD_PROVIDER {
                if let Some(rule) = self.global_rules.get(&(p.clone(), status.clone())) {
                    return Some(ResolvedMapping::from_rule(&rule, MappingTier::ProviderDefault));
                }
            }
        }
        self.global_rules
            .get(&(WILDCARD_PROVIDER.to_string(), status))
            .map(|rule| ResolvedMapping::from_rule(&rule, MappingTier::Wildcard))
    }

    /// Override rules scoped to one tenant
    pub fn rules_for_tenant(&self, tenant_id: Uuid) -> Vec<MappingRule> {
        self.tenant_rules
            .iter()
            .filter(|entry| entry.key().0 == tenant_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Global rules, provider defaults and wildcards alike
    pub fn global_rules(&self) -> Vec<MappingRule> {
        self.global_rules
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_defaults_resolve() {
        let registry = MappingRegistry::with_defaults();
        let tenant = Uuid::new_v4();

        let resolved = registry.resolve(tenant, Some("aramex"), "delivered").unwrap();
        assert_eq!(resolved.internal_status, OrderState::Delivered);
        assert_eq!(resolved.triggers_station, Station::Finance);
        assert!(resolved.is_terminal);
        assert_eq!(resolved.matched_tier, MappingTier::Wildcard);

        let resolved = registry.resolve(tenant, None, "picked_up").unwrap();
        assert_eq!(resolved.internal_status, OrderState::Shipped);
        assert!(!resolved.is_terminal);
    }

    #[test]
    fn test_provider_default_beats_wildcard() {
        let registry = MappingRegistry::with_defaults();
        let tenant = Uuid::new_v4();

        // Aramex reports "returned" when the parcel is already back at the
        // warehouse, so a provider default maps it further along the flow.
        registry
            .upsert_rule(MappingRule::new(
                None,
                "aramex",
                "returned",
                OrderState::ReturnReceived,
            ))
            .unwrap();

        let resolved = registry.resolve(tenant, Some("aramex"), "returned").unwrap();
        assert_eq!(resolved.internal_status, OrderState::ReturnReceived);
        assert_eq!(resolved.matched_tier, MappingTier::ProviderDefault);

        // other providers still hit the wildcard
        let resolved = registry.resolve(tenant, Some("dhl"), "returned").unwrap();
        assert_eq!(resolved.internal_status, OrderState::ReturnInTransit);
        assert_eq!(resolved.matched_tier, MappingTier::Wildcard);
    }

    #[test]
    fn test_tenant_override_beats_provider_default() {
        let registry = MappingRegistry::with_defaults();
        let tenant = Uuid::new_v4();
        let other_tenant = Uuid::new_v4();

        registry
            .upsert_rule(MappingRule::new(
                None,
                "aramex",
                "out for delivery",
                OrderState::OutForDelivery,
            ))
            .unwrap();
        registry
            .upsert_rule(MappingRule::new(
                Some(tenant),
                "aramex",
                "out for delivery",
                OrderState::InTransit,
            ))
            .unwrap();

        let resolved = registry
            .resolve(tenant, Some("aramex"), "out for delivery")
            .unwrap();
        assert_eq!(resolved.internal_status, OrderState::InTransit);
        assert_eq!(resolved.matched_tier, MappingTier::TenantOverride);

        // the override is invisible to every other tenant
        let resolved = registry
            .resolve(other_tenant, Some("aramex"), "out for delivery")
            .unwrap();
        assert_eq!(resolved.internal_status, OrderState::OutForDelivery);
        assert_eq!(resolved.matched_tier, MappingTier::ProviderDefault);
    }

    #[test]
    fn test_tenant_wildcard_still_counts_as_override() {
        let registry = MappingRegistry::with_defaults();
        let tenant = Uuid::new_v4();

        registry
            .upsert_rule(MappingRule::new(
                Some(tenant),
                WILDCARD_PROVIDER,
                "delivered",
                OrderState::FinancePending,
            ))
            .unwrap();

        let resolved = registry.resolve(tenant, Some("dhl"), "delivered").unwrap();
        assert_eq!(resolved.internal_status, OrderState::FinancePending);
        assert_eq!(resolved.matched_tier, MappingTier::TenantOverride);
    }

    #[test]
    fn test_unmapped_status_returns_none() {
        let registry = MappingRegistry::with_defaults();
        let tenant = Uuid::new_v4();

        assert!(registry.resolve(tenant, Some("dhl"), "held_at_customs").is_none());
        assert!(registry.resolve(tenant, None, "").is_none());
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let registry = MappingRegistry::with_defaults();
        let tenant = Uuid::new_v4();

        let resolved = registry.resolve(tenant, Some("ARAMEX"), " DELIVERED ").unwrap();
        assert_eq!(resolved.internal_status, OrderState::Delivered);
    }

    #[test]
    fn test_upsert_rejects_inconsistent_rule() {
        let registry = MappingRegistry::new();
        let mut rule = MappingRule::wildcard("delivered", OrderState::Delivered);
        rule.is_terminal = false;

        let err = registry.upsert_rule(rule).unwrap_err();
        assert!(matches!(err, FulfillmentError::ValidationError(_)));
        assert!(registry.global_rules().is_empty());
    }

    #[test]
    fn test_remove_restores_lower_tier() {
        let registry = MappingRegistry::with_defaults();
        let tenant = Uuid::new_v4();

        registry
            .upsert_rule(MappingRule::new(
                Some(tenant),
                "aramex",
                "delivered",
                OrderState::FinancePending,
            ))
            .unwrap();
        assert_eq!(
            registry
                .resolve(tenant, Some("aramex"), "delivered")
                .unwrap()
                .matched_tier,
            MappingTier::TenantOverride
        );

        let removed = registry.remove_rule(Some(tenant), "aramex", "delivered");
        assert!(removed.is_some());

        let resolved = registry.resolve(tenant, Some("aramex"), "delivered").unwrap();
        assert_eq!(resolved.matched_tier, MappingTier::Wildcard);
        assert_eq!(resolved.internal_status, OrderState::Delivered);
    }

    #[test]
    fn test_rules_for_tenant_lists_only_that_tenant() {
        let registry = MappingRegistry::with_defaults();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        registry
            .upsert_rule(MappingRule::new(
                Some(tenant_a),
                "aramex",
                "delivered",
                OrderState::Delivered,
            ))
            .unwrap();
        registry
            .upsert_rule(MappingRule::new(
                Some(tenant_b),
                "dhl",
                "pending",
                OrderState::OperationsPending,
            ))
            .unwrap();

        let rules = registry.rules_for_tenant(tenant_a);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].provider, "aramex");
        assert_eq!(registry.global_rules().len(), 8);
    }
}
