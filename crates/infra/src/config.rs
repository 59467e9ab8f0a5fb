//! Ledger configuration loaded from the environment.

use thiserror::Error;

use pharmacy_inventory::{LedgerPolicy, OversellPolicy, ShortfallPolicy, TransferPolicy};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const SUPPLIER_LOCATION: &str = "PHARMACY_SUPPLIER_LOCATION";
pub const OVERSELL_POLICY: &str = "PHARMACY_OVERSELL_POLICY";
pub const SHORTFALL_POLICY: &str = "PHARMACY_SHORTFALL_POLICY";
pub const TRANSFER_POLICY: &str = "PHARMACY_TRANSFER_POLICY";

/// Name of the pseudo-location goods arrive from when a receipt names no source.
pub const DEFAULT_SUPPLIER_LOCATION: &str = "Supplier";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Postgres connection string; only required by the Postgres store.
    pub database_url: Option<String>,
    /// Location registry name of the supplier pseudo-location.
    pub supplier_location: String,
    pub policy: LedgerPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            supplier_location: DEFAULT_SUPPLIER_LOCATION.to_string(),
            policy: LedgerPolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let supplier_location = value(SUPPLIER_LOCATION).unwrap_or_else(|| {
            tracing::warn!(
                "{SUPPLIER_LOCATION} not set; using '{DEFAULT_SUPPLIER_LOCATION}'"
            );
            DEFAULT_SUPPLIER_LOCATION.to_string()
        });

        let policy = LedgerPolicy {
            oversell: parse_or_default::<OversellPolicy>(OVERSELL_POLICY, value(OVERSELL_POLICY))?,
            shortfall: parse_or_default::<ShortfallPolicy>(SHORTFALL_POLICY, value(SHORTFALL_POLICY))?,
            transfer: parse_or_default::<TransferPolicy>(TRANSFER_POLICY, value(TRANSFER_POLICY))?,
        };

        Ok(Self {
            database_url: value(DATABASE_URL),
            supplier_location,
            policy,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing(DATABASE_URL))
    }
}

fn parse_or_default<T>(key: &'static str, raw: Option<String>) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = pharmacy_core::DomainError> + Default + std::fmt::Debug,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: pharmacy_core::DomainError| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => {
            let fallback = T::default();
            tracing::warn!("{key} not set; using {fallback:?}");
            Ok(fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(
            config.require_database_url(),
            Err(ConfigError::Missing(DATABASE_URL))
        );
    }

    #[test]
    fn policies_are_read_from_their_keys() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (DATABASE_URL, "postgres://localhost/pharmacy"),
            (SUPPLIER_LOCATION, "Central Warehouse"),
            (OVERSELL_POLICY, "reject"),
            (SHORTFALL_POLICY, "Reject"),
            (TRANSFER_POLICY, "lenient"),
        ]))
        .unwrap();

        assert_eq!(config.require_database_url(), Ok("postgres://localhost/pharmacy"));
        assert_eq!(config.supplier_location, "Central Warehouse");
        assert_eq!(config.policy.oversell, OversellPolicy::Reject);
        assert_eq!(config.policy.shortfall, ShortfallPolicy::Reject);
        assert_eq!(config.policy.transfer, TransferPolicy::Lenient);
    }

    #[test]
    fn malformed_policy_is_an_error() {
        let err = LedgerConfig::from_lookup(lookup(&[(TRANSFER_POLICY, "loose")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: TRANSFER_POLICY, .. }));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = LedgerConfig::from_lookup(lookup(&[(SUPPLIER_LOCATION, "  ")])).unwrap();
        assert_eq!(config.supplier_location, DEFAULT_SUPPLIER_LOCATION);
    }
}
