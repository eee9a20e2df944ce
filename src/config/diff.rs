//! Structural comparison of two resolved configs.

use serde::Serialize;

use super::fields::{ConfigValue, FieldId, leaves};
use super::registry::Registry;
use super::scalar::parse_comma_separated;
use super::types::AppConfig;

/// One leaf that differs between two configs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    #[serde(skip)]
    pub field: FieldId,
    /// User-facing path, or the internal field path for unregistered leaves.
    pub path: String,
    pub hot_reloadable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub changed: Vec<FieldChange>,
    pub restart_required: bool,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn changed_paths(&self) -> Vec<&str> {
        self.changed.iter().map(|c| c.path.as_str()).collect()
    }
}

fn normalize(field: FieldId, value: ConfigValue) -> ConfigValue {
    match value {
        ConfigValue::Str(s) if field.is_comma_list() => {
            let mut parts = parse_comma_separated(&s);
            parts.sort();
            ConfigValue::Str(parts.join(","))
        }
        other => other,
    }
}

/// Compare `old` and `new` leaf by leaf.
///
/// A single change that is not hot-reloadable marks the whole summary as
/// needing a restart.
pub fn diff(registry: &Registry, old: &AppConfig, new: &AppConfig) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    for ((field, a), (_, b)) in leaves(old).into_iter().zip(leaves(new)) {
        if normalize(field, a) == normalize(field, b) {
            continue;
        }
        let hot = registry.is_hot_reloadable(field);
        if !hot {
            summary.restart_required = true;
        }
        let path = registry
            .by_field(field)
            .map(|e| e.path)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| field.field_path());
        summary.changed.push(FieldChange {
            field,
            path: path.to_string(),
            hot_reloadable: hot,
        });
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup() -> (Registry, AppConfig) {
        let registry = Registry::build().unwrap();
        let mut cfg = AppConfig::default();
        registry.apply_defaults(&mut cfg).unwrap();
        (registry, cfg)
    }

    #[test]
    fn test_identical_configs() {
        let (registry, cfg) = setup();
        let summary = diff(&registry, &cfg, &cfg.clone());
        assert!(summary.is_empty());
        assert!(!summary.restart_required);
    }

    #[test]
    fn test_allowlisted_change_is_hot() {
        let (registry, old) = setup();
        let mut new = old.clone();
        new.log_level = "debug".into();
        new.epg.days = 7;
        let summary = diff(&registry, &old, &new);
        assert_eq!(summary.changed_paths(), vec!["logLevel", "epg.days"]);
        assert!(!summary.restart_required);
    }

    #[test]
    fn test_any_cold_change_requires_restart() {
        let (registry, old) = setup();
        let mut new = old.clone();
        new.log_level = "debug".into();
        new.enigma2.timeout = Duration::from_secs(3);
        let summary = diff(&registry, &old, &new);
        assert!(summary.restart_required);
        assert_eq!(summary.changed.len(), 2);
        assert!(summary.changed[0].hot_reloadable);
    }

    #[test]
    fn test_flagged_but_not_allowlisted_requires_restart() {
        let (registry, old) = setup();
        let mut new = old.clone();
        new.trusted_proxies = "10.0.0.1".into();
        assert!(diff(&registry, &old, &new).restart_required);
    }

    #[test]
    fn test_comma_list_order_ignored() {
        let (registry, mut old) = setup();
        old.bouquet = "Favourites, Sports".into();
        let mut new = old.clone();
        new.bouquet = "Sports,Favourites".into();
        assert!(diff(&registry, &old, &new).is_empty());

        new.bouquet = "Sports".into();
        assert_eq!(diff(&registry, &old, &new).changed_paths(), vec!["bouquets"]);
    }

    #[test]
    fn test_optional_presence_change() {
        let (registry, old) = setup();
        let mut new = old.clone();
        new.tls.cert = Some("/etc/xg2g/tls.crt".into());
        let summary = diff(&registry, &old, &new);
        assert_eq!(summary.changed_paths(), vec!["tls.cert"]);
        assert!(summary.restart_required);
    }
}
