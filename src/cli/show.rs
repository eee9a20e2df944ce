//! Show subcommand: render the resolved configuration.
//!
//! Output is keyed by the user-facing registry paths. Secret fields are
//! masked; scoped tokens keep their scopes but lose the token text.

use clap::Args;
use serde_json::{Map, Value};

use crate::config::{AppConfig, ConfigValue, Registry, leaves};

const MASK: &str = "********";

/// Arguments for the show subcommand
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Output format: yaml (default) or json
    #[arg(short, long, default_value = "yaml", value_name = "FORMAT")]
    pub format: ShowFormat,
}

/// Output format for rendered configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShowFormat {
    #[default]
    Yaml,
    Json,
}

impl std::str::FromStr for ShowFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(ShowFormat::Yaml),
            "json" => Ok(ShowFormat::Json),
            _ => Err(format!(
                "Invalid format '{}'. Valid options: yaml, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for ShowFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShowFormat::Yaml => write!(f, "yaml"),
            ShowFormat::Json => write!(f, "json"),
        }
    }
}

fn masked(value: &ConfigValue) -> Value {
    match value {
        ConfigValue::Str(s) if s.is_empty() => Value::String(String::new()),
        ConfigValue::Str(_) => Value::String(MASK.to_string()),
        ConfigValue::Tokens(tokens) => Value::Array(
            tokens
                .iter()
                .map(|t| serde_json::json!({ "token": MASK, "scopes": t.scopes }))
                .collect(),
        ),
        ConfigValue::Unset => Value::Null,
        _ => Value::String(MASK.to_string()),
    }
}

fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts = path.split('.').peekable();
    let mut node = root;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            node.insert(part.to_string(), value);
            return;
        }
        let child = node
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        let Value::Object(map) = child else {
            return;
        };
        node = map;
    }
}

/// Nested JSON view of `cfg` with secrets masked.
pub fn config_tree(registry: &Registry, cfg: &AppConfig) -> Value {
    let mut root = Map::new();
    for (field, value) in leaves(cfg) {
        let path = registry
            .by_field(field)
            .map(|e| e.path)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| field.field_path());
        let rendered = if registry.is_secret(field) {
            masked(&value)
        } else {
            value.to_json()
        };
        insert_path(&mut root, path, rendered);
    }
    Value::Object(root)
}

pub fn render_config(
    registry: &Registry,
    cfg: &AppConfig,
    format: ShowFormat,
) -> anyhow::Result<String> {
    let tree = config_tree(registry, cfg);
    Ok(match format {
        ShowFormat::Yaml => serde_yaml::to_string(&tree)?,
        ShowFormat::Json => serde_json::to_string_pretty(&tree)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopedToken;

    fn defaults() -> (Registry, AppConfig) {
        let registry = Registry::build().unwrap();
        let mut cfg = AppConfig::default();
        registry.apply_defaults(&mut cfg).unwrap();
        (registry, cfg)
    }

    #[test]
    fn test_secrets_are_masked() {
        let (registry, mut cfg) = defaults();
        cfg.enigma2.password = "dreambox".into();
        cfg.api.tokens = vec![ScopedToken {
            token: "s3cret".into(),
            scopes: vec!["v3:read".into()],
            user: None,
        }];
        let out = render_config(&registry, &cfg, ShowFormat::Json).unwrap();
        assert!(!out.contains("dreambox"));
        assert!(!out.contains("s3cret"));
        assert!(out.contains("v3:read"));
        assert!(out.contains(MASK));
    }

    #[test]
    fn test_tree_uses_registry_paths() {
        let (registry, cfg) = defaults();
        let tree = config_tree(&registry, &cfg);
        assert_eq!(tree["epg"]["days"], serde_json::json!(14));
        assert_eq!(tree["enigma2"]["maxBackoff"], serde_json::json!("30s"));
        assert_eq!(tree["api"]["token"], serde_json::json!(""));
    }

    #[test]
    fn test_yaml_output() {
        let (registry, cfg) = defaults();
        let out = render_config(&registry, &cfg, ShowFormat::Yaml).unwrap();
        assert!(out.contains("logLevel: info"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ShowFormat>().unwrap(), ShowFormat::Json);
        assert!("toml".parse::<ShowFormat>().is_err());
    }
}
