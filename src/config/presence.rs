//! Loose key-presence scan of the raw config file.
//!
//! Strict decoding cannot tell "key present with a zero value" from "key
//! absent" once optional fields collapse to `None` for `key: ~`. This scan
//! parses the same bytes into an untyped tree and records which keys were
//! written, independent of their values.

use serde_yaml::Value;
use std::collections::BTreeSet;

use crate::error::{ConfigError, ConfigResult};

/// Legacy receiver namespace in the file.
pub const LEGACY_NAMESPACE: &str = "openWebIF";
/// Canonical receiver namespace in the file.
pub const CANONICAL_NAMESPACE: &str = "enigma2";

/// Keys textually present in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasPresence {
    open_webif: BTreeSet<String>,
    enigma2: BTreeSet<String>,
    key_paths: BTreeSet<String>,
}

impl AliasPresence {
    /// `openWebIF.<key>` was written.
    pub fn legacy(&self, key: &str) -> bool {
        self.open_webif.contains(key)
    }

    /// `enigma2.<key>` was written.
    pub fn canonical(&self, key: &str) -> bool {
        self.enigma2.contains(key)
    }

    /// Every dotted key path in the file, intermediate mappings included.
    pub fn key_paths(&self) -> impl Iterator<Item = &str> {
        self.key_paths.iter().map(String::as_str)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.key_paths.contains(path)
    }

    /// Any key under `prefix.` (or `prefix` itself) was written.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.key_paths
            .iter()
            .any(|p| p == prefix || p.strip_prefix(prefix).is_some_and(|r| r.starts_with('.')))
    }
}

/// Scan `raw` for present keys.
///
/// Malformed YAML and a non-mapping top level are errors; an empty document
/// yields an empty presence set.
pub fn parse_alias_presence(raw: &str) -> ConfigResult<AliasPresence> {
    let root: Value = serde_yaml::from_str(raw)
        .map_err(|e| ConfigError::strict_decode("alias presence scan", e))?;

    let mut presence = AliasPresence::default();
    let map = match root {
        Value::Null => return Ok(presence),
        Value::Mapping(map) => map,
        other => {
            return Err(ConfigError::strict_decode(
                "alias presence scan",
                format!("top level must be a mapping, got {}", kind_of(&other)),
            ));
        }
    };

    for (key, value) in &map {
        let Some(key) = key.as_str() else { continue };
        let target = match key {
            LEGACY_NAMESPACE => Some(&mut presence.open_webif),
            CANONICAL_NAMESPACE => Some(&mut presence.enigma2),
            _ => None,
        };
        if let (Some(target), Value::Mapping(inner)) = (target, value) {
            target.extend(inner.keys().filter_map(|k| k.as_str()).map(str::to_string));
        }
        collect_paths(key.to_string(), value, &mut presence.key_paths);
    }

    Ok(presence)
}

fn collect_paths(path: String, value: &Value, out: &mut BTreeSet<String>) {
    if let Value::Mapping(map) = value {
        for (key, child) in map {
            if let Some(key) = key.as_str() {
                collect_paths(format!("{}.{}", path, key), child, out);
            }
        }
    }
    out.insert(path);
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_records_zero_values() {
        let raw = r#"
openWebIF:
  useWebIFStreams: false
  retries: 0
enigma2:
  baseUrl: http://receiver.local
epg:
  enabled: false
"#;
        let p = parse_alias_presence(raw).unwrap();
        assert!(p.legacy("useWebIFStreams"));
        assert!(p.legacy("retries"));
        assert!(!p.legacy("baseUrl"));
        assert!(p.canonical("baseUrl"));
        assert!(p.has_path("epg.enabled"));
        assert!(p.has_path("epg"));
        assert!(p.has_prefix("openWebIF"));
        assert!(!p.has_prefix("openWeb"));
    }

    #[test]
    fn test_presence_empty_document() {
        let p = parse_alias_presence("# only a comment\n").unwrap();
        assert_eq!(p, AliasPresence::default());
    }

    #[test]
    fn test_presence_rejects_malformed_input() {
        assert!(parse_alias_presence("epg: [unclosed").is_err());
        let err = parse_alias_presence("- a\n- b\n").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StrictDecode);
    }
}
