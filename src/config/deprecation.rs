//! Removed and deprecated keys.
//!
//! Two layers:
//! - [`check_legacy_env_keys`] fails fast on environment variables that
//!   were removed outright, before anything else is loaded.
//! - [`DeprecationManifest`] lists keys (env names or dotted file paths)
//!   with a phase: `warn` logs and continues, `fail` aborts the load.
//!
//! A built-in manifest is always active. An external manifest file can add
//! or override entries; a missing file is not an error.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use super::presence::AliasPresence;
use super::scalar::{EnvSource, lookup_nonempty};
use crate::error::{ConfigError, ConfigResult};

/// Only manifest version understood.
pub const MANIFEST_VERSION: u32 = 1;

/// Variables that no longer do anything, with their replacement.
pub const REMOVED_ENV_KEYS: &[(&str, &str)] = &[
    ("XG2G_V3_E2_HOST", "XG2G_E2_HOST"),
    ("XG2G_V3_E2_USER", "XG2G_E2_USER"),
    ("XG2G_V3_E2_PASS", "XG2G_E2_PASS"),
    ("XG2G_V3_CONFIG_STRICT", "XG2G_CONFIG_STRICT"),
    ("XG2G_V3_STORE_PATH", "XG2G_STORE_PATH"),
    ("XG2G_V3_FFMPEG_BIN", "XG2G_FFMPEG_BIN"),
    ("XG2G_STREAM_PROFILE", "XG2G_STREAMING_POLICY=universal"),
    ("XG2G_OWI_TIMEOUT", "XG2G_E2_TIMEOUT"),
];

/// Fail on any removed variable present in the environment snapshot.
pub fn check_legacy_env_keys(env: &dyn EnvSource) -> ConfigResult<()> {
    for entry in env.environ() {
        let key = entry.split_once('=').map_or(entry.as_str(), |(k, _)| k);
        if let Some((_, replacement)) = REMOVED_ENV_KEYS.iter().find(|(k, _)| *k == key) {
            return Err(ConfigError::legacy_env(key, replacement));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Deprecation {
    /// Env name (`XG2G_*`) or dotted file path; a trailing `*` matches a prefix.
    pub key: String,
    #[serde(default)]
    pub replacement: String,
    pub phase: Phase,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeprecationManifest {
    pub version: u32,
    #[serde(default)]
    pub deprecations: Vec<Deprecation>,
}

fn entry(key: &str, replacement: &str, phase: Phase, message: &str) -> Deprecation {
    Deprecation {
        key: key.to_string(),
        replacement: replacement.to_string(),
        phase,
        message: message.to_string(),
    }
}

impl Default for DeprecationManifest {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DeprecationManifest {
    pub fn builtin() -> Self {
        Self {
            version: MANIFEST_VERSION,
            deprecations: vec![
                entry(
                    "XG2G_STREAM_PORT",
                    "XG2G_E2_STREAM_PORT",
                    Phase::Warn,
                    "the flat stream port variable is a compatibility alias",
                ),
                entry(
                    "XG2G_OWI_*",
                    "XG2G_E2_*",
                    Phase::Warn,
                    "OpenWebIF variables are compatibility aliases",
                ),
                entry(
                    "openWebIF.*",
                    "enigma2.*",
                    Phase::Warn,
                    "the openWebIF block is a compatibility alias",
                ),
                entry(
                    "XG2G_HTTP_ENABLE_HTTP2",
                    "",
                    Phase::Fail,
                    "HTTP/2 is negotiated automatically",
                ),
            ],
        }
    }

    /// Built-in entries plus those of `path`, external entries winning on
    /// the same key.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut manifest = Self::builtin();
        let Some(path) = path else {
            return Ok(manifest);
        };
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no deprecation manifest, using built-in entries");
                return Ok(manifest);
            }
            Err(e) => return Err(ConfigError::io(path.display(), e)),
        };
        let external: DeprecationManifest = serde_yaml::from_str(&raw)
            .map_err(|e| ConfigError::strict_decode(path.display(), e))?;
        if external.version != MANIFEST_VERSION {
            return Err(ConfigError::strict_decode(
                path.display(),
                format!(
                    "unsupported deprecation manifest version {} (expected {})",
                    external.version, MANIFEST_VERSION
                ),
            ));
        }
        manifest.merge(external);
        Ok(manifest)
    }

    fn merge(&mut self, other: DeprecationManifest) {
        for dep in other.deprecations {
            match self.deprecations.iter_mut().find(|d| d.key == dep.key) {
                Some(existing) => *existing = dep,
                None => self.deprecations.push(dep),
            }
        }
    }

    /// Enforce every entry against the environment and the file's keys.
    pub fn check(&self, env: &dyn EnvSource, presence: Option<&AliasPresence>) -> ConfigResult<()> {
        for dep in &self.deprecations {
            let Some(found) = find_usage(&dep.key, env, presence) else {
                continue;
            };
            match dep.phase {
                Phase::Warn => warn!(
                    key = %found,
                    replacement = %dep.replacement,
                    message = %dep.message,
                    "deprecated configuration key in use"
                ),
                Phase::Fail => {
                    let mut text = String::from("was removed");
                    if !dep.replacement.is_empty() {
                        text.push_str(&format!("; use {} instead", dep.replacement));
                    }
                    if !dep.message.is_empty() {
                        text.push_str(&format!(" ({})", dep.message));
                    }
                    return Err(ConfigError::deprecated(&found, text));
                }
            }
        }
        Ok(())
    }
}

/// First concrete key matching `pattern`, if the pattern is in use.
fn find_usage(pattern: &str, env: &dyn EnvSource, presence: Option<&AliasPresence>) -> Option<String> {
    let is_env = pattern.starts_with("XG2G_");
    match (pattern.strip_suffix('*'), is_env) {
        (Some(prefix), true) => env
            .environ()
            .into_iter()
            .filter_map(|e| e.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
            .find(|(k, v)| k.starts_with(prefix) && !v.trim().is_empty())
            .map(|(k, _)| k),
        (None, true) => lookup_nonempty(env, pattern).map(|_| pattern.to_string()),
        (Some(prefix), false) => {
            let namespace = prefix.trim_end_matches('.');
            presence?
                .has_prefix(namespace)
                .then(|| format!("{}*", prefix))
        }
        (None, false) => presence?.has_path(pattern).then(|| pattern.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::presence::parse_alias_presence;
    use crate::config::scalar::MapEnv;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_removed_env_key_fails_with_replacement() {
        let env = MapEnv::new().with("XG2G_V3_E2_HOST", "http://box");
        let err = check_legacy_env_keys(&env).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LegacyEnv);
        assert!(err.to_string().contains("XG2G_V3_E2_HOST"));
        assert!(err.to_string().contains("XG2G_E2_HOST"));

        check_legacy_env_keys(&MapEnv::new().with("XG2G_E2_HOST", "x")).unwrap();
    }

    #[test]
    fn test_fail_phase_names_key_and_says_removed() {
        let env = MapEnv::new().with("XG2G_HTTP_ENABLE_HTTP2", "true");
        let err = DeprecationManifest::builtin().check(&env, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Deprecated);
        let msg = err.to_string();
        assert_eq!(msg.matches("XG2G_HTTP_ENABLE_HTTP2").count(), 1, "{}", msg);
        assert_eq!(
            msg,
            "XG2G_HTTP_ENABLE_HTTP2: was removed (HTTP/2 is negotiated automatically)"
        );
        assert_eq!(err.field(), Some("XG2G_HTTP_ENABLE_HTTP2"));
    }

    #[test]
    fn test_warn_phase_continues() {
        let env = MapEnv::new()
            .with("XG2G_STREAM_PORT", "8001")
            .with("XG2G_OWI_BASE", "http://box");
        let presence = parse_alias_presence("openWebIF:\n  baseUrl: http://box\n").unwrap();
        DeprecationManifest::builtin()
            .check(&env, Some(&presence))
            .unwrap();
    }

    #[test]
    fn test_file_path_entries() {
        let manifest = DeprecationManifest {
            version: 1,
            deprecations: vec![entry("epg.source", "", Phase::Fail, "")],
        };
        let presence = parse_alias_presence("epg:\n  source: bouquet\n").unwrap();
        let err = manifest.check(&MapEnv::new(), Some(&presence)).unwrap_err();
        assert!(err.to_string().contains("epg.source: was removed"));
        manifest.check(&MapEnv::new(), None).unwrap();
    }

    #[test]
    fn test_missing_external_manifest_is_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let manifest = DeprecationManifest::load(Some(&dir.path().join("absent.yaml"))).unwrap();
        assert_eq!(manifest, DeprecationManifest::builtin());
    }

    #[test]
    fn test_external_manifest_overrides_builtin() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deprecations.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(
            b"version: 1\ndeprecations:\n  - key: XG2G_STREAM_PORT\n    phase: fail\n    replacement: XG2G_E2_STREAM_PORT\n",
        )
        .unwrap();
        let manifest = DeprecationManifest::load(Some(&path)).unwrap();
        let env = MapEnv::new().with("XG2G_STREAM_PORT", "8001");
        let err = manifest.check(&env, None).unwrap_err();
        assert!(err.to_string().contains("use XG2G_E2_STREAM_PORT instead"));
    }

    #[test]
    fn test_external_manifest_version_checked() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deprecations.yaml");
        std::fs::write(&path, "version: 2\ndeprecations: []\n").unwrap();
        let err = DeprecationManifest::load(Some(&path)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StrictDecode);
    }
}
