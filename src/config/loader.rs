//! Load orchestration.
//!
//! [`Loader::load`] runs every stage in a fixed order and stops at the first
//! failure. Errors are wrapped with the [`LoadStage`] that produced them;
//! a failed load never hands out a partially merged config.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::auth::{resolve_auth_mode, validate_auth_inputs};
use super::conflict::{
    check_env_aliases, check_file_aliases, check_file_env_aliases, check_vod_conflicts,
};
use super::deprecation::{DeprecationManifest, check_legacy_env_keys};
use super::file::{FileConfig, decode_strict, read_config_file};
use super::merge_env::merge_env_config;
use super::merge_file::{LegacyCredentials, merge_file_config};
use super::paths::{
    ENV_HLS_ROOT, ENV_LEGACY_HLS_ROOT, HlsResolution, HlsRootInputs, absolute_data_dir,
    resolve_ffprobe_bin, resolve_hls_root,
};
use super::presence::{AliasPresence, parse_alias_presence};
use super::registry::Registry;
use super::scalar::{EnvSource, lookup_nonempty};
use super::types::AppConfig;
use super::validate::validate_config;
use crate::error::ConfigResult;

/// Env var naming the config file when no path is passed explicitly.
pub const CONFIG_PATH_ENV: &str = "XG2G_CONFIG";
/// Env var naming an external deprecation manifest.
pub const DEPRECATIONS_FILE_ENV: &str = "XG2G_DEPRECATIONS_FILE";

/// Variables read by the loader itself rather than by a config field.
pub const AUXILIARY_ENV_KEYS: &[&str] = &[CONFIG_PATH_ENV, DEPRECATIONS_FILE_ENV, ENV_LEGACY_HLS_ROOT];

/// Name fragments that mark an unknown variable as security relevant.
pub const SENSITIVE_ENV_TOKENS: &[&str] = &[
    "AUTH", "TOKEN", "PASS", "PASSWORD", "TLS", "HTTPS", "TRUST", "PROXY", "ORIGIN", "CORS",
];

/// Stages of a load, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadStage {
    CheckLegacyEnvKeys,
    ApplyDefaults,
    LoadFile,
    AliasConflicts,
    MergeFile,
    EnvAliasConflicts,
    MergeEnv,
    ResolvePaths,
    AuthMode,
    Deprecations,
    EnvUsage,
    Validate,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoadStage::CheckLegacyEnvKeys => "check legacy env keys",
            LoadStage::ApplyDefaults => "set defaults",
            LoadStage::LoadFile => "load config file",
            LoadStage::AliasConflicts => "alias conflict check",
            LoadStage::MergeFile => "merge file config",
            LoadStage::EnvAliasConflicts => "env alias conflict check",
            LoadStage::MergeEnv => "merge env config",
            LoadStage::ResolvePaths => "resolve derived paths",
            LoadStage::AuthMode => "e2 auth mode",
            LoadStage::Deprecations => "deprecation policy",
            LoadStage::EnvUsage => "env usage audit",
            LoadStage::Validate => "config validation failed",
        };
        f.write_str(label)
    }
}

/// Environment wrapper that records every key looked up through it.
pub struct TrackedEnv<'a> {
    inner: &'a dyn EnvSource,
    consumed: Mutex<BTreeSet<String>>,
}

impl<'a> TrackedEnv<'a> {
    pub fn new(inner: &'a dyn EnvSource) -> Self {
        Self {
            inner,
            consumed: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn consumed(&self) -> BTreeSet<String> {
        self.consumed
            .lock()
            .map(|set| set.clone())
            .unwrap_or_default()
    }
}

impl EnvSource for TrackedEnv<'_> {
    fn lookup(&self, key: &str) -> Option<String> {
        if let Ok(mut set) = self.consumed.lock() {
            set.insert(key.to_string());
        }
        self.inner.lookup(key)
    }

    fn environ(&self) -> Vec<String> {
        self.inner.environ()
    }
}

/// A successful load plus what it observed along the way.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub config: AppConfig,
    /// Every env key the stages looked up.
    pub consumed_env: BTreeSet<String>,
    /// `XG2G_*` variables nothing knew about.
    pub unknown_env: Vec<String>,
    pub hls: HlsResolution,
}

/// Resolves the effective configuration from defaults, file and env.
#[derive(Clone)]
pub struct Loader {
    registry: Arc<Registry>,
    env: Arc<dyn EnvSource>,
    config_path: Option<PathBuf>,
    deprecations_path: Option<PathBuf>,
    version: String,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("config_path", &self.config_path)
            .field("deprecations_path", &self.deprecations_path)
            .field("version", &self.version)
            .field("registry_entries", &self.registry.len())
            .finish()
    }
}

impl Loader {
    pub fn new(
        registry: Arc<Registry>,
        env: Arc<dyn EnvSource>,
        config_path: Option<PathBuf>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            env,
            config_path,
            deprecations_path: None,
            version: version.into(),
        }
    }

    /// Read extra deprecation entries from `path` on every load.
    pub fn with_deprecations(mut self, path: impl Into<PathBuf>) -> Self {
        self.deprecations_path = Some(path.into());
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn load(&self) -> ConfigResult<AppConfig> {
        self.load_with_outcome().map(|outcome| outcome.config)
    }

    pub fn load_with_outcome(&self) -> ConfigResult<LoadOutcome> {
        let env = TrackedEnv::new(self.env.as_ref());
        let registry = self.registry.as_ref();

        check_legacy_env_keys(&env).map_err(|e| e.context(LoadStage::CheckLegacyEnvKeys))?;

        let mut cfg = AppConfig::default();
        registry
            .apply_defaults(&mut cfg)
            .and_then(|_| registry.validate_field_coverage(&cfg))
            .map_err(|e| e.context(LoadStage::ApplyDefaults))?;

        let mut legacy = LegacyCredentials::default();
        let mut presence: Option<AliasPresence> = None;

        if let Some(path) = &self.config_path {
            let (file, file_presence) =
                load_file(path).map_err(|e| e.context(LoadStage::LoadFile))?;

            check_file_aliases(&file, &file_presence, &env)
                .and_then(|_| check_file_env_aliases(&file, &file_presence, &env))
                .and_then(|_| check_vod_conflicts(&file, &env))
                .map_err(|e| e.context(LoadStage::AliasConflicts))?;

            merge_file_config(&mut cfg, &file, &env, &mut legacy)
                .map_err(|e| e.context(LoadStage::MergeFile))?;
            debug!(path = %path.display(), "merged config file");
            presence = Some(file_presence);
        }

        check_env_aliases(&env).map_err(|e| e.context(LoadStage::EnvAliasConflicts))?;
        merge_env_config(&mut cfg, &env, &mut legacy)
            .map_err(|e| e.context(LoadStage::MergeEnv))?;

        let hls = resolve_paths(&mut cfg, &env).map_err(|e| e.context(LoadStage::ResolvePaths))?;

        let mode = validate_auth_inputs(&mut cfg.enigma2, &legacy)
            .map_err(|e| e.context(LoadStage::AuthMode))?;
        resolve_auth_mode(&mut cfg.enigma2, &legacy, mode);

        let manifest_path = self
            .deprecations_path
            .clone()
            .or_else(|| lookup_nonempty(&env, DEPRECATIONS_FILE_ENV).map(PathBuf::from));
        DeprecationManifest::load(manifest_path.as_deref())
            .and_then(|manifest| manifest.check(&env, presence.as_ref()))
            .map_err(|e| e.context(LoadStage::Deprecations))?;

        cfg.version = self.version.clone();

        let consumed_env = env.consumed();
        let unknown_env = audit_env_usage(registry, &env.environ(), &consumed_env, cfg.config_strict)
            .map_err(|e| e.context(LoadStage::EnvUsage))?;

        validate_config(&cfg).map_err(|e| e.context(LoadStage::Validate))?;

        let file = self
            .config_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        info!(
            file = %file,
            data_dir = %cfg.data_dir,
            hls_root = %cfg.hls.root,
            strict = cfg.config_strict,
            "configuration loaded"
        );

        Ok(LoadOutcome {
            config: cfg,
            consumed_env,
            unknown_env,
            hls,
        })
    }
}

/// Read, presence-scan and strictly decode the file at `path`.
fn load_file(path: &Path) -> ConfigResult<(FileConfig, AliasPresence)> {
    let raw = read_config_file(path)?;
    let presence = parse_alias_presence(&raw).map_err(|e| e.context("parse alias presence"))?;
    let file = decode_strict(&raw, &path.display().to_string())?;
    Ok((file, presence))
}

fn resolve_paths(cfg: &mut AppConfig, env: &dyn EnvSource) -> ConfigResult<HlsResolution> {
    cfg.ffmpeg.ffprobe_bin = resolve_ffprobe_bin(&cfg.ffmpeg.ffprobe_bin, &cfg.ffmpeg.bin);
    cfg.data_dir = absolute_data_dir(&cfg.data_dir)?;

    let env_root = env.lookup(ENV_HLS_ROOT).unwrap_or_default();
    let legacy_env_root = env.lookup(ENV_LEGACY_HLS_ROOT).unwrap_or_default();
    let res = resolve_hls_root(HlsRootInputs {
        data_dir: &cfg.data_dir,
        env_root: &env_root,
        legacy_env_root: &legacy_env_root,
        configured_root: &cfg.hls.root,
    })
    .map_err(|e| e.context("resolve hls root"))?;
    cfg.hls.root = res.root.to_string_lossy().into_owned();
    Ok(res)
}

fn is_sensitive_env_key(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    SENSITIVE_ENV_TOKENS.iter().any(|t| upper.contains(t))
}

/// Unknown `XG2G_*` variables in `environ`.
///
/// A sensitive-looking unknown key is fatal in strict mode; everything else
/// only warns.
pub fn audit_env_usage(
    registry: &Registry,
    environ: &[String],
    consumed: &BTreeSet<String>,
    strict: bool,
) -> ConfigResult<Vec<String>> {
    let mut unknown = Vec::new();
    for entry in environ {
        let key = entry.split_once('=').map_or(entry.as_str(), |(k, _)| k);
        if !key.starts_with("XG2G_")
            || consumed.contains(key)
            || registry.by_env(key).is_some()
            || AUXILIARY_ENV_KEYS.contains(&key)
        {
            continue;
        }
        if strict && is_sensitive_env_key(key) {
            return Err(crate::error::ConfigError::sensitive_unknown_key(key));
        }
        warn!(key, "unknown environment variable ignored");
        unknown.push(key.to_string());
    }
    unknown.sort();
    Ok(unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::scalar::MapEnv;
    use crate::error::ErrorKind;
    use std::time::Duration;
    use tempfile::TempDir;

    fn loader(dir: &TempDir, yaml: Option<&str>, env: MapEnv) -> Loader {
        let env = env.with("XG2G_DATA", dir.path().to_string_lossy().into_owned());
        let path = yaml.map(|body| {
            let path = dir.path().join("config.yaml");
            std::fs::write(&path, body).unwrap();
            path
        });
        Loader::new(Arc::new(Registry::build().unwrap()), Arc::new(env), path, "test-version")
    }

    #[test]
    fn test_defaults_only() {
        let dir = TempDir::new().unwrap();
        let cfg = loader(&dir, None, MapEnv::new()).load().unwrap();
        assert_eq!(cfg.version, "test-version");
        assert_eq!(cfg.enigma2.max_backoff, Duration::from_secs(30));
        assert_eq!(cfg.ffmpeg.ffprobe_bin, "ffprobe");
        assert_eq!(cfg.hls.root, dir.path().join("hls").to_string_lossy());
    }

    #[test]
    fn test_stage_is_named_in_error() {
        let dir = TempDir::new().unwrap();
        let err = loader(&dir, Some("epg:\n  timeout: 5s\n"), MapEnv::new())
            .load()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StrictDecode);
        assert!(err.to_string().starts_with("load config file: "));
    }

    #[test]
    fn test_legacy_env_key_checked_first() {
        let dir = TempDir::new().unwrap();
        let env = MapEnv::new().with("XG2G_STREAM_PROFILE", "auto");
        let err = loader(&dir, Some("bogus: [\n"), env).load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LegacyEnv);
    }

    #[test]
    fn test_consumed_keys_recorded() {
        let dir = TempDir::new().unwrap();
        let env = MapEnv::new().with("XG2G_E2_HOST", "http://box");
        let outcome = loader(&dir, None, env).load_with_outcome().unwrap();
        assert!(outcome.consumed_env.contains("XG2G_E2_HOST"));
        assert!(outcome.consumed_env.contains("XG2G_E2_MAX_BACKOFF"));
        assert!(outcome.unknown_env.is_empty());
    }

    #[test]
    fn test_unknown_env_keys() {
        let registry = Registry::build().unwrap();
        let consumed = BTreeSet::new();
        let environ = vec![
            "XG2G_MYSTERY=1".to_string(),
            "HOME=/root".to_string(),
            "XG2G_CONFIG=/etc/xg2g/config.yaml".to_string(),
        ];
        let unknown = audit_env_usage(&registry, &environ, &consumed, true).unwrap();
        assert_eq!(unknown, vec!["XG2G_MYSTERY".to_string()]);

        let environ = vec!["XG2G_TLS_MODE=strict".to_string()];
        let err = audit_env_usage(&registry, &environ, &consumed, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecuritySensitiveUnknownKey);
        assert!(err.to_string().contains("XG2G_TLS_MODE"));

        let unknown = audit_env_usage(&registry, &environ, &consumed, false).unwrap();
        assert_eq!(unknown.len(), 1);
    }

    #[test]
    fn test_auth_mode_stage() {
        let dir = TempDir::new().unwrap();
        let yaml = "openWebIF:\n  username: root\n  password: dreambox\n";
        let cfg = loader(&dir, Some(yaml), MapEnv::new()).load().unwrap();
        assert_eq!(cfg.enigma2.username, "root");
        assert_eq!(cfg.enigma2.password, "dreambox");

        let yaml = "enigma2:\n  authMode: none\n  username: root\n  password: x\n";
        let err = loader(&dir, Some(yaml), MapEnv::new()).load().unwrap_err();
        assert!(err.to_string().starts_with("e2 auth mode: "));
    }

    #[test]
    fn test_stage_order() {
        assert!(LoadStage::CheckLegacyEnvKeys < LoadStage::ApplyDefaults);
        assert!(LoadStage::MergeFile < LoadStage::EnvAliasConflicts);
        assert!(LoadStage::MergeEnv < LoadStage::ResolvePaths);
        assert!(LoadStage::Deprecations < LoadStage::Validate);
    }
}
