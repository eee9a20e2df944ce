//! Layered configuration for the xg2g gateway.
//!
//! Sources, lowest to highest precedence:
//! 1. **Defaults** - declared per field in the [`Registry`]
//! 2. **File** - one strictly decoded YAML document
//! 3. **Environment** - `XG2G_*` variables
//!
//! ## Aliases
//! Receiver settings exist under two names: the legacy `openWebIF.*` /
//! `XG2G_OWI_*` family and the canonical `enigma2.*` / `XG2G_E2_*` family.
//! Legacy values are applied first and canonical ones second. When both
//! are set and disagree the load fails instead of picking one.
//!
//! ## Environment Variables
//! - `XG2G_CONFIG` - config file path (the CLI's `--config` wins)
//! - `XG2G_DEPRECATIONS_FILE` - extra deprecation manifest
//! - every registered field's variable, see `xg2g-config registry`

mod auth;
mod conflict;
mod deprecation;
mod diff;
mod fields;
mod file;
mod holder;
mod loader;
mod merge_env;
mod merge_file;
mod paths;
mod presence;
mod registry;
mod scalar;
mod types;
mod validate;
pub mod watcher;

pub use auth::{AuthMode, resolve_auth_mode, validate_auth_inputs};
pub use conflict::{check_env_aliases, check_file_aliases, check_file_env_aliases, check_vod_conflicts};
pub use deprecation::{
    Deprecation, DeprecationManifest, MANIFEST_VERSION, Phase, REMOVED_ENV_KEYS,
    check_legacy_env_keys,
};
pub use diff::{ChangeSummary, FieldChange, diff};
pub use fields::{ConfigValue, FieldId, leaves};
pub use file::{FileConfig, decode_strict, read_config_file};
pub use holder::{ConfigHolder, ReloadEvent, Snapshot};
pub use loader::{
    AUXILIARY_ENV_KEYS, CONFIG_PATH_ENV, DEPRECATIONS_FILE_ENV, LoadOutcome, LoadStage, Loader,
    SENSITIVE_ENV_TOKENS, TrackedEnv, audit_env_usage,
};
pub use merge_env::{merge_env_config, parse_scoped_tokens, parse_tuner_slots};
pub use merge_file::{LegacyCredentials, merge_file_config};
pub use paths::{
    ENV_HLS_ROOT, ENV_LEGACY_HLS_ROOT, HLS_DIR, HlsResolution, HlsRootInputs, LEGACY_HLS_DIR,
    MIGRATION_MARKER, absolute_data_dir, clean_path, resolve_ffprobe_bin, resolve_hls_root,
};
pub use presence::{AliasPresence, CANONICAL_NAMESPACE, LEGACY_NAMESPACE, parse_alias_presence};
pub use registry::{
    HOT_RELOAD_ALLOWLIST, Profile, Registry, RegistryEntry, Status, builtin_entries,
};
pub use scalar::{
    DurationError, EnvSource, MapEnv, ProcessEnv, expand_env, format_duration, lookup_nonempty,
    parse_bool, parse_comma_separated, parse_duration, parse_float, parse_go_duration, parse_int,
    parse_string,
};
pub use types::*;
pub use validate::{HTTPS_WITHOUT_TLS, Validator, Violation, validate_config};
