//! Fail-closed conflict detection between aliased sources.
//!
//! The receiver settings can be written four ways: `openWebIF.*` and
//! `enigma2.*` in the file, `XG2G_OWI_*` and `XG2G_E2_*` in the environment.
//! Any two of them that are both set must agree. The typed `vod` block
//! likewise must agree with the flat `XG2G_VOD_*` variables it replaced.
//!
//! All checks run before anything is merged. Matching values pass silently.

use std::time::Duration;

use super::file::{Enigma2File, FileConfig, OpenWebIfFile, VodFile};
use super::presence::AliasPresence;
use super::scalar::{EnvSource, expand_env, lookup_nonempty, parse_bool_str, parse_go_duration};
use crate::error::{ConfigError, ConfigResult};

const RECEIVER_HINT: &str =
    "Prefer enigma2.* / XG2G_E2_* and remove openWebIF.* / XG2G_OWI_*";
const VOD_HINT: &str = "Keep the typed vod.* block and remove the flat XG2G_VOD_* variable";

/// How two spellings of a value are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Duration,
    Int,
    Bool,
}

/// One setting addressable through both receiver namespaces.
struct ReceiverAlias {
    key: &'static str,
    kind: Kind,
    canonical_env: &'static str,
    legacy_env: &'static str,
    /// Legacy variable holds integer milliseconds.
    legacy_millis: bool,
}

const RECEIVER_ALIASES: &[ReceiverAlias] = &[
    ReceiverAlias {
        key: "baseUrl",
        kind: Kind::Text,
        canonical_env: "XG2G_E2_HOST",
        legacy_env: "XG2G_OWI_BASE",
        legacy_millis: false,
    },
    ReceiverAlias {
        key: "username",
        kind: Kind::Text,
        canonical_env: "XG2G_E2_USER",
        legacy_env: "XG2G_OWI_USER",
        legacy_millis: false,
    },
    ReceiverAlias {
        key: "password",
        kind: Kind::Text,
        canonical_env: "XG2G_E2_PASS",
        legacy_env: "XG2G_OWI_PASS",
        legacy_millis: false,
    },
    ReceiverAlias {
        key: "timeout",
        kind: Kind::Duration,
        canonical_env: "XG2G_E2_TIMEOUT",
        legacy_env: "XG2G_OWI_TIMEOUT_MS",
        legacy_millis: true,
    },
    ReceiverAlias {
        key: "retries",
        kind: Kind::Int,
        canonical_env: "XG2G_E2_RETRIES",
        legacy_env: "XG2G_OWI_RETRIES",
        legacy_millis: false,
    },
    ReceiverAlias {
        key: "backoff",
        kind: Kind::Duration,
        canonical_env: "XG2G_E2_BACKOFF",
        legacy_env: "XG2G_OWI_BACKOFF_MS",
        legacy_millis: true,
    },
    ReceiverAlias {
        key: "maxBackoff",
        kind: Kind::Duration,
        canonical_env: "XG2G_E2_MAX_BACKOFF",
        legacy_env: "XG2G_OWI_MAX_BACKOFF_MS",
        legacy_millis: true,
    },
    ReceiverAlias {
        key: "streamPort",
        kind: Kind::Int,
        canonical_env: "XG2G_E2_STREAM_PORT",
        legacy_env: "XG2G_STREAM_PORT",
        legacy_millis: false,
    },
    ReceiverAlias {
        key: "useWebIFStreams",
        kind: Kind::Bool,
        canonical_env: "XG2G_E2_USE_WEBIF_STREAMS",
        legacy_env: "XG2G_USE_WEBIF_STREAMS",
        legacy_millis: false,
    },
];

/// A value as written in the file.
#[derive(Debug, Clone, PartialEq)]
enum FileValue {
    Text(Option<String>),
    Int(Option<i64>),
    Bool(Option<bool>),
}

/// A value read from the environment, already typed.
#[derive(Debug, Clone, PartialEq)]
enum EnvValue {
    Text(String),
    Duration(Duration),
    Int(i64),
    Bool(bool),
}

fn legacy_file_value(src: &OpenWebIfFile, key: &str) -> Option<FileValue> {
    Some(match key {
        "baseUrl" => FileValue::Text(src.base_url.clone()),
        "username" => FileValue::Text(src.username.clone()),
        "password" => FileValue::Text(src.password.clone()),
        "timeout" => FileValue::Text(src.timeout.clone()),
        "retries" => FileValue::Int(src.retries),
        "backoff" => FileValue::Text(src.backoff.clone()),
        "maxBackoff" => FileValue::Text(src.max_backoff.clone()),
        "streamPort" => FileValue::Int(src.stream_port),
        "useWebIFStreams" => FileValue::Bool(src.use_webif_streams),
        _ => return None,
    })
}

fn canonical_file_value(src: &Enigma2File, key: &str) -> Option<FileValue> {
    Some(match key {
        "baseUrl" => FileValue::Text(src.base_url.clone()),
        "username" => FileValue::Text(src.username.clone()),
        "password" => FileValue::Text(src.password.clone()),
        "timeout" => FileValue::Text(src.timeout.clone()),
        "retries" => FileValue::Int(src.retries),
        "backoff" => FileValue::Text(src.backoff.clone()),
        "maxBackoff" => FileValue::Text(src.max_backoff.clone()),
        "streamPort" => FileValue::Int(src.stream_port),
        "useWebIFStreams" => FileValue::Bool(src.use_webif_streams),
        _ => return None,
    })
}

/// Typed read of an alias variable. Blank or unparseable counts as unset.
fn env_value(env: &dyn EnvSource, key: &str, kind: Kind, millis: bool) -> Option<EnvValue> {
    let raw = lookup_nonempty(env, key)?;
    let raw = raw.trim();
    match kind {
        Kind::Text => Some(EnvValue::Text(raw.to_string())),
        Kind::Duration if millis => raw
            .parse::<u64>()
            .ok()
            .map(|ms| EnvValue::Duration(Duration::from_millis(ms))),
        Kind::Duration => parse_go_duration(raw).ok().map(EnvValue::Duration),
        Kind::Int => raw.parse::<i64>().ok().map(EnvValue::Int),
        Kind::Bool => parse_bool_str(raw).map(EnvValue::Bool),
    }
}

fn normalized(env: &dyn EnvSource, value: &str) -> String {
    expand_env(env, value).trim().to_string()
}

fn equal_text(env: &dyn EnvSource, a: &str, b: &str) -> bool {
    normalized(env, a) == normalized(env, b)
}

/// Both blank is equal; both parse as durations compares durations;
/// otherwise the trimmed text decides.
fn equal_duration_text(env: &dyn EnvSource, a: &str, b: &str) -> bool {
    let a = normalized(env, a);
    let b = normalized(env, b);
    if a.is_empty() && b.is_empty() {
        return true;
    }
    match (parse_go_duration(&a), parse_go_duration(&b)) {
        (Ok(da), Ok(db)) => da == db,
        _ => a == b,
    }
}

/// File duration text against a typed env duration. Blank file text is zero;
/// file text that does not parse is left for the merge stage to reject.
fn equal_duration_env(env: &dyn EnvSource, file: &str, value: Duration) -> bool {
    let text = normalized(env, file);
    if text.is_empty() {
        return value.is_zero();
    }
    match parse_go_duration(&text) {
        Ok(d) => d == value,
        Err(_) => true,
    }
}

fn file_pair_equal(env: &dyn EnvSource, kind: Kind, a: &FileValue, b: &FileValue) -> bool {
    match (a, b) {
        (FileValue::Text(a), FileValue::Text(b)) => {
            let a = a.as_deref().unwrap_or_default();
            let b = b.as_deref().unwrap_or_default();
            if kind == Kind::Duration {
                equal_duration_text(env, a, b)
            } else {
                equal_text(env, a, b)
            }
        }
        (FileValue::Int(a), FileValue::Int(b)) => a == b,
        (FileValue::Bool(a), FileValue::Bool(b)) => a == b,
        _ => false,
    }
}

fn file_env_equal(env: &dyn EnvSource, kind: Kind, file: &FileValue, value: &EnvValue) -> bool {
    match (file, value) {
        (FileValue::Text(text), EnvValue::Text(v)) => {
            equal_text(env, text.as_deref().unwrap_or_default(), v)
        }
        (FileValue::Text(text), EnvValue::Duration(d)) if kind == Kind::Duration => {
            equal_duration_env(env, text.as_deref().unwrap_or_default(), *d)
        }
        (FileValue::Int(i), EnvValue::Int(v)) => *i == Some(*v),
        (FileValue::Bool(b), EnvValue::Bool(v)) => *b == Some(*v),
        _ => false,
    }
}

fn env_pair_equal(env: &dyn EnvSource, a: &EnvValue, b: &EnvValue) -> bool {
    match (a, b) {
        (EnvValue::Text(a), EnvValue::Text(b)) => equal_text(env, a, b),
        _ => a == b,
    }
}

/// `openWebIF.X` against `enigma2.X` in the same file.
pub fn check_file_aliases(
    src: &FileConfig,
    presence: &AliasPresence,
    env: &dyn EnvSource,
) -> ConfigResult<()> {
    let (Some(legacy), Some(canonical)) = (&src.open_webif, &src.enigma2) else {
        return Ok(());
    };
    for alias in RECEIVER_ALIASES {
        if !presence.legacy(alias.key) || !presence.canonical(alias.key) {
            continue;
        }
        let (Some(a), Some(b)) = (
            legacy_file_value(legacy, alias.key),
            canonical_file_value(canonical, alias.key),
        ) else {
            continue;
        };
        if !file_pair_equal(env, alias.kind, &a, &b) {
            return Err(ConfigError::alias_conflict(
                &format!("openWebIF.{}", alias.key),
                &format!("enigma2.{}", alias.key),
                RECEIVER_HINT,
            ));
        }
    }
    Ok(())
}

/// A file key in one namespace against the other namespace's variable.
pub fn check_file_env_aliases(
    src: &FileConfig,
    presence: &AliasPresence,
    env: &dyn EnvSource,
) -> ConfigResult<()> {
    for alias in RECEIVER_ALIASES {
        if let Some(legacy) = &src.open_webif
            && presence.legacy(alias.key)
            && let Some(file) = legacy_file_value(legacy, alias.key)
            && let Some(value) = env_value(env, alias.canonical_env, alias.kind, false)
            && !file_env_equal(env, alias.kind, &file, &value)
        {
            return Err(ConfigError::alias_conflict(
                &format!("openWebIF.{}", alias.key),
                alias.canonical_env,
                RECEIVER_HINT,
            ));
        }

        if let Some(canonical) = &src.enigma2
            && presence.canonical(alias.key)
            && let Some(file) = canonical_file_value(canonical, alias.key)
            && let Some(value) = env_value(env, alias.legacy_env, alias.kind, alias.legacy_millis)
            && !file_env_equal(env, alias.kind, &file, &value)
        {
            return Err(ConfigError::alias_conflict(
                alias.legacy_env,
                &format!("enigma2.{}", alias.key),
                RECEIVER_HINT,
            ));
        }
    }
    Ok(())
}

/// Legacy variable against canonical variable, independent of any file.
pub fn check_env_aliases(env: &dyn EnvSource) -> ConfigResult<()> {
    for alias in RECEIVER_ALIASES {
        let Some(legacy) = env_value(env, alias.legacy_env, alias.kind, alias.legacy_millis) else {
            continue;
        };
        let Some(canonical) = env_value(env, alias.canonical_env, alias.kind, false) else {
            continue;
        };
        if !env_pair_equal(env, &legacy, &canonical) {
            return Err(ConfigError::alias_conflict(
                alias.legacy_env,
                alias.canonical_env,
                RECEIVER_HINT,
            ));
        }
    }
    Ok(())
}

/// Typed `vod.*` file values against the flat `XG2G_VOD_*` variables.
pub fn check_vod_conflicts(src: &FileConfig, env: &dyn EnvSource) -> ConfigResult<()> {
    let Some(vod) = &src.vod else {
        return Ok(());
    };
    let VodFile {
        probe_size,
        analyze_duration,
        stall_timeout,
        max_concurrent,
        cache_ttl,
        cache_max_entries,
    } = vod;

    let checks: [(&str, &str, Kind, Option<FileValue>); 6] = [
        (
            "vod.probeSize",
            "XG2G_VOD_PROBE_SIZE",
            Kind::Text,
            probe_size.clone().map(|v| FileValue::Text(Some(v))),
        ),
        (
            "vod.analyzeDuration",
            "XG2G_VOD_ANALYZE_DURATION",
            Kind::Text,
            analyze_duration.clone().map(|v| FileValue::Text(Some(v))),
        ),
        (
            "vod.stallTimeout",
            "XG2G_VOD_STALL_TIMEOUT",
            Kind::Duration,
            stall_timeout.clone().map(|v| FileValue::Text(Some(v))),
        ),
        (
            "vod.maxConcurrent",
            "XG2G_VOD_MAX_CONCURRENT",
            Kind::Int,
            max_concurrent.map(|v| FileValue::Int(Some(v))),
        ),
        (
            "vod.cacheTTL",
            "XG2G_VOD_CACHE_TTL",
            Kind::Duration,
            cache_ttl.clone().map(|v| FileValue::Text(Some(v))),
        ),
        (
            "vod.cacheMaxEntries",
            "XG2G_VOD_CACHE_MAX_ENTRIES",
            Kind::Int,
            cache_max_entries.map(|v| FileValue::Int(Some(v))),
        ),
    ];

    for (path, env_key, kind, file) in checks {
        let Some(file) = file else { continue };
        let Some(value) = env_value(env, env_key, kind, false) else {
            continue;
        };
        if !file_env_equal(env, kind, &file, &value) {
            return Err(ConfigError::alias_conflict(env_key, path, VOD_HINT));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::decode_strict;
    use crate::config::presence::parse_alias_presence;
    use crate::config::scalar::MapEnv;
    use crate::error::ErrorKind;

    fn load(raw: &str) -> (FileConfig, AliasPresence) {
        (
            decode_strict(raw, "test.yaml").unwrap(),
            parse_alias_presence(raw).unwrap(),
        )
    }

    #[test]
    fn test_equal_file_aliases_pass() {
        let (src, presence) = load(
            "openWebIF:\n  baseUrl: http://box \nenigma2:\n  baseUrl: http://box\n",
        );
        check_file_aliases(&src, &presence, &MapEnv::new()).unwrap();
    }

    #[test]
    fn test_differing_file_aliases_fail() {
        let (src, presence) = load(
            "openWebIF:\n  baseUrl: http://old\nenigma2:\n  baseUrl: http://new\n",
        );
        let err = check_file_aliases(&src, &presence, &MapEnv::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AliasConflict);
        assert!(err.to_string().contains("openWebIF.baseUrl"));
        assert!(err.to_string().contains("enigma2.baseUrl"));
    }

    #[test]
    fn test_durations_compare_by_value() {
        let (src, presence) =
            load("openWebIF:\n  timeout: 1000ms\nenigma2:\n  timeout: 1s\n");
        check_file_aliases(&src, &presence, &MapEnv::new()).unwrap();

        let (src, presence) = load("openWebIF:\n  timeout: 2s\nenigma2:\n  timeout: 1s\n");
        assert!(check_file_aliases(&src, &presence, &MapEnv::new()).is_err());
    }

    #[test]
    fn test_explicit_false_alias_conflicts_with_true() {
        let (src, presence) = load(
            "openWebIF:\n  useWebIFStreams: false\nenigma2:\n  useWebIFStreams: true\n",
        );
        assert!(check_file_aliases(&src, &presence, &MapEnv::new()).is_err());
    }

    #[test]
    fn test_env_references_expand_before_comparing() {
        let env = MapEnv::new().with("BOX", "http://box");
        let (src, presence) =
            load("openWebIF:\n  baseUrl: ${BOX}\nenigma2:\n  baseUrl: http://box\n");
        check_file_aliases(&src, &presence, &env).unwrap();
    }

    #[test]
    fn test_legacy_file_key_against_canonical_env() {
        let (src, presence) = load("openWebIF:\n  baseUrl: http://file\n");
        let env = MapEnv::new().with("XG2G_E2_HOST", "http://env");
        let err = check_file_env_aliases(&src, &presence, &env).unwrap_err();
        assert!(err.to_string().contains("openWebIF.baseUrl"));
        assert!(err.to_string().contains("XG2G_E2_HOST"));

        let env = MapEnv::new().with("XG2G_E2_HOST", "http://file");
        check_file_env_aliases(&src, &presence, &env).unwrap();
    }

    #[test]
    fn test_canonical_file_key_against_legacy_millis_env() {
        let (src, presence) = load("enigma2:\n  maxBackoff: 30s\n");
        let env = MapEnv::new().with("XG2G_OWI_MAX_BACKOFF_MS", "30000");
        check_file_env_aliases(&src, &presence, &env).unwrap();

        let env = MapEnv::new().with("XG2G_OWI_MAX_BACKOFF_MS", "5000");
        let err = check_file_env_aliases(&src, &presence, &env).unwrap_err();
        assert!(err.to_string().contains("XG2G_OWI_MAX_BACKOFF_MS"));
        assert!(err.to_string().contains("enigma2.maxBackoff"));
    }

    #[test]
    fn test_env_to_env_conflicts() {
        let env = MapEnv::new()
            .with("XG2G_OWI_TIMEOUT_MS", "2000")
            .with("XG2G_E2_TIMEOUT", "2s");
        check_env_aliases(&env).unwrap();

        let env = MapEnv::new()
            .with("XG2G_OWI_USER", "alice")
            .with("XG2G_E2_USER", "bob");
        let err = check_env_aliases(&env).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AliasConflict);
        assert!(err.to_string().contains("XG2G_OWI_USER"));
        assert!(err.to_string().contains("XG2G_E2_USER"));
    }

    #[test]
    fn test_unparseable_env_counts_as_unset() {
        let env = MapEnv::new()
            .with("XG2G_OWI_RETRIES", "many")
            .with("XG2G_E2_RETRIES", "3");
        check_env_aliases(&env).unwrap();
    }

    #[test]
    fn test_vod_typed_vs_flat_env() {
        let (src, _) = load("vod:\n  maxConcurrent: 4\n  stallTimeout: 1m\n");
        let env = MapEnv::new()
            .with("XG2G_VOD_MAX_CONCURRENT", "4")
            .with("XG2G_VOD_STALL_TIMEOUT", "60s");
        check_vod_conflicts(&src, &env).unwrap();

        let env = MapEnv::new().with("XG2G_VOD_MAX_CONCURRENT", "8");
        let err = check_vod_conflicts(&src, &env).unwrap_err();
        assert!(err.to_string().contains("vod.maxConcurrent"));
        assert!(err.to_string().contains("XG2G_VOD_MAX_CONCURRENT"));
    }
}
