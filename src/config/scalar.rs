//! Typed scalar readers over an injectable environment.
//!
//! Every reader follows the same fail-open policy:
//! - key absent, empty or whitespace-only: return the default
//! - key present but unparseable: log a warning and return the default
//!
//! Durations use the Go-style grammar (`500ms`, `1m30s`, `6h`, bare `0`).

use regex_lite::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Key/value lookup plus a full snapshot of the environment.
///
/// Production code uses [`ProcessEnv`]; tests inject a [`MapEnv`].
pub trait EnvSource: Send + Sync {
    /// Raw value for `key`, `None` when the key is absent.
    fn lookup(&self, key: &str) -> Option<String>;

    /// Every variable as a `KEY=VALUE` string.
    fn environ(&self) -> Vec<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn environ(&self) -> Vec<String> {
        std::env::vars().map(|(k, v)| format!("{}={}", k, v)).collect()
    }
}

/// In-memory environment, mainly for tests and embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) {
        self.vars.remove(key);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn environ(&self) -> Vec<String> {
        self.vars
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}

/// Value for `key` if it is present and not blank.
pub fn lookup_nonempty(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.lookup(key).filter(|v| !v.trim().is_empty())
}

const ENV_REFERENCE: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)";

/// Compile `pattern` once into `slot`.
fn cached(slot: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    slot.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn env_reference_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, ENV_REFERENCE)
}

/// Expand `${VAR}` and `$VAR` references; unknown variables expand to "".
pub fn expand_env(env: &dyn EnvSource, input: &str) -> String {
    if !input.contains('$') {
        return input.to_string();
    }
    let Some(re) = env_reference_re() else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &regex_lite::Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        env.lookup(name).unwrap_or_default()
    })
    .into_owned()
}

fn looks_secret(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.contains("token") || lower.contains("pass")
}

/// Read a string, falling back to `default` when absent or blank.
pub fn parse_string(env: &dyn EnvSource, key: &str, default: &str) -> String {
    match lookup_nonempty(env, key) {
        Some(value) => {
            if looks_secret(key) {
                debug!(key, sensitive = true, "using environment variable");
            } else {
                debug!(key, value = %value, "using environment variable");
            }
            value
        }
        None => default.to_string(),
    }
}

/// Read an integer; invalid input warns and yields `default`.
pub fn parse_int(env: &dyn EnvSource, key: &str, default: i64) -> i64 {
    let Some(raw) = lookup_nonempty(env, key) else {
        return default;
    };
    match raw.trim().parse::<i64>() {
        Ok(v) => {
            debug!(key, value = v, "using environment variable");
            v
        }
        Err(_) => {
            warn!(
                key,
                value = %raw,
                default,
                "invalid integer in environment variable, using default"
            );
            default
        }
    }
}

/// Parse the accepted boolean spellings (case-insensitive).
pub fn parse_bool_str(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Read a boolean: `true/1/yes` and `false/0/no`, case-insensitive.
pub fn parse_bool(env: &dyn EnvSource, key: &str, default: bool) -> bool {
    let Some(raw) = lookup_nonempty(env, key) else {
        return default;
    };
    match parse_bool_str(&raw) {
        Some(v) => {
            debug!(key, value = v, "using environment variable");
            v
        }
        None => {
            warn!(
                key,
                value = %raw,
                default,
                "invalid boolean in environment variable, using default"
            );
            default
        }
    }
}

/// Read a Go-style duration; invalid input warns and yields `default`.
pub fn parse_duration(env: &dyn EnvSource, key: &str, default: Duration) -> Duration {
    let Some(raw) = lookup_nonempty(env, key) else {
        return default;
    };
    match parse_go_duration(&raw) {
        Ok(d) => {
            debug!(key, value = %format_duration(d), "using environment variable");
            d
        }
        Err(_) => {
            warn!(
                key,
                value = %raw,
                default = %format_duration(default),
                "invalid duration in environment variable, using default"
            );
            default
        }
    }
}

/// Read a float; invalid or non-finite input warns and yields `default`.
pub fn parse_float(env: &dyn EnvSource, key: &str, default: f64) -> f64 {
    let Some(raw) = lookup_nonempty(env, key) else {
        return default;
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => {
            debug!(key, value = v, "using environment variable");
            v
        }
        _ => {
            warn!(
                key,
                value = %raw,
                default,
                "invalid float in environment variable, using default"
            );
            default
        }
    }
}

/// Split on commas, trim each segment, drop empty segments.
pub fn parse_comma_separated(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comma-separated integers; bad segments are skipped with a warning.
pub fn parse_comma_separated_ints(key: &str, raw: &str) -> Vec<i64> {
    parse_comma_separated(raw)
        .into_iter()
        .filter_map(|segment| match segment.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(key, value = %segment, "ignoring invalid integer list entry");
                None
            }
        })
        .collect()
}

/// Errors from [`parse_go_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("negative duration {0:?}")]
    Negative(String),
    #[error("invalid duration {0:?}")]
    Invalid(String),
}

const DURATION_PATTERN: &str = r"^(?:(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:ns|us|µs|μs|ms|s|m|h))+$";
const DURATION_PART: &str = r"([0-9]+(?:\.[0-9]*)?|\.[0-9]+)(ns|us|µs|μs|ms|s|m|h)";

fn duration_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, DURATION_PATTERN)
}

fn duration_part_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, DURATION_PART)
}

fn unit_nanos(unit: &str) -> f64 {
    match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        "m" => 60.0 * 1_000_000_000.0,
        _ => 3_600.0 * 1_000_000_000.0,
    }
}

/// Parse a Go-style duration string such as `1h30m`, `250ms` or `0`.
pub fn parse_go_duration(raw: &str) -> Result<Duration, DurationError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    if s.starts_with('-') {
        return Err(DurationError::Negative(s.to_string()));
    }
    let s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || DurationError::Invalid(raw.to_string());
    let whole = duration_re().ok_or_else(invalid)?;
    if !whole.is_match(s) {
        return Err(invalid());
    }
    let part = duration_part_re().ok_or_else(invalid)?;

    let mut nanos = 0f64;
    for caps in part.captures_iter(s) {
        let number: f64 = caps[1].parse().map_err(|_| invalid())?;
        nanos += number * unit_nanos(&caps[2]);
    }
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

fn trim_fraction(whole: u128, frac: u128, width: usize) -> String {
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Render a duration the way Go prints one (`1h0m0s`, `1m30s`, `200ms`).
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", trim_fraction(nanos / 1_000, nanos % 1_000, 3));
    }
    if nanos < 1_000_000_000 {
        return format!(
            "{}ms",
            trim_fraction(nanos / 1_000_000, nanos % 1_000_000, 6)
        );
    }

    let total_secs = nanos / 1_000_000_000;
    let sub = nanos % 1_000_000_000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = trim_fraction(total_secs % 60, sub, 9);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
