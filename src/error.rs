//! Structured error types for configuration loading.
//!
//! Every failure carries a closed [`ErrorKind`] so callers can branch on the
//! classification instead of inspecting message text.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Error kinds for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Build-time errors (code bug, not operator input)
    Registry,

    // Fail-closed input errors
    AliasConflict,
    StrictDecode,
    Deprecated,
    LegacyEnv,
    SecuritySensitiveUnknownKey,
    InvalidValue,

    // Post-merge business rules
    Validation,

    // Environment errors
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Registry => "REGISTRY",
            ErrorKind::AliasConflict => "ALIAS_CONFLICT",
            ErrorKind::StrictDecode => "STRICT_DECODE",
            ErrorKind::Deprecated => "DEPRECATED",
            ErrorKind::LegacyEnv => "LEGACY_ENV",
            ErrorKind::SecuritySensitiveUnknownKey => "SECURITY_SENSITIVE_UNKNOWN_KEY",
            ErrorKind::InvalidValue => "INVALID_VALUE",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Io => "IO",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured configuration error.
///
/// Cheap to clone so a failed registry build can be cached and handed to
/// every caller.
#[derive(Debug, Clone)]
pub struct ConfigError {
    kind: ErrorKind,
    message: String,
    field: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ConfigError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            source: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Prefix the message with the stage that surfaced the error.
    ///
    /// The kind and field are preserved.
    pub fn context(mut self, stage: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", stage, self.message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    // Convenience constructors

    pub fn registry(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Registry, message)
    }

    /// Two names for the same setting disagree.
    ///
    /// `hint` states which family to keep and which to remove.
    pub fn alias_conflict(legacy: &str, canonical: &str, hint: &str) -> Self {
        Self::new(
            ErrorKind::AliasConflict,
            format!(
                "{} conflicts with {} (compat alias). {}",
                legacy, canonical, hint
            ),
        )
        .with_field(canonical)
    }

    pub fn strict_decode(path: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::StrictDecode,
            format!("strict config parse error in {}: {}", path, reason),
        )
    }

    pub fn deprecated(key: &str, message: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Deprecated, format!("{}: {}", key, message)).with_field(key)
    }

    pub fn legacy_env(key: &str, replacement: &str) -> Self {
        Self::new(
            ErrorKind::LegacyEnv,
            format!(
                "legacy environment variable {} is no longer supported; use {} instead",
                key, replacement
            ),
        )
        .with_field(key)
    }

    pub fn sensitive_unknown_key(key: &str) -> Self {
        Self::new(
            ErrorKind::SecuritySensitiveUnknownKey,
            format!(
                "unknown security-sensitive environment variable {} (strict mode); remove it or fix the name",
                key
            ),
        )
        .with_field(key)
    }

    pub fn invalid_value(field: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorKind::InvalidValue, format!("invalid {}: {}", field, reason))
            .with_field(field)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn io(path: impl fmt::Display, err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("{}: {}", path, err)).with_source(err)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_kind_and_field() {
        let err = ConfigError::invalid_value("openWebIF.timeout", "bad duration")
            .context("merge file config");
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(err.field(), Some("openWebIF.timeout"));
        assert_eq!(
            err.to_string(),
            "merge file config: invalid openWebIF.timeout: bad duration"
        );
    }

    #[test]
    fn test_alias_conflict_names_both_keys() {
        let err = ConfigError::alias_conflict(
            "openWebIF.baseUrl",
            "enigma2.baseUrl",
            "Prefer enigma2.* and remove openWebIF.*",
        );
        let msg = err.to_string();
        assert!(msg.contains("openWebIF.baseUrl"));
        assert!(msg.contains("enigma2.baseUrl"));
        assert_eq!(err.kind(), ErrorKind::AliasConflict);
    }

    #[test]
    fn test_error_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::SecuritySensitiveUnknownKey).unwrap();
        assert_eq!(json, "\"SECURITY_SENSITIVE_UNKNOWN_KEY\"");
    }

    #[test]
    fn test_io_error_exposes_source() {
        use std::error::Error;
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ConfigError::io("/etc/xg2g/config.yaml", io);
        assert!(err.source().is_some());
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
