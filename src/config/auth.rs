//! Receiver credential mode.
//!
//! `enigma2.authMode` decides how the legacy `openWebIF` credentials relate
//! to the canonical pair:
//! - `inherit`: legacy credentials fill an empty canonical pair
//! - `none`: no receiver credentials at all
//! - `explicit`: only the canonical pair counts, legacy ones are ignored

use super::merge_file::LegacyCredentials;
use super::types::Enigma2Settings;
use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Inherit,
    None,
    Explicit,
}

impl AuthMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMode::Inherit => "inherit",
            AuthMode::None => "none",
            AuthMode::Explicit => "explicit",
        }
    }
}

impl std::str::FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "inherit" => Ok(AuthMode::Inherit),
            "none" => Ok(AuthMode::None),
            "explicit" => Ok(AuthMode::Explicit),
            other => Err(ConfigError::invalid_value(
                "enigma2.authMode",
                format!("{:?} (expected inherit, none or explicit)", other),
            )),
        }
    }
}

fn check_pair(field: &str, username: &str, password: &str) -> ConfigResult<()> {
    if username.is_empty() != password.is_empty() {
        return Err(ConfigError::invalid_value(
            field,
            "username and password must be set together",
        ));
    }
    Ok(())
}

/// Normalize the mode in place and reject inconsistent credential inputs.
pub fn validate_auth_inputs(
    e2: &mut Enigma2Settings,
    legacy: &LegacyCredentials,
) -> ConfigResult<AuthMode> {
    let mode: AuthMode = e2.auth_mode.parse()?;
    e2.auth_mode = mode.as_str().to_string();

    check_pair("enigma2.username", &e2.username, &e2.password)?;
    check_pair("openWebIF.username", &legacy.username, &legacy.password)?;

    if mode == AuthMode::None && (!e2.username.is_empty() || !e2.password.is_empty()) {
        return Err(ConfigError::invalid_value(
            "enigma2.authMode",
            "authMode none forbids enigma2 credentials",
        ));
    }
    Ok(mode)
}

/// Settle the canonical credential pair for `mode`.
pub fn resolve_auth_mode(e2: &mut Enigma2Settings, legacy: &LegacyCredentials, mode: AuthMode) {
    match mode {
        AuthMode::Inherit => {
            if e2.username.is_empty() && e2.password.is_empty() && !legacy.is_empty() {
                e2.username = legacy.username.clone();
                e2.password = legacy.password.clone();
            }
        }
        AuthMode::None => {
            e2.username.clear();
            e2.password.clear();
        }
        AuthMode::Explicit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn settings(mode: &str, user: &str, pass: &str) -> Enigma2Settings {
        Enigma2Settings {
            auth_mode: mode.to_string(),
            username: user.to_string(),
            password: pass.to_string(),
            ..Default::default()
        }
    }

    fn legacy(user: &str, pass: &str) -> LegacyCredentials {
        LegacyCredentials {
            username: user.to_string(),
            password: pass.to_string(),
        }
    }

    fn run(
        e2: &mut Enigma2Settings,
        legacy: &LegacyCredentials,
    ) -> ConfigResult<()> {
        let mode = validate_auth_inputs(e2, legacy)?;
        resolve_auth_mode(e2, legacy, mode);
        Ok(())
    }

    #[test]
    fn test_inherit_copies_legacy_into_empty_pair() {
        let mut e2 = settings("inherit", "", "");
        run(&mut e2, &legacy("owi", "secret")).unwrap();
        assert_eq!(e2.username, "owi");
        assert_eq!(e2.password, "secret");
    }

    #[test]
    fn test_inherit_keeps_canonical_pair() {
        let mut e2 = settings("inherit", "e2", "pw");
        run(&mut e2, &legacy("owi", "secret")).unwrap();
        assert_eq!(e2.username, "e2");
    }

    #[test]
    fn test_none_forbids_canonical_credentials() {
        let mut e2 = settings("none", "e2", "pw");
        let err = run(&mut e2, &LegacyCredentials::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let mut e2 = settings("none", "", "");
        run(&mut e2, &legacy("owi", "secret")).unwrap();
        assert!(e2.username.is_empty());
        assert!(e2.password.is_empty());
    }

    #[test]
    fn test_explicit_ignores_legacy() {
        let mut e2 = settings("explicit", "", "");
        run(&mut e2, &legacy("owi", "secret")).unwrap();
        assert!(e2.username.is_empty());

        let mut e2 = settings("explicit", "e2", "");
        assert!(run(&mut e2, &LegacyCredentials::default()).is_err());
    }

    #[test]
    fn test_partial_legacy_pair_fails() {
        let mut e2 = settings("inherit", "", "");
        let err = run(&mut e2, &legacy("owi", "")).unwrap_err();
        assert_eq!(err.field(), Some("openWebIF.username"));
    }

    #[test]
    fn test_mode_is_normalized() {
        for (raw, want) in [("INHERIT", "inherit"), (" none ", "none"), ("\texplicit\t", "explicit"), ("", "inherit")] {
            let mut e2 = settings(raw, "", "");
            validate_auth_inputs(&mut e2, &LegacyCredentials::default()).unwrap();
            assert_eq!(e2.auth_mode, want);
        }
        let mut e2 = settings("sometimes", "", "");
        assert!(validate_auth_inputs(&mut e2, &LegacyCredentials::default()).is_err());
    }
}
