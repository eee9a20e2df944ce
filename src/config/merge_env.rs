//! Environment merge stage.
//!
//! Runs after the file merge and wins over it whenever a variable is set
//! and non-blank. For settings with two names the legacy variable is
//! applied first and the canonical one re-applied afterwards, so canonical
//! wins. Scalar parse failures warn and keep the current value; malformed
//! scoped tokens fail the load.

use std::collections::HashSet;
use std::sync::Once;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use super::merge_file::LegacyCredentials;
use super::scalar::{
    EnvSource, lookup_nonempty, parse_bool, parse_comma_separated, parse_comma_separated_ints,
    parse_duration, parse_float, parse_int, parse_string,
};
use super::types::{AppConfig, ScopedToken};
use crate::error::{ConfigError, ConfigResult};

const TOKENS_ENV: &str = "XG2G_API_TOKENS";

static LEGACY_TOKEN_HINT: Once = Once::new();

/// Apply every environment override to `cfg`.
pub fn merge_env_config(
    cfg: &mut AppConfig,
    env: &dyn EnvSource,
    legacy: &mut LegacyCredentials,
) -> ConfigResult<()> {
    merge_core(cfg, env);
    merge_legacy_receiver(cfg, env, legacy);
    merge_canonical_receiver(cfg, env);
    merge_epg(cfg, env);
    merge_api(cfg, env)?;
    merge_engine(cfg, env);
    merge_media(cfg, env);
    merge_vod(cfg, env);
    merge_security(cfg, env);
    merge_network(cfg, env);
    merge_observability(cfg, env);
    Ok(())
}

fn merge_core(cfg: &mut AppConfig, env: &dyn EnvSource) {
    cfg.data_dir = parse_string(env, "XG2G_DATA", &cfg.data_dir);
    cfg.log_level = parse_string(env, "XG2G_LOG_LEVEL", &cfg.log_level);
    cfg.log_service = parse_string(env, "XG2G_LOG_SERVICE", &cfg.log_service);
    cfg.config_strict = parse_bool(env, "XG2G_CONFIG_STRICT", cfg.config_strict);
    cfg.ready_strict = parse_bool(env, "XG2G_READY_STRICT", cfg.ready_strict);
    cfg.bouquet = parse_string(env, "XG2G_BOUQUET", &cfg.bouquet);
    cfg.trusted_proxies = parse_string(env, "XG2G_TRUSTED_PROXIES", &cfg.trusted_proxies);
    cfg.picon_base = parse_string(env, "XG2G_PICON_BASE", &cfg.picon_base);
    cfg.streaming.delivery_policy =
        parse_string(env, "XG2G_STREAMING_POLICY", &cfg.streaming.delivery_policy);
}

/// Positive integer milliseconds; zero, negative and garbage count as unset.
fn positive_millis(env: &dyn EnvSource, key: &str) -> Option<Duration> {
    let ms = parse_int(env, key, 0);
    (ms > 0).then(|| Duration::from_millis(ms as u64))
}

fn merge_legacy_receiver(cfg: &mut AppConfig, env: &dyn EnvSource, legacy: &mut LegacyCredentials) {
    let e2 = &mut cfg.enigma2;
    e2.base_url = parse_string(env, "XG2G_OWI_BASE", &e2.base_url);
    legacy.username = parse_string(env, "XG2G_OWI_USER", &legacy.username);
    legacy.password = parse_string(env, "XG2G_OWI_PASS", &legacy.password);
    e2.stream_port = parse_int(env, "XG2G_STREAM_PORT", e2.stream_port);
    e2.use_webif_streams = parse_bool(env, "XG2G_USE_WEBIF_STREAMS", e2.use_webif_streams);
    if let Some(d) = positive_millis(env, "XG2G_OWI_TIMEOUT_MS") {
        e2.timeout = d;
    }
    e2.retries = parse_int(env, "XG2G_OWI_RETRIES", e2.retries);
    if let Some(d) = positive_millis(env, "XG2G_OWI_BACKOFF_MS") {
        e2.backoff = d;
    }
    if let Some(d) = positive_millis(env, "XG2G_OWI_MAX_BACKOFF_MS") {
        e2.max_backoff = d;
    }
}

fn merge_canonical_receiver(cfg: &mut AppConfig, env: &dyn EnvSource) {
    let e2 = &mut cfg.enigma2;
    e2.base_url = parse_string(env, "XG2G_E2_HOST", &e2.base_url);
    e2.username = parse_string(env, "XG2G_E2_USER", &e2.username);
    e2.password = parse_string(env, "XG2G_E2_PASS", &e2.password);
    e2.auth_mode = parse_string(env, "XG2G_E2_AUTH_MODE", &e2.auth_mode)
        .trim()
        .to_ascii_lowercase();
    e2.timeout = parse_duration(env, "XG2G_E2_TIMEOUT", e2.timeout);
    e2.response_header_timeout = parse_duration(
        env,
        "XG2G_E2_RESPONSE_HEADER_TIMEOUT",
        e2.response_header_timeout,
    );
    e2.tune_timeout = parse_duration(env, "XG2G_E2_TUNE_TIMEOUT", e2.tune_timeout);
    e2.retries = parse_int(env, "XG2G_E2_RETRIES", e2.retries);
    e2.backoff = parse_duration(env, "XG2G_E2_BACKOFF", e2.backoff);
    e2.max_backoff = parse_duration(env, "XG2G_E2_MAX_BACKOFF", e2.max_backoff);
    e2.stream_port = parse_int(env, "XG2G_E2_STREAM_PORT", e2.stream_port);
    e2.use_webif_streams = parse_bool(env, "XG2G_E2_USE_WEBIF_STREAMS", e2.use_webif_streams);
    e2.rate_limit = parse_int(env, "XG2G_E2_RATE_LIMIT", e2.rate_limit);
    e2.rate_burst = parse_int(env, "XG2G_E2_RATE_BURST", e2.rate_burst);
    e2.user_agent = parse_string(env, "XG2G_E2_USER_AGENT", &e2.user_agent);
    e2.analyze_duration = parse_string(env, "XG2G_E2_ANALYZE_DURATION", &e2.analyze_duration);
    e2.probe_size = parse_string(env, "XG2G_E2_PROBE_SIZE", &e2.probe_size);
    e2.fallback_to_8001 = parse_bool(env, "XG2G_E2_FALLBACK_TO_8001", e2.fallback_to_8001);
    e2.preflight_timeout =
        parse_duration(env, "XG2G_E2_PREFLIGHT_TIMEOUT", e2.preflight_timeout);
}

fn merge_epg(cfg: &mut AppConfig, env: &dyn EnvSource) {
    let epg = &mut cfg.epg;
    epg.enabled = parse_bool(env, "XG2G_EPG_ENABLED", epg.enabled);
    epg.days = parse_int(env, "XG2G_EPG_DAYS", epg.days);
    epg.max_concurrency = parse_int(env, "XG2G_EPG_MAX_CONCURRENCY", epg.max_concurrency);
    epg.timeout_ms = parse_int(env, "XG2G_EPG_TIMEOUT_MS", epg.timeout_ms);
    epg.retries = parse_int(env, "XG2G_EPG_RETRIES", epg.retries);
    epg.fuzzy_max = parse_int(env, "XG2G_FUZZY_MAX", epg.fuzzy_max);
    epg.xmltv_path = parse_string(env, "XG2G_XMLTV", &epg.xmltv_path);
    epg.source = parse_string(env, "XG2G_EPG_SOURCE", &epg.source);
    epg.refresh_interval =
        parse_duration(env, "XG2G_EPG_REFRESH_INTERVAL", epg.refresh_interval);
}

fn override_list(env: &dyn EnvSource, key: &str, dst: &mut Vec<String>) {
    if let Some(raw) = lookup_nonempty(env, key) {
        *dst = parse_comma_separated(&raw);
    }
}

fn merge_api(cfg: &mut AppConfig, env: &dyn EnvSource) -> ConfigResult<()> {
    let api = &mut cfg.api;
    api.token = parse_string(env, "XG2G_API_TOKEN", &api.token);
    override_list(env, "XG2G_API_TOKEN_SCOPES", &mut api.token_scopes);
    if let Some(raw) = lookup_nonempty(env, TOKENS_ENV) {
        api.tokens = parse_scoped_tokens(&raw)?;
    }
    api.listen_addr = parse_string(env, "XG2G_LISTEN", &api.listen_addr);
    override_list(env, "XG2G_ALLOWED_ORIGINS", &mut api.allowed_origins);
    Ok(())
}

fn merge_engine(cfg: &mut AppConfig, env: &dyn EnvSource) {
    let engine = &mut cfg.engine;
    engine.enabled = parse_bool(env, "XG2G_ENGINE_ENABLED", engine.enabled);
    engine.mode = parse_string(env, "XG2G_ENGINE_MODE", &engine.mode);
    engine.idle_timeout = parse_duration(env, "XG2G_ENGINE_IDLE_TIMEOUT", engine.idle_timeout);
    engine.cpu_threshold_scale =
        parse_float(env, "XG2G_ENGINE_CPU_SCALE", engine.cpu_threshold_scale);
    engine.max_pool = parse_int(env, "XG2G_ENGINE_MAX_POOL", engine.max_pool);
    engine.gpu_limit = parse_int(env, "XG2G_ENGINE_GPU_LIMIT", engine.gpu_limit);
    if let Some(raw) = lookup_nonempty(env, "XG2G_TUNER_SLOTS") {
        match parse_tuner_slots(&raw) {
            Ok(slots) => engine.tuner_slots = slots,
            Err(reason) => {
                warn!(key = "XG2G_TUNER_SLOTS", value = %raw, %reason, "ignoring invalid tuner slots")
            }
        }
    }
}

fn merge_media(cfg: &mut AppConfig, env: &dyn EnvSource) {
    if let Some(path) = lookup_nonempty(env, "XG2G_STORE_PATH") {
        cfg.store.path = Some(path);
    }
    cfg.store.backend = parse_string(env, "XG2G_STORE_BACKEND", &cfg.store.backend);

    let hls = &mut cfg.hls;
    hls.dvr_window = parse_duration(env, "XG2G_HLS_DVR_WINDOW", hls.dvr_window);
    hls.segment_seconds = parse_int(env, "XG2G_HLS_SEGMENT_SECONDS", hls.segment_seconds);

    let ffmpeg = &mut cfg.ffmpeg;
    ffmpeg.bin = parse_string(env, "XG2G_FFMPEG_BIN", &ffmpeg.bin);
    ffmpeg.ffprobe_bin = parse_string(env, "XG2G_FFPROBE_BIN", &ffmpeg.ffprobe_bin);
    ffmpeg.kill_timeout = parse_duration(env, "XG2G_FFMPEG_KILL_TIMEOUT", ffmpeg.kill_timeout);
}

/// Flat VOD variables. A typed file value that disagrees was already
/// rejected, so applying them here cannot override the file.
fn merge_vod(cfg: &mut AppConfig, env: &dyn EnvSource) {
    let vod = &mut cfg.vod;
    vod.probe_size = parse_string(env, "XG2G_VOD_PROBE_SIZE", &vod.probe_size);
    vod.analyze_duration = parse_string(env, "XG2G_VOD_ANALYZE_DURATION", &vod.analyze_duration);
    vod.stall_timeout = parse_duration(env, "XG2G_VOD_STALL_TIMEOUT", vod.stall_timeout);
    vod.max_concurrent = parse_int(env, "XG2G_VOD_MAX_CONCURRENT", vod.max_concurrent);
    vod.cache_ttl = parse_duration(env, "XG2G_VOD_CACHE_TTL", vod.cache_ttl);
    vod.cache_max_entries = parse_int(env, "XG2G_VOD_CACHE_MAX_ENTRIES", vod.cache_max_entries);
}

fn merge_security(cfg: &mut AppConfig, env: &dyn EnvSource) {
    let tls = &mut cfg.tls;
    tls.enabled = parse_bool(env, "XG2G_TLS_ENABLED", tls.enabled);
    if let Some(cert) = lookup_nonempty(env, "XG2G_TLS_CERT") {
        tls.cert = Some(cert);
    }
    if let Some(key) = lookup_nonempty(env, "XG2G_TLS_KEY") {
        tls.key = Some(key);
    }
    tls.force_https = parse_bool(env, "XG2G_FORCE_HTTPS", tls.force_https);

    let rl = &mut cfg.rate_limit;
    rl.enabled = parse_bool(env, "XG2G_RATE_LIMIT_ENABLED", rl.enabled);
    rl.global = parse_int(env, "XG2G_RATE_LIMIT_GLOBAL", rl.global);
    rl.auth = parse_int(env, "XG2G_RATE_LIMIT_AUTH", rl.auth);
    rl.burst = parse_int(env, "XG2G_RATE_LIMIT_BURST", rl.burst);
    override_list(env, "XG2G_RATE_LIMIT_WHITELIST", &mut rl.whitelist);
}

fn merge_network(cfg: &mut AppConfig, env: &dyn EnvSource) {
    let out = &mut cfg.network.outbound;
    out.enabled = parse_bool(env, "XG2G_OUTBOUND_ENABLED", out.enabled);
    override_list(env, "XG2G_OUTBOUND_ALLOW_HOSTS", &mut out.hosts);
    override_list(env, "XG2G_OUTBOUND_ALLOW_CIDRS", &mut out.cidrs);
    if let Some(raw) = lookup_nonempty(env, "XG2G_OUTBOUND_ALLOW_PORTS") {
        out.ports = parse_comma_separated_ints("XG2G_OUTBOUND_ALLOW_PORTS", &raw);
    }
    override_list(env, "XG2G_OUTBOUND_ALLOW_SCHEMES", &mut out.schemes);
}

fn merge_observability(cfg: &mut AppConfig, env: &dyn EnvSource) {
    cfg.metrics.enabled = parse_bool(env, "XG2G_METRICS_ENABLED", cfg.metrics.enabled);
    if let Some(addr) = lookup_nonempty(env, "XG2G_METRICS_LISTEN") {
        cfg.metrics.listen_addr = addr;
        cfg.metrics.enabled = true;
    }

    let v = &mut cfg.verification;
    v.enabled = parse_bool(env, "XG2G_VERIFY_ENABLED", v.enabled);
    v.interval = parse_duration(env, "XG2G_VERIFY_INTERVAL", v.interval);
}

/// Highest tuner slot index accepted.
pub const MAX_TUNER_SLOT: i64 = 255;

/// Tuner slot list: `0,1,2` or ranges such as `0-3`, each slot in
/// `0..=MAX_TUNER_SLOT`.
pub fn parse_tuner_slots(raw: &str) -> Result<Vec<i64>, String> {
    let mut slots = Vec::new();
    for part in parse_comma_separated(raw) {
        if let Some((lo, hi)) = part.split_once('-') {
            let lo: i64 = lo.trim().parse().map_err(|_| format!("bad range {:?}", part))?;
            let hi: i64 = hi.trim().parse().map_err(|_| format!("bad range {:?}", part))?;
            if lo > hi || lo < 0 || hi > MAX_TUNER_SLOT {
                return Err(format!("bad range {:?}", part));
            }
            slots.extend(lo..=hi);
        } else {
            let slot: i64 = part.parse().map_err(|_| format!("bad slot {:?}", part))?;
            if slot < 0 {
                return Err(format!("negative slot {}", slot));
            }
            if slot > MAX_TUNER_SLOT {
                return Err(format!("slot {} above {}", slot, MAX_TUNER_SLOT));
            }
            slots.push(slot);
        }
    }
    Ok(slots)
}

fn token_error(reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::invalid_value(TOKENS_ENV, reason)
}

#[derive(Deserialize)]
struct TokenJson {
    #[serde(default)]
    token: String,
    #[serde(default)]
    scopes: Vec<String>,
}

/// Parse scoped API tokens.
///
/// A JSON array of `{token, scopes}` objects is canonical. Anything not
/// starting with `[` or `{` is read as the legacy `token=scope,scope;...`
/// grammar, with a one-time migration hint.
pub fn parse_scoped_tokens(raw: &str) -> ConfigResult<Vec<ScopedToken>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return parse_scoped_tokens_json(trimmed);
    }
    if trimmed.starts_with('{') {
        return Err(token_error("JSON must be an array of objects"));
    }
    LEGACY_TOKEN_HINT.call_once(|| {
        warn!(
            key = TOKENS_ENV,
            "legacy token format detected; JSON array is recommended"
        );
    });
    parse_scoped_tokens_legacy(trimmed)
}

fn parse_scoped_tokens_json(raw: &str) -> ConfigResult<Vec<ScopedToken>> {
    let entries: Vec<TokenJson> =
        serde_json::from_str(raw).map_err(|e| token_error(format!("JSON parse failed: {}", e)))?;
    if entries.is_empty() {
        return Err(token_error("JSON array is empty"));
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let token = entry.token.trim().to_string();
        if token.is_empty() {
            return Err(token_error("token is empty"));
        }
        if !seen.insert(token.clone()) {
            return Err(token_error(format!("duplicate token {:?}", token)));
        }
        let mut scopes = Vec::with_capacity(entry.scopes.len());
        for scope in entry.scopes {
            let scope = scope.trim();
            if scope.is_empty() {
                return Err(token_error(format!(
                    "scopes must not be empty for token {:?}",
                    token
                )));
            }
            scopes.push(scope.to_string());
        }
        if scopes.is_empty() {
            return Err(token_error(format!("scopes must be set for token {:?}", token)));
        }
        out.push(ScopedToken {
            token,
            scopes,
            user: None,
        });
    }
    Ok(out)
}

fn parse_scoped_tokens_legacy(raw: &str) -> ConfigResult<Vec<ScopedToken>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((token, scopes)) = entry.split_once('=') else {
            return Err(token_error(format!(
                "legacy entry must be token=scopes: {:?}",
                entry
            )));
        };
        let token = token.trim();
        if token.is_empty() {
            return Err(token_error("token is empty"));
        }
        if !seen.insert(token.to_string()) {
            return Err(token_error(format!("duplicate token {:?}", token)));
        }
        let scopes = parse_comma_separated(scopes);
        if scopes.is_empty() {
            return Err(token_error(format!("scopes must be set for token {:?}", token)));
        }
        out.push(ScopedToken {
            token: token.to_string(),
            scopes,
            user: None,
        });
    }
    if out.is_empty() {
        return Err(token_error("no valid token entries"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::registry::Registry;
    use crate::config::scalar::MapEnv;
    use crate::error::ErrorKind;

    fn merged(env: &MapEnv) -> (AppConfig, LegacyCredentials) {
        let mut cfg = AppConfig::default();
        Registry::build().unwrap().apply_defaults(&mut cfg).unwrap();
        let mut legacy = LegacyCredentials::default();
        merge_env_config(&mut cfg, env, &mut legacy).unwrap();
        (cfg, legacy)
    }

    #[test]
    fn test_legacy_token_grammar() {
        let tokens = parse_scoped_tokens("read=v3:read;ops=v3:read,v3:write").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token, "read");
        assert_eq!(tokens[0].scopes, vec!["v3:read"]);
        assert_eq!(tokens[1].token, "ops");
        assert_eq!(tokens[1].scopes, vec!["v3:read", "v3:write"]);
    }

    #[test]
    fn test_legacy_token_hint_fires_once() {
        let first = parse_scoped_tokens("a=v3:read").unwrap();
        assert!(LEGACY_TOKEN_HINT.is_completed());
        let second = parse_scoped_tokens("b=v3:write;c=v3:read").unwrap();
        assert_eq!(first[0].token, "a");
        assert_eq!(second.len(), 2);
        assert!(LEGACY_TOKEN_HINT.is_completed());
    }

    #[test]
    fn test_legacy_token_without_scopes_fails() {
        let err = parse_scoped_tokens("read=").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(err.to_string().contains("read"));
        assert!(parse_scoped_tokens("=v3:read").is_err());
        assert!(parse_scoped_tokens("a=x;a=y").is_err());
        assert!(parse_scoped_tokens("justatoken").is_err());
    }

    #[test]
    fn test_json_tokens() {
        let tokens =
            parse_scoped_tokens(r#"[{"token":"abc","scopes":["v3:read"," v3:admin "]}]"#).unwrap();
        assert_eq!(tokens[0].scopes, vec!["v3:read", "v3:admin"]);

        assert!(parse_scoped_tokens(r#"{"token":"abc"}"#).is_err());
        assert!(parse_scoped_tokens("[]").is_err());
        assert!(parse_scoped_tokens(r#"[{"token":"abc","scopes":[]}]"#).is_err());
        assert!(parse_scoped_tokens(r#"[{"token":"","scopes":["x"]}]"#).is_err());
        assert!(
            parse_scoped_tokens(r#"[{"token":"a","scopes":["x"]},{"token":"a","scopes":["y"]}]"#)
                .is_err()
        );
    }

    #[test]
    fn test_invalid_max_backoff_falls_back_to_default() {
        let env = MapEnv::new().with("XG2G_E2_MAX_BACKOFF", "not-a-number");
        let (cfg, _) = merged(&env);
        assert_eq!(cfg.enigma2.max_backoff, Duration::from_secs(30));
    }

    #[test]
    fn test_canonical_env_applied_after_legacy() {
        let env = MapEnv::new()
            .with("XG2G_OWI_BASE", "http://legacy")
            .with("XG2G_E2_HOST", "http://canonical")
            .with("XG2G_OWI_TIMEOUT_MS", "2500");
        let (cfg, _) = merged(&env);
        assert_eq!(cfg.enigma2.base_url, "http://canonical");
        assert_eq!(cfg.enigma2.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_non_positive_legacy_millis_ignored() {
        let env = MapEnv::new()
            .with("XG2G_OWI_TIMEOUT_MS", "0")
            .with("XG2G_OWI_BACKOFF_MS", "-5");
        let (cfg, _) = merged(&env);
        assert_eq!(cfg.enigma2.timeout, Duration::from_secs(10));
        assert_eq!(cfg.enigma2.backoff, Duration::from_millis(200));
    }

    #[test]
    fn test_legacy_credentials_from_env() {
        let env = MapEnv::new()
            .with("XG2G_OWI_USER", "root")
            .with("XG2G_OWI_PASS", "pw");
        let (cfg, legacy) = merged(&env);
        assert_eq!(legacy.username, "root");
        assert!(cfg.enigma2.username.is_empty());
    }

    #[test]
    fn test_lists_trim_and_drop_empty_segments() {
        let env = MapEnv::new()
            .with("XG2G_ALLOWED_ORIGINS", " https://a , ,https://b ")
            .with("XG2G_OUTBOUND_ALLOW_PORTS", "80, 443");
        let (cfg, _) = merged(&env);
        assert_eq!(cfg.api.allowed_origins, vec!["https://a", "https://b"]);
        assert_eq!(cfg.network.outbound.ports, vec![80, 443]);
    }

    #[test]
    fn test_metrics_listen_enables_metrics() {
        let env = MapEnv::new().with("XG2G_METRICS_LISTEN", ":9090");
        let (cfg, _) = merged(&env);
        assert!(cfg.metrics.enabled);
        assert_eq!(cfg.metrics.listen_addr, ":9090");
    }

    #[test]
    fn test_tuner_slots() {
        assert_eq!(parse_tuner_slots("0-2, 5").unwrap(), vec![0, 1, 2, 5]);
        assert!(parse_tuner_slots("3-1").is_err());
        assert!(parse_tuner_slots("x").is_err());
    }

    #[test]
    fn test_tuner_slots_out_of_range() {
        assert!(parse_tuner_slots("0-9223372036854775806").is_err());
        assert!(parse_tuner_slots("0-100000000").is_err());
        assert!(parse_tuner_slots("256").is_err());
        assert_eq!(parse_tuner_slots("0-255").unwrap().len(), 256);
    }

    #[test]
    fn test_huge_tuner_range_keeps_default() {
        let (defaults, _) = merged(&MapEnv::new());
        let env = MapEnv::new().with("XG2G_TUNER_SLOTS", "0-9223372036854775806");
        let (cfg, _) = merged(&env);
        assert_eq!(cfg.engine.tuner_slots, defaults.engine.tuner_slots);
    }

    #[test]
    fn test_invalid_token_env_fails_merge() {
        let env = MapEnv::new().with("XG2G_API_TOKENS", "read=");
        let mut cfg = AppConfig::default();
        let err = merge_env_config(&mut cfg, &env, &mut LegacyCredentials::default()).unwrap_err();
        assert!(err.to_string().contains("XG2G_API_TOKENS"));
    }
}
