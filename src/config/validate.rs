//! Post-merge semantic validation.
//!
//! [`Validator`] collects every violation instead of stopping at the first,
//! so an operator sees the whole list in one run. [`validate_config`] holds
//! the business rules for a resolved [`AppConfig`].

use std::net::IpAddr;

use super::types::AppConfig;
use crate::error::{ConfigError, ConfigResult};

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
pub const ENGINE_MODES: &[&str] = &["standard", "virtual"];
pub const STORE_BACKENDS: &[&str] = &["memory", "sqlite", "bolt"];
pub const STREAMING_POLICIES: &[&str] = &["universal"];
pub const PLAYBACK_POLICIES: &[&str] = &["auto", "local_only", "receiver_only"];
pub const OUTBOUND_SCHEMES: &[&str] = &["http", "https", "rtsp"];
pub const EPG_SOURCES: &[&str] = &["per-service", "bouquet"];
pub const AUTH_MODES: &[&str] = &["inherit", "none", "explicit"];
pub const LIBRARY_ROOT_TYPES: &[&str] = &["local", "smb", "nfs"];

/// Machine code for forcing HTTPS with neither TLS nor a trusted proxy.
pub const HTTPS_WITHOUT_TLS: &str = "HTTPS_WITHOUT_TLS";

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed for {}: {}", self.field, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Validator {
    violations: Vec<Violation>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.violations.push(Violation {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            self.add(
                field,
                format!("value must be between {} and {}, got {}", min, max, value),
            );
        }
    }

    pub fn port(&mut self, field: &str, port: i64) {
        if !(1..=65535).contains(&port) {
            self.add(
                field,
                format!("port must be between 1 and 65535, got {}", port),
            );
        }
    }

    pub fn positive(&mut self, field: &str, value: i64) {
        if value <= 0 {
            self.add(field, format!("value must be positive, got {}", value));
        }
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.add(
                field,
                format!("value must be one of {:?}, got {:?}", allowed, value),
            );
        }
    }

    /// Parseable URL with a host and one of `schemes`. Empty is reported.
    pub fn url(&mut self, field: &str, value: &str, schemes: &[&str]) {
        if value.trim().is_empty() {
            self.add(field, "URL cannot be empty");
            return;
        }
        let parsed = match url::Url::parse(value.trim()) {
            Ok(u) => u,
            Err(e) => {
                self.add(field, format!("invalid URL: {}", e));
                return;
            }
        };
        if parsed.host_str().is_none_or(str::is_empty) {
            self.add(field, "URL must have a host");
            return;
        }
        if !schemes.contains(&parsed.scheme()) {
            self.add(
                field,
                format!(
                    "unsupported URL scheme {:?} (allowed: {:?})",
                    parsed.scheme(),
                    schemes
                ),
            );
        }
    }

    /// A plain IP or `ip/prefix`; unspecified addresses and `/0` match
    /// everything and are refused.
    pub fn ip_or_cidr(&mut self, field: &str, value: &str) {
        if let Err(reason) = check_ip_or_cidr(value) {
            self.add(field, format!("{:?}: {}", value, reason));
        }
    }

    pub fn into_result(self) -> ConfigResult<()> {
        if self.violations.is_empty() {
            return Ok(());
        }
        let text = self
            .violations
            .iter()
            .map(Violation::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let mut err = ConfigError::validation(text);
        if let [only] = self.violations.as_slice() {
            err = err.with_field(only.field.clone());
        }
        Err(err)
    }
}

fn check_ip_or_cidr(raw: &str) -> Result<(), String> {
    let raw = raw.trim();
    let (addr, prefix) = match raw.split_once('/') {
        Some((a, p)) => (a, Some(p)),
        None => (raw, None),
    };
    let ip: IpAddr = addr
        .parse()
        .map_err(|_| "not a valid IP address or CIDR".to_string())?;
    if ip.is_unspecified() {
        return Err("unspecified address is not allowed".to_string());
    }
    if let Some(prefix) = prefix {
        let bits: u8 = prefix
            .parse()
            .map_err(|_| format!("invalid prefix length {:?}", prefix))?;
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if bits == 0 {
            return Err("/0 would match every address".to_string());
        }
        if bits > max {
            return Err(format!("prefix length {} exceeds {}", bits, max));
        }
    }
    Ok(())
}

/// Apply every business rule to a merged configuration.
pub fn validate_config(cfg: &AppConfig) -> ConfigResult<()> {
    let mut v = Validator::new();

    v.one_of("logLevel", &cfg.log_level, LOG_LEVELS);
    if cfg.data_dir.trim().is_empty() {
        v.add("dataDir", "value cannot be empty");
    }
    for proxy in cfg.trusted_proxy_list() {
        v.ip_or_cidr("trustedProxies", &proxy);
    }

    let e2 = &cfg.enigma2;
    if !e2.base_url.trim().is_empty() {
        v.url("enigma2.baseUrl", &e2.base_url, &["http", "https"]);
    }
    v.one_of("enigma2.authMode", &e2.auth_mode, AUTH_MODES);
    v.port("enigma2.streamPort", e2.stream_port);
    v.range("enigma2.retries", e2.retries, 0, 10);
    if e2.backoff > e2.max_backoff {
        v.add(
            "enigma2.backoff",
            "must not exceed enigma2.maxBackoff",
        );
    }

    let epg = &cfg.epg;
    v.range("epg.days", epg.days, 0, 14);
    v.range("epg.maxConcurrency", epg.max_concurrency, 1, 10);
    v.range("epg.timeoutMs", epg.timeout_ms, 100, 60_000);
    v.range("epg.retries", epg.retries, 0, 5);
    v.range("epg.fuzzyMax", epg.fuzzy_max, 0, 10);
    v.one_of("epg.source", &epg.source, EPG_SOURCES);

    v.one_of("engine.mode", &cfg.engine.mode, ENGINE_MODES);
    if cfg.engine.enabled {
        v.positive("engine.maxPool", cfg.engine.max_pool);
    }
    if cfg.engine.gpu_limit < 0 {
        v.add("engine.gpuLimit", "value cannot be negative");
    }
    if cfg.engine.cpu_threshold_scale <= 0.0 {
        v.add("engine.cpuThresholdScale", "value must be positive");
    }

    v.one_of("store.backend", &cfg.store.backend, STORE_BACKENDS);
    if cfg.store.backend != "memory" && cfg.store.path.as_deref().is_none_or(|p| p.trim().is_empty()) {
        v.add("store.path", "required for persistent store backends");
    }

    v.range("hls.segmentSeconds", cfg.hls.segment_seconds, 1, 60);
    v.positive("vod.maxConcurrent", cfg.vod.max_concurrent);

    let tls = &cfg.tls;
    if tls.enabled {
        let missing = |p: &Option<String>| p.as_deref().is_none_or(|s| s.trim().is_empty());
        if missing(&tls.cert) {
            v.add("tls.cert", "required when tls.enabled is true");
        }
        if missing(&tls.key) {
            v.add("tls.key", "required when tls.enabled is true");
        }
    }
    if tls.force_https && !tls.enabled && cfg.trusted_proxy_list().is_empty() {
        v.add(
            "tls.forceHTTPS",
            format!(
                "{}: forceHTTPS requires tls.enabled or trustedProxies for a TLS-terminating proxy",
                HTTPS_WITHOUT_TLS
            ),
        );
    }

    let rl = &cfg.rate_limit;
    if rl.enabled {
        v.positive("rateLimit.global", rl.global);
        v.positive("rateLimit.auth", rl.auth);
        v.positive("rateLimit.burst", rl.burst);
    }
    for entry in &rl.whitelist {
        v.ip_or_cidr("rateLimit.whitelist", entry);
    }

    let out = &cfg.network.outbound;
    for scheme in &out.schemes {
        v.one_of("network.outbound.allow.schemes", scheme, OUTBOUND_SCHEMES);
    }
    for port in &out.ports {
        v.port("network.outbound.allow.ports", *port);
    }
    for cidr in &out.cidrs {
        v.ip_or_cidr("network.outbound.allow.cidrs", cidr);
    }
    if out.enabled && out.hosts.is_empty() && out.cidrs.is_empty() {
        v.add(
            "network.outbound.allow",
            "enabled outbound policy needs at least one host or CIDR",
        );
    }

    v.one_of(
        "streaming.deliveryPolicy",
        &cfg.streaming.delivery_policy,
        STREAMING_POLICIES,
    );

    let rec = &cfg.recording;
    v.one_of(
        "recording_playback.playback_policy",
        &rec.playback_policy,
        PLAYBACK_POLICIES,
    );
    for (id, path) in &rec.roots {
        if !path.starts_with('/') {
            v.add("recording_roots", format!("root {:?} must be an absolute path", id));
        }
    }
    for m in &rec.path_mappings {
        if !m.receiver_root.starts_with('/') || !m.local_root.starts_with('/') {
            v.add(
                "recording_playback.mappings",
                format!(
                    "mapping {:?} -> {:?} must use absolute paths",
                    m.receiver_root, m.local_root
                ),
            );
        }
    }

    let lib = &cfg.library;
    let mut seen = std::collections::BTreeSet::new();
    for root in &lib.roots {
        if root.id.trim().is_empty() {
            v.add("library.roots", "root id cannot be empty");
        } else if !seen.insert(root.id.as_str()) {
            v.add("library.roots", format!("duplicate root id {:?}", root.id));
        }
        if root.path.trim().is_empty() {
            v.add("library.roots", format!("root {:?} has no path", root.id));
        }
        v.one_of("library.roots.type", &root.kind, LIBRARY_ROOT_TYPES);
    }
    if lib.enabled && lib.roots.is_empty() {
        v.add("library.roots", "enabled library needs at least one root");
    }

    v.into_result()
}
