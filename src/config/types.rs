//! Resolved configuration types.
//!
//! [`AppConfig`] is the immutable result of a successful load. Every leaf is
//! either a value taken from a source (file or environment) or the default
//! declared for it in the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::scalar::parse_comma_separated;

/// The fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// Binary version stamped in by the loader.
    pub version: String,
    pub config_version: String,
    pub config_strict: bool,
    pub ready_strict: bool,
    pub data_dir: String,
    pub log_level: String,
    pub log_service: String,
    /// Comma-separated bouquet names (empty = all).
    pub bouquet: String,
    /// Comma-separated trusted proxy IPs/CIDRs.
    pub trusted_proxies: String,
    pub picon_base: String,

    pub enigma2: Enigma2Settings,
    pub api: ApiSettings,
    pub epg: EpgSettings,
    pub engine: EngineSettings,
    pub store: StoreSettings,
    pub hls: HlsSettings,
    pub ffmpeg: FfmpegSettings,
    pub vod: VodSettings,
    pub tls: TlsSettings,
    pub rate_limit: RateLimitSettings,
    pub network: NetworkSettings,
    pub metrics: MetricsSettings,
    pub streaming: StreamingSettings,
    pub verification: VerificationSettings,
    pub recording: RecordingSettings,
    pub library: LibrarySettings,
}

impl AppConfig {
    /// Bouquet names split out of the comma-joined form.
    pub fn bouquets(&self) -> Vec<String> {
        parse_comma_separated(&self.bouquet)
    }

    pub fn trusted_proxy_list(&self) -> Vec<String> {
        parse_comma_separated(&self.trusted_proxies)
    }
}

/// Receiver connection settings (canonical `enigma2.*` namespace).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enigma2Settings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// `inherit`, `none` or `explicit`.
    pub auth_mode: String,
    pub timeout: Duration,
    pub response_header_timeout: Duration,
    pub tune_timeout: Duration,
    pub retries: i64,
    pub backoff: Duration,
    pub max_backoff: Duration,
    pub stream_port: i64,
    pub use_webif_streams: bool,
    /// Requests per second against the receiver.
    pub rate_limit: i64,
    pub rate_burst: i64,
    pub user_agent: String,
    pub analyze_duration: String,
    pub probe_size: String,
    pub fallback_to_8001: bool,
    pub preflight_timeout: Duration,
}

/// API token with the scopes it grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopedToken {
    pub token: String,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiSettings {
    pub token: String,
    pub token_scopes: Vec<String>,
    pub tokens: Vec<ScopedToken>,
    pub listen_addr: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpgSettings {
    pub enabled: bool,
    pub days: i64,
    pub max_concurrency: i64,
    pub timeout_ms: i64,
    pub retries: i64,
    pub fuzzy_max: i64,
    pub xmltv_path: String,
    /// `per-service` or `bouquet`.
    pub source: String,
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    pub enabled: bool,
    /// `standard` or `virtual`.
    pub mode: String,
    pub idle_timeout: Duration,
    pub tuner_slots: Vec<i64>,
    pub max_pool: i64,
    pub gpu_limit: i64,
    pub cpu_threshold_scale: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSettings {
    pub backend: String,
    /// Only meaningful for persistent backends.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HlsSettings {
    pub root: String,
    pub dvr_window: Duration,
    pub segment_seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegSettings {
    pub bin: String,
    pub ffprobe_bin: String,
    pub kill_timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VodSettings {
    pub probe_size: String,
    pub analyze_duration: String,
    pub stall_timeout: Duration,
    pub max_concurrent: i64,
    pub cache_ttl: Duration,
    pub cache_max_entries: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlsSettings {
    pub enabled: bool,
    pub cert: Option<String>,
    pub key: Option<String>,
    pub force_https: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Requests per second.
    pub global: i64,
    /// Requests per minute on auth endpoints.
    pub auth: i64,
    pub burst: i64,
    pub whitelist: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkSettings {
    pub outbound: OutboundSettings,
}

/// Outbound HTTP(S) allowlist policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundSettings {
    pub enabled: bool,
    pub hosts: Vec<String>,
    pub cidrs: Vec<String>,
    pub ports: Vec<i64>,
    pub schemes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen_addr: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingSettings {
    pub delivery_policy: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationSettings {
    pub enabled: bool,
    pub interval: Duration,
}

/// Maps a receiver-side recording root onto a locally mounted path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathMapping {
    pub receiver_root: String,
    pub local_root: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSettings {
    /// Root id -> absolute path.
    pub roots: BTreeMap<String, String>,
    /// `auto`, `local_only` or `receiver_only`.
    pub playback_policy: String,
    pub stable_window: Duration,
    pub path_mappings: Vec<PathMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryRoot {
    pub id: String,
    pub path: String,
    /// `local`, `smb` or `nfs`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub max_depth: i64,
    #[serde(default)]
    pub include_ext: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibrarySettings {
    pub enabled: bool,
    pub db_path: String,
    pub roots: Vec<LibraryRoot>,
}
