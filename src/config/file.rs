//! Strict file schema.
//!
//! Every leaf is optional: `None` means "not written in the file", `Some`
//! means "written", including `false`, `0` and `""`. Unknown keys at any
//! level are rejected.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;

use super::types::{LibraryRoot, PathMapping, ScopedToken};
use crate::error::{ConfigError, ConfigResult};

/// Top-level file document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FileConfig {
    pub version: Option<String>,
    pub config_version: Option<String>,
    pub config_strict: Option<bool>,
    pub ready_strict: Option<bool>,
    pub data_dir: Option<String>,
    pub log_level: Option<String>,
    pub log_service: Option<String>,
    pub trusted_proxies: Option<Vec<String>>,
    pub bouquets: Option<Vec<String>>,

    #[serde(rename = "openWebIF")]
    pub open_webif: Option<OpenWebIfFile>,
    pub enigma2: Option<Enigma2File>,

    pub api: Option<ApiFile>,
    pub epg: Option<EpgFile>,
    pub engine: Option<EngineFile>,
    pub store: Option<StoreFile>,
    pub hls: Option<HlsFile>,
    pub ffmpeg: Option<FfmpegFile>,
    pub vod: Option<VodFile>,
    pub tls: Option<TlsFile>,
    pub rate_limit: Option<RateLimitFile>,
    pub network: Option<NetworkFile>,
    pub metrics: Option<MetricsFile>,
    pub picons: Option<PiconsFile>,
    pub streaming: Option<StreamingFile>,
    pub verification: Option<VerificationFile>,

    #[serde(rename = "recording_roots")]
    pub recording_roots: Option<BTreeMap<String, String>>,
    #[serde(rename = "recording_playback")]
    pub recording_playback: Option<RecordingPlaybackFile>,
    pub library: Option<LibraryFile>,
}

/// Legacy receiver block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OpenWebIfFile {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub timeout: Option<String>,
    pub retries: Option<i64>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub backoff: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub max_backoff: Option<String>,
    pub stream_port: Option<i64>,
    #[serde(rename = "useWebIFStreams")]
    pub use_webif_streams: Option<bool>,
}

/// Canonical receiver block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Enigma2File {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_mode: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub timeout: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub response_header_timeout: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub tune_timeout: Option<String>,
    pub retries: Option<i64>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub backoff: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub max_backoff: Option<String>,
    pub stream_port: Option<i64>,
    #[serde(rename = "useWebIFStreams")]
    pub use_webif_streams: Option<bool>,
    pub rate_limit: Option<i64>,
    pub rate_burst: Option<i64>,
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub analyze_duration: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub probe_size: Option<String>,
    #[serde(rename = "fallbackTo8001")]
    pub fallback_to_8001: Option<bool>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub preflight_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ApiFile {
    pub token: Option<String>,
    pub token_scopes: Option<Vec<String>>,
    pub tokens: Option<Vec<ScopedToken>>,
    pub listen_addr: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct EpgFile {
    pub enabled: Option<bool>,
    pub days: Option<i64>,
    pub max_concurrency: Option<i64>,
    pub timeout_ms: Option<i64>,
    pub retries: Option<i64>,
    pub fuzzy_max: Option<i64>,
    pub xmltv_path: Option<String>,
    pub source: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub refresh_interval: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct EngineFile {
    pub enabled: Option<bool>,
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub idle_timeout: Option<String>,
    pub tuner_slots: Option<Vec<i64>>,
    pub max_pool: Option<i64>,
    pub gpu_limit: Option<i64>,
    pub cpu_threshold_scale: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreFile {
    pub backend: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct HlsFile {
    pub root: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub dvr_window: Option<String>,
    pub segment_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FfmpegFile {
    pub bin: Option<String>,
    pub ffprobe_bin: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub kill_timeout: Option<String>,
}

/// Typed VOD block. Supersedes the flat `XG2G_VOD_*` variables.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct VodFile {
    #[serde(default, deserialize_with = "scalar_text")]
    pub probe_size: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub analyze_duration: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub stall_timeout: Option<String>,
    pub max_concurrent: Option<i64>,
    #[serde(default, rename = "cacheTTL", deserialize_with = "scalar_text")]
    pub cache_ttl: Option<String>,
    pub cache_max_entries: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsFile {
    pub enabled: Option<bool>,
    pub cert: Option<String>,
    pub key: Option<String>,
    #[serde(rename = "forceHTTPS")]
    pub force_https: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitFile {
    pub enabled: Option<bool>,
    pub global: Option<i64>,
    pub auth: Option<i64>,
    pub burst: Option<i64>,
    pub whitelist: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkFile {
    pub outbound: Option<OutboundFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutboundFile {
    pub enabled: Option<bool>,
    pub allow: Option<OutboundAllowFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutboundAllowFile {
    pub hosts: Option<Vec<String>>,
    pub cidrs: Option<Vec<String>>,
    pub ports: Option<Vec<i64>>,
    pub schemes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MetricsFile {
    pub enabled: Option<bool>,
    pub listen_addr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PiconsFile {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StreamingFile {
    pub delivery_policy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationFile {
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordingPlaybackFile {
    pub playback_policy: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub stable_window: Option<String>,
    pub mappings: Option<Vec<PathMapping>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryFile {
    pub enabled: Option<bool>,
    pub db_path: Option<String>,
    pub roots: Option<Vec<LibraryRoot>>,
}

/// Accept a string or a bare number for text-typed leaves (`timeout: 0`,
/// `probeSize: 50000000`).
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Text>::deserialize(deserializer)?.map(|t| match t {
        Text::Str(s) => s,
        Text::Int(i) => i.to_string(),
        Text::Float(f) => f.to_string(),
    }))
}

/// Read a config file, enforcing the YAML extension.
pub fn read_config_file(path: &Path) -> ConfigResult<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ext != "yaml" && ext != "yml" {
        return Err(ConfigError::strict_decode(
            path.display(),
            format!("unsupported config format {:?} (only YAML supported)", ext),
        ));
    }
    std::fs::read_to_string(path).map_err(|e| ConfigError::io(path.display(), e))
}

/// Decode `raw` strictly.
///
/// An empty (or comment-only) document decodes to the default, which sets
/// nothing. More than one document is rejected.
pub fn decode_strict(raw: &str, origin: &str) -> ConfigResult<FileConfig> {
    if serde_yaml::Deserializer::from_str(raw).take(2).count() > 1 {
        return Err(ConfigError::strict_decode(
            origin,
            "config file contains multiple documents",
        ));
    }
    let loose: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|e| ConfigError::strict_decode(origin, e))?;
    if loose.is_null() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(raw).map_err(|e| ConfigError::strict_decode(origin, e))
}
