//! Registry of every configuration field.
//!
//! Each [`RegistryEntry`] ties a [`FieldId`] to its user-facing YAML path, its
//! canonical environment variable, an optional legacy variable, a default
//! and lifecycle metadata. The registry drives default application, the
//! field coverage audit, the env usage audit and hot-reload classification.
//!
//! Build it once with [`Registry::build`] (or [`Registry::shared`]) and pass
//! the `Arc<Registry>` to the loader.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use super::fields::{self, ConfigValue, FieldId};
use super::types::AppConfig;
use crate::error::{ConfigError, ConfigResult};

/// Audience tier for a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Simple,
    Advanced,
    Integrator,
    Internal,
}

/// Lifecycle state of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Deprecated,
    Candidate,
    Internal,
}

/// One row of the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub field: FieldId,
    /// Dotted YAML path, empty for internal-only fields.
    pub path: &'static str,
    /// Canonical environment variable, empty when there is none.
    pub env: &'static str,
    /// Older variable still honoured at lower precedence.
    pub legacy_env: &'static str,
    pub profile: Profile,
    pub status: Status,
    pub default: Option<ConfigValue>,
    /// Declared safe to change without restart. Only effective when the
    /// field is also on [`HOT_RELOAD_ALLOWLIST`].
    pub hot_reloadable: bool,
    /// Masked in any rendered output.
    pub secret: bool,
}

impl RegistryEntry {
    pub fn new(field: FieldId, path: &'static str, env: &'static str) -> Self {
        Self {
            field,
            path,
            env,
            legacy_env: "",
            profile: Profile::Simple,
            status: Status::Active,
            default: None,
            hot_reloadable: false,
            secret: false,
        }
    }

    fn advanced(mut self) -> Self {
        self.profile = Profile::Advanced;
        self
    }

    fn integrator(mut self) -> Self {
        self.profile = Profile::Integrator;
        self
    }

    fn internal(mut self) -> Self {
        self.profile = Profile::Internal;
        self.status = Status::Internal;
        self
    }

    fn deprecated(mut self) -> Self {
        self.status = Status::Deprecated;
        self
    }

    fn legacy(mut self, env: &'static str) -> Self {
        self.legacy_env = env;
        self
    }

    fn default_value(mut self, value: ConfigValue) -> Self {
        self.default = Some(value);
        self
    }

    fn hot(mut self) -> Self {
        self.hot_reloadable = true;
        self
    }

    fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// Fields that may change without a restart.
///
/// A changed field is hot-reloadable only if its entry is flagged *and* it is
/// listed here.
pub const HOT_RELOAD_ALLOWLIST: &[FieldId] = &[
    FieldId::LogLevel,
    FieldId::LogService,
    FieldId::Bouquet,
    FieldId::PiconBase,
    FieldId::ApiAllowedOrigins,
    FieldId::EpgEnabled,
    FieldId::EpgDays,
    FieldId::EpgMaxConcurrency,
    FieldId::EpgTimeoutMs,
    FieldId::EpgRetries,
    FieldId::EpgFuzzyMax,
    FieldId::EpgRefreshInterval,
    FieldId::RateLimitGlobal,
    FieldId::RateLimitAuth,
    FieldId::RateLimitBurst,
    FieldId::RateLimitWhitelist,
    FieldId::VerificationEnabled,
    FieldId::VerificationInterval,
];

/// The built registry with lookup indexes.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    by_field: HashMap<FieldId, usize>,
    by_path: HashMap<&'static str, usize>,
    by_env: HashMap<&'static str, usize>,
}

static SHARED: OnceLock<ConfigResult<Arc<Registry>>> = OnceLock::new();

impl Registry {
    /// Build the registry from the built-in table.
    pub fn build() -> ConfigResult<Self> {
        Self::from_entries(builtin_entries())
    }

    /// Process-wide registry, built exactly once.
    ///
    /// Concurrent first callers block until the single build finishes and
    /// then share the same registry or the same error.
    pub fn shared() -> ConfigResult<Arc<Registry>> {
        SHARED
            .get_or_init(|| Self::build().map(Arc::new))
            .clone()
    }

    /// Index `entries`, rejecting duplicate fields, paths and env names.
    pub fn from_entries(entries: Vec<RegistryEntry>) -> ConfigResult<Self> {
        let mut by_field = HashMap::new();
        let mut by_path = HashMap::new();
        let mut by_env = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            if by_field.insert(entry.field, idx).is_some() {
                return Err(ConfigError::registry(format!(
                    "duplicate registry field: {}",
                    entry.field.field_path()
                )));
            }
            if !entry.path.is_empty() && by_path.insert(entry.path, idx).is_some() {
                return Err(ConfigError::registry(format!(
                    "duplicate registry path: {}",
                    entry.path
                )));
            }
            for env in [entry.env, entry.legacy_env] {
                if !env.is_empty() && by_env.insert(env, idx).is_some() {
                    return Err(ConfigError::registry(format!(
                        "duplicate registry env: {}",
                        env
                    )));
                }
            }
        }

        Ok(Self {
            entries,
            by_field,
            by_path,
            by_env,
        })
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_field(&self, field: FieldId) -> Option<&RegistryEntry> {
        self.by_field.get(&field).map(|&i| &self.entries[i])
    }

    pub fn by_path(&self, path: &str) -> Option<&RegistryEntry> {
        self.by_path.get(path).map(|&i| &self.entries[i])
    }

    /// Entry owning `env`, either as canonical or legacy name.
    pub fn by_env(&self, env: &str) -> Option<&RegistryEntry> {
        self.by_env.get(env).map(|&i| &self.entries[i])
    }

    /// Fail if any leaf of the config has no registry entry.
    pub fn validate_field_coverage(&self, cfg: &AppConfig) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for (field, _) in fields::leaves(cfg) {
            if !seen.insert(field) {
                return Err(ConfigError::registry(format!(
                    "field {:?} is visited twice by the field table",
                    field.field_path()
                )));
            }
            if self.by_field(field).is_none() {
                return Err(ConfigError::registry(format!(
                    "field {:?} is not registered in the config registry",
                    field.field_path()
                ))
                .with_field(field.field_path()));
            }
        }
        for entry in &self.entries {
            if !seen.contains(&entry.field) {
                return Err(ConfigError::registry(format!(
                    "registry entry {:?} does not match any config field",
                    entry.field.field_path()
                )));
            }
        }
        Ok(())
    }

    /// Write every declared default into `cfg`.
    ///
    /// Optional leaves that already hold a value are left alone, so applying
    /// defaults twice equals applying them once.
    pub fn apply_defaults(&self, cfg: &mut AppConfig) -> ConfigResult<()> {
        for entry in &self.entries {
            let Some(default) = &entry.default else {
                continue;
            };
            fields::apply_default(cfg, entry.field, default.clone()).map_err(|e| {
                e.context(format!(
                    "failed to set default for {}",
                    entry.field.field_path()
                ))
            })?;
        }
        Ok(())
    }

    /// Both gates: registry flag and the strict allow-list.
    pub fn is_hot_reloadable(&self, field: FieldId) -> bool {
        self.by_field(field)
            .is_some_and(|entry| entry.hot_reloadable)
            && HOT_RELOAD_ALLOWLIST.contains(&field)
    }

    pub fn is_secret(&self, field: FieldId) -> bool {
        self.by_field(field).is_some_and(|entry| entry.secret)
    }

    /// Every environment variable the registry knows, canonical and legacy.
    pub fn known_env_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_env.keys().copied()
    }
}

/// The built-in field table.
pub fn builtin_entries() -> Vec<RegistryEntry> {
    use ConfigValue as V;
    use FieldId as F;
    type E = RegistryEntry;

    vec![
        // Core
        E::new(F::Version, "version", "").internal(),
        E::new(F::ConfigVersion, "configVersion", "")
            .internal()
            .default_value(V::str("v3")),
        E::new(F::ConfigStrict, "configStrict", "XG2G_CONFIG_STRICT")
            .advanced()
            .default_value(V::Bool(true)),
        E::new(F::ReadyStrict, "readyStrict", "XG2G_READY_STRICT")
            .advanced()
            .default_value(V::Bool(false)),
        E::new(F::DataDir, "dataDir", "XG2G_DATA").default_value(V::str("/tmp")),
        E::new(F::LogLevel, "logLevel", "XG2G_LOG_LEVEL")
            .default_value(V::str("info"))
            .hot(),
        E::new(F::LogService, "logService", "XG2G_LOG_SERVICE")
            .advanced()
            .hot(),
        E::new(F::Bouquet, "bouquets", "XG2G_BOUQUET").hot(),
        // Flagged, but proxy trust changes are kept off the allow-list.
        E::new(F::TrustedProxies, "trustedProxies", "XG2G_TRUSTED_PROXIES")
            .advanced()
            .hot(),
        E::new(F::PiconBase, "picons.baseUrl", "XG2G_PICON_BASE").hot(),
        // Receiver
        E::new(F::E2BaseUrl, "enigma2.baseUrl", "XG2G_E2_HOST").legacy("XG2G_OWI_BASE"),
        E::new(F::E2Username, "enigma2.username", "XG2G_E2_USER").legacy("XG2G_OWI_USER"),
        E::new(F::E2Password, "enigma2.password", "XG2G_E2_PASS")
            .legacy("XG2G_OWI_PASS")
            .secret(),
        E::new(F::E2AuthMode, "enigma2.authMode", "XG2G_E2_AUTH_MODE")
            .advanced()
            .default_value(V::str("inherit")),
        E::new(F::E2Timeout, "enigma2.timeout", "XG2G_E2_TIMEOUT")
            .legacy("XG2G_OWI_TIMEOUT_MS")
            .advanced()
            .default_value(V::secs(10)),
        E::new(
            F::E2ResponseHeaderTimeout,
            "enigma2.responseHeaderTimeout",
            "XG2G_E2_RESPONSE_HEADER_TIMEOUT",
        )
        .advanced()
        .default_value(V::secs(10)),
        E::new(F::E2TuneTimeout, "enigma2.tuneTimeout", "XG2G_E2_TUNE_TIMEOUT")
            .advanced()
            .default_value(V::secs(10)),
        E::new(F::E2Retries, "enigma2.retries", "XG2G_E2_RETRIES")
            .legacy("XG2G_OWI_RETRIES")
            .advanced()
            .default_value(V::Int(2)),
        E::new(F::E2Backoff, "enigma2.backoff", "XG2G_E2_BACKOFF")
            .legacy("XG2G_OWI_BACKOFF_MS")
            .advanced()
            .default_value(V::millis(200)),
        E::new(F::E2MaxBackoff, "enigma2.maxBackoff", "XG2G_E2_MAX_BACKOFF")
            .legacy("XG2G_OWI_MAX_BACKOFF_MS")
            .advanced()
            .default_value(V::secs(30)),
        E::new(F::E2StreamPort, "enigma2.streamPort", "XG2G_E2_STREAM_PORT")
            .legacy("XG2G_STREAM_PORT")
            .advanced()
            .deprecated()
            .default_value(V::Int(8001)),
        E::new(
            F::E2UseWebIfStreams,
            "enigma2.useWebIFStreams",
            "XG2G_E2_USE_WEBIF_STREAMS",
        )
        .legacy("XG2G_USE_WEBIF_STREAMS")
        .advanced()
        .default_value(V::Bool(true)),
        E::new(F::E2RateLimit, "enigma2.rateLimit", "XG2G_E2_RATE_LIMIT")
            .advanced()
            .default_value(V::Int(10)),
        E::new(F::E2RateBurst, "enigma2.rateBurst", "XG2G_E2_RATE_BURST")
            .advanced()
            .default_value(V::Int(20)),
        E::new(F::E2UserAgent, "enigma2.userAgent", "XG2G_E2_USER_AGENT")
            .advanced()
            .default_value(V::str("xg2g")),
        E::new(
            F::E2AnalyzeDuration,
            "enigma2.analyzeDuration",
            "XG2G_E2_ANALYZE_DURATION",
        )
        .advanced()
        .default_value(V::str("10000000")),
        E::new(F::E2ProbeSize, "enigma2.probeSize", "XG2G_E2_PROBE_SIZE")
            .advanced()
            .default_value(V::str("32M")),
        E::new(
            F::E2FallbackTo8001,
            "enigma2.fallbackTo8001",
            "XG2G_E2_FALLBACK_TO_8001",
        )
        .integrator()
        .default_value(V::Bool(false)),
        E::new(
            F::E2PreflightTimeout,
            "enigma2.preflightTimeout",
            "XG2G_E2_PREFLIGHT_TIMEOUT",
        )
        .advanced()
        .default_value(V::secs(10)),
        // API
        E::new(F::ApiToken, "api.token", "XG2G_API_TOKEN").secret(),
        E::new(F::ApiTokenScopes, "api.tokenScopes", "XG2G_API_TOKEN_SCOPES").advanced(),
        E::new(F::ApiTokens, "api.tokens", "XG2G_API_TOKENS")
            .advanced()
            .secret(),
        E::new(F::ApiListenAddr, "api.listenAddr", "XG2G_LISTEN").default_value(V::str(":8088")),
        E::new(F::ApiAllowedOrigins, "api.allowedOrigins", "XG2G_ALLOWED_ORIGINS")
            .advanced()
            .hot(),
        // EPG
        E::new(F::EpgEnabled, "epg.enabled", "XG2G_EPG_ENABLED")
            .default_value(V::Bool(true))
            .hot(),
        E::new(F::EpgDays, "epg.days", "XG2G_EPG_DAYS")
            .default_value(V::Int(14))
            .hot(),
        E::new(F::EpgMaxConcurrency, "epg.maxConcurrency", "XG2G_EPG_MAX_CONCURRENCY")
            .advanced()
            .default_value(V::Int(5))
            .hot(),
        E::new(F::EpgTimeoutMs, "epg.timeoutMs", "XG2G_EPG_TIMEOUT_MS")
            .advanced()
            .default_value(V::Int(5000))
            .hot(),
        E::new(F::EpgRetries, "epg.retries", "XG2G_EPG_RETRIES")
            .advanced()
            .default_value(V::Int(2))
            .hot(),
        E::new(F::EpgFuzzyMax, "epg.fuzzyMax", "XG2G_FUZZY_MAX")
            .advanced()
            .default_value(V::Int(2))
            .hot(),
        E::new(F::EpgXmltvPath, "epg.xmltvPath", "XG2G_XMLTV")
            .advanced()
            .default_value(V::str("xmltv.xml")),
        E::new(F::EpgSource, "epg.source", "XG2G_EPG_SOURCE")
            .advanced()
            .default_value(V::str("per-service")),
        E::new(
            F::EpgRefreshInterval,
            "epg.refreshInterval",
            "XG2G_EPG_REFRESH_INTERVAL",
        )
        .advanced()
        .default_value(V::secs(6 * 3600))
        .hot(),
        // Engine
        E::new(F::EngineEnabled, "engine.enabled", "XG2G_ENGINE_ENABLED")
            .advanced()
            .default_value(V::Bool(false)),
        E::new(F::EngineMode, "engine.mode", "XG2G_ENGINE_MODE")
            .advanced()
            .default_value(V::str("standard")),
        E::new(F::EngineIdleTimeout, "engine.idleTimeout", "XG2G_ENGINE_IDLE_TIMEOUT")
            .advanced()
            .default_value(V::secs(60)),
        E::new(F::EngineTunerSlots, "engine.tunerSlots", "XG2G_TUNER_SLOTS").advanced(),
        E::new(F::EngineMaxPool, "engine.maxPool", "XG2G_ENGINE_MAX_POOL")
            .advanced()
            .default_value(V::Int(2)),
        E::new(F::EngineGpuLimit, "engine.gpuLimit", "XG2G_ENGINE_GPU_LIMIT")
            .advanced()
            .default_value(V::Int(8)),
        E::new(
            F::EngineCpuThresholdScale,
            "engine.cpuThresholdScale",
            "XG2G_ENGINE_CPU_SCALE",
        )
        .advanced()
        .default_value(V::Float(1.5)),
        // Store
        E::new(F::StoreBackend, "store.backend", "XG2G_STORE_BACKEND")
            .advanced()
            .default_value(V::str("memory")),
        E::new(F::StorePath, "store.path", "XG2G_STORE_PATH")
            .advanced()
            .default_value(V::str("/var/lib/xg2g/store")),
        // HLS
        E::new(F::HlsRoot, "hls.root", "XG2G_HLS_ROOT")
            .legacy("XG2G_V3_HLS_ROOT")
            .advanced(),
        E::new(F::HlsDvrWindow, "hls.dvrWindow", "XG2G_HLS_DVR_WINDOW")
            .advanced()
            .default_value(V::secs(45 * 60)),
        E::new(F::HlsSegmentSeconds, "hls.segmentSeconds", "XG2G_HLS_SEGMENT_SECONDS")
            .advanced()
            .default_value(V::Int(6)),
        // FFmpeg
        E::new(F::FfmpegBin, "ffmpeg.bin", "XG2G_FFMPEG_BIN")
            .advanced()
            .default_value(V::str("ffmpeg")),
        E::new(F::FfprobeBin, "ffmpeg.ffprobeBin", "XG2G_FFPROBE_BIN").advanced(),
        E::new(F::FfmpegKillTimeout, "ffmpeg.killTimeout", "XG2G_FFMPEG_KILL_TIMEOUT")
            .advanced()
            .default_value(V::secs(5)),
        // VOD: typed block only; the flat XG2G_VOD_* variables are legacy.
        E::new(F::VodProbeSize, "vod.probeSize", "")
            .legacy("XG2G_VOD_PROBE_SIZE")
            .advanced()
            .default_value(V::str("50M")),
        E::new(F::VodAnalyzeDuration, "vod.analyzeDuration", "")
            .legacy("XG2G_VOD_ANALYZE_DURATION")
            .advanced()
            .default_value(V::str("50000000")),
        E::new(F::VodStallTimeout, "vod.stallTimeout", "")
            .legacy("XG2G_VOD_STALL_TIMEOUT")
            .advanced()
            .default_value(V::secs(60)),
        E::new(F::VodMaxConcurrent, "vod.maxConcurrent", "")
            .legacy("XG2G_VOD_MAX_CONCURRENT")
            .advanced()
            .default_value(V::Int(2)),
        E::new(F::VodCacheTtl, "vod.cacheTTL", "")
            .legacy("XG2G_VOD_CACHE_TTL")
            .advanced()
            .default_value(V::secs(24 * 3600)),
        E::new(F::VodCacheMaxEntries, "vod.cacheMaxEntries", "")
            .legacy("XG2G_VOD_CACHE_MAX_ENTRIES")
            .advanced()
            .default_value(V::Int(256)),
        // TLS
        E::new(F::TlsEnabled, "tls.enabled", "XG2G_TLS_ENABLED")
            .advanced()
            .default_value(V::Bool(false)),
        E::new(F::TlsCert, "tls.cert", "XG2G_TLS_CERT").advanced(),
        E::new(F::TlsKey, "tls.key", "XG2G_TLS_KEY").advanced(),
        E::new(F::TlsForceHttps, "tls.forceHTTPS", "XG2G_FORCE_HTTPS")
            .advanced()
            .default_value(V::Bool(false)),
        // Rate limiting
        E::new(F::RateLimitEnabled, "rateLimit.enabled", "XG2G_RATE_LIMIT_ENABLED")
            .advanced()
            .default_value(V::Bool(true))
            .hot(),
        E::new(F::RateLimitGlobal, "rateLimit.global", "XG2G_RATE_LIMIT_GLOBAL")
            .advanced()
            .default_value(V::Int(100))
            .hot(),
        E::new(F::RateLimitAuth, "rateLimit.auth", "XG2G_RATE_LIMIT_AUTH")
            .advanced()
            .default_value(V::Int(10))
            .hot(),
        E::new(F::RateLimitBurst, "rateLimit.burst", "XG2G_RATE_LIMIT_BURST")
            .advanced()
            .default_value(V::Int(20))
            .hot(),
        E::new(
            F::RateLimitWhitelist,
            "rateLimit.whitelist",
            "XG2G_RATE_LIMIT_WHITELIST",
        )
        .advanced()
        .hot(),
        // Network policy
        E::new(F::OutboundEnabled, "network.outbound.enabled", "XG2G_OUTBOUND_ENABLED")
            .advanced()
            .default_value(V::Bool(false)),
        E::new(
            F::OutboundHosts,
            "network.outbound.allow.hosts",
            "XG2G_OUTBOUND_ALLOW_HOSTS",
        )
        .advanced(),
        E::new(
            F::OutboundCidrs,
            "network.outbound.allow.cidrs",
            "XG2G_OUTBOUND_ALLOW_CIDRS",
        )
        .advanced(),
        E::new(
            F::OutboundPorts,
            "network.outbound.allow.ports",
            "XG2G_OUTBOUND_ALLOW_PORTS",
        )
        .advanced(),
        E::new(
            F::OutboundSchemes,
            "network.outbound.allow.schemes",
            "XG2G_OUTBOUND_ALLOW_SCHEMES",
        )
        .advanced(),
        // Metrics
        E::new(F::MetricsEnabled, "metrics.enabled", "XG2G_METRICS_ENABLED")
            .advanced()
            .default_value(V::Bool(false)),
        E::new(F::MetricsListenAddr, "metrics.listenAddr", "XG2G_METRICS_LISTEN").advanced(),
        // Streaming
        E::new(
            F::StreamingDeliveryPolicy,
            "streaming.deliveryPolicy",
            "XG2G_STREAMING_POLICY",
        )
        .default_value(V::str("universal")),
        // Verification
        E::new(F::VerificationEnabled, "verification.enabled", "XG2G_VERIFY_ENABLED")
            .advanced()
            .default_value(V::Bool(true))
            .hot(),
        E::new(
            F::VerificationInterval,
            "verification.interval",
            "XG2G_VERIFY_INTERVAL",
        )
        .advanced()
        .default_value(V::secs(60))
        .hot(),
        // Recordings
        E::new(F::RecordingRoots, "recording_roots", "").advanced(),
        E::new(
            F::RecordingPlaybackPolicy,
            "recording_playback.playback_policy",
            "",
        )
        .advanced()
        .default_value(V::str("auto")),
        E::new(
            F::RecordingStableWindow,
            "recording_playback.stable_window",
            "",
        )
        .advanced()
        .default_value(V::secs(10)),
        E::new(F::RecordingPathMappings, "recording_playback.mappings", "").advanced(),
        // Library
        E::new(F::LibraryEnabled, "library.enabled", "")
            .advanced()
            .default_value(V::Bool(false)),
        E::new(F::LibraryDbPath, "library.db_path", "").advanced(),
        E::new(F::LibraryRoots, "library.roots", "").advanced(),
    ]
}
