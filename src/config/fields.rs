//! Compile-time field table for [`AppConfig`].
//!
//! [`FieldId`] names every leaf of the resolved configuration. [`leaves`]
//! destructures the config without `..` rest patterns, so adding a struct
//! field without giving it a `FieldId` fails to compile. The registry audit
//! then checks that every `FieldId` has an entry.

use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

use super::scalar::format_duration;
use super::types::*;
use crate::error::{ConfigError, ConfigResult};

/// Identifier for one leaf of [`AppConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    // Core
    Version,
    ConfigVersion,
    ConfigStrict,
    ReadyStrict,
    DataDir,
    LogLevel,
    LogService,
    Bouquet,
    TrustedProxies,
    PiconBase,

    // Receiver
    E2BaseUrl,
    E2Username,
    E2Password,
    E2AuthMode,
    E2Timeout,
    E2ResponseHeaderTimeout,
    E2TuneTimeout,
    E2Retries,
    E2Backoff,
    E2MaxBackoff,
    E2StreamPort,
    E2UseWebIfStreams,
    E2RateLimit,
    E2RateBurst,
    E2UserAgent,
    E2AnalyzeDuration,
    E2ProbeSize,
    E2FallbackTo8001,
    E2PreflightTimeout,

    // API
    ApiToken,
    ApiTokenScopes,
    ApiTokens,
    ApiListenAddr,
    ApiAllowedOrigins,

    // EPG
    EpgEnabled,
    EpgDays,
    EpgMaxConcurrency,
    EpgTimeoutMs,
    EpgRetries,
    EpgFuzzyMax,
    EpgXmltvPath,
    EpgSource,
    EpgRefreshInterval,

    // Engine
    EngineEnabled,
    EngineMode,
    EngineIdleTimeout,
    EngineTunerSlots,
    EngineMaxPool,
    EngineGpuLimit,
    EngineCpuThresholdScale,

    // Store / HLS / FFmpeg / VOD
    StoreBackend,
    StorePath,
    HlsRoot,
    HlsDvrWindow,
    HlsSegmentSeconds,
    FfmpegBin,
    FfprobeBin,
    FfmpegKillTimeout,
    VodProbeSize,
    VodAnalyzeDuration,
    VodStallTimeout,
    VodMaxConcurrent,
    VodCacheTtl,
    VodCacheMaxEntries,

    // TLS
    TlsEnabled,
    TlsCert,
    TlsKey,
    TlsForceHttps,

    // Rate limiting
    RateLimitEnabled,
    RateLimitGlobal,
    RateLimitAuth,
    RateLimitBurst,
    RateLimitWhitelist,

    // Network policy
    OutboundEnabled,
    OutboundHosts,
    OutboundCidrs,
    OutboundPorts,
    OutboundSchemes,

    // Metrics / streaming / verification
    MetricsEnabled,
    MetricsListenAddr,
    StreamingDeliveryPolicy,
    VerificationEnabled,
    VerificationInterval,

    // Recordings
    RecordingRoots,
    RecordingPlaybackPolicy,
    RecordingStableWindow,
    RecordingPathMappings,

    // Library
    LibraryEnabled,
    LibraryDbPath,
    LibraryRoots,
}

impl FieldId {
    /// Internal dotted field path, unique per leaf.
    pub fn field_path(self) -> &'static str {
        use FieldId::*;
        match self {
            Version => "Version",
            ConfigVersion => "ConfigVersion",
            ConfigStrict => "ConfigStrict",
            ReadyStrict => "ReadyStrict",
            DataDir => "DataDir",
            LogLevel => "LogLevel",
            LogService => "LogService",
            Bouquet => "Bouquet",
            TrustedProxies => "TrustedProxies",
            PiconBase => "PiconBase",
            E2BaseUrl => "Enigma2.BaseURL",
            E2Username => "Enigma2.Username",
            E2Password => "Enigma2.Password",
            E2AuthMode => "Enigma2.AuthMode",
            E2Timeout => "Enigma2.Timeout",
            E2ResponseHeaderTimeout => "Enigma2.ResponseHeaderTimeout",
            E2TuneTimeout => "Enigma2.TuneTimeout",
            E2Retries => "Enigma2.Retries",
            E2Backoff => "Enigma2.Backoff",
            E2MaxBackoff => "Enigma2.MaxBackoff",
            E2StreamPort => "Enigma2.StreamPort",
            E2UseWebIfStreams => "Enigma2.UseWebIFStreams",
            E2RateLimit => "Enigma2.RateLimit",
            E2RateBurst => "Enigma2.RateBurst",
            E2UserAgent => "Enigma2.UserAgent",
            E2AnalyzeDuration => "Enigma2.AnalyzeDuration",
            E2ProbeSize => "Enigma2.ProbeSize",
            E2FallbackTo8001 => "Enigma2.FallbackTo8001",
            E2PreflightTimeout => "Enigma2.PreflightTimeout",
            ApiToken => "API.Token",
            ApiTokenScopes => "API.TokenScopes",
            ApiTokens => "API.Tokens",
            ApiListenAddr => "API.ListenAddr",
            ApiAllowedOrigins => "API.AllowedOrigins",
            EpgEnabled => "EPG.Enabled",
            EpgDays => "EPG.Days",
            EpgMaxConcurrency => "EPG.MaxConcurrency",
            EpgTimeoutMs => "EPG.TimeoutMS",
            EpgRetries => "EPG.Retries",
            EpgFuzzyMax => "EPG.FuzzyMax",
            EpgXmltvPath => "EPG.XMLTVPath",
            EpgSource => "EPG.Source",
            EpgRefreshInterval => "EPG.RefreshInterval",
            EngineEnabled => "Engine.Enabled",
            EngineMode => "Engine.Mode",
            EngineIdleTimeout => "Engine.IdleTimeout",
            EngineTunerSlots => "Engine.TunerSlots",
            EngineMaxPool => "Engine.MaxPool",
            EngineGpuLimit => "Engine.GPULimit",
            EngineCpuThresholdScale => "Engine.CPUThresholdScale",
            StoreBackend => "Store.Backend",
            StorePath => "Store.Path",
            HlsRoot => "HLS.Root",
            HlsDvrWindow => "HLS.DVRWindow",
            HlsSegmentSeconds => "HLS.SegmentSeconds",
            FfmpegBin => "FFmpeg.Bin",
            FfprobeBin => "FFmpeg.FFprobeBin",
            FfmpegKillTimeout => "FFmpeg.KillTimeout",
            VodProbeSize => "VOD.ProbeSize",
            VodAnalyzeDuration => "VOD.AnalyzeDuration",
            VodStallTimeout => "VOD.StallTimeout",
            VodMaxConcurrent => "VOD.MaxConcurrent",
            VodCacheTtl => "VOD.CacheTTL",
            VodCacheMaxEntries => "VOD.CacheMaxEntries",
            TlsEnabled => "TLS.Enabled",
            TlsCert => "TLS.Cert",
            TlsKey => "TLS.Key",
            TlsForceHttps => "TLS.ForceHTTPS",
            RateLimitEnabled => "RateLimit.Enabled",
            RateLimitGlobal => "RateLimit.Global",
            RateLimitAuth => "RateLimit.Auth",
            RateLimitBurst => "RateLimit.Burst",
            RateLimitWhitelist => "RateLimit.Whitelist",
            OutboundEnabled => "Network.Outbound.Enabled",
            OutboundHosts => "Network.Outbound.Allow.Hosts",
            OutboundCidrs => "Network.Outbound.Allow.CIDRs",
            OutboundPorts => "Network.Outbound.Allow.Ports",
            OutboundSchemes => "Network.Outbound.Allow.Schemes",
            MetricsEnabled => "Metrics.Enabled",
            MetricsListenAddr => "Metrics.ListenAddr",
            StreamingDeliveryPolicy => "Streaming.DeliveryPolicy",
            VerificationEnabled => "Verification.Enabled",
            VerificationInterval => "Verification.Interval",
            RecordingRoots => "Recording.Roots",
            RecordingPlaybackPolicy => "Recording.PlaybackPolicy",
            RecordingStableWindow => "Recording.StableWindow",
            RecordingPathMappings => "Recording.PathMappings",
            LibraryEnabled => "Library.Enabled",
            LibraryDbPath => "Library.DBPath",
            LibraryRoots => "Library.Roots",
        }
    }

    /// Comma-joined list stored as a single string.
    ///
    /// The diff engine compares these as sorted sets.
    pub fn is_comma_list(self) -> bool {
        matches!(self, FieldId::Bouquet | FieldId::TrustedProxies)
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_path())
    }
}

/// Dynamically typed leaf value, used for defaults, auditing and diffing.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// An optional leaf holding nothing.
    Unset,
    Str(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    Duration(Duration),
    List(Vec<String>),
    IntList(Vec<i64>),
    Map(BTreeMap<String, String>),
    Tokens(Vec<ScopedToken>),
    Mappings(Vec<PathMapping>),
    LibraryRoots(Vec<LibraryRoot>),
}

impl ConfigValue {
    pub fn str(s: &str) -> Self {
        ConfigValue::Str(s.to_string())
    }

    pub fn secs(secs: u64) -> Self {
        ConfigValue::Duration(Duration::from_secs(secs))
    }

    pub fn millis(ms: u64) -> Self {
        ConfigValue::Duration(Duration::from_millis(ms))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Unset => "unset",
            ConfigValue::Str(_) => "string",
            ConfigValue::Int(_) => "int",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Float(_) => "float",
            ConfigValue::Duration(_) => "duration",
            ConfigValue::List(_) => "string list",
            ConfigValue::IntList(_) => "int list",
            ConfigValue::Map(_) => "map",
            ConfigValue::Tokens(_) => "scoped tokens",
            ConfigValue::Mappings(_) => "path mappings",
            ConfigValue::LibraryRoots(_) => "library roots",
        }
    }

    /// JSON rendering for display; durations use the Go string form.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Unset => Value::Null,
            ConfigValue::Str(s) => json!(s),
            ConfigValue::Int(i) => json!(i),
            ConfigValue::Bool(b) => json!(b),
            ConfigValue::Float(f) => json!(f),
            ConfigValue::Duration(d) => json!(format_duration(*d)),
            ConfigValue::List(v) => json!(v),
            ConfigValue::IntList(v) => json!(v),
            ConfigValue::Map(m) => json!(m),
            ConfigValue::Tokens(t) => serde_json::to_value(t).unwrap_or(Value::Null),
            ConfigValue::Mappings(m) => serde_json::to_value(m).unwrap_or(Value::Null),
            ConfigValue::LibraryRoots(r) => serde_json::to_value(r).unwrap_or(Value::Null),
        }
    }
}

/// Every leaf of `cfg`, in declaration order.
pub fn leaves(cfg: &AppConfig) -> Vec<(FieldId, ConfigValue)> {
    use ConfigValue as V;
    use FieldId as F;

    let AppConfig {
        version,
        config_version,
        config_strict,
        ready_strict,
        data_dir,
        log_level,
        log_service,
        bouquet,
        trusted_proxies,
        picon_base,
        enigma2,
        api,
        epg,
        engine,
        store,
        hls,
        ffmpeg,
        vod,
        tls,
        rate_limit,
        network,
        metrics,
        streaming,
        verification,
        recording,
        library,
    } = cfg;
    let Enigma2Settings {
        base_url,
        username,
        password,
        auth_mode,
        timeout,
        response_header_timeout,
        tune_timeout,
        retries,
        backoff,
        max_backoff,
        stream_port,
        use_webif_streams,
        rate_limit: e2_rate_limit,
        rate_burst,
        user_agent,
        analyze_duration,
        probe_size,
        fallback_to_8001,
        preflight_timeout,
    } = enigma2;
    let ApiSettings {
        token,
        token_scopes,
        tokens,
        listen_addr,
        allowed_origins,
    } = api;
    let EpgSettings {
        enabled: epg_enabled,
        days,
        max_concurrency,
        timeout_ms,
        retries: epg_retries,
        fuzzy_max,
        xmltv_path,
        source,
        refresh_interval,
    } = epg;
    let EngineSettings {
        enabled: engine_enabled,
        mode,
        idle_timeout,
        tuner_slots,
        max_pool,
        gpu_limit,
        cpu_threshold_scale,
    } = engine;
    let StoreSettings {
        backend,
        path: store_path,
    } = store;
    let HlsSettings {
        root: hls_root,
        dvr_window,
        segment_seconds,
    } = hls;
    let FfmpegSettings {
        bin,
        ffprobe_bin,
        kill_timeout,
    } = ffmpeg;
    let VodSettings {
        probe_size: vod_probe_size,
        analyze_duration: vod_analyze_duration,
        stall_timeout,
        max_concurrent,
        cache_ttl,
        cache_max_entries,
    } = vod;
    let TlsSettings {
        enabled: tls_enabled,
        cert,
        key,
        force_https,
    } = tls;
    let RateLimitSettings {
        enabled: rl_enabled,
        global,
        auth,
        burst,
        whitelist,
    } = rate_limit;
    let NetworkSettings {
        outbound:
            OutboundSettings {
                enabled: outbound_enabled,
                hosts,
                cidrs,
                ports,
                schemes,
            },
    } = network;
    let MetricsSettings {
        enabled: metrics_enabled,
        listen_addr: metrics_addr,
    } = metrics;
    let StreamingSettings { delivery_policy } = streaming;
    let VerificationSettings {
        enabled: verification_enabled,
        interval,
    } = verification;
    let RecordingSettings {
        roots: recording_roots,
        playback_policy,
        stable_window,
        path_mappings,
    } = recording;
    let LibrarySettings {
        enabled: library_enabled,
        db_path,
        roots: library_roots,
    } = library;

    let opt = |v: &Option<String>| match v {
        Some(s) => V::Str(s.clone()),
        None => V::Unset,
    };

    vec![
        (F::Version, V::Str(version.clone())),
        (F::ConfigVersion, V::Str(config_version.clone())),
        (F::ConfigStrict, V::Bool(*config_strict)),
        (F::ReadyStrict, V::Bool(*ready_strict)),
        (F::DataDir, V::Str(data_dir.clone())),
        (F::LogLevel, V::Str(log_level.clone())),
        (F::LogService, V::Str(log_service.clone())),
        (F::Bouquet, V::Str(bouquet.clone())),
        (F::TrustedProxies, V::Str(trusted_proxies.clone())),
        (F::PiconBase, V::Str(picon_base.clone())),
        (F::E2BaseUrl, V::Str(base_url.clone())),
        (F::E2Username, V::Str(username.clone())),
        (F::E2Password, V::Str(password.clone())),
        (F::E2AuthMode, V::Str(auth_mode.clone())),
        (F::E2Timeout, V::Duration(*timeout)),
        (F::E2ResponseHeaderTimeout, V::Duration(*response_header_timeout)),
        (F::E2TuneTimeout, V::Duration(*tune_timeout)),
        (F::E2Retries, V::Int(*retries)),
        (F::E2Backoff, V::Duration(*backoff)),
        (F::E2MaxBackoff, V::Duration(*max_backoff)),
        (F::E2StreamPort, V::Int(*stream_port)),
        (F::E2UseWebIfStreams, V::Bool(*use_webif_streams)),
        (F::E2RateLimit, V::Int(*e2_rate_limit)),
        (F::E2RateBurst, V::Int(*rate_burst)),
        (F::E2UserAgent, V::Str(user_agent.clone())),
        (F::E2AnalyzeDuration, V::Str(analyze_duration.clone())),
        (F::E2ProbeSize, V::Str(probe_size.clone())),
        (F::E2FallbackTo8001, V::Bool(*fallback_to_8001)),
        (F::E2PreflightTimeout, V::Duration(*preflight_timeout)),
        (F::ApiToken, V::Str(token.clone())),
        (F::ApiTokenScopes, V::List(token_scopes.clone())),
        (F::ApiTokens, V::Tokens(tokens.clone())),
        (F::ApiListenAddr, V::Str(listen_addr.clone())),
        (F::ApiAllowedOrigins, V::List(allowed_origins.clone())),
        (F::EpgEnabled, V::Bool(*epg_enabled)),
        (F::EpgDays, V::Int(*days)),
        (F::EpgMaxConcurrency, V::Int(*max_concurrency)),
        (F::EpgTimeoutMs, V::Int(*timeout_ms)),
        (F::EpgRetries, V::Int(*epg_retries)),
        (F::EpgFuzzyMax, V::Int(*fuzzy_max)),
        (F::EpgXmltvPath, V::Str(xmltv_path.clone())),
        (F::EpgSource, V::Str(source.clone())),
        (F::EpgRefreshInterval, V::Duration(*refresh_interval)),
        (F::EngineEnabled, V::Bool(*engine_enabled)),
        (F::EngineMode, V::Str(mode.clone())),
        (F::EngineIdleTimeout, V::Duration(*idle_timeout)),
        (F::EngineTunerSlots, V::IntList(tuner_slots.clone())),
        (F::EngineMaxPool, V::Int(*max_pool)),
        (F::EngineGpuLimit, V::Int(*gpu_limit)),
        (F::EngineCpuThresholdScale, V::Float(*cpu_threshold_scale)),
        (F::StoreBackend, V::Str(backend.clone())),
        (F::StorePath, opt(store_path)),
        (F::HlsRoot, V::Str(hls_root.clone())),
        (F::HlsDvrWindow, V::Duration(*dvr_window)),
        (F::HlsSegmentSeconds, V::Int(*segment_seconds)),
        (F::FfmpegBin, V::Str(bin.clone())),
        (F::FfprobeBin, V::Str(ffprobe_bin.clone())),
        (F::FfmpegKillTimeout, V::Duration(*kill_timeout)),
        (F::VodProbeSize, V::Str(vod_probe_size.clone())),
        (F::VodAnalyzeDuration, V::Str(vod_analyze_duration.clone())),
        (F::VodStallTimeout, V::Duration(*stall_timeout)),
        (F::VodMaxConcurrent, V::Int(*max_concurrent)),
        (F::VodCacheTtl, V::Duration(*cache_ttl)),
        (F::VodCacheMaxEntries, V::Int(*cache_max_entries)),
        (F::TlsEnabled, V::Bool(*tls_enabled)),
        (F::TlsCert, opt(cert)),
        (F::TlsKey, opt(key)),
        (F::TlsForceHttps, V::Bool(*force_https)),
        (F::RateLimitEnabled, V::Bool(*rl_enabled)),
        (F::RateLimitGlobal, V::Int(*global)),
        (F::RateLimitAuth, V::Int(*auth)),
        (F::RateLimitBurst, V::Int(*burst)),
        (F::RateLimitWhitelist, V::List(whitelist.clone())),
        (F::OutboundEnabled, V::Bool(*outbound_enabled)),
        (F::OutboundHosts, V::List(hosts.clone())),
        (F::OutboundCidrs, V::List(cidrs.clone())),
        (F::OutboundPorts, V::IntList(ports.clone())),
        (F::OutboundSchemes, V::List(schemes.clone())),
        (F::MetricsEnabled, V::Bool(*metrics_enabled)),
        (F::MetricsListenAddr, V::Str(metrics_addr.clone())),
        (F::StreamingDeliveryPolicy, V::Str(delivery_policy.clone())),
        (F::VerificationEnabled, V::Bool(*verification_enabled)),
        (F::VerificationInterval, V::Duration(*interval)),
        (F::RecordingRoots, V::Map(recording_roots.clone())),
        (F::RecordingPlaybackPolicy, V::Str(playback_policy.clone())),
        (F::RecordingStableWindow, V::Duration(*stable_window)),
        (F::RecordingPathMappings, V::Mappings(path_mappings.clone())),
        (F::LibraryEnabled, V::Bool(*library_enabled)),
        (F::LibraryDbPath, V::Str(db_path.clone())),
        (F::LibraryRoots, V::LibraryRoots(library_roots.clone())),
    ]
}

fn mismatch(field: FieldId, expected: &str, got: &ConfigValue) -> ConfigError {
    ConfigError::registry(format!(
        "type mismatch for {}: expected {}, got {}",
        field.field_path(),
        expected,
        got.type_name()
    ))
    .with_field(field.field_path())
}

macro_rules! assign {
    ($slot:expr, $field:expr, $value:expr, $variant:ident, $expected:literal) => {
        match $value {
            ConfigValue::$variant(v) => {
                $slot = v;
                Ok(())
            }
            other => Err(mismatch($field, $expected, &other)),
        }
    };
}

/// Optional leaves keep an explicitly set value.
macro_rules! assign_if_unset {
    ($slot:expr, $field:expr, $value:expr) => {
        match $value {
            ConfigValue::Str(v) => {
                if $slot.is_none() {
                    $slot = Some(v);
                }
                Ok(())
            }
            ConfigValue::Unset => Ok(()),
            other => Err(mismatch($field, "string", &other)),
        }
    };
}

/// Write a registry default into `cfg`.
///
/// Plain leaves are always written; optional leaves only when they are
/// still `None`. A value of the wrong shape is a registry bug.
pub fn apply_default(cfg: &mut AppConfig, field: FieldId, value: ConfigValue) -> ConfigResult<()> {
    use FieldId as F;
    let f = field;
    match field {
        F::Version => assign!(cfg.version, f, value, Str, "string"),
        F::ConfigVersion => assign!(cfg.config_version, f, value, Str, "string"),
        F::ConfigStrict => assign!(cfg.config_strict, f, value, Bool, "bool"),
        F::ReadyStrict => assign!(cfg.ready_strict, f, value, Bool, "bool"),
        F::DataDir => assign!(cfg.data_dir, f, value, Str, "string"),
        F::LogLevel => assign!(cfg.log_level, f, value, Str, "string"),
        F::LogService => assign!(cfg.log_service, f, value, Str, "string"),
        F::Bouquet => assign!(cfg.bouquet, f, value, Str, "string"),
        F::TrustedProxies => assign!(cfg.trusted_proxies, f, value, Str, "string"),
        F::PiconBase => assign!(cfg.picon_base, f, value, Str, "string"),
        F::E2BaseUrl => assign!(cfg.enigma2.base_url, f, value, Str, "string"),
        F::E2Username => assign!(cfg.enigma2.username, f, value, Str, "string"),
        F::E2Password => assign!(cfg.enigma2.password, f, value, Str, "string"),
        F::E2AuthMode => assign!(cfg.enigma2.auth_mode, f, value, Str, "string"),
        F::E2Timeout => assign!(cfg.enigma2.timeout, f, value, Duration, "duration"),
        F::E2ResponseHeaderTimeout => {
            assign!(cfg.enigma2.response_header_timeout, f, value, Duration, "duration")
        }
        F::E2TuneTimeout => assign!(cfg.enigma2.tune_timeout, f, value, Duration, "duration"),
        F::E2Retries => assign!(cfg.enigma2.retries, f, value, Int, "int"),
        F::E2Backoff => assign!(cfg.enigma2.backoff, f, value, Duration, "duration"),
        F::E2MaxBackoff => assign!(cfg.enigma2.max_backoff, f, value, Duration, "duration"),
        F::E2StreamPort => assign!(cfg.enigma2.stream_port, f, value, Int, "int"),
        F::E2UseWebIfStreams => assign!(cfg.enigma2.use_webif_streams, f, value, Bool, "bool"),
        F::E2RateLimit => assign!(cfg.enigma2.rate_limit, f, value, Int, "int"),
        F::E2RateBurst => assign!(cfg.enigma2.rate_burst, f, value, Int, "int"),
        F::E2UserAgent => assign!(cfg.enigma2.user_agent, f, value, Str, "string"),
        F::E2AnalyzeDuration => assign!(cfg.enigma2.analyze_duration, f, value, Str, "string"),
        F::E2ProbeSize => assign!(cfg.enigma2.probe_size, f, value, Str, "string"),
        F::E2FallbackTo8001 => assign!(cfg.enigma2.fallback_to_8001, f, value, Bool, "bool"),
        F::E2PreflightTimeout => {
            assign!(cfg.enigma2.preflight_timeout, f, value, Duration, "duration")
        }
        F::ApiToken => assign!(cfg.api.token, f, value, Str, "string"),
        F::ApiTokenScopes => assign!(cfg.api.token_scopes, f, value, List, "string list"),
        F::ApiTokens => assign!(cfg.api.tokens, f, value, Tokens, "scoped tokens"),
        F::ApiListenAddr => assign!(cfg.api.listen_addr, f, value, Str, "string"),
        F::ApiAllowedOrigins => assign!(cfg.api.allowed_origins, f, value, List, "string list"),
        F::EpgEnabled => assign!(cfg.epg.enabled, f, value, Bool, "bool"),
        F::EpgDays => assign!(cfg.epg.days, f, value, Int, "int"),
        F::EpgMaxConcurrency => assign!(cfg.epg.max_concurrency, f, value, Int, "int"),
        F::EpgTimeoutMs => assign!(cfg.epg.timeout_ms, f, value, Int, "int"),
        F::EpgRetries => assign!(cfg.epg.retries, f, value, Int, "int"),
        F::EpgFuzzyMax => assign!(cfg.epg.fuzzy_max, f, value, Int, "int"),
        F::EpgXmltvPath => assign!(cfg.epg.xmltv_path, f, value, Str, "string"),
        F::EpgSource => assign!(cfg.epg.source, f, value, Str, "string"),
        F::EpgRefreshInterval => {
            assign!(cfg.epg.refresh_interval, f, value, Duration, "duration")
        }
        F::EngineEnabled => assign!(cfg.engine.enabled, f, value, Bool, "bool"),
        F::EngineMode => assign!(cfg.engine.mode, f, value, Str, "string"),
        F::EngineIdleTimeout => assign!(cfg.engine.idle_timeout, f, value, Duration, "duration"),
        F::EngineTunerSlots => assign!(cfg.engine.tuner_slots, f, value, IntList, "int list"),
        F::EngineMaxPool => assign!(cfg.engine.max_pool, f, value, Int, "int"),
        F::EngineGpuLimit => assign!(cfg.engine.gpu_limit, f, value, Int, "int"),
        F::EngineCpuThresholdScale => {
            assign!(cfg.engine.cpu_threshold_scale, f, value, Float, "float")
        }
        F::StoreBackend => assign!(cfg.store.backend, f, value, Str, "string"),
        F::StorePath => assign_if_unset!(cfg.store.path, f, value),
        F::HlsRoot => assign!(cfg.hls.root, f, value, Str, "string"),
        F::HlsDvrWindow => assign!(cfg.hls.dvr_window, f, value, Duration, "duration"),
        F::HlsSegmentSeconds => assign!(cfg.hls.segment_seconds, f, value, Int, "int"),
        F::FfmpegBin => assign!(cfg.ffmpeg.bin, f, value, Str, "string"),
        F::FfprobeBin => assign!(cfg.ffmpeg.ffprobe_bin, f, value, Str, "string"),
        F::FfmpegKillTimeout => assign!(cfg.ffmpeg.kill_timeout, f, value, Duration, "duration"),
        F::VodProbeSize => assign!(cfg.vod.probe_size, f, value, Str, "string"),
        F::VodAnalyzeDuration => assign!(cfg.vod.analyze_duration, f, value, Str, "string"),
        F::VodStallTimeout => assign!(cfg.vod.stall_timeout, f, value, Duration, "duration"),
        F::VodMaxConcurrent => assign!(cfg.vod.max_concurrent, f, value, Int, "int"),
        F::VodCacheTtl => assign!(cfg.vod.cache_ttl, f, value, Duration, "duration"),
        F::VodCacheMaxEntries => assign!(cfg.vod.cache_max_entries, f, value, Int, "int"),
        F::TlsEnabled => assign!(cfg.tls.enabled, f, value, Bool, "bool"),
        F::TlsCert => assign_if_unset!(cfg.tls.cert, f, value),
        F::TlsKey => assign_if_unset!(cfg.tls.key, f, value),
        F::TlsForceHttps => assign!(cfg.tls.force_https, f, value, Bool, "bool"),
        F::RateLimitEnabled => assign!(cfg.rate_limit.enabled, f, value, Bool, "bool"),
        F::RateLimitGlobal => assign!(cfg.rate_limit.global, f, value, Int, "int"),
        F::RateLimitAuth => assign!(cfg.rate_limit.auth, f, value, Int, "int"),
        F::RateLimitBurst => assign!(cfg.rate_limit.burst, f, value, Int, "int"),
        F::RateLimitWhitelist => assign!(cfg.rate_limit.whitelist, f, value, List, "string list"),
        F::OutboundEnabled => assign!(cfg.network.outbound.enabled, f, value, Bool, "bool"),
        F::OutboundHosts => assign!(cfg.network.outbound.hosts, f, value, List, "string list"),
        F::OutboundCidrs => assign!(cfg.network.outbound.cidrs, f, value, List, "string list"),
        F::OutboundPorts => assign!(cfg.network.outbound.ports, f, value, IntList, "int list"),
        F::OutboundSchemes => {
            assign!(cfg.network.outbound.schemes, f, value, List, "string list")
        }
        F::MetricsEnabled => assign!(cfg.metrics.enabled, f, value, Bool, "bool"),
        F::MetricsListenAddr => assign!(cfg.metrics.listen_addr, f, value, Str, "string"),
        F::StreamingDeliveryPolicy => {
            assign!(cfg.streaming.delivery_policy, f, value, Str, "string")
        }
        F::VerificationEnabled => assign!(cfg.verification.enabled, f, value, Bool, "bool"),
        F::VerificationInterval => {
            assign!(cfg.verification.interval, f, value, Duration, "duration")
        }
        F::RecordingRoots => assign!(cfg.recording.roots, f, value, Map, "map"),
        F::RecordingPlaybackPolicy => {
            assign!(cfg.recording.playback_policy, f, value, Str, "string")
        }
        F::RecordingStableWindow => {
            assign!(cfg.recording.stable_window, f, value, Duration, "duration")
        }
        F::RecordingPathMappings => {
            assign!(cfg.recording.path_mappings, f, value, Mappings, "path mappings")
        }
        F::LibraryEnabled => assign!(cfg.library.enabled, f, value, Bool, "bool"),
        F::LibraryDbPath => assign!(cfg.library.db_path, f, value, Str, "string"),
        F::LibraryRoots => assign!(cfg.library.roots, f, value, LibraryRoots, "library roots"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_leaves_are_unique() {
        let cfg = AppConfig::default();
        let ids: Vec<FieldId> = leaves(&cfg).into_iter().map(|(id, _)| id).collect();
        let unique: HashSet<FieldId> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
    }

    #[test]
    fn test_field_paths_are_unique() {
        let cfg = AppConfig::default();
        let paths: HashSet<&str> = leaves(&cfg)
            .into_iter()
            .map(|(id, _)| id.field_path())
            .collect();
        assert_eq!(paths.len(), leaves(&cfg).len());
    }

    #[test]
    fn test_apply_default_type_mismatch_is_registry_error() {
        let mut cfg = AppConfig::default();
        let err = apply_default(&mut cfg, FieldId::EpgDays, ConfigValue::Bool(true)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Registry);
        assert!(err.to_string().contains("EPG.Days"));
    }

    #[test]
    fn test_optional_leaf_keeps_explicit_value() {
        let mut cfg = AppConfig::default();
        cfg.store.path = Some("/srv/store".to_string());
        apply_default(&mut cfg, FieldId::StorePath, ConfigValue::str("/var/lib/xg2g/store"))
            .unwrap();
        assert_eq!(cfg.store.path.as_deref(), Some("/srv/store"));

        cfg.store.path = None;
        apply_default(&mut cfg, FieldId::StorePath, ConfigValue::str("/var/lib/xg2g/store"))
            .unwrap();
        assert_eq!(cfg.store.path.as_deref(), Some("/var/lib/xg2g/store"));
    }

    #[test]
    fn test_leaf_reflects_assignment() {
        let mut cfg = AppConfig::default();
        apply_default(&mut cfg, FieldId::E2MaxBackoff, ConfigValue::secs(30)).unwrap();
        let value = leaves(&cfg)
            .into_iter()
            .find(|(id, _)| *id == FieldId::E2MaxBackoff)
            .map(|(_, v)| v);
        assert_eq!(value, Some(ConfigValue::secs(30)));
    }

    #[test]
    fn test_duration_renders_go_style() {
        assert_eq!(ConfigValue::millis(200).to_json(), json!("200ms"));
        assert_eq!(ConfigValue::Unset.to_json(), Value::Null);
    }
}
