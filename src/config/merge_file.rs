//! File merge stage.
//!
//! Applies a strictly decoded [`FileConfig`] onto the defaulted config.
//! A leaf written in the file (`Some`) replaces the current value, zero
//! values included; `None` leaves it alone. Lists replace wholesale when
//! non-empty, recording roots merge key by key. Duration text is parsed
//! here and a bad value is a hard error naming the key.
//!
//! Conflict checks have already passed when this runs.

use std::collections::BTreeMap;
use std::time::Duration;

use super::file::*;
use super::scalar::{EnvSource, expand_env, parse_go_duration};
use super::types::AppConfig;
use crate::error::{ConfigError, ConfigResult};

/// Receiver credentials written under the legacy names.
///
/// Kept apart from the canonical pair; `authMode: inherit` decides whether
/// they are used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyCredentials {
    pub username: String,
    pub password: String,
}

impl LegacyCredentials {
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

fn set<T: Clone>(dst: &mut T, src: &Option<T>) {
    if let Some(v) = src {
        *dst = v.clone();
    }
}

fn set_expanded(dst: &mut String, src: &Option<String>, env: &dyn EnvSource) {
    if let Some(v) = src {
        *dst = expand_env(env, v);
    }
}

fn set_optional(dst: &mut Option<String>, src: &Option<String>, env: &dyn EnvSource) {
    if let Some(v) = src {
        *dst = Some(expand_env(env, v));
    }
}

fn set_list<T: Clone>(dst: &mut Vec<T>, src: &Option<Vec<T>>) {
    if let Some(v) = src
        && !v.is_empty()
    {
        *dst = v.clone();
    }
}

fn set_duration(dst: &mut Duration, src: &Option<String>, key: &str) -> ConfigResult<()> {
    if let Some(raw) = src {
        *dst = parse_go_duration(raw).map_err(|e| ConfigError::invalid_value(key, e))?;
    }
    Ok(())
}

/// Merge `src` into `dst`.
pub fn merge_file_config(
    dst: &mut AppConfig,
    src: &FileConfig,
    env: &dyn EnvSource,
    legacy: &mut LegacyCredentials,
) -> ConfigResult<()> {
    let FileConfig {
        version: _,
        config_version,
        config_strict,
        ready_strict,
        data_dir,
        log_level,
        log_service,
        trusted_proxies,
        bouquets,
        open_webif,
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
        picons,
        streaming,
        verification,
        recording_roots,
        recording_playback,
        library,
    } = src;

    // Core
    set(&mut dst.config_version, config_version);
    set(&mut dst.config_strict, config_strict);
    set(&mut dst.ready_strict, ready_strict);
    set_expanded(&mut dst.data_dir, data_dir, env);
    set(&mut dst.log_level, log_level);
    set(&mut dst.log_service, log_service);
    if let Some(list) = trusted_proxies
        && !list.is_empty()
    {
        dst.trusted_proxies = list.join(",");
    }

    // Receiver: legacy namespace first, canonical second.
    if let Some(owi) = open_webif {
        merge_open_webif(dst, owi, env, legacy)?;
    }
    if let Some(e2) = enigma2 {
        merge_enigma2(dst, e2, env)?;
    }

    if let Some(list) = bouquets
        && !list.is_empty()
    {
        dst.bouquet = list.join(",");
    }

    if let Some(epg) = epg {
        merge_epg(dst, epg)?;
    }

    if let Some(roots) = recording_roots {
        merge_roots(&mut dst.recording.roots, roots);
    }
    if let Some(playback) = recording_playback {
        set(&mut dst.recording.playback_policy, &playback.playback_policy);
        set_duration(
            &mut dst.recording.stable_window,
            &playback.stable_window,
            "recording_playback.stable_window",
        )?;
    }

    if let Some(api) = api {
        set_expanded(&mut dst.api.token, &api.token, env);
        set_list(&mut dst.api.token_scopes, &api.token_scopes);
        set_list(&mut dst.api.tokens, &api.tokens);
        set_expanded(&mut dst.api.listen_addr, &api.listen_addr, env);
        set_list(&mut dst.api.allowed_origins, &api.allowed_origins);
    }

    if let Some(rl) = rate_limit {
        set(&mut dst.rate_limit.enabled, &rl.enabled);
        set(&mut dst.rate_limit.global, &rl.global);
        set(&mut dst.rate_limit.auth, &rl.auth);
        set(&mut dst.rate_limit.burst, &rl.burst);
        set_list(&mut dst.rate_limit.whitelist, &rl.whitelist);
    }

    if let Some(outbound) = network.as_ref().and_then(|n| n.outbound.as_ref()) {
        let dst_out = &mut dst.network.outbound;
        set(&mut dst_out.enabled, &outbound.enabled);
        if let Some(allow) = &outbound.allow {
            set_list(&mut dst_out.hosts, &allow.hosts);
            set_list(&mut dst_out.cidrs, &allow.cidrs);
            set_list(&mut dst_out.ports, &allow.ports);
            set_list(&mut dst_out.schemes, &allow.schemes);
        }
    }

    if let Some(metrics) = metrics {
        set(&mut dst.metrics.enabled, &metrics.enabled);
        set_expanded(&mut dst.metrics.listen_addr, &metrics.listen_addr, env);
    }

    if let Some(picons) = picons {
        set_expanded(&mut dst.picon_base, &picons.base_url, env);
    }

    if let Some(streaming) = streaming {
        set(&mut dst.streaming.delivery_policy, &streaming.delivery_policy);
    }

    if let Some(hls) = hls {
        set_expanded(&mut dst.hls.root, &hls.root, env);
        set_duration(&mut dst.hls.dvr_window, &hls.dvr_window, "hls.dvrWindow")?;
        set(&mut dst.hls.segment_seconds, &hls.segment_seconds);
    }

    if let Some(ffmpeg) = ffmpeg {
        set_expanded(&mut dst.ffmpeg.bin, &ffmpeg.bin, env);
        set_expanded(&mut dst.ffmpeg.ffprobe_bin, &ffmpeg.ffprobe_bin, env);
        set_duration(
            &mut dst.ffmpeg.kill_timeout,
            &ffmpeg.kill_timeout,
            "ffmpeg.killTimeout",
        )?;
    }

    if let Some(engine) = engine {
        set(&mut dst.engine.enabled, &engine.enabled);
        set(&mut dst.engine.mode, &engine.mode);
        set_duration(
            &mut dst.engine.idle_timeout,
            &engine.idle_timeout,
            "engine.idleTimeout",
        )?;
        set_list(&mut dst.engine.tuner_slots, &engine.tuner_slots);
        set(&mut dst.engine.max_pool, &engine.max_pool);
        set(&mut dst.engine.gpu_limit, &engine.gpu_limit);
        set(&mut dst.engine.cpu_threshold_scale, &engine.cpu_threshold_scale);
    }

    if let Some(store) = store {
        set(&mut dst.store.backend, &store.backend);
        set_optional(&mut dst.store.path, &store.path, env);
    }

    if let Some(tls) = tls {
        set(&mut dst.tls.enabled, &tls.enabled);
        set_optional(&mut dst.tls.cert, &tls.cert, env);
        set_optional(&mut dst.tls.key, &tls.key, env);
        set(&mut dst.tls.force_https, &tls.force_https);
    }

    if let Some(library) = library {
        set(&mut dst.library.enabled, &library.enabled);
        set_expanded(&mut dst.library.db_path, &library.db_path, env);
        if let Some(roots) = &library.roots
            && !roots.is_empty()
        {
            dst.library.roots = roots
                .iter()
                .map(|r| {
                    let mut root = r.clone();
                    root.path = expand_env(env, &r.path);
                    root
                })
                .collect();
        }
    }

    if let Some(playback) = recording_playback {
        set_list(&mut dst.recording.path_mappings, &playback.mappings);
    }

    if let Some(verification) = verification {
        set(&mut dst.verification.enabled, &verification.enabled);
        set_duration(
            &mut dst.verification.interval,
            &verification.interval,
            "verification.interval",
        )?;
    }

    if let Some(vod) = vod {
        merge_vod(dst, vod)?;
    }

    Ok(())
}

fn merge_open_webif(
    dst: &mut AppConfig,
    src: &OpenWebIfFile,
    env: &dyn EnvSource,
    legacy: &mut LegacyCredentials,
) -> ConfigResult<()> {
    let e2 = &mut dst.enigma2;
    set_expanded(&mut e2.base_url, &src.base_url, env);
    set_expanded(&mut legacy.username, &src.username, env);
    set_expanded(&mut legacy.password, &src.password, env);
    set_duration(&mut e2.timeout, &src.timeout, "openWebIF.timeout")?;
    set(&mut e2.retries, &src.retries);
    set_duration(&mut e2.backoff, &src.backoff, "openWebIF.backoff")?;
    set_duration(&mut e2.max_backoff, &src.max_backoff, "openWebIF.maxBackoff")?;
    set(&mut e2.stream_port, &src.stream_port);
    set(&mut e2.use_webif_streams, &src.use_webif_streams);
    Ok(())
}

fn merge_enigma2(dst: &mut AppConfig, src: &Enigma2File, env: &dyn EnvSource) -> ConfigResult<()> {
    let e2 = &mut dst.enigma2;
    set_expanded(&mut e2.base_url, &src.base_url, env);
    set_expanded(&mut e2.username, &src.username, env);
    set_expanded(&mut e2.password, &src.password, env);
    if let Some(mode) = &src.auth_mode {
        e2.auth_mode = mode.trim().to_ascii_lowercase();
    }
    set_duration(&mut e2.timeout, &src.timeout, "enigma2.timeout")?;
    set_duration(
        &mut e2.response_header_timeout,
        &src.response_header_timeout,
        "enigma2.responseHeaderTimeout",
    )?;
    set_duration(&mut e2.tune_timeout, &src.tune_timeout, "enigma2.tuneTimeout")?;
    set(&mut e2.retries, &src.retries);
    set_duration(&mut e2.backoff, &src.backoff, "enigma2.backoff")?;
    set_duration(&mut e2.max_backoff, &src.max_backoff, "enigma2.maxBackoff")?;
    set(&mut e2.stream_port, &src.stream_port);
    set(&mut e2.use_webif_streams, &src.use_webif_streams);
    set(&mut e2.rate_limit, &src.rate_limit);
    set(&mut e2.rate_burst, &src.rate_burst);
    set(&mut e2.user_agent, &src.user_agent);
    set(&mut e2.analyze_duration, &src.analyze_duration);
    set(&mut e2.probe_size, &src.probe_size);
    set(&mut e2.fallback_to_8001, &src.fallback_to_8001);
    set_duration(
        &mut e2.preflight_timeout,
        &src.preflight_timeout,
        "enigma2.preflightTimeout",
    )?;
    Ok(())
}

fn merge_epg(dst: &mut AppConfig, src: &EpgFile) -> ConfigResult<()> {
    let epg = &mut dst.epg;
    set(&mut epg.enabled, &src.enabled);
    set(&mut epg.days, &src.days);
    set(&mut epg.max_concurrency, &src.max_concurrency);
    set(&mut epg.timeout_ms, &src.timeout_ms);
    set(&mut epg.retries, &src.retries);
    set(&mut epg.fuzzy_max, &src.fuzzy_max);
    set(&mut epg.xmltv_path, &src.xmltv_path);
    set(&mut epg.source, &src.source);
    set_duration(
        &mut epg.refresh_interval,
        &src.refresh_interval,
        "epg.refreshInterval",
    )
}

fn merge_roots(dst: &mut BTreeMap<String, String>, src: &BTreeMap<String, String>) {
    for (id, path) in src {
        dst.insert(id.clone(), path.clone());
    }
}

fn merge_vod(dst: &mut AppConfig, src: &VodFile) -> ConfigResult<()> {
    let vod = &mut dst.vod;
    set(&mut vod.probe_size, &src.probe_size);
    set(&mut vod.analyze_duration, &src.analyze_duration);
    set_duration(&mut vod.stall_timeout, &src.stall_timeout, "vod.stallTimeout")?;
    set(&mut vod.max_concurrent, &src.max_concurrent);
    set_duration(&mut vod.cache_ttl, &src.cache_ttl, "vod.cacheTTL")?;
    set(&mut vod.cache_max_entries, &src.cache_max_entries);
    Ok(())
}
