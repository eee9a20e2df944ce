//! Derived filesystem paths.
//!
//! Runs after both merge stages. Resolves the ffprobe binary, makes the
//! data directory absolute and settles the HLS root, migrating the old
//! `v3-hls` directory to `hls` when that is safe.

use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

use crate::error::{ConfigError, ConfigResult};

pub const ENV_HLS_ROOT: &str = "XG2G_HLS_ROOT";
pub const ENV_LEGACY_HLS_ROOT: &str = "XG2G_V3_HLS_ROOT";

pub const LEGACY_HLS_DIR: &str = "v3-hls";
pub const HLS_DIR: &str = "hls";

/// Written into the new root after a successful migration.
pub const MIGRATION_MARKER: &str = ".xg2g_migrated_from_v3";

/// Explicit value, else sibling of the ffmpeg binary, else `ffprobe` on PATH.
pub fn resolve_ffprobe_bin(explicit: &str, ffmpeg_bin: &str) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    let ffmpeg = Path::new(ffmpeg_bin.trim());
    match ffmpeg.file_name().and_then(|n| n.to_str()) {
        Some(name) if name.starts_with("ffmpeg") => {
            let probe = name.replacen("ffmpeg", "ffprobe", 1);
            ffmpeg.with_file_name(probe).to_string_lossy().into_owned()
        }
        _ => "ffprobe".to_string(),
    }
}

/// Lexically clean a path: drop `.` segments and fold `..` where possible.
pub fn clean_path(raw: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in Path::new(raw.trim()).components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let folded = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if folded {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Absolute, cleaned form of `data_dir`, joined onto the working directory
/// when relative.
pub fn absolute_data_dir(data_dir: &str) -> ConfigResult<String> {
    let trimmed = data_dir.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid_value("dataDir", "must not be empty"));
    }
    let path = Path::new(trimmed);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ConfigError::io("current directory", e))?
            .join(path)
    };
    Ok(clean_path(&joined.to_string_lossy())
        .to_string_lossy()
        .into_owned())
}

/// How the HLS root was chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HlsResolution {
    pub root: PathBuf,
    pub used_env: bool,
    pub used_legacy_env: bool,
    pub migrated: bool,
    pub migration_skipped: bool,
}

/// Explicit inputs for [`resolve_hls_root`]. Empty strings mean unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct HlsRootInputs<'a> {
    pub data_dir: &'a str,
    pub env_root: &'a str,
    pub legacy_env_root: &'a str,
    pub configured_root: &'a str,
}

pub fn resolve_hls_root(inputs: HlsRootInputs<'_>) -> ConfigResult<HlsResolution> {
    let mut res = HlsResolution::default();

    let env_root = inputs.env_root.trim();
    let legacy_env_root = inputs.legacy_env_root.trim();
    if !env_root.is_empty() {
        if !legacy_env_root.is_empty() {
            warn!(
                new = env_root,
                legacy = legacy_env_root,
                "both {} and {} are set, ignoring the legacy variable",
                ENV_HLS_ROOT,
                ENV_LEGACY_HLS_ROOT
            );
        }
        res.root = validate_root(clean_path(env_root))?;
        res.used_env = true;
        return Ok(res);
    }
    if !legacy_env_root.is_empty() {
        warn!(
            legacy = legacy_env_root,
            replacement = ENV_HLS_ROOT,
            "deprecated: {} is set",
            ENV_LEGACY_HLS_ROOT
        );
        res.root = validate_root(clean_path(legacy_env_root))?;
        res.used_env = true;
        res.used_legacy_env = true;
        return Ok(res);
    }
    let configured = inputs.configured_root.trim();
    if !configured.is_empty() {
        res.root = validate_root(clean_path(configured))?;
        return Ok(res);
    }

    let data_dir = inputs.data_dir.trim();
    if data_dir.is_empty() {
        return Err(ConfigError::invalid_value("dataDir", "must not be empty"));
    }
    let data_dir = clean_path(data_dir);
    let target = data_dir.join(HLS_DIR);
    let legacy = data_dir.join(LEGACY_HLS_DIR);

    let legacy_meta = std::fs::symlink_metadata(&legacy).ok();
    let target_meta = std::fs::metadata(&target).ok();

    if let Some(meta) = target_meta {
        if !meta.is_dir() {
            return Err(ConfigError::invalid_value(
                "hls.root",
                format!("target path {} exists but is a file", target.display()),
            ));
        }
        if legacy_meta.is_some() && has_visible_entries(&legacy) {
            warn!(
                target = %target.display(),
                legacy = %legacy.display(),
                "using the new HLS root but the legacy directory is not empty; manual cleanup may be required"
            );
        }
        res.root = target;
        return Ok(res);
    }

    let Some(legacy_meta) = legacy_meta else {
        res.root = target;
        return Ok(res);
    };

    if legacy_meta.file_type().is_symlink() {
        warn!(legacy = %legacy.display(), "legacy HLS root is a symlink, skipping migration");
        res.root = validate_root(legacy)?;
        res.migration_skipped = true;
        return Ok(res);
    }

    info!(from = %legacy.display(), to = %target.display(), "migrating legacy HLS root");
    if let Err(e) = std::fs::rename(&legacy, &target) {
        warn!(error = %e, from = %legacy.display(), "HLS root migration failed, using the legacy path");
        res.root = validate_root(legacy)?;
        res.migration_skipped = true;
        return Ok(res);
    }

    write_marker(&target, &legacy);
    res.root = target;
    res.migrated = true;
    Ok(res)
}

fn validate_root(path: PathBuf) -> ConfigResult<PathBuf> {
    let text = path.to_string_lossy();
    if text.is_empty() || text == "." || text == "/" {
        return Err(ConfigError::invalid_value(
            "hls.root",
            format!("{:?} is not a usable directory", text),
        ));
    }
    Ok(path)
}

/// Anything besides dotfiles counts as content.
fn has_visible_entries(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(Result::ok)
        .any(|e| !e.file_name().to_string_lossy().starts_with('.'))
}

fn write_marker(dir: &Path, from: &Path) {
    let marker = dir.join(MIGRATION_MARKER);
    let content = format!(
        "Migrated from: {}\nDate: {}\n",
        from.display(),
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    if let Err(e) = std::fs::write(&marker, content) {
        warn!(error = %e, path = %marker.display(), "failed to write HLS migration marker");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn inputs(data_dir: &str) -> HlsRootInputs<'_> {
        HlsRootInputs {
            data_dir,
            ..Default::default()
        }
    }

    #[test]
    fn test_ffprobe_derivation() {
        assert_eq!(resolve_ffprobe_bin("/opt/probe", "/usr/bin/ffmpeg"), "/opt/probe");
        assert_eq!(resolve_ffprobe_bin("", "/usr/local/bin/ffmpeg"), "/usr/local/bin/ffprobe");
        assert_eq!(resolve_ffprobe_bin("", "ffmpeg"), "ffprobe");
        assert_eq!(resolve_ffprobe_bin("", "/opt/avconv"), "ffprobe");
        assert_eq!(resolve_ffprobe_bin("  ", ""), "ffprobe");
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(" /data/./hls/ "), PathBuf::from("/data/hls"));
        assert_eq!(clean_path("/data/x/../hls"), PathBuf::from("/data/hls"));
        assert_eq!(clean_path("/.."), PathBuf::from("/"));
        assert_eq!(clean_path("./"), PathBuf::from("."));
    }

    #[test]
    fn test_absolute_data_dir() {
        assert_eq!(absolute_data_dir("/var/lib/xg2g/").unwrap(), "/var/lib/xg2g");
        let rel = absolute_data_dir("data").unwrap();
        assert!(Path::new(&rel).is_absolute());
        assert!(rel.ends_with("data"));
        assert!(absolute_data_dir(" ").is_err());
    }

    #[test]
    fn test_env_root_wins_over_legacy_and_file() {
        let res = resolve_hls_root(HlsRootInputs {
            data_dir: "/data",
            env_root: " /srv/hls/ ",
            legacy_env_root: "/old",
            configured_root: "/file",
        })
        .unwrap();
        assert_eq!(res.root, PathBuf::from("/srv/hls"));
        assert!(res.used_env);
        assert!(!res.used_legacy_env);
    }

    #[test]
    fn test_legacy_env_root_used_when_alone() {
        let res = resolve_hls_root(HlsRootInputs {
            data_dir: "/data",
            legacy_env_root: "/old/hls",
            configured_root: "/file",
            ..Default::default()
        })
        .unwrap();
        assert_eq!(res.root, PathBuf::from("/old/hls"));
        assert!(res.used_legacy_env);
    }

    #[test]
    fn test_configured_root_beats_derived() {
        let res = resolve_hls_root(HlsRootInputs {
            data_dir: "/data",
            configured_root: "/file/hls",
            ..Default::default()
        })
        .unwrap();
        assert_eq!(res.root, PathBuf::from("/file/hls"));
        assert!(!res.used_env);
    }

    #[test]
    fn test_unusable_explicit_roots_rejected() {
        for bad in ["/", ".", "./"] {
            let err = resolve_hls_root(HlsRootInputs {
                data_dir: "/data",
                env_root: bad,
                ..Default::default()
            })
            .unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::InvalidValue);
        }
    }

    #[test]
    fn test_fresh_data_dir_uses_target() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().to_string_lossy().into_owned();
        let res = resolve_hls_root(inputs(&data)).unwrap();
        assert_eq!(res.root, dir.path().join(HLS_DIR));
        assert!(!res.migrated);
    }

    #[test]
    fn test_legacy_dir_is_migrated_with_marker() {
        let dir = TempDir::new().unwrap();
        let legacy = dir.path().join(LEGACY_HLS_DIR);
        std::fs::create_dir(&legacy).unwrap();
        std::fs::write(legacy.join("seg1.ts"), b"x").unwrap();

        let data = dir.path().to_string_lossy().into_owned();
        let res = resolve_hls_root(inputs(&data)).unwrap();
        let target = dir.path().join(HLS_DIR);
        assert!(res.migrated);
        assert_eq!(res.root, target);
        assert!(target.join("seg1.ts").exists());
        assert!(!legacy.exists());
        let marker = std::fs::read_to_string(target.join(MIGRATION_MARKER)).unwrap();
        assert!(marker.starts_with("Migrated from: "));
        assert!(marker.contains("Date: "));

        // second run is a no-op
        let again = resolve_hls_root(inputs(&data)).unwrap();
        assert_eq!(again.root, target);
        assert!(!again.migrated);
    }

    #[test]
    fn test_existing_target_preferred_over_legacy() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(HLS_DIR)).unwrap();
        std::fs::create_dir(dir.path().join(LEGACY_HLS_DIR)).unwrap();
        std::fs::write(dir.path().join(LEGACY_HLS_DIR).join("old.ts"), b"x").unwrap();

        let data = dir.path().to_string_lossy().into_owned();
        let res = resolve_hls_root(inputs(&data)).unwrap();
        assert_eq!(res.root, dir.path().join(HLS_DIR));
        assert!(dir.path().join(LEGACY_HLS_DIR).exists());
    }

    #[test]
    fn test_target_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(HLS_DIR), b"not a dir").unwrap();
        let data = dir.path().to_string_lossy().into_owned();
        let err = resolve_hls_root(inputs(&data)).unwrap_err();
        assert!(err.to_string().contains("exists but is a file"));
    }

    #[cfg(unix)]
    #[test]
    fn test_legacy_symlink_is_not_migrated() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, dir.path().join(LEGACY_HLS_DIR)).unwrap();

        let data = dir.path().to_string_lossy().into_owned();
        let res = resolve_hls_root(inputs(&data)).unwrap();
        assert!(res.migration_skipped);
        assert_eq!(res.root, dir.path().join(LEGACY_HLS_DIR));
        assert!(!dir.path().join(HLS_DIR).exists());
    }
}
