//! Integration tests for reload and change classification.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use xg2g_config::config::{AppConfig, ConfigHolder, Loader, MapEnv, Registry, diff};
use xg2g_config::error::ErrorKind;

struct Fixture {
    _dir: TempDir,
    path: PathBuf,
    holder: ConfigHolder,
}

fn fixture(yaml: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, yaml).unwrap();
    let env = MapEnv::new().with("XG2G_DATA", dir.path().to_string_lossy().into_owned());
    let loader = Loader::new(
        Registry::shared().unwrap(),
        Arc::new(env),
        Some(path.clone()),
        "it",
    );
    let holder = ConfigHolder::new(loader).unwrap();
    Fixture {
        _dir: dir,
        path,
        holder,
    }
}

fn defaults() -> (Arc<Registry>, AppConfig) {
    let registry = Registry::shared().unwrap();
    let mut cfg = AppConfig::default();
    registry.apply_defaults(&mut cfg).unwrap();
    (registry, cfg)
}

#[test]
fn test_diff_of_identical_configs_is_empty() {
    let (registry, cfg) = defaults();
    let summary = diff(&registry, &cfg, &cfg);
    assert!(summary.is_empty());
    assert!(!summary.restart_required);
}

#[test]
fn test_hot_change_alone_needs_no_restart() {
    let (registry, old) = defaults();
    let mut new = old.clone();
    new.log_level = "warn".into();
    let summary = diff(&registry, &old, &new);
    assert_eq!(summary.changed_paths(), vec!["logLevel"]);
    assert!(!summary.restart_required);
}

#[test]
fn test_cold_change_taints_whole_summary() {
    let (registry, old) = defaults();
    let mut new = old.clone();
    new.log_level = "warn".into();
    new.api.listen_addr = ":9090".into();
    let summary = diff(&registry, &old, &new);
    assert_eq!(summary.changed.len(), 2);
    assert!(summary.restart_required);
}

#[test]
fn test_reload_reports_changes() {
    let fx = fixture("logLevel: info\nepg:\n  days: 7\n");
    std::fs::write(&fx.path, "logLevel: debug\nepg:\n  days: 3\n").unwrap();

    let event = fx.holder.reload().unwrap();
    assert_eq!(event.snapshot.epoch, 2);
    assert_eq!(event.changes.changed_paths(), vec!["logLevel", "epg.days"]);
    assert!(!event.changes.restart_required);
    assert_eq!(fx.holder.get().config.epg.days, 3);
}

#[test]
fn test_reload_failure_keeps_previous_config() {
    let fx = fixture("logLevel: info\n");
    std::fs::write(
        &fx.path,
        "openWebIF:\n  baseUrl: http://a.local\nenigma2:\n  baseUrl: http://b.local\n",
    )
    .unwrap();

    let err = fx.holder.reload().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AliasConflict);
    let current = fx.holder.get();
    assert_eq!(current.epoch, 1);
    assert!(current.config.enigma2.base_url.is_empty());
}

#[test]
fn test_reload_after_failure_recovers() {
    let fx = fixture("logLevel: info\n");
    std::fs::write(&fx.path, "logLevel: [broken\n").unwrap();
    assert!(fx.holder.reload().is_err());

    std::fs::write(&fx.path, "logLevel: error\n").unwrap();
    let event = fx.holder.reload().unwrap();
    assert_eq!(event.snapshot.epoch, 2);
    assert_eq!(fx.holder.get().config.log_level, "error");
}

#[tokio::test]
async fn test_listener_receives_reload() {
    let fx = fixture("logLevel: info\n");
    let mut rx = fx.holder.subscribe(4);

    std::fs::write(&fx.path, "logLevel: warn\n").unwrap();
    fx.holder.reload().unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.snapshot.config.log_level, "warn");
    assert_eq!(event.changes.changed_paths(), vec!["logLevel"]);
}

#[test]
fn test_restart_required_on_receiver_change() {
    let fx = fixture("enigma2:\n  baseUrl: http://a.local\n");
    std::fs::write(&fx.path, "enigma2:\n  baseUrl: http://b.local\n").unwrap();
    let event = fx.holder.reload().unwrap();
    assert!(event.changes.restart_required);
    // the new value is still published
    assert_eq!(fx.holder.get().config.enigma2.base_url, "http://b.local");
}
