//! File watcher driving config reloads.
//!
//! Watches the directory holding the config file (editors often replace a
//! file instead of writing it in place) and emits an event when the config
//! file or the deprecation manifest changes. Rapid changes are debounced.

use notify::RecommendedWatcher;
use notify_debouncer_mini::{DebouncedEventKind, Debouncer, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Event types emitted when watched files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeEvent {
    /// The YAML config file changed.
    ConfigFile(PathBuf),
    /// The external deprecation manifest changed.
    DeprecationManifest(PathBuf),
    /// Several watched files changed in quick succession.
    BatchChange(Vec<PathBuf>),
    /// Watcher encountered an error.
    Error(String),
}

impl ConfigChangeEvent {
    /// Returns true if this event requires a config reload.
    pub fn requires_reload(&self) -> bool {
        !matches!(self, ConfigChangeEvent::Error(_))
    }

    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            ConfigChangeEvent::ConfigFile(p) => vec![p.as_path()],
            ConfigChangeEvent::DeprecationManifest(p) => vec![p.as_path()],
            ConfigChangeEvent::BatchChange(paths) => paths.iter().map(|p| p.as_path()).collect(),
            ConfigChangeEvent::Error(_) => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Files whose changes trigger a reload.
#[derive(Debug, Clone)]
pub struct WatchPaths {
    pub config_file: PathBuf,
    pub deprecations_file: Option<PathBuf>,
}

impl WatchPaths {
    /// Anchor both files in their canonical directory so they compare equal
    /// to the paths notify reports.
    fn canonical(self) -> Self {
        Self {
            config_file: canonical_file(&self.config_file),
            deprecations_file: self.deprecations_file.as_deref().map(canonical_file),
        }
    }
}

fn canonical_file(file: &Path) -> PathBuf {
    let dir = parent_dir(file);
    let dir = std::fs::canonicalize(&dir).unwrap_or(dir);
    match file.file_name() {
        Some(name) => dir.join(name),
        None => file.to_path_buf(),
    }
}

/// Handle to control the config watcher.
///
/// Dropping the handle drops the debouncer, which closes the notify channel
/// and ends the forwarding task.
pub struct ConfigWatcherHandle {
    /// Receiver for config change events.
    pub events: watch::Receiver<Option<ConfigChangeEvent>>,
    _debouncer: Debouncer<RecommendedWatcher>,
    _task_handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcherHandle {
    /// Wait for the next change event; `None` once the watcher stopped.
    pub async fn wait_for_change(&mut self) -> Option<ConfigChangeEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow_and_update().clone();
            if event.is_some() {
                return event;
            }
        }
    }
}

fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Start watching `paths`. Must be called inside a tokio runtime.
pub fn start_config_watcher(
    paths: WatchPaths,
    config: WatcherConfig,
) -> Result<ConfigWatcherHandle, notify::Error> {
    let paths = paths.canonical();
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    let watcher = debouncer.watcher();

    let mut dirs = vec![parent_dir(&paths.config_file)];
    if let Some(manifest) = &paths.deprecations_file {
        let dir = parent_dir(manifest);
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    for dir in &dirs {
        if dir.exists() {
            info!(dir = %dir.display(), "watching config directory");
            watcher.watch(dir, notify::RecursiveMode::NonRecursive)?;
        } else {
            warn!(dir = %dir.display(), "config directory does not exist, skipping watch");
        }
    }

    let task_handle = tokio::task::spawn_blocking(move || {
        process_notify_events(notify_rx, event_tx, &paths);
    });

    Ok(ConfigWatcherHandle {
        events: event_rx,
        _debouncer: debouncer,
        _task_handle: task_handle,
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<ConfigChangeEvent>>,
    paths: &WatchPaths,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| {
                        matches!(
                            e.kind,
                            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                        )
                    })
                    .map(|e| e.path)
                    .collect();
                if let Some(event) = classify_events(changed, paths) {
                    debug!(?event, "config change detected");
                    if tx.send(Some(event)).is_err() {
                        info!("config watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "file watcher error");
                let _ = tx.send(Some(ConfigChangeEvent::Error(e.to_string())));
            }
            Err(_) => {
                info!("config watcher channel closed, stopping");
                return;
            }
        }
    }
}

fn classify_events(changed: Vec<PathBuf>, paths: &WatchPaths) -> Option<ConfigChangeEvent> {
    let mut relevant: Vec<ConfigChangeEvent> = Vec::new();
    for path in changed {
        if let Some(event) = classify_path(&path, paths)
            && !relevant.contains(&event)
        {
            relevant.push(event);
        }
    }
    match relevant.len() {
        0 => None,
        1 => relevant.pop(),
        _ => Some(ConfigChangeEvent::BatchChange(
            relevant
                .iter()
                .flat_map(|e| e.affected_paths())
                .map(Path::to_path_buf)
                .collect(),
        )),
    }
}

fn classify_path(path: &Path, paths: &WatchPaths) -> Option<ConfigChangeEvent> {
    if path == paths.config_file {
        return Some(ConfigChangeEvent::ConfigFile(path.to_path_buf()));
    }
    if paths.deprecations_file.as_deref() == Some(path) {
        return Some(ConfigChangeEvent::DeprecationManifest(path.to_path_buf()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> WatchPaths {
        WatchPaths {
            config_file: PathBuf::from("/etc/xg2g/config.yaml"),
            deprecations_file: Some(PathBuf::from("/etc/xg2g/deprecations.yaml")),
        }
    }

    #[test]
    fn test_classify_config_file() {
        let result = classify_path(Path::new("/etc/xg2g/config.yaml"), &paths());
        assert!(matches!(result, Some(ConfigChangeEvent::ConfigFile(_))));
    }

    #[test]
    fn test_classify_manifest() {
        let result = classify_path(Path::new("/etc/xg2g/deprecations.yaml"), &paths());
        assert!(matches!(result, Some(ConfigChangeEvent::DeprecationManifest(_))));
    }

    #[test]
    fn test_classify_unrelated_file() {
        assert!(classify_path(Path::new("/etc/xg2g/config.yaml.swp"), &paths()).is_none());
        assert!(classify_path(Path::new("/etc/xg2g/notes.yaml"), &paths()).is_none());
        assert!(classify_path(Path::new("/etc/other/config.yaml"), &paths()).is_none());
    }

    #[test]
    fn test_classify_events_batches() {
        let changed = vec![
            PathBuf::from("/etc/xg2g/config.yaml"),
            PathBuf::from("/etc/xg2g/config.yaml"),
            PathBuf::from("/etc/xg2g/notes.txt"),
        ];
        assert_eq!(
            classify_events(changed, &paths()),
            Some(ConfigChangeEvent::ConfigFile(PathBuf::from("/etc/xg2g/config.yaml")))
        );

        let changed = vec![
            PathBuf::from("/etc/xg2g/config.yaml"),
            PathBuf::from("/etc/xg2g/deprecations.yaml"),
        ];
        assert!(matches!(
            classify_events(changed, &paths()),
            Some(ConfigChangeEvent::BatchChange(p)) if p.len() == 2
        ));
    }

    #[test]
    fn test_canonical_paths_resolve_relative_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("conf");
        std::fs::create_dir(&nested).unwrap();
        let watch = WatchPaths {
            config_file: nested.join("..").join("conf").join("config.yaml"),
            deprecations_file: None,
        }
        .canonical();
        let expected = std::fs::canonicalize(&nested).unwrap().join("config.yaml");
        assert_eq!(watch.config_file, expected);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_task() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = WatchPaths {
            config_file: dir.path().join("config.yaml"),
            deprecations_file: None,
        };
        let handle = start_config_watcher(paths, WatcherConfig::default()).unwrap();
        let ConfigWatcherHandle {
            events,
            _debouncer,
            _task_handle,
        } = handle;
        drop(events);
        drop(_debouncer);
        tokio::time::timeout(Duration::from_secs(5), _task_handle)
            .await
            .expect("forwarding task should end once the debouncer is dropped")
            .unwrap();
    }

    #[test]
    fn test_event_requires_reload() {
        assert!(ConfigChangeEvent::ConfigFile(PathBuf::new()).requires_reload());
        assert!(ConfigChangeEvent::DeprecationManifest(PathBuf::new()).requires_reload());
        assert!(!ConfigChangeEvent::Error("test".to_string()).requires_reload());
    }
}
