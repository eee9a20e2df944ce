//! Current-configuration slot with reload and change notification.
//!
//! Readers call [`ConfigHolder::get`] and always see a complete snapshot.
//! [`ConfigHolder::reload`] reruns the loader; on failure the previous
//! snapshot stays active.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use super::diff::{ChangeSummary, diff};
use super::loader::Loader;
use super::types::AppConfig;
use crate::error::ConfigResult;

/// One successfully loaded configuration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub config: AppConfig,
    /// Starts at 1 and increases by one per successful reload.
    pub epoch: u64,
    pub loaded_at: DateTime<Utc>,
}

/// Sent to listeners after a successful reload.
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    pub snapshot: Arc<Snapshot>,
    pub changes: ChangeSummary,
}

pub struct ConfigHolder {
    loader: Loader,
    current: ArcSwap<Snapshot>,
    listeners: Mutex<Vec<mpsc::Sender<ReloadEvent>>>,
}

impl std::fmt::Debug for ConfigHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigHolder")
            .field("loader", &self.loader)
            .field("epoch", &self.current.load().epoch)
            .finish()
    }
}

impl ConfigHolder {
    /// Run the first load; fails if the initial config is invalid.
    pub fn new(loader: Loader) -> ConfigResult<Self> {
        let config = loader.load()?;
        Ok(Self::with_config(loader, config))
    }

    /// Start from an already loaded config.
    pub fn with_config(loader: Loader, config: AppConfig) -> Self {
        let snapshot = Snapshot {
            config,
            epoch: 1,
            loaded_at: Utc::now(),
        };
        Self {
            loader,
            current: ArcSwap::from_pointee(snapshot),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Register a listener with a bounded queue of `capacity` events.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<ReloadEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(tx);
        }
        rx
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Reload, swap and notify.
    ///
    /// Calls are expected to be serialized by the caller.
    pub fn reload(&self) -> ConfigResult<ReloadEvent> {
        let config = match self.loader.load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "config reload failed, keeping current config");
                return Err(e);
            }
        };

        let previous = self.current.load_full();
        let changes = diff(self.loader.registry(), &previous.config, &config);
        let snapshot = Arc::new(Snapshot {
            config,
            epoch: previous.epoch + 1,
            loaded_at: Utc::now(),
        });
        self.current.store(snapshot.clone());

        info!(
            epoch = snapshot.epoch,
            changed = ?changes.changed_paths(),
            restart_required = changes.restart_required,
            "config reloaded"
        );

        let event = ReloadEvent { snapshot, changes };
        self.notify(&event);
        Ok(event)
    }

    fn notify(&self, event: &ReloadEvent) {
        let Ok(mut listeners) = self.listeners.lock() else {
            return;
        };
        listeners.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(epoch = event.snapshot.epoch, "config listener channel full, skipping");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::registry::Registry;
    use crate::config::scalar::MapEnv;
    use tempfile::TempDir;

    fn holder(dir: &TempDir, yaml: &str) -> (ConfigHolder, std::path::PathBuf) {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        let env = MapEnv::new().with("XG2G_DATA", dir.path().to_string_lossy().into_owned());
        let loader = Loader::new(
            Arc::new(Registry::build().unwrap()),
            Arc::new(env),
            Some(path.clone()),
            "test",
        );
        (ConfigHolder::new(loader).unwrap(), path)
    }

    #[test]
    fn test_reload_swaps_and_bumps_epoch() {
        let dir = TempDir::new().unwrap();
        let (holder, path) = holder(&dir, "logLevel: info\n");
        assert_eq!(holder.get().epoch, 1);

        std::fs::write(&path, "logLevel: debug\n").unwrap();
        let event = holder.reload().unwrap();
        assert_eq!(event.snapshot.epoch, 2);
        assert_eq!(holder.get().config.log_level, "debug");
        assert_eq!(event.changes.changed_paths(), vec!["logLevel"]);
        assert!(!event.changes.restart_required);
    }

    #[test]
    fn test_failed_reload_keeps_last_good() {
        let dir = TempDir::new().unwrap();
        let (holder, path) = holder(&dir, "logLevel: warn\n");

        std::fs::write(&path, "logLevel: warn\nnotAKey: 1\n").unwrap();
        assert!(holder.reload().is_err());
        let snap = holder.get();
        assert_eq!(snap.epoch, 1);
        assert_eq!(snap.config.log_level, "warn");
    }

    #[test]
    fn test_full_listener_does_not_block_reload() {
        let dir = TempDir::new().unwrap();
        let (holder, _path) = holder(&dir, "logLevel: info\n");
        let mut slow = holder.subscribe(1);
        let mut fast = holder.subscribe(8);

        holder.reload().unwrap();
        holder.reload().unwrap();
        holder.reload().unwrap();

        assert_eq!(slow.try_recv().unwrap().snapshot.epoch, 2);
        assert!(slow.try_recv().is_err());
        let epochs: Vec<u64> = std::iter::from_fn(|| fast.try_recv().ok())
            .map(|e| e.snapshot.epoch)
            .collect();
        assert_eq!(epochs, vec![2, 3, 4]);
    }

    #[test]
    fn test_closed_listeners_are_pruned() {
        let dir = TempDir::new().unwrap();
        let (holder, _path) = holder(&dir, "logLevel: info\n");
        let rx = holder.subscribe(4);
        let _keep = holder.subscribe(4);
        drop(rx);
        holder.reload().unwrap();
        assert_eq!(holder.listener_count(), 1);
    }

    #[test]
    fn test_concurrent_reads_during_reload() {
        let dir = TempDir::new().unwrap();
        let (holder, path) = holder(&dir, "epg:\n  days: 1\n");
        let holder = Arc::new(holder);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let h = holder.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snap = h.get();
                        // days always matches the epoch it was loaded with
                        assert_eq!(snap.config.epg.days as u64, snap.epoch);
                    }
                })
            })
            .collect();

        for days in 2..=5 {
            std::fs::write(&path, format!("epg:\n  days: {}\n", days)).unwrap();
            holder.reload().unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(holder.get().epoch, 5);
    }
}
