//! xg2g-config
//!
//! Resolves the xg2g gateway configuration from defaults, an optional YAML
//! file and `XG2G_*` environment variables, and reports or watches the
//! result.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use xg2g_config::cli::{Cli, Command, diff as diff_cmd, registry as registry_cmd, show};
use xg2g_config::config::{
    CONFIG_PATH_ENV, ConfigHolder, DEPRECATIONS_FILE_ENV, Loader, ProcessEnv, Registry,
    lookup_nonempty,
    watcher::{WatchPaths, WatcherConfig, start_config_watcher},
};
use xg2g_config::logging::{LogLevelFilter, init_logging};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pick the config file: `--config`, then `$XG2G_CONFIG`, then
/// `<user config dir>/xg2g/config.yaml` when it exists.
fn resolve_config_path(cli: &Cli) -> Option<PathBuf> {
    if cli.no_file {
        return None;
    }
    if let Some(path) = &cli.config {
        return Some(path.clone());
    }
    if let Some(path) = lookup_nonempty(&ProcessEnv, CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    let fallback = dirs::config_dir()?.join("xg2g").join("config.yaml");
    fallback.exists().then_some(fallback)
}

fn resolve_deprecations_path(cli: &Cli) -> Option<PathBuf> {
    cli.deprecations
        .clone()
        .or_else(|| lookup_nonempty(&ProcessEnv, DEPRECATIONS_FILE_ENV).map(PathBuf::from))
}

fn build_loader(cli: &Cli, registry: Arc<Registry>) -> Loader {
    let loader = Loader::new(
        registry,
        Arc::new(ProcessEnv),
        resolve_config_path(cli),
        VERSION,
    );
    match &cli.deprecations {
        Some(path) => loader.with_deprecations(path),
        None => loader,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let level_filter = Arc::new(LogLevelFilter::new(level));
    init_logging(&cli.log, Arc::clone(&level_filter))?;

    let registry = Registry::shared()?;

    match cli.command {
        None | Some(Command::Check) => run_check(&cli, registry),
        Some(Command::Show(ref args)) => {
            let config = build_loader(&cli, registry.clone()).load()?;
            print!("{}", show::render_config(&registry, &config, args.format)?);
            Ok(())
        }
        Some(Command::Diff(ref args)) => {
            let summary =
                diff_cmd::diff_files(registry, Arc::new(ProcessEnv), args, VERSION)?;
            print!("{}", diff_cmd::render_diff(&summary, args.format)?);
            Ok(())
        }
        Some(Command::Registry(ref args)) => {
            print!("{}", registry_cmd::render_registry(&registry, args)?);
            Ok(())
        }
        Some(Command::Watch) => run_watch(&cli, registry, level_filter).await,
    }
}

/// Load once and print a short summary.
fn run_check(cli: &Cli, registry: Arc<Registry>) -> Result<()> {
    let loader = build_loader(cli, registry);
    let outcome = loader
        .load_with_outcome()
        .map_err(|e| anyhow::anyhow!("config invalid: {}", e))?;

    let source = loader
        .config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    println!("config file:  {}", source);
    println!("data dir:     {}", outcome.config.data_dir);
    println!("hls root:     {}", outcome.hls.root.display());
    if outcome.hls.migrated {
        println!("              migrated from the legacy v3 directory");
    }
    println!("env consumed: {}", outcome.consumed_env.len());
    for key in &outcome.unknown_env {
        println!("unknown env:  {}", key);
    }
    println!("OK");
    Ok(())
}

/// Reload on every change of the config file or deprecation manifest,
/// keeping the last good config when a reload fails.
async fn run_watch(
    cli: &Cli,
    registry: Arc<Registry>,
    level_filter: Arc<LogLevelFilter>,
) -> Result<()> {
    let loader = build_loader(cli, registry);
    let Some(config_file) = loader.config_path().map(PathBuf::from) else {
        anyhow::bail!("watch needs a config file; pass --config or set {}", CONFIG_PATH_ENV);
    };
    let holder = ConfigHolder::new(loader)?;
    level_filter.set_from_config(&holder.get().config.log_level);

    let watch_paths = WatchPaths {
        config_file,
        deprecations_file: resolve_deprecations_path(cli),
    };
    let mut handle = start_config_watcher(watch_paths, WatcherConfig::default())?;
    info!(epoch = holder.get().epoch, "watching config for changes");

    loop {
        tokio::select! {
            event = handle.wait_for_change() => {
                let Some(event) = event else {
                    info!("config file watcher stopped");
                    return Ok(());
                };
                if !event.requires_reload() {
                    warn!(?event, "config watcher reported an error");
                    continue;
                }
                info!(paths = ?event.affected_paths(), "config change detected");
                // failures are logged by the holder; the last good config stays active
                if let Ok(reload) = holder.reload() {
                    if !level_filter.set_from_config(&reload.snapshot.config.log_level) {
                        warn!(level = %reload.snapshot.config.log_level, "unknown log level, keeping current");
                    }
                    if reload.changes.restart_required {
                        warn!(
                            changed = ?reload.changes.changed_paths(),
                            "some changes take effect only after a restart"
                        );
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping watcher");
                return Ok(());
            }
        }
    }
}
