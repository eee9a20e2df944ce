//! Diff subcommand: resolve two config files and report what changed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::config::{ChangeSummary, EnvSource, Loader, Registry, diff};

/// Arguments for the diff subcommand
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Currently deployed config file
    pub old: PathBuf,

    /// Candidate config file
    pub new: PathBuf,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    pub format: DiffFormat,
}

/// Output format for diff results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for DiffFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(DiffFormat::Text),
            "json" => Ok(DiffFormat::Json),
            _ => Err(format!(
                "Invalid format '{}'. Valid options: text, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for DiffFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffFormat::Text => write!(f, "text"),
            DiffFormat::Json => write!(f, "json"),
        }
    }
}

/// Resolve both files against the same environment and compare them.
pub fn diff_files(
    registry: Arc<Registry>,
    env: Arc<dyn EnvSource>,
    args: &DiffArgs,
    version: &str,
) -> anyhow::Result<ChangeSummary> {
    let load = |path: &PathBuf| -> anyhow::Result<_> {
        let loader = Loader::new(registry.clone(), env.clone(), Some(path.clone()), version);
        loader
            .load()
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))
    };
    let old = load(&args.old)?;
    let new = load(&args.new)?;
    Ok(diff(&registry, &old, &new))
}

pub fn render_diff(summary: &ChangeSummary, format: DiffFormat) -> anyhow::Result<String> {
    match format {
        DiffFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        DiffFormat::Text => Ok(render_text(summary)),
    }
}

fn render_text(summary: &ChangeSummary) -> String {
    if summary.is_empty() {
        return "No changes.\n".to_string();
    }
    let mut out = String::new();
    for change in &summary.changed {
        let mode = if change.hot_reloadable { "hot" } else { "restart" };
        out.push_str(&format!("  {:<40} {}\n", change.path, mode));
    }
    let cold = summary.changed.iter().filter(|c| !c.hot_reloadable).count();
    out.push_str(&format!(
        "\n{} field(s) changed, {} need a restart.",
        summary.changed.len(),
        cold
    ));
    if summary.restart_required {
        out.push_str(" Restart required.\n");
    } else {
        out.push_str(" Reload is sufficient.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapEnv;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, yaml: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, yaml).unwrap();
        path
    }

    fn run(old: &str, new: &str) -> ChangeSummary {
        let dir = TempDir::new().unwrap();
        let args = DiffArgs {
            old: write(&dir, "old.yaml", old),
            new: write(&dir, "new.yaml", new),
            format: DiffFormat::Text,
        };
        let env = MapEnv::new().with("XG2G_DATA", dir.path().to_string_lossy().into_owned());
        diff_files(
            Arc::new(Registry::build().unwrap()),
            Arc::new(env),
            &args,
            "test",
        )
        .unwrap()
    }

    #[test]
    fn test_hot_only_change() {
        let summary = run("logLevel: info\n", "logLevel: debug\n");
        assert_eq!(summary.changed_paths(), vec!["logLevel"]);
        let text = render_diff(&summary, DiffFormat::Text).unwrap();
        assert!(text.contains("logLevel"));
        assert!(text.contains("Reload is sufficient."));
    }

    #[test]
    fn test_restart_change() {
        let summary = run(
            "enigma2:\n  baseUrl: http://a.local\n",
            "enigma2:\n  baseUrl: http://b.local\n",
        );
        assert!(summary.restart_required);
        let text = render_diff(&summary, DiffFormat::Text).unwrap();
        assert!(text.contains("enigma2.baseUrl"));
        assert!(text.contains("Restart required."));
    }

    #[test]
    fn test_json_output() {
        let summary = run("epg:\n  days: 3\n", "epg:\n  days: 5\n");
        let json: serde_json::Value =
            serde_json::from_str(&render_diff(&summary, DiffFormat::Json).unwrap()).unwrap();
        assert_eq!(json["changed"][0]["path"], "epg.days");
        assert_eq!(json["restart_required"], false);
    }

    #[test]
    fn test_no_changes() {
        let summary = run("logLevel: info\n", "logLevel: info\n");
        assert_eq!(render_diff(&summary, DiffFormat::Text).unwrap(), "No changes.\n");
    }

    #[test]
    fn test_invalid_file_names_path() {
        let dir = TempDir::new().unwrap();
        let args = DiffArgs {
            old: write(&dir, "old.yaml", "logLevel: info\n"),
            new: write(&dir, "new.yaml", "bogus: 1\n"),
            format: DiffFormat::Text,
        };
        let env = MapEnv::new().with("XG2G_DATA", dir.path().to_string_lossy().into_owned());
        let err = diff_files(
            Arc::new(Registry::build().unwrap()),
            Arc::new(env),
            &args,
            "test",
        )
        .unwrap_err();
        assert!(err.to_string().contains("new.yaml"));
    }
}
