//! Registry subcommand: list every known setting.

use clap::Args;
use serde_json::{Value, json};

use crate::config::{HOT_RELOAD_ALLOWLIST, Registry, RegistryEntry, Status};

/// Arguments for the registry subcommand
#[derive(Args, Debug)]
pub struct RegistryArgs {
    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    pub format: RegistryFormat,

    /// Include internal-only fields
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistryFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for RegistryFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(RegistryFormat::Text),
            "json" => Ok(RegistryFormat::Json),
            _ => Err(format!(
                "Invalid format '{}'. Valid options: text, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for RegistryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryFormat::Text => write!(f, "text"),
            RegistryFormat::Json => write!(f, "json"),
        }
    }
}

fn hot(entry: &RegistryEntry) -> bool {
    entry.hot_reloadable && HOT_RELOAD_ALLOWLIST.contains(&entry.field)
}

fn default_text(entry: &RegistryEntry) -> String {
    match &entry.default {
        Some(_) if entry.secret => "********".to_string(),
        Some(value) => match value.to_json() {
            Value::String(s) => s,
            other => other.to_string(),
        },
        None => "-".to_string(),
    }
}

fn entry_json(entry: &RegistryEntry) -> Value {
    let default = match &entry.default {
        Some(value) if !entry.secret => value.to_json(),
        _ => Value::Null,
    };
    json!({
        "path": entry.path,
        "field": entry.field.field_path(),
        "env": entry.env,
        "legacyEnv": entry.legacy_env,
        "profile": entry.profile,
        "status": entry.status,
        "default": default,
        "hotReloadable": hot(entry),
        "secret": entry.secret,
    })
}

fn visible(registry: &Registry, all: bool) -> impl Iterator<Item = &RegistryEntry> {
    registry
        .entries()
        .iter()
        .filter(move |e| all || (!e.path.is_empty() && e.status != Status::Internal))
}

pub fn render_registry(registry: &Registry, args: &RegistryArgs) -> anyhow::Result<String> {
    match args.format {
        RegistryFormat::Json => {
            let entries: Vec<Value> = visible(registry, args.all).map(entry_json).collect();
            Ok(serde_json::to_string_pretty(&entries)?)
        }
        RegistryFormat::Text => {
            let mut out = format!(
                "{:<36} {:<34} {:<12} {:<8} {}\n",
                "PATH", "ENV", "PROFILE", "RELOAD", "DEFAULT"
            );
            for entry in visible(registry, args.all) {
                let env = if entry.legacy_env.is_empty() {
                    entry.env.to_string()
                } else {
                    format!("{} ({})", entry.env, entry.legacy_env)
                };
                let profile = serde_json::to_value(entry.profile)?;
                out.push_str(&format!(
                    "{:<36} {:<34} {:<12} {:<8} {}\n",
                    if entry.path.is_empty() { entry.field.field_path() } else { entry.path },
                    if env.is_empty() { "-" } else { env.as_str() },
                    profile.as_str().unwrap_or("-"),
                    if hot(entry) { "hot" } else { "restart" },
                    default_text(entry)
                ));
            }
            Ok(out)
        }
    }
}
