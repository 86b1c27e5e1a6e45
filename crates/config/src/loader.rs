use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::MotifiniConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "motifini.toml",
    "motifini.yaml",
    "motifini.yml",
    "motifini.json",
];

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "motifini")
}

/// Returns the user-global config directory (`~/.config/motifini/`).
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().to_path_buf())
}

/// Returns the user data directory, where the state file lives by default.
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().to_path_buf())
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<MotifiniConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path).with_context(|| format!("failed to parse {}", path.display()))
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./motifini.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/motifini/motifini.{toml,yaml,yml,json}` (user-global)
///
/// Returns `MotifiniConfig::default()` if no config file is found or the
/// one found does not parse.
pub fn discover_and_load() -> MotifiniConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    MotifiniConfig::default()
}

/// Load `explicit` if given (errors are fatal), otherwise discover. Env
/// overrides are applied last.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<MotifiniConfig> {
    let config = match explicit {
        Some(path) => load_config(path)?,
        None => discover_and_load(),
    };
    Ok(apply_env_overrides(config))
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Apply `MOTIFINI_*` environment variables on top of the loaded config.
///
/// - `MOTIFINI_STATE_FILE`
/// - `MOTIFINI_TEMP_DIR`
/// - `MOTIFINI_ENABLED_APIS` (comma separated)
pub fn apply_env_overrides(config: MotifiniConfig) -> MotifiniConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: MotifiniConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> MotifiniConfig {
    if let Some(path) = lookup("MOTIFINI_STATE_FILE") {
        config.state_file = PathBuf::from(path);
    }
    if let Some(dir) = lookup("MOTIFINI_TEMP_DIR") {
        config.temp_dir = PathBuf::from(dir);
    }
    if let Some(apis) = lookup("MOTIFINI_ENABLED_APIS") {
        config.enabled_apis = apis
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<MotifiniConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
