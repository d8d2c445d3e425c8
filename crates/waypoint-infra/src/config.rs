use std::path::{Path, PathBuf};

use waypoint_types::config::EngineConfig;

/// Resolve the config file location.
///
/// Priority:
/// 1. `WAYPOINT_CONFIG` environment variable
/// 2. `~/.waypoint/waypoint.toml`
/// 3. `./waypoint.toml`
pub fn resolve_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("WAYPOINT_CONFIG") {
        return PathBuf::from(path);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".waypoint").join("waypoint.toml");
    }

    PathBuf::from("waypoint.toml")
}

/// Load engine configuration from `config_path`.
///
/// A missing file is normal and yields defaults. A file that cannot be read
/// or parsed is logged and also yields defaults.
pub async fn load_engine_config(config_path: &Path) -> EngineConfig {
    let content = match tokio::fs::read_to_string(config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => {
            if config.default_max_attempts == 0 {
                tracing::warn!(
                    "default_max_attempts = 0 in {} is invalid, using 1",
                    config_path.display()
                );
                return EngineConfig {
                    default_max_attempts: 1,
                    ..config
                };
            }
            config
        }
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}
