use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "cuotas";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Local state database (defaults to $XDG_DATA_HOME/cuotas/state.db)
  pub state_path: Option<PathBuf>,
  /// Tracing filter directive, overridden by RUST_LOG
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the remote cache store
  pub base_url: String,
  /// Request timeout; the transport default applies when unset
  pub timeout_secs: Option<u64>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cuotas.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cuotas/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/cuotas/config.yaml"
        ))
      }
    };

    if let Some(url) = Self::api_url_override() {
      config.api.base_url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("cuotas.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(APP_DIR).join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;

    url::Url::parse(&config.api.base_url)
      .map_err(|e| eyre!("Invalid api.base_url '{}': {}", config.api.base_url, e))?;

    Ok(config)
  }

  /// API base URL from CUOTAS_API_URL, if set.
  fn api_url_override() -> Option<String> {
    std::env::var("CUOTAS_API_URL")
      .ok()
      .filter(|url| !url.trim().is_empty())
  }
}

/// Per-user data directory for the state database and logs.
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join(APP_DIR))
}
