//! Configuration Vault – reads/writes `~/.touchhand/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use touchhand_types::{TeardownPolicy, TouchError};

/// Persisted user configuration stored in `~/.touchhand/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// What to do with the device session when the last handle goes away.
    #[serde(default)]
    pub teardown_policy: TeardownPolicy,

    /// Whether the simulated runtime reports a connected headset.
    #[serde(default = "default_sim_hmd_connected")]
    pub sim_hmd_connected: bool,

    /// Pretty-print JSON pose output.
    #[serde(default)]
    pub pretty_json: bool,
}

fn default_sim_hmd_connected() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            teardown_policy: TeardownPolicy::default(),
            sim_hmd_connected: default_sim_hmd_connected(),
            pretty_json: false,
        }
    }
}

/// Return the path to `~/.touchhand/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".touchhand").join("config.toml")
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// No config file yet; built-in defaults were used.
    Defaults,
}

/// Load the config from disk, falling back to defaults when the file does
/// not exist.  Environment overrides are applied in both cases.
pub fn load() -> Result<(Config, ConfigSource), TouchError> {
    load_with_env(&config_path())
}

pub(crate) fn load_with_env(path: &Path) -> Result<(Config, ConfigSource), TouchError> {
    let (mut cfg, source) = match load_from(path)? {
        Some(cfg) => (cfg, ConfigSource::File),
        None => (Config::default(), ConfigSource::Defaults),
    };
    apply_env_overrides(&mut cfg);
    Ok((cfg, source))
}

/// Built-in defaults with environment overrides applied.
pub fn defaults_with_env() -> Config {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, TouchError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        TouchError::Config(format!("failed to read config at {}: {}", path.display(), e))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| TouchError::Config(format!("failed to parse config: {}", e)))?;
    Ok(Some(cfg))
}

/// Apply `TOUCHHAND_*` environment variable overrides to `cfg`.
///
/// Values that fail to parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `TOUCHHAND_TEARDOWN_POLICY` | `teardown_policy` |
/// | `TOUCHHAND_SIM_HMD` | `sim_hmd_connected` |
/// | `TOUCHHAND_PRETTY_JSON` | `pretty_json` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TOUCHHAND_TEARDOWN_POLICY")
        && let Ok(policy) = v.parse::<TeardownPolicy>()
    {
        cfg.teardown_policy = policy;
    }
    if let Ok(v) = std::env::var("TOUCHHAND_SIM_HMD")
        && let Ok(connected) = v.trim().parse::<bool>()
    {
        cfg.sim_hmd_connected = connected;
    }
    if let Ok(v) = std::env::var("TOUCHHAND_PRETTY_JSON")
        && let Ok(pretty) = v.trim().parse::<bool>()
    {
        cfg.pretty_json = pretty;
    }
}

/// Save the config to disk, creating `~/.touchhand/` if necessary.
pub fn save(cfg: &Config) -> Result<(), TouchError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), TouchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            TouchError::Config(format!("failed to create config directory: {}", e))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                TouchError::Config(format!("failed to set config directory permissions: {}", e))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| TouchError::Config(format!("failed to serialize config: {}", e)))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| {
                TouchError::Config(format!("failed to write config at {}: {}", path.display(), e))
            })?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| {
        TouchError::Config(format!("failed to write config at {}: {}", path.display(), e))
    })?;
    Ok(())
}
