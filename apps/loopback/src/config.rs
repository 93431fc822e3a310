//! Loopback configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/bandbridge/loopback.toml`
//! - Windows: `%APPDATA%/bandbridge/loopback.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bandbridge_ebook::SessionConfig;

/// Loopback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Device address reported to the session.
    #[serde(default = "default_device")]
    pub device: String,

    /// Transfer session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Behaviour of the simulated receiver.
    #[serde(default)]
    pub receiver: ReceiverConfig,
}

/// Knobs for the simulated receiver app.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Storage usage the receiver reports, in bytes.
    #[serde(default)]
    pub storage_usage: u64,

    /// Chunk the receiver rejects once, forcing a resend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_chunk: Option<usize>,
}

fn default_device() -> String {
    "loopback".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device(),
            session: SessionConfig::default(),
            receiver: ReceiverConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Loads configuration from an explicit file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration read");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("bandbridge").join("loopback.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("bandbridge")
            .join("loopback.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.device, "loopback");
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.receiver.storage_usage, 0);
        assert!(config.receiver.fail_chunk.is_none());
    }

    #[test]
    fn config_partial_toml() {
        let toml_str = r#"
device = "AA:BB:CC"

[session]
chunk_size = 1024

[receiver]
fail_chunk = 3
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device, "AA:BB:CC");
        assert_eq!(config.session.chunk_size, 1024);
        assert_eq!(config.session.app_id, "com.bandbbs.ebook");
        assert_eq!(config.receiver.fail_chunk, Some(3));
    }

    #[test]
    fn config_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("loopback.toml");

        let config = Config {
            device: "SaveTest".into(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("bandbridge"));
    }
}
