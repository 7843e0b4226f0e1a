//! Relay configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux/macOS: `~/.config/appdb/relay.toml`
//! - Windows: `%APPDATA%/appdb/relay.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use appdb_protocol::constants::{DEFAULT_SERVER_PORT, DEFAULT_UPLOAD_FIELD};

/// Relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the packages. `~` expands to the home directory.
    #[serde(default = "default_store_root")]
    pub store_root: String,

    /// Inbox drained on every listing (empty = `<store_root>/Inbox`).
    #[serde(default)]
    pub inbox_dir: String,

    /// Loopback port of the file server.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Endpoint uploads are POSTed to.
    #[serde(default)]
    pub upload_url: String,

    /// Multipart field name carrying the package.
    #[serde(default = "default_upload_field")]
    pub upload_field: String,
}

fn default_store_root() -> String {
    "~/.local/share/appdb/Documents".into()
}

fn default_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_upload_field() -> String {
    DEFAULT_UPLOAD_FIELD.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            inbox_dir: String::new(),
            port: default_port(),
            upload_url: String::new(),
            upload_field: default_upload_field(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    /// Loads configuration from `path`, writing the defaults there first
    /// if the file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn store_root_path(&self) -> PathBuf {
        expand_home(&self.store_root)
    }

    pub fn inbox_path(&self) -> Option<PathBuf> {
        if self.inbox_dir.trim().is_empty() {
            None
        } else {
            Some(expand_home(&self.inbox_dir))
        }
    }
}

fn home_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";

    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Expands a leading `~` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("appdb").join("relay.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        home_dir().join(".config").join("appdb").join("relay.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upload_field, "ipa");
        assert!(config.inbox_path().is_none());
        assert!(config.upload_url.is_empty());
    }

    #[test]
    fn config_partial_toml() {
        let config: Config = toml::from_str(r#"store_root = "/srv/ipa""#).unwrap();
        assert_eq!(config.store_root_path(), PathBuf::from("/srv/ipa"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.upload_field, "ipa");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            store_root: "/data/Documents".into(),
            inbox_dir: "/data/Inbox".into(),
            port: 9090,
            upload_url: "https://example.com/upload".into(),
            upload_field: "file".into(),
        };

        let parsed: Config = toml::from_str(&toml::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(parsed.store_root, "/data/Documents");
        assert_eq!(parsed.inbox_path(), Some(PathBuf::from("/data/Inbox")));
        assert_eq!(parsed.port, 9090);
        assert_eq!(parsed.upload_url, "https://example.com/upload");
        assert_eq!(parsed.upload_field, "file");
    }

    #[test]
    fn load_writes_defaults_on_first_run() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("relay.toml");

        let config = Config::load_from(&path).unwrap();

        assert!(path.is_file());
        assert_eq!(config.port, 8080);
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.store_root, config.store_root);
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_home("~/Documents");
        assert!(expanded.ends_with("Documents"));
        assert_ne!(expanded, PathBuf::from("~/Documents"));
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn config_path_not_empty() {
        assert!(config_path().to_string_lossy().contains("appdb"));
    }
}
