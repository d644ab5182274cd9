//! Store configuration handling.
//!
//! Configuration is read once at construction and is immutable afterwards.
//! The default location is `<config_dir>/credstore.toml`, e.g.
//! `~/.config/credstore/credstore.toml` on Linux.
//!
//! ```toml
//! shared_access_group = "com.example.shared"
//! sharing_policy = "fallback_to_private"
//! backend = "keyring"
//! keyring_service = "credstore"
//! ```

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::attributes::{PASSWORD_ACCOUNT_SUFFIX, PASSWORD_SERVICE_SUFFIX};

/// What to do when a shared item is addressed but no access group is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingPolicy {
    /// Treat the item as private and log a warning.
    #[default]
    FallbackToPrivate,

    /// Reject the operation before it reaches the backend.
    Reject,
}

/// Which backend a store is built on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process store; contents are lost on exit.
    Memory,

    /// The platform keyring.
    #[default]
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Access group used for shared items.
    pub shared_access_group: Option<String>,

    pub sharing_policy: SharingPolicy,

    /// Suffix appended to a password tag to form its service attribute.
    pub password_service_suffix: String,

    /// Suffix appended to a password tag to form its account attribute.
    pub password_account_suffix: String,

    pub backend: BackendKind,

    /// Service namespace for keyring entries.
    pub keyring_service: String,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shared_access_group: None,
            sharing_policy: SharingPolicy::default(),
            password_service_suffix: PASSWORD_SERVICE_SUFFIX.to_string(),
            password_account_suffix: PASSWORD_ACCOUNT_SUFFIX.to_string(),
            backend: BackendKind::default(),
            keyring_service: default_keyring_service(),
            config_path: PathBuf::new(),
        }
    }
}

fn default_keyring_service() -> String {
    "credstore".to_string()
}

impl StoreConfig {
    /// Config for an in-memory store with the given shared access group.
    pub fn in_memory(shared_access_group: Option<String>) -> Self {
        Self {
            shared_access_group,
            backend: BackendKind::Memory,
            ..Self::default()
        }
        .normalized()
    }

    fn normalized(mut self) -> Self {
        if self.shared_access_group.as_deref().is_some_and(|g| g.trim().is_empty()) {
            self.shared_access_group = None;
        }
        if self.keyring_service.is_empty() {
            self.keyring_service = default_keyring_service();
        }
        self
    }
}

/// Load configuration from the default location or create defaults.
pub fn load_config() -> Result<StoreConfig> {
    let config_path = project_dirs()
        .map(|d| d.config_dir().join("credstore.toml"))
        .unwrap_or_else(|| PathBuf::from("credstore.toml"));

    load_config_from_path(&config_path)
}

/// Load configuration from `path`, falling back to defaults if it does not exist.
pub fn load_config_from_path(path: &Path) -> Result<StoreConfig> {
    let config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str::<StoreConfig>(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?
    } else {
        tracing::debug!(path = ?path, "No config file found, using defaults");
        StoreConfig::default()
    };

    Ok(StoreConfig {
        config_path: path.to_path_buf(),
        ..config.normalized()
    })
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "credstore", "credstore")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.toml");

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.shared_access_group, None);
        assert_eq!(config.sharing_policy, SharingPolicy::FallbackToPrivate);
        assert_eq!(config.password_service_suffix, "PasswordService");
        assert_eq!(config.password_account_suffix, "PasswordAccount");
        assert_eq!(config.backend, BackendKind::Keyring);
        assert_eq!(config.config_path, path);
    }

    #[test]
    fn test_parse_full_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credstore.toml");
        std::fs::write(
            &path,
            r#"
shared_access_group = "com.example.shared"
sharing_policy = "reject"
password_service_suffix = "KMPasswordService"
password_account_suffix = "KMPasswordAccount"
backend = "memory"
keyring_service = "example"
"#,
        )
        .unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.shared_access_group.as_deref(), Some("com.example.shared"));
        assert_eq!(config.sharing_policy, SharingPolicy::Reject);
        assert_eq!(config.password_service_suffix, "KMPasswordService");
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.keyring_service, "example");
    }

    #[test]
    fn test_empty_access_group_normalized() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credstore.toml");
        std::fs::write(&path, "shared_access_group = \"\"\n").unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.shared_access_group, None);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credstore.toml");
        std::fs::write(&path, "backend = \"floppy\"\n").unwrap();

        let err = load_config_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config"));
    }
}
