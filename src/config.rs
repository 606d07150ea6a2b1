use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};

/// repository configuration stored in config.toml
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub core: CoreConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserConfig>,
}

/// core repository settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoreConfig {
    /// on-disk layout version; only 0 is understood
    pub repository_format_version: u32,
    #[serde(default)]
    pub bare: bool,
}

/// identity used for commits and tags
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: String,
    pub email: String,
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        if config.core.repository_format_version != 0 {
            return Err(Error::UnsupportedVersion(config.core.repository_format_version));
        }
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// commit identity as "Name <email>", if configured
    pub fn identity(&self) -> Option<String> {
        self.user
            .as_ref()
            .map(|u| format!("{} <{}>", u.name, u.email))
    }

    /// set the user identity
    pub fn set_user(&mut self, name: impl Into<String>, email: impl Into<String>) {
        self.user = Some(UserConfig {
            name: name.into(),
            email: email.into(),
        });
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig {
                repository_format_version: 0,
                bare: false,
            },
            user: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = Config::default();
        config.set_user("Example Committer", "committer@example.com");

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.core.repository_format_version, 0);
        assert_eq!(parsed.user, config.user);
    }

    #[test]
    fn test_config_identity() {
        let mut config = Config::default();
        assert!(config.identity().is_none());

        config.set_user("A B", "ab@example.com");
        assert_eq!(config.identity().unwrap(), "A B <ab@example.com>");
    }

    #[test]
    fn test_config_minimal_toml() {
        let toml_str = r#"
[core]
repository_format_version = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(!config.core.bare);
        assert!(config.user.is_none());
    }

    #[test]
    fn test_config_load_rejects_future_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[core]\nrepository_format_version = 1\n").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(Error::UnsupportedVersion(1))));
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.set_user("Saver", "saver@example.com");
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.identity().unwrap(), "Saver <saver@example.com>");
    }
}
