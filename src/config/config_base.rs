use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use super::connection::Connection;
pub use super::user::{State, User};

/// Declared state of one user, plus how to reach the cluster.
///  - `connection`: where to connect and as whom. Defaults to
///  `postgres@localhost:5432`.
///  - `user`: the declared user, see [User].
///
/// For example:
///
/// ```yaml
/// connection:
///   host: localhost
///   user: postgres
///   password: ${PGPASSWORD}
///
/// user:
///   name: django
///   password: ${DJANGO_PASSWORD}
///   state: present
///   db: acme
///   priv: CONNECT/products:ALL
///   role_attr_flags: NOSUPERUSER,CREATEDB
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub connection: Connection,
    pub user: User,
}

impl std::str::FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(s)?;

        // Validate
        config.validate()?;

        Ok(config)
    }
}

impl Config {
    pub fn new(config_path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        let config: Config = serde_yaml::from_str(&config_str)
            .with_context(|| format!("failed to parse config file {}", config_path.display()))?;

        // expand env variables before validating, the password may come from there
        let config = config.expand_env_vars()?;

        config.validate()?;

        Ok(config)
    }

    /// Pre-flight checks, nothing here needs a connection.
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        self.user.to_request()?;

        Ok(())
    }

    // Expand env variables in config
    fn expand_env_vars(&self) -> Result<Self> {
        let mut config = self.clone();

        config.connection = config.connection.expand_env_vars()?;
        config.user.password = config
            .user
            .password
            .as_deref()
            .map(super::connection::expand);

        Ok(config)
    }
}
