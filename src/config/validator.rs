use std::path::Path;

use thiserror::Error;

use super::parser::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: Config = serde_yaml::from_str(&raw)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Validation that must fail at startup, before any scheduled run.
    /// Called after CLI overrides are applied, not during [`Config::load`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scrape.offline
            && self
                .auth
                .oauth_token
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(ConfigError::Invalid(
                "auth.oauth_token is required in online mode; add it to the config file \
                 or set JOTTER_AUTH_OAUTH_TOKEN"
                    .to_string(),
            ));
        }

        if self.scrape.cron.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "scrape.cron must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("JOTTER_AUTH_OAUTH_TOKEN") {
            self.auth.oauth_token = Some(value);
        }
        if let Ok(value) = std::env::var("JOTTER_AUTH_APP_LEVEL_TOKEN") {
            self.auth.app_level_token = Some(value);
        }
        if let Ok(value) = std::env::var("JOTTER_DATABASE_URL") {
            self.database.url = Some(value);
        }
    }
}
