use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Slack bot OAuth token (`xoxb-…`). Required in online mode.
    #[serde(default)]
    pub oauth_token: Option<String>,
    #[serde(default)]
    pub app_level_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapeConfig {
    /// Six-field cron expression driving scheduled scrapes.
    #[serde(default = "default_cron")]
    pub cron: String,
    /// How far back the historic backfill may reach, in years. Kept as a
    /// string so a bad value degrades to the default instead of failing
    /// the whole config load.
    #[serde(default)]
    pub backfill_horizon_years: Option<String>,
    /// Use mock collaborators instead of the Slack API.
    #[serde(default)]
    pub offline: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            backfill_horizon_years: None,
            offline: false,
        }
    }
}

impl ScrapeConfig {
    pub fn backfill_horizon_years(&self) -> i32 {
        match self.backfill_horizon_years.as_deref() {
            None => DEFAULT_HORIZON_YEARS,
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(years) if years > 0 => years,
                _ => {
                    warn!(
                        value = raw,
                        default = DEFAULT_HORIZON_YEARS,
                        "unparseable backfill horizon, using default"
                    );
                    DEFAULT_HORIZON_YEARS
                }
            },
        }
    }
}

const DEFAULT_HORIZON_YEARS: i32 = 2;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// `sqlite://path` or `postgres://…`. Unset defaults to a local
    /// sqlite file next to the binary.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
}

impl DatabaseConfig {
    pub fn db_type(&self) -> DbType {
        let url = self.connection_string();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DbType::Postgres
        } else {
            DbType::Sqlite
        }
    }

    pub fn connection_string(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| "sqlite://jotter.sqlite".to_string())
    }

    pub fn sqlite_path(&self) -> Option<String> {
        match self.db_type() {
            DbType::Sqlite => {
                let url = self.connection_string();
                Some(url.strip_prefix("sqlite://").unwrap_or(&url).to_string())
            }
            DbType::Postgres => None,
        }
    }

    pub fn max_connections(&self) -> u32 {
        match self.db_type() {
            DbType::Postgres => self.max_connections.unwrap_or(10),
            DbType::Sqlite => 1,
        }
    }

    pub fn min_connections(&self) -> u32 {
        match self.db_type() {
            DbType::Postgres => self.min_connections.unwrap_or(1),
            DbType::Sqlite => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_cron() -> String {
    // twice daily, 09:00 and 17:00
    "0 0 9,17 * * *".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_defaults_when_unset() {
        let scrape = ScrapeConfig::default();
        assert_eq!(scrape.backfill_horizon_years(), 2);
    }

    #[test]
    fn horizon_defaults_when_unparseable() {
        let scrape = ScrapeConfig {
            backfill_horizon_years: Some("two".to_string()),
            ..ScrapeConfig::default()
        };
        assert_eq!(scrape.backfill_horizon_years(), 2);

        let negative = ScrapeConfig {
            backfill_horizon_years: Some("-3".to_string()),
            ..ScrapeConfig::default()
        };
        assert_eq!(negative.backfill_horizon_years(), 2);
    }

    #[test]
    fn horizon_parses_configured_value() {
        let scrape = ScrapeConfig {
            backfill_horizon_years: Some("5".to_string()),
            ..ScrapeConfig::default()
        };
        assert_eq!(scrape.backfill_horizon_years(), 5);
    }

    #[test]
    fn database_url_selects_backend() {
        let pg = DatabaseConfig {
            url: Some("postgres://localhost/jotter".to_string()),
            ..DatabaseConfig::default()
        };
        assert_eq!(pg.db_type(), DbType::Postgres);
        assert!(pg.sqlite_path().is_none());

        let lite = DatabaseConfig {
            url: Some("sqlite:///var/lib/jotter/rolls.db".to_string()),
            ..DatabaseConfig::default()
        };
        assert_eq!(lite.db_type(), DbType::Sqlite);
        assert_eq!(
            lite.sqlite_path().as_deref(),
            Some("/var/lib/jotter/rolls.db")
        );
    }

    #[test]
    fn database_defaults_to_local_sqlite() {
        let db = DatabaseConfig::default();
        assert_eq!(db.db_type(), DbType::Sqlite);
        assert_eq!(db.max_connections(), 1);
    }
}
