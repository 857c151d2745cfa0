pub use self::parser::{
    AuthConfig, Config, DatabaseConfig, DbType, LoggingConfig, ScrapeConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
