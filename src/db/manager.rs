use std::sync::Arc;

use crate::config::{DatabaseConfig, DbType as ConfigDbType};
use crate::db::{ChannelStore, DatabaseError, RollStore, UsernameStore};

#[cfg(feature = "postgres")]
use crate::db::postgres::{PostgresChannelStore, PostgresRollStore, PostgresUsernameStore};
#[cfg(feature = "postgres")]
use diesel::pg::PgConnection;
#[cfg(feature = "postgres")]
use diesel::r2d2::{self, ConnectionManager};
#[cfg(feature = "postgres")]
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::{SqliteChannelStore, SqliteRollStore, SqliteUsernameStore};
#[cfg(feature = "sqlite")]
use diesel::sqlite::SqliteConnection;
#[cfg(feature = "sqlite")]
use diesel::Connection;

use diesel::RunQueryDsl;

#[derive(Clone)]
pub struct DatabaseManager {
    #[cfg(feature = "postgres")]
    postgres_pool: Option<Pool>,
    #[cfg(feature = "sqlite")]
    sqlite_path: Option<String>,
    roll_store: Arc<dyn RollStore>,
    username_store: Arc<dyn UsernameStore>,
    channel_store: Arc<dyn ChannelStore>,
    db_type: DbType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

impl From<ConfigDbType> for DbType {
    fn from(value: ConfigDbType) -> Self {
        match value {
            ConfigDbType::Postgres => DbType::Postgres,
            ConfigDbType::Sqlite => DbType::Sqlite,
        }
    }
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let db_type = DbType::from(config.db_type());

        match db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let manager = ConnectionManager::<PgConnection>::new(config.connection_string());
                let pool = r2d2::Pool::builder()
                    .max_size(config.max_connections())
                    .min_idle(Some(config.min_connections()))
                    .build(manager)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;

                let roll_store = Arc::new(PostgresRollStore::new(pool.clone()));
                let username_store = Arc::new(PostgresUsernameStore::new(pool.clone()));
                let channel_store = Arc::new(PostgresChannelStore::new(pool.clone()));

                Ok(Self {
                    postgres_pool: Some(pool),
                    #[cfg(feature = "sqlite")]
                    sqlite_path: None,
                    roll_store,
                    username_store,
                    channel_store,
                    db_type,
                })
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = config
                    .sqlite_path()
                    .ok_or_else(|| DatabaseError::Connection("missing sqlite path".to_string()))?;
                let path_arc = Arc::new(path.clone());

                let roll_store = Arc::new(SqliteRollStore::new(path_arc.clone()));
                let username_store = Arc::new(SqliteUsernameStore::new(path_arc.clone()));
                let channel_store = Arc::new(SqliteChannelStore::new(path_arc));

                Ok(Self {
                    #[cfg(feature = "postgres")]
                    postgres_pool: None,
                    sqlite_path: Some(path),
                    roll_store,
                    username_store,
                    channel_store,
                    db_type,
                })
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Connection(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Connection(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        match self.db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let pool = self.postgres_pool.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("postgres pool not initialized".to_string())
                })?;
                Self::migrate_postgres(pool).await
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = self.sqlite_path.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("sqlite path not initialized".to_string())
                })?;
                Self::migrate_sqlite(path).await
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Migration(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Migration(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    #[cfg(feature = "postgres")]
    async fn migrate_postgres(pool: &Pool) -> Result<(), DatabaseError> {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS usernames (
                    id TEXT PRIMARY KEY,
                    name TEXT
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS channels (
                    id TEXT PRIMARY KEY,
                    name TEXT
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS rolls (
                    timestamp BIGINT NOT NULL,
                    channel_id TEXT NOT NULL REFERENCES channels(id),
                    user_id TEXT NOT NULL REFERENCES usernames(id),
                    value BIGINT NOT NULL,
                    PRIMARY KEY (timestamp, channel_id)
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_rolls_channel_id ON rolls(channel_id)",
                "CREATE INDEX IF NOT EXISTS idx_rolls_user_id ON rolls(user_id)",
                "CREATE INDEX IF NOT EXISTS idx_rolls_timestamp ON rolls(timestamp)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    #[cfg(feature = "sqlite")]
    async fn migrate_sqlite(path: &str) -> Result<(), DatabaseError> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = SqliteConnection::establish(&path)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS usernames (
                    id TEXT PRIMARY KEY,
                    name TEXT
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS channels (
                    id TEXT PRIMARY KEY,
                    name TEXT
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS rolls (
                    timestamp INTEGER NOT NULL,
                    channel_id TEXT NOT NULL REFERENCES channels(id),
                    user_id TEXT NOT NULL REFERENCES usernames(id),
                    value INTEGER NOT NULL,
                    PRIMARY KEY (timestamp, channel_id)
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_rolls_channel_id ON rolls(channel_id)",
                "CREATE INDEX IF NOT EXISTS idx_rolls_user_id ON rolls(user_id)",
                "CREATE INDEX IF NOT EXISTS idx_rolls_timestamp ON rolls(timestamp)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn roll_store(&self) -> Arc<dyn RollStore> {
        self.roll_store.clone()
    }

    pub fn username_store(&self) -> Arc<dyn UsernameStore> {
        self.username_store.clone()
    }

    pub fn channel_store(&self) -> Arc<dyn ChannelStore> {
        self.channel_store.clone()
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }
}
