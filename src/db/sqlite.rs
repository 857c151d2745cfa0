use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel::upsert::excluded;

use crate::db::schema::{channels, rolls, usernames};
use crate::utils::time::{from_unix_millis, to_unix_millis};

use super::{
    models::{Channel, Roll, Username},
    DatabaseError,
};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = rolls)]
struct DbRoll {
    timestamp: i64,
    channel_id: String,
    user_id: String,
    value: i64,
}

impl DbRoll {
    fn to_roll(&self) -> Result<Roll, DatabaseError> {
        Ok(Roll {
            timestamp: from_unix_millis(self.timestamp).ok_or_else(|| {
                DatabaseError::Query(format!("timestamp out of range: {}", self.timestamp))
            })?,
            channel_id: self.channel_id.clone(),
            user_id: self.user_id.clone(),
            value: self.value,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = rolls)]
struct NewRoll<'a> {
    timestamp: i64,
    channel_id: &'a str,
    user_id: &'a str,
    value: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = usernames)]
struct DbUsername {
    id: String,
    name: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = channels)]
struct DbChannel {
    id: String,
    name: Option<String>,
}

fn establish_connection(path: &str) -> Result<SqliteConnection, DatabaseError> {
    SqliteConnection::establish(path).map_err(|e| DatabaseError::Connection(e.to_string()))
}

pub struct SqliteRollStore {
    db_path: Arc<String>,
}

impl SqliteRollStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::RollStore for SqliteRollStore {
    async fn insert_roll(&self, roll: &Roll) -> Result<(), DatabaseError> {
        let roll = roll.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                // placeholder identity rows first so the roll's foreign
                // keys always resolve
                diesel::insert_into(usernames::table)
                    .values(&DbUsername {
                        id: roll.user_id.clone(),
                        name: None,
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)?;

                diesel::insert_into(channels::table)
                    .values(&DbChannel {
                        id: roll.channel_id.clone(),
                        name: None,
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)?;

                diesel::insert_into(rolls::table)
                    .values(&NewRoll {
                        timestamp: to_unix_millis(roll.timestamp),
                        channel_id: &roll.channel_id,
                        user_id: &roll.user_id,
                        value: roll.value,
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)?;

                Ok(())
            })
            .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn earliest_roll(&self) -> Result<Option<Roll>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::rolls::dsl::*;
            rolls
                .order(timestamp.asc())
                .select(DbRoll::as_select())
                .first::<DbRoll>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|r| r.to_roll())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn latest_roll(&self) -> Result<Option<Roll>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::rolls::dsl::*;
            rolls
                .order(timestamp.desc())
                .select(DbRoll::as_select())
                .first::<DbRoll>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|r| r.to_roll())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_rolls(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::rolls::dsl::*;
            rolls
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteUsernameStore {
    db_path: Arc<String>,
}

impl SqliteUsernameStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::UsernameStore for SqliteUsernameStore {
    async fn upsert_username(&self, username: &Username) -> Result<(), DatabaseError> {
        let username = username.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let row = DbUsername {
                id: username.id,
                name: username.name,
            };
            let result = if row.name.is_some() {
                diesel::insert_into(usernames::table)
                    .values(&row)
                    .on_conflict(usernames::id)
                    .do_update()
                    .set(usernames::name.eq(excluded(usernames::name)))
                    .execute(&mut conn)
            } else {
                // placeholder: never clobber a resolved name with null
                diesel::insert_into(usernames::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(&mut conn)
            };
            result
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_username(&self, user_id: &str) -> Result<Option<Username>, DatabaseError> {
        let user_id = user_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::usernames::dsl::*;
            usernames
                .filter(id.eq(user_id))
                .select(DbUsername::as_select())
                .first::<DbUsername>(&mut conn)
                .optional()
                .map(|row| {
                    row.map(|u| Username {
                        id: u.id,
                        name: u.name,
                    })
                })
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_incomplete_usernames(&self) -> Result<Vec<Username>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::usernames::dsl::*;
            let rows = usernames
                .filter(name.is_null())
                .select(DbUsername::as_select())
                .load::<DbUsername>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            Ok(rows
                .into_iter()
                .map(|u| Username {
                    id: u.id,
                    name: u.name,
                })
                .collect())
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteChannelStore {
    db_path: Arc<String>,
}

impl SqliteChannelStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::ChannelStore for SqliteChannelStore {
    async fn upsert_channel(&self, channel: &Channel) -> Result<(), DatabaseError> {
        let channel = channel.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let row = DbChannel {
                id: channel.id,
                name: channel.name,
            };
            let result = if row.name.is_some() {
                diesel::insert_into(channels::table)
                    .values(&row)
                    .on_conflict(channels::id)
                    .do_update()
                    .set(channels::name.eq(excluded(channels::name)))
                    .execute(&mut conn)
            } else {
                diesel::insert_into(channels::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(&mut conn)
            };
            result
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Option<Channel>, DatabaseError> {
        let channel_id = channel_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::channels::dsl::*;
            channels
                .filter(id.eq(channel_id))
                .select(DbChannel::as_select())
                .first::<DbChannel>(&mut conn)
                .optional()
                .map(|row| {
                    row.map(|c| Channel {
                        id: c.id,
                        name: c.name,
                    })
                })
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_incomplete_channels(&self) -> Result<Vec<Channel>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::channels::dsl::*;
            let rows = channels
                .filter(name.is_null())
                .select(DbChannel::as_select())
                .load::<DbChannel>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            Ok(rows
                .into_iter()
                .map(|c| Channel {
                    id: c.id,
                    name: c.name,
                })
                .collect())
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}
