use async_trait::async_trait;

use super::models::{Channel, Roll, Username};
use super::DatabaseError;

/// Persistence for rolls. All operations are idempotent and safe to
/// retry; a duplicate `(timestamp, channel_id)` insert is a no-op.
#[async_trait]
pub trait RollStore: Send + Sync {
    async fn insert_roll(&self, roll: &Roll) -> Result<(), DatabaseError>;
    async fn earliest_roll(&self) -> Result<Option<Roll>, DatabaseError>;
    async fn latest_roll(&self) -> Result<Option<Roll>, DatabaseError>;
    async fn count_rolls(&self) -> Result<i64, DatabaseError>;
}

#[async_trait]
pub trait UsernameStore: Send + Sync {
    /// Inserts or updates a username. A `None` name only ever creates a
    /// placeholder row; it never clears a resolved name.
    async fn upsert_username(&self, username: &Username) -> Result<(), DatabaseError>;
    async fn get_username(&self, id: &str) -> Result<Option<Username>, DatabaseError>;
    async fn list_incomplete_usernames(&self) -> Result<Vec<Username>, DatabaseError>;
}

#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Same placeholder semantics as [`UsernameStore::upsert_username`].
    async fn upsert_channel(&self, channel: &Channel) -> Result<(), DatabaseError>;
    async fn get_channel(&self, id: &str) -> Result<Option<Channel>, DatabaseError>;
    async fn list_incomplete_channels(&self) -> Result<Vec<Channel>, DatabaseError>;
}
