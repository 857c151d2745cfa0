pub use self::client::SlackClient;
pub use self::mock::MockSlack;
pub use self::types::{ChannelSummary, HistoryPage, Message};

pub mod client;
pub mod mock;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::{Channel, Username};

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("slack http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack api error from {method}: {error}")]
    Api { method: String, error: String },
    #[error("unexpected slack response: {0}")]
    BadResponse(String),
}

/// Lists the channels the bot can see; only channels it is a member of
/// are scraped.
#[async_trait]
pub trait ChannelLister: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<ChannelSummary>, SlackError>;
}

/// One page of channel history, newest first. `latest` is an exclusive
/// upper bound token; `oldest` an inclusive lower bound.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    async fn history_page(
        &self,
        channel_id: &str,
        latest: Option<&str>,
        oldest: &str,
    ) -> Result<HistoryPage, SlackError>;
}

/// Resolves a user id to a display name. `Ok(None)` means the platform
/// does not know the id; the placeholder row stays for a later run.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn user_info(&self, user_id: &str) -> Result<Option<Username>, SlackError>;
}

#[async_trait]
pub trait ChannelLookup: Send + Sync {
    async fn channel_info(&self, channel_id: &str) -> Result<Option<Channel>, SlackError>;
}
