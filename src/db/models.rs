use chrono::{DateTime, Utc};

/// A dice roll extracted from chat history. Immutable once created;
/// `(timestamp, channel_id)` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roll {
    /// UTC, millisecond precision.
    pub timestamp: DateTime<Utc>,
    pub channel_id: String,
    pub user_id: String,
    pub value: i64,
}

/// A Slack user id with its (possibly not yet resolved) display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username {
    pub id: String,
    pub name: Option<String>,
}

/// A Slack channel id with its (possibly not yet resolved) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: Option<String>,
}
