use chrono::{DateTime, Utc};

/// Raw scraping unit. Lives only between the message source and the
/// roll filter; never persisted.
#[derive(Debug, Clone)]
pub struct Message {
    pub channel_id: String,
    pub timestamp: DateTime<Utc>,
    /// Original Slack timestamp token, kept verbatim for pagination.
    pub ts_token: String,
    pub client_msg_id: Option<String>,
    pub user_id: String,
    pub text: String,
    pub attachment_texts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChannelSummary {
    pub id: String,
    pub name: Option<String>,
    pub is_member: bool,
}

#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// Newest first, per the upstream API's native order.
    pub messages: Vec<Message>,
    pub has_more: bool,
}
