use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::{Channel, Username};
use crate::utils::time::{from_slack_ts, from_unix_millis};

use super::types::{ChannelSummary, HistoryPage, Message};
use super::{ChannelLister, ChannelLookup, HistoryFetcher, SlackError, UserLookup};

const MESSAGE_SPACING_SECS: i64 = 600;
const PAGE_SIZE: usize = 50;
/// Synthetic history only reaches back one day, no matter how wide the
/// requested window is.
const HISTORY_DEPTH_SECS: i64 = 86_400;

const ROSTER: &[(&str, &str)] = &[
    ("U0ALICE", "Alice"),
    ("U0BOB", "Bob"),
    ("U0CAROL", "Carol"),
    ("U0DAVE", "Dave"),
];

const CHANNELS: &[(&str, &str, bool)] = &[
    ("C0GENERAL", "general", true),
    ("C0DICE", "dice-pit", true),
    ("C0SECRET", "secret-lair", false),
];

/// Offline stand-in for the Slack API. Message history is synthesized
/// deterministically from the requested window bounds, so repeated
/// scrapes of the same window see identical data and pagination
/// terminates naturally.
pub struct MockSlack;

impl MockSlack {
    pub fn new() -> Self {
        Self
    }

    fn synth_message(channel_id: &str, slot: i64) -> Message {
        let ts_secs = slot * MESSAGE_SPACING_SECS;
        let (user_id, _) = ROSTER[(slot as usize) % ROSTER.len()];
        let value = slot % 100;

        // cycle through valid rolls, malformed rolls and plain chatter
        let attachment = match slot % 7 {
            0 | 1 | 2 => Some(format!("<@{user_id}> rolled *{value}*")),
            3 => Some(format!("{user_id} rolled *{value}*")),
            4 => Some(format!("<@{user_id}> rolledd *{value}*")),
            5 => Some(format!("<@{user_id}> rolled *{value}* extra text")),
            _ => None,
        };

        let (text, attachment_texts) = match attachment {
            Some(a) => (String::new(), vec![a]),
            None => ("This is a message".to_string(), Vec::new()),
        };

        Message {
            channel_id: channel_id.to_string(),
            timestamp: from_unix_millis(ts_secs * 1000).expect("mock timestamp in range"),
            ts_token: format!("{ts_secs}.000000"),
            client_msg_id: Some(Uuid::new_v4().to_string()),
            user_id: user_id.to_string(),
            text,
            attachment_texts,
        }
    }
}

impl Default for MockSlack {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelLister for MockSlack {
    async fn list_channels(&self) -> Result<Vec<ChannelSummary>, SlackError> {
        Ok(CHANNELS
            .iter()
            .map(|(id, name, is_member)| ChannelSummary {
                id: id.to_string(),
                name: Some(name.to_string()),
                is_member: *is_member,
            })
            .collect())
    }
}

#[async_trait]
impl HistoryFetcher for MockSlack {
    async fn history_page(
        &self,
        channel_id: &str,
        latest: Option<&str>,
        oldest: &str,
    ) -> Result<HistoryPage, SlackError> {
        let oldest = from_slack_ts(oldest)
            .ok_or_else(|| SlackError::BadResponse(format!("bad oldest token: {oldest}")))?;
        let latest = match latest {
            Some(token) => from_slack_ts(token)
                .ok_or_else(|| SlackError::BadResponse(format!("bad latest token: {token}")))?,
            None => Utc::now(),
        };

        // message slots sit on a fixed grid; newest first, upper bound
        // exclusive
        let newest_slot = {
            let mut slot = latest.timestamp() / MESSAGE_SPACING_SECS;
            if slot * MESSAGE_SPACING_SECS >= latest.timestamp() {
                slot -= 1;
            }
            slot
        };
        let oldest_slot =
            (oldest.timestamp() + MESSAGE_SPACING_SECS - 1) / MESSAGE_SPACING_SECS;
        let depth_floor =
            (Utc::now().timestamp() - HISTORY_DEPTH_SECS) / MESSAGE_SPACING_SECS + 1;
        let oldest_slot = oldest_slot.max(depth_floor);

        let mut messages = Vec::new();
        let mut slot = newest_slot;
        while slot >= oldest_slot && messages.len() < PAGE_SIZE {
            messages.push(Self::synth_message(channel_id, slot));
            slot -= 1;
        }

        Ok(HistoryPage {
            has_more: slot >= oldest_slot,
            messages,
        })
    }
}

#[async_trait]
impl UserLookup for MockSlack {
    async fn user_info(&self, user_id: &str) -> Result<Option<Username>, SlackError> {
        Ok(ROSTER
            .iter()
            .find(|(id, _)| *id == user_id)
            .map(|(id, name)| Username {
                id: id.to_string(),
                name: Some(name.to_string()),
            }))
    }
}

#[async_trait]
impl ChannelLookup for MockSlack {
    async fn channel_info(&self, channel_id: &str) -> Result<Option<Channel>, SlackError> {
        Ok(CHANNELS
            .iter()
            .find(|(id, _, _)| *id == channel_id)
            .map(|(id, name, _)| Channel {
                id: id.to_string(),
                name: Some(name.to_string()),
            }))
    }
}
