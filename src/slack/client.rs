use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::db::{Channel, Username};
use crate::utils::time::from_slack_ts;

use super::types::{ChannelSummary, HistoryPage, Message};
use super::{ChannelLister, ChannelLookup, HistoryFetcher, SlackError, UserLookup};

const API_BASE: &str = "https://slack.com/api";
const HISTORY_PAGE_LIMIT: u32 = 200;

/// Thin client over the Slack Web API methods the scraper needs:
/// `conversations.list`, `conversations.history`, `conversations.info`
/// and `users.info`.
pub struct SlackClient {
    http: reqwest::Client,
    token: SecretString,
}

impl SlackClient {
    pub fn new(oauth_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: SecretString::from(oauth_token),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SlackError> {
        let url = format!("{API_BASE}/{method}");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    channels: Vec<WireChannel>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_member: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    messages: Vec<WireMessage>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct WireMessage {
    ts: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    client_msg_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireAttachment {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    ok: bool,
    error: Option<String>,
    user: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    #[serde(default)]
    profile: WireProfile,
}

#[derive(Debug, Default, Deserialize)]
struct WireProfile {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelInfoResponse {
    ok: bool,
    error: Option<String>,
    channel: Option<WireChannel>,
}

fn api_err(method: &str, error: Option<String>) -> SlackError {
    SlackError::Api {
        method: method.to_string(),
        error: error.unwrap_or_else(|| "unknown error".to_string()),
    }
}

impl WireMessage {
    fn into_message(self, channel_id: &str) -> Result<Message, SlackError> {
        let timestamp = from_slack_ts(&self.ts)
            .ok_or_else(|| SlackError::BadResponse(format!("bad message ts: {}", self.ts)))?;
        Ok(Message {
            channel_id: channel_id.to_string(),
            timestamp,
            ts_token: self.ts,
            client_msg_id: self.client_msg_id,
            user_id: self.user.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            attachment_texts: self
                .attachments
                .into_iter()
                .map(|a| a.text.unwrap_or_default())
                .collect(),
        })
    }
}

/// Builds a short display name from profile first/last names, spending a
/// fixed character budget across both.
pub(crate) fn short_display_name(first: &str, last: &str, max_length: usize) -> Option<String> {
    let per_name = (max_length.saturating_sub(1)) / 2;
    let take = |s: &str, n: usize| s.chars().take(n).collect::<String>();

    let name = if last.is_empty() {
        take(first, max_length)
    } else {
        format!("{} {}", take(first, per_name), take(last, per_name))
    };

    let name = name.trim().to_string();
    if name.is_empty() { None } else { Some(name) }
}

#[async_trait]
impl ChannelLister for SlackClient {
    async fn list_channels(&self) -> Result<Vec<ChannelSummary>, SlackError> {
        let mut channels = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut query = vec![("limit", "200")];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }
            let response: ListResponse = self.get("conversations.list", &query).await?;
            if !response.ok {
                return Err(api_err("conversations.list", response.error));
            }

            channels.extend(response.channels.into_iter().map(|c| ChannelSummary {
                id: c.id,
                name: c.name,
                is_member: c.is_member,
            }));

            cursor = response
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }

        Ok(channels)
    }
}

#[async_trait]
impl HistoryFetcher for SlackClient {
    async fn history_page(
        &self,
        channel_id: &str,
        latest: Option<&str>,
        oldest: &str,
    ) -> Result<HistoryPage, SlackError> {
        let limit = HISTORY_PAGE_LIMIT.to_string();
        let mut query = vec![
            ("channel", channel_id),
            ("oldest", oldest),
            ("limit", limit.as_str()),
        ];
        if let Some(latest) = latest {
            query.push(("latest", latest));
        }

        let response: HistoryResponse = self.get("conversations.history", &query).await?;
        if !response.ok {
            return Err(api_err("conversations.history", response.error));
        }

        let messages = response
            .messages
            .into_iter()
            .map(|m| m.into_message(channel_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(HistoryPage {
            messages,
            has_more: response.has_more,
        })
    }
}

#[async_trait]
impl UserLookup for SlackClient {
    async fn user_info(&self, user_id: &str) -> Result<Option<Username>, SlackError> {
        let response: UserInfoResponse =
            self.get("users.info", &[("user", user_id)]).await?;
        if !response.ok {
            return match response.error.as_deref() {
                Some("user_not_found") => Ok(None),
                error => Err(api_err("users.info", error.map(str::to_string))),
            };
        }

        let user = match response.user {
            Some(user) => user,
            None => return Ok(None),
        };

        let first = user.profile.first_name.unwrap_or_default();
        let last = user.profile.last_name.unwrap_or_default();
        let name = short_display_name(&first, &last, 7)
            .or(user.profile.display_name.filter(|d| !d.is_empty()));

        // a nameless profile stays a placeholder for a later run
        Ok(name.map(|name| Username {
            id: user.id,
            name: Some(name),
        }))
    }
}

#[async_trait]
impl ChannelLookup for SlackClient {
    async fn channel_info(&self, channel_id: &str) -> Result<Option<Channel>, SlackError> {
        let response: ChannelInfoResponse = self
            .get("conversations.info", &[("channel", channel_id)])
            .await?;
        if !response.ok {
            return match response.error.as_deref() {
                Some("channel_not_found") => Ok(None),
                error => Err(api_err("conversations.info", error.map(str::to_string))),
            };
        }

        Ok(response.channel.map(|c| Channel {
            id: c.id,
            name: c.name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("Alexandra", "Hamilton", Some("Ale Ham"); "both names truncated")]
    #[test_case("Bo", "Li", Some("Bo Li"); "short names kept whole")]
    #[test_case("Maximilian", "", Some("Maximil"); "first name only uses full budget")]
    #[test_case("", "", None; "empty profile yields nothing")]
    fn shortens_profile_names(first: &str, last: &str, expected: Option<&str>) {
        assert_eq!(
            short_display_name(first, last, 7).as_deref(),
            expected
        );
    }

    #[test]
    fn parses_history_payload() {
        let payload = r#"{
            "ok": true,
            "messages": [
                {
                    "ts": "1693305600.001234",
                    "user": "U02AB3CDE",
                    "client_msg_id": "f1c7-44",
                    "text": "",
                    "attachments": [{"text": "<@U02AB3CDE> rolled *42*"}]
                },
                {"ts": "1693305000.000000", "subtype": "channel_join"}
            ],
            "has_more": true
        }"#;

        let response: HistoryResponse = serde_json::from_str(payload).expect("parse");
        assert!(response.ok && response.has_more);
        assert_eq!(response.messages.len(), 2);

        let message = response.messages[0]
            .clone()
            .into_message("C1")
            .expect("message");
        assert_eq!(message.user_id, "U02AB3CDE");
        assert_eq!(message.ts_token, "1693305600.001234");
        assert_eq!(message.timestamp.timestamp_millis(), 1_693_305_600_001);
        assert_eq!(message.attachment_texts, vec!["<@U02AB3CDE> rolled *42*"]);

        let bare = response.messages[1].clone().into_message("C1").expect("message");
        assert!(bare.user_id.is_empty());
        assert!(bare.attachment_texts.is_empty());
    }

    #[test]
    fn parses_user_info_and_falls_back_to_display_name() {
        let payload = r#"{
            "ok": true,
            "user": {
                "id": "U02AB3CDE",
                "profile": {"first_name": "", "last_name": "", "display_name": "dicelord"}
            }
        }"#;

        let response: UserInfoResponse = serde_json::from_str(payload).expect("parse");
        let user = response.user.expect("user");
        let first = user.profile.first_name.unwrap_or_default();
        let last = user.profile.last_name.unwrap_or_default();
        let name = short_display_name(&first, &last, 7)
            .or(user.profile.display_name.filter(|d| !d.is_empty()));
        assert_eq!(name.as_deref(), Some("dicelord"));
    }

    #[test]
    fn rejects_malformed_message_ts() {
        let wire = WireMessage {
            ts: "not-a-ts".to_string(),
            user: None,
            client_msg_id: None,
            text: None,
            attachments: Vec::new(),
        };
        assert!(wire.into_message("C1").is_err());
    }
}
