use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::Roll;
use crate::slack::Message;

// Dicebot posts rolls as the first attachment text, exactly
// `<@UserId> rolled *N*`. Anything looser is dropped, not repaired.
static ROLL_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<@[A-Za-z0-9]+>\s+rolled\s+\*\d+\*$").expect("valid regex"));
static TAGGED_USER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@([A-Za-z0-9]+)>").expect("valid regex"));
static ROLL_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(\d+)\*").expect("valid regex"));

/// Extracts a roll from a message, if its first attachment is a
/// well-formed dice-roll announcement.
///
/// The user id comes from the tag inside the attachment text; timestamp
/// and channel come from the message envelope. Malformed text yields
/// `None`, never an error.
pub fn extract_roll(message: &Message) -> Option<Roll> {
    let text = message.attachment_texts.first()?;
    if text.is_empty() || !ROLL_FORMAT.is_match(text) {
        return None;
    }

    let user_id = TAGGED_USER.captures(text)?.get(1)?.as_str();
    let value: i64 = ROLL_VALUE.captures(text)?.get(1)?.as_str().parse().ok()?;

    Some(Roll {
        timestamp: message.timestamp,
        channel_id: message.channel_id.clone(),
        user_id: user_id.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    use super::*;

    fn message_with_attachment(text: &str) -> Message {
        Message {
            channel_id: "C1".to_string(),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            ts_token: "1700000000.123000".to_string(),
            client_msg_id: None,
            user_id: "UPOSTER".to_string(),
            text: String::new(),
            attachment_texts: vec![text.to_string()],
        }
    }

    #[test]
    fn accepts_canonical_roll() {
        let roll = extract_roll(&message_with_attachment("<@U123> rolled *42*"))
            .expect("roll extracted");
        assert_eq!(roll.user_id, "U123");
        assert_eq!(roll.value, 42);
        assert_eq!(roll.channel_id, "C1");
        assert_eq!(roll.timestamp.timestamp_millis(), 1_700_000_000_123);
    }

    #[test_case("U123 rolled *20*"; "missing user tag")]
    #[test_case("<@U123> rolledd *100*"; "misspelled verb")]
    #[test_case("<@U123> rolled 67"; "undelimited value")]
    #[test_case("<@U123> rolled *twelve*"; "non numeric value")]
    #[test_case("<@U123> rolled *12* extra text"; "trailing text")]
    #[test_case("<@>U123 rolled *12*"; "empty tag")]
    #[test_case("<@U123> *12* rolled"; "swapped token order")]
    #[test_case("rolled *12* <@U123>"; "leading verb")]
    #[test_case(""; "empty attachment")]
    fn rejects_malformed_rolls(text: &str) {
        assert!(extract_roll(&message_with_attachment(text)).is_none());
    }

    #[test]
    fn ignores_messages_without_attachments() {
        let mut message = message_with_attachment("<@U123> rolled *42*");
        message.attachment_texts.clear();
        message.text = "<@U123> rolled *42*".to_string();
        assert!(extract_roll(&message).is_none());
    }

    #[test]
    fn only_the_first_attachment_counts() {
        let mut message = message_with_attachment("not a roll");
        message
            .attachment_texts
            .push("<@U123> rolled *42*".to_string());
        assert!(extract_roll(&message).is_none());
    }
}
