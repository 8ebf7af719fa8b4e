use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::{Notifier, SenderError};
use crate::models::LivenessStatus;
use crate::notifications::format::{
    PHRASES_POWER_APPEARED_BASE, PHRASES_POWER_APPEARED_VARIATIONS, PHRASES_POWER_GONE_BASE,
    PHRASES_POWER_GONE_VARIATIONS, format_duration_short, random_phrase,
};
use crate::notifications::models::ContentChange;
use crate::schedule::region_time::region_clock;
use crate::schedule::render::fallback_caption;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const TEXT_FALLBACK: &str = "Не вдалося завантажити розклад";

/// Positive chat ids are private chats; schedule updates go to groups and
/// channels only.
fn is_private_chat(chat_id: &str) -> bool {
    chat_id.parse::<i64>().is_ok_and(|id| id > 0)
}

/// Delivers notifications through the Telegram Bot API. Subject ids are chat ids.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Serialize)]
struct TelegramPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
}

/// Markdown text announcing a liveness change, stamped with region time.
pub fn liveness_message(status: LivenessStatus, dwell_millis: i64, clock: &str) -> String {
    let duration = format_duration_short(dwell_millis);
    match status {
        LivenessStatus::Online => {
            let phrase = random_phrase(PHRASES_POWER_APPEARED_BASE, PHRASES_POWER_APPEARED_VARIATIONS);
            format!("*🟢 {clock} Світло з'явилося*\n🕓 {phrase} {duration}")
        }
        _ => {
            let phrase = random_phrase(PHRASES_POWER_GONE_BASE, PHRASES_POWER_GONE_VARIATIONS);
            format!("*🔴 {clock} Світло зникло*\n🕓 {phrase} {duration}")
        }
    }
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_api_base(bot_token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            bot_token: bot_token.into(),
        }
    }

    async fn call<T: Serialize + ?Sized>(&self, method: &str, payload: &T) -> Result<(), SenderError> {
        if self.bot_token.is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Telegram bot token is empty.".to_string(),
            ));
        }
        let api_url = format!("{}/bot{}/{method}", self.api_base, self.bot_token);
        let response = self.client.post(&api_url).json(payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status: {status}. Body: {error_body}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn on_liveness_transition(
        &self,
        subject_id: &str,
        status: LivenessStatus,
        dwell_millis: i64,
    ) -> Result<(), SenderError> {
        let text = liveness_message(status, dwell_millis, &region_clock(Utc::now()));
        let payload = TelegramMessage {
            chat_id: subject_id,
            text: &text,
            parse_mode: Some("Markdown"),
        };
        self.call("sendMessage", &payload).await?;
        info!(subject_id = %subject_id, status = %status, "Status notification sent.");
        Ok(())
    }

    async fn on_content_change(
        &self,
        subject_id: &str,
        change: &ContentChange,
    ) -> Result<(), SenderError> {
        if is_private_chat(subject_id) {
            debug!(subject_id = %subject_id, "Skipping schedule update for private chat.");
            return Ok(());
        }
        let has_text = !change.rendered_text.is_empty();

        if change.format_preference.wants_image() {
            let caption = if has_text {
                change.rendered_text.clone()
            } else {
                fallback_caption(change.group.as_deref())
            };
            let payload = TelegramPhoto {
                chat_id: subject_id,
                photo: &change.payload_ref,
                caption: &caption,
            };
            self.call("sendPhoto", &payload).await?;
        }

        if change.format_preference.wants_text() {
            let text = if has_text {
                change.rendered_text.as_str()
            } else {
                TEXT_FALLBACK
            };
            let payload = TelegramMessage {
                chat_id: subject_id,
                text,
                parse_mode: None,
            };
            self.call("sendMessage", &payload).await?;
        }

        info!(subject_id = %subject_id, format = ?change.format_preference, "Schedule update sent.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormatPreference;
    use mockito::Matcher;
    use serde_json::json;

    fn change(format: FormatPreference, text: &str) -> ContentChange {
        ContentChange {
            payload_ref: "https://img/gpv-3-1-emergency.png?cb=1".to_string(),
            rendered_text: text.to_string(),
            format_preference: format,
            group: Some("3.1".to_string()),
        }
    }

    #[test]
    fn test_liveness_message_shape() {
        let online = liveness_message(LivenessStatus::Online, 3 * 3_600_000 + 60_000, "07:15");
        assert!(online.starts_with("*🟢 07:15 Світло з'явилося*\n🕓 "));
        assert!(online.ends_with(" 3год 1хв"));

        let offline = liveness_message(LivenessStatus::Offline, 30_000, "23:00");
        assert!(offline.starts_with("*🔴 23:00 Світло зникло*\n🕓 "));
        assert!(offline.ends_with(" 30с"));
    }

    #[tokio::test]
    async fn test_liveness_sends_markdown_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": "-1001",
                "parse_mode": "Markdown"
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::with_api_base("TOKEN", server.url());
        notifier
            .on_liveness_transition("-1001", LivenessStatus::Offline, 60_000)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_content_both_sends_photo_and_text() {
        let mut server = mockito::Server::new_async().await;
        let photo = server
            .mock("POST", "/botTOKEN/sendPhoto")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": "-1001",
                "photo": "https://img/gpv-3-1-emergency.png?cb=1",
                "caption": "💡Оновлено графік для черги 3.1"
            })))
            .with_status(200)
            .create_async()
            .await;
        let text = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": "-1001",
                "text": "Не вдалося завантажити розклад"
            })))
            .with_status(200)
            .create_async()
            .await;

        let notifier = TelegramNotifier::with_api_base("TOKEN", server.url());
        notifier
            .on_content_change("-1001", &change(FormatPreference::Both, ""))
            .await
            .unwrap();
        photo.assert_async().await;
        text.assert_async().await;
    }

    #[tokio::test]
    async fn test_text_only_skips_photo() {
        let mut server = mockito::Server::new_async().await;
        let photo = server
            .mock("POST", "/botTOKEN/sendPhoto")
            .expect(0)
            .create_async()
            .await;
        let text = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::PartialJson(json!({ "text": "schedule" })))
            .with_status(200)
            .create_async()
            .await;

        let notifier = TelegramNotifier::with_api_base("TOKEN", server.url());
        notifier
            .on_content_change("-1001", &change(FormatPreference::Text, "schedule"))
            .await
            .unwrap();
        photo.assert_async().await;
        text.assert_async().await;
    }

    #[tokio::test]
    async fn test_private_chat_gets_no_schedule_update() {
        let mut server = mockito::Server::new_async().await;
        let photo = server
            .mock("POST", "/botTOKEN/sendPhoto")
            .expect(0)
            .create_async()
            .await;
        let text = server
            .mock("POST", "/botTOKEN/sendMessage")
            .expect(0)
            .create_async()
            .await;

        let notifier = TelegramNotifier::with_api_base("TOKEN", server.url());
        notifier
            .on_content_change("12345", &change(FormatPreference::Both, "schedule"))
            .await
            .unwrap();
        photo.assert_async().await;
        text.assert_async().await;
    }

    #[test]
    fn test_private_chat_detection() {
        assert!(is_private_chat("12345"));
        assert!(!is_private_chat("-1001"));
        assert!(!is_private_chat("@channel"));
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(403)
            .with_body("Forbidden: bot was kicked")
            .create_async()
            .await;

        let notifier = TelegramNotifier::with_api_base("TOKEN", server.url());
        let result = notifier
            .on_liveness_transition("-1001", LivenessStatus::Online, 0)
            .await;
        assert!(matches!(result, Err(SenderError::SendFailed(body)) if body.contains("bot was kicked")));
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected() {
        let notifier = TelegramNotifier::new("");
        let result = notifier
            .on_liveness_transition("-1001", LivenessStatus::Online, 0)
            .await;
        assert!(matches!(result, Err(SenderError::InvalidConfiguration(_))));
    }
}
