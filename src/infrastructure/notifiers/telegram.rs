//! Telegram Bot API delivery

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::domain::notify::Notifier;
use crate::shared::errors::{AppError, NotifyError};
use crate::shared::utils::truncate_for_log;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Sends HTML messages through `sendMessage`
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpClientError(e.to_string()))?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token: bot_token.into(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    /// Errors from reqwest embed the URL, which carries the bot token
    fn redact(&self, text: &str) -> String {
        if self.bot_token.is_empty() {
            return text.to_string();
        }
        text.replace(&self.bot_token, "<redacted>")
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        let request = SendMessageRequest {
            chat_id: destination,
            text: message,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(self.redact(&e.to_string())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotifyError::Delivery(self.redact(&e.to_string())))?;

        check_response(status, &body)?;
        info!("Message sent successfully to channel {}", destination);
        Ok(())
    }
}

fn check_response(status: reqwest::StatusCode, body: &str) -> Result<(), NotifyError> {
    let parsed: Option<ApiResponse> = serde_json::from_str(body).ok();
    match parsed {
        Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
        Some(ApiResponse { description: Some(description), .. }) => {
            Err(NotifyError::Delivery(format!("telegram {}: {}", status, description)))
        }
        _ => Err(NotifyError::Delivery(format!(
            "telegram {}: {}",
            status,
            truncate_for_log(body, 200)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_request_body_shape() {
        let request = SendMessageRequest {
            chat_id: "-1001234",
            text: "<b>HYPIO</b> Update",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["chat_id"], "-1001234");
        assert_eq!(body["parse_mode"], "HTML");
    }

    #[test]
    fn test_check_response() {
        assert!(check_response(StatusCode::OK, r#"{"ok":true,"result":{}}"#).is_ok());

        let err = check_response(
            StatusCode::BAD_REQUEST,
            r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("chat not found"));

        assert!(check_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").is_err());
    }

    #[test]
    fn test_token_is_redacted() {
        let notifier = TelegramNotifier::new("123:secret", Duration::from_secs(1))
            .unwrap()
            .with_api_base("https://example.invalid/");
        assert_eq!(notifier.endpoint(), "https://example.invalid/bot123:secret/sendMessage");
        assert_eq!(
            notifier.redact("error sending request for url (https://example.invalid/bot123:secret/sendMessage)"),
            "error sending request for url (https://example.invalid/bot<redacted>/sendMessage)"
        );
    }
}
