use crate::error::{Result, TransportError};
use crate::types::{EditMessageText, InlineQueryResultArticle, SendMessage, Update, User};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TELEGRAM_ALLOWED_UPDATES: [&str; 3] = ["message", "callback_query", "inline_query"];

/// Outbound operations handlers rely on. Implemented by [`TelegramApi`] and by
/// fakes in tests.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Returns the id of the sent message.
    async fn send_message(&self, request: &SendMessage) -> Result<i64>;

    async fn edit_message_text(&self, request: &EditMessageText) -> Result<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;

    async fn answer_callback_query(&self, callback_query_id: &str, text: Option<&str>)
    -> Result<()>;

    async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: &[InlineQueryResultArticle],
    ) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramApi {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramApi {
    /// `base_url` is `https://api.telegram.org` or a local Bot API server.
    pub fn with_base_url(bot_token: &str, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", base_url.trim_end_matches('/'), bot_token),
        })
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": TELEGRAM_ALLOWED_UPDATES,
        });
        self.call("getUpdates", &body).await
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.base_url);
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        decode_response(method, status, &text)
    }
}

#[async_trait]
impl BotApi for TelegramApi {
    #[tracing::instrument(level = "debug", skip_all, fields(chat_id = request.chat_id))]
    async fn send_message(&self, request: &SendMessage) -> Result<i64> {
        let sent: SentMessage = self.call("sendMessage", request).await?;
        Ok(sent.message_id)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(chat_id = request.chat_id, message_id = request.message_id))]
    async fn edit_message_text(&self, request: &EditMessageText) -> Result<()> {
        let _: serde_json::Value = self.call("editMessageText", request).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let body = serde_json::json!({ "chat_id": chat_id, "message_id": message_id });
        let _: bool = self.call("deleteMessage", &body).await?;
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<()> {
        let mut body = serde_json::json!({ "callback_query_id": callback_query_id });
        if let Some(text) = text {
            body["text"] = serde_json::json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: &[InlineQueryResultArticle],
    ) -> Result<()> {
        let body = serde_json::json!({
            "inline_query_id": inline_query_id,
            "results": results,
            "cache_time": 60,
        });
        let _: bool = self.call("answerInlineQuery", &body).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

fn decode_response<T: DeserializeOwned>(method: &str, status: StatusCode, body: &str) -> Result<T> {
    let parsed: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(error) => {
            if is_transient_status(status) || status.is_success() {
                return Err(TransportError::Transient(format!(
                    "{method}: status={status} unparseable body: {error}"
                )));
            }
            return Err(TransportError::Permanent {
                code: i64::from(status.as_u16()),
                description: body.to_string(),
            });
        }
    };

    if parsed.ok {
        return parsed.result.ok_or_else(|| {
            TransportError::Transient(format!("{method}: ok response without result"))
        });
    }

    let code = parsed
        .error_code
        .unwrap_or_else(|| i64::from(status.as_u16()));
    let description = parsed.description.unwrap_or_default();
    if code == 429 {
        let retry_after = parsed
            .parameters
            .and_then(|p| p.retry_after)
            .unwrap_or(1);
        return Err(TransportError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }
    if code == 408 || code >= 500 {
        return Err(TransportError::Transient(format!(
            "{method}: {code} {description}"
        )));
    }
    tracing::warn!(method, code, %description, "telegram rejected request");
    Err(TransportError::Permanent { code, description })
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}
