use crate::error::{LlmError, Result};
use crate::types::ChatMessage;
use serde::Deserialize;

const CHAT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Seam over the model backend so the orchestrator can be driven by a stub in
/// tests.
#[async_trait::async_trait]
pub trait ModelBackend: Send + Sync {
    /// One completion call: ordered messages in, reply text out.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl ModelBackend for LlmClient {
    #[tracing::instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let req = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let response = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Backend(format!(
                "chat completions status={status} body={body}"
            )));
        }

        let reply = extract_reply(&body)?;
        tracing::debug!(reply_len = reply.len(), "model reply received");
        Ok(reply)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pulls the reply text out of the nested success payload. An absent or empty
/// payload is the same backend failure as a bad status.
fn extract_reply(body: &str) -> Result<String> {
    let parsed: ChatCompletionsResponse = serde_json::from_str(body)?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    content.ok_or_else(|| LlmError::Backend("chat completions payload had no reply content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_reply_from_nested_payload() {
        let body = r#"{
            "id": "gen-1",
            "choices": [
                {"message": {"role": "assistant", "content": "  Bonjour !  "}}
            ]
        }"#;
        assert_eq!(extract_reply(body).expect("reply"), "Bonjour !");
    }

    #[test]
    fn absent_choices_is_a_backend_failure() {
        let err = extract_reply(r#"{"id": "gen-2", "choices": []}"#).unwrap_err();
        assert!(err.to_string().contains("no reply content"));
    }

    #[test]
    fn null_content_is_a_backend_failure() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        assert!(extract_reply(body).is_err());
    }

    #[test]
    fn malformed_payload_is_a_backend_failure() {
        assert!(extract_reply("not json").is_err());
    }
}
