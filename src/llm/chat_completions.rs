//! `OpenAI` Chat Completions responder.
//!
//! Sends the conversation to `/v1/chat/completions` without streaming and
//! returns the first choice's text. For the vision model the most recent
//! uploaded image is attached as a base64 data URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::message::Message;

use super::{LlmSettings, ModelChoice, Responder, conversation, latest_image};

/// Path prefix under which uploads are served.
const UPLOADS_PREFIX: &str = "/uploads/";

/// Responder backed by a Chat Completions endpoint.
#[derive(Clone)]
pub struct ChatCompletionsResponder {
    http: reqwest::Client,
    settings: LlmSettings,
    uploads_dir: PathBuf,
}

impl std::fmt::Debug for ChatCompletionsResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsResponder")
            .field("base_url", &self.settings.base_url)
            .field("text_model", &self.settings.text_model)
            .field("vision_model", &self.settings.vision_model)
            .field("uploads_dir", &self.uploads_dir)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsResponder {
    /// `uploads_dir` is where `/uploads/<name>` images are read from.
    #[must_use]
    pub fn new(settings: LlmSettings, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            uploads_dir: uploads_dir.into(),
        }
    }

    fn model(&self, choice: ModelChoice) -> &str {
        match choice {
            ModelChoice::Text => &self.settings.text_model,
            ModelChoice::Vision => &self.settings.vision_model,
        }
    }

    /// Turn an image message's content into something the model can fetch.
    async fn image_url(&self, content: &str) -> Result<String> {
        let Some(path) = resolve_upload(&self.uploads_dir, content) else {
            return Ok(content.to_string());
        };
        let bytes = tokio::fs::read(&path).await?;
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(format!("data:{};base64,{encoded}", mime.essence_str()))
    }

    async fn request_body(&self, history: &[Message], choice: ModelChoice) -> Result<Value> {
        let turns = conversation(history, self.settings.system_prompt.as_deref());
        let mut messages = serde_json::to_value(turns)?;

        if choice == ModelChoice::Vision {
            if let Some(image) = latest_image(history) {
                let url = self.image_url(image).await?;
                if let Value::Array(items) = &mut messages {
                    items.push(json!({
                        "role": "user",
                        "content": [
                            { "type": "image_url", "image_url": { "url": url } }
                        ]
                    }));
                }
            }
        }

        Ok(json!({
            "model": self.model(choice),
            "stream": false,
            "messages": messages,
        }))
    }
}

#[async_trait]
impl Responder for ChatCompletionsResponder {
    async fn reply(&self, history: &[Message], model: ModelChoice) -> Result<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let body = self.request_body(history, model).await?;

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }

        let v: Value = resp.json().await?;
        extract_reply(&v)
    }
}

/// Text of the first choice.
fn extract_reply(v: &Value) -> Result<String> {
    v["choices"][0]["message"]["content"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| Error::Llm("response has no choices[0].message.content".to_string()))
}

/// Map `/uploads/<name>` onto a file in `uploads_dir`. Anything that is not
/// a plain file name under the prefix is left alone.
fn resolve_upload(uploads_dir: &Path, content: &str) -> Option<PathBuf> {
    let name = content.strip_prefix(UPLOADS_PREFIX)?;
    let plain = !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != ".."
        && name != ".";
    plain.then(|| uploads_dir.join(name))
}
