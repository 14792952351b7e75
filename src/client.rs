//! HTTP backend the widget reads from and writes to.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::widget::SelectedFile;

/// The three calls a chat widget makes.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Fetch the whole conversation, in server order.
    async fn list_messages(&self) -> Result<Vec<Message>>;

    /// Record a new user text message. The response body is not inspected.
    async fn post_message(&self, content: &str) -> Result<()>;

    /// Upload an image as multipart field `file`. The response body is not
    /// inspected.
    async fn upload_image(&self, file: &SelectedFile) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    content: &'a str,
}

/// [`ChatBackend`] over `reqwest`.
///
/// # Example
///
/// ```rust,no_run
/// use chat_widget::client::{ChatBackend, HttpBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = HttpBackend::new("http://localhost:5000")?;
/// let messages = backend.list_messages().await?;
/// println!("{} messages", messages.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend rooted at `base_url` (e.g. `http://localhost:5000`).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a backend with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        // endpoint paths are joined relative to the base
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url, http })
    }

    /// Create a backend whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self::with_client(base_url, builder.build()?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(Error::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn list_messages(&self) -> Result<Vec<Message>> {
        let response = self.http.get(self.url("api/messages")?).send().await?;
        let response = Self::ensure_success(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_message(&self, content: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("api/messages")?)
            .json(&PostMessageRequest { content })
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn upload_image(&self, file: &SelectedFile) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type())?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("api/upload")?)
            .multipart(form)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
