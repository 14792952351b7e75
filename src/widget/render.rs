//! HTML rendering for message blocks and the page shell.
//!
//! Every interpolated value goes through [`escape_html`]. Image sources are
//! additionally restricted by [`safe_image_src`].

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::message::{Message, MessageKind, Sender};

/// Id of the element that receives rendered message blocks.
pub const MESSAGES_CONTAINER_ID: &str = "messagesContainer";

/// Class of the placeholder shown until the first message arrives.
pub const WELCOME_CLASS: &str = "welcome-message";

/// Escape text for use in element content and quoted attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Return `url` if it may be used as an image `src`.
///
/// Same-origin absolute paths and `http(s)` URLs pass; protocol-relative
/// URLs, `javascript:`, `data:` and anything unparseable do not.
#[must_use]
pub fn safe_image_src(url: &str) -> Option<&str> {
    let url = url.trim();
    if url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\") {
        return Some(url);
    }
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(url),
        _ => None,
    }
}

/// Renders messages with times shown in a fixed UTC offset.
#[derive(Debug, Clone)]
pub struct Renderer {
    offset: FixedOffset,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::utc()
    }
}

impl Renderer {
    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Offsets outside +/- 24h fall back to UTC.
    #[must_use]
    pub fn with_offset_minutes(minutes: i32) -> Self {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map_or_else(Self::utc, |offset| Self { offset })
    }

    /// Two-digit hour and minute, e.g. `09:05`.
    #[must_use]
    pub fn format_time(&self, ts: &DateTime<Utc>) -> String {
        ts.with_timezone(&self.offset).format("%H:%M").to_string()
    }

    /// One `div.message` block.
    #[must_use]
    pub fn message_block(&self, msg: &Message) -> String {
        let body = match msg.kind {
            MessageKind::Image => image_body(&msg.content),
            MessageKind::Text => format!(
                r#"<div class="message-text">{}</div>"#,
                escape_html(&msg.content)
            ),
        };
        self.block(msg.sender, &msg.timestamp, &body)
    }

    /// A block for an image that has not gone through the message list.
    #[must_use]
    pub fn image_block(&self, sender: Sender, image_url: &str, ts: &DateTime<Utc>) -> String {
        let body = format!(r#"<div class="message-text">{}</div>"#, image_body(image_url));
        self.block(sender, ts, &body)
    }

    fn block(&self, sender: Sender, ts: &DateTime<Utc>, body: &str) -> String {
        let class = sender.as_str();
        format!(
            r#"<div class="message {class}">
    <div class="message-avatar {class}">{avatar}</div>
    <div class="message-content">
        <div class="message-header">
            <span class="message-username">{username}</span>
            <span class="message-time">{time}</span>
        </div>
        {body}
    </div>
</div>"#,
            avatar = sender.avatar(),
            username = escape_html(sender.display_name()),
            time = escape_html(&self.format_time(ts)),
        )
    }

    /// The full page: the fixed widget layout, pre-rendered with `messages`.
    #[must_use]
    pub fn page(&self, title: &str, messages: &[Message]) -> String {
        let contents = if messages.is_empty() {
            format!(
                r#"<div class="{WELCOME_CLASS}">
                <h2>Welcome!</h2>
                <p>Send a text or an image to start the conversation.</p>
            </div>"#
            )
        } else {
            messages
                .iter()
                .map(|m| self.message_block(m))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let title = escape_html(title);

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
</head>
<body>
    <div class="chat-container">
        <header class="chat-header"><h1>{title}</h1></header>
        <div class="messages" id="{MESSAGES_CONTAINER_ID}">
            {contents}
        </div>
        <div class="typing-indicator" id="typingIndicator" style="display: none;">
            <span></span><span></span><span></span>
        </div>
        <div class="input-area">
            <label class="upload-button" for="imageUpload">📷</label>
            <input type="file" id="imageUpload" accept="image/*" hidden>
            <textarea id="messageInput" rows="1" placeholder="Type your message..."></textarea>
            <button id="sendButton" type="button">Send</button>
        </div>
        <p class="hint">Press Enter to send, Shift+Enter for new line</p>
    </div>
</body>
</html>
"#
        )
    }
}

fn image_body(url: &str) -> String {
    match safe_image_src(url) {
        Some(src) => format!(
            r#"<img src="{}" alt="Uploaded Image" class="message-image">"#,
            escape_html(src)
        ),
        None => format!(
            r#"<div class="message-text">[image unavailable: {}]</div>"#,
            escape_html(url)
        ),
    }
}
