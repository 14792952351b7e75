//! Chat widget
//!
//! A chat widget controller that renders a conversation, submits text and
//! image messages to a backend, and reloads the whole conversation after
//! every write, together with the backend it talks to.
//!
//! # Architecture
//!
//! - **Widget**: a platform-neutral controller driving a [`widget::ChatView`]
//! - **Client**: the [`client::ChatBackend`] seam and its `reqwest` implementation
//! - **Server**: Axum backend with an in-memory conversation and upload storage
//! - **LLM**: bot replies from an `OpenAI`-compatible Chat Completions endpoint
//!
//! # Modules
//!
//! - [`message`]: The message record
//! - [`widget`]: Controller, view seam and HTML rendering
//! - [`client`]: HTTP backend for the widget
//! - [`server`]: Backend routes and handlers
//! - [`session`]: Server-side message log
//! - [`llm`]: Bot responders

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod message;
pub mod server;
pub mod session;
pub mod widget;

pub use error::{Error, Result};

use std::path::PathBuf;
use std::sync::Arc;

use llm::Responder;
use session::MessageLog;
use widget::Renderer;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The conversation, oldest first.
    pub log: MessageLog,
    /// Produces bot replies.
    pub responder: Arc<dyn Responder>,
    /// Where uploads are stored and served from.
    pub uploads_dir: Arc<PathBuf>,
    /// Renders the page served at `/`.
    pub renderer: Renderer,
    /// Page title.
    pub title: Arc<str>,
}

impl AppState {
    /// State with an empty conversation.
    pub fn new(responder: Arc<dyn Responder>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            log: MessageLog::new(),
            responder,
            uploads_dir: Arc::new(uploads_dir.into()),
            renderer: Renderer::default(),
            title: Arc::from("Chat"),
        }
    }
}
