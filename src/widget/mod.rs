//! The chat widget controller.
//!
//! [`ChatWidget`] loads and renders the conversation, submits text and image
//! messages, and reloads everything after each write. It never reconciles
//! locally: the backend is the only source of truth.
//!
//! # Example
//!
//! ```rust,no_run
//! use chat_widget::client::HttpBackend;
//! use chat_widget::widget::{ChatWidget, HeadlessView, UiEvent, WidgetSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = HttpBackend::new("http://localhost:5000")?;
//! let widget = ChatWidget::new(backend, HeadlessView::new(), WidgetSettings::default());
//! widget.attach().await;
//!
//! widget.view().type_text("Hello!");
//! widget.handle_event(UiEvent::SendClicked).await;
//! # Ok(())
//! # }
//! ```

mod busy;
pub mod render;
mod view;

pub use busy::BusyState;
pub use render::Renderer;
pub use view::{ChatView, HeadlessDocument, HeadlessView, SelectedFile};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::client::ChatBackend;
use crate::message::{Message, Sender};
use busy::BusyLatch;

/// Default cap on the auto-resized input height, in pixels.
pub const DEFAULT_MAX_INPUT_HEIGHT: u32 = 120;

/// Presentation settings.
#[derive(Debug, Clone)]
pub struct WidgetSettings {
    pub max_input_height: u32,
    pub renderer: Renderer,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            max_input_height: DEFAULT_MAX_INPUT_HEIGHT,
            renderer: Renderer::default(),
        }
    }
}

/// What an operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Nothing was sent.
    Skipped(SkipReason),
    /// The request failed; the error was logged.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyInput,
    NoFile,
    /// Another send or upload is in flight.
    Busy,
    Disposed,
}

/// Events the widget is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// The input's content changed.
    Input,
    /// A key was pressed in the input.
    KeyPress { key: String, shift: bool },
    SendClicked,
    /// The upload control's selection changed.
    FileChanged,
}

impl UiEvent {
    #[must_use]
    pub fn key(key: impl Into<String>, shift: bool) -> Self {
        Self::KeyPress {
            key: key.into(),
            shift,
        }
    }
}

/// Result of dispatching a [`UiEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatch {
    /// The event's default action must be suppressed (Enter inserting a newline).
    pub prevent_default: bool,
    /// Outcome of the operation the event triggered, if any.
    pub outcome: Option<Outcome>,
}

/// A chat widget bound to one view.
#[derive(Debug)]
pub struct ChatWidget<B, V> {
    backend: B,
    view: V,
    settings: WidgetSettings,
    messages: RwLock<Vec<Message>>,
    busy: BusyLatch,
    disposed: AtomicBool,
}

impl<B, V> ChatWidget<B, V>
where
    B: ChatBackend,
    V: ChatView,
{
    /// Create a widget. Nothing is loaded until [`attach`](Self::attach).
    pub fn new(backend: B, view: V, settings: WidgetSettings) -> Self {
        Self {
            backend,
            view,
            settings,
            messages: RwLock::new(Vec::new()),
            busy: BusyLatch::default(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Perform the initial load.
    pub async fn attach(&self) -> Outcome {
        self.load_messages().await
    }

    /// Detach from the view. Later events are ignored and in-flight
    /// requests no longer touch the view when they complete.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            debug!(name: "widget.disposed", "Chat widget disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn busy_state(&self) -> BusyState {
        self.busy.state()
    }

    /// Copy of the last loaded conversation.
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Route a bound event to its operation.
    pub async fn handle_event(&self, event: UiEvent) -> Dispatch {
        if self.is_disposed() {
            return Dispatch::default();
        }
        match event {
            UiEvent::Input => {
                self.auto_resize();
                Dispatch::default()
            }
            UiEvent::KeyPress { key, shift } if key == "Enter" && !shift => Dispatch {
                prevent_default: true,
                outcome: Some(self.send_message().await),
            },
            UiEvent::KeyPress { .. } => Dispatch::default(),
            UiEvent::SendClicked => Dispatch {
                prevent_default: false,
                outcome: Some(self.send_message().await),
            },
            UiEvent::FileChanged => Dispatch {
                prevent_default: false,
                outcome: Some(self.handle_image_upload().await),
            },
        }
    }

    /// Fetch the full list and re-render. On failure the previous rendering
    /// stays as it was.
    pub async fn load_messages(&self) -> Outcome {
        if self.is_disposed() {
            return Outcome::Skipped(SkipReason::Disposed);
        }
        match self.backend.list_messages().await {
            Ok(messages) => {
                if self.is_disposed() {
                    return Outcome::Skipped(SkipReason::Disposed);
                }
                debug!(count = messages.len(), "Loaded messages");
                *self
                    .messages
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = messages;
                self.render_messages();
                Outcome::Completed
            }
            Err(e) => {
                error!(error = %e, "Error loading messages");
                Outcome::Failed
            }
        }
    }

    /// Submit the trimmed input as a text message, then reload.
    pub async fn send_message(&self) -> Outcome {
        if self.is_disposed() {
            return Outcome::Skipped(SkipReason::Disposed);
        }
        let content = self.view.input_value().trim().to_string();
        if content.is_empty() {
            return Outcome::Skipped(SkipReason::EmptyInput);
        }
        let Some(_guard) = self.begin_busy(false) else {
            warn!("Send ignored while a request is in flight");
            return Outcome::Skipped(SkipReason::Busy);
        };

        match self.backend.post_message(&content).await {
            Ok(()) => {
                if !self.is_disposed() {
                    self.view.set_input_value("");
                    self.auto_resize();
                }
                let reload = self.load_messages().await;
                if reload != Outcome::Completed {
                    debug!(?reload, "Message posted but reload did not complete");
                }
                Outcome::Completed
            }
            Err(e) => {
                error!(error = %e, "Error sending message");
                Outcome::Failed
            }
        }
    }

    /// Upload the first selected file, then reload. The selection is cleared
    /// afterwards whatever the result, including when skipped as busy.
    pub async fn handle_image_upload(&self) -> Outcome {
        if self.is_disposed() {
            return Outcome::Skipped(SkipReason::Disposed);
        }
        let Some(file) = self.view.selected_file() else {
            return Outcome::Skipped(SkipReason::NoFile);
        };
        let Some(_guard) = self.begin_busy(true) else {
            warn!(file = %file.name, "Upload ignored while a request is in flight");
            if !self.is_disposed() {
                self.view.clear_file_selection();
            }
            return Outcome::Skipped(SkipReason::Busy);
        };

        match self.backend.upload_image(&file).await {
            Ok(()) => {
                let reload = self.load_messages().await;
                if reload != Outcome::Completed {
                    debug!(?reload, "Image uploaded but reload did not complete");
                }
                Outcome::Completed
            }
            Err(e) => {
                error!(error = %e, file = %file.name, "Error uploading image");
                Outcome::Failed
            }
        }
    }

    /// Replace the container contents with one block per loaded message.
    ///
    /// An empty list renders nothing, so the welcome placeholder survives.
    pub fn render_messages(&self) {
        if self.is_disposed() {
            return;
        }
        let blocks: Vec<String> = {
            let messages = self
                .messages
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if messages.is_empty() {
                return;
            }
            messages
                .iter()
                .map(|m| self.settings.renderer.message_block(m))
                .collect()
        };

        self.view.remove_placeholder();
        self.view.replace_messages(blocks);
        self.view.scroll_to_bottom();
    }

    /// Append one image block directly, bypassing the reload path.
    ///
    /// No upload flow calls this; the next reload replaces the block.
    pub fn append_image_message(&self, sender: Sender, image_url: &str) {
        if self.is_disposed() {
            return;
        }
        let block = self
            .settings
            .renderer
            .image_block(sender, image_url, &Utc::now());
        self.view.append_message(block);
        self.view.scroll_to_bottom();
    }

    /// Fit the input to its content, up to the configured maximum.
    pub fn auto_resize(&self) {
        self.view.reset_input_height();
        let height = self
            .view
            .input_scroll_height()
            .min(self.settings.max_input_height);
        self.view.set_input_height(height);
    }

    fn begin_busy(&self, clears_file: bool) -> Option<BusyGuard<'_, B, V>> {
        let token = self.busy.try_acquire()?;
        self.view.set_send_enabled(false);
        self.view.set_busy_visible(true);
        Some(BusyGuard {
            widget: self,
            clears_file,
            _token: token,
        })
    }
}

/// Restores the view when a send or upload ends, on every exit path.
struct BusyGuard<'a, B: ChatBackend, V: ChatView> {
    widget: &'a ChatWidget<B, V>,
    clears_file: bool,
    _token: busy::BusyToken<'a>,
}

impl<B: ChatBackend, V: ChatView> Drop for BusyGuard<'_, B, V> {
    fn drop(&mut self) {
        if self.widget.is_disposed() {
            return;
        }
        let view = &self.widget.view;
        view.set_send_enabled(true);
        view.focus_input();
        view.set_busy_visible(false);
        if self.clears_file {
            view.clear_file_selection();
        }
    }
}
