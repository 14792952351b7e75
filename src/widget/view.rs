//! The view surface a [`ChatWidget`](super::ChatWidget) drives.
//!
//! [`ChatView`] mirrors the fixed widget layout: the `messageInput` textarea,
//! the `sendButton`, the `messagesContainer` with its welcome placeholder, the
//! `typingIndicator` and the `imageUpload` file input. Methods take `&self`
//! so one view can be shared by concurrently running widget operations.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A file picked in the image upload control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// File name as reported by the picker.
    pub name: String,
    /// MIME type, if the picker knew it.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        let content_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string());
        Ok(Self {
            name,
            content_type,
            bytes,
        })
    }

    /// The declared MIME type, or one guessed from the file name.
    #[must_use]
    pub fn mime_type(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        })
    }
}

/// Operations the widget performs on its layout.
pub trait ChatView: Send + Sync {
    /// Current raw value of the text input.
    fn input_value(&self) -> String;
    fn set_input_value(&self, value: &str);
    fn focus_input(&self);

    /// Let the input shrink back to its natural height (`height: auto`).
    fn reset_input_height(&self);
    /// Height the input needs to show its content without scrolling.
    fn input_scroll_height(&self) -> u32;
    fn set_input_height(&self, px: u32);

    fn set_send_enabled(&self, enabled: bool);
    fn set_busy_visible(&self, visible: bool);

    /// First file in the upload control, if any.
    fn selected_file(&self) -> Option<SelectedFile>;
    fn clear_file_selection(&self);

    /// Remove the welcome placeholder. Returns whether it was still present.
    fn remove_placeholder(&self) -> bool;
    /// Replace the message container contents with `blocks`, in order.
    fn replace_messages(&self, blocks: Vec<String>);
    /// Append one block after the existing contents.
    fn append_message(&self, block: String);
    fn scroll_to_bottom(&self);
}

/// State of a [`HeadlessView`] at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessDocument {
    pub input: String,
    /// `None` while the input is at `height: auto`.
    pub input_height: Option<u32>,
    pub input_focused: bool,
    pub send_enabled: bool,
    pub busy_visible: bool,
    pub selected_file: Option<SelectedFile>,
    pub placeholder_visible: bool,
    /// Rendered blocks currently in the message container.
    pub blocks: Vec<String>,
    /// Number of times the container was scrolled to the newest entry.
    pub scroll_count: usize,
}

impl Default for HeadlessDocument {
    fn default() -> Self {
        Self {
            input: String::new(),
            input_height: None,
            input_focused: false,
            send_enabled: true,
            busy_visible: false,
            selected_file: None,
            placeholder_visible: true,
            blocks: Vec::new(),
            scroll_count: 0,
        }
    }
}

/// An in-memory view: no browser, same layout semantics.
///
/// Input height is modelled from the line count so auto-resize is observable.
#[derive(Debug)]
pub struct HeadlessView {
    doc: Mutex<HeadlessDocument>,
    line_height: u32,
    padding: u32,
}

impl Default for HeadlessView {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessView {
    #[must_use]
    pub fn new() -> Self {
        Self {
            doc: Mutex::new(HeadlessDocument::default()),
            line_height: 20,
            padding: 24,
        }
    }

    /// Copy of the current document state.
    #[must_use]
    pub fn snapshot(&self) -> HeadlessDocument {
        self.doc().clone()
    }

    /// Simulate the user typing into the input (replaces its value).
    pub fn type_text(&self, text: &str) {
        self.doc().input = text.to_string();
    }

    /// Simulate the user picking a file.
    pub fn select_file(&self, file: SelectedFile) {
        self.doc().selected_file = Some(file);
    }

    fn doc(&self) -> MutexGuard<'_, HeadlessDocument> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChatView for HeadlessView {
    fn input_value(&self) -> String {
        self.doc().input.clone()
    }

    fn set_input_value(&self, value: &str) {
        self.doc().input = value.to_string();
    }

    fn focus_input(&self) {
        self.doc().input_focused = true;
    }

    fn reset_input_height(&self) {
        self.doc().input_height = None;
    }

    fn input_scroll_height(&self) -> u32 {
        let lines = self.doc().input.split('\n').count();
        let lines = u32::try_from(lines).unwrap_or(u32::MAX);
        self.padding
            .saturating_add(self.line_height.saturating_mul(lines))
    }

    fn set_input_height(&self, px: u32) {
        self.doc().input_height = Some(px);
    }

    fn set_send_enabled(&self, enabled: bool) {
        self.doc().send_enabled = enabled;
    }

    fn set_busy_visible(&self, visible: bool) {
        self.doc().busy_visible = visible;
    }

    fn selected_file(&self) -> Option<SelectedFile> {
        self.doc().selected_file.clone()
    }

    fn clear_file_selection(&self) {
        self.doc().selected_file = None;
    }

    fn remove_placeholder(&self) -> bool {
        std::mem::replace(&mut self.doc().placeholder_visible, false)
    }

    fn replace_messages(&self, blocks: Vec<String>) {
        let mut doc = self.doc();
        // the placeholder lives inside the container
        doc.placeholder_visible = false;
        doc.blocks = blocks;
    }

    fn append_message(&self, block: String) {
        self.doc().blocks.push(block);
    }

    fn scroll_to_bottom(&self) {
        self.doc().scroll_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_height_grows_with_lines() {
        let view = HeadlessView::new();
        view.type_text("one");
        assert_eq!(view.input_scroll_height(), 44);
        view.type_text("one\ntwo\nthree");
        assert_eq!(view.input_scroll_height(), 84);
    }

    #[test]
    fn placeholder_removed_once() {
        let view = HeadlessView::new();
        assert!(view.remove_placeholder());
        assert!(!view.remove_placeholder());
    }

    #[test]
    fn mime_type_falls_back_to_extension() {
        let file = SelectedFile::new("photo.png", vec![1, 2, 3]);
        assert_eq!(file.mime_type(), "image/png");

        let file = SelectedFile {
            content_type: Some("image/webp".into()),
            ..SelectedFile::new("blob", Vec::new())
        };
        assert_eq!(file.mime_type(), "image/webp");
    }
}
