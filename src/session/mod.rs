//! Server-side conversation storage.
//!
//! The backend keeps one conversation in memory; every widget sees the same
//! list in insertion order.
//!
//! # Example
//!
//! ```rust
//! use chat_widget::message::Message;
//! use chat_widget::session::MessageLog;
//!
//! let log = MessageLog::new();
//! log.push(Message::user_text("Hello!"));
//!
//! let messages = log.snapshot();
//! assert_eq!(messages.len(), 1);
//! ```

mod log;

pub use log::MessageLog;
