//! Append-only message log.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::message::Message;

/// Shared, append-only list of messages. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    inner: Arc<RwLock<Vec<Message>>>,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return the log length after the append.
    pub fn push(&self, message: Message) -> usize {
        let mut guard = self.write();
        guard.push(message);
        guard.len()
    }

    /// Copy of every message, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Message>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Message>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_across_clones() {
        let log = MessageLog::new();
        let other = log.clone();

        assert_eq!(log.push(Message::user_text("one")), 1);
        assert_eq!(other.push(Message::bot_text("two")), 2);

        let contents: Vec<_> = log.snapshot().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, ["one", "two"]);
    }
}
