// crates/server-jobs/src/messages.rs
//! Ordered, deduplicated, append-only message log.
//!
//! Several users may watch the same export, and the worker tends to report
//! the same warning once per document. [`MessageLog`] keeps the first
//! occurrence of every message and drops later repeats.

use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Entries {
    order: Vec<String>,
    seen: HashSet<String>,
}

/// Thread-safe message log shared between the export worker and observers.
///
/// Membership check and append happen under one write guard, so two threads
/// racing on the same text leave exactly one entry behind.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: RwLock<Entries>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` unless an equal message is already present.
    /// Returns `true` if the message was appended.
    pub fn push(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        match self.entries.write() {
            Ok(mut entries) => {
                if entries.seen.contains(&message) {
                    return false;
                }
                entries.seen.insert(message.clone());
                entries.order.push(message);
                true
            }
            Err(e) => {
                tracing::error!("RwLock poisoned appending export message: {e}");
                false
            }
        }
    }

    /// Copy of all messages in insertion order.
    pub fn snapshot(&self) -> Vec<String> {
        match self.entries.read() {
            Ok(entries) => entries.order.clone(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading export messages: {e}");
                Vec::new()
            }
        }
    }

    /// Messages appended at or after `cursor`, plus the cursor to pass next time.
    ///
    /// A cursor past the end yields no messages and is clamped to the length.
    pub fn since(&self, cursor: usize) -> (Vec<String>, usize) {
        match self.entries.read() {
            Ok(entries) => {
                let len = entries.order.len();
                let start = cursor.min(len);
                (entries.order[start..].to_vec(), len)
            }
            Err(e) => {
                tracing::error!("RwLock poisoned reading export messages: {e}");
                (Vec::new(), cursor)
            }
        }
    }

    pub fn contains(&self, message: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.seen.contains(message))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.order.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Into<String>> FromIterator<S> for MessageLog {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let log = Self::new();
        for message in iter {
            log.push(message);
        }
        log
    }
}
