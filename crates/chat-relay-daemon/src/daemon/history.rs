//! Paired conversation history.

use std::collections::HashMap;

use chat_relay_core::PairKey;

/// Append-only message history per unordered client pair.
///
/// Sequences are created lazily on the first append and live until the
/// process exits.
#[derive(Debug, Default)]
pub struct HistoryStore {
    conversations: HashMap<PairKey, Vec<String>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` to the sequence for `key`, creating it if absent.
    pub fn append(&mut self, key: PairKey, record: String) {
        self.conversations.entry(key).or_default().push(record);
    }

    /// Full ordered history for `key`.
    ///
    /// `None` when the pair never exchanged a message. A self pair is always
    /// `None`.
    pub fn get(&self, key: PairKey) -> Option<&[String]> {
        if key.is_self_pair() {
            return None;
        }
        self.conversations
            .get(&key)
            .filter(|records| !records.is_empty())
            .map(Vec::as_slice)
    }

    /// Number of pairs with at least one record.
    pub fn pair_count(&self) -> usize {
        self.conversations.len()
    }
}
