use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// A mailbox message as persisted in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    pub snippet: String,
    /// `None` when the provider timestamp was missing or out of range.
    pub received_at: Option<DateTime<Utc>>,
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A message as returned by the remote mailbox, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub id: String,
    pub thread_id: Option<String>,
    pub headers: Vec<Header>,
    pub snippet: Option<String>,
    /// Epoch milliseconds.
    pub internal_date: Option<i64>,
    pub label_ids: Vec<String>,
}

impl RemoteMessage {
    /// Case-insensitive header lookup. Repeated headers resolve to the last one.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}
