use serde::{Deserialize, Serialize};

/// Gmail's system label for unread messages.
pub const UNREAD: &str = "UNREAD";

/// A message as delivered by the transport, before the date is parsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEmail {
    pub message_id: String,
    pub thread_id: String,
    pub from: String,
    pub subject: String,
    /// Raw `Date` header, e.g. `Mon, 15 Mar 2023 10:30:45 +0000 (UTC)`.
    pub date_received: String,
    pub labels: Vec<String>,
    pub message: String,
}

/// A stored message. This is the only shape the rule engine evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub message_id: String,
    pub thread_id: String,
    pub from_address: String,
    pub subject: String,
    /// Seconds since the Unix epoch.
    pub received_at: i64,
    pub labels: Vec<String>,
    pub body: String,
}

impl EmailRecord {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn is_unread(&self) -> bool {
        self.has_label(UNREAD)
    }
}
