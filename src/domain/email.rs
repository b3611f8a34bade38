use std::fmt;

/// Provider-side message id (Gmail message id or IMAP UID in decimal).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for MessageId {
    fn from(uid: u32) -> Self {
        MessageId(uid.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct MessageSummary {
    pub id: MessageId,
    pub snippet: String,
}

#[derive(Debug, Clone)]
pub struct MessageBody {
    pub id: MessageId,
    pub body: String,
}
