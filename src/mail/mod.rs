//! Mailbox access and verification-code retrieval.

pub mod code;
pub mod decoders;
pub mod gmail;
pub mod imap_client;
pub mod poller;

use anyhow::Result;

use crate::domain::email::{MessageBody, MessageId, MessageSummary};

/// Read side of a mailbox the caller has already been authorized for.
pub trait MailService {
    /// Unread messages addressed to `recipient`, newest first.
    fn list_unread(&self, recipient: &str) -> Result<Vec<MessageSummary>>;
    fn get_message(&self, id: &MessageId) -> Result<MessageBody>;
    /// Mark a message as read. Calling it twice for the same id is harmless.
    fn mark_consumed(&self, id: &MessageId) -> Result<()>;
}

/// Access token for a mailbox, scoped to one run.
#[derive(Clone)]
pub struct MailCredential {
    pub user: String,
    pub access_token: String,
}

impl std::fmt::Debug for MailCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailCredential")
            .field("user", &self.user)
            .field("access_token", &"<redacted>")
            .finish()
    }
}
