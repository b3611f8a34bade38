use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use crate::domain::account::AccountIdentifier;
use crate::domain::email::{MessageBody, MessageId, MessageSummary};
use crate::error::WorkflowError;
use crate::mail::decoders::body_text;
use crate::mail::{MailCredential, MailService};

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    id: String,
    #[serde(default)]
    snippet: String,
    /// base64url RFC 822, present with `format=raw`
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    email_address: String,
}

/// Gmail REST API mailbox.
pub struct GmailMailbox {
    http: Client,
    base: String,
    credential: MailCredential,
}

impl GmailMailbox {
    pub fn new(credential: MailCredential) -> Self {
        Self::with_base(credential, API_BASE)
    }

    pub fn with_base(credential: MailCredential, base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base: base.into(),
            credential,
        }
    }

    /// Refuse to poll a mailbox that belongs to someone else: the code would
    /// never arrive there.
    pub fn ensure_owner(&self, account: &AccountIdentifier) -> Result<(), WorkflowError> {
        let profile: Profile = self.get("profile", &[]).map_err(WorkflowError::mail)?;
        if account.matches(&profile.email_address) {
            Ok(())
        } else {
            Err(WorkflowError::MailService(format!(
                "authorized mailbox ({}) does not match target account ({account})",
                profile.email_address
            )))
        }
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.base, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.credential.access_token)
            .query(query)
            .send()?
            .error_for_status()?;
        Ok(resp.json()?)
    }
}

fn unread_query(recipient: &str) -> String {
    format!("to:{recipient} is:unread")
}

fn decode_raw(raw: &str) -> Result<Vec<u8>> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .map_err(|e| anyhow!("bad base64url message payload: {e}"))
}

impl MailService for GmailMailbox {
    fn list_unread(&self, recipient: &str) -> Result<Vec<MessageSummary>> {
        let q = unread_query(recipient);
        let list: ListResponse = self.get("messages", &[("q", q.as_str())])?;
        debug!("gmail query `{q}` matched {} message(s)", list.messages.len());

        list.messages
            .into_iter()
            .map(|m| -> Result<MessageSummary> {
                let msg: MessageResource =
                    self.get(&format!("messages/{}", m.id), &[("format", "minimal")])?;
                Ok(MessageSummary {
                    id: MessageId(msg.id),
                    snippet: msg.snippet,
                })
            })
            .collect()
    }

    fn get_message(&self, id: &MessageId) -> Result<MessageBody> {
        let msg: MessageResource = self.get(&format!("messages/{id}"), &[("format", "raw")])?;
        let body = match msg.raw.as_deref() {
            Some(raw) => body_text(&decode_raw(raw)?),
            None => msg.snippet,
        };
        Ok(MessageBody {
            id: MessageId(msg.id),
            body,
        })
    }

    fn mark_consumed(&self, id: &MessageId) -> Result<()> {
        let url = format!("{}/messages/{id}/modify", self.base);
        self.http
            .post(&url)
            .bearer_auth(&self.credential.access_token)
            .json(&json!({ "removeLabelIds": ["UNREAD"] }))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}
