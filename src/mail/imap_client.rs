use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use log::debug;
use native_tls::{TlsConnector, TlsStream};
use std::net::TcpStream;

use crate::domain::email::{MessageBody, MessageId, MessageSummary};
use crate::mail::decoders::{body_text, normalize_snippet};
use crate::mail::{MailCredential, MailService};

type ImapSession = imap::Session<TlsStream<TcpStream>>;

/// Build canonical XOAUTH2 auth string as bytes.
fn build_xoauth2_bytes(user: &str, access_token: &str) -> Vec<u8> {
    format!("user={user}\x01auth=Bearer {access_token}\x01\x01").into_bytes()
}

struct OAuth2Authenticator {
    response: Vec<u8>,
}

impl imap::Authenticator for OAuth2Authenticator {
    type Response = Vec<u8>;
    fn process(&self, _challenge: &[u8]) -> Self::Response {
        self.response.clone()
    }
}

/// IMAP mailbox over TLS with XOAUTH2. Opens a fresh session per call,
/// which keeps each poll attempt independent of the previous one.
pub struct ImapMailbox {
    server: String,
    credential: MailCredential,
}

impl ImapMailbox {
    pub fn new(server: impl Into<String>, credential: MailCredential) -> Self {
        Self {
            server: server.into(),
            credential,
        }
    }

    fn connect_and_auth(&self) -> Result<ImapSession> {
        let tls = TlsConnector::builder().build()?;
        let mut client = imap::connect((self.server.as_str(), 993), self.server.as_str(), &tls)?;

        let raw_payload = build_xoauth2_bytes(&self.credential.user, &self.credential.access_token);

        // some servers want the payload raw, others pre-encoded
        let auth_raw = OAuth2Authenticator {
            response: raw_payload.clone(),
        };
        match client.authenticate("XOAUTH2", &auth_raw) {
            Ok(session) => return Ok(session),
            Err((e, returned_client)) => {
                debug!("raw XOAUTH2 rejected by {}: {e}", self.server);
                client = returned_client;
            }
        }

        let auth_b64 = OAuth2Authenticator {
            response: general_purpose::STANDARD.encode(&raw_payload).into_bytes(),
        };
        match client.authenticate("XOAUTH2", &auth_b64) {
            Ok(session) => Ok(session),
            Err((e, _)) => Err(anyhow!("XOAUTH2 failed (raw+base64): {e}")),
        }
    }

    fn fetch_raw(session: &mut ImapSession, uid: u32) -> Result<Vec<u8>> {
        let fetches = session.uid_fetch(uid.to_string(), "(UID BODY.PEEK[])")?;
        let f = fetches
            .iter()
            .next()
            .ok_or_else(|| anyhow!("message UID {uid} not found"))?;
        f.body()
            .map(|b| b.to_vec())
            .ok_or_else(|| anyhow!("UID {uid}: missing body"))
    }
}

fn parse_uid(id: &MessageId) -> Result<u32> {
    id.0
        .parse()
        .map_err(|_| anyhow!("`{id}` is not an IMAP UID"))
}

/// IMAP quoted string; the recipient comes from user input.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl MailService for ImapMailbox {
    fn list_unread(&self, recipient: &str) -> Result<Vec<MessageSummary>> {
        let mut session = self.connect_and_auth()?;
        session.select("INBOX")?;

        let query = format!("UNSEEN TO {}", quote(recipient));
        let mut uids: Vec<u32> = session.uid_search(&query)?.into_iter().collect();
        uids.sort_unstable_by(|a, b| b.cmp(a)); // newest first

        let mut out = Vec::with_capacity(uids.len());
        for uid in uids {
            // BODY.PEEK leaves \Seen alone until mark_consumed
            let raw = Self::fetch_raw(&mut session, uid)?;
            out.push(MessageSummary {
                id: MessageId::from(uid),
                snippet: normalize_snippet(&body_text(&raw), 200),
            });
        }

        session.logout()?;
        Ok(out)
    }

    fn get_message(&self, id: &MessageId) -> Result<MessageBody> {
        let uid = parse_uid(id)?;
        let mut session = self.connect_and_auth()?;
        session.select("INBOX")?;
        let raw = Self::fetch_raw(&mut session, uid)?;
        session.logout()?;
        Ok(MessageBody {
            id: id.clone(),
            body: body_text(&raw),
        })
    }

    fn mark_consumed(&self, id: &MessageId) -> Result<()> {
        let uid = parse_uid(id)?;
        let mut session = self.connect_and_auth()?;
        session.select("INBOX")?;
        session.uid_store(uid.to_string(), "+FLAGS (\\Seen)")?;
        session.logout()?;
        Ok(())
    }
}
