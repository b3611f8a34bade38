//! OAuth2 access to the mailbox: keyring-backed refresh tokens and a
//! loopback PKCE flow for the first run.

pub mod credentials;
pub mod oauth;
pub mod token_store;
