use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "otp_pricing";

fn entry(key: &str) -> Result<Entry> {
    Entry::new(SERVICE, key).map_err(|e| anyhow!("keyring unavailable: {e}"))
}

fn load(key: &str) -> Result<Option<String>> {
    match entry(key)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

fn save(key: &str, secret: &str) -> Result<()> {
    entry(key)?
        .set_password(secret)
        .map_err(|e| anyhow!(e.to_string()))
}

/// Refresh tokens are keyed by mailbox address.
pub fn save_refresh_token(mailbox: &str, refresh_token: &str) -> Result<()> {
    save(mailbox, refresh_token)
}

pub fn load_refresh_token(mailbox: &str) -> Result<Option<String>> {
    load(mailbox)
}

/// Client secrets are keyed by OAuth client id.
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    save(client_id, client_secret)
}

pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    load(client_id)
}
