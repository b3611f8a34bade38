use anyhow::{Result, anyhow};
use std::fmt;

/// The account being logged in. Also the recipient filter for mailbox queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentifier(String);

impl AccountIdentifier {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("account identifier is empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(anyhow!("account identifier `{trimmed}` contains whitespace"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mailbox addresses are compared case-insensitively.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
