use chrono::{DateTime, Utc};
use std::fmt;

/// A verification code pulled out of a message. Not `Clone`: the login
/// step takes it by value, so one code is submitted at most once.
#[derive(PartialEq, Eq)]
pub struct OneTimeCode(String);

impl OneTimeCode {
    pub(crate) fn new(digits: impl Into<String>) -> Self {
        Self(digits.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_secret(self) -> String {
        self.0
    }
}

impl fmt::Debug for OneTimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OneTimeCode({} digits)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Message id the code was read from.
    Found(String),
    NotFound,
    Error(String),
}

/// One mailbox poll, kept for diagnostics only.
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    pub number: u32,
    pub at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl VerificationAttempt {
    pub fn new(number: u32, outcome: AttemptOutcome) -> Self {
        Self {
            number,
            at: Utc::now(),
            outcome,
        }
    }
}
