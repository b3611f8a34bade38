use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::Role;

/// Tag carried by every failed run. Serialized as-is into the `error` field
/// of the result document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ElementNotFound,
    Timeout,
    VerificationTimeout,
    AuthMismatch,
    UnexpectedPageStructure,
    MailServiceError,
    DriverError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ElementNotFound => "ElementNotFound",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::VerificationTimeout => "VerificationTimeout",
            ErrorKind::AuthMismatch => "AuthMismatch",
            ErrorKind::UnexpectedPageStructure => "UnexpectedPageStructure",
            ErrorKind::MailServiceError => "MailServiceError",
            ErrorKind::DriverError => "DriverError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("element `{role}` did not appear within {waited:?}")]
    ElementNotFound { role: Role, waited: Duration },

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    /// Retry budget of the mailbox poller ran out.
    #[error("no verification code after {attempts} mailbox attempts{}", last_error_suffix(.last_error))]
    VerificationTimeout {
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("logged in as `{actual}` but expected `{expected}`")]
    AuthMismatch { expected: String, actual: String },

    #[error("unexpected page structure: {0}")]
    UnexpectedPageStructure(String),

    #[error("mail service error: {0}")]
    MailService(String),

    #[error("browser driver error: {0}")]
    Driver(String),
}

fn last_error_suffix(last: &Option<String>) -> String {
    match last {
        Some(e) => format!(" (last error: {e})"),
        None => String::new(),
    }
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            WorkflowError::Timeout { .. } => ErrorKind::Timeout,
            WorkflowError::VerificationTimeout { .. } => ErrorKind::VerificationTimeout,
            WorkflowError::AuthMismatch { .. } => ErrorKind::AuthMismatch,
            WorkflowError::UnexpectedPageStructure(_) => ErrorKind::UnexpectedPageStructure,
            WorkflowError::MailService(_) => ErrorKind::MailServiceError,
            WorkflowError::Driver(_) => ErrorKind::DriverError,
        }
    }

    /// Wrap a transport fault from the UI surface.
    pub fn driver(err: anyhow::Error) -> Self {
        WorkflowError::Driver(format!("{err:#}"))
    }

    pub fn mail(err: anyhow::Error) -> Self {
        WorkflowError::MailService(format!("{err:#}"))
    }
}
