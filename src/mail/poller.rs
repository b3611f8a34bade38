use log::{debug, info, warn};
use std::thread;
use std::time::Duration;

use crate::domain::account::AccountIdentifier;
use crate::domain::email::MessageSummary;
use crate::domain::otp::{AttemptOutcome, OneTimeCode, VerificationAttempt};
use crate::error::WorkflowError;
use crate::mail::MailService;
use crate::mail::code::CodeExtractor;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub interval: Duration,
}

/// Polls a mailbox until a verification code shows up or the budget runs out.
pub struct MailboxPoller<'a, M: MailService + ?Sized> {
    mail: &'a M,
    extractor: CodeExtractor,
    attempts: Vec<VerificationAttempt>,
}

impl<'a, M: MailService + ?Sized> MailboxPoller<'a, M> {
    pub fn new(mail: &'a M, extractor: CodeExtractor) -> Self {
        Self {
            mail,
            extractor,
            attempts: Vec::new(),
        }
    }

    /// Every attempt made so far, in order.
    pub fn attempts(&self) -> &[VerificationAttempt] {
        &self.attempts
    }

    /// Issues at most `policy.max_retries` mailbox queries. The message a code
    /// is taken from is marked read before the code is returned.
    pub fn poll(
        &mut self,
        account: &AccountIdentifier,
        policy: RetryPolicy,
    ) -> Result<OneTimeCode, WorkflowError> {
        let mut last_error = None;

        for number in 1..=policy.max_retries {
            info!(
                "Attempt {} of {} to retrieve the verification code...",
                number, policy.max_retries
            );

            match self.attempt(account) {
                Ok(Some((summary, code))) => {
                    if let Err(e) = self.mail.mark_consumed(&summary.id) {
                        let err = WorkflowError::mail(e);
                        self.record(number, AttemptOutcome::Error(err.to_string()));
                        return Err(err);
                    }
                    self.record(number, AttemptOutcome::Found(summary.id.0.clone()));
                    return Ok(code);
                }
                Ok(None) => {
                    debug!("no usable message for {account} on attempt {number}");
                    self.record(number, AttemptOutcome::NotFound);
                }
                Err(e) => {
                    let msg = format!("{e:#}");
                    warn!("mailbox query failed on attempt {number}: {msg}");
                    self.record(number, AttemptOutcome::Error(msg.clone()));
                    last_error = Some(msg);
                }
            }

            if number < policy.max_retries {
                thread::sleep(policy.interval);
            }
        }

        Err(WorkflowError::VerificationTimeout {
            attempts: policy.max_retries,
            last_error,
        })
    }

    /// One mailbox query. Only the newest unread message is considered;
    /// older unread codes are presumed stale.
    fn attempt(
        &self,
        account: &AccountIdentifier,
    ) -> anyhow::Result<Option<(MessageSummary, OneTimeCode)>> {
        let messages = self.mail.list_unread(account.as_str())?;
        let Some(newest) = messages.into_iter().next() else {
            return Ok(None);
        };

        if let Some(code) = self.extractor.extract(&newest.snippet) {
            return Ok(Some((newest, code)));
        }

        // snippets are truncated; the code may sit further down the body
        let body = self.mail.get_message(&newest.id)?;
        Ok(self.extractor.extract(&body.body).map(|code| (newest, code)))
    }

    fn record(&mut self, number: u32, outcome: AttemptOutcome) {
        self.attempts.push(VerificationAttempt::new(number, outcome));
    }
}
