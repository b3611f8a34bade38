//! Login state machine: identifier → mailbox code → authenticated session.

use log::{debug, info, warn};
use std::time::Duration;

use crate::config::{Config, Role};
use crate::domain::account::AccountIdentifier;
use crate::domain::otp::{OneTimeCode, VerificationAttempt};
use crate::error::{ErrorKind, WorkflowError};
use crate::mail::MailService;
use crate::mail::code::CodeExtractor;
use crate::mail::poller::{MailboxPoller, RetryPolicy};
use crate::ui::{ElementHandle, Lookup, UiSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    IdentifierSubmitted,
    AwaitingCode,
    CodeSubmitted,
    Authenticated,
    Failed(ErrorKind),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::Failed(_))
    }
}

/// What a bounded wait that runs out turns into.
#[derive(Debug, Clone, Copy)]
enum OnTimeout {
    /// An input or button the flow needs to act on.
    Missing,
    /// A marker that confirms a state was reached.
    Expired,
}

/// Drives one login attempt over a borrowed UI session.
pub struct AuthenticatedSessionDriver<'a, U: UiSurface + ?Sized, M: MailService + ?Sized> {
    ui: &'a mut U,
    poller: MailboxPoller<'a, M>,
    config: &'a Config,
    account: &'a AccountIdentifier,
    state: SessionState,
}

impl<'a, U: UiSurface + ?Sized, M: MailService + ?Sized> AuthenticatedSessionDriver<'a, U, M> {
    pub fn new(
        ui: &'a mut U,
        mail: &'a M,
        config: &'a Config,
        account: &'a AccountIdentifier,
    ) -> Self {
        Self {
            ui,
            poller: MailboxPoller::new(mail, CodeExtractor::new(config.mail.code_length)),
            config,
            account,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn verification_attempts(&self) -> &[VerificationAttempt] {
        self.poller.attempts()
    }

    /// Run the machine to a terminal state. `Ok` means `Authenticated`.
    pub fn authenticate(&mut self) -> Result<(), WorkflowError> {
        while !self.state.is_terminal() {
            if let Err(e) = self.step() {
                warn!("login failed in state {:?}: {e}", self.state);
                self.state = SessionState::Failed(e.kind());
                return Err(e);
            }
        }
        match self.state {
            SessionState::Authenticated => Ok(()),
            other => Err(WorkflowError::Driver(format!(
                "login already ended in {other:?}"
            ))),
        }
    }

    fn step(&mut self) -> Result<(), WorkflowError> {
        let next = match self.state {
            SessionState::Unauthenticated => {
                self.submit_identifier()?;
                SessionState::IdentifierSubmitted
            }
            // nothing to wait for on the page; from here on we block on the mailbox
            SessionState::IdentifierSubmitted => SessionState::AwaitingCode,
            SessionState::AwaitingCode => {
                let policy = self.retry_policy();
                let code = self.poller.poll(self.account, policy)?;
                self.submit_code(code)?;
                SessionState::CodeSubmitted
            }
            SessionState::CodeSubmitted => {
                self.confirm_login()?;
                SessionState::Authenticated
            }
            SessionState::Authenticated | SessionState::Failed(_) => return Ok(()),
        };
        debug!("session state {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.mail.max_retries,
            interval: self.config.mail.interval(),
        }
    }

    fn submit_identifier(&mut self) -> Result<(), WorkflowError> {
        let login_url = self.config.site.login_url.clone();
        info!("opening {login_url}");
        self.ui.navigate(&login_url).map_err(WorkflowError::driver)?;

        let input = self.require(Role::EmailInput, self.config.timeouts.element(), OnTimeout::Missing)?;
        self.ui
            .type_text(&input, self.account.as_str())
            .map_err(WorkflowError::driver)?;

        let go = self.require(Role::ContinueButton, self.config.timeouts.element(), OnTimeout::Missing)?;
        self.ui.click(&go).map_err(WorkflowError::driver)
    }

    /// Takes the code by value: once typed it is gone.
    fn submit_code(&mut self, code: OneTimeCode) -> Result<(), WorkflowError> {
        let input = self.require(Role::CodeInput, self.config.timeouts.element(), OnTimeout::Missing)?;
        self.ui
            .type_text(&input, &code.into_secret())
            .map_err(WorkflowError::driver)
    }

    fn confirm_login(&mut self) -> Result<(), WorkflowError> {
        let log_in = self.require(Role::LoginButton, self.config.timeouts.element(), OnTimeout::Missing)?;
        self.ui.click(&log_in).map_err(WorkflowError::driver)?;

        self.require(Role::AuthenticatedMarker, self.config.timeouts.auth(), OnTimeout::Expired)?;

        let actual = self.signed_in_identity()?;
        if !self.account.matches(&actual) {
            return Err(WorkflowError::AuthMismatch {
                expected: self.account.to_string(),
                actual,
            });
        }
        info!("logged in as {}", self.account);
        Ok(())
    }

    /// Account shown by the page after login. An unreadable identity is a
    /// failure, never a pass.
    fn signed_in_identity(&mut self) -> Result<String, WorkflowError> {
        let probe = self.require(Role::IdentityProbe, self.config.timeouts.auth(), OnTimeout::Expired)?;
        let raw = match self.config.site.identity_attribute.as_deref() {
            Some(attr) => self
                .ui
                .read_attribute(&probe, attr)
                .map_err(WorkflowError::driver)?
                .unwrap_or_default(),
            None => self.ui.read_text(&probe).map_err(WorkflowError::driver)?,
        };
        let identity = raw.trim().to_string();
        if identity.is_empty() {
            return Err(WorkflowError::AuthMismatch {
                expected: self.account.to_string(),
                actual: "<empty>".to_string(),
            });
        }
        Ok(identity)
    }

    fn require(
        &mut self,
        role: Role,
        timeout: Duration,
        on_timeout: OnTimeout,
    ) -> Result<ElementHandle, WorkflowError> {
        let locator = self.config.selectors.locator(role);
        match self
            .ui
            .wait_for(&locator, timeout)
            .map_err(WorkflowError::driver)?
        {
            Lookup::Found(el) => Ok(el),
            Lookup::NotFound | Lookup::TimedOut => match on_timeout {
                OnTimeout::Missing => Err(WorkflowError::ElementNotFound {
                    role,
                    waited: timeout,
                }),
                OnTimeout::Expired => Err(WorkflowError::Timeout {
                    what: format!("`{role}` ({locator})"),
                    waited: timeout,
                }),
            },
        }
    }
}
