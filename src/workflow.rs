use log::{debug, error, info};
use std::thread;
use std::time::Instant;

use crate::config::{Config, Role};
use crate::domain::account::AccountIdentifier;
use crate::domain::pricing::{
    BillingCycleView, ErrorResult, Plans, PricingResult, WorkflowOutcome, timestamp_now,
};
use crate::driver::AuthenticatedSessionDriver;
use crate::error::WorkflowError;
use crate::mail::MailService;
use crate::pricing::PlanTableParser;
use crate::ui::{Lookup, SessionFactory, SessionGuard, Snapshot, UiSurface};

/// Log in with a mailbox code and read both billing cycles of the paywall.
pub struct PricingExtractionWorkflow<'a, F: SessionFactory, M: MailService + ?Sized> {
    sessions: &'a F,
    mail: &'a M,
    config: &'a Config,
}

impl<'a, F: SessionFactory, M: MailService + ?Sized> PricingExtractionWorkflow<'a, F, M> {
    pub fn new(sessions: &'a F, mail: &'a M, config: &'a Config) -> Self {
        Self {
            sessions,
            mail,
            config,
        }
    }

    /// One attempt, one browser session. The session is closed before this
    /// returns, whichever way the run went.
    pub fn run(&self, account: &AccountIdentifier) -> WorkflowOutcome {
        let first_checked = timestamp_now();
        let url = self.config.site.login_url.as_str();

        let result = self
            .sessions
            .open()
            .map_err(WorkflowError::driver)
            .and_then(|surface| {
                let mut session = SessionGuard::new(surface);
                let outcome = self.extract(&mut session, account);
                if let Err(e) = session.release() {
                    error!("failed to close browser session: {e:#}");
                }
                outcome
            });

        match result {
            Ok(pricing) => {
                info!(
                    "extracted {} yearly and {} monthly tiers",
                    pricing.plans.yearly.len(),
                    pricing.plans.monthly.len()
                );
                WorkflowOutcome::Success(pricing)
            }
            Err(e) => {
                error!("pricing extraction failed [{}]: {e}", e.kind());
                WorkflowOutcome::Failure(ErrorResult::from_error(url, &e, first_checked))
            }
        }
    }

    fn extract(
        &self,
        ui: &mut F::Surface,
        account: &AccountIdentifier,
    ) -> Result<PricingResult, WorkflowError> {
        // compile selectors before touching the network so a bad config fails fast
        let parser = PlanTableParser::new(&self.config.selectors)?;

        {
            let mut driver = AuthenticatedSessionDriver::new(&mut *ui, self.mail, self.config, account);
            if let Err(e) = driver.authenticate() {
                for attempt in driver.verification_attempts() {
                    debug!(
                        "mailbox attempt {} at {}: {:?}",
                        attempt.number, attempt.at, attempt.outcome
                    );
                }
                return Err(e);
            }
        }

        self.open_pricing(ui)?;

        let initial = self.config.site.initial_cycle;
        let snap_a = ui.current_snapshot().map_err(WorkflowError::driver)?;
        let overview = parser.parse_overview(&snap_a)?;
        let view_a = BillingCycleView {
            cycle: initial,
            tiers: parser.parse(&snap_a)?,
        };

        self.toggle_cycle(ui)?;
        let snap_b = self.await_rerender(ui, &parser, &snap_a)?;
        let view_b = BillingCycleView {
            cycle: initial.other(),
            tiers: parser.parse(&snap_b)?,
        };

        Ok(PricingResult {
            subscription_title: overview.subscription_title,
            features: overview.features,
            plans: Plans::from_views(view_a, view_b)?,
        })
    }

    fn open_pricing(&self, ui: &mut F::Surface) -> Result<(), WorkflowError> {
        let cfg = self.config;
        if let Some(pricing_url) = cfg.site.pricing_url.as_deref() {
            ui.navigate(pricing_url).map_err(WorkflowError::driver)?;
        }

        let entry = cfg.selectors.locator(Role::PricingEntry);
        match ui
            .wait_for(&entry, cfg.timeouts.element())
            .map_err(WorkflowError::driver)?
        {
            Lookup::Found(el) => ui.click(&el).map_err(WorkflowError::driver)?,
            _ => {
                return Err(WorkflowError::ElementNotFound {
                    role: Role::PricingEntry,
                    waited: cfg.timeouts.element(),
                });
            }
        }

        let container = cfg.selectors.locator(Role::TierContainer);
        match ui
            .wait_for(&container, cfg.timeouts.render())
            .map_err(WorkflowError::driver)?
        {
            Lookup::Found(_) => Ok(()),
            _ => Err(WorkflowError::UnexpectedPageStructure(format!(
                "pricing container {container} did not render within {:?}",
                cfg.timeouts.render()
            ))),
        }
    }

    fn toggle_cycle(&self, ui: &mut F::Surface) -> Result<(), WorkflowError> {
        let cfg = self.config;
        let toggle = cfg.selectors.locator(Role::CycleToggle);
        match ui
            .wait_for(&toggle, cfg.timeouts.element())
            .map_err(WorkflowError::driver)?
        {
            Lookup::Found(el) => ui.click(&el).map_err(WorkflowError::driver),
            _ => Err(WorkflowError::ElementNotFound {
                role: Role::CycleToggle,
                waited: cfg.timeouts.element(),
            }),
        }
    }

    /// Snapshot once the tiers differ from those in `before`. Only tier
    /// markup counts: a toggle restyling itself inside the container leaves
    /// the old cycle's prices on screen.
    fn await_rerender(
        &self,
        ui: &mut F::Surface,
        parser: &PlanTableParser,
        before: &Snapshot,
    ) -> Result<Snapshot, WorkflowError> {
        let old = parser.tier_markup(before);
        let timeout = self.config.timeouts.render();
        let deadline = Instant::now() + timeout;

        loop {
            let snap = ui.current_snapshot().map_err(WorkflowError::driver)?;
            let now = parser.tier_markup(&snap);
            if now.is_some() && now != old {
                return Ok(snap);
            }
            if Instant::now() >= deadline {
                return Err(match now {
                    None => WorkflowError::UnexpectedPageStructure(format!(
                        "pricing container gone after the billing-cycle toggle ({timeout:?})"
                    )),
                    Some(_) => WorkflowError::Timeout {
                        what: "pricing tiers to re-render after the billing-cycle toggle".into(),
                        waited: timeout,
                    },
                });
            }
            thread::sleep(self.config.browser.poll_interval());
        }
    }
}
