use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use otp_pricing::auth::credentials::CredentialSource;
use otp_pricing::auth::token_store;
use otp_pricing::config::{Config, MailProvider, load_config, load_config_from};
use otp_pricing::domain::account::AccountIdentifier;
use otp_pricing::domain::pricing::{ErrorResult, WorkflowOutcome, timestamp_now};
use otp_pricing::error::WorkflowError;
use otp_pricing::mail::MailService;
use otp_pricing::mail::gmail::GmailMailbox;
use otp_pricing::mail::imap_client::ImapMailbox;
use otp_pricing::ui::webdriver::WebDriverFactory;
use otp_pricing::workflow::PricingExtractionWorkflow;

#[derive(Parser)]
#[command(name = "otp_pricing")]
#[command(about = "Log in with an emailed one-time code and extract subscription pricing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in as ACCOUNT and write both billing cycles to a JSON file
    Run {
        #[arg(long)]
        email: String,

        #[arg(long, default_value = "pricing.json")]
        out: PathBuf,

        /// Config file (defaults to the per-user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            token_store::save_client_secret(&client_id, secret.trim())?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(ExitCode::SUCCESS)
        }

        Command::Run { email, out, config } => {
            let cfg = match config {
                Some(path) => load_config_from(&path),
                None => load_config(),
            }
            .map_err(|e| anyhow!("Configuration error: {e}"))?;
            let account = AccountIdentifier::new(email)?;

            let outcome = run(&cfg, &account);
            write_outcome(&out, &outcome)?;
            println!("Result written to {}", out.display());

            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Mailbox setup failures are reported in the same document shape as
/// failures inside the workflow.
fn run(cfg: &Config, account: &AccountIdentifier) -> WorkflowOutcome {
    let first_checked = timestamp_now();
    let fail = |e: WorkflowError| {
        error!("mailbox setup failed: {e}");
        WorkflowOutcome::Failure(ErrorResult::from_error(
            &cfg.site.login_url,
            &e,
            first_checked.clone(),
        ))
    };

    let credential = match CredentialSource::from_config(&cfg.mail, account)
        .and_then(|source| source.credential())
    {
        Ok(c) => c,
        Err(e) => return fail(WorkflowError::mail(e)),
    };

    match cfg.mail.provider {
        MailProvider::Gmail => {
            let mailbox = GmailMailbox::new(credential);
            if let Err(e) = mailbox.ensure_owner(account) {
                return fail(e);
            }
            extract(cfg, &mailbox, account)
        }
        MailProvider::Imap => {
            let mailbox = ImapMailbox::new(cfg.mail.imap_server.clone(), credential);
            extract(cfg, &mailbox, account)
        }
    }
}

fn extract<M: MailService>(cfg: &Config, mailbox: &M, account: &AccountIdentifier) -> WorkflowOutcome {
    info!("extracting pricing as {account}");
    let browsers = WebDriverFactory::new(cfg.browser.clone());
    PricingExtractionWorkflow::new(&browsers, mailbox, cfg).run(account)
}

fn write_outcome(path: &Path, outcome: &WorkflowOutcome) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;
    fs::write(path, json)?;
    Ok(())
}
