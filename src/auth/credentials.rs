use anyhow::Result;
use log::{info, warn};

use crate::auth::oauth::{GoogleOAuth, Grant};
use crate::auth::token_store;
use crate::config::MailConfig;
use crate::domain::account::AccountIdentifier;
use crate::mail::MailCredential;

/// Produces a fresh mailbox credential for one run. Only the refresh token
/// outlives the process, and only in the OS keyring.
pub struct CredentialSource {
    oauth: GoogleOAuth,
    mailbox: String,
}

impl CredentialSource {
    pub fn from_config(cfg: &MailConfig, account: &AccountIdentifier) -> Result<Self> {
        let client_secret = token_store::load_client_secret(&cfg.client_id)?
            .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok());
        let oauth = GoogleOAuth::new(
            &cfg.client_id,
            client_secret.as_deref(),
            &cfg.redirect_uri,
            cfg.oauth_scope(),
        )?;
        Ok(Self {
            oauth,
            mailbox: account.as_str().to_string(),
        })
    }

    pub fn credential(&self) -> Result<MailCredential> {
        let grant = match token_store::load_refresh_token(&self.mailbox)? {
            Some(rt) => match self.oauth.refresh(&rt) {
                Ok(grant) => grant,
                Err(e) => {
                    warn!("stored refresh token rejected ({e}); re-authorizing");
                    self.oauth.authorize_interactively()?
                }
            },
            None => {
                info!("no refresh token for {}; starting browser authorization", self.mailbox);
                self.oauth.authorize_interactively()?
            }
        };
        self.keep_refresh_token(&grant);

        Ok(MailCredential {
            user: self.mailbox.clone(),
            access_token: grant.access_token,
        })
    }

    fn keep_refresh_token(&self, grant: &Grant) {
        if let Some(rt) = &grant.refresh_token
            && let Err(e) = token_store::save_refresh_token(&self.mailbox, rt)
        {
            warn!("could not store refresh token in keyring: {e}");
        }
    }
}
