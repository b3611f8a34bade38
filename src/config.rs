use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::pricing::BillingCycle;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub login_url: String,
    /// Opened after login before looking for the pricing entry point.
    pub pricing_url: Option<String>,
    /// Cycle shown when the pricing container first renders.
    pub initial_cycle: BillingCycle,
    /// Attribute of the `identity_probe` element holding the signed-in account.
    /// When unset the element text is used.
    pub identity_attribute: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            login_url: "https://poe.com".to_string(),
            pricing_url: None,
            initial_cycle: BillingCycle::Yearly,
            identity_attribute: Some("data-account-email".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub browser_name: String,
    pub headless: bool,
    pub poll_interval_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:9515".to_string(),
            browser_name: "chrome".to_string(),
            headless: true,
            poll_interval_ms: 250,
        }
    }
}

impl BrowserConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Timeouts {
    /// Inputs and buttons.
    pub element_secs: u64,
    /// Authenticated-only marker and identity probe after login.
    pub auth_secs: u64,
    /// Pricing container, first render and re-render after the cycle toggle.
    pub render_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_secs: 10,
            auth_secs: 10,
            render_secs: 10,
        }
    }
}

impl Timeouts {
    pub fn element(&self) -> Duration {
        Duration::from_secs(self.element_secs)
    }

    pub fn auth(&self) -> Duration {
        Duration::from_secs(self.auth_secs)
    }

    pub fn render(&self) -> Duration {
        Duration::from_secs(self.render_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MailProvider {
    Gmail,
    Imap,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MailConfig {
    pub provider: MailProvider,
    pub imap_server: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub max_retries: u32,
    pub interval_secs: u64,
    pub code_length: usize,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider: MailProvider::Gmail,
            imap_server: "imap.gmail.com".to_string(),
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            redirect_uri: "http://127.0.0.1:8080/callback".to_string(),
            max_retries: 10,
            interval_secs: 5,
            code_length: 6,
        }
    }
}

impl MailConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// OAuth scope needed by the configured backend. Gmail needs `modify`
    /// to clear the UNREAD label of a consumed message.
    pub fn oauth_scope(&self) -> &'static str {
        match self.provider {
            MailProvider::Gmail => "https://www.googleapis.com/auth/gmail.modify",
            MailProvider::Imap => "https://mail.google.com/",
        }
    }
}

/// Logical UI element roles. Markup drifts, roles don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    EmailInput,
    ContinueButton,
    CodeInput,
    LoginButton,
    AuthenticatedMarker,
    IdentityProbe,
    PricingEntry,
    TierContainer,
    Tier,
    TierName,
    TierPrice,
    SubscriptionTitle,
    FeatureItem,
    CycleToggle,
}

impl Role {
    /// Roles read out of page snapshots rather than the live page; these must be CSS.
    pub const SNAPSHOT_ROLES: [Role; 6] = [
        Role::TierContainer,
        Role::Tier,
        Role::TierName,
        Role::TierPrice,
        Role::SubscriptionTitle,
        Role::FeatureItem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::EmailInput => "email_input",
            Role::ContinueButton => "continue_button",
            Role::CodeInput => "code_input",
            Role::LoginButton => "login_button",
            Role::AuthenticatedMarker => "authenticated_marker",
            Role::IdentityProbe => "identity_probe",
            Role::PricingEntry => "pricing_entry",
            Role::TierContainer => "tier_container",
            Role::Tier => "tier",
            Role::TierName => "tier_name",
            Role::TierPrice => "tier_price",
            Role::SubscriptionTitle => "subscription_title",
            Role::FeatureItem => "feature_item",
            Role::CycleToggle => "cycle_toggle",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an element is located: `{ css = "..." }` or `{ xpath = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    Xpath(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Locator::Xpath(s.into())
    }

    pub fn as_css(&self) -> Option<&str> {
        match self {
            Locator::Css(s) => Some(s),
            Locator::Xpath(_) => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{s}`"),
            Locator::Xpath(s) => write!(f, "xpath `{s}`"),
        }
    }
}

/// Role → locator overrides from `[selectors]`; unset roles fall back to
/// the built-in defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(transparent)]
pub struct SelectorConfig {
    pub overrides: BTreeMap<Role, Locator>,
}

impl SelectorConfig {
    pub fn locator(&self, role: Role) -> Locator {
        self.overrides
            .get(&role)
            .cloned()
            .unwrap_or_else(|| default_locator(role))
    }

    pub fn with(mut self, role: Role, locator: Locator) -> Self {
        self.overrides.insert(role, locator);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for role in Role::SNAPSHOT_ROLES {
            let loc = self.locator(role);
            let css = loc
                .as_css()
                .ok_or_else(|| anyhow!("selector `{role}` is read from snapshots and must be css"))?;
            scraper::Selector::parse(css)
                .map_err(|e| anyhow!("selector `{role}` is not valid css ({css}): {e}"))?;
        }
        // no site-independent default exists for this one
        if !self.overrides.contains_key(&Role::IdentityProbe) {
            bail!(
                "[selectors] identity_probe is not set; point it at the element showing the signed-in account"
            );
        }
        Ok(())
    }
}

fn default_locator(role: Role) -> Locator {
    match role {
        Role::EmailInput => Locator::css(".textInput_input__9YpqY"),
        Role::ContinueButton | Role::LoginButton => {
            Locator::css(".Button_buttonBase__Bv9Vx.Button_primary__6UIn0")
        }
        Role::CodeInput => Locator::xpath("//input[@placeholder='Code']"),
        Role::AuthenticatedMarker | Role::PricingEntry => {
            Locator::xpath("//div[text()='Subscribe']")
        }
        // placeholder for in-code configs; files must set their own
        Role::IdentityProbe => Locator::css("[data-account-email]"),
        Role::TierContainer => Locator::css(".WebSubscriptionPaywall_tierContainer__s_5Zw"),
        Role::Tier => Locator::css("div.WebSubscriptionTierPlans_tierOption__w24oz"),
        Role::TierName => Locator::css("div.WebSubscriptionTierPlans_title___ChXj"),
        Role::TierPrice => Locator::css("div.WebSubscriptionTierPlans_tierPrice__TOXPR"),
        Role::SubscriptionTitle => Locator::css("div.WebSubscriptionPaywall_title__hZ9zT"),
        Role::FeatureItem => Locator::css("li.WebSubscriptionPaywall_itemText__Kbotl"),
        Role::CycleToggle => Locator::xpath("//label/div[contains(text(),'monthly')]"),
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(s)?;
        cfg.selectors.validate()?;
        Ok(cfg)
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join("otp_pricing"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

/// Load from the default location, writing a template there first if none exists.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

const TEMPLATE_HEADER: &str = "\
# Required before the first run: under [selectors], set the element that shows
# the signed-in account, for example
#   identity_probe = { css = \"header [data-testid='account-email']\" }
# The account is read from the attribute named by site.identity_attribute,
# or from the element text when that is removed.

";

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let tom = toml::to_string_pretty(&Config::default())?;
        fs::write(path, format!("{TEMPLATE_HEADER}{tom}"))?;
        return Err(anyhow!(
            "Created template config at {}; edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    Config::from_toml_str(&s)
}
