use log::debug;
use scraper::{ElementRef, Selector};

use crate::config::{Role, SelectorConfig};
use crate::domain::pricing::PricingTier;
use crate::error::WorkflowError;
use crate::ui::Snapshot;

/// Title shown when the paywall has none.
pub const UNAVAILABLE_TITLE: &str = "Unavailable";

/// Reads the pricing container out of a page snapshot.
#[derive(Debug)]
pub struct PlanTableParser {
    container: Selector,
    tier: Selector,
    name: Selector,
    price: Selector,
    title: Selector,
    feature: Selector,
}

/// Title and feature list of the paywall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overview {
    pub subscription_title: String,
    pub features: Vec<String>,
}

fn compile(selectors: &SelectorConfig, role: Role) -> Result<Selector, WorkflowError> {
    let locator = selectors.locator(role);
    let css = locator.as_css().ok_or_else(|| {
        WorkflowError::UnexpectedPageStructure(format!("selector `{role}` must be css, got {locator}"))
    })?;
    Selector::parse(css).map_err(|e| {
        WorkflowError::UnexpectedPageStructure(format!("selector `{role}` ({css}) is invalid: {e}"))
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

impl PlanTableParser {
    pub fn new(selectors: &SelectorConfig) -> Result<Self, WorkflowError> {
        Ok(Self {
            container: compile(selectors, Role::TierContainer)?,
            tier: compile(selectors, Role::Tier)?,
            name: compile(selectors, Role::TierName)?,
            price: compile(selectors, Role::TierPrice)?,
            title: compile(selectors, Role::SubscriptionTitle)?,
            feature: compile(selectors, Role::FeatureItem)?,
        })
    }

    /// Outer HTML of every tier in the container, or `None` when the
    /// container is absent. Markup elsewhere in the container is ignored.
    pub fn tier_markup(&self, snapshot: &Snapshot) -> Option<Vec<String>> {
        let doc = snapshot.document();
        let container = doc.select(&self.container).next()?;
        Some(container.select(&self.tier).map(|t| t.html()).collect())
    }

    /// Tiers in page order. A tier lacking a name or a price is skipped;
    /// a missing container is an error.
    pub fn parse(&self, snapshot: &Snapshot) -> Result<Vec<PricingTier>, WorkflowError> {
        let doc = snapshot.document();
        let container = self.find_container(&doc)?;

        let mut tiers = Vec::new();
        for (idx, tier) in container.select(&self.tier).enumerate() {
            match (first_text(tier, &self.name), first_text(tier, &self.price)) {
                (Some(plan_name), Some(price)) => tiers.push(PricingTier { plan_name, price }),
                (name, price) => debug!(
                    "skipping tier #{idx}: name={:?} price={:?}",
                    name.is_some(),
                    price.is_some()
                ),
            }
        }
        Ok(tiers)
    }

    pub fn parse_overview(&self, snapshot: &Snapshot) -> Result<Overview, WorkflowError> {
        let doc = snapshot.document();
        let container = self.find_container(&doc)?;

        let subscription_title = first_text(container, &self.title)
            .unwrap_or_else(|| UNAVAILABLE_TITLE.to_string());
        let features = container
            .select(&self.feature)
            .map(text_of)
            .filter(|t| !t.is_empty())
            .collect();

        Ok(Overview {
            subscription_title,
            features,
        })
    }

    fn find_container<'d>(
        &self,
        doc: &'d scraper::Html,
    ) -> Result<ElementRef<'d>, WorkflowError> {
        doc.select(&self.container).next().ok_or_else(|| {
            WorkflowError::UnexpectedPageStructure("pricing container not found in snapshot".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Locator;
    use crate::error::ErrorKind;
    use crate::testing::{paywall_html, tier_html};

    fn parser() -> PlanTableParser {
        PlanTableParser::new(&SelectorConfig::default()).unwrap()
    }

    #[test]
    fn incomplete_tier_is_skipped_in_order() {
        let html = paywall_html(
            "Subscribe to Poe",
            &["Access to all bots"],
            &[
                tier_html(Some("Basic"), Some("$4.99/mo")),
                tier_html(Some("Promo"), None),
                tier_html(Some("Standard"), Some("$19.99/mo")),
                tier_html(Some("Premium"), Some("$49.99/mo")),
            ],
        );

        let tiers = parser().parse(&Snapshot::new(html)).unwrap();

        assert_eq!(
            tiers,
            vec![
                PricingTier::new("Basic", "$4.99/mo"),
                PricingTier::new("Standard", "$19.99/mo"),
                PricingTier::new("Premium", "$49.99/mo"),
            ]
        );
    }

    #[test]
    fn tier_without_name_is_skipped() {
        let html = paywall_html(
            "t",
            &[],
            &[tier_html(None, Some("$1")), tier_html(Some("Pro"), Some("$20/mo"))],
        );
        let tiers = parser().parse(&Snapshot::new(html)).unwrap();
        assert_eq!(tiers, vec![PricingTier::new("Pro", "$20/mo")]);
    }

    #[test]
    fn missing_container_aborts() {
        let snap = Snapshot::new("<html><body><div class=\"loading\">…</div></body></html>");
        let err = parser().parse(&snap).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedPageStructure);
    }

    #[test]
    fn tier_markup_ignores_the_rest_of_the_container() {
        let tiers = [tier_html(Some("Pro"), Some("$200/yr"))];
        let off = paywall_html("t", &["a"], &tiers).replace("<ul>", r#"<label class="off"></label><ul>"#);
        let on = paywall_html("t", &["a"], &tiers).replace("<ul>", r#"<label class="on"></label><ul>"#);

        let p = parser();
        let before = p.tier_markup(&Snapshot::new(off)).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(Some(before), p.tier_markup(&Snapshot::new(on)));
        assert!(p.tier_markup(&Snapshot::new("<html><body></body></html>")).is_none());
    }

    #[test]
    fn overview_reads_title_and_features() {
        let html = paywall_html(
            "Subscribe to Poe",
            &["Access to all bots", "  Priority   access "],
            &[tier_html(Some("Pro"), Some("$200/yr"))],
        );
        let overview = parser().parse_overview(&Snapshot::new(html)).unwrap();
        assert_eq!(overview.subscription_title, "Subscribe to Poe");
        assert_eq!(
            overview.features,
            vec!["Access to all bots".to_string(), "Priority access".to_string()]
        );
    }

    #[test]
    fn missing_title_is_unavailable() {
        let html = r#"<div class="WebSubscriptionPaywall_tierContainer__s_5Zw"></div>"#;
        let overview = parser().parse_overview(&Snapshot::new(html)).unwrap();
        assert_eq!(overview.subscription_title, UNAVAILABLE_TITLE);
        assert!(overview.features.is_empty());
    }

    #[test]
    fn custom_selectors() {
        let selectors = SelectorConfig::default()
            .with(Role::TierContainer, Locator::css("section.plans"))
            .with(Role::Tier, Locator::css("article"))
            .with(Role::TierName, Locator::css("h3"))
            .with(Role::TierPrice, Locator::css(".amount"));
        let parser = PlanTableParser::new(&selectors).unwrap();
        let snap = Snapshot::new(
            r#"<section class="plans">
                 <article><h3>Free</h3><span class="amount">$0</span></article>
                 <article><h3>Team</h3><span class="amount">$30</span></article>
               </section>"#,
        );
        let tiers = parser.parse(&snap).unwrap();
        assert_eq!(
            tiers,
            vec![PricingTier::new("Free", "$0"), PricingTier::new("Team", "$30")]
        );
    }

    #[test]
    fn xpath_for_snapshot_role_is_rejected() {
        let selectors = SelectorConfig::default().with(Role::Tier, Locator::xpath("//div"));
        let err = PlanTableParser::new(&selectors).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedPageStructure);
    }
}
