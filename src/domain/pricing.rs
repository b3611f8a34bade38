use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, WorkflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Yearly,
    Monthly,
}

impl BillingCycle {
    pub fn other(self) -> Self {
        match self {
            BillingCycle::Yearly => BillingCycle::Monthly,
            BillingCycle::Monthly => BillingCycle::Yearly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    pub plan_name: String,
    pub price: String,
}

impl PricingTier {
    pub fn new(plan_name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            plan_name: plan_name.into(),
            price: price.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingCycleView {
    pub cycle: BillingCycle,
    pub tiers: Vec<PricingTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plans {
    pub yearly: Vec<PricingTier>,
    pub monthly: Vec<PricingTier>,
}

impl Plans {
    /// Place two independently parsed views under their own cycles.
    pub fn from_views(a: BillingCycleView, b: BillingCycleView) -> Result<Self, WorkflowError> {
        match (a.cycle, b.cycle) {
            (BillingCycle::Yearly, BillingCycle::Monthly) => Ok(Self {
                yearly: a.tiers,
                monthly: b.tiers,
            }),
            (BillingCycle::Monthly, BillingCycle::Yearly) => Ok(Self {
                yearly: b.tiers,
                monthly: a.tiers,
            }),
            (x, y) => Err(WorkflowError::UnexpectedPageStructure(format!(
                "captured {x:?} and {y:?} views instead of one per cycle"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub subscription_title: String,
    pub features: Vec<String>,
    pub plans: Plans,
}

/// Failure document, shaped like the status-check output so both can be
/// consumed the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub url: String,
    /// Human-readable description.
    pub status: String,
    pub error: ErrorKind,
    pub first_checked: String,
    pub last_checked: String,
}

impl ErrorResult {
    pub fn from_error(url: &str, err: &WorkflowError, first_checked: String) -> Self {
        Self {
            url: url.to_string(),
            status: err.to_string(),
            error: err.kind(),
            first_checked,
            last_checked: timestamp_now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowOutcome {
    Success(PricingResult),
    Failure(ErrorResult),
}

impl WorkflowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowOutcome::Success(_))
    }
}

pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
