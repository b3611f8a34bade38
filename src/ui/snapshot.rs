use chrono::{DateTime, Utc};
use scraper::Html;

/// Page markup captured at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    html: String,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            captured_at: Utc::now(),
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}
