use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RfqId(pub String);

impl RfqId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RfqId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A buyer's sourcing need. Issued outside the engine and never mutated by it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rfq {
    pub id: RfqId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub quantity: Option<u32>,
    pub budget: Option<Decimal>,
    pub deadline: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rfq {
    /// Text the keyword-based strategies tokenize for this request.
    pub fn search_text(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.category)
    }

    pub fn same_category(&self, other: &str) -> bool {
        self.category.trim().eq_ignore_ascii_case(other.trim())
    }
}
