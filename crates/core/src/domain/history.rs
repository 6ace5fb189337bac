use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::rfq::RfqId;
use crate::domain::supplier::SupplierId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoricalMatchId(pub String);

/// Recorded outcome of a past RFQ/supplier pairing. Unique per (rfq, supplier).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMatch {
    pub id: HistoricalMatchId,
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub success: bool,
    /// Buyer's rating of the supplier, 1-5.
    pub buyer_feedback: Option<u8>,
    /// Supplier's rating of the buyer, 1-5.
    pub supplier_feedback: Option<u8>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome reported for a previously recommended match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchFeedback {
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub success: bool,
    #[serde(default)]
    pub buyer_feedback: Option<u8>,
    #[serde(default)]
    pub supplier_feedback: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
}
