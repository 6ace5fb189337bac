//! Feedback trend forecasting
//!
//! Looks at a supplier's recent matches in the RFQ's category and rewards suppliers
//! whose buyer ratings are improving and who are matched frequently.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Months;

use super::store::{HistoryFilter, MatchStore};
use super::{MatchContext, ScoringStrategy, StrategyKind, StrategyResult};
use crate::domain::history::HistoricalMatch;
use crate::domain::recommendation::{
    rank_descending, ScoreFactor, ScoredCandidate, RECOMMENDED_THRESHOLD,
};
use crate::domain::supplier::SupplierId;

/// Fewer matches than this give no usable trend.
pub const MIN_TREND_MATCHES: usize = 3;

pub const TREND_WINDOW_MONTHS: u32 = 3;

const TREND_SHARE: f64 = 0.7;
const FREQUENCY_SHARE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendForecast {
    /// Average change in mean buyer rating between consecutive segments.
    pub trend: f64,
    pub trend_score: f64,
    pub frequency_score: f64,
    pub score: f64,
    pub matches: usize,
}

/// Forecast for one supplier's matches, oldest first. `None` below `MIN_TREND_MATCHES`.
pub fn forecast(matches: &[HistoricalMatch]) -> Option<TrendForecast> {
    let count = matches.len();
    if count < MIN_TREND_MATCHES {
        return None;
    }

    let segment = count / 3;
    let early = mean_feedback(&matches[..segment]);
    let middle = mean_feedback(&matches[segment..segment * 2]);
    let recent = mean_feedback(&matches[segment * 2..]);
    let trend = match (early, middle, recent) {
        (Some(early), Some(middle), Some(recent)) => ((middle - early) + (recent - middle)) / 2.0,
        _ => 0.0,
    };
    let trend_score = (50.0 + trend * 25.0).clamp(0.0, 100.0);

    let first = matches[0].created_at;
    let last = matches[count - 1].created_at;
    let day_span = (last - first).num_days().max(1) as f64;
    let frequency_score = (count as f64 / day_span * 20.0).min(100.0);

    Some(TrendForecast {
        trend,
        trend_score,
        frequency_score,
        score: TREND_SHARE * trend_score + FREQUENCY_SHARE * frequency_score,
        matches: count,
    })
}

fn mean_feedback(segment: &[HistoricalMatch]) -> Option<f64> {
    let ratings: Vec<f64> =
        segment.iter().filter_map(|record| record.buyer_feedback).map(f64::from).collect();
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
}

pub struct TrendForecaster {
    store: Arc<dyn MatchStore>,
}

impl TrendForecaster {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ScoringStrategy for TrendForecaster {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TimeSeries
    }

    async fn score(&self, context: &MatchContext, limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
        let category = &context.rfq.category;
        let eligible: Vec<&SupplierId> = context
            .suppliers
            .iter()
            .filter(|supplier| supplier.offers_category(category))
            .map(|supplier| &supplier.id)
            .collect();
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        let since = context
            .now
            .checked_sub_months(Months::new(TREND_WINDOW_MONTHS))
            .unwrap_or(context.now);
        let history = self
            .store
            .list_historical_matches(&HistoryFilter::default().in_category(category.clone()).since(since))
            .await?;

        let mut by_supplier: BTreeMap<SupplierId, Vec<HistoricalMatch>> = BTreeMap::new();
        for record in history.into_iter().filter(|record| eligible.contains(&&record.supplier_id)) {
            by_supplier.entry(record.supplier_id.clone()).or_default().push(record);
        }

        let mut scored = Vec::new();
        for (supplier_id, mut matches) in by_supplier {
            matches.sort_by_key(|record| record.created_at);
            let Some(outlook) = forecast(&matches) else {
                continue;
            };

            let direction = match outlook.trend {
                trend if trend > 0.0 => "improving",
                trend if trend < 0.0 => "declining",
                _ => "steady",
            };
            let factors = vec![
                ScoreFactor::new(
                    "feedback_trend",
                    TREND_SHARE * 100.0,
                    outlook.trend_score,
                    format!("Buyer ratings {direction} ({:+.2} per period)", outlook.trend),
                ),
                ScoreFactor::new(
                    "match_frequency",
                    FREQUENCY_SHARE * 100.0,
                    outlook.frequency_score,
                    format!("{} matches in the last {TREND_WINDOW_MONTHS} months", outlook.matches),
                ),
            ];
            scored.push(ScoredCandidate::new(
                supplier_id,
                outlook.score,
                format!("Recent buyer feedback is {direction} in this category"),
                factors,
                RECOMMENDED_THRESHOLD,
            ));
        }

        rank_descending(&mut scored, |candidate| (candidate.score, &candidate.supplier_id));
        scored.truncate(limit);
        Ok(scored)
    }
}
