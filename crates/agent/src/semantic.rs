//! LLM-backed semantic matching
//!
//! Renders the RFQ and the supplier pool into a prompt, asks the model for a scored list
//! and normalises whatever comes back. The model is only trusted for scores and prose:
//! supplier ids are checked against the pool, scores are clamped and the recommended
//! flag is recomputed locally.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use procura_core::domain::recommendation::{
    rank_descending, ScoreFactor, ScoredCandidate, RECOMMENDED_THRESHOLD,
};
use procura_core::domain::rfq::Rfq;
use procura_core::domain::supplier::Supplier;
use procura_core::matching::{MatchContext, ScoringStrategy, StrategyKind, StrategyResult};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tracing::{info, warn};

use crate::llm::LlmClient;

const PROMPT_TEMPLATE: &str = "semantic_match.txt.tera";

#[derive(Serialize)]
struct PromptRfq<'a> {
    title: &'a str,
    category: &'a str,
    description: &'a str,
    quantity: Option<u32>,
    budget: Option<String>,
    deadline: Option<String>,
    location: Option<&'a str>,
}

#[derive(Serialize)]
struct PromptSupplier<'a> {
    id: &'a str,
    company_name: &'a str,
    categories: String,
    location: &'a str,
    verified: bool,
    description: &'a str,
    metrics: Option<String>,
    preferred_categories: Option<String>,
}

impl<'a> PromptRfq<'a> {
    fn from_rfq(rfq: &'a Rfq) -> Self {
        Self {
            title: &rfq.title,
            category: &rfq.category,
            description: &rfq.description,
            quantity: rfq.quantity,
            budget: rfq.budget.map(|budget| budget.to_string()),
            deadline: rfq.deadline.map(|deadline| deadline.date_naive().to_string()),
            location: rfq.location.as_deref(),
        }
    }
}

impl<'a> PromptSupplier<'a> {
    fn from_supplier(supplier: &'a Supplier) -> Self {
        let metrics = supplier.metrics.as_ref().map(|metrics| {
            let mut parts = Vec::new();
            if let Some(hours) = metrics.response_time_hours {
                parts.push(format!("responds in {hours}h"));
            }
            if let Some(rate) = metrics.acceptance_rate {
                parts.push(format!("{rate}% acceptance"));
            }
            if let Some(rate) = metrics.on_time_delivery {
                parts.push(format!("{rate}% on-time delivery"));
            }
            if let Some(rating) = metrics.quality_rating {
                parts.push(format!("quality {rating}/5"));
            }
            parts.push(format!("{} similar requests", metrics.similar_request_count));
            parts.join(", ")
        });
        let preferred_categories = supplier
            .attributes
            .as_ref()
            .filter(|attributes| !attributes.preferred_categories.is_empty())
            .map(|attributes| attributes.preferred_categories.join(", "));

        Self {
            id: supplier.id.as_str(),
            company_name: &supplier.company_name,
            categories: supplier.categories.join(", "),
            location: &supplier.location,
            verified: supplier.verified,
            description: &supplier.description,
            metrics,
            preferred_categories,
        }
    }
}

/// Renders the semantic matching prompt.
pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(
            PROMPT_TEMPLATE,
            include_str!("../../../templates/prompts/semantic_match.txt.tera"),
        )
        .context("failed to load semantic match prompt template")?;
        Ok(Self { tera })
    }

    pub fn render(&self, context: &MatchContext, limit: usize) -> Result<String> {
        let suppliers: Vec<PromptSupplier<'_>> =
            context.suppliers.iter().map(PromptSupplier::from_supplier).collect();

        let mut template_context = Context::new();
        template_context.insert("rfq", &PromptRfq::from_rfq(&context.rfq));
        template_context.insert("suppliers", &suppliers);
        template_context.insert("limit", &limit);

        self.tera
            .render(PROMPT_TEMPLATE, &template_context)
            .context("failed to render semantic match prompt")
    }
}

#[derive(Debug, Deserialize)]
struct SemanticResponse {
    #[serde(default)]
    matches: Vec<SemanticMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SemanticMatch {
    supplier_id: String,
    score: f64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    factors: Vec<SemanticFactor>,
}

#[derive(Debug, Deserialize)]
struct SemanticFactor {
    name: String,
    #[serde(default)]
    weight: f64,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    explanation: String,
}

/// Strips markdown fences and surrounding prose, keeping the outermost JSON object.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Turns a raw model reply into candidates restricted to the supplier pool.
pub fn parse_response(
    raw: &str,
    suppliers: &[Supplier],
    limit: usize,
) -> Result<Vec<ScoredCandidate>> {
    let json = extract_json(raw).ok_or_else(|| anyhow!("LLM reply contained no JSON object"))?;
    let response: SemanticResponse =
        serde_json::from_str(json).context("LLM reply did not match the expected shape")?;

    let mut seen = HashSet::new();
    let mut candidates: Vec<ScoredCandidate> = response
        .matches
        .into_iter()
        .filter_map(|entry| {
            let supplier = suppliers.iter().find(|supplier| supplier.id.as_str() == entry.supplier_id)?;
            if !seen.insert(supplier.id.clone()) {
                return None;
            }

            let factors = entry
                .factors
                .into_iter()
                .map(|factor| {
                    ScoreFactor::new(
                        factor.name,
                        clamp_score(factor.weight),
                        clamp_score(factor.score),
                        factor.explanation,
                    )
                })
                .collect();
            let reason = if entry.reason.trim().is_empty() {
                "Semantic fit assessed by AI".to_string()
            } else {
                entry.reason
            };

            Some(ScoredCandidate::new(
                supplier.id.clone(),
                clamp_score(entry.score),
                reason,
                factors,
                RECOMMENDED_THRESHOLD,
            ))
        })
        .collect();

    rank_descending(&mut candidates, |candidate| (candidate.score, &candidate.supplier_id));
    candidates.truncate(limit);
    Ok(candidates)
}

/// Scores suppliers by asking an LLM to judge semantic fit with the RFQ.
pub struct SemanticMatcher {
    client: Arc<dyn LlmClient>,
    prompt: PromptRenderer,
}

impl SemanticMatcher {
    pub fn new(client: Arc<dyn LlmClient>) -> Result<Self> {
        Ok(Self { client, prompt: PromptRenderer::new()? })
    }

    async fn try_score(&self, context: &MatchContext, limit: usize) -> Result<Vec<ScoredCandidate>> {
        let prompt = self.prompt.render(context, limit)?;
        let reply = self.client.complete(&prompt).await?;
        parse_response(&reply, &context.suppliers, limit)
    }
}

#[async_trait]
impl ScoringStrategy for SemanticMatcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AiSemantic
    }

    async fn score(&self, context: &MatchContext, limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
        match self.try_score(context, limit).await {
            Ok(candidates) => {
                info!(
                    event_name = "matching.semantic.scored",
                    rfq_id = %context.rfq.id,
                    candidates = candidates.len(),
                    "semantic matching completed"
                );
                Ok(candidates)
            }
            Err(error) => {
                warn!(
                    event_name = "matching.semantic.degraded",
                    rfq_id = %context.rfq.id,
                    error = %format!("{error:#}"),
                    "semantic matching unavailable, contributing no results"
                );
                Ok(Vec::new())
            }
        }
    }
}
