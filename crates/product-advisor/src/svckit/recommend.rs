//! Recommendation Tool
//!
//! Scores candidates on rating, priority features, fit for the usage purpose
//! and brand, then returns the best ones with a short reason each.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use super::{count_arg, list_arg, price_arg, to_items};
use crate::catalog::{ProductCatalog, ProductFilter};
use crate::model::{Category, Product, Recommendation, UsagePurpose};

pub const NAME: &str = "recommend";

const RATING_WEIGHT: f32 = 20.0;
const FEATURE_WEIGHT: f32 = 40.0;
const PURPOSE_WEIGHT: f32 = 20.0;
const BRAND_WEIGHT: f32 = 20.0;

/// Brands with a strong after-sales reputation in Vietnam
const REPUTABLE_BRANDS: [&str; 5] = ["apple", "dell", "samsung", "lenovo", "asus"];

/// Candidate pool considered before scoring
const CANDIDATE_POOL: usize = 50;

/// Tool for personalised recommendations
pub struct RecommendTool {
    catalog: Arc<dyn ProductCatalog>,
}

impl RecommendTool {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[derive(Debug)]
struct Criteria {
    usage: UsagePurpose,
    brand_preference: Option<String>,
    priority_features: Vec<String>,
    must_have: Vec<String>,
}

fn mentions(product: &Product, term: &str) -> bool {
    let term = term.to_lowercase();
    product.features.iter().any(|f| f.to_lowercase().contains(&term))
        || product.description.to_lowercase().contains(&term)
}

#[allow(clippy::cast_precision_loss)]
fn score(product: &Product, criteria: &Criteria) -> (f32, Vec<String>) {
    let mut reasons = Vec::new();

    let rating = (product.rating / 5.0).clamp(0.0, 1.0) * RATING_WEIGHT;
    if product.rating >= 4.5 {
        reasons.push(format!("đánh giá cao {:.1}★", product.rating));
    }

    let features = if criteria.priority_features.is_empty() {
        FEATURE_WEIGHT / 2.0
    } else {
        let hits: Vec<&String> = criteria
            .priority_features
            .iter()
            .filter(|f| mentions(product, f))
            .collect();
        if !hits.is_empty() {
            reasons.push(format!(
                "đáp ứng {}",
                hits.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            ));
        }
        FEATURE_WEIGHT * hits.len() as f32 / criteria.priority_features.len() as f32
    };

    let purpose_terms = criteria.usage.keywords();
    let purpose = if purpose_terms.is_empty() {
        PURPOSE_WEIGHT / 2.0
    } else {
        let hits = purpose_terms.iter().filter(|k| mentions(product, k)).count();
        if hits > 0 {
            reasons.push(format!("phù hợp {}", criteria.usage.label()));
        }
        PURPOSE_WEIGHT * hits.min(2) as f32 / 2.0
    };

    let brand = product.brand.to_lowercase();
    let brand_score = match &criteria.brand_preference {
        Some(wanted) if wanted.eq_ignore_ascii_case(&product.brand) => {
            reasons.push(format!("đúng thương hiệu {}", product.brand));
            BRAND_WEIGHT
        }
        _ if REPUTABLE_BRANDS.contains(&brand.as_str()) => BRAND_WEIGHT * 0.75,
        _ => BRAND_WEIGHT * 0.5,
    };

    let total = (rating + features + purpose + brand_score).min(100.0);
    (total, reasons)
}

#[async_trait]
impl Tool for RecommendTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "Recommend products for a usage purpose, budget and feature priorities".into(),
            parameters: vec![
                ParameterSchema::new("usage", "string", "Usage purpose")
                    .one_of(&["gaming", "study", "work", "photography", "general"]),
                ParameterSchema::new("category", "string", "Product category")
                    .one_of(&["laptop", "smartphone"]),
                ParameterSchema::new("budget_min", "number", "Minimum budget in VND"),
                ParameterSchema::new("budget_max", "number", "Maximum budget in VND"),
                ParameterSchema::new("brand_preference", "string", "Preferred brand"),
                ParameterSchema::new("priority_features", "array", "Features that matter most"),
                ParameterSchema::new("must_have", "array", "Features that are mandatory"),
                ParameterSchema::new("top_k", "number", "Number of recommendations (1-10)"),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let criteria = Criteria {
            usage: call
                .str_arg("usage")
                .and_then(UsagePurpose::parse)
                .unwrap_or_default(),
            brand_preference: call
                .str_arg("brand_preference")
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            priority_features: list_arg(call, "priority_features"),
            must_have: list_arg(call, "must_have"),
        };
        let filter = ProductFilter {
            category: call.str_arg("category").and_then(Category::parse),
            brand: None,
            price_min: price_arg(call, "budget_min"),
            price_max: price_arg(call, "budget_max"),
        };
        let top_k = count_arg(call, "top_k", 3);

        let query = format!(
            "{} {}",
            criteria.usage.keywords().join(" "),
            criteria.priority_features.join(" ")
        );
        let candidates = self.catalog.search(&query, &filter, CANDIDATE_POOL).await?;

        let mut ranked: Vec<Recommendation> = candidates
            .into_iter()
            .filter(|p| criteria.must_have.iter().all(|m| mentions(p, m)))
            .map(|product| {
                let (score, reasons) = score(&product, &criteria);
                let reason = if reasons.is_empty() {
                    "lựa chọn cân bằng trong tầm giá".to_string()
                } else {
                    reasons.join("; ")
                };
                Recommendation {
                    product,
                    score,
                    reason,
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_k);

        tracing::debug!(tool = NAME, usage = ?criteria.usage, found = ranked.len(), "Recommendations scored");

        if ranked.is_empty() {
            return Ok(ToolResult::no_results(
                NAME,
                "Không có sản phẩm nào đáp ứng đủ tiêu chí",
            ));
        }
        Ok(ToolResult::found(NAME, to_items(&ranked)?))
    }
}
