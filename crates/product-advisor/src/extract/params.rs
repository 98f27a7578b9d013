//! Structured tool parameters produced by extraction

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::json;

use agent_core::ToolCall;

use crate::model::{Category, ReviewSort, UsagePurpose};
use crate::prompts;
use crate::svckit::{compare, recommend, review, search};

/// Which parameters a turn needs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionKind {
    Search,
    Compare,
    Recommend,
    Review,
}

impl ExtractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionKind::Search => "search",
            ExtractionKind::Compare => "compare",
            ExtractionKind::Recommend => "recommend",
            ExtractionKind::Review => "review",
        }
    }

    /// Tool the parameters are meant for
    pub fn tool_name(self) -> &'static str {
        match self {
            ExtractionKind::Search => search::NAME,
            ExtractionKind::Compare => compare::NAME,
            ExtractionKind::Recommend => recommend::NAME,
            ExtractionKind::Review => review::NAME,
        }
    }

    pub(crate) fn template(self) -> &'static str {
        match self {
            ExtractionKind::Search => prompts::SEARCH_EXTRACTION,
            ExtractionKind::Compare => prompts::COMPARE_EXTRACTION,
            ExtractionKind::Recommend => prompts::RECOMMEND_EXTRACTION,
            ExtractionKind::Review => prompts::REVIEW_EXTRACTION,
        }
    }

    /// Whether the result depends on earlier entities
    pub fn uses_context(self) -> bool {
        matches!(self, ExtractionKind::Compare | ExtractionKind::Review)
    }
}

impl std::fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub category: Option<Category>,
    pub brand: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub top_k: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareParams {
    pub products: Vec<String>,
    pub aspects: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendParams {
    pub usage: UsagePurpose,
    pub category: Option<Category>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub brand_preference: Option<String>,
    pub priority_features: Vec<String>,
    pub must_have: Vec<String>,
    pub top_k: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewParams {
    pub product: String,
    pub sort_by: Option<ReviewSort>,
    pub min_rating: Option<u8>,
    pub limit: Option<usize>,
}

/// Parameters for one tool call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExtractedParams {
    Search(SearchParams),
    Compare(CompareParams),
    Recommend(RecommendParams),
    Review(ReviewParams),
}

fn money(value: Option<Decimal>) -> serde_json::Value {
    value
        .and_then(|d| d.round().to_i64())
        .map_or(serde_json::Value::Null, |v| json!(v))
}

fn text(value: Option<&String>) -> serde_json::Value {
    value.map_or(serde_json::Value::Null, |v| json!(v))
}

impl ExtractedParams {
    pub fn kind(&self) -> ExtractionKind {
        match self {
            ExtractedParams::Search(_) => ExtractionKind::Search,
            ExtractedParams::Compare(_) => ExtractionKind::Compare,
            ExtractedParams::Recommend(_) => ExtractionKind::Recommend,
            ExtractedParams::Review(_) => ExtractionKind::Review,
        }
    }

    /// Render as a call of the matching tool
    pub fn to_tool_call(&self) -> ToolCall {
        let call = ToolCall::new(self.kind().tool_name());
        match self {
            ExtractedParams::Search(p) => call
                .arg("query", json!(p.query))
                .arg("category", p.category.map_or(serde_json::Value::Null, |c| json!(c.as_str())))
                .arg("brand", text(p.brand.as_ref()))
                .arg("price_min", money(p.price_min))
                .arg("price_max", money(p.price_max))
                .arg("top_k", p.top_k.map_or(serde_json::Value::Null, |k| json!(k))),
            ExtractedParams::Compare(p) => {
                let call = call.arg("products", json!(p.products));
                if p.aspects.is_empty() {
                    call
                } else {
                    call.arg("aspects", json!(p.aspects))
                }
            }
            ExtractedParams::Recommend(p) => call
                .arg("usage", json!(p.usage.as_str()))
                .arg("category", p.category.map_or(serde_json::Value::Null, |c| json!(c.as_str())))
                .arg("budget_min", money(p.budget_min))
                .arg("budget_max", money(p.budget_max))
                .arg("brand_preference", text(p.brand_preference.as_ref()))
                .arg("priority_features", json!(p.priority_features))
                .arg("must_have", json!(p.must_have))
                .arg("top_k", p.top_k.map_or(serde_json::Value::Null, |k| json!(k))),
            ExtractedParams::Review(p) => call
                .arg("product", json!(p.product))
                .arg("sort_by", p.sort_by.map_or(serde_json::Value::Null, |s| json!(s.as_str())))
                .arg("min_rating", p.min_rating.map_or(serde_json::Value::Null, |r| json!(r)))
                .arg("limit", p.limit.map_or(serde_json::Value::Null, |l| json!(l))),
        }
    }
}
