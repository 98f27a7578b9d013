//! Service Kit - Advisor Tools
//!
//! Domain-specific tools that implement `agent_core::Tool` on top of a
//! [`ProductCatalog`](crate::catalog::ProductCatalog). Every tool returns its
//! typed payload serialized into `ToolResult::items`.

pub(crate) mod compare;
pub(crate) mod recommend;
pub(crate) mod review;
pub(crate) mod search;

pub use compare::CompareTool;
pub use recommend::RecommendTool;
pub use review::ReviewTool;
pub use search::SearchTool;

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use agent_core::{AgentError, Result as CoreResult, ToolCall, ToolRegistry};

use crate::catalog::ProductCatalog;

/// Upper bound for any result count
pub const MAX_RESULTS: usize = 10;

/// Registry with all four advisor tools over one catalog
pub fn registry(catalog: &Arc<dyn ProductCatalog>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(SearchTool::new(Arc::clone(catalog)));
    registry.register(CompareTool::new(Arc::clone(catalog)));
    registry.register(RecommendTool::new(Arc::clone(catalog)));
    registry.register(ReviewTool::new(Arc::clone(catalog)));
    registry
}

/// Price argument as VND
pub(crate) fn price_arg(call: &ToolCall, key: &str) -> Option<Decimal> {
    call.f64_arg(key)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .and_then(Decimal::from_f64)
        .map(|d| d.round())
}

/// Count argument clamped to `1..=MAX_RESULTS`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn count_arg(call: &ToolCall, key: &str, default: usize) -> usize {
    call.f64_arg(key)
        .filter(|v| v.is_finite())
        .map_or(default, |v| v.round().max(1.0) as usize)
        .clamp(1, MAX_RESULTS)
}

/// String list argument; a single comma-separated string is accepted
pub(crate) fn list_arg(call: &ToolCall, key: &str) -> Vec<String> {
    match call.arguments.get(key) {
        Some(serde_json::Value::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(serde_json::Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn to_items<T: serde::Serialize>(values: &[T]) -> CoreResult<Vec<serde_json::Value>> {
    values
        .iter()
        .map(|v| serde_json::to_value(v).map_err(AgentError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_argument_helpers() {
        let call = ToolCall::new("x")
            .arg("price_max", json!(20_000_000))
            .arg("top_k", json!(50))
            .arg("names", json!("Dell XPS, MacBook Air ,"));
        assert_eq!(price_arg(&call, "price_max"), Some(Decimal::from(20_000_000)));
        assert_eq!(count_arg(&call, "top_k", 5), MAX_RESULTS);
        assert_eq!(count_arg(&call, "missing", 5), 5);
        assert_eq!(list_arg(&call, "names"), vec!["Dell XPS", "MacBook Air"]);
    }

    #[test]
    fn test_registry_has_all_tools() {
        let catalog: Arc<dyn ProductCatalog> = Arc::new(crate::catalog::MemoryCatalog::new());
        let registry = registry(&catalog);
        assert_eq!(registry.names(), vec!["compare", "recommend", "review", "search"]);
    }
}
