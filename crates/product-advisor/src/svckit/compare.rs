//! Product Comparison Tool
//!
//! Looks up two or three products by name and reports them side by side.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use super::{list_arg, to_items};
use crate::catalog::ProductCatalog;
use crate::model::{Comparison, Product};

pub const NAME: &str = "compare";

/// Products a comparison may cover
pub const MIN_PRODUCTS: usize = 2;
pub const MAX_PRODUCTS: usize = 3;

const DEFAULT_ASPECTS: [&str; 4] = ["price", "rating", "features", "specs"];

/// Tool for comparing products
pub struct CompareTool {
    catalog: Arc<dyn ProductCatalog>,
}

impl CompareTool {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for CompareTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "Compare 2-3 products by name across price, rating, features and specs".into(),
            parameters: vec![
                ParameterSchema::new("products", "array", "Product names to compare").required(),
                ParameterSchema::new("aspects", "array", "Aspects to focus on"),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let names = list_arg(call, "products");
        if names.len() < MIN_PRODUCTS {
            return Ok(ToolResult::failure(
                NAME,
                format!("need at least {MIN_PRODUCTS} product names, got {}", names.len()),
            ));
        }

        let mut products: Vec<Product> = Vec::new();
        let mut missing = Vec::new();
        for name in names.iter().take(MAX_PRODUCTS) {
            match self.catalog.find_by_name(name).await? {
                Some(p) if products.iter().all(|known| known.id != p.id) => products.push(p),
                Some(_) => {}
                None => missing.push(name.clone()),
            }
        }

        // unknown names are an empty result, like a review of an unknown product
        if products.len() < MIN_PRODUCTS {
            return Ok(ToolResult::no_results(
                NAME,
                format!("Không đủ sản phẩm trong danh mục để so sánh, không tìm thấy: {}", missing.join(", ")),
            ));
        }

        let mut aspects = list_arg(call, "aspects");
        if aspects.is_empty() {
            aspects = DEFAULT_ASPECTS.iter().map(|a| (*a).to_string()).collect();
        }

        let cheapest = products
            .iter()
            .min_by(|a, b| a.price.cmp(&b.price))
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let best_rated = products
            .iter()
            .max_by(|a, b| a.rating.total_cmp(&b.rating))
            .map(|p| p.name.clone())
            .unwrap_or_default();

        tracing::debug!(tool = NAME, products = products.len(), missing = missing.len(), "Comparison built");

        let report = Comparison {
            products,
            aspects,
            cheapest,
            best_rated,
        };
        let mut result = ToolResult::found(NAME, to_items(&[report])?);
        if !missing.is_empty() {
            result = result.with_message(format!("Không tìm thấy: {}", missing.join(", ")));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use serde_json::json;

    fn tool() -> CompareTool {
        CompareTool::new(Arc::new(MemoryCatalog::new()))
    }

    #[tokio::test]
    async fn test_compare_two_products() {
        let call = ToolCall::new(NAME)
            .arg("products", json!(["Dell XPS 13 Plus", "MacBook Air M2"]));
        let result = tool().execute(&call).await.unwrap();
        assert!(result.success);
        let report: Comparison = serde_json::from_value(result.items[0].clone()).unwrap();
        assert_eq!(report.products.len(), 2);
        assert_eq!(report.cheapest, "MacBook Air M2");
        assert_eq!(report.best_rated, "MacBook Air M2");
        assert_eq!(report.aspects.len(), 4);
    }

    #[tokio::test]
    async fn test_compare_needs_two_names() {
        let one = ToolCall::new(NAME).arg("products", json!(["Dell XPS 13 Plus"]));
        assert!(!tool().execute(&one).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_unknown_products_are_empty() {
        let unknown = ToolCall::new(NAME).arg("products", json!(["Dell XPS 13 Plus", "Nokia 3310"]));
        let result = tool().execute(&unknown).await.unwrap();
        assert!(result.success && result.is_empty());
        assert!(result.message.unwrap().contains("Nokia 3310"));
    }

    #[tokio::test]
    async fn test_compare_caps_at_three() {
        let call = ToolCall::new(NAME).arg(
            "products",
            json!(["iPhone 15", "Samsung Galaxy S24", "OPPO Reno11 F", "Xiaomi Redmi Note 13"]),
        );
        let result = tool().execute(&call).await.unwrap();
        let report: Comparison = serde_json::from_value(result.items[0].clone()).unwrap();
        assert_eq!(report.products.len(), MAX_PRODUCTS);
    }
}
