//! Product Search Tool
//!
//! Ranked catalog search with category, brand and price filters.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use super::{count_arg, price_arg, to_items};
use crate::catalog::{ProductCatalog, ProductFilter};
use crate::model::Category;

pub const NAME: &str = "search";

/// Tool for searching the catalog
pub struct SearchTool {
    catalog: Arc<dyn ProductCatalog>,
}

impl SearchTool {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "Search products by free text with optional category, brand and price filters".into(),
            parameters: vec![
                ParameterSchema::new("query", "string", "Search text").required(),
                ParameterSchema::new("category", "string", "Product category")
                    .one_of(&["laptop", "smartphone"]),
                ParameterSchema::new("brand", "string", "Brand filter"),
                ParameterSchema::new("price_min", "number", "Minimum price in VND"),
                ParameterSchema::new("price_max", "number", "Maximum price in VND"),
                ParameterSchema::new("top_k", "number", "Number of results (1-10)"),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let query = call.str_arg("query").unwrap_or_default().trim();
        let filter = ProductFilter {
            category: call.str_arg("category").and_then(Category::parse),
            brand: call
                .str_arg("brand")
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            price_min: price_arg(call, "price_min"),
            price_max: price_arg(call, "price_max"),
        };
        let top_k = count_arg(call, "top_k", 5);

        if let (Some(min), Some(max)) = (filter.price_min, filter.price_max) {
            if min > max {
                return Ok(ToolResult::failure(NAME, "price_min is greater than price_max"));
            }
        }

        let products = self.catalog.search(query, &filter, top_k).await?;
        tracing::debug!(tool = NAME, found = products.len(), "Search finished");

        if products.is_empty() {
            return Ok(ToolResult::no_results(
                NAME,
                "Không tìm thấy sản phẩm phù hợp với tiêu chí",
            ));
        }

        let message = format!("Tìm thấy {} sản phẩm", products.len());
        Ok(ToolResult::found(NAME, to_items(&products)?).with_message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::model::Product;
    use serde_json::json;

    fn tool() -> SearchTool {
        SearchTool::new(Arc::new(MemoryCatalog::new()))
    }

    #[tokio::test]
    async fn test_search_with_brand_and_ceiling() {
        let call = ToolCall::new(NAME)
            .arg("query", json!("laptop dell"))
            .arg("category", json!("laptop"))
            .arg("brand", json!("Dell"))
            .arg("price_max", json!(20_000_000));
        let result = tool().execute(&call).await.unwrap();
        assert!(result.success);
        let products: Vec<Product> = result
            .items
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        assert_eq!(products.len(), 2);
        assert!(products.iter().all(|p| p.brand == "Dell"));
    }

    #[tokio::test]
    async fn test_impossible_ceiling_is_empty_success() {
        let call = ToolCall::new(NAME)
            .arg("query", json!("laptop"))
            .arg("price_max", json!(1000));
        let result = tool().execute(&call).await.unwrap();
        assert!(result.success);
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_inverted_price_range_fails() {
        let call = ToolCall::new(NAME)
            .arg("query", json!("laptop"))
            .arg("price_min", json!(30_000_000))
            .arg("price_max", json!(10_000_000));
        let result = tool().execute(&call).await.unwrap();
        assert!(!result.success);
    }
}
