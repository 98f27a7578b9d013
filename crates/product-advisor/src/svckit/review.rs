//! Review Tool
//!
//! Digest of user reviews for one product: sorted, optionally filtered by
//! rating, with the average over all reviews.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use super::{count_arg, to_items};
use crate::catalog::ProductCatalog;
use crate::model::{ReviewDigest, ReviewSort};

pub const NAME: &str = "review";

/// Tool for summarising reviews
pub struct ReviewTool {
    catalog: Arc<dyn ProductCatalog>,
}

impl ReviewTool {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for ReviewTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "Fetch and summarise user reviews of one product".into(),
            parameters: vec![
                ParameterSchema::new("product", "string", "Product name").required(),
                ParameterSchema::new("sort_by", "string", "Review ordering").one_of(&ReviewSort::ALL),
                ParameterSchema::new("min_rating", "number", "Lowest star rating to include (1-5)"),
                ParameterSchema::new("limit", "number", "Number of reviews (1-10)"),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let name = call.str_arg("product").unwrap_or_default().trim();
        let Some(product) = self.catalog.find_by_name(name).await? else {
            return Ok(ToolResult::no_results(
                NAME,
                format!("Không tìm thấy sản phẩm \"{name}\""),
            ));
        };

        let all = self.catalog.reviews(&product.id).await?;
        if all.is_empty() {
            return Ok(ToolResult::no_results(
                NAME,
                format!("{} chưa có đánh giá nào", product.name),
            ));
        }

        #[allow(clippy::cast_precision_loss)]
        let average_rating =
            all.iter().map(|r| f32::from(r.rating)).sum::<f32>() / all.len() as f32;
        let total_reviews = all.len();

        let min_rating = call.f64_arg("min_rating").unwrap_or(0.0);
        let sort = call
            .str_arg("sort_by")
            .and_then(ReviewSort::parse)
            .unwrap_or_default();
        let limit = count_arg(call, "limit", 5);

        let mut reviews: Vec<_> = all
            .into_iter()
            .filter(|r| f64::from(r.rating) >= min_rating)
            .collect();
        sort.apply(&mut reviews);
        reviews.truncate(limit);

        tracing::debug!(tool = NAME, product = %product.name, shown = reviews.len(), "Review digest built");

        let digest = ReviewDigest {
            product_name: product.name,
            average_rating,
            total_reviews,
            reviews,
        };
        Ok(ToolResult::found(NAME, to_items(&[digest])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use serde_json::json;

    fn tool() -> ReviewTool {
        ReviewTool::new(Arc::new(MemoryCatalog::new()))
    }

    async fn digest(call: ToolCall) -> ReviewDigest {
        let result = tool().execute(&call).await.unwrap();
        assert!(result.success);
        serde_json::from_value(result.items[0].clone()).unwrap()
    }

    #[tokio::test]
    async fn test_digest_sorted_newest_first() {
        let d = digest(ToolCall::new(NAME).arg("product", json!("Dell Inspiron 15 3520"))).await;
        assert_eq!(d.total_reviews, 3);
        assert!((d.average_rating - 4.0).abs() < 1e-6);
        assert!(d.reviews.windows(2).all(|w| w[0].date >= w[1].date));
    }

    #[tokio::test]
    async fn test_rating_filter_and_limit() {
        let d = digest(
            ToolCall::new(NAME)
                .arg("product", json!("inspiron"))
                .arg("min_rating", json!(4))
                .arg("sort_by", json!("helpful"))
                .arg("limit", json!(1)),
        )
        .await;
        assert_eq!(d.reviews.len(), 1);
        assert_eq!(d.reviews[0].helpful, 14);
        // the average still covers every review
        assert_eq!(d.total_reviews, 3);
    }

    #[tokio::test]
    async fn test_unknown_or_unreviewed_product_is_empty() {
        let unknown = tool()
            .execute(&ToolCall::new(NAME).arg("product", json!("Nokia 3310")))
            .await
            .unwrap();
        assert!(unknown.success && unknown.is_empty());

        let unreviewed = tool()
            .execute(&ToolCall::new(NAME).arg("product", json!("OPPO Reno11 F")))
            .await
            .unwrap();
        assert!(unreviewed.success && unreviewed.is_empty());
    }
}
