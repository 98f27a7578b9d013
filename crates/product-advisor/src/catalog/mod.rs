//! Product Catalog
//!
//! Abstraction over the product/review search backend. The advisor only
//! needs ranked products for a query plus filters, name lookup and the
//! reviews of one product.

mod memory;

pub use memory::MemoryCatalog;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Category, Product, Review};

/// Hard filters applied to every search
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub brand: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if self.category.is_some_and(|c| c != product.category) {
            return false;
        }
        if let Some(brand) = &self.brand {
            if !product.brand.eq_ignore_ascii_case(brand.trim()) {
                return false;
            }
        }
        if self.price_min.is_some_and(|min| product.price < min) {
            return false;
        }
        if self.price_max.is_some_and(|max| product.price > max) {
            return false;
        }
        true
    }
}

/// Catalog backend (Strategy pattern)
///
/// Implement this for a vector index, a SQL store or the in-memory demo data.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Ranked products for `query`, best first, all matching `filter`
    async fn search(&self, query: &str, filter: &ProductFilter, top_k: usize)
        -> Result<Vec<Product>>;

    /// Best match for a product name, if any
    async fn find_by_name(&self, name: &str) -> Result<Option<Product>>;

    /// All reviews of one product
    async fn reviews(&self, product_id: &str) -> Result<Vec<Review>>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Backend name
    fn name(&self) -> &str;
}
