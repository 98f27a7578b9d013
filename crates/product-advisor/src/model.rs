//! Domain Models
//!
//! Products, reviews and the structured payloads the advisor tools return.
//! Prices are VND and use `rust_decimal`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Product category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Laptop,
    Smartphone,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Laptop => "laptop",
            Category::Smartphone => "smartphone",
        }
    }

    /// Parse a category label, accepting common Vietnamese synonyms
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "laptop" | "notebook" | "máy tính xách tay" => Some(Category::Laptop),
            "smartphone" | "phone" | "điện thoại" | "dien thoai" => Some(Category::Smartphone),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the buyer mainly needs the product for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsagePurpose {
    Gaming,
    Study,
    Work,
    Photography,
    #[default]
    General,
}

impl UsagePurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            UsagePurpose::Gaming => "gaming",
            UsagePurpose::Study => "study",
            UsagePurpose::Work => "work",
            UsagePurpose::Photography => "photography",
            UsagePurpose::General => "general",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "gaming" | "game" | "chơi game" => Some(UsagePurpose::Gaming),
            "study" | "học tập" | "học" | "sinh viên" => Some(UsagePurpose::Study),
            "work" | "làm việc" | "văn phòng" => Some(UsagePurpose::Work),
            "photography" | "chụp ảnh" | "camera" => Some(UsagePurpose::Photography),
            "general" | "chung" => Some(UsagePurpose::General),
            _ => None,
        }
    }

    /// Catalog terms that indicate a good fit
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            UsagePurpose::Gaming => &["gaming", "card đồ họa", "hiệu năng cao", "tản nhiệt"],
            UsagePurpose::Study => &["học tập", "sinh viên", "pin lâu", "nhẹ"],
            UsagePurpose::Work => &["văn phòng", "làm việc", "doanh nhân", "bàn phím"],
            UsagePurpose::Photography => &["camera", "chụp ảnh", "màn hình đẹp"],
            UsagePurpose::General => &[],
        }
    }

    /// Vietnamese label
    pub fn label(self) -> &'static str {
        match self {
            UsagePurpose::Gaming => "chơi game",
            UsagePurpose::Study => "học tập",
            UsagePurpose::Work => "công việc",
            UsagePurpose::Photography => "chụp ảnh",
            UsagePurpose::General => "nhu cầu chung",
        }
    }
}

/// A catalog product
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub category: Category,

    /// Price in VND
    pub price: Decimal,

    /// Average rating, 0-5
    pub rating: f32,

    pub description: String,

    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default)]
    pub specs: BTreeMap<String, String>,
}

impl Product {
    /// One-line summary used in prompts and fallback answers
    pub fn headline(&self) -> String {
        format!(
            "{} ({}) - {} - {:.1}★",
            self.name,
            self.brand,
            format_vnd(self.price),
            self.rating
        )
    }
}

/// A single user review
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub product_id: String,
    pub author: String,

    /// 1-5 stars
    pub rating: u8,

    pub content: String,

    #[serde(default)]
    pub pros: Vec<String>,

    #[serde(default)]
    pub cons: Vec<String>,

    pub date: NaiveDate,

    /// Number of readers who found it helpful
    #[serde(default)]
    pub helpful: u32,
}

/// Review ordering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSort {
    #[default]
    Newest,
    Oldest,
    RatingHigh,
    RatingLow,
    Helpful,
}

impl ReviewSort {
    pub const ALL: [&'static str; 5] = ["newest", "oldest", "rating_high", "rating_low", "helpful"];

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewSort::Newest => "newest",
            ReviewSort::Oldest => "oldest",
            ReviewSort::RatingHigh => "rating_high",
            ReviewSort::RatingLow => "rating_low",
            ReviewSort::Helpful => "helpful",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "newest" => Some(ReviewSort::Newest),
            "oldest" => Some(ReviewSort::Oldest),
            "rating_high" => Some(ReviewSort::RatingHigh),
            "rating_low" => Some(ReviewSort::RatingLow),
            "helpful" => Some(ReviewSort::Helpful),
            _ => None,
        }
    }

    pub fn apply(self, reviews: &mut [Review]) {
        match self {
            ReviewSort::Newest => reviews.sort_by(|a, b| b.date.cmp(&a.date)),
            ReviewSort::Oldest => reviews.sort_by(|a, b| a.date.cmp(&b.date)),
            ReviewSort::RatingHigh => reviews.sort_by(|a, b| b.rating.cmp(&a.rating)),
            ReviewSort::RatingLow => reviews.sort_by(|a, b| a.rating.cmp(&b.rating)),
            ReviewSort::Helpful => reviews.sort_by(|a, b| b.helpful.cmp(&a.helpful)),
        }
    }
}

/// Output of the compare tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub products: Vec<Product>,
    pub aspects: Vec<String>,
    pub cheapest: String,
    pub best_rated: String,
}

/// One ranked recommendation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product: Product,

    /// Relevance score, 0-100
    pub score: f32,

    pub reason: String,
}

/// Output of the review tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewDigest {
    pub product_name: String,
    pub average_rating: f32,
    pub total_reviews: usize,
    pub reviews: Vec<Review>,
}

/// Format a VND amount as `15.990.000₫`
pub fn format_vnd(amount: Decimal) -> String {
    let whole = amount.round().to_i128().unwrap_or_default();
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-{grouped}₫")
    } else {
        format!("{grouped}₫")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_vnd() {
        assert_eq!(format_vnd(dec!(15990000)), "15.990.000₫");
        assert_eq!(format_vnd(dec!(999)), "999₫");
        assert_eq!(format_vnd(dec!(1000)), "1.000₫");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("Laptop"), Some(Category::Laptop));
        assert_eq!(Category::parse("điện thoại"), Some(Category::Smartphone));
        assert_eq!(Category::parse("tablet"), None);
    }

    #[test]
    fn test_usage_purpose_parse() {
        assert_eq!(UsagePurpose::parse("chơi game"), Some(UsagePurpose::Gaming));
        assert_eq!(UsagePurpose::parse("Photography"), Some(UsagePurpose::Photography));
        assert_eq!(UsagePurpose::parse("???"), None);
        assert!(UsagePurpose::General.keywords().is_empty());
    }
}
