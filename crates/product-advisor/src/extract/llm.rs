//! Validation of model-produced extraction JSON
//!
//! Model output is untrusted text. It must contain one JSON object whose
//! required fields are present, numeric fields parse as numbers and enum
//! fields hold allowed values. Anything else is rejected as a whole.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::{Map, Value};

use super::params::{
    CompareParams, ExtractedParams, ExtractionKind, RecommendParams, ReviewParams, SearchParams,
};
use crate::model::{Category, ReviewSort, UsagePurpose};
use crate::svckit::MAX_RESULTS;

pub type Validation<T> = std::result::Result<T, String>;

/// Cut the JSON object out of a reply that may carry fences or chatter
pub fn json_object(raw: &str) -> Validation<Map<String, Value>> {
    let start = raw.find('{').ok_or("no JSON object in reply")?;
    let end = raw.rfind('}').ok_or("unterminated JSON object")?;
    if end < start {
        return Err("unterminated JSON object".into());
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("reply is not a JSON object".into()),
        Err(e) => Err(format!("malformed JSON: {e}")),
    }
}

struct Fields<'a>(&'a Map<String, Value>);

impl Fields<'_> {
    fn present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn opt_str(&self, key: &str) -> Validation<Option<String>> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(other) => Err(format!("field '{key}' must be a string, got {other}")),
        }
    }

    fn req_str(&self, key: &str) -> Validation<String> {
        self.opt_str(key)?
            .ok_or_else(|| format!("missing required field '{key}'"))
    }

    fn opt_number(&self, key: &str) -> Validation<Option<f64>> {
        let number = match self.present(key) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().replace(['_', ' '], "").parse().ok(),
            Some(_) => None,
        };
        match number {
            Some(n) if n.is_finite() && n >= 0.0 => Ok(Some(n)),
            _ => Err(format!("field '{key}' is not a non-negative number")),
        }
    }

    fn opt_price(&self, key: &str) -> Validation<Option<Decimal>> {
        self.opt_number(key)?
            .map(|n| {
                Decimal::from_f64(n)
                    .map(|d| d.round())
                    .ok_or_else(|| format!("field '{key}' is out of range"))
            })
            .transpose()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn opt_count(&self, key: &str) -> Validation<Option<usize>> {
        Ok(self
            .opt_number(key)?
            .map(|n| (n.round() as usize).clamp(1, MAX_RESULTS)))
    }

    fn opt_enum<T>(&self, key: &str, parse: impl Fn(&str) -> Option<T>) -> Validation<Option<T>> {
        match self.opt_str(key)? {
            None => Ok(None),
            Some(label) => parse(&label)
                .map(Some)
                .ok_or_else(|| format!("field '{key}' has unsupported value '{label}'")),
        }
    }

    fn str_list(&self, key: &str) -> Validation<Vec<String>> {
        match self.present(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| match v {
                    Value::String(s) => Ok(s.trim().to_string()),
                    other => Err(format!("field '{key}' must hold strings, got {other}")),
                })
                .filter(|r| r.as_ref().map_or(true, |s| !s.is_empty()))
                .collect(),
            Some(other) => Err(format!("field '{key}' must be an array, got {other}")),
        }
    }
}

fn search(f: &Fields<'_>) -> Validation<SearchParams> {
    let params = SearchParams {
        query: f.req_str("query")?,
        category: f.opt_enum("category", Category::parse)?,
        brand: f.opt_str("brand")?,
        price_min: f.opt_price("price_min")?,
        price_max: f.opt_price("price_max")?,
        top_k: f.opt_count("top_k")?,
    };
    if let (Some(min), Some(max)) = (params.price_min, params.price_max) {
        if min > max {
            return Err("price_min is greater than price_max".into());
        }
    }
    Ok(params)
}

fn compare(f: &Fields<'_>) -> Validation<CompareParams> {
    if f.present("products").is_none() {
        return Err("missing required field 'products'".into());
    }
    Ok(CompareParams {
        products: f.str_list("products")?,
        aspects: f.str_list("aspects")?,
    })
}

fn recommend(f: &Fields<'_>) -> Validation<RecommendParams> {
    Ok(RecommendParams {
        usage: f.opt_enum("usage", UsagePurpose::parse)?.unwrap_or_default(),
        category: f.opt_enum("category", Category::parse)?,
        budget_min: f.opt_price("budget_min")?,
        budget_max: f.opt_price("budget_max")?,
        brand_preference: f.opt_str("brand_preference")?,
        priority_features: f.str_list("priority_features")?,
        must_have: f.str_list("must_have")?,
        top_k: f.opt_count("top_k")?,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn review(f: &Fields<'_>) -> Validation<ReviewParams> {
    let min_rating = match f.opt_number("min_rating")? {
        Some(r) if (0.0..=5.0).contains(&r) => Some(r.round() as u8),
        Some(r) => return Err(format!("min_rating {r} is outside 0-5")),
        None => None,
    };
    Ok(ReviewParams {
        product: f.req_str("product")?,
        sort_by: f.opt_enum("sort_by", ReviewSort::parse)?,
        min_rating,
        limit: f.opt_count("limit")?,
    })
}

/// Parse and validate a model reply for `kind`
pub fn parse_reply(kind: ExtractionKind, raw: &str) -> Validation<ExtractedParams> {
    let map = json_object(raw)?;
    let fields = Fields(&map);
    Ok(match kind {
        ExtractionKind::Search => ExtractedParams::Search(search(&fields)?),
        ExtractionKind::Compare => ExtractedParams::Compare(compare(&fields)?),
        ExtractionKind::Recommend => ExtractedParams::Recommend(recommend(&fields)?),
        ExtractionKind::Review => ExtractedParams::Review(review(&fields)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fenced_reply_is_accepted() {
        let raw = "Đây là kết quả:\n```json\n{\"query\": \"laptop dell\", \"brand\": \"Dell\", \"price_max\": 20000000, \"category\": \"laptop\"}\n```";
        let Ok(ExtractedParams::Search(p)) = parse_reply(ExtractionKind::Search, raw) else {
            panic!("expected search params");
        };
        assert_eq!(p.brand.as_deref(), Some("Dell"));
        assert_eq!(p.price_max, Some(dec!(20000000)));
        assert_eq!(p.category, Some(Category::Laptop));
    }

    #[test]
    fn test_numeric_strings_parse() {
        let raw = r#"{"query": "điện thoại", "price_max": "5000000", "top_k": "30"}"#;
        let Ok(ExtractedParams::Search(p)) = parse_reply(ExtractionKind::Search, raw) else {
            panic!("expected search params");
        };
        assert_eq!(p.price_max, Some(dec!(5000000)));
        assert_eq!(p.top_k, Some(MAX_RESULTS));
    }

    #[test]
    fn test_invalid_replies_are_rejected() {
        for (kind, raw) in [
            (ExtractionKind::Search, "tôi không hiểu"),
            (ExtractionKind::Search, r#"{"brand": "Dell"}"#),
            (ExtractionKind::Search, r#"{"query": "x", "price_max": "rẻ"}"#),
            (ExtractionKind::Search, r#"{"query": "x", "category": "tablet"}"#),
            (ExtractionKind::Search, r#"{"query": "x", "price_min": 9, "price_max": 1}"#),
            (ExtractionKind::Compare, r#"{"aspects": []}"#),
            (ExtractionKind::Recommend, r#"{"usage": "cooking"}"#),
            (ExtractionKind::Review, r#"{"product": "iPhone 15", "min_rating": 9}"#),
            (ExtractionKind::Review, r#"["iPhone 15"]"#),
        ] {
            assert!(parse_reply(kind, raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_recommend_defaults() {
        let Ok(ExtractedParams::Recommend(p)) = parse_reply(ExtractionKind::Recommend, "{}") else {
            panic!("expected recommend params");
        };
        assert_eq!(p.usage, UsagePurpose::General);
        assert!(p.priority_features.is_empty());
    }
}
