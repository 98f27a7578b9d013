//! Rule-based extraction
//!
//! Deterministic slicing of the user's text into tool parameters, used when
//! the model path is unavailable or returns something unusable. It never
//! fails: the worst case is a plain query built from the whole input.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::params::{
    CompareParams, ExtractedParams, ExtractionKind, RecommendParams, ReviewParams, SearchParams,
};
use crate::keywords::{Tokens, normalize};
use crate::model::{Category, ReviewSort, UsagePurpose};
use crate::svckit::MAX_RESULTS;

const NUM: &str = r"(\d+(?:[.,]\d+)*)";
const UNIT: &str = r"(?:\s*(triệu|tr|nghìn|ngàn|k|đồng|vnđ|vnd|đ)\b)?";

fn pattern(template: &str) -> Regex {
    Regex::new(&template.replace("{num}", NUM).replace("{unit}", UNIT)).expect("valid regex")
}

static PRICE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?:từ|between)?\s*{num}{unit}\s*(?:-|–|đến|tới|to|and)\s*{num}{unit}")
});
static PRICE_UNDER: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"\b(?:dưới|không quá|tối đa|under|below|less than|max)\s*{num}{unit}")
});
static PRICE_OVER: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"\b(?:trên|hơn|từ|tối thiểu|ít nhất|over|above|more than|min)\s*{num}{unit}")
});
static PRICE_AROUND: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"\b(?:khoảng|tầm|cỡ|around|about)\s*{num}{unit}")
});

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(?:tìm|show|top|cho xem|liệt kê)\s+(\d+)\b|\b(\d+)\s+(?:sản phẩm|mẫu|lựa chọn|chiếc|products|options)\b)")
        .expect("valid regex")
});

static COMPARE_SO_SANH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:so sánh|compare)\s+(?:giữa\s+|between\s+)?(.+?)\s+(?:và|với|vs\.?|versus|and|with)\s+(.+)$")
        .expect("valid regex")
});
static COMPARE_VS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+(?:vs\.?|versus)\s+(.+)$").expect("valid regex")
});
static COMPARE_KHAC_GI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+(?:khác gì so với|khác gì|có gì khác|hơn gì)\s+(.+)$")
        .expect("valid regex")
});

static REVIEW_AFTER_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:đánh giá|review|reviews|nhận xét|ý kiến)\s+(?:về\s+|của\s+|cho\s+|of\s+|for\s+|about\s+)?(.+)$")
        .expect("valid regex")
});
static REVIEW_BEFORE_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+(?:có tốt không|có ổn không|dùng có tốt không|thế nào|ra sao|is it good|any good)")
        .expect("valid regex")
});
static MIN_STARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:từ\s*)?([1-5])\s*(?:sao|stars?)\s*(?:trở lên|\+|or more)?").expect("valid regex")
});

/// Brand cue and canonical brand name
const BRANDS: [(&str, &str); 17] = [
    ("dell", "Dell"),
    ("apple", "Apple"),
    ("macbook", "Apple"),
    ("iphone", "Apple"),
    ("samsung", "Samsung"),
    ("galaxy", "Samsung"),
    ("asus", "ASUS"),
    ("rog", "ASUS"),
    ("lenovo", "Lenovo"),
    ("thinkpad", "Lenovo"),
    ("hp", "HP"),
    ("xiaomi", "Xiaomi"),
    ("redmi", "Xiaomi"),
    ("oppo", "OPPO"),
    ("acer", "Acer"),
    ("msi", "MSI"),
    ("sony", "Sony"),
];

const LAPTOP_CUES: [&str; 6] = ["laptop", "máy tính xách tay", "notebook", "macbook", "máy tính", "ultrabook"];
const PHONE_CUES: [&str; 6] = ["điện thoại", "smartphone", "phone", "iphone", "galaxy", "dế"];

const PURPOSE_CUES: [(UsagePurpose, &[&str]); 4] = [
    (UsagePurpose::Gaming, &["gaming", "game", "chơi game"]),
    (UsagePurpose::Study, &["học", "học tập", "sinh viên", "học sinh", "study", "student"]),
    (UsagePurpose::Work, &["làm việc", "văn phòng", "công việc", "lập trình", "work", "office"]),
    (UsagePurpose::Photography, &["chụp ảnh", "camera", "quay phim", "photo", "photography"]),
];

/// Cue and the catalog feature it asks for
const FEATURE_CUES: [(&str, &str); 10] = [
    ("pin", "pin lâu"),
    ("battery", "pin lâu"),
    ("nhẹ", "nhẹ"),
    ("mỏng", "nhẹ"),
    ("màn hình", "màn hình đẹp"),
    ("camera", "camera đẹp"),
    ("hiệu năng", "hiệu năng cao"),
    ("mạnh", "hiệu năng cao"),
    ("sạc nhanh", "sạc nhanh"),
    ("bàn phím", "bàn phím tốt"),
];

const MUST_HAVE_CUES: [(&str, &str); 4] = [
    ("ssd", "ssd"),
    ("cảm ứng", "touchscreen"),
    ("touchscreen", "touchscreen"),
    ("oled", "oled"),
];

const SORT_CUES: [(&str, ReviewSort); 8] = [
    ("mới nhất", ReviewSort::Newest),
    ("gần đây", ReviewSort::Newest),
    ("cũ nhất", ReviewSort::Oldest),
    ("tốt nhất", ReviewSort::RatingHigh),
    ("cao nhất", ReviewSort::RatingHigh),
    ("tệ nhất", ReviewSort::RatingLow),
    ("tiêu cực", ReviewSort::RatingLow),
    ("hữu ích", ReviewSort::Helpful),
];

/// Words trimmed from the ends of an extracted product name
const EDGE_STOP_WORDS: [&str; 22] = [
    "thế nào", "ra sao", "có tốt không", "có ổn không", "không", "nhé", "nhỉ", "ạ",
    "giúp mình", "giúp tôi", "cho mình", "cho tôi", "đi", "về", "của", "sản phẩm",
    "con", "chiếc", "cái", "mẫu", "please", "the",
];

/// Apply a price unit; bare numbers below 1000 read as millions
///
/// `None` when the scaled amount does not fit a `Decimal`.
fn scale(amount: Decimal, unit: Option<&str>) -> Option<Decimal> {
    match unit {
        Some("triệu" | "tr") => amount.checked_mul(dec!(1_000_000)),
        Some("nghìn" | "ngàn" | "k") => amount.checked_mul(dec!(1_000)),
        Some(_) => Some(amount),
        None if amount < dec!(1000) => amount.checked_mul(dec!(1_000_000)),
        None => Some(amount),
    }
}

/// "1.000" and "20,000,000" are grouped integers, "1,5" and "1.5" decimals
fn parse_amount(raw: &str) -> Option<Decimal> {
    let grouped = raw.split(['.', ',']).skip(1).all(|g| g.len() == 3) && raw.contains(['.', ',']);
    if grouped {
        raw.replace(['.', ','], "").parse().ok()
    } else {
        raw.replace(',', ".").parse().ok()
    }
}

fn amount_at(caps: &Captures<'_>, num: usize, unit: usize) -> Option<Decimal> {
    let amount = parse_amount(caps.get(num)?.as_str())?;
    scale(amount, caps.get(unit).map(|m| m.as_str())).map(|a| a.round())
}

/// Price bounds mentioned in the text
pub fn price_range(text: &str) -> (Option<Decimal>, Option<Decimal>) {
    let text = text.to_lowercase();

    if let Some(caps) = PRICE_RANGE.captures(&text) {
        // "từ 10-15 triệu": the unit after the upper bound covers both
        let upper_unit = caps.get(4).map(|m| m.as_str());
        let lower = parse_amount(caps.get(1).map_or("", |m| m.as_str()))
            .and_then(|a| scale(a, caps.get(2).map(|m| m.as_str()).or(upper_unit)))
            .map(|a| a.round());
        let upper = amount_at(&caps, 3, 4);
        if let (Some(lower), Some(upper)) = (lower, upper) {
            return (Some(lower.min(upper)), Some(lower.max(upper)));
        }
    }

    if let Some(caps) = PRICE_AROUND.captures(&text) {
        if let Some(center) = amount_at(&caps, 1, 2) {
            return (
                center.checked_mul(dec!(0.8)).map(|a| a.round()),
                center.checked_mul(dec!(1.2)).map(|a| a.round()),
            );
        }
    }

    let max = PRICE_UNDER.captures(&text).and_then(|c| amount_at(&c, 1, 2));
    let min = PRICE_OVER.captures(&text).and_then(|c| amount_at(&c, 1, 2));
    (min, max)
}

pub fn category(tokens: &Tokens) -> Option<Category> {
    if PHONE_CUES.iter().any(|c| tokens.contains_phrase(c)) {
        Some(Category::Smartphone)
    } else if LAPTOP_CUES.iter().any(|c| tokens.contains_phrase(c)) {
        Some(Category::Laptop)
    } else {
        None
    }
}

pub fn brand(tokens: &Tokens) -> Option<String> {
    BRANDS
        .iter()
        .find(|(cue, _)| tokens.contains_phrase(cue))
        .map(|(_, name)| (*name).to_string())
}

/// Brand cue words present in the text, e.g. "iphone" or "dell"
pub fn brand_cues(tokens: &Tokens) -> impl Iterator<Item = &'static str> + '_ {
    BRANDS
        .iter()
        .map(|(cue, _)| *cue)
        .filter(|cue| tokens.contains_phrase(cue))
}

/// Requested result count, clamped to `1..=MAX_RESULTS`
pub fn quantity(text: &str) -> Option<usize> {
    let lower = text.to_lowercase();
    let tokens = Tokens::new(&lower);
    if tokens.contains_phrase("tất cả") || tokens.contains_phrase("all") {
        return Some(MAX_RESULTS);
    }
    if tokens.contains_phrase("một vài") || tokens.contains_phrase("vài") || tokens.contains_phrase("a few") {
        return Some(4);
    }
    QUANTITY
        .captures(&lower)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .map(|n| n.clamp(1, MAX_RESULTS))
}

fn trim_edges(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Trim punctuation and filler words from both ends of a name
fn clean_name(raw: &str) -> String {
    let mut name = trim_edges(raw);
    'strip: loop {
        let lower = name.to_lowercase();
        for stop in EDGE_STOP_WORDS {
            let rest = if lower == stop {
                Some("")
            } else if lower.ends_with(&format!(" {stop}")) {
                name.get(..name.len() - stop.len())
            } else if lower.starts_with(&format!("{stop} ")) {
                name.get(stop.len()..)
            } else {
                None
            };
            if let Some(rest) = rest {
                name = trim_edges(rest);
                continue 'strip;
            }
        }
        return name;
    }
}

/// Cut `text` where a lower-cased search found a match
fn cut_at(text: &mut String, lower_pos: usize) {
    if text.is_char_boundary(lower_pos) {
        text.truncate(lower_pos);
    }
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .flat_map(|part| part.split(" và ").collect::<Vec<_>>())
        .map(clean_name)
        .filter(|n| !n.is_empty())
        .collect()
}

/// Deterministic parameter extraction
#[derive(Clone, Copy, Debug, Default)]
pub struct FallbackExtractor;

impl FallbackExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, kind: ExtractionKind, input: &str) -> ExtractedParams {
        match kind {
            ExtractionKind::Search => ExtractedParams::Search(self.search(input)),
            ExtractionKind::Compare => ExtractedParams::Compare(self.compare(input)),
            ExtractionKind::Recommend => ExtractedParams::Recommend(self.recommend(input)),
            ExtractionKind::Review => ExtractedParams::Review(self.review(input)),
        }
    }

    pub fn search(&self, input: &str) -> SearchParams {
        let tokens = Tokens::new(input);
        let (price_min, price_max) = price_range(input);
        SearchParams {
            query: normalize(input),
            category: category(&tokens),
            brand: brand(&tokens),
            price_min,
            price_max,
            top_k: quantity(input),
        }
    }

    pub fn compare(&self, input: &str) -> CompareParams {
        let text = input.trim().trim_end_matches(['?', '!', '.']);
        let products = [&*COMPARE_SO_SANH, &*COMPARE_VS, &*COMPARE_KHAC_GI]
            .iter()
            .find_map(|re| re.captures(text))
            .map(|caps| {
                let mut names = split_names(caps.get(1).map_or("", |m| m.as_str()));
                names.extend(split_names(caps.get(2).map_or("", |m| m.as_str())));
                names
            })
            .unwrap_or_default();
        CompareParams {
            products,
            aspects: Vec::new(),
        }
    }

    pub fn recommend(&self, input: &str) -> RecommendParams {
        let tokens = Tokens::new(input);
        let (budget_min, budget_max) = price_range(input);
        let usage = PURPOSE_CUES
            .iter()
            .find(|(_, cues)| cues.iter().any(|c| tokens.contains_phrase(c)))
            .map(|(purpose, _)| *purpose)
            .unwrap_or_default();

        let mut priority_features: Vec<String> = Vec::new();
        for (cue, feature) in FEATURE_CUES {
            if tokens.contains_phrase(cue) && !priority_features.iter().any(|f| f == feature) {
                priority_features.push(feature.to_string());
            }
        }
        let mut must_have: Vec<String> = Vec::new();
        for (cue, feature) in MUST_HAVE_CUES {
            if tokens.contains_phrase(cue) && !must_have.iter().any(|f| f == feature) {
                must_have.push(feature.to_string());
            }
        }

        RecommendParams {
            usage,
            category: category(&tokens),
            budget_min,
            budget_max,
            brand_preference: brand(&tokens),
            priority_features,
            must_have,
            top_k: quantity(input),
        }
    }

    pub fn review(&self, input: &str) -> ReviewParams {
        let text = input.trim().trim_end_matches(['?', '!', '.']);
        let tokens = Tokens::new(text);

        let sort_by = SORT_CUES
            .iter()
            .find(|(cue, _)| tokens.contains_phrase(cue))
            .map(|(_, sort)| *sort);
        let min_rating = MIN_STARS
            .captures(&text.to_lowercase())
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());

        let mut subject = [&*REVIEW_AFTER_CUE, &*REVIEW_BEFORE_CUE]
            .iter()
            .find_map(|re| re.captures(text))
            .and_then(|c| c.get(1))
            .map_or_else(|| text.to_string(), |m| m.as_str().to_string());
        // drop sort and rating phrases that trail the product name
        for (cue, _) in SORT_CUES {
            if let Some(pos) = subject.to_lowercase().find(cue) {
                cut_at(&mut subject, pos);
            }
        }
        if let Some(m) = MIN_STARS.find(&subject.to_lowercase()) {
            cut_at(&mut subject, m.start());
        }

        ReviewParams {
            product: clean_name(&subject),
            sort_by,
            min_rating,
            limit: quantity(input),
        }
    }
}
