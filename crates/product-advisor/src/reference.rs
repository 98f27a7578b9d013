//! Reference Resolution
//!
//! Maps "compare them", "so sánh 2 cái đầu" or "is it good" onto the entity
//! names of earlier turns. A heuristic: when nothing matches, when there are
//! too few earlier entities, or when the turn names products of its own, it
//! stays silent and normal classification runs.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::extract::{FallbackExtractor, brand_cues};
use crate::intent::Intent;
use crate::keywords::{KeywordTable, Tokens, normalize};
use crate::svckit::compare::{MAX_PRODUCTS, MIN_PRODUCTS};

/// Outcome of reference resolution
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Intent the reference implies, if confident
    pub hint: Option<Intent>,

    /// Entities the turn refers to
    pub entities: Vec<String>,
}

// "2 cái đầu", "hai sản phẩm đầu tiên"
static FIRST_N_VI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+|hai|ba|bốn|năm)\s+(?:(?:cái|sản phẩm|máy|mẫu|chiếc|con)\s+)?đầu\b")
        .expect("valid regex")
});

// "first two", "top 3"
static FIRST_N_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:first|top)\s+(\d+|two|three|four|five)\b")
        .expect("valid regex")
});

// "cái thứ hai", "sản phẩm thứ 3", "thứ ba"
static NTH_VI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:cái|sản phẩm|máy|mẫu|chiếc|con)\s+)?thứ\s+(\d+|nhất|hai|ba|tư|bốn|năm)\b")
        .expect("valid regex")
});

// "the second", "first one"
static NTH_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:the\s+(first|second|third|fourth|fifth)|(first|second|third|fourth|fifth)\s+(?:one|product|item))\b")
        .expect("valid regex")
});

fn number_word(word: &str) -> Option<usize> {
    match word {
        "một" | "nhất" | "one" | "first" => Some(1),
        "hai" | "two" | "second" => Some(2),
        "ba" | "three" | "third" => Some(3),
        "bốn" | "tư" | "four" | "fourth" => Some(4),
        "năm" | "five" | "fifth" => Some(5),
        other => other.parse().ok(),
    }
}

/// "the first N" selection, if the text asks for one
pub fn leading_count(text: &str) -> Option<usize> {
    let text = text.to_lowercase();
    [&*FIRST_N_VI, &*FIRST_N_EN]
        .iter()
        .find_map(|re| re.captures(&text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| number_word(m.as_str()))
        .filter(|n| *n > 0)
}

/// 1-based "the N-th one" selection, if the text asks for one
pub fn ordinal(text: &str) -> Option<usize> {
    let text = text.to_lowercase();
    if text.contains("đầu tiên") && leading_count(&text).is_none() {
        return Some(1);
    }
    [&*NTH_VI, &*NTH_EN]
        .iter()
        .find_map(|re| re.captures(&text))
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .and_then(|m| number_word(m.as_str()))
        .filter(|n| *n > 0)
}

/// Resolves references to entities of earlier turns
pub struct ReferenceResolver {
    keywords: Arc<KeywordTable>,
}

impl ReferenceResolver {
    pub fn new(keywords: Arc<KeywordTable>) -> Self {
        Self { keywords }
    }

    pub fn resolve(&self, input: &str, previous: &[String]) -> Resolution {
        if previous.is_empty() {
            return Resolution::default();
        }

        if self.names_own_products(input, previous) {
            return Resolution::default();
        }

        let tokens = Tokens::new(input);
        let kw = &self.keywords;
        let count = leading_count(input);
        let nth = ordinal(input);
        let points_back = tokens.contains_any(&kw.anaphora) || count.is_some() || nth.is_some();

        let wants_compare = (tokens.contains_any(&kw.compare) && points_back)
            || tokens.contains_any(&kw.compare_reference);
        if wants_compare && previous.len() >= MIN_PRODUCTS {
            let take = count
                .or_else(|| tokens.contains_any(&kw.pair).then_some(2))
                .unwrap_or(previous.len())
                .clamp(MIN_PRODUCTS, previous.len().min(MAX_PRODUCTS));
            let entities = previous[..take].to_vec();
            tracing::debug!(?entities, "Resolved comparison reference");
            return Resolution {
                hint: Some(Intent::Compare),
                entities,
            };
        }

        let wants_review = (tokens.contains_any(&kw.review) && points_back)
            || tokens.contains_any(&kw.review_reference);
        if wants_review {
            let index = nth
                .map(|n| n - 1)
                .filter(|i| *i < previous.len())
                .unwrap_or(0);
            let entities = vec![previous[index].clone()];
            tracing::debug!(?entities, "Resolved review reference");
            return Resolution {
                hint: Some(Intent::Review),
                entities,
            };
        }

        Resolution::default()
    }

    /// Whether a phrase points back at earlier entities instead of naming a product
    pub fn is_reference(&self, phrase: &str) -> bool {
        let tokens = Tokens::new(phrase);
        let kw = &self.keywords;
        tokens.contains_any(&kw.anaphora)
            || tokens.contains_any(&kw.compare_reference)
            || tokens.contains_any(&kw.review_reference)
            || leading_count(phrase).is_some()
            || ordinal(phrase).is_some()
    }

    /// A brand or a compared name that none of the earlier entities carry
    fn names_own_products(&self, input: &str, previous: &[String]) -> bool {
        let earlier: Vec<Tokens> = previous.iter().map(|p| Tokens::new(p)).collect();
        let tokens = Tokens::new(input);
        if brand_cues(&tokens).any(|cue| !earlier.iter().any(|e| e.contains_phrase(cue))) {
            return true;
        }

        FallbackExtractor::new()
            .compare(input)
            .products
            .iter()
            .filter(|name| !self.is_reference(name))
            .any(|name| !previous.iter().any(|p| same_product(p, name)))
    }
}

fn same_product(known: &str, named: &str) -> bool {
    let (known, named) = (normalize(known), normalize(named));
    !named.is_empty() && (known.contains(&named) || named.contains(&known))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::new(Arc::new(KeywordTable::default()))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_compare_them() {
        let r = resolver().resolve("compare them", &names(&["A", "B"]));
        assert_eq!(r.hint, Some(Intent::Compare));
        assert_eq!(r.entities, names(&["A", "B"]));
    }

    #[test]
    fn test_first_two_of_three() {
        let prev = names(&["A", "B", "C"]);
        for input in ["So sánh 2 cái đầu", "so sánh hai cái đầu", "compare the first two", "compare top 2"] {
            let r = resolver().resolve(input, &prev);
            assert_eq!(r.hint, Some(Intent::Compare), "{input}");
            assert_eq!(r.entities, names(&["A", "B"]), "{input}");
        }
    }

    #[test]
    fn test_compare_needs_two_antecedents() {
        let r = resolver().resolve("so sánh chúng", &names(&["A"]));
        assert_eq!(r.hint, None);
        let r = resolver().resolve("so sánh chúng", &[]);
        assert_eq!(r, Resolution::default());
    }

    #[test]
    fn test_compare_caps_at_three() {
        let r = resolver().resolve("so sánh chúng", &names(&["A", "B", "C", "D"]));
        assert_eq!(r.entities, names(&["A", "B", "C"]));
    }

    #[test]
    fn test_both_means_two() {
        let prev = names(&["A", "B", "C"]);
        for input in ["so sánh cả hai", "so sánh hai cái", "compare both", "compare the two"] {
            let r = resolver().resolve(input, &prev);
            assert_eq!(r.hint, Some(Intent::Compare), "{input}");
            assert_eq!(r.entities, names(&["A", "B"]), "{input}");
        }
    }

    #[test]
    fn test_named_products_are_not_references() {
        let prev = names(&["Dell Vostro 3430", "Dell Inspiron 15 3520"]);
        for input in [
            "So sánh iPhone 15 và Samsung Galaxy S24, cái nào tốt hơn?",
            "iPhone 15 có tốt không?",
            "So sánh Vostro 3430 và XPS 13 Plus, cái nào tốt hơn?",
        ] {
            assert_eq!(resolver().resolve(input, &prev), Resolution::default(), "{input}");
        }

        // earlier products named again still resolve
        let r = resolver().resolve("Dell Vostro 3430 có tốt không?", &prev);
        assert_eq!(r.hint, Some(Intent::Review));
        let r = resolver().resolve("so sánh cái đầu tiên và cái thứ hai", &prev);
        assert_eq!(r.hint, Some(Intent::Compare));
    }

    #[test]
    fn test_is_reference() {
        let r = resolver();
        assert!(r.is_reference("cái thứ hai"));
        assert!(r.is_reference("chúng"));
        assert!(r.is_reference("cái nào tốt hơn"));
        assert!(r.is_reference("nào tốt hơn"));
        assert!(!r.is_reference("iPhone 15"));
        assert!(!r.is_reference("Dell XPS 13 Plus"));
    }

    #[test]
    fn test_review_reference() {
        let prev = names(&["A", "B", "C"]);
        let r = resolver().resolve("Nó có tốt không?", &prev);
        assert_eq!(r.hint, Some(Intent::Review));
        assert_eq!(r.entities, names(&["A"]));

        let r = resolver().resolve("đánh giá cái thứ hai", &prev);
        assert_eq!(r.entities, names(&["B"]));

        let r = resolver().resolve("how are the reviews of the third one", &prev);
        assert_eq!(r.entities, names(&["C"]));
    }

    #[test]
    fn test_unrelated_input_is_silent() {
        let r = resolver().resolve("Tìm điện thoại Samsung", &names(&["A", "B"]));
        assert_eq!(r, Resolution::default());
    }

    #[test]
    fn test_ordinal_parsing() {
        assert_eq!(leading_count("so sánh 3 sản phẩm đầu tiên"), Some(3));
        assert_eq!(leading_count("so sánh chúng"), None);
        assert_eq!(ordinal("cái thứ hai thế nào"), Some(2));
        assert_eq!(ordinal("cái đầu tiên"), Some(1));
        assert_eq!(ordinal("the second"), Some(2));
        assert_eq!(ordinal("thứ ba"), Some(3));
        assert_eq!(ordinal("so sánh 3 sản phẩm đầu tiên"), None);
    }
}
