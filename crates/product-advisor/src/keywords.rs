//! Keyword Tables
//!
//! Cue words used by the rule-based intent fallback and by reference
//! resolution. Tables are plain data so a deployment can swap in another
//! language or tune precision without touching the matching code.
//!
//! Matching works on whole tokens: text and phrases are lower-cased, every
//! non-alphanumeric character becomes a space, and a phrase matches only
//! when its tokens appear contiguously. "hi" therefore does not match "chip".

use serde::{Deserialize, Serialize};

use agent_core::{AgentError, Result};

/// Cue-word families
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTable {
    pub greeting: Vec<String>,
    pub compare: Vec<String>,
    pub recommend: Vec<String>,
    pub review: Vec<String>,
    pub search: Vec<String>,

    /// Pronouns and determiners pointing at earlier products
    pub anaphora: Vec<String>,

    /// Anaphora for exactly two products ("cả hai", "both")
    #[serde(default)]
    pub pair: Vec<String>,

    /// Phrases that on their own ask to compare earlier products
    pub compare_reference: Vec<String>,

    /// Phrases that on their own ask about an earlier product
    pub review_reference: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::vietnamese()
    }
}

impl KeywordTable {
    /// Vietnamese cue words with common English equivalents
    pub fn vietnamese() -> Self {
        Self {
            greeting: owned(&[
                "xin chào", "chào", "chào bạn", "alo", "cảm ơn", "cám ơn",
                "hello", "hi", "hey", "thanks", "thank you", "good morning",
            ]),
            compare: owned(&[
                "so sánh", "khác gì", "khác nhau", "khác biệt", "vs", "versus",
                "compare", "comparison", "difference", "nên chọn cái nào",
            ]),
            recommend: owned(&[
                "gợi ý", "tư vấn", "đề xuất", "nên mua", "nên chọn", "phù hợp",
                "recommend", "suggest", "suggestion", "which should i buy",
            ]),
            review: owned(&[
                "đánh giá", "review", "nhận xét", "ý kiến", "trải nghiệm",
                "có tốt không", "có ổn không", "reviews", "opinion",
            ]),
            search: owned(&[
                "tìm", "tìm kiếm", "kiếm", "mua", "giá", "laptop", "điện thoại",
                "smartphone", "máy tính", "search", "find", "show", "price",
            ]),
            anaphora: owned(&[
                "chúng", "chúng nó", "nó", "cả hai", "hai cái", "2 cái", "mấy cái",
                "những cái", "các cái", "cái này", "cái đó", "sản phẩm này",
                "sản phẩm đó", "máy này", "máy đó", "cái đầu", "cái thứ",
                "them", "it", "they", "both", "these", "those", "this one",
                "that one", "the two", "first", "second", "third",
                "nhau", "each other",
            ]),
            pair: owned(&["cả hai", "hai cái", "2 cái", "both", "the two", "hai sản phẩm này"]),
            compare_reference: owned(&[
                "nào tốt hơn", "nào hơn", "nào rẻ hơn",
                "which one is better", "which is better", "the two of them",
            ]),
            review_reference: owned(&[
                "có tốt không", "có ổn không", "dùng có tốt không", "đánh giá sao",
                "review thế nào", "is it good", "is it worth it", "how are the reviews",
            ]),
        }
    }

    /// Every family must hold at least one cue
    pub fn validate(&self) -> Result<()> {
        let families = [
            ("greeting", &self.greeting),
            ("compare", &self.compare),
            ("recommend", &self.recommend),
            ("review", &self.review),
            ("search", &self.search),
            ("anaphora", &self.anaphora),
            ("compare_reference", &self.compare_reference),
            ("review_reference", &self.review_reference),
        ];
        for (name, cues) in families {
            if cues.iter().all(|c| normalize(c).is_empty()) {
                return Err(AgentError::Config(format!("keyword family '{name}' is empty")));
            }
        }
        Ok(())
    }
}

/// Lower-case, punctuation to spaces, single-spaced
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text prepared for repeated phrase lookups
#[derive(Clone, Debug)]
pub struct Tokens {
    padded: String,
}

impl Tokens {
    pub fn new(text: &str) -> Self {
        Self {
            padded: format!(" {} ", normalize(text)),
        }
    }

    /// Normalized text without padding
    pub fn text(&self) -> &str {
        self.padded.trim()
    }

    pub fn contains_phrase(&self, phrase: &str) -> bool {
        let phrase = normalize(phrase);
        !phrase.is_empty() && self.padded.contains(&format!(" {phrase} "))
    }

    pub fn contains_any(&self, phrases: &[String]) -> bool {
        phrases.iter().any(|p| self.contains_phrase(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_boundaries() {
        let t = Tokens::new("Con chip này mạnh không?");
        assert!(!t.contains_phrase("hi"));
        assert!(t.contains_phrase("chip"));

        let t = Tokens::new("So sánh, giúp mình!");
        assert!(t.contains_phrase("so sánh"));
        assert!(!t.contains_phrase("sánh giúp bạn"));
    }

    #[test]
    fn test_default_table_is_valid() {
        assert!(KeywordTable::default().validate().is_ok());
    }

    #[test]
    fn test_empty_family_is_config_error() {
        let table = KeywordTable {
            compare: vec!["  ".into()],
            ..KeywordTable::vietnamese()
        };
        assert!(matches!(table.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Tìm LAPTOP-Dell, dưới 20tr "), "tìm laptop dell dưới 20tr");
    }
}
