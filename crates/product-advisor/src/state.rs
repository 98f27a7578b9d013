//! Conversation State
//!
//! The single mutable record threaded through one turn. It is owned by the
//! task processing that turn and consumed by [`ConversationState::finish`],
//! which is the only way to produce the final response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use agent_core::{Message, ReasoningStep, ReasoningTrace, SessionId, Turn};

use crate::extract::ExtractionKind;
use crate::intent::Intent;
use crate::model::{Comparison, Product, Recommendation, ReviewDigest, format_vnd};

/// Entities carried into the next turn
pub const MAX_CARRIED_ENTITIES: usize = 3;

/// Shown when nothing else could be said
pub const APOLOGY: &str =
    "Xin lỗi, hệ thống đang gặp sự cố nên chưa thể trả lời bạn lúc này. Bạn vui lòng thử lại sau nhé.";

/// Catalog tool
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Search,
    Compare,
    Recommend,
    Review,
}

impl ToolKind {
    pub fn name(self) -> &'static str {
        self.extraction().tool_name()
    }

    pub fn extraction(self) -> ExtractionKind {
        match self {
            ToolKind::Search => ExtractionKind::Search,
            ToolKind::Compare => ExtractionKind::Compare,
            ToolKind::Recommend => ExtractionKind::Recommend,
            ToolKind::Review => ExtractionKind::Review,
        }
    }

    /// Tool serving a tool intent
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Search => Some(ToolKind::Search),
            Intent::Compare => Some(ToolKind::Compare),
            Intent::Recommend => Some(ToolKind::Recommend),
            Intent::Review => Some(ToolKind::Review),
            Intent::Greeting | Intent::Direct | Intent::Error => None,
        }
    }
}

/// Typed output of a tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "data", rename_all = "lowercase")]
pub enum ToolPayload {
    Search(Vec<Product>),
    Compare(Comparison),
    Recommend(Vec<Recommendation>),
    Review(ReviewDigest),
}

fn single<T: serde::de::DeserializeOwned>(items: Vec<serde_json::Value>) -> Result<T, String> {
    let mut items = items.into_iter();
    match (items.next(), items.next()) {
        (Some(item), None) => serde_json::from_value(item).map_err(|e| e.to_string()),
        _ => Err("expected exactly one item".into()),
    }
}

fn many<T: serde::de::DeserializeOwned>(items: Vec<serde_json::Value>) -> Result<Vec<T>, String> {
    items
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(|e| e.to_string()))
        .collect()
}

impl ToolPayload {
    /// Decode the raw items of a non-empty tool result
    pub fn decode(kind: ToolKind, items: Vec<serde_json::Value>) -> Result<Self, String> {
        Ok(match kind {
            ToolKind::Search => ToolPayload::Search(many(items)?),
            ToolKind::Compare => ToolPayload::Compare(single(items)?),
            ToolKind::Recommend => ToolPayload::Recommend(many(items)?),
            ToolKind::Review => ToolPayload::Review(single(items)?),
        })
    }

    /// Product names, in result order
    pub fn entity_names(&self) -> Vec<String> {
        match self {
            ToolPayload::Search(products) => products.iter().map(|p| p.name.clone()).collect(),
            ToolPayload::Compare(report) => report.products.iter().map(|p| p.name.clone()).collect(),
            ToolPayload::Recommend(recs) => recs.iter().map(|r| r.product.name.clone()).collect(),
            ToolPayload::Review(digest) => vec![digest.product_name.clone()],
        }
    }

    /// One-line observation for the trace
    pub fn summary(&self) -> String {
        match self {
            ToolPayload::Search(products) => format!(
                "{} products: {}",
                products.len(),
                self.entity_names().join(", ")
            ),
            ToolPayload::Compare(report) => format!(
                "compared {}; cheapest {}",
                self.entity_names().join(" / "),
                report.cheapest
            ),
            ToolPayload::Recommend(recs) => format!(
                "{} recommendations, best {}",
                recs.len(),
                recs.first().map_or("-", |r| r.product.name.as_str())
            ),
            ToolPayload::Review(digest) => format!(
                "{} reviews of {}, average {:.1}",
                digest.total_reviews, digest.product_name, digest.average_rating
            ),
        }
    }

    /// Plain-text rendering for the synthesis prompt
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self {
            ToolPayload::Search(products) => {
                out.push_str("Kết quả tìm kiếm:\n");
                for (i, p) in products.iter().enumerate() {
                    out.push_str(&format!("{}. {}", i + 1, p.headline()));
                    if !p.features.is_empty() {
                        out.push_str(&format!(" | {}", p.features.join(", ")));
                    }
                    out.push('\n');
                }
            }
            ToolPayload::Compare(report) => {
                out.push_str("So sánh sản phẩm:\n");
                for p in &report.products {
                    out.push_str(&format!("- {}\n", p.headline()));
                    for (key, value) in &p.specs {
                        out.push_str(&format!("    {key}: {value}\n"));
                    }
                    if !p.features.is_empty() {
                        out.push_str(&format!("    tính năng: {}\n", p.features.join(", ")));
                    }
                }
                out.push_str(&format!(
                    "Rẻ nhất: {}. Đánh giá cao nhất: {}.\n",
                    report.cheapest, report.best_rated
                ));
            }
            ToolPayload::Recommend(recs) => {
                out.push_str("Gợi ý phù hợp:\n");
                for (i, r) in recs.iter().enumerate() {
                    out.push_str(&format!(
                        "{}. {} (điểm {:.0}/100): {}\n",
                        i + 1,
                        r.product.headline(),
                        r.score,
                        r.reason
                    ));
                }
            }
            ToolPayload::Review(digest) => {
                out.push_str(&format!(
                    "Đánh giá {}: trung bình {:.1}/5 trên {} lượt\n",
                    digest.product_name, digest.average_rating, digest.total_reviews
                ));
                for r in &digest.reviews {
                    out.push_str(&format!("- {}★ {}: {}", r.rating, r.author, r.content));
                    if !r.pros.is_empty() {
                        out.push_str(&format!(" (ưu: {})", r.pros.join(", ")));
                    }
                    if !r.cons.is_empty() {
                        out.push_str(&format!(" (nhược: {})", r.cons.join(", ")));
                    }
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Short deterministic answer used when the model cannot write one
    pub fn brief(&self) -> String {
        match self {
            ToolPayload::Search(products) => {
                let lines: Vec<String> = products.iter().map(|p| format!("- {}", p.headline())).collect();
                format!("Mình tìm thấy các sản phẩm sau:\n{}", lines.join("\n"))
            }
            ToolPayload::Compare(report) => format!(
                "So sánh {}: {} có giá tốt nhất, {} được đánh giá cao nhất.",
                self.entity_names().join(" và "),
                report.cheapest,
                report.best_rated
            ),
            ToolPayload::Recommend(recs) => {
                let lines: Vec<String> = recs
                    .iter()
                    .map(|r| format!("- {} ({}): {}", r.product.name, format_vnd(r.product.price), r.reason))
                    .collect();
                format!("Mình gợi ý cho bạn:\n{}", lines.join("\n"))
            }
            ToolPayload::Review(digest) => format!(
                "{} được đánh giá trung bình {:.1}/5 qua {} lượt nhận xét.",
                digest.product_name, digest.average_rating, digest.total_reviews
            ),
        }
    }
}

/// Outcome of one tool dispatch
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Success(ToolPayload),

    /// The tool ran fine and found nothing
    NoResults { message: String },

    Failure { reason: String },
}

impl ToolOutcome {
    /// Whether the tool call itself succeeded
    pub fn is_success(&self) -> bool {
        !matches!(self, ToolOutcome::Failure { .. })
    }

    pub fn payload(&self) -> Option<&ToolPayload> {
        match self {
            ToolOutcome::Success(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            ToolOutcome::Success(payload) => payload.summary(),
            ToolOutcome::NoResults { message } => format!("no results: {message}"),
            ToolOutcome::Failure { reason } => format!("failed: {reason}"),
        }
    }
}

/// Presentation-facing result of one turn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnResponse {
    pub response: String,
    pub session_id: String,
    pub intent: Intent,
    pub tools_used: Vec<String>,
    pub reasoning_steps: Vec<ReasoningStep>,
    pub success: bool,
    pub error_count: usize,
}

/// Working state of one turn
#[derive(Debug)]
pub struct ConversationState {
    session_id: SessionId,
    turn_input: String,
    messages: Vec<Message>,
    intent: Option<Intent>,
    tool_results: BTreeMap<ToolKind, ToolOutcome>,
    resolved_entities: Vec<String>,
    trace: ReasoningTrace,
    tools_used: Vec<String>,
    error_count: usize,
}

impl ConversationState {
    /// Start a turn on top of the recent history
    pub fn new(session_id: SessionId, turn_input: impl Into<String>, history: &[Turn]) -> Self {
        let turn_input = turn_input.into();
        let mut messages = Vec::with_capacity(history.len() * 2 + 1);
        for turn in history {
            messages.push(Message::user(turn.user.clone()));
            messages.push(Message::assistant(turn.assistant.clone()));
        }
        messages.push(Message::user(turn_input.clone()));
        Self {
            session_id,
            turn_input,
            messages,
            intent: None,
            tool_results: BTreeMap::new(),
            resolved_entities: Vec::new(),
            trace: ReasoningTrace::new(),
            tools_used: Vec::new(),
            error_count: 0,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn turn_input(&self) -> &str {
        &self.turn_input
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn intent(&self) -> Option<Intent> {
        self.intent
    }

    pub fn set_intent(&mut self, intent: Intent) {
        self.intent = Some(intent);
    }

    pub fn record_tool(&mut self, kind: ToolKind, outcome: ToolOutcome) {
        let name = kind.name().to_string();
        if !self.tools_used.contains(&name) {
            self.tools_used.push(name);
        }
        self.tool_results.insert(kind, outcome);
    }

    pub fn tool_result(&self, kind: ToolKind) -> Option<&ToolOutcome> {
        self.tool_results.get(&kind)
    }

    pub fn tool_results(&self) -> &BTreeMap<ToolKind, ToolOutcome> {
        &self.tool_results
    }

    /// Successful payloads with data
    pub fn payloads(&self) -> impl Iterator<Item = &ToolPayload> {
        self.tool_results.values().filter_map(ToolOutcome::payload)
    }

    pub fn tools_used(&self) -> &[String] {
        &self.tools_used
    }

    pub fn resolved_entities(&self) -> &[String] {
        &self.resolved_entities
    }

    pub fn set_entities(&mut self, entities: Vec<String>) {
        self.resolved_entities = entities;
    }

    /// Take entities from this turn's results unless already resolved
    ///
    /// Compare results win over recommendations, which win over search
    /// results. At most [`MAX_CARRIED_ENTITIES`] distinct names are kept.
    pub fn carry_forward_entities(&mut self) {
        if !self.resolved_entities.is_empty() {
            return;
        }
        let mut names: Vec<String> = Vec::new();
        for kind in [ToolKind::Compare, ToolKind::Recommend, ToolKind::Search] {
            let Some(payload) = self.tool_results.get(&kind).and_then(ToolOutcome::payload) else {
                continue;
            };
            for name in payload.entity_names() {
                if names.len() < MAX_CARRIED_ENTITIES && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        self.resolved_entities = names;
    }

    pub fn note_error(&mut self) {
        self.error_count += 1;
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn record(
        &mut self,
        action: impl Into<String>,
        rationale: impl Into<String>,
        observation: impl AsRef<str>,
    ) {
        self.trace.record(action, rationale, observation);
    }

    pub fn trace(&self) -> &ReasoningTrace {
        &self.trace
    }

    /// Close the turn with its final text
    pub fn finish(self, response: String) -> TurnResponse {
        let response = if response.trim().is_empty() {
            APOLOGY.to_string()
        } else {
            response
        };
        let intent = self.intent.unwrap_or(Intent::Error);
        TurnResponse {
            response,
            session_id: self.session_id.to_string(),
            intent,
            tools_used: self.tools_used,
            reasoning_steps: self.trace.into_steps(),
            success: self.error_count == 0 && intent != Intent::Error,
            error_count: self.error_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, ProductCatalog, ProductFilter};

    async fn products(query: &str, top_k: usize) -> Vec<Product> {
        MemoryCatalog::new()
            .search(query, &ProductFilter::default(), top_k)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_carry_forward_prefers_compare_and_caps() {
        let found = products("laptop", 5).await;
        let mut state = ConversationState::new(SessionId::from_string("s"), "q", &[]);
        state.record_tool(ToolKind::Search, ToolOutcome::Success(ToolPayload::Search(found.clone())));
        state.record_tool(
            ToolKind::Compare,
            ToolOutcome::Success(ToolPayload::Compare(Comparison {
                products: vec![found[1].clone(), found[0].clone()],
                aspects: Vec::new(),
                cheapest: found[1].name.clone(),
                best_rated: found[0].name.clone(),
            })),
        );
        state.carry_forward_entities();
        assert_eq!(
            state.resolved_entities(),
            [found[1].name.clone(), found[0].name.clone(), found[2].name.clone()]
        );
        assert_eq!(state.tools_used(), ["search", "compare"]);
    }

    #[test]
    fn test_resolved_entities_are_not_overwritten() {
        let mut state = ConversationState::new(SessionId::from_string("s"), "q", &[]);
        state.set_entities(vec!["A".into()]);
        state.record_tool(ToolKind::Search, ToolOutcome::NoResults { message: "none".into() });
        state.carry_forward_entities();
        assert_eq!(state.resolved_entities(), ["A"]);
    }

    #[test]
    fn test_finish_never_returns_empty_text() {
        let mut state = ConversationState::new(SessionId::from_string("s"), "q", &[]);
        state.set_intent(Intent::Direct);
        let response = state.finish("   ".into());
        assert_eq!(response.response, APOLOGY);
        assert!(response.success);
    }

    #[test]
    fn test_success_flag() {
        let mut state = ConversationState::new(SessionId::from_string("s"), "q", &[]);
        state.set_intent(Intent::Search);
        state.note_error();
        let response = state.finish("ok".into());
        assert!(!response.success);
        assert_eq!(response.error_count, 1);

        let state = ConversationState::new(SessionId::from_string("s"), "q", &[]);
        assert_eq!(state.finish("ok".into()).intent, Intent::Error);
    }

    #[test]
    fn test_messages_include_history() {
        let history = vec![Turn::new("xin chào", "chào bạn", "greeting")];
        let state = ConversationState::new(SessionId::from_string("s"), "tìm laptop", &history);
        assert_eq!(state.messages().len(), 3);
        assert_eq!(state.messages()[2].content, "tìm laptop");
    }

    #[test]
    fn test_decode_rejects_wrong_shapes() {
        assert!(ToolPayload::decode(ToolKind::Compare, Vec::new()).is_err());
        assert!(ToolPayload::decode(ToolKind::Search, vec![serde_json::json!(1)]).is_err());
    }
}
