//! Response Synthesis
//!
//! Builds one grounded prompt from the turn's tool data and recent history
//! and asks the model for the final answer. Turns without usable data, and
//! turns where the model fails, get deterministic Vietnamese text instead,
//! so the result is never empty.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use agent_core::provider::with_deadline;
use agent_core::{GenerationOptions, LlmProvider, Turn};

use crate::intent::Intent;
use crate::prompts;
use crate::state::{ToolKind, ToolOutcome};

pub const GREETING: &str = "Xin chào! Mình là trợ lý tư vấn sản phẩm công nghệ. Mình có thể giúp bạn:\n\
- Tìm laptop, điện thoại theo hãng và ngân sách\n\
- So sánh hai hoặc ba sản phẩm\n\
- Gợi ý sản phẩm phù hợp với nhu cầu\n\
- Tổng hợp đánh giá của người dùng\n\
Bạn đang quan tâm đến sản phẩm nào?";

const DIRECT_FALLBACK: &str = "Mình là trợ lý tư vấn laptop và điện thoại nên chưa trả lời được câu này. \
Bạn có thể hỏi mình về sản phẩm, giá, so sánh hoặc đánh giá nhé.";

const LOOKUP_TROUBLE: &str = "Hệ thống tra cứu đang gặp trục trặc nên mình chưa lấy được dữ liệu.";

/// Final text and how it was produced
#[derive(Clone, Debug)]
pub struct Synthesis {
    pub text: String,
    pub used_model: bool,

    /// Why the model answer was replaced
    pub failure: Option<String>,
}

pub struct ResponseSynthesizer {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    timeout: Duration,
    history_window: usize,
}

impl ResponseSynthesizer {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        options: &GenerationOptions,
        timeout: Duration,
        history_window: usize,
    ) -> Self {
        Self {
            provider,
            options: options.with_budget(1024, 0.7),
            timeout,
            history_window,
        }
    }

    pub async fn synthesize(
        &self,
        input: &str,
        intent: Intent,
        results: &BTreeMap<ToolKind, ToolOutcome>,
        history: &[Turn],
    ) -> Synthesis {
        if intent == Intent::Greeting {
            return Synthesis {
                text: GREETING.to_string(),
                used_model: false,
                failure: None,
            };
        }

        let payloads: Vec<_> = results.values().filter_map(ToolOutcome::payload).collect();
        if intent.uses_tools() && payloads.is_empty() {
            return Synthesis {
                text: no_results_message(intent, input, results),
                used_model: false,
                failure: None,
            };
        }

        let data = if payloads.is_empty() {
            "(không có)".to_string()
        } else {
            payloads.iter().map(|p| p.render()).collect::<Vec<_>>().join("\n")
        };
        let history = self.history_lines(history);
        let prompt = prompts::render(
            prompts::SYNTHESIS,
            &[
                ("intent", intent.as_str()),
                ("results", data.as_str()),
                ("history", history.as_str()),
                ("input", input),
            ],
        );

        let reply = with_deadline(self.timeout, self.provider.complete_prompt(&prompt, &self.options)).await;
        match reply {
            Ok(text) if !text.trim().is_empty() => Synthesis {
                text: text.trim().to_string(),
                used_model: true,
                failure: None,
            },
            other => {
                let reason = match other {
                    Err(e) => e.to_string(),
                    Ok(_) => "empty completion".to_string(),
                };
                tracing::warn!(intent = %intent, reason = %reason, "Synthesis failed, using template");
                let text = if payloads.is_empty() {
                    DIRECT_FALLBACK.to_string()
                } else {
                    payloads.iter().map(|p| p.brief()).collect::<Vec<_>>().join("\n\n")
                };
                Synthesis {
                    text,
                    used_model: false,
                    failure: Some(reason),
                }
            }
        }
    }

    /// Last turns as alternating user/assistant lines
    fn history_lines(&self, history: &[Turn]) -> String {
        let skip = history.len().saturating_sub(self.history_window);
        let lines: Vec<String> = history
            .iter()
            .skip(skip)
            .flat_map(|t| [format!("Người dùng: {}", t.user), format!("Trợ lý: {}", t.assistant)])
            .collect();
        if lines.is_empty() {
            "(chưa có)".to_string()
        } else {
            lines.join("\n")
        }
    }
}

/// Helpful answer for a tool turn that produced no data
fn no_results_message(intent: Intent, input: &str, results: &BTreeMap<ToolKind, ToolOutcome>) -> String {
    let failed = results.values().any(|o| !o.is_success());
    let advice = match intent {
        Intent::Compare => "Bạn hãy nêu rõ tên hai hoặc ba sản phẩm cần so sánh, ví dụ: \"So sánh iPhone 15 và Samsung Galaxy S24\".".to_string(),
        Intent::Review => "Bạn kiểm tra lại tên sản phẩm hoặc hỏi đánh giá về một mẫu khác nhé.".to_string(),
        Intent::Recommend => "Bạn thử nới rộng ngân sách hoặc bớt một vài tính năng bắt buộc, mình sẽ gợi ý lại nhé.".to_string(),
        _ => format!(
            "Mình chưa tìm thấy sản phẩm phù hợp với \"{}\". Bạn thử nới rộng điều kiện nhé: tăng mức giá tối đa, bỏ bớt yêu cầu về thương hiệu hoặc tìm theo loại sản phẩm khác.",
            input.trim()
        ),
    };
    if failed {
        format!("{LOOKUP_TROUBLE} {advice}")
    } else {
        advice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, ProductCatalog, ProductFilter};
    use crate::state::ToolPayload;
    use crate::testing::ScriptedProvider;

    fn synthesizer(provider: Arc<ScriptedProvider>) -> ResponseSynthesizer {
        ResponseSynthesizer::new(provider, &GenerationOptions::default(), Duration::from_secs(5), 3)
    }

    async fn search_results() -> BTreeMap<ToolKind, ToolOutcome> {
        let products = MemoryCatalog::new()
            .search("dell", &ProductFilter { brand: Some("Dell".into()), ..Default::default() }, 3)
            .await
            .unwrap();
        BTreeMap::from([(ToolKind::Search, ToolOutcome::Success(ToolPayload::Search(products)))])
    }

    #[tokio::test]
    async fn test_greeting_skips_model() {
        let provider = Arc::new(ScriptedProvider::new());
        let s = synthesizer(Arc::clone(&provider))
            .synthesize("xin chào", Intent::Greeting, &BTreeMap::new(), &[])
            .await;
        assert_eq!(s.text, GREETING);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_results_suggest_relaxing() {
        let provider = Arc::new(ScriptedProvider::new());
        let results = BTreeMap::from([(ToolKind::Search, ToolOutcome::NoResults { message: String::new() })]);
        let s = synthesizer(Arc::clone(&provider))
            .synthesize("laptop dưới 1000 đồng", Intent::Search, &results, &[])
            .await;
        assert!(s.text.contains("nới rộng"));
        assert!(s.failure.is_none());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_tool_mentions_trouble() {
        let results = BTreeMap::from([(ToolKind::Review, ToolOutcome::Failure { reason: "down".into() })]);
        let s = synthesizer(Arc::new(ScriptedProvider::new()))
            .synthesize("đánh giá iPhone 15", Intent::Review, &results, &[])
            .await;
        assert!(s.text.starts_with(LOOKUP_TROUBLE));
        assert!(!s.text.contains("down"));
    }

    #[tokio::test]
    async fn test_prompt_is_grounded_with_recent_history() {
        let provider = Arc::new(ScriptedProvider::new());
        let history: Vec<Turn> = (0..5)
            .map(|i| Turn::new(format!("câu {i}"), format!("đáp {i}"), "direct"))
            .collect();
        let s = synthesizer(Arc::clone(&provider))
            .synthesize("tìm laptop dell", Intent::Search, &search_results().await, &history)
            .await;
        assert!(s.used_model);
        assert!(s.text.contains("Dell XPS 13 Plus"));

        let prompt = &provider.prompts_for(prompts::TASK_SYNTHESIS)[0];
        assert!(prompt.contains("Ý định: search"));
        assert!(prompt.contains("Người dùng: câu 4\nTrợ lý: đáp 4"));
        assert!(prompt.contains("Người dùng: câu 2"));
        assert!(!prompt.contains("câu 1"));
    }

    #[tokio::test]
    async fn test_model_failure_uses_template() {
        let s = synthesizer(Arc::new(ScriptedProvider::failing()))
            .synthesize("tìm laptop dell", Intent::Search, &search_results().await, &[])
            .await;
        assert!(!s.used_model);
        assert!(s.failure.is_some());
        assert!(s.text.contains("Dell"));

        let direct = synthesizer(Arc::new(ScriptedProvider::failing()))
            .synthesize("thời tiết hôm nay", Intent::Direct, &BTreeMap::new(), &[])
            .await;
        assert_eq!(direct.text, DIRECT_FALLBACK);
    }
}
