//! Intent Classification
//!
//! Two-stage strategy: a model call whose answer must be one of the known
//! labels, then ordered keyword rules. A confident reference hint skips both.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use agent_core::provider::with_deadline;
use agent_core::{GenerationOptions, LlmProvider, Message, Result};

use crate::keywords::{KeywordTable, Tokens};
use crate::prompts;
use crate::reference::Resolution;

/// What a turn asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Greeting,
    Search,
    Compare,
    Recommend,
    Review,
    Direct,
    Error,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Search => "search",
            Intent::Compare => "compare",
            Intent::Recommend => "recommend",
            Intent::Review => "review",
            Intent::Direct => "direct",
            Intent::Error => "error",
        }
    }

    /// Parse an untrusted model label
    ///
    /// `error` is never a valid answer; anything but a single known label is
    /// rejected.
    pub fn parse_label(raw: &str) -> Option<Self> {
        let line = raw.trim().lines().next()?.trim().to_lowercase();
        let line = line.strip_prefix("intent:").unwrap_or(&line);
        let label = line.trim_matches(|c: char| !c.is_alphanumeric());
        match label {
            "greeting" => Some(Intent::Greeting),
            "search" => Some(Intent::Search),
            "compare" => Some(Intent::Compare),
            "recommend" => Some(Intent::Recommend),
            "review" => Some(Intent::Review),
            "direct" => Some(Intent::Direct),
            _ => None,
        }
    }

    /// Whether the intent is served by a catalog tool
    pub fn uses_tools(self) -> bool {
        matches!(
            self,
            Intent::Search | Intent::Compare | Intent::Recommend | Intent::Review
        )
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an intent was decided
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    Reference,
    Model,
    Rules,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub method: ClassificationMethod,

    /// Entities supplied by reference resolution, if it decided the intent
    pub entities: Vec<String>,

    /// Why the model path was not used, for the trace
    pub fallback_reason: Option<String>,
}

/// Context-aware intent classifier
pub struct IntentClassifier {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    keywords: Arc<KeywordTable>,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        options: &GenerationOptions,
        keywords: Arc<KeywordTable>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            options: options.with_budget(16, 0.0),
            keywords,
            timeout,
        }
    }

    /// Decide the intent of a turn; never fails
    ///
    /// `history` holds the earlier messages of the conversation, oldest first.
    pub async fn classify(
        &self,
        input: &str,
        resolution: &Resolution,
        history: &[Message],
    ) -> Classification {
        if let Some(hint) = resolution.hint {
            tracing::debug!(intent = %hint, "Intent from reference hint");
            return Classification {
                intent: hint,
                method: ClassificationMethod::Reference,
                entities: resolution.entities.clone(),
                fallback_reason: None,
            };
        }

        let reason = match self.classify_with_model(input, history).await {
            Ok(intent) => {
                tracing::debug!(intent = %intent, method = "model", "Intent classified");
                return Classification {
                    intent,
                    method: ClassificationMethod::Model,
                    entities: Vec::new(),
                    fallback_reason: None,
                };
            }
            Err(reason) => reason,
        };

        tracing::warn!(reason = %reason, "Model classification failed, using rules");
        match self.classify_with_rules(input) {
            Ok(intent) => Classification {
                intent,
                method: ClassificationMethod::Rules,
                entities: Vec::new(),
                fallback_reason: Some(reason),
            },
            Err(e) => {
                tracing::error!(error = %e, "Rule classification failed");
                Classification {
                    intent: Intent::Error,
                    method: ClassificationMethod::Failed,
                    entities: Vec::new(),
                    fallback_reason: Some(format!("{reason}; {e}")),
                }
            }
        }
    }

    async fn classify_with_model(
        &self,
        input: &str,
        history: &[Message],
    ) -> std::result::Result<Intent, String> {
        let history = if history.is_empty() {
            "(chưa có)".to_string()
        } else {
            history
                .iter()
                .map(Message::transcript_line)
                .collect::<Vec<_>>()
                .join("\n")
        };
        let prompt = prompts::render(
            prompts::INTENT_CLASSIFICATION,
            &[("input", input), ("history", history.as_str())],
        );

        let raw = with_deadline(
            self.timeout,
            self.provider.complete_prompt(&prompt, &self.options),
        )
        .await
        .map_err(|e| e.to_string())?;

        Intent::parse_label(&raw).ok_or_else(|| format!("label outside the intent set: {raw:?}"))
    }

    /// Ordered keyword rules, `Direct` when nothing matches
    pub fn classify_with_rules(&self, input: &str) -> Result<Intent> {
        self.keywords.validate()?;
        let tokens = Tokens::new(input);
        let kw = &self.keywords;

        let intent = if tokens.contains_any(&kw.greeting) {
            Intent::Greeting
        } else if tokens.contains_any(&kw.compare) {
            Intent::Compare
        } else if tokens.contains_any(&kw.recommend) {
            Intent::Recommend
        } else if tokens.contains_any(&kw.review) {
            Intent::Review
        } else if tokens.contains_any(&kw.search) {
            Intent::Search
        } else {
            Intent::Direct
        };
        tracing::debug!(intent = %intent, method = "rules", "Intent classified");
        Ok(intent)
    }
}
