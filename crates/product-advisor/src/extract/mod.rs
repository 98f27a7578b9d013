//! Parameter Extraction
//!
//! Turns free text into tool parameters. The model path is tried first and
//! its validated results are cached; anything unusable falls back to
//! [`FallbackExtractor`] so a tool call can always be attempted.

mod fallback;
mod llm;
mod params;

pub use fallback::{FallbackExtractor, brand_cues, price_range, quantity};
pub use llm::parse_reply;
pub use params::{
    CompareParams, ExtractedParams, ExtractionKind, RecommendParams, ReviewParams, SearchParams,
};

use std::sync::Arc;
use std::time::Duration;

use agent_core::provider::with_deadline;
use agent_core::{CacheKey, ExtractionCache, GenerationOptions, LlmProvider};

use crate::prompts;

/// Where extracted parameters came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionSource {
    Cache,
    Model,
    Fallback,
}

impl ExtractionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionSource::Cache => "cache",
            ExtractionSource::Model => "model",
            ExtractionSource::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Extraction {
    pub params: ExtractedParams,
    pub source: ExtractionSource,

    /// Why the model path was abandoned
    pub failure: Option<String>,
}

/// Cached, model-first extractor with a rule-based fallback
pub struct ParameterExtractor {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    cache: Arc<ExtractionCache<ExtractedParams>>,
    fallback: FallbackExtractor,
    timeout: Duration,
}

impl ParameterExtractor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        options: &GenerationOptions,
        cache: Arc<ExtractionCache<ExtractedParams>>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            options: options.with_budget(256, 0.0),
            cache,
            fallback: FallbackExtractor::new(),
            timeout,
        }
    }

    pub fn cache(&self) -> &Arc<ExtractionCache<ExtractedParams>> {
        &self.cache
    }

    pub fn cache_key(kind: ExtractionKind, input: &str, context: &[String]) -> CacheKey {
        if kind.uses_context() {
            CacheKey::with_context(kind.as_str(), input, context)
        } else {
            CacheKey::new(kind.as_str(), input)
        }
    }

    /// Extract parameters of `kind`; never fails
    pub async fn extract(&self, kind: ExtractionKind, input: &str, context: &[String]) -> Extraction {
        let key = Self::cache_key(kind, input, context);
        if let Some(params) = self.cache.get(&key) {
            tracing::debug!(kind = %kind, key = %key, "Extraction cache hit");
            return Extraction {
                params,
                source: ExtractionSource::Cache,
                failure: None,
            };
        }

        match self.extract_with_model(kind, input, context).await {
            Ok(params) => {
                self.cache.insert(key, params.clone());
                tracing::debug!(kind = %kind, "Extracted parameters with model");
                Extraction {
                    params,
                    source: ExtractionSource::Model,
                    failure: None,
                }
            }
            Err(reason) => {
                tracing::warn!(kind = %kind, reason = %reason, "Model extraction failed, using rules");
                Extraction {
                    params: self.fallback.extract(kind, input),
                    source: ExtractionSource::Fallback,
                    failure: Some(reason),
                }
            }
        }
    }

    async fn extract_with_model(
        &self,
        kind: ExtractionKind,
        input: &str,
        context: &[String],
    ) -> Result<ExtractedParams, String> {
        let context = if context.is_empty() {
            "(không có)".to_string()
        } else {
            context.join(", ")
        };
        let prompt = prompts::render(kind.template(), &[("input", input), ("context", &context)]);
        let raw = with_deadline(self.timeout, self.provider.complete_prompt(&prompt, &self.options))
            .await
            .map_err(|e| e.to_string())?;
        parse_reply(kind, &raw)
    }
}
