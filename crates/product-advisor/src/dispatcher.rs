//! Tool Dispatch
//!
//! Extract parameters for a tool intent, call the tool under a deadline with
//! bounded retries, and fold the typed outcome into the turn state.
//!
//! Extraction fallbacks and tool failures are recoverable: they bump the
//! turn's error count and still yield a [`ToolOutcome`]. Only unrecoverable
//! faults (an unregistered tool, say) are returned as errors.

use std::sync::Arc;
use std::time::Duration;

use agent_core::provider::with_deadline;
use agent_core::{AgentError, Result, ToolRegistry, ToolResult};

use crate::extract::{ExtractedParams, ExtractionSource, ParameterExtractor};
use crate::intent::Intent;
use crate::state::{ConversationState, ToolKind, ToolOutcome, ToolPayload};

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    extractor: ParameterExtractor,
    timeout: Duration,
    max_retries: u32,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        extractor: ParameterExtractor,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            registry,
            extractor,
            timeout,
            max_retries,
        }
    }

    pub fn extractor(&self) -> &ParameterExtractor {
        &self.extractor
    }

    /// Tools this dispatcher can reach
    pub fn registered(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Extract parameters from `input` and run the tool serving `intent`
    ///
    /// `context` holds the entity names extraction may refer back to.
    pub async fn dispatch(
        &self,
        intent: Intent,
        input: &str,
        context: &[String],
        state: &mut ConversationState,
    ) -> Result<ToolOutcome> {
        let Some(kind) = ToolKind::for_intent(intent) else {
            return Err(AgentError::ToolNotFound(format!("no tool serves intent '{intent}'")));
        };
        if state.intent().is_none() {
            state.set_intent(intent);
        }

        let params = self.extract(kind, input, context, state).await;
        self.dispatch_with(kind, &params, state).await
    }

    /// Extract parameters for `kind`, counting a fallback as an error
    pub async fn extract(
        &self,
        kind: ToolKind,
        input: &str,
        context: &[String],
        state: &mut ConversationState,
    ) -> ExtractedParams {
        let extraction = self.extractor.extract(kind.extraction(), input, context).await;
        if extraction.source == ExtractionSource::Fallback {
            state.note_error();
            state.record(
                "extract",
                format!("{} parameters", kind.name()),
                format!(
                    "fallback rules used: {}",
                    extraction.failure.as_deref().unwrap_or("unknown")
                ),
            );
        }
        extraction.params
    }

    /// Run a tool with already extracted parameters
    pub async fn dispatch_with(
        &self,
        kind: ToolKind,
        params: &ExtractedParams,
        state: &mut ConversationState,
    ) -> Result<ToolOutcome> {
        let call = params.to_tool_call();
        let rationale = call.arguments_json();

        let mut attempt = 0;
        let outcome = loop {
            match with_deadline(self.timeout, self.registry.execute(&call)).await {
                Ok(result) => break Self::outcome(kind, result),
                Err(e) if e.is_unrecoverable() => {
                    tracing::error!(tool = kind.name(), error = %e, "Unrecoverable tool fault");
                    state.record(kind.name(), rationale, format!("unrecoverable: {e}"));
                    return Err(e);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(tool = kind.name(), attempt, error = %e, "Retrying tool call");
                }
                Err(e) => break ToolOutcome::Failure { reason: e.to_string() },
            }
        };

        if let ToolOutcome::Failure { reason } = &outcome {
            tracing::warn!(tool = kind.name(), reason = %reason, "Tool failed");
            state.note_error();
        } else {
            tracing::debug!(tool = kind.name(), attempts = attempt + 1, "Tool finished");
        }

        state.record(kind.name(), rationale, outcome.summary());
        state.record_tool(kind, outcome.clone());
        Ok(outcome)
    }

    fn outcome(kind: ToolKind, result: ToolResult) -> ToolOutcome {
        if !result.success {
            return ToolOutcome::Failure {
                reason: result.message.unwrap_or_else(|| "tool reported failure".into()),
            };
        }
        if result.items.is_empty() {
            return ToolOutcome::NoResults {
                message: result.message.unwrap_or_default(),
            };
        }
        match ToolPayload::decode(kind, result.items) {
            Ok(payload) => ToolOutcome::Success(payload),
            Err(e) => ToolOutcome::Failure {
                reason: format!("unreadable {} output: {e}", kind.name()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, ProductCatalog};
    use crate::extract::{CompareParams, SearchParams};
    use crate::prompts;
    use crate::svckit;
    use crate::testing::{FlakyCatalog, ScriptedProvider};
    use agent_core::{ExtractionCache, GenerationOptions, SessionId};

    fn dispatcher(provider: ScriptedProvider, catalog: Arc<dyn ProductCatalog>, retries: u32) -> ToolDispatcher {
        let extractor = ParameterExtractor::new(
            Arc::new(provider),
            &GenerationOptions::default(),
            Arc::new(ExtractionCache::new(Duration::from_secs(3600))),
            Duration::from_secs(5),
        );
        ToolDispatcher::new(
            Arc::new(svckit::registry(&catalog)),
            extractor,
            Duration::from_secs(5),
            retries,
        )
    }

    fn state(input: &str, intent: Intent) -> ConversationState {
        let mut state = ConversationState::new(SessionId::from_string("t"), input, &[]);
        state.set_intent(intent);
        state
    }

    #[tokio::test]
    async fn test_extraction_failure_does_not_fail_search() {
        let d = dispatcher(ScriptedProvider::failing(), Arc::new(MemoryCatalog::new()), 1);
        let input = "Tìm laptop Dell dưới 20 triệu";
        let mut st = state(input, Intent::Search);

        let outcome = d.dispatch(Intent::Search, input, &[], &mut st).await.unwrap();
        assert!(outcome.is_success());
        let Some(ToolPayload::Search(products)) = outcome.payload() else {
            panic!("expected search results");
        };
        assert!(products.iter().all(|p| p.brand == "Dell"));
        assert_eq!(st.error_count(), 1);
        assert_eq!(st.tools_used(), ["search"]);
        assert_eq!(st.trace().by_action("search").count(), 1);
        assert_eq!(st.trace().by_action("extract").count(), 1);
    }

    #[tokio::test]
    async fn test_model_params_reach_the_tool() {
        let provider = ScriptedProvider::new().respond(
            prompts::TASK_SEARCH,
            r#"{"query": "laptop dell", "brand": "Dell", "price_max": 20000000}"#,
        );
        let d = dispatcher(provider, Arc::new(MemoryCatalog::new()), 1);
        let mut st = state("Tìm laptop Dell dưới 20 triệu", Intent::Search);
        d.dispatch(Intent::Search, "Tìm laptop Dell dưới 20 triệu", &[], &mut st)
            .await
            .unwrap();

        let step = st.trace().by_action("search").next().unwrap();
        assert!(step.rationale.contains(r#""brand":"Dell""#));
        assert!(step.rationale.contains(r#""price_max":20000000"#));
        assert_eq!(st.error_count(), 0);
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried() {
        let catalog = FlakyCatalog::new(1);
        let d = dispatcher(ScriptedProvider::new(), catalog.clone(), 1);
        let mut st = state("tìm laptop", Intent::Search);
        let params = ExtractedParams::Search(SearchParams {
            query: "laptop".into(),
            ..Default::default()
        });

        let outcome = d.dispatch_with(ToolKind::Search, &params, &mut st).await.unwrap();
        assert!(matches!(outcome, ToolOutcome::Success(_)));
        assert_eq!(catalog.searches(), 2);
        assert_eq!(st.error_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_failure() {
        let catalog = FlakyCatalog::new(5);
        let d = dispatcher(ScriptedProvider::new(), catalog.clone(), 1);
        let mut st = state("tìm laptop", Intent::Search);
        let params = ExtractedParams::Search(SearchParams {
            query: "laptop".into(),
            ..Default::default()
        });

        let outcome = d.dispatch_with(ToolKind::Search, &params, &mut st).await.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(catalog.searches(), 2);
        assert_eq!(st.error_count(), 1);
        assert!(st.tool_result(ToolKind::Search).is_some());
    }

    #[tokio::test]
    async fn test_invalid_params_fail_without_retry() {
        let d = dispatcher(ScriptedProvider::new(), Arc::new(MemoryCatalog::new()), 3);
        let mut st = state("so sánh", Intent::Compare);
        let params = ExtractedParams::Compare(CompareParams::default());

        let outcome = d.dispatch_with(ToolKind::Compare, &params, &mut st).await.unwrap();
        assert!(matches!(outcome, ToolOutcome::Failure { .. }));
        assert_eq!(st.error_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_tool_is_unrecoverable() {
        let extractor = ParameterExtractor::new(
            Arc::new(ScriptedProvider::failing()),
            &GenerationOptions::default(),
            Arc::new(ExtractionCache::new(Duration::from_secs(60))),
            Duration::from_secs(5),
        );
        let d = ToolDispatcher::new(Arc::new(ToolRegistry::new()), extractor, Duration::from_secs(5), 1);
        let mut st = state("tìm laptop", Intent::Search);

        let result = d.dispatch(Intent::Search, "tìm laptop", &[], &mut st).await;
        assert!(matches!(result, Err(AgentError::ToolNotFound(_))));
    }
}
