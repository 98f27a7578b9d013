//! Turn Orchestration
//!
//! Drives one turn through a fixed state machine:
//!
//! ```text
//! Start -> ClassifyIntent -> { Greeting | Search | Compare | Recommend
//!                             | Review | Direct | Error } -> Synthesize -> Done
//! ```
//!
//! `Error` skips synthesis and answers with a fixed apology. Every transition
//! appends one reasoning step. The session stays locked for the whole turn,
//! so turns of one session run in submission order while other sessions
//! proceed in parallel.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use agent_core::{
    AgentError, ExtractionCache, GenerationOptions, LlmProvider, Result, SessionId, SessionStore,
    ToolRegistry, Turn,
};

use crate::catalog::ProductCatalog;
use crate::config::AdvisorConfig;
use crate::dispatcher::ToolDispatcher;
use crate::extract::{CompareParams, ExtractedParams, ParameterExtractor, ReviewParams};
use crate::intent::{Classification, Intent, IntentClassifier};
use crate::keywords::KeywordTable;
use crate::reference::ReferenceResolver;
use crate::state::{APOLOGY, ConversationState, ToolKind, ToolOutcome, TurnResponse};
use crate::svckit::{self, compare};
use crate::synthesizer::ResponseSynthesizer;

/// States of a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Start,
    ClassifyIntent,
    Branch(Intent),
    Synthesize,
    Done,
}

impl Stage {
    fn label(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::ClassifyIntent => "classify_intent",
            Stage::Branch(_) => "route",
            Stage::Synthesize => "synthesize",
            Stage::Done => "done",
        }
    }
}

/// Builder for [`Orchestrator`]
#[derive(Default)]
pub struct AdvisorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    catalog: Option<Arc<dyn ProductCatalog>>,
    registry: Option<ToolRegistry>,
    sessions: Option<Arc<SessionStore>>,
    keywords: Option<KeywordTable>,
    config: AdvisorConfig,
}

impl AdvisorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Serve the four catalog tools from `catalog`
    pub fn catalog(mut self, catalog: Arc<dyn ProductCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use a prepared tool registry instead of the catalog tools
    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an existing session store
    pub fn sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn keywords(mut self, keywords: KeywordTable) -> Self {
        self.keywords = Some(keywords);
        self
    }

    pub fn config(mut self, config: AdvisorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("a completion provider is required".into()))?;
        let registry = match (self.registry, self.catalog) {
            (Some(registry), _) => registry,
            (None, Some(catalog)) => svckit::registry(&catalog),
            (None, None) => {
                return Err(AgentError::Config("a product catalog or tool registry is required".into()));
            }
        };
        let keywords = Arc::new(self.keywords.unwrap_or_default());
        keywords.validate()?;

        let config = self.config;
        let options = GenerationOptions::for_model(config.model.clone());
        let cache = Arc::new(ExtractionCache::new(config.cache_ttl));
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(SessionStore::new(config.history_cap)));

        let extractor = ParameterExtractor::new(
            Arc::clone(&provider),
            &options,
            Arc::clone(&cache),
            config.call_timeout,
        );

        Ok(Orchestrator {
            resolver: ReferenceResolver::new(Arc::clone(&keywords)),
            classifier: IntentClassifier::new(
                Arc::clone(&provider),
                &options,
                Arc::clone(&keywords),
                config.call_timeout,
            ),
            dispatcher: ToolDispatcher::new(
                Arc::new(registry),
                extractor,
                config.call_timeout,
                config.max_tool_retries,
            ),
            synthesizer: ResponseSynthesizer::new(
                Arc::clone(&provider),
                &options,
                config.call_timeout,
                config.history_window,
            ),
            provider,
            cache,
            sessions,
            config,
        })
    }
}

/// Single entry point of the advisor
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    resolver: ReferenceResolver,
    classifier: IntentClassifier,
    dispatcher: ToolDispatcher,
    synthesizer: ResponseSynthesizer,
    cache: Arc<ExtractionCache<ExtractedParams>>,
    sessions: Arc<SessionStore>,
    config: AdvisorConfig,
}

impl Orchestrator {
    pub fn builder() -> AdvisorBuilder {
        AdvisorBuilder::new()
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn tools(&self) -> Vec<&str> {
        self.dispatcher.registered()
    }

    pub async fn provider_healthy(&self) -> bool {
        self.provider.health_check().await.unwrap_or(false)
    }

    /// Start the cache sweeper and the idle-session evictor
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        vec![
            Arc::clone(&self.cache).spawn_sweeper(self.config.sweep_interval),
            Arc::clone(&self.sessions).spawn_evictor(self.config.sweep_interval, self.config.session_idle),
        ]
    }

    /// Process one user turn
    ///
    /// Safe to call concurrently; turns of the same session are serialized.
    /// The response text is never empty and never carries raw error text.
    pub async fn handle_turn(&self, session_id: &SessionId, raw_text: &str) -> TurnResponse {
        let started = Instant::now();

        let mut guard = match self.sessions.begin_turn(session_id).await {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!(session = %session_id, error = %e, "Session unavailable");
                let mut state = ConversationState::new(session_id.clone(), raw_text, &[]);
                transition(&mut state, Stage::Start, "turn received", "");
                Self::fail(&mut state, &e);
                transition(&mut state, Stage::Done, "apology", "session unavailable");
                return state.finish(APOLOGY.to_string());
            }
        };

        let history = guard.record().recent_turns(self.config.history_window);
        let previous = guard.record().previous_entities.clone();
        let mut state = ConversationState::new(session_id.clone(), raw_text, &history);
        transition(
            &mut state,
            Stage::Start,
            "turn received",
            format!("{} earlier turns, {} known entities", history.len(), previous.len()),
        );

        let classification = self.classify(raw_text, &previous, &mut state).await;
        let intent = classification.intent;

        let response = match self.run_branch(intent, &previous, &mut state).await {
            Ok(()) => self.synthesize(intent, &history, &mut state).await,
            Err(e) => {
                Self::fail(&mut state, &e);
                APOLOGY.to_string()
            }
        };

        state.carry_forward_entities();
        let entities = state.resolved_entities().to_vec();
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let summary = format!("errors {}, entities [{}]", state.error_count(), entities.join(", "));
        transition(&mut state, Stage::Done, format!("{elapsed_ms} ms"), summary);

        let response = state.finish(response);
        guard.append(
            Turn::new(raw_text, response.response.clone(), response.intent.as_str()),
            &entities,
        );
        tracing::info!(
            session = %session_id,
            intent = %response.intent,
            tools = ?response.tools_used,
            error_count = response.error_count,
            elapsed_ms,
            "Turn handled"
        );
        response
    }

    async fn classify(
        &self,
        input: &str,
        previous: &[String],
        state: &mut ConversationState,
    ) -> Classification {
        let resolution = self.resolver.resolve(input, previous);
        // every message but the current input
        let messages = state.messages();
        let earlier = &messages[..messages.len().saturating_sub(1)];
        let classification = self.classifier.classify(input, &resolution, earlier).await;

        state.set_intent(classification.intent);
        if !classification.entities.is_empty() {
            state.set_entities(classification.entities.clone());
        }

        let mut observation = format!("intent {}", classification.intent);
        if !classification.entities.is_empty() {
            observation.push_str(&format!(", entities [{}]", classification.entities.join(", ")));
        }
        if let Some(reason) = &classification.fallback_reason {
            observation.push_str(&format!(", fallback: {reason}"));
        }
        transition(
            state,
            Stage::ClassifyIntent,
            format!("{:?}", classification.method).to_lowercase(),
            observation,
        );
        classification
    }

    /// Run the tools of the intent's branch
    ///
    /// Only unrecoverable faults are returned; everything else is folded
    /// into the state.
    async fn run_branch(
        &self,
        intent: Intent,
        previous: &[String],
        state: &mut ConversationState,
    ) -> Result<()> {
        if intent == Intent::Error {
            // `fail` records the transition into the error branch
            return Err(AgentError::Classification(
                "neither the model nor the keyword rules could classify the turn".into(),
            ));
        }
        transition(state, Stage::Branch(intent), format!("{intent} branch"), "");
        let input = state.turn_input().to_string();

        match intent {
            Intent::Greeting | Intent::Direct | Intent::Error => Ok(()),
            Intent::Search | Intent::Recommend => {
                self.dispatcher.dispatch(intent, &input, previous, state).await?;
                Ok(())
            }
            Intent::Compare => self.compare(&input, previous, state).await,
            Intent::Review => self.review(&input, previous, state).await,
        }
    }

    async fn compare(&self, input: &str, previous: &[String], state: &mut ConversationState) -> Result<()> {
        let (mut names, aspects) = if state.resolved_entities().len() >= compare::MIN_PRODUCTS {
            (state.resolved_entities().to_vec(), Vec::new())
        } else {
            match self.dispatcher.extract(ToolKind::Compare, input, previous, state).await {
                ExtractedParams::Compare(p) => {
                    // "cái nào tốt hơn" and the like are not product names
                    let named = p.products.into_iter().filter(|n| !self.resolver.is_reference(n)).collect();
                    (fill_targets(named, previous), p.aspects)
                }
                _ => (fill_targets(Vec::new(), previous), Vec::new()),
            }
        };

        if names.len() < compare::MIN_PRODUCTS {
            // nothing to compare yet, so look candidates up first
            let wanted = if names.is_empty() { compare::MAX_PRODUCTS } else { compare::MIN_PRODUCTS };
            let found = self.dispatcher.dispatch(Intent::Search, input, previous, state).await?;
            if let Some(payload) = found.payload() {
                for name in payload.entity_names() {
                    if names.len() >= wanted {
                        break;
                    }
                    if !contains_name(&names, &name) {
                        names.push(name);
                    }
                }
            }
        }

        if names.len() < compare::MIN_PRODUCTS {
            let outcome = ToolOutcome::NoResults {
                message: format!("only {} product(s) identified", names.len()),
            };
            state.record(ToolKind::Compare.name(), format!("{names:?}"), outcome.summary());
            state.record_tool(ToolKind::Compare, outcome);
            return Ok(());
        }

        names.truncate(compare::MAX_PRODUCTS);
        let params = ExtractedParams::Compare(CompareParams { products: names, aspects });
        self.dispatcher.dispatch_with(ToolKind::Compare, &params, state).await?;
        Ok(())
    }

    async fn review(&self, input: &str, previous: &[String], state: &mut ConversationState) -> Result<()> {
        let resolved = state.resolved_entities().first().cloned();
        let mut params = match self.dispatcher.extract(ToolKind::Review, input, previous, state).await {
            ExtractedParams::Review(p) => p,
            _ => ReviewParams::default(),
        };

        // a product the turn names itself wins over a resolved reference
        let named = !params.product.trim().is_empty() && !self.resolver.is_reference(&params.product);
        if !named {
            params.product = resolved
                .or_else(|| previous.first().cloned())
                .unwrap_or_default();
        }

        if params.product.trim().is_empty() {
            let outcome = ToolOutcome::NoResults {
                message: "no product named".into(),
            };
            state.record(ToolKind::Review.name(), "{}", outcome.summary());
            state.record_tool(ToolKind::Review, outcome);
            return Ok(());
        }

        self.dispatcher
            .dispatch_with(ToolKind::Review, &ExtractedParams::Review(params), state)
            .await?;
        Ok(())
    }

    async fn synthesize(&self, intent: Intent, history: &[Turn], state: &mut ConversationState) -> String {
        let synthesis = self
            .synthesizer
            .synthesize(state.turn_input(), intent, state.tool_results(), history)
            .await;

        let rationale = if synthesis.used_model { "model" } else { "template" };
        let observation = match &synthesis.failure {
            Some(reason) => {
                state.note_error();
                format!("model failed: {reason}")
            }
            None => format!("{} chars", synthesis.text.chars().count()),
        };
        transition(state, Stage::Synthesize, rationale, observation);
        synthesis.text
    }

    /// Route to the `Error` state
    fn fail(state: &mut ConversationState, error: &AgentError) {
        tracing::error!(session = %state.session_id(), error = %error, "Unrecoverable fault, answering with apology");
        state.set_intent(Intent::Error);
        state.note_error();
        transition(state, Stage::Branch(Intent::Error), "unrecoverable fault", error.to_string());
    }
}

fn transition(
    state: &mut ConversationState,
    stage: Stage,
    rationale: impl Into<String>,
    observation: impl AsRef<str>,
) {
    tracing::debug!(session = %state.session_id(), stage = ?stage, "Transition");
    state.record(stage.label(), rationale, observation);
}

fn contains_name(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Complete comparison targets from earlier entities
///
/// One named product is paired with the first different earlier entity; no
/// named product means all earlier entities.
fn fill_targets(mut names: Vec<String>, previous: &[String]) -> Vec<String> {
    match names.len() {
        0 if previous.len() >= compare::MIN_PRODUCTS => {
            previous.iter().take(compare::MAX_PRODUCTS).cloned().collect()
        }
        1 => {
            if let Some(other) = previous.iter().find(|p| !contains_name(&names, p)) {
                names.insert(0, other.clone());
            }
            names
        }
        _ => names,
    }
}
