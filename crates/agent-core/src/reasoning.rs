//! Reasoning Trace
//!
//! Append-only record of what a turn did and why. Used for diagnostics and
//! tests; never shown to the end user.

use serde::{Deserialize, Serialize};

/// Maximum characters kept for an observation
const OBSERVATION_LIMIT: usize = 160;

/// One step of a turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 1-based position in the trace
    pub step: usize,

    /// What was done (state transition or tool name)
    pub action: String,

    /// Why, or with which parameters
    pub rationale: String,

    /// Summarized outcome
    pub observation: String,
}

/// Ordered list of reasoning steps
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasoningTrace {
    steps: Vec<ReasoningStep>,
}

impl ReasoningTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, truncating long observations
    pub fn record(
        &mut self,
        action: impl Into<String>,
        rationale: impl Into<String>,
        observation: impl AsRef<str>,
    ) {
        let step = ReasoningStep {
            step: self.steps.len() + 1,
            action: action.into(),
            rationale: rationale.into(),
            observation: summarize(observation.as_ref(), OBSERVATION_LIMIT),
        };
        tracing::trace!(step = step.step, action = %step.action, "Reasoning step");
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps whose action matches `action`
    pub fn by_action<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a ReasoningStep> + 'a {
        self.steps.iter().filter(move |s| s.action == action)
    }

    pub fn into_steps(self) -> Vec<ReasoningStep> {
        self.steps
    }
}

/// Char-safe truncation with an ellipsis
pub fn summarize(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_are_numbered_in_order() {
        let mut trace = ReasoningTrace::new();
        trace.record("start", "turn received", "");
        trace.record("search", "{\"query\":\"laptop\"}", "3 products");
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.steps()[0].step, 1);
        assert_eq!(trace.steps()[1].action, "search");
        assert_eq!(trace.by_action("search").count(), 1);
    }

    #[test]
    fn test_summarize_is_char_safe() {
        assert_eq!(summarize("điện thoại", 4), "điện...");
        assert_eq!(summarize("ngắn", 10), "ngắn");
    }
}
