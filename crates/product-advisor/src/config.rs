//! Advisor Configuration
//!
//! Plain key/value settings, read from the process environment by default.

use std::str::FromStr;
use std::time::Duration;

use agent_core::{AgentError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvisorConfig {
    /// Turns kept per session, at least 1
    pub history_cap: usize,

    /// Turns shown to classification and synthesis prompts
    pub history_window: usize,

    pub cache_ttl: Duration,

    /// Deadline for every model and tool call
    pub call_timeout: Duration,

    /// Extra attempts for retryable tool errors
    pub max_tool_retries: u32,

    pub session_idle: Duration,
    pub sweep_interval: Duration,
    pub model: String,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            history_cap: 5,
            history_window: 3,
            cache_ttl: Duration::from_secs(3600),
            call_timeout: Duration::from_millis(30_000),
            max_tool_retries: 1,
            session_idle: Duration::from_secs(1800),
            sweep_interval: Duration::from_secs(300),
            model: "llama3.2".into(),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AgentError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}

fn positive(key: &str, value: u64) -> Result<u64> {
    if value == 0 {
        return Err(AgentError::Config(format!("{key} must be greater than 0")));
    }
    Ok(value)
}

impl AdvisorConfig {
    /// Read settings from any key/value source, keeping defaults for absent keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let history_cap = parsed(&lookup, "ADVISOR_HISTORY_CAP", defaults.history_cap)?;
        if history_cap == 0 {
            return Err(AgentError::Config("ADVISOR_HISTORY_CAP must be at least 1".into()));
        }
        let history_window = parsed(&lookup, "ADVISOR_HISTORY_WINDOW", defaults.history_window)?;

        let cache_ttl = positive(
            "ADVISOR_CACHE_TTL_SECS",
            parsed(&lookup, "ADVISOR_CACHE_TTL_SECS", defaults.cache_ttl.as_secs())?,
        )?;
        let timeout_ms = positive(
            "ADVISOR_CALL_TIMEOUT_MS",
            parsed(&lookup, "ADVISOR_CALL_TIMEOUT_MS", 30_000_u64)?,
        )?;
        let idle = positive(
            "ADVISOR_SESSION_IDLE_SECS",
            parsed(&lookup, "ADVISOR_SESSION_IDLE_SECS", defaults.session_idle.as_secs())?,
        )?;
        let sweep = positive(
            "ADVISOR_SWEEP_INTERVAL_SECS",
            parsed(&lookup, "ADVISOR_SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs())?,
        )?;

        let model = lookup("ADVISOR_MODEL")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or(defaults.model);

        Ok(Self {
            history_cap,
            history_window,
            cache_ttl: Duration::from_secs(cache_ttl),
            call_timeout: Duration::from_millis(timeout_ms),
            max_tool_retries: parsed(&lookup, "ADVISOR_MAX_TOOL_RETRIES", defaults.max_tool_retries)?,
            session_idle: Duration::from_secs(idle),
            sweep_interval: Duration::from_secs(sweep),
            model,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AdvisorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AdvisorConfig::default());
        assert_eq!(config.call_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = AdvisorConfig::from_lookup(lookup(&[
            ("ADVISOR_HISTORY_CAP", "8"),
            ("ADVISOR_CALL_TIMEOUT_MS", " 2500 "),
            ("ADVISOR_MAX_TOOL_RETRIES", "0"),
            ("ADVISOR_MODEL", "qwen2.5"),
        ]))
        .unwrap();
        assert_eq!(config.history_cap, 8);
        assert_eq!(config.call_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_tool_retries, 0);
        assert_eq!(config.model, "qwen2.5");
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for pairs in [
            [("ADVISOR_HISTORY_CAP", "0")],
            [("ADVISOR_CACHE_TTL_SECS", "soon")],
            [("ADVISOR_CALL_TIMEOUT_MS", "0")],
            [("ADVISOR_MAX_TOOL_RETRIES", "-1")],
        ] {
            let result = AdvisorConfig::from_lookup(lookup(&pairs));
            assert!(matches!(result, Err(AgentError::Config(_))), "{pairs:?}");
        }
    }
}
