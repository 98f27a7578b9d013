//! Test doubles shared by the unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use agent_core::provider::Completion;
use agent_core::{AgentError, GenerationOptions, LlmProvider, Message, Result};

use crate::catalog::{MemoryCatalog, ProductCatalog, ProductFilter};
use crate::error::{AdvisorError, Result as AdvisorResult};
use crate::model::{Product, Review};
use crate::prompts;

/// Completion service that answers by prompt task tag and records calls
#[derive(Default)]
pub struct ScriptedProvider {
    replies: HashMap<String, String>,
    failing_tasks: HashSet<String>,
    fail_all: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    /// No scripted replies; synthesis echoes the tool data it was given
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as unavailable
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn respond(mut self, task: &str, reply: &str) -> Self {
        self.replies.insert(task.to_string(), reply.to_string());
        self
    }

    pub fn fail_task(mut self, task: &str) -> Self {
        self.failing_tasks.insert(task.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, task: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(t, _)| t == task).count()
    }

    pub fn prompts_for(&self, task: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == task)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn echo_tool_data(prompt: &str) -> String {
        let data = prompt
            .split_once("Dữ liệu từ công cụ:")
            .map(|(_, rest)| rest)
            .and_then(|rest| rest.split_once("Hội thoại trước:"))
            .map_or("", |(data, _)| data.trim());
        format!("Dựa trên dữ liệu hiện có:\n{data}")
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail_all)
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let task = prompts::task_of(&prompt).unwrap_or("untagged").to_string();
        self.calls.lock().unwrap().push((task.clone(), prompt.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all || self.failing_tasks.contains(&task) {
            return Err(AgentError::ProviderUnavailable("scripted failure".into()));
        }

        let content = match self.replies.get(&task) {
            Some(reply) => reply.clone(),
            None if task == prompts::TASK_SYNTHESIS => Self::echo_tool_data(&prompt),
            None => return Err(AgentError::ProviderUnavailable(format!("no reply for {task}"))),
        };
        Ok(Completion {
            content,
            model: options.model.clone(),
            usage: None,
            finish_reason: None,
        })
    }
}

/// Catalog whose searches fail a fixed number of times before recovering
pub struct FlakyCatalog {
    inner: MemoryCatalog,
    failures_left: AtomicUsize,
    pub searches: AtomicUsize,
}

impl FlakyCatalog {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCatalog::new(),
            failures_left: AtomicUsize::new(failures),
            searches: AtomicUsize::new(0),
        })
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalog for FlakyCatalog {
    async fn search(&self, query: &str, filter: &ProductFilter, top_k: usize) -> AdvisorResult<Vec<Product>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AdvisorError::Catalog("index unavailable".into()));
        }
        self.inner.search(query, filter, top_k).await
    }

    async fn find_by_name(&self, name: &str) -> AdvisorResult<Option<Product>> {
        self.inner.find_by_name(name).await
    }

    async fn reviews(&self, product_id: &str) -> AdvisorResult<Vec<Review>> {
        self.inner.reviews(product_id).await
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "flaky"
    }
}
