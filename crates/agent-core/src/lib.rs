//! # agent-core
//!
//! Provider-agnostic building blocks for conversational agents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      agent-core                               │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────┐  │
//! │  │ LlmProvider │  │    Tools    │  │  ExtractionCache     │  │
//! │  │ (Strategy)  │  │  Registry   │  │  (TTL, hashed keys)  │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────┘  │
//! │  ┌─────────────────────────────┐  ┌──────────────────────┐   │
//! │  │ SessionStore (per-session   │  │  ReasoningTrace      │   │
//! │  │ locks, FIFO history window) │  │                      │   │
//! │  └─────────────────────────────┘  └──────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Ollama, OpenAI, Anthropic,
//! or any other completion service without changing agent logic.

pub mod cache;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;

pub use cache::{CacheKey, ExtractionCache};
pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use provider::{GenerationOptions, LlmProvider};
pub use reasoning::{ReasoningStep, ReasoningTrace};
pub use session::{SessionGuard, SessionId, SessionRecord, SessionStore, Turn};
pub use tool::{ParameterSchema, Tool, ToolCall, ToolResult, ToolRegistry, ToolSchema};
