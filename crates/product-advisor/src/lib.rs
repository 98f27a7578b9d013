//! # product-advisor
//!
//! Conversational advisor for laptops and smartphones. Each user turn runs
//! through a fixed state machine that picks an intent, calls the catalog
//! tools that serve it and writes a grounded Vietnamese answer.
//!
//! ## Turn flow
//!
//! ```text
//! Start ─▶ ClassifyIntent ─▶ Greeting | Search | Compare | Recommend
//!                            | Review | Direct | Error ─▶ Synthesize ─▶ Done
//! ```
//!
//! - **Reference resolution** maps "so sánh 2 cái đầu" or "compare them" onto
//!   products of earlier turns and skips the classifier call.
//! - **Extraction** asks the model for structured tool parameters, caches
//!   valid answers and falls back to regex rules otherwise.
//! - **Failures degrade**: extraction and tool failures bump `error_count`
//!   and the turn continues; only unrecoverable faults end in an apology.
//!
//! ## Example
//!
//! ```rust,ignore
//! use product_advisor::{MemoryCatalog, Orchestrator};
//!
//! let advisor = Orchestrator::builder()
//!     .provider(provider)
//!     .catalog(Arc::new(MemoryCatalog::new()))
//!     .build()?;
//! let reply = advisor.handle_turn(&session_id, "Tìm laptop Dell dưới 20 triệu").await;
//! ```

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extract;
pub mod intent;
pub mod keywords;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod reference;
pub mod state;
pub mod svckit;
pub mod synthesizer;

#[cfg(test)]
mod testing;

pub use catalog::{MemoryCatalog, ProductCatalog, ProductFilter};
pub use config::AdvisorConfig;
pub use error::{AdvisorError, Result};
pub use intent::{Intent, IntentClassifier};
pub use keywords::KeywordTable;
pub use model::{Category, Product, Review};
pub use orchestrator::{AdvisorBuilder, Orchestrator};
pub use reference::{ReferenceResolver, Resolution};
pub use state::{ConversationState, TurnResponse};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{CompareTool, RecommendTool, ReviewTool, SearchTool};
}
