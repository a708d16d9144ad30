//! Conversation loop
//!
//! Turns one inbound chat request into a sequence of provider calls and tool
//! executions, ending in a single [`ChatOutcome`].

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{ChatOutcome, ChatRequest, ConversationOrchestrator};
pub use prompt::planning_prompt;
