//! Language-model layer.
//!
//! Two model calls drive a turn: generation (question → database/action/SQL
//! triple) and summarization (rows → natural-language answer). Both go
//! through the `ChatBackend` seam so tests can script responses without a
//! live endpoint.

pub mod client;
pub mod generation;
pub mod summary;

pub use client::{ChatBackend, ChatMessage, LlmClient};
pub use generation::{Action, GenerationPlan, generate};
pub use summary::{EMPTY_RESULT_SUMMARY, MAX_SUMMARY_ROWS, summarize};
