// src/conversation/mod.rs
pub mod engine;
pub mod state;

pub use engine::{decide, Action, Intake, Outcome};
pub use state::{CompleteDraft, ComplaintDraft, ConversationState, ConversationStore, Step};
