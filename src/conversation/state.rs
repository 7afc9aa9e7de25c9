// src/conversation/state.rs
//! In-memory conversation state keyed by phone number.
//!
//! Lifecycle: a missing entry reads as a fresh `Greet` state; the engine
//! writes the entry back after every transition and removes it once the
//! terminal submission has been attempted. Nothing expires on its own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::whatsapp::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Step {
    #[default]
    Greet,
    AskComplaint,
    AskLocation,
    AskImage,
}

/// Fields collected so far. Which ones are set is implied by the step:
/// text from `AskLocation` on, location from `AskImage` on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplaintDraft {
    pub complaint_text: Option<String>,
    pub location: Option<Coordinates>,
    pub image: Option<Vec<u8>>,
}

/// A draft with every field present; the only thing that can be submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteDraft {
    pub complaint_text: String,
    pub location: Coordinates,
    pub image: Vec<u8>,
}

impl ComplaintDraft {
    pub fn complete(&self) -> Option<CompleteDraft> {
        Some(CompleteDraft {
            complaint_text: self.complaint_text.clone()?,
            location: self.location?,
            image: self.image.clone()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub step: Step,
    pub draft: ComplaintDraft,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    states: Mutex<HashMap<String, ConversationState>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, or a fresh `Greet` state if the user has none.
    pub fn get(&self, user_id: &str) -> ConversationState {
        self.states
            .lock()
            .expect("conversation states poisoned")
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn put(&self, user_id: &str, state: ConversationState) {
        self.states
            .lock()
            .expect("conversation states poisoned")
            .insert(user_id.to_string(), state);
    }

    pub fn remove(&self, user_id: &str) -> Option<ConversationState> {
        let removed = self
            .states
            .lock()
            .expect("conversation states poisoned")
            .remove(user_id);

        // Drop the user's lock too unless someone else is queued on it
        // (map + the caller's guard = 2 references).
        let mut locks = self.locks.lock().expect("conversation locks poisoned");
        if locks
            .get(user_id)
            .is_some_and(|l| Arc::strong_count(l) <= 2)
        {
            locks.remove(user_id);
        }
        removed
    }

    /// Step of a parked conversation, `None` when the user has no state.
    pub fn step_of(&self, user_id: &str) -> Option<Step> {
        self.states
            .lock()
            .expect("conversation states poisoned")
            .get(user_id)
            .map(|s| s.step)
    }

    /// Number of conversations currently parked at some step.
    pub fn active(&self) -> usize {
        self.states.lock().expect("conversation states poisoned").len()
    }

    /// Serialize event handling per user. Hold the guard across get/put/remove.
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("conversation locks poisoned");
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
