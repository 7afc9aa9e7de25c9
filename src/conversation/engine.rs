// src/conversation/engine.rs
//! Step transitions for the intake script and the side effects they trigger.
//!
//! | step         | expects  | then                                   |
//! |--------------|----------|----------------------------------------|
//! | Greet        | anything | greet, -> AskComplaint                 |
//! | AskComplaint | text     | store text, ask location               |
//! | AskLocation  | location | store coordinates, ask for a photo     |
//! | AskImage     | image    | fetch media, submit, state removed     |
//!
//! Any other input for a step is ignored without a reply.

use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state::{ConversationState, ConversationStore, Step};
use crate::archive::ComplaintArchive;
use crate::config::Replies;
use crate::submit::{SubmissionResult, Submitter};
use crate::telemetry::anon_id;
use crate::whatsapp::{Coordinates, InboundMessage, MessageKind, Messenger};

/// What the current step makes of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Greet,
    RecordComplaint(String),
    RecordLocation(Coordinates),
    FetchImage { media_id: String },
    Ignore,
}

pub fn decide(step: Step, kind: &MessageKind) -> Action {
    match (step, kind) {
        (Step::Greet, _) => Action::Greet,
        (Step::AskComplaint, MessageKind::Text(body)) => Action::RecordComplaint(body.clone()),
        (Step::AskLocation, MessageKind::Location(c)) => Action::RecordLocation(*c),
        (Step::AskImage, MessageKind::Image { media_id }) => Action::FetchImage {
            media_id: media_id.clone(),
        },
        _ => Action::Ignore,
    }
}

/// Result of handling one message, mostly for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Greeted,
    ComplaintRecorded,
    LocationRecorded,
    /// Media id could not be resolved; still waiting for an image.
    MediaLookupFailed,
    /// Media URL could not be downloaded; still waiting for an image.
    MediaDownloadFailed,
    /// Terminal: the conversation state is gone either way.
    Submitted(SubmissionResult),
    Ignored,
}

pub struct Intake {
    states: ConversationStore,
    messenger: Arc<dyn Messenger>,
    submitter: Submitter,
    archive: Option<ComplaintArchive>,
    replies: Replies,
}

impl Intake {
    pub fn new(messenger: Arc<dyn Messenger>, submitter: Submitter, replies: Replies) -> Self {
        Self {
            states: ConversationStore::new(),
            messenger,
            submitter,
            archive: None,
            replies,
        }
    }

    pub fn with_archive(mut self, archive: ComplaintArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.states
    }

    /// Advance `msg.from`'s conversation by one message.
    /// Events for the same user are handled one at a time.
    pub async fn handle(&self, msg: &InboundMessage) -> Outcome {
        let _guard = self.states.lock(&msg.from).await;
        let mut state = self.states.get(&msg.from);

        match decide(state.step, &msg.kind) {
            Action::Greet => {
                self.reply(&msg.from, &self.replies.greeting).await;
                state.step = Step::AskComplaint;
                self.states.put(&msg.from, state);
                Outcome::Greeted
            }
            Action::RecordComplaint(text) => {
                state.draft.complaint_text = Some(text);
                self.reply(&msg.from, &self.replies.ask_location).await;
                state.step = Step::AskLocation;
                self.states.put(&msg.from, state);
                Outcome::ComplaintRecorded
            }
            Action::RecordLocation(coords) => {
                state.draft.location = Some(coords);
                self.reply(&msg.from, &self.replies.ask_image).await;
                state.step = Step::AskImage;
                self.states.put(&msg.from, state);
                Outcome::LocationRecorded
            }
            Action::FetchImage { media_id } => self.finish(msg, state, &media_id).await,
            Action::Ignore => {
                debug!(
                    target: "intake",
                    user = %anon_id(&msg.from),
                    step = ?state.step,
                    kind = msg.kind.label(),
                    "unexpected input for step, waiting"
                );
                Outcome::Ignored
            }
        }
    }

    /// AskImage with an image in hand. Media failures keep the state so the
    /// user can resend; once submission is attempted the state is dropped.
    async fn finish(&self, msg: &InboundMessage, mut state: ConversationState, media_id: &str) -> Outcome {
        let user = anon_id(&msg.from);

        let url = match self.messenger.media_url(media_id).await {
            Ok(url) => url,
            Err(e) => {
                counter!("intake_media_failures_total", "stage" => "lookup").increment(1);
                warn!(target: "intake", %user, error = %e, "media lookup failed");
                self.reply(&msg.from, &self.replies.media_lookup_failed).await;
                return Outcome::MediaLookupFailed;
            }
        };
        let bytes = match self.messenger.download_media(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                counter!("intake_media_failures_total", "stage" => "download").increment(1);
                warn!(target: "intake", %user, error = %e, "media download failed");
                self.reply(&msg.from, &self.replies.media_download_failed).await;
                return Outcome::MediaDownloadFailed;
            }
        };
        state.draft.image = Some(bytes);

        let Some(draft) = state.draft.complete() else {
            // Only reachable if the stored draft skipped a step.
            warn!(target: "intake", %user, "incomplete draft at image step, dropping conversation");
            self.reply(&msg.from, &self.replies.registration_failed).await;
            self.states.remove(&msg.from);
            return Outcome::Submitted(SubmissionResult::Failed);
        };

        if let Some(archive) = &self.archive {
            match archive.save(&msg.from, &draft).await {
                Ok(folder) => debug!(target: "intake", %user, folder = %folder.display(), "draft archived"),
                Err(e) => warn!(target: "intake", %user, error = %e, "draft archive failed"),
            }
        }

        let result = self
            .submitter
            .submit(&msg.from, msg.profile_name.as_deref(), &draft)
            .await;

        // The closing reply goes out while this user's lock is still
        // registered, so a new message cannot be greeted ahead of it.
        match &result {
            SubmissionResult::Registered { complaint_id } => {
                let text = self.replies.registered_with(complaint_id);
                self.reply(&msg.from, &text).await;
            }
            SubmissionResult::Failed => {
                self.reply(&msg.from, &self.replies.registration_failed).await;
            }
        }
        self.states.remove(&msg.from);
        info!(target: "intake", %user, registered = result.complaint_id().is_some(), "conversation finished");
        Outcome::Submitted(result)
    }

    /// Delivery problems are logged; they never change the transition.
    async fn reply(&self, to: &str, body: &str) {
        if let Err(e) = self.messenger.send_text(to, body).await {
            counter!("intake_replies_failed_total").increment(1);
            warn!(target: "intake", user = %anon_id(to), messenger = self.messenger.name(), error = %e, "reply not delivered");
        }
    }
}
