// src/submit.rs
//! Complaint submission: profile, complaint row, image, then a detached
//! categorization call. Later steps never roll back earlier ones.

use metrics::counter;
use std::sync::Arc;
use tracing::{info, warn};

use crate::classify::DynCategorizer;
use crate::conversation::CompleteDraft;
use crate::error::{IntakeError, IntakeResult};
use crate::store::{ComplaintImage, ComplaintStore, NewComplaint, Profile};
use crate::telemetry::anon_id;

pub const COMPLAINT_TITLE: &str = "WhatsApp complaint";
pub const NO_DESCRIPTION: &str = "No description provided";
pub const DEFAULT_CATEGORY: &str = "Other";
pub const DEFAULT_STATUS: &str = "pending";
pub const DEFAULT_PRIORITY: &str = "medium";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Registered { complaint_id: String },
    Failed,
}

impl SubmissionResult {
    pub fn complaint_id(&self) -> Option<&str> {
        match self {
            SubmissionResult::Registered { complaint_id } => Some(complaint_id),
            SubmissionResult::Failed => None,
        }
    }
}

/// Complaint row for `draft`, owned by `citizen_id`, with default
/// category/priority until a categorizer corrects them.
pub fn build_complaint(citizen_id: &str, draft: &CompleteDraft) -> NewComplaint {
    let lat = draft.location.latitude;
    let lng = draft.location.longitude;
    let description = match draft.complaint_text.trim() {
        "" => NO_DESCRIPTION.to_string(),
        _ => draft.complaint_text.clone(),
    };
    NewComplaint {
        title: COMPLAINT_TITLE.to_string(),
        description,
        category: DEFAULT_CATEGORY.to_string(),
        location: format!("{lat:?}, {lng:?}"),
        latitude: lat,
        longitude: lng,
        citizen_id: citizen_id.to_string(),
        status: DEFAULT_STATUS.to_string(),
        priority: DEFAULT_PRIORITY.to_string(),
    }
}

#[derive(Clone)]
pub struct Submitter {
    store: Arc<dyn ComplaintStore>,
    categorizer: Option<DynCategorizer>,
}

impl Submitter {
    pub fn new(store: Arc<dyn ComplaintStore>, categorizer: Option<DynCategorizer>) -> Self {
        Self { store, categorizer }
    }

    /// Existing profile for `phone`, or a freshly inserted citizen profile.
    /// Calling it twice for the same phone yields the same profile.
    pub async fn ensure_profile(&self, phone: &str, display_name: Option<&str>) -> IntakeResult<Profile> {
        if let Some(existing) = self.store.find_profile_by_phone(phone).await? {
            return Ok(existing);
        }

        let fresh = Profile::new_citizen(phone, display_name);
        match self.store.insert_profile(&fresh).await {
            Ok(created) => {
                info!(target: "store", user = %anon_id(phone), profile = %created.id, "profile created");
                Ok(created)
            }
            Err(e) => {
                // Lost a race on the unique phone column: the winner's row is the profile.
                match self.store.find_profile_by_phone(phone).await? {
                    Some(existing) => Ok(existing),
                    None => Err(e),
                }
            }
        }
    }

    /// Record `draft` once. Returns the complaint id when the complaint row
    /// exists; image and categorization problems do not change the result.
    pub async fn submit(
        &self,
        user_id: &str,
        profile_name: Option<&str>,
        draft: &CompleteDraft,
    ) -> SubmissionResult {
        match self.register(user_id, profile_name, draft).await {
            Ok(complaint_id) => {
                counter!("complaints_registered_total").increment(1);
                info!(target: "intake", user = %anon_id(user_id), %complaint_id, "complaint registered");
                SubmissionResult::Registered { complaint_id }
            }
            Err(e) => {
                counter!("complaint_submission_failures_total").increment(1);
                warn!(target: "intake", user = %anon_id(user_id), error = %e, "complaint submission failed");
                SubmissionResult::Failed
            }
        }
    }

    async fn register(
        &self,
        user_id: &str,
        profile_name: Option<&str>,
        draft: &CompleteDraft,
    ) -> IntakeResult<String> {
        let profile = self.ensure_profile(user_id, profile_name).await?;

        let record = build_complaint(&profile.id, draft);
        let complaint_id = self
            .store
            .insert_complaint(&record)
            .await?
            .ok_or(IntakeError::EmptyResult("insert complaint"))?;

        if !draft.image.is_empty() {
            if let Err(e) = self.attach_image(&complaint_id, &draft.image).await {
                warn!(target: "store", %complaint_id, error = %e, "image not attached");
            }
        }

        self.spawn_categorization(&complaint_id, &record.description);
        Ok(complaint_id)
    }

    async fn attach_image(&self, complaint_id: &str, bytes: &[u8]) -> IntakeResult<()> {
        let object_path = format!("{}/{}.jpg", complaint_id, uuid::Uuid::new_v4());
        let image_url = self.store.upload_image(&object_path, bytes).await?;
        self.store
            .insert_complaint_image(&ComplaintImage {
                complaint_id: complaint_id.to_string(),
                image_url,
            })
            .await
    }

    /// Fire and forget: the webhook never waits for (or hears about) this.
    fn spawn_categorization(&self, complaint_id: &str, text: &str) {
        let Some(categorizer) = self.categorizer.clone() else {
            return;
        };
        let complaint_id = complaint_id.to_string();
        let text = text.to_string();
        tokio::spawn(async move {
            match categorizer.categorize(&complaint_id, COMPLAINT_TITLE, &text).await {
                Ok(p) => info!(
                    target: "classify",
                    %complaint_id,
                    categorizer = categorizer.name(),
                    category = ?p.category,
                    priority = %p.priority,
                    confidence = p.confidence,
                    "complaint categorized"
                ),
                Err(e) => {
                    counter!("categorization_failures_total").increment(1);
                    warn!(target: "classify", %complaint_id, categorizer = categorizer.name(), error = %e, "categorization failed");
                }
            }
        });
    }
}
