// src/archive.rs
//! Local debug copies of completed drafts: `{dir}/{user}_{YYYYmmdd_HHMMSS}/`
//! holding `data.json` (text + location) and `image.jpg`.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::conversation::CompleteDraft;
use crate::error::IntakeResult;
use crate::whatsapp::Coordinates;

#[derive(Serialize)]
struct ArchivedData<'a> {
    complaint: &'a str,
    location: Coordinates,
}

#[derive(Debug, Clone)]
pub struct ComplaintArchive {
    root: PathBuf,
}

impl ComplaintArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save(&self, user_id: &str, draft: &CompleteDraft) -> IntakeResult<PathBuf> {
        self.save_at(user_id, draft, Local::now()).await
    }

    pub async fn save_at(
        &self,
        user_id: &str,
        draft: &CompleteDraft,
        at: DateTime<Local>,
    ) -> IntakeResult<PathBuf> {
        let user = folder_safe(user_id)?;
        let folder = self
            .root
            .join(format!("{}_{}", user, at.format("%Y%m%d_%H%M%S")));
        fs::create_dir_all(&folder).await?;

        let data = ArchivedData {
            complaint: &draft.complaint_text,
            location: draft.location,
        };
        let json = serde_json::to_vec_pretty(&data).map_err(io::Error::other)?;
        fs::write(folder.join("data.json"), json).await?;
        fs::write(folder.join("image.jpg"), &draft.image).await?;
        Ok(folder)
    }
}

/// Sender ids come straight from the webhook body; only plain phone-like
/// ids may become a folder name under the archive root.
fn folder_safe(user_id: &str) -> IntakeResult<&str> {
    let ok = !user_id.is_empty()
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '-'));
    if ok {
        Ok(user_id)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("sender id {user_id:?} is not usable as an archive folder"),
        )
        .into())
    }
}
