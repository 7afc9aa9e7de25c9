// src/config/replies.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Texts the bot sends at each step of the script.
/// Every field has a default so a partial `[replies]` table is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Replies {
    pub greeting: String,
    pub ask_location: String,
    pub ask_image: String,
    pub media_lookup_failed: String,
    pub media_download_failed: String,
    /// `{id}` is replaced with the registered complaint id.
    pub registered: String,
    pub registration_failed: String,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            greeting: "Hi! Welcome to Nirvana. What is your complaint?".into(),
            ask_location: "Please share your location.".into(),
            ask_image: "Thanks! Now please send an image of the issue.".into(),
            media_lookup_failed:
                "Sorry, we couldn't process your image. Please try sending it again.".into(),
            media_download_failed:
                "Sorry, we couldn't download your image. Please try sending it again.".into(),
            registered:
                "Got it! Your complaint has been registered with ID: {id}. Thank you.".into(),
            registration_failed:
                "Sorry, we couldn't register your complaint at this time. Please try again later."
                    .into(),
        }
    }
}

impl Replies {
    pub fn registered_with(&self, complaint_id: &str) -> String {
        self.registered.replace("{id}", complaint_id)
    }

    /// Load `[replies]` from a TOML file. A missing file yields the defaults;
    /// an unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading bot config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing bot config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct BotFile {
            #[serde(default)]
            replies: Replies,
        }
        let file: BotFile = toml::from_str(s)?;
        Ok(file.replies)
    }
}
