// src/store/mod.rs
//! Durable side of a submission: profiles, complaints, complaint images.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::classify::Prediction;
use crate::error::IntakeResult;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

pub const DEFAULT_FULL_NAME: &str = "WhatsApp User";
pub const DEFAULT_ROLE: &str = "citizen";
pub const DEFAULT_LANGUAGE: &str = "english";

/// Row of the `profiles` table (only the columns the bot touches).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
}

impl Profile {
    /// Fresh citizen profile with a generated id.
    pub fn new_citizen(phone: &str, display_name: Option<&str>) -> Self {
        let full_name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("unknown"))
            .unwrap_or(DEFAULT_FULL_NAME);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            full_name: Some(full_name.to_string()),
            phone: phone.to_string(),
            role: Some(DEFAULT_ROLE.to_string()),
            preferred_language: Some(DEFAULT_LANGUAGE.to_string()),
        }
    }
}

/// Insert body for the `complaints` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub citizen_id: String,
    pub status: String,
    pub priority: String,
}

/// Insert body for the `complaint_images` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintImage {
    pub complaint_id: String,
    pub image_url: String,
}

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    async fn find_profile_by_phone(&self, phone: &str) -> IntakeResult<Option<Profile>>;

    /// Insert and return the stored row.
    async fn insert_profile(&self, profile: &Profile) -> IntakeResult<Profile>;

    /// Insert and return the new complaint id, or `None` if the store
    /// accepted the request but handed back no row/id.
    async fn insert_complaint(&self, complaint: &NewComplaint) -> IntakeResult<Option<String>>;

    /// Put raw bytes into the image bucket; returns the public URL.
    async fn upload_image(&self, object_path: &str, bytes: &[u8]) -> IntakeResult<String>;

    async fn insert_complaint_image(&self, image: &ComplaintImage) -> IntakeResult<()>;

    /// Write `predicted_category` / `confidence_score` / `predicted_priority`.
    async fn update_prediction(&self, complaint_id: &str, prediction: &Prediction) -> IntakeResult<()>;

    fn name(&self) -> &'static str;
}

/// PostgREST may hand ids back as strings (uuid) or numbers (serial).
pub(crate) fn id_from_row(row: &serde_json::Value) -> Option<String> {
    match row.get("id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
