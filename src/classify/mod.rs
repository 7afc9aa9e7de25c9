// src/classify/mod.rs
//! Classification collaborators: text categorization (remote edge function
//! or local keyword rules) and the standalone image classifier.

pub mod image;
pub mod keywords;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

use crate::error::{IntakeError, IntakeResult};
use crate::store::{ComplaintStore, SupabaseStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintCategory {
    Water,
    Electricity,
    Roads,
    Sanitation,
    Public,
    Other,
}

/// Output of a categorizer, shaped like the `complaints` prediction columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "predicted_category")]
    pub category: ComplaintCategory,
    #[serde(rename = "confidence_score")]
    pub confidence: f32,
    #[serde(rename = "predicted_priority")]
    pub priority: Priority,
}

/// Fills in category/priority for a freshly registered complaint.
/// Runs detached from the webhook; its errors only reach the logs.
#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, complaint_id: &str, title: &str, text: &str) -> IntakeResult<Prediction>;
    fn name(&self) -> &'static str;
}

pub type DynCategorizer = Arc<dyn Categorizer>;

/// Calls the Supabase edge function, which scores and updates the row itself.
pub struct RemoteCategorizer {
    store: SupabaseStore,
    function: String,
}

impl RemoteCategorizer {
    pub fn new(store: SupabaseStore, function: impl Into<String>) -> Self {
        Self {
            store,
            function: function.into(),
        }
    }
}

#[async_trait]
impl Categorizer for RemoteCategorizer {
    async fn categorize(&self, complaint_id: &str, title: &str, text: &str) -> IntakeResult<Prediction> {
        let body = json!({ "id": complaint_id, "title": title, "description": text });
        let resp = self.store.invoke_function(&self.function, &body).await?;
        if let Some(err) = resp.get("error") {
            return Err(IntakeError::Categorize(err.to_string()));
        }
        serde_json::from_value(resp).map_err(|e| IntakeError::Categorize(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "edge-function"
    }
}

/// Scores in-process and writes the prediction through the store.
pub struct LocalCategorizer {
    store: Arc<dyn ComplaintStore>,
}

impl LocalCategorizer {
    pub fn new(store: Arc<dyn ComplaintStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Categorizer for LocalCategorizer {
    async fn categorize(&self, complaint_id: &str, title: &str, text: &str) -> IntakeResult<Prediction> {
        let prediction = keywords::predict(title, text);
        self.store.update_prediction(complaint_id, &prediction).await?;
        Ok(prediction)
    }

    fn name(&self) -> &'static str {
        "keywords"
    }
}
