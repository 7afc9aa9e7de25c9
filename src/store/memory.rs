// src/store/memory.rs
//! Process-memory store. Used when Supabase is not configured and in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ComplaintImage, ComplaintStore, NewComplaint, Profile};
use crate::classify::Prediction;
use crate::error::{IntakeError, IntakeResult};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredComplaint {
    pub id: String,
    pub record: NewComplaint,
    pub prediction: Option<Prediction>,
}

#[derive(Debug, Default)]
struct Inner {
    profiles: Vec<Profile>,
    complaints: Vec<StoredComplaint>,
    objects: HashMap<String, Vec<u8>>,
    images: Vec<ComplaintImage>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.inner.lock().expect("memory store poisoned").profiles.clone()
    }

    pub fn complaints(&self) -> Vec<StoredComplaint> {
        self.inner.lock().expect("memory store poisoned").complaints.clone()
    }

    pub fn images(&self) -> Vec<ComplaintImage> {
        self.inner.lock().expect("memory store poisoned").images.clone()
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .expect("memory store poisoned")
            .objects
            .get(path)
            .cloned()
    }
}

#[async_trait]
impl ComplaintStore for MemoryStore {
    async fn find_profile_by_phone(&self, phone: &str) -> IntakeResult<Option<Profile>> {
        let g = self.inner.lock().expect("memory store poisoned");
        Ok(g.profiles.iter().find(|p| p.phone == phone).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> IntakeResult<Profile> {
        let mut g = self.inner.lock().expect("memory store poisoned");
        // phone is unique in the real schema too
        if g.profiles.iter().any(|p| p.phone == profile.phone || p.id == profile.id) {
            return Err(IntakeError::store("insert profile", "duplicate key"));
        }
        g.profiles.push(profile.clone());
        Ok(profile.clone())
    }

    async fn insert_complaint(&self, complaint: &NewComplaint) -> IntakeResult<Option<String>> {
        let mut g = self.inner.lock().expect("memory store poisoned");
        let id = uuid::Uuid::new_v4().to_string();
        g.complaints.push(StoredComplaint {
            id: id.clone(),
            record: complaint.clone(),
            prediction: None,
        });
        Ok(Some(id))
    }

    async fn upload_image(&self, object_path: &str, bytes: &[u8]) -> IntakeResult<String> {
        let mut g = self.inner.lock().expect("memory store poisoned");
        g.objects.insert(object_path.to_string(), bytes.to_vec());
        Ok(format!("memory://{object_path}"))
    }

    async fn insert_complaint_image(&self, image: &ComplaintImage) -> IntakeResult<()> {
        let mut g = self.inner.lock().expect("memory store poisoned");
        g.images.push(image.clone());
        Ok(())
    }

    async fn update_prediction(&self, complaint_id: &str, prediction: &Prediction) -> IntakeResult<()> {
        let mut g = self.inner.lock().expect("memory store poisoned");
        match g.complaints.iter_mut().find(|c| c.id == complaint_id) {
            Some(c) => {
                c.prediction = Some(prediction.clone());
                Ok(())
            }
            None => Err(IntakeError::EmptyResult("update prediction")),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
