// tests/common/mod.rs
//
// Fakes shared by the integration tests: a recording messenger, a store that
// refuses complaints, and a categorizer that reports calls over a channel.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use nirvana_intake::classify::{Categorizer, ComplaintCategory, Prediction, Priority};
use nirvana_intake::error::{IntakeError, IntakeResult};
use nirvana_intake::store::{ComplaintImage, ComplaintStore, MemoryStore, NewComplaint, Profile};
use nirvana_intake::whatsapp::{Coordinates, InboundMessage, MessageKind, Messenger};

pub const USER: &str = "919876543210";
pub const PHOTO: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];

/// Records every reply; media calls can be told to fail a number of times.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    lookup_failures: AtomicUsize,
    download_failures: AtomicUsize,
    pub lookups: AtomicUsize,
    pub fail_sends: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_lookups(&self, n: usize) {
        self.lookup_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_downloads(&self, n: usize) {
        self.download_failures.store(n, Ordering::SeqCst);
    }

    /// Bodies sent to `user`, oldest first.
    pub fn replies_to(&self, user: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == user)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn reply_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, to: &str, body: &str) -> IntakeResult<()> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(IntakeError::Reply("HTTP 500".into()));
        }
        Ok(())
    }

    async fn media_url(&self, media_id: &str) -> IntakeResult<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.lookup_failures) {
            return Err(IntakeError::MediaLookup(format!("HTTP 404 for {media_id}")));
        }
        Ok(format!("https://media.example/{media_id}"))
    }

    async fn download_media(&self, _url: &str) -> IntakeResult<Vec<u8>> {
        if take_one(&self.download_failures) {
            return Err(IntakeError::MediaDownload("HTTP 403".into()));
        }
        Ok(PHOTO.to_vec())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Behaves like `MemoryStore` but rejects every complaint row.
#[derive(Default)]
pub struct RejectingStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl ComplaintStore for RejectingStore {
    async fn find_profile_by_phone(&self, phone: &str) -> IntakeResult<Option<Profile>> {
        self.inner.find_profile_by_phone(phone).await
    }

    async fn insert_profile(&self, profile: &Profile) -> IntakeResult<Profile> {
        self.inner.insert_profile(profile).await
    }

    async fn insert_complaint(&self, _complaint: &NewComplaint) -> IntakeResult<Option<String>> {
        Err(IntakeError::store("insert complaint", "HTTP 400: violates check constraint"))
    }

    async fn upload_image(&self, object_path: &str, bytes: &[u8]) -> IntakeResult<String> {
        self.inner.upload_image(object_path, bytes).await
    }

    async fn insert_complaint_image(&self, image: &ComplaintImage) -> IntakeResult<()> {
        self.inner.insert_complaint_image(image).await
    }

    async fn update_prediction(&self, complaint_id: &str, prediction: &Prediction) -> IntakeResult<()> {
        self.inner.update_prediction(complaint_id, prediction).await
    }

    fn name(&self) -> &'static str {
        "rejecting"
    }
}

/// Like `MemoryStore`, but image handling breaks: either the bucket upload
/// or (with `fail_record`) the `complaint_images` row insert.
#[derive(Default)]
pub struct ImageFailingStore {
    pub inner: MemoryStore,
    pub fail_record: bool,
}

#[async_trait]
impl ComplaintStore for ImageFailingStore {
    async fn find_profile_by_phone(&self, phone: &str) -> IntakeResult<Option<Profile>> {
        self.inner.find_profile_by_phone(phone).await
    }

    async fn insert_profile(&self, profile: &Profile) -> IntakeResult<Profile> {
        self.inner.insert_profile(profile).await
    }

    async fn insert_complaint(&self, complaint: &NewComplaint) -> IntakeResult<Option<String>> {
        self.inner.insert_complaint(complaint).await
    }

    async fn upload_image(&self, object_path: &str, bytes: &[u8]) -> IntakeResult<String> {
        if self.fail_record {
            return self.inner.upload_image(object_path, bytes).await;
        }
        Err(IntakeError::store("upload image", "HTTP 413: payload too large"))
    }

    async fn insert_complaint_image(&self, image: &ComplaintImage) -> IntakeResult<()> {
        if self.fail_record {
            return Err(IntakeError::store("insert complaint image", "HTTP 409"));
        }
        self.inner.insert_complaint_image(image).await
    }

    async fn update_prediction(&self, complaint_id: &str, prediction: &Prediction) -> IntakeResult<()> {
        self.inner.update_prediction(complaint_id, prediction).await
    }

    fn name(&self) -> &'static str {
        "image-failing"
    }
}

/// Reports `(complaint_id, title, text)` for every call.
pub struct ChannelCategorizer {
    tx: mpsc::UnboundedSender<(String, String, String)>,
}

impl ChannelCategorizer {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(String, String, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl Categorizer for ChannelCategorizer {
    async fn categorize(&self, complaint_id: &str, title: &str, text: &str) -> IntakeResult<Prediction> {
        let _ = self
            .tx
            .send((complaint_id.to_string(), title.to_string(), text.to_string()));
        Ok(Prediction {
            category: ComplaintCategory::Sanitation,
            confidence: 1.0,
            priority: Priority::Medium,
        })
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

// ---- inbound message builders ----

pub fn text(from: &str, body: &str) -> InboundMessage {
    InboundMessage {
        from: from.to_string(),
        profile_name: Some("Asha".into()),
        kind: MessageKind::Text(body.to_string()),
    }
}

pub fn location(from: &str, latitude: f64, longitude: f64) -> InboundMessage {
    InboundMessage {
        from: from.to_string(),
        profile_name: Some("Asha".into()),
        kind: MessageKind::Location(Coordinates { latitude, longitude }),
    }
}

pub fn image(from: &str, media_id: &str) -> InboundMessage {
    InboundMessage {
        from: from.to_string(),
        profile_name: Some("Asha".into()),
        kind: MessageKind::Image {
            media_id: media_id.to_string(),
        },
    }
}

// ---- webhook JSON builders ----

pub fn text_json(from: &str, body: &str) -> Value {
    json!({ "from": from, "id": "wamid.1", "type": "text", "text": { "body": body } })
}

pub fn location_json(from: &str, latitude: f64, longitude: f64) -> Value {
    json!({ "from": from, "id": "wamid.2", "type": "location",
            "location": { "latitude": latitude, "longitude": longitude } })
}

pub fn image_json(from: &str, media_id: &str) -> Value {
    json!({ "from": from, "id": "wamid.3", "type": "image",
            "image": { "id": media_id, "mime_type": "image/jpeg" } })
}

/// Standard `entry[].changes[].value` envelope around `messages`.
pub fn envelope(from: &str, messages: Vec<Value>) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA_ID",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "contacts": [{ "wa_id": from, "profile": { "name": "Asha" } }],
                    "messages": messages
                }
            }]
        }]
    })
}
