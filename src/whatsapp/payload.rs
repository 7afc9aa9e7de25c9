// src/whatsapp/payload.rs
//! Inbound webhook envelope (`entry[].changes[].value`) and its flattening
//! into the messages the conversation engine understands.

use serde::{Deserialize, Serialize};

use crate::error::IntakeResult;

/// Latitude/longitude pair as sent by a WhatsApp location message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// What the user sent, reduced to the kinds the script cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Text(String),
    Location(Coordinates),
    Image { media_id: String },
    /// Anything else (stickers, audio, a text message without a body, ...).
    Other(String),
}

impl MessageKind {
    pub fn label(&self) -> &str {
        match self {
            MessageKind::Text(_) => "text",
            MessageKind::Location(_) => "location",
            MessageKind::Image { .. } => "image",
            MessageKind::Other(t) => t.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Sender phone number; also the conversation key.
    pub from: String,
    pub profile_name: Option<String>,
    pub kind: MessageKind,
}

// --- wire types ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub wa_id: Option<String>,
    #[serde(default)]
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub location: Option<Coordinates>,
    #[serde(default)]
    pub image: Option<MediaRef>,
}

// Inner fields are optional so one odd message cannot sink the envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaRef {
    #[serde(default)]
    pub id: Option<String>,
}

impl WebhookEnvelope {
    pub fn from_slice(bytes: &[u8]) -> IntakeResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// All user messages in delivery order. Status-only callbacks yield nothing.
    pub fn into_messages(self) -> Vec<InboundMessage> {
        let mut out = Vec::new();
        for change in self.entry.into_iter().flat_map(|e| e.changes) {
            let ChangeValue { messages, contacts } = change.value;
            for raw in messages {
                let profile_name = profile_name_for(&contacts, &raw.from);
                out.push(InboundMessage {
                    kind: raw.classify(),
                    from: raw.from,
                    profile_name,
                });
            }
        }
        out
    }
}

impl RawMessage {
    fn classify(&self) -> MessageKind {
        match self.kind.as_str() {
            "text" => match self.text.as_ref().and_then(|t| t.body.as_ref()) {
                Some(body) => MessageKind::Text(body.clone()),
                None => MessageKind::Other(self.kind.clone()),
            },
            "location" => match self.location {
                Some(c) => MessageKind::Location(c),
                None => MessageKind::Other(self.kind.clone()),
            },
            "image" => match self.image.as_ref().and_then(|m| m.id.as_ref()) {
                Some(id) => MessageKind::Image {
                    media_id: id.clone(),
                },
                None => MessageKind::Other(self.kind.clone()),
            },
            other => MessageKind::Other(other.to_string()),
        }
    }
}

/// Prefer the contact whose `wa_id` matches the sender, else the first one.
fn profile_name_for(contacts: &[Contact], from: &str) -> Option<String> {
    contacts
        .iter()
        .find(|c| c.wa_id.as_deref() == Some(from))
        .or_else(|| contacts.first())
        .and_then(|c| c.profile.as_ref())
        .and_then(|p| p.name.clone())
        .filter(|n| !n.trim().is_empty())
}
