pub mod client;
pub mod payload;

pub use client::{GraphApiClient, LogMessenger, Messenger};
pub use payload::{Coordinates, InboundMessage, MessageKind, WebhookEnvelope};
