use std::sync::Arc;

use metrics::counter;
use shuttle_axum::axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::conversation::Intake;
use crate::telemetry::anon_id;
use crate::whatsapp::WebhookEnvelope;

pub const VERIFY_FAILED: &str = "Verification failed";

#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<Intake>,
    pub verify_token: Arc<str>,
}

impl AppState {
    pub fn new(intake: Intake, verify_token: impl Into<Arc<str>>) -> Self {
        Self {
            intake: Arc::new(intake),
            verify_token: verify_token.into(),
        }
    }
}

/// Webhook on `/` and `/webhook`, plus `/health`.
/// `/debug/conversations` is only mounted when `debug_routes` is set.
pub fn create_router(state: AppState, debug_routes: bool) -> Router {
    let mut router = Router::new()
        .route("/", get(verify_webhook).post(receive_webhook))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/health", get(|| async { "ok" }));

    if debug_routes {
        router = router.route("/debug/conversations", get(debug_conversations));
    }

    router.layer(CorsLayer::very_permissive()).with_state(state)
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_webhook(
    State(state): State<AppState>,
    Query(q): Query<VerifyQuery>,
) -> impl IntoResponse {
    let token_ok = q.verify_token.as_deref() == Some(&*state.verify_token);
    if q.mode.as_deref() == Some("subscribe") && token_ok {
        debug!(target: "api", "webhook verified");
        (StatusCode::OK, q.challenge.unwrap_or_default())
    } else {
        warn!(target: "api", mode = ?q.mode, "webhook verification rejected");
        (StatusCode::FORBIDDEN, VERIFY_FAILED.to_string())
    }
}

/// Always acknowledges: WhatsApp redelivers anything that is not a 200,
/// and a malformed or failing event would only be redelivered forever.
async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    counter!("webhook_events_total").increment(1);

    let envelope = match WebhookEnvelope::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            counter!("webhook_payload_errors_total").increment(1);
            warn!(target: "api", error = %e, bytes = body.len(), "unreadable webhook payload");
            return (StatusCode::OK, "OK");
        }
    };

    for msg in envelope.into_messages() {
        let outcome = state.intake.handle(&msg).await;
        debug!(
            target: "api",
            user = %anon_id(&msg.from),
            kind = msg.kind.label(),
            ?outcome,
            "message handled"
        );
    }

    (StatusCode::OK, "OK")
}

#[derive(serde::Serialize)]
struct ConversationsInfo {
    active: usize,
}

async fn debug_conversations(State(state): State<AppState>) -> Json<ConversationsInfo> {
    Json(ConversationsInfo {
        active: state.intake.conversations().active(),
    })
}
