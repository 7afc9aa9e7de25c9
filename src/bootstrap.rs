// src/bootstrap.rs
//! Turns an `AppConfig` into live collaborators. Missing credentials fall
//! back to dev stand-ins (log-only messenger, in-memory store) with a warning.

use anyhow::Context;
use shuttle_axum::axum::Router;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{create_router, AppState};
use crate::archive::ComplaintArchive;
use crate::classify::{DynCategorizer, LocalCategorizer, RemoteCategorizer};
use crate::config::{AppConfig, CategorizerMode};
use crate::conversation::Intake;
use crate::store::{ComplaintStore, MemoryStore, SupabaseStore};
use crate::submit::Submitter;
use crate::whatsapp::{GraphApiClient, LogMessenger, Messenger};

pub fn build_messenger(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Messenger>> {
    match &cfg.whatsapp {
        Some(wa) => {
            let client = GraphApiClient::new(wa, cfg.http_timeout).context("building WhatsApp client")?;
            info!(target: "whatsapp", api_version = %wa.api_version, "Graph API messenger ready");
            Ok(Arc::new(client))
        }
        None => {
            warn!(target: "whatsapp", "WhatsApp credentials missing: replies are only logged");
            Ok(Arc::new(LogMessenger))
        }
    }
}

/// The store plus, when Supabase is configured, the concrete client so the
/// remote categorizer can reuse it.
pub fn build_store(cfg: &AppConfig) -> anyhow::Result<(Arc<dyn ComplaintStore>, Option<SupabaseStore>)> {
    match &cfg.supabase {
        Some(sb) => {
            let store = SupabaseStore::new(sb, cfg.http_timeout).context("building Supabase client")?;
            info!(target: "store", bucket = %sb.image_bucket, "Supabase store ready");
            let shared: Arc<dyn ComplaintStore> = Arc::new(store.clone());
            Ok((shared, Some(store)))
        }
        None => {
            warn!(target: "store", "Supabase settings missing: complaints are kept in memory");
            let shared: Arc<dyn ComplaintStore> = Arc::new(MemoryStore::new());
            Ok((shared, None))
        }
    }
}

pub fn build_categorizer(
    cfg: &AppConfig,
    store: Arc<dyn ComplaintStore>,
    supabase: Option<SupabaseStore>,
) -> anyhow::Result<Option<DynCategorizer>> {
    let categorizer: Option<DynCategorizer> = match cfg.categorizer {
        CategorizerMode::Remote => {
            let client = supabase.context("remote categorizer needs Supabase settings")?;
            let function = cfg
                .supabase
                .as_ref()
                .map(|sb| sb.categorize_function.clone())
                .unwrap_or_default();
            Some(Arc::new(RemoteCategorizer::new(client, function)))
        }
        CategorizerMode::Local => Some(Arc::new(LocalCategorizer::new(store))),
        CategorizerMode::Off => None,
    };
    match &categorizer {
        Some(c) => info!(target: "classify", categorizer = c.name(), "categorizer ready"),
        None => warn!(target: "classify", "categorization disabled"),
    }
    Ok(categorizer)
}

pub fn build_intake(cfg: &AppConfig) -> anyhow::Result<Intake> {
    let messenger = build_messenger(cfg)?;
    let (store, supabase) = build_store(cfg)?;
    let categorizer = build_categorizer(cfg, store.clone(), supabase)?;

    let intake = Intake::new(messenger, Submitter::new(store, categorizer), cfg.replies.clone());
    Ok(match &cfg.archive_dir {
        Some(dir) => {
            info!(target: "intake", dir = %dir.display(), "archiving completed drafts");
            intake.with_archive(ComplaintArchive::new(dir))
        }
        None => intake,
    })
}

/// Router for the webhook service (without `/metrics`, which needs the
/// process-global recorder and is merged in by the binary).
pub fn build_router(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::new(build_intake(cfg)?, cfg.verify_token.as_str());
    Ok(create_router(state, cfg.debug_routes))
}
