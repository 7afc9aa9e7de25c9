// src/config/mod.rs
//! Runtime configuration: environment variables (optionally from `.env`)
//! plus the reply texts from `config/bot.toml`.

pub mod replies;

use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub use replies::Replies;

pub const DEFAULT_BOT_CONFIG_PATH: &str = "config/bot.toml";
pub const ENV_BOT_CONFIG_PATH: &str = "BOT_CONFIG_PATH";

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_GRAPH_VERSION: &str = "v18.0";
pub const DEFAULT_IMAGE_BUCKET: &str = "complaint_images";
pub const DEFAULT_CATEGORIZE_FUNCTION: &str = "categorize-complaint";
pub const DEFAULT_ARCHIVE_DIR: &str = "complaints";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub access_token: String,
    pub phone_number_id: String,
    pub graph_url: String,
    pub api_version: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
    pub image_bucket: String,
    pub categorize_function: String,
}

/// Which collaborator fills in `predicted_category` / `predicted_priority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorizerMode {
    /// Supabase edge function `categorize-complaint`.
    Remote,
    /// In-process keyword rules, written back through the store.
    Local,
    Off,
}

impl CategorizerMode {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            "off" | "none" | "disabled" => Ok(Self::Off),
            other => bail!("Unsupported CATEGORIZER value: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub verify_token: String,
    /// `None` means replies are only logged (local development).
    pub whatsapp: Option<WhatsAppConfig>,
    /// `None` means complaints live in process memory.
    pub supabase: Option<SupabaseConfig>,
    pub categorizer: CategorizerMode,
    pub archive_dir: Option<PathBuf>,
    pub http_timeout: Duration,
    pub debug_routes: bool,
    pub metrics_enabled: bool,
    pub replies: Replies,
}

impl AppConfig {
    /// Read from the process environment. Call `dotenvy::dotenv()` first in dev.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map here instead of mutating env).
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let verify_token =
            get("WHATSAPP_VERIFY_TOKEN").ok_or_else(|| anyhow!("Missing WHATSAPP_VERIFY_TOKEN env var"))?;

        let whatsapp = match (get("WHATSAPP_ACCESS_TOKEN"), get("WHATSAPP_PHONE_NUMBER_ID")) {
            (Some(access_token), Some(phone_number_id)) => Some(WhatsAppConfig {
                access_token,
                phone_number_id,
                graph_url: trim_base(get("WHATSAPP_GRAPH_URL").as_deref().unwrap_or(DEFAULT_GRAPH_URL)),
                api_version: get("WHATSAPP_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_GRAPH_VERSION.to_string()),
            }),
            (None, None) => None,
            _ => bail!("WHATSAPP_ACCESS_TOKEN and WHATSAPP_PHONE_NUMBER_ID must be set together"),
        };

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_KEY")) {
            (Some(url), Some(api_key)) => Some(SupabaseConfig {
                url: trim_base(&url),
                api_key,
                image_bucket: get("SUPABASE_IMAGE_BUCKET")
                    .unwrap_or_else(|| DEFAULT_IMAGE_BUCKET.to_string()),
                categorize_function: get("SUPABASE_CATEGORIZE_FUNCTION")
                    .unwrap_or_else(|| DEFAULT_CATEGORIZE_FUNCTION.to_string()),
            }),
            (None, None) => None,
            _ => bail!("SUPABASE_URL and SUPABASE_KEY must be set together"),
        };

        let categorizer = match get("CATEGORIZER") {
            Some(raw) => CategorizerMode::parse(&raw)?,
            None if supabase.is_some() => CategorizerMode::Remote,
            None => CategorizerMode::Local,
        };
        if categorizer == CategorizerMode::Remote && supabase.is_none() {
            bail!("CATEGORIZER=remote requires SUPABASE_URL and SUPABASE_KEY");
        }

        // Unset -> default dir; explicitly empty or "off" -> disabled.
        let archive_dir = match var("COMPLAINT_ARCHIVE_DIR").map(|v| v.trim().to_string()) {
            None => Some(PathBuf::from(DEFAULT_ARCHIVE_DIR)),
            Some(v) if v.is_empty() || v.eq_ignore_ascii_case("off") => None,
            Some(v) => Some(PathBuf::from(v)),
        };

        let http_timeout = Duration::from_secs(
            get("HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );

        let replies_path = get(ENV_BOT_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BOT_CONFIG_PATH));
        let replies = Replies::load_from(&replies_path)?;

        Ok(Self {
            verify_token,
            whatsapp,
            supabase,
            categorizer,
            archive_dir,
            http_timeout,
            debug_routes: flag(get("DEBUG_ROUTES")),
            metrics_enabled: flag(get("METRICS_ENABLED")),
            replies,
        })
    }
}

fn flag(raw: Option<String>) -> bool {
    matches!(
        raw.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
