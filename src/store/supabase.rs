// src/store/supabase.rs
//! Supabase backend: PostgREST tables, Storage bucket, Edge Functions.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::{id_from_row, ComplaintImage, ComplaintStore, NewComplaint, Profile};
use crate::classify::Prediction;
use crate::config::SupabaseConfig;
use crate::error::{IntakeError, IntakeResult};

#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    url: String,
    api_key: String,
    bucket: String,
}

impl SupabaseStore {
    pub fn new(cfg: &SupabaseConfig, timeout: Duration) -> IntakeResult<Self> {
        let client = Client::builder()
            .user_agent("nirvana-intake/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: cfg.url.clone(),
            api_key: cfg.api_key.clone(),
            bucket: cfg.image_bucket.clone(),
        })
    }

    fn authed(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header("apikey", &self.api_key).bearer_auth(&self.api_key)
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{}", self.url, name)
    }

    pub fn public_url(&self, object_path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.url, self.bucket, object_path
        )
    }

    /// POST a single row with `Prefer: return=representation` and return the rows echoed back.
    async fn insert_rows<T: Serialize + Sync>(
        &self,
        table: &str,
        row: &T,
        op: &'static str,
    ) -> IntakeResult<Vec<Value>> {
        let resp = self
            .authed(self.client.post(self.table(table)))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let resp = ensure_success(resp, op).await?;
        Ok(resp.json::<Vec<Value>>().await?)
    }

    /// Invoke an edge function with a JSON body; returns the JSON response.
    pub async fn invoke_function<T: Serialize + Sync>(&self, name: &str, body: &T) -> IntakeResult<Value> {
        let resp = self
            .authed(self.client.post(format!("{}/functions/v1/{}", self.url, name)))
            .json(body)
            .send()
            .await
            .map_err(|e| IntakeError::Categorize(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(IntakeError::Categorize(format!("{name}: HTTP {status}: {text}")));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| IntakeError::Categorize(e.to_string()))
    }
}

async fn ensure_success(resp: Response, op: &'static str) -> IntakeResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(IntakeError::store(op, format!("HTTP {status}: {text}")))
}

#[async_trait]
impl ComplaintStore for SupabaseStore {
    async fn find_profile_by_phone(&self, phone: &str) -> IntakeResult<Option<Profile>> {
        let resp = self
            .authed(self.client.get(self.table("profiles")))
            .query(&[("select", "*".to_string()), ("phone", format!("eq.{phone}"))])
            .send()
            .await?;
        let resp = ensure_success(resp, "query profiles").await?;
        let rows: Vec<Profile> = resp.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, profile: &Profile) -> IntakeResult<Profile> {
        let rows = self.insert_rows("profiles", profile, "insert profile").await?;
        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map_err(|e| IntakeError::store("insert profile", e.to_string())),
            // RLS can hide the inserted row; what we sent is what was stored.
            None => Ok(profile.clone()),
        }
    }

    async fn insert_complaint(&self, complaint: &NewComplaint) -> IntakeResult<Option<String>> {
        let rows = self
            .insert_rows("complaints", complaint, "insert complaint")
            .await?;
        Ok(rows.first().and_then(id_from_row))
    }

    async fn upload_image(&self, object_path: &str, bytes: &[u8]) -> IntakeResult<String> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.url, self.bucket, object_path
        );
        let resp = self
            .authed(self.client.post(url))
            .header("Content-Type", "image/jpeg")
            .body(bytes.to_vec())
            .send()
            .await?;
        ensure_success(resp, "upload image").await?;
        Ok(self.public_url(object_path))
    }

    async fn insert_complaint_image(&self, image: &ComplaintImage) -> IntakeResult<()> {
        self.insert_rows("complaint_images", image, "insert complaint image")
            .await?;
        Ok(())
    }

    async fn update_prediction(&self, complaint_id: &str, prediction: &Prediction) -> IntakeResult<()> {
        let resp = self
            .authed(self.client.patch(self.table("complaints")))
            .query(&[("id", format!("eq.{complaint_id}"))])
            .json(prediction)
            .send()
            .await?;
        ensure_success(resp, "update prediction").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}
