use anyhow::Context;
use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!("webhook_events_total", "POST deliveries received on the webhook");
        describe_counter!("webhook_payload_errors_total", "Webhook bodies that were not a readable envelope");
        describe_counter!("intake_replies_failed_total", "Outbound replies the messenger did not deliver");
        describe_counter!("intake_media_failures_total", "Image lookups or downloads that failed, by stage");
        describe_counter!("complaints_registered_total", "Complaints written to the store");
        describe_counter!("complaint_submission_failures_total", "Completed drafts that could not be registered");
        describe_counter!("categorization_failures_total", "Background categorization calls that failed");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
