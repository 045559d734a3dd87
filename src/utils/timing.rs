use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

#[derive(Debug)]
pub struct RequestTimer {
    endpoint: String,
    method: String,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    completed: bool,
}

impl RequestTimer {
    pub fn start(endpoint: &str, method: &str) -> Self {
        let timer = RequestTimer {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            started_at: Utc::now(),
            started_perf: Instant::now(),
            completed: false,
        };
        info!(
            target: "server.timing",
            "event=request_received endpoint={} method={} received_at={}",
            timer.endpoint,
            timer.method,
            timer.started_at.to_rfc3339()
        );
        timer
    }

    pub fn complete(&mut self, status: u16) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: "server.timing",
            "event=request_completed endpoint={} method={} started_at={} response_sent_at={} duration_s={:.3} status={}",
            self.endpoint,
            self.method,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            status
        );
    }
}

pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, anyhow::Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: "server.timing",
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let mut status = "success";
    let result = call().await;
    if result.is_err() {
        status = "error";
    }

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: "server.timing",
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}
