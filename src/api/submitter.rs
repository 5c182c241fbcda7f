use std::future::Future;
use std::sync::Arc;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analytics::stats::SubmissionStats;
use crate::config::Config;
use crate::document::model::Document;
use crate::document::serializer::{DocumentSerializer, JsonSerializer};
use crate::error::{AppError, Result};
use crate::http::rate_limiter::AdmissionGate;
use crate::http::transport::{HttpTransport, Transport, TransportResponse};
use crate::utils::time::{elapsed_ms, now_instant};

const SIGNATURE_HEADER: &str = "signature";
const LOGGED_BODY_CHARS: usize = 256;

/// Submits documents to the create endpoint, one request at a time and no faster
/// than the gate allows.
#[derive(Clone)]
pub struct DocumentSubmitter {
    gate: Arc<AdmissionGate>,
    serializer: Arc<dyn DocumentSerializer>,
    transport: Arc<dyn Transport>,
    endpoint: String,
    stats: Arc<SubmissionStats>,
}

impl DocumentSubmitter {
    pub fn new(
        gate: Arc<AdmissionGate>,
        serializer: Arc<dyn DocumentSerializer>,
        transport: Arc<dyn Transport>,
        endpoint: String,
    ) -> Self {
        Self {
            gate,
            serializer,
            transport,
            endpoint,
            stats: Arc::new(SubmissionStats::new()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let gate = Arc::new(AdmissionGate::new(config.time_unit, config.request_limit)?);
        let transport = Arc::new(HttpTransport::new(
            config.connect_timeout(),
            config.request_timeout(),
        )?);

        info!(
            "Rate limit: {} requests per {} (min spacing {}ms)",
            gate.max_requests(),
            config.time_unit,
            gate.sleep_quantum().as_millis()
        );

        Ok(Self::new(gate, Arc::new(JsonSerializer), transport, config.endpoint.clone()))
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn stats(&self) -> &SubmissionStats {
        &self.stats
    }

    /// Waits for admission, then sends `document` with `signature` attached.
    pub async fn submit(&self, document: &Document, signature: &str) -> Result<TransportResponse> {
        self.submit_until(document, signature, std::future::pending()).await
    }

    /// Like [`submit`](Self::submit), but gives up with [`AppError::CancelledWait`]
    /// if `cancel` resolves before the request is admitted.
    pub async fn submit_until<F>(
        &self,
        document: &Document,
        signature: &str,
        cancel: F,
    ) -> Result<TransportResponse>
    where
        F: Future<Output = ()>,
    {
        let span = info_span!("submit", id = %Uuid::new_v4(), doc_id = %document.doc_id);

        async move {
            let wait_start = now_instant();
            let permit = match self.gate.acquire_until(cancel).await {
                Ok(permit) => permit,
                Err(e) => {
                    self.stats.inc_cancelled();
                    warn!("Submission abandoned before admission: {}", e);
                    return Err(e);
                }
            };
            self.stats.update_wait(elapsed_ms(wait_start));

            match self.dispatch(document, signature).await {
                Ok(response) => {
                    // Any response counts, the status code does not matter here
                    let admitted_at = permit.admitted_at();
                    permit.record_completion(admitted_at);
                    self.stats.inc_dispatched();
                    Ok(response)
                }
                Err(e) => {
                    // Permit dropped without recording
                    self.stats.inc_failed();
                    error!("Submission failed: {}", e);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, document: &Document, signature: &str) -> Result<TransportResponse> {
        let body = self.serializer.serialize(document)?;
        let headers = build_headers(signature)?;

        let start = now_instant();
        let response = self.transport.send(&self.endpoint, body, headers).await?;
        self.stats.update_dispatch_latency(elapsed_ms(start));

        if response.status.is_success() {
            debug!("Document accepted with status {}", response.status);
        } else {
            warn!(
                "Document rejected with status {} ({} bytes): {}",
                response.status,
                response.body.len(),
                body_preview(&response.body)
            );
        }

        Ok(response)
    }
}

fn body_preview(body: &str) -> &str {
    match body.char_indices().nth(LOGGED_BODY_CHARS) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

fn build_headers(signature: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let value = HeaderValue::from_str(signature)
        .map_err(|e| AppError::Signature(e.to_string()))?;
    headers.insert(SIGNATURE_HEADER, value);

    Ok(headers)
}
