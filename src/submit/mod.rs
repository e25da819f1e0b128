//! Submission client for the content-intake service
//!
//! Discovered items are handed to a downstream intake service over HTTP.
//! The `Intake` trait keeps the executor independent of the transport, and
//! a logging implementation backs runs without a configured endpoint.

use crate::extract::ExtractedMetadata;
use crate::storage::SourceRecord;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while submitting an item
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Intake endpoint is not a valid URL: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to reach intake service: {0}")]
    Transport(String),

    #[error("Intake service returned unexpected status {status}")]
    UnexpectedStatus { status: u16 },
}

/// Result type for submission operations
pub type SubmitResult = Result<SubmitOutcome, SubmissionError>;

/// How the intake service classified a submitted item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The item was accepted as new content
    Accepted,
    /// The intake service rejected the item as invalid
    Rejected,
    /// The intake service already knows this URL
    AlreadyExists,
}

/// Interface to the content-intake service
#[async_trait]
pub trait Intake: Send + Sync {
    /// Submits one discovered item
    ///
    /// # Arguments
    ///
    /// * `url` - The normalized candidate URL
    /// * `metadata` - Extracted page metadata
    /// * `source` - The source that produced the candidate
    async fn submit(
        &self,
        url: &str,
        metadata: &ExtractedMetadata,
        source: &SourceRecord,
    ) -> SubmitResult;
}

/// HTTP implementation that POSTs JSON to the configured endpoint
pub struct HttpIntake {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpIntake {
    /// Creates an HTTP intake client
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL of the intake submission endpoint
    /// * `api_key` - Optional bearer token sent with each request
    /// * `user_agent` - User agent string for outgoing requests
    /// * `timeout` - Per-request timeout
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, SubmissionError> {
        ::url::Url::parse(&endpoint)
            .map_err(|_| SubmissionError::InvalidEndpoint(endpoint.clone()))?;

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

/// Builds the JSON payload for one submission
///
/// Extracted topics take precedence; a source's configured topics fill in
/// when extraction found none.
fn build_payload(
    url: &str,
    metadata: &ExtractedMetadata,
    source: &SourceRecord,
) -> serde_json::Value {
    let topics: Vec<String> = metadata
        .topics
        .as_ref()
        .map(|t| t.value.clone())
        .unwrap_or_else(|| source.topics.clone());

    json!({
        "url": url,
        "source_id": source.id,
        "source_name": source.name,
        "title": metadata.title.as_ref().map(|t| t.value.clone()),
        "description": metadata.description.as_ref().map(|d| d.value.clone()),
        "image_url": metadata.image_url.as_ref().map(|i| i.value.clone()),
        "author": metadata.author.as_ref().map(|a| a.value.clone()),
        "published_at": metadata.published_at.as_ref().map(|p| p.value.to_rfc3339()),
        "excerpt": metadata.body_excerpt.as_ref().map(|e| e.value.clone()),
        "topics": topics,
    })
}

/// Maps an intake response status to an outcome
fn classify_status(status: u16) -> SubmitResult {
    match status {
        200 | 201 => Ok(SubmitOutcome::Accepted),
        409 => Ok(SubmitOutcome::AlreadyExists),
        422 => Ok(SubmitOutcome::Rejected),
        other => Err(SubmissionError::UnexpectedStatus { status: other }),
    }
}

#[async_trait]
impl Intake for HttpIntake {
    async fn submit(
        &self,
        url: &str,
        metadata: &ExtractedMetadata,
        source: &SourceRecord,
    ) -> SubmitResult {
        let payload = build_payload(url, metadata, source);

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        classify_status(response.status().as_u16())
    }
}

/// Logging implementation used when no endpoint is configured
///
/// Every item is accepted, so a dry run exercises the full pipeline
/// without an intake service.
pub struct LogIntake;

#[async_trait]
impl Intake for LogIntake {
    async fn submit(
        &self,
        url: &str,
        metadata: &ExtractedMetadata,
        source: &SourceRecord,
    ) -> SubmitResult {
        info!(
            source = %source.name,
            url = %url,
            title = metadata.title.as_ref().map(|t| t.value.as_str()),
            "Discovered item (no intake endpoint configured)"
        );
        Ok(SubmitOutcome::Accepted)
    }
}

/// Builds the intake client the configuration asks for
pub fn build_intake(
    config: &crate::config::IntakeConfig,
    user_agent: &str,
) -> Result<Arc<dyn Intake>, SubmissionError> {
    match &config.endpoint {
        Some(endpoint) => {
            let intake = HttpIntake::new(
                endpoint.clone(),
                config.api_key.clone(),
                user_agent,
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Arc::new(intake))
        }
        None => Ok(Arc::new(LogIntake)),
    }
}
