//! Remote analysis boundary: submit an audio artifact, get back a
//! transcript plus structured legal analysis.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::BackendConfig;
use crate::model::LegalAnalysis;

/// Analysis can take a while for longer recordings; the request carries a
/// generous bound rather than none at all.
pub const ANALYZE_TIMEOUT: Duration = Duration::from_secs(90);

/// The health probe is a diagnostic and must stay cheap.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

const AUDIO_FIELD: &str = "file";
const AUDIO_FILE_NAME: &str = "recording.m4a";
const AUDIO_MIME: &str = "audio/m4a";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("analysis request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("backend returned status {status}")]
    Status { status: u16 },

    #[error("invalid response body: {0}")]
    InvalidBody(String),

    #[error("could not read audio artifact {uri}: {source}")]
    Artifact {
        uri: String,
        #[source]
        source: std::io::Error,
    },
}

/// Successful analysis result. Missing analysis fields in the payload are
/// already defaulted; a partially populated response is not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub transcript: String,
    pub analysis: LegalAnalysis,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AnalyzeResponse {
    transcript: String,
    analysis: LegalAnalysis,
}

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Submit the artifact behind `audio_uri` for transcription and
    /// analysis. Suspends the caller until the backend answers or the
    /// request times out.
    async fn analyze(&self, audio_uri: &str) -> Result<AnalysisOutcome, RemoteError>;

    /// Cheap reachability probe. Diagnostic only — the sync flow never
    /// gates on it.
    async fn health_check(&self) -> bool;
}

pub struct HttpAnalysisClient {
    config: BackendConfig,
    http: reqwest::Client,
    analyze_timeout: Duration,
    health_timeout: Duration,
}

impl HttpAnalysisClient {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            analyze_timeout: ANALYZE_TIMEOUT,
            health_timeout: HEALTH_TIMEOUT,
        }
    }

    /// Override the request bounds (tests use short ones).
    #[must_use]
    pub fn with_timeouts(mut self, analyze: Duration, health: Duration) -> Self {
        self.analyze_timeout = analyze;
        self.health_timeout = health;
        self
    }

    async fn read_artifact(audio_uri: &str) -> Result<Vec<u8>, RemoteError> {
        let path = audio_uri.strip_prefix("file://").unwrap_or(audio_uri);
        tokio::fs::read(path).await.map_err(|source| RemoteError::Artifact {
            uri: audio_uri.to_string(),
            source,
        })
    }

    fn classify_send_error(e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    #[instrument(skip(self), fields(uri = audio_uri))]
    async fn analyze(&self, audio_uri: &str) -> Result<AnalysisOutcome, RemoteError> {
        let bytes = Self::read_artifact(audio_uri).await?;
        debug!(size = bytes.len(), "submitting audio for analysis");

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(AUDIO_FILE_NAME)
            .mime_str(AUDIO_MIME)
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(AUDIO_FIELD, part);

        let response = self
            .http
            .post(self.config.endpoint("analyze"))
            .multipart(form)
            .timeout(self.analyze_timeout)
            .send()
            .await
            .map_err(Self::classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "analysis rejected");
            return Err(RemoteError::Status {
                status: status.as_u16(),
            });
        }

        let body: AnalyzeResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidBody(e.to_string()))?;

        Ok(AnalysisOutcome {
            transcript: body.transcript,
            analysis: body.analysis,
        })
    }

    async fn health_check(&self) -> bool {
        let result = self
            .http
            .get(self.config.endpoint("health"))
            .timeout(self.health_timeout)
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }
}
