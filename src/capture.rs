//! Boundary to the audio capture collaborator.
//!
//! The core never records or plays audio itself; shells implement this
//! trait over their platform recorder and hand the core a
//! [`CaptureResult`] when the user stops a capture. Starting a new capture
//! while one is active is a caller-side precondition violation — adapters
//! are expected to reject or ignore such calls.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::RecordingId;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no recording in progress")]
    NoActiveRecording,

    #[error("capture I/O error: {0}")]
    Io(String),
}

/// What the capture collaborator hands back at capture-stop time.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub id: RecordingId,
    pub audio_uri: String,
    pub duration_seconds: f64,
}

/// Port implemented by the shell's audio layer. Failures surface to the
/// user; the core never retries capture operations.
#[async_trait]
pub trait AudioCapture: Send {
    async fn start_recording(&mut self) -> Result<(), CaptureError>;

    async fn stop_recording(&mut self) -> Result<CaptureResult, CaptureError>;

    async fn play_recording(&mut self, audio_uri: &str) -> Result<(), CaptureError>;

    async fn stop_playback(&mut self) -> Result<(), CaptureError>;

    /// Remove the audio artifact behind a deleted recording.
    async fn delete_artifact(&mut self, audio_uri: &str) -> Result<(), CaptureError>;
}
