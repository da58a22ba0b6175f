//! Offline-first core for a legal-evidence recording app.
//!
//! The crate owns everything between the capture collaborator and the
//! rendering shell: the durable collection store, the in-memory domain
//! state, the remote analysis client, and the sync coordinator that keeps
//! the three consistent under unreliable connectivity.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod capture;
pub mod client;
pub mod config;
pub mod model;
pub mod state;
pub mod store;
pub mod sync;

use serde::{Deserialize, Serialize};

pub use capture::{AudioCapture, CaptureError, CaptureResult};
pub use client::{AnalysisClient, AnalysisOutcome, HttpAnalysisClient, RemoteError};
pub use config::BackendConfig;
pub use model::{
    Case, CaseId, CasePatch, CaseView, LegalAnalysis, QueuedRecording, Recording, RecordingId,
    RecordingPatch, SyncStatus, TransitionError,
};
pub use state::{AppModel, CaseRemoval, StateError};
pub use store::{Collection, CollectionStore, StoreError};
pub use sync::{App, DrainReport};

/// Name of the case created on first run when no cases exist yet.
pub const DEFAULT_CASE_NAME: &str = "Default Case";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    RemoteStatus,
    Validation,
    NotFound,
    Permission,
    Storage,
    Serialization,
    InvalidState,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::RemoteStatus => "REMOTE_STATUS",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Permission => "PERMISSION_DENIED",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::RemoteStatus | Self::Storage => {
                ErrorSeverity::Transient
            }
            Self::Validation | Self::NotFound | Self::Permission => ErrorSeverity::Permanent,
            Self::Serialization | Self::InvalidState | Self::Internal => ErrorSeverity::Fatal,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RemoteStatus | Self::Storage
        )
    }
}

/// Crate-level error surfaced to shells. Module-level errors (`StoreError`,
/// `RemoteError`, `StateError`) convert into this at the coordinator seam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    /// Short message suitable for an alert or toast.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Network => "Network unavailable. Please check your connection.",
            ErrorKind::Timeout => "The analysis service took too long to respond.",
            ErrorKind::RemoteStatus => "The analysis service rejected the request.",
            ErrorKind::Validation => "Invalid input.",
            ErrorKind::NotFound => "The requested item no longer exists.",
            ErrorKind::Permission => "Microphone permission is required to record.",
            ErrorKind::Storage => "Could not save your data. Please try again.",
            ErrorKind::Serialization | ErrorKind::Internal => "Something went wrong.",
            ErrorKind::InvalidState => "That action is not available right now.",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

impl From<StateError> for AppError {
    fn from(e: StateError) -> Self {
        let kind = match &e {
            StateError::EmptyCaseName => ErrorKind::Validation,
            StateError::UnknownCase(_) => ErrorKind::NotFound,
            StateError::DuplicateRecording(_) | StateError::Transition(_) => {
                ErrorKind::InvalidState
            }
        };
        Self::new(kind, e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        let kind = match &e {
            StoreError::Serialization(_) => ErrorKind::Serialization,
            _ => ErrorKind::Storage,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<RemoteError> for AppError {
    fn from(e: RemoteError) -> Self {
        let kind = match &e {
            RemoteError::Timeout => ErrorKind::Timeout,
            RemoteError::Status { .. } => ErrorKind::RemoteStatus,
            RemoteError::InvalidBody(_) => ErrorKind::Serialization,
            RemoteError::Network(_) | RemoteError::Artifact { .. } => ErrorKind::Network,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<CaptureError> for AppError {
    fn from(e: CaptureError) -> Self {
        let kind = match &e {
            CaptureError::PermissionDenied => ErrorKind::Permission,
            CaptureError::NoActiveRecording => ErrorKind::InvalidState,
            CaptureError::Io(_) => ErrorKind::Internal,
        };
        Self::new(kind, e.to_string())
    }
}
