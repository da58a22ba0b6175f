//! Domain entities shared between the state manager, the store, and the
//! sync coordinator. Everything here is serializable; the persisted layout
//! is exactly these shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(CaseId);
typed_id!(RecordingId);

// --- Sync status state machine ---

/// A recording's state relative to remote analysis.
///
/// Valid transitions: `Pending -> Synced`, `Pending -> Failed`,
/// `Failed -> Synced`. `Synced` is terminal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sync transition from {from} to {to}")]
pub struct TransitionError {
    pub from: SyncStatus,
    pub to: SyncStatus,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self == to {
            return true;
        }
        matches!(
            (self, to),
            (Self::Pending, Self::Synced | Self::Failed) | (Self::Failed, Self::Synced)
        )
    }

    pub fn validate_transition(self, to: Self) -> Result<(), TransitionError> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionError { from: self, to })
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Legal analysis payload ---

/// Structured analysis copied wholesale from the backend response. Fields
/// absent from the payload deserialize to empty strings/lists.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LegalAnalysis {
    pub objection: String,
    pub one_liner: String,
    pub argument_breakdown: String,
    pub proposed_counter_argument: String,
    pub case_law: Vec<String>,
    pub statutory_law: Vec<String>,
    pub constitutional_authorities: Vec<String>,
}

// --- Entities ---

/// One captured audio evidence unit. `audio_uri` is an opaque locator into
/// the shell's local filesystem; the core never touches the bytes except to
/// submit them for analysis.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Recording {
    pub id: RecordingId,
    pub case_id: CaseId,
    pub audio_uri: String,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub raw_transcript: String,
    pub analysis: Option<LegalAnalysis>,
    pub sync_status: SyncStatus,
}

impl Recording {
    /// A freshly finalized recording: empty transcript, no analysis,
    /// `Pending`. Duration is clamped non-negative.
    #[must_use]
    pub fn new(
        id: RecordingId,
        case_id: CaseId,
        audio_uri: impl Into<String>,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            case_id,
            audio_uri: audio_uri.into(),
            duration_seconds: duration_seconds.max(0.0),
            timestamp,
            name: name.into(),
            raw_transcript: String::new(),
            analysis: None,
            sync_status: SyncStatus::Pending,
        }
    }
}

/// A named container of recordings for one legal matter. The owned
/// recording list is not stored here; it is derived from the recording
/// index (see `AppModel`) and materialized as a [`CaseView`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Case {
    pub id: CaseId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Case {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CaseId::generate(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A case together with its recordings, in capture order. Computed on
/// demand for rendering; never the source of truth.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CaseView {
    pub id: CaseId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub recordings: Vec<Recording>,
}

/// Queue membership for a recording awaiting a deferred analysis attempt.
/// References the live record by id; exists only while that record is
/// `Pending` and was offline at submit time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct QueuedRecording {
    pub recording_id: RecordingId,
    pub retries: u32,
    pub enqueued_at: DateTime<Utc>,
    pub last_attempt: DateTime<Utc>,
}

impl QueuedRecording {
    #[must_use]
    pub fn new(recording_id: RecordingId) -> Self {
        let now = Utc::now();
        Self {
            recording_id,
            retries: 0,
            enqueued_at: now,
            last_attempt: now,
        }
    }
}

// --- Typed patches ---

/// The mutable subset of [`Recording`]. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordingPatch {
    pub name: Option<String>,
    pub raw_transcript: Option<String>,
    pub analysis: Option<LegalAnalysis>,
    pub sync_status: Option<SyncStatus>,
}

impl RecordingPatch {
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// The patch applied when remote analysis succeeds.
    #[must_use]
    pub fn synced(transcript: impl Into<String>, analysis: LegalAnalysis) -> Self {
        Self {
            raw_transcript: Some(transcript.into()),
            analysis: Some(analysis),
            sync_status: Some(SyncStatus::Synced),
            ..Self::default()
        }
    }

    /// The patch applied when an attempted remote analysis errors.
    #[must_use]
    pub fn failed() -> Self {
        Self {
            sync_status: Some(SyncStatus::Failed),
            ..Self::default()
        }
    }
}

/// The mutable subset of [`Case`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CasePatch {
    pub name: Option<String>,
}

/// Default display name for a recording finalized at `ts`,
/// e.g. `"Mon, Jan 5 · 3:04 PM"`.
#[must_use]
pub fn format_capture_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %b %-d · %-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sync_status_allows_forward_transitions() {
        assert!(SyncStatus::Pending.can_transition_to(SyncStatus::Synced));
        assert!(SyncStatus::Pending.can_transition_to(SyncStatus::Failed));
        assert!(SyncStatus::Failed.can_transition_to(SyncStatus::Synced));
    }

    #[test]
    fn sync_status_never_regresses_from_synced() {
        assert!(!SyncStatus::Synced.can_transition_to(SyncStatus::Pending));
        assert!(!SyncStatus::Synced.can_transition_to(SyncStatus::Failed));
        assert!(SyncStatus::Synced.can_transition_to(SyncStatus::Synced));
    }

    #[test]
    fn failed_cannot_return_to_pending() {
        let err = SyncStatus::Failed
            .validate_transition(SyncStatus::Pending)
            .unwrap_err();
        assert_eq!(err.from, SyncStatus::Failed);
        assert_eq!(err.to, SyncStatus::Pending);
    }

    #[test]
    fn analysis_defaults_all_fields_when_payload_is_partial() {
        let parsed: LegalAnalysis =
            serde_json::from_str(r#"{"objection":"Hearsay"}"#).unwrap();
        assert_eq!(parsed.objection, "Hearsay");
        assert_eq!(parsed.one_liner, "");
        assert!(parsed.case_law.is_empty());
        assert!(parsed.constitutional_authorities.is_empty());
    }

    #[test]
    fn analysis_round_trips_camel_case_keys() {
        let analysis = LegalAnalysis {
            objection: "Leading Question".into(),
            one_liner: "Objection, leading.".into(),
            ..LegalAnalysis::default()
        };
        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json.get("oneLiner").is_some());
        assert!(json.get("proposedCounterArgument").is_some());
    }

    #[test]
    fn new_recording_is_pending_and_empty() {
        let rec = Recording::new(
            RecordingId::generate(),
            CaseId::generate(),
            "file:///tmp/a.m4a",
            12.5,
            Utc::now(),
            "Witness testimony",
        );
        assert_eq!(rec.sync_status, SyncStatus::Pending);
        assert_eq!(rec.raw_transcript, "");
        assert!(rec.analysis.is_none());
    }

    #[test]
    fn negative_duration_is_clamped() {
        let rec = Recording::new(
            RecordingId::generate(),
            CaseId::generate(),
            "file:///tmp/a.m4a",
            -3.0,
            Utc::now(),
            "x",
        );
        assert_eq!(rec.duration_seconds, 0.0);
    }

    #[test]
    fn capture_timestamp_format() {
        // Monday 2026-01-05 15:04 UTC
        let ts = Utc.with_ymd_and_hms(2026, 1, 5, 15, 4, 0).unwrap();
        assert_eq!(format_capture_timestamp(&ts), "Mon, Jan 5 · 3:04 PM");
    }

    #[test]
    fn capture_timestamp_format_morning_single_digits() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 9, 7, 5, 0).unwrap();
        assert_eq!(format_capture_timestamp(&ts), "Sun, Aug 9 · 7:05 AM");
    }

    #[test]
    fn sync_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SyncStatus::Pending).unwrap(),
            r#""pending""#
        );
        assert_eq!(
            serde_json::to_string(&SyncStatus::Failed).unwrap(),
            r#""failed""#
        );
    }
}
