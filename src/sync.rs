//! Sync/queue coordinator: the single mutator context that drives the
//! state manager, mirrors every state-affecting mutation into the store,
//! and talks to the analysis backend.
//!
//! Ordering contract: within one recording's lifecycle, local persistence
//! comes before any network attempt. Remote calls suspend the calling flow;
//! nothing else mutates the model while one is in flight.

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::capture::CaptureResult;
use crate::client::AnalysisClient;
use crate::model::{
    format_capture_timestamp, Case, CaseId, CasePatch, QueuedRecording, Recording, RecordingId,
    RecordingPatch,
};
use crate::state::AppModel;
use crate::store::{Collection, CollectionStore};
use crate::{AppError, ErrorKind, DEFAULT_CASE_NAME};

/// Toast shown when a recording is saved while offline.
pub const OFFLINE_DEFERRED_NOTICE: &str = "Recording saved. Offline: queued for processing.";

/// Outcome of one queue drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub synced: usize,
    pub still_queued: usize,
}

pub struct App<C: AnalysisClient> {
    model: AppModel,
    store: CollectionStore,
    client: C,
}

impl<C: AnalysisClient> App<C> {
    #[must_use]
    pub fn new(model: AppModel, store: CollectionStore, client: C) -> Self {
        Self {
            model,
            store,
            client,
        }
    }

    /// Load persisted collections and rebuild the model. Creates the
    /// first-run default case when none exist; otherwise selects the first
    /// case so the shell always starts with a usable selection.
    pub fn bootstrap(store: CollectionStore, client: C) -> Result<Self, AppError> {
        let cases: Vec<Case> = store.load(Collection::Cases)?;
        let recordings: Vec<Recording> = store.load(Collection::Recordings)?;
        let queue: Vec<QueuedRecording> = store.load(Collection::OfflineQueue)?;

        let model = AppModel::hydrate(cases, recordings, queue);
        let mut app = Self {
            model,
            store,
            client,
        };

        if app.model.case_count() == 0 {
            app.create_case(DEFAULT_CASE_NAME)?;
        } else if app.model.current_case().is_none() {
            let first = app.model.cases()[0].id.clone();
            app.model.set_current_case(Some(&first));
        }

        info!(
            cases = app.model.case_count(),
            recordings = app.model.recording_count(),
            queued = app.model.queue_len(),
            "state hydrated"
        );
        Ok(app)
    }

    #[must_use]
    pub fn model(&self) -> &AppModel {
        &self.model
    }

    pub fn set_is_recording(&mut self, is_recording: bool) {
        self.model.is_recording = is_recording;
    }

    pub fn clear_notices(&mut self) {
        self.model.clear_notices();
    }

    // --- Case operations ---

    pub fn create_case(&mut self, name: &str) -> Result<CaseId, AppError> {
        let id = self.model.create_case(name)?;
        if let Some(case) = self.model.case(&id).cloned() {
            self.store.save_case(&case)?;
        }
        info!(case_id = %id, "case created");
        Ok(id)
    }

    pub fn rename_case(&mut self, case_id: &CaseId, name: &str) -> Result<bool, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::new(ErrorKind::Validation, "case name cannot be empty"));
        }
        let touched = self.model.update_case(
            case_id,
            CasePatch {
                name: Some(name.to_string()),
            },
        );
        if touched {
            self.store.save_cases(&self.model.cases_snapshot())?;
        }
        Ok(touched)
    }

    /// Delete a case and everything it owns. Returns the audio locators of
    /// the removed recordings so the shell can release the artifacts.
    /// Missing id is a no-op.
    pub fn delete_case(&mut self, case_id: &CaseId) -> Result<Vec<String>, AppError> {
        let Some(removal) = self.model.delete_case(case_id) else {
            return Ok(Vec::new());
        };
        self.store.delete_case(case_id)?;
        self.store.save_recordings(&self.model.recordings_snapshot())?;
        self.store.save_queue(&self.model.queue_snapshot())?;
        info!(
            case_id = %removal.case.id,
            recordings = removal.recordings.len(),
            dequeued = removal.dequeued,
            "case deleted"
        );
        Ok(removal
            .recordings
            .into_iter()
            .map(|r| r.audio_uri)
            .collect())
    }

    pub fn set_current_case(&mut self, case_id: Option<&CaseId>) -> Option<Case> {
        self.model.set_current_case(case_id).cloned()
    }

    // --- Recording operations ---

    /// Finalize a capture under the current case: persist the record, then
    /// either attempt analysis (online) or defer it via the durable queue
    /// (offline). An empty requested name falls back to the formatted
    /// capture timestamp.
    #[instrument(skip(self, capture, requested_name))]
    pub async fn finalize_recording(
        &mut self,
        capture: CaptureResult,
        requested_name: &str,
    ) -> Result<RecordingId, AppError> {
        let case_id = self
            .model
            .current_case()
            .map(|c| c.id.clone())
            .ok_or_else(|| AppError::new(ErrorKind::InvalidState, "no case selected"))?;

        let timestamp = Utc::now();
        let trimmed = requested_name.trim();
        let name = if trimmed.is_empty() {
            format_capture_timestamp(&timestamp)
        } else {
            trimmed.to_string()
        };

        let recording = Recording::new(
            capture.id,
            case_id,
            capture.audio_uri,
            capture.duration_seconds,
            timestamp,
            name,
        );
        let id = recording.id.clone();

        // Local durability comes before any network attempt.
        self.store.upsert_recording(&recording)?;
        self.model.add_recording(recording.clone())?;

        if self.model.is_online {
            match self.client.analyze(&recording.audio_uri).await {
                Ok(outcome) => {
                    info!(recording_id = %id, "analysis complete");
                    self.apply_recording_patch(
                        &id,
                        RecordingPatch::synced(outcome.transcript, outcome.analysis),
                    )?;
                }
                Err(e) => {
                    warn!(recording_id = %id, error = %e, "analysis attempt failed");
                    // Failed means we tried; only recordings that were
                    // offline at submit time enter the queue.
                    self.apply_recording_patch(&id, RecordingPatch::failed())?;
                    self.model.set_error(AppError::from(e));
                }
            }
        } else {
            if let Some(entry) = self.model.add_to_queue(&id) {
                self.store.enqueue(&entry)?;
            }
            self.model.set_toast(OFFLINE_DEFERRED_NOTICE);
            info!(recording_id = %id, "analysis deferred while offline");
        }

        Ok(id)
    }

    pub fn rename_recording(&mut self, id: &RecordingId, name: &str) -> Result<bool, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::new(
                ErrorKind::Validation,
                "recording name cannot be empty",
            ));
        }
        self.apply_recording_patch(id, RecordingPatch::rename(name))
    }

    /// Delete a recording everywhere it is referenced. Returns the audio
    /// locator for artifact cleanup; `None` when the id was unknown.
    pub fn delete_recording(&mut self, id: &RecordingId) -> Result<Option<String>, AppError> {
        let Some(recording) = self.model.delete_recording(id) else {
            return Ok(None);
        };
        self.store.delete_recording(id)?;
        self.store.remove_from_queue(id)?;
        info!(recording_id = %id, "recording deleted");
        Ok(Some(recording.audio_uri))
    }

    // --- Connectivity & queue ---

    /// Record a connectivity change. A transition to online triggers a
    /// drain pass; going offline is informational only — in-flight calls
    /// are not cancelled.
    pub async fn set_online(&mut self, online: bool) -> Result<Option<DrainReport>, AppError> {
        let was_online = self.model.is_online;
        self.model.is_online = online;
        if online && !was_online {
            return Ok(Some(self.drain_queue().await?));
        }
        Ok(None)
    }

    /// Retry every queued recording, oldest first. Success promotes the
    /// record to synced and drops the entry; failure bumps the retry count
    /// and leaves it enqueued.
    #[instrument(skip(self))]
    pub async fn drain_queue(&mut self) -> Result<DrainReport, AppError> {
        let entries = self.model.queue_snapshot();
        let mut report = DrainReport {
            attempted: entries.len(),
            ..DrainReport::default()
        };

        for entry in entries {
            let Some(recording) = self.model.recording(&entry.recording_id).cloned() else {
                // Entry outlived its recording; drop it.
                self.model.remove_from_queue(&entry.recording_id);
                self.store.save_queue(&self.model.queue_snapshot())?;
                continue;
            };

            match self.client.analyze(&recording.audio_uri).await {
                Ok(outcome) => {
                    self.apply_recording_patch(
                        &entry.recording_id,
                        RecordingPatch::synced(outcome.transcript, outcome.analysis),
                    )?;
                    self.model.remove_from_queue(&entry.recording_id);
                    self.store.remove_from_queue(&entry.recording_id)?;
                    report.synced += 1;
                }
                Err(e) => {
                    warn!(
                        recording_id = %entry.recording_id,
                        retries = entry.retries,
                        error = %e,
                        "deferred analysis failed, leaving enqueued"
                    );
                    self.model.record_queue_attempt(&entry.recording_id);
                    self.store.save_queue(&self.model.queue_snapshot())?;
                    report.still_queued += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            synced = report.synced,
            still_queued = report.still_queued,
            "queue drain finished"
        );
        Ok(report)
    }

    /// Optional diagnostic; the sync flow never gates on it.
    pub async fn backend_reachable(&self) -> bool {
        self.client.health_check().await
    }

    /// Wipe all durable collections and reset in-memory state. Irreversible;
    /// callers must have confirmed with the user.
    pub fn clear_all(&mut self) -> Result<(), AppError> {
        self.store.clear_all()?;
        self.model = AppModel::new();
        info!("all data cleared");
        Ok(())
    }

    fn apply_recording_patch(
        &mut self,
        id: &RecordingId,
        patch: RecordingPatch,
    ) -> Result<bool, AppError> {
        let touched = self.model.update_recording(id, patch)?;
        if touched {
            if let Some(recording) = self.model.recording(id).cloned() {
                self.store.upsert_recording(&recording)?;
            }
        }
        Ok(touched)
    }
}
