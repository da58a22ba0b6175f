//! In-memory authoritative model of cases, recordings, selection,
//! connectivity, and the offline queue.
//!
//! Recordings live in a single map keyed by id; the per-case lists the UI
//! renders are derived from an index of ids kept in capture order. The two
//! can never drift because nothing else stores a recording by value.
//!
//! The model is purely in-memory: durable persistence is the caller's job
//! (see `sync::App` for the ordering contract with the store).

use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tracing::warn;

use crate::model::{
    Case, CaseId, CasePatch, CaseView, QueuedRecording, Recording, RecordingId, RecordingPatch,
    SyncStatus, TransitionError,
};
use crate::AppError;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("case name cannot be empty")]
    EmptyCaseName,

    #[error("unknown case: {0}")]
    UnknownCase(CaseId),

    #[error("recording already exists: {0}")]
    DuplicateRecording(RecordingId),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// What a cascading case deletion removed, so the caller can mirror the
/// removal durably and release audio artifacts.
#[derive(Debug, Clone)]
pub struct CaseRemoval {
    pub case: Case,
    pub recordings: Vec<Recording>,
    pub dequeued: usize,
}

#[derive(Debug, Default, Clone)]
pub struct AppModel {
    cases: Vec<Case>,
    recordings: HashMap<RecordingId, Recording>,
    case_index: HashMap<CaseId, Vec<RecordingId>>,
    offline_queue: VecDeque<QueuedRecording>,
    current_case_id: Option<CaseId>,

    pub is_online: bool,
    pub is_recording: bool,

    pub active_toast: Option<String>,
    pub active_error: Option<AppError>,
}

impl AppModel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            is_online: true,
            ..Self::default()
        }
    }

    /// Rebuild state from persisted collections. Entries that reference
    /// missing parents are dropped with a warning rather than failing the
    /// whole load.
    #[must_use]
    pub fn hydrate(
        cases: Vec<Case>,
        recordings: Vec<Recording>,
        queue: Vec<QueuedRecording>,
    ) -> Self {
        let mut model = Self::new();
        for case in cases {
            model.case_index.entry(case.id.clone()).or_default();
            model.cases.push(case);
        }
        for recording in recordings {
            match model.add_recording(recording) {
                Ok(()) => {}
                Err(e) => warn!(error = %e, "dropping persisted recording"),
            }
        }
        for entry in queue {
            let eligible = model
                .recordings
                .get(&entry.recording_id)
                .is_some_and(|r| r.sync_status == SyncStatus::Pending);
            let duplicate = model
                .offline_queue
                .iter()
                .any(|q| q.recording_id == entry.recording_id);
            if eligible && !duplicate {
                model.offline_queue.push_back(entry);
            } else {
                warn!(recording_id = %entry.recording_id, "dropping stale queue entry");
            }
        }
        model
    }

    // --- Cases ---

    /// Create a case and make it current. The name is trimmed; an empty
    /// result is a validation error.
    pub fn create_case(&mut self, name: &str) -> Result<CaseId, StateError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StateError::EmptyCaseName);
        }
        let case = Case::new(name);
        let id = case.id.clone();
        self.case_index.insert(id.clone(), Vec::new());
        self.cases.push(case);
        self.current_case_id = Some(id.clone());
        Ok(id)
    }

    /// Remove a case and everything it owns: its recordings leave the flat
    /// map, and their queue entries are dropped. The current selection
    /// becomes empty if it pointed at the deleted case; no other case is
    /// auto-selected. Missing id is a no-op.
    pub fn delete_case(&mut self, case_id: &CaseId) -> Option<CaseRemoval> {
        let pos = self.cases.iter().position(|c| &c.id == case_id)?;
        let case = self.cases.remove(pos);
        let ids = self.case_index.remove(case_id).unwrap_or_default();

        let mut removed = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(rec) = self.recordings.remove(id) {
                removed.push(rec);
            }
        }

        let before = self.offline_queue.len();
        self.offline_queue.retain(|q| !ids.contains(&q.recording_id));
        let dequeued = before - self.offline_queue.len();

        if self.current_case_id.as_ref() == Some(case_id) {
            self.current_case_id = None;
        }

        Some(CaseRemoval {
            case,
            recordings: removed,
            dequeued,
        })
    }

    /// Merge a patch into a case. Returns `false` (leaving state untouched)
    /// when the id is unknown.
    pub fn update_case(&mut self, case_id: &CaseId, patch: CasePatch) -> bool {
        let Some(case) = self.cases.iter_mut().find(|c| &c.id == case_id) else {
            return false;
        };
        if let Some(name) = patch.name {
            case.name = name;
        }
        true
    }

    /// Select a case by id. An unknown id (or `None`) clears the selection;
    /// callers observing `None` after asking for a specific id should treat
    /// it as not-found.
    pub fn set_current_case(&mut self, case_id: Option<&CaseId>) -> Option<&Case> {
        self.current_case_id = case_id
            .and_then(|id| self.cases.iter().find(|c| &c.id == id))
            .map(|c| c.id.clone());
        self.current_case()
    }

    #[must_use]
    pub fn current_case(&self) -> Option<&Case> {
        self.current_case_id.as_ref().and_then(|id| self.case(id))
    }

    #[must_use]
    pub fn case(&self, case_id: &CaseId) -> Option<&Case> {
        self.cases.iter().find(|c| &c.id == case_id)
    }

    #[must_use]
    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    #[must_use]
    pub fn case_view(&self, case_id: &CaseId) -> Option<CaseView> {
        let case = self.case(case_id)?;
        Some(CaseView {
            id: case.id.clone(),
            name: case.name.clone(),
            created_at: case.created_at,
            recordings: self.case_recordings(case_id),
        })
    }

    // --- Recordings ---

    /// Insert a finalized recording under its owning case. The case must
    /// exist and the id must be fresh.
    pub fn add_recording(&mut self, recording: Recording) -> Result<(), StateError> {
        if self.recordings.contains_key(&recording.id) {
            return Err(StateError::DuplicateRecording(recording.id));
        }
        let Some(ids) = self.case_index.get_mut(&recording.case_id) else {
            return Err(StateError::UnknownCase(recording.case_id));
        };
        ids.push(recording.id.clone());
        self.recordings.insert(recording.id.clone(), recording);
        Ok(())
    }

    /// Merge a patch into a recording. Unknown ids are a no-op (`Ok(false)`);
    /// a patch that would move the status backwards from `Synced` is
    /// rejected without touching the record.
    pub fn update_recording(
        &mut self,
        id: &RecordingId,
        patch: RecordingPatch,
    ) -> Result<bool, StateError> {
        let Some(rec) = self.recordings.get_mut(id) else {
            return Ok(false);
        };
        if let Some(next) = patch.sync_status {
            rec.sync_status.validate_transition(next)?;
            rec.sync_status = next;
        }
        if let Some(name) = patch.name {
            rec.name = name;
        }
        if let Some(transcript) = patch.raw_transcript {
            rec.raw_transcript = transcript;
        }
        if let Some(analysis) = patch.analysis {
            rec.analysis = Some(analysis);
        }
        Ok(true)
    }

    /// Remove a recording from the map, its case index, and the queue.
    /// Missing id is a no-op returning `None`.
    pub fn delete_recording(&mut self, id: &RecordingId) -> Option<Recording> {
        let recording = self.recordings.remove(id)?;
        if let Some(ids) = self.case_index.get_mut(&recording.case_id) {
            ids.retain(|r| r != id);
        }
        self.offline_queue.retain(|q| &q.recording_id != id);
        Some(recording)
    }

    #[must_use]
    pub fn recording(&self, id: &RecordingId) -> Option<&Recording> {
        self.recordings.get(id)
    }

    /// Flat recording list, ordered by case creation then capture order.
    #[must_use]
    pub fn recordings(&self) -> Vec<Recording> {
        self.cases
            .iter()
            .flat_map(|c| self.case_recordings(&c.id))
            .collect()
    }

    /// All recordings owned by `case_id`, in capture order. Always computed
    /// from the live index; there is no cached copy to go stale.
    #[must_use]
    pub fn case_recordings(&self, case_id: &CaseId) -> Vec<Recording> {
        self.case_index
            .get(case_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.recordings.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    // --- Offline queue ---

    /// Enqueue a recording for deferred analysis. Only existing, still
    /// pending recordings are eligible, and re-enqueueing is a no-op:
    /// membership is keyed by recording id, not entry identity.
    pub fn add_to_queue(&mut self, recording_id: &RecordingId) -> Option<QueuedRecording> {
        let eligible = self
            .recordings
            .get(recording_id)
            .is_some_and(|r| r.sync_status == SyncStatus::Pending);
        if !eligible {
            return None;
        }
        if self
            .offline_queue
            .iter()
            .any(|q| &q.recording_id == recording_id)
        {
            return None;
        }
        let entry = QueuedRecording::new(recording_id.clone());
        self.offline_queue.push_back(entry.clone());
        Some(entry)
    }

    pub fn remove_from_queue(&mut self, recording_id: &RecordingId) -> bool {
        let before = self.offline_queue.len();
        self.offline_queue.retain(|q| &q.recording_id != recording_id);
        before != self.offline_queue.len()
    }

    /// Bump retry count and last-attempt time after a failed drain attempt.
    pub fn record_queue_attempt(&mut self, recording_id: &RecordingId) -> Option<QueuedRecording> {
        let entry = self
            .offline_queue
            .iter_mut()
            .find(|q| &q.recording_id == recording_id)?;
        entry.retries = entry.retries.saturating_add(1);
        entry.last_attempt = chrono::Utc::now();
        Some(entry.clone())
    }

    #[must_use]
    pub fn queue(&self) -> &VecDeque<QueuedRecording> {
        &self.offline_queue
    }

    // --- Derived counters ---

    #[must_use]
    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    #[must_use]
    pub fn recording_count(&self) -> usize {
        self.recordings.len()
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.offline_queue.len()
    }

    // --- Persistence snapshots (insertion order) ---

    #[must_use]
    pub fn cases_snapshot(&self) -> Vec<Case> {
        self.cases.clone()
    }

    #[must_use]
    pub fn recordings_snapshot(&self) -> Vec<Recording> {
        self.recordings()
    }

    #[must_use]
    pub fn queue_snapshot(&self) -> Vec<QueuedRecording> {
        self.offline_queue.iter().cloned().collect()
    }

    // --- User notices ---

    pub fn set_toast(&mut self, message: impl Into<String>) {
        self.active_toast = Some(message.into());
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_notices(&mut self) {
        self.active_toast = None;
        self.active_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LegalAnalysis;
    use chrono::Utc;
    use proptest::prelude::*;

    fn sample_recording(case_id: &CaseId) -> Recording {
        Recording::new(
            RecordingId::generate(),
            case_id.clone(),
            "file:///tmp/rec.m4a",
            10.0,
            Utc::now(),
            "Cross-examination",
        )
    }

    /// Every recording appears in exactly one case's derived list, the one
    /// matching its case id, and queue entries reference live pending
    /// recordings only.
    fn assert_consistent(model: &AppModel) {
        let flat = model.recordings();
        assert_eq!(flat.len(), model.recording_count());
        for rec in &flat {
            let mut owners = 0;
            for case in model.cases() {
                let nested = model.case_recordings(&case.id);
                if nested.iter().any(|r| r.id == rec.id) {
                    owners += 1;
                    assert_eq!(case.id, rec.case_id);
                }
            }
            assert_eq!(owners, 1, "recording owned by exactly one case");
        }
        for entry in model.queue() {
            let rec = model.recording(&entry.recording_id).expect("queued id live");
            assert_eq!(rec.sync_status, SyncStatus::Pending);
        }
    }

    #[test]
    fn create_case_sets_current() {
        let mut model = AppModel::new();
        let id = model.create_case("Federal Republic v. Obi").unwrap();
        assert_eq!(model.case_count(), 1);
        assert_eq!(model.current_case().unwrap().id, id);
        assert_eq!(model.current_case().unwrap().name, "Federal Republic v. Obi");
    }

    #[test]
    fn create_case_trims_and_rejects_empty() {
        let mut model = AppModel::new();
        assert!(matches!(
            model.create_case("   "),
            Err(StateError::EmptyCaseName)
        ));
        let id = model.create_case("  State v. Ade  ").unwrap();
        assert_eq!(model.case(&id).unwrap().name, "State v. Ade");
    }

    #[test]
    fn add_recording_requires_existing_case() {
        let mut model = AppModel::new();
        let rec = sample_recording(&CaseId::generate());
        assert!(matches!(
            model.add_recording(rec),
            Err(StateError::UnknownCase(_))
        ));
    }

    #[test]
    fn add_recording_rejects_duplicate_id() {
        let mut model = AppModel::new();
        let case = model.create_case("A").unwrap();
        let rec = sample_recording(&case);
        model.add_recording(rec.clone()).unwrap();
        assert!(matches!(
            model.add_recording(rec),
            Err(StateError::DuplicateRecording(_))
        ));
    }

    #[test]
    fn update_recording_missing_id_is_noop() {
        let mut model = AppModel::new();
        model.create_case("A").unwrap();
        let before = model.recordings();
        let touched = model
            .update_recording(&RecordingId::generate(), RecordingPatch::rename("x"))
            .unwrap();
        assert!(!touched);
        assert_eq!(model.recordings(), before);
    }

    #[test]
    fn delete_recording_missing_id_is_noop() {
        let mut model = AppModel::new();
        model.create_case("A").unwrap();
        assert!(model.delete_recording(&RecordingId::generate()).is_none());
    }

    #[test]
    fn synced_status_never_regresses() {
        let mut model = AppModel::new();
        let case = model.create_case("A").unwrap();
        let rec = sample_recording(&case);
        let id = rec.id.clone();
        model.add_recording(rec).unwrap();
        model
            .update_recording(&id, RecordingPatch::synced("words", LegalAnalysis::default()))
            .unwrap();

        let err = model.update_recording(&id, RecordingPatch::failed());
        assert!(matches!(err, Err(StateError::Transition(_))));
        assert_eq!(
            model.recording(&id).unwrap().sync_status,
            SyncStatus::Synced
        );
    }

    #[test]
    fn failed_recording_can_still_sync() {
        let mut model = AppModel::new();
        let case = model.create_case("A").unwrap();
        let rec = sample_recording(&case);
        let id = rec.id.clone();
        model.add_recording(rec).unwrap();
        model.update_recording(&id, RecordingPatch::failed()).unwrap();
        model
            .update_recording(&id, RecordingPatch::synced("t", LegalAnalysis::default()))
            .unwrap();
        assert_eq!(
            model.recording(&id).unwrap().sync_status,
            SyncStatus::Synced
        );
    }

    #[test]
    fn queue_membership_is_keyed_by_recording_id() {
        let mut model = AppModel::new();
        let case = model.create_case("A").unwrap();
        let rec = sample_recording(&case);
        let id = rec.id.clone();
        model.add_recording(rec).unwrap();

        assert!(model.add_to_queue(&id).is_some());
        assert!(model.add_to_queue(&id).is_none());
        assert_eq!(model.queue_len(), 1);
    }

    #[test]
    fn synced_recording_is_not_queueable() {
        let mut model = AppModel::new();
        let case = model.create_case("A").unwrap();
        let rec = sample_recording(&case);
        let id = rec.id.clone();
        model.add_recording(rec).unwrap();
        model
            .update_recording(&id, RecordingPatch::synced("t", LegalAnalysis::default()))
            .unwrap();
        assert!(model.add_to_queue(&id).is_none());
    }

    #[test]
    fn delete_case_cascades_recordings_and_queue() {
        let mut model = AppModel::new();
        let keep = model.create_case("Keep").unwrap();
        let doomed = model.create_case("Drop").unwrap();

        let kept = sample_recording(&keep);
        let kept_id = kept.id.clone();
        model.add_recording(kept).unwrap();

        let mut dropped_ids = Vec::new();
        for _ in 0..3 {
            let rec = sample_recording(&doomed);
            dropped_ids.push(rec.id.clone());
            model.add_recording(rec).unwrap();
        }
        model.add_to_queue(&dropped_ids[0]).unwrap();

        let removal = model.delete_case(&doomed).unwrap();
        assert_eq!(removal.recordings.len(), 3);
        assert_eq!(removal.dequeued, 1);
        assert_eq!(model.recording_count(), 1);
        assert!(model.recording(&kept_id).is_some());
        assert_eq!(model.queue_len(), 0);
        assert!(model.current_case().is_none());
        assert_consistent(&model);
    }

    #[test]
    fn delete_case_missing_id_is_noop() {
        let mut model = AppModel::new();
        model.create_case("A").unwrap();
        assert!(model.delete_case(&CaseId::generate()).is_none());
        assert_eq!(model.case_count(), 1);
    }

    #[test]
    fn set_current_case_with_unknown_id_clears_selection() {
        let mut model = AppModel::new();
        model.create_case("A").unwrap();
        assert!(model.set_current_case(Some(&CaseId::generate())).is_none());
        assert!(model.current_case().is_none());
    }

    #[test]
    fn case_recordings_reflects_latest_mutation() {
        let mut model = AppModel::new();
        let case = model.create_case("A").unwrap();
        let rec = sample_recording(&case);
        let id = rec.id.clone();
        model.add_recording(rec).unwrap();

        model
            .update_recording(&id, RecordingPatch::rename("Renamed"))
            .unwrap();
        assert_eq!(model.case_recordings(&case)[0].name, "Renamed");

        model.delete_recording(&id);
        assert!(model.case_recordings(&case).is_empty());
    }

    #[test]
    fn hydrate_drops_orphans_and_stale_queue_entries() {
        let case = Case::new("A");
        let rec = sample_recording(&case.id);
        let orphan = sample_recording(&CaseId::generate());
        let queue = vec![
            QueuedRecording::new(rec.id.clone()),
            QueuedRecording::new(rec.id.clone()),
            QueuedRecording::new(orphan.id.clone()),
        ];

        let model = AppModel::hydrate(vec![case], vec![rec, orphan], queue);
        assert_eq!(model.recording_count(), 1);
        assert_eq!(model.queue_len(), 1);
        assert_consistent(&model);
    }

    proptest! {
        /// Random mutation sequences keep the flat map and the per-case
        /// index consistent.
        #[test]
        fn mutations_preserve_index_consistency(ops in proptest::collection::vec(0u8..6, 1..60)) {
            let mut model = AppModel::new();
            let a = model.create_case("A").unwrap();
            let b = model.create_case("B").unwrap();
            let mut ids: Vec<RecordingId> = Vec::new();
            let mut b_alive = true;

            for op in ops {
                match op {
                    0 => {
                        let rec = sample_recording(&a);
                        ids.push(rec.id.clone());
                        model.add_recording(rec).unwrap();
                    }
                    1 if b_alive => {
                        let rec = sample_recording(&b);
                        ids.push(rec.id.clone());
                        model.add_recording(rec).unwrap();
                    }
                    2 => {
                        if let Some(id) = ids.first().cloned() {
                            model.delete_recording(&id);
                            ids.remove(0);
                        }
                    }
                    3 => {
                        if let Some(id) = ids.last() {
                            model.add_to_queue(id);
                        }
                    }
                    4 => {
                        if let Some(id) = ids.last().cloned() {
                            let _ = model.update_recording(&id, RecordingPatch::failed());
                            model.remove_from_queue(&id);
                        }
                    }
                    5 if b_alive => {
                        if let Some(removal) = model.delete_case(&b) {
                            b_alive = false;
                            for rec in removal.recordings {
                                ids.retain(|id| id != &rec.id);
                            }
                        }
                    }
                    _ => {}
                }
                assert_consistent(&model);
            }
        }
    }
}
