//! Working set store: the ordered file selection plus the latest validation
//! outcome per selection, and the status gate that keeps validation and merge
//! requests mutually exclusive.
//!
//! Every transition lives here and takes `&mut self`; the session is the only
//! owner, so there is exactly one writer.

use std::collections::HashMap;

use shared::{
    domain::{SelectionId, SessionStatus, ValidationToken},
    protocol::{FileValidationResult, DEFAULT_MERGED_FILENAME, MIN_MERGE_FILES},
};
use tracing::{debug, warn};

use crate::{
    delivery::MergedDocument,
    error::{
        MergeError, RemoteError, SessionError, MERGE_FAILED_MESSAGE,
        NOT_ENOUGH_VALID_FILES_MESSAGE, VALIDATION_FAILED_MESSAGE,
    },
    intake::{CandidateFile, FileSource},
};

#[derive(Debug, Clone)]
pub struct FileHandle {
    pub id: SelectionId,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    pub source: FileSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub filename: String,
    pub is_valid: bool,
    pub size_bytes: u64,
    pub size_kb: f64,
    pub error: Option<String>,
}

impl From<FileValidationResult> for ValidationOutcome {
    fn from(value: FileValidationResult) -> Self {
        Self {
            filename: value.filename,
            is_valid: value.is_valid,
            size_bytes: value.size,
            size_kb: value.size_kb,
            error: value.error,
        }
    }
}

/// A validation round about to be issued: the full set as it is right now.
#[derive(Debug, Clone)]
pub(crate) struct ValidationTicket {
    pub token: ValidationToken,
    pub files: Vec<FileHandle>,
}

#[derive(Debug, Clone)]
pub(crate) struct MergeTicket {
    pub files: Vec<FileHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValidationApply {
    Applied { valid: usize, total: usize },
    Failed,
    Stale,
}

#[derive(Debug)]
pub(crate) enum MergeApply {
    Completed(MergedDocument),
    Failed,
    Stale,
}

#[derive(Debug, Default)]
pub struct WorkingSet {
    files: Vec<FileHandle>,
    outcomes: HashMap<SelectionId, ValidationOutcome>,
    status: SessionStatus,
    last_error: Option<String>,
    next_id: SelectionId,
    latest_token: ValidationToken,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[FileHandle] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn outcome(&self, id: SelectionId) -> Option<&ValidationOutcome> {
        self.outcomes.get(&id)
    }

    /// Number of stored outcomes, including any left behind by a failed round.
    pub fn outcome_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Files currently judged valid, in working-set order.
    pub fn valid_files(&self) -> Vec<&FileHandle> {
        self.files
            .iter()
            .filter(|file| self.outcome(file.id).is_some_and(|outcome| outcome.is_valid))
            .collect()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_files().len()
    }

    pub fn can_merge(&self) -> bool {
        self.valid_count() >= MIN_MERGE_FILES && !self.status.is_busy()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.files.iter().map(|file| file.size_bytes).sum()
    }

    fn ensure_mutable(&self) -> Result<(), SessionError> {
        if self.status == SessionStatus::Merging {
            return Err(SessionError::MergeInProgress);
        }
        Ok(())
    }

    pub(crate) fn append(
        &mut self,
        accepted: Vec<CandidateFile>,
    ) -> Result<Vec<SelectionId>, SessionError> {
        self.ensure_mutable()?;
        let mut ids = Vec::with_capacity(accepted.len());
        for candidate in accepted {
            let id = self.next_id;
            self.next_id = id.next();
            self.files.push(FileHandle {
                id,
                name: candidate.name,
                size_bytes: candidate.size_bytes,
                mime_type: candidate.mime_type,
                source: candidate.source,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    pub(crate) fn remove(&mut self, id: SelectionId) -> Result<bool, SessionError> {
        self.ensure_mutable()?;
        let before = self.files.len();
        self.files.retain(|file| file.id != id);
        Ok(self.files.len() != before)
    }

    pub(crate) fn clear(&mut self) -> Result<bool, SessionError> {
        self.ensure_mutable()?;
        let changed = !self.files.is_empty();
        self.files.clear();
        Ok(changed)
    }

    /// Supersedes every earlier round. An empty set resets to `Idle` without a
    /// request; otherwise the returned ticket carries the entire current set.
    pub(crate) fn begin_validation(&mut self) -> Option<ValidationTicket> {
        self.latest_token = self.latest_token.next();

        if self.files.is_empty() {
            self.outcomes.clear();
            self.status = SessionStatus::Idle;
            return None;
        }

        self.status = SessionStatus::Validating;
        self.last_error = None;
        Some(ValidationTicket {
            token: self.latest_token,
            files: self.files.clone(),
        })
    }

    pub(crate) fn apply_validation(
        &mut self,
        token: ValidationToken,
        submitted: &[FileHandle],
        result: Result<Vec<ValidationOutcome>, RemoteError>,
    ) -> ValidationApply {
        if token != self.latest_token {
            debug!(%token, latest = %self.latest_token, "discarding superseded validation response");
            return ValidationApply::Stale;
        }

        self.status = SessionStatus::Idle;
        match result {
            Ok(outcomes) => {
                self.outcomes = reconcile(submitted, outcomes);
                ValidationApply::Applied {
                    valid: self.valid_count(),
                    total: self.files.len(),
                }
            }
            Err(err) => {
                warn!(%token, error = %err, status = ?err.status(), "validation request failed");
                self.last_error = Some(VALIDATION_FAILED_MESSAGE.to_string());
                ValidationApply::Failed
            }
        }
    }

    pub(crate) fn begin_merge(&mut self) -> Result<MergeTicket, MergeError> {
        if self.status.is_busy() {
            return Err(MergeError::Busy(self.status));
        }

        let files: Vec<FileHandle> = self.valid_files().into_iter().cloned().collect();
        if files.len() < MIN_MERGE_FILES {
            self.last_error = Some(NOT_ENOUGH_VALID_FILES_MESSAGE.to_string());
            return Err(MergeError::NotEnoughValidFiles { valid: files.len() });
        }

        self.status = SessionStatus::Merging;
        self.last_error = None;
        Ok(MergeTicket { files })
    }

    pub(crate) fn apply_merge(&mut self, result: Result<Vec<u8>, RemoteError>) -> MergeApply {
        if self.status != SessionStatus::Merging {
            debug!(status = %self.status, "ignoring merge response outside of a merge");
            return MergeApply::Stale;
        }

        self.status = SessionStatus::Idle;
        match result {
            Ok(bytes) => {
                self.files.clear();
                self.outcomes.clear();
                MergeApply::Completed(MergedDocument::new(DEFAULT_MERGED_FILENAME, bytes))
            }
            Err(err) => {
                warn!(error = %err, status = ?err.status(), "merge request failed");
                self.last_error = Some(MERGE_FAILED_MESSAGE.to_string());
                MergeApply::Failed
            }
        }
    }
}

/// Correlates a response with the snapshot it was computed for. The wire only
/// carries filenames, so an entry first claims the submitted file at its own
/// position when the names agree, then the first unclaimed file with that name.
/// Entries that match nothing are dropped.
pub(crate) fn reconcile(
    submitted: &[FileHandle],
    results: Vec<ValidationOutcome>,
) -> HashMap<SelectionId, ValidationOutcome> {
    let mut claimed = vec![false; submitted.len()];
    let mut slots: Vec<Option<usize>> = vec![None; results.len()];

    for (index, result) in results.iter().enumerate() {
        if submitted
            .get(index)
            .is_some_and(|file| file.name == result.filename)
        {
            claimed[index] = true;
            slots[index] = Some(index);
        }
    }

    for (index, result) in results.iter().enumerate() {
        if slots[index].is_some() {
            continue;
        }
        let position = (0..submitted.len())
            .find(|&candidate| !claimed[candidate] && submitted[candidate].name == result.filename);
        if let Some(position) = position {
            claimed[position] = true;
            slots[index] = Some(position);
        }
    }

    results
        .into_iter()
        .zip(slots)
        .filter_map(|(result, slot)| match slot {
            Some(position) => Some((submitted[position].id, result)),
            None => {
                warn!(filename = %result.filename, "validation result matches no submitted file");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/working_set_tests.rs"]
mod tests;
