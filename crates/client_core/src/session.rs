//! Validation and merge orchestration over a single working set.
//!
//! A `MergeSession` is the only writer of its `WorkingSet`. Remote calls run as
//! tasks in a `JoinSet`; their results are applied only from `next_event`, on
//! the caller's task, so orchestration logic never runs concurrently with
//! itself. Every change to the file selection starts a fresh validation round
//! for the whole set and supersedes the previous one; a superseded response is
//! dropped when it arrives.

use std::{collections::HashMap, sync::Arc};

use shared::domain::{SelectionId, ValidationToken};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::{
    delivery::MergedDocument,
    error::{MergeError, RemoteError, SessionError},
    intake::{filter_accepted, CandidateFile},
    remote::RemoteService,
    working_set::{FileHandle, MergeApply, ValidationApply, ValidationOutcome, WorkingSet},
};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ValidationApplied { valid: usize, total: usize },
    ValidationFailed { message: String },
    MergeCompleted(MergedDocument),
    MergeFailed { message: String },
}

enum Completion {
    Validation {
        token: ValidationToken,
        submitted: Vec<FileHandle>,
        result: Result<Vec<ValidationOutcome>, RemoteError>,
    },
    Merge {
        result: Result<Vec<u8>, RemoteError>,
    },
}

/// What an in-flight task was asked to do, by task id.
enum Request {
    Validation {
        token: ValidationToken,
        submitted: Vec<FileHandle>,
    },
    Merge,
}

impl Request {
    fn failed(self, err: JoinError) -> Completion {
        let failure = RemoteError::Task { source: err };
        match self {
            Request::Validation { token, submitted } => Completion::Validation {
                token,
                submitted,
                result: Err(failure),
            },
            Request::Merge => Completion::Merge {
                result: Err(failure),
            },
        }
    }
}

pub struct MergeSession<R: RemoteService + ?Sized + 'static> {
    remote: Arc<R>,
    working_set: WorkingSet,
    tasks: JoinSet<Completion>,
    requests: HashMap<task::Id, Request>,
}

impl<R: RemoteService + ?Sized + 'static> MergeSession<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            working_set: WorkingSet::new(),
            tasks: JoinSet::new(),
            requests: HashMap::new(),
        }
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    /// Requests issued and not yet applied, superseded ones included.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn can_merge(&self) -> bool {
        self.working_set.can_merge()
    }

    /// Appends the PDF-looking part of `batch`; anything else is dropped
    /// silently. A batch with no accepted file leaves the set untouched.
    pub fn add_files(
        &mut self,
        batch: impl IntoIterator<Item = CandidateFile>,
    ) -> Result<Vec<SelectionId>, SessionError> {
        let accepted = filter_accepted(batch);
        let ids = self.working_set.append(accepted)?;
        if !ids.is_empty() {
            self.revalidate();
        }
        Ok(ids)
    }

    pub fn remove_file(&mut self, id: SelectionId) -> Result<bool, SessionError> {
        let removed = self.working_set.remove(id)?;
        if removed {
            self.revalidate();
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<(), SessionError> {
        if self.working_set.clear()? {
            self.revalidate();
        }
        Ok(())
    }

    fn revalidate(&mut self) {
        let Some(ticket) = self.working_set.begin_validation() else {
            debug!("working set emptied; outcomes cleared without a request");
            return;
        };

        info!(
            token = %ticket.token,
            file_count = ticket.files.len(),
            "issuing validation round"
        );
        let request = Request::Validation {
            token: ticket.token,
            submitted: ticket.files.clone(),
        };
        let remote = Arc::clone(&self.remote);
        let handle = self.tasks.spawn(async move {
            let result = remote.validate_set(&ticket.files).await;
            Completion::Validation {
                token: ticket.token,
                submitted: ticket.files,
                result,
            }
        });
        self.requests.insert(handle.id(), request);
    }

    /// Starts a merge of exactly the files currently judged valid. Fails
    /// without touching the network while a round is running, while another
    /// merge is running, or when fewer than two files are valid.
    pub fn merge(&mut self) -> Result<(), MergeError> {
        let ticket = self.working_set.begin_merge()?;

        info!(file_count = ticket.files.len(), "issuing merge request");
        let remote = Arc::clone(&self.remote);
        let handle = self.tasks.spawn(async move {
            let result = remote.merge_set(&ticket.files).await;
            Completion::Merge { result }
        });
        self.requests.insert(handle.id(), Request::Merge);
        Ok(())
    }

    /// Waits for the next request to finish and applies it. Superseded
    /// validation responses are discarded here and never reported. A task
    /// that panicked or was aborted is applied as a failed request. Returns
    /// `None` once nothing is in flight.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            let completion = match joined {
                Ok((id, completion)) => {
                    self.requests.remove(&id);
                    completion
                }
                Err(err) => {
                    error!(error = %err, "remote request task did not complete");
                    match self.requests.remove(&err.id()) {
                        Some(request) => request.failed(err),
                        None => continue,
                    }
                }
            };
            if let Some(event) = self.apply(completion) {
                return Some(event);
            }
        }
        None
    }

    /// Drives every in-flight request to completion.
    pub async fn settle(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    fn apply(&mut self, completion: Completion) -> Option<SessionEvent> {
        match completion {
            Completion::Validation {
                token,
                submitted,
                result,
            } => match self.working_set.apply_validation(token, &submitted, result) {
                ValidationApply::Applied { valid, total } => {
                    info!(%token, valid, total, "validation round applied");
                    Some(SessionEvent::ValidationApplied { valid, total })
                }
                ValidationApply::Failed => Some(SessionEvent::ValidationFailed {
                    message: self.last_error_message(),
                }),
                ValidationApply::Stale => None,
            },
            Completion::Merge { result } => match self.working_set.apply_merge(result) {
                MergeApply::Completed(document) => {
                    info!(size_bytes = document.len(), "merge completed; working set reset");
                    Some(SessionEvent::MergeCompleted(document))
                }
                MergeApply::Failed => Some(SessionEvent::MergeFailed {
                    message: self.last_error_message(),
                }),
                MergeApply::Stale => None,
            },
        }
    }

    fn last_error_message(&self) -> String {
        self.working_set.last_error().unwrap_or_default().to_string()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
