//! Client-side orchestration for merging PDF documents through a remote
//! validation/merge service.
//!
//! Files enter through the intake filter into a [`WorkingSet`]; a
//! [`MergeSession`] keeps their validation outcomes current against the
//! service and, on request, merges the valid ones and hands back the result.

pub mod delivery;
pub mod error;
pub mod intake;
pub mod remote;
pub mod session;
pub mod working_set;

pub use delivery::{prepare_output_path, ArtifactSink, DirectorySink, FileSink, MergedDocument};
pub use error::{DeliveryError, MergeError, RemoteError, SessionError};
pub use intake::{filter_accepted, is_accepted, CandidateFile, FileSource};
pub use remote::{HttpRemoteService, RemoteService};
pub use session::{MergeSession, SessionEvent};
pub use working_set::{FileHandle, ValidationOutcome, WorkingSet};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
