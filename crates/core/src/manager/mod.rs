//! Job manager: submission API, status queries, and the retry budget the
//! worker pool executes.

mod job_manager;
mod policy;

pub use job_manager::{
    resolve_folder, resolve_playlist_folder, BatchItem, JobManager, ManagerError, SubmitRequest,
};
pub use policy::RetryPolicy;
