pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use error::{GsyncError, GsyncResult};
pub use types::{GradeBook, GradeEntry, GradePayload, PushResult, Subject, SyncResult, UserIdentity};
