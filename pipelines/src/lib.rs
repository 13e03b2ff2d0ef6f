//! Submission, tracking and completion checking of XNAT pipeline jobs on a PBS cluster.

pub mod args;
pub mod batch_submitter;
pub mod cinab;
pub mod config;
pub mod credentials;
pub mod error;
pub mod job_submitter;
pub mod pipeline;
pub mod report;
pub mod shadow;

pub use error::{PipelineError, Result};
pub use pipeline::{PipelineKind, ProcessingStage};
