//! Rendering, submission and status queries of PBS/Torque batch jobs.

pub mod error;
pub mod qstat;
pub mod scheduler;
pub mod script;

pub use error::{PbsError, Result};
pub use qstat::{JobState, JobStatus};
pub use scheduler::{queued_or_running, JobId, Qsub, Scheduler};
pub use script::{BatchScript, PbsOpts, ScriptCommand};
