//! Direct access to an XNAT project archive on the file system.
//!
//! The archive is read "behind the scenes": paths are built from a fixed organization of
//! projects, sessions and resources, so a change in XNAT conventions would need a change here.

pub mod archive;
pub mod completion;
pub mod error;
pub mod resource;
pub mod scan_name;
pub mod subject;

pub use archive::{Archive, ArchiveSettings, CcfArchive, Hcp3TArchive, Hcp7TArchive};
pub use completion::CompletionChecker;
pub use error::{ArchiveError, Result};
pub use resource::Resource;
pub use scan_name::{FunctionalScanName, LongScanName};
pub use subject::{SubjectInfo, SubjectListLayout};
