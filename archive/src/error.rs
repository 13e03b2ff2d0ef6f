use std::path::PathBuf;
use thiserror::Error;

#[derive(Error,Debug)]
pub enum ArchiveError {
    #[error("malformed scan name '{name}': expected {expected} tokens separated by '_', found {found}")]
    MalformedScanName { name:String, expected:usize, found:usize },

    #[error("subject file not found: {0:?}")]
    SubjectFileNotFound(PathBuf),

    #[error("malformed subject line {line_number}: '{line}'")]
    MalformedSubjectLine { line_number:usize, line:String },

    #[error("subject {0} has no structural reference project")]
    MissingReferenceProject(String),

    #[error("subject {0} has no session classifier")]
    MissingClassifier(String),

    #[error("subject {0} has no scan specified")]
    MissingScan(String),

    #[error(transparent)]
    Env(#[from] utils::EnvError),

    #[error("i/o error on {path:?}: {source}")]
    Io { path:PathBuf, source:std::io::Error },
}

impl ArchiveError {
    pub fn io(path:impl Into<PathBuf>,source:std::io::Error) -> Self {
        ArchiveError::Io { path:path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
