use std::path::PathBuf;
use thiserror::Error;

#[derive(Error,Debug)]
pub enum PbsError {
    #[error("failed to launch {program}: {source}")]
    Launch { program:String, source:std::io::Error },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed { program:String, status:std::process::ExitStatus, stderr:String },

    #[error("no job id found in scheduler response '{0}'")]
    NoJobId(String),

    #[error("cannot write batch script {path:?}: {source}")]
    Write { path:PathBuf, source:std::io::Error },
}

pub type Result<T> = std::result::Result<T, PbsError>;
