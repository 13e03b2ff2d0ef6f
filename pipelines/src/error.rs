use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;
use archive::ArchiveError;
use pbs::PbsError;
use crate::config::ConfigError;

#[derive(Error,Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Pbs(#[from] PbsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("i/o failure at {path:?}: {source}")]
    Io { path:PathBuf, source:std::io::Error },
    #[error("cannot launch {program}: {source}")]
    Launch { program:String, source:std::io::Error },
    #[error("{program} exited with {status}")]
    CommandFailed { program:String, status:ExitStatus },
}

impl PipelineError {
    pub fn io(path:impl Into<PathBuf>,source:std::io::Error) -> Self {
        PipelineError::Io { path:path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
