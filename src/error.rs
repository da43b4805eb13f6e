//! Error types for the word-count pipeline

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Everything that can stop a run. None of these are retried.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The command line did not name exactly one input file
    #[error("{0}")]
    Argument(String),

    /// The input file could not be opened
    #[error("cannot open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Scanning the input failed part way through
    #[error("read failed after line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    /// Replica counts that cannot make progress
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The OS refused to start a stage thread
    #[error("cannot spawn {stage} thread: {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked before finishing its input
    #[error("{stage} worker panicked")]
    WorkerPanicked { stage: &'static str },

    /// Writing results failed
    #[error("cannot write output: {0}")]
    Output(#[source] io::Error),
}

impl PipelineError {
    /// Create the usage error reported when the file argument is missing or repeated
    pub fn usage() -> Self {
        Self::Argument("Please supply the path to exactly 1 plain text file.".to_string())
    }

    /// Create a file-open error for `path`
    pub fn open<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }
}
