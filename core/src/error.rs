use std::{io, path::PathBuf, sync::Arc};

use thiserror::Error;

/// Errors that can end a split run. All of them are fatal to the current run.
/// Chunks written before the error occurred stay on disk.
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("source document `{0}' does not exist or is not a file")]
    InvalidSource(PathBuf),

    #[error("unable to read source document")]
    SourceUnreadable(#[source] Arc<io::Error>),

    #[error("threshold must be greater than zero")]
    InvalidThreshold,

    #[error("output directory `{0}' does not exist or is not a directory")]
    OutputDirectoryUnavailable(PathBuf),

    #[error("unable to open chunk file `{path}' for writing")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no space left while writing chunk file `{path}'")]
    WriteCapacityExceeded { path: PathBuf },

    #[error("unable to write chunk file `{path}'")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed XML at byte {offset}")]
    Malformed {
        offset: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("splitting was aborted")]
    Aborted,
}

/// The kind of a [`SplitError`] without its payload. Can be copied and sent
/// to other threads freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitErrorKind {
    InvalidSource,
    SourceUnreadable,
    InvalidThreshold,
    OutputDirectoryUnavailable,
    DestinationUnavailable,
    WriteCapacityExceeded,
    WriteFailed,
    Malformed,
    Aborted,
}

impl SplitError {
    pub fn kind(&self) -> SplitErrorKind {
        match self {
            SplitError::InvalidSource(_) => SplitErrorKind::InvalidSource,
            SplitError::SourceUnreadable(_) => SplitErrorKind::SourceUnreadable,
            SplitError::InvalidThreshold => SplitErrorKind::InvalidThreshold,
            SplitError::OutputDirectoryUnavailable(_) => {
                SplitErrorKind::OutputDirectoryUnavailable
            }
            SplitError::DestinationUnavailable { .. } => SplitErrorKind::DestinationUnavailable,
            SplitError::WriteCapacityExceeded { .. } => SplitErrorKind::WriteCapacityExceeded,
            SplitError::WriteFailed { .. } => SplitErrorKind::WriteFailed,
            SplitError::Malformed { .. } => SplitErrorKind::Malformed,
            SplitError::Aborted => SplitErrorKind::Aborted,
        }
    }

    /// `true` if the error happened while a chunk file was being written
    pub fn is_write_error(&self) -> bool {
        matches!(
            self.kind(),
            SplitErrorKind::OutputDirectoryUnavailable
                | SplitErrorKind::DestinationUnavailable
                | SplitErrorKind::WriteCapacityExceeded
                | SplitErrorKind::WriteFailed
        )
    }
}
