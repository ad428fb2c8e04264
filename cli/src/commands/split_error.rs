use std::{io, path::PathBuf};

use thiserror::Error;
use zip::result::ZipError;

/// An error that happened before or after the splitter ran
#[derive(Error, Debug)]
pub enum SplitCommandError {
    #[error("output directory {0:?} does not exist (use --create-output to create it)")]
    MissingOutputDirectory(PathBuf),

    #[error("output path {0:?} is not a directory")]
    OutputNotADirectory(PathBuf),

    #[error("unable to create output directory {path:?}")]
    CreateOutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to open {path:?}")]
    OpenSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path:?} is not a valid zip archive")]
    InvalidArchive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("archive {path:?} does not contain `{}'", super::source::EXPORT_ENTRY)]
    MissingExportEntry {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("unable to extract the export from {path:?}")]
    Extract {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("splitter thread panicked")]
    ThreadPanicked,
}
