use std::{
    fs::{self, File},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    config::SplitterConfig,
    error::SplitError,
    input::xml::{ClosedElement, TreeBuilder},
    observer::Observer,
    output::xml::serialize_document,
};

/// Decides where chunks end, serializes them, and writes them to
/// `export<n>.xml` files
#[derive(Debug)]
pub struct ChunkWriter {
    threshold: usize,
    progress_interval: usize,
    fallback_dir: PathBuf,

    /// Index of the chunk that is currently being accumulated
    chunk_index: usize,

    /// Number of elements closed since the last flush
    closed_count: usize,

    written: Vec<PathBuf>,
}

impl ChunkWriter {
    pub fn new(config: &SplitterConfig) -> Self {
        Self {
            threshold: config.threshold,
            progress_interval: config.progress_interval.max(1),
            fallback_dir: config.output_dir.clone(),
            chunk_index: 0,
            closed_count: 0,
            written: Vec::new(),
        }
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn closed_count(&self) -> usize {
        self.closed_count
    }

    /// Paths of all chunk files written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }

    /// Record a closed element and report progress. Returns `true` if the
    /// current chunk should be flushed now.
    pub fn record_close<O: Observer>(&mut self, closed: &ClosedElement, observer: &mut O) -> bool {
        self.closed_count += 1;
        if self.closed_count % self.progress_interval == 0 {
            observer.chunk_progress(self.chunk_index, self.closed_count, self.threshold);
        }
        self.closed_count > self.threshold && closed.top_level
    }

    /// Write the current chunk to disk and prepare `builder` for the next
    /// one. Returns the path of the written file or [`None`] if no root
    /// element has been found yet, in which case nothing is written.
    pub fn flush<O: Observer>(
        &mut self,
        builder: &mut TreeBuilder,
        observer: &mut O,
    ) -> Result<Option<PathBuf>, SplitError> {
        let Some(root) = builder.root() else {
            debug!("No root element found. Nothing to write.");
            return Ok(None);
        };

        observer.saving_chunk(self.chunk_index);

        let dir = observer
            .target_directory()
            .unwrap_or_else(|| self.fallback_dir.clone());
        if !dir.is_dir() {
            return Err(SplitError::OutputDirectoryUnavailable(dir));
        }

        let data = serialize_document(builder.tree(), root);
        let path = write_chunk(&dir, self.chunk_index, &data)?;
        info!(
            "Chunk {} completed. Saved {} bytes to {:?}.",
            self.chunk_index,
            data.len(),
            path
        );
        observer.chunk_completed(self.chunk_index);

        self.closed_count = 0;
        self.chunk_index += 1;
        self.written.push(path.clone());
        builder.start_next_chunk();

        Ok(Some(path))
    }
}

/// Name of the file that receives the chunk with the given index
pub fn chunk_file_name(index: usize) -> String {
    format!("export{index}.xml")
}

/// Write a chunk into `dir`. The data is written into a temporary file first
/// which is renamed to its final name only if all bytes could be written. On
/// failure, the temporary file is removed.
fn write_chunk(dir: &Path, index: usize, data: &[u8]) -> Result<PathBuf, SplitError> {
    let path = dir.join(chunk_file_name(index));
    let part = dir.join(format!("{}.part", chunk_file_name(index)));

    let mut file = File::create(&part).map_err(|source| SplitError::DestinationUnavailable {
        path: part.clone(),
        source,
    })?;

    let result = write_fully(&mut file, data)
        .and_then(|_| file.sync_all().map_err(WriteError::Failed))
        .map_err(|e| e.into_split_error(&path));
    drop(file);

    let result = result.and_then(|_| {
        fs::rename(&part, &path).map_err(|source| SplitError::WriteFailed {
            path: path.clone(),
            source,
        })
    });

    if result.is_err() {
        if let Err(e) = fs::remove_file(&part) {
            warn!("Unable to remove incomplete chunk file {part:?}: {e}");
        }
    }

    result.map(|_| path)
}

#[derive(Debug)]
enum WriteError {
    /// The writer accepted zero bytes or the device is full
    CapacityExceeded,
    Failed(io::Error),
}

impl WriteError {
    fn into_split_error(self, path: &Path) -> SplitError {
        match self {
            WriteError::CapacityExceeded => SplitError::WriteCapacityExceeded {
                path: path.to_path_buf(),
            },
            WriteError::Failed(source) => SplitError::WriteFailed {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Write all of `data`, distinguishing between running out of space and
/// other write errors
fn write_fully<W: Write>(writer: &mut W, mut data: &[u8]) -> Result<(), WriteError> {
    while !data.is_empty() {
        match writer.write(data) {
            Ok(0) => return Err(WriteError::CapacityExceeded),
            Ok(n) => data = &data[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::StorageFull => {
                return Err(WriteError::CapacityExceeded)
            }
            Err(e) => return Err(WriteError::Failed(e)),
        }
    }
    writer.flush().map_err(WriteError::Failed)
}
