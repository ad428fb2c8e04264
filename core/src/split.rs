use std::{
    fs::File,
    io::{BufRead, Read, Seek},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use quick_xml::{events::Event, Reader};
use tracing::{debug, error, info, warn};

use crate::{
    config::{ParseErrorPolicy, SplitterConfig},
    error::SplitError,
    input::{dtd::skip_internal_subset, xml::ElementEvent, xml::TreeBuilder, EventConsumer},
    observer::Observer,
    output::ChunkWriter,
};

/// Lets another thread ask a running splitter to stop. The splitter checks
/// the flag after every closed element.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    /// Paths of the written chunk files in order
    pub chunks: Vec<PathBuf>,

    /// Total number of closed elements
    pub elements: u64,

    /// Byte offset at which parsing started (see [`crate::input::dtd`])
    pub source_offset: u64,
}

/// Split the XML file at `path` into chunks according to `config`. Notifies
/// `observer` about the progress.
pub fn split_xml<O: Observer>(
    path: impl AsRef<Path>,
    config: SplitterConfig,
    observer: O,
) -> Result<SplitSummary, SplitError> {
    SplitterEngine::new(config, observer).run(path)
}

/// Drives a single split run: reads the source, builds the element tree, and
/// writes chunks
pub struct SplitterEngine<O> {
    config: SplitterConfig,
    observer: O,
    abort: Option<AbortHandle>,
}

impl<O: Observer> SplitterEngine<O> {
    pub fn new(config: SplitterConfig, observer: O) -> Self {
        Self {
            config,
            observer,
            abort: None,
        }
    }

    /// Check the given handle between elements and stop if it has been
    /// triggered
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Split the XML file at `path`. Exactly one terminal notification
    /// (`parsing_did_complete` or `parsing_failed`) is sent to the observer.
    pub fn run(&mut self, path: impl AsRef<Path>) -> Result<SplitSummary, SplitError> {
        let path = path.as_ref();
        let r = self.open(path).and_then(|file| self.split(file));
        self.finish(r)
    }

    /// Like [`run`](Self::run) but reads from an arbitrary seekable source
    pub fn run_reader<R: Read + Seek>(&mut self, source: R) -> Result<SplitSummary, SplitError> {
        let r = self.split(source);
        self.finish(r)
    }

    fn open(&self, path: &Path) -> Result<File, SplitError> {
        self.config.validate()?;
        if !path.is_file() {
            return Err(SplitError::InvalidSource(path.to_path_buf()));
        }
        info!("Parsing {path:?}");
        File::open(path).map_err(|e| SplitError::SourceUnreadable(Arc::new(e)))
    }

    fn finish(
        &mut self,
        r: Result<SplitSummary, SplitError>,
    ) -> Result<SplitSummary, SplitError> {
        match &r {
            Ok(summary) => {
                info!(
                    "Parsing completed. Wrote {} chunks containing {} elements.",
                    summary.chunks.len(),
                    summary.elements
                );
                self.observer.parsing_did_complete();
            }
            Err(err) => {
                error!("Parsing failed: {err}");
                self.observer.parsing_failed(err);
            }
        }
        r
    }

    fn split<R: Read + Seek>(&mut self, source: R) -> Result<SplitSummary, SplitError> {
        self.config.validate()?;

        let sanitized =
            skip_internal_subset(source).map_err(|e| SplitError::SourceUnreadable(Arc::new(e)))?;
        let source_offset = sanitized.offset();
        if sanitized.skipped_prolog() {
            debug!("Found end of internal DTD subset. Parsing starts at byte {source_offset}.");
        }

        self.observer.parsing_started();

        let mut builder = TreeBuilder::new(self.config.anchor_tag.clone());
        let mut writer = ChunkWriter::new(&self.config);
        let elements = self.consume(sanitized, source_offset, &mut builder, &mut writer)?;

        // always write the remainder, even if the threshold has not been
        // reached
        writer.flush(&mut builder, &mut self.observer)?;

        Ok(SplitSummary {
            chunks: writer.into_written(),
            elements,
            source_offset,
        })
    }

    /// Feed all events from `source` into `builder` and flush chunks
    /// whenever `writer` says so. Returns the number of closed elements.
    ///
    /// quick-xml stops at the first syntax error. If errors are tolerated, a
    /// new reader is created on the remaining input, so parsing resumes
    /// right after the offending bytes.
    fn consume<R: BufRead>(
        &mut self,
        source: R,
        source_offset: u64,
        builder: &mut TreeBuilder,
        writer: &mut ChunkWriter,
    ) -> Result<u64, SplitError> {
        let mut reader = xml_reader(source);
        // offset of the current reader's first byte
        let mut reader_offset = source_offset;
        let mut buf = Vec::new();
        let mut elements = 0u64;
        let mut last_error_offset = None;
        let mut depth_warned = false;

        loop {
            let e = match reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => break,
                Ok(e) => e,
                Err(quick_xml::Error::Io(e)) => return Err(SplitError::SourceUnreadable(e)),
                Err(e) => {
                    let offset = reader_offset + reader.buffer_position() as u64;
                    if self.config.parse_error_policy == ParseErrorPolicy::Abort
                        || last_error_offset == Some(offset)
                    {
                        return Err(SplitError::Malformed { offset, source: e });
                    }
                    warn!("Parse error occurred at byte {offset}: {e}. Resuming after it.");
                    last_error_offset = Some(offset);
                    reader_offset = offset;
                    reader = xml_reader(reader.into_inner());
                    buf.clear();
                    continue;
                }
            };

            let event = match ElementEvent::from_xml(&e, &reader) {
                Ok(event) => event,
                Err(err) => {
                    let offset = reader_offset + reader.buffer_position() as u64;
                    if self.config.parse_error_policy == ParseErrorPolicy::Abort {
                        return Err(SplitError::Malformed {
                            offset,
                            source: err,
                        });
                    }
                    warn!("Invalid element at byte {offset}: {err}");
                    ElementEvent::from_xml_lossy(&e, &reader)
                }
            };

            if let Some(event) = event {
                if let Some(closed) = builder.on_event(event) {
                    elements += 1;
                    if writer.record_close(&closed, &mut self.observer) {
                        writer.flush(builder, &mut self.observer)?;
                    }
                    if self.abort.as_ref().is_some_and(AbortHandle::is_aborted) {
                        return Err(SplitError::Aborted);
                    }
                }

                if !depth_warned && builder.depth() > self.config.depth_warning {
                    warn!(
                        "Element nesting exceeds {} levels. Deeply nested elements are kept in \
                        memory until their top-level element is closed.",
                        self.config.depth_warning
                    );
                    depth_warned = true;
                }
            }

            buf.clear();
        }

        Ok(elements)
    }
}

/// Create an XML reader on `source`. Mismatching end tags are handled by
/// the tree builder.
fn xml_reader<R: BufRead>(source: R) -> Reader<R> {
    let mut reader = Reader::from_reader(source);
    reader.check_end_names(false);
    reader
}
