//! Lifecycle notifications of a split run.
//!
//! A host either implements [`Observer`] directly or hands the splitter the
//! sending half of a [`crossbeam_channel`] and consumes [`SplitEvent`]s on a
//! thread of its choice. The splitter never assumes anything about the host's
//! threading model.

use std::path::PathBuf;

use crossbeam_channel::Sender;

use crate::error::{SplitError, SplitErrorKind};

/// Receives notifications from a running splitter. All callbacks are invoked
/// synchronously on the splitter's thread in the order described on each
/// method.
pub trait Observer {
    /// Directory that receives the next chunk. Queried at every save. If
    /// [`None`] is returned, the configured output directory is used.
    fn target_directory(&self) -> Option<PathBuf> {
        None
    }

    /// Called once after the source has been opened and before the first
    /// element is parsed
    fn parsing_started(&mut self) {}

    /// Called whenever an element has been closed
    fn chunk_progress(&mut self, _chunk: usize, _closed: usize, _threshold: usize) {}

    /// Called before a chunk is written
    fn saving_chunk(&mut self, _chunk: usize) {}

    /// Called after a chunk has been written successfully
    fn chunk_completed(&mut self, _chunk: usize) {}

    /// Terminal notification after the last chunk has been written
    fn parsing_did_complete(&mut self) {}

    /// Terminal notification if the run failed
    fn parsing_failed(&mut self, _error: &SplitError) {}
}

/// Ignores all notifications
impl Observer for () {}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn target_directory(&self) -> Option<PathBuf> {
        (**self).target_directory()
    }

    fn parsing_started(&mut self) {
        (**self).parsing_started()
    }

    fn chunk_progress(&mut self, chunk: usize, closed: usize, threshold: usize) {
        (**self).chunk_progress(chunk, closed, threshold)
    }

    fn saving_chunk(&mut self, chunk: usize) {
        (**self).saving_chunk(chunk)
    }

    fn chunk_completed(&mut self, chunk: usize) {
        (**self).chunk_completed(chunk)
    }

    fn parsing_did_complete(&mut self) {
        (**self).parsing_did_complete()
    }

    fn parsing_failed(&mut self, error: &SplitError) {
        (**self).parsing_failed(error)
    }
}

/// A notification of a split run as a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitEvent {
    ParsingStarted,
    ChunkProgress {
        chunk: usize,
        closed: usize,
        threshold: usize,
    },
    SavingChunk(usize),
    ChunkCompleted(usize),
    ParsingDidComplete,
    ParsingFailed {
        kind: SplitErrorKind,
        message: String,
    },
}

/// Forwards every notification into a channel. Notifications are dropped
/// silently if the receiving side has hung up.
impl Observer for Sender<SplitEvent> {
    fn parsing_started(&mut self) {
        let _ = self.send(SplitEvent::ParsingStarted);
    }

    fn chunk_progress(&mut self, chunk: usize, closed: usize, threshold: usize) {
        let _ = self.send(SplitEvent::ChunkProgress {
            chunk,
            closed,
            threshold,
        });
    }

    fn saving_chunk(&mut self, chunk: usize) {
        let _ = self.send(SplitEvent::SavingChunk(chunk));
    }

    fn chunk_completed(&mut self, chunk: usize) {
        let _ = self.send(SplitEvent::ChunkCompleted(chunk));
    }

    fn parsing_did_complete(&mut self) {
        let _ = self.send(SplitEvent::ParsingDidComplete);
    }

    fn parsing_failed(&mut self, error: &SplitError) {
        let _ = self.send(SplitEvent::ParsingFailed {
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::unbounded;
    use pretty_assertions::assert_eq;

    use crate::error::{SplitError, SplitErrorKind};

    use super::{Observer, SplitEvent};

    /// Notifications sent into a channel arrive in order
    #[test]
    fn channel() {
        let (mut send, recv) = unbounded();
        send.parsing_started();
        send.chunk_progress(0, 1, 10);
        send.saving_chunk(0);
        send.chunk_completed(0);
        send.parsing_failed(&SplitError::Aborted);

        let events = recv.try_iter().collect::<Vec<_>>();
        assert_eq!(
            events,
            vec![
                SplitEvent::ParsingStarted,
                SplitEvent::ChunkProgress {
                    chunk: 0,
                    closed: 1,
                    threshold: 10
                },
                SplitEvent::SavingChunk(0),
                SplitEvent::ChunkCompleted(0),
                SplitEvent::ParsingFailed {
                    kind: SplitErrorKind::Aborted,
                    message: "splitting was aborted".to_string()
                },
            ]
        );
    }

    /// A disconnected channel does not cause a panic
    #[test]
    fn disconnected() {
        let (mut send, recv) = unbounded::<SplitEvent>();
        drop(recv);
        send.parsing_started();
        send.parsing_did_complete();
    }
}
