use std::path::PathBuf;

use crate::error::SplitError;

/// Number of closed elements after which a chunk is cut at the next
/// top-level element
pub const DEFAULT_THRESHOLD: usize = 500_000;

/// Name of the element that is repeated at the start of every chunk
pub const DEFAULT_ANCHOR_TAG: &str = "ExportDate";

/// Nesting depth above which a warning is logged
pub const DEFAULT_DEPTH_WARNING: usize = 256;

/// Specifies what happens when the XML reader reports an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorPolicy {
    /// Log the error and keep parsing
    #[default]
    Tolerate,

    /// Fail the run
    Abort,
}

/// Settings for a split run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Closed-element count that triggers a chunk boundary at the next
    /// top-level completion
    pub threshold: usize,

    /// Name of the anchor element or [`None`] to disable anchoring
    pub anchor_tag: Option<String>,

    /// Directory that receives the chunk files if the observer does not
    /// provide one. Must exist.
    pub output_dir: PathBuf,

    pub parse_error_policy: ParseErrorPolicy,

    /// Only every n-th closed element is reported to the observer as
    /// progress. `1` reports every element.
    pub progress_interval: usize,

    pub depth_warning: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            anchor_tag: Some(DEFAULT_ANCHOR_TAG.to_string()),
            output_dir: std::env::temp_dir(),
            parse_error_policy: ParseErrorPolicy::default(),
            progress_interval: 1,
            depth_warning: DEFAULT_DEPTH_WARNING,
        }
    }
}

impl SplitterConfig {
    /// Create a configuration with default settings that writes chunks into
    /// the given directory
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_anchor_tag(mut self, anchor_tag: Option<impl Into<String>>) -> Self {
        self.anchor_tag = anchor_tag.map(Into::into);
        self
    }

    pub fn with_parse_error_policy(mut self, policy: ParseErrorPolicy) -> Self {
        self.parse_error_policy = policy;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn with_depth_warning(mut self, depth: usize) -> Self {
        self.depth_warning = depth;
        self
    }

    /// Check settings that can be checked before the run starts
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.threshold == 0 {
            return Err(SplitError::InvalidThreshold);
        }
        Ok(())
    }
}
