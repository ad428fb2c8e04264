use std::{
    fs,
    path::{Path, PathBuf},
    thread::spawn,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::bounded;
use healthsplit_core::{
    config::{ParseErrorPolicy, SplitterConfig, DEFAULT_ANCHOR_TAG, DEFAULT_THRESHOLD},
    observer::SplitEvent,
    split::split_xml,
};
use humantime::format_duration;
use yansi::{Condition, Paint};

use super::{
    source::{is_archive, prepare_source},
    split_error::SplitCommandError,
};

/// Split an XML document into chunks
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// The XML document to split, or a health data export archive (`.zip`)
    /// containing `apple_health_export/export.xml`
    pub source: PathBuf,

    /// Directory that receives the chunk files (`export0.xml`,
    /// `export1.xml`, ...)
    #[arg(short, long, env = "HEALTHSPLIT_OUTPUT", default_value = ".")]
    pub output: PathBuf,

    /// Create the output directory if it does not exist
    #[arg(long)]
    pub create_output: bool,

    /// Number of closed elements after which a new chunk is started at the
    /// next top-level element
    #[arg(
        short,
        long,
        env = "HEALTHSPLIT_THRESHOLD",
        default_value_t = DEFAULT_THRESHOLD as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub threshold: u64,

    /// Element that is repeated at the start of every chunk
    #[arg(long, env = "HEALTHSPLIT_ANCHOR", default_value = DEFAULT_ANCHOR_TAG)]
    pub anchor: String,

    /// Do not repeat any element in the chunks (takes precedence over
    /// `--anchor`)
    #[arg(long)]
    pub no_anchor: bool,

    /// Fail on malformed XML instead of skipping over it
    #[arg(long)]
    pub strict: bool,

    /// Report progress every n closed elements
    #[arg(
        long,
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub progress_interval: u64,
}

impl SplitArgs {
    pub(crate) fn to_config(&self) -> Result<SplitterConfig> {
        let policy = if self.strict {
            ParseErrorPolicy::Abort
        } else {
            ParseErrorPolicy::Tolerate
        };
        Ok(SplitterConfig::new(&self.output)
            .with_threshold(usize::try_from(self.threshold).context("Threshold is too large")?)
            .with_anchor_tag((!self.no_anchor).then(|| self.anchor.clone()))
            .with_parse_error_policy(policy)
            .with_progress_interval(
                usize::try_from(self.progress_interval).context("Progress interval is too large")?,
            ))
    }
}

/// Run the `split` command
pub fn run_split(args: SplitArgs) -> Result<()> {
    prepare_output(&args.output, args.create_output)?;
    let config = args.to_config()?;

    let split_start = Instant::now();

    if is_archive(&args.source) {
        eprintln!("Extracting {:?}...", args.source);
    }
    let prepared = prepare_source(&args.source)?;

    // run the splitter in a separate thread and render its notifications here
    let (event_sender, event_receiver) = bounded::<SplitEvent>(1024);
    let source = prepared.path().to_path_buf();
    let split_thread = spawn(move || split_xml(source, config, event_sender));

    for event in event_receiver {
        render(&event);
    }

    let summary = match split_thread.join() {
        Ok(r) => r.with_context(|| format!("Unable to split {:?}", args.source))?,
        Err(_) => return Err(SplitCommandError::ThreadPanicked.into()),
    };

    eprintln!(
        "Wrote {} chunks to {:?} in {}",
        summary.chunks.len(),
        args.output,
        format_duration(Duration::from_millis(
            split_start.elapsed().as_millis() as u64
        ))
    );

    Ok(())
}

/// Make sure the output directory exists
fn prepare_output(dir: &Path, create: bool) -> Result<(), SplitCommandError> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(SplitCommandError::OutputNotADirectory(dir.to_path_buf()));
    }
    if !create {
        return Err(SplitCommandError::MissingOutputDirectory(dir.to_path_buf()));
    }
    fs::create_dir_all(dir).map_err(|source| SplitCommandError::CreateOutputDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

fn color() -> Condition {
    Condition::from(|| Condition::stderr_is_tty() && Condition::clicolor() && Condition::no_color())
}

fn render(event: &SplitEvent) {
    match event {
        SplitEvent::ParsingStarted => eprintln!("Parsing started."),

        SplitEvent::ChunkProgress {
            chunk,
            closed,
            threshold,
        } => eprint!("\rChunk {chunk}: {closed}/{threshold} elements"),

        SplitEvent::SavingChunk(chunk) => eprintln!("\nSaving chunk {chunk}..."),

        SplitEvent::ChunkCompleted(chunk) => {
            eprintln!("{}", format!("Chunk {chunk} saved.").green().whenever(color()))
        }

        SplitEvent::ParsingDidComplete => {
            eprintln!("{}", "Parsing completed.".green().bold().whenever(color()))
        }

        SplitEvent::ParsingFailed { message, .. } => eprintln!(
            "{}",
            format!("Parsing failed: {message}")
                .red()
                .bold()
                .whenever(color())
        ),
    }
}
