use clap::{Parser, Subcommand};
use commands::split::{run_split, SplitArgs};
use tracing_subscriber::EnvFilter;

mod commands;

/// Split a large health data export into smaller, independently well-formed
/// XML files
#[derive(Parser, Debug)]
#[command(author, version)]
struct Cli {
    /// Log debug output (overridden by `RUST_LOG`)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Split(SplitArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Split(args) => run_split(args),
    }
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, BooleanAssertion, EqualityAssertion};
    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands};

    #[test]
    fn command_is_valid() {
        Cli::command().debug_assert();
    }

    /// `--no-anchor` wins over an anchor given on the command line or in the
    /// environment
    #[test]
    fn no_anchor_overrides_anchor() {
        let cli = Cli::try_parse_from([
            "healthsplit",
            "split",
            "export.xml",
            "--anchor",
            "Me",
            "--no-anchor",
        ])
        .unwrap();
        let Commands::Split(args) = cli.command;
        assert_that!(args.no_anchor).is_true();
        assert_that!(args.anchor.clone()).is_equal_to("Me".to_string());
        assert_that!(args.to_config().unwrap().anchor_tag).is_equal_to(None);
    }
}
