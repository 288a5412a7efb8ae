use anyhow::{anyhow, Context};
use epubtext::cli::Args;
use tracing_subscriber::EnvFilter;

fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }
    if let Err(e) = epubtext::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}

/// RUST_LOG wins; otherwise -q/-v pick the level for this crate.
fn init_logging(args: &Args) -> anyhow::Result<()> {
    let default = if args.quiet {
        "error"
    } else if args.verbose {
        "warn,epubtext=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!(e))
}
