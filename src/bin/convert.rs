//! Command line front end: convert one file into another format, choosing
//! the conversion from the file extensions.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use visubrain::ConversionRequest;

/// Convert tractography and anatomical files between the TRK, TCK, FBR,
/// VMR, VOI and NIfTI formats.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// File to convert
    input: PathBuf,
    /// File to create; its extension selects the output format
    output: PathBuf,
    /// NIfTI volume giving the anatomical space (needed for fbr→trk and tck→trk)
    #[arg(short, long)]
    reference: Option<PathBuf>,
    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = ConversionRequest::new(&args.input, &args.output, args.reference.as_deref())
        .and_then(|request| request.convert());
    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
