//! `sfx` command-line entry point.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use sfx_installer::{
    launch, locate_payload, pack, FailureKind, LaunchError, LaunchOptions, PackOptions,
    DEFAULT_INSTALLER_NAME, DEFAULT_MARKER,
};
use tracing_subscriber::EnvFilter;

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = "sfx")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract an artifact's payload into a scratch directory and run its installer.
    Run(RunArgs),

    /// Build a self-extracting artifact from a directory containing an installer.
    Pack(PackArgs),

    /// Print where the payload starts inside an artifact.
    Locate(LocateArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Artifact to launch
    artifact: PathBuf,

    /// Marker line separating stub and payload
    #[arg(long, default_value = DEFAULT_MARKER)]
    marker: String,

    /// Name of the entry point inside the payload
    #[arg(long, default_value = DEFAULT_INSTALLER_NAME)]
    installer: String,

    /// Create the scratch directory here instead of TMPDIR
    #[arg(long)]
    scratch_root: Option<PathBuf>,

    /// Leave the scratch directory in place afterwards
    #[arg(long)]
    keep: bool,

    /// Kill the installer after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Arguments forwarded to the installer
    #[arg(last = true)]
    installer_args: Vec<OsString>,
}

#[derive(Debug, Args)]
struct PackArgs {
    /// Directory whose contents become the payload
    source: PathBuf,

    /// Artifact to write
    #[arg(short, long)]
    output: PathBuf,

    /// Gzip compression level (0-9)
    #[arg(long, default_value_t = 6)]
    level: u32,

    /// Marker line separating stub and payload
    #[arg(long, default_value = DEFAULT_MARKER)]
    marker: String,

    /// Name of the entry point the source directory must contain
    #[arg(long, default_value = DEFAULT_INSTALLER_NAME)]
    installer: String,
}

#[derive(Debug, Args)]
struct LocateArgs {
    /// Artifact to inspect
    artifact: PathBuf,

    /// Marker line separating stub and payload
    #[arg(long, default_value = DEFAULT_MARKER)]
    marker: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout belongs to the installer.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Pack(args) => run_pack(args),
        Command::Locate(args) => run_locate(args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("hint: {}", error.fix_suggestion());
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run(args: RunArgs) -> Result<ExitCode, LaunchError> {
    let options = LaunchOptions {
        marker: args.marker,
        installer_name: args.installer,
        scratch_root: args.scratch_root,
        keep_scratch: args.keep,
        timeout: args.timeout.map(Duration::from_secs),
        installer_args: args.installer_args,
    };

    let report = launch(&args.artifact, options, |progress| {
        tracing::info!(stage = progress.description(), "{progress:?}");
    })
    .await?;

    if report.kept {
        eprintln!("scratch directory kept at {}", report.scratch_dir.display());
    }
    let code = u8::try_from(report.exit_code).unwrap_or(FailureKind::InstallerFailed.exit_code());
    Ok(ExitCode::from(code))
}

fn run_pack(args: PackArgs) -> Result<ExitCode, LaunchError> {
    let options = PackOptions {
        marker: args.marker,
        installer_name: args.installer,
        compression: args.level,
    };
    let report = pack(&args.source, &args.output, &options)?;
    println!(
        "Packed {} ({} bytes, payload after line {})",
        report.output.display(),
        report.size,
        report.marker_line
    );
    Ok(ExitCode::SUCCESS)
}

fn run_locate(args: LocateArgs) -> Result<ExitCode, LaunchError> {
    let location = locate_payload(&args.artifact, &args.marker)?;
    println!("marker line:    {}", location.marker_line);
    println!("payload line:   {}", location.payload_line);
    println!("payload offset: {}", location.payload_offset);
    Ok(ExitCode::SUCCESS)
}
