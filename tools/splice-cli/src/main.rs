//! Splice CLI: create, inspect, edit and export timeline projects.
//!
//! Usage:
//!   splice init <NAME>          Create a project, optionally importing WAV files
//!   splice info <PATH>          Show project information
//!   splice validate <PATH>      Validate a project bundle
//!   splice split <PATH>         Split a clip at a timeline position
//!   splice transition <PATH>    Attach a transition to a clip
//!   splice export <PATH>        Render a project to WAV or video
//!   splice check                Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use splice_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "splice",
    about = "Timeline editing and offline mixdown",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project
    Init {
        /// Project name
        name: String,

        /// Parent directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// WAV files to copy into sources/ and lay out back to back
        #[arg(long = "import")]
        imports: Vec<PathBuf>,

        /// Project tempo
        #[arg(long)]
        bpm: Option<f64>,
    },

    /// Show project information
    Info {
        /// Path to the project directory
        path: PathBuf,

        /// Print a machine-readable summary
        #[arg(long)]
        json: bool,
    },

    /// Validate a project bundle
    Validate {
        /// Path to the project directory
        path: PathBuf,
    },

    /// Split a clip in two at a timeline position
    Split {
        /// Path to the project directory
        path: PathBuf,

        /// Clip id
        #[arg(long)]
        clip: String,

        /// Timeline position in seconds
        #[arg(long)]
        at: f64,
    },

    /// Attach a transition to the end of a clip
    Transition {
        /// Path to the project directory
        path: PathBuf,

        /// Clip id
        #[arg(long)]
        clip: String,

        /// cut|crossfade|zoom|slide|whipPan|glitch|fadeToBlack, or "none"
        #[arg(long)]
        kind: String,

        /// Size the transition to the project tempo instead of its fixed default
        #[arg(long)]
        beat_sync: bool,
    },

    /// Render a project
    Export {
        /// Path to the project directory
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: wav, mp4-h264, webm
        #[arg(long)]
        format: Option<String>,

        /// Mixdown sample rate
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Render length in seconds (default: timeline end plus tail)
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.json |= cli.json_logs;
    splice_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Init {
            name,
            output,
            imports,
            bpm,
        } => commands::init::run(name, output, imports, bpm),
        Commands::Info { path, json } => commands::info::run(path, json),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Split { path, clip, at } => commands::edit::split(path, &clip, at, &config),
        Commands::Transition {
            path,
            clip,
            kind,
            beat_sync,
        } => commands::edit::transition(path, &clip, &kind, beat_sync, &config),
        Commands::Export {
            path,
            output,
            format,
            sample_rate,
            duration,
        } => commands::export::run(path, output, format, sample_rate, duration, &config).await,
        Commands::Check => commands::check::run(),
    }
}
