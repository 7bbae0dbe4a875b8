use anyhow::Result;
use clap::{Parser, Subcommand};
use harpy_cli::OutputFormat;
use harpy_cli::commands;
use harpy_engine::DEFAULT_MAX_RESPONSE_BYTES;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "harpy")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Replay HTTP requests recorded in HTTP Archive (HAR) files",
    long_about = "Harpy reads requests from HAR archives, JSON lines or raw HTTP, replays them \
                  concurrently over plain TCP, and records the results as HAR entries with \
                  per-phase timings."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Offset given to timestamps recorded without one
    #[arg(long, global = true, env = "HARPY_UTC_OFFSET", default_value = "+00:00")]
    utc_offset: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay requests and record the responses
    Replay {
        /// HAR archive, JSON lines of requests, or a raw request (stdin if omitted)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Treat the input as one raw HTTP request
        #[arg(long)]
        raw: bool,

        /// Scheme for raw requests with an origin-form target
        #[arg(long, default_value = "http")]
        scheme: String,

        /// Connect to this address instead of resolving each host
        #[arg(long, value_name = "IP")]
        server_ip: Option<String>,

        /// Write the replayed entries to a HAR file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Requests allowed in flight at once
        #[arg(short, long, default_value_t = 32)]
        concurrency: usize,

        /// Per-phase timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Largest response accepted, in bytes
        #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_RESPONSE_BYTES)]
        max_response_bytes: usize,
    },

    /// Check a HAR file against the format
    Validate {
        /// Path to the HAR file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Convert a raw HTTP message to its HAR JSON form
    Ingest {
        /// Raw request or response (stdin if omitted)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Scheme for origin-form request targets
        #[arg(long, default_value = "http")]
        scheme: String,

        /// Comment to attach to the message
        #[arg(long)]
        comment: Option<String>,

        /// Print a human-readable rendering instead of JSON
        #[arg(long)]
        render: bool,
    },

    /// Write a request or response from HAR JSON as raw HTTP
    Emit {
        /// HAR archive or a single request/response object (stdin if omitted)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Zero-based entry index within an archive
        #[arg(long, default_value_t = 0)]
        entry: usize,

        /// Emit the entry's response instead of its request
        #[arg(long)]
        response: bool,
    },

    /// Display HAR file statistics
    Stats {
        /// Path to the HAR file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Number of slowest requests to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let encode = commands::encode_options(&cli.utc_offset)?;

    match cli.command {
        Commands::Replay {
            input,
            raw,
            scheme,
            server_ip,
            output,
            concurrency,
            timeout,
            max_response_bytes,
        } => {
            let options = commands::replay::ReplayOptions {
                input,
                raw,
                scheme,
                server_ip,
                output,
                concurrency,
                timeout: Duration::from_secs(timeout),
                max_response_bytes,
            };
            commands::replay::execute(&options, cli.format, &encode).await
        }
        Commands::Validate { file } => commands::validate::execute(&file, cli.format),
        Commands::Ingest {
            input,
            scheme,
            comment,
            render,
        } => commands::ingest::execute(
            input.as_deref(),
            &scheme,
            comment,
            render,
            cli.format,
            &encode,
        ),
        Commands::Emit {
            input,
            entry,
            response,
        } => commands::emit::execute(
            input.as_deref(),
            commands::emit::Selection { entry, response },
        ),
        Commands::Stats { file, top } => commands::stats::execute(&file, top, cli.format),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("harpy=debug,harpy_cli=debug,harpy_core=debug,harpy_engine=debug")
    } else {
        EnvFilter::new("harpy=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
