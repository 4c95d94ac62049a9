//! quill CLI - evaluate worksheets against an external engine.

mod config;
mod outline;
mod plan;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Evaluate worksheet cells with an external engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the order in which cells would be evaluated
    Plan {
        /// Path to the worksheet outline (.json)
        worksheet: PathBuf,

        /// Only plan cells above the N-th top-level cell (1-based)
        #[arg(long, value_name = "N")]
        above: Option<usize>,
    },

    /// Evaluate the whole worksheet
    Run {
        /// Path to the worksheet outline (.json)
        worksheet: PathBuf,

        /// Engine program (overrides the config file)
        #[arg(long)]
        engine: Option<String>,

        /// Argument for the engine program, may be repeated
        #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
        engine_args: Vec<String>,

        /// Config file (default: <config dir>/quill/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Plan { worksheet, above } => plan::execute(&worksheet, above)?,

        Commands::Run {
            worksheet,
            engine,
            engine_args,
            config,
        } => {
            run::execute(run::RunOptions {
                worksheet: &worksheet,
                engine: engine.as_deref(),
                engine_args: &engine_args,
                config: config.as_deref(),
            })
            .await?;
        }
    }

    Ok(())
}
