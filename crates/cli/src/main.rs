//! Blockwright CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Write a default config
//! - `build`   — Plan, validate and place a build from a text request
//! - `listen`  — Serve an in-memory world over the command channel
//! - `smoke`   — Place a short line of blocks and read it back
//! - `status`  — Show config and world connection
//! - `doctor`  — Diagnose setup problems

use blockwright_core::geometry::BlockPos;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "blockwright",
    about = "Blockwright — text-to-build planner and executor",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Plan and place a build
    Build {
        /// What to build, in plain words
        prompt: String,

        /// First corner as x,y,z (defaults to two blocks east of the agent)
        #[arg(long, allow_hyphen_values = true, requires = "to")]
        from: Option<BlockPos>,

        /// Opposite corner as x,y,z
        #[arg(long, allow_hyphen_values = true, requires = "from")]
        to: Option<BlockPos>,

        /// Allowed materials, comma separated (e.g. minecraft:stone,minecraft:glass)
        #[arg(short, long, required = true, value_delimiter = ',')]
        palette: Vec<String>,

        /// Keep the agent in place while building
        #[arg(long)]
        no_move: bool,

        /// Read every cell back after placing it
        #[arg(long)]
        verify: bool,
    },

    /// Serve an in-memory world for local runs
    Listen {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Place a line of blocks next to the agent and verify them
    Smoke {
        /// Material to place
        #[arg(short, long, default_value = "minecraft:stone")]
        material: String,

        /// Number of blocks
        #[arg(short, long, default_value_t = 5)]
        count: u32,
    },

    /// Show configuration and world status
    Status,

    /// Diagnose setup problems
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Build {
            prompt,
            from,
            to,
            palette,
            no_move,
            verify,
        } => {
            let corners = from.zip(to);
            commands::build::run(commands::build::BuildArgs {
                prompt,
                corners,
                palette,
                move_agent: !no_move,
                verify,
            })
            .await?
        }
        Commands::Listen { host, port } => commands::listen::run(host, port).await?,
        Commands::Smoke { material, count } => commands::smoke::run(material, count).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
