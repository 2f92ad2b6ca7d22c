mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{agents::AgentsSubcommand, config::ConfigSubcommand, memory::MemorySubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cockpit",
    about = "The Cockpit: AI advisors for founders, over WhatsApp",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root holding cockpit.yaml and the store (default: auto-detect)
    #[arg(long, global = true, env = "COCKPIT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve {
        /// Port to listen on (default: server.port from cockpit.yaml)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show how a message would be routed
    Route {
        /// Message text, as a user would send it
        text: String,
    },

    /// Inspect or clear conversation memory
    Memory {
        #[command(subcommand)]
        subcommand: MemorySubcommand,
    },

    /// Show a user's usage for a month
    Usage {
        /// Sender phone number
        #[arg(long)]
        user: String,

        /// Month as YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
    },

    /// Work with agent instruction files
    Agents {
        #[command(subcommand)]
        subcommand: AgentsSubcommand,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Route { text } => cmd::route::run(&text, cli.json),
        Commands::Memory { subcommand } => cmd::memory::run(&root, subcommand, cli.json),
        Commands::Usage { user, month } => cmd::usage::run(&root, &user, month, cli.json),
        Commands::Agents { subcommand } => cmd::agents::run(subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
