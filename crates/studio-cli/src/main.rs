mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{client::ClientSubcommand, config::ConfigSubcommand, submission::SubmissionSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "studio",
    about = "Client lifecycle admin for the training studio: submissions, conversions, deconversions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Studio root (default: auto-detect from .studio/)
    #[arg(long, global = true, env = "STUDIO_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a studio in the current directory
    Init {
        /// Studio name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Manage contact submissions and their status
    Submission {
        #[command(subcommand)]
        subcommand: SubmissionSubcommand,
    },

    /// Convert, deactivate, reactivate or delete clients
    Client {
        #[command(subcommand)]
        subcommand: ClientSubcommand,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::Submission { subcommand } => cmd::submission::run(&root, subcommand, cli.json),
        Commands::Client { subcommand } => cmd::client::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
