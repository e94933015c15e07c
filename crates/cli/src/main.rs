//! Flowsmith CLI, the main entry point.
//!
//! Commands:
//! - `run`       Turn a goal into a validated workflow (optionally deploy it)
//! - `validate`  Validate a workflow JSON file
//! - `patterns`  List the pattern library or rank it against a goal
//! - `sync`      Sync the node catalog into the knowledge graph
//! - `init`      Write a default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "flowsmith",
    about = "Flowsmith: natural-language goals to validated automation workflows",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (defaults to ~/.flowsmith/config.toml)
    #[arg(short, long, global = true, env = "FLOWSMITH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent pipeline for a goal
    Run {
        /// What the workflow should do, in plain language
        goal: String,

        /// Create the workflow on the automation platform when valid
        #[arg(long)]
        deploy: bool,

        /// Print the full pipeline result as JSON
        #[arg(long)]
        json: bool,

        /// Skip the knowledge-graph stage
        #[arg(long)]
        no_graph: bool,
    },

    /// Validate a workflow JSON file
    Validate {
        file: PathBuf,

        /// Print the validation result as JSON
        #[arg(long)]
        json: bool,

        /// Skip the AI semantic review
        #[arg(long)]
        no_review: bool,
    },

    /// List patterns, or rank them against a goal
    Patterns {
        /// Rank patterns against this goal instead of listing them
        #[arg(short, long)]
        r#match: Option<String>,
    },

    /// Sync the platform node catalog into the knowledge graph
    Sync {
        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays machine-readable
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => commands::init::run(config_path, force).await?,
        Commands::Run {
            goal,
            deploy,
            json,
            no_graph,
        } => {
            let config = commands::load_config(config_path)?;
            commands::run::run(&config, &goal, deploy, json, no_graph).await?
        }
        Commands::Validate {
            file,
            json,
            no_review,
        } => {
            let config = commands::load_config(config_path)?;
            commands::validate::run(&config, &file, json, no_review).await?
        }
        Commands::Patterns { r#match } => {
            let config = commands::load_config(config_path)?;
            commands::patterns::run(&config, r#match.as_deref()).await?
        }
        Commands::Sync { once } => {
            let config = commands::load_config(config_path)?;
            commands::sync::run(&config, once).await?
        }
    }

    Ok(())
}
