use clap::{Parser, Subcommand};
use std::path::PathBuf;

use atom_kb::Result;
use atom_kb::commands::{
    ingest_atoms, parse_atoms, search_kb, show_atom, show_bootstrap, show_stats,
    trigger_source_ingest,
};

#[derive(Parser)]
#[command(name = "atom-kb")]
#[command(about = "Knowledge-atom ingestion and search for the Agent Factory knowledge base")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the atoms document and ingest it into the knowledge base
    Ingest {
        /// Path to the atoms document (defaults to the configured file)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Skip the duplicate-ingestion confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Parse the atoms document and print a summary without storing it
    Parse {
        /// Path to the atoms document (defaults to the configured file)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Search the knowledge base for atoms matching a query
    Search {
        /// Search query
        query: String,
        /// Maximum number of results
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Fetch a specific atom by its id
    Atom {
        /// Atom identifier, e.g. "devcto_core_loop"
        atom_id: String,
    },
    /// Fetch the core bootstrap atoms
    Bootstrap,
    /// Ask the knowledge base to ingest an external source
    Trigger {
        /// URL of the source to ingest
        url: String,
        /// Type of source (github, article, documentation)
        #[arg(long, default_value = "github")]
        source_type: String,
    },
    /// Show knowledge-base statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { file, yes } => {
            let summary = ingest_atoms(file, yes).await?;
            if summary.failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Parse { file } => {
            parse_atoms(file)?;
        }
        Commands::Search { query, limit } => {
            search_kb(&query, limit)?;
        }
        Commands::Atom { atom_id } => {
            show_atom(&atom_id)?;
        }
        Commands::Bootstrap => {
            show_bootstrap()?;
        }
        Commands::Trigger { url, source_type } => {
            trigger_source_ingest(&url, &source_type)?;
        }
        Commands::Stats => {
            show_stats()?;
        }
    }

    Ok(())
}
