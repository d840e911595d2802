mod cli;

use std::path::PathBuf;

use anyhow::Result;
use capdex::config::CapdexConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "capdex",
    version,
    about = "Bottle-cap catalog with visual similarity search"
)]
struct Cli {
    /// Config file to use instead of ~/.capdex/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import caps from a JSON manifest and embed their images
    Import {
        /// JSON array of {id, brand, type, image} records
        manifest: PathBuf,
    },
    /// Export the catalog as JSON
    Export {
        /// Output file, or `-` for stdout. Defaults to a timestamped file in exports_dir
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List every cap in the catalog
    List,
    /// Show one cap by id
    Show { id: i64 },
    /// Find caps whose brand contains the given text (case-insensitive)
    Brand { text: String },
    /// Find the caps that look most like an image
    Search {
        image: PathBuf,
        /// Number of results (defaults to search.default_top_k)
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show catalog statistics
    Stats,
    /// Delete every cap from the catalog
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the ONNX feature extractor into the model cache directory
    Download {
        /// URL of the ONNX export to fetch
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CapdexConfig::load_from(path)?,
        None => CapdexConfig::load()?,
    };

    // stdout carries command output; logs go to stderr.
    let filter =
        EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Import { manifest } => cli::import::import(&config, &manifest).await?,
        Command::Export { output } => cli::export::export(&config, output.as_deref())?,
        Command::List => cli::list::list(&config)?,
        Command::Show { id } => cli::list::show(&config, id)?,
        Command::Brand { text } => cli::list::brand(&config, &text)?,
        Command::Search { image, top_k, json } => {
            cli::search::search(&config, image, top_k, json).await?
        }
        Command::Stats => cli::stats::stats(&config)?,
        Command::Reset { yes } => cli::reset::reset(&config, yes)?,
        Command::Model { action } => match action {
            ModelAction::Download { url } => {
                cli::model_download(&config.embedding, &url).await?;
            }
        },
    }

    Ok(())
}
