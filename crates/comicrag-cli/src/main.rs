//! CLI entry point for the comic finder backend (for dev and testing).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use comicrag_core::{
    app_data_dir, ensure_index, load_config, millis, parse_selection, rebuild, set_dataset_path, status,
    ComicFinder, ComicIndex, Config, Counters, IndexPaths, LogSink, OllamaClient, PairPresence, Selection, Tee,
    XkcdLookup,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "comicrag")]
#[command(about = "Find the xkcd comic that fits your situation")]
struct Cli {
    /// Ollama server URL.
    #[arg(long, global = true, env = "COMICRAG_OLLAMA_URL")]
    ollama_url: Option<String>,
    /// Embedding model. Must match the model the index was built with.
    #[arg(long, global = true, env = "COMICRAG_EMBED_MODEL")]
    embed_model: Option<String>,
    /// Chat model that picks the comic.
    #[arg(long, global = true, env = "COMICRAG_CHAT_MODEL")]
    chat_model: Option<String>,
    /// Directory for the persisted index (default: app data directory).
    #[arg(long, global = true, env = "COMICRAG_INDEX_DIR", value_name = "DIR")]
    index_dir: Option<PathBuf>,
    /// Comic dataset (JSON array or .jsonl).
    #[arg(long, global = true, env = "COMICRAG_DATASET", value_name = "PATH")]
    dataset: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where config and the index are stored (app data directory).
    DataDir,
    /// Build the index from the dataset, or load it if already cached.
    Build {
        /// Rebuild even if a cached index exists.
        #[arg(long)]
        force: bool,
    },
    /// List the comics closest to a query, without asking the chat model.
    Search {
        query: String,
        #[arg(short, default_value_t = 5)]
        k: usize,
        /// Print candidates as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Ask the chat model to pick the best comic for a situation.
    Ask {
        query: String,
        /// Skip fetching the comic image URL.
        #[arg(long)]
        no_image: bool,
    },
    /// Extract the comic id from a model reply.
    Parse { text: String },
    /// Edit persisted settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(clap::Subcommand)]
enum ConfigCommand {
    /// Remember the dataset path.
    SetDataset {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Print the effective config.
    Show,
}

#[derive(Serialize)]
struct CandidateRow<'a> {
    id: &'a str,
    title: &'a str,
    distance: f32,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file values, overridden by flags and environment.
fn effective_config(cli: &Cli) -> Config {
    apply_overrides(cli, load_config())
}

fn apply_overrides(cli: &Cli, mut config: Config) -> Config {
    if let Some(v) = &cli.ollama_url {
        config.ollama_url = Some(v.clone());
    }
    if let Some(v) = &cli.embed_model {
        config.embed_model = Some(v.clone());
    }
    if let Some(v) = &cli.chat_model {
        config.chat_model = Some(v.clone());
    }
    if let Some(v) = &cli.index_dir {
        config.index_dir = Some(v.to_string_lossy().into_owned());
    }
    if let Some(v) = &cli.dataset {
        config.dataset_path = Some(v.to_string_lossy().into_owned());
    }
    config
}

fn client(config: &Config) -> Result<OllamaClient> {
    Ok(OllamaClient::from_url(config.ollama_url())
        .with_context(|| format!("invalid Ollama URL {}", config.ollama_url()))?
        .with_embed_model(config.embed_model())
        .with_chat_model(config.chat_model()))
}

fn require_dataset(config: &Config) -> Result<PathBuf> {
    config
        .dataset_path()
        .ok_or_else(|| anyhow!("no dataset configured; pass --dataset or run `comicrag config set-dataset`"))
}

/// Loads the cached pair, or builds it when it is missing or partial.
async fn open_index(
    config: &Config,
    paths: &IndexPaths,
    client: &OllamaClient,
    sink: &Tee<LogSink, Counters>,
) -> Result<ComicIndex> {
    if paths.presence() == PairPresence::Complete {
        return ComicIndex::load(paths, config.index_expectations())
            .with_context(|| format!("failed to load cached index from {}", paths.vectors.display()));
    }
    let dataset = require_dataset(config)?;
    ensure_index(&dataset, paths, client, config.embed_batch_size(), sink)
        .await
        .with_context(|| format!("failed to build index from {}", dataset.display()))
}

async fn run(cli: Cli) -> Result<()> {
    let config = effective_config(&cli);
    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("Comic finder backend");
            println!("  core: {}", status());
            let paths = config.index_paths()?;
            let state = match paths.presence() {
                PairPresence::Complete => "cached",
                PairPresence::Missing => "not built",
                PairPresence::Partial => "incomplete (will rebuild)",
            };
            println!("  index: {state} ({})", paths.vectors.display());
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => bail!("could not determine app data directory"),
        },
        Commands::Build { force } => {
            let paths = config.index_paths()?;
            let client = client(&config)?;
            let sink = Tee(LogSink, Counters::default());
            let dataset = require_dataset(&config)?;
            let index = if force {
                rebuild(&dataset, &paths, &client, config.embed_batch_size(), &sink).await
            } else {
                ensure_index(&dataset, &paths, &client, config.embed_batch_size(), &sink).await
            }
            .with_context(|| format!("failed to build index from {}", dataset.display()))?;
            println!(
                "Index ready: {} comic(s), dimension {}, model {}",
                index.len(),
                index.vectors().dimension(),
                index.vectors().model()
            );
            print_pair(&paths);
        }
        Commands::Search { query, k, json } => {
            let paths = config.index_paths()?;
            let client = client(&config)?;
            let sink = Tee(LogSink, Counters::default());
            let index = open_index(&config, &paths, &client, &sink).await?;
            let finder = ComicFinder::new(index, client.clone(), client, sink, config.finder_settings());
            let hits = finder.search(&query, k).await.context("search failed")?;
            if json {
                let rows: Vec<_> = hits
                    .iter()
                    .map(|c| CandidateRow {
                        id: &c.record.id,
                        title: &c.record.title,
                        distance: c.distance,
                    })
                    .collect();
                let s = serde_json::to_string_pretty(&rows)?;
                println!("{s}");
            } else {
                for c in &hits {
                    println!("  [{}] {}  ({:.4})", c.record.id, c.record.title, c.distance);
                }
            }
        }
        Commands::Ask { query, no_image } => {
            let paths = config.index_paths()?;
            let client = client(&config)?;
            let sink = Tee(LogSink, Counters::default());
            let index = open_index(&config, &paths, &client, &sink).await?;
            let finder = ComicFinder::new(index, client.clone(), client, sink, config.finder_settings());
            let answer = finder.answer(&query).await;
            println!("{}", answer.text);
            if let (Selection::Parsed(id), false) = (&answer.selection, no_image) {
                match XkcdLookup::new() {
                    Ok(lookup) => match lookup.image_url(id).await {
                        Ok(img) => println!("\nImage: {img}"),
                        Err(e) => tracing::warn!(comic_id = %id, error = %e, "image lookup failed"),
                    },
                    Err(e) => tracing::warn!(error = %e, "image lookup unavailable"),
                }
            }
            let counters = &finder.sink().1;
            tracing::debug!(
                search_ms = millis(counters.last_search()),
                generation_ms = millis(counters.last_generation()),
                "query timings"
            );
        }
        Commands::Parse { text } => match parse_selection(&text) {
            Selection::Parsed(id) => println!("{id}"),
            Selection::Unparsed(_) => bail!("no bracketed comic id found"),
        },
        Commands::Config(ConfigCommand::SetDataset { path }) => {
            set_dataset_path(&path).with_context(|| format!("failed to set dataset to {}", path.display()))?;
            println!("Dataset set to {}", path.display());
        }
        Commands::Config(ConfigCommand::Show) => {
            println!("ollama_url  = {}", config.ollama_url());
            println!("embed_model = {}", config.embed_model());
            match config.embed_dimension {
                Some(d) => println!("embed_dim   = {d}"),
                None => println!("embed_dim   = (any)"),
            }
            println!("chat_model  = {}", config.chat_model());
            match config.dataset_path() {
                Some(p) => println!("dataset     = {}", p.display()),
                None => println!("dataset     = (unset)"),
            }
            let settings = config.finder_settings();
            println!("top_k       = {}", settings.top_k);
            println!("max_tokens  = {}", settings.max_tokens);
            println!("temperature = {}", settings.temperature);
        }
    }
    Ok(())
}

fn print_pair(paths: &IndexPaths) {
    for p in [&paths.vectors, &paths.metadata] {
        println!("  {}", display_or_dash(p));
    }
}

fn display_or_dash(p: &Path) -> String {
    if p.exists() {
        p.display().to_string()
    } else {
        "-".to_string()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
