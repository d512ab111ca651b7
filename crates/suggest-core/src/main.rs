use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use suggest_core::{EngineConfig, SuggestionEngine, SuggestionTable};

#[derive(Parser)]
#[command(name = "suggest", about = "BM25 suggestion ranking with selection counts", version)]
struct Cli {
    /// Table file holding suggestions and selection counts (.parquet or .sgtb)
    #[arg(short, long, global = true)]
    table: Option<PathBuf>,

    /// JSON engine config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override BM25 k1
    #[arg(long, global = true)]
    k1: Option<f64>,

    /// Override BM25 b
    #[arg(long, global = true)]
    b: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a table from a text file with one suggestion per line
    Import {
        /// Input text file
        input: PathBuf,

        /// Replace an existing table
        #[arg(long)]
        force: bool,
    },

    /// Rank suggestions for a query
    Query {
        /// Query text
        text: String,

        /// Number of suggestions
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum score (inclusive)
        #[arg(long)]
        min_score: Option<f64>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record that a suggestion was selected
    Select {
        /// Exact suggestion text
        text: String,
    },

    /// Show the most selected suggestions
    Stats {
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },

    /// Write a copy of the table; a .parquet destination writes Parquet
    Export {
        /// Destination file
        path: PathBuf,
    },

    /// Show index statistics
    Info,
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(table) = &cli.table {
        config.table_path = table.clone();
    }
    if let Some(k1) = cli.k1 {
        config.k1 = k1;
    }
    if let Some(b) = cli.b {
        config.b = b;
    }
    Ok(config)
}

fn open(config: &EngineConfig) -> Result<SuggestionEngine> {
    SuggestionEngine::from_config(config)
        .with_context(|| format!("failed to open {:?}", config.table_path))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Import { input, force } => {
            if config.table_path.exists() && !force {
                bail!(
                    "{:?} already exists (use --force to replace it)",
                    config.table_path
                );
            }
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {:?}", input))?;
            let lines: Vec<&str> = raw
                .lines()
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.trim().is_empty())
                .collect();
            let table = SuggestionTable::from_suggestions(lines);
            table.save(&config.table_path)?;
            println!(
                "Imported {} suggestions into {:?}",
                table.num_rows(),
                config.table_path
            );
        }
        Commands::Query {
            text,
            top_k,
            min_score,
            json,
        } => {
            let engine = open(&config)?;
            let results = engine.suggest(
                &text,
                top_k.unwrap_or(config.default_top_k),
                min_score.unwrap_or(config.default_min_score),
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("Query: '{}'\n", text);
                for result in &results {
                    println!("Score: {:.2} - {}", result.score, result.text);
                }
            }
        }
        Commands::Select { text } => {
            let engine = open(&config)?;
            if !engine.record_selection(&text)? {
                bail!("suggestion '{}' not found", text);
            }
            println!("Recorded selection: '{}'", text);
        }
        Commands::Stats { limit } => {
            let engine = open(&config)?;
            for stat in engine.statistics()?.into_iter().take(limit) {
                println!("{:>8}  {}", stat.count, stat.text);
            }
        }
        Commands::Export { path } => {
            let engine = open(&config)?;
            engine
                .export(&path)
                .with_context(|| format!("failed to export to {:?}", path))?;
            println!("Exported {:?}", path);
        }
        Commands::Info => {
            let engine = open(&config)?;
            let stats = engine.stats();
            println!(
                "docs={} terms={} avg_doc_len={:.2}",
                stats.num_docs, stats.num_terms, stats.avg_doc_len
            );
        }
    }

    Ok(())
}
