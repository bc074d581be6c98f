use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use exemplar::cli::commands;
use exemplar::config::ExemplarConfig;

#[derive(Parser)]
#[command(name = "exemplar")]
#[command(
  about = "Exemplar - few-shot NER instruction retrieval\nClient for a running exemplar_server"
)]
#[command(version)]
struct Cli {
  /// Server URL (defaults to EXEMPLAR_SERVER_URL or http://localhost:3030)
  #[arg(long, global = true)]
  server: Option<String>,

  /// Configuration file (JSON)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Print verbose progress
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Retrieve a few-shot instruction for one sentence
  Retrieve {
    /// Sentence to annotate
    query: String,
    /// Language code (de, en, es, fr, ja, ko, ru, zh)
    #[arg(short, long, default_value = "en")]
    language: String,
    /// Also list the retrieved sentences and entities
    #[arg(long)]
    show_hits: bool,
    /// Print the raw JSON result
    #[arg(long)]
    json: bool,
  },
  /// Retrieve instructions for every query in a file
  Batch {
    /// JSON list of queries, or one query per line
    file: PathBuf,
    #[arg(short, long, default_value = "en")]
    language: String,
    /// Write the full results as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Add retrieved instructions to every JSONL file in the given directories
  Enhance {
    #[arg(required = true)]
    directories: Vec<PathBuf>,
    #[arg(short, long)]
    output_dir: PathBuf,
    /// Field holding the sentence (defaults to the configured input field)
    #[arg(short, long)]
    input_field: Option<String>,
  },
  /// Show service configuration and collection counts
  Stats,
  /// Create collections and import reference data
  Setup {
    /// Entities JSON file: {lang: {TYPE: [text, ...]}}
    #[arg(long)]
    entities: Option<PathBuf>,
    /// Sentences JSON file: {lang: [{sentence, ner_labels}, ...]}
    #[arg(long)]
    sentences: Option<PathBuf>,
    /// Languages to set up (all when omitted)
    #[arg(long, value_delimiter = ',')]
    languages: Option<Vec<String>>,
    /// Drop and recreate existing collections
    #[arg(long)]
    recreate: bool,
  },
  /// Drop collections
  Cleanup {
    /// Languages to drop (all when omitted)
    #[arg(long, value_delimiter = ',')]
    languages: Option<Vec<String>>,
    /// Confirm the drop
    #[arg(short, long)]
    force: bool,
  },
  /// Check whether the server is reachable and ready
  Status,
  /// Query server logs
  Logs {
    /// Maximum number of log entries to return
    #[arg(short, long, default_value = "50")]
    limit: usize,
    /// Filter by log level (info, warn, error, success, all)
    #[arg(long, default_value = "all")]
    level: String,
  },
}

async fn handle(cli: Cli) -> Result<()> {
  let server = cli.server.as_deref();

  match cli.command {
    Command::Retrieve { query, language, show_hits, json } => {
      commands::retrieve(server, &query, &language, show_hits, json).await
    }
    Command::Batch { file, language, output } => {
      commands::batch(server, &file, &language, output.as_deref()).await
    }
    Command::Enhance { directories, output_dir, input_field } => {
      let config = ExemplarConfig::load(cli.config.as_deref())?;
      commands::enhance(server, &config, &directories, &output_dir, input_field.as_deref()).await
    }
    Command::Stats => commands::stats(server).await,
    Command::Setup { entities, sentences, languages, recreate } => {
      commands::setup(server, entities.as_deref(), sentences.as_deref(), languages, recreate).await
    }
    Command::Cleanup { languages, force } => commands::cleanup(server, languages, force).await,
    Command::Status => commands::status(server).await,
    Command::Logs { limit, level } => commands::logs(server, limit, &level).await,
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  bentley::set_verbose(cli.verbose);

  handle(cli).await
}
