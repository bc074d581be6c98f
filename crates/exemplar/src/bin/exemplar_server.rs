//! Exemplar REST Server
//!
//! Serves few-shot NER instruction retrieval over HTTP and owns the
//! embedding model and vector store.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use exemplar::config::ExemplarConfig;
use exemplar::server::startup::start_server;

#[derive(Parser)]
#[command(name = "exemplar_server")]
#[command(about = "Exemplar REST API Server")]
#[command(version)]
struct Args {
  /// Server bind address
  #[arg(long, default_value = "127.0.0.1:3030", env = "EXEMPLAR_BIND")]
  bind: SocketAddr,

  /// Configuration file (JSON)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let filter = if args.verbose {
    EnvFilter::new("info,lance=warn,lance_datafusion=warn,datafusion=warn")
  } else {
    EnvFilter::new("exemplar=info,lance=error,lance_datafusion=error,datafusion=error,warn")
  };
  tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
  bentley::set_verbose(args.verbose);

  let config = ExemplarConfig::load(args.config.as_deref())?;

  bentley::info!("Starting Exemplar REST Server v{}", env!("CARGO_PKG_VERSION"));
  bentley::info!("Binding to address: {}", args.bind);

  start_server(args.bind, config).await
}
