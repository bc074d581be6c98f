use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use colored::*;
use serde::Deserialize;

use crate::cli::client::get_client;
use crate::cli::display::{
  display_batch_summary, display_log_entry, display_retrieval, display_statistics,
};
use crate::cli::enhance::enhance_directories;
use crate::config::ExemplarConfig;
use crate::server::types::SetupRequest;

/// Batch input accepts a plain list of queries or `{queries: [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum BatchFile {
  Queries(Vec<String>),
  Wrapped { queries: Vec<String> },
}

impl BatchFile {
  fn into_queries(self) -> Vec<String> {
    match self {
      BatchFile::Queries(queries) | BatchFile::Wrapped { queries } => queries,
    }
  }
}

/// Read queries from JSON, or one per line for anything else.
pub fn read_batch_queries(path: &Path) -> Result<Vec<String>> {
  let content =
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

  if path.extension().is_some_and(|ext| ext == "json") {
    let batch: BatchFile = serde_json::from_str(&content)
      .with_context(|| format!("{} is not a JSON list of queries", path.display()))?;
    return Ok(batch.into_queries());
  }

  Ok(content.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect())
}

pub async fn retrieve(server: Option<&str>, query: &str, language: &str, show_hits: bool, json: bool) -> Result<()> {
  let client = get_client(server)?;
  let result = client.retrieve(query, language).await?;

  if json {
    println!("{}", serde_json::to_string_pretty(&result)?);
  } else {
    display_retrieval(&result, show_hits);
  }
  Ok(())
}

pub async fn batch(server: Option<&str>, file: &Path, language: &str, output: Option<&Path>) -> Result<()> {
  let queries = read_batch_queries(file)?;
  if queries.is_empty() {
    println!("No queries found in {}", file.display().to_string().yellow());
    return Ok(());
  }

  let client = get_client(server)?;
  let response = client.batch_retrieve(&queries, language).await?;

  match output {
    Some(path) => {
      fs::write(path, serde_json::to_string_pretty(&response.results)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
      display_batch_summary(&response.results);
      println!("{} Results written to {}", "✓".green(), path.display().to_string().cyan());
    }
    None => display_batch_summary(&response.results),
  }
  Ok(())
}

pub async fn enhance(
  server: Option<&str>,
  config: &ExemplarConfig,
  directories: &[PathBuf],
  output_dir: &Path,
  input_field: Option<&str>,
) -> Result<()> {
  let mut output = config.output.clone();
  if let Some(field) = input_field {
    output.input_field = field.to_string();
  }

  let client = get_client(server)?;
  let stats = enhance_directories(&client, directories, output_dir, &output).await?;

  println!(
    "{} Processed {} files: {} succeeded, {} failed (of {})",
    "✓".green(),
    stats.files_processed,
    stats.successful_entries.to_string().green(),
    stats.failed_entries.to_string().red(),
    stats.total_entries
  );
  for file in &stats.output_files {
    println!("  {}", file.display().to_string().cyan());
  }
  Ok(())
}

pub async fn stats(server: Option<&str>) -> Result<()> {
  let client = get_client(server)?;
  let statistics = client.statistics().await?;
  let collections = client.collection_statistics().await.ok();

  display_statistics(&statistics, collections.as_ref());
  Ok(())
}

pub async fn setup(
  server: Option<&str>,
  entities: Option<&Path>,
  sentences: Option<&Path>,
  languages: Option<Vec<String>>,
  recreate: bool,
) -> Result<()> {
  let request = SetupRequest {
    entities_file: entities.map(absolute_path).transpose()?,
    sentences_file: sentences.map(absolute_path).transpose()?,
    languages,
    recreate,
  };

  let client = get_client(server)?;
  let report = client.setup(&request).await?;

  for collection in &report.collections {
    println!(
      "{} {}: entity_{} {}, sentence_{} {}",
      "✓".green(),
      collection.language.as_str().cyan(),
      collection.language,
      collection.entity,
      collection.language,
      collection.sentence
    );
  }
  for (language, count) in &report.entities_imported {
    println!("  {} entities imported for {}", count.to_string().green(), language);
  }
  for (language, count) in &report.sentences_imported {
    println!("  {} sentences imported for {}", count.to_string().green(), language);
  }
  Ok(())
}

pub async fn cleanup(server: Option<&str>, languages: Option<Vec<String>>, force: bool) -> Result<()> {
  if !force {
    return Err(anyhow!("Refusing to drop collections without --force"));
  }

  let client = get_client(server)?;
  let dropped = client.cleanup(languages).await?;

  if dropped.is_empty() {
    println!("No collections to drop");
  } else {
    for name in dropped {
      println!("{} Dropped {}", "✓".green(), name.yellow());
    }
  }
  Ok(())
}

pub async fn status(server: Option<&str>) -> Result<()> {
  let client = get_client(server)?;
  let status = client.status().await?;

  let state = if status.status == "healthy" { status.status.green() } else { status.status.yellow() };
  println!(
    "{} {} (service {}, version {})",
    client.base_url().cyan(),
    state,
    status.service_state,
    status.version
  );
  Ok(())
}

pub async fn logs(server: Option<&str>, limit: usize, level: &str) -> Result<()> {
  let client = get_client(server)?;
  let entries = client.logs(limit, level).await?;

  if entries.is_empty() {
    println!("No log entries");
  }
  for entry in &entries {
    display_log_entry(entry);
  }
  Ok(())
}

fn absolute_path(path: &Path) -> Result<String> {
  let absolute = fs::canonicalize(path).with_context(|| format!("{} does not exist", path.display()))?;
  Ok(absolute.to_string_lossy().to_string())
}

#[cfg(test)]
mod commands_tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_read_batch_queries_formats() {
    let dir = TempDir::new().unwrap();

    let list = dir.path().join("queries.json");
    fs::write(&list, r#"["Obama visited Paris.", "Merkel spoke."]"#).unwrap();
    assert_eq!(read_batch_queries(&list).unwrap().len(), 2);

    let wrapped = dir.path().join("wrapped.json");
    fs::write(&wrapped, r#"{"queries": ["one"]}"#).unwrap();
    assert_eq!(read_batch_queries(&wrapped).unwrap(), vec!["one".to_string()]);

    let lines = dir.path().join("queries.txt");
    fs::write(&lines, "first\n\n  second  \n").unwrap();
    assert_eq!(read_batch_queries(&lines).unwrap(), vec!["first".to_string(), "second".to_string()]);
  }

  #[tokio::test]
  async fn test_cleanup_requires_force() {
    let err = cleanup(Some("http://127.0.0.1:9"), None, false).await.unwrap_err();
    assert!(err.to_string().contains("--force"));
  }
}
