//! JSONL dataset enhancement
//!
//! Each `*.jsonl` file gets a sibling `enhanced_<name>` in the output
//! directory where every line carries a retrieved few-shot instruction.
//! Lines that fail are counted and left out of the output.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::cli::client::ExemplarClient;
use crate::config::OutputConfig;
use crate::models::{Language, RetrievalResult};
use crate::server::services::orchestrator::RetrievalService;

/// Anything that can turn a query into a retrieval result.
#[async_trait]
pub trait InstructionSource: Send + Sync {
  async fn instruction_for(&self, query: &str, language: &str) -> Result<RetrievalResult>;
}

#[async_trait]
impl InstructionSource for ExemplarClient {
  async fn instruction_for(&self, query: &str, language: &str) -> Result<RetrievalResult> {
    self.retrieve(query, language).await
  }
}

#[async_trait]
impl InstructionSource for RetrievalService {
  async fn instruction_for(&self, query: &str, language: &str) -> Result<RetrievalResult> {
    Ok(self.retrieve_and_format(query, language).await?)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancementStats {
  pub files_processed: usize,
  pub total_entries: usize,
  pub successful_entries: usize,
  pub failed_entries: usize,
  pub output_files: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct FileStats {
  total: usize,
  successful: usize,
  failed: usize,
}

/// Language code from names like `train_de.jsonl` or `dev_ja_v2.jsonl`; `en` otherwise.
pub fn language_from_filename(filename: &str) -> Language {
  const SEARCH_ORDER: [Language; 8] = [
    Language::En,
    Language::De,
    Language::Es,
    Language::Fr,
    Language::Ja,
    Language::Ko,
    Language::Ru,
    Language::Zh,
  ];

  SEARCH_ORDER
    .into_iter()
    .find(|language| {
      let code = language.as_str();
      filename.contains(&format!("_{code}.")) || filename.contains(&format!("_{code}_"))
    })
    .unwrap_or(Language::En)
}

/// Build the output object for one input record.
pub fn enhance_record(
  record: &Map<String, Value>,
  result: &RetrievalResult,
  output: &OutputConfig,
) -> Result<Value> {
  let mut enhanced = if output.preserve_original_fields { record.clone() } else { Map::new() };

  enhanced.insert("enhanced_instruction".to_string(), Value::String(result.instruction.clone()));

  if output.include_metadata {
    enhanced.insert(
      "retrieval_metadata".to_string(),
      json!({
        "retrieved_entities": serde_json::to_value(&result.entity_results)?,
        "retrieved_sentences": serde_json::to_value(&result.similar_sentences)?,
        "language": result.language,
        "processing_time": result.statistics.processing_time_ms / 1000.0,
      }),
    );
  }

  if output.include_similarity_scores {
    let entity_scores: Map<String, Value> = result
      .entity_results
      .iter()
      .map(|(entity_type, hits)| {
        (entity_type.as_str().to_string(), json!(hits.iter().map(|h| h.score).collect::<Vec<_>>()))
      })
      .collect();
    let sentence_scores: Vec<f32> = result.similar_sentences.iter().map(|h| h.score).collect();

    enhanced.insert(
      "similarity_scores".to_string(),
      json!({ "entity_scores": entity_scores, "sentence_scores": sentence_scores }),
    );
  }

  Ok(Value::Object(enhanced))
}

/// Enhance every `*.jsonl` file of each directory into `output_dir`.
pub async fn enhance_directories(
  source: &dyn InstructionSource,
  directories: &[PathBuf],
  output_dir: &Path,
  output: &OutputConfig,
) -> Result<EnhancementStats> {
  fs::create_dir_all(output_dir)
    .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

  let mut stats = EnhancementStats::default();

  for directory in directories {
    if !directory.is_dir() {
      bentley::warn!("Directory does not exist: {}", directory.display());
      continue;
    }

    for input in jsonl_files(directory)? {
      let name = input
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("Invalid file name: {}", input.display()))?
        .to_string();
      let language = language_from_filename(&name);
      let output_file = output_dir.join(format!("enhanced_{name}"));

      bentley::info!("Processing {} ({language})", input.display());
      let file_stats = enhance_file(source, &input, &output_file, language, output).await?;

      stats.files_processed += 1;
      stats.total_entries += file_stats.total;
      stats.successful_entries += file_stats.successful;
      stats.failed_entries += file_stats.failed;
      stats.output_files.push(output_file);
    }
  }

  bentley::success!(
    "Enhanced {} files: {} of {} entries succeeded",
    stats.files_processed,
    stats.successful_entries,
    stats.total_entries
  );
  Ok(stats)
}

fn jsonl_files(directory: &Path) -> Result<Vec<PathBuf>> {
  let mut files: Vec<PathBuf> = fs::read_dir(directory)
    .with_context(|| format!("Failed to read {}", directory.display()))?
    .filter_map(|entry| entry.ok().map(|entry| entry.path()))
    .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl"))
    .collect();
  files.sort();
  Ok(files)
}

async fn enhance_file(
  source: &dyn InstructionSource,
  input: &Path,
  output_file: &Path,
  language: Language,
  output: &OutputConfig,
) -> Result<FileStats> {
  let reader = BufReader::new(
    File::open(input).with_context(|| format!("Failed to open {}", input.display()))?,
  );
  let mut writer = BufWriter::new(
    File::create(output_file)
      .with_context(|| format!("Failed to create {}", output_file.display()))?,
  );
  let mut stats = FileStats::default();

  for (index, line) in reader.lines().enumerate() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    stats.total += 1;

    match enhance_line(source, &line, language, output).await {
      Ok(enhanced) => {
        serde_json::to_writer(&mut writer, &enhanced)?;
        writer.write_all(b"\n")?;
        stats.successful += 1;
      }
      Err(e) => {
        bentley::warn!("{} line {}: {e}", input.display(), index + 1);
        stats.failed += 1;
      }
    }

    if stats.total % 100 == 0 {
      bentley::verbose!("{} lines processed, {} failed", stats.total, stats.failed);
    }
  }

  writer.flush()?;
  Ok(stats)
}

async fn enhance_line(
  source: &dyn InstructionSource,
  line: &str,
  language: Language,
  output: &OutputConfig,
) -> Result<Value> {
  let record: Map<String, Value> =
    serde_json::from_str(line).context("line is not a JSON object")?;

  let query = match record.get(&output.input_field) {
    Some(Value::String(text)) => text.clone(),
    Some(other) => other.to_string(),
    None => return Err(anyhow!("missing field '{}'", output.input_field)),
  };

  let result = source.instruction_for(&query, language.as_str()).await?;
  enhance_record(&record, &result, output)
}

#[cfg(test)]
mod enhance_tests {
  use super::*;

  #[test]
  fn test_language_from_filename() {
    assert_eq!(language_from_filename("train_de.jsonl"), Language::De);
    assert_eq!(language_from_filename("dev_ja_v2.jsonl"), Language::Ja);
    assert_eq!(language_from_filename("test_zh.jsonl"), Language::Zh);
    assert_eq!(language_from_filename("records.jsonl"), Language::En);
    assert_eq!(language_from_filename("german.jsonl"), Language::En);
  }

  #[test]
  fn test_first_match_in_search_order_wins() {
    assert_eq!(language_from_filename("mix_fr_en.jsonl"), Language::En);
  }
}
