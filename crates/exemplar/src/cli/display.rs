//! Display formatting utilities for CLI output

use chrono::Local;
use colored::*;

use crate::models::{BatchEntry, RetrievalResult, SearchHit};
use crate::server::services::collections::DatabaseStatistics;
use crate::server::services::orchestrator::ServiceStatistics;
use crate::server::types::LogEntry;

/// Truncate on a char boundary, appending an ellipsis when shortened.
pub fn truncate(text: &str, max_chars: usize) -> String {
  if text.chars().count() <= max_chars {
    return text.to_string();
  }
  let mut shortened: String = text.chars().take(max_chars.saturating_sub(1)).collect();
  shortened.push('…');
  shortened
}

fn hit_line(hit: &SearchHit, show_label: bool) -> String {
  let score = format!("{:.3}", hit.score).dimmed();
  if show_label {
    format!("{score} {} {}", truncate(&hit.text, 80), format!("[{}]", hit.label).dimmed())
  } else {
    format!("{score} {}", truncate(&hit.text, 80))
  }
}

pub fn display_retrieval(result: &RetrievalResult, show_hits: bool) {
  if show_hits {
    println!("{} ({})", "Similar sentences".blue().bold(), result.similar_sentences.len());
    for hit in &result.similar_sentences {
      println!("  {}", hit_line(hit, true));
    }
    println!();

    println!("{}", "Entities by type".blue().bold());
    for (entity_type, hits) in result.entity_results.iter() {
      if hits.is_empty() {
        println!("  {} {}", entity_type.as_str().cyan(), "(none)".dimmed());
        continue;
      }
      println!("  {}", entity_type.as_str().cyan());
      for hit in hits {
        println!("    {}", hit_line(hit, false));
      }
    }
    println!();
  }

  println!("{}", result.instruction);
  println!();
  println!(
    "{} {} sentences, {} entities across {} types in {:.1}ms",
    "✓".green(),
    result.statistics.total_similar_sentences,
    result.statistics.total_entities_found,
    result.statistics.entity_types_found,
    result.statistics.processing_time_ms
  );
}

pub fn display_batch_summary(entries: &[BatchEntry]) {
  for (index, entry) in entries.iter().enumerate() {
    match entry {
      BatchEntry::Success(result) => println!(
        "{} {:>3} {} ({} sentences, {} entities)",
        "✓".green(),
        index + 1,
        truncate(&result.query, 60),
        result.statistics.total_similar_sentences,
        result.statistics.total_entities_found
      ),
      BatchEntry::Failure(failure) => println!(
        "{} {:>3} {} {}",
        "✗".red(),
        index + 1,
        truncate(&failure.query, 60),
        format!("[{}] {}", failure.error_kind, failure.error).red()
      ),
    }
  }

  let succeeded = entries.iter().filter(|entry| entry.is_success()).count();
  println!();
  println!("{succeeded}/{} queries succeeded", entries.len());
}

pub fn display_statistics(stats: &ServiceStatistics, collections: Option<&DatabaseStatistics>) {
  println!("{} {}", "Service:".bold(), stats.service_status.cyan());
  let languages: Vec<&str> = stats.supported_languages.iter().map(|l| l.as_str()).collect();
  println!("{} {}", "Languages:".bold(), languages.join(", "));
  println!("{} {}", "Entity types:".bold(), stats.entity_types.join(", "));
  println!(
    "{} top_k_entities={} top_k_sentences={} threshold={} max_examples={}",
    "Configuration:".bold(),
    stats.configuration.top_k_entities,
    stats.configuration.top_k_sentences,
    stats.configuration.similarity_threshold,
    stats.configuration.max_examples_in_instruction
  );

  if stats.database_statistics.is_empty() {
    println!("{}", "No collection statistics available".dimmed());
    return;
  }

  println!();
  println!("{:<6} {:>10} {:>10}", "lang".bold(), "entities".bold(), "sentences".bold());
  for (language, counts) in &stats.database_statistics {
    match &counts.status {
      Some(status) => println!("{:<6} {}", language.as_str(), status.yellow()),
      None => println!("{:<6} {:>10} {:>10}", language.as_str(), counts.entities, counts.sentences),
    }
  }

  if let Some(collections) = collections {
    println!(
      "{:<6} {:>10} {:>10}",
      "total".bold(),
      collections.total_entities,
      collections.total_sentences
    );
  }
}

pub fn display_log_entry(entry: &LogEntry) {
  let level = match entry.level.as_str() {
    "error" => entry.level.red(),
    "warn" => entry.level.yellow(),
    "success" => entry.level.green(),
    _ => entry.level.blue(),
  };

  let mut line = format!(
    "{} {:<7} [{}] {}",
    entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
    level,
    entry.component,
    entry.message
  );

  if let Some(context) = &entry.context {
    if let (Some(method), Some(path)) = (&context.method, &context.path) {
      line.push_str(&format!(" {method} {path}"));
    }
    if let Some(status) = context.status_code {
      line.push_str(&format!(" {status}"));
    }
    if let Some(duration) = context.duration_ms {
      line.push_str(&format!(" {duration:.1}ms"));
    }
  }

  println!("{line}");
}

#[cfg(test)]
mod display_tests {
  use super::*;

  #[test]
  fn test_truncate_respects_char_boundaries() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("東京都庁舎", 3), "東京…");
    assert_eq!(truncate("abcdef", 4), "abc…");
  }
}
