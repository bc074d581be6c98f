//! Collection administration: creation, bulk import, statistics and cleanup.
//!
//! All mutating operations hold one admin lock so imports never interleave
//! with drops or re-creation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::embeddings::EmbeddingProvider;
use super::vector_store::{CollectionCreation, CollectionRecord, CollectionSpec, VectorStore};
use crate::config::StoreConfig;
use crate::error::{Result, RetrievalError};
use crate::models::{CollectionKind, EntityRecord, EntityType, Language, SentenceRecord};

/// Entities file: `{lang: {ENTITY_TYPE: [text, ...]}}`.
type EntitiesFile = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Sentences file: `{lang: [{sentence, ner_labels}, ...]}`.
type SentencesFile = BTreeMap<String, Vec<SentenceEntry>>;

#[derive(Debug, Deserialize)]
struct SentenceEntry {
  #[serde(default)]
  sentence: String,
  #[serde(default)]
  ner_labels: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CollectionSetup {
  pub language: Language,
  pub entity: String,
  pub sentence: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SetupReport {
  pub collections: Vec<CollectionSetup>,
  pub entities_imported: BTreeMap<Language, usize>,
  pub sentences_imported: BTreeMap<Language, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LanguageCounts {
  pub entity_count: usize,
  pub sentence_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseStatistics {
  pub languages: BTreeMap<Language, LanguageCounts>,
  pub total_entities: usize,
  pub total_sentences: usize,
}

pub struct CollectionManager {
  embedder: Arc<dyn EmbeddingProvider>,
  store: Arc<dyn VectorStore>,
  config: StoreConfig,
  admin_lock: Mutex<()>,
}

impl CollectionManager {
  pub fn new(
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: StoreConfig,
  ) -> Self {
    Self { embedder, store, config, admin_lock: Mutex::new(()) }
  }

  /// Create both collections for every language.
  pub async fn initialize_collections(
    &self,
    languages: &[Language],
    recreate: bool,
  ) -> Result<Vec<CollectionSetup>> {
    let _guard = self.admin_lock.lock().await;
    self.create_all(languages, recreate).await
  }

  pub async fn import_entities(
    &self,
    path: &Path,
    languages: &[Language],
  ) -> Result<BTreeMap<Language, usize>> {
    let _guard = self.admin_lock.lock().await;
    self.load_entities(path, languages).await
  }

  pub async fn import_sentences(
    &self,
    path: &Path,
    languages: &[Language],
  ) -> Result<BTreeMap<Language, usize>> {
    let _guard = self.admin_lock.lock().await;
    self.load_sentences(path, languages).await
  }

  /// Resolve a client-supplied data file. With `import_dir` configured,
  /// relative names are taken from it and paths resolving outside it are
  /// rejected; without it the path is used as given.
  pub fn resolve_import_path(&self, requested: &str) -> Result<PathBuf> {
    let Some(import_dir) = &self.config.import_dir else {
      return Ok(PathBuf::from(requested));
    };

    let root = std::fs::canonicalize(import_dir)?;
    let resolved = std::fs::canonicalize(root.join(requested)).map_err(|_| {
      RetrievalError::invalid_input(format!(
        "data file '{requested}' not found under {}",
        root.display()
      ))
    })?;

    if !resolved.starts_with(&root) {
      return Err(RetrievalError::invalid_input(format!(
        "data file '{requested}' is outside the import directory"
      )));
    }
    Ok(resolved)
  }

  /// Create collections, then import whichever data files are given.
  pub async fn setup(
    &self,
    entities: Option<&Path>,
    sentences: Option<&Path>,
    languages: &[Language],
    recreate: bool,
  ) -> Result<SetupReport> {
    let _guard = self.admin_lock.lock().await;
    bentley::info!("Setting up collections for {} languages", languages.len());

    let mut report =
      SetupReport { collections: self.create_all(languages, recreate).await?, ..Default::default() };

    if let Some(path) = entities {
      report.entities_imported = self.load_entities(path, languages).await?;
    }
    if let Some(path) = sentences {
      report.sentences_imported = self.load_sentences(path, languages).await?;
    }

    bentley::success!(
      "Setup complete: {} entities, {} sentences",
      report.entities_imported.values().sum::<usize>(),
      report.sentences_imported.values().sum::<usize>()
    );
    Ok(report)
  }

  pub async fn statistics(&self, languages: &[Language]) -> Result<DatabaseStatistics> {
    let mut stats = DatabaseStatistics::default();

    for &language in languages {
      let entity = self.store.collection_info(&CollectionKind::Entity.collection_name(language)).await?;
      let sentence =
        self.store.collection_info(&CollectionKind::Sentence.collection_name(language)).await?;

      stats.total_entities += entity.count;
      stats.total_sentences += sentence.count;
      stats.languages.insert(
        language,
        LanguageCounts { entity_count: entity.count, sentence_count: sentence.count },
      );
    }

    Ok(stats)
  }

  /// Drop both collections per language; returns the names that existed.
  pub async fn cleanup(&self, languages: &[Language]) -> Result<Vec<String>> {
    let _guard = self.admin_lock.lock().await;
    let mut dropped = Vec::new();

    for &language in languages {
      for kind in [CollectionKind::Entity, CollectionKind::Sentence] {
        let name = kind.collection_name(language);
        if self.store.drop_collection(&name).await? {
          dropped.push(name);
        }
      }
    }

    bentley::info!("Dropped {} collections", dropped.len());
    Ok(dropped)
  }

  async fn create_all(&self, languages: &[Language], recreate: bool) -> Result<Vec<CollectionSetup>> {
    let mut created = Vec::with_capacity(languages.len());

    for &language in languages {
      let entity = self.create(CollectionKind::Entity, language, recreate).await?;
      let sentence = self.create(CollectionKind::Sentence, language, recreate).await?;
      created.push(CollectionSetup {
        language,
        entity: outcome_label(entity).to_string(),
        sentence: outcome_label(sentence).to_string(),
      });
    }

    Ok(created)
  }

  async fn create(
    &self,
    kind: CollectionKind,
    language: Language,
    recreate: bool,
  ) -> Result<CollectionCreation> {
    let spec = CollectionSpec::new(kind, language, &self.config);

    let embedder_dimension = self.embedder.dimension();
    if embedder_dimension != spec.dimension {
      return Err(RetrievalError::dimension_mismatch(&spec.name, spec.dimension, embedder_dimension));
    }

    let outcome = self.store.create_collection(&spec, recreate).await?;
    bentley::verbose!("{}: {}", spec.name, outcome_label(outcome));
    Ok(outcome)
  }

  async fn load_entities(&self, path: &Path, languages: &[Language]) -> Result<BTreeMap<Language, usize>> {
    let file: EntitiesFile = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let mut imported = BTreeMap::new();

    for (language_key, types) in file {
      let Some(language) = requested_language(&language_key, languages) else {
        continue;
      };

      let mut by_type: BTreeMap<usize, (EntityType, Vec<String>)> = BTreeMap::new();
      for (type_key, texts) in types {
        match type_key.parse::<EntityType>() {
          Ok(entity_type) if !texts.is_empty() => {
            let (_, merged) =
              by_type.entry(entity_type.index()).or_insert_with(|| (entity_type, Vec::new()));
            merged.extend(texts);
          }
          Ok(_) => {}
          Err(_) => bentley::warn!("Skipping unsupported entity type '{type_key}' for {language}"),
        }
      }

      let collection = CollectionKind::Entity.collection_name(language);
      let mut count = 0;
      for (entity_type, texts) in by_type.into_values() {
        for chunk in texts.chunks(self.config.entity_batch_size) {
          let embeddings = self.encode_chunk(chunk).await?;
          let records: Vec<CollectionRecord> = chunk
            .iter()
            .zip(embeddings)
            .map(|(text, embedding)| {
              CollectionRecord::from(EntityRecord {
                entity_text: text.clone(),
                entity_type,
                language,
                embedding,
              })
            })
            .collect();
          count += self.store.insert(&collection, records).await?;
        }
      }

      self.store.flush(&collection).await?;
      bentley::info!("Imported {count} entities into {collection}");
      imported.insert(language, count);
    }

    Ok(imported)
  }

  async fn load_sentences(&self, path: &Path, languages: &[Language]) -> Result<BTreeMap<Language, usize>> {
    let file: SentencesFile = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let mut imported = BTreeMap::new();

    for (language_key, entries) in file {
      let Some(language) = requested_language(&language_key, languages) else {
        continue;
      };

      let mut rows = Vec::with_capacity(entries.len());
      for entry in entries {
        if entry.sentence.trim().is_empty() {
          continue;
        }
        rows.push((entry.sentence, ner_labels_to_string(&entry.ner_labels)?));
      }
      if rows.is_empty() {
        continue;
      }

      let collection = CollectionKind::Sentence.collection_name(language);
      let mut count = 0;
      for chunk in rows.chunks(self.config.sentence_batch_size) {
        let texts: Vec<String> = chunk.iter().map(|(sentence, _)| sentence.clone()).collect();
        let embeddings = self.encode_chunk(&texts).await?;
        let records: Vec<CollectionRecord> = chunk
          .iter()
          .zip(embeddings)
          .map(|((sentence, labels), embedding)| {
            CollectionRecord::from(SentenceRecord {
              sentence_text: sentence.clone(),
              ner_labels: labels.clone(),
              language,
              embedding,
            })
          })
          .collect();
        count += self.store.insert(&collection, records).await?;
      }

      self.store.flush(&collection).await?;
      bentley::info!("Imported {count} sentences into {collection}");
      imported.insert(language, count);
    }

    Ok(imported)
  }

  async fn encode_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let embeddings = self.embedder.encode_documents(texts).await?;
    if embeddings.len() != texts.len() {
      return Err(RetrievalError::encoding(format!(
        "embedding provider returned {} vectors for {} texts",
        embeddings.len(),
        texts.len()
      )));
    }
    Ok(embeddings)
  }
}

fn requested_language(key: &str, languages: &[Language]) -> Option<Language> {
  match key.parse::<Language>() {
    Ok(language) if languages.contains(&language) => Some(language),
    Ok(_) => None,
    Err(_) => {
      bentley::warn!("Skipping unsupported language '{key}'");
      None
    }
  }
}

/// String labels are stored verbatim, structured labels as compact JSON.
fn ner_labels_to_string(labels: &serde_json::Value) -> Result<String> {
  match labels {
    serde_json::Value::String(text) => Ok(text.clone()),
    serde_json::Value::Null => Ok("{}".to_string()),
    other => Ok(serde_json::to_string(other)?),
  }
}

fn outcome_label(outcome: CollectionCreation) -> &'static str {
  match outcome {
    CollectionCreation::Created => "created",
    CollectionCreation::AlreadyExists => "already_exists",
    CollectionCreation::Recreated => "recreated",
  }
}
