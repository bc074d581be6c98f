//! Domain types shared by the retrieval engine, the REST layer and the CLI.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RetrievalError;

// Languages
// =========

/// Languages with their own entity and sentence collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  De,
  En,
  Es,
  Fr,
  Ja,
  Ko,
  Ru,
  Zh,
}

impl Language {
  pub const ALL: [Language; 8] = [
    Language::De,
    Language::En,
    Language::Es,
    Language::Fr,
    Language::Ja,
    Language::Ko,
    Language::Ru,
    Language::Zh,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Language::De => "de",
      Language::En => "en",
      Language::Es => "es",
      Language::Fr => "fr",
      Language::Ja => "ja",
      Language::Ko => "ko",
      Language::Ru => "ru",
      Language::Zh => "zh",
    }
  }
}

impl fmt::Display for Language {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Language {
  type Err = RetrievalError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Language::ALL
      .into_iter()
      .find(|language| language.as_str() == s)
      .ok_or_else(|| RetrievalError::unsupported_language(s))
  }
}

// Entity types
// ============

/// The eight entity categories, in the order they are searched and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
  Person,
  Location,
  Product,
  Facility,
  Art,
  Group,
  Miscellaneous,
  #[serde(rename = "SCIENCE ENTITY", alias = "SCIENCE_ENTITY")]
  ScienceEntity,
}

impl EntityType {
  pub const ALL: [EntityType; 8] = [
    EntityType::Person,
    EntityType::Location,
    EntityType::Product,
    EntityType::Facility,
    EntityType::Art,
    EntityType::Group,
    EntityType::Miscellaneous,
    EntityType::ScienceEntity,
  ];

  /// Label used in collections, instructions and API payloads.
  pub fn as_str(&self) -> &'static str {
    match self {
      EntityType::Person => "PERSON",
      EntityType::Location => "LOCATION",
      EntityType::Product => "PRODUCT",
      EntityType::Facility => "FACILITY",
      EntityType::Art => "ART",
      EntityType::Group => "GROUP",
      EntityType::Miscellaneous => "MISCELLANEOUS",
      EntityType::ScienceEntity => "SCIENCE ENTITY",
    }
  }

  /// Position in [`EntityType::ALL`].
  pub fn index(&self) -> usize {
    *self as usize
  }
}

impl fmt::Display for EntityType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EntityType {
  type Err = RetrievalError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().replace('_', " ").to_ascii_uppercase();
    EntityType::ALL
      .into_iter()
      .find(|entity_type| entity_type.as_str() == normalized)
      .ok_or_else(|| RetrievalError::invalid_input(format!("unknown entity type '{s}'")))
  }
}

// Collections and records
// =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
  Entity,
  Sentence,
}

impl CollectionKind {
  pub fn prefix(&self) -> &'static str {
    match self {
      CollectionKind::Entity => "entity",
      CollectionKind::Sentence => "sentence",
    }
  }

  /// `entity_<lang>` or `sentence_<lang>`.
  pub fn collection_name(&self, language: Language) -> String {
    format!("{}_{}", self.prefix(), language)
  }
}

/// A reference entity ready to be written to `entity_<lang>`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
  pub entity_text: String,
  pub entity_type: EntityType,
  pub language: Language,
  pub embedding: Vec<f32>,
}

/// A reference sentence ready to be written to `sentence_<lang>`.
///
/// `ner_labels` holds the gold annotation as a JSON string, exactly as it is
/// rendered into the instruction's `Output:` lines.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceRecord {
  pub sentence_text: String,
  pub ner_labels: String,
  pub language: Language,
  pub embedding: Vec<f32>,
}

// Search results
// ==============

/// One similarity-search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchHit {
  /// Entity text or sentence text
  pub text: String,
  /// Entity type for entity hits, NER labels for sentence hits
  pub label: String,
  /// Cosine similarity, higher is closer
  pub score: f32,
  /// Cosine distance, `1 - score`
  pub distance: f32,
}

impl SearchHit {
  pub fn new(text: impl Into<String>, label: impl Into<String>, score: f32) -> Self {
    Self { text: text.into(), label: label.into(), score, distance: 1.0 - score }
  }
}

/// Hits per entity type with exactly one slot for each of the eight types.
///
/// Serialized as a JSON object whose keys follow the canonical type order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityResults {
  slots: [Vec<SearchHit>; 8],
}

impl EntityResults {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, entity_type: EntityType) -> &[SearchHit] {
    &self.slots[entity_type.index()]
  }

  pub fn set(&mut self, entity_type: EntityType, hits: Vec<SearchHit>) {
    self.slots[entity_type.index()] = hits;
  }

  /// Entries in canonical order, including empty ones.
  pub fn iter(&self) -> impl Iterator<Item = (EntityType, &[SearchHit])> {
    EntityType::ALL.into_iter().map(move |entity_type| (entity_type, self.get(entity_type)))
  }

  pub fn total_hits(&self) -> usize {
    self.slots.iter().map(Vec::len).sum()
  }

  pub fn non_empty_types(&self) -> usize {
    self.slots.iter().filter(|hits| !hits.is_empty()).count()
  }
}

impl FromIterator<(EntityType, Vec<SearchHit>)> for EntityResults {
  fn from_iter<I: IntoIterator<Item = (EntityType, Vec<SearchHit>)>>(iter: I) -> Self {
    let mut results = EntityResults::new();
    for (entity_type, hits) in iter {
      results.set(entity_type, hits);
    }
    results
  }
}

impl Serialize for EntityResults {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(EntityType::ALL.len()))?;
    for (entity_type, hits) in self.iter() {
      map.serialize_entry(entity_type.as_str(), hits)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for EntityResults {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = BTreeMap::<String, Vec<SearchHit>>::deserialize(deserializer)?;
    let mut results = EntityResults::new();
    for (key, hits) in raw {
      let entity_type = key.parse::<EntityType>().map_err(D::Error::custom)?;
      results.set(entity_type, hits);
    }
    Ok(results)
  }
}

impl JsonSchema for EntityResults {
  fn schema_name() -> String {
    "EntityResults".to_string()
  }

  fn json_schema(generator: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
    <BTreeMap<String, Vec<SearchHit>>>::json_schema(generator)
  }
}

// Retrieval results
// =================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetrievalStatistics {
  pub total_similar_sentences: usize,
  pub total_entities_found: usize,
  pub entity_types_found: usize,
  pub processing_time_ms: f64,
}

impl RetrievalStatistics {
  pub fn from_hits(
    similar_sentences: &[SearchHit],
    entity_results: &EntityResults,
    processing_time_ms: f64,
  ) -> Self {
    Self {
      total_similar_sentences: similar_sentences.len(),
      total_entities_found: entity_results.total_hits(),
      entity_types_found: entity_results.non_empty_types(),
      processing_time_ms,
    }
  }
}

/// Everything produced for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetrievalResult {
  pub query: String,
  pub language: Language,
  pub similar_sentences: Vec<SearchHit>,
  pub entity_results: EntityResults,
  pub instruction: String,
  pub statistics: RetrievalStatistics,
}

/// A query that failed inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchFailure {
  pub query: String,
  pub language: String,
  pub error: String,
  pub error_kind: String,
}

/// One position of a batch response, in the same order as the input queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum BatchEntry {
  Success(RetrievalResult),
  Failure(BatchFailure),
}

impl BatchEntry {
  pub fn failure(query: &str, language: &str, error: &RetrievalError) -> Self {
    BatchEntry::Failure(BatchFailure {
      query: query.to_string(),
      language: language.to_string(),
      error: error.to_string(),
      error_kind: error.kind().to_string(),
    })
  }

  pub fn is_success(&self) -> bool {
    matches!(self, BatchEntry::Success(_))
  }

  pub fn query(&self) -> &str {
    match self {
      BatchEntry::Success(result) => &result.query,
      BatchEntry::Failure(failure) => &failure.query,
    }
  }
}
