use exemplar::models::{EntityResults, EntityType, RetrievalStatistics, SearchHit};
use exemplar::template::build_instruction;
use proptest::prelude::*;

fn hits(prefix: &str, count: usize) -> Vec<SearchHit> {
  (0..count).map(|i| SearchHit::new(format!("{prefix}{i}"), prefix, 1.0 - i as f32 * 0.01)).collect()
}

proptest! {
  #[test]
  fn statistics_match_hit_counts(
    per_type in prop::collection::vec(0usize..6, 8),
    sentence_count in 0usize..6,
  ) {
    let mut results = EntityResults::new();
    for (entity_type, &count) in EntityType::ALL.iter().zip(&per_type) {
      results.set(*entity_type, hits(entity_type.as_str(), count));
    }
    let sentences = hits("sentence", sentence_count);

    let stats = RetrievalStatistics::from_hits(&sentences, &results, 1.5);

    prop_assert_eq!(stats.total_similar_sentences, sentence_count);
    prop_assert_eq!(stats.total_entities_found, per_type.iter().sum::<usize>());
    prop_assert_eq!(stats.entity_types_found, per_type.iter().filter(|&&c| c > 0).count());
  }

  #[test]
  fn instruction_always_lists_every_type_and_ends_with_query(
    per_type in prop::collection::vec(0usize..4, 8),
    query in "[A-Za-z ]{1,40}",
  ) {
    let mut results = EntityResults::new();
    for (entity_type, &count) in EntityType::ALL.iter().zip(&per_type) {
      results.set(*entity_type, hits(entity_type.as_str(), count));
    }

    let instruction = build_instruction(&query, &results, &[], 5, 5);

    for entity_type in EntityType::ALL {
      let header = format!("- {}: \n", entity_type.as_str());
      prop_assert!(instruction.contains(&header));
    }
    let ending = format!("Input: {query}");
    prop_assert!(instruction.ends_with(&ending));
  }
}

fn results_with(count_per_type: usize) -> EntityResults {
  let mut results = EntityResults::new();
  for entity_type in EntityType::ALL {
    results.set(entity_type, hits(entity_type.as_str(), count_per_type));
  }
  results
}

#[test]
fn statistics_when_every_type_is_empty() {
  let results = results_with(0);

  let stats = RetrievalStatistics::from_hits(&[], &results, 0.0);

  assert_eq!(stats.total_similar_sentences, 0);
  assert_eq!(stats.total_entities_found, 0);
  assert_eq!(stats.entity_types_found, 0);

  let instruction = build_instruction("Nothing matches", &results, &[], 5, 5);
  assert_eq!(instruction.matches("e.g. (no examples available)").count(), 8);
  assert!(instruction.ends_with("Input: Nothing matches"));
}

#[test]
fn statistics_when_every_type_is_full() {
  let results = results_with(5);
  let sentences = hits("sentence", 5);

  let stats = RetrievalStatistics::from_hits(&sentences, &results, 2.0);

  assert_eq!(stats.total_similar_sentences, 5);
  assert_eq!(stats.total_entities_found, 40);
  assert_eq!(stats.entity_types_found, 8);

  let instruction = build_instruction("Everything matches", &results, &sentences, 5, 5);
  assert!(!instruction.contains("(no examples available)"));
}
