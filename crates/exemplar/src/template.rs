//! Rendering of retrieved entities and sentences into the few-shot NER instruction.
//!
//! All functions are pure: identical inputs always produce byte-identical text.

use crate::models::{EntityResults, EntityType, SearchHit};

const ENTITY_EXAMPLE_SEPARATOR: &str = ", \n       ";
const NO_EXAMPLES: &str = "(no examples available)";

/// One entity type line with up to `max_examples` example entity texts.
pub fn render_entity_block(entity_type: EntityType, hits: &[SearchHit], max_examples: usize) -> String {
  let examples = hits.iter().take(max_examples).map(|hit| hit.text.as_str()).collect::<Vec<_>>();

  let examples = if examples.is_empty() {
    NO_EXAMPLES.to_string()
  } else {
    examples.join(ENTITY_EXAMPLE_SEPARATOR)
  };

  format!("- {entity_type}: \n  e.g. {examples}")
}

/// All eight entity type lines, in canonical order, joined by newlines.
pub fn render_entity_types_block(entity_results: &EntityResults, max_examples: usize) -> String {
  entity_results
    .iter()
    .map(|(entity_type, hits)| render_entity_block(entity_type, hits, max_examples))
    .collect::<Vec<_>>()
    .join("\n")
}

/// `Input:`/`Output:` pairs for the similar sentences, separated by a blank line.
pub fn render_example_block(sentence_hits: &[SearchHit], max_examples: usize) -> String {
  let rendered = sentence_hits.len().min(max_examples);
  let mut block = String::new();

  for (i, hit) in sentence_hits.iter().take(rendered).enumerate() {
    block.push_str(&format!("Input: {}\n", hit.text));
    block.push_str(&format!("Output: {}\n", hit.label));
    if i + 1 < rendered {
      block.push('\n');
    }
  }

  block
}

/// The complete instruction with the query appended after the final `Input: `.
pub fn render_instruction(entity_types_block: &str, examples_block: &str, query: &str) -> String {
  format!(
    "Please list all named entities of the following entity types in the input sentence\n\
     {entity_types_block}\n\
     Here are some examples:\n\
     {examples_block}\n\
     You should output your results in the format {{\"type\": [\"entity\"]}} as a JSON.\n\
     Input: {query}"
  )
}

/// Renders both blocks and the instruction in one step.
pub fn build_instruction(
  query: &str,
  entity_results: &EntityResults,
  similar_sentences: &[SearchHit],
  max_entities_per_type: usize,
  max_examples: usize,
) -> String {
  let entity_types_block = render_entity_types_block(entity_results, max_entities_per_type);
  let examples_block = render_example_block(similar_sentences, max_examples);
  render_instruction(&entity_types_block, &examples_block, query)
}
