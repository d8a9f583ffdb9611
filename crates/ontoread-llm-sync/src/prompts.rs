//! Prompt templates for the three generation kinds.

use crate::generator::{GenerationKind, GenerationPayload};
use ontoread_core::Ontology;

pub const BUILD_PROMPT: &str = r#"You are an ontology engineer who extracts the core concepts of a text and the relations between them.

Input text:
{content}

Task:
1. Identify the core concepts (entities, terms, keywords).
2. Identify the relations between those concepts.
3. Return the ontology as JSON.

Output format (strict JSON, no commentary):
{
  "nodes": [
    {
      "id": "unique id (lowercase letters and hyphens)",
      "name": "concept name",
      "type": "architecture | mechanism | model | component | concept",
      "description": "short description"
    }
  ],
  "edges": [
    {
      "id": "unique id",
      "source": "source node id",
      "target": "target node id",
      "relation": "contains | part-of | based-on | causes | related-to ...",
      "description": "what the relation means here"
    }
  ]
}

Notes:
- Keep it small: 5 to 15 core concepts.
- Every relation must carry clear meaning.
- Ids use lowercase letters and hyphens, e.g. transformer-1.
- Return only the JSON document."#;

pub const UPDATE_PROMPT: &str = r#"You are an ontology engineer who merges new knowledge into an existing ontology.

Existing ontology:
{existing}

New input text:
{content}

Task:
1. Relate the new text to the existing ontology.
2. Identify concepts and relations to add.
3. Identify concepts to remove or modify, if any.
4. Return the complete updated ontology.

Output format (strict JSON):
{
  "nodes": [...complete node list...],
  "edges": [...complete edge list...],
  "changes": {
    "added_nodes": ["new node id"],
    "added_edges": ["new edge id"],
    "removed_nodes": ["removed node id"],
    "removed_edges": ["removed edge id"],
    "modified_nodes": ["modified node id"]
  }
}

Notes:
- Keep every existing concept that is still valid, with its id unchanged.
- Avoid duplicate concepts.
- Return only the JSON document."#;

pub const FORMAT_PROMPT: &str = r#"You organise notes around an ontology.

Ontology:
{ontology}

Original text:
{content}

Task:
1. Reorganise the text around the ontology.
2. Answer in Markdown.
3. Wrap every concept name in square brackets.
4. Explain how the concepts relate.

Output format:
## Core concepts
- **[Concept 1]** (type): description
- **[Concept 2]** (type): description

## Relations
- [Concept 1] --relation--> [Concept 2]

## Summary
A structured account of the text based on the ontology.

Notes:
- Every concept name goes in [].
- Keep it short and clear."#;

pub fn template(kind: GenerationKind) -> &'static str {
    match kind {
        GenerationKind::Build => BUILD_PROMPT,
        GenerationKind::Update => UPDATE_PROMPT,
        GenerationKind::Format => FORMAT_PROMPT,
    }
}

/// Fill the template for `kind` from `payload`.
pub fn render(kind: GenerationKind, payload: &GenerationPayload) -> String {
    let graph = payload.graph.as_ref().map(graph_json).unwrap_or_default();
    let graph_key = match kind {
        GenerationKind::Update => "existing",
        _ => "ontology",
    };
    fill(
        template(kind),
        &[("content", payload.content.as_str()), (graph_key, graph.as_str())],
    )
}

fn graph_json(graph: &Ontology) -> String {
    serde_json::to_string_pretty(graph).unwrap_or_default()
}

/// Single-pass substitution of `{key}` placeholders. Inserted values are
/// never rescanned, so user text containing `{ontology}` stays literal.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        for (key, value) in values {
            let placeholder = format!("{{{}}}", key);
            if tail.starts_with(&placeholder) {
                out.push_str(value);
                rest = &tail[placeholder.len()..];
                continue 'scan;
            }
        }
        out.push('{');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontoread_core::{create_empty, Node};

    #[test]
    fn test_build_prompt_embeds_content() {
        let prompt = render(GenerationKind::Build, &GenerationPayload::new("Attention is all you need."));
        assert!(prompt.contains("Input text:\nAttention is all you need.\n"));
        assert!(!prompt.contains("{content}"));
        assert!(prompt.contains("\"nodes\": ["));
    }

    #[test]
    fn test_update_prompt_embeds_existing_graph() {
        let mut graph = create_empty();
        graph.nodes.push(Node::new("c1", "Transformer"));
        let payload = GenerationPayload::new("BERT builds on it.").with_graph(graph);

        let prompt = render(GenerationKind::Update, &payload);
        assert!(prompt.contains("\"name\": \"Transformer\""));
        assert!(prompt.contains("BERT builds on it."));
        assert!(!prompt.contains("{existing}"));
    }

    #[test]
    fn test_inserted_text_is_not_rescanned() {
        let payload = GenerationPayload::new("literal {ontology} here").with_graph(create_empty());
        let prompt = render(GenerationKind::Format, &payload);
        assert!(prompt.contains("literal {ontology} here"));
        assert!(prompt.contains("\"version\": 1"));
    }

    #[test]
    fn test_fill_keeps_unknown_braces() {
        assert_eq!(fill("{a} {b} {", &[("a", "x")]), "x {b} {");
    }
}
