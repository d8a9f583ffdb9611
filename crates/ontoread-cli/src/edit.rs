//! `node` and `edge` subcommands: manual edits to the stored graph.

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use ontoread_core::{
    create_empty, touch, EdgeDraft, EdgePatch, NodeDraft, NodePatch, NodeType, Ontology,
    PropertyValue, RelationType, Strength,
};
use ontoread_storage::OntologyStore;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

#[derive(Subcommand)]
pub enum NodeCommands {
    /// Add a node (provenance `manual`)
    Add {
        /// Concept name (default: "New concept")
        #[arg(long)]
        name: Option<String>,
        /// Node id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// architecture, mechanism, model, component, concept, or any other label
        #[arg(long = "type")]
        node_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Extra property as KEY=VALUE (repeatable)
        #[arg(long = "prop", value_name = "KEY=VALUE")]
        props: Vec<String>,
    },
    /// Change fields of an existing node
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        node_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "prop", value_name = "KEY=VALUE")]
        props: Vec<String>,
    },
    /// Remove a node and every edge touching it
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum EdgeCommands {
    /// Add an edge between two existing nodes
    Add {
        source: String,
        target: String,
        /// Relation label (default: "related-to")
        #[arg(long)]
        relation: Option<String>,
        #[arg(long)]
        id: Option<String>,
        /// structural, behavioral, temporal, logical
        #[arg(long)]
        relation_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// weak, medium, strong
        #[arg(long)]
        strength: Option<String>,
    },
    /// Change fields of an existing edge
    Update {
        id: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        relation: Option<String>,
        #[arg(long)]
        relation_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        strength: Option<String>,
    },
    /// Remove one edge
    Remove { id: String },
}

pub fn cmd_node(store: &OntologyStore, command: NodeCommands) -> Result<()> {
    match command {
        NodeCommands::Add {
            name,
            id,
            node_type,
            description,
            props,
        } => {
            let mut graph = store.get_graph().unwrap_or_else(create_empty);
            let id = graph.add_node(NodeDraft {
                id,
                name,
                node_type: node_type.map(NodeType::from),
                description,
                properties: parse_props(&props)?,
            })?;
            save(store, &graph)?;
            println!("{} node {}", "added".green().bold(), id.cyan());
        }
        NodeCommands::Update {
            id,
            name,
            node_type,
            description,
            props,
        } => {
            let mut graph = stored(store)?;
            graph.update_node(
                &id,
                NodePatch {
                    name,
                    node_type: node_type.map(NodeType::from),
                    description,
                    properties: parse_props(&props)?,
                },
            )?;
            save(store, &graph)?;
            println!("{} node {}", "updated".green().bold(), id.cyan());
        }
        NodeCommands::Remove { id } => {
            let mut graph = stored(store)?;
            let removed = graph.remove_node(&id)?;
            save(store, &graph)?;
            println!(
                "{} node {} ({} edges removed)",
                "removed".green().bold(),
                id.cyan(),
                removed.len()
            );
        }
    }
    Ok(())
}

pub fn cmd_edge(store: &OntologyStore, command: EdgeCommands) -> Result<()> {
    match command {
        EdgeCommands::Add {
            source,
            target,
            relation,
            id,
            relation_type,
            description,
            strength,
        } => {
            let mut graph = stored(store)?;
            let id = graph.add_edge(EdgeDraft {
                id,
                source,
                target,
                relation,
                relation_type: parse_enum::<RelationType>(relation_type, "relation type")?,
                description,
                strength: parse_enum::<Strength>(strength, "strength")?,
            })?;
            save(store, &graph)?;
            println!("{} edge {}", "added".green().bold(), id.cyan());
        }
        EdgeCommands::Update {
            id,
            source,
            target,
            relation,
            relation_type,
            description,
            strength,
        } => {
            let mut graph = stored(store)?;
            graph.update_edge(
                &id,
                EdgePatch {
                    source,
                    target,
                    relation,
                    relation_type: parse_enum::<RelationType>(relation_type, "relation type")?,
                    description,
                    strength: parse_enum::<Strength>(strength, "strength")?,
                },
            )?;
            save(store, &graph)?;
            println!("{} edge {}", "updated".green().bold(), id.cyan());
        }
        EdgeCommands::Remove { id } => {
            let mut graph = stored(store)?;
            graph.remove_edge(&id)?;
            save(store, &graph)?;
            println!("{} edge {}", "removed".green().bold(), id.cyan());
        }
    }
    Ok(())
}

fn stored(store: &OntologyStore) -> Result<Ontology> {
    store
        .get_graph()
        .ok_or_else(|| anyhow!("no stored graph; run `ontoread build` or `ontoread node add` first"))
}

fn save(store: &OntologyStore, graph: &Ontology) -> Result<()> {
    if !store.save_graph(&touch(graph)) {
        bail!("failed to write graph to the store");
    }
    Ok(())
}

/// `KEY=VALUE` pairs. Values read as bool, integer, float, then text.
fn parse_props(props: &[String]) -> Result<Option<BTreeMap<String, PropertyValue>>> {
    if props.is_empty() {
        return Ok(None);
    }
    let mut map = BTreeMap::new();
    for prop in props {
        let (key, value) = prop
            .split_once('=')
            .with_context(|| format!("property {:?} is not KEY=VALUE", prop))?;
        let value = if let Ok(b) = value.parse::<bool>() {
            PropertyValue::Bool(b)
        } else if let Ok(i) = value.parse::<i64>() {
            PropertyValue::Integer(i)
        } else if let Ok(u) = value.parse::<u64>() {
            PropertyValue::Unsigned(u)
        } else if let Ok(f) = value.parse::<f64>() {
            PropertyValue::Float(f)
        } else {
            PropertyValue::from(value)
        };
        map.insert(key.trim().to_string(), value);
    }
    Ok(Some(map))
}

/// Parse a lowercase serde enum name such as `structural` or `strong`.
fn parse_enum<T: DeserializeOwned>(value: Option<String>, what: &str) -> Result<Option<T>> {
    value
        .map(|v| {
            serde_json::from_value(serde_json::Value::String(v.to_lowercase()))
                .map_err(|_| anyhow!("unknown {}: {}", what, v))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_props() {
        let props = vec![
            "layer=2".to_string(),
            "is_subgraph=true".to_string(),
            "weight=0.5".to_string(),
            "domain=NLP".to_string(),
            "seed=18446744073709551615".to_string(),
        ];
        let map = parse_props(&props).unwrap().unwrap();
        assert_eq!(map["layer"], PropertyValue::Integer(2));
        assert_eq!(map["is_subgraph"], PropertyValue::Bool(true));
        assert_eq!(map["weight"], PropertyValue::Float(0.5));
        assert_eq!(map["domain"].as_str(), Some("NLP"));
        assert_eq!(map["seed"], PropertyValue::Unsigned(u64::MAX));
        assert!(parse_props(&["novalue".to_string()]).is_err());
        assert_eq!(parse_props(&[]).unwrap(), None);
    }

    #[test]
    fn test_parse_enum() {
        let strength: Option<Strength> = parse_enum(Some("Strong".to_string()), "strength").unwrap();
        assert_eq!(strength, Some(Strength::Strong));
        assert!(parse_enum::<RelationType>(Some("sideways".to_string()), "relation type").is_err());
        assert_eq!(parse_enum::<Strength>(None, "strength").unwrap(), None);
    }
}
