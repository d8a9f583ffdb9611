//! Ontoread CLI
//!
//! Command-line interface for:
//! - Turning notes into an ontology graph through an LLM (`submit`, `build`, `update`)
//! - Inspecting and editing the stored graph (`show`, `node`, `edge`)
//! - Offline checks on graph files (`validate`, `diff`)
//! - Moving data in and out (`export`, `import`, `mermaid`, `backup`)
//! - History and generator settings

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use ontoread_core::{
    diff_graphs, export_json, import_json, parse_mermaid, to_mermaid, validate, Ontology,
};
use ontoread_llm_sync::{generator_from_settings, MergeOutcome, Pipeline, PipelineEvent};
use ontoread_storage::{Backup, HistoryKind, OntologyStore, Settings, StoreConfig};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod edit;

use edit::{EdgeCommands, NodeCommands};

#[derive(Parser)]
#[command(name = "ontoread")]
#[command(author, version, about = "Ontoread: turn reading notes into an ontology graph")]
struct Cli {
    /// Directory holding the stored records (default: $ONTOREAD_DATA_DIR or ./.ontoread)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

/// Text to process: an argument, `--file`, or `-` for stdin.
#[derive(Args)]
struct InputArgs {
    /// Input text, or `-` to read stdin
    text: Option<String>,
    /// Read the input text from a file
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,
}

impl InputArgs {
    fn read(&self) -> Result<String> {
        match (&self.text, &self.file) {
            (_, Some(path)) => read_file(path),
            (Some(text), None) if text == "-" => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read stdin")?;
                Ok(buf)
            }
            (Some(text), None) => Ok(text.clone()),
            (None, None) => bail!("no input: pass TEXT, --file <PATH>, or `-` for stdin"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process text: build a new graph when none is stored, update it otherwise
    Submit(InputArgs),

    /// Build a fresh graph (version 1) from text, replacing the stored one
    Build(InputArgs),

    /// Merge text into the stored graph
    Update(InputArgs),

    /// Generate a graph from text and print it as Mermaid without saving
    Preview(InputArgs),

    /// Print the stored graph
    Show {
        /// Print the persisted JSON
        #[arg(long, conflicts_with = "mermaid")]
        json: bool,
        /// Print a Mermaid flowchart
        #[arg(long)]
        mermaid: bool,
    },

    /// Check a graph JSON file
    Validate { file: PathBuf },

    /// Compare two graph JSON files
    Diff { old: PathBuf, new: PathBuf },

    /// Write the stored graph as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Replace the stored graph with a validated JSON file
    Import { file: PathBuf },

    /// Mermaid flowchart conversion
    Mermaid {
        #[command(subcommand)]
        command: MermaidCommands,
    },

    /// Manual node edits
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },

    /// Manual edge edits
    Edge {
        #[command(subcommand)]
        command: EdgeCommands,
    },

    /// Processed submissions, newest first
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Generator provider, model and token
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Export or restore graph, history and settings together
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },

    /// Delete the stored graph (`--all` also clears history; settings are kept)
    Clear {
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum MermaidCommands {
    /// Render the stored graph
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Parse a flowchart and store it as the current graph
    Import { file: PathBuf },
}

#[derive(Subcommand)]
enum HistoryCommands {
    List {
        /// Show at most this many items
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Print one item's input, output and changes
    Show { id: String },
    Clear,
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the effective settings (token masked)
    Show,
    /// Save settings; omitted fields keep their current value
    Set {
        /// openai, moonshot, anthropic or local
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        token: Option<String>,
        /// Base URL or full endpoint (empty string resets it)
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    Import { file: PathBuf },
}

enum Mode {
    Submit,
    Build,
    Update,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ontoread=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = StoreConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    let store = Arc::new(OntologyStore::open(config));

    match cli.command {
        Commands::Submit(input) => cmd_generate(store, Mode::Submit, &input.read()?).await?,
        Commands::Build(input) => cmd_generate(store, Mode::Build, &input.read()?).await?,
        Commands::Update(input) => cmd_generate(store, Mode::Update, &input.read()?).await?,
        Commands::Preview(input) => cmd_preview(store, &input.read()?).await?,
        Commands::Show { json, mermaid } => cmd_show(&store, json, mermaid)?,
        Commands::Validate { file } => cmd_validate(&file)?,
        Commands::Diff { old, new } => cmd_diff(&old, &new)?,
        Commands::Export { out } => {
            let graph = stored_graph(&store)?;
            write_output(out.as_deref(), &export_json(&graph))?;
        }
        Commands::Import { file } => {
            let graph = import_json(&read_file(&file)?)
                .with_context(|| format!("{} is not a valid graph", file.display()))?;
            save_graph(&store, &graph)?;
            eprintln!("{} {}", "imported".green().bold(), graph.stats());
        }
        Commands::Mermaid { command } => match command {
            MermaidCommands::Export { out } => {
                let graph = stored_graph(&store)?;
                write_output(out.as_deref(), &to_mermaid(&graph))?;
            }
            MermaidCommands::Import { file } => {
                let graph = parse_mermaid(&read_file(&file)?)?;
                validate(&graph).context("parsed flowchart is not a valid graph")?;
                save_graph(&store, &graph)?;
                eprintln!("{} {}", "imported".green().bold(), graph.stats());
            }
        },
        Commands::Node { command } => edit::cmd_node(&store, command)?,
        Commands::Edge { command } => edit::cmd_edge(&store, command)?,
        Commands::History { command } => cmd_history(&store, command)?,
        Commands::Settings { command } => cmd_settings(&store, command)?,
        Commands::Backup { command } => cmd_backup(&store, command)?,
        Commands::Clear { all } => {
            let ok = if all {
                store.clear_all()
            } else {
                store.clear_graph()
            };
            if !ok {
                bail!("failed to clear the store");
            }
            eprintln!("{}", "cleared".green().bold());
        }
    }
    Ok(())
}

// ============================================================================
// Pipeline Commands
// ============================================================================

fn pipeline_for(store: &Arc<OntologyStore>) -> Result<Pipeline> {
    let generator = generator_from_settings(&store.get_settings())?;
    let mut pipeline = Pipeline::new(Arc::new(generator), Arc::clone(store));
    pipeline.on_event(Box::new(|event: PipelineEvent| match event {
        PipelineEvent::EdgesDropped { dropped } => {
            for d in dropped {
                eprintln!(
                    "{} dropped edge {} ({} -> {}): unknown node {}",
                    "warn".yellow().bold(),
                    d.edge.id,
                    d.edge.source,
                    d.edge.target,
                    d.missing_node
                );
            }
        }
        PipelineEvent::DuplicatesDropped { duplicates } => {
            for d in duplicates {
                eprintln!(
                    "{} dropped {} {}: id already used",
                    "warn".yellow().bold(),
                    d.kind(),
                    d.id()
                );
            }
        }
        _ => {}
    }));
    Ok(pipeline)
}

async fn cmd_generate(store: Arc<OntologyStore>, mode: Mode, text: &str) -> Result<()> {
    let mut pipeline = pipeline_for(&store)?;
    let outcome = match mode {
        Mode::Submit => pipeline.submit(text).await?,
        Mode::Build => pipeline.build_from_scratch(text).await?,
        Mode::Update => {
            let current = store
                .load_graph_validated()
                .ok_or_else(|| anyhow!("no valid stored graph to update; run `ontoread build` first"))?;
            pipeline.merge_update(text, &current).await?
        }
    };
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &MergeOutcome) {
    println!("{}", outcome.output);
    if outcome.kind == HistoryKind::Update {
        println!();
        println!("## Changes");
        println!("{}", outcome.summary());
    }
    eprintln!(
        "{} {} {}",
        "committed".green().bold(),
        outcome.kind,
        outcome.ontology.stats()
    );
}

async fn cmd_preview(store: Arc<OntologyStore>, text: &str) -> Result<()> {
    let mut pipeline = pipeline_for(&store)?;
    let preview = pipeline.preview_build(text).await?;
    println!("{}", to_mermaid(&preview.ontology));
    eprintln!(
        "{} {} (not saved)",
        "preview".cyan().bold(),
        preview.ontology.stats()
    );
    Ok(())
}

// ============================================================================
// Graph Commands
// ============================================================================

fn cmd_show(store: &OntologyStore, json: bool, mermaid: bool) -> Result<()> {
    let graph = stored_graph(store)?;
    if json {
        println!("{}", export_json(&graph));
        return Ok(());
    }
    if mermaid {
        println!("{}", to_mermaid(&graph));
        return Ok(());
    }

    let stats = graph.stats();
    println!("{} {}", "Ontology".green().bold(), stats);
    println!("  Created: {}", graph.created_at.to_rfc3339());
    println!("  Updated: {}", graph.updated_at.to_rfc3339());
    for (node_type, count) in &stats.nodes_by_type {
        println!("  {}: {}", node_type.yellow(), count);
    }
    println!();
    for node in &graph.nodes {
        println!(
            "  {} {} ({}, {})",
            node.id.cyan(),
            node.name.bold(),
            node.node_type,
            node.provenance
        );
    }
    for edge in &graph.edges {
        println!(
            "  {} {} -[{}]-> {}",
            edge.id.cyan(),
            edge.source,
            edge.relation,
            edge.target
        );
    }
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    println!("{} {}", "Validating".green().bold(), file.display());
    let graph = import_json(&read_file(file)?)?;
    println!("  {}", graph.stats());
    println!("{}", "Valid.".green());
    Ok(())
}

fn cmd_diff(old: &Path, new: &Path) -> Result<()> {
    let parse = |path: &Path| -> Result<Ontology> {
        serde_json::from_str(&read_file(path)?)
            .with_context(|| format!("{} is not a graph document", path.display()))
    };
    let diff = diff_graphs(&parse(old)?, &parse(new)?);
    println!("{}", diff.summarize());
    Ok(())
}

// ============================================================================
// History, Settings, Backup
// ============================================================================

fn cmd_history(store: &OntologyStore, command: HistoryCommands) -> Result<()> {
    match command {
        HistoryCommands::List { limit } => {
            let history = store.get_history();
            if history.is_empty() {
                eprintln!("no history");
            }
            for item in history.iter().take(limit) {
                println!(
                    "{}  {}  {:<6}  v{:<3}  {}",
                    item.id.cyan(),
                    item.timestamp.format("%Y-%m-%d %H:%M"),
                    item.kind,
                    item.ontology_version,
                    preview_line(&item.input, 60)
                );
            }
        }
        HistoryCommands::Show { id } => {
            let item = store
                .history_item(&id)
                .ok_or_else(|| anyhow!("history item not found: {}", id))?;
            println!(
                "{} {} v{} at {}",
                item.id.cyan(),
                item.kind,
                item.ontology_version,
                item.timestamp.to_rfc3339()
            );
            println!("\n{}\n{}", "Input".bold(), item.input);
            println!("\n{}\n{}", "Output".bold(), item.output);
            if let Some(summary) = item.changes.as_ref().and_then(|c| c.summary.as_ref()) {
                println!("\n{}\n{}", "Changes".bold(), summary);
            }
        }
        HistoryCommands::Clear => {
            if !store.clear_history() {
                bail!("failed to clear history");
            }
            eprintln!("{}", "history cleared".green().bold());
        }
    }
    Ok(())
}

fn cmd_settings(store: &OntologyStore, command: SettingsCommands) -> Result<()> {
    match command {
        SettingsCommands::Show => {
            print_settings(&store.get_settings());
        }
        SettingsCommands::Set {
            provider,
            model,
            token,
            endpoint,
        } => {
            let mut settings = store.get_settings();
            if let Some(provider) = provider {
                settings.model_provider = provider;
            }
            if let Some(model) = model {
                settings.model_name = model;
            }
            if let Some(token) = token {
                settings.api_token = token;
            }
            if let Some(endpoint) = endpoint {
                settings.api_endpoint = Some(endpoint).filter(|e| !e.is_empty());
            }
            if !store.save_settings(&settings) {
                bail!("failed to write settings");
            }
            print_settings(&settings);
        }
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("  Provider: {}", settings.model_provider.cyan());
    println!("  Model:    {}", settings.model_name.cyan());
    println!("  Token:    {}", settings.masked_token());
    if let Some(endpoint) = &settings.api_endpoint {
        println!("  Endpoint: {}", endpoint);
    }
    let status = if settings.is_configured() {
        "configured".green()
    } else {
        "not configured".red()
    };
    println!("  Status:   {}", status);
}

fn cmd_backup(store: &OntologyStore, command: BackupCommands) -> Result<()> {
    match command {
        BackupCommands::Export { out } => {
            let backup = store.export_all();
            write_output(out.as_deref(), &serde_json::to_string_pretty(&backup)?)?;
        }
        BackupCommands::Import { file } => {
            let backup: Backup = serde_json::from_str(&read_file(&file)?)
                .with_context(|| format!("{} is not a backup file", file.display()))?;
            if !store.import_all(&backup) {
                bail!("backup import incomplete: some sections were rejected or not written");
            }
            eprintln!("{} {}", "restored".green().bold(), file.display());
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn stored_graph(store: &OntologyStore) -> Result<Ontology> {
    store
        .get_graph()
        .ok_or_else(|| anyhow!("no stored graph; run `ontoread submit <TEXT>` first"))
}

fn save_graph(store: &OntologyStore, graph: &Ontology) -> Result<()> {
    if !store.save_graph(graph) {
        bail!("failed to write graph to the store");
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// First line of `text`, cut to `max` characters.
fn preview_line(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let cut: String = line.chars().take(max).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_input_from_file_and_argument() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        fs::write(&path, "from file").unwrap();

        let args = InputArgs {
            text: None,
            file: Some(path),
        };
        assert_eq!(args.read().unwrap(), "from file");

        let args = InputArgs {
            text: Some("inline".to_string()),
            file: None,
        };
        assert_eq!(args.read().unwrap(), "inline");

        let args = InputArgs {
            text: None,
            file: None,
        };
        assert!(args.read().is_err());
    }

    #[test]
    fn test_global_data_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["ontoread", "show", "--json", "--data-dir", "/tmp/x"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(cli.command, Commands::Show { json: true, mermaid: false }));
    }

    #[test]
    fn test_preview_line() {
        assert_eq!(preview_line("short\nsecond", 60), "short");
        assert_eq!(preview_line("abcdef", 3), "abc…");
    }
}
