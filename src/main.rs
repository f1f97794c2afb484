//! CLI entry point for search-batch.
//!
//! Loads JSON lines into a tantivy index, exports query results and copies
//! documents between logical indexes, one transaction per chunk.

use anyhow::{Context, bail};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use search_batch::config::StoreConfig;
use search_batch::item::{ExecutionContext, JsonLinesReader, JsonLinesWriter};
use search_batch::{
    BatchError, ChunkStep, DocumentId, IndexName, IndexRequest, Query, RefreshPolicy,
    SearchItemReader, SearchItemWriter, Settings, StepExecution, TantivyClient, TransactionManager,
    WriteRequest,
};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Batch reads and writes against a search index
#[derive(Parser)]
#[command(
    name = "search-batch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Batch reads and writes against a search index",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .search-batch/settings.toml
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Config,

    /// Index a JSON lines file, one document per line
    Load {
        /// Input file, `-` for stdin
        file: PathBuf,

        /// Document type of every line
        #[arg(long = "type", value_name = "TYPE")]
        document_type: String,

        /// Target index (defaults to store.default_index)
        #[arg(long)]
        index: Option<String>,

        /// Take the document id from this top-level field
        #[arg(long)]
        id_field: Option<String>,

        /// Run read-only transactions; nothing is written
        #[arg(long)]
        dry_run: bool,

        /// Save the read position here and resume from it on the next run
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Write matching documents to a JSON lines file
    Export {
        #[arg(long = "type", value_name = "TYPE")]
        document_type: String,

        /// Query string; all documents when omitted
        #[arg(short, long)]
        query: Option<String>,

        /// Only read this index
        #[arg(long)]
        index: Option<String>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save the read position here and resume from it on the next run
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Re-index matching documents into another index
    Copy {
        #[arg(long = "type", value_name = "TYPE")]
        document_type: String,

        /// Destination index
        #[arg(long)]
        to: String,

        /// Query string; all documents when omitted
        #[arg(short, long)]
        query: Option<String>,

        /// Source index (defaults to store.default_index)
        #[arg(long)]
        index: Option<String>,

        /// Keep ids by reading them from this top-level field
        #[arg(long)]
        id_field: Option<String>,

        /// Run read-only transactions; nothing is written
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    search_batch::logging::init(search_batch::logging::level_for(&settings));

    match run(cli.command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(batch_error) = e.downcast_ref::<BatchError>() {
                eprintln!("  code: {}", batch_error.status_code());
                for suggestion in batch_error.recovery_suggestions() {
                    eprintln!("  hint: {suggestion}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Commands::Init { force } => {
            let cwd = std::env::current_dir()?;
            let path = Settings::init_config_file(&cwd, force)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("Created configuration file at: {}", path.display());
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(settings)?);
        }

        Commands::Load {
            file,
            document_type,
            index,
            id_field,
            dry_run,
            state,
        } => {
            // one commit at the end instead of one per document
            let store = StoreConfig {
                refresh: RefreshPolicy::Manual,
                ..settings.store.clone()
            };
            let client = Arc::new(open_client(settings, &store)?);
            let input: Box<dyn BufRead> = if file.as_os_str() == "-" {
                Box::new(std::io::stdin().lock())
            } else {
                let handle = File::open(&file)
                    .with_context(|| format!("Cannot open {}", file.display()))?;
                Box::new(BufReader::new(handle))
            };

            let mut reader = JsonLinesReader::new("load", input);
            let mut writer = SearchItemWriter::new(Some(client.clone()), index.map(IndexName::from))?;
            let step = ChunkStep::new("load", settings.step.commit_interval, Arc::new(TransactionManager::new()))?
                .read_only(dry_run);

            let mut context = load_context(state.as_deref())?;
            let result = step.run(
                &mut reader,
                |value: Value| Ok(Some(index_request(&document_type, id_field.as_deref(), value))),
                &mut writer,
                &mut context,
            );
            // staged chunks are committed before their read position is saved;
            // a dry run consumed lines without writing them and saves nothing
            if !dry_run {
                client.refresh()?;
                save_context(state.as_deref(), &context)?;
            }
            let execution = result?;
            report(&execution, dry_run);
        }

        Commands::Export {
            document_type,
            query,
            index,
            output,
            state,
        } => {
            let client = Arc::new(open_client(settings, &settings.store)?);
            let mut reader = SearchItemReader::<Value>::builder()
                .name("export")
                .client(client)
                .query(build_query(query, index))
                .target_type(document_type)
                .page_size(settings.reader.page_size)
                .max_item_count(settings.reader.max_item_count)
                .save_state(settings.reader.save_state)
                .build()?;

            let mut context = load_context(state.as_deref())?;
            // a resumed export continues the file the earlier run started
            let resuming = settings.reader.save_state && context.contains_key("export.read.count");
            let output: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(open_output(path, resuming)?)),
                None => Box::new(std::io::stdout().lock()),
            };
            let mut writer = JsonLinesWriter::new(output);
            let step = ChunkStep::new("export", settings.step.commit_interval, Arc::new(TransactionManager::new()))?;

            let result = step.run(&mut reader, |value: Value| Ok(Some(value)), &mut writer, &mut context);
            save_context(state.as_deref(), &context)?;
            let execution = result?;

            report(&execution, false);
        }

        Commands::Copy {
            document_type,
            to,
            query,
            index,
            id_field,
            dry_run,
        } => {
            let source = index.unwrap_or_else(|| settings.store.default_index.clone());
            if source == to {
                bail!("Source and destination index are both '{to}'");
            }

            // copied documents stay invisible to the reader until the final refresh
            let store = StoreConfig {
                refresh: RefreshPolicy::Manual,
                ..settings.store.clone()
            };
            let client = Arc::new(open_client(settings, &store)?);

            let mut reader = SearchItemReader::<Value>::builder()
                .name("copy")
                .client(client.clone())
                .query(build_query(query, Some(source)))
                .target_type(document_type.clone())
                .page_size(settings.reader.page_size)
                .max_item_count(settings.reader.max_item_count)
                .save_state(false)
                .build()?;
            let mut writer = SearchItemWriter::builder()
                .client(client.clone())
                .index(to)
                .build()?;
            let step = ChunkStep::new("copy", settings.step.commit_interval, Arc::new(TransactionManager::new()))?
                .read_only(dry_run);

            let execution = step.run(
                &mut reader,
                |value: Value| Ok(Some(index_request(&document_type, id_field.as_deref(), value))),
                &mut writer,
                &mut ExecutionContext::new(),
            )?;

            if !dry_run {
                client.refresh()?;
            }
            report(&execution, dry_run);
        }
    }
    Ok(())
}

fn open_client(settings: &Settings, store: &StoreConfig) -> anyhow::Result<TantivyClient> {
    debug!("Opening index at {}", settings.index_path.display());
    TantivyClient::open(&settings.index_path, store)
        .with_context(|| format!("Cannot open index at {}", settings.index_path.display()))
}

fn open_output(path: &Path, append: bool) -> anyhow::Result<File> {
    let file = if append {
        OpenOptions::new().append(true).create(true).open(path)
    } else {
        File::create(path)
    };
    file.with_context(|| format!("Cannot open {}", path.display()))
}

fn build_query(text: Option<String>, index: Option<String>) -> Query {
    let query = match text {
        Some(text) => Query::query_string(text),
        None => Query::match_all(),
    };
    match index {
        Some(index) => query.with_index(index),
        None => query,
    }
}

fn index_request(document_type: &str, id_field: Option<&str>, value: Value) -> WriteRequest {
    let id = id_field.and_then(|field| match value.get(field) {
        Some(Value::String(id)) => Some(DocumentId::new(id.as_str())),
        Some(Value::Number(id)) => Some(DocumentId::new(id.to_string())),
        _ => None,
    });
    let request = IndexRequest::new(document_type, value);
    WriteRequest::index(match id {
        Some(id) => request.with_id(id),
        None => request,
    })
}

fn load_context(path: Option<&Path>) -> anyhow::Result<ExecutionContext> {
    match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path)?;
            let context = serde_json::from_str(&content)
                .with_context(|| format!("Corrupt state file {}", path.display()))?;
            info!("Resuming from {}", path.display());
            Ok(context)
        }
        _ => Ok(ExecutionContext::new()),
    }
}

fn save_context(path: Option<&Path>, context: &ExecutionContext) -> anyhow::Result<()> {
    if let Some(path) = path {
        std::fs::write(path, serde_json::to_string_pretty(context)?)
            .with_context(|| format!("Cannot write state file {}", path.display()))?;
    }
    Ok(())
}

fn report(execution: &StepExecution, dry_run: bool) {
    if dry_run {
        eprintln!("{execution} (dry run)");
    } else {
        eprintln!("{execution}");
    }
}
