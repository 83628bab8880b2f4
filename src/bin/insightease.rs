use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table as ComfyTable, presets::UTF8_FULL};
use insightease::engine::EngineSelector;
use insightease::executor::{ChainProgress, ChainRunner};
use insightease::ingest::parse_file;
use insightease::profile::{cached_report, report};
use insightease::storage::LocalStore;
use insightease::types::{InsightError, Operation, OperationChain, Table, TableSource};
use insightease::InsightConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PREVIEW_ROWS: usize = 20;

/// InsightEase command line front-end
#[derive(Parser, Debug)]
#[command(name = "insightease")]
#[command(about = "Run operation chains over CSV/JSON files and manage the local store", long_about = None)]
struct Args {
    /// Config file (default: /etc/insightease/insightease.toml, then ./insightease.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Local store directory
    #[arg(short = 'd', long, global = true, env = "INSIGHTEASE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "INSIGHTEASE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show which engine a chain would run on
    Decide {
        /// CSV or JSON input file
        input: PathBuf,
        /// Chain file: an operation chain or a JSON array of operations
        chain: PathBuf,
    },
    /// Execute a chain in-process, whatever engine the selector suggests
    Run {
        input: PathBuf,
        chain: PathBuf,
        /// Extra tables for joins, as NAME=FILE
        #[arg(short = 't', long = "table", value_name = "NAME=FILE")]
        tables: Vec<String>,
        /// Save the result into the dataset store
        #[arg(long)]
        save: bool,
        /// Tags attached to the saved dataset
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Write the result table as JSON
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Column statistics and quality score, cached for cache_ttl_minutes
    Profile {
        input: PathBuf,
        /// Profile the file without reading or filling the cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Stored datasets
    Datasets {
        #[command(subcommand)]
        action: DatasetAction,
    },
    /// Saved operation chains
    Chains {
        #[command(subcommand)]
        action: ChainAction,
    },
    /// API response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum DatasetAction {
    List,
    /// Remove datasets not accessed recently
    Cleanup {
        /// Overrides dataset_max_age_days from the config
        #[arg(long)]
        max_age_days: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum ChainAction {
    List,
    Save { file: PathBuf },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    Stats,
    Cleanup,
    Clear,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("insightease={level}")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Accepts a full chain document or a bare array of operations.
fn load_chain(path: &Path) -> Result<OperationChain, InsightError> {
    let text = fs::read_to_string(path)?;
    if let Ok(chain) = serde_json::from_str::<OperationChain>(&text) {
        return Ok(chain);
    }
    let operations: Vec<Operation> = serde_json::from_str(&text)?;
    let name = path
        .file_stem()
        .map_or_else(|| "chain".to_string(), |s| s.to_string_lossy().into_owned());
    Ok(OperationChain::with_operations(name, operations))
}

fn load_tables(specs: &[String]) -> Result<HashMap<String, Table>, InsightError> {
    specs
        .iter()
        .map(|spec| {
            let (name, path) = spec
                .split_once('=')
                .ok_or_else(|| InsightError::InvalidOperation(format!("expected NAME=FILE, got '{spec}'")))?;
            Ok((name.to_string(), parse_file(path)?))
        })
        .collect()
}

fn print_table(table: &Table) {
    let mut out = ComfyTable::new();
    out.load_preset(UTF8_FULL);
    out.set_header(table.columns.iter().map(Cell::new));
    for row in table.rows.iter().take(PREVIEW_ROWS) {
        out.add_row(table.columns.iter().map(|c| Cell::new(row.get(c))));
    }
    println!("{out}");
    if table.row_count() > PREVIEW_ROWS {
        println!("({} of {} rows shown)", PREVIEW_ROWS, table.row_count());
    } else {
        println!("({} rows)", table.row_count());
    }
}

async fn run_chain(
    runner: ChainRunner,
    input: Table,
    chain: OperationChain,
    tables: HashMap<String, Table>,
) -> Result<Table, InsightError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ChainProgress>();
    let runner = runner.with_progress(tx);
    let token = runner.cancellation_token();

    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            eprintln!(
                "[{}/{}] {} -> {} rows",
                progress.step + 1,
                progress.total,
                progress.operation_name,
                progress.row_count
            );
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let handle = tokio::task::spawn_blocking(move || {
        let decision = runner.selector().choose_for_chain(&input, &chain.operations);
        if decision.is_escalated() {
            warn!(reason = %decision.reason, "no analytical backend in the CLI, running in-process");
        }
        let table = runner.run_in_process(&input, &chain.operations, &tables)?;
        info!(estimate = %decision.estimated_time(), rows = table.row_count(), "chain finished");
        Ok::<_, InsightError>(table)
    });
    let result = handle
        .await
        .map_err(|e| InsightError::InvalidOperation(format!("chain task failed: {e}")))?;

    // the sender is dropped with the runner, so the printer drains and exits
    let _ = printer.await;
    result
}

async fn execute(args: Args, config: InsightConfig) -> Result<(), InsightError> {
    let selector = EngineSelector::new(config.engine);

    match args.command {
        Command::Decide { input, chain } => {
            let table = parse_file(&input)?;
            let chain = load_chain(&chain)?;
            let decision = selector.choose_for_chain(&table, &chain.operations);
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::Run { input, chain, tables, save, tags, output } => {
            let table = parse_file(&input)?;
            let chain = load_chain(&chain)?;
            let tables = load_tables(&tables)?;
            let result = run_chain(ChainRunner::new(selector), table, chain, tables).await?;

            print_table(&result);
            if let Some(path) = output {
                fs::write(&path, serde_json::to_string_pretty(&result)?)?;
                println!("Wrote {}", path.display());
            }
            if save {
                let store = LocalStore::open(&config.data_dir)?;
                let stored = store.datasets().save_with_tags(&result, TableSource::Derived, tags)?;
                println!("Saved dataset {} (version {})", stored.id, stored.version);
            }
        }
        Command::Profile { input, no_cache } => {
            let profile = if no_cache {
                report(&parse_file(&input)?)
            } else {
                let cache = LocalStore::open(&config.data_dir)?.api_cache();
                cached_report(&cache, &input, config.cache_ttl_minutes)?
            };
            println!("{}", serde_json::to_string_pretty(&profile.statistics)?);
            println!("Quality score: {}/100", profile.quality_score);
        }
        Command::Datasets { action } => {
            let store = LocalStore::open(&config.data_dir)?;
            match action {
                DatasetAction::List => {
                    let mut out = ComfyTable::new();
                    out.load_preset(UTF8_FULL);
                    out.set_header(["id", "name", "rows", "cols", "size", "compressed", "tags", "accessed"]);
                    for d in store.datasets().list_metadata()? {
                        out.add_row([
                            d.id,
                            d.metadata.name,
                            d.metadata.row_count.to_string(),
                            d.metadata.col_count.to_string(),
                            d.metadata.size.to_string(),
                            d.metadata.compressed_size.to_string(),
                            d.metadata.tags.join(","),
                            d.last_accessed_at.to_rfc3339(),
                        ]);
                    }
                    println!("{out}");
                }
                DatasetAction::Cleanup { max_age_days } => {
                    let days = max_age_days.unwrap_or(config.dataset_max_age_days);
                    let removed = store.datasets().cleanup(days)?;
                    println!("Removed {removed} dataset(s) not accessed in {days} day(s)");
                }
            }
        }
        Command::Chains { action } => {
            let store = LocalStore::open(&config.data_dir)?;
            match action {
                ChainAction::List => {
                    let mut out = ComfyTable::new();
                    out.load_preset(UTF8_FULL);
                    out.set_header(["id", "name", "steps", "updated"]);
                    for chain in store.chains().list()? {
                        out.add_row([chain.id.clone(), chain.name.clone(), chain.len().to_string(), chain.updated_at.to_rfc3339()]);
                    }
                    println!("{out}");
                }
                ChainAction::Save { file } => {
                    let chain = load_chain(&file)?;
                    store.chains().save(&chain)?;
                    println!("Saved chain {} ({})", chain.name, chain.id);
                }
                ChainAction::Delete { id } => {
                    if store.chains().delete(&id)? {
                        println!("Deleted chain {id}");
                    } else {
                        println!("No chain with id {id}");
                    }
                }
            }
        }
        Command::Cache { action } => {
            let cache = LocalStore::open(&config.data_dir)?.api_cache();
            match action {
                CacheAction::Stats => println!("{}", serde_json::to_string_pretty(&cache.stats()?)?),
                CacheAction::Cleanup => println!("Removed {} expired entries", cache.cleanup()?),
                CacheAction::Clear => println!("Removed {} entries", cache.clear()?),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match InsightConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    // CLI flags override everything
    if let Some(dir) = &args.data_dir {
        config.data_dir.clone_from(dir);
    }
    if let Some(level) = &args.log_level {
        config.log_level.clone_from(level);
    }
    init_logging(&config.log_level);

    if let Err(e) = execute(args, config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
