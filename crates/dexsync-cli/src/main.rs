use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dexsync_client::{ApiClient, DEFAULT_BASE_URL};
use dexsync_core::{Kind, SyncError};
use dexsync_engine::Reconciler;
use dexsync_store_sqlite::SqliteStore;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dexsync")]
#[command(about = "Reference-data ingestion for a local dex database")]
struct Cli {
    #[arg(long, default_value = "./dexsync.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    /// Reconcile records (and everything they reference) from the upstream API.
    Sync(SyncArgs),
    /// Bulk-load the snapshot-only kinds from a directory of CSV files.
    LoadCsv(LoadCsvArgs),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate(DbMigrateArgs),
}

#[derive(Debug, Args)]
struct DbMigrateArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct SyncArgs {
    #[arg(value_enum)]
    kind: KindArg,
    #[arg(long = "id")]
    ids: Vec<i64>,
    /// Species name already present in the local database.
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    api_base: String,
    /// Minimum milliseconds between upstream requests.
    #[arg(long, default_value_t = 1000)]
    rate_ms: u64,
}

#[derive(Debug, Args)]
struct LoadCsvArgs {
    #[arg(long)]
    dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Language,
    EggGroup,
    Color,
    Shape,
    Habitat,
    GrowthRate,
    Species,
    Pokemon,
    Type,
    Ability,
    Move,
    Item,
    Location,
    EvolutionTrigger,
    EvolutionChain,
}

impl KindArg {
    fn into_kind(self) -> Kind {
        match self {
            Self::Language => Kind::Language,
            Self::EggGroup => Kind::EggGroup,
            Self::Color => Kind::Color,
            Self::Shape => Kind::Shape,
            Self::Habitat => Kind::Habitat,
            Self::GrowthRate => Kind::GrowthRate,
            Self::Species => Kind::Species,
            Self::Pokemon => Kind::Pokemon,
            Self::Type => Kind::Type,
            Self::Ability => Kind::Ability,
            Self::Move => Kind::Move,
            Self::Item => Kind::Item,
            Self::Location => Kind::Location,
            Self::EvolutionTrigger => Kind::EvolutionTrigger,
            Self::EvolutionChain => Kind::EvolutionChain,
        }
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = SqliteStore::open(&cli.db)?;
    match cli.command {
        Command::Db { command } => run_db(&command, store),
        Command::Sync(args) => run_sync(&args, store),
        Command::LoadCsv(args) => run_load_csv(&args, store),
    }
}

fn run_db(command: &DbCommand, mut store: SqliteStore) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => {
            let status = store.schema_status()?;
            emit_json(serde_json::json!({
                "current_version": status.current_version,
                "target_version": status.target_version,
                "pending_versions": status.pending_versions,
                "up_to_date": status.pending_versions.is_empty()
            }))
        }
        DbCommand::Migrate(args) => {
            let before = store.schema_status()?;
            if args.dry_run {
                return emit_json(serde_json::json!({
                    "dry_run": true,
                    "current_version": before.current_version,
                    "target_version": before.target_version,
                    "would_apply_versions": before.pending_versions
                }));
            }
            store.migrate()?;
            let after = store.schema_status()?;
            emit_json(serde_json::json!({
                "dry_run": false,
                "before_version": before.current_version,
                "applied_versions": before.pending_versions,
                "after_version": after.current_version,
                "up_to_date": after.pending_versions.is_empty()
            }))
        }
    }
}

fn run_sync(args: &SyncArgs, mut store: SqliteStore) -> Result<()> {
    store.migrate()?;
    let kind = args.kind.into_kind();

    let mut api_ids = args.ids.clone();
    if let Some(name) = args.name.as_deref() {
        if kind != Kind::Species {
            return Err(anyhow!("--name is only supported for species"));
        }
        let species = store.species_by_name(name)?.ok_or_else(|| {
            anyhow!("no species named '{name}' in the local database; sync it by id first")
        })?;
        api_ids.push(species.api_id);
    }
    if api_ids.is_empty() {
        return Err(anyhow!("nothing to sync; pass --id or --name"));
    }

    let client = ApiClient::new(args.api_base.clone(), Duration::from_millis(args.rate_ms));
    let mut rec = Reconciler::new(store, client);
    let mut synced = Vec::new();
    let mut not_found = Vec::new();
    for api_id in api_ids {
        match rec.sync(kind, api_id) {
            Ok(id) => synced.push(serde_json::json!({"api_id": api_id, "id": id})),
            Err(SyncError::NotFound { .. }) => not_found.push(api_id),
            Err(err) => return Err(err.into()),
        }
    }

    emit_json(serde_json::json!({
        "kind": kind.to_string(),
        "synced": synced,
        "not_found": not_found
    }))
}

fn run_load_csv(args: &LoadCsvArgs, mut store: SqliteStore) -> Result<()> {
    store.migrate()?;
    let mut rec = Reconciler::new(store, ApiClient::default());
    let summary = rec.load_csv_dir(&args.dir)?;
    emit_json(serde_json::to_value(&summary).context("failed to serialize load summary")?)
}
