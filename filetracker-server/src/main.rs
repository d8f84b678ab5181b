use std::path::PathBuf;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filetracker_config::{ConfigLoad, ConfigLoader, ConfigSource, TrackerConfig};
use filetracker_core::FileTracker;
use filetracker_model::CollectionId;

mod daemon;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "filetracker-server")]
#[command(about = "Keeps per-folder change flags current through rescans and live watches")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    args: RunArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct RunArgs {
    /// Config file (TOML or JSON); overrides discovery
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Do not read a `.env` file
    #[arg(long, global = true, default_value_t = false)]
    no_env_file: bool,

    /// Reconcile every collection before resuming watchers
    #[arg(long, default_value_t = false)]
    reconcile_on_start: bool,

    /// Leave persisted watchers stopped
    #[arg(long, default_value_t = false)]
    no_resume: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the daemon (default)
    Run,
    #[command(subcommand)]
    Db(DbCommand),
    /// Run a reconciliation pass and print the counts
    Reconcile {
        /// Collection id; every collection when omitted
        #[arg(long)]
        collection: Option<i64>,
    },
    /// Print tracked file counts and watcher state
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli.args)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => daemon::run(config).await,
        Command::Db(DbCommand::Migrate) => {
            let tracker = daemon::open_tracker(&config).await?;
            info!("Database migrations applied successfully");
            tracker.context().sqlite().close().await;
            Ok(())
        }
        Command::Reconcile { collection } => {
            let tracker = daemon::open_tracker(&config).await?;
            let result = run_reconcile(&tracker, collection.map(CollectionId)).await;
            tracker.context().sqlite().close().await;
            result
        }
        Command::Status { json } => {
            let tracker = daemon::open_tracker(&config).await?;
            let result = print_status(&tracker, json).await;
            tracker.context().sqlite().close().await;
            result
        }
    }
}

fn load_runtime_config(args: &RunArgs) -> anyhow::Result<TrackerConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if args.no_env_file {
        loader = loader.without_env_file();
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(path) = &args.db_path {
        config.database.url = None;
        config.database.path = path.clone();
    }
    if args.reconcile_on_start {
        config.reconcile.on_start = true;
    }
    if args.no_resume {
        config.watch.resume_on_start = false;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    match &config.metadata.source {
        ConfigSource::Default => info!("no config file found, using defaults"),
        ConfigSource::EnvPath(path) => {
            info!(path = %path.display(), "config loaded from FILETRACKER_CONFIG_PATH")
        }
        ConfigSource::File(path) => info!(path = %path.display(), "config loaded from file"),
    }
    warnings.log();

    Ok(config)
}

async fn run_reconcile(
    tracker: &FileTracker,
    collection: Option<CollectionId>,
) -> anyhow::Result<()> {
    if let Some(id) = collection {
        let report = tracker
            .reconcile(id)
            .await
            .with_context(|| format!("reconciliation of collection {id} failed"))?;
        println!("collection {id}: {report}");
        return Ok(());
    }

    let mut failed = 0usize;
    for (id, outcome) in tracker.reconcile_all().await? {
        match outcome {
            Ok(report) => println!("collection {id}: {report}"),
            Err(err) => {
                failed += 1;
                error!(collection_id = %id, "Reconciliation failed: {err}");
                println!("collection {id}: failed ({err})");
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} collection(s) failed to reconcile");
    }
    Ok(())
}

async fn print_status(tracker: &FileTracker, json: bool) -> anyhow::Result<()> {
    let stats = tracker.statistics().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!(
        "{} collection(s), {} file(s): {} dirty, {} processed, {} deleted",
        stats.collections,
        stats.files.total,
        stats.files.dirty,
        stats.files.processed,
        stats.files.deleted
    );
    for collection in &stats.per_collection {
        let watch = if collection.is_watched() {
            "watching"
        } else {
            "idle"
        };
        println!(
            "  [{}] {} ({}) {} file(s), {} dirty, {} deleted, {watch}",
            collection.collection_id,
            collection.name,
            collection.source_folder.display(),
            collection.files.total,
            collection.files.dirty,
            collection.files.deleted,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_run() {
        let cli = Cli::try_parse_from(["filetracker-server"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.args.no_resume);
    }

    #[test]
    fn global_args_reach_subcommands() {
        let cli = Cli::try_parse_from([
            "filetracker-server",
            "reconcile",
            "--collection",
            "3",
            "--db-path",
            "/tmp/tracker.db",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Reconcile { collection: Some(3) })
        ));
        assert_eq!(cli.args.db_path, Some(PathBuf::from("/tmp/tracker.db")));
    }

    #[test]
    fn db_migrate_parses() {
        let cli = Cli::try_parse_from(["filetracker-server", "db", "migrate"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Db(DbCommand::Migrate))));
    }
}
