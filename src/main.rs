//! metric-gc
//!
//! Maintenance tool for a hierarchical time-series metric store:
//! - list and remove series, or points inside a time window
//! - list and remove path-index entries
//! - find and remove obsolete data (no fresh samples within a threshold)
//! - find and remove path-index branches left empty

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing::{error, info, warn};

use engine::{check_stores, execute, Command, GcContext, OperationReport};
use gc_core::{GcOptions, RollupPeriod, DEFAULT_TENANT, DEFAULT_THRESHOLD_SECS};
use store_client::{
    schema, ClickHouseMetricStore, ClickHousePathStore, MetricStore, PathStore, StoresConfig,
};
use telemetry::{
    format_duration, init_tracing, BarProgress, LogFormat, LogSettings, NoopProgress,
    ProgressSink,
};

/// Garbage collector for hierarchical time-series metric stores
#[derive(Parser)]
#[command(name = "metric-gc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

impl Cli {
    fn log_settings(&self) -> LogSettings {
        LogSettings {
            verbosity: self.verbose,
            format: if self.log_json {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Remove series, or only their points between --from and --to
    RemoveMetrics(CommonArgs),
    /// Print every sample of the matching series
    ListMetrics(CommonArgs),
    /// Remove matching entries from the path index
    RemovePaths(CommonArgs),
    /// Print matching entries of the path index
    ListPaths(CommonArgs),
    /// Remove series without fresh data, their paths, and branches left empty
    RemoveObsoleteData(CommonArgs),
    /// Print series without fresh data
    ListObsoleteData(CommonArgs),
    /// Print path-index branches without leaves below them
    ListEmptyPaths(CommonArgs),
    /// Remove path-index branches without leaves below them
    RemoveEmptyPaths(CommonArgs),
}

impl Commands {
    fn split(self) -> (Command, CommonArgs) {
        match self {
            Commands::RemoveMetrics(args) => (Command::RemoveMetrics, args),
            Commands::ListMetrics(args) => (Command::ListMetrics, args),
            Commands::RemovePaths(args) => (Command::RemovePaths, args),
            Commands::ListPaths(args) => (Command::ListPaths, args),
            Commands::RemoveObsoleteData(args) => (Command::RemoveObsoleteData, args),
            Commands::ListObsoleteData(args) => (Command::ListObsoleteData, args),
            Commands::ListEmptyPaths(args) => (Command::ListEmptyPaths, args),
            Commands::RemoveEmptyPaths(args) => (Command::RemoveEmptyPaths, args),
        }
    }
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Path patterns (`*`, `?`, `{a,b}` and `[a-z]` are supported)
    #[arg(required = true)]
    paths: Vec<String>,

    /// Tenant
    #[arg(short, long, default_value = DEFAULT_TENANT)]
    tenant: String,

    /// Rollups as `rollup:period`, comma separated. The first one is probed for obsolescence.
    #[arg(short, long, value_delimiter = ',')]
    rollups: Vec<RollupPeriod>,

    /// Metric store URL (overrides configuration)
    #[arg(long)]
    metric_store: Option<String>,

    /// Path store URL (overrides configuration)
    #[arg(long)]
    path_store: Option<String>,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "1")]
    jobs: usize,

    /// From time (epoch seconds, inclusive)
    #[arg(long)]
    from: Option<i64>,

    /// To time (epoch seconds, inclusive)
    #[arg(long)]
    to: Option<i64>,

    /// Patterns of paths to leave alone, comma separated
    #[arg(short, long, value_delimiter = ',')]
    exclude_paths: Vec<String>,

    /// Sort output
    #[arg(long)]
    sort: bool,

    /// Obsolescence threshold in seconds
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_SECS)]
    threshold: u64,

    /// Actually delete. Without it every removal is a dry run.
    #[arg(long)]
    run: bool,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,

    /// Create databases and tables before running
    #[arg(long)]
    init_schema: bool,
}

impl CommonArgs {
    fn options(&self) -> GcOptions {
        GcOptions::new(self.tenant.clone(), self.paths.clone())
            .with_rollups(self.rollups.clone())
            .with_jobs(self.jobs)
            .with_range(self.from, self.to)
            .with_excludes(self.exclude_paths.clone())
            .with_sort(self.sort)
            .with_threshold(self.threshold)
            .with_run(self.run)
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_settings());

    let (command, args) = cli.command.split();

    if let Err(e) = run(command, args).await {
        error!(command = %command, error = %e, "Operation aborted");
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(command: Command, args: CommonArgs) -> Result<()> {
    let mut config = load_config()?;
    if let Some(url) = &args.metric_store {
        config.metric_store.url = url.clone();
    }
    if let Some(url) = &args.path_store {
        config.path_store.url = url.clone();
    }

    let options = args.options();
    if command.is_mutating() && options.is_dry_run() {
        eprintln!(
            "{}",
            "DRY RUN: nothing will be deleted. Pass --run to apply changes."
                .yellow()
                .bold()
        );
        eprintln!();
    }

    let metric_store = ClickHouseMetricStore::new(config.metric_store.clone());
    let path_store = ClickHousePathStore::new(config.path_store.clone());

    if args.init_schema {
        if let Err(e) = init_schema(&metric_store, &path_store, &config).await {
            metric_store.shutdown().await;
            path_store.shutdown().await;
            return Err(e);
        }
        info!("Schema initialized");
    }

    let progress: Arc<dyn ProgressSink> = if args.no_progress {
        Arc::new(NoopProgress)
    } else {
        Arc::new(BarProgress::new())
    };

    let metric_store: Arc<dyn MetricStore> = Arc::new(metric_store);
    let path_store: Arc<dyn PathStore> = Arc::new(path_store);
    let ctx = GcContext::new(metric_store, path_store, options).with_progress(progress);

    check_stores(&ctx).await.with_context(|| {
        format!(
            "metric store at {}, path store at {}",
            config.metric_store.url, config.path_store.url
        )
    })?;

    info!(command = %command, tenant = ctx.tenant(), dry_run = ctx.is_dry_run(), "Starting");
    let report = execute(&ctx, command)
        .await
        .with_context(|| format!("{} failed", command))?;

    print_report(&report);
    Ok(())
}

async fn init_schema(
    metric_store: &ClickHouseMetricStore,
    path_store: &ClickHousePathStore,
    config: &StoresConfig,
) -> Result<()> {
    schema::init_schema(metric_store.client(), &schema::metric_store_tables(config))
        .await
        .context("Failed to create metric store schema")?;
    schema::init_schema(path_store.client(), &schema::path_store_tables(config))
        .await
        .context("Failed to create path store schema")?;
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<StoresConfig> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&StoresConfig::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("METRIC_GC")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: StoresConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    for (prefix, store) in [
        ("METRIC_GC_METRIC_STORE", &mut config.metric_store),
        ("METRIC_GC_PATH_STORE", &mut config.path_store),
    ] {
        if let Ok(url) = std::env::var(format!("{}_URL", prefix)) {
            store.url = url;
        }
        if let Ok(database) = std::env::var(format!("{}_DATABASE", prefix)) {
            store.database = database;
        }
        if let Ok(username) = std::env::var(format!("{}_USERNAME", prefix)) {
            store.username = Some(username);
        }
        if let Ok(password) = std::env::var(format!("{}_PASSWORD", prefix)) {
            store.password = Some(password);
        }
        if let Ok(table) = std::env::var(format!("{}_TABLE", prefix)) {
            store.table = table;
        }
    }

    Ok(config)
}

fn print_report(report: &OperationReport) {
    for line in &report.lines {
        println!("{}", line);
    }

    if report.errors > 0 {
        warn!(errors = report.errors, "Finished with errors");
    }

    eprintln!();
    eprintln!("{}", report.title.bold());
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for phase in &report.phases {
        eprintln!("  {:<28} {}", format!("{}:", phase.title), phase.affected);
    }
    eprintln!("  {:<28} {}", "Processed:", report.processed);
    if report.errors > 0 {
        eprintln!("  {:<28} {}", "Errors:", report.errors.red());
    } else {
        eprintln!("  {:<28} {}", "Errors:", report.errors.green());
    }
    for unit in &report.failed {
        eprintln!("    {} {}", "failed:".red(), unit);
    }
    eprintln!("  {:<28} {}", "Duration:", format_duration(report.duration));
    if report.dry_run {
        eprintln!("  {}", "(dry run)".dimmed());
    }
}
