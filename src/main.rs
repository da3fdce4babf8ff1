use anyhow::{Context, Result};
use censusscraper::{
    codes::build_column_mapping,
    config::Config,
    fetch::CensusClient,
    pipeline::{download_all, load_all, transform_all},
    process::Layout,
    store::Store,
};
use clap::{Parser, ValueEnum};
use std::{path::PathBuf, sync::Arc};
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    All,
    Download,
    Transform,
    Load,
}

impl Stage {
    fn includes(self, other: Stage) -> bool {
        self == Stage::All || self == other
    }
}

/// Download census tables in chunks, rebuild them and load them into SQLite.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// YAML file describing tables, variables, geographies and years.
    #[arg(long)]
    config: PathBuf,

    /// Root for `raw/` and `processed/` folders.
    #[arg(long, default_value = "data")]
    data_root: PathBuf,

    #[arg(long, default_value = "census.db")]
    database: PathBuf,

    #[arg(long, value_enum, default_value_t = Stage::All)]
    stage: Stage,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    info!(?args, "startup");

    // ─── 2) load config & build the reverse mapping ──────────────────
    let config = Arc::new(
        Config::load(&args.config)
            .with_context(|| format!("loading config {}", args.config.display()))?,
    );
    let mapping = build_column_mapping(&config)?;
    info!(codes = mapping.len(), "column mapping ready");
    let layout = Layout::new(&args.data_root);
    let start = Instant::now();

    // ─── 3) download every chunk ─────────────────────────────────────
    if args.stage.includes(Stage::Download) {
        let client = Arc::new(CensusClient::new(&config.constants)?);
        let reports = download_all(Arc::clone(&config), client, &layout).await?;
        let written: usize = reports.iter().map(|r| r.written()).sum();
        let failed: usize = reports.iter().map(|r| r.failed()).sum();
        info!(units = reports.len(), written, failed, "download stage done");
        if failed > 0 {
            warn!(failed, "some chunks failed; their columns will be missing");
        }
    }

    // ─── 4) reassemble, rename & consolidate ─────────────────────────
    if args.stage.includes(Stage::Transform) {
        let outputs = tokio::task::spawn_blocking({
            let config = Arc::clone(&config);
            let layout = layout.clone();
            move || transform_all(&config, &mapping, &layout)
        })
        .await??;
        info!(files = outputs.len(), "transform stage done");
    }

    // ─── 5) load consolidated tables ─────────────────────────────────
    if args.stage.includes(Stage::Load) {
        let rows = tokio::task::spawn_blocking({
            let config = Arc::clone(&config);
            let layout = layout.clone();
            let database = args.database.clone();
            move || -> Result<usize> {
                let mut store = Store::open(&database)?;
                load_all(&config, &layout, &mut store)
            }
        })
        .await??;
        info!(rows, database = %args.database.display(), "load stage done");
    }

    info!(elapsed = ?start.elapsed(), "all done");
    Ok(())
}
