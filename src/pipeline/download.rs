// src/pipeline/download.rs

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{error, info, instrument, warn};

use crate::codes::ChunkPlan;
use crate::config::{Config, GeoLevel};
use crate::fetch::{urls::request_url, TableSource};
use crate::process::{csv_io, naming, Layout};

/// What happened to one chunk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Written { path: PathBuf, rows: usize },
    /// Valid response without data rows.
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    pub index: usize,
    pub outcome: ChunkOutcome,
}

/// Timing and chunk outcomes of one (table, geography, year) unit.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub table: String,
    pub geo: String,
    pub year: u16,
    pub num_chunks: usize,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub chunks: Vec<ChunkReport>,
}

impl DownloadReport {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished - self.started
    }

    pub fn written(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c.outcome, ChunkOutcome::Written { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c.outcome, ChunkOutcome::Failed(_)))
            .count()
    }
}

/// Download every chunk of one unit, one request at a time.
///
/// Failures are logged and recorded per chunk; they never stop the remaining chunks.
#[instrument(level = "info", skip(config, source, dir, geo), fields(geo = %geo.file_name_segment))]
pub async fn download_unit<S: TableSource>(
    config: &Config,
    source: &S,
    table_name: &str,
    geo: &GeoLevel,
    year: u16,
    dir: PathBuf,
) -> DownloadReport {
    let started = Utc::now();
    let mut report = DownloadReport {
        table: table_name.to_string(),
        geo: geo.file_name_segment.clone(),
        year,
        num_chunks: 0,
        started,
        finished: started,
        chunks: Vec::new(),
    };

    let plan = match ChunkPlan::new(config, table_name, Some(year)) {
        Ok(p) => p,
        Err(e) => {
            error!(table = table_name, year, error = %e, "planning failed");
            report.finished = Utc::now();
            return report;
        }
    };
    report.num_chunks = plan.num_chunks();
    if report.num_chunks == 0 {
        warn!(table = table_name, year, "no active variables; nothing to request");
    }

    for index in 0..plan.num_chunks() {
        info!(table = table_name, year, chunk = index + 1, of = plan.num_chunks(), "requesting chunk");
        let outcome = fetch_chunk(config, source, &plan, geo, year, index, &dir).await;
        match &outcome {
            ChunkOutcome::Written { path, rows } => {
                info!(table = table_name, year, chunk = index, rows, path = %path.display(), "wrote chunk")
            }
            ChunkOutcome::Empty => {
                warn!(table = table_name, year, chunk = index, "empty result; chunk skipped")
            }
            ChunkOutcome::Failed(reason) => {
                error!(table = table_name, year, chunk = index, error = %reason, "chunk failed; skipped")
            }
        }
        report.chunks.push(ChunkReport { index, outcome });
    }

    report.finished = Utc::now();
    report
}

async fn fetch_chunk<S: TableSource>(
    config: &Config,
    source: &S,
    plan: &ChunkPlan<'_>,
    geo: &GeoLevel,
    year: u16,
    index: usize,
    dir: &Path,
) -> ChunkOutcome {
    let columns = match plan.chunk_columns(index) {
        Ok(c) => c,
        Err(e) => return ChunkOutcome::Failed(e.to_string()),
    };
    let url = match request_url(config, plan.table(), geo, year, &columns) {
        Ok(u) => u,
        Err(e) => return ChunkOutcome::Failed(format!("{e:#}")),
    };
    let table = match source.get_table(&url).await {
        Ok(Some(t)) if !t.is_empty() => t,
        Ok(_) => return ChunkOutcome::Empty,
        Err(e) => return ChunkOutcome::Failed(e.to_string()),
    };

    let name = naming::chunk_file_name(
        &config.constants.file_name_prefix,
        &plan.table().name,
        &geo.file_name_segment,
        year,
        index,
    );
    let path = dir.join(name);
    let rows = table.rows.len();
    // offload the csv write to the blocking pool
    let write = tokio::task::spawn_blocking({
        let path = path.clone();
        move || csv_io::write_table(&path, &table)
    })
    .await;
    match write {
        Ok(Ok(())) => ChunkOutcome::Written { path, rows },
        Ok(Err(e)) => ChunkOutcome::Failed(format!("{e:#}")),
        Err(e) => ChunkOutcome::Failed(e.to_string()),
    }
}

/// Download every table × geography × year × chunk.
///
/// Units run concurrently up to `constants.concurrency`; this returns only after
/// every unit has finished, so reassembly can start safely afterwards.
#[instrument(level = "info", skip_all)]
pub async fn download_all<S>(config: Arc<Config>, source: Arc<S>, layout: &Layout) -> Result<Vec<DownloadReport>>
where
    S: TableSource + Send + Sync + 'static,
{
    let sem = Arc::new(Semaphore::new(config.constants.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for table in &config.tables {
        // planning errors abort this table only
        if let Some(e) = config
            .years()
            .find_map(|year| ChunkPlan::new(&config, &table.name, Some(year)).err())
        {
            error!(table = %table.name, error = %e, "skipping table");
            continue;
        }

        let dir = layout.raw_dir(&table.name);
        csv_io::prepare_and_clean_dir(&dir)?;

        for geo in &config.geo_levels {
            for year in config.years() {
                let config = Arc::clone(&config);
                let source = Arc::clone(&source);
                let sem = Arc::clone(&sem);
                let table_name = table.name.clone();
                let geo = geo.clone();
                let dir = dir.clone();
                tasks.spawn(async move {
                    let _permit = sem.acquire_owned().await.ok();
                    download_unit(&config, source.as_ref(), &table_name, &geo, year, dir).await
                });
            }
        }
    }

    let mut reports = Vec::new();
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(report) => {
                info!(
                    table = %report.table,
                    geo = %report.geo,
                    year = report.year,
                    written = report.written(),
                    failed = report.failed(),
                    chunks = report.num_chunks,
                    elapsed_ms = report.elapsed().num_milliseconds(),
                    "unit done"
                );
                reports.push(report);
            }
            Err(e) => error!("download task failed: {}", e),
        }
    }
    reports.sort_by(|a, b| (&a.table, &a.geo, a.year).cmp(&(&b.table, &b.geo, b.year)));
    Ok(reports)
}
