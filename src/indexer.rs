//! Crawl orchestration.
//!
//! A crawl is collect → convert → write. [`index_once`] runs one cycle
//! against any transport and writer; [`run_crawl`] wires it to the
//! filesystem contributors and the SQLite index, and decides whether the
//! cycle must rebuild the index from scratch.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::collector::{PreIndexDataCollector, TrustPolicy};
use crate::config::Config;
use crate::connector_fs::FsContributors;
use crate::converter::IndexDataConverter;
use crate::db;
use crate::migrate;
use crate::models::ContributorInfo;
use crate::sqlite_writer::{IndexFingerprint, SqliteIndexWriter};
use crate::traits::IndexWriter;

/// Counters describing one crawl cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub is_full_index: bool,
    pub contributors: usize,
    pub trusted: usize,
    /// Resources and raw items collected.
    pub entries: usize,
    pub rows: usize,
    pub disabled_rows: usize,
    pub deleted_keys: usize,
}

/// Runs one crawl cycle and hands the rows to `writer`.
///
/// On an incremental cycle the enabled flags of rows stored by earlier
/// cycles are reconciled with the freshly collected non-indexable keys,
/// in the same write as the new rows.
pub async fn index_once(
    collector: &PreIndexDataCollector,
    converter: &IndexDataConverter<'_>,
    writer: &dyn IndexWriter,
    contributors: &[ContributorInfo],
    is_full_index: bool,
) -> Result<CrawlReport> {
    let data = collector.collect(contributors, is_full_index).await;
    let rows = converter.convert(&data);

    writer
        .upsert(
            &rows,
            &data.data_to_delete,
            &data.non_indexable_keys,
            is_full_index,
        )
        .await?;

    let report = CrawlReport {
        is_full_index,
        contributors: contributors.len(),
        trusted: collector.trusted(contributors).len(),
        entries: data.data_to_update.len(),
        rows: rows.len(),
        disabled_rows: rows.iter().filter(|r| !r.enabled()).count(),
        deleted_keys: data.data_to_delete.len(),
    };
    info!(
        locale = converter.locale(),
        full = report.is_full_index,
        rows = report.rows,
        disabled = report.disabled_rows,
        "crawl finished"
    );
    Ok(report)
}

pub async fn run_crawl(config: &Config, force_full: bool, dry_run: bool) -> Result<CrawlReport> {
    let fs = Arc::new(FsContributors::discover(&config.contributors)?);
    let contributors = fs.contributors();
    info!(
        root = %fs.root().display(),
        contributors = contributors.len(),
        "contributors discovered"
    );

    let collector = PreIndexDataCollector::new(
        fs.clone(),
        TrustPolicy::new(config.collector.allowlist.clone()),
    )
    .with_query_timeout(config.collector.query_timeout())
    .with_max_concurrent(config.collector.max_concurrent);
    let converter = IndexDataConverter::new(fs.as_ref(), fs.as_ref(), &config.index.locale)
        .with_locale_policy(config.index.locale_policy);

    if dry_run {
        // Preview as a full crawl; nothing is written.
        let data = collector.collect(&contributors, true).await;
        let rows = converter.convert(&data);
        let report = CrawlReport {
            is_full_index: true,
            contributors: contributors.len(),
            trusted: collector.trusted(&contributors).len(),
            entries: data.data_to_update.len(),
            rows: rows.len(),
            disabled_rows: rows.iter().filter(|r| !r.enabled()).count(),
            deleted_keys: data.data_to_delete.len(),
        };
        println!("crawl (dry-run)");
        print_report(&report);
        for row in &rows {
            println!(
                "  {:<32} {:<40} {}",
                row.key(),
                row.updated_title(),
                if row.enabled() { "enabled" } else { "disabled" }
            );
        }
        return Ok(report);
    }

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let writer = SqliteIndexWriter::new(pool);

    let fingerprint = IndexFingerprint::new(
        &config.index.locale,
        &config.index.build_fingerprint,
        &contributors,
    );
    let is_full_index = force_full || writer.needs_full_index(&fingerprint).await?;

    let report = index_once(&collector, &converter, &writer, &contributors, is_full_index).await?;
    writer.mark_indexed(&fingerprint).await?;

    println!(
        "crawl {}",
        if report.is_full_index {
            "full"
        } else {
            "incremental"
        }
    );
    print_report(&report);
    println!("ok");

    writer.pool().close().await;
    Ok(report)
}

fn print_report(report: &CrawlReport) {
    println!(
        "  contributors: {} ({} trusted)",
        report.contributors, report.trusted
    );
    println!("  entries collected: {}", report.entries);
    println!("  rows: {} ({} disabled)", report.rows, report.disabled_rows);
    println!("  deleted keys: {}", report.deleted_keys);
}
