//! Index statistics.
//!
//! Summarizes what the last crawls left in the database: row counts,
//! how many rows are disabled, a per-package breakdown, and the state the
//! index was built against. Used by `sidx stats`.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::payload::PayloadType;

/// Per-package breakdown of stored rows.
struct PackageStats {
    package: String,
    rows: i64,
    disabled: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let total_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prefs_index")
        .fetch_one(&pool)
        .await?;

    let disabled_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM prefs_index WHERE enabled = 0")
            .fetch_one(&pool)
            .await?;

    let inline_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM prefs_index WHERE payload_type = ?")
            .bind(PayloadType::InlineSwitch.code())
            .fetch_one(&pool)
            .await?;

    let site_map_edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM site_map")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Settings Search: Index Stats");
    println!("=============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Rows:        {}", total_rows);
    println!("  Disabled:    {}", disabled_rows);
    println!("  Inline:      {}", inline_rows);
    println!("  Site map:    {} edges", site_map_edges);

    let meta = sqlx::query(
        "SELECT locale, build_fingerprint, providers, indexed_at FROM index_meta WHERE id = 1",
    )
    .fetch_optional(&pool)
    .await?;

    println!();
    match meta {
        Some(row) => {
            let providers: String = row.get("providers");
            println!("  Locale:      {}", row.get::<String, _>("locale"));
            println!("  Build:       {}", row.get::<String, _>("build_fingerprint"));
            println!(
                "  Providers:   {}",
                if providers.is_empty() { 0 } else { providers.split(',').count() }
            );
            println!(
                "  Indexed:     {}",
                format_ts_relative(row.get::<i64, _>("indexed_at"))
            );
        }
        None => println!("  Indexed:     never"),
    }

    // Per-package breakdown
    let package_rows = sqlx::query(
        r#"
        SELECT
            COALESCE(package, '') AS package,
            COUNT(*) AS row_count,
            SUM(CASE WHEN enabled = 0 THEN 1 ELSE 0 END) AS disabled_count
        FROM prefs_index
        GROUP BY package
        ORDER BY row_count DESC, package
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let package_stats: Vec<PackageStats> = package_rows
        .iter()
        .map(|row| PackageStats {
            package: row.get("package"),
            rows: row.get("row_count"),
            disabled: row.get("disabled_count"),
        })
        .collect();

    if !package_stats.is_empty() {
        println!();
        println!("  By package:");
        println!("  {:<40} {:>6} {:>9}", "PACKAGE", "ROWS", "DISABLED");
        println!("  {}", "-".repeat(57));
        for s in &package_stats {
            println!("  {:<40} {:>6} {:>9}", s.package, s.rows, s.disabled);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }
    match delta {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{} min ago", delta / 60),
        3600..=86399 => format!("{} h ago", delta / 3600),
        _ => format_ts_iso(ts),
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_ts_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 120), "2 min ago");
        assert_eq!(format_ts_relative(0), "1970-01-01 00:00");
    }
}
