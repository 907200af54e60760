use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates the index schema on `pool`. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // One row per indexed setting
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prefs_index (
            doc_id TEXT PRIMARY KEY,
            locale TEXT NOT NULL,
            data_title TEXT NOT NULL,
            data_title_normalized TEXT NOT NULL,
            data_summary_on TEXT NOT NULL DEFAULT '',
            data_summary_on_normalized TEXT NOT NULL DEFAULT '',
            data_summary_off TEXT NOT NULL DEFAULT '',
            data_summary_off_normalized TEXT NOT NULL DEFAULT '',
            data_entries TEXT,
            data_keywords TEXT NOT NULL DEFAULT '',
            class_name TEXT,
            screen_title TEXT,
            package TEXT,
            icon INTEGER NOT NULL DEFAULT 0,
            rank INTEGER NOT NULL DEFAULT 0,
            intent_action TEXT,
            intent_target_package TEXT,
            intent_target_class TEXT,
            source_enabled INTEGER NOT NULL DEFAULT 1,
            enabled INTEGER NOT NULL DEFAULT 1,
            data_key_ref TEXT NOT NULL,
            user_id INTEGER NOT NULL DEFAULT -1,
            payload_type INTEGER NOT NULL DEFAULT 0,
            payload BLOB
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Parent screen → child screen links
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS site_map (
            parent_class TEXT NOT NULL,
            parent_title TEXT NOT NULL DEFAULT '',
            child_class TEXT NOT NULL,
            child_title TEXT NOT NULL DEFAULT '',
            UNIQUE(parent_class, child_class)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // State of the last completed crawl (single row)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            locale TEXT NOT NULL,
            build_fingerprint TEXT NOT NULL,
            providers TEXT NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_prefs_key ON prefs_index(data_key_ref)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_prefs_package ON prefs_index(package)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_prefs_title ON prefs_index(data_title_normalized)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
