//! SQLite-backed [`IndexWriter`] and crawl-state bookkeeping.
//!
//! Rows live in `prefs_index` keyed by [`IndexData::doc_id`]. Rows that
//! link to a child screen also add a `site_map` edge from the hosting class
//! to the child. `index_meta` remembers what the last completed crawl was
//! built against so the next one can decide between full and incremental.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::index_data::IndexData;
use crate::models::ContributorInfo;
use crate::traits::IndexWriter;

/// What an index was built against. Any difference forces a full index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFingerprint {
    pub locale: String,
    pub build: String,
    /// Sorted, comma-joined `authority:version` of every contributor.
    pub providers: String,
}

impl IndexFingerprint {
    pub fn new(
        locale: impl Into<String>,
        build: impl Into<String>,
        contributors: &[ContributorInfo],
    ) -> Self {
        let mut providers: Vec<String> =
            contributors.iter().map(ContributorInfo::versioned_name).collect();
        providers.sort();
        Self {
            locale: locale.into(),
            build: build.into(),
            providers: providers.join(","),
        }
    }
}

pub struct SqliteIndexWriter {
    pool: SqlitePool,
}

impl SqliteIndexWriter {
    /// Expects a pool on which the schema has already been applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn stored_fingerprint(&self) -> Result<Option<IndexFingerprint>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT locale, build_fingerprint, providers FROM index_meta WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(locale, build, providers)| IndexFingerprint {
            locale,
            build,
            providers,
        }))
    }

    pub async fn needs_full_index(&self, fingerprint: &IndexFingerprint) -> Result<bool> {
        let stored = self.stored_fingerprint().await?;
        Ok(stored.as_ref() != Some(fingerprint))
    }

    /// Records `fingerprint` as the state of the current index.
    pub async fn mark_indexed(&self, fingerprint: &IndexFingerprint) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO index_meta (id, locale, build_fingerprint, providers, indexed_at)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                locale = excluded.locale,
                build_fingerprint = excluded.build_fingerprint,
                providers = excluded.providers,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&fingerprint.locale)
        .bind(&fingerprint.build)
        .bind(&fingerprint.providers)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IndexWriter for SqliteIndexWriter {
    async fn upsert(
        &self,
        rows: &[IndexData],
        deleted_keys: &BTreeSet<String>,
        non_indexable_keys: &BTreeMap<String, BTreeSet<String>>,
        is_full_index: bool,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if is_full_index {
            sqlx::query("DELETE FROM prefs_index").execute(&mut *tx).await?;
            sqlx::query("DELETE FROM site_map").execute(&mut *tx).await?;
        }

        for key in deleted_keys {
            sqlx::query("DELETE FROM prefs_index WHERE data_key_ref = ?")
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        let mut written = 0usize;
        for row in rows {
            if row.normalized_title().is_empty() {
                continue;
            }

            sqlx::query(
                r#"
                INSERT OR REPLACE INTO prefs_index (
                    doc_id, locale, data_title, data_title_normalized,
                    data_summary_on, data_summary_on_normalized,
                    data_summary_off, data_summary_off_normalized,
                    data_entries, data_keywords, class_name, screen_title, package,
                    icon, rank, intent_action, intent_target_package, intent_target_class,
                    source_enabled, enabled, data_key_ref, user_id, payload_type, payload
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.doc_id())
            .bind(row.locale())
            .bind(row.updated_title())
            .bind(row.normalized_title())
            .bind(row.updated_summary_on())
            .bind(row.normalized_summary_on())
            .bind(row.updated_summary_off())
            .bind(row.normalized_summary_off())
            .bind(row.entries())
            .bind(row.space_delimited_keywords())
            .bind(row.class_name())
            .bind(row.screen_title())
            .bind(row.package_name())
            .bind(row.icon_res_id())
            .bind(row.rank())
            .bind(row.intent_action())
            .bind(row.intent_target_package())
            .bind(row.intent_target_class())
            .bind(row.source_enabled())
            .bind(row.enabled())
            .bind(row.key())
            .bind(row.user_id())
            .bind(row.payload_type().code())
            .bind(row.payload())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to store row '{}'", row.key()))?;
            written += 1;

            if let (Some(parent), Some(child)) = (row.class_name(), row.child_class_name()) {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO site_map (parent_class, parent_title, child_class, child_title)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(parent)
                .bind(row.screen_title().unwrap_or_default())
                .bind(child)
                .bind(row.updated_title())
                .execute(&mut *tx)
                .await?;
            }
        }

        let flipped = if is_full_index {
            0
        } else {
            reconcile_enabled(&mut *tx, non_indexable_keys).await?
        };

        tx.commit().await?;
        debug!(
            written,
            skipped = rows.len() - written,
            deleted = deleted_keys.len(),
            flipped,
            is_full_index,
            "index rows stored"
        );
        Ok(())
    }
}

/// Re-applies suppression to every stored row of a listed package.
/// Returns the number of rows whose flag changed.
async fn reconcile_enabled(
    conn: &mut SqliteConnection,
    non_indexable_keys: &BTreeMap<String, BTreeSet<String>>,
) -> Result<usize> {
    let stored: Vec<(String, Option<String>, String, bool, bool)> = sqlx::query_as(
        "SELECT doc_id, package, data_key_ref, source_enabled, enabled FROM prefs_index",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut flipped = 0usize;
    for (doc_id, package, key, source_enabled, enabled) in stored {
        let Some(keys) = package.as_deref().and_then(|p| non_indexable_keys.get(p)) else {
            continue;
        };
        let wanted = source_enabled && !keys.contains(&key);
        if wanted != enabled {
            sqlx::query("UPDATE prefs_index SET enabled = ? WHERE doc_id = ?")
                .bind(wanted)
                .bind(&doc_id)
                .execute(&mut *conn)
                .await?;
            flipped += 1;
        }
    }
    Ok(flipped)
}
