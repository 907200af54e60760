//! In-memory [`IndexWriter`] with the same semantics as the SQLite writer.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use crate::index_data::IndexData;
use crate::traits::IndexWriter;

#[derive(Debug, Default)]
pub struct MemoryIndexWriter {
    rows: RwLock<Vec<IndexData>>,
}

impl MemoryIndexWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored rows, in first-insertion order.
    pub async fn rows(&self) -> Vec<IndexData> {
        self.rows.read().await.clone()
    }

    pub async fn find(&self, key: &str) -> Option<IndexData> {
        self.rows.read().await.iter().find(|r| r.key() == key).cloned()
    }
}

#[async_trait]
impl IndexWriter for MemoryIndexWriter {
    async fn upsert(
        &self,
        rows: &[IndexData],
        deleted_keys: &BTreeSet<String>,
        non_indexable_keys: &BTreeMap<String, BTreeSet<String>>,
        is_full_index: bool,
    ) -> Result<()> {
        let mut stored = self.rows.write().await;
        if is_full_index {
            stored.clear();
        }
        stored.retain(|row| !deleted_keys.contains(row.key()));

        for row in rows.iter().filter(|r| !r.normalized_title().is_empty()) {
            let doc_id = row.doc_id();
            match stored.iter_mut().find(|r| r.doc_id() == doc_id) {
                Some(slot) => *slot = row.clone(),
                None => stored.push(row.clone()),
            }
        }

        if !is_full_index {
            for row in stored.iter_mut() {
                if let Some(keys) = row.package_name().and_then(|p| non_indexable_keys.get(p)) {
                    let suppressed = keys.contains(row.key());
                    row.set_suppressed(suppressed);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, title: &str) -> IndexData {
        IndexData::builder()
            .key(key.to_string())
            .title(title.to_string())
            .package_name("com.example".to_string())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_index_replaces_everything() {
        let writer = MemoryIndexWriter::new();
        writer
            .upsert(&[row("a", "Alpha")], &BTreeSet::new(), &BTreeMap::new(), true)
            .await
            .unwrap();
        writer
            .upsert(&[row("b", "Beta")], &BTreeSet::new(), &BTreeMap::new(), true)
            .await
            .unwrap();
        let keys: Vec<_> = writer.rows().await.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(keys, vec!["b"]);
    }

    #[tokio::test]
    async fn test_incremental_upsert_replaces_same_row() {
        let writer = MemoryIndexWriter::new();
        let rows = [row("a", "Alpha"), row("b", "Beta")];
        writer.upsert(&rows, &BTreeSet::new(), &BTreeMap::new(), false).await.unwrap();
        writer.upsert(&rows[..1], &BTreeSet::new(), &BTreeMap::new(), false).await.unwrap();
        assert_eq!(writer.rows().await.len(), 2);
    }

    #[tokio::test]
    async fn test_deleted_keys_removed() {
        let writer = MemoryIndexWriter::new();
        writer
            .upsert(
                &[row("a", "Alpha"), row("b", "Beta")],
                &BTreeSet::new(),
                &BTreeMap::new(),
                false,
            )
            .await
            .unwrap();
        let deleted = BTreeSet::from(["a".to_string()]);
        writer.upsert(&[], &deleted, &BTreeMap::new(), false).await.unwrap();
        assert!(writer.find("a").await.is_none());
        assert!(writer.find("b").await.is_some());
    }

    #[tokio::test]
    async fn test_rows_without_searchable_title_skipped() {
        let writer = MemoryIndexWriter::new();
        writer
            .upsert(&[row("dash", "---")], &BTreeSet::new(), &BTreeMap::new(), false)
            .await
            .unwrap();
        assert!(writer.rows().await.is_empty());
    }

    #[tokio::test]
    async fn test_incremental_upsert_reconciles_stored_rows() {
        let writer = MemoryIndexWriter::new();
        let off_at_source = IndexData::builder()
            .key("c".to_string())
            .title("Gamma".to_string())
            .package_name("com.example".to_string())
            .enabled(false)
            .build()
            .unwrap();
        writer
            .upsert(
                &[row("a", "Alpha"), row("b", "Beta"), off_at_source],
                &BTreeSet::new(),
                &BTreeMap::new(),
                true,
            )
            .await
            .unwrap();

        let mut keys = BTreeMap::new();
        keys.insert("com.example".to_string(), BTreeSet::from(["a".to_string()]));
        writer.upsert(&[], &BTreeSet::new(), &keys, false).await.unwrap();
        assert!(!writer.find("a").await.unwrap().enabled());
        assert!(writer.find("b").await.unwrap().enabled());
        assert!(!writer.find("c").await.unwrap().enabled());

        // An empty list re-enables, but never past the source's own flag.
        keys.insert("com.example".to_string(), BTreeSet::new());
        writer.upsert(&[], &BTreeSet::new(), &keys, false).await.unwrap();
        assert!(writer.find("a").await.unwrap().enabled());
        assert!(!writer.find("c").await.unwrap().enabled());

        // Packages missing from the map are left alone.
        keys.clear();
        keys.insert("com.other".to_string(), BTreeSet::from(["b".to_string()]));
        writer.upsert(&[], &BTreeSet::new(), &keys, false).await.unwrap();
        assert!(writer.find("b").await.unwrap().enabled());
    }

    #[tokio::test]
    async fn test_full_index_does_not_reconcile() {
        let writer = MemoryIndexWriter::new();
        let mut keys = BTreeMap::new();
        keys.insert("com.example".to_string(), BTreeSet::from(["a".to_string()]));
        writer
            .upsert(&[row("a", "Alpha")], &BTreeSet::new(), &keys, true)
            .await
            .unwrap();
        // Rows arrive already converted; a full index stores them as given.
        assert!(writer.find("a").await.unwrap().enabled());
    }
}
