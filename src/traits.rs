//! Extension seams of the indexing pipeline.
//!
//! The pipeline never talks to the platform directly. Contributors are
//! queried through a [`ContributorTransport`], preference documents are
//! read through a [`DocumentSource`], inline-control payloads come from a
//! [`PayloadResolver`], and finished rows leave through an [`IndexWriter`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌─────────────────────┐
//! │ ContributorTransport │─────▶│ PreIndexDataCollector│
//! └──────────────────────┘      └──────────┬──────────┘
//!                                          ▼ PreIndexData
//! ┌──────────────────────┐      ┌─────────────────────┐
//! │ DocumentSource       │─────▶│ IndexDataConverter  │
//! │ PayloadResolver      │─────▶│                     │
//! └──────────────────────┘      └──────────┬──────────┘
//!                                          ▼ Vec<IndexData>
//!                               ┌─────────────────────┐
//!                               │ IndexWriter         │
//!                               └─────────────────────┘
//! ```
//!
//! [`FsContributors`](crate::connector_fs::FsContributors) implements the
//! first three from contributor directories on disk;
//! [`SqliteIndexWriter`](crate::sqlite_writer::SqliteIndexWriter) and
//! [`MemoryIndexWriter`](crate::memory_writer::MemoryIndexWriter) implement
//! the last.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::index_data::IndexData;
use crate::models::{ContributorInfo, IndexableXmlResource, SearchIndexableRawItem};
use crate::payload::ResultPayload;
use crate::xml_parser::PreferenceDocument;

// ═══════════════════════════════════════════════════════════════════════
// ContributorTransport
// ═══════════════════════════════════════════════════════════════════════

/// The three logical remote calls issued against each contributor.
///
/// Calls are independent and may run concurrently. Each is bounded by the
/// collector's query timeout; an `Err` or a timeout from any of them makes
/// the contributor contribute nothing for the current crawl.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use settings_search::models::{ContributorInfo, IndexableXmlResource, SearchIndexableRawItem};
/// use settings_search::traits::ContributorTransport;
///
/// struct Silent;
///
/// #[async_trait]
/// impl ContributorTransport for Silent {
///     async fn query_xml_resources(&self, _: &ContributorInfo) -> Result<Vec<IndexableXmlResource>> {
///         Ok(vec![])
///     }
///     async fn query_raw_items(&self, _: &ContributorInfo) -> Result<Vec<SearchIndexableRawItem>> {
///         Ok(vec![])
///     }
///     async fn query_non_indexable_keys(&self, _: &ContributorInfo) -> Result<Vec<String>> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait ContributorTransport: Send + Sync {
    /// Preference-screen documents the contributor wants indexed.
    async fn query_xml_resources(
        &self,
        contributor: &ContributorInfo,
    ) -> Result<Vec<IndexableXmlResource>>;

    /// Entries contributed directly as field values.
    async fn query_raw_items(
        &self,
        contributor: &ContributorInfo,
    ) -> Result<Vec<SearchIndexableRawItem>>;

    /// Keys the contributor currently wants hidden from search.
    async fn query_non_indexable_keys(&self, contributor: &ContributorInfo)
        -> Result<Vec<String>>;

    /// Keys that were indexed before but no longer exist.
    ///
    /// Only asked during a full index.
    async fn query_deleted_keys(&self, _contributor: &ContributorInfo) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// DocumentSource
// ═══════════════════════════════════════════════════════════════════════

/// Document-read primitive used by the preference parser.
pub trait DocumentSource: Send + Sync {
    /// Returns the document `resource_id` of `package`, or `None` if the
    /// contributor has no such document.
    fn open(&self, package: &str, resource_id: i32) -> Result<Option<PreferenceDocument>>;
}

// ═══════════════════════════════════════════════════════════════════════
// PayloadResolver
// ═══════════════════════════════════════════════════════════════════════

/// Looks up the inline-control payload a preference controller provides.
pub trait PayloadResolver: Send + Sync {
    fn resolve(&self, controller: &str, key: &str) -> Option<ResultPayload>;
}

/// Resolver for pipelines without inline controls.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPayloads;

impl PayloadResolver for NoPayloads {
    fn resolve(&self, _controller: &str, _key: &str) -> Option<ResultPayload> {
        None
    }
}

/// Map-backed resolver keyed by controller identifier.
#[derive(Debug, Default, Clone)]
pub struct StaticPayloadResolver {
    payloads: HashMap<String, ResultPayload>,
}

impl StaticPayloadResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, controller: impl Into<String>, payload: ResultPayload) {
        self.payloads.insert(controller.into(), payload);
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl PayloadResolver for StaticPayloadResolver {
    fn resolve(&self, controller: &str, _key: &str) -> Option<ResultPayload> {
        self.payloads.get(controller).cloned()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// IndexWriter
// ═══════════════════════════════════════════════════════════════════════

/// Durable storage for converted rows.
///
/// Each call must be applied atomically: readers never observe a
/// half-replaced index or fresh rows next to stale enabled flags.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    /// Stores one crawl cycle.
    ///
    /// A full index replaces whatever was stored before. An incremental
    /// one removes `deleted_keys`, stores `rows`, then re-applies
    /// `non_indexable_keys` to rows kept from earlier crawls: a stored row
    /// is enabled iff its source declared it enabled and its key is not
    /// listed for its package. Packages absent from the map are left
    /// untouched.
    async fn upsert(
        &self,
        rows: &[IndexData],
        deleted_keys: &BTreeSet<String>,
        non_indexable_keys: &BTreeMap<String, BTreeSet<String>>,
        is_full_index: bool,
    ) -> Result<()>;
}
