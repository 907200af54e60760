//! Pre-index data collection.
//!
//! The collector is the only component that talks to contributors. For
//! every trusted [`ContributorInfo`] it issues the transport queries
//! concurrently, each bounded by a timeout, and folds the answers into one
//! [`PreIndexData`]:
//!
//! ```text
//! contributors ──▶ TrustPolicy ──▶ JoinSet (≤ max_concurrent)
//!                                    │  per contributor: try_join!(
//!                                    │    xml_resources, raw_items,
//!                                    │    non_indexable_keys,
//!                                    │    deleted_keys [full index only])
//!                                    ▼
//!                          merge in input order ──▶ PreIndexData
//! ```
//!
//! A contributor that fails any query, times out, or panics contributes
//! nothing; the remaining contributors are unaffected.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::IndexError;
use crate::models::{
    ContributorInfo, IndexableData, IndexableXmlResource, PreIndexData, SearchIndexableRawItem,
};
use crate::traits::ContributorTransport;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Decides which discovered contributors may be queried.
///
/// A contributor is trusted when it has an authority and a package, is
/// exported, and is either platform-signed or explicitly allow-listed.
#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    allowlist: BTreeSet<String>,
}

impl TrustPolicy {
    pub fn new<I>(allowlist: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            allowlist: allowlist.into_iter().collect(),
        }
    }

    pub fn verify(&self, contributor: &ContributorInfo) -> Result<(), IndexError> {
        let trusted = !contributor.authority.is_empty()
            && !contributor.package_name.is_empty()
            && contributor.exported
            && (contributor.platform_signed || self.allowlist.contains(&contributor.package_name));
        if trusted {
            Ok(())
        } else {
            Err(IndexError::UntrustedContributor {
                authority: contributor.authority.clone(),
            })
        }
    }

    pub fn is_trusted(&self, contributor: &ContributorInfo) -> bool {
        self.verify(contributor).is_ok()
    }
}

/// Everything one contributor answered.
#[derive(Debug, Default)]
struct ContributorHarvest {
    xml_resources: Vec<IndexableXmlResource>,
    raw_items: Vec<SearchIndexableRawItem>,
    non_indexable_keys: Vec<String>,
    deleted_keys: Vec<String>,
}

pub struct PreIndexDataCollector {
    transport: Arc<dyn ContributorTransport>,
    trust: TrustPolicy,
    query_timeout: Duration,
    max_concurrent: usize,
}

impl PreIndexDataCollector {
    pub fn new(transport: Arc<dyn ContributorTransport>, trust: TrustPolicy) -> Self {
        Self {
            transport,
            trust,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// The subset of `contributors` that passes the trust check, in order.
    pub fn trusted<'c>(&self, contributors: &'c [ContributorInfo]) -> Vec<&'c ContributorInfo> {
        contributors
            .iter()
            .filter(|contributor| match self.trust.verify(contributor) {
                Ok(()) => true,
                Err(e) => {
                    debug!(authority = %contributor.authority, "{}", e);
                    false
                }
            })
            .collect()
    }

    /// Queries every trusted contributor and aggregates the answers.
    ///
    /// Deleted keys are only asked for when `is_full_index` is set.
    /// Dropping the returned future aborts all in-flight queries.
    pub async fn collect(
        &self,
        contributors: &[ContributorInfo],
        is_full_index: bool,
    ) -> PreIndexData {
        let trusted: Vec<ContributorInfo> =
            self.trusted(contributors).into_iter().cloned().collect();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (slot, contributor) in trusted.iter().cloned().enumerate() {
            let transport = Arc::clone(&self.transport);
            let semaphore = Arc::clone(&semaphore);
            let query_timeout = self.query_timeout;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let harvest =
                    harvest(transport.as_ref(), &contributor, query_timeout, is_full_index).await;
                (slot, harvest)
            });
        }

        let mut harvests: Vec<Option<ContributorHarvest>> =
            (0..trusted.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, Ok(harvest))) => harvests[slot] = Some(harvest),
                Ok((_, Err(e))) => warn!("{}", e),
                Err(e) => warn!(error = %e, "contributor task did not complete"),
            }
        }

        let mut data = PreIndexData::default();
        let mut answered = 0usize;
        for (contributor, harvest) in trusted.iter().zip(harvests) {
            let Some(harvest) = harvest else { continue };
            answered += 1;
            merge(&mut data, contributor, harvest);
        }

        info!(
            trusted = trusted.len(),
            answered,
            entries = data.data_to_update.len(),
            deleted = data.data_to_delete.len(),
            "collected pre-index data"
        );
        data
    }
}

async fn harvest(
    transport: &dyn ContributorTransport,
    contributor: &ContributorInfo,
    limit: Duration,
    is_full_index: bool,
) -> Result<ContributorHarvest, IndexError> {
    let deleted = async {
        if is_full_index {
            bounded(limit, "deleted keys", transport.query_deleted_keys(contributor)).await
        } else {
            Ok(Vec::new())
        }
    };

    let (xml_resources, raw_items, non_indexable_keys, deleted_keys) = tokio::try_join!(
        bounded(limit, "xml resources", transport.query_xml_resources(contributor)),
        bounded(limit, "raw items", transport.query_raw_items(contributor)),
        bounded(
            limit,
            "non-indexable keys",
            transport.query_non_indexable_keys(contributor)
        ),
        deleted,
    )
    .map_err(|reason| IndexError::ContributorUnreachable {
        authority: contributor.authority.clone(),
        reason,
    })?;

    debug!(
        authority = %contributor.authority,
        xml_resources = xml_resources.len(),
        raw_items = raw_items.len(),
        "contributor answered"
    );

    Ok(ContributorHarvest {
        xml_resources,
        raw_items,
        non_indexable_keys,
        deleted_keys,
    })
}

async fn bounded<T, F>(limit: Duration, what: &'static str, query: F) -> Result<T, String>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, query).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{} query failed: {:#}", what, e)),
        Err(_) => Err(format!("{} query timed out after {:?}", what, limit)),
    }
}

/// Appends one contributor's answers, stamping its package as the owner.
fn merge(data: &mut PreIndexData, contributor: &ContributorInfo, harvest: ContributorHarvest) {
    let package = &contributor.package_name;
    data.data_to_update
        .extend(harvest.xml_resources.into_iter().map(|mut resource| {
            resource.package_name = package.clone();
            IndexableData::XmlResource(resource)
        }));
    data.data_to_update
        .extend(harvest.raw_items.into_iter().map(|mut raw| {
            raw.package_name = package.clone();
            IndexableData::Raw(raw)
        }));
    data.add_non_indexable_keys(package, harvest.non_indexable_keys);
    data.data_to_delete.extend(harvest.deleted_keys);
}
