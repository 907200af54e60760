//! Core data models used throughout the indexing pipeline.
//!
//! These types describe what contributors hand to the collector and what
//! the collector hands to the converter. The canonical output row lives in
//! [`crate::index_data`].

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::payload::ResultPayload;

/// A component advertising indexable data, as reported by discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContributorInfo {
    pub authority: String,
    #[serde(alias = "package")]
    pub package_name: String,
    #[serde(default)]
    pub exported: bool,
    #[serde(default)]
    pub platform_signed: bool,
    #[serde(default)]
    pub version: i64,
}

impl ContributorInfo {
    /// `"{authority}:{version}"`, used to detect contributor set changes.
    pub fn versioned_name(&self) -> String {
        format!("{}:{}", self.authority, self.version)
    }
}

/// Reference to one preference-screen document owned by a contributor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexableXmlResource {
    pub resource_id: i32,
    pub rank: i32,
    pub class_name: Option<String>,
    pub package_name: String,
    pub icon_res_id: i32,
    pub intent_action: Option<String>,
    pub intent_target_package: Option<String>,
    pub intent_target_class: Option<String>,
    pub enabled: bool,
}

/// An index entry contributed directly as field values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchIndexableRawItem {
    pub locale: Option<String>,
    pub title: Option<String>,
    pub summary_on: Option<String>,
    pub summary_off: Option<String>,
    pub entries: Option<String>,
    /// Comma-separated.
    pub keywords: Option<String>,
    pub screen_title: Option<String>,
    pub class_name: Option<String>,
    pub package_name: String,
    pub icon_res_id: i32,
    pub rank: i32,
    pub intent_action: Option<String>,
    pub intent_target_package: Option<String>,
    pub intent_target_class: Option<String>,
    pub key: Option<String>,
    pub user_id: i32,
    pub enabled: bool,
    /// Inline control declared by the contributor, if any.
    pub payload: Option<ResultPayload>,
}

/// User id of rows that are not bound to a specific user.
pub const DEFAULT_USER_ID: i32 = -1;

impl Default for IndexableXmlResource {
    fn default() -> Self {
        Self {
            resource_id: 0,
            rank: 0,
            class_name: None,
            package_name: String::new(),
            icon_res_id: 0,
            intent_action: None,
            intent_target_package: None,
            intent_target_class: None,
            enabled: true,
        }
    }
}

impl Default for SearchIndexableRawItem {
    fn default() -> Self {
        Self {
            locale: None,
            title: None,
            summary_on: None,
            summary_off: None,
            entries: None,
            keywords: None,
            screen_title: None,
            class_name: None,
            package_name: String::new(),
            icon_res_id: 0,
            rank: 0,
            intent_action: None,
            intent_target_package: None,
            intent_target_class: None,
            key: None,
            user_id: DEFAULT_USER_ID,
            enabled: true,
            payload: None,
        }
    }
}

/// One element of [`PreIndexData::data_to_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexableData {
    XmlResource(IndexableXmlResource),
    Raw(SearchIndexableRawItem),
}

impl IndexableData {
    /// Identity the non-indexable keys of this entry are filed under.
    pub fn package_name(&self) -> &str {
        match self {
            IndexableData::XmlResource(res) => &res.package_name,
            IndexableData::Raw(raw) => &raw.package_name,
        }
    }
}

/// Everything gathered in one crawl cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreIndexData {
    pub data_to_update: Vec<IndexableData>,
    pub data_to_delete: BTreeSet<String>,
    /// Contributor identity → keys that must not be surfaced.
    pub non_indexable_keys: BTreeMap<String, BTreeSet<String>>,
}

impl PreIndexData {
    /// Whether `key` is suppressed for the contributor identified by `package`.
    pub fn is_suppressed(&self, package: &str, key: &str) -> bool {
        self.non_indexable_keys
            .get(package)
            .is_some_and(|keys| keys.contains(key))
    }

    /// Files `keys` under `package`, merging with anything already there.
    pub fn add_non_indexable_keys<I>(&mut self, package: &str, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.non_indexable_keys
            .entry(package.to_string())
            .or_default()
            .extend(keys);
    }

    pub fn is_empty(&self) -> bool {
        self.data_to_update.is_empty()
            && self.data_to_delete.is_empty()
            && self.non_indexable_keys.is_empty()
    }
}
