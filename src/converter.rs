//! Conversion of collected pre-index data into index rows.
//!
//! The converter is synchronous and has no side effects: the same
//! [`PreIndexData`] always converts to the same rows in the same order.
//! Raw items map to one row each; XML resources are parsed and every
//! preference node becomes a row that inherits the resource's class,
//! intent and rank.
//!
//! A resource whose document cannot be parsed yields no rows. A node or
//! raw item that fails validation is dropped on its own. Neither stops the
//! rest of the conversion.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::IndexError;
use crate::index_data::{IndexData, IndexDataBuilder};
use crate::models::{IndexableData, IndexableXmlResource, PreIndexData, SearchIndexableRawItem};
use crate::traits::{DocumentSource, PayloadResolver};
use crate::xml_parser::{MetadataFlags, NodeMetadata, PreferenceParser};

/// What to do with raw items that declare a locale other than the active one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalePolicy {
    /// Keep them; they are indexed under the active locale.
    #[default]
    Permissive,
    /// Drop them.
    Strict,
}

pub struct IndexDataConverter<'a> {
    documents: &'a dyn DocumentSource,
    payloads: &'a dyn PayloadResolver,
    locale: String,
    locale_policy: LocalePolicy,
}

impl<'a> IndexDataConverter<'a> {
    pub fn new(
        documents: &'a dyn DocumentSource,
        payloads: &'a dyn PayloadResolver,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            payloads,
            locale: locale.into(),
            locale_policy: LocalePolicy::default(),
        }
    }

    pub fn with_locale_policy(mut self, locale_policy: LocalePolicy) -> Self {
        self.locale_policy = locale_policy;
        self
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Converts every entry of `data.data_to_update`, in order.
    pub fn convert(&self, data: &PreIndexData) -> Vec<IndexData> {
        let mut rows = Vec::new();
        for entry in &data.data_to_update {
            match entry {
                IndexableData::Raw(raw) => rows.extend(self.convert_raw(raw, data)),
                IndexableData::XmlResource(resource) => {
                    rows.extend(self.convert_resource(resource, data))
                }
            }
        }
        debug!(
            entries = data.data_to_update.len(),
            rows = rows.len(),
            "converted pre-index data"
        );
        rows
    }

    fn convert_raw(&self, raw: &SearchIndexableRawItem, data: &PreIndexData) -> Option<IndexData> {
        if self.locale_policy == LocalePolicy::Strict {
            let foreign = raw
                .locale
                .as_deref()
                .filter(|l| !l.eq_ignore_ascii_case(&self.locale));
            if let Some(locale) = foreign {
                debug!(key = ?raw.key, locale, "raw item skipped: foreign locale");
                return None;
            }
        }

        let suppressed = raw
            .key
            .as_deref()
            .is_some_and(|key| data.is_suppressed(&raw.package_name, key));

        let builder = IndexData::builder()
            .locale(self.locale.clone())
            .title(raw.title.clone())
            .summary_on(raw.summary_on.clone())
            .summary_off(raw.summary_off.clone())
            .entries(raw.entries.clone())
            .keywords(raw.keywords.clone())
            .screen_title(raw.screen_title.clone())
            .class_name(raw.class_name.clone())
            .package_name(raw.package_name.clone())
            .icon_res_id(raw.icon_res_id)
            .rank(raw.rank)
            .intent_action(raw.intent_action.clone())
            .intent_target_package(raw.intent_target_package.clone())
            .intent_target_class(raw.intent_target_class.clone())
            .key(raw.key.clone())
            .user_id(raw.user_id)
            .enabled(raw.enabled)
            .suppressed(suppressed)
            .payload(raw.payload.clone());

        build_logged(builder, &raw.package_name)
    }

    fn convert_resource(
        &self,
        resource: &IndexableXmlResource,
        data: &PreIndexData,
    ) -> Vec<IndexData> {
        let parser = PreferenceParser::new(self.documents);
        let nodes = match parser.parse(
            &resource.package_name,
            resource.resource_id,
            MetadataFlags::ALL,
        ) {
            Ok(nodes) => nodes,
            Err(source) => {
                let e = IndexError::DocumentParse {
                    package: resource.package_name.clone(),
                    resource_id: resource.resource_id,
                    source,
                };
                warn!("{}", e);
                return Vec::new();
            }
        };

        let mut nodes = nodes.into_iter().peekable();
        let header = nodes.next_if(NodeMetadata::is_screen);
        let screen_title = header.as_ref().and_then(|h| h.title.clone());

        let mut rows = Vec::new();
        let header_title = match header {
            Some(header) => {
                let builder = self.node_builder(resource, &header, screen_title.clone(), data);
                build_logged(builder, &resource.package_name).map(|row| {
                    let title = row.normalized_title().to_string();
                    rows.push(row);
                    title
                })
            }
            None => None,
        };

        for node in nodes {
            let builder = self.node_builder(resource, &node, screen_title.clone(), data);
            let Some(row) = build_logged(builder, &resource.package_name) else {
                continue;
            };
            if header_title.as_deref() == Some(row.normalized_title()) {
                debug!(key = row.key(), "node shares the screen title; header row kept");
                continue;
            }
            rows.push(row);
        }
        rows
    }

    fn node_builder(
        &self,
        resource: &IndexableXmlResource,
        node: &NodeMetadata,
        screen_title: Option<String>,
        data: &PreIndexData,
    ) -> IndexDataBuilder {
        let suppressed = node
            .key
            .as_deref()
            .is_some_and(|key| data.is_suppressed(&resource.package_name, key));
        let payload = match (node.controller.as_deref(), node.key.as_deref()) {
            (Some(controller), Some(key)) => self.payloads.resolve(controller, key),
            _ => None,
        };
        let icon_res_id = if node.icon_res_id != 0 {
            node.icon_res_id
        } else {
            resource.icon_res_id
        };

        IndexData::builder()
            .locale(self.locale.clone())
            .title(node.title.clone())
            .summary_on(node.summary_on.clone())
            .summary_off(node.summary_off.clone())
            .entries(node.entries.clone())
            .keywords(node.keywords.clone())
            .screen_title(screen_title)
            .class_name(resource.class_name.clone())
            .child_class_name(node.child_fragment.clone())
            .package_name(resource.package_name.clone())
            .icon_res_id(icon_res_id)
            .rank(resource.rank)
            .intent_action(resource.intent_action.clone())
            .intent_target_package(resource.intent_target_package.clone())
            .intent_target_class(resource.intent_target_class.clone())
            .key(node.key.clone())
            .enabled(resource.enabled)
            .suppressed(suppressed)
            .payload(payload)
    }
}

fn build_logged(builder: IndexDataBuilder, package: &str) -> Option<IndexData> {
    let key = builder.get_key().map(str::to_string);
    match builder.build() {
        Ok(row) => Some(row),
        Err(e) => {
            debug!(package, key = ?key, "row dropped: {}", IndexError::from(e));
            None
        }
    }
}
