//! The canonical index row and its builder.
//!
//! [`IndexData`] is only obtainable through [`IndexDataBuilder::build`],
//! which rejects rows without a key or title and derives every
//! `updated_*`/`normalized_*` pair from the raw text. Fields are read
//! through accessors so a built row cannot drift from its derived forms.

use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::models::DEFAULT_USER_ID;
use crate::normalize::{canonicalize_punctuation, normalize, space_delimit_keywords};
use crate::payload::{PayloadType, ResultPayload};

/// One searchable row, ready for an [`IndexWriter`](crate::traits::IndexWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexData {
    locale: String,
    updated_title: String,
    normalized_title: String,
    updated_summary_on: String,
    normalized_summary_on: String,
    updated_summary_off: String,
    normalized_summary_off: String,
    entries: Option<String>,
    class_name: Option<String>,
    child_class_name: Option<String>,
    screen_title: Option<String>,
    package_name: Option<String>,
    icon_res_id: i32,
    rank: i32,
    space_delimited_keywords: String,
    intent_action: Option<String>,
    intent_target_package: Option<String>,
    intent_target_class: Option<String>,
    source_enabled: bool,
    enabled: bool,
    key: String,
    user_id: i32,
    payload_type: PayloadType,
    payload: Vec<u8>,
}

impl IndexData {
    pub fn builder() -> IndexDataBuilder {
        IndexDataBuilder::default()
    }

    /// Stable storage identity of the row.
    ///
    /// Two settings may share a title, so the id mixes in the key, the
    /// hosting screen and the owning class.
    pub fn doc_id(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.locale.as_str(),
            self.key.as_str(),
            self.updated_title.as_str(),
            self.screen_title.as_deref().unwrap_or_default(),
            self.class_name.as_deref().unwrap_or_default(),
            self.intent_target_package.as_deref().unwrap_or_default(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = format!("{:x}", hasher.finalize());
        digest[..32].to_string()
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }
    pub fn updated_title(&self) -> &str {
        &self.updated_title
    }
    pub fn normalized_title(&self) -> &str {
        &self.normalized_title
    }
    pub fn updated_summary_on(&self) -> &str {
        &self.updated_summary_on
    }
    pub fn normalized_summary_on(&self) -> &str {
        &self.normalized_summary_on
    }
    pub fn updated_summary_off(&self) -> &str {
        &self.updated_summary_off
    }
    pub fn normalized_summary_off(&self) -> &str {
        &self.normalized_summary_off
    }
    pub fn entries(&self) -> Option<&str> {
        self.entries.as_deref()
    }
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }
    pub fn child_class_name(&self) -> Option<&str> {
        self.child_class_name.as_deref()
    }
    pub fn screen_title(&self) -> Option<&str> {
        self.screen_title.as_deref()
    }
    /// Package of the contributor that supplied the row.
    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }
    pub fn icon_res_id(&self) -> i32 {
        self.icon_res_id
    }
    pub fn rank(&self) -> i32 {
        self.rank
    }
    pub fn space_delimited_keywords(&self) -> &str {
        &self.space_delimited_keywords
    }
    pub fn intent_action(&self) -> Option<&str> {
        self.intent_action.as_deref()
    }
    pub fn intent_target_package(&self) -> Option<&str> {
        self.intent_target_package.as_deref()
    }
    pub fn intent_target_class(&self) -> Option<&str> {
        self.intent_target_class.as_deref()
    }
    pub fn enabled(&self) -> bool {
        self.enabled
    }
    /// The flag the contributor declared, before suppression.
    pub fn source_enabled(&self) -> bool {
        self.source_enabled
    }
    /// Re-applies suppression against the declared flag.
    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.enabled = self.source_enabled && !suppressed;
    }
    pub fn key(&self) -> &str {
        &self.key
    }
    pub fn user_id(&self) -> i32 {
        self.user_id
    }
    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Accumulates row fields; validation happens once, in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct IndexDataBuilder {
    locale: Option<String>,
    title: Option<String>,
    summary_on: Option<String>,
    summary_off: Option<String>,
    entries: Option<String>,
    keywords: Option<String>,
    class_name: Option<String>,
    child_class_name: Option<String>,
    screen_title: Option<String>,
    package_name: Option<String>,
    icon_res_id: i32,
    rank: i32,
    intent_action: Option<String>,
    intent_target_package: Option<String>,
    intent_target_class: Option<String>,
    enabled: bool,
    suppressed: bool,
    key: Option<String>,
    user_id: i32,
    payload: Option<ResultPayload>,
}

impl Default for IndexDataBuilder {
    fn default() -> Self {
        Self {
            locale: None,
            title: None,
            summary_on: None,
            summary_off: None,
            entries: None,
            keywords: None,
            class_name: None,
            child_class_name: None,
            screen_title: None,
            package_name: None,
            icon_res_id: 0,
            rank: 0,
            intent_action: None,
            intent_target_package: None,
            intent_target_class: None,
            enabled: true,
            suppressed: false,
            key: None,
            user_id: DEFAULT_USER_ID,
            payload: None,
        }
    }
}

impl IndexDataBuilder {
    pub fn locale(mut self, locale: impl Into<Option<String>>) -> Self {
        self.locale = locale.into();
        self
    }
    pub fn title(mut self, title: impl Into<Option<String>>) -> Self {
        self.title = title.into();
        self
    }
    pub fn summary_on(mut self, summary: impl Into<Option<String>>) -> Self {
        self.summary_on = summary.into();
        self
    }
    pub fn summary_off(mut self, summary: impl Into<Option<String>>) -> Self {
        self.summary_off = summary.into();
        self
    }
    pub fn entries(mut self, entries: impl Into<Option<String>>) -> Self {
        self.entries = entries.into();
        self
    }
    /// Comma-separated keywords.
    pub fn keywords(mut self, keywords: impl Into<Option<String>>) -> Self {
        self.keywords = keywords.into();
        self
    }
    pub fn class_name(mut self, class_name: impl Into<Option<String>>) -> Self {
        self.class_name = class_name.into();
        self
    }
    pub fn child_class_name(mut self, child: impl Into<Option<String>>) -> Self {
        self.child_class_name = child.into();
        self
    }
    pub fn screen_title(mut self, screen_title: impl Into<Option<String>>) -> Self {
        self.screen_title = screen_title.into();
        self
    }
    pub fn package_name(mut self, package: impl Into<Option<String>>) -> Self {
        self.package_name = package.into();
        self
    }
    pub fn icon_res_id(mut self, icon_res_id: i32) -> Self {
        self.icon_res_id = icon_res_id;
        self
    }
    pub fn rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }
    pub fn intent_action(mut self, action: impl Into<Option<String>>) -> Self {
        self.intent_action = action.into();
        self
    }
    pub fn intent_target_package(mut self, package: impl Into<Option<String>>) -> Self {
        self.intent_target_package = package.into();
        self
    }
    pub fn intent_target_class(mut self, class: impl Into<Option<String>>) -> Self {
        self.intent_target_class = class.into();
        self
    }
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    /// Marks the key as non-indexable; the row is stored disabled.
    pub fn suppressed(mut self, suppressed: bool) -> Self {
        self.suppressed = suppressed;
        self
    }
    pub fn key(mut self, key: impl Into<Option<String>>) -> Self {
        self.key = key.into();
        self
    }
    pub fn user_id(mut self, user_id: i32) -> Self {
        self.user_id = user_id;
        self
    }
    /// Overrides the default deep-link payload.
    pub fn payload(mut self, payload: impl Into<Option<ResultPayload>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn get_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Validates mandatory fields and derives the normalized forms.
    pub fn build(self) -> Result<IndexData, ValidationError> {
        let key = self
            .key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ValidationError::MissingKey)?;
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(ValidationError::MissingTitle)?;

        let updated_title = canonicalize_punctuation(&title);
        let updated_summary_on =
            canonicalize_punctuation(self.summary_on.as_deref().unwrap_or_default());
        let updated_summary_off =
            canonicalize_punctuation(self.summary_off.as_deref().unwrap_or_default());

        let payload = self.payload.unwrap_or_else(|| {
            ResultPayload::intent(
                self.intent_action.as_deref(),
                self.intent_target_package.as_deref(),
                self.intent_target_class.as_deref(),
            )
        });
        let payload_bytes = payload
            .to_bytes()
            .map_err(|_| ValidationError::UnserializablePayload)?;

        Ok(IndexData {
            locale: self.locale.unwrap_or_default(),
            normalized_title: normalize(&updated_title),
            updated_title,
            normalized_summary_on: normalize(&updated_summary_on),
            updated_summary_on,
            normalized_summary_off: normalize(&updated_summary_off),
            updated_summary_off,
            entries: self.entries,
            class_name: self.class_name,
            child_class_name: self.child_class_name,
            screen_title: self.screen_title,
            package_name: self.package_name,
            icon_res_id: self.icon_res_id,
            rank: self.rank,
            space_delimited_keywords: space_delimit_keywords(
                self.keywords.as_deref().unwrap_or_default(),
            ),
            intent_action: self.intent_action,
            intent_target_package: self.intent_target_package,
            intent_target_class: self.intent_target_class,
            source_enabled: self.enabled,
            enabled: self.enabled && !self.suppressed,
            key,
            user_id: self.user_id,
            payload_type: payload.payload_type(),
            payload: payload_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::InlineSwitchPayload;

    fn base() -> IndexDataBuilder {
        IndexData::builder()
            .locale("en_US".to_string())
            .title("Wi\u{2011}Fi calling".to_string())
            .summary_on("summary\u{2011}on".to_string())
            .summary_off("summary\u{2011}off".to_string())
            .keywords("keywords, keywordss, keywordsss".to_string())
            .intent_action("action".to_string())
            .intent_target_package("target package".to_string())
            .intent_target_class("target class".to_string())
            .key("key".to_string())
    }

    #[test]
    fn test_missing_key_fails() {
        let err = IndexData::builder()
            .title("Title".to_string())
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingKey);
    }

    #[test]
    fn test_key_without_title_fails() {
        let err = IndexData::builder()
            .key("pref_a".to_string())
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingTitle);
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let err = IndexData::builder()
            .key("  ".to_string())
            .title("Title".to_string())
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingKey);
    }

    #[test]
    fn test_partial_builder_is_inspectable() {
        let builder = IndexData::builder().key("pref_a".to_string());
        assert_eq!(builder.get_key(), Some("pref_a"));
    }

    #[test]
    fn test_derived_fields() {
        let row = base().build().unwrap();
        assert_eq!(row.updated_title(), "Wi-Fi calling");
        assert_eq!(row.normalized_title(), "wificalling");
        assert_eq!(row.updated_summary_on(), "summary-on");
        assert_eq!(row.normalized_summary_on(), "summaryon");
        assert_eq!(row.updated_summary_off(), "summary-off");
        assert_eq!(row.normalized_summary_off(), "summaryoff");
        assert_eq!(row.space_delimited_keywords(), "keywords keywordss keywordsss");
        assert_eq!(row.user_id(), DEFAULT_USER_ID);
        assert!(row.enabled());
    }

    #[test]
    fn test_default_payload_is_intent() {
        let row = base().build().unwrap();
        assert_eq!(row.payload_type(), PayloadType::Intent);
        let payload = ResultPayload::from_bytes(row.payload()).unwrap();
        assert_eq!(
            payload,
            ResultPayload::intent(Some("action"), Some("target package"), Some("target class"))
        );
    }

    #[test]
    fn test_inline_payload_wins() {
        let switch = ResultPayload::InlineSwitch(InlineSwitchPayload {
            setting_key: "wifi_calling".to_string(),
            setting_source: Default::default(),
            on_value: 1,
            off_value: 0,
            intent: Default::default(),
            device_supported: true,
        });
        let row = base().payload(switch.clone()).build().unwrap();
        assert_eq!(row.payload_type(), PayloadType::InlineSwitch);
        assert_eq!(ResultPayload::from_bytes(row.payload()).unwrap(), switch);
    }

    #[test]
    fn test_doc_id_stable_and_key_sensitive() {
        let a = base().build().unwrap();
        let b = base().build().unwrap();
        let c = base().key("other".to_string()).build().unwrap();
        assert_eq!(a.doc_id(), b.doc_id());
        assert_ne!(a.doc_id(), c.doc_id());
        assert_eq!(a.doc_id().len(), 32);
    }

    #[test]
    fn test_suppression_never_overrides_source_flag() {
        let mut row = base().enabled(false).build().unwrap();
        assert!(!row.source_enabled());
        row.set_suppressed(false);
        assert!(!row.enabled());

        let mut row = base().suppressed(true).build().unwrap();
        assert!(row.source_enabled());
        assert!(!row.enabled());
        row.set_suppressed(false);
        assert!(row.enabled());
    }
}
