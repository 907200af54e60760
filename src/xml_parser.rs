//! Preference-screen document parser.
//!
//! A preference screen is an XML document rooted at `<PreferenceScreen>`:
//!
//! ```xml
//! <PreferenceScreen xmlns:android="http://schemas.android.com/apk/res/android"
//!     xmlns:settings="http://schemas.android.com/apk/res-auto"
//!     android:key="display_settings"
//!     android:title="@string/display_settings_title">
//!     <PreferenceCategory android:title="Brightness">
//!         <SwitchPreference
//!             android:key="auto_brightness"
//!             android:title="Adaptive brightness"
//!             android:summaryOn="On"
//!             android:summaryOff="Off"
//!             settings:controller="AutoBrightnessController" />
//!     </PreferenceCategory>
//! </PreferenceScreen>
//! ```
//!
//! The parser walks the document depth-first and emits one [`NodeMetadata`]
//! per element whose tag ends in `Preference`; containers such as
//! `PreferenceCategory` are descended into but not emitted. Attributes are
//! matched by local name, so the namespace prefix does not matter. Values
//! may reference the document's [`ResourceTable`] (`@string/…`, `@array/…`,
//! `@drawable/…`).

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use std::collections::HashMap;
use std::ops::BitOr;
use std::sync::Arc;

use crate::error::DocumentParseError;
use crate::traits::DocumentSource;

const NODE_NAME_PREFERENCE_SCREEN: &str = "PreferenceScreen";
const PREFERENCE_SUFFIX: &str = "Preference";
const ENTRIES_SEPARATOR: char = '|';

/// Which fields the parser should extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataFlags(u32);

impl MetadataFlags {
    pub const NONE: Self = Self(0);
    pub const KEY: Self = Self(1);
    pub const TITLE: Self = Self(1 << 1);
    pub const SUMMARY: Self = Self(1 << 2);
    pub const KEYWORDS: Self = Self(1 << 3);
    pub const ICON: Self = Self(1 << 4);
    pub const CONTROLLER: Self = Self(1 << 5);
    pub const ENTRIES: Self = Self(1 << 6);
    pub const CHILD_FRAGMENT: Self = Self(1 << 7);
    /// Emit the root screen itself as a header node.
    pub const INCLUDE_SCREEN: Self = Self(1 << 8);
    pub const ALL: Self = Self((1 << 9) - 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MetadataFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Variant of a preference node; decides where its summary comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceKind {
    /// The document's root screen.
    Screen,
    /// Check boxes and switches: `summaryOn` / `summaryOff`.
    TwoState,
    /// List preferences: `summary` plus `entries`.
    List,
    Plain,
}

impl PreferenceKind {
    fn classify(node_name: &str) -> Option<Self> {
        if node_name.ends_with("CheckBoxPreference") || node_name.ends_with("SwitchPreference") {
            Some(Self::TwoState)
        } else if node_name.ends_with("ListPreference") {
            Some(Self::List)
        } else if node_name.ends_with(PREFERENCE_SUFFIX) {
            Some(Self::Plain)
        } else {
            None
        }
    }
}

/// Fields extracted from one preference node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetadata {
    pub node_name: String,
    pub kind: PreferenceKind,
    pub key: Option<String>,
    pub title: Option<String>,
    pub summary_on: Option<String>,
    pub summary_off: Option<String>,
    /// `|`-terminated list entries, list preferences only.
    pub entries: Option<String>,
    pub keywords: Option<String>,
    /// 0 when the node declares no icon.
    pub icon_res_id: i32,
    pub controller: Option<String>,
    pub child_fragment: Option<String>,
}

impl NodeMetadata {
    pub fn is_screen(&self) -> bool {
        self.kind == PreferenceKind::Screen
    }
}

/// Named strings, string arrays and drawable ids a document may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResourceTable {
    pub strings: HashMap<String, String>,
    pub arrays: HashMap<String, Vec<String>>,
    pub drawables: HashMap<String, i32>,
}

impl ResourceTable {
    pub fn resolve_string(&self, value: &str) -> Result<String, DocumentParseError> {
        match value.strip_prefix("@string/") {
            Some(name) => self
                .strings
                .get(name)
                .cloned()
                .ok_or_else(|| unresolved(value)),
            None => Ok(value.to_string()),
        }
    }

    /// `@array/name`, or a literal comma-separated list.
    pub fn resolve_array(&self, value: &str) -> Result<Vec<String>, DocumentParseError> {
        match value.strip_prefix("@array/") {
            Some(name) => self
                .arrays
                .get(name)
                .cloned()
                .ok_or_else(|| unresolved(value)),
            None => Ok(value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()),
        }
    }

    /// `@drawable/name`, or a literal numeric id.
    pub fn resolve_drawable(&self, value: &str) -> Result<i32, DocumentParseError> {
        match value.strip_prefix("@drawable/") {
            Some(name) => self
                .drawables
                .get(name)
                .copied()
                .ok_or_else(|| unresolved(value)),
            None => value.trim().parse().map_err(|_| unresolved(value)),
        }
    }
}

fn unresolved(reference: &str) -> DocumentParseError {
    DocumentParseError::UnresolvedReference {
        reference: reference.to_string(),
    }
}

/// A readable preference document plus the resources it may reference.
#[derive(Debug, Clone)]
pub struct PreferenceDocument {
    pub xml: String,
    pub resources: Arc<ResourceTable>,
}

impl PreferenceDocument {
    pub fn new(xml: impl Into<String>, resources: Arc<ResourceTable>) -> Self {
        Self {
            xml: xml.into(),
            resources,
        }
    }
}

/// Parses preference documents fetched from a [`DocumentSource`].
pub struct PreferenceParser<'a> {
    documents: &'a dyn DocumentSource,
}

impl<'a> PreferenceParser<'a> {
    pub fn new(documents: &'a dyn DocumentSource) -> Self {
        Self { documents }
    }

    /// Extracts the nodes of document `resource_id` owned by `package`.
    ///
    /// A non-positive id or a missing document yields an empty list.
    pub fn parse(
        &self,
        package: &str,
        resource_id: i32,
        flags: MetadataFlags,
    ) -> Result<Vec<NodeMetadata>, DocumentParseError> {
        if resource_id <= 0 {
            return Ok(Vec::new());
        }
        let document = match self.documents.open(package, resource_id) {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => return Err(DocumentParseError::Unreadable(format!("{:#}", e))),
        };
        parse_document(&document, flags)
    }
}

/// Parses an already-read document.
pub fn parse_document(
    document: &PreferenceDocument,
    flags: MetadataFlags,
) -> Result<Vec<NodeMetadata>, DocumentParseError> {
    let mut reader = Reader::from_str(&document.xml);
    reader.config_mut().trim_text(true);

    let mut nodes = Vec::new();
    let mut depth = 0usize;
    let mut root_seen = false;
    let mut root_closed = false;

    loop {
        let event = reader.read_event().map_err(|e| DocumentParseError::Malformed {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        let (element, opens) = match event {
            Event::Start(e) => (e, true),
            Event::Empty(e) => (e, false),
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    root_closed = true;
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        if root_closed {
            return Err(DocumentParseError::Malformed {
                position: reader.buffer_position() as u64,
                message: "content after the root element".to_string(),
            });
        }

        let node_name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
        if !root_seen {
            if node_name != NODE_NAME_PREFERENCE_SCREEN {
                return Err(DocumentParseError::UnexpectedRoot { found: node_name });
            }
            root_seen = true;
            if flags.contains(MetadataFlags::INCLUDE_SCREEN) {
                nodes.push(extract(
                    &element,
                    node_name,
                    PreferenceKind::Screen,
                    flags,
                    &document.resources,
                )?);
            }
        } else if let Some(kind) = PreferenceKind::classify(&node_name) {
            nodes.push(extract(&element, node_name, kind, flags, &document.resources)?);
        }

        if opens {
            depth += 1;
        } else if depth == 0 {
            root_closed = true;
        }
    }

    if !root_seen {
        return Err(DocumentParseError::Malformed {
            position: reader.buffer_position() as u64,
            message: "document has no root element".to_string(),
        });
    }
    if depth != 0 {
        return Err(DocumentParseError::Malformed {
            position: reader.buffer_position() as u64,
            message: format!("{} element(s) left unclosed", depth),
        });
    }

    Ok(nodes)
}

fn extract(
    element: &BytesStart<'_>,
    node_name: String,
    kind: PreferenceKind,
    flags: MetadataFlags,
    resources: &ResourceTable,
) -> Result<NodeMetadata, DocumentParseError> {
    let attrs = attributes(element)?;
    let string = |name: &str| -> Result<Option<String>, DocumentParseError> {
        attrs
            .get(name)
            .map(|value| resources.resolve_string(value))
            .transpose()
    };

    let mut node = NodeMetadata {
        node_name,
        kind,
        key: None,
        title: None,
        summary_on: None,
        summary_off: None,
        entries: None,
        keywords: None,
        icon_res_id: 0,
        controller: None,
        child_fragment: None,
    };

    if flags.contains(MetadataFlags::KEY) {
        node.key = string("key")?;
    }
    if flags.contains(MetadataFlags::TITLE) {
        node.title = string("title")?;
    }
    if flags.contains(MetadataFlags::SUMMARY) {
        if kind == PreferenceKind::TwoState {
            node.summary_on = string("summaryOn")?;
            node.summary_off = string("summaryOff")?;
            if is_blank(&node.summary_on) && is_blank(&node.summary_off) {
                node.summary_on = string("summary")?;
            }
        } else {
            node.summary_on = string("summary")?;
        }
    }
    if flags.contains(MetadataFlags::ENTRIES) && kind == PreferenceKind::List {
        if let Some(value) = attrs.get("entries") {
            let entries = resources.resolve_array(value)?;
            if !entries.is_empty() {
                let mut joined = String::new();
                for entry in entries {
                    joined.push_str(&entry);
                    joined.push(ENTRIES_SEPARATOR);
                }
                node.entries = Some(joined);
            }
        }
    }
    if flags.contains(MetadataFlags::KEYWORDS) {
        node.keywords = string("keywords")?;
    }
    if flags.contains(MetadataFlags::ICON) {
        if let Some(value) = attrs.get("icon") {
            node.icon_res_id = resources.resolve_drawable(value)?;
        }
    }
    if flags.contains(MetadataFlags::CONTROLLER) {
        node.controller = attrs.get("controller").cloned();
    }
    if flags.contains(MetadataFlags::CHILD_FRAGMENT) {
        node.child_fragment = attrs.get("fragment").cloned();
    }

    Ok(node)
}

/// Attribute values by local name.
fn attributes(element: &BytesStart<'_>) -> Result<HashMap<String, String>, DocumentParseError> {
    let mut out = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| DocumentParseError::Malformed {
            position: 0,
            message: e.to_string(),
        })?;
        let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| DocumentParseError::Malformed {
                position: 0,
                message: e.to_string(),
            })?
            .into_owned();
        out.insert(name, value);
    }
    Ok(out)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}
