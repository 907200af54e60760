//! Contributors backed by directories on disk.
//!
//! Each contributor is a directory holding a `contributor.toml` manifest
//! plus the preference documents it references:
//!
//! ```toml
//! non_indexable_keys = ["hidden_pref"]
//! deleted_keys = []
//!
//! [contributor]
//! authority = "com.example.search"
//! package = "com.example"
//! exported = true
//! platform_signed = true
//! version = 3
//!
//! [[xml_resources]]
//! resource_id = 1
//! path = "display.xml"
//! class_name = "com.example.DisplaySettings"
//!
//! [[raw_items]]
//! key = "dark_mode"
//! title = "Dark theme"
//!
//! [resources.strings]
//! display_title = "Display"
//!
//! [[inline_switches]]
//! controller = "AutoBrightnessController"
//! setting_key = "screen_brightness_mode"
//! ```
//!
//! Manifests are discovered with `walkdir`, filtered by the configured
//! include/exclude globs and sorted by path. A manifest whose
//! `[contributor]` table is unreadable is skipped at discovery; one that
//! is otherwise malformed is still listed, but every query against it
//! fails.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ContributorsConfig;
use crate::models::{ContributorInfo, IndexableXmlResource, SearchIndexableRawItem};
use crate::payload::{InlineSwitchPayload, ResultPayload};
use crate::traits::{ContributorTransport, DocumentSource, PayloadResolver, StaticPayloadResolver};
use crate::xml_parser::{PreferenceDocument, ResourceTable};

#[derive(Debug, Deserialize)]
struct ManifestHeader {
    contributor: ContributorInfo,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    non_indexable_keys: Vec<String>,
    #[serde(default)]
    deleted_keys: Vec<String>,
    #[serde(default)]
    xml_resources: Vec<ManifestXmlResource>,
    #[serde(default)]
    raw_items: Vec<SearchIndexableRawItem>,
    #[serde(default)]
    resources: ResourceTable,
    #[serde(default)]
    inline_switches: Vec<ManifestInlineSwitch>,
}

#[derive(Debug, Deserialize)]
struct ManifestXmlResource {
    resource_id: i32,
    path: PathBuf,
    #[serde(default)]
    rank: i32,
    class_name: Option<String>,
    #[serde(default)]
    icon_res_id: i32,
    intent_action: Option<String>,
    intent_target_package: Option<String>,
    intent_target_class: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ManifestInlineSwitch {
    controller: String,
    #[serde(flatten)]
    payload: InlineSwitchPayload,
}

struct LoadedManifest {
    manifest: Manifest,
    resources: Arc<ResourceTable>,
}

struct FsContributor {
    info: ContributorInfo,
    dir: PathBuf,
    manifest: Result<LoadedManifest, String>,
}

/// Every contributor found under a root directory.
pub struct FsContributors {
    root: PathBuf,
    entries: Vec<FsContributor>,
    payloads: StaticPayloadResolver,
}

impl FsContributors {
    pub fn discover(config: &ContributorsConfig) -> Result<Self> {
        let root = &config.root;
        if !root.exists() {
            bail!("Contributors root does not exist: {}", root.display());
        }

        let include_set = build_globset(&config.include_globs)?;
        let mut default_excludes = vec!["**/.git/**".to_string()];
        default_excludes.extend(config.exclude_globs.clone());
        let exclude_set = build_globset(&default_excludes)?;

        let mut manifest_paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();
            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            manifest_paths.push(path.to_path_buf());
        }

        // Sort for deterministic ordering
        manifest_paths.sort();

        let mut entries = Vec::new();
        let mut payloads = StaticPayloadResolver::new();
        for path in manifest_paths {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read manifest {}", path.display()))?;

            let header: ManifestHeader = match toml::from_str(&content) {
                Ok(header) => header,
                Err(e) => {
                    warn!(manifest = %path.display(), "manifest skipped: {}", e);
                    continue;
                }
            };

            let manifest = match toml::from_str::<Manifest>(&content) {
                Ok(mut manifest) => {
                    for switch in manifest.inline_switches.drain(..) {
                        payloads
                            .register(switch.controller, ResultPayload::InlineSwitch(switch.payload));
                    }
                    let resources = Arc::new(std::mem::take(&mut manifest.resources));
                    Ok(LoadedManifest {
                        manifest,
                        resources,
                    })
                }
                Err(e) => {
                    warn!(manifest = %path.display(), "manifest is malformed: {}", e);
                    Err(format!("malformed manifest {}: {}", path.display(), e))
                }
            };

            debug!(
                authority = %header.contributor.authority,
                manifest = %path.display(),
                "contributor discovered"
            );
            entries.push(FsContributor {
                info: header.contributor,
                dir: path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.clone()),
                manifest,
            });
        }

        Ok(Self {
            root: root.clone(),
            entries,
            payloads,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Descriptors of the discovered contributors, in manifest-path order.
    pub fn contributors(&self) -> Vec<ContributorInfo> {
        self.entries.iter().map(|e| e.info.clone()).collect()
    }

    /// Whether the manifest of `authority` parsed completely.
    pub fn is_healthy(&self, authority: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.info.authority == authority && e.manifest.is_ok())
    }

    fn manifest(&self, contributor: &ContributorInfo) -> Result<&LoadedManifest> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.info.authority == contributor.authority)
            .ok_or_else(|| anyhow!("unknown contributor '{}'", contributor.authority))?;
        entry.manifest.as_ref().map_err(|e| anyhow!("{}", e))
    }
}

#[async_trait]
impl ContributorTransport for FsContributors {
    async fn query_xml_resources(
        &self,
        contributor: &ContributorInfo,
    ) -> Result<Vec<IndexableXmlResource>> {
        let loaded = self.manifest(contributor)?;
        Ok(loaded
            .manifest
            .xml_resources
            .iter()
            .map(|res| IndexableXmlResource {
                resource_id: res.resource_id,
                rank: res.rank,
                class_name: res.class_name.clone(),
                package_name: contributor.package_name.clone(),
                icon_res_id: res.icon_res_id,
                intent_action: res.intent_action.clone(),
                intent_target_package: res.intent_target_package.clone(),
                intent_target_class: res.intent_target_class.clone(),
                enabled: res.enabled,
            })
            .collect())
    }

    async fn query_raw_items(
        &self,
        contributor: &ContributorInfo,
    ) -> Result<Vec<SearchIndexableRawItem>> {
        Ok(self.manifest(contributor)?.manifest.raw_items.clone())
    }

    async fn query_non_indexable_keys(&self, contributor: &ContributorInfo) -> Result<Vec<String>> {
        Ok(self.manifest(contributor)?.manifest.non_indexable_keys.clone())
    }

    async fn query_deleted_keys(&self, contributor: &ContributorInfo) -> Result<Vec<String>> {
        Ok(self.manifest(contributor)?.manifest.deleted_keys.clone())
    }
}

impl DocumentSource for FsContributors {
    fn open(&self, package: &str, resource_id: i32) -> Result<Option<PreferenceDocument>> {
        for entry in self.entries.iter().filter(|e| e.info.package_name == package) {
            let Ok(loaded) = &entry.manifest else {
                continue;
            };
            let Some(resource) = loaded
                .manifest
                .xml_resources
                .iter()
                .find(|r| r.resource_id == resource_id)
            else {
                continue;
            };
            let path = entry.dir.join(&resource.path);
            let xml = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read document {}", path.display()))?;
            return Ok(Some(PreferenceDocument::new(xml, Arc::clone(&loaded.resources))));
        }
        Ok(None)
    }
}

impl PayloadResolver for FsContributors {
    fn resolve(&self, controller: &str, key: &str) -> Option<ResultPayload> {
        self.payloads.resolve(controller, key)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DISPLAY_MANIFEST: &str = r#"
non_indexable_keys = ["hidden"]
deleted_keys = ["retired"]

[contributor]
authority = "com.example.display.search"
package = "com.example.display"
exported = true
platform_signed = true
version = 2

[[xml_resources]]
resource_id = 1
path = "display.xml"
rank = 3
class_name = "com.example.DisplaySettings"

[[raw_items]]
key = "dark_mode"
title = "Dark theme"

[resources.strings]
display_title = "Display"

[[inline_switches]]
controller = "AutoBrightnessController"
setting_key = "screen_brightness_mode"
"#;

    const DISPLAY_XML: &str = r#"<PreferenceScreen android:key="display" android:title="@string/display_title">
    <SwitchPreference android:key="auto_brightness" android:title="Adaptive brightness"
        settings:controller="AutoBrightnessController" />
</PreferenceScreen>"#;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let display = dir.path().join("b_display");
        fs::create_dir_all(&display).unwrap();
        fs::write(display.join("contributor.toml"), DISPLAY_MANIFEST).unwrap();
        fs::write(display.join("display.xml"), DISPLAY_XML).unwrap();

        let broken = dir.path().join("a_broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(
            broken.join("contributor.toml"),
            "[contributor]\nauthority = \"com.broken\"\npackage = \"com.broken\"\n\n[[xml_resources]]\nresource_id = \"one\"\n",
        )
        .unwrap();

        let junk = dir.path().join("c_junk");
        fs::create_dir_all(&junk).unwrap();
        fs::write(junk.join("contributor.toml"), "this is not toml = [").unwrap();
        dir
    }

    fn config(dir: &tempfile::TempDir) -> ContributorsConfig {
        ContributorsConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_discovery_sorted_and_skips_unreadable_headers() {
        let dir = fixture();
        let contributors = FsContributors::discover(&config(&dir)).unwrap();
        let authorities: Vec<_> = contributors
            .contributors()
            .into_iter()
            .map(|c| c.authority)
            .collect();
        assert_eq!(authorities, vec!["com.broken", "com.example.display.search"]);
        assert!(!contributors.is_healthy("com.broken"));
        assert!(contributors.is_healthy("com.example.display.search"));
    }

    #[test]
    fn test_missing_root_rejected() {
        let cfg = ContributorsConfig {
            root: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        assert!(FsContributors::discover(&cfg).is_err());
    }

    #[test]
    fn test_exclude_globs() {
        let dir = fixture();
        let cfg = ContributorsConfig {
            exclude_globs: vec!["a_broken/**".to_string()],
            ..config(&dir)
        };
        let contributors = FsContributors::discover(&cfg).unwrap();
        assert_eq!(contributors.contributors().len(), 1);
    }

    #[tokio::test]
    async fn test_queries_answer_from_manifest() {
        let dir = fixture();
        let contributors = FsContributors::discover(&config(&dir)).unwrap();
        let display = contributors.contributors()[1].clone();

        let resources = contributors.query_xml_resources(&display).await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].package_name, "com.example.display");
        assert_eq!(resources[0].rank, 3);
        assert!(resources[0].enabled);

        let raw = contributors.query_raw_items(&display).await.unwrap();
        assert_eq!(raw[0].key.as_deref(), Some("dark_mode"));
        assert_eq!(
            contributors.query_non_indexable_keys(&display).await.unwrap(),
            vec!["hidden"]
        );
        assert_eq!(
            contributors.query_deleted_keys(&display).await.unwrap(),
            vec!["retired"]
        );
    }

    #[tokio::test]
    async fn test_malformed_manifest_fails_queries() {
        let dir = fixture();
        let contributors = FsContributors::discover(&config(&dir)).unwrap();
        let broken = contributors.contributors()[0].clone();
        assert!(contributors.query_xml_resources(&broken).await.is_err());
        assert!(contributors.query_raw_items(&broken).await.is_err());
    }

    #[test]
    fn test_documents_and_payloads() {
        let dir = fixture();
        let contributors = FsContributors::discover(&config(&dir)).unwrap();

        let document = contributors.open("com.example.display", 1).unwrap().unwrap();
        assert!(document.xml.contains("auto_brightness"));
        assert_eq!(
            document.resources.resolve_string("@string/display_title").unwrap(),
            "Display"
        );
        assert!(contributors.open("com.example.display", 2).unwrap().is_none());
        assert!(contributors.open("com.unknown", 1).unwrap().is_none());

        assert!(contributors
            .resolve("AutoBrightnessController", "auto_brightness")
            .is_some());
        assert!(contributors.resolve("Unknown", "x").is_none());
    }
}
