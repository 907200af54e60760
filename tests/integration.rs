use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const SETTINGS_MANIFEST: &str = r#"
non_indexable_keys = ["screen_timeout"]

[contributor]
authority = "com.android.settings.search"
package = "com.android.settings"
exported = true
platform_signed = true
version = 1

[[xml_resources]]
resource_id = 1
path = "display.xml"
rank = 2
class_name = "com.android.settings.DisplaySettings"
intent_action = "android.settings.DISPLAY_SETTINGS"

[[raw_items]]
key = "dark_mode"
title = "Dark theme"
keywords = "night, dark"
screen_title = "Display"

[resources.strings]
display_title = "Display"

[resources.arrays]
timeout_entries = ["15 seconds", "30 seconds", "1 minute"]

[[inline_switches]]
controller = "AutoBrightnessController"
setting_key = "screen_brightness_mode"
"#;

const DISPLAY_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<PreferenceScreen xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:settings="http://schemas.android.com/apk/res-auto"
    android:key="display_settings"
    android:title="@string/display_title">
    <Preference
        android:key="brightness"
        android:title="Brightness level"
        android:fragment="com.android.settings.BrightnessSettings" />
    <SwitchPreference
        android:key="auto_brightness"
        android:title="Adaptive brightness"
        android:summaryOn="On"
        android:summaryOff="Off"
        settings:controller="AutoBrightnessController" />
    <ListPreference
        android:key="screen_timeout"
        android:title="Screen timeout"
        android:entries="@array/timeout_entries" />
</PreferenceScreen>
"#;

const PARTNER_MANIFEST: &str = r#"
[contributor]
authority = "com.partner.search"
package = "com.partner"
exported = true
platform_signed = false
version = 4

[[raw_items]]
key = "partner_pref"
title = "Partner feature"
"#;

const BROKEN_MANIFEST: &str = r#"
[contributor]
authority = "com.broken.search"
package = "com.broken"
exported = true
platform_signed = true
version = 1

[[xml_resources]]
resource_id = 7
path = "broken.xml"
"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let contributors = root.join("contributors");
    let settings = contributors.join("settings");
    fs::create_dir_all(&settings).unwrap();
    fs::write(settings.join("contributor.toml"), SETTINGS_MANIFEST).unwrap();
    fs::write(settings.join("display.xml"), DISPLAY_XML).unwrap();

    let partner = contributors.join("partner");
    fs::create_dir_all(&partner).unwrap();
    fs::write(partner.join("contributor.toml"), PARTNER_MANIFEST).unwrap();

    let broken = contributors.join("broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("contributor.toml"), BROKEN_MANIFEST).unwrap();
    fs::write(
        broken.join("broken.xml"),
        "<PreferenceScreen><Preference android:key=\"a\" android:title=\"A\">",
    )
    .unwrap();

    write_config(&root, "build-1");
    (tmp, config_dir.join("sidx.toml"))
}

fn write_config(root: &Path, build: &str) {
    let config_content = format!(
        r#"[db]
path = "{root}/data/index.sqlite"

[index]
locale = "en_US"
build_fingerprint = "{build}"

[collector]
query_timeout_ms = 2000
max_concurrent = 4

[contributors]
root = "{root}/contributors"
"#,
        root = root.display(),
        build = build,
    );
    fs::write(root.join("config").join("sidx.toml"), config_content).unwrap();
}

fn run_sidx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = env!("CARGO_BIN_EXE_sidx");
    let output = Command::new(binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sidx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sidx(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/index.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_sidx(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_sidx(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_contributors_lists_trust() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sidx(&config_path, &["contributors"]);
    assert!(success, "contributors failed: {}", stderr);
    let partner = stdout
        .lines()
        .find(|l| l.starts_with("com.partner.search"))
        .expect("partner listed");
    assert!(partner.contains("false"));
    let settings = stdout
        .lines()
        .find(|l| l.starts_with("com.android.settings.search"))
        .expect("settings listed");
    assert!(settings.contains("true"));
}

#[test]
fn test_first_crawl_is_full() {
    let (_tmp, config_path) = setup_test_env();

    run_sidx(&config_path, &["init"]);
    let (stdout, stderr, success) = run_sidx(&config_path, &["crawl"]);
    assert!(success, "crawl failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("crawl full"), "got: {}", stdout);
    assert!(stdout.contains("contributors: 3 (2 trusted)"), "got: {}", stdout);
    assert!(stdout.contains("rows: 5 (1 disabled)"), "got: {}", stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_unchanged_state_crawls_incrementally() {
    let (tmp, config_path) = setup_test_env();

    run_sidx(&config_path, &["crawl"]);
    let (stdout, _, success) = run_sidx(&config_path, &["crawl"]);
    assert!(success);
    assert!(stdout.contains("crawl incremental"), "got: {}", stdout);

    // A new build fingerprint forces a rebuild
    write_config(tmp.path(), "build-2");
    let (stdout, _, _) = run_sidx(&config_path, &["crawl"]);
    assert!(stdout.contains("crawl full"), "got: {}", stdout);

    let (stdout, _, _) = run_sidx(&config_path, &["crawl", "--full"]);
    assert!(stdout.contains("crawl full"), "got: {}", stdout);
}

#[test]
fn test_incremental_crawl_reenables_keys() {
    let (tmp, config_path) = setup_test_env();

    run_sidx(&config_path, &["crawl"]);
    let (stdout, _, _) = run_sidx(&config_path, &["stats"]);
    assert!(stdout.contains("Disabled:    1"), "got: {}", stdout);

    let manifest = tmp.path().join("contributors/settings/contributor.toml");
    let relaxed = SETTINGS_MANIFEST.replace(
        "non_indexable_keys = [\"screen_timeout\"]",
        "non_indexable_keys = []",
    );
    fs::write(manifest, relaxed).unwrap();

    let (stdout, _, _) = run_sidx(&config_path, &["crawl"]);
    assert!(stdout.contains("crawl incremental"), "got: {}", stdout);
    let (stdout, _, _) = run_sidx(&config_path, &["stats"]);
    assert!(stdout.contains("Disabled:    0"), "got: {}", stdout);
}

#[test]
fn test_crawl_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sidx(&config_path, &["crawl", "--dry-run"]);
    assert!(success, "dry run failed: {}", stderr);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("rows: 5 (1 disabled)"), "got: {}", stdout);
    assert!(stdout.contains("Adaptive brightness"));
    assert!(!tmp.path().join("data/index.sqlite").exists());
}

#[test]
fn test_stats_after_crawl() {
    let (_tmp, config_path) = setup_test_env();

    run_sidx(&config_path, &["crawl"]);
    let (stdout, stderr, success) = run_sidx(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Rows:        5"), "got: {}", stdout);
    assert!(stdout.contains("Inline:      1"), "got: {}", stdout);
    assert!(stdout.contains("Site map:    1 edges"), "got: {}", stdout);
    assert!(stdout.contains("Locale:      en_US"), "got: {}", stdout);
    assert!(stdout.contains("com.android.settings"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, _, success) = run_sidx(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
}
