//! Legacy migration tests: one-time import guarded by a persisted marker

use settings_registry::contract::{KeyValueStore, ProtectedStore};
use settings_registry::domain::migration::{
    self, is_migrated, marker_namespace, LegacyAdapter, MigrationOutcome, MIGRATED_KEY,
};
use settings_registry::features::{build, terminal, BuildModule, TerminalModule};
use settings_registry::infra::storage::MemoryProtectedStore;
use settings_registry::{ExecMode, Registry, RegistryConfig, RegistryEnv, SettingValue, SettingsModule};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

mod common;
use common::*;

const TERMINAL_LEGACY: &str = "alias_ll=ls -la\n# comment\nalias_gs=git status";

fn write_legacy(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("Failed to write legacy file");
}

#[tokio::test]
async fn test_terminal_aliases_migrated_on_first_load() {
    print_test_header(
        "test_terminal_aliases_migrated_on_first_load",
        &[
            "Legacy file: alias_ll=ls -la / # comment / alias_gs=git status.",
            "After the first load the aliases are present and the marker is set.",
        ],
    );

    let legacy = tempfile::tempdir().expect("tempdir");
    write_legacy(legacy.path(), terminal::LEGACY_FILE, TERMINAL_LEGACY);

    let test = build_registry(config(true, Some(legacy.path().to_path_buf())));
    assert!(test.registry.initialize());

    let terminal = test.registry.module::<TerminalModule>().expect("terminal");
    let aliases = terminal.get_all_aliases().expect("aliases");
    println!("   Aliases: {:?}", aliases);

    let expected: BTreeMap<String, String> = [
        ("ll".to_string(), "ls -la".to_string()),
        ("gs".to_string(), "git status".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(aliases, expected);
    assert!(is_migrated(terminal.as_ref()).expect("marker"));
    assert!(!terminal.is_dirty());
}

#[tokio::test]
async fn test_second_load_performs_no_legacy_writes() {
    print_test_header(
        "test_second_load_performs_no_legacy_writes",
        &[
            "Verify running the adapter's load twice with the legacy file still present",
            "yields the same key set and the second run writes nothing.",
        ],
    );

    let legacy = tempfile::tempdir().expect("tempdir");
    write_legacy(legacy.path(), terminal::LEGACY_FILE, TERMINAL_LEGACY);

    let test = build_registry(config(true, Some(legacy.path().to_path_buf())));
    assert!(test.registry.initialize());
    let terminal = test.registry.module::<TerminalModule>().expect("terminal");

    println!("\n📝 Stage 1: First load done by initialize");
    let keys_after_first: Vec<String> = terminal
        .current_settings()
        .expect("snapshot")
        .keys()
        .cloned()
        .collect();
    let writes_after_first = test.stores.total_writes();
    println!("   Writes after first load: {}", writes_after_first);

    println!("\n📝 Stage 2: Load again");
    terminal.load_settings().expect("second load");
    let keys_after_second: Vec<String> = terminal
        .current_settings()
        .expect("snapshot")
        .keys()
        .cloned()
        .collect();

    assert_eq!(keys_after_first, keys_after_second);
    assert_eq!(test.stores.total_writes(), writes_after_first);
    assert_eq!(
        migration::migrate_then_load(terminal.as_ref()).expect("third load"),
        MigrationOutcome::AlreadyMigrated
    );
}

#[tokio::test]
async fn test_marker_wins_over_changed_legacy_file() {
    print_test_header(
        "test_marker_wins_over_changed_legacy_file",
        &[
            "Verify a set marker skips migration even when the legacy file changed,",
            "on a registry rebuilt over the same stores.",
        ],
    );

    let legacy = tempfile::tempdir().expect("tempdir");
    write_legacy(legacy.path(), terminal::LEGACY_FILE, TERMINAL_LEGACY);

    let first = build_registry(config(true, Some(legacy.path().to_path_buf())));
    assert!(first.registry.initialize());
    first.registry.shutdown();

    write_legacy(legacy.path(), terminal::LEGACY_FILE, "alias_new=echo new\n");

    let second = build_registry_on(
        first.stores.clone(),
        first.protected.clone(),
        config(true, Some(legacy.path().to_path_buf())),
    );
    assert!(second.registry.initialize());

    let aliases = second
        .registry
        .module::<TerminalModule>()
        .expect("terminal")
        .get_all_aliases()
        .expect("aliases");
    assert!(aliases.contains_key("ll"));
    assert!(!aliases.contains_key("new"));
}

#[tokio::test]
async fn test_missing_legacy_file_leaves_marker_unset() {
    print_test_header(
        "test_missing_legacy_file_leaves_marker_unset",
        &["Verify no legacy file means no migration and no marker."],
    );

    let legacy = tempfile::tempdir().expect("tempdir");
    let test = build_registry(config(true, Some(legacy.path().to_path_buf())));
    assert!(test.registry.initialize());

    let terminal = test.registry.module::<TerminalModule>().expect("terminal");
    assert!(!is_migrated(terminal.as_ref()).expect("marker"));
    assert!(terminal.get_all_aliases().expect("aliases").is_empty());
    assert_eq!(
        test.stores
            .store(&marker_namespace(terminal::MODULE_ID))
            .get(MIGRATED_KEY)
            .expect("marker read"),
        None
    );

    println!("\n📝 Stage 2: File appears later and migrates on reload");
    write_legacy(legacy.path(), terminal::LEGACY_FILE, TERMINAL_LEGACY);
    assert!(test.registry.reload_all(ExecMode::Sync));
    assert_eq!(terminal.get_all_aliases().expect("aliases").len(), 2);
    assert!(is_migrated(terminal.as_ref()).expect("marker"));
}

#[tokio::test]
async fn test_build_tagged_migration_routes_password_to_protected_store() {
    print_test_header(
        "test_build_tagged_migration_routes_password_to_protected_store",
        &[
            "Verify the tagged legacy build file migrates typed values",
            "and its signing password lands only in the protected store.",
        ],
    );

    let legacy = tempfile::tempdir().expect("tempdir");
    write_legacy(
        legacy.path(),
        build::LEGACY_FILE,
        "<build>\n  <build_command>cargo build &amp;&amp; strip</build_command>\n  <parallel_jobs>16</parallel_jobs>\n  <clean_before_build>true</clean_before_build>\n  <signing_key_password>pa55</signing_key_password>\n</build>\n",
    );

    let test = build_registry(config(true, Some(legacy.path().to_path_buf())));
    assert!(test.registry.initialize());
    let module = test.registry.module::<BuildModule>().expect("build");

    assert_eq!(module.build_command().expect("command"), "cargo build && strip");
    assert_eq!(module.parallel_jobs().expect("jobs"), 16);
    assert!(module
        .base()
        .get_bool(build::keys::CLEAN_BEFORE_BUILD, false)
        .expect("clean"));

    assert_eq!(
        test.protected
            .get("build/signing_key_password")
            .expect("protected read")
            .as_deref(),
        Some("pa55")
    );
    assert_eq!(
        test.stores
            .store(build::MODULE_ID)
            .get(build::keys::SIGNING_KEY_PASSWORD)
            .expect("plain read"),
        None
    );

    let rendered = module.to_legacy_format().expect("render");
    println!("   Rendered legacy:\n{}", rendered);
    assert!(rendered.contains("<build_command>cargo build &amp;&amp; strip</build_command>"));
    assert!(!rendered.contains("pa55"));
}

#[tokio::test]
async fn test_migration_persists_across_file_backed_restart() {
    print_test_header(
        "test_migration_persists_across_file_backed_restart",
        &[
            "Verify migrated aliases and the marker survive a restart on file stores,",
            "and a deleted legacy file does not lose data.",
        ],
    );

    let data = tempfile::tempdir().expect("data dir");
    let legacy = tempfile::tempdir().expect("legacy dir");
    write_legacy(legacy.path(), terminal::LEGACY_FILE, TERMINAL_LEGACY);

    let cfg = RegistryConfig {
        data_dir: Some(data.path().to_path_buf()),
        legacy_dir: Some(legacy.path().to_path_buf()),
        ..RegistryConfig::default()
    };

    {
        let registry = Registry::new(RegistryEnv::from_config(cfg.clone()).expect("env"))
            .expect("registry");
        assert!(registry.initialize());
        registry.shutdown();
    }
    assert!(data.path().join("terminal.json").exists());
    assert!(data.path().join("terminal.legacy.json").exists());

    std::fs::remove_file(legacy.path().join(terminal::LEGACY_FILE)).expect("remove legacy");

    let registry =
        Registry::new(RegistryEnv::from_config(cfg).expect("env")).expect("registry");
    assert!(registry.initialize());
    let terminal = registry.module::<TerminalModule>().expect("terminal");
    assert_eq!(
        terminal.get_alias("gs").expect("alias").as_deref(),
        Some("git status")
    );
    assert!(is_migrated(terminal.as_ref()).expect("marker"));
    registry.shutdown();
}

#[tokio::test]
async fn test_explicit_legacy_import_participates_in_notifications() {
    print_test_header(
        "test_explicit_legacy_import_participates_in_notifications",
        &["Verify import_from_legacy_format marks the module dirty and notifies listeners."],
    );

    let test = build_registry(config(true, None));
    assert!(test.registry.initialize());
    let log = EventLog::default();
    log.attach(&test.registry);

    let terminal = test.registry.module::<TerminalModule>().expect("terminal");
    let applied = terminal
        .import_from_legacy_format("alias_k=kubectl\ncursor_style=BAR\n")
        .expect("legacy import");
    assert_eq!(applied, 2);
    assert!(terminal.is_dirty());

    test.registry.wait_idle().await.expect("wait idle");
    let events = log.events();
    assert_eq!(events.len(), 2);
    assert_eq!(
        terminal.base().get_string(terminal::keys::CURSOR_STYLE, "").expect("cursor"),
        "bar"
    );
    assert_eq!(
        test.registry.get_setting(terminal::MODULE_ID, "alias_k"),
        Some(SettingValue::from("kubectl"))
    );
}

#[test]
fn test_marker_store_is_separate_namespace() {
    let stores = Arc::new(CountingStoreFactory::new());
    let protected = Arc::new(MemoryProtectedStore::new());
    let test = build_registry_on(stores.clone(), protected, config(true, None));
    assert!(test.registry.initialize());
    assert!(stores
        .store(&marker_namespace(terminal::MODULE_ID))
        .get_all()
        .expect("markers")
        .is_empty());
}
