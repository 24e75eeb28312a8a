//! Unit tests for workspace management

use crate::common::TestFixture;
use orpheus::workspace::{WorkspaceConfig, WORKSPACE_DIR};
use orpheus::OrpheusWorkspace;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_file_layout() {
    let fixture = TestFixture::new().unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(fixture.workspace.config_path()).unwrap()).unwrap();

    for key in ["version", "created", "user", "database", "meta_info", "default_delimiter"] {
        assert!(raw.get(key).is_some(), "config should contain '{}'", key);
    }
    assert_eq!(raw["version"], orpheus::FORMAT_VERSION);
    assert_eq!(raw["default_delimiter"], ",");
}

#[test]
fn test_create_new_keeps_existing_config() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = OrpheusWorkspace::create_new(temp_dir.path().to_path_buf()).unwrap();
    workspace.set_user("dave").unwrap();

    let again = OrpheusWorkspace::create_new(temp_dir.path().to_path_buf()).unwrap();
    assert_eq!(again.load_config().unwrap().user.as_deref(), Some("dave"));
}

#[test]
fn test_custom_store_locations() {
    let fixture = TestFixture::new().unwrap();
    let config = WorkspaceConfig {
        database: "custom.duckdb".to_string(),
        meta_info: "lineage.json".to_string(),
        ..fixture.workspace.load_config().unwrap()
    };
    fixture.workspace.save_config(&config).unwrap();

    assert_eq!(
        fixture.workspace.database_path().unwrap(),
        fixture.root().join(WORKSPACE_DIR).join("custom.duckdb")
    );
    assert_eq!(
        fixture.workspace.meta_info_path().unwrap(),
        fixture.root().join(WORKSPACE_DIR).join("lineage.json")
    );
}

#[test]
fn test_invalid_config_is_a_config_error() {
    let fixture = TestFixture::new().unwrap();
    fs::write(fixture.workspace.config_path(), "{ not json").unwrap();
    assert!(matches!(
        fixture.workspace.load_config(),
        Err(orpheus::OrpheusError::Config { .. })
    ));
}

#[test]
fn test_gitignore_is_extended_once() {
    let temp_dir = TempDir::new().unwrap();
    let gitignore = temp_dir.path().join(".gitignore");
    fs::write(&gitignore, "# Existing content\n*.log\n").unwrap();

    let workspace = OrpheusWorkspace::create_new(temp_dir.path().to_path_buf()).unwrap();
    workspace.ensure_gitignore().unwrap();

    let content = fs::read_to_string(&gitignore).unwrap();
    assert!(content.contains("*.log"));
    assert_eq!(content.matches(".orpheus/*.duckdb\n").count(), 1);
}

#[test]
fn test_walk_stops_at_git_root() {
    let temp_dir = TempDir::new().unwrap();
    OrpheusWorkspace::create_new(temp_dir.path().to_path_buf()).unwrap();
    let repo = temp_dir.path().join("repo");
    fs::create_dir_all(repo.join(".git")).unwrap();

    let workspace = OrpheusWorkspace::find_or_create(Some(&repo)).unwrap();
    assert_eq!(workspace.root, repo);
    assert!(repo.join(WORKSPACE_DIR).is_dir());
}
