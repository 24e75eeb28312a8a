//! End-to-end workflows through the command line

use crate::common::{assertions, sample_data, CliTestRunner};
use orpheus::{Artifact, OrpheusError};
use std::fs;

#[test]
fn test_file_edit_cycle() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture.create_csv("sales.csv", &sample_data::sales_rows()).unwrap();
    fixture.create_file("schema.txt", sample_data::sales_schema()).unwrap();

    runner.expect_success(&["init", "sales.csv", "sales", "-s", "schema.txt", "--header"]);
    runner.expect_success(&["checkout", "sales", "-V", "1", "-f", "work.csv", "--header"]);

    let work = fixture.root().join("work.csv");
    assert_eq!(fixture.read_lines(&work).unwrap(), vec!["id,name", "1,a", "2,b"]);
    fs::write(&work, "id,name\n1,a\n2,b\n3,c\n").unwrap();

    runner.expect_success(&["commit", "-m", "add c", "-f", "work.csv", "--header"]);
    runner.expect_success(&["checkout", "sales", "-V", "2", "-t", "latest"]);
    runner.expect_success(&["ls", "-d", "sales"]);

    let engine = fixture.engine().unwrap();
    let version = engine.get_version("sales", 2).unwrap();
    assert_eq!(version.message, "add c");
    assert_eq!(version.parent_vids, vec![1]);
    assert_eq!(
        assertions::table_rows(&engine, "latest", &["id", "name"]),
        vec!["1|a", "2|b", "3|c"]
    );
    assertions::assert_record_count_invariant(&engine, "sales");
}

#[test]
fn test_table_merge_cycle() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture.create_csv("sales.csv", &sample_data::sales_rows()).unwrap();
    fixture.create_file("schema.txt", sample_data::sales_schema()).unwrap();
    runner.expect_success(&["init", "sales.csv", "sales", "-s", "schema.txt", "--header"]);

    runner.expect_success(&["checkout", "sales", "-V", "1", "-t", "branch_a"]);
    runner.expect_success(&["checkout", "sales", "-V", "1", "-t", "branch_b"]);
    {
        let engine = fixture.engine().unwrap();
        engine
            .connection()
            .execute_batch("INSERT INTO branch_a VALUES (3, 'c'); DELETE FROM branch_b WHERE id = 2")
            .unwrap();
    }
    runner.expect_success(&["commit", "-m", "left", "-t", "branch_a"]);
    runner.expect_success(&["commit", "-m", "right", "-t", "branch_b"]);
    runner.expect_success(&["checkout", "sales", "--vlist", "2,3", "-t", "merged"]);
    runner.expect_success(&["commit", "-m", "merge", "-t", "merged"]);

    let engine = fixture.engine().unwrap();
    let merge = engine.get_version("sales", 4).unwrap();
    assert_eq!(merge.parent_vids, vec![2, 3]);
    assert_eq!(merge.record_count, 3);
    assert_eq!(engine.tracker().merged_artifacts().unwrap(), vec!["merged".to_string()]);
}

#[test]
fn test_clean_then_commit_has_no_lineage() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture.create_csv("sales.csv", &sample_data::sales_rows()).unwrap();
    fixture.create_file("schema.txt", sample_data::sales_schema()).unwrap();
    runner.expect_success(&["init", "sales.csv", "sales", "-s", "schema.txt", "--header"]);
    runner.expect_success(&["checkout", "sales", "-V", "1", "-t", "t"]);

    runner.expect_success(&["clean"]);
    assert!(matches!(
        runner.expect_failure(&["commit", "-m", "orphan", "-t", "t"]),
        OrpheusError::NoLineage { .. }
    ));

    let engine = fixture.engine().unwrap();
    assert!(engine.lineage(&Artifact::table("t")).is_err());
    assert_eq!(engine.list_versions("sales").unwrap().len(), 1);
}

#[test]
fn test_principal_from_flag_and_missing_user() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture.create_csv("sales.csv", &sample_data::sales_rows()).unwrap();
    fixture.create_file("schema.txt", sample_data::sales_schema()).unwrap();

    runner.expect_success(&["--user", "bob", "init", "sales.csv", "sales", "-s", "schema.txt", "--header"]);
    runner.expect_success(&["--user", "bob", "checkout", "sales", "-V", "1", "-t", "bobs"]);
    {
        let engine = fixture.engine().unwrap();
        assert_eq!(engine.describe_dataset("sales").unwrap().owner, "bob");
        assert_eq!(engine.grants_for("bobs").unwrap()[0].principal, "bob");
    }

    // Clear the stored user; without a flag or environment there is no principal
    let mut config = fixture.workspace.load_config().unwrap();
    config.user = None;
    fixture.workspace.save_config(&config).unwrap();
    if std::env::var(orpheus::workspace::USER_ENV).is_err() {
        assert!(matches!(
            runner.expect_failure(&["ls"]),
            OrpheusError::Config { .. }
        ));
    }
}
