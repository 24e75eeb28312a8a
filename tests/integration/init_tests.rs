//! Integration tests for dataset creation, listing and removal

use crate::common::{assertions, attrs, sample_data, CliTestRunner, TestFixture};
use orpheus::{Artifact, InitSource, OrpheusError};

#[test]
fn test_init_from_file_creates_root_version() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();

    let outcome = fixture.init_sales(&engine).unwrap();
    assert_eq!(outcome.dataset, "sales");
    assert_eq!(outcome.root_vid, 1);
    assert_eq!(outcome.record_count, 2);

    let root = engine.get_version("sales", 1).unwrap();
    assert!(root.parent_vids.is_empty());
    assert_eq!(root.author, "alice");
    assert_eq!(root.record_count, 2);
    assert_eq!(engine.record_set("sales", &[1]).unwrap().len(), 2);
    assert_record_store(&engine, 2);
    assertions::assert_record_count_invariant(&engine, "sales");
}

#[test]
fn test_init_records_lineage_of_source() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();
    fixture.init_sales(&engine).unwrap();

    let lineage = engine.lineage(&Artifact::file(fixture.root().join("sales.csv"))).unwrap();
    assert_eq!(lineage.dataset, "sales");
    assert_eq!(lineage.vids, vec![1]);
}

#[test]
fn test_init_from_table() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();
    engine
        .connection()
        .execute_batch(
            "CREATE TABLE products (id INTEGER, name VARCHAR, price DECIMAL(10,2));
             INSERT INTO products VALUES (1, 'Apple', 1.50), (2, 'Banana', 0.75), (3, 'Cherry', 2.00);",
        )
        .unwrap();

    let outcome = engine
        .init_dataset(&InitSource::Table("products".to_string()), "products_ds", &["id".to_string()])
        .unwrap();
    assert_eq!(outcome.record_count, 3);
    assert_eq!(outcome.attributes.len(), 3);

    let description = engine.describe_dataset("products_ds").unwrap();
    assert_eq!(description.key, vec!["id".to_string()]);
    assert_eq!(description.attributes[2].name, "price");
    assert_eq!(description.attributes[2].data_type, "DECIMAL(10,2)");
}

#[test]
fn test_init_without_header_line() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();
    let path = fixture.create_file("raw.csv", "1|x\n2|y\n3|z\n").unwrap();

    let outcome = engine
        .init_dataset(
            &InitSource::File {
                path,
                attributes: attrs(&[("id", "INTEGER"), ("tag", "VARCHAR")]),
                header: false,
                delimiter: "|".to_string(),
            },
            "raw",
            &[],
        )
        .unwrap();
    assert_eq!(outcome.record_count, 3);
}

#[test]
fn test_init_existing_name_fails() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();
    fixture.init_sales(&engine).unwrap();

    let err = fixture.init_sales(&engine).unwrap_err();
    assert!(matches!(err, OrpheusError::DatasetExists { .. }));
    // The original dataset is untouched
    assert_eq!(engine.list_versions("sales").unwrap().len(), 1);
    assert_record_store(&engine, 2);
}

#[test]
fn test_init_rejects_bad_parameters() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();
    let path = fixture.create_csv("sales.csv", &sample_data::sales_rows()).unwrap();
    let source = InitSource::File {
        path: path.clone(),
        attributes: sample_data::sales_attributes(),
        header: true,
        delimiter: ",".to_string(),
    };

    assert!(matches!(
        engine.init_dataset(&source, "bad-name", &[]),
        Err(OrpheusError::BadParameters { .. })
    ));
    assert!(matches!(
        engine.init_dataset(&source, "sales", &["missing".to_string()]),
        Err(OrpheusError::BadParameters { .. })
    ));
    assert!(matches!(
        engine.init_dataset(
            &InitSource::File {
                path,
                attributes: attrs(&[("rid", "INTEGER")]),
                header: true,
                delimiter: ",".to_string(),
            },
            "sales",
            &[],
        ),
        Err(OrpheusError::BadParameters { .. })
    ));
    assert!(matches!(
        engine.init_dataset(&InitSource::Table("nope".to_string()), "sales", &[]),
        Err(OrpheusError::ArtifactNotFound { .. })
    ));
    assert!(engine.list_datasets().unwrap().is_empty());
}

#[test]
fn test_drop_dataset() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();
    fixture.init_sales(&engine).unwrap();

    assert!(engine.drop_dataset("sales").unwrap());
    assert!(!engine.drop_dataset("sales").unwrap());
    assert!(engine.list_datasets().unwrap().is_empty());

    // The name can be reused and numbering starts over
    let outcome = fixture.init_sales(&engine).unwrap();
    assert_eq!(outcome.root_vid, 1);
}

#[test]
fn test_drop_unknown_dataset_keeps_user_tables() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();
    engine
        .connection()
        .execute_batch("CREATE TABLE foo_version (note VARCHAR); INSERT INTO foo_version VALUES ('mine')")
        .unwrap();

    assert!(!engine.drop_dataset("foo").unwrap());
    assert_eq!(assertions::row_count(&engine, "foo_version"), 1);
    assert!(matches!(
        engine.drop_dataset("not-a-name"),
        Err(OrpheusError::BadParameters { .. })
    ));
}

#[test]
fn test_dataset_names_ignore_case() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();
    fixture.init_sales(&engine).unwrap();
    engine
        .connection()
        .execute_batch("CREATE TABLE src (id INTEGER, name VARCHAR)")
        .unwrap();

    assert!(matches!(
        engine.init_dataset(&InitSource::Table("src".to_string()), "Sales", &[]),
        Err(OrpheusError::DatasetExists { .. })
    ));
    assert_eq!(engine.list_datasets().unwrap().len(), 1);
    assert_eq!(engine.describe_dataset("SALES").unwrap().name, "sales");

    assert!(engine.drop_dataset("Sales").unwrap());
    assert!(engine.list_datasets().unwrap().is_empty());
    assert!(!orpheus::backend::table_exists(engine.connection(), "sales_datatable").unwrap());
}

#[test]
fn test_list_and_describe() {
    let fixture = TestFixture::new().unwrap();
    let engine = fixture.engine().unwrap();
    fixture.init_sales(&engine).unwrap();
    let path = fixture.create_csv("products.csv", &sample_data::products_rows()).unwrap();
    engine
        .init_dataset(
            &InitSource::File {
                path,
                attributes: orpheus::schema::parse_schema(sample_data::products_schema()).unwrap(),
                header: true,
                delimiter: ",".to_string(),
            },
            "products",
            &[],
        )
        .unwrap();

    let names: Vec<String> = engine.list_datasets().unwrap().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["products".to_string(), "sales".to_string()]);

    let description = engine.describe_dataset("products").unwrap();
    assert_eq!(description.owner, "alice");
    assert_eq!(description.record_store_size, 3);
    assert_eq!(description.versions.len(), 1);
    assert!(description.versions[0].children.is_empty());

    assert!(matches!(
        engine.describe_dataset("missing"),
        Err(OrpheusError::DatasetNotFound { .. })
    ));
}

#[test]
fn test_cli_init_ls_drop() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture.create_csv("sales.csv", &sample_data::sales_rows()).unwrap();
    fixture.create_file("schema.txt", sample_data::sales_schema()).unwrap();

    runner.expect_success(&["init", "sales.csv", "sales", "-s", "schema.txt", "--header", "-k", "id"]);
    runner.expect_success(&["ls"]);
    runner.expect_success(&["ls", "-d", "sales", "--format", "json"]);
    assert!(matches!(
        runner.expect_failure(&["init", "sales.csv", "sales", "-s", "schema.txt", "--header"]),
        OrpheusError::DatasetExists { .. }
    ));

    runner.expect_success(&["drop", "sales", "--yes"]);
    assert!(matches!(
        runner.expect_failure(&["ls", "-d", "sales"]),
        OrpheusError::DatasetNotFound { .. }
    ));
}

#[test]
fn test_cli_init_described_by_table() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture.create_csv("sales.csv", &sample_data::sales_rows()).unwrap();
    {
        let engine = fixture.engine().unwrap();
        engine
            .connection()
            .execute_batch("CREATE TABLE sales_shape (id INTEGER, name VARCHAR)")
            .unwrap();
    }

    runner.expect_success(&["init", "sales.csv", "sales", "-t", "sales_shape", "--header"]);

    let engine = fixture.engine().unwrap();
    assert_eq!(engine.get_version("sales", 1).unwrap().record_count, 2);
}

fn assert_record_store(engine: &orpheus::VersionEngine, expected: i64) {
    assert_eq!(assertions::row_count(engine, "sales_datatable"), expected);
}
