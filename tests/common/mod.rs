//! Common test utilities and helpers

use orpheus::engine::InitOutcome;
use orpheus::schema::Attribute;
use orpheus::{InitSource, OrpheusWorkspace, Result, VersionEngine};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Principal used by fixtures unless a test says otherwise
pub const TEST_USER: &str = "alice";

/// Test fixture manager for creating temporary test environments
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub workspace: OrpheusWorkspace,
}

impl TestFixture {
    /// Create a new test fixture with an initialized workspace and user
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let workspace = OrpheusWorkspace::create_new(temp_dir.path().to_path_buf())?;
        workspace.set_user(TEST_USER)?;

        Ok(Self { temp_dir, workspace })
    }

    /// Get the root path of the test fixture
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Open the workspace's version store as the default user.
    ///
    /// DuckDB allows one open database per file, so drop the engine before
    /// running CLI commands against the same fixture.
    pub fn engine(&self) -> Result<VersionEngine> {
        VersionEngine::open(&self.workspace, TEST_USER)
    }

    pub fn engine_as(&self, user: &str) -> Result<VersionEngine> {
        VersionEngine::open(&self.workspace, user)
    }

    /// Create a test CSV file with sample data
    pub fn create_csv(&self, name: &str, data: &[Vec<&str>]) -> Result<PathBuf> {
        let mut content = String::new();
        for row in data {
            content.push_str(&row.join(","));
            content.push('\n');
        }
        self.create_file(name, &content)
    }

    /// Create a file with raw string content
    pub fn create_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.root().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Lines of a text file
    pub fn read_lines(&self, path: &Path) -> Result<Vec<String>> {
        Ok(fs::read_to_string(path)?.lines().map(str::to_string).collect())
    }

    /// Create the `sales` dataset from `[(1, "a"), (2, "b")]`
    pub fn init_sales(&self, engine: &VersionEngine) -> Result<InitOutcome> {
        let path = self.create_csv("sales.csv", &sample_data::sales_rows())?;
        engine.init_dataset(
            &InitSource::File {
                path,
                attributes: sample_data::sales_attributes(),
                header: true,
                delimiter: ",".to_string(),
            },
            "sales",
            &[],
        )
    }
}

/// Helper for running CLI commands in tests
pub struct CliTestRunner {
    fixture: TestFixture,
}

impl CliTestRunner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fixture: TestFixture::new()?,
        })
    }

    pub fn fixture(&self) -> &TestFixture {
        &self.fixture
    }

    /// Run an orpheus command and return the result
    pub fn run_command(&self, args: &[&str]) -> Result<()> {
        use clap::Parser;
        use orpheus::cli::Cli;
        use orpheus::commands::execute_command;

        let mut cmd_args = vec!["orpheus"];
        cmd_args.extend(args);

        let cli = Cli::try_parse_from(cmd_args)
            .map_err(|e| orpheus::OrpheusError::bad_parameters(e.to_string()))?;

        // Without --workspace the fixture root is the workspace
        let workspace_path = cli.workspace.as_deref().or(Some(self.fixture.root()));
        execute_command(cli.command, workspace_path, cli.user.as_deref())
    }

    /// Run a command and expect it to succeed
    pub fn expect_success(&self, args: &[&str]) {
        if let Err(e) = self.run_command(args) {
            panic!("Command {:?} should succeed: {}", args, e);
        }
    }

    /// Run a command and expect it to fail
    pub fn expect_failure(&self, args: &[&str]) -> orpheus::OrpheusError {
        self.run_command(args).expect_err("Command should fail")
    }
}

/// Sample data generators for testing
pub mod sample_data {
    use orpheus::schema::Attribute;

    pub fn sales_rows() -> Vec<Vec<&'static str>> {
        vec![vec!["id", "name"], vec!["1", "a"], vec!["2", "b"]]
    }

    pub fn sales_attributes() -> Vec<Attribute> {
        vec![Attribute::new("id", "INTEGER"), Attribute::new("name", "VARCHAR")]
    }

    pub fn sales_schema() -> &'static str {
        "# sales\nid INTEGER\nname VARCHAR\n"
    }

    pub fn products_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["id", "name", "price"],
            vec!["1", "Apple", "1.50"],
            vec!["2", "Banana", "0.75"],
            vec!["3", "Cherry", "2.00"],
        ]
    }

    pub fn products_schema() -> &'static str {
        "id INTEGER\nname VARCHAR\nprice DECIMAL(10,2)\n"
    }
}

/// Assertion helpers for test validation
pub mod assertions {
    use orpheus::VersionEngine;

    /// Every version's stored record count equals its membership size
    pub fn assert_record_count_invariant(engine: &VersionEngine, dataset: &str) {
        for version in engine.list_versions(dataset).unwrap() {
            let members = engine.record_set(dataset, &[version.vid]).unwrap();
            assert_eq!(
                version.record_count,
                members.len() as u64,
                "record_count of version {} disagrees with its membership",
                version.vid
            );
            assert_eq!(
                engine.membership_count(dataset, version.vid).unwrap(),
                version.record_count
            );
        }
    }

    /// Rows of a table as `col1|col2|...` strings, in storage order
    pub fn table_rows(engine: &VersionEngine, table: &str, columns: &[&str]) -> Vec<String> {
        let select = columns
            .iter()
            .map(|c| format!("COALESCE(CAST(\"{}\" AS VARCHAR), 'NULL')", c))
            .collect::<Vec<_>>()
            .join(" || '|' || ");
        let mut stmt = engine
            .connection()
            .prepare(&format!("SELECT {} FROM \"{}\"", select, table))
            .unwrap();
        let rows = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
        rows.map(|r| r.unwrap()).collect()
    }

    /// Number of rows in a table
    pub fn row_count(engine: &VersionEngine, table: &str) -> i64 {
        engine
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| row.get(0))
            .unwrap()
    }
}

/// Attributes shorthand used by table-driven tests
pub fn attrs(pairs: &[(&str, &str)]) -> Vec<Attribute> {
    pairs.iter().map(|(n, t)| Attribute::new(*n, *t)).collect()
}
