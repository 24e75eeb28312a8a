//! Command implementations for orpheus CLI

use crate::backend;
use crate::checkout::{CheckoutOptions, Destination};
use crate::cli::{Commands, OutputFormat};
use crate::diff::CommitSource;
use crate::engine::{InitSource, VersionEngine};
use crate::error::{OrpheusError, Result};
use crate::output::{OutputManager, PrettyPrinter};
use crate::progress::ProgressReporter;
use crate::provenance::ProvenanceTracker;
use crate::schema;
use crate::workspace::OrpheusWorkspace;
use std::path::{Path, PathBuf};

/// Execute a command
pub fn execute_command(command: Commands, workspace_path: Option<&Path>, user: Option<&str>) -> Result<()> {
    match command {
        Commands::Config { user: new_user } => config_command(workspace_path, &new_user),
        Commands::Whoami => whoami_command(workspace_path, user),
        Commands::Init {
            input,
            dataset,
            table,
            schema,
            from_table,
            header,
            delimiter,
            key,
        } => init_command(
            workspace_path,
            user,
            &input,
            &dataset,
            InitInputs {
                table,
                schema,
                from_table,
                header,
                delimiter,
            },
            &key,
        ),
        Commands::Drop { dataset, yes } => drop_command(workspace_path, user, &dataset, yes),
        Commands::Ls { dataset, format } => ls_command(workspace_path, user, dataset.as_deref(), &format),
        Commands::Checkout {
            dataset,
            vlist,
            table,
            file,
            delimiter,
            header,
            ignore,
        } => checkout_command(
            workspace_path,
            user,
            &dataset,
            &vlist,
            table,
            file,
            delimiter,
            header,
            ignore,
        ),
        Commands::Commit {
            message,
            table,
            file,
            delimiter,
            header,
        } => commit_command(workspace_path, user, &message, table, file, delimiter, header),
        Commands::Clean => clean_command(workspace_path),
    }
}

/// How `init` should read its input
struct InitInputs {
    table: Option<String>,
    schema: Option<PathBuf>,
    from_table: bool,
    header: bool,
    delimiter: Option<String>,
}

fn open_engine(workspace: &OrpheusWorkspace, user: Option<&str>) -> Result<VersionEngine> {
    let principal = workspace.resolve_user(user)?;
    VersionEngine::open(workspace, &principal)
}

fn delimiter_or_default(workspace: &OrpheusWorkspace, delimiter: Option<String>) -> Result<String> {
    let delimiter = match delimiter {
        Some(d) => d,
        None => workspace.load_config()?.default_delimiter,
    };
    if delimiter.is_empty() {
        return Err(OrpheusError::bad_parameters("Delimiter is empty"));
    }
    Ok(delimiter)
}

/// Store the workspace user
fn config_command(workspace_path: Option<&Path>, user: &str) -> Result<()> {
    let workspace = OrpheusWorkspace::find_or_create(workspace_path)?;
    workspace.set_user(user)?;
    println!("✅ Commands in {} now run as '{}'", workspace.root.display(), user.trim());
    Ok(())
}

/// Print the acting user
fn whoami_command(workspace_path: Option<&Path>, user: Option<&str>) -> Result<()> {
    let workspace = OrpheusWorkspace::find_or_create(workspace_path)?;
    println!("{}", workspace.resolve_user(user)?);
    Ok(())
}

/// Create a dataset
fn init_command(
    workspace_path: Option<&Path>,
    user: Option<&str>,
    input: &str,
    dataset: &str,
    inputs: InitInputs,
    key: &[String],
) -> Result<()> {
    let workspace = OrpheusWorkspace::find_or_create(workspace_path)?;
    let engine = open_engine(&workspace, user)?;

    let source = if inputs.from_table {
        if inputs.table.is_some() || inputs.schema.is_some() {
            return Err(OrpheusError::bad_parameters(
                "--from-table cannot be combined with -t or -s",
            ));
        }
        InitSource::Table(input.to_string())
    } else {
        let attributes = match (inputs.table, inputs.schema) {
            (Some(table), None) => backend::describe_table(engine.connection(), &table)?,
            (None, Some(schema_path)) => schema::parse_schema_file(&workspace.resolve_path(&schema_path))?,
            _ => {
                return Err(OrpheusError::bad_parameters(
                    "Describe the input file with exactly one of -t TABLE or -s SCHEMA_FILE",
                ))
            }
        };
        InitSource::File {
            path: workspace.resolve_path(Path::new(input)),
            attributes,
            header: inputs.header,
            delimiter: delimiter_or_default(&workspace, inputs.delimiter)?,
        }
    };

    let mut progress = ProgressReporter::new(&format!("Loading {} into dataset '{}'...", input, dataset));
    let outcome = engine.init_dataset(&source, dataset, key)?;
    progress.finish(&format!("Loaded {} records", outcome.record_count));

    PrettyPrinter::print_init_outcome(&outcome);
    Ok(())
}

/// Remove a dataset
fn drop_command(workspace_path: Option<&Path>, user: Option<&str>, dataset: &str, yes: bool) -> Result<()> {
    let workspace = OrpheusWorkspace::find_or_create(workspace_path)?;
    let engine = open_engine(&workspace, user)?;

    if !yes {
        println!("⚠️  This removes dataset '{}' and its whole history. Continue? (y/N)", dataset);
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !answer.trim().to_lowercase().starts_with('y') {
            return Err(OrpheusError::Cancelled);
        }
    }

    if engine.drop_dataset(dataset)? {
        println!("✅ Dropped dataset '{}'", dataset);
    } else {
        println!("Dataset '{}' does not exist; nothing to drop", dataset);
    }
    Ok(())
}

/// List datasets or describe one
fn ls_command(workspace_path: Option<&Path>, user: Option<&str>, dataset: Option<&str>, format: &str) -> Result<()> {
    let workspace = OrpheusWorkspace::find_or_create(workspace_path)?;
    let engine = open_engine(&workspace, user)?;

    let output_format = OutputFormat::parse(format).map_err(OrpheusError::bad_parameters)?;
    let output_manager = OutputManager::new(output_format);

    match dataset {
        Some(name) => output_manager.output_dataset_description(&engine.describe_dataset(name)?),
        None => output_manager.output_dataset_list(&engine.list_datasets()?),
    }
}

/// Materialize versions
#[allow(clippy::too_many_arguments)]
fn checkout_command(
    workspace_path: Option<&Path>,
    user: Option<&str>,
    dataset: &str,
    vlist: &[i64],
    table: Option<String>,
    file: Option<PathBuf>,
    delimiter: Option<String>,
    header: bool,
    ignore: bool,
) -> Result<()> {
    let workspace = OrpheusWorkspace::find_or_create(workspace_path)?;
    let destination = match (table, file) {
        (Some(table), None) => Destination::Table(table),
        (None, Some(file)) => Destination::File(workspace.resolve_path(&file)),
        _ => {
            return Err(OrpheusError::bad_parameters(
                "Check out to exactly one of -t TABLE or -f FILE",
            ))
        }
    };
    let options = CheckoutOptions {
        delimiter: delimiter_or_default(&workspace, delimiter)?,
        header,
        ignore,
    };
    let engine = open_engine(&workspace, user)?;

    let mut progress = ProgressReporter::new(&format!("Checking out {} {:?}...", dataset, vlist));
    let outcome = engine.checkout(dataset, vlist, &destination, &options)?;
    progress.finish(&format!("Wrote {} rows", outcome.rows_written));

    PrettyPrinter::print_checkout_outcome(&outcome);
    Ok(())
}

/// Record a new version
fn commit_command(
    workspace_path: Option<&Path>,
    user: Option<&str>,
    message: &str,
    table: Option<String>,
    file: Option<PathBuf>,
    delimiter: Option<String>,
    header: bool,
) -> Result<()> {
    let workspace = OrpheusWorkspace::find_or_create(workspace_path)?;
    let source = match (table, file) {
        (Some(table), None) => CommitSource::Table(table),
        (None, Some(file)) => CommitSource::File {
            path: workspace.resolve_path(&file),
            header,
            delimiter: delimiter_or_default(&workspace, delimiter)?,
        },
        _ => {
            return Err(OrpheusError::bad_parameters(
                "Commit exactly one of -t TABLE or -f FILE",
            ))
        }
    };
    let engine = open_engine(&workspace, user)?;

    let mut progress = ProgressReporter::new("Comparing against recorded versions...");
    let outcome = engine.commit(message, &source)?;
    progress.finish(&format!("Version {} recorded", outcome.vid));

    PrettyPrinter::print_commit_outcome(&outcome);
    Ok(())
}

/// Forget all checkout lineage
fn clean_command(workspace_path: Option<&Path>) -> Result<()> {
    let workspace = OrpheusWorkspace::find_or_create(workspace_path)?;
    ProvenanceTracker::new(workspace.meta_info_path()?).reset()?;
    println!("✅ Cleared checkout lineage in {}", workspace.orpheus_dir.display());
    Ok(())
}
