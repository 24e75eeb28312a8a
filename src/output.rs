//! Output formatting utilities

use crate::checkout::CheckoutOutcome;
use crate::cli::OutputFormat;
use crate::dataset::{DatasetDescription, DatasetEntry};
use crate::diff::CommitOutcome;
use crate::engine::InitOutcome;
use crate::error::Result;

/// Pretty printer for orpheus output
pub struct PrettyPrinter;

impl PrettyPrinter {
    pub fn print_dataset_list(datasets: &[DatasetEntry]) {
        if datasets.is_empty() {
            println!("No datasets found.");
            return;
        }

        println!("📚 Datasets:");
        for (i, dataset) in datasets.iter().enumerate() {
            let prefix = if i == datasets.len() - 1 { "└─" } else { "├─" };
            println!(
                "{} {} (owner: {}, created: {})",
                prefix,
                dataset.name,
                dataset.owner,
                dataset.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    pub fn print_dataset_description(description: &DatasetDescription) {
        println!("📚 Dataset: {}", description.name);
        println!("├─ Owner: {}", description.owner);
        println!("├─ Created: {}", description.created_at.to_rfc3339());
        if description.key.is_empty() {
            println!("├─ Key: (none)");
        } else {
            println!("├─ Key: {}", description.key.join(", "));
        }
        println!(
            "├─ Attributes: {}",
            description
                .attributes
                .iter()
                .map(|a| format!("{} {}", a.name, a.data_type))
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("├─ Records stored: {}", description.record_store_size);
        println!("└─ Versions:");

        for (i, node) in description.versions.iter().enumerate() {
            let last = i == description.versions.len() - 1;
            let prefix = if last { "   └─" } else { "   ├─" };
            let cont = if last { "      " } else { "   │  " };
            let version = &node.version;
            println!(
                "{} v{} by {} at {}: {}",
                prefix,
                version.vid,
                version.author,
                version.created_at.format("%Y-%m-%d %H:%M:%S"),
                version.message
            );
            println!("{}records: {}", cont, version.record_count);
            if !version.parent_vids.is_empty() {
                println!("{}parents: {}", cont, join_vids(&version.parent_vids));
            }
            if !node.children.is_empty() {
                println!("{}children: {}", cont, join_vids(&node.children));
            }
        }
    }

    pub fn print_init_outcome(outcome: &InitOutcome) {
        println!("✅ Dataset '{}' created", outcome.dataset);
        println!("├─ Version: {}", outcome.root_vid);
        println!("├─ Records: {}", outcome.record_count);
        println!("└─ Attributes: {}", outcome.attributes.len());
    }

    pub fn print_checkout_outcome(outcome: &CheckoutOutcome) {
        println!(
            "✅ Checked out {} version(s) {} to {}",
            outcome.dataset,
            join_vids(&outcome.vids),
            outcome.destination
        );
        if outcome.rows_skipped > 0 {
            println!("├─ Rows written: {}", outcome.rows_written);
            println!("└─ Rows skipped: {}", outcome.rows_skipped);
        } else {
            println!("└─ Rows written: {}", outcome.rows_written);
        }
    }

    pub fn print_commit_outcome(outcome: &CommitOutcome) {
        println!("✅ Committed version {} of {}", outcome.vid, outcome.dataset);
        println!("├─ Parents: {}", join_vids(&outcome.parent_vids));
        println!("├─ Unchanged records: {}", outcome.existing_rids.len());
        println!("├─ New records: {}", outcome.new_rids.len());
        println!("└─ Total records: {}", outcome.record_count);
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}

/// Routes listings to the selected output format
pub struct OutputManager {
    format: OutputFormat,
}

impl OutputManager {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn output_dataset_list(&self, datasets: &[DatasetEntry]) -> Result<()> {
        match self.format {
            OutputFormat::Pretty => PrettyPrinter::print_dataset_list(datasets),
            OutputFormat::Json => println!("{}", JsonFormatter::format(datasets)?),
        }
        Ok(())
    }

    pub fn output_dataset_description(&self, description: &DatasetDescription) -> Result<()> {
        match self.format {
            OutputFormat::Pretty => PrettyPrinter::print_dataset_description(description),
            OutputFormat::Json => println!("{}", JsonFormatter::format(description)?),
        }
        Ok(())
    }
}

fn join_vids(vids: &[i64]) -> String {
    vids.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}
