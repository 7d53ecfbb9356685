//! Safety utilities to prevent accidental overwrite of input datasets.
//!
//! The report writer truncates its target, so the output path is checked
//! against the CSV inputs before anything is loaded.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output cannot be the same as any of the provided source paths
/// - Output cannot be a `.csv` file (inputs are CSV, the report is JSON)
pub fn validate_output_path(output: &Path, source_paths: &[&Path]) -> Result<()> {
    for source in source_paths {
        if same_file(output, source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    let is_csv = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        bail!(
            "Safety check failed: output '{}' looks like a CSV dataset",
            output.display()
        );
    }

    Ok(())
}

/// Path equality, resolving both sides when they exist on disk.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
