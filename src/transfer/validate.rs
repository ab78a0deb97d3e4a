use serde::Serialize;
use tracing::{info, warn};

use super::scan::approximate_count;
use crate::error::Error;
use crate::store::TableStore;

/// Item counts of both sides of a copy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Approximate count of the source table
    pub source_count: u64,
    /// Approximate count of the destination table
    pub dest_count: u64,
}

impl ValidationReport {
    /// Whether both counts agree
    pub fn is_match(&self) -> bool {
        self.source_count == self.dest_count
    }

    /// Absolute difference between the counts
    pub fn difference(&self) -> u64 {
        self.source_count.abs_diff(self.dest_count)
    }
}

/// Compare the approximate item counts of two tables
///
/// Counts come from `DescribeTable` and may lag recent writes, so a mismatch
/// is advisory. Lookup failures are returned to the caller.
pub async fn validate_copy<S, D>(
    source: &S,
    source_table: &str,
    dest: &D,
    dest_table: &str,
) -> Result<ValidationReport, Error>
where
    S: TableStore + ?Sized,
    D: TableStore + ?Sized,
{
    let report = ValidationReport {
        source_count: approximate_count(source, source_table).await?,
        dest_count: approximate_count(dest, dest_table).await?,
    };

    if report.is_match() {
        info!(
            source_table,
            dest_table,
            items = report.source_count,
            "Item counts match"
        );
    } else {
        warn!(
            source_table,
            dest_table,
            source_count = report.source_count,
            dest_count = report.dest_count,
            "Item counts differ"
        );
    }

    Ok(report)
}
