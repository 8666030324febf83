//! Run summary printed at the end of every run

use serde::Serialize;
use std::fmt;

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Files matched by the walk
    pub files_scanned: usize,
    /// Files whose modification time differed from the cache
    pub files_changed: usize,
    /// Files rewritten (or that would be, in a dry run)
    pub files_modified: usize,
    pub ids_minted: usize,
    /// Identifiers known at the end of the run, pre-existing and minted
    pub ids_known: usize,
    pub duplicates: Vec<String>,
    pub elapsed_ms: u128,
    pub dry_run: bool,
}

impl RunReport {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modified_label = if self.dry_run {
            "would modify"
        } else {
            "modified"
        };
        writeln!(
            f,
            "{} files scanned, {} changed, {} {}",
            self.files_scanned, self.files_changed, modified_label, self.files_modified
        )?;
        writeln!(
            f,
            "{} new identifiers, {} known identifiers",
            self.ids_minted, self.ids_known
        )?;
        if self.has_duplicates() {
            writeln!(
                f,
                "{} duplicate identifiers: {}",
                self.duplicates.len(),
                self.duplicates.join(", ")
            )?;
        }
        write!(f, "done in {} ms", self.elapsed_ms)
    }
}
