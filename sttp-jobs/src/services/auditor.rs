//! Consistency audit
//!
//! Compares the artifacts in the source directory with the file names of
//! delivered jobs the service rejected. Reports only, never repairs.

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{JobFilter, JobStore};
use crate::error::JobError;
use crate::services::artifact_scanner::ArtifactScanner;

/// Result of one audit, both lists sorted by file name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Artifacts with a DELIVERED + REJECTED record
    pub found: Vec<String>,
    /// Artifacts without one
    pub unaccounted: Vec<String>,
}

pub struct Auditor {
    store: Arc<dyn JobStore>,
    scanner: ArtifactScanner,
}

impl Auditor {
    pub fn new(store: Arc<dyn JobStore>, media_extension: &str) -> Self {
        Self {
            store,
            scanner: ArtifactScanner::new(media_extension),
        }
    }

    pub async fn audit(&self, source_dir: &Path) -> Result<AuditReport, JobError> {
        let artifacts = self.scanner.scan(source_dir)?;

        let rejected: HashSet<String> = self
            .store
            .find(&JobFilter::rejected())
            .await?
            .into_iter()
            .map(|record| record.file_name)
            .collect();

        let mut report = AuditReport::default();
        for path in &artifacts {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };

            if rejected.contains(&name) {
                debug!(file = %name, "Rejected job record found");
                report.found.push(name);
            } else {
                info!(file = %name, "No corresponding record found");
                report.unaccounted.push(name);
            }
        }

        report.found.sort();
        report.unaccounted.sort();

        info!(
            dir = %source_dir.display(),
            found = report.found.len(),
            unaccounted = report.unaccounted.len(),
            "Audit complete"
        );

        Ok(report)
    }
}
