use crate::errors::RunwayResult;
use crate::migration::{ChecksumService, IntegrityViolation, VersioningService};
use crate::runway_config::RunwayConfig;
use crate::store::MigrationRecord;
use std::collections::BTreeSet;

/// Every integrity problem of the migration history found in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Violations ordered by version.
    pub violations: Vec<IntegrityViolation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns the drift violations only.
    pub fn drifted(&self) -> Vec<&IntegrityViolation> {
        self.violations.iter().filter(|v| v.is_drift()).collect()
    }

    /// Returns the ordering violations only.
    pub fn ordering(&self) -> Vec<&IntegrityViolation> {
        self.violations.iter().filter(|v| !v.is_drift()).collect()
    }
}

/// Read-only check of the migration history.
///
/// The service re-verifies the checksum of every applied migration against
/// its current definition and checks that the applied versions form a
/// gap-free prefix of the known versions. It never mutates anything and
/// takes no lock, so the report reflects a snapshot that a concurrent
/// migration may already have superseded.
pub struct ValidationService {
    config: RunwayConfig,
}

impl ValidationService {
    pub fn new(config: RunwayConfig) -> Self {
        ValidationService { config }
    }

    /// Collects every drift and ordering violation.
    ///
    /// # Errors
    ///
    /// Returns an error only if the repository cannot be read.
    pub fn check(&self) -> RunwayResult<ValidationReport> {
        let versioning = self.config.versioning()?;
        let records = self.config.repository()?.all_records()?;
        let applied: BTreeSet<u64> = records
            .iter()
            .filter(|r| r.is_applied)
            .map(|r| r.version)
            .collect();

        let mut violations = versioning.check(&applied);
        violations.extend(drift_violations(&versioning, &records));
        violations.sort_by_key(|v| v.version());

        if violations.is_empty() {
            log::debug!("Migration history of {} versions is consistent", applied.len());
        } else {
            log::warn!(
                "Migration history has {} integrity violations",
                violations.len()
            );
        }
        Ok(ValidationReport { violations })
    }
}

/// Returns a drift violation for every applied record whose migration no
/// longer hashes to the persisted checksum.
pub(crate) fn drift_violations(
    versioning: &VersioningService,
    records: &[MigrationRecord],
) -> Vec<IntegrityViolation> {
    records
        .iter()
        .filter(|record| record.is_applied)
        .filter_map(|record| {
            let migration = versioning.get(record.version)?;
            if ChecksumService::verify(migration, &record.checksum) {
                None
            } else {
                Some(IntegrityViolation::Drift {
                    version: record.version,
                    persisted: record.checksum.clone(),
                    computed: migration.checksum().to_string(),
                })
            }
        })
        .collect()
}
