use crate::errors::RunwayResult;
use crate::migration::Migration;
use crate::runway_config::RunwayConfig;
use crate::store::MigrationRecord;
use std::collections::BTreeMap;

/// Snapshot of where the history stands.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Highest applied version, `None` when nothing is applied.
    pub current_version: Option<u64>,
    pub latest_version: Option<u64>,
    /// Known versions above the current version, ascending.
    pub pending: Vec<u64>,
    /// Applied versions, ascending, including any whose definition is gone.
    pub applied: Vec<u64>,
    /// Every known migration with its applied status filled in.
    pub known: Vec<Migration>,
}

impl StatusReport {
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Read-only reporting of the applied state.
///
/// Like [ValidationService](crate::service::ValidationService) it takes no
/// lock and may observe a state that a concurrent migration is about to
/// change.
pub struct StatusService {
    config: RunwayConfig,
}

impl StatusService {
    pub fn new(config: RunwayConfig) -> Self {
        StatusService { config }
    }

    /// Reports the history from a single read of the repository.
    pub fn status(&self) -> RunwayResult<StatusReport> {
        let records = self.records()?;
        let known = self.merge(&records)?;
        let applied: Vec<u64> = records
            .values()
            .filter(|r| r.is_applied)
            .map(|r| r.version)
            .collect();
        let current_version = applied.last().copied();
        let pending = known
            .iter()
            .map(|m| m.version())
            .filter(|v| current_version.map_or(true, |current| *v > current))
            .collect();

        Ok(StatusReport {
            current_version,
            latest_version: known.last().map(|m| m.version()),
            pending,
            applied,
            known,
        })
    }

    /// Returns the highest applied version.
    pub fn current_version(&self) -> RunwayResult<Option<u64>> {
        Ok(self.config.repository()?.applied_versions()?.last().copied())
    }

    /// Returns `true` if the first `depth` known migrations are applied, or
    /// all of them when `depth` is `None`.
    pub fn is_up_to_date(&self, depth: Option<usize>) -> RunwayResult<bool> {
        let known = self.known_migrations()?;
        let depth = depth.unwrap_or(known.len());
        Ok(known.iter().take(depth).all(|m| m.is_applied()))
    }

    /// Returns the known migrations, ascending, with the status recorded in
    /// the repository.
    pub fn known_migrations(&self) -> RunwayResult<Vec<Migration>> {
        let records = self.records()?;
        self.merge(&records)
    }

    fn records(&self) -> RunwayResult<BTreeMap<u64, MigrationRecord>> {
        Ok(self
            .config
            .repository()?
            .all_records()?
            .into_iter()
            .map(|r| (r.version, r))
            .collect())
    }

    fn merge(&self, records: &BTreeMap<u64, MigrationRecord>) -> RunwayResult<Vec<Migration>> {
        let versioning = self.config.versioning()?;
        Ok(versioning
            .migrations()
            .iter()
            .map(|migration| match records.get(&migration.version()) {
                Some(record) => migration.with_status(
                    record.is_applied,
                    record.applied_at,
                    record.applied_by.clone(),
                ),
                None => migration.clone(),
            })
            .collect())
    }
}
