use crate::common::VERSIONING_STARTS_FROM;
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::migration::{Checksum, Migration};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// One problem found in the migration history.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntegrityViolation {
    /// A version is recorded as applied but no longer has a definition.
    MissingDefinition { version: u64 },
    /// A known version below the current version is not applied.
    UnappliedBelowCurrent { version: u64, current: u64 },
    /// An applied migration no longer hashes to its persisted checksum.
    Drift {
        version: u64,
        persisted: Checksum,
        computed: Checksum,
    },
}

impl IntegrityViolation {
    pub fn version(&self) -> u64 {
        match self {
            IntegrityViolation::MissingDefinition { version }
            | IntegrityViolation::UnappliedBelowCurrent { version, .. }
            | IntegrityViolation::Drift { version, .. } => *version,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IntegrityViolation::MissingDefinition { .. }
            | IntegrityViolation::UnappliedBelowCurrent { .. } => ErrorKind::VersionGap,
            IntegrityViolation::Drift { .. } => ErrorKind::DriftDetected,
        }
    }

    pub fn is_drift(&self) -> bool {
        matches!(self, IntegrityViolation::Drift { .. })
    }

    /// Folds a non-empty list of violations into one error. The kind is
    /// taken from the first violation.
    pub fn to_error(violations: &[IntegrityViolation]) -> RunwayError {
        let kind = violations
            .first()
            .map(|v| v.kind())
            .unwrap_or(ErrorKind::IntegrityError);
        let details = violations.iter().map(|v| v.to_string()).join("; ");
        RunwayError::new(
            &format!("Migration history integrity check failed: {}", details),
            kind,
        )
    }
}

impl Display for IntegrityViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityViolation::MissingDefinition { version } => write!(
                f,
                "version {} is applied but has no migration definition",
                version
            ),
            IntegrityViolation::UnappliedBelowCurrent { version, current } => write!(
                f,
                "version {} is not applied although version {} is",
                version, current
            ),
            IntegrityViolation::Drift {
                version,
                persisted,
                computed,
            } => write!(
                f,
                "version {} has drifted (persisted checksum {}, computed {})",
                version, persisted, computed
            ),
        }
    }
}

// records persist versions as signed 64-bit integers
const MAX_VERSION: u64 = i64::MAX as u64;

/// Orders the known migrations and resolves them against the applied set.
///
/// # Purpose
/// `VersioningService` owns the discovery set for one invocation. It answers
/// which migrations are pending in either direction and checks that the
/// applied versions form a gap-free prefix of the known versions.
///
/// # Load-time checks
/// Construction fails with `DuplicateVersion` when two migrations declare
/// the same version and with `IntegrityError` for versions below
/// [VERSIONING_STARTS_FROM]. Versions do not have to be consecutive.
pub struct VersioningService {
    migrations: Vec<Migration>,
}

impl VersioningService {
    pub fn new(migrations: Vec<Migration>) -> RunwayResult<Self> {
        let duplicates: Vec<u64> = migrations
            .iter()
            .map(|m| m.version())
            .duplicates()
            .sorted()
            .collect();
        if !duplicates.is_empty() {
            log::error!("Duplicate migration versions: {:?}", duplicates);
            return Err(RunwayError::new(
                &format!(
                    "Duplicate migration versions: {}",
                    duplicates.iter().join(", ")
                ),
                ErrorKind::DuplicateVersion,
            ));
        }

        if let Some(invalid) = migrations
            .iter()
            .find(|m| m.version() < VERSIONING_STARTS_FROM || m.version() > MAX_VERSION)
        {
            return Err(RunwayError::new(
                &format!(
                    "Migration '{}' has version {}; versions range from {} to {}",
                    invalid.name(),
                    invalid.version(),
                    VERSIONING_STARTS_FROM,
                    MAX_VERSION
                ),
                ErrorKind::IntegrityError,
            ));
        }

        let migrations = migrations
            .into_iter()
            .sorted_by_key(|m| m.version())
            .collect();
        Ok(VersioningService { migrations })
    }

    /// Returns the known migrations in ascending version order.
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn get(&self, version: u64) -> Option<&Migration> {
        self.migrations
            .binary_search_by_key(&version, |m| m.version())
            .ok()
            .map(|index| &self.migrations[index])
    }

    pub fn contains(&self, version: u64) -> bool {
        self.get(version).is_some()
    }

    pub fn versions(&self) -> Vec<u64> {
        self.migrations.iter().map(|m| m.version()).collect()
    }

    pub fn latest_version(&self) -> Option<u64> {
        self.migrations.last().map(|m| m.version())
    }

    /// Returns the highest applied version, `None` when unversioned.
    pub fn current_version(&self, applied: &BTreeSet<u64>) -> Option<u64> {
        applied.last().copied()
    }

    /// Returns the known version just below `version`.
    pub fn previous_version(&self, version: u64) -> Option<u64> {
        self.migrations
            .iter()
            .rev()
            .map(|m| m.version())
            .find(|v| *v < version)
    }

    /// Returns the known version just above `version`.
    pub fn next_version(&self, version: u64) -> Option<u64> {
        self.migrations
            .iter()
            .map(|m| m.version())
            .find(|v| *v > version)
    }

    /// Returns every ordering violation of `applied` against the known set.
    pub fn check(&self, applied: &BTreeSet<u64>) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();
        let current = match self.current_version(applied) {
            Some(current) => current,
            None => return violations,
        };

        for version in applied {
            if !self.contains(*version) {
                violations.push(IntegrityViolation::MissingDefinition { version: *version });
            }
        }

        for migration in &self.migrations {
            if migration.version() < current && !applied.contains(&migration.version()) {
                violations.push(IntegrityViolation::UnappliedBelowCurrent {
                    version: migration.version(),
                    current,
                });
            }
        }

        violations.sort_by_key(|v| v.version());
        violations
    }

    /// Returns the migrations above the current version, ascending.
    ///
    /// # Errors
    ///
    /// Fails with an integrity error if [VersioningService::check] reports
    /// anything.
    pub fn pending_upgrades(&self, applied: &BTreeSet<u64>) -> RunwayResult<Vec<&Migration>> {
        self.ensure_consistent(applied)?;
        let current = self.current_version(applied);
        Ok(self
            .migrations
            .iter()
            .filter(|m| current.map_or(true, |c| m.version() > c))
            .collect())
    }

    /// Returns the `count` most recently applied migrations, descending.
    /// `None` returns all applied migrations.
    pub fn pending_downgrades(
        &self,
        applied: &BTreeSet<u64>,
        count: Option<usize>,
    ) -> RunwayResult<Vec<&Migration>> {
        self.ensure_consistent(applied)?;
        let candidates = self
            .migrations
            .iter()
            .rev()
            .filter(|m| applied.contains(&m.version()));
        Ok(match count {
            Some(count) => candidates.take(count).collect(),
            None => candidates.collect(),
        })
    }

    fn ensure_consistent(&self, applied: &BTreeSet<u64>) -> RunwayResult<()> {
        let violations = self.check(applied);
        if violations.is_empty() {
            Ok(())
        } else {
            log::error!("Migration history is inconsistent: {:?}", violations);
            Err(IntegrityViolation::to_error(&violations))
        }
    }
}
