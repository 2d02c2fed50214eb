use crate::common::{CancellationToken, LockGuard};
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::event::{EventManager, MigrationEvent};
use crate::migration::{Direction, IntegrityViolation, Migration, VersioningService};
use crate::runway_config::RunwayConfig;
use crate::service::validation_service::drift_violations;
use crate::service::{InvocationState, JournalWarning, MigrationOutcome};
use crate::store::{AuditLogEntry, AuditLogJournal, MigrationRepository, Outcome};
use crate::transaction::MigrationSession;
use std::collections::BTreeSet;

/// Applies and reverts migrations.
///
/// # Purpose
/// Every mutating call is one invocation of a small state machine:
/// `Idle -> LockAcquired -> Resolving -> Executing -> {Committed, Aborted} -> LockReleased`.
/// The advisory lock is taken once for the whole batch and given back on
/// every exit path. Resolving reads the applied set, refuses to go on when
/// the history is inconsistent or an applied migration has drifted (unless
/// drift is allowed), and picks the candidates. Executing runs them one by
/// one, each in its own atomic scope, and stops at the first failure.
///
/// # Errors and outcomes
/// Integrity errors, lock timeouts and invalid targets are returned as
/// `Err` before anything is mutated. A migration that fails while executing
/// is reported inside the [MigrationOutcome] together with the versions that
/// committed before it.
///
/// # Events and audit
/// For every migration the service dispatches `starting-*` before and
/// `*-succeeded` or `*-failed` after the run, and appends one audit entry
/// when audit logging is enabled. A failed append becomes a
/// [JournalWarning]; the migration stays committed.
pub struct MigrationService {
    config: RunwayConfig,
    events: EventManager,
}

impl MigrationService {
    pub fn new(config: RunwayConfig, events: EventManager) -> Self {
        MigrationService { config, events }
    }

    /// Applies the next pending migration, if any.
    pub fn upgrade_one(&self) -> RunwayResult<MigrationOutcome> {
        self.upgrade_one_with(&CancellationToken::new())
    }

    pub fn upgrade_one_with(&self, token: &CancellationToken) -> RunwayResult<MigrationOutcome> {
        self.execute(Direction::Upgrade, token, |versioning, applied| {
            Ok(versioning
                .pending_upgrades(applied)?
                .first()
                .map(|m| m.version())
                .into_iter()
                .collect())
        })
    }

    /// Applies every pending migration in ascending order.
    pub fn upgrade_all(&self) -> RunwayResult<MigrationOutcome> {
        self.upgrade_all_with(&CancellationToken::new())
    }

    pub fn upgrade_all_with(&self, token: &CancellationToken) -> RunwayResult<MigrationOutcome> {
        self.execute(Direction::Upgrade, token, |versioning, applied| {
            Ok(versions(versioning.pending_upgrades(applied)?))
        })
    }

    /// Applies pending migrations up to and including `target`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `target` is unknown or already applied.
    pub fn upgrade_to(&self, target: u64) -> RunwayResult<MigrationOutcome> {
        self.upgrade_to_with(target, &CancellationToken::new())
    }

    pub fn upgrade_to_with(
        &self,
        target: u64,
        token: &CancellationToken,
    ) -> RunwayResult<MigrationOutcome> {
        self.execute(Direction::Upgrade, token, |versioning, applied| {
            let pending = versioning.pending_upgrades(applied)?;
            if !versioning.contains(target) {
                return Err(unknown_version(target));
            }
            if applied.contains(&target) {
                log::error!("Migration {} is already applied", target);
                return Err(RunwayError::new(
                    &format!("Cannot upgrade to {}: it is already applied", target),
                    ErrorKind::InvalidOperation,
                ));
            }
            Ok(pending
                .into_iter()
                .map(|m| m.version())
                .take_while(|v| *v <= target)
                .collect())
        })
    }

    /// Applies pending migrations as long as `predicate` holds for the next one.
    pub fn upgrade_while<P>(&self, predicate: P) -> RunwayResult<MigrationOutcome>
    where
        P: Fn(&Migration) -> bool,
    {
        self.upgrade_while_with(predicate, &CancellationToken::new())
    }

    pub fn upgrade_while_with<P>(
        &self,
        predicate: P,
        token: &CancellationToken,
    ) -> RunwayResult<MigrationOutcome>
    where
        P: Fn(&Migration) -> bool,
    {
        self.execute(Direction::Upgrade, token, |versioning, applied| {
            Ok(versioning
                .pending_upgrades(applied)?
                .into_iter()
                .take_while(|m| predicate(*m))
                .map(|m| m.version())
                .collect())
        })
    }

    /// Reverts the most recently applied migration, if any.
    pub fn downgrade_one(&self) -> RunwayResult<MigrationOutcome> {
        self.downgrade_one_with(&CancellationToken::new())
    }

    pub fn downgrade_one_with(&self, token: &CancellationToken) -> RunwayResult<MigrationOutcome> {
        self.execute(Direction::Downgrade, token, |versioning, applied| {
            Ok(versions(versioning.pending_downgrades(applied, Some(1))?))
        })
    }

    /// Reverts the `count` most recently applied migrations, or all of them
    /// when `count` is `None`, newest first.
    pub fn downgrade_all(&self, count: Option<usize>) -> RunwayResult<MigrationOutcome> {
        self.downgrade_all_with(count, &CancellationToken::new())
    }

    pub fn downgrade_all_with(
        &self,
        count: Option<usize>,
        token: &CancellationToken,
    ) -> RunwayResult<MigrationOutcome> {
        self.execute(Direction::Downgrade, token, |versioning, applied| {
            Ok(versions(versioning.pending_downgrades(applied, count)?))
        })
    }

    /// Reverts applied migrations above `target`, leaving `target` as the
    /// current version. `0` reverts everything.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `target` is unknown or not applied.
    pub fn downgrade_to(&self, target: u64) -> RunwayResult<MigrationOutcome> {
        self.downgrade_to_with(target, &CancellationToken::new())
    }

    pub fn downgrade_to_with(
        &self,
        target: u64,
        token: &CancellationToken,
    ) -> RunwayResult<MigrationOutcome> {
        self.execute(Direction::Downgrade, token, |versioning, applied| {
            let candidates = versioning.pending_downgrades(applied, None)?;
            if target != 0 {
                if !versioning.contains(target) {
                    return Err(unknown_version(target));
                }
                if !applied.contains(&target) {
                    log::error!("Migration {} is not applied", target);
                    return Err(RunwayError::new(
                        &format!("Cannot downgrade to {}: it is not applied", target),
                        ErrorKind::InvalidOperation,
                    ));
                }
            }
            Ok(candidates
                .into_iter()
                .map(|m| m.version())
                .take_while(|v| *v > target)
                .collect())
        })
    }

    /// Reverts applied migrations, newest first, as long as `predicate`
    /// holds for the next one.
    pub fn downgrade_while<P>(&self, predicate: P) -> RunwayResult<MigrationOutcome>
    where
        P: Fn(&Migration) -> bool,
    {
        self.downgrade_while_with(predicate, &CancellationToken::new())
    }

    pub fn downgrade_while_with<P>(
        &self,
        predicate: P,
        token: &CancellationToken,
    ) -> RunwayResult<MigrationOutcome>
    where
        P: Fn(&Migration) -> bool,
    {
        self.execute(Direction::Downgrade, token, |versioning, applied| {
            Ok(versioning
                .pending_downgrades(applied, None)?
                .into_iter()
                .take_while(|m| predicate(*m))
                .map(|m| m.version())
                .collect())
        })
    }

    /// Accepts the current definitions of drifted applied migrations by
    /// rewriting their persisted checksums.
    ///
    /// Runs under the migration lock and rewrites every drifted record in
    /// one scope, keeping `applied_at` and `applied_by`. Returns the
    /// re-baselined versions, ascending; empty when nothing has drifted.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` if another session holds the lock, or the
    /// repository or `TransactionError` if the records cannot be written. No
    /// record is changed then.
    pub fn recalculate_checksums(&self) -> RunwayResult<Vec<u64>> {
        let versioning = self.config.versioning()?;
        let repository = self.config.repository()?;
        let session = MigrationSession::new(
            self.config.target_store()?,
            repository.clone(),
            self.config.applied_by(),
        );

        let owner = format!("{}:{}", self.config.app_name(), session.id());
        let guard = LockGuard::acquire(
            self.config.lock_provider(),
            &self.config.lock_name(),
            &owner,
            self.config.lock_timeout(),
        )?;

        let result = self.rewrite_checksums(&versioning, &repository, &session);

        if let Err(e) = guard.release() {
            log::warn!("{}: failed to release the migration lock: {}", self.config.app_name(), e);
        }
        result
    }

    fn rewrite_checksums(
        &self,
        versioning: &VersioningService,
        repository: &MigrationRepository,
        session: &MigrationSession,
    ) -> RunwayResult<Vec<u64>> {
        let records = repository.all_records()?;
        let drift = drift_violations(versioning, &records);
        if drift.is_empty() {
            log::debug!("{}: no drifted checksums to recalculate", self.config.app_name());
            return Ok(Vec::new());
        }

        let scope = session.open_scope()?;
        let mut rewritten = Vec::new();
        for violation in &drift {
            let record = records.iter().find(|r| r.version == violation.version());
            let (record, computed) = match (record, violation) {
                (Some(record), IntegrityViolation::Drift { computed, .. }) => (record, computed),
                _ => continue,
            };

            let mut rebaselined = record.clone();
            rebaselined.checksum = computed.clone();
            if let Err(e) = repository.mark_applied(&scope, &rebaselined) {
                log::error!(
                    "{}: failed to rewrite checksum of migration {}: {}",
                    self.config.app_name(),
                    record.version,
                    e
                );
                if let Err(rollback_error) = scope.rollback() {
                    log::error!("Rollback of scope {} failed: {}", scope.id(), rollback_error);
                }
                return Err(e);
            }
            rewritten.push(record.version);
        }

        scope.commit().map_err(|e| {
            RunwayError::new_with_cause(
                "Failed to commit recalculated checksums",
                ErrorKind::TransactionError,
                e,
            )
        })?;

        for violation in &drift {
            log::warn!(
                "{}: accepted the current definition of {}",
                self.config.app_name(),
                violation
            );
        }
        Ok(rewritten)
    }

    fn execute<F>(
        &self,
        direction: Direction,
        token: &CancellationToken,
        select: F,
    ) -> RunwayResult<MigrationOutcome>
    where
        F: FnOnce(&VersioningService, &BTreeSet<u64>) -> RunwayResult<Vec<u64>>,
    {
        let versioning = self.config.versioning()?;
        let repository = self.config.repository()?;
        let journal = self.config.journal()?;
        let session = MigrationSession::new(
            self.config.target_store()?,
            repository.clone(),
            self.config.applied_by(),
        );
        let mut outcome = MigrationOutcome::new(direction);

        let owner = format!("{}:{}", self.config.app_name(), session.id());
        let guard = LockGuard::acquire(
            self.config.lock_provider(),
            &self.config.lock_name(),
            &owner,
            self.config.lock_timeout(),
        )?;
        self.transition(&mut outcome, InvocationState::LockAcquired);

        self.transition(&mut outcome, InvocationState::Resolving);
        let candidates = self.resolve(&versioning, &repository, select)?;
        log::info!(
            "{}: {} candidates to {}",
            self.config.app_name(),
            candidates.len(),
            direction
        );

        self.transition(&mut outcome, InvocationState::Executing);
        for migration in &candidates {
            if token.is_cancelled() {
                log::warn!(
                    "{}: cancelled before {} of migration {}",
                    self.config.app_name(),
                    direction,
                    migration
                );
                outcome.cancelled = true;
                break;
            }

            self.events
                .dispatch(&MigrationEvent::starting(migration, direction));
            match session.run(migration, direction) {
                Ok(report) => {
                    log::info!(
                        "{}: {} of migration {} succeeded ({} commands)",
                        self.config.app_name(),
                        direction,
                        migration,
                        report.commands_executed
                    );
                    outcome.completed.push(migration.version());
                    self.audit(&journal, &session, migration, direction, None, &mut outcome);
                    self.events
                        .dispatch(&MigrationEvent::succeeded(migration, direction));
                }
                Err(error) => {
                    log::error!(
                        "{}: {} of migration {} failed: {}",
                        self.config.app_name(),
                        direction,
                        migration,
                        error
                    );
                    self.audit(
                        &journal,
                        &session,
                        migration,
                        direction,
                        Some(&error),
                        &mut outcome,
                    );
                    self.events.dispatch(&MigrationEvent::failed(
                        migration,
                        direction,
                        error.clone(),
                    ));
                    outcome.failed_at = Some(migration.version());
                    outcome.error = Some(error);
                    break;
                }
            }
        }

        let terminal = if outcome.error.is_some() {
            InvocationState::Aborted
        } else {
            InvocationState::Committed
        };
        self.transition(&mut outcome, terminal);

        if let Err(e) = guard.release() {
            log::warn!("{}: failed to release the migration lock: {}", self.config.app_name(), e);
        }
        log::debug!("{}: {} -> {}", self.config.app_name(), terminal, InvocationState::LockReleased);
        Ok(outcome)
    }

    fn resolve<F>(
        &self,
        versioning: &VersioningService,
        repository: &MigrationRepository,
        select: F,
    ) -> RunwayResult<Vec<Migration>>
    where
        F: FnOnce(&VersioningService, &BTreeSet<u64>) -> RunwayResult<Vec<u64>>,
    {
        let records = repository.all_records()?;
        let applied: BTreeSet<u64> = records
            .iter()
            .filter(|r| r.is_applied)
            .map(|r| r.version)
            .collect();

        let drift = drift_violations(versioning, &records);
        if !drift.is_empty() {
            if self.config.allow_drift() {
                for violation in &drift {
                    log::warn!("{}: proceeding despite drift: {}", self.config.app_name(), violation);
                }
            } else {
                log::error!("{}: applied migrations have drifted", self.config.app_name());
                return Err(IntegrityViolation::to_error(&drift));
            }
        }

        Ok(select(versioning, &applied)?
            .into_iter()
            .filter_map(|version| versioning.get(version).cloned())
            .collect())
    }

    fn audit(
        &self,
        journal: &Option<AuditLogJournal>,
        session: &MigrationSession,
        migration: &Migration,
        direction: Direction,
        error: Option<&RunwayError>,
        outcome: &mut MigrationOutcome,
    ) {
        let journal = match journal {
            Some(journal) => journal,
            None => return,
        };

        let result = if error.is_some() {
            Outcome::Failure
        } else {
            Outcome::Success
        };
        let entry = AuditLogEntry::new(session.id(), migration, direction, result, error);
        if let Err(e) = journal.append(&entry) {
            log::warn!(
                "{}: audit entry for {} of migration {} was not written: {}",
                self.config.app_name(),
                direction,
                migration,
                e
            );
            outcome.warnings.push(JournalWarning {
                version: migration.version(),
                direction,
                error: RunwayError::new_with_cause(
                    &format!("Failed to append audit entry for migration {}", migration),
                    ErrorKind::JournalWriteError,
                    e,
                ),
            });
        }
    }

    fn transition(&self, outcome: &mut MigrationOutcome, next: InvocationState) {
        log::debug!("{}: {} -> {}", self.config.app_name(), outcome.state, next);
        outcome.state = next;
    }
}

fn versions(migrations: Vec<&Migration>) -> Vec<u64> {
    migrations.into_iter().map(|m| m.version()).collect()
}

fn unknown_version(version: u64) -> RunwayError {
    log::error!("Migration version {} is not known", version);
    RunwayError::new(
        &format!("Migration version {} is not known", version),
        ErrorKind::InvalidOperation,
    )
}
