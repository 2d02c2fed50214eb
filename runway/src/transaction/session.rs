use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::migration::{validate_rules, Direction, Migration};
use crate::store::{MigrationRecord, MigrationRepository, TargetStore};
use crate::transaction::{CompensatingTransaction, MigrationContext, StoreTransaction};
use chrono::Utc;
use uuid::Uuid;

/// What a successful [MigrationSession::run] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub version: u64,
    pub direction: Direction,
    pub checksum: String,
    pub transaction_id: String,
    pub native_transaction: bool,
    pub commands_executed: usize,
}

/// Runs single migrations inside atomic scopes.
///
/// # Purpose
/// The session is the transactional boundary of the engine. For each run it
/// opens a scope on the target store, checks the business rules, executes
/// the commands in order, writes the status record through the repository
/// in the same scope and commits. Any failure rolls the scope back and is
/// returned, so data changes and the status record never diverge.
///
/// # Scopes
/// Native transactions are used when the store offers them. Otherwise the
/// session falls back to a [CompensatingTransaction], with its weaker
/// isolation and crash-safety guarantees.
pub struct MigrationSession {
    id: String,
    store: TargetStore,
    repository: MigrationRepository,
    applied_by: Option<String>,
}

impl MigrationSession {
    pub fn new(
        store: TargetStore,
        repository: MigrationRepository,
        applied_by: Option<String>,
    ) -> Self {
        MigrationSession {
            id: Uuid::new_v4().to_string(),
            store,
            repository,
            applied_by,
        }
    }

    /// Returns the session id recorded in audit entries.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Opens a native scope, or a compensating one if the store has none.
    pub fn open_scope(&self) -> RunwayResult<StoreTransaction> {
        let native = self.store.begin_transaction().map_err(|e| {
            RunwayError::new_with_cause(
                "Failed to open a transaction on the target store",
                ErrorKind::TransactionError,
                e,
            )
        })?;

        Ok(match native {
            Some(scope) => scope,
            None => {
                log::debug!("Target store has no native transactions, using a compensating scope");
                StoreTransaction::new(CompensatingTransaction::new(self.store.clone()))
            }
        })
    }

    /// Runs `migration` in `direction` as one atomic unit.
    ///
    /// # Errors
    ///
    /// - `IrreversibleMigration` when downgrading a migration without
    ///   downgrade commands; nothing is executed.
    /// - `BusinessRuleBroken` when a rule of the process does not hold.
    /// - `ExecutionError` when a command or the status write fails.
    /// - `TransactionError` when the scope cannot be opened or committed.
    pub fn run(&self, migration: &Migration, direction: Direction) -> RunwayResult<RunReport> {
        if direction == Direction::Downgrade && !migration.is_reversible() {
            log::error!("Migration {} is irreversible", migration);
            return Err(RunwayError::new(
                &format!(
                    "Migration {} has no downgrade commands and cannot be reverted",
                    migration
                ),
                ErrorKind::IrreversibleMigration,
            ));
        }

        let scope = self.open_scope()?;
        log::debug!(
            "Running {} of migration {} in scope {}",
            direction,
            migration,
            scope.id()
        );

        let executed = match self.execute(&scope, migration, direction) {
            Ok(executed) => executed,
            Err(e) => {
                log::error!("{} of migration {} failed: {}", direction, migration, e);
                if let Err(rollback_error) = scope.rollback() {
                    log::error!(
                        "Rollback of scope {} failed: {}",
                        scope.id(),
                        rollback_error
                    );
                }
                return Err(e);
            }
        };

        scope.commit().map_err(|e| {
            log::error!("Commit of migration {} failed: {}", migration, e);
            RunwayError::new_with_cause(
                &format!("Failed to commit migration {}", migration),
                ErrorKind::TransactionError,
                e,
            )
        })?;

        Ok(RunReport {
            version: migration.version(),
            direction,
            checksum: migration.checksum().to_string(),
            transaction_id: scope.id().to_string(),
            native_transaction: scope.is_native(),
            commands_executed: executed,
        })
    }

    fn execute(
        &self,
        scope: &StoreTransaction,
        migration: &Migration,
        direction: Direction,
    ) -> RunwayResult<usize> {
        let ctx = MigrationContext::new(scope, migration.version(), direction);
        let process = migration.process(direction);

        validate_rules(process.rules(), &ctx).map_err(|e| {
            if e.is_execution_error() {
                e
            } else {
                RunwayError::new_with_cause(
                    &format!("Rule check of migration {} failed", migration),
                    ErrorKind::ExecutionError,
                    e,
                )
            }
        })?;

        for (index, command) in process.commands().iter().enumerate() {
            log::debug!(
                "Migration {} {}: command {} '{}'",
                migration.version(),
                direction,
                index + 1,
                command.name()
            );
            command.execute(&ctx).map_err(|e| {
                RunwayError::new_with_cause(
                    &format!(
                        "Command {} '{}' of migration {} failed during {}",
                        index + 1,
                        command.name(),
                        migration,
                        direction
                    ),
                    ErrorKind::ExecutionError,
                    e,
                )
            })?;
        }

        let status = match direction {
            Direction::Upgrade => {
                let record =
                    MigrationRecord::applied(migration, Utc::now(), self.applied_by.as_deref());
                self.repository.mark_applied(scope, &record)
            }
            Direction::Downgrade => self.repository.mark_unapplied(scope, migration.version()),
        };
        status.map_err(|e| {
            RunwayError::new_with_cause(
                &format!("Failed to record status of migration {}", migration),
                ErrorKind::ExecutionError,
                e,
            )
        })?;

        Ok(process.commands().len())
    }
}
