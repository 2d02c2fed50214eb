use std::time::Duration;

/// Name of the global advisory lock guarding the migration history.
pub const MIGRATION_LOCK_NAME: &str = "runway.migration-history";

/// Default bound on the wait for the migration lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default application name reported in logs.
pub const DEFAULT_APP_NAME: &str = "runway";

/// Lowest version a migration may declare.
pub const VERSIONING_STARTS_FROM: u64 = 1;

/// System collection holding one applied-status record per version.
pub const MIGRATIONS_COLLECTION: &str = "__runway_migrations";

/// System collection holding the append-only audit trail.
pub const AUDITLOG_COLLECTION: &str = "__runway_auditlog";

// record fields
pub const FIELD_VERSION: &str = "version";
pub const FIELD_NAME: &str = "name";
pub const FIELD_CHECKSUM: &str = "checksum";
pub const FIELD_IS_APPLIED: &str = "is_applied";
pub const FIELD_APPLIED_AT: &str = "applied_at";
pub const FIELD_APPLIED_BY: &str = "applied_by";

// audit entry fields
pub const FIELD_ID: &str = "id";
pub const FIELD_SESSION_ID: &str = "session_id";
pub const FIELD_DIRECTION: &str = "direction";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_OUTCOME: &str = "outcome";
pub const FIELD_ERROR: &str = "error";
