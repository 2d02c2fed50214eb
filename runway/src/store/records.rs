use crate::common::{
    Document, FIELD_APPLIED_AT, FIELD_APPLIED_BY, FIELD_CHECKSUM, FIELD_DIRECTION, FIELD_ERROR,
    FIELD_ID, FIELD_IS_APPLIED, FIELD_NAME, FIELD_OUTCOME, FIELD_SESSION_ID, FIELD_TIMESTAMP,
    FIELD_VERSION,
};
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::migration::{Checksum, Direction, Migration};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Persisted applied-status of one migration version.
///
/// Records are kept when a migration is reverted; `is_applied` is cleared
/// and the checksum stays as it was last applied.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MigrationRecord {
    pub version: u64,
    pub name: String,
    pub checksum: Checksum,
    pub is_applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
    pub applied_by: Option<String>,
}

impl MigrationRecord {
    /// Creates the record written when `migration` is applied at `applied_at`.
    pub fn applied(
        migration: &Migration,
        applied_at: DateTime<Utc>,
        applied_by: Option<&str>,
    ) -> Self {
        MigrationRecord {
            version: migration.version(),
            name: migration.name().to_string(),
            checksum: migration.checksum().to_string(),
            is_applied: true,
            applied_at: Some(applied_at),
            applied_by: applied_by.map(|s| s.to_string()),
        }
    }

    pub fn to_document(&self) -> RunwayResult<Document> {
        let mut doc = Document::new();
        doc.put(FIELD_VERSION, i64::try_from(self.version)?)?;
        doc.put(FIELD_NAME, &self.name)?;
        doc.put(FIELD_CHECKSUM, &self.checksum)?;
        doc.put(FIELD_IS_APPLIED, self.is_applied)?;
        doc.put(FIELD_APPLIED_AT, self.applied_at.map(format_timestamp))?;
        doc.put(FIELD_APPLIED_BY, self.applied_by.clone())?;
        Ok(doc)
    }

    pub fn from_document(doc: &Document) -> RunwayResult<Self> {
        Ok(MigrationRecord {
            version: u64::try_from(doc.get_i64(FIELD_VERSION)?)?,
            name: doc.get_str(FIELD_NAME)?.to_string(),
            checksum: doc.get_str(FIELD_CHECKSUM)?.to_string(),
            is_applied: doc.get_bool(FIELD_IS_APPLIED)?,
            applied_at: doc
                .get_optional_str(FIELD_APPLIED_AT)?
                .map(parse_timestamp)
                .transpose()?,
            applied_by: doc.get_optional_str(FIELD_APPLIED_BY)?.map(|s| s.to_string()),
        })
    }
}

/// Result of one migration action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }

    pub fn parse(value: &str) -> Option<Outcome> {
        match value {
            "success" => Some(Outcome::Success),
            "failure" => Some(Outcome::Failure),
            _ => None,
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only audit record of one migration action.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuditLogEntry {
    pub id: String,
    pub session_id: String,
    pub version: u64,
    pub name: String,
    pub direction: Direction,
    pub checksum: Checksum,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub error: Option<String>,
}

impl AuditLogEntry {
    /// Creates an entry for an action that just completed.
    pub fn new(
        session_id: &str,
        migration: &Migration,
        direction: Direction,
        outcome: Outcome,
        error: Option<&RunwayError>,
    ) -> Self {
        AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            version: migration.version(),
            name: migration.name().to_string(),
            direction,
            checksum: migration.checksum().to_string(),
            timestamp: Utc::now(),
            outcome,
            error: error.map(|e| e.to_string()),
        }
    }

    pub fn to_document(&self) -> RunwayResult<Document> {
        let mut doc = Document::new();
        doc.put(FIELD_ID, &self.id)?;
        doc.put(FIELD_SESSION_ID, &self.session_id)?;
        doc.put(FIELD_VERSION, i64::try_from(self.version)?)?;
        doc.put(FIELD_NAME, &self.name)?;
        doc.put(FIELD_DIRECTION, self.direction.as_str())?;
        doc.put(FIELD_CHECKSUM, &self.checksum)?;
        doc.put(FIELD_TIMESTAMP, format_timestamp(self.timestamp))?;
        doc.put(FIELD_OUTCOME, self.outcome.as_str())?;
        doc.put(FIELD_ERROR, self.error.clone())?;
        Ok(doc)
    }

    pub fn from_document(doc: &Document) -> RunwayResult<Self> {
        let direction = doc.get_str(FIELD_DIRECTION)?;
        let outcome = doc.get_str(FIELD_OUTCOME)?;
        Ok(AuditLogEntry {
            id: doc.get_str(FIELD_ID)?.to_string(),
            session_id: doc.get_str(FIELD_SESSION_ID)?.to_string(),
            version: u64::try_from(doc.get_i64(FIELD_VERSION)?)?,
            name: doc.get_str(FIELD_NAME)?.to_string(),
            direction: Direction::parse(direction)
                .ok_or_else(|| invalid_field(FIELD_DIRECTION, direction))?,
            checksum: doc.get_str(FIELD_CHECKSUM)?.to_string(),
            timestamp: parse_timestamp(doc.get_str(FIELD_TIMESTAMP)?)?,
            outcome: Outcome::parse(outcome).ok_or_else(|| invalid_field(FIELD_OUTCOME, outcome))?,
            error: doc.get_optional_str(FIELD_ERROR)?.map(|s| s.to_string()),
        })
    }
}

/// Filter for [AuditLogJournalProvider::history](crate::store::AuditLogJournalProvider::history).
///
/// Bounds are inclusive. Entries with equal timestamps keep append order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub ascending: bool,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        HistoryQuery {
            start: None,
            end: None,
            limit: None,
            ascending: true,
        }
    }
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.start.map_or(true, |start| entry.timestamp >= start)
            && self.end.map_or(true, |end| entry.timestamp <= end)
    }

    /// Filters, orders and truncates entries given in append order.
    pub fn apply(&self, entries: Vec<AuditLogEntry>) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> =
            entries.into_iter().filter(|e| self.matches(e)).collect();
        entries.sort_by_key(|e| e.timestamp);
        if !self.ascending {
            entries.reverse();
        }
        if let Some(limit) = self.limit {
            entries.truncate(limit);
        }
        entries
    }
}

pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(value: &str) -> RunwayResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn invalid_field(field: &str, value: &str) -> RunwayError {
    RunwayError::new(
        &format!("Invalid value '{}' for field '{}'", value, field),
        ErrorKind::ValidationError,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{MigrationCommand, MigrationProcess};
    use chrono::Duration;

    fn migration() -> Migration {
        Migration::new(
            4,
            "add_index",
            "",
            MigrationProcess::new().command(MigrationCommand::create_collection("idx")),
            MigrationProcess::new().command(MigrationCommand::drop_collection("idx")),
        )
    }

    fn entry_at(version: u64, timestamp: DateTime<Utc>) -> AuditLogEntry {
        let mut entry = AuditLogEntry::new(
            "session",
            &migration(),
            Direction::Upgrade,
            Outcome::Success,
            None,
        );
        entry.version = version;
        entry.timestamp = timestamp;
        entry
    }

    #[test]
    fn test_record_document_layout() {
        let now = Utc::now();
        let record = MigrationRecord::applied(&migration(), now, Some("ci"));
        let doc = record.to_document().unwrap();

        assert_eq!(doc.get_i64(FIELD_VERSION).unwrap(), 4);
        assert_eq!(doc.get_str(FIELD_NAME).unwrap(), "add_index");
        assert!(doc.get_bool(FIELD_IS_APPLIED).unwrap());
        assert_eq!(doc.get_str(FIELD_APPLIED_BY).unwrap(), "ci");
        assert_eq!(MigrationRecord::from_document(&doc).unwrap(), record);
    }

    #[test]
    fn test_unapplied_record_has_null_fields() {
        let record = MigrationRecord {
            version: 2,
            name: "x".to_string(),
            checksum: "abc".to_string(),
            is_applied: false,
            applied_at: None,
            applied_by: None,
        };
        let doc = record.to_document().unwrap();
        assert!(doc.get(FIELD_APPLIED_AT).unwrap().is_null());
        assert_eq!(MigrationRecord::from_document(&doc).unwrap(), record);
    }

    #[test]
    fn test_entry_document_layout() {
        let error = RunwayError::new("command failed", ErrorKind::ExecutionError);
        let entry = AuditLogEntry::new(
            "s-1",
            &migration(),
            Direction::Downgrade,
            Outcome::Failure,
            Some(&error),
        );
        let doc = entry.to_document().unwrap();
        assert_eq!(doc.get_str(FIELD_DIRECTION).unwrap(), "downgrade");
        assert_eq!(doc.get_str(FIELD_OUTCOME).unwrap(), "failure");
        assert_eq!(doc.get_str(FIELD_ERROR).unwrap(), "command failed");
        assert_eq!(AuditLogEntry::from_document(&doc).unwrap(), entry);
    }

    #[test]
    fn test_entry_with_unknown_direction_is_rejected() {
        let entry = entry_at(1, Utc::now());
        let mut doc = entry.to_document().unwrap();
        doc.put(FIELD_DIRECTION, "sideways").unwrap();
        let err = AuditLogEntry::from_document(&doc).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_history_query_filters_and_orders() {
        let base = Utc::now();
        let entries: Vec<AuditLogEntry> = (0..5)
            .map(|i| entry_at(i + 1, base + Duration::seconds(i as i64)))
            .collect();

        let all = HistoryQuery::new().apply(entries.clone());
        assert_eq!(all.iter().map(|e| e.version).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        let bounded = HistoryQuery::new()
            .start(base + Duration::seconds(1))
            .end(base + Duration::seconds(3))
            .apply(entries.clone());
        assert_eq!(bounded.iter().map(|e| e.version).collect::<Vec<_>>(), vec![2, 3, 4]);

        let latest = HistoryQuery::new().descending().limit(2).apply(entries);
        assert_eq!(latest.iter().map(|e| e.version).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[test]
    fn test_equal_timestamps_keep_append_order() {
        let now = Utc::now();
        let entries = vec![entry_at(1, now), entry_at(2, now), entry_at(3, now)];
        let result = HistoryQuery::new().apply(entries);
        assert_eq!(result.iter().map(|e| e.version).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_timestamp_round_trip_keeps_precision() {
        let now = Utc::now();
        assert_eq!(parse_timestamp(&format_timestamp(now)).unwrap(), now);
    }
}
