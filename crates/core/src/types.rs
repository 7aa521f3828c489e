/// Owner (user) identifiers are PostgreSQL BIGINT.
pub type DbId = i64;

/// Timer sessions, pauses and stops use opaque UUID identifiers.
pub type RecordId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
