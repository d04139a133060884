use chrono::NaiveDateTime;

use crate::UserRecord;

/// `DDMMYYYY-HHmmss`
pub const OBJECT_KEY_FORMAT: &str = "%d%m%Y-%H%M%S";
pub const OBJECT_KEY_SUFFIX: &str = "-out.json";

/// Serializes one pass's records as a JSON array.
pub fn serialize_records(records: &[UserRecord]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(records)
}

/// Storage key for a document serialized at `at`, e.g. `07032024-091502-out.json`.
pub fn object_key(at: NaiveDateTime) -> String {
    format!("{}{}", at.format(OBJECT_KEY_FORMAT), OBJECT_KEY_SUFFIX)
}
