// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// User ids, connection ids and attachment ids are all generated app-side so
// the in-memory and PostgreSQL stores hand out ids of the same shape.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
