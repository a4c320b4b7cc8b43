//! Id generation. Identity ids are time-ordered; session ids are random.

use uuid::Uuid;

/// Generate a new identity id (UUIDv7, timestamp-sortable).
pub fn new_identity_id() -> Uuid {
    Uuid::now_v7()
}

/// Generate a new session id (UUIDv4, unguessable).
pub fn new_session_id() -> Uuid {
    Uuid::new_v4()
}
