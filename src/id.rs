//! Unique names for generated scripts and payload files
use uuid::Uuid;

/// A 32 character lowercase hex token from a random v4 UUID, hyphens removed
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}
