// Identifier helpers.
//
// User ids and token ids (`jti`) are both random UUIDv4 strings: they only
// need to be unique and unguessable.

use uuid::Uuid;

/// Generate a random identifier as a hyphenated string.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
