//! UUID v7 utilities for time-ordered identifiers.
//!
//! Every entity id in noterra is a UUIDv7: the embedded millisecond
//! timestamp makes id order a faithful proxy for insertion order, which the
//! message-ordering tie-break relies on.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}
