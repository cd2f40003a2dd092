//! Process-wide WebSocket message id allocation

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Allocate the next WebSocket message id
///
/// Ids are unique within the process and strictly increasing; the first
/// allocation returns 1.
pub fn next_message_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::SeqCst) + 1
}
