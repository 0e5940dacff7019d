//! Ordered identifiers for event records.
//!
//! An [`EventId`] is 24 lowercase hex characters: a 64-bit clock word
//! (milliseconds since the epoch shifted left by [`SEQ_BITS`], plus a
//! sequence) followed by a 32-bit per-process nonce. Ids minted by the same
//! process compare in creation order, both as strings and as values.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use uuid::Uuid;

/// Low bits of the clock word used as a per-millisecond sequence.
const SEQ_BITS: u32 = 16;

/// Length of a well-formed id.
pub const EVENT_ID_LEN: usize = 24;

static LAST_CLOCK: AtomicU64 = AtomicU64::new(0);
static PROCESS_NONCE: OnceLock<u32> = OnceLock::new();

/// Returns a clock word strictly greater than every one handed out before.
///
/// If the wall clock stalls or steps backwards the sequence keeps counting,
/// borrowing from future milliseconds rather than repeating a value.
fn next_clock() -> u64 {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let candidate = millis << SEQ_BITS;
    let mut prev = LAST_CLOCK.load(Ordering::Relaxed);
    loop {
        let next = if candidate > prev { candidate } else { prev + 1 };
        match LAST_CLOCK.compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

fn process_nonce() -> u32 {
    *PROCESS_NONCE.get_or_init(|| {
        let bytes = Uuid::new_v4().into_bytes();
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    })
}

/// Unique, creation-ordered identifier of an event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Mints a new id, ordered after every id previously minted here.
    pub fn new() -> Self {
        Self(format!("{:016x}{:08x}", next_clock(), process_nonce()))
    }

    /// Creates an ID from an existing string (for deserialization/testing).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the id has the shape produced by [`EventId::new`].
    ///
    /// Stores that derive file names from ids refuse anything else.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == EVENT_ID_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_new_id_is_well_formed() {
        let id = EventId::new();
        assert_eq!(id.as_str().len(), EVENT_ID_LEN);
        assert!(id.is_well_formed());
    }

    #[test]
    fn test_ids_are_creation_ordered() {
        let ids: Vec<EventId> = (0..1000).map(|_| EventId::new()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..500).map(|_| EventId::new()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn test_malformed_ids_rejected() {
        assert!(!EventId::from_string("../../etc/passwd").is_well_formed());
        assert!(!EventId::from_string("0123456789ABCDEF01234567").is_well_formed());
        assert!(!EventId::from_string("abc").is_well_formed());
    }

    #[test]
    fn test_id_serialization() {
        let id = EventId::from_string("0000018f0a1b2c3d00112233");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0000018f0a1b2c3d00112233\"");

        let parsed: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
