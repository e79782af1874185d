//! Shared value types: grid sizes and generated identifiers.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Component definition identifier.
pub type ComponentId = String;

/// Layout instance identifier (UUID v4 text).
pub type InstanceId = String;

/// Width/height pair in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Component-wise minimum.
    pub fn min(self, other: Size) -> Size {
        Size::new(self.w.min(other.w), self.h.min(other.h))
    }

    /// True when both dimensions fit inside `other`.
    pub fn fits_within(self, other: Size) -> bool {
        self.w <= other.w && self.h <= other.h
    }
}

static LAST_ISSUED_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Generate a timestamp-based component id (`custom-<millis>`).
///
/// Ids are unique within the process even when several are issued in the same
/// millisecond: the timestamp is bumped past the last issued value.
pub fn generate_component_id() -> ComponentId {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_ISSUED_MILLIS.load(Ordering::SeqCst);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_ISSUED_MILLIS.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => return format!("custom-{}", next),
            Err(observed) => last = observed,
        }
    }
}

/// Generate a fresh layout instance id.
pub fn generate_instance_id() -> InstanceId {
    uuid::Uuid::new_v4().to_string()
}
