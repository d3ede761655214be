//! Time source for the tracker.
//!
//! Code that depends on the current time takes it as a parameter
//! (`DurationSinceUnixEpoch`), so tests can pin timestamps; this module is
//! where production call sites get that value from.
use std::time::SystemTime;

use torrust_udp_tracker_primitives::DurationSinceUnixEpoch;

/// Returns the current time as a duration since the Unix Epoch.
///
/// # Panics
///
/// Will panic if the system clock is set before the Unix Epoch.
#[must_use]
pub fn now() -> DurationSinceUnixEpoch {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("the system clock should be set after the Unix Epoch")
}
