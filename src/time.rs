//! Coarse wall-clock timestamps in milliseconds.
//!
//! Values follow the system clock and are not monotonic: they move with clock
//! adjustments and are meant for timing, not ordering.

use std::ptr;

use crate::error::errno;
use crate::Result;

/// Returns the milliseconds elapsed since the Unix epoch, truncated from the
/// clock's microsecond resolution.
///
/// If the system clock cannot be read this returns `0` instead of an error,
/// so callers measuring intervals must be prepared to see a zero reading. Use
/// [try_current_time_millis] to observe the failure.
pub fn current_time_millis() -> i64 {
    millis_or_zero(read_clock())
}

/// Returns the milliseconds elapsed since the Unix epoch.
///
/// # Errors
///
/// Returns [crate::Error::Clock] if the system clock could not be read.
pub fn try_current_time_millis() -> Result<i64> {
    read_clock().map(|tv| to_millis(&tv))
}

fn read_clock() -> Result<libc::timeval> {
    let mut tv = libc::timeval {
        tv_sec: 0,
        tv_usec: 0,
    };

    if unsafe { libc::gettimeofday(&raw mut tv, ptr::null_mut()) } == -1 {
        return Err(errno!(Clock, "failed to read system clock"));
    }

    Ok(tv)
}

fn millis_or_zero(reading: Result<libc::timeval>) -> i64 {
    match reading {
        Ok(tv) => to_millis(&tv),
        Err(_) => 0,
    }
}

fn to_millis(tv: &libc::timeval) -> i64 {
    (tv.tv_sec as i64) * 1000 + (tv.tv_usec as i64) / 1000
}
