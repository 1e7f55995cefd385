// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Monotonic timestamps shared by events and statistics.
//!
//! All instrumentation timestamps are nanoseconds on a single monotonic clock
//! whose origin is captured once per process, together with the wall clock at
//! the same moment. Statistics arithmetic stays on the monotonic axis; the
//! paired wall-clock reading exists only so snapshots can export sample times
//! as epoch milliseconds.

use std::{
    ops::{Add, Sub},
    sync::LazyLock,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Monotonic origin and the wall clock observed at that same moment.
///
/// Capturing both in one shot keeps the monotonic→wall projection consistent
/// for the lifetime of the process.
struct Origin {
    started: Instant,
    started_wall: SystemTime,
}

static ORIGIN: LazyLock<Origin> = LazyLock::new(|| Origin {
    started: Instant::now(),
    started_wall: SystemTime::now(),
});

/// Nanoseconds since the process-local monotonic origin.
///
/// `Timestamp` is the time axis of every [`Event`](crate::event::Event) and of
/// all moving-window bookkeeping. It is signed so that durations between
/// timestamps taken on different threads can be formed without panicking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

pub const NANOS_PER_MICRO: i64 = 1_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

impl Timestamp {
    /// The monotonic origin itself.
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Timestamp(nanos)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Timestamp(millis * NANOS_PER_MILLI)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub const fn as_micros(self) -> i64 {
        self.0 / NANOS_PER_MICRO
    }

    pub const fn as_millis(self) -> i64 {
        self.0 / NANOS_PER_MILLI
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// Duration since `earlier`, clamped to zero when `earlier` is actually
    /// later (timestamps from different threads are not totally ordered).
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0).max(0) as u64)
    }

    /// Projects this monotonic timestamp onto the wall clock.
    pub fn to_wall(self) -> SystemTime {
        let origin = &*ORIGIN;
        if self.0 >= 0 {
            origin.started_wall + Duration::from_nanos(self.0 as u64)
        } else {
            origin.started_wall - Duration::from_nanos(self.0.unsigned_abs())
        }
    }

    /// Wall-clock milliseconds since the Unix epoch for this timestamp.
    pub fn to_epoch_millis(self) -> i64 {
        self.to_wall()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.as_nanos() as i64))
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs.as_nanos() as i64))
    }
}

/// Current monotonic timestamp.
///
/// The first call pins the process origin; all later calls are a single
/// `Instant::now()` plus a subtraction.
pub fn now() -> Timestamp {
    let origin = &*ORIGIN;
    Timestamp(origin.started.elapsed().as_nanos() as i64)
}

/// Current wall clock, for export surfaces only.
pub fn system_now() -> SystemTime {
    SystemTime::now()
}
