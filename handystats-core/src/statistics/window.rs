// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Sliding-window bookkeeping for moving aggregates.
//!
//! Samples are folded into a fixed ring of buckets that together span the
//! moving interval. Nothing is retained per sample; eviction is lazy — a
//! bucket is reused the moment an event lands in its slot's successor, and
//! queries simply ignore buckets that have slid out of the window.

/// Number of buckets covering one moving interval.
const BUCKET_COUNT: usize = 60;

/// A bucket's slot value when it has never been written.
const VACANT: i64 = i64::MIN;

#[derive(Clone, Copy, Debug)]
struct Bucket {
    /// Start of the covered time span in nanoseconds; [`VACANT`] if unused.
    slot: i64,
    count: f64,
    sum: f64,
}

impl Default for Bucket {
    fn default() -> Self {
        Bucket {
            slot: VACANT,
            count: 0.0,
            sum: 0.0,
        }
    }
}

/// Totals of the samples currently inside the window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct WindowTotals {
    pub count: f64,
    pub sum: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct Ring {
    buckets: Vec<Bucket>,
    /// Time span of a single bucket in nanoseconds.
    width: i64,
}

impl Ring {
    pub fn new(interval_nanos: i64) -> Self {
        Ring {
            buckets: vec![Bucket::default(); BUCKET_COUNT],
            width: (interval_nanos / BUCKET_COUNT as i64).max(1),
        }
    }

    /// Folds one sample into its bucket.
    ///
    /// A sample whose slot was already recycled for a newer time span is
    /// silently ignored — it is older than anything the ring still covers.
    pub fn insert(&mut self, timestamp_nanos: i64, value: f64) {
        let slot = timestamp_nanos - timestamp_nanos.rem_euclid(self.width);
        let index = (slot / self.width).rem_euclid(self.buckets.len() as i64) as usize;
        let bucket = &mut self.buckets[index];
        if bucket.slot != slot {
            if slot < bucket.slot {
                return;
            }
            *bucket = Bucket {
                slot,
                count: 0.0,
                sum: 0.0,
            };
        }
        bucket.count += 1.0;
        bucket.sum += value;
    }

    /// Totals over `[window_end − interval, window_end]`.
    ///
    /// The bucket straddling the window start contributes proportionally to
    /// its overlap, so the totals change smoothly as the window slides.
    pub fn totals(&self, window_end: i64, interval_nanos: i64) -> WindowTotals {
        let window_start = window_end.saturating_sub(interval_nanos);
        let mut totals = WindowTotals::default();
        for bucket in &self.buckets {
            if bucket.slot == VACANT || bucket.slot > window_end {
                continue;
            }
            let bucket_end = bucket.slot + self.width;
            if bucket_end <= window_start {
                continue;
            }
            let fraction = if bucket.slot >= window_start {
                1.0
            } else {
                (bucket_end - window_start) as f64 / self.width as f64
            };
            totals.count += bucket.count * fraction;
            totals.sum += bucket.sum * fraction;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    const SECOND: i64 = 1_000_000_000;

    #[test]
    fn totals_cover_recent_samples() {
        let mut ring = Ring::new(SECOND);
        for i in 0..10 {
            ring.insert(i * SECOND / 100, i as f64);
        }
        let totals = ring.totals(SECOND / 10, SECOND);
        assert_approx_eq!(totals.count, 10.0);
        assert_approx_eq!(totals.sum, 45.0);
    }

    #[test]
    fn old_buckets_slide_out() {
        let mut ring = Ring::new(SECOND);
        ring.insert(0, 100.0);
        ring.insert(5 * SECOND, 1.0);

        let totals = ring.totals(5 * SECOND, SECOND);
        assert_approx_eq!(totals.count, 1.0);
        assert_approx_eq!(totals.sum, 1.0);
    }

    #[test]
    fn stale_sample_for_recycled_slot_is_ignored() {
        // one-minute interval, so each bucket spans exactly one second
        let mut ring = Ring::new(60 * SECOND);
        ring.insert(10 * SECOND, 1.0);
        // a full ring revolution later: recycles the same bucket index
        ring.insert(70 * SECOND, 1.0);
        // older than the recycled slot, must not resurrect it
        ring.insert(10 * SECOND, 50.0);

        let totals = ring.totals(70 * SECOND, 60 * SECOND);
        assert_approx_eq!(totals.count, 1.0);
        assert_approx_eq!(totals.sum, 1.0);
    }

    #[test]
    fn boundary_bucket_is_interpolated() {
        let mut ring = Ring::new(SECOND);
        let width = SECOND / 60;
        ring.insert(0, 60.0);
        // window start lands halfway into the first bucket
        let totals = ring.totals(SECOND + width / 2, SECOND);
        assert_approx_eq!(totals.count, 0.5, 1e-9);
        assert_approx_eq!(totals.sum, 30.0, 1e-6);
    }
}
