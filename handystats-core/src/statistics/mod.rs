// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Incremental statistics over a stream of timestamped samples.
//!
//! One [`Statistics`] instance aggregates a single metric. All-time scalars
//! (count, sum, min, max) are O(1) per sample; moving aggregates live in a
//! fixed bucket ring spanning the configured interval; quantiles come from an
//! adaptive histogram. No raw samples are retained, so memory stays constant
//! under unbounded event streams.
//!
//! The aggregates actually maintained are selected by a [`Tags`] mask.
//! Reading a disabled aggregate is well defined: it returns zero, and
//! [`Statistics::enabled`] is the authoritative predicate.

mod histogram;
mod window;

use std::time::Duration;

pub use histogram::Bin;

use crate::clock::{NANOS_PER_SEC, Timestamp};

use self::{histogram::Histogram, window::Ring};

bitflags::bitflags! {
    /// Selectable aggregates.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Tags: u32 {
        const VALUE        = 1 << 0;
        const COUNT        = 1 << 1;
        const MIN          = 1 << 2;
        const MAX          = 1 << 3;
        const SUM          = 1 << 4;
        const AVG          = 1 << 5;
        const MOVING_COUNT = 1 << 6;
        const MOVING_SUM   = 1 << 7;
        const MOVING_AVG   = 1 << 8;
        const HISTOGRAM    = 1 << 9;
        const QUANTILE     = 1 << 10;
        const TIMESTAMP    = 1 << 11;
        const THROUGHPUT   = 1 << 12;
        const FREQUENCY    = 1 << 13;
    }
}

/// Tag names as they appear in configuration `stats` lists and JSON dumps.
pub const TAG_NAMES: &[(&str, Tags)] = &[
    ("value", Tags::VALUE),
    ("count", Tags::COUNT),
    ("min", Tags::MIN),
    ("max", Tags::MAX),
    ("sum", Tags::SUM),
    ("avg", Tags::AVG),
    ("moving-count", Tags::MOVING_COUNT),
    ("moving-sum", Tags::MOVING_SUM),
    ("moving-avg", Tags::MOVING_AVG),
    ("histogram", Tags::HISTOGRAM),
    ("quantile", Tags::QUANTILE),
    ("timestamp", Tags::TIMESTAMP),
    ("throughput", Tags::THROUGHPUT),
    ("frequency", Tags::FREQUENCY),
];

impl Tags {
    /// Aggregates maintained when a configuration selects nothing explicitly.
    pub const DEFAULT: Tags = Tags::VALUE
        .union(Tags::COUNT)
        .union(Tags::MIN)
        .union(Tags::MAX)
        .union(Tags::SUM)
        .union(Tags::AVG)
        .union(Tags::MOVING_COUNT)
        .union(Tags::MOVING_SUM)
        .union(Tags::MOVING_AVG)
        .union(Tags::TIMESTAMP);

    /// Parses a single configuration tag name.
    pub fn from_tag_name(name: &str) -> Option<Tags> {
        TAG_NAMES
            .iter()
            .find(|(tag_name, _)| *tag_name == name)
            .map(|(_, tag)| *tag)
    }

    /// Adds the aggregates a selected tag is derived from, so that e.g.
    /// requesting only `avg` still maintains `count` and `sum`.
    pub fn with_dependencies(self) -> Tags {
        let mut tags = self;
        if tags.contains(Tags::AVG) {
            tags |= Tags::COUNT | Tags::SUM;
        }
        if tags.contains(Tags::MOVING_AVG) {
            tags |= Tags::MOVING_COUNT | Tags::MOVING_SUM;
        }
        if tags.contains(Tags::THROUGHPUT) {
            tags |= Tags::MOVING_COUNT;
        }
        if tags.contains(Tags::QUANTILE) {
            tags |= Tags::HISTOGRAM;
        }
        tags
    }

    fn needs_moving_window(self) -> bool {
        self.intersects(Tags::MOVING_COUNT | Tags::MOVING_SUM | Tags::MOVING_AVG | Tags::THROUGHPUT)
    }
}

/// Per-metric statistics tunables, resolved from configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatisticsConfig {
    /// Width of the sliding window for moving aggregates.
    pub moving_interval: Duration,
    /// Bin budget of the adaptive histogram.
    pub histogram_bins: usize,
    /// Aggregates to maintain.
    pub tags: Tags,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        StatisticsConfig {
            moving_interval: Duration::from_secs(1),
            histogram_bins: 30,
            tags: Tags::DEFAULT,
        }
    }
}

/// Rolling aggregates for one metric.
#[derive(Clone, Debug)]
pub struct Statistics {
    tags: Tags,
    interval: i64,
    value: f64,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    moving: Ring,
    events: Ring,
    histogram: Histogram,
    /// Monotonic nanoseconds of the most recent sample; `None` until then.
    last_sample: Option<i64>,
    /// Latest time the statistics has observed (samples or window advances).
    window_end: i64,
}

impl Statistics {
    pub fn new(config: &StatisticsConfig) -> Self {
        let interval = (config.moving_interval.as_nanos() as i64).max(1);
        Statistics {
            tags: config.tags.with_dependencies(),
            interval,
            value: 0.0,
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            moving: Ring::new(interval),
            events: Ring::new(interval),
            histogram: Histogram::new(config.histogram_bins, interval),
            last_sample: None,
            window_end: 0,
        }
    }

    /// Whether every aggregate in `tags` is maintained.
    pub fn enabled(&self, tags: Tags) -> bool {
        self.tags.contains(tags)
    }

    pub fn moving_interval(&self) -> Duration {
        Duration::from_nanos(self.interval as u64)
    }

    /// Folds one sample in.
    ///
    /// A sample older than the current window still updates the all-time
    /// scalars but is excluded from the moving aggregates (bounded-skew
    /// tolerance for out-of-order arrival across producer threads).
    pub fn update(&mut self, value: f64, timestamp: Timestamp) {
        let nanos = timestamp.as_nanos();

        self.value = value;
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if self.tags.needs_moving_window() {
            self.moving.insert(nanos, value);
        }
        if self.tags.contains(Tags::FREQUENCY) {
            self.events.insert(nanos, 0.0);
        }
        if self.tags.contains(Tags::HISTOGRAM) {
            self.histogram.insert(value, nanos);
        }

        self.last_sample = Some(self.last_sample.map_or(nanos, |last| last.max(nanos)));
        self.window_end = self.window_end.max(nanos);
    }

    /// Advances the window without recording anything, so moving aggregates
    /// reflect `timestamp` even when the metric has gone quiet.
    pub fn update_time(&mut self, timestamp: Timestamp) {
        let nanos = timestamp.as_nanos();
        if nanos <= self.window_end {
            return;
        }
        self.window_end = nanos;
        if self.tags.contains(Tags::HISTOGRAM) {
            self.histogram.advance(nanos);
        }
    }

    /// Records an event with no magnitude (feeds `frequency` only).
    pub fn update_event(&mut self, timestamp: Timestamp) {
        let nanos = timestamp.as_nanos();
        if self.tags.contains(Tags::FREQUENCY) {
            self.events.insert(nanos, 0.0);
        }
        self.window_end = self.window_end.max(nanos);
    }

    pub fn value(&self) -> f64 {
        if self.enabled(Tags::VALUE) { self.value } else { 0.0 }
    }

    pub fn count(&self) -> u64 {
        if self.enabled(Tags::COUNT) { self.count } else { 0 }
    }

    pub fn min(&self) -> f64 {
        if self.enabled(Tags::MIN) && self.count > 0 {
            self.min
        } else {
            0.0
        }
    }

    pub fn max(&self) -> f64 {
        if self.enabled(Tags::MAX) && self.count > 0 {
            self.max
        } else {
            0.0
        }
    }

    pub fn sum(&self) -> f64 {
        if self.enabled(Tags::SUM) { self.sum } else { 0.0 }
    }

    pub fn avg(&self) -> f64 {
        if self.enabled(Tags::AVG) && self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    pub fn moving_count(&self) -> f64 {
        if self.enabled(Tags::MOVING_COUNT) {
            self.window_totals().count
        } else {
            0.0
        }
    }

    pub fn moving_sum(&self) -> f64 {
        if self.enabled(Tags::MOVING_SUM) {
            self.window_totals().sum
        } else {
            0.0
        }
    }

    pub fn moving_avg(&self) -> f64 {
        if !self.enabled(Tags::MOVING_AVG) {
            return 0.0;
        }
        let totals = self.window_totals();
        if totals.count > 0.0 {
            totals.sum / totals.count
        } else {
            0.0
        }
    }

    /// Samples per second within the window.
    pub fn throughput(&self) -> f64 {
        if !self.enabled(Tags::THROUGHPUT) {
            return 0.0;
        }
        self.window_totals().count * NANOS_PER_SEC as f64 / self.interval as f64
    }

    /// Events per second within the window, counting magnitude-free events.
    pub fn frequency(&self) -> f64 {
        if !self.enabled(Tags::FREQUENCY) {
            return 0.0;
        }
        let totals = self.events.totals(self.window_end, self.interval);
        totals.count * NANOS_PER_SEC as f64 / self.interval as f64
    }

    /// Current histogram bins; empty when the histogram is disabled.
    pub fn histogram(&self) -> &[Bin] {
        if self.enabled(Tags::HISTOGRAM) {
            self.histogram.bins()
        } else {
            &[]
        }
    }

    /// Approximate quantile at `level` in `[0, 1]`.
    pub fn quantile(&self, level: f64) -> f64 {
        if self.enabled(Tags::QUANTILE) {
            self.histogram.quantile(level)
        } else {
            0.0
        }
    }

    /// Wall-clock time of the most recent sample.
    pub fn timestamp(&self) -> Option<std::time::SystemTime> {
        if !self.enabled(Tags::TIMESTAMP) {
            return None;
        }
        self.last_sample
            .map(|nanos| Timestamp::from_nanos(nanos).to_wall())
    }

    /// Epoch milliseconds of the most recent sample, for export.
    pub fn timestamp_millis(&self) -> Option<i64> {
        if !self.enabled(Tags::TIMESTAMP) {
            return None;
        }
        self.last_sample
            .map(|nanos| Timestamp::from_nanos(nanos).to_epoch_millis())
    }

    fn window_totals(&self) -> window::WindowTotals {
        self.moving.totals(self.window_end, self.interval)
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn config(tags: Tags) -> StatisticsConfig {
        StatisticsConfig {
            tags,
            ..StatisticsConfig::default()
        }
    }

    fn at_millis(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn all_time_aggregates() {
        let mut stats = Statistics::new(&StatisticsConfig::default());
        let samples = [3.0, -1.0, 7.5, 0.25];
        for (i, sample) in samples.iter().enumerate() {
            stats.update(*sample, at_millis(i as i64));
        }

        assert_eq!(stats.count(), 4);
        assert_approx_eq!(stats.min(), -1.0, 1e-9);
        assert_approx_eq!(stats.max(), 7.5, 1e-9);
        assert_approx_eq!(stats.sum(), 9.75, 1e-9);
        assert_approx_eq!(stats.avg(), 9.75 / 4.0, 1e-9);
        assert_approx_eq!(stats.value(), 0.25, 1e-9);
    }

    #[test]
    fn empty_statistics_read_as_zero() {
        let stats = Statistics::new(&StatisticsConfig::default());
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.min(), 0.0);
        assert_eq!(stats.max(), 0.0);
        assert_eq!(stats.avg(), 0.0);
        assert_eq!(stats.timestamp(), None);
    }

    #[test]
    fn moving_window_slides() {
        let mut stats = Statistics::new(&StatisticsConfig::default());
        for i in 0..10 {
            stats.update(1.0, at_millis(i * 10));
        }
        assert_approx_eq!(stats.moving_count(), 10.0, 1e-9);
        assert_approx_eq!(stats.moving_sum(), 10.0, 1e-9);
        assert_approx_eq!(stats.moving_avg(), 1.0, 1e-9);

        // two intervals later everything has slid out, all-time stays
        stats.update_time(at_millis(2_090));
        assert_approx_eq!(stats.moving_count(), 0.0, 1e-9);
        assert_approx_eq!(stats.moving_avg(), 0.0, 1e-9);
        assert_eq!(stats.count(), 10);
    }

    #[test]
    fn out_of_order_sample_within_window_counts() {
        let mut stats = Statistics::new(&StatisticsConfig::default());
        stats.update(1.0, at_millis(500));
        stats.update(1.0, at_millis(400));
        assert_eq!(stats.count(), 2);
        assert_approx_eq!(stats.moving_count(), 2.0, 1e-9);
    }

    #[test]
    fn sample_older_than_window_skips_moving_aggregates() {
        let mut stats = Statistics::new(&StatisticsConfig::default());
        stats.update(1.0, at_millis(10_000));
        // five intervals in the past
        stats.update(100.0, at_millis(5_000));

        assert_eq!(stats.count(), 2);
        assert_approx_eq!(stats.max(), 100.0, 1e-9);
        assert_approx_eq!(stats.moving_count(), 1.0, 1e-9);
        assert_approx_eq!(stats.moving_sum(), 1.0, 1e-9);
    }

    #[test]
    fn throughput_is_samples_per_second() {
        let mut stats = Statistics::new(&config(Tags::THROUGHPUT));
        for i in 0..100 {
            stats.update(5.0, at_millis(i * 10));
        }
        // 100 samples within a 1 s window
        assert_approx_eq!(stats.throughput(), 100.0, 1.0);
    }

    #[test]
    fn frequency_counts_magnitude_free_events() {
        let mut stats = Statistics::new(&config(Tags::FREQUENCY));
        for i in 0..50 {
            stats.update_event(at_millis(i * 10));
        }
        assert_approx_eq!(stats.frequency(), 50.0, 1.0);
    }

    #[test]
    fn disabled_tags_read_as_sentinels() {
        let stats = {
            let mut stats = Statistics::new(&config(Tags::COUNT));
            stats.update(42.0, at_millis(1));
            stats
        };
        assert!(stats.enabled(Tags::COUNT));
        assert!(!stats.enabled(Tags::HISTOGRAM));
        assert!(!stats.enabled(Tags::MOVING_AVG));
        assert_eq!(stats.count(), 1);
        assert_eq!(stats.value(), 0.0);
        assert_eq!(stats.quantile(0.5), 0.0);
        assert!(stats.histogram().is_empty());
        assert_eq!(stats.timestamp(), None);
    }

    #[test]
    fn dependency_expansion() {
        let tags = Tags::AVG.with_dependencies();
        assert!(tags.contains(Tags::COUNT | Tags::SUM));

        let tags = Tags::QUANTILE.with_dependencies();
        assert!(tags.contains(Tags::HISTOGRAM));

        let tags = (Tags::MOVING_AVG | Tags::THROUGHPUT).with_dependencies();
        assert!(tags.contains(Tags::MOVING_COUNT | Tags::MOVING_SUM));
    }

    #[test]
    fn tag_names_round_trip() {
        for (name, tag) in TAG_NAMES {
            assert_eq!(Tags::from_tag_name(name), Some(*tag));
        }
        assert_eq!(Tags::from_tag_name("invalid-statistic"), None);
    }

    #[test]
    fn histogram_and_quantile_through_statistics() {
        let mut stats = Statistics::new(&config(Tags::QUANTILE));
        for i in 0..10 {
            stats.update(i as f64, at_millis(i));
        }
        assert_eq!(stats.histogram().len(), 10);
        let median = stats.quantile(0.5);
        assert!((0.0..=9.0).contains(&median));
    }
}
