// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    clock::Timestamp,
    event::CounterEvent,
    statistics::{Statistics, StatisticsConfig},
};

/// Signed 64-bit counter.
///
/// Every applied event feeds the post-update value into the statistics, so
/// `value` always equals the signed sum of increments and decrements since the
/// last `init`/`change` override, in event order.
#[derive(Clone, Debug)]
pub struct Counter {
    value: i64,
    stats: Statistics,
}

impl Counter {
    pub fn new(config: &StatisticsConfig) -> Self {
        Counter {
            value: 0,
            stats: Statistics::new(config),
        }
    }

    pub fn apply(&mut self, event: CounterEvent, timestamp: Timestamp) {
        match event {
            CounterEvent::Init(value) | CounterEvent::Change(value) => self.value = value,
            CounterEvent::Increment(delta) => self.value = self.value.wrapping_add(delta),
            CounterEvent::Decrement(delta) => self.value = self.value.wrapping_sub(delta),
        }
        self.stats.update(self.value as f64, timestamp);
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Statistics {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use crate::clock;

    use super::*;

    #[test]
    fn value_tracks_event_order() {
        let mut counter = Counter::new(&StatisticsConfig::default());
        counter.apply(CounterEvent::Init(10), clock::now());
        counter.apply(CounterEvent::Increment(5), clock::now());
        counter.apply(CounterEvent::Decrement(3), clock::now());
        counter.apply(CounterEvent::Increment(1), clock::now());
        assert_eq!(counter.value(), 13);
        assert_eq!(counter.stats().count(), 4);
    }

    #[test]
    fn change_overrides_value() {
        let mut counter = Counter::new(&StatisticsConfig::default());
        counter.apply(CounterEvent::Increment(100), clock::now());
        counter.apply(CounterEvent::Change(7), clock::now());
        counter.apply(CounterEvent::Decrement(7), clock::now());
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn init_feeds_a_sample_without_resetting_statistics() {
        let mut counter = Counter::new(&StatisticsConfig::default());
        counter.apply(CounterEvent::Increment(1), clock::now());
        counter.apply(CounterEvent::Init(0), clock::now());
        assert_eq!(counter.value(), 0);
        assert_eq!(counter.stats().count(), 2);
    }
}
