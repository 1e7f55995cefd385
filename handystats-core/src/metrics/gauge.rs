// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    clock::Timestamp,
    event::GaugeEvent,
    statistics::{Statistics, StatisticsConfig},
};

/// Floating-point last-value gauge. Each `set` is also a statistics sample.
#[derive(Clone, Debug)]
pub struct Gauge {
    value: f64,
    stats: Statistics,
}

impl Gauge {
    pub fn new(config: &StatisticsConfig) -> Self {
        Gauge {
            value: 0.0,
            stats: Statistics::new(config),
        }
    }

    pub fn apply(&mut self, event: GaugeEvent, timestamp: Timestamp) {
        match event {
            GaugeEvent::Init(value) | GaugeEvent::Set(value) => self.value = value,
        }
        self.stats.update(self.value, timestamp);
    }

    pub fn value(&self) -> f64 {
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
    use assert_approx_eq::assert_approx_eq;

    use crate::clock;

    use super::*;

    #[test]
    fn set_replaces_value_and_feeds_statistics() {
        let mut gauge = Gauge::new(&StatisticsConfig::default());
        for i in 0..10 {
            gauge.apply(GaugeEvent::Set(i as f64), clock::now());
        }
        assert_approx_eq!(gauge.value(), 9.0, 1e-9);
        assert_eq!(gauge.stats().count(), 10);
        assert_approx_eq!(gauge.stats().min(), 0.0, 1e-9);
        assert_approx_eq!(gauge.stats().max(), 9.0, 1e-9);
        assert_approx_eq!(gauge.stats().avg(), 4.5, 1e-9);
    }
}
