// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use ahash::AHashMap;

use crate::{
    clock::Timestamp,
    event::TimerEvent,
    statistics::{Statistics, StatisticsConfig},
};

/// Outcome of applying a timer event, so the worker can count dropped stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerOutcome {
    Applied,
    /// `stop` for an instance that was never started (or already stopped).
    UnknownStop,
    /// `stop` for an instance whose last heartbeat was older than the idle
    /// timeout; the instance is evicted without producing a sample.
    IdleStop,
}

#[derive(Clone, Copy, Debug)]
struct Instance {
    start: Timestamp,
    heartbeat: Timestamp,
}

/// Interval timer with concurrently running instances.
///
/// Instances are keyed by an opaque id (`0` is the default singleton). A
/// `stop` feeds the elapsed time since the instance's `start` into the
/// statistics as fractional milliseconds. Instances that miss heartbeats for
/// longer than the idle timeout are evicted so abandoned starts cannot leak
/// or contribute samples.
#[derive(Clone, Debug)]
pub struct Timer {
    instances: AHashMap<u64, Instance>,
    idle_timeout: Duration,
    stats: Statistics,
}

impl Timer {
    pub fn new(config: &StatisticsConfig, idle_timeout: Duration) -> Self {
        Timer {
            instances: AHashMap::new(),
            idle_timeout,
            stats: Statistics::new(config),
        }
    }

    pub fn apply(&mut self, event: TimerEvent, timestamp: Timestamp) -> TimerOutcome {
        let outcome = self.apply_event(event, timestamp);
        self.sweep(timestamp);
        outcome
    }

    fn apply_event(&mut self, event: TimerEvent, timestamp: Timestamp) -> TimerOutcome {
        match event {
            TimerEvent::Init => TimerOutcome::Applied,
            TimerEvent::Start(id) => {
                // later start wins: a re-start replaces the running instance
                self.instances.insert(
                    id,
                    Instance {
                        start: timestamp,
                        heartbeat: timestamp,
                    },
                );
                self.stats.update_event(timestamp);
                TimerOutcome::Applied
            }
            TimerEvent::Heartbeat(id) => {
                if let Some(instance) = self.instances.get_mut(&id) {
                    instance.heartbeat = instance.heartbeat.max(timestamp);
                }
                self.stats.update_event(timestamp);
                TimerOutcome::Applied
            }
            TimerEvent::Stop(id) => {
                let Some(instance) = self.instances.remove(&id) else {
                    return TimerOutcome::UnknownStop;
                };
                if timestamp.saturating_duration_since(instance.heartbeat) > self.idle_timeout {
                    return TimerOutcome::IdleStop;
                }
                let elapsed = timestamp.saturating_duration_since(instance.start);
                self.stats.update(duration_to_millis(elapsed), timestamp);
                TimerOutcome::Applied
            }
            TimerEvent::Discard(id) => {
                self.instances.remove(&id);
                self.stats.update_event(timestamp);
                TimerOutcome::Applied
            }
            TimerEvent::Set(duration) => {
                self.stats.update(duration_to_millis(duration), timestamp);
                TimerOutcome::Applied
            }
        }
    }

    /// Evicts instances whose last heartbeat is older than the idle timeout.
    fn sweep(&mut self, now: Timestamp) {
        let idle_timeout = self.idle_timeout;
        self.instances
            .retain(|_, instance| now.saturating_duration_since(instance.heartbeat) <= idle_timeout);
    }

    pub fn running_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Statistics {
        &mut self.stats
    }
}

fn duration_to_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    const IDLE: Duration = Duration::from_millis(100);

    fn timer() -> Timer {
        Timer::new(&StatisticsConfig::default(), IDLE)
    }

    fn at_millis(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn stop_measures_elapsed_time() {
        let mut timer = timer();
        timer.apply(TimerEvent::Start(0), at_millis(0));
        let outcome = timer.apply(TimerEvent::Stop(0), at_millis(40));
        assert_eq!(outcome, TimerOutcome::Applied);
        assert_eq!(timer.stats().count(), 1);
        assert_approx_eq!(timer.stats().value(), 40.0, 1e-9);
        assert_eq!(timer.running_instances(), 0);
    }

    #[test]
    fn unknown_stop_is_dropped() {
        let mut timer = timer();
        let outcome = timer.apply(TimerEvent::Stop(7), at_millis(1));
        assert_eq!(outcome, TimerOutcome::UnknownStop);
        assert_eq!(timer.stats().count(), 0);
    }

    #[test]
    fn restart_wins_and_counts_one_stop() {
        let mut timer = timer();
        timer.apply(TimerEvent::Start(0), at_millis(0));
        timer.apply(TimerEvent::Start(0), at_millis(30));
        timer.apply(TimerEvent::Stop(0), at_millis(50));
        // second stop has nothing left to stop
        let outcome = timer.apply(TimerEvent::Stop(0), at_millis(60));

        assert_eq!(timer.stats().count(), 1);
        assert_approx_eq!(timer.stats().value(), 20.0, 1e-9);
        assert_eq!(outcome, TimerOutcome::UnknownStop);
    }

    #[test]
    fn heartbeats_keep_an_instance_alive() {
        let mut timer = timer();
        timer.apply(TimerEvent::Start(0), at_millis(0));
        for i in 1..=5 {
            timer.apply(TimerEvent::Heartbeat(0), at_millis(i * 90));
        }
        let outcome = timer.apply(TimerEvent::Stop(0), at_millis(500));
        assert_eq!(outcome, TimerOutcome::Applied);
        assert_eq!(timer.stats().count(), 1);
        assert_approx_eq!(timer.stats().value(), 500.0, 1e-9);
    }

    #[test]
    fn idle_instance_contributes_no_sample() {
        let mut timer = timer();
        timer.apply(TimerEvent::Start(0), at_millis(0));
        let outcome = timer.apply(TimerEvent::Stop(0), at_millis(500));
        assert_eq!(outcome, TimerOutcome::IdleStop);
        assert_eq!(timer.stats().count(), 0);
        assert_eq!(timer.running_instances(), 0);
    }

    #[test]
    fn sweep_evicts_abandoned_instances_on_any_access() {
        let mut timer = timer();
        timer.apply(TimerEvent::Start(0), at_millis(0));
        timer.apply(TimerEvent::Start(1), at_millis(480));
        // applying any event sweeps instance 0 (idle since t=0)
        timer.apply(TimerEvent::Heartbeat(1), at_millis(500));
        assert_eq!(timer.running_instances(), 1);
        let outcome = timer.apply(TimerEvent::Stop(0), at_millis(510));
        assert_eq!(outcome, TimerOutcome::UnknownStop);
        assert_eq!(timer.stats().count(), 0);
    }

    #[test]
    fn discard_removes_without_sample() {
        let mut timer = timer();
        timer.apply(TimerEvent::Start(3), at_millis(0));
        timer.apply(TimerEvent::Discard(3), at_millis(10));
        assert_eq!(timer.running_instances(), 0);
        assert_eq!(timer.stats().count(), 0);
    }

    #[test]
    fn set_feeds_a_direct_sample() {
        let mut timer = timer();
        timer.apply(TimerEvent::Set(Duration::from_millis(250)), at_millis(0));
        assert_eq!(timer.stats().count(), 1);
        assert_approx_eq!(timer.stats().value(), 250.0, 1e-9);
    }

    #[test]
    fn concurrent_instances_are_independent() {
        let mut timer = timer();
        timer.apply(TimerEvent::Start(1), at_millis(0));
        timer.apply(TimerEvent::Start(2), at_millis(10));
        timer.apply(TimerEvent::Stop(2), at_millis(30));
        timer.apply(TimerEvent::Stop(1), at_millis(50));
        assert_eq!(timer.stats().count(), 2);
        assert_approx_eq!(timer.stats().min(), 20.0, 1e-9);
        assert_approx_eq!(timer.stats().max(), 50.0, 1e-9);
    }
}
