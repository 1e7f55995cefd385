// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The core worker: a dedicated thread that owns the metric registry.
//!
//! Producers only touch the event queue; the worker drains it in
//! deadline-checked batches, applies each event to its metric (creating the
//! metric lazily with a config resolved once and cached on it), and
//! periodically publishes snapshots. When the queue is empty the worker parks
//! and is unparked by the next push, a publication request, or shutdown.

use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use ahash::AHashMap;
use crossbeam_utils::sync::Parker;
use handystats_core::{
    Attribute, AttributeValue, Counter, Event, EventKind, Gauge, MetricKind, Tags, Timer,
    TimerOutcome, clock,
};

use crate::{
    config::Config,
    dump::{DumpState, MetricSnapshot, Snapshot},
    rate_limit::rate_limited,
};

/// Self-instrumentation metric names.
pub mod names {
    /// Gauge: events pending in the message queue.
    pub const MESSAGE_QUEUE_SIZE: &str = "handystats.message_queue.size";
    /// Counter: total events popped, with throughput enabled.
    pub const MESSAGE_QUEUE_POP_COUNT: &str = "handystats.message_queue.pop_count";
    /// Counter: timer stops dropped (unknown instance or idle instance).
    pub const TIMER_SKIP_COUNT: &str = "handystats.timer.skip_count";
    /// Attribute: wall-clock milliseconds at last publication.
    pub const SYSTEM_TIMESTAMP: &str = "handystats.system_timestamp";
}

/// How long `finalize` lets the worker drain already-queued events.
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(1);

/// Deadline-recheck granularity while draining, in events.
const DRAIN_CHECK_INTERVAL: usize = 32;

/// Longest the worker parks between housekeeping passes.
const MAX_PARK: Duration = Duration::from_millis(500);

enum MetricSlot {
    Counter(Counter),
    Gauge(Gauge),
    Timer(Timer),
}

impl MetricSlot {
    fn kind(&self) -> MetricKind {
        match self {
            MetricSlot::Counter(_) => MetricKind::Counter,
            MetricSlot::Gauge(_) => MetricKind::Gauge,
            MetricSlot::Timer(_) => MetricKind::Timer,
        }
    }
}

/// The worker-owned metric registry. Shared-nothing: nothing outside the
/// worker thread ever sees it.
struct Registry {
    config: Arc<Config>,
    metrics: AHashMap<String, MetricSlot>,
    attributes: AHashMap<String, Attribute>,
}

impl Registry {
    fn new(config: Arc<Config>) -> Self {
        Registry {
            config,
            metrics: AHashMap::new(),
            attributes: AHashMap::new(),
        }
    }

    /// Creates the metric for `(name, kind)` if absent, freezing its resolved
    /// config. `extra_tags` is used by self-instrumentation to force the
    /// aggregates it relies on.
    fn ensure(&mut self, name: &str, kind: MetricKind, extra_tags: Tags) -> &mut MetricSlot {
        if !self.metrics.contains_key(name) {
            let mut stats = self.config.statistics(kind, name);
            stats.tags |= extra_tags;
            let slot = match kind {
                MetricKind::Counter => MetricSlot::Counter(Counter::new(&stats)),
                MetricKind::Gauge => MetricSlot::Gauge(Gauge::new(&stats)),
                MetricKind::Timer => {
                    MetricSlot::Timer(Timer::new(&stats, self.config.idle_timeout(name)))
                }
                MetricKind::Attribute => unreachable!("attributes live in their own map"),
            };
            self.metrics.insert(name.to_owned(), slot);
        }
        self.metrics.get_mut(name).expect("just inserted")
    }

    fn apply(&mut self, event: Event) {
        let timestamp = event.timestamp;
        if let EventKind::Attribute(handystats_core::AttributeEvent::Set(value)) = event.kind {
            self.set_attribute(&event.name, value, timestamp);
            return;
        }

        let kind = event.kind.destination();
        let slot = self.ensure(&event.name, kind, Tags::empty());
        if slot.kind() != kind {
            rate_limited!(
                Duration::from_secs(1),
                tracing::warn!(
                    metric = %event.name,
                    expected = slot.kind().as_str(),
                    got = kind.as_str(),
                    "dropping event whose kind disagrees with the registered metric"
                )
            );
            return;
        }

        let timer_outcome = match (slot, event.kind) {
            (MetricSlot::Counter(counter), EventKind::Counter(counter_event)) => {
                counter.apply(counter_event, timestamp);
                TimerOutcome::Applied
            }
            (MetricSlot::Gauge(gauge), EventKind::Gauge(gauge_event)) => {
                gauge.apply(gauge_event, timestamp);
                TimerOutcome::Applied
            }
            (MetricSlot::Timer(timer), EventKind::Timer(timer_event)) => {
                timer.apply(timer_event, timestamp)
            }
            _ => unreachable!("kind checked above"),
        };
        if matches!(
            timer_outcome,
            TimerOutcome::UnknownStop | TimerOutcome::IdleStop
        ) {
            self.count_timer_skip(timestamp);
        }
    }

    fn count_timer_skip(&mut self, timestamp: handystats_core::Timestamp) {
        if let MetricSlot::Counter(counter) =
            self.ensure(names::TIMER_SKIP_COUNT, MetricKind::Counter, Tags::empty())
        {
            counter.apply(handystats_core::CounterEvent::Increment(1), timestamp);
        }
    }

    fn set_attribute(
        &mut self,
        name: &str,
        value: AttributeValue,
        timestamp: handystats_core::Timestamp,
    ) {
        match self.attributes.get_mut(name) {
            Some(attribute) => {
                attribute.apply(handystats_core::AttributeEvent::Set(value), timestamp);
            }
            None => {
                self.attributes
                    .insert(name.to_owned(), Attribute::new(value, timestamp));
            }
        }
    }

    fn snapshot(&mut self) -> Snapshot {
        let now = clock::now();
        let mut snapshot = Snapshot::default();
        for (name, slot) in &mut self.metrics {
            let (kind, stats) = match slot {
                MetricSlot::Counter(counter) => (MetricKind::Counter, counter.stats_mut()),
                MetricSlot::Gauge(gauge) => (MetricKind::Gauge, gauge.stats_mut()),
                MetricSlot::Timer(timer) => (MetricKind::Timer, timer.stats_mut()),
            };
            // bring every moving window up to publication time
            stats.update_time(now);
            snapshot
                .metrics
                .insert(name.clone(), MetricSnapshot::new(kind, stats.clone()));
        }
        for (name, attribute) in &self.attributes {
            snapshot
                .attributes
                .insert(name.clone(), attribute.value().clone());
        }
        snapshot
    }
}

/// Signals "the worker has seen the queue empty" to `wait_until_empty`.
pub(crate) struct EmptySignal {
    generation: Mutex<u64>,
    condvar: Condvar,
    closed: AtomicBool,
}

impl EmptySignal {
    fn new() -> Self {
        EmptySignal {
            generation: Mutex::new(0),
            condvar: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Bumps the generation if `still_empty` holds under the lock.
    ///
    /// The check must happen inside the lock: an event pushed between the
    /// worker's drain and this notification must not satisfy a waiter that
    /// already saw that event in the queue.
    fn notify_if(&self, still_empty: impl FnOnce() -> bool) {
        let mut generation = self.generation.lock().unwrap();
        if still_empty() {
            *generation += 1;
            self.condvar.notify_all();
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _guard = self.generation.lock().unwrap();
        self.condvar.notify_all();
    }

    /// Blocks until the worker observes an empty queue after this call.
    fn wait(&self, wake: impl Fn()) {
        let mut generation = self.generation.lock().unwrap();
        let seen = *generation;
        loop {
            if *generation > seen || self.closed.load(Ordering::Acquire) {
                return;
            }
            wake();
            let (guard, _timeout) = self
                .condvar
                .wait_timeout(generation, Duration::from_millis(50))
                .unwrap();
            generation = guard;
        }
    }
}

/// State shared between the worker thread, measuring points, and readers.
pub(crate) struct Shared {
    queue: handystats_core::EventQueue,
    dump: DumpState,
    empty: EmptySignal,
    shutdown: AtomicBool,
}

impl Shared {
    pub fn emit(&self, event: Event) {
        self.queue.push(event);
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.dump.load()
    }

    pub fn wait_until_empty(&self) {
        self.empty.wait(|| self.queue.wake());
    }

    pub fn wait_until(&self, deadline: SystemTime) {
        self.dump.wait_until(deadline, || self.queue.wake());
    }
}

/// A running pipeline: worker thread plus its shared state.
pub(crate) struct Core {
    shared: Arc<Shared>,
    join: Option<thread::JoinHandle<()>>,
}

impl Core {
    pub fn start(config: Arc<Config>) -> Core {
        let (queue, parker) = handystats_core::EventQueue::new();
        let shared = Arc::new(Shared {
            queue,
            dump: DumpState::new(),
            empty: EmptySignal::new(),
            shutdown: AtomicBool::new(false),
        });

        let worker = Worker {
            shared: Arc::clone(&shared),
            parker,
            registry: Registry::new(Arc::clone(&config)),
            dump_interval: (config.dump_interval > Duration::ZERO).then_some(config.dump_interval),
            popped_seen: 0,
        };

        let join = thread::Builder::new()
            .name("handystats-core".into())
            .spawn(move || worker.run())
            .expect("spawning handystats core thread");

        Core {
            shared,
            join: Some(join),
        }
    }

    pub fn shared(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    /// Stops accepting events, drains what is already queued (bounded by
    /// [`FINALIZE_TIMEOUT`]) and joins the worker.
    pub fn finalize(&mut self) {
        if let Some(join) = self.join.take() {
            self.shared.queue.close();
            self.shared.shutdown.store(true, Ordering::Release);
            self.shared.queue.wake();
            tracing::info!("awaiting handystats core shutdown");
            join.join().expect("joining handystats core thread");
            tracing::info!("handystats core shut down");
        }
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DrainResult {
    Drained,
    HitDeadline,
}

struct Worker {
    shared: Arc<Shared>,
    parker: Parker,
    registry: Registry,
    /// `None` disables periodic publication.
    dump_interval: Option<Duration>,
    /// Queue pops already folded into the pop-count counter.
    popped_seen: u64,
}

impl Worker {
    fn run(mut self) {
        tracing::debug!("handystats core started");
        self.ensure_self_metrics();

        let mut next_dump = self.dump_interval.map(|interval| Instant::now() + interval);
        loop {
            let deadline = next_dump.unwrap_or_else(|| Instant::now() + MAX_PARK);
            let (status, _count) = self.drain_until_deadline(deadline);
            self.instrument_queue();

            if status == DrainResult::Drained {
                self.shared
                    .empty
                    .notify_if(|| self.shared.queue.is_empty());
            }

            let publication_due =
                next_dump.is_some_and(|at| Instant::now() >= at) || self.shared.dump.requested();
            if publication_due {
                self.publish();
                if let (Some(interval), Some(at)) = (self.dump_interval, next_dump.as_mut()) {
                    // skip missed periods rather than bursting to catch up
                    while *at <= Instant::now() {
                        *at += interval;
                    }
                }
            }

            if self.shared.shutdown.load(Ordering::Acquire) {
                break;
            }

            if status == DrainResult::Drained && !self.shared.dump.requested() {
                match next_dump {
                    Some(at) => self.parker.park_deadline(at),
                    None => self.parker.park_timeout(MAX_PARK),
                }
            }
        }

        self.shut_down();
    }

    /// Pops and applies events until the queue is empty or `deadline` passes.
    ///
    /// Applying an event is cheap, so the clock is only probed every
    /// [`DRAIN_CHECK_INTERVAL`] events; snapshot latency stays bounded even
    /// under a firehose of events.
    fn drain_until_deadline(&mut self, deadline: Instant) -> (DrainResult, usize) {
        let mut count = 0;
        while let Some(event) = self.shared.queue.pop() {
            self.registry.apply(event);

            count += 1;
            if count % DRAIN_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                return (DrainResult::HitDeadline, count);
            }
        }
        (DrainResult::Drained, count)
    }

    fn ensure_self_metrics(&mut self) {
        self.registry.ensure(
            names::MESSAGE_QUEUE_SIZE,
            MetricKind::Gauge,
            Tags::MOVING_AVG.with_dependencies(),
        );
        self.registry.ensure(
            names::MESSAGE_QUEUE_POP_COUNT,
            MetricKind::Counter,
            (Tags::THROUGHPUT | Tags::MOVING_AVG).with_dependencies(),
        );
        self.registry
            .ensure(names::TIMER_SKIP_COUNT, MetricKind::Counter, Tags::empty());
    }

    fn instrument_queue(&mut self) {
        let now = clock::now();
        let size = self.shared.queue.len();
        if let MetricSlot::Gauge(gauge) =
            self.registry
                .ensure(names::MESSAGE_QUEUE_SIZE, MetricKind::Gauge, Tags::empty())
        {
            gauge.apply(handystats_core::GaugeEvent::Set(size as f64), now);
        }

        let popped = self.shared.queue.popped();
        let delta = popped - self.popped_seen;
        if delta > 0 {
            self.popped_seen = popped;
            if let MetricSlot::Counter(counter) = self.registry.ensure(
                names::MESSAGE_QUEUE_POP_COUNT,
                MetricKind::Counter,
                Tags::empty(),
            ) {
                counter.apply(
                    handystats_core::CounterEvent::Increment(delta as i64),
                    now,
                );
            }
        }
    }

    fn publish(&mut self) {
        let wall = clock::system_now();
        let wall_millis = wall
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis() as i64)
            .unwrap_or(0);
        self.registry.set_attribute(
            names::SYSTEM_TIMESTAMP,
            AttributeValue::Int64(wall_millis),
            clock::now(),
        );
        let snapshot = self.registry.snapshot();
        self.shared.dump.publish(snapshot, wall);
    }

    fn shut_down(mut self) {
        // the queue is already closed; drain what made it in, within bounds
        let deadline = Instant::now() + FINALIZE_TIMEOUT;
        let (status, _count) = self.drain_until_deadline(deadline);
        if status == DrainResult::HitDeadline {
            tracing::warn!(
                remaining = self.shared.queue.len(),
                "handystats core hit the shutdown deadline with events still queued"
            );
        }
        self.instrument_queue();
        self.publish();
        self.shared.empty.notify_if(|| true);
        self.shared.empty.close();
        self.shared.dump.close();
        tracing::debug!("handystats core stopped");
    }
}

#[cfg(test)]
mod tests {
    use handystats_core::{CounterEvent, GaugeEvent, TimerEvent};

    use super::*;

    fn test_config(json: &str) -> Arc<Config> {
        Arc::new(Config::from_json(json).unwrap())
    }

    fn event(name: &str, kind: EventKind) -> Event {
        Event::new(name, clock::now(), kind)
    }

    #[test]
    fn registry_creates_metrics_lazily() {
        let mut registry = Registry::new(test_config("{}"));
        registry.apply(event("a", EventKind::Counter(CounterEvent::Increment(1))));
        registry.apply(event("b", EventKind::Gauge(GaugeEvent::Set(2.0))));
        registry.apply(event("c", EventKind::Timer(TimerEvent::Start(0))));
        assert_eq!(registry.metrics.len(), 3);
    }

    #[test]
    fn registry_drops_kind_mismatches() {
        let mut registry = Registry::new(test_config("{}"));
        registry.apply(event("a", EventKind::Counter(CounterEvent::Increment(1))));
        registry.apply(event("a", EventKind::Gauge(GaugeEvent::Set(2.0))));

        let MetricSlot::Counter(counter) = &registry.metrics["a"] else {
            panic!("metric changed kind");
        };
        assert_eq!(counter.value(), 1);
        assert_eq!(counter.stats().count(), 1);
    }

    #[test]
    fn registry_counts_dropped_timer_stops() {
        let mut registry = Registry::new(test_config("{}"));
        registry.apply(event("t", EventKind::Timer(TimerEvent::Stop(42))));

        let MetricSlot::Counter(counter) = &registry.metrics[names::TIMER_SKIP_COUNT] else {
            panic!("skip counter missing");
        };
        assert_eq!(counter.value(), 1);
    }

    #[test]
    fn registry_resolves_pattern_config() {
        let mut registry = Registry::new(test_config(
            r#"{"defaults": {"stats": ["histogram"]}, "*.gauge": {"histogram-bins": 15}}"#,
        ));
        registry.apply(event("test.gauge", EventKind::Gauge(GaugeEvent::Set(1.0))));
        let MetricSlot::Gauge(gauge) = &registry.metrics["test.gauge"] else {
            panic!("wrong kind");
        };
        assert!(gauge.stats().enabled(Tags::HISTOGRAM));
    }

    #[test]
    fn snapshot_includes_metrics_and_attributes() {
        let mut registry = Registry::new(test_config("{}"));
        registry.apply(event("a", EventKind::Counter(CounterEvent::Increment(1))));
        registry.set_attribute("attr", AttributeValue::Bool(true), clock::now());

        let snapshot = registry.snapshot();
        assert!(snapshot.metrics.contains_key("a"));
        assert_eq!(
            snapshot.attributes.get("attr"),
            Some(&AttributeValue::Bool(true))
        );
    }

    #[test]
    fn core_applies_events_and_publishes() {
        let mut core = Core::start(test_config(r#"{"dump-interval": 1}"#));
        let shared = core.shared();
        for i in 0..100 {
            shared.emit(event(
                "test.counter",
                EventKind::Counter(CounterEvent::Increment(i)),
            ));
        }
        shared.wait_until_empty();
        shared.wait_until(SystemTime::now());

        let snapshot = shared.snapshot();
        let counter = &snapshot.metrics["test.counter"];
        assert_eq!(counter.stats().count(), 100);
        assert!(snapshot.metrics.contains_key(names::MESSAGE_QUEUE_SIZE));
        assert!(snapshot.metrics.contains_key(names::MESSAGE_QUEUE_POP_COUNT));
        assert!(snapshot.attributes.contains_key(names::SYSTEM_TIMESTAMP));
        core.finalize();
    }

    #[test]
    fn no_periodic_publication_when_interval_is_zero() {
        let mut core = Core::start(test_config(r#"{"dump-interval": 0}"#));
        let shared = core.shared();
        shared.emit(event("gauge.test", EventKind::Gauge(GaugeEvent::Set(15.0))));
        shared.wait_until_empty();
        std::thread::sleep(Duration::from_millis(10));
        assert!(shared.snapshot().metrics.is_empty());

        // an explicit request still produces one
        shared.wait_until(SystemTime::now());
        assert!(shared.snapshot().metrics.contains_key("gauge.test"));
        core.finalize();
    }

    #[test]
    fn finalize_is_idempotent_and_drains() {
        let mut core = Core::start(test_config(r#"{"dump-interval": 1}"#));
        let shared = core.shared();
        for _ in 0..1000 {
            shared.emit(event(
                "test.counter",
                EventKind::Counter(CounterEvent::Increment(1)),
            ));
        }
        core.finalize();
        core.finalize();

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.metrics["test.counter"].stats().count(), 1000);
        // pushes after shutdown are dropped without faulting
        shared.emit(event(
            "test.counter",
            EventKind::Counter(CounterEvent::Increment(1)),
        ));
    }
}
