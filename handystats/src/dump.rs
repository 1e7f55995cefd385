// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Snapshots: immutable point-in-time views of all metrics and attributes.
//!
//! The worker clones its registry into a [`Snapshot`] and swaps it into an
//! [`ArcSwap`]; readers acquire the current snapshot with a wait-free load and
//! keep it alive for as long as they hold the `Arc`. The previous snapshot is
//! freed when its last reader lets go — publication never blocks readers and
//! readers never block publication.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime},
};

use arc_swap::ArcSwap;
use handystats_core::{AttributeValue, MetricKind, Statistics, Tags};
use serde_json::{Number, Value, json};

/// Quantile levels rendered into JSON dumps.
pub const QUANTILE_LEVELS: &[(&str, f64)] = &[
    ("0.25", 0.25),
    ("0.5", 0.5),
    ("0.75", 0.75),
    ("0.9", 0.9),
    ("0.95", 0.95),
];

/// One metric's statistics at publication time.
#[derive(Clone, Debug)]
pub struct MetricSnapshot {
    kind: MetricKind,
    stats: Statistics,
}

impl MetricSnapshot {
    pub(crate) fn new(kind: MetricKind, stats: Statistics) -> Self {
        MetricSnapshot { kind, stats }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }
}

/// Immutable view of every metric and attribute at one instant.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub metrics: BTreeMap<String, MetricSnapshot>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Snapshot {
    /// Renders the snapshot as a JSON object keyed by metric name; an empty
    /// snapshot renders as `{}`.
    pub fn to_json(&self) -> String {
        let mut root = serde_json::Map::new();
        for (name, metric) in &self.metrics {
            root.insert(name.clone(), metric_to_json(metric));
        }
        for (name, value) in &self.attributes {
            root.insert(name.clone(), attribute_to_json(value));
        }
        Value::Object(root).to_string()
    }
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(json!(0))
}

fn metric_to_json(metric: &MetricSnapshot) -> Value {
    let stats = metric.stats();
    let mut object = serde_json::Map::new();
    object.insert("type".into(), json!(metric.kind().as_str()));
    if stats.enabled(Tags::VALUE) {
        object.insert("value".into(), number(stats.value()));
    }
    if stats.enabled(Tags::COUNT) {
        object.insert("count".into(), json!(stats.count()));
    }
    if stats.enabled(Tags::MIN) {
        object.insert("min".into(), number(stats.min()));
    }
    if stats.enabled(Tags::MAX) {
        object.insert("max".into(), number(stats.max()));
    }
    if stats.enabled(Tags::SUM) {
        object.insert("sum".into(), number(stats.sum()));
    }
    if stats.enabled(Tags::AVG) {
        object.insert("avg".into(), number(stats.avg()));
    }
    if stats.enabled(Tags::MOVING_COUNT) {
        object.insert("moving-count".into(), number(stats.moving_count()));
    }
    if stats.enabled(Tags::MOVING_SUM) {
        object.insert("moving-sum".into(), number(stats.moving_sum()));
    }
    if stats.enabled(Tags::MOVING_AVG) {
        object.insert("moving-avg".into(), number(stats.moving_avg()));
    }
    if stats.enabled(Tags::THROUGHPUT) {
        object.insert("throughput".into(), number(stats.throughput()));
    }
    if stats.enabled(Tags::FREQUENCY) {
        object.insert("frequency".into(), number(stats.frequency()));
    }
    if stats.enabled(Tags::TIMESTAMP)
        && let Some(millis) = stats.timestamp_millis()
    {
        object.insert("timestamp".into(), json!(millis));
    }
    if stats.enabled(Tags::HISTOGRAM) {
        let bins: Vec<Value> = stats
            .histogram()
            .iter()
            .map(|bin| json!([bin.center, bin.weight]))
            .collect();
        object.insert("histogram".into(), Value::Array(bins));
    }
    if stats.enabled(Tags::QUANTILE) {
        let mut quantiles = serde_json::Map::new();
        for (label, level) in QUANTILE_LEVELS {
            quantiles.insert((*label).into(), number(stats.quantile(*level)));
        }
        object.insert("quantile".into(), Value::Object(quantiles));
    }
    Value::Object(object)
}

fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Bool(value) => json!(value),
        AttributeValue::Int(value) => json!(value),
        AttributeValue::Uint(value) => json!(value),
        AttributeValue::Int64(value) => json!(value),
        AttributeValue::Uint64(value) => json!(value),
        AttributeValue::Double(value) => number(*value),
        AttributeValue::String(value) => json!(value),
    }
}

/// Publication cell shared between the worker and readers.
pub(crate) struct DumpState {
    current: ArcSwap<Snapshot>,
    /// An explicit publication has been requested (`wait_until`).
    requested: AtomicBool,
    /// Worker has exited; waiters must not block forever.
    closed: AtomicBool,
    published: Mutex<Option<SystemTime>>,
    condvar: Condvar,
}

impl DumpState {
    pub fn new() -> Self {
        DumpState {
            current: ArcSwap::from_pointee(Snapshot::default()),
            requested: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            published: Mutex::new(None),
            condvar: Condvar::new(),
        }
    }

    /// Wait-free load of the current snapshot.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn publish(&self, snapshot: Snapshot, at: SystemTime) {
        self.current.store(Arc::new(snapshot));
        let mut published = self.published.lock().unwrap();
        *published = Some(at);
        self.requested.store(false, Ordering::Release);
        self.condvar.notify_all();
    }

    /// Asks the worker for an out-of-band publication.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _guard = self.published.lock().unwrap();
        self.condvar.notify_all();
    }

    /// Blocks until a snapshot published at or after `deadline` exists.
    ///
    /// `wake` is invoked to nudge the worker (it may be parked); the wait is
    /// re-armed on every loop so a racing publication cannot strand the
    /// caller.
    pub fn wait_until(&self, deadline: SystemTime, wake: impl Fn()) {
        let mut published = self.published.lock().unwrap();
        loop {
            if published.is_some_and(|at| at >= deadline) {
                return;
            }
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            self.request();
            wake();
            let (guard, _timeout) = self
                .condvar
                .wait_timeout(published, Duration::from_millis(50))
                .unwrap();
            published = guard;
        }
    }
}
