// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Instrumentation events.
//!
//! A measuring point converts one user call into one [`Event`]; the worker
//! thread consumes events and applies them to metric state machines. Events
//! are immutable once created and carry their own timestamp, so statistics
//! never depend on delivery order across producer threads.

use std::time::Duration;

use crate::{clock::Timestamp, metrics::AttributeValue, name::MetricName};

/// The kind of metric an event is destined for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Timer,
    Attribute,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Timer => "timer",
            MetricKind::Attribute => "attribute",
        }
    }
}

/// Counter payloads. Deltas and values are signed 64-bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterEvent {
    Init(i64),
    Increment(i64),
    Decrement(i64),
    Change(i64),
}

/// Gauge payloads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GaugeEvent {
    Init(f64),
    Set(f64),
}

/// Timer payloads. The `u64` is the instance id distinguishing concurrent
/// activations of the same timer name; `0` is the default singleton instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    Init,
    Start(u64),
    Stop(u64),
    Discard(u64),
    Heartbeat(u64),
    Set(Duration),
}

/// Attribute payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeEvent {
    Set(AttributeValue),
}

/// Tagged event payload, indexed by destination kind.
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    Counter(CounterEvent),
    Gauge(GaugeEvent),
    Timer(TimerEvent),
    Attribute(AttributeEvent),
}

impl EventKind {
    pub fn destination(&self) -> MetricKind {
        match self {
            EventKind::Counter(_) => MetricKind::Counter,
            EventKind::Gauge(_) => MetricKind::Gauge,
            EventKind::Timer(_) => MetricKind::Timer,
            EventKind::Attribute(_) => MetricKind::Attribute,
        }
    }
}

/// One instrumentation event: destination name, payload, emission time.
#[derive(Clone, Debug)]
pub struct Event {
    pub name: MetricName,
    pub timestamp: Timestamp,
    pub kind: EventKind,
}

impl Event {
    pub fn new(name: impl Into<MetricName>, timestamp: Timestamp, kind: EventKind) -> Self {
        Event {
            name: name.into(),
            timestamp,
            kind,
        }
    }
}
