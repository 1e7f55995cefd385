// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Engine primitives for the `handystats` in-process metrics library.
//!
//! This crate holds everything below the runtime: the monotonic clock,
//! metric names, instrumentation events, the producer/consumer event queue,
//! the metric state machines, and the incremental statistics aggregator.
//! Nothing here spawns threads or touches process-global state — the
//! `handystats` crate wires these pieces into the background pipeline and the
//! embedding API.

pub mod clock;
pub mod event;
pub mod metrics;
pub mod name;
pub mod queue;
pub mod statistics;

pub use clock::Timestamp;
pub use event::{AttributeEvent, CounterEvent, Event, EventKind, GaugeEvent, MetricKind, TimerEvent};
pub use metrics::{Attribute, AttributeValue, Counter, Gauge, Timer, TimerOutcome};
pub use name::MetricName;
pub use queue::EventQueue;
pub use statistics::{Bin, Statistics, StatisticsConfig, Tags};
