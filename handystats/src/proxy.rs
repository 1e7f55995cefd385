// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Proxies and scoped guards, composed purely out of primitive events.
//!
//! A proxy owns its metric name so repeated operations skip name
//! construction. The scoped guards pair an opening event with its inverse on
//! drop: [`ScopedTimer`] stops its timer instance unless discarded,
//! [`ScopedCount`] decrements what it incremented.

use std::{
    sync::Arc,
    sync::atomic::{AtomicU64, Ordering},
};

use handystats_core::{
    CounterEvent, Event, EventKind, MetricName, TimerEvent, clock,
};

use crate::{Handystats, worker::Shared};

/// Where a proxy sends its events: the global pipeline, or one owned by a
/// [`Handystats`] instance.
#[derive(Clone)]
enum Target {
    Global,
    Pipeline(Option<Arc<Shared>>),
}

impl Target {
    fn emit(&self, event: Event) {
        if crate::DISABLED {
            return;
        }
        match self {
            Target::Global => {
                if let Some(shared) = crate::active().as_deref() {
                    shared.emit(event);
                }
            }
            Target::Pipeline(shared) => {
                if let Some(shared) = shared {
                    shared.emit(event);
                }
            }
        }
    }
}

/// Counter measuring points bound to one name.
#[derive(Clone)]
pub struct CounterProxy {
    name: MetricName,
    target: Target,
}

impl CounterProxy {
    /// A proxy for the global pipeline. Emits nothing until used.
    pub fn new(name: impl Into<MetricName>) -> Self {
        CounterProxy {
            name: name.into(),
            target: Target::Global,
        }
    }

    /// A proxy that also emits an `init` with `value`.
    pub fn with_init(name: impl Into<MetricName>, value: i64) -> Self {
        let proxy = CounterProxy::new(name);
        proxy.init(value);
        proxy
    }

    pub(crate) fn for_instance(instance: &Handystats, name: impl Into<MetricName>) -> Self {
        CounterProxy {
            name: name.into(),
            target: Target::Pipeline(instance.shared().cloned()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn init(&self, value: i64) {
        self.emit(CounterEvent::Init(value));
    }

    pub fn increment(&self, value: i64) {
        self.emit(CounterEvent::Increment(value));
    }

    pub fn decrement(&self, value: i64) {
        self.emit(CounterEvent::Decrement(value));
    }

    pub fn change(&self, value: i64) {
        self.emit(CounterEvent::Change(value));
    }

    /// Increments by `value` now and decrements by the same amount when the
    /// returned guard drops.
    pub fn scoped(&self, value: i64) -> ScopedCount {
        self.increment(value);
        ScopedCount {
            proxy: self.clone(),
            value,
        }
    }

    fn emit(&self, event: CounterEvent) {
        self.target.emit(Event::new(
            self.name.clone(),
            clock::now(),
            EventKind::Counter(event),
        ));
    }
}

/// Guard produced by [`CounterProxy::scoped`].
pub struct ScopedCount {
    proxy: CounterProxy,
    value: i64,
}

impl Drop for ScopedCount {
    fn drop(&mut self) {
        self.proxy.decrement(self.value);
    }
}

/// Process-unique instance ids for scoped timers, so nested and concurrent
/// scopes on the same timer name never collide.
fn next_instance_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Starts a timer instance on construction and stops it on drop.
pub struct ScopedTimer {
    name: MetricName,
    instance: u64,
    target: Target,
    armed: bool,
}

impl ScopedTimer {
    /// Starts a fresh instance of `name` on the global pipeline.
    pub fn new(name: impl Into<MetricName>) -> Self {
        ScopedTimer::start(name.into(), Target::Global)
    }

    pub(crate) fn for_instance(instance: &Handystats, name: impl Into<MetricName>) -> Self {
        ScopedTimer::start(name.into(), Target::Pipeline(instance.shared().cloned()))
    }

    fn start(name: MetricName, target: Target) -> Self {
        let timer = ScopedTimer {
            name,
            instance: next_instance_id(),
            target,
            armed: true,
        };
        timer.emit(TimerEvent::Start(timer.instance));
        timer
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Keeps the instance alive across long scopes.
    pub fn heartbeat(&self) {
        self.emit(TimerEvent::Heartbeat(self.instance));
    }

    /// Abandons the measurement; drop will not record a sample.
    pub fn discard(mut self) {
        self.armed = false;
        self.emit(TimerEvent::Discard(self.instance));
    }

    fn emit(&self, event: TimerEvent) {
        self.target.emit(Event::new(
            self.name.clone(),
            clock::now(),
            EventKind::Timer(event),
        ));
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if self.armed {
            self.emit(TimerEvent::Stop(self.instance));
        }
    }
}

impl Handystats {
    /// A [`CounterProxy`] bound to this pipeline.
    pub fn counter_proxy(&self, name: impl Into<MetricName>) -> CounterProxy {
        CounterProxy::for_instance(self, name)
    }

    /// A [`ScopedTimer`] bound to this pipeline; started immediately.
    pub fn scoped_timer(&self, name: impl Into<MetricName>) -> ScopedTimer {
        ScopedTimer::for_instance(self, name)
    }
}
