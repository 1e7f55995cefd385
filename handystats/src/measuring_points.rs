// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Measuring points: the hot-path front end.
//!
//! Every function converts its arguments into one event and pushes it to the
//! pipeline's queue — no locks, no waiting on the worker. When the library is
//! not initialized, disabled by configuration, or compiled with the `disable`
//! feature, the call returns immediately without building anything.
//!
//! Each operation has an `_at` variant taking an explicit [`Timestamp`]; the
//! plain form stamps the event with [`clock::now()`].

use std::time::Duration;

use handystats_core::{
    AttributeEvent, AttributeValue, CounterEvent, Event, EventKind, GaugeEvent, MetricName,
    TimerEvent, Timestamp, clock,
};

use crate::Handystats;

#[inline]
fn emit(name: impl Into<MetricName>, timestamp: Timestamp, kind: EventKind) {
    if crate::DISABLED {
        return;
    }
    let guard = crate::active();
    let Some(shared) = guard.as_deref() else {
        return;
    };
    shared.emit(Event::new(name, timestamp, kind));
}

macro_rules! measuring_point {
    (
        $(#[$doc:meta])*
        $name:ident, $at_name:ident($($arg:ident: $ty:ty),*) => $kind:expr
    ) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(name: impl Into<MetricName>, $($arg: $ty),*) {
            if crate::DISABLED {
                return;
            }
            $at_name(name, $($arg,)* clock::now());
        }

        $(#[$doc])*
        #[inline]
        pub fn $at_name(name: impl Into<MetricName>, $($arg: $ty,)* timestamp: Timestamp) {
            emit(name, timestamp, $kind);
        }
    };
}

measuring_point! {
    /// Sets a counter to `value`.
    counter_init, counter_init_at(value: i64) => EventKind::Counter(CounterEvent::Init(value))
}
measuring_point! {
    /// Increments a counter by `value`.
    counter_increment, counter_increment_at(value: i64) =>
        EventKind::Counter(CounterEvent::Increment(value))
}
measuring_point! {
    /// Decrements a counter by `value`.
    counter_decrement, counter_decrement_at(value: i64) =>
        EventKind::Counter(CounterEvent::Decrement(value))
}
measuring_point! {
    /// Replaces a counter's value.
    counter_change, counter_change_at(value: i64) =>
        EventKind::Counter(CounterEvent::Change(value))
}
measuring_point! {
    /// Sets a gauge to `value`.
    gauge_init, gauge_init_at(value: f64) => EventKind::Gauge(GaugeEvent::Init(value))
}
measuring_point! {
    /// Sets a gauge to `value`.
    gauge_set, gauge_set_at(value: f64) => EventKind::Gauge(GaugeEvent::Set(value))
}
measuring_point! {
    /// Registers a timer metric without starting an instance.
    timer_init, timer_init_at() => EventKind::Timer(TimerEvent::Init)
}
measuring_point! {
    /// Starts (or restarts) timer instance `instance`.
    timer_start, timer_start_at(instance: u64) => EventKind::Timer(TimerEvent::Start(instance))
}
measuring_point! {
    /// Stops timer instance `instance`, recording the elapsed time.
    timer_stop, timer_stop_at(instance: u64) => EventKind::Timer(TimerEvent::Stop(instance))
}
measuring_point! {
    /// Discards timer instance `instance` without recording anything.
    timer_discard, timer_discard_at(instance: u64) =>
        EventKind::Timer(TimerEvent::Discard(instance))
}
measuring_point! {
    /// Keeps timer instance `instance` alive.
    timer_heartbeat, timer_heartbeat_at(instance: u64) =>
        EventKind::Timer(TimerEvent::Heartbeat(instance))
}
measuring_point! {
    /// Records `duration` directly, without instance bookkeeping.
    timer_set, timer_set_at(duration: Duration) => EventKind::Timer(TimerEvent::Set(duration))
}
/// Sets an attribute to a typed value.
#[inline]
pub fn attribute_set(name: impl Into<MetricName>, value: impl Into<AttributeValue>) {
    if crate::DISABLED {
        return;
    }
    attribute_set_at(name, value, clock::now());
}

/// Sets an attribute to a typed value at an explicit timestamp.
#[inline]
pub fn attribute_set_at(
    name: impl Into<MetricName>,
    value: impl Into<AttributeValue>,
    timestamp: Timestamp,
) {
    emit(
        name,
        timestamp,
        EventKind::Attribute(AttributeEvent::Set(value.into())),
    );
}

/// Sets a boolean attribute.
pub fn attribute_set_bool(name: impl Into<MetricName>, value: bool) {
    attribute_set(name, AttributeValue::Bool(value));
}

/// Sets a 32-bit signed integer attribute.
pub fn attribute_set_int(name: impl Into<MetricName>, value: i32) {
    attribute_set(name, AttributeValue::Int(value));
}

/// Sets a 32-bit unsigned integer attribute.
pub fn attribute_set_uint(name: impl Into<MetricName>, value: u32) {
    attribute_set(name, AttributeValue::Uint(value));
}

/// Sets a 64-bit signed integer attribute.
pub fn attribute_set_int64(name: impl Into<MetricName>, value: i64) {
    attribute_set(name, AttributeValue::Int64(value));
}

/// Sets a 64-bit unsigned integer attribute.
pub fn attribute_set_uint64(name: impl Into<MetricName>, value: u64) {
    attribute_set(name, AttributeValue::Uint64(value));
}

/// Sets a double attribute.
pub fn attribute_set_double(name: impl Into<MetricName>, value: f64) {
    attribute_set(name, AttributeValue::Double(value));
}

/// Sets a string attribute.
pub fn attribute_set_string(name: impl Into<MetricName>, value: impl Into<String>) {
    attribute_set(name, AttributeValue::String(value.into()));
}

macro_rules! instance_measuring_point {
    (
        $(#[$doc:meta])*
        $name:ident, $at_name:ident($($arg:ident: $ty:ty),*) => $kind:expr
    ) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&self, name: impl Into<MetricName>, $($arg: $ty),*) {
            if crate::DISABLED {
                return;
            }
            self.$at_name(name, $($arg,)* clock::now());
        }

        $(#[$doc])*
        #[inline]
        pub fn $at_name(&self, name: impl Into<MetricName>, $($arg: $ty,)* timestamp: Timestamp) {
            self.emit_kind(name, timestamp, $kind);
        }
    };
}

/// The same measuring points, scoped to one owned pipeline.
impl Handystats {
    #[inline]
    fn emit_kind(&self, name: impl Into<MetricName>, timestamp: Timestamp, kind: EventKind) {
        if crate::DISABLED {
            return;
        }
        let Some(shared) = self.shared() else {
            return;
        };
        shared.emit(Event::new(name, timestamp, kind));
    }

    instance_measuring_point! {
        /// Sets a counter to `value`.
        counter_init, counter_init_at(value: i64) =>
            EventKind::Counter(CounterEvent::Init(value))
    }
    instance_measuring_point! {
        /// Increments a counter by `value`.
        counter_increment, counter_increment_at(value: i64) =>
            EventKind::Counter(CounterEvent::Increment(value))
    }
    instance_measuring_point! {
        /// Decrements a counter by `value`.
        counter_decrement, counter_decrement_at(value: i64) =>
            EventKind::Counter(CounterEvent::Decrement(value))
    }
    instance_measuring_point! {
        /// Replaces a counter's value.
        counter_change, counter_change_at(value: i64) =>
            EventKind::Counter(CounterEvent::Change(value))
    }
    instance_measuring_point! {
        /// Sets a gauge to `value`.
        gauge_init, gauge_init_at(value: f64) => EventKind::Gauge(GaugeEvent::Init(value))
    }
    instance_measuring_point! {
        /// Sets a gauge to `value`.
        gauge_set, gauge_set_at(value: f64) => EventKind::Gauge(GaugeEvent::Set(value))
    }
    instance_measuring_point! {
        /// Registers a timer metric without starting an instance.
        timer_init, timer_init_at() => EventKind::Timer(TimerEvent::Init)
    }
    instance_measuring_point! {
        /// Starts (or restarts) timer instance `instance`.
        timer_start, timer_start_at(instance: u64) =>
            EventKind::Timer(TimerEvent::Start(instance))
    }
    instance_measuring_point! {
        /// Stops timer instance `instance`, recording the elapsed time.
        timer_stop, timer_stop_at(instance: u64) => EventKind::Timer(TimerEvent::Stop(instance))
    }
    instance_measuring_point! {
        /// Discards timer instance `instance` without recording anything.
        timer_discard, timer_discard_at(instance: u64) =>
            EventKind::Timer(TimerEvent::Discard(instance))
    }
    instance_measuring_point! {
        /// Keeps timer instance `instance` alive.
        timer_heartbeat, timer_heartbeat_at(instance: u64) =>
            EventKind::Timer(TimerEvent::Heartbeat(instance))
    }
    instance_measuring_point! {
        /// Records `duration` directly, without instance bookkeeping.
        timer_set, timer_set_at(duration: Duration) => EventKind::Timer(TimerEvent::Set(duration))
    }
    /// Sets an attribute to a typed value.
    #[inline]
    pub fn attribute_set(&self, name: impl Into<MetricName>, value: impl Into<AttributeValue>) {
        if crate::DISABLED {
            return;
        }
        self.attribute_set_at(name, value, clock::now());
    }

    /// Sets an attribute to a typed value at an explicit timestamp.
    #[inline]
    pub fn attribute_set_at(
        &self,
        name: impl Into<MetricName>,
        value: impl Into<AttributeValue>,
        timestamp: Timestamp,
    ) {
        self.emit_kind(
            name,
            timestamp,
            EventKind::Attribute(AttributeEvent::Set(value.into())),
        );
    }
}
