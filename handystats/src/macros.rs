// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Measuring-point macros.
//!
//! The macro forms fill in the optional arguments (`value` defaults to 1 for
//! increments, the timer instance defaults to `0`, timestamps default to now)
//! and compile to nothing when the crate is built with the `disable` feature —
//! including the name expression, so formatted names cost nothing in an
//! instrumentation-free build. Combine with
//! [`metric_name!`](handystats_core::metric_name) for formatted names:
//!
//! ```
//! use handystats::{counter_increment, metric_name};
//!
//! let shard = 3;
//! counter_increment!(metric_name!("load_test.counter.{shard}"));
//! counter_increment!("load_test.total", 5);
//! ```

/// Sets a counter to a value (default 0).
#[macro_export]
macro_rules! counter_init {
    ($name:expr) => {
        $crate::counter_init!($name, 0)
    };
    ($name:expr, $value:expr) => {
        if !$crate::DISABLED {
            $crate::counter_init($name, $value);
        }
    };
    ($name:expr, $value:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::counter_init_at($name, $value, $timestamp);
        }
    };
}

/// Increments a counter (default delta 1).
#[macro_export]
macro_rules! counter_increment {
    ($name:expr) => {
        $crate::counter_increment!($name, 1)
    };
    ($name:expr, $value:expr) => {
        if !$crate::DISABLED {
            $crate::counter_increment($name, $value);
        }
    };
    ($name:expr, $value:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::counter_increment_at($name, $value, $timestamp);
        }
    };
}

/// Decrements a counter (default delta 1).
#[macro_export]
macro_rules! counter_decrement {
    ($name:expr) => {
        $crate::counter_decrement!($name, 1)
    };
    ($name:expr, $value:expr) => {
        if !$crate::DISABLED {
            $crate::counter_decrement($name, $value);
        }
    };
    ($name:expr, $value:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::counter_decrement_at($name, $value, $timestamp);
        }
    };
}

/// Replaces a counter's value.
#[macro_export]
macro_rules! counter_change {
    ($name:expr, $value:expr) => {
        if !$crate::DISABLED {
            $crate::counter_change($name, $value);
        }
    };
    ($name:expr, $value:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::counter_change_at($name, $value, $timestamp);
        }
    };
}

/// Sets a gauge to a value.
#[macro_export]
macro_rules! gauge_init {
    ($name:expr, $value:expr) => {
        if !$crate::DISABLED {
            $crate::gauge_init($name, $value);
        }
    };
    ($name:expr, $value:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::gauge_init_at($name, $value, $timestamp);
        }
    };
}

/// Sets a gauge to a value.
#[macro_export]
macro_rules! gauge_set {
    ($name:expr, $value:expr) => {
        if !$crate::DISABLED {
            $crate::gauge_set($name, $value);
        }
    };
    ($name:expr, $value:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::gauge_set_at($name, $value, $timestamp);
        }
    };
}

/// Registers a timer metric.
#[macro_export]
macro_rules! timer_init {
    ($name:expr) => {
        if !$crate::DISABLED {
            $crate::timer_init($name);
        }
    };
}

/// Starts a timer instance (default instance 0).
#[macro_export]
macro_rules! timer_start {
    ($name:expr) => {
        $crate::timer_start!($name, 0)
    };
    ($name:expr, $instance:expr) => {
        if !$crate::DISABLED {
            $crate::timer_start($name, $instance);
        }
    };
    ($name:expr, $instance:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::timer_start_at($name, $instance, $timestamp);
        }
    };
}

/// Stops a timer instance (default instance 0).
#[macro_export]
macro_rules! timer_stop {
    ($name:expr) => {
        $crate::timer_stop!($name, 0)
    };
    ($name:expr, $instance:expr) => {
        if !$crate::DISABLED {
            $crate::timer_stop($name, $instance);
        }
    };
    ($name:expr, $instance:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::timer_stop_at($name, $instance, $timestamp);
        }
    };
}

/// Discards a timer instance (default instance 0).
#[macro_export]
macro_rules! timer_discard {
    ($name:expr) => {
        $crate::timer_discard!($name, 0)
    };
    ($name:expr, $instance:expr) => {
        if !$crate::DISABLED {
            $crate::timer_discard($name, $instance);
        }
    };
}

/// Heartbeats a timer instance (default instance 0).
#[macro_export]
macro_rules! timer_heartbeat {
    ($name:expr) => {
        $crate::timer_heartbeat!($name, 0)
    };
    ($name:expr, $instance:expr) => {
        if !$crate::DISABLED {
            $crate::timer_heartbeat($name, $instance);
        }
    };
}

/// Records a duration sample directly.
#[macro_export]
macro_rules! timer_set {
    ($name:expr, $duration:expr) => {
        if !$crate::DISABLED {
            $crate::timer_set($name, $duration);
        }
    };
    ($name:expr, $duration:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::timer_set_at($name, $duration, $timestamp);
        }
    };
}

/// Sets an attribute to a typed value.
#[macro_export]
macro_rules! attribute_set {
    ($name:expr, $value:expr) => {
        if !$crate::DISABLED {
            $crate::attribute_set($name, $value);
        }
    };
    ($name:expr, $value:expr, $timestamp:expr) => {
        if !$crate::DISABLED {
            $crate::attribute_set_at($name, $value, $timestamp);
        }
    };
}
