// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Metric state machines.
//!
//! Each type owns its scalar state plus the [`Statistics`](crate::statistics)
//! fed from applied events. The worker thread is the only writer; snapshots
//! clone the embedded statistics.

mod attribute;
mod counter;
mod gauge;
mod timer;

pub use attribute::{Attribute, AttributeValue};
pub use counter::Counter;
pub use gauge::Gauge;
pub use timer::{Timer, TimerOutcome};
