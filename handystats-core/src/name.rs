// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Metric names.
//!
//! Names are opaque, case-sensitive strings used as registry keys and as glob
//! inputs for per-metric configuration. Measuring points often build them from
//! a format string on the hot path, so [`MetricName`] keeps short results in an
//! inline buffer and only touches the heap when a name outgrows it.

use std::{
    borrow::Borrow,
    fmt::{self, Write},
    hash::{Hash, Hasher},
    ops::Deref,
};

use smallvec::SmallVec;

const INLINE_CAPACITY: usize = 32;

/// A small owned metric name.
///
/// Behaves like an immutable string; comparison, ordering and hashing all
/// delegate to the textual value so a registry keyed by `MetricName` can be
/// probed with a plain `&str`.
#[derive(Clone, Default)]
pub struct MetricName(SmallVec<[u8; INLINE_CAPACITY]>);

impl MetricName {
    pub fn as_str(&self) -> &str {
        debug_assert!(std::str::from_utf8(&self.0).is_ok());
        // Safety: the buffer is only ever filled from `&str` slices and
        // `fmt::Write` output, both guaranteed UTF-8.
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }

    /// Whether the name fits the inline buffer (i.e. building it did not
    /// allocate).
    pub fn is_inline(&self) -> bool {
        !self.0.spilled()
    }

    /// Builds a name from preformatted arguments, e.g. via the
    /// [`metric_name!`](crate::metric_name) macro.
    pub fn format(args: fmt::Arguments<'_>) -> Self {
        let mut name = MetricName::default();
        // writing into a byte SmallVec never fails
        name.write_fmt(args).expect("formatting a metric name");
        name
    }
}

impl Write for MetricName {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

impl From<&str> for MetricName {
    fn from(s: &str) -> Self {
        MetricName(SmallVec::from_slice(s.as_bytes()))
    }
}

impl From<&String> for MetricName {
    fn from(s: &String) -> Self {
        MetricName::from(s.as_str())
    }
}

impl From<String> for MetricName {
    fn from(s: String) -> Self {
        MetricName(SmallVec::from_vec(s.into_bytes()))
    }
}

impl Deref for MetricName {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for MetricName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for MetricName {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for MetricName {}

impl PartialOrd for MetricName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetricName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

// must agree with `Borrow<str>`, so hash as str rather than as a byte vector
impl Hash for MetricName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

/// Builds a [`MetricName`] from a format string without allocating when the
/// result fits the inline buffer.
///
/// ```
/// use handystats_core::metric_name;
///
/// let shard = 7;
/// let name = metric_name!("load_test.counter.{shard}");
/// assert_eq!(&*name, "load_test.counter.7");
/// ```
#[macro_export]
macro_rules! metric_name {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::name::MetricName::format(::core::format_args!($fmt $(, $arg)*))
    };
    ($name:expr) => {
        $crate::name::MetricName::format(::core::format_args!("{}", $name))
    };
}
