// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! In-process metrics with lightweight measuring points.
//!
//! Application threads emit counter, gauge, timer and attribute events
//! through [measuring points](crate::measuring_points); a background worker
//! folds them into per-metric rolling statistics; readers periodically take
//! consistent, immutable [snapshots](crate::Snapshot) for logging, export or
//! inspection. The hot path never blocks on the worker and never takes a
//! lock.
//!
//! ```
//! use std::time::SystemTime;
//!
//! handystats::config_json(r#"{"dump-interval": 10}"#).unwrap();
//! handystats::init();
//!
//! handystats::counter_increment("requests.handled", 1);
//! handystats::gauge_set("queue.depth", 17.0);
//!
//! handystats::wait_until_empty();
//! handystats::wait_until(SystemTime::now());
//! let snapshot = handystats::metrics_dump();
//! assert!(snapshot.metrics.contains_key("requests.handled"));
//!
//! handystats::finalize();
//! ```
//!
//! The global functions operate on a process-wide pipeline managed by
//! [`init`]/[`finalize`]. Embedders that need isolation (tests, multiple
//! configs in one process) can run their own [`Handystats`] instance instead.

use std::{
    path::Path,
    sync::{Arc, LazyLock, Mutex},
    time::SystemTime,
};

use arc_swap::{ArcSwap, ArcSwapOption, Guard};

mod config;
mod worker;
mod dump;
mod macros;
mod measuring_points;
mod proxy;
mod rate_limit;

pub use config::{Config, ConfigError, DEFAULT_DUMP_INTERVAL, DEFAULT_IDLE_TIMEOUT};
pub use worker::names;
pub use dump::{MetricSnapshot, QUANTILE_LEVELS, Snapshot};
pub use measuring_points::*;
pub use proxy::{CounterProxy, ScopedCount, ScopedTimer};

// re-exported so macro-built names and explicit timestamps need no extra crate
pub use handystats_core::{
    AttributeValue, Bin, MetricKind, MetricName, Statistics, StatisticsConfig, Tags, Timestamp,
    clock, metric_name,
};

/// True when the crate is compiled with the `disable` feature; every
/// measuring point folds to a no-op the optimizer can erase.
pub const DISABLED: bool = cfg!(feature = "disable");

static GLOBAL_CORE: Mutex<Option<worker::Core>> = Mutex::new(None);
static ACTIVE: ArcSwapOption<worker::Shared> = ArcSwapOption::const_empty();
static CONFIG: LazyLock<ArcSwap<Config>> =
    LazyLock::new(|| ArcSwap::from_pointee(Config::default()));
static CONFIG_ERROR: Mutex<Option<String>> = Mutex::new(None);
static EMPTY_SNAPSHOT: LazyLock<Arc<Snapshot>> = LazyLock::new(|| Arc::new(Snapshot::default()));

/// Wait-free load of the globally active pipeline, if any.
pub(crate) fn active() -> Guard<Option<Arc<worker::Shared>>> {
    ACTIVE.load()
}

/// Replaces the pending configuration from a JSON document.
///
/// On failure the active configuration is left untouched and the message is
/// also retrievable through [`config_error`]. The new configuration takes
/// effect at the next [`init`].
pub fn config_json(text: &str) -> Result<(), ConfigError> {
    store_config(Config::from_json(text))
}

/// Like [`config_json`], reading the document from a file.
pub fn config_file(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    store_config(Config::from_file(path))
}

fn store_config(parsed: Result<Config, ConfigError>) -> Result<(), ConfigError> {
    match parsed {
        Ok(config) => {
            CONFIG.store(Arc::new(config));
            *CONFIG_ERROR.lock().unwrap() = None;
            Ok(())
        }
        Err(error) => {
            *CONFIG_ERROR.lock().unwrap() = Some(error.to_string());
            Err(error)
        }
    }
}

/// Human-readable message of the last rejected configuration, if any.
pub fn config_error() -> Option<String> {
    CONFIG_ERROR.lock().unwrap().clone()
}

/// Starts (or restarts) the global pipeline with the current configuration.
///
/// A running pipeline is finalized first, so `init` always begins from an
/// empty registry and an empty snapshot.
pub fn init() {
    let mut slot = GLOBAL_CORE.lock().unwrap();
    if let Some(mut existing) = slot.take() {
        ACTIVE.store(None);
        existing.finalize();
    }
    let config = CONFIG.load_full();
    if config.enable && !DISABLED {
        let started = worker::Core::start(config);
        ACTIVE.store(Some(started.shared()));
        *slot = Some(started);
    }
}

/// Stops the global pipeline: closes the queue, drains what is already
/// queued within a bounded grace period, and joins the worker. Measuring
/// points become no-ops immediately.
pub fn finalize() {
    let mut slot = GLOBAL_CORE.lock().unwrap();
    ACTIVE.store(None);
    if let Some(mut existing) = slot.take() {
        existing.finalize();
    }
}

/// Blocks until the worker has observed an empty event queue at least once
/// since this call began. Returns immediately when no pipeline runs.
pub fn wait_until_empty() {
    if let Some(shared) = active().as_deref() {
        shared.wait_until_empty();
    }
}

/// Blocks until a snapshot published at or after `deadline` exists, forcing
/// a publication if periodic dumps are disabled.
pub fn wait_until(deadline: SystemTime) {
    if let Some(shared) = active().as_deref() {
        shared.wait_until(deadline);
    }
}

/// The current snapshot. Wait-free; the returned [`Snapshot`] stays valid
/// for as long as the `Arc` is held, independent of later publications.
pub fn metrics_dump() -> Arc<Snapshot> {
    match active().as_deref() {
        Some(shared) => shared.snapshot(),
        None => Arc::clone(&EMPTY_SNAPSHOT),
    }
}

/// The current snapshot rendered as JSON; `"{}"` when there is nothing.
pub fn json_dump() -> String {
    metrics_dump().to_json()
}

/// An owned metrics pipeline, independent of the global one.
///
/// Dropping the instance finalizes it: the queue closes, queued events are
/// drained within the shutdown grace period, and the worker joins.
pub struct Handystats {
    core: Option<worker::Core>,
    shared: Option<Arc<worker::Shared>>,
}

impl Handystats {
    /// Starts a pipeline with `config`. With `enable: false` no worker is
    /// started and every operation on the instance is a no-op.
    pub fn start(config: Config) -> Self {
        if !config.enable || DISABLED {
            return Handystats {
                core: None,
                shared: None,
            };
        }
        let started = worker::Core::start(Arc::new(config));
        let shared = Some(started.shared());
        Handystats {
            core: Some(started),
            shared,
        }
    }

    pub(crate) fn shared(&self) -> Option<&Arc<worker::Shared>> {
        self.shared.as_ref()
    }

    /// See [`wait_until_empty`].
    pub fn wait_until_empty(&self) {
        if let Some(shared) = self.shared() {
            shared.wait_until_empty();
        }
    }

    /// See [`wait_until`].
    pub fn wait_until(&self, deadline: SystemTime) {
        if let Some(shared) = self.shared() {
            shared.wait_until(deadline);
        }
    }

    /// See [`metrics_dump`].
    pub fn metrics_dump(&self) -> Arc<Snapshot> {
        match self.shared() {
            Some(shared) => shared.snapshot(),
            None => Arc::clone(&EMPTY_SNAPSHOT),
        }
    }

    /// See [`json_dump`].
    pub fn json_dump(&self) -> String {
        self.metrics_dump().to_json()
    }

    /// Stops the pipeline. Equivalent to dropping the instance.
    pub fn finalize(mut self) {
        if let Some(mut core) = self.core.take() {
            core.finalize();
        }
    }
}
