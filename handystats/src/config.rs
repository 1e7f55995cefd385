// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Configuration: typed tunables resolved per metric.
//!
//! Configuration arrives as JSON. Recognised top-level keys are `enable`,
//! `dump-interval`, the `defaults` section and the per-kind `counter` /
//! `gauge` / `timer` sections; *any other* top-level key is a metric-name
//! glob pattern carrying the same overlay keys. A metric's effective
//! statistics config is resolved once, at first registration:
//!
//! 1. typed defaults for the metric kind,
//! 2. the `defaults` section,
//! 3. every matching pattern, in declaration order,
//! 4. the metric-kind section.
//!
//! Invalid input never clobbers the active configuration; the parse fails
//! with a [`ConfigError`] and the previous config stays in effect.

use std::{fs, path::Path, time::Duration};

use globset::{Glob, GlobMatcher};
use handystats_core::{MetricKind, StatisticsConfig, Tags};
use serde_json::Value;
use thiserror::Error;

/// Default snapshot publication period.
pub const DEFAULT_DUMP_INTERVAL: Duration = Duration::from_millis(750);

/// Default timer idle timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration must be a JSON object")]
    NotAnObject,
    #[error("'{key}' must be {expected}")]
    InvalidValue { key: String, expected: &'static str },
    #[error("unknown key '{key}' in '{section}'")]
    UnknownKey { section: String, key: String },
    #[error("unknown statistic '{0}' in 'stats'")]
    UnknownStat(String),
    #[error("invalid metric pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

/// Partial statistics settings from one config section or pattern.
#[derive(Clone, Debug, Default)]
struct Overlay {
    moving_interval: Option<Duration>,
    histogram_bins: Option<usize>,
    tags: Option<Tags>,
    idle_timeout: Option<Duration>,
}

impl Overlay {
    fn parse(section: &str, value: &Value, allow_idle_timeout: bool) -> Result<Self, ConfigError> {
        let Value::Object(map) = value else {
            return Err(ConfigError::InvalidValue {
                key: section.to_owned(),
                expected: "an object",
            });
        };
        let mut overlay = Overlay::default();
        for (key, value) in map {
            match key.as_str() {
                "moving-interval" => {
                    overlay.moving_interval = Some(parse_duration_ms(key, value)?);
                }
                "histogram-bins" => {
                    let bins = value
                        .as_u64()
                        .filter(|bins| *bins > 0)
                        .ok_or(ConfigError::InvalidValue {
                            key: key.clone(),
                            expected: "a positive integer",
                        })?;
                    overlay.histogram_bins = Some(bins as usize);
                }
                "stats" => {
                    overlay.tags = Some(parse_stats(value)?);
                }
                "idle-timeout" if allow_idle_timeout => {
                    overlay.idle_timeout = Some(parse_duration_ms(key, value)?);
                }
                _ => {
                    return Err(ConfigError::UnknownKey {
                        section: section.to_owned(),
                        key: key.clone(),
                    });
                }
            }
        }
        Ok(overlay)
    }

    fn apply_to(&self, config: &mut StatisticsConfig) {
        if let Some(moving_interval) = self.moving_interval {
            config.moving_interval = moving_interval;
        }
        if let Some(histogram_bins) = self.histogram_bins {
            config.histogram_bins = histogram_bins;
        }
        if let Some(tags) = self.tags {
            config.tags = tags;
        }
    }
}

fn parse_duration_ms(key: &str, value: &Value) -> Result<Duration, ConfigError> {
    let millis = value.as_u64().ok_or(ConfigError::InvalidValue {
        key: key.to_owned(),
        expected: "a non-negative integer of milliseconds",
    })?;
    Ok(Duration::from_millis(millis))
}

fn parse_stats(value: &Value) -> Result<Tags, ConfigError> {
    let Value::Array(entries) = value else {
        return Err(ConfigError::InvalidValue {
            key: "stats".to_owned(),
            expected: "an array of statistic names",
        });
    };
    let mut tags = Tags::empty();
    for entry in entries {
        let name = entry.as_str().ok_or(ConfigError::InvalidValue {
            key: "stats".to_owned(),
            expected: "an array of statistic names",
        })?;
        tags |= Tags::from_tag_name(name).ok_or_else(|| ConfigError::UnknownStat(name.to_owned()))?;
    }
    Ok(tags)
}

#[derive(Clone, Debug)]
struct Pattern {
    glob: String,
    matcher: GlobMatcher,
    overlay: Overlay,
}

/// Immutable configuration bundle.
///
/// The active instance is replaced wholesale by a successful
/// [`config_json`](crate::config_json) and snapshotted by
/// [`init`](crate::init); running pipelines never observe partial updates.
#[derive(Clone, Debug)]
pub struct Config {
    pub enable: bool,
    /// Snapshot publication period; zero disables periodic publication.
    pub dump_interval: Duration,
    defaults: Overlay,
    counter: Overlay,
    gauge: Overlay,
    timer: Overlay,
    patterns: Vec<Pattern>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enable: true,
            dump_interval: DEFAULT_DUMP_INTERVAL,
            defaults: Overlay::default(),
            counter: Overlay::default(),
            gauge: Overlay::default(),
            timer: Overlay::default(),
            patterns: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(text)?;
        let Value::Object(map) = root else {
            return Err(ConfigError::NotAnObject);
        };

        let mut config = Config::default();
        for (key, value) in &map {
            match key.as_str() {
                "enable" => {
                    config.enable = value.as_bool().ok_or(ConfigError::InvalidValue {
                        key: key.clone(),
                        expected: "a boolean",
                    })?;
                }
                "dump-interval" => {
                    config.dump_interval = parse_duration_ms(key, value)?;
                }
                "defaults" => config.defaults = Overlay::parse(key, value, false)?,
                "counter" => config.counter = Overlay::parse(key, value, false)?,
                "gauge" => config.gauge = Overlay::parse(key, value, false)?,
                "timer" => config.timer = Overlay::parse(key, value, true)?,
                pattern => {
                    let overlay = Overlay::parse(pattern, value, true)?;
                    let matcher = Glob::new(pattern)
                        .map_err(|source| ConfigError::Pattern {
                            pattern: pattern.to_owned(),
                            source,
                        })?
                        .compile_matcher();
                    config.patterns.push(Pattern {
                        glob: pattern.to_owned(),
                        matcher,
                        overlay,
                    });
                }
            }
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Config::from_json(&text)
    }

    /// Effective statistics config for a metric, per the overlay order.
    pub fn statistics(&self, kind: MetricKind, name: &str) -> StatisticsConfig {
        let mut config = StatisticsConfig::default();
        self.defaults.apply_to(&mut config);
        for pattern in &self.patterns {
            if pattern.matcher.is_match(name) {
                pattern.overlay.apply_to(&mut config);
            }
        }
        self.kind_overlay(kind).apply_to(&mut config);
        config
    }

    /// Effective idle timeout for a timer metric.
    pub fn idle_timeout(&self, name: &str) -> Duration {
        let mut idle_timeout = DEFAULT_IDLE_TIMEOUT;
        for pattern in &self.patterns {
            if pattern.matcher.is_match(name)
                && let Some(timeout) = pattern.overlay.idle_timeout
            {
                idle_timeout = timeout;
            }
        }
        if let Some(timeout) = self.timer.idle_timeout {
            idle_timeout = timeout;
        }
        idle_timeout
    }

    fn kind_overlay(&self, kind: MetricKind) -> &Overlay {
        static EMPTY: Overlay = Overlay {
            moving_interval: None,
            histogram_bins: None,
            tags: None,
            idle_timeout: None,
        };
        match kind {
            MetricKind::Counter => &self.counter,
            MetricKind::Gauge => &self.gauge,
            MetricKind::Timer => &self.timer,
            MetricKind::Attribute => &EMPTY,
        }
    }

    /// Declared patterns, in declaration order.
    pub fn pattern_globs(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|pattern| pattern.glob.as_str())
    }
}
