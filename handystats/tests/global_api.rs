// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The process-global embedding API. These tests share the global pipeline,
//! so they serialize on a local lock.

use std::{
    sync::{Mutex, MutexGuard},
    thread,
    time::{Duration, SystemTime},
};

use handystats::{counter_increment, gauge_set, metric_name, timer_start, timer_stop};

static GLOBAL_PIPELINE: Mutex<()> = Mutex::new(());

fn exclusive() -> MutexGuard<'static, ()> {
    // a test that panicked while holding the lock doesn't invalidate the pipeline
    GLOBAL_PIPELINE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn settle() {
    handystats::wait_until_empty();
    handystats::wait_until(SystemTime::now());
}

#[test]
fn lifecycle_and_measuring_points() {
    let _lock = exclusive();
    handystats::config_json(r#"{"dump-interval": 1}"#).unwrap();
    handystats::init();

    handystats::counter_increment("global.counter", 5);
    handystats::gauge_set("global.gauge", 2.5);
    handystats::timer_start("global.timer", 0);
    handystats::timer_stop("global.timer", 0);
    handystats::attribute_set_string("global.attr", "value");
    settle();

    let dump = handystats::metrics_dump();
    assert_eq!(dump.metrics["global.counter"].stats().count(), 1);
    assert_eq!(dump.metrics["global.timer"].stats().count(), 1);
    assert_eq!(
        dump.attributes["global.attr"],
        handystats::AttributeValue::String("value".into())
    );

    handystats::finalize();
}

#[test]
fn measuring_points_are_noops_before_init_and_after_finalize() {
    let _lock = exclusive();
    handystats::config_json(r#"{"dump-interval": 1}"#).unwrap();
    handystats::finalize();

    // no pipeline: nothing faults, nothing is recorded
    handystats::counter_increment("ghost.counter", 1);
    handystats::wait_until_empty();
    assert_eq!(handystats::json_dump(), "{}");

    handystats::init();
    handystats::counter_increment("live.counter", 1);
    settle();
    assert!(handystats::metrics_dump().metrics.contains_key("live.counter"));
    handystats::finalize();

    handystats::counter_increment("late.counter", 1);
    handystats::gauge_set("late.gauge", 1.0);
    handystats::wait_until_empty();
    handystats::wait_until(SystemTime::now());
}

#[test]
fn reinit_resets_the_registry() {
    let _lock = exclusive();
    handystats::config_json(r#"{"dump-interval": 1}"#).unwrap();
    handystats::init();
    handystats::counter_increment("first.run", 1);
    settle();
    assert!(handystats::metrics_dump().metrics.contains_key("first.run"));

    handystats::init();
    settle();
    assert!(!handystats::metrics_dump().metrics.contains_key("first.run"));
    handystats::finalize();
}

#[test]
fn enable_false_means_empty_dumps() {
    let _lock = exclusive();
    handystats::config_json(r#"{"enable": false, "dump-interval": 1}"#).unwrap();
    handystats::init();

    for i in 0..10 {
        handystats::gauge_set("test.gauge", i as f64);
    }
    thread::sleep(Duration::from_millis(10));

    let dump = handystats::metrics_dump();
    assert!(dump.metrics.is_empty() && dump.attributes.is_empty());
    assert_eq!(handystats::json_dump(), "{}");

    handystats::finalize();
    handystats::config_json("{}").unwrap();
}

#[test]
fn macro_forms_with_formatted_names() {
    let _lock = exclusive();
    handystats::config_json(r#"{"dump-interval": 1}"#).unwrap();
    handystats::init();

    for shard in 0..3 {
        counter_increment!(metric_name!("macro.counter.{shard}"));
    }
    counter_increment!("macro.counter.total", 10);
    gauge_set!("macro.gauge", 1.5);
    timer_start!("macro.timer");
    timer_stop!("macro.timer");
    settle();

    let dump = handystats::metrics_dump();
    for shard in 0..3 {
        assert!(dump.metrics.contains_key(&format!("macro.counter.{shard}")));
    }
    assert_eq!(dump.metrics["macro.counter.total"].stats().value(), 10.0);
    assert_eq!(dump.metrics["macro.timer"].stats().count(), 1);

    handystats::finalize();
}

#[test]
fn global_scoped_helpers() {
    let _lock = exclusive();
    handystats::config_json(r#"{"dump-interval": 1}"#).unwrap();
    handystats::init();

    {
        let _timer = handystats::ScopedTimer::new("scoped.timer");
        thread::sleep(Duration::from_millis(2));
    }
    let proxy = handystats::CounterProxy::with_init("scoped.counter", 0);
    {
        let _count = proxy.scoped(3);
    }
    settle();

    let dump = handystats::metrics_dump();
    assert_eq!(dump.metrics["scoped.timer"].stats().count(), 1);
    let counter = dump.metrics["scoped.counter"].stats();
    assert_eq!(counter.value(), 0.0);
    assert_eq!(counter.count(), 3);

    handystats::finalize();
}
