// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The asynchronous event queue between measuring points and the worker.
//!
//! Many producers push concurrently; a single consumer drains. Push is
//! lock-free and never waits on the consumer; the consumer parks when idle and
//! is unparked by the first push. There is no capacity bound — back-pressure is
//! observable only through the queue-size and pop-count self-instrumentation
//! the worker publishes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_queue::SegQueue;
use crossbeam_utils::sync::{Parker, Unparker};

use crate::event::Event;

/// Unbounded multi-producer event queue with a single draining consumer.
///
/// Created together with the [`Parker`] the consumer should block on; the
/// queue keeps the matching [`Unparker`] so producers can wake the consumer
/// cheaply on push.
pub struct EventQueue {
    queue: SegQueue<Event>,
    open: AtomicBool,
    dropped: AtomicU64,
    popped: AtomicU64,
    unparker: Unparker,
}

impl EventQueue {
    pub fn new() -> (Self, Parker) {
        let parker = Parker::new();
        let queue = EventQueue {
            queue: SegQueue::new(),
            open: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            unparker: parker.unparker().clone(),
        };
        (queue, parker)
    }

    /// Enqueues an event and wakes the consumer.
    ///
    /// After [`close`](Self::close) the event is dropped and counted; the
    /// producer never observes an error either way.
    pub fn push(&self, event: Event) {
        if !self.open.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.queue.push(event);
        // Ordering between the push and the unpark is not load-bearing: a
        // consumer that misses this wakeup sees the event on its next timed
        // wait at the latest.
        self.unparker.unpark();
    }

    /// Removes the oldest available event. Non-blocking.
    pub fn pop(&self) -> Option<Event> {
        let event = self.queue.pop();
        if event.is_some() {
            self.popped.fetch_add(1, Ordering::Relaxed);
        }
        event
    }

    /// Approximate number of queued events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Stops accepting new events. Already-queued events remain poppable.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        self.unparker.unpark();
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Wakes the consumer without enqueuing anything.
    pub fn wake(&self) {
        self.unparker.unpark();
    }

    /// Total events popped since creation.
    pub fn popped(&self) -> u64 {
        self.popped.load(Ordering::Relaxed)
    }

    /// Events discarded because the queue was already closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        clock,
        event::{CounterEvent, EventKind},
    };

    use super::*;

    fn increment(name: &str, delta: i64) -> Event {
        Event::new(
            name,
            clock::now(),
            EventKind::Counter(CounterEvent::Increment(delta)),
        )
    }

    #[test]
    fn fifo_for_single_producer() {
        let (queue, _parker) = EventQueue::new();
        for i in 0..100 {
            queue.push(increment("test", i));
        }
        for i in 0..100 {
            let event = queue.pop().unwrap();
            assert_eq!(event.kind, EventKind::Counter(CounterEvent::Increment(i)));
        }
        assert!(queue.pop().is_none());
        assert_eq!(queue.popped(), 100);
    }

    #[test]
    fn consumes_all_events_from_multiple_threads() {
        let (queue, _parker) = EventQueue::new();
        let queue = Arc::new(queue);
        std::thread::scope(|scope| {
            for t in 0..8 {
                let queue = Arc::clone(&queue);
                scope.spawn(move || {
                    for i in 0..100 {
                        queue.push(increment("test", t * 100 + i));
                    }
                });
            }
        });

        let mut seen = Vec::new();
        while let Some(event) = queue.pop() {
            match event.kind {
                EventKind::Counter(CounterEvent::Increment(delta)) => seen.push(delta),
                other => panic!("unexpected event {other:?}"),
            }
        }
        seen.sort();
        assert_eq!(seen, (0..800).collect::<Vec<_>>());
    }

    #[test]
    fn close_drops_and_counts_new_pushes() {
        let (queue, _parker) = EventQueue::new();
        queue.push(increment("test", 1));
        queue.close();
        queue.push(increment("test", 2));
        queue.push(increment("test", 3));

        assert_eq!(queue.dropped(), 2);
        assert!(queue.pop().is_some());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn push_unparks_consumer() {
        let (queue, parker) = EventQueue::new();
        let queue = Arc::new(queue);
        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.push(increment("test", 1)))
        };
        // park returns once the producer's unpark lands
        parker.park();
        producer.join().unwrap();
        assert!(queue.pop().is_some());
    }
}
