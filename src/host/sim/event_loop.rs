//! Task queues on a virtual clock.

use crate::host::Task;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::time::Duration;

struct Timer {
    due: Duration,
    seq: u64,
    task: Task,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        (self.due, self.seq) == (other.due, other.seq)
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    // Reversed: the heap pops the earliest timer, FIFO among equal deadlines
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

/// Microtask queue plus timed macrotasks.
///
/// The loop only stores work; [`SimPage`](super::SimPage) pops tasks and
/// runs them with no borrow held.
#[derive(Default)]
pub(crate) struct EventLoop {
    now: Duration,
    seq: u64,
    microtasks: VecDeque<Task>,
    timers: BinaryHeap<Timer>,
}

impl EventLoop {
    #[inline]
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn queue_microtask(&mut self, task: Task) {
        self.microtasks.push_back(task);
    }

    /// Schedule `task` to run `delay` from now.
    pub fn schedule(&mut self, delay: Duration, task: Task) {
        self.seq += 1;
        self.timers.push(Timer {
            due: self.now + delay,
            seq: self.seq,
            task,
        });
    }

    pub fn pop_microtask(&mut self) -> Option<Task> {
        self.microtasks.pop_front()
    }

    /// Pop the earliest timer due at or before `limit`, moving the clock.
    pub fn pop_due(&mut self, limit: Duration) -> Option<Task> {
        if self.timers.peek()?.due > limit {
            return None;
        }
        let timer = self.timers.pop()?;
        self.now = self.now.max(timer.due);
        Some(timer.task)
    }

    /// Move the clock forward to `to` (never backwards).
    pub fn advance_to(&mut self, to: Duration) {
        self.now = self.now.max(to);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| -> Task {
            let sink = sink.clone();
            Box::new(move || sink.borrow_mut().push(name))
        };
        (log, make)
    }

    #[test]
    fn test_timers_run_in_deadline_order() {
        let (log, task) = recorder();
        let mut event_loop = EventLoop::default();
        event_loop.schedule(Duration::from_millis(20), task("late"));
        event_loop.schedule(Duration::from_millis(5), task("early"));
        event_loop.schedule(Duration::from_millis(5), task("early-second"));

        while let Some(next) = event_loop.pop_due(Duration::from_millis(10)) {
            next();
        }
        assert_eq!(*log.borrow(), vec!["early", "early-second"]);
        assert_eq!(event_loop.now(), Duration::from_millis(5));
        assert_eq!(event_loop.pending_timers(), 1);

        event_loop.advance_to(Duration::from_millis(10));
        assert!(event_loop.pop_due(Duration::from_millis(10)).is_none());
        assert!(event_loop.pop_due(Duration::from_millis(20)).is_some());
        assert_eq!(event_loop.now(), Duration::from_millis(20));
    }

    #[test]
    fn test_microtasks_are_fifo() {
        let (log, task) = recorder();
        let mut event_loop = EventLoop::default();
        event_loop.queue_microtask(task("a"));
        event_loop.queue_microtask(task("b"));
        while let Some(next) = event_loop.pop_microtask() {
            next();
        }
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }
}
