//! Single-thread timer wheel for deferred engine work.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, error};

use crate::commands::{TimerAction, TimerCommand};

struct Pending {
    at: Instant,
    seq: u64,
    action: TimerAction,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// Runs `TimerAction`s on one background thread once their deadline passes.
/// Actions with the same deadline run in scheduling order.
pub struct TimerScheduler {
    tx: Sender<TimerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl TimerScheduler {
    pub fn spawn<F>(handler: F) -> Self
    where
        F: FnMut(TimerAction) + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("fretwork-timers".to_string())
            .spawn(move || run(rx, handler))
            .ok();
        if handle.is_none() {
            error!("could not start timer thread; deferred note actions are disabled");
        }
        Self { tx, handle }
    }

    pub fn schedule(&self, delay: Duration, action: TimerAction) {
        self.schedule_at(Instant::now() + delay, action);
    }

    pub fn schedule_at(&self, at: Instant, action: TimerAction) {
        let _ = self.tx.send(TimerCommand::Schedule { at, action });
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            // The last owner may be dropped from inside a timer callback.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn run<F: FnMut(TimerAction)>(rx: Receiver<TimerCommand>, mut handler: F) {
    let mut pending: BinaryHeap<Reverse<Pending>> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let now = Instant::now();
        while pending.peek().is_some_and(|Reverse(p)| p.at <= now) {
            if let Some(Reverse(due)) = pending.pop() {
                handler(due.action);
            }
        }

        let received = match pending.peek() {
            Some(Reverse(next)) => rx.recv_deadline(next.at),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(TimerCommand::Schedule { at, action }) => {
                pending.push(Reverse(Pending { at, seq, action }));
                seq += 1;
            }
            Ok(TimerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    debug!("timer thread stopped with {} pending actions", pending.len());
}
