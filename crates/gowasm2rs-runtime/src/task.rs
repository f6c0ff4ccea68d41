//! Work queue and one-shot timers for driving a guest's event loop.
//!
//! A Go `js/wasm` program parks its scheduler and expects the host to resume
//! it later (`setTimeout`, I/O callbacks). The host pushes those resumptions
//! as [`Task`]s onto a [`TaskQueue`] that a single worker thread drains;
//! [`Timer`] delivers delayed work onto the same queue.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Multi-producer FIFO of tasks. `dequeue` blocks until work arrives.
#[derive(Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    available: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, task: Task) {
        self.tasks.lock().push_back(task);
        self.available.notify_one();
    }

    /// Wait for and remove the oldest task.
    pub fn dequeue(&self) -> Task {
        let mut tasks = self.tasks.lock();
        loop {
            if let Some(task) = tasks.pop_front() {
                return task;
            }
            self.available.wait(&mut tasks);
        }
    }

    pub fn try_dequeue(&self) -> Option<Task> {
        self.tasks.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

struct TimerState {
    stopped: Mutex<bool>,
    signal: Condvar,
}

/// One-shot timer running its callback on a dedicated thread.
///
/// The callback runs at most once, after `interval`, unless [`Timer::stop`]
/// is called first. Dropping the timer stops it and joins the thread, so a
/// callback that already started has finished when `drop` returns.
pub struct Timer {
    state: Arc<TimerState>,
    thread: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new(callback: impl FnOnce() + Send + 'static, interval: Duration) -> io::Result<Self> {
        let state = Arc::new(TimerState {
            stopped: Mutex::new(false),
            signal: Condvar::new(),
        });
        let thread_state = state.clone();
        let thread = thread::Builder::new()
            .name("gowasm2rs-timer".to_string())
            .spawn(move || {
                // An interval past the clock's range never elapses.
                let deadline = Instant::now().checked_add(interval);
                let mut stopped = thread_state.stopped.lock();
                while !*stopped {
                    match deadline {
                        Some(deadline) => {
                            if thread_state
                                .signal
                                .wait_until(&mut stopped, deadline)
                                .timed_out()
                            {
                                break;
                            }
                        }
                        None => thread_state.signal.wait(&mut stopped),
                    }
                }
                let fire = !*stopped;
                drop(stopped);
                if fire {
                    log::trace!("timer fired after {interval:?}");
                    callback();
                }
            })?;
        Ok(Self {
            state,
            thread: Some(thread),
        })
    }

    /// A timer that enqueues `task` on `queue` when it fires.
    pub fn start(queue: Arc<TaskQueue>, task: Task, interval: Duration) -> io::Result<Self> {
        Self::new(move || queue.enqueue(task), interval)
    }

    /// Cancel the timer. Has no effect once the callback started.
    pub fn stop(&self) {
        *self.state.stopped.lock() = true;
        self.state.signal.notify_all();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            // A callback that drops its own timer must not join itself.
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}
