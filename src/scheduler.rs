//! Servo-rate task scheduler.
//!
//! The scheduler owns the device on a dedicated thread. Asynchronous tasks are
//! re-invoked every servo tick until they return [`Callback::Done`].
//! Synchronous requests are queued, run on the servo thread between two ticks
//! and block the caller until they finish, so they never interleave with an
//! asynchronous task.

use crate::device::HapticDevice;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Return status of a scheduled callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Callback {
    /// Run again on the next servo tick
    Continue,
    /// Remove the callback from the scheduler
    Done,
}

/// Identifies an asynchronous task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// How `wait_for_completion` behaves
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitMode {
    /// Report whether the task is still scheduled without blocking
    CheckStatus,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("servo rate must be positive")]
    InvalidRate,
    #[error("failed to spawn servo thread: {0}")]
    Spawn(String),
    #[error("scheduler is not running")]
    NotRunning,
}

pub type AsyncTask = Box<dyn FnMut(&mut dyn HapticDevice) -> Callback + Send>;
type SyncTask = Box<dyn FnOnce(&mut dyn HapticDevice) + Send>;

enum Request {
    Async(TaskHandle, AsyncTask),
    Sync(SyncTask),
    Unschedule(TaskHandle),
}

/// Set of asynchronous tasks still scheduled
#[derive(Default)]
struct LiveTasks {
    tasks: Mutex<HashSet<TaskHandle>>,
}

impl LiveTasks {
    fn insert(&self, handle: TaskHandle) {
        self.tasks.lock().insert(handle);
    }

    fn remove(&self, handle: TaskHandle) {
        self.tasks.lock().remove(&handle);
    }

    fn clear(&self) {
        self.tasks.lock().clear();
    }

    fn contains(&self, handle: TaskHandle) -> bool {
        self.tasks.lock().contains(&handle)
    }
}

pub struct Scheduler {
    requests: Sender<Request>,
    live: Arc<LiveTasks>,
    running: Arc<AtomicBool>,
    next_id: AtomicU64,
    thread: Option<JoinHandle<Box<dyn HapticDevice>>>,
}

impl Scheduler {
    /// Moves `device` onto a new servo thread ticking at `rate_hz`
    pub fn start(device: Box<dyn HapticDevice>, rate_hz: u32) -> Result<Self, SchedulerError> {
        if rate_hz == 0 {
            return Err(SchedulerError::InvalidRate);
        }
        let period = Duration::from_secs_f64(1.0 / rate_hz as f64);
        let (requests, inbox) = unbounded();
        let live = Arc::new(LiveTasks::default());
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let live = Arc::clone(&live);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("haptic-servo".into())
                .spawn(move || servo_loop(device, period, inbox, live, running))
                .map_err(|e| SchedulerError::Spawn(e.to_string()))?
        };
        log::info!("Scheduler started at {} Hz", rate_hz);

        Ok(Scheduler {
            requests,
            live,
            running,
            next_id: AtomicU64::new(1),
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Schedules a task that is re-invoked every tick until it returns `Done`
    pub fn schedule_asynchronous<F>(&self, task: F) -> Result<TaskHandle, SchedulerError>
    where
        F: FnMut(&mut dyn HapticDevice) -> Callback + Send + 'static,
    {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }
        let handle = TaskHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.live.insert(handle);
        if self
            .requests
            .send(Request::Async(handle, Box::new(task)))
            .is_err()
        {
            self.live.remove(handle);
            return Err(SchedulerError::NotRunning);
        }
        Ok(handle)
    }

    /// Runs `task` once on the servo thread and blocks until it returns
    pub fn schedule_synchronous<F, R>(&self, task: F) -> Result<R, SchedulerError>
    where
        F: FnOnce(&mut dyn HapticDevice) -> R + Send + 'static,
        R: Send + 'static,
    {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }
        let (reply, result) = bounded(1);
        let request: SyncTask = Box::new(move |device: &mut dyn HapticDevice| {
            let _ = reply.send(task(device));
        });
        self.requests
            .send(Request::Sync(request))
            .map_err(|_| SchedulerError::NotRunning)?;
        // The reply sender is dropped unanswered if the servo thread exits first
        result.recv().map_err(|_| SchedulerError::NotRunning)
    }

    /// Returns whether the task is still scheduled once the wait is over
    pub fn wait_for_completion(&self, handle: TaskHandle, mode: WaitMode) -> bool {
        match mode {
            WaitMode::CheckStatus => self.is_running() && self.live.contains(handle),
        }
    }

    pub fn unschedule(&self, handle: TaskHandle) {
        self.live.remove(handle);
        let _ = self.requests.send(Request::Unschedule(handle));
    }

    /// Stops the servo thread and hands the device back.
    ///
    /// Every scheduled task is dropped; pending synchronous callers are released
    /// with [`SchedulerError::NotRunning`]. Returns `None` if the servo thread panicked.
    pub fn stop(mut self) -> Option<Box<dyn HapticDevice>> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<Box<dyn HapticDevice>> {
        self.running.store(false, Ordering::SeqCst);
        let thread = self.thread.take()?;
        let device = match thread.join() {
            Ok(device) => Some(device),
            Err(_) => {
                log::error!("Servo thread panicked");
                None
            }
        };
        self.live.clear();
        log::info!("Scheduler stopped");
        device
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(mut device) = self.shutdown() {
            device.disable();
        }
    }
}

fn servo_loop(
    mut device: Box<dyn HapticDevice>,
    period: Duration,
    inbox: Receiver<Request>,
    live: Arc<LiveTasks>,
    running: Arc<AtomicBool>,
) -> Box<dyn HapticDevice> {
    let mut tasks: Vec<(TaskHandle, AsyncTask)> = Vec::new();
    let mut next_tick = Instant::now();

    while running.load(Ordering::SeqCst) {
        // Service requests until the next tick is due
        loop {
            match inbox.recv_deadline(next_tick) {
                Ok(Request::Async(handle, task)) => tasks.push((handle, task)),
                Ok(Request::Sync(task)) => task(device.as_mut()),
                Ok(Request::Unschedule(handle)) => tasks.retain(|(h, _)| *h != handle),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
            if !running.load(Ordering::SeqCst) {
                break;
            }
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }

        tasks.retain_mut(|(handle, task)| match task(device.as_mut()) {
            Callback::Continue => true,
            Callback::Done => {
                log::info!("Task {:?} finished", handle);
                live.remove(*handle);
                false
            }
        });

        next_tick += period;
        let now = Instant::now();
        if next_tick < now {
            // Overran; do not try to catch up on missed ticks
            next_tick = now;
        }
    }

    for (handle, _) in tasks.drain(..) {
        live.remove(handle);
    }
    device
}
