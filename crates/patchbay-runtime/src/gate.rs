//! Per-component serializing gate
//!
//! A gate is an unbounded FIFO work queue drained by at most one thread at a
//! time. Registry notifications, interceptor invalidations, administrative
//! requests, and lifecycle callbacks for one component are all enqueued here
//! and observed strictly in enqueue order. There is no dedicated worker
//! thread: whichever thread finds the gate idle drains it, and threads that
//! enqueue while a drain is running hand their work to the active drainer.
//!
//! Re-entrant use is safe. A job that enqueues onto its own gate (for
//! example a lifecycle callback mutating the registry) appends work that the
//! current drain picks up after the job returns.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::locks::lock_mutex;

/// Unit of work executed on a gate
pub type Job = Box<dyn FnOnce() + Send>;

/// Serializing work queue owned by one component
pub struct Gate {
    label: String,
    queue: Mutex<VecDeque<Job>>,
    draining: AtomicBool,
    closed: AtomicBool,
    warn_depth: usize,
}

impl Gate {
    /// Create a gate. `label` identifies the owning component in logs;
    /// `warn_depth` is the queue length past which enqueues are reported.
    pub fn new<S: Into<String>>(label: S, warn_depth: usize) -> Self {
        Self {
            label: label.into(),
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            warn_depth,
        }
    }

    /// Append a job without draining. Returns false when the gate is closed
    /// and the job was dropped.
    ///
    /// Safe to call while holding external locks; the job cannot run before
    /// [`Gate::drain`] is called (by this thread or the active drainer).
    pub fn enqueue(&self, job: Job) -> bool {
        if self.closed.load(Ordering::Acquire) {
            debug!(gate = %self.label, "dropping job enqueued after close");
            return false;
        }
        match lock_mutex(&self.queue, "Gate::enqueue") {
            Ok(mut queue) => {
                queue.push_back(job);
                if queue.len() > self.warn_depth {
                    warn!(
                        gate = %self.label,
                        depth = queue.len(),
                        "gate queue depth exceeds threshold; component is falling behind"
                    );
                }
                true
            }
            Err(error) => {
                warn!(gate = %self.label, %error, "gate queue unavailable");
                false
            }
        }
    }

    /// Run queued jobs until the queue is empty, unless another thread is
    /// already draining (that drainer will pick up our work)
    pub fn drain(&self) {
        loop {
            if self.draining.swap(true, Ordering::AcqRel) {
                // Another thread owns the drain; our jobs run in order there.
                return;
            }
            while let Some(job) = self.pop() {
                job();
            }
            self.draining.store(false, Ordering::Release);
            if self.is_empty() {
                return;
            }
            // Work arrived between the last pop and the release; try to
            // become the drainer again.
        }
    }

    /// Enqueue and drain in one call
    pub fn execute(&self, job: Job) {
        if self.enqueue(job) {
            self.drain();
        }
    }

    /// Close the gate: pending jobs are discarded and later enqueues are
    /// dropped. Called from the destroy transition, on the gate itself, so
    /// nothing queued behind the destroy can fire afterwards.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut queue) = lock_mutex(&self.queue, "Gate::close") {
            let dropped = queue.len();
            queue.clear();
            if dropped > 0 {
                debug!(gate = %self.label, dropped, "discarded jobs queued behind destroy");
            }
        }
    }

    /// Whether [`Gate::close`] has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn pop(&self) -> Option<Job> {
        match lock_mutex(&self.queue, "Gate::pop") {
            Ok(mut queue) => queue.pop_front(),
            Err(_) => None,
        }
    }

    fn is_empty(&self) -> bool {
        match lock_mutex(&self.queue, "Gate::is_empty") {
            Ok(queue) => queue.is_empty(),
            Err(_) => true,
        }
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
