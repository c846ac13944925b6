//! Work-dispatching thread pool: a planner thread fans ordered, unordered,
//! and barrier work out to N worker threads, and a dedicated delivery
//! thread hands completions back to callers.
//!
//! The original core lets an embedding `uv_loop_t` own completion delivery
//! (an `uv_async_t` wakes the loop thread, which then runs `after_work_cb`
//! inline). This crate has no embedding event loop to borrow, so the pool
//! owns a small delivery thread that plays that role (see `SPEC_FULL.md`
//! §2): it drains completions and invokes `after_work` callbacks itself.

mod planner;
mod worker;

use crate::error::{Error, Result};
use crate::queue::Queue;
use crate::statemachine::StateMachine;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

const MAX_THREADS: u32 = 1024;

type WorkFn = Box<dyn FnOnce() + Send + 'static>;

/// The class a submitted item belongs to. `Ordered` items carrying the same
/// tag run strictly in submission order relative to each other; different
/// tags may not interleave without a `Barrier` between them. `Unordered`
/// items carry no ordering guarantee at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    Unordered,
    Barrier,
    Ordered(u32),
}

impl WorkKind {
    fn goes_to_ordered_queue(self) -> bool {
        !matches!(self, WorkKind::Unordered)
    }
}

pub struct WorkItem {
    kind: WorkKind,
    thread_id: u32,
    work: Option<WorkFn>,
    after_work: Option<WorkFn>,
}

struct Completed {
    kind: WorkKind,
    after_work: Option<WorkFn>,
}

struct WorkerSlot {
    inq: Queue<WorkItem>,
}

struct PoolState {
    threads: Vec<WorkerSlot>,
    ordered: Queue<WorkItem>,
    unordered: Queue<WorkItem>,
    sm: StateMachine<fn(usize, usize) -> bool>,
    in_flight: u32,
    exiting: bool,
    o_prev: WorkKind,
    qos: u32,
}

struct Shared {
    mutex: Mutex<PoolState>,
    planner_cond: Condvar,
    worker_conds: Vec<Condvar>,
    outq: Mutex<Queue<Completed>>,
    outq_cond: Condvar,
    delivery_exiting: AtomicBool,
    active_ws: AtomicU64,
    nthreads: u32,
}

/// The thread pool handle. Dropping it does not join worker threads; call
/// [`Pool::shutdown`] explicitly for an orderly teardown.
pub struct Pool {
    shared: Arc<Shared>,
    planner_handle: Option<JoinHandle<()>>,
    worker_handles: Vec<JoinHandle<()>>,
    delivery_handle: Option<JoinHandle<()>>,
}

impl Pool {
    /// Create a pool with `nthreads` workers, clamped to `[1, 1024]`.
    pub fn new(nthreads: u32) -> Result<Self> {
        let nthreads = nthreads.clamp(1, MAX_THREADS);
        let threads = (0..nthreads).map(|_| WorkerSlot { inq: Queue::new() }).collect();
        let state = PoolState {
            threads,
            ordered: Queue::new(),
            unordered: Queue::new(),
            sm: planner::new_state_machine(),
            in_flight: 0,
            exiting: false,
            o_prev: WorkKind::Barrier,
            qos: 0,
        };
        let shared = Arc::new(Shared {
            mutex: Mutex::new(state),
            planner_cond: Condvar::new(),
            worker_conds: (0..nthreads).map(|_| Condvar::new()).collect(),
            outq: Mutex::new(Queue::new()),
            outq_cond: Condvar::new(),
            delivery_exiting: AtomicBool::new(false),
            active_ws: AtomicU64::new(0),
            nthreads,
        });

        let planner_shared = Arc::clone(&shared);
        let planner_handle = std::thread::Builder::new()
            .name("pool-planner".into())
            .spawn(move || planner::run(&planner_shared))
            .map_err(Error::Io)?;

        let mut worker_handles = Vec::with_capacity(nthreads as usize);
        for idx in 0..nthreads {
            let worker_shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("pool-worker-{idx}"))
                .spawn(move || worker::run(&worker_shared, idx as usize))
                .map_err(Error::Io)?;
            worker_handles.push(handle);
        }

        let delivery_shared = Arc::clone(&shared);
        let delivery_handle = std::thread::Builder::new()
            .name("pool-delivery".into())
            .spawn(move || delivery_loop(&delivery_shared))
            .map_err(Error::Io)?;

        Ok(Self {
            shared,
            planner_handle: Some(planner_handle),
            worker_handles,
            delivery_handle: Some(delivery_handle),
        })
    }

    pub fn nthreads(&self) -> u32 {
        self.shared.nthreads
    }

    /// Submit ordered work tagged `order`, dispatched to the worker chosen
    /// by `cookie % nthreads`. Ordered items sharing a tag must be submitted
    /// in the order they are meant to run; violating that is reported as an
    /// error rather than asserted away, since it reflects caller state
    /// (e.g. interleaved db handles) rather than pool-internal corruption.
    pub fn submit_ordered(
        &self,
        order: u32,
        cookie: u32,
        work: impl FnOnce() + Send + 'static,
        after_work: Option<impl FnOnce() + Send + 'static>,
    ) -> Result<()> {
        self.submit(WorkKind::Ordered(order), cookie, Some(Box::new(work)), after_work)
    }

    pub fn submit_unordered(
        &self,
        cookie: u32,
        work: impl FnOnce() + Send + 'static,
        after_work: Option<impl FnOnce() + Send + 'static>,
    ) -> Result<()> {
        self.submit(WorkKind::Unordered, cookie, Some(Box::new(work)), after_work)
    }

    /// Submit a barrier: no ordered item submitted after it runs until every
    /// ordered item submitted before it has completed, and all outstanding
    /// unordered work has drained. A barrier runs no user code; it is
    /// consumed by the planner itself.
    pub fn submit_barrier(&self, cookie: u32) -> Result<()> {
        self.submit::<fn()>(WorkKind::Barrier, cookie, None, None)
    }

    fn submit<F: FnOnce() + Send + 'static>(
        &self,
        kind: WorkKind,
        cookie: u32,
        work: Option<WorkFn>,
        after_work: Option<F>,
    ) -> Result<()> {
        let item = WorkItem {
            kind,
            thread_id: cookie % self.shared.nthreads,
            work,
            after_work: after_work.map(|f| -> WorkFn { Box::new(f) }),
        };

        let mut state = self.shared.mutex.lock()?;
        if !matches!(kind, WorkKind::Barrier) {
            self.shared.active_ws.fetch_add(1, Ordering::SeqCst);
        }
        if item.kind.goes_to_ordered_queue() {
            let prev = state.o_prev;
            if !matches!(prev, WorkKind::Barrier) && !matches!(kind, WorkKind::Barrier) && prev != kind {
                self.shared.active_ws.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::Protocol(format!(
                    "ordered work submitted out of sequence: expected {prev:?}, got {kind:?}"
                )));
            }
            state.o_prev = kind;
            state.ordered.insert_tail(item);
        } else {
            state.unordered.insert_tail(item);
        }
        self.shared.planner_cond.notify_one();
        Ok(())
    }

    /// Cooperative shutdown: signal every thread, then join them in the same
    /// order the original core does (planner first, then workers, then the
    /// completion path). Asserts the post-condition that every queue is
    /// empty and no work is outstanding.
    pub fn shutdown(&mut self) -> Result<()> {
        {
            let mut state = self.shared.mutex.lock()?;
            state.exiting = true;
            self.shared.planner_cond.notify_one();
        }
        if let Some(h) = self.planner_handle.take() {
            h.join().map_err(|_| Error::Fatal("planner thread panicked".into()))?;
        }

        {
            let state = self.shared.mutex.lock()?;
            assert!(state.ordered.is_empty() && state.unordered.is_empty());
        }

        for cond in &self.shared.worker_conds {
            cond.notify_one();
        }
        for h in self.worker_handles.drain(..) {
            h.join().map_err(|_| Error::Fatal("worker thread panicked".into()))?;
        }

        self.shared.delivery_exiting.store(true, Ordering::SeqCst);
        self.shared.outq_cond.notify_one();
        if let Some(h) = self.delivery_handle.take() {
            h.join().map_err(|_| Error::Fatal("delivery thread panicked".into()))?;
        }

        let outq = self.shared.outq.lock()?;
        assert!(outq.is_empty());
        assert_eq!(self.shared.active_ws.load(Ordering::SeqCst), 0);
        Ok(())
    }
}

fn delivery_loop(shared: &Shared) {
    loop {
        let mut drained = Queue::new();
        {
            #[expect(clippy::unwrap_used, reason = "a poisoned pool mutex is already fatal")]
            let mut outq = shared.outq.lock().unwrap();
            while outq.is_empty() && !shared.delivery_exiting.load(Ordering::SeqCst) {
                #[expect(clippy::unwrap_used, reason = "a poisoned pool mutex is already fatal")]
                {
                    outq = shared.outq_cond.wait(outq).unwrap();
                }
            }
            if outq.is_empty() && shared.delivery_exiting.load(Ordering::SeqCst) {
                return;
            }
            outq.move_into(&mut drained);
        }
        while let Some(completed) = drained.pop() {
            shared.active_ws.fetch_sub(1, Ordering::SeqCst);
            if let Some(after) = completed.after_work {
                after();
            }
        }
    }
}
