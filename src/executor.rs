use core_affinity::{get_core_ids, set_for_current};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Worker {
    handle: Option<thread::JoinHandle<()>>,
    sender: Option<Sender<Job>>,
}

/// A fixed team of worker threads with core affinity. Unlike a general job
/// queue, every [`execute`](TaskExecutor::execute) call hands exactly one
/// task to every worker and blocks until all of them have finished, so
/// callers can partition a grid by `(task_id, num_workers)` and rely on the
/// whole sweep being done when the call returns.
///
/// A panicking task aborts the process: a half-swept grid has no recovery
/// short of redoing the step, and unwinding past the barrier would leave the
/// caller waiting forever.
pub struct TaskExecutor {
    workers: Vec<Worker>,
}

impl TaskExecutor {
    /// Create an executor with exactly the given number of workers, pinned
    /// round-robin over the available cores.
    ///
    pub fn new(num_workers: usize) -> Self {
        assert!(num_workers > 0);
        let core_ids = get_core_ids().unwrap();
        let workers = core_ids
            .into_iter()
            .cycle()
            .take(num_workers)
            .map(|core_id| {
                let (sender, receiver): (Sender<Job>, Receiver<Job>) = unbounded();
                let handle = thread::spawn(move || {
                    set_for_current(core_id);
                    for job in receiver {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            log::error!("worker task panicked, aborting");
                            std::process::abort();
                        }
                    }
                });
                Worker {
                    handle: Some(handle),
                    sender: Some(sender),
                }
            })
            .collect();

        TaskExecutor { workers }
    }

    /// Return the number of worker threads.
    ///
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Run one task per worker and wait for all of them. The factory is
    /// called with `(task_id, num_workers)` for each task id in order;
    /// worker `task_id` runs the task it produced.
    ///
    /// Tasks may borrow from the caller's stack: the barrier guarantees
    /// every borrow ends before this returns.
    ///
    pub fn execute<'scope, F, T>(&self, mut factory: F)
    where
        F: FnMut(usize, usize) -> T,
        T: FnOnce() + Send + 'scope,
    {
        let num_workers = self.num_workers();
        let (done, all_done) = bounded::<()>(num_workers);

        // The barrier lives in a drop guard so it also holds when a factory
        // call panics mid-dispatch: the unwind must not leave this frame
        // while an already-dispatched job can still touch borrows of it.
        struct Barrier<'d> {
            all_done: &'d Receiver<()>,
            dispatched: usize,
        }
        impl Drop for Barrier<'_> {
            fn drop(&mut self) {
                for _ in 0..self.dispatched {
                    let _ = self.all_done.recv();
                }
            }
        }
        let mut barrier = Barrier {
            all_done: &all_done,
            dispatched: 0,
        };

        for task_id in 0..num_workers {
            let task = factory(task_id, num_workers);
            let done = done.clone();
            let job: Box<dyn FnOnce() + Send + 'scope> = Box::new(move || {
                task();
                let _ = done.send(());
            });
            // SAFETY: the job is erased to 'static to pass through the
            // worker channel, but the barrier guard keeps this stack frame
            // alive until every dispatched job has run to completion, on
            // the normal path and the unwind path alike, so no borrow in
            // `task` is dangling while the job exists.
            let job: Job = unsafe { std::mem::transmute(job) };
            self.workers[task_id]
                .sender
                .as_ref()
                .unwrap()
                .send(job)
                .unwrap();
            barrier.dispatched += 1;
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.sender.take().unwrap();
        self.handle.take().unwrap().join().unwrap();
    }
}
