//! A bounded worker pool and the corner-parallel executor built on it.

use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use arcstr::ArcStr;
use crossbeam_channel::{Sender, unbounded};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed number of worker threads consuming a shared job queue.
///
/// Dropping the pool closes the queue and waits for queued jobs to finish.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Starts a pool of `size` workers. A size of zero is treated as one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let workers = (0..size)
            .map(|i| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("flow-worker-{i}"))
                    .spawn(move || {
                        for job in receiver.iter() {
                            job();
                        }
                    })
            })
            .filter_map(|worker| match worker {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!("failed to spawn worker thread: {e}");
                    None
                }
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Starts a pool sized to the host's available parallelism.
    pub fn with_available_parallelism() -> Self {
        Self::new(
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        )
    }

    /// The number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues `task`, returning a handle to its eventual result.
    ///
    /// A panicking task resolves to [`Error::Panic`].
    pub fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let handle = TaskHandle::default();
        let cell = handle.clone();
        let job: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(task)).unwrap_or(Err(Error::Panic));
            cell.set(result);
        });
        let sent = match (&self.sender, self.workers.is_empty()) {
            (Some(sender), false) => sender.send(job).is_ok(),
            _ => false,
        };
        if !sent {
            handle.set(Err(Error::PoolClosed));
        }
        handle
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

/// A handle to the result of a task that may still be running.
#[derive(Debug)]
pub struct TaskHandle<T>(Arc<OnceCell<Result<T>>>);

impl<T> Default for TaskHandle<T> {
    fn default() -> Self {
        Self(Arc::new(OnceCell::new()))
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> TaskHandle<T> {
    fn set(&self, value: Result<T>) {
        if self.0.set(value).is_err() {
            tracing::error!("task result was set twice");
        }
    }

    /// Blocks until the task finishes, returning its result.
    pub fn wait(&self) -> Result<&T> {
        self.0.wait().as_ref().map_err(Clone::clone)
    }

    /// Returns the result if the task has finished.
    pub fn poll(&self) -> Option<Result<&T>> {
        Some(self.0.get()?.as_ref().map_err(Clone::clone))
    }
}

/// Runs `task` once per corner on `pool` and collects the results.
///
/// Results are waited on in the order of `corners`, so the returned
/// mapping is ordered like `corners` whatever order the tasks finish in.
/// The first failing corner (in that order) fails the whole call; tasks
/// still running are left to finish in the background.
pub fn run_all<T, F>(pool: &WorkerPool, corners: &[ArcStr], task: F) -> Result<IndexMap<ArcStr, T>>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(ArcStr) -> Result<T> + Send + Sync + 'static,
{
    let task = Arc::new(task);
    let handles = corners
        .iter()
        .map(|corner| {
            let task = task.clone();
            let corner = corner.clone();
            let span = tracing::info_span!("corner", corner = %corner);
            pool.submit(move || span.in_scope(|| (*task)(corner)))
        })
        .collect::<Vec<_>>();

    let mut results = IndexMap::with_capacity(corners.len());
    for (corner, handle) in corners.iter().zip(handles) {
        let value = handle.wait().map_err(|e| {
            tracing::error!(corner = %corner, "corner task failed: {e}");
            e
        })?;
        results.insert(corner.clone(), value.clone());
    }
    Ok(results)
}
