//! Bounded worker pool interface.
//!
//! The dispatcher submits each encoding request as one job and reads the
//! pending-queue depth for admission control; it never drives execution
//! itself. The standard implementation is [`threadpool::ThreadPool`],
//! where the waiting queue size maps to `queued_count`.

/// A unit of work submitted to the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool accepting jobs and reporting its backlog.
pub trait WorkerPool: Send + Sync {
    /// Queues a job for execution.
    fn execute(&self, job: Job);

    /// Number of jobs queued but not yet started. Informational; the value
    /// may be stale by the time the caller acts on it.
    fn waiting_queue_size(&self) -> usize;
}

impl WorkerPool for threadpool::ThreadPool {
    fn execute(&self, job: Job) {
        threadpool::ThreadPool::execute(self, job);
    }

    fn waiting_queue_size(&self) -> usize {
        self.queued_count()
    }
}
