use crate::error::AssocError;
use crossbeam::channel::{self, Sender};
use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Counts submitted-but-unfinished jobs so callers can wait for them.
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    fn start(&self) -> Result<(), AssocError> {
        let mut count = self.count.lock().map_err(|_| AssocError::LockError)?;
        *count += 1;
        Ok(())
    }

    fn finish(&self) {
        // A poisoned counter still has to be decremented or flush never returns.
        let mut count = match self.count.lock() {
            Ok(count) => count,
            Err(poisoned) => poisoned.into_inner(),
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn wait(&self) -> Result<(), AssocError> {
        let count = self.count.lock().map_err(|_| AssocError::LockError)?;
        let _drained = self
            .drained
            .wait_while(count, |count| *count > 0)
            .map_err(|_| AssocError::LockError)?;
        Ok(())
    }
}

/// Fixed pool of threads that run fire-and-forget write jobs.
///
/// Jobs are taken from one shared queue by whichever worker is free, so two
/// jobs submitted back to back may complete in either order.
pub(crate) struct Dispatcher {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl Dispatcher {
    pub(crate) fn new(workers: usize, thread_name: &str) -> Self {
        let (sender, receiver) = channel::unbounded::<Job>();
        let pending = Arc::new(Pending::default());

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", thread_name, index))
                .spawn(move || {
                    for job in receiver.iter() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("write job panicked");
                        }
                        pending.finish();
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!("failed to spawn writer thread {}: {}", index, e),
            }
        }

        if handles.is_empty() {
            error!("no writer threads available, non-atomic writes will run inline");
        } else {
            debug!("started {} writer thread(s) named {}-*", handles.len(), thread_name);
        }

        Self {
            sender: Some(sender),
            workers: handles,
            pending,
        }
    }

    /// Queues `job` and returns without waiting for it.
    ///
    /// Runs `job` on the calling thread when there is no worker to take it.
    pub(crate) fn submit(&self, job: Job) -> Result<(), AssocError> {
        let sender = match &self.sender {
            Some(sender) if !self.workers.is_empty() => sender,
            _ => {
                job();
                return Ok(());
            }
        };

        self.pending.start()?;
        if let Err(channel::SendError(job)) = sender.send(job) {
            self.pending.finish();
            job();
        }
        Ok(())
    }

    /// Blocks until no submitted job is left running or queued.
    pub(crate) fn flush(&self) -> Result<(), AssocError> {
        self.pending.wait()
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Closing the channel lets every worker drain the queue and exit.
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("writer thread panicked");
            }
        }
        debug!("writer threads stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_submit_and_flush() -> Result<(), AssocError> {
        let dispatcher = Dispatcher::new(3, "test-writer");
        assert_eq!(dispatcher.worker_count(), 3);

        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let done = Arc::clone(&done);
            dispatcher.submit(Box::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
            }))?;
        }

        dispatcher.flush()?;
        assert_eq!(done.load(Ordering::SeqCst), 100);
        Ok(())
    }

    #[test]
    fn test_submit_does_not_wait() -> Result<(), AssocError> {
        let dispatcher = Dispatcher::new(1, "slow-writer");
        let done = Arc::new(AtomicUsize::new(0));

        let observed = Arc::clone(&done);
        dispatcher.submit(Box::new(move || {
            thread::sleep(Duration::from_millis(50));
            observed.store(1, Ordering::SeqCst);
        }))?;
        assert_eq!(done.load(Ordering::SeqCst), 0);

        dispatcher.flush()?;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn test_flush_with_nothing_pending() -> Result<(), AssocError> {
        let dispatcher = Dispatcher::new(1, "idle-writer");
        dispatcher.flush()
    }

    #[test]
    fn test_panicking_job_does_not_stall_flush() -> Result<(), AssocError> {
        let dispatcher = Dispatcher::new(1, "panicky-writer");
        dispatcher.submit(Box::new(|| panic!("job failed")))?;

        let done = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&done);
        dispatcher.submit(Box::new(move || {
            observed.store(1, Ordering::SeqCst);
        }))?;

        dispatcher.flush()?;
        // the single worker survived and ran the second job
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.worker_count(), 1);
        Ok(())
    }

    #[test]
    fn test_drop_drains_queue() -> Result<(), AssocError> {
        let done = Arc::new(AtomicUsize::new(0));
        {
            let dispatcher = Dispatcher::new(2, "draining-writer");
            for _ in 0..10 {
                let done = Arc::clone(&done);
                dispatcher.submit(Box::new(move || {
                    done.fetch_add(1, Ordering::SeqCst);
                }))?;
            }
        }
        assert_eq!(done.load(Ordering::SeqCst), 10);
        Ok(())
    }
}
