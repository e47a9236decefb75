//! Single-worker request queue.
//!
//! The worker thread owns the queue's state outright. Every submitted job
//! runs on that thread, one at a time, in submission order; the caller gets
//! a [`RequestHandle`] to wait on or poll.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::debug;
use vp_core::{VpError, VpResult};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

pub struct RequestQueue<S> {
    job_tx: Option<Sender<Job<S>>>,
    thread: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> RequestQueue<S> {
    /// Spawn the worker thread, moving `state` onto it.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] if the thread fails to spawn.
    pub fn spawn(name: impl Into<String>, state: S) -> io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job<S>>();
        let name = name.into();

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::thread_loop(&name, job_rx, state))?;

        Ok(Self {
            job_tx: Some(job_tx),
            thread: Some(thread),
        })
    }

    fn thread_loop(name: &str, job_rx: Receiver<Job<S>>, mut state: S) {
        while let Ok(job) = job_rx.recv() {
            job(&mut state);
        }
        debug!(queue = name, "request queue drained; worker exiting");
    }

    /// Queue a job. It runs after every job submitted before it.
    pub fn submit<T, F>(&self, job: F) -> RequestHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> T + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        let job: Job<S> = Box::new(move |state| {
            let _ = result_tx.send(job(state));
        });

        // If the worker is gone the job (and its sender) is dropped here,
        // which the handle reports as a closed queue.
        if let Some(job_tx) = &self.job_tx {
            let _ = job_tx.send(job);
        }

        RequestHandle {
            result_rx,
            ready: None,
        }
    }
}

impl<S> Drop for RequestQueue<S> {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish queued jobs and exit.
        drop(self.job_tx.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Awaitable result of a queued job.
#[derive(Debug)]
pub struct RequestHandle<T> {
    result_rx: Receiver<T>,
    ready: Option<T>,
}

impl<T> RequestHandle<T> {
    /// Block until the job has run.
    ///
    /// # Errors
    ///
    /// Returns [`VpError::QueueClosed`] if the worker stopped before running it.
    pub fn wait(mut self) -> VpResult<T> {
        if let Some(value) = self.ready.take() {
            return Ok(value);
        }
        self.result_rx.recv().map_err(|_| VpError::QueueClosed)
    }

    /// Non-blocking check for completion.
    pub fn is_done(&mut self) -> bool {
        if self.ready.is_none() {
            match self.result_rx.try_recv() {
                Ok(value) => self.ready = Some(value),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
            }
        }
        self.ready.is_some()
    }

    /// Take the result if the job has already run.
    pub fn try_take(&mut self) -> Option<T> {
        if self.is_done() {
            self.ready.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    #[test]
    fn jobs_run_in_submission_order() {
        let queue = RequestQueue::spawn("test-queue", Vec::<usize>::new()).unwrap();
        let handles: Vec<_> = (0..50)
            .map(|i| {
                queue.submit(move |log: &mut Vec<usize>| {
                    log.push(i);
                    log.len()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.wait().unwrap(), i + 1);
        }
        let log = queue.submit(|log: &mut Vec<usize>| log.clone()).wait().unwrap();
        assert_eq!(log, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn handle_can_be_polled() {
        let queue = RequestQueue::spawn("poll-queue", 0_u32).unwrap();
        let gate = Arc::new(Barrier::new(2));

        let worker_gate = gate.clone();
        let mut blocked = queue.submit(move |n: &mut u32| {
            worker_gate.wait();
            *n += 1;
            *n
        });
        assert!(!blocked.is_done());
        assert!(blocked.try_take().is_none());

        gate.wait();
        assert_eq!(blocked.wait().unwrap(), 1);
    }

    #[test]
    fn panicking_job_closes_the_queue() {
        let queue = RequestQueue::spawn("panic-queue", ()).unwrap();
        let failed = queue.submit(|_: &mut ()| -> u8 { panic!("job failed") });
        assert!(matches!(failed.wait(), Err(VpError::QueueClosed)));

        let after = queue.submit(|_: &mut ()| 1_u8);
        assert!(matches!(after.wait(), Err(VpError::QueueClosed)));
    }

    #[test]
    fn drop_finishes_queued_jobs() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        {
            let queue = RequestQueue::spawn("drop-queue", ()).unwrap();
            for _ in 0..10 {
                let counter = counter.clone();
                let _ = queue.submit(move |_: &mut ()| {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                });
            }
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 10);
    }
}
