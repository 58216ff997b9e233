//! Background load worker.
//!
//! One dedicated thread drains a single-slot job queue, so at most one load
//! is ever in flight. The caller opens the file and clears the map before
//! handing the reader over; the worker then inserts records one at a time,
//! taking the write lock per record so interactive operations interleave at
//! record granularity.

use crate::flatfile::{self, ParsedLine, RecordLines};
use crate::store::{LoadReport, SharedRecords, StoreError, write_lock};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const WORKER_THREAD_NAME: &str = "rollbook-loader";

type LoadResult = Result<LoadReport, StoreError>;

/// Completion notice for one load.
///
/// Returned by [`crate::Store::load`] when the bounded wait elapsed before
/// the worker finished. Store operations remain memory-safe while the load
/// runs, but the record set is only complete once the handle reports done.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    completion: Arc<Completion>,
}

impl LoadHandle {
    pub fn is_finished(&self) -> bool {
        self.completion.peek().is_some()
    }

    /// Block until the worker finishes this load.
    pub fn wait(&self) -> LoadResult {
        self.completion.wait()
    }

    /// Block for at most `timeout`; `None` if the load is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<LoadResult> {
        self.completion.wait_timeout(timeout)
    }
}

#[derive(Debug, Default)]
struct Completion {
    outcome: Mutex<Option<LoadResult>>,
    ready: Condvar,
}

impl Completion {
    /// First outcome wins; later calls are ignored.
    fn finish(&self, outcome: LoadResult) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(outcome);
        }
        self.ready.notify_all();
    }

    fn peek(&self) -> Option<LoadResult> {
        let slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        (*slot).clone()
    }

    fn wait(&self) -> LoadResult {
        let slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = self
            .ready
            .wait_while(slot, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        (*slot).clone().unwrap_or(Err(StoreError::LoaderStopped))
    }

    fn wait_timeout(&self, timeout: Duration) -> Option<LoadResult> {
        let slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        let (slot, _) = self
            .ready
            .wait_timeout_while(slot, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        (*slot).clone()
    }
}

struct LoadJob {
    path: PathBuf,
    lines: RecordLines<BufReader<File>>,
    completion: Arc<Completion>,
}

impl Drop for LoadJob {
    // A job dropped unprocessed (worker shut down) must still release waiters.
    fn drop(&mut self) {
        self.completion.finish(Err(StoreError::LoaderStopped));
    }
}

#[derive(Debug)]
pub(crate) struct Loader {
    records: SharedRecords,
    jobs: Option<SyncSender<LoadJob>>,
    busy: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Loader {
    pub(crate) fn spawn(records: SharedRecords) -> Result<Self, StoreError> {
        let (jobs, queue) = mpsc::sync_channel::<LoadJob>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(AtomicBool::new(false));

        let worker = {
            let records = Arc::clone(&records);
            let busy = Arc::clone(&busy);
            let cancel = Arc::clone(&cancel);
            thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn(move || run_worker(records, queue, busy, cancel))
                .map_err(|e| StoreError::Worker(e.to_string()))?
        };

        Ok(Self {
            records,
            jobs: Some(jobs),
            busy,
            cancel,
            worker: Some(worker),
        })
    }

    /// Fail fast if the worker is gone or a load is already queued/running.
    pub(crate) fn check_ready(&self) -> Result<(), StoreError> {
        if self.jobs.is_none() {
            return Err(StoreError::LoaderStopped);
        }
        if self.busy.load(Ordering::Acquire) {
            return Err(StoreError::LoadBusy);
        }
        Ok(())
    }

    /// Open `path`, clear the map, and queue the read on the worker.
    ///
    /// If the file cannot be opened the map is still cleared and the error
    /// returned synchronously.
    pub(crate) fn start(&self, path: &Path) -> Result<LoadHandle, StoreError> {
        let jobs = self.jobs.as_ref().ok_or(StoreError::LoaderStopped)?;
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StoreError::LoadBusy);
        }

        let lines = match flatfile::open_records(path) {
            Ok(lines) => lines,
            Err(error) => {
                write_lock(&self.records).clear();
                self.busy.store(false, Ordering::Release);
                return Err(error.into());
            }
        };
        write_lock(&self.records).clear();

        let completion = Arc::new(Completion::default());
        let job = LoadJob {
            path: path.to_path_buf(),
            lines,
            completion: Arc::clone(&completion),
        };
        if jobs.try_send(job).is_err() {
            self.busy.store(false, Ordering::Release);
            return Err(StoreError::LoaderStopped);
        }
        Ok(LoadHandle { completion })
    }

    /// Signal cancellation, close the queue and join the worker.
    ///
    /// An in-flight load stops before its next line; the records it already
    /// inserted stay in the map.
    pub(crate) fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Release);
        self.jobs = None;
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("load worker panicked");
        }
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    records: SharedRecords,
    queue: Receiver<LoadJob>,
    busy: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
) {
    while let Ok(mut job) = queue.recv() {
        if cancel.load(Ordering::Acquire) {
            break;
        }
        let outcome = load_lines(&records, &mut job, &cancel);
        busy.store(false, Ordering::Release);
        job.completion.finish(outcome);
    }
}

fn load_lines(records: &SharedRecords, job: &mut LoadJob, cancel: &AtomicBool) -> LoadResult {
    let mut report = LoadReport::default();

    for line in &mut job.lines {
        if cancel.load(Ordering::Acquire) {
            report.cancelled = true;
            log::warn!(
                "load of {} cancelled after {} records",
                job.path.display(),
                report.loaded
            );
            return Ok(report);
        }

        match line {
            Ok(ParsedLine::Record(record)) => {
                write_lock(records).insert(record.id, record);
                report.loaded += 1;
            }
            Ok(ParsedLine::Blank) => {}
            Ok(ParsedLine::Malformed { line_no, error }) => {
                log::debug!("{}:{line_no}: skipped ({error})", job.path.display());
                report.skipped += 1;
            }
            Err(error) => {
                log::error!(
                    "read of {} failed after {} records: {error}",
                    job.path.display(),
                    report.loaded
                );
                return Err(error.into());
            }
        }
    }

    log::info!(
        "loaded {} records from {} ({} lines skipped)",
        report.loaded,
        job.path.display(),
        report.skipped
    );
    Ok(report)
}
