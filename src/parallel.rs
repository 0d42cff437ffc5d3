//! Bounded worker pool for independent jobs.

use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;

/// Summary of one [`run_jobs`] call.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub jobs: usize,
    pub workers: usize,
    /// Jobs completed by each worker.
    pub per_worker: Vec<usize>,
    pub duration: Duration,
}

impl PoolStats {
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.jobs as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Runs `work` over `jobs` on at most `workers` scoped threads.
///
/// Results are returned in job order. Workers pull from a shared queue, so
/// a slow job does not hold back the others.
pub fn run_jobs<J, T, F>(jobs: Vec<J>, workers: usize, work: F) -> Result<(Vec<T>, PoolStats)>
where
    J: Send,
    T: Send,
    F: Fn(J) -> T + Sync,
{
    let started = Instant::now();
    let total = jobs.len();
    let worker_count = workers.max(1).min(total.max(1));
    let queue = Mutex::new(jobs.into_iter().enumerate());
    let (tx, rx) = mpsc::channel::<(usize, T)>();

    let per_worker = thread::scope(|scope| -> Result<Vec<usize>> {
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let tx = tx.clone();
            let queue = &queue;
            let work = &work;
            let handle = thread::Builder::new()
                .name(format!("efd-worker-{worker_id}"))
                .spawn_scoped(scope, move || {
                    let mut done = 0;
                    loop {
                        let next = match queue.lock() {
                            Ok(mut jobs) => jobs.next(),
                            Err(poisoned) => poisoned.into_inner().next(),
                        };
                        let Some((slot, job)) = next else {
                            break;
                        };
                        if tx.send((slot, work(job))).is_err() {
                            break;
                        }
                        done += 1;
                    }
                    done
                })?;
            handles.push(handle);
        }
        drop(tx);

        let mut per_worker = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.join() {
                Ok(done) => per_worker.push(done),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        Ok(per_worker)
    })?;

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    for (slot, value) in rx {
        slots[slot] = Some(value);
    }
    let results: Vec<T> = slots.into_iter().flatten().collect();

    let stats = PoolStats {
        jobs: total,
        workers: worker_count,
        per_worker,
        duration: started.elapsed(),
    };
    log::info!(
        "ran {} jobs on {} workers in {:?} ({:.1} jobs/s)",
        stats.jobs,
        stats.workers,
        stats.duration,
        stats.throughput()
    );
    Ok((results, stats))
}
