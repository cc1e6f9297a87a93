//! Worker Pool (C10).
//!
//! N persistent threads, each with its own `MixbinFrame` scratch area,
//! pull (voice, list) work items off a shared queue and process them
//! through the Voice Processor. The frame driver hands a batch of work to
//! the pool once per sub-frame and blocks on a completion channel until
//! every worker reports done, then sums the per-worker scratch frames into
//! the frame's master mixbins in worker order (deterministic, since float
//! addition is not associative).
//!
//! Grouping: while building a batch the frame driver keeps a multipass
//! source and its following MP readers on the same worker (never splits
//! them across the round-robin), since a reader may observe the source's
//! mixbin contribution before a clear.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};

use crate::logger::{self, Severity};
use crate::mixbin::MixbinFrame;

/// One unit of dispatched work: a voice id plus which list it was enqueued
/// from (2D/3D/MP), and whether it is a multipass read that must run after
/// its source has been mixed this sub-frame.
#[derive(Debug, Clone, Copy)]
pub struct WorkItem {
    pub voice: u16,
    pub is_multipass: bool,
}

enum Job {
    Batch(Arc<Vec<WorkItem>>),
    Shutdown,
}

pub struct WorkerPool {
    job_txs: Vec<Sender<Job>>,
    done_rx: Receiver<(usize, MixbinFrame)>,
    handles: Vec<thread::JoinHandle<()>>,
}

/// Signature the frame driver supplies: process one work item into the
/// given per-worker scratch frame.
pub type ProcessFn = Arc<dyn Fn(WorkItem, &mut MixbinFrame) + Send + Sync>;

impl WorkerPool {
    /// Spawn `num_workers` threads (clamped to `[1, MAX_WORKERS]` by the
    /// caller), each running `process` over the work items it is handed.
    pub fn new(num_workers: usize, realtime_priority: bool, process: ProcessFn) -> Self {
        let num_workers = num_workers.max(1);
        let mut job_txs = Vec::with_capacity(num_workers);
        let (done_tx, done_rx) = bounded(num_workers * 2);
        let mut handles = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (job_tx, job_rx) = bounded::<Job>(4);
            job_txs.push(job_tx);
            let done_tx = done_tx.clone();
            let process = process.clone();

            let handle = thread::Builder::new()
                .name(format!("vp-worker-{worker_id}"))
                .spawn(move || {
                    if realtime_priority {
                        set_worker_priority(worker_id);
                    }
                    run_worker(worker_id, job_rx, done_tx, process);
                })
                .expect("failed to spawn voice processor worker thread");
            handles.push(handle);
        }

        Self { job_txs, done_rx, handles }
    }

    pub fn num_workers(&self) -> usize {
        self.job_txs.len()
    }

    /// Partition `items` round-robin across workers, keeping any run of
    /// multipass items contiguous with the preceding non-multipass item on
    /// the same worker (so a reader always lands with, or after, its
    /// source on one worker's scratch frame).
    fn partition(&self, items: &[WorkItem]) -> Vec<Vec<WorkItem>> {
        let n = self.num_workers();
        let mut buckets: Vec<Vec<WorkItem>> = vec![Vec::new(); n];
        let mut worker = 0usize;

        for item in items {
            buckets[worker].push(*item);
            if !item.is_multipass {
                worker = (worker + 1) % n;
            }
        }
        buckets
    }

    /// Dispatch one sub-frame's work, block for all workers, and return
    /// the summed result (deterministic worker-index order).
    pub fn run_batch(&self, items: &[WorkItem]) -> MixbinFrame {
        let batches = self.partition(items);
        let active = batches.iter().filter(|b| !b.is_empty()).count().max(1);

        for (tx, batch) in self.job_txs.iter().zip(batches.into_iter()) {
            let _ = tx.send(Job::Batch(Arc::new(batch)));
        }

        let mut results: Vec<Option<MixbinFrame>> = vec![None; self.job_txs.len()];
        for _ in 0..self.job_txs.len() {
            if let Ok((worker_id, frame)) = self.done_rx.recv() {
                results[worker_id] = Some(frame);
            }
        }
        let _ = active;

        let mut out = MixbinFrame::new();
        for frame in results.into_iter().flatten() {
            out.accumulate(&frame);
        }
        out
    }

    pub fn shutdown(self) {
        for tx in &self.job_txs {
            let _ = tx.send(Job::Shutdown);
        }
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn run_worker(
    worker_id: usize,
    job_rx: Receiver<Job>,
    done_tx: Sender<(usize, MixbinFrame)>,
    process: ProcessFn,
) {
    let mut scratch = MixbinFrame::new();
    while let Ok(job) = job_rx.recv() {
        match job {
            Job::Shutdown => break,
            Job::Batch(items) => {
                scratch.clear();
                for item in items.iter() {
                    process(*item, &mut scratch);
                }
                if done_tx.send((worker_id, scratch.clone())).is_err() {
                    break;
                }
            }
        }
    }
}

fn set_worker_priority(worker_id: usize) {
    match ThreadPriorityValue::try_from(50u8) {
        Ok(value) => {
            if let Err(e) = set_current_thread_priority(ThreadPriority::Crossplatform(value)) {
                logger::global().log(
                    Severity::Warn,
                    &format!("worker {worker_id}: failed to set realtime priority: {e:?}"),
                );
            }
        }
        Err(e) => {
            logger::global().log(Severity::Warn, &format!("worker {worker_id}: invalid priority value: {e:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn run_batch_sums_all_workers_contribution() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();
        let process: ProcessFn = Arc::new(move |item: WorkItem, frame: &mut MixbinFrame| {
            counter2.fetch_add(1, Ordering::SeqCst);
            frame.bins[0][0] += item.voice as f32;
        });

        let pool = WorkerPool::new(4, false, process);
        let items: Vec<WorkItem> = (0..8).map(|v| WorkItem { voice: v, is_multipass: false }).collect();
        let out = pool.run_batch(&items);

        let expected: f32 = (0..8).sum::<u16>() as f32;
        assert!((out.bins[0][0] - expected).abs() < 1e-3);
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        pool.shutdown();
    }

    #[test]
    fn partition_keeps_multipass_reader_with_preceding_source() {
        let process: ProcessFn = Arc::new(|_, _| {});
        let pool = WorkerPool::new(2, false, process);
        let items = vec![
            WorkItem { voice: 10, is_multipass: false },
            WorkItem { voice: 11, is_multipass: true },
            WorkItem { voice: 20, is_multipass: false },
        ];
        let batches = pool.partition(&items);
        assert!(batches[0].iter().any(|i| i.voice == 10));
        assert!(batches[0].iter().any(|i| i.voice == 11));
        pool.shutdown();
    }
}
