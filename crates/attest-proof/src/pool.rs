//! Bounded prover pool. Proof generation is CPU bound and runs on the
//! blocking thread pool; callers hold a [`ProofHandle`] per job.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use attest_core::{CircuitId, PublicInputs, ZkProof};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::engine::ProofEngine;
use crate::error::ProofError;
use crate::witness::Witness;

struct ProofJob {
    circuit_id: CircuitId,
    witness: Witness,
    public_inputs: PublicInputs,
    cancelled: Arc<AtomicBool>,
    reply: oneshot::Sender<Result<ZkProof, ProofError>>,
}

/// Raises the job's cancel flag when dropped, unless disarmed first.
struct CancelOnDrop {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::Release);
        }
    }
}

/// Pending result of a submitted job. Dropping it, or giving up on
/// [`ProofHandle::wait`], cancels the job: a queued job is skipped and a
/// running one stops at its next constraint.
pub struct ProofHandle {
    reply: oneshot::Receiver<Result<ZkProof, ProofError>>,
    cancel: CancelOnDrop,
}

impl ProofHandle {
    fn new(reply: oneshot::Receiver<Result<ZkProof, ProofError>>, flag: Arc<AtomicBool>) -> Self {
        Self {
            reply,
            cancel: CancelOnDrop { flag, armed: true },
        }
    }

    /// Wait for the proof with no deadline.
    pub async fn wait(self) -> Result<ZkProof, ProofError> {
        let Self { reply, cancel } = self;
        let result = reply.await;
        cancel.disarm();
        result.map_err(|_| ProofError::Cancelled)?
    }

    /// Wait at most `timeout`; giving up cancels the job.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<ZkProof, ProofError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ProofError::Timeout)?
    }

    /// Abandon the job. A worker that already started it stops at the next constraint.
    pub fn cancel(self) {
        let Self { mut reply, cancel } = self;
        drop(cancel);
        reply.close();
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    completed: AtomicU64,
    skipped: AtomicU64,
    interrupted: AtomicU64,
}

/// Counters since the pool started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub completed: u64,
    /// Jobs dropped because their caller went away first.
    pub skipped: u64,
    /// Jobs abandoned part way through proving.
    pub interrupted: u64,
}

/// Fixed set of blocking workers fed from a bounded queue.
pub struct ProofWorkerPool {
    sender: mpsc::Sender<ProofJob>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<PoolCounters>,
}

impl ProofWorkerPool {
    /// Spawn `workers` workers sharing a queue of `queue_capacity` jobs.
    /// Must be called from within a Tokio runtime.
    pub fn new(engine: Arc<ProofEngine>, workers: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(PoolCounters::default());
        let workers = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&engine),
                    Arc::clone(&receiver),
                    Arc::clone(&counters),
                ))
            })
            .collect();
        Self {
            sender,
            workers,
            counters,
        }
    }

    fn job(
        circuit_id: CircuitId,
        witness: Witness,
        public_inputs: PublicInputs,
    ) -> (ProofJob, ProofHandle) {
        let (reply, receiver) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            ProofJob {
                circuit_id,
                witness,
                public_inputs,
                cancelled: Arc::clone(&cancelled),
                reply,
            },
            ProofHandle::new(receiver, cancelled),
        )
    }

    /// Queue a job, waiting for room.
    pub async fn submit(
        &self,
        circuit_id: CircuitId,
        witness: Witness,
        public_inputs: PublicInputs,
    ) -> Result<ProofHandle, ProofError> {
        let (job, handle) = Self::job(circuit_id, witness, public_inputs);
        self.sender.send(job).await.map_err(|_| ProofError::PoolClosed)?;
        Ok(handle)
    }

    /// Queue a job or fail with `QueueFull` right away.
    pub fn try_submit(
        &self,
        circuit_id: CircuitId,
        witness: Witness,
        public_inputs: PublicInputs,
    ) -> Result<ProofHandle, ProofError> {
        let (job, handle) = Self::job(circuit_id, witness, public_inputs);
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ProofError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ProofError::PoolClosed,
        })?;
        Ok(handle)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            interrupted: self.counters.interrupted.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting jobs, drain the queue and wait for the workers.
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "proof worker panicked");
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    engine: Arc<ProofEngine>,
    receiver: Arc<Mutex<mpsc::Receiver<ProofJob>>>,
    counters: Arc<PoolCounters>,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(ProofJob {
            circuit_id,
            witness,
            public_inputs,
            cancelled,
            reply,
        }) = job
        else {
            break;
        };

        if reply.is_closed() || cancelled.load(Ordering::Acquire) {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(worker, circuit = %circuit_id, "caller gone, skipping proof job");
            continue;
        }

        let engine = Arc::clone(&engine);
        let result = tokio::task::spawn_blocking(move || {
            engine.generate_proof_until(&circuit_id, &witness, &public_inputs, &cancelled)
        })
        .await
        .unwrap_or_else(|e| Err(ProofError::Internal(format!("prover task failed: {}", e))));

        if matches!(result, Err(ProofError::Cancelled)) {
            counters.interrupted.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(worker, "proof job cancelled while proving");
            continue;
        }
        counters.completed.fetch_add(1, Ordering::Relaxed);
        // The caller may have given up while we were proving.
        let _ = reply.send(result);
    }
    tracing::debug!(worker, "proof worker stopped");
}
