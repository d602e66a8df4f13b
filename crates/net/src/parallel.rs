//! # Parallel Layer - One Worker per Unit
//!
//! A feed-forward layer whose cells each live in their own tokio task.
//! The layer fans a command out to every worker and fans the replies back in:
//!
//! ```text
//!            ┌──────────┐
//!    x ──┬───│ worker 0 │───┐
//!        │   └──────────┘   │    concat (forward)
//!        │   ┌──────────┐   ├─── or
//!        └───│ worker 1 │───┘    sum    (backward)
//!            └──────────┘
//! ```
//!
//! ## Ordering
//!
//! - Each worker owns its cell outright; no weights are shared between tasks.
//! - Each worker drains its command channel in FIFO order, so a forward is
//!   always answered before the next backward is read.
//! - `forward` and `backward` take `&mut self` and return only after exactly
//!   one reply per worker, so a new forward cannot be issued while the
//!   previous call is still collecting.

use bptt_core::{CoreError, Result, Vector};
use bptt_diff::{Cell, Meta, Weights};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::snapshot::Snapshot;

/// Commands buffered per worker.
const COMMAND_BUFFER: usize = 4;

enum Command {
    Forward(Vector, oneshot::Sender<Result<Vector>>),
    Backward(Vector, oneshot::Sender<Result<Vector>>),
    Weights(oneshot::Sender<(Meta, Option<Weights>)>),
}

struct Worker {
    meta: Meta,
    output_dim: usize,
    commands: mpsc::Sender<Command>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn(mut cell: Box<dyn Cell>) -> Self {
        let meta = cell.meta().clone();
        let output_dim = cell.output_dim();
        let (tx, mut rx) = mpsc::channel::<Command>(COMMAND_BUFFER);

        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                // a dropped reply receiver only means the caller gave up
                match command {
                    Command::Forward(x, reply) => {
                        let _ = reply.send(cell.forward(&x));
                    }
                    Command::Backward(e, reply) => {
                        let _ = reply.send(cell.backward(&e));
                    }
                    Command::Weights(reply) => {
                        let _ = reply.send((cell.meta().clone(), cell.weights().cloned()));
                    }
                }
            }
            trace!(unit = %cell.meta(), "worker stopped");
        });

        Self {
            meta,
            output_dim,
            commands: tx,
            handle,
        }
    }

    fn stopped(&self) -> CoreError {
        CoreError::WorkerStopped {
            unit: self.meta.to_string(),
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| self.stopped())
    }
}

pub struct ParallelLayer {
    workers: Vec<Worker>,
    input_dim: usize,
    output_dim: usize,
}

impl ParallelLayer {
    /// Move every cell into its own task. Must be called inside a tokio runtime.
    pub fn spawn(cells: Vec<Box<dyn Cell>>) -> Result<Self> {
        let input_dim = cells
            .first()
            .map(|c| c.input_dim())
            .ok_or_else(|| CoreError::config("a parallel layer needs at least one cell"))?;
        if let Some(cell) = cells.iter().find(|c| c.input_dim() != input_dim) {
            return Err(CoreError::vector_mismatch(
                "parallel layer",
                input_dim,
                cell.input_dim(),
            ));
        }
        let output_dim = cells.iter().map(|c| c.output_dim()).sum();
        let workers: Vec<Worker> = cells.into_iter().map(Worker::spawn).collect();
        debug!(workers = workers.len(), "parallel layer spawned");

        Ok(Self {
            workers,
            input_dim,
            output_dim,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Broadcast `x` to every worker and concatenate the outputs in unit order.
    pub async fn forward(&mut self, x: &Vector) -> Result<Vector> {
        x.expect_len("parallel forward", self.input_dim)?;

        let mut replies = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            let (tx, rx) = oneshot::channel();
            worker.send(Command::Forward(x.clone(), tx)).await?;
            replies.push(rx);
        }

        let mut out = Vec::with_capacity(self.output_dim);
        for (worker, rx) in self.workers.iter().zip(replies) {
            let y = rx.await.map_err(|_| worker.stopped())??;
            out.extend_from_slice(y.as_slice());
        }
        Ok(Vector::from(out))
    }

    /// Send each worker its slice of `error` and sum the propagated errors.
    pub async fn backward(&mut self, error: &Vector) -> Result<Vector> {
        error.expect_len("parallel backward", self.output_dim)?;

        let mut replies = Vec::with_capacity(self.workers.len());
        let mut offset = 0;
        for worker in &self.workers {
            let slice = Vector::from(&error.as_slice()[offset..offset + worker.output_dim]);
            offset += worker.output_dim;
            let (tx, rx) = oneshot::channel();
            worker.send(Command::Backward(slice, tx)).await?;
            replies.push(rx);
        }

        let mut combined = Vector::zeros(self.input_dim);
        for (worker, rx) in self.workers.iter().zip(replies) {
            let propagated = rx.await.map_err(|_| worker.stopped())??;
            combined.add_assign(&propagated)?;
        }
        Ok(combined)
    }

    /// Collect every worker's current weights.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let mut snap = Snapshot::new();
        for worker in &self.workers {
            let (tx, rx) = oneshot::channel();
            worker.send(Command::Weights(tx)).await?;
            let (meta, weights) = rx.await.map_err(|_| worker.stopped())?;
            if let Some(weights) = weights {
                snap.insert(meta, weights);
            }
        }
        Ok(snap)
    }

    /// Close every command channel and wait for the workers to exit.
    pub async fn shutdown(self) -> Result<()> {
        for worker in self.workers {
            let Worker {
                meta,
                commands,
                handle,
                ..
            } = worker;
            drop(commands);
            handle.await.map_err(|_| CoreError::WorkerStopped {
                unit: meta.to_string(),
            })?;
        }
        Ok(())
    }
}
