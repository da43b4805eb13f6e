//! Replicated pipeline stages.
//!
//! A stage is a supervisor thread plus `replicas` worker threads that all
//! pull from one shared input channel and push into one shared output
//! channel. Workers only borrow the output sender; the supervisor owns it
//! and drops it (closing the channel) once every worker has exited and been
//! joined.

use crate::error::{PipelineError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::sync::mpsc;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// input still open
    Running,
    /// input closed, replicas finishing what they hold
    Draining,
    /// every replica exited, output closed
    Done,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageState::Running => "running",
            StageState::Draining => "draining",
            StageState::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StagePlan {
    pub name: &'static str,
    pub replicas: usize,
    pub delay: Option<Duration>,
}

impl StagePlan {
    pub fn new(name: &'static str, replicas: usize) -> StagePlan {
        StagePlan {
            name,
            replicas,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Option<Duration>) -> StagePlan {
        self.delay = delay;
        self
    }
}

/// What a finished stage did. `per_worker[i]` is the number of items
/// replica `i` passed downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub name: &'static str,
    pub per_worker: Vec<usize>,
}

impl StageReport {
    fn new(name: &'static str, replicas: usize) -> StageReport {
        StageReport {
            name,
            per_worker: vec![0; replicas],
        }
    }

    pub fn replicas(&self) -> usize {
        self.per_worker.len()
    }

    pub fn processed(&self) -> usize {
        self.per_worker.iter().sum()
    }
}

struct WorkerExit {
    id: usize,
    processed: usize,
}

// Reports the worker's exit to the supervisor on drop, so a panicking
// worker still releases the barrier.
struct ExitSignal {
    id: usize,
    processed: usize,
    tx: mpsc::Sender<WorkerExit>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerExit {
            id: self.id,
            processed: self.processed,
        });
    }
}

/// Start a stage inside `scope`. The returned handle yields the stage's
/// report once its output channel has been closed.
pub fn spawn_stage<'scope, 'env, In, Out>(
    scope: &'scope Scope<'scope, 'env>,
    plan: StagePlan,
    input: Receiver<In>,
    output: Sender<Out>,
    f: fn(In) -> Out,
) -> Result<ScopedJoinHandle<'scope, Result<StageReport>>>
where
    In: Send + 'scope,
    Out: Send + 'scope,
{
    thread::Builder::new()
        .name(format!("{}-supervisor", plan.name))
        .spawn_scoped(scope, move || supervise(plan, input, output, f))
        .map_err(|source| PipelineError::Spawn {
            stage: plan.name,
            source,
        })
}

/// Wait for a stage started by [`spawn_stage`].
pub fn join_stage(
    name: &'static str,
    handle: ScopedJoinHandle<'_, Result<StageReport>>,
) -> Result<StageReport> {
    handle
        .join()
        .map_err(|_| PipelineError::WorkerPanicked { stage: name })?
}

fn supervise<In: Send, Out: Send>(
    plan: StagePlan,
    input: Receiver<In>,
    output: Sender<Out>,
    f: fn(In) -> Out,
) -> Result<StageReport> {
    let (exit_tx, exit_rx) = mpsc::channel();
    let mut report = StageReport::new(plan.name, plan.replicas);
    let mut panicked = false;
    let mut spawn_error = None;

    debug!(stage = plan.name, replicas = plan.replicas, state = %StageState::Running);

    thread::scope(|workers| {
        let mut handles = Vec::with_capacity(plan.replicas);
        for id in 0..plan.replicas {
            let input = input.clone();
            let output = &output;
            let exit = exit_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", plan.name, id))
                .spawn_scoped(workers, move || work(plan, id, input, output, f, exit));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    spawn_error = Some(PipelineError::Spawn {
                        stage: plan.name,
                        source,
                    });
                    break;
                }
            }
        }
        drop(exit_tx);

        // the barrier: one exit message per spawned worker
        let mut state = StageState::Running;
        for exit in exit_rx.iter() {
            if state == StageState::Running {
                state = StageState::Draining;
                debug!(stage = plan.name, worker = exit.id, state = %state);
            }
            report.per_worker[exit.id] = exit.processed;
        }

        for handle in handles {
            if handle.join().is_err() {
                panicked = true;
            }
        }
    });

    // all writers are joined, so closing is safe
    drop(output);
    debug!(
        stage = plan.name,
        processed = report.processed(),
        state = %StageState::Done
    );

    if let Some(err) = spawn_error {
        return Err(err);
    }
    if panicked {
        return Err(PipelineError::WorkerPanicked { stage: plan.name });
    }
    Ok(report)
}

fn work<In, Out>(
    plan: StagePlan,
    id: usize,
    input: Receiver<In>,
    output: &Sender<Out>,
    f: fn(In) -> Out,
    exit: mpsc::Sender<WorkerExit>,
) {
    let mut signal = ExitSignal {
        id,
        processed: 0,
        tx: exit,
    };

    for item in input.iter() {
        if let Some(delay) = plan.delay {
            thread::sleep(delay);
        }
        if output.send(f(item)).is_err() {
            warn!(stage = plan.name, worker = id, "downstream hung up, stopping");
            break;
        }
        signal.processed += 1;
        trace!(stage = plan.name, worker = id, processed = signal.processed);
    }
}
