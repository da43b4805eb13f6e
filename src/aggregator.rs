//! The single sink at the end of the pipeline. It owns the running total
//! outright, so there is exactly one of it per run.

use crate::error::{PipelineError, Result};
use crate::stage::StageState;
use crate::wordcount::Count;
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::io::Write;
use tracing::debug;

/// Final state of an aggregator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// sum of every count received
    pub total: usize,
    /// number of count messages received
    pub received: usize,
}

#[derive(Default)]
pub struct Aggregator<'w> {
    tally: Tally,
    echo: Option<&'w mut (dyn Write + Send)>,
}

impl<'w> Aggregator<'w> {
    /// An aggregator that only sums.
    pub fn new() -> Aggregator<'w> {
        Aggregator {
            tally: Tally::default(),
            echo: None,
        }
    }

    /// An aggregator that also writes every count as it arrives and the
    /// total at the end.
    pub fn echoing(out: &'w mut (dyn Write + Send)) -> Aggregator<'w> {
        Aggregator {
            tally: Tally::default(),
            echo: Some(out),
        }
    }

    pub fn absorb(&mut self, count: Count) -> Result<()> {
        self.tally.total += count;
        self.tally.received += 1;
        if let Some(out) = &mut self.echo {
            writeln!(out, "{} ", count).map_err(PipelineError::Output)?;
        }
        Ok(())
    }

    /// Writes the total (when echoing) and hands back the tally. Only call
    /// this once the run is known to have succeeded.
    pub fn finish(self) -> Result<Tally> {
        if let Some(out) = self.echo {
            writeln!(out, "Total WC: {}", self.tally.total).map_err(PipelineError::Output)?;
            out.flush().map_err(PipelineError::Output)?;
        }
        Ok(self.tally)
    }

    /// Consume counts until `input` is closed and drained. The total is not
    /// written here; see [`Aggregator::finish`].
    pub fn drain(mut self, input: Receiver<Count>) -> Result<Aggregator<'w>> {
        debug!(stage = "aggregator", state = %StageState::Running);
        for count in input.iter() {
            self.absorb(count)?;
        }
        debug!(
            stage = "aggregator",
            received = self.tally.received,
            state = %StageState::Done
        );
        Ok(self)
    }
}
