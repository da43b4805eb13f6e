//! How a finished run is shown to the user.

use crate::error::{PipelineError, Result};
use crate::pipeline::Outcome;
use crate::wordcount::{self, Frequencies};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// `\t<count> <file name>`, like `wc -w`
    Summary,
    /// every per-line count as it arrives, then `Total WC: <sum>`
    Trace,
    /// one JSON object describing the run
    Json,
    /// `<count>\t<word>` for every distinct word, most common first
    Frequencies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Pipeline,
    Sequential,
}

impl Engine {
    /// Trace for the pipeline, the `wc` style summary for the baseline.
    pub fn default_output(self) -> OutputMode {
        match self {
            Engine::Pipeline => OutputMode::Trace,
            Engine::Sequential => OutputMode::Summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub path: String,
    pub name: String,
    pub engine: Engine,
    pub total: usize,
    pub lines: usize,
    pub counts_received: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mappers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reducers: Option<usize>,
}

impl Report {
    pub fn new(path: &Path, engine: Engine, outcome: &Outcome) -> Report {
        let replicas = |stage: &str| {
            outcome
                .stages
                .iter()
                .find(|s| s.name == stage)
                .map(|s| s.replicas())
        };
        Report {
            path: path.display().to_string(),
            name: base_name(path),
            engine,
            total: outcome.tally.total,
            lines: outcome.lines,
            counts_received: outcome.tally.received,
            mappers: replicas("mapper"),
            reducers: replicas("reducer"),
        }
    }

    /// Writes whatever `mode` still owes once the run is over. Trace output
    /// is written while the run is in progress, so nothing is left for it;
    /// a frequency run is written with [`write_frequencies`] instead.
    pub fn render<W: Write>(&self, mode: OutputMode, out: &mut W) -> Result<()> {
        match mode {
            OutputMode::Summary => {
                writeln!(out, "\t{} {}", self.total, self.name).map_err(PipelineError::Output)?
            }
            OutputMode::Trace | OutputMode::Frequencies => {}
            OutputMode::Json => {
                serde_json::to_writer_pretty(&mut *out, self)
                    .map_err(|e| PipelineError::Output(e.into()))?;
                writeln!(out).map_err(PipelineError::Output)?;
            }
        }
        out.flush().map_err(PipelineError::Output)
    }
}

pub fn write_frequencies<W: Write>(table: &Frequencies, out: &mut W) -> Result<()> {
    for (word, n) in wordcount::ranked(table) {
        writeln!(out, "{}\t{}", n, word).map_err(PipelineError::Output)?;
    }
    out.flush().map_err(PipelineError::Output)
}

/// Last element of `path`, or the path itself when it has none.
pub fn base_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}
