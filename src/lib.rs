//! Word counting as a staged concurrent pipeline.
//!
//! Lines from a file are fanned out to a pool of mappers, which split them
//! into words; the word lists go to a pool of reducers, which count them;
//! the counts go to one aggregator, which sums them. Each stage closes its
//! output channel only after all of its workers have exited.
//!
//! [`count_words`] is the single-threaded scan every pipeline run must agree with.

pub mod aggregator;
pub mod baseline;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod stage;
pub mod wordcount;

#[cfg(test)]
mod test_utils;

pub use aggregator::{Aggregator, Tally};
pub use baseline::{count_words, word_frequencies};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{frequencies_sequential, run_sequential, Outcome, Pipeline};
pub use report::{Engine, OutputMode, Report};
pub use source::LineSource;
pub use wordcount::{Count, Frequencies, Line, TokenList};
