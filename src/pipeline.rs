//! Wiring the stages together and driving a run.

use crate::aggregator::{Aggregator, Tally};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::source::LineSource;
use crate::stage::{join_stage, spawn_stage, StagePlan, StageReport};
use crate::wordcount::{self, Frequencies, Line, TokenList};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{BufRead, Write};
use std::path::Path;
use std::thread;
use tracing::{info, warn};

/// What a finished run produced. `tally` is a [`Tally`] for a word count
/// and a [`Frequencies`] table for a word-frequency run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T = Tally> {
    pub tally: T,
    /// lines read from the input
    pub lines: usize,
    /// mapper then reducer; empty for a sequential run
    pub stages: Vec<StageReport>,
}

/// Runs the staged word count:
///
/// ```text
/// source --lines--> mapper x N --token lists--> reducer x N --counts--> aggregator
/// ```
///
/// All three channels hold at most `config.capacity` items, so with the
/// default of 0 a stalled aggregator stalls every stage back to the source.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Pipeline> {
        config.validate()?;
        Ok(Pipeline { config })
    }

    pub fn run_file<P: AsRef<Path>>(&self, path: P) -> Result<Outcome> {
        self.count(LineSource::open(path)?, None)
    }

    /// Like [`Pipeline::run_file`], writing each count to `out` as the
    /// aggregator receives it, and the total once the run has succeeded.
    pub fn run_file_traced<P: AsRef<Path>>(
        &self,
        path: P,
        out: &mut (dyn Write + Send),
    ) -> Result<Outcome> {
        self.count(LineSource::open(path)?, Some(out))
    }

    pub fn run_reader<R: BufRead>(&self, reader: R) -> Result<Outcome> {
        self.count(LineSource::new(reader), None)
    }

    pub fn run_reader_traced<R: BufRead>(
        &self,
        reader: R,
        out: &mut (dyn Write + Send),
    ) -> Result<Outcome> {
        self.count(LineSource::new(reader), Some(out))
    }

    /// Counts occurrences of every word, with the reducers building
    /// per-line tables and the last stage merging them.
    pub fn frequencies_file<P: AsRef<Path>>(&self, path: P) -> Result<Outcome<Frequencies>> {
        self.frequencies(LineSource::open(path)?)
    }

    pub fn frequencies_reader<R: BufRead>(&self, reader: R) -> Result<Outcome<Frequencies>> {
        self.frequencies(LineSource::new(reader))
    }

    fn count<B: BufRead>(
        &self,
        source: LineSource<B>,
        echo: Option<&mut (dyn Write + Send)>,
    ) -> Result<Outcome> {
        let drained = self.run_stages(source, wordcount::reduce, move |counts| {
            let aggregator = match echo {
                Some(out) => Aggregator::echoing(out),
                None => Aggregator::new(),
            };
            aggregator.drain(counts)
        })?;

        // every stage and the source finished cleanly; only now is there a total
        let outcome = Outcome {
            tally: drained.tally.finish()?,
            lines: drained.lines,
            stages: drained.stages,
        };
        info!(
            lines = outcome.lines,
            total = outcome.tally.total,
            "pipeline finished"
        );
        Ok(outcome)
    }

    fn frequencies<B: BufRead>(&self, source: LineSource<B>) -> Result<Outcome<Frequencies>> {
        let outcome = self.run_stages(source, wordcount::tally_words, |tables| {
            let mut merged = Frequencies::new();
            for table in tables.iter() {
                wordcount::merge(&mut merged, table);
            }
            Ok(merged)
        })?;
        info!(
            lines = outcome.lines,
            distinct = outcome.tally.len(),
            "pipeline finished"
        );
        Ok(outcome)
    }

    /// Wires source, mappers, reducers (running `reduce`) and a single `sink`
    /// thread together, feeds the source from the calling thread and joins
    /// everything. A read error wins over any stage error.
    fn run_stages<B, R, T, S>(
        &self,
        mut source: LineSource<B>,
        reduce: fn(TokenList) -> R,
        sink: S,
    ) -> Result<Outcome<T>>
    where
        B: BufRead,
        R: Send,
        T: Send,
        S: FnOnce(Receiver<R>) -> Result<T> + Send,
    {
        let config = &self.config;
        info!(
            mappers = config.mappers,
            reducers = config.reducers,
            capacity = config.capacity,
            "starting pipeline"
        );

        let (line_tx, line_rx) = bounded::<Line>(config.capacity);
        let (token_tx, token_rx) = bounded::<TokenList>(config.capacity);
        let (reduced_tx, reduced_rx) = bounded::<R>(config.capacity);

        thread::scope(|scope| {
            // downstream first, so every stage has a consumer before its
            // producer starts sending
            let collector = thread::Builder::new()
                .name("aggregator".to_string())
                .spawn_scoped(scope, move || sink(reduced_rx))
                .map_err(|source| PipelineError::Spawn {
                    stage: "aggregator",
                    source,
                })?;

            let reducers = spawn_stage(
                scope,
                StagePlan::new("reducer", config.reducers).with_delay(config.worker_delay),
                token_rx,
                reduced_tx,
                reduce,
            )?;

            let mappers = spawn_stage(
                scope,
                StagePlan::new("mapper", config.mappers).with_delay(config.worker_delay),
                line_rx,
                token_tx,
                wordcount::map,
            )?;

            let fed = feed(&mut source, &line_tx);
            drop(line_tx);

            // join in pipeline order; each join returns after that stage
            // closed its output
            let mapped = join_stage("mapper", mappers);
            let reduced = join_stage("reducer", reducers);
            let sunk = collector.join().map_err(|_| PipelineError::WorkerPanicked {
                stage: "aggregator",
            })?;

            let lines = fed?;
            let stages = vec![mapped?, reduced?];
            Ok(Outcome {
                tally: sunk?,
                lines,
                stages,
            })
        })
    }
}

fn feed<B: BufRead>(source: &mut LineSource<B>, lines: &Sender<Line>) -> Result<usize> {
    for line in &mut *source {
        if lines.send(line?).is_err() {
            warn!("every mapper hung up, no more lines sent");
            break;
        }
    }
    Ok(source.produced())
}

/// The same map, reduce and aggregate steps run one after another on the
/// calling thread.
pub fn run_sequential<B: BufRead>(
    mut source: LineSource<B>,
    mut aggregator: Aggregator<'_>,
) -> Result<Outcome> {
    for line in &mut source {
        aggregator.absorb(wordcount::reduce(wordcount::map(line?)))?;
    }
    Ok(Outcome {
        tally: aggregator.finish()?,
        lines: source.produced(),
        stages: Vec::new(),
    })
}

/// Word frequencies on the calling thread.
pub fn frequencies_sequential<B: BufRead>(
    mut source: LineSource<B>,
) -> Result<Outcome<Frequencies>> {
    let mut merged = Frequencies::new();
    for line in &mut source {
        wordcount::merge(&mut merged, wordcount::tally_words(wordcount::map(line?)));
    }
    Ok(Outcome {
        tally: merged,
        lines: source.produced(),
        stages: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::{count_words, word_frequencies};
    use crate::test_utils::{Broken, EofClock};
    use std::io::{BufReader, Cursor, Read};
    use std::time::{Duration, Instant};

    const TEXT: &str = "The quick brown fox\n\njumps over   the lazy dog\n\t\n  tail words here";

    fn pipeline(mappers: usize, reducers: usize) -> Pipeline {
        Pipeline::new(
            PipelineConfig::new()
                .with_mappers(mappers)
                .with_reducers(reducers),
        )
        .unwrap()
    }

    #[test]
    fn matches_the_baseline() {
        let outcome = pipeline(2, 2).run_reader(Cursor::new(TEXT)).unwrap();
        assert_eq!(outcome.tally.total, count_words(Cursor::new(TEXT)).unwrap());
        assert_eq!(outcome.tally.total, 12);
        assert_eq!(outcome.lines, 5);
    }

    #[test]
    fn every_line_becomes_one_count() {
        let outcome = pipeline(2, 2).run_reader(Cursor::new(TEXT)).unwrap();
        assert_eq!(outcome.tally.received, 5);
        assert_eq!(outcome.stages.len(), 2);
        assert_eq!(outcome.stages[0].name, "mapper");
        assert_eq!(outcome.stages[0].processed(), 5);
        assert_eq!(outcome.stages[1].name, "reducer");
        assert_eq!(outcome.stages[1].processed(), 5);
    }

    #[test]
    fn empty_input_sends_no_counts() {
        let outcome = pipeline(2, 2).run_reader(Cursor::new("")).unwrap();
        assert_eq!(outcome.tally, Tally::default());
        assert_eq!(outcome.lines, 0);
    }

    #[test]
    fn single_line() {
        let mut out = Vec::new();
        let outcome = pipeline(2, 2)
            .run_reader_traced(Cursor::new("a b c"), &mut out)
            .unwrap();
        assert_eq!(outcome.tally, Tally { total: 3, received: 1 });
        assert_eq!(String::from_utf8(out).unwrap(), "3 \nTotal WC: 3\n");
    }

    #[test]
    fn blank_lines_count_zero() {
        let mut out = Vec::new();
        let outcome = pipeline(1, 1)
            .run_reader_traced(Cursor::new("\n\none\n\n"), &mut out)
            .unwrap();
        assert_eq!(outcome.tally, Tally { total: 1, received: 4 });

        let printed = String::from_utf8(out).unwrap();
        let mut counts: Vec<&str> = printed.lines().filter(|l| !l.starts_with("Total")).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec!["0 ", "0 ", "0 ", "1 "]);
        assert!(printed.ends_with("Total WC: 1\n"));
    }

    #[test]
    fn replica_count_does_not_change_total() {
        let text = TEXT.repeat(50);
        let expected = count_words(Cursor::new(&text)).unwrap();
        for n in [1, 2, 8] {
            let outcome = pipeline(n, n).run_reader(Cursor::new(&text)).unwrap();
            assert_eq!(outcome.tally.total, expected, "replicas = {}", n);
            assert_eq!(outcome.stages[0].replicas(), n);
        }
    }

    #[test]
    fn repeated_runs_agree() {
        let p = pipeline(2, 2);
        let first = p.run_reader(Cursor::new(TEXT)).unwrap();
        let second = p.run_reader(Cursor::new(TEXT)).unwrap();
        assert_eq!(first.tally, second.tally);
    }

    #[test]
    fn delayed_workers_and_buffers_finish_cleanly() {
        let text = TEXT.repeat(10);
        let expected = count_words(Cursor::new(&text)).unwrap();
        for capacity in [0, 1, 64] {
            let config = PipelineConfig::new()
                .with_mappers(3)
                .with_reducers(5)
                .with_capacity(capacity)
                .with_worker_delay(Duration::from_millis(1));
            let outcome = Pipeline::new(config)
                .unwrap()
                .run_reader(Cursor::new(&text))
                .unwrap();
            assert_eq!(outcome.tally.total, expected, "capacity = {}", capacity);
        }
    }

    #[test]
    fn read_failure_stops_the_run() {
        let reader = BufReader::new(Cursor::new("fine line\n").chain(Broken));
        let err = pipeline(2, 2).run_reader(reader).unwrap_err();
        assert!(matches!(err, PipelineError::Read { line: 1, .. }));
    }

    #[test]
    fn failed_run_prints_no_total() {
        let reader = BufReader::new(Cursor::new("a b c\nd e\n").chain(Broken));
        let mut out = Vec::new();
        let err = pipeline(2, 2)
            .run_reader_traced(reader, &mut out)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Read { line: 2, .. }));
        assert!(!String::from_utf8(out).unwrap().contains("Total WC"));
    }

    #[test]
    fn legacy_encoded_text_is_counted() {
        let latin1 = b"caf\xe9 au lait\nsecond line\n".to_vec();
        let outcome = pipeline(2, 2).run_reader(Cursor::new(latin1.clone())).unwrap();
        assert_eq!(outcome.tally.total, 5);
        assert_eq!(outcome.tally.total, count_words(Cursor::new(latin1)).unwrap());
    }

    #[test]
    fn slow_workers_hold_back_the_source() {
        let delay = Duration::from_millis(10);
        let lines = 20;
        let text = "some words here\n".repeat(lines);
        let (reader, eof) = EofClock::new(Cursor::new(text));
        let config = PipelineConfig::new()
            .with_mappers(1)
            .with_reducers(1)
            .with_worker_delay(delay);

        let started = Instant::now();
        let outcome = Pipeline::new(config)
            .unwrap()
            .run_reader(BufReader::new(reader))
            .unwrap();
        assert_eq!(outcome.tally.total, 3 * lines);

        // the last line can only be handed over once the single mapper has
        // slept through every line before it
        let reached_eof = *eof.lock().unwrap();
        let eof_after = reached_eof.expect("source reached end of input") - started;
        assert!(
            eof_after >= delay * (lines as u32 - 5),
            "source finished after {:?}",
            eof_after
        );
    }

    #[test]
    fn frequencies_match_the_baseline() {
        let text = TEXT.repeat(20);
        let expected = word_frequencies(Cursor::new(&text)).unwrap();
        for n in [1, 3] {
            let outcome = pipeline(n, n)
                .frequencies_reader(Cursor::new(&text))
                .unwrap();
            assert_eq!(outcome.tally, expected, "replicas = {}", n);
            assert_eq!(
                outcome.tally.values().sum::<usize>(),
                count_words(Cursor::new(&text)).unwrap()
            );
        }
    }

    #[test]
    fn frequencies_of_empty_input_are_empty() {
        let outcome = pipeline(2, 2).frequencies_reader(Cursor::new("")).unwrap();
        assert!(outcome.tally.is_empty());
        assert_eq!(outcome.lines, 0);
    }

    #[test]
    fn frequencies_sequential_agrees() {
        let outcome = frequencies_sequential(LineSource::new(Cursor::new(TEXT))).unwrap();
        assert_eq!(outcome.tally, word_frequencies(Cursor::new(TEXT)).unwrap());
        assert_eq!(outcome.tally["the"], 1);
        assert_eq!(outcome.tally["The"], 1);
        assert_eq!(outcome.lines, 5);
    }

    #[test]
    fn zero_mappers_is_refused() {
        let config = PipelineConfig::new().with_mappers(0);
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn run_file_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEXT.as_bytes()).unwrap();
        let outcome = pipeline(2, 2).run_file(file.path()).unwrap();
        assert_eq!(outcome.tally.total, 12);
    }

    #[test]
    fn sequential_matches_pipeline() {
        let mut out = Vec::new();
        let outcome =
            run_sequential(LineSource::new(Cursor::new(TEXT)), Aggregator::echoing(&mut out))
                .unwrap();
        assert_eq!(outcome.tally, Tally { total: 12, received: 5 });
        assert!(outcome.stages.is_empty());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "4 \n0 \n5 \n0 \n3 \nTotal WC: 12\n"
        );
    }
}
