//! Single-threaded word count, the reference the pipeline has to agree with.

use crate::error::Result;
use crate::source::LineSource;
use crate::wordcount::Frequencies;
use std::io::BufRead;

/// Sums the number of whitespace-separated words on every line of `input`.
pub fn count_words<R: BufRead>(input: R) -> Result<usize> {
    let mut count = 0;
    for line in LineSource::new(input) {
        count += line?.split_whitespace().count();
    }
    Ok(count)
}

/// Occurrences of each whitespace-separated word, case-sensitive.
pub fn word_frequencies<R: BufRead>(input: R) -> Result<Frequencies> {
    let mut table = Frequencies::new();
    for line in LineSource::new(input) {
        for word in line?.split_whitespace() {
            *table.entry(word.to_owned()).or_insert(0) += 1;
        }
    }
    Ok(table)
}
