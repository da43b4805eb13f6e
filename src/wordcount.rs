//! The map and reduce functions handed to the pipeline stages.

use std::collections::BTreeMap;

/// One record from the input.
pub type Line = String;

/// The words of one line, in order.
pub type TokenList = Vec<String>;

/// Number of words in one line.
pub type Count = usize;

/// How often each distinct word occurs.
pub type Frequencies = BTreeMap<String, usize>;

// split on runs of whitespace, same as `wc -w`
pub fn map(line: Line) -> TokenList {
    line.split_whitespace().map(str::to_owned).collect()
}

pub fn reduce(tokens: TokenList) -> Count {
    tokens.len()
}

/// Reduce for the word-frequency run: occurrences per word in one line.
pub fn tally_words(tokens: TokenList) -> Frequencies {
    let mut table = Frequencies::new();
    for token in tokens {
        *table.entry(token).or_insert(0) += 1;
    }
    table
}

pub fn merge(into: &mut Frequencies, from: Frequencies) {
    for (word, n) in from {
        *into.entry(word).or_insert(0) += n;
    }
}

/// Words ordered most common first, ties broken alphabetically.
pub fn ranked(table: &Frequencies) -> Vec<(&str, usize)> {
    let mut ranked: Vec<(&str, usize)> = table.iter().map(|(w, n)| (w.as_str(), *n)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}
