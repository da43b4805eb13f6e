//! Reads the input and yields it one line at a time.
//! The line terminator (`\n` or `\r\n`) is stripped; a missing newline at
//! the end of the input still yields the last line. Lines are read as bytes
//! and decoded lossily, so text in a legacy encoding is still split into
//! words; only a failing reader is an error.

use crate::error::{PipelineError, Result};
use crate::wordcount::Line;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub struct LineSource<B: BufRead> {
    reader: B,
    buf: Vec<u8>,
    produced: usize,
}

impl LineSource<BufReader<fs::File>> {
    /// Opens `path` for reading. The file is closed when the source is dropped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LineSource<BufReader<fs::File>>> {
        let path = path.as_ref();
        fs::File::open(path)
            .map(|f| LineSource::new(BufReader::new(f)))
            .map_err(|e| PipelineError::open(path, e))
    }
}

impl<B: BufRead> LineSource<B> {
    pub fn new(reader: B) -> LineSource<B> {
        LineSource {
            reader,
            buf: Vec::new(),
            produced: 0,
        }
    }

    /// How many lines have been handed out so far.
    pub fn produced(&self) -> usize {
        self.produced
    }
}

impl<B: BufRead> Iterator for LineSource<B> {
    type Item = Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                self.produced += 1;
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(source) => Some(Err(PipelineError::Read {
                line: self.produced,
                source,
            })),
        }
    }
}
