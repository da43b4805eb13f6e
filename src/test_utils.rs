//! src/test_utils.rs
use std::io::{self, Read};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A reader whose device has gone away.
pub struct Broken;

impl Read for Broken {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "device gone"))
    }
}

/// Wraps a reader and remembers when it first reported end of input.
pub struct EofClock<R> {
    inner: R,
    eof: Arc<Mutex<Option<Instant>>>,
}

impl<R> EofClock<R> {
    pub fn new(inner: R) -> (EofClock<R>, Arc<Mutex<Option<Instant>>>) {
        let eof = Arc::new(Mutex::new(None));
        (
            EofClock {
                inner,
                eof: eof.clone(),
            },
            eof,
        )
    }
}

impl<R: Read> Read for EofClock<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof.lock().unwrap().get_or_insert_with(Instant::now);
        }
        Ok(n)
    }
}
