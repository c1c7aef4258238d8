//! Serialized access to the shared console output.
//!
//! Every session prints through a cloned [`Console`] handle. The handle wraps
//! a single lock around the output device, so each line reaches the terminal
//! whole no matter how session tasks are scheduled.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

type Output = Box<dyn Write + Send>;

/// Shared, lock-protected console output.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Output>>,
}

impl Console {
    /// Console writing to the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Console writing to an arbitrary sink.
    pub fn new<W>(out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    /// Print one line.
    pub fn println(&self, line: impl Display) {
        let mut out = self.lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            warn!(error = %e, "Console write failed");
        }
    }

    /// Print a prompt without a trailing newline.
    pub fn prompt(&self, text: impl Display) {
        let mut out = self.lock();
        if let Err(e) = write!(out, "{text}").and_then(|_| out.flush()) {
            warn!(error = %e, "Console write failed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Output> {
        // A panic mid-print leaves the sink usable.
        self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// In-memory console sink for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl CaptureBuffer {
    pub(crate) fn console(&self) -> Console {
        Console::new(self.clone())
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
