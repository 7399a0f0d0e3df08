use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Shared console sink.
///
/// Transient lines are written without a terminator and get overwritten by
/// whatever comes next; permanent lines end with `\n` and stay. All writers
/// go through one lock, so a permanent line never lands on top of a
/// half-erased transient one.
#[derive(Debug)]
pub struct Reporter<W: Write = io::Stdout> {
    inner: Mutex<LineState<W>>,
}

#[derive(Debug)]
struct LineState<W> {
    out: W,
    last_line_len: usize,
    last_line_transient: bool,
}

impl Reporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            inner: Mutex::new(LineState {
                out,
                last_line_len: 0,
                last_line_transient: false,
            }),
        }
    }

    /// Render `text` as an overwritable status line.
    pub fn write_transient(&self, text: &str) -> io::Result<()> {
        let mut state = self.lock();
        state.erase_for(text)?;
        write!(state.out, "\r{text}")?;
        state.out.flush()?;
        state.last_line_len = text.chars().count();
        state.last_line_transient = true;
        Ok(())
    }

    /// Render `text` as a finished line.
    pub fn write_permanent(&self, text: &str) -> io::Result<()> {
        let mut state = self.lock();
        state.erase_for(text)?;
        writeln!(state.out, "\r{text}")?;
        state.out.flush()?;
        state.last_line_len = 0;
        state.last_line_transient = false;
        Ok(())
    }

    /// Terminate a dangling transient line. Safe to call more than once.
    pub fn finish(&self) -> io::Result<()> {
        let mut state = self.lock();
        if state.last_line_transient {
            writeln!(state.out)?;
            state.out.flush()?;
            state.last_line_transient = false;
            state.last_line_len = 0;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, LineState<W>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write> LineState<W> {
    /// Blank out a previous transient line that is longer than `next`.
    fn erase_for(&mut self, next: &str) -> io::Result<()> {
        if !self.last_line_transient {
            return Ok(());
        }
        let pad = self.last_line_len.saturating_sub(next.chars().count());
        if pad == 0 {
            return Ok(());
        }
        write!(self.out, "\r{:width$}", "", width = self.last_line_len)
    }
}

impl<W: Write> Drop for Reporter<W> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
