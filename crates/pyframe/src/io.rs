//! Where `print()` output goes.

use std::io::Write;

/// Sink for the text the `print()` builtin produces.
///
/// The VM borrows one for a whole run. `print` hands it each argument's `str()`, then
/// separators and the terminator, in order, so concatenating every call gives the exact
/// program output.
pub trait PrintWriter {
    fn write_str(&mut self, text: &str);

    /// Separators and terminators are usually single characters.
    fn write_char(&mut self, c: char) {
        self.write_str(c.encode_utf8(&mut [0; 4]));
    }

    /// Called for `print(..., flush=True)`.
    fn flush(&mut self) {}
}

/// Writes to the process's stdout. Write errors are dropped, as `print!` would panic on them.
#[derive(Debug)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_str(&mut self, text: &str) {
        let _ = std::io::stdout().lock().write_all(text.as_bytes());
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().lock().flush();
    }
}

/// Collects output in memory.
///
/// ```
/// use pyframe::{CollectStringPrint, PrintWriter};
///
/// let mut out = CollectStringPrint::new();
/// out.write_str("a");
/// out.write_char('\n');
/// assert_eq!(out.output(), "a\n");
/// ```
#[derive(Debug, Default)]
pub struct CollectStringPrint {
    buffer: String,
}

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.buffer
    }

    #[must_use]
    pub fn into_output(self) -> String {
        self.buffer
    }
}

impl PrintWriter for CollectStringPrint {
    fn write_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    fn write_char(&mut self, c: char) {
        self.buffer.push(c);
    }
}

/// Discards output. Used by benchmarks.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write_str(&mut self, _text: &str) {}
}
