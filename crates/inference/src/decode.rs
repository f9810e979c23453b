//! Line-buffering decoder for newline-delimited streams.
//!
//! A chunk boundary may fall mid-line; only complete lines are released.
//! The total output is invariant under transport fragmentation: feeding the
//! same bytes one at a time or all at once yields the same lines.

/// Accumulates bytes and releases complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line completed by them.
    ///
    /// Lines are returned without their trailing newline; a trailing `\r`
    /// is stripped. Invalid UTF-8 is replaced lossily, matching how the
    /// endpoint contract treats the body as text.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut lines = Vec::new();
        while let Some(end) = self.buffer.find('\n') {
            let line = self.buffer[..end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=end);
            lines.push(line);
        }
        lines
    }

    /// Consume the buffer, returning any final unterminated line.
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }
}
