//! Byte sinks shared by the subprocess-driving code in [`super::worker`].
//!
//! Each models a write callback over raw subprocess output, exactly as
//! described in spec §4.1.a-c: a progress writer that coarsens thousands
//! of `\r`-terminated lines into one observable string, a line writer that
//! accumulates complete lines for synchronous parsing, and a content
//! writer that bounds blob extraction to 256 KiB and sniffs binary data.

use std::sync::{Arc, Mutex};

const PLAIN_FILE_MAX_SIZE: usize = 256 * 1024;
const BINARY_SNIFF_WINDOW: usize = 1024;
const PROGRESS_LINE_INTERVAL: usize = 20;

/// Tokenizes subprocess output into lines delimited by `\r`, `\n`, or
/// `\r\n`, and publishes the most recent line every 20 lines.
///
/// This is what turns `git clone --progress`'s firehose of carriage-return
/// updates into a single coarse string a caller can poll.
pub struct ProgressWriter {
    count: usize,
    current_line: Vec<u8>,
    progress: Arc<Mutex<String>>,
}

impl ProgressWriter {
    pub fn new(progress: Arc<Mutex<String>>) -> Self {
        Self { count: 0, current_line: Vec::new(), progress }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        let mut i = 0;
        while i < chunk.len() {
            match chunk[i] {
                b'\r' => {
                    let skip_lf = chunk.get(i + 1) == Some(&b'\n');
                    self.end_line();
                    i += if skip_lf { 2 } else { 1 };
                }
                b'\n' => {
                    self.end_line();
                    i += 1;
                }
                b => {
                    self.current_line.push(b);
                    i += 1;
                }
            }
        }
    }

    fn end_line(&mut self) {
        self.count += 1;
        if self.count >= PROGRESS_LINE_INTERVAL {
            self.count = 0;
            let line = String::from_utf8_lossy(&self.current_line).into_owned();
            *self.progress.lock().unwrap() = line;
        }
        self.current_line.clear();
    }
}

/// Accumulates bytes into complete lines for synchronous parsing of
/// `git show-ref` / `git ls-tree` output. CRLF is collapsed to one line.
#[derive(Default)]
pub struct LineWriter {
    buf: Vec<u8>,
    pub lines: Vec<String>,
}

impl LineWriter {
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        let mut start = 0;
        while let Some(rel) = self.buf[start..].iter().position(|&b| b == b'\r' || b == b'\n') {
            let end = start + rel;
            let mut line_end = end;
            let mut next_start = end + 1;
            if self.buf[end] == b'\r' && self.buf.get(end + 1) == Some(&b'\n') {
                next_start = end + 2;
            }
            if self.buf[end] == b'\n' && end > start && self.buf[end - 1] == b'\r' {
                line_end = end - 1;
            }
            self.lines.push(String::from_utf8_lossy(&self.buf[start..line_end]).into_owned());
            start = next_start;
        }
        self.buf.drain(..start);
    }

    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

/// Buffered sink for `git show <hash>:<file>`. Detects binary content by
/// a NUL byte in the first 1024 bytes, or by exceeding 256 KiB total, and
/// signals the caller to cancel the subprocess in either case.
pub struct ContentWriter {
    buffer: Vec<u8>,
    checked: bool,
    binary: bool,
}

impl ContentWriter {
    pub fn new() -> Self {
        Self { buffer: Vec::new(), checked: false, binary: false }
    }

    /// Returns `true` once binary content has been detected, instructing
    /// the caller to cancel the producing subprocess. Further calls are
    /// no-ops (the subprocess should already be on its way out).
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        if self.binary {
            return true;
        }

        if !self.checked {
            let window = &chunk[..chunk.len().min(BINARY_SNIFF_WINDOW)];
            if window.contains(&0u8) {
                self.binary = true;
                return true;
            }
            self.checked = true;
        }

        if self.buffer.len() + chunk.len() > PLAIN_FILE_MAX_SIZE {
            self.binary = true;
            return true;
        }

        self.buffer.extend_from_slice(chunk);
        false
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

impl Default for ContentWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_writer_publishes_every_20_lines() {
        let progress = Arc::new(Mutex::new(String::new()));
        let mut writer = ProgressWriter::new(progress.clone());

        for i in 0..19 {
            writer.feed(format!("line {i}\r").as_bytes());
        }
        assert_eq!(&*progress.lock().unwrap(), "");

        writer.feed(b"line 19\r");
        assert_eq!(&*progress.lock().unwrap(), "line 19");
    }

    #[test]
    fn progress_writer_handles_crlf() {
        let progress = Arc::new(Mutex::new(String::new()));
        let mut writer = ProgressWriter::new(progress.clone());
        for i in 0..20 {
            writer.feed(format!("line {i}\r\n").as_bytes());
        }
        assert_eq!(&*progress.lock().unwrap(), "line 19");
    }

    #[test]
    fn line_writer_splits_on_any_newline_style() {
        let mut lw = LineWriter::default();
        lw.feed(b"hash1 refs/heads/main\nhash2 refs/tags/v1\r\nhash3 tail");
        assert_eq!(lw.lines, vec!["hash1 refs/heads/main", "hash2 refs/tags/v1"]);
        lw.feed(b"\n");
        assert_eq!(lw.take_lines(), vec!["hash1 refs/heads/main", "hash2 refs/tags/v1", "hash3 tail"]);
    }

    #[test]
    fn content_writer_detects_leading_nul() {
        let mut cw = ContentWriter::new();
        let cancel = cw.feed(&[0u8, 1, 2, 3]);
        assert!(cancel);
        assert!(cw.is_binary());
    }

    #[test]
    fn content_writer_detects_oversize() {
        let mut cw = ContentWriter::new();
        let chunk = vec![b'a'; 256 * 1024 + 1];
        let cancel = cw.feed(&chunk);
        assert!(cancel);
        assert!(cw.is_binary());
    }

    #[test]
    fn content_writer_keeps_plain_text() {
        let mut cw = ContentWriter::new();
        assert!(!cw.feed(b"hello world"));
        assert!(!cw.is_binary());
        assert_eq!(cw.into_string(), "hello world");
    }
}
