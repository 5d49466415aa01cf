//! Lazily materializes the source lines surrounding a ctags hit.
//!
//! Ctags reports one line number per symbol; callers want that line plus
//! a line of context before and after. Rather than splitting the whole
//! file into a `Vec<String>` up front, [`Liner`] scans forward through
//! the content exactly as far as it's been asked to and remembers what
//! it already read. Symbol hits come back from ctags in ascending line
//! order, so a single forward scan covers a whole file.

use std::collections::HashMap;
use std::io::{BufRead, Cursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinerError {
    NotExist,
    InvalidLineNumber,
    ScanFailed,
}

pub struct Liner {
    lines: HashMap<usize, String>,
    reader: Cursor<Vec<u8>>,
    line_number: usize,
    done: bool,
}

impl Liner {
    pub fn new(content: &[u8]) -> Self {
        Self {
            lines: HashMap::new(),
            reader: Cursor::new(content.to_vec()),
            line_number: 0,
            done: false,
        }
    }

    fn scan_one(&mut self) -> Option<String> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => None,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                Some(String::from_utf8_lossy(&buf).into_owned())
            }
            Err(_) => None,
        }
    }

    /// Only ever reads forward: each call scans at most up to line `n+1`
    /// past whatever has already been consumed, never rewinding.
    fn advance_to_line_number(&mut self, n: i64) {
        if self.done {
            return;
        }

        while (self.line_number as i64) < n - 2 {
            match self.scan_one() {
                Some(_) => self.line_number += 1,
                None => {
                    self.done = true;
                    return;
                }
            }
        }

        let mut ln = n - 2;
        while ln <= n {
            if ln <= self.line_number as i64 {
                ln += 1;
                continue;
            }
            if self.lines.contains_key(&(ln as usize)) {
                ln += 1;
                continue;
            }
            match self.scan_one() {
                Some(text) => {
                    self.line_number += 1;
                    self.lines.insert(self.line_number, text);
                }
                None => {
                    self.done = true;
                    return;
                }
            }
            ln += 1;
        }

        match self.scan_one() {
            Some(text) => {
                self.line_number += 1;
                self.lines.insert(self.line_number, text);
            }
            None => {
                self.done = true;
            }
        }
    }

    pub fn get_line(&mut self, n: i64) -> Result<String, LinerError> {
        if n <= 0 {
            return Err(LinerError::InvalidLineNumber);
        }
        self.advance_to_line_number(n);
        if n > self.line_number as i64 {
            return Err(LinerError::NotExist);
        }
        Ok(self.lines.get(&(n as usize)).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_and_last_line() {
        let mut liner = Liner::new(b"hello\nworld\nfoo\nbar");
        assert_eq!(liner.get_line(1).unwrap(), "hello");
        assert_eq!(liner.get_line(4).unwrap(), "bar");
    }

    #[test]
    fn line_past_eof_is_not_exist() {
        let mut liner = Liner::new(b"hello\nworld\nfoo\nbar");
        assert_eq!(liner.get_line(5), Err(LinerError::NotExist));
    }

    #[test]
    fn forward_only_scan_still_returns_earlier_requested_lines() {
        let mut liner = Liner::new(b"a\nb\nc\nd\ne\nf\n");
        assert_eq!(liner.get_line(5).unwrap(), "e");
        assert_eq!(liner.get_line(4).unwrap(), "d");
        assert_eq!(liner.get_line(3).unwrap(), "c");
    }

    #[test]
    fn zero_and_negative_line_numbers_are_rejected() {
        let mut liner = Liner::new(b"a\nb\n");
        assert_eq!(liner.get_line(0), Err(LinerError::InvalidLineNumber));
        assert_eq!(liner.get_line(-1), Err(LinerError::InvalidLineNumber));
    }
}
