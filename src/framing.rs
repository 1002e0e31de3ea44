//! Request/response framing for status services that answer a one-line
//! request with an s-expression document terminated by a blank line.
//!
//! This only moves text around; hand the frames to a `Parser`.

use std::io::{self, BufRead};

use tracing::trace;

/// The request line: `S` followed by CRLF.
pub const REQUEST: &[u8] = b"S\r\n";

pub fn write_request<W: io::Write>(mut w: W) -> io::Result<()> {
    w.write_all(REQUEST)?;
    w.flush()
}

/// Reads lines up to a blank line, or to end of input, and returns them
/// joined, line endings included. The blank line is consumed but not
/// returned.
pub fn read_response<R: BufRead>(mut reader: R) -> io::Result<String> {
    Ok(read_frame(&mut reader)?.unwrap_or_default())
}

// `None` if the input ended before any line was read.
fn read_frame<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut frame = String::new();
    let mut line = String::new();
    let mut read_any = false;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(read_any.then_some(frame));
        }
        read_any = true;

        if line.trim_end_matches(['\r', '\n']).is_empty() {
            trace!(bytes = frame.len(), "read response frame");
            return Ok(Some(frame));
        }
        frame.push_str(&line);
    }
}

/// Iterator over successive blank-line-terminated frames.
pub struct FrameReader<R> {
    reader: R,
    done: bool,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R) -> FrameReader<R> {
        FrameReader {
            reader,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<io::Result<String>> {
        if self.done {
            return None;
        }

        match read_frame(&mut self.reader) {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use crate::parser::parse;

    #[test]
    fn test_write_request() {
        let mut out = Vec::new();
        write_request(&mut out).unwrap();
        assert_eq!(out, b"S\r\n");
    }

    #[test]
    fn test_read_response() {
        let input = "(cpuinfo (user 1)\r\n (system 1))\r\n(avenrun (1))\r\n\r\n(next 2)\n";
        let mut reader = Cursor::new(input);

        let frame = read_response(&mut reader).unwrap();
        assert_eq!(frame, "(cpuinfo (user 1)\r\n (system 1))\r\n(avenrun (1))\r\n");
        assert_eq!(parse(&frame).unwrap().len(), 2);

        // No blank line before end of input.
        assert_eq!(read_response(&mut reader).unwrap(), "(next 2)\n");
        assert_eq!(read_response(&mut reader).unwrap(), "");
    }

    #[test]
    fn test_frame_reader() {
        let input = "(a 1)\n\n\n(b 2)\n(c 3)\n\n(d 4)";
        let frames: Vec<String> = FrameReader::new(Cursor::new(input))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(frames, vec!["(a 1)\n", "", "(b 2)\n(c 3)\n", "(d 4)"]);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut frames = FrameReader::new(Cursor::new(b"(a \xff)\n\n".to_vec()));
        let err = frames.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(frames.next().is_none());
    }
}
