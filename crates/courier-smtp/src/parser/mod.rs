//! SMTP line reader and response parser.
//!
//! Bytes arrive from the transport in chunks of any size. [`LineReader`]
//! turns them into complete lines and [`ReplyAssembler`] groups lines into
//! replies:
//!
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};
use bytes::BytesMut;

/// Maximum length of a buffered partial line.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Splits `buffer` followed by `new_bytes` into complete lines.
///
/// Returns the lines without their terminators and the bytes of the
/// trailing incomplete line. Lines end in CRLF; a bare LF is accepted too.
#[must_use]
pub fn split_lines(buffer: &[u8], new_bytes: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut reader = LineReader::new();
    reader.buffer.extend_from_slice(buffer);
    let lines = reader.drain_lines(new_bytes);
    (lines, reader.buffer.to_vec())
}

/// Incremental line splitter over transport chunks.
#[derive(Debug, Default)]
pub struct LineReader {
    buffer: BytesMut,
}

impl LineReader {
    /// Creates an empty reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every line it completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the pending partial line grows beyond
    /// [`MAX_LINE_LENGTH`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        let lines = self.drain_lines(chunk);
        if self.buffer.len() > MAX_LINE_LENGTH {
            return Err(Error::Protocol {
                message: format!("Server line exceeds {MAX_LINE_LENGTH} bytes"),
                reply: None,
            });
        }
        Ok(lines)
    }

    /// Returns the number of buffered bytes not yet forming a line.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any partial line.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn drain_lines(&mut self, chunk: &[u8]) -> Vec<String> {
        // Resume the scan where the previous chunk ended
        let mut scanned = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[scanned..].iter().position(|&b| b == b'\n') {
            let end = scanned + offset;
            let line = self.buffer.split_to(end + 1);
            let content = line[..end].strip_suffix(b"\r").unwrap_or(&line[..end]);
            lines.push(String::from_utf8_lossy(content).into_owned());
            scanned = 0;
        }
        lines
    }
}

/// Collects reply lines until the final line of a reply.
#[derive(Debug, Default)]
pub struct ReplyAssembler {
    code: Option<ReplyCode>,
    lines: Vec<String>,
}

impl ReplyAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one line; returns the reply when `line` completes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not start with a three-digit code.
    pub fn push_line(&mut self, line: &str) -> Result<Option<Reply>> {
        let (code, is_last, text) = parse_line(line)?;
        let code = *self.code.get_or_insert(code);
        self.lines.push(text.to_string());

        if is_last {
            self.code = None;
            return Ok(Some(Reply::new(code, std::mem::take(&mut self.lines))));
        }
        Ok(None)
    }

    /// Returns true if part of a multi-line reply has been received.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.code.is_some()
    }
}

/// Parses an SMTP reply from complete response lines.
///
/// # Errors
///
/// Returns an error if the lines are empty, malformed, or do not end with a
/// final reply line.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let mut assembler = ReplyAssembler::new();
    for line in lines {
        if let Some(reply) = assembler.push_line(line)? {
            return Ok(reply);
        }
    }
    Err(Error::Protocol {
        message: "Incomplete reply".into(),
        reply: None,
    })
}

/// Checks if a line is the last line of a reply.
///
/// Continuation lines carry `-` after the code; the last line carries a
/// space or nothing at all.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() >= 3 && line.as_bytes().get(3) != Some(&b'-')
}

fn parse_line(line: &str) -> Result<(ReplyCode, bool, &str)> {
    let malformed = || Error::Protocol {
        message: format!("Malformed reply line: {line:?}"),
        reply: None,
    };

    let digits = line.get(..3).ok_or_else(malformed)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let code = digits.parse::<u16>().map_err(|_| malformed())?;

    let (is_last, text) = match line.as_bytes().get(3) {
        None => (true, ""),
        Some(b'-') => (false, &line[4..]),
        Some(b' ') => (true, &line[4..]),
        Some(_) => return Err(malformed()),
    };

    Ok((ReplyCode::new(code), is_last, text))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod split_lines_tests {
        use super::*;

        #[test]
        fn several_lines_in_one_chunk() {
            let (lines, rest) = split_lines(b"", b"250-a\r\n250-b\r\n250 c\r\n");
            assert_eq!(lines, vec!["250-a", "250-b", "250 c"]);
            assert!(rest.is_empty());
        }

        #[test]
        fn partial_line_is_kept() {
            let (lines, rest) = split_lines(b"", b"220 ready\r\n250-SI");
            assert_eq!(lines, vec!["220 ready"]);
            assert_eq!(rest, b"250-SI");

            let (lines, rest) = split_lines(&rest, b"ZE 100\r\n");
            assert_eq!(lines, vec!["250-SIZE 100"]);
            assert!(rest.is_empty());
        }

        #[test]
        fn crlf_split_across_chunks() {
            let (lines, rest) = split_lines(b"", b"250 OK\r");
            assert!(lines.is_empty());
            let (lines, rest) = split_lines(&rest, b"\n");
            assert_eq!(lines, vec!["250 OK"]);
            assert!(rest.is_empty());
        }

        #[test]
        fn bare_lf_accepted() {
            let (lines, _) = split_lines(b"", b"250 OK\n");
            assert_eq!(lines, vec!["250 OK"]);
        }

        #[test]
        fn empty_input() {
            let (lines, rest) = split_lines(b"", b"");
            assert!(lines.is_empty());
            assert!(rest.is_empty());
        }
    }

    mod line_reader_tests {
        use super::*;

        #[test]
        fn byte_at_a_time() {
            let mut reader = LineReader::new();
            let mut lines = Vec::new();
            for byte in b"250-first\r\n250 second\r\n" {
                lines.extend(reader.push(&[*byte]).unwrap());
            }
            assert_eq!(lines, vec!["250-first", "250 second"]);
            assert_eq!(reader.pending(), 0);
        }

        #[test]
        fn overlong_line_rejected() {
            let mut reader = LineReader::new();
            let chunk = vec![b'a'; MAX_LINE_LENGTH + 1];
            assert!(reader.push(&chunk).is_err());
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn test_parse_single_line_reply() {
            let lines = vec!["250 OK".to_string()];
            let reply = parse_reply(&lines).unwrap();
            assert_eq!(reply.code.as_u16(), 250);
            assert_eq!(reply.lines, vec!["OK"]);
            assert!(reply.is_success());
        }

        #[test]
        fn test_parse_multi_line_reply() {
            let lines = vec![
                "250-First line".to_string(),
                "250-Second line".to_string(),
                "250 Last line".to_string(),
            ];
            let reply = parse_reply(&lines).unwrap();
            assert_eq!(reply.code.as_u16(), 250);
            assert_eq!(reply.lines, vec!["First line", "Second line", "Last line"]);
        }

        #[test]
        fn test_code_only_line() {
            let reply = parse_reply(&["250".to_string()]).unwrap();
            assert_eq!(reply.lines, vec![""]);
        }

        #[test]
        fn test_incomplete_reply() {
            assert!(parse_reply(&["250-more".to_string()]).is_err());
            assert!(parse_reply(&[]).is_err());
        }

        #[test]
        fn test_malformed_lines() {
            assert!(parse_reply(&["25".to_string()]).is_err());
            assert!(parse_reply(&["ABC OK".to_string()]).is_err());
            assert!(parse_reply(&["250xOK".to_string()]).is_err());
        }

        #[test]
        fn test_is_last_reply_line() {
            assert!(is_last_reply_line("250 OK"));
            assert!(is_last_reply_line("250"));
            assert!(!is_last_reply_line("250-Continuing"));
            assert!(!is_last_reply_line("25"));
        }

        #[test]
        fn assembler_yields_consecutive_replies() {
            let mut assembler = ReplyAssembler::new();
            assert!(assembler.push_line("250-a").unwrap().is_none());
            assert!(assembler.in_progress());
            let first = assembler.push_line("250 b").unwrap().unwrap();
            assert_eq!(first.lines, vec!["a", "b"]);
            assert!(!assembler.in_progress());

            let second = assembler.push_line("354 go ahead").unwrap().unwrap();
            assert_eq!(second.code.as_u16(), 354);
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn chunking_never_changes_lines(
                lines in proptest::collection::vec("[ -~]{0,40}", 0..10),
                cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..20),
            ) {
                let wire: Vec<u8> = lines
                    .iter()
                    .flat_map(|l| format!("{l}\r\n").into_bytes())
                    .collect();

                let mut positions: Vec<usize> = cuts.iter().map(|i| i.index(wire.len() + 1)).collect();
                positions.sort_unstable();
                positions.dedup();

                let mut reader = LineReader::new();
                let mut got = Vec::new();
                let mut start = 0;
                for pos in positions.into_iter().chain(std::iter::once(wire.len())) {
                    got.extend(reader.push(&wire[start..pos]).unwrap());
                    start = pos;
                }

                prop_assert_eq!(got, lines);
                prop_assert_eq!(reader.pending(), 0);
            }
        }
    }
}
