//! Structured subprocess log pipeline.
//!
//! Scans a child process's output byte stream for in-band control markers
//! of the form `ESC _ klio_<cmd>[ <arg>] ESC \`, re-flushing the line buffer
//! into the host's logger sinks whenever the level, tags, or mode change.
//! See the escape code table this module implements: `klio_log_level`,
//! `klio_tags`, `klio_reset`, `klio_mode`.

use std::io::Read;

use super::level::Level;
use super::logger::Logger;
use super::message::Message;

const CONTROL_BYTE: u8 = 0x1B; // ESC
const MARKER_MODE: &str = "klio_mode";
const MARKER_LOG_LEVEL: &str = "klio_log_level";
const MARKER_TAGS: &str = "klio_tags";
const MARKER_RESET: &str = "klio_reset";

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Line,
    Raw,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Newline,
    Text(Vec<u8>),
    EscCode(Vec<u8>),
}

/// One step of the tokenizer: either we produced a token (and consumed
/// `advance` bytes), or we need more input before we can decide.
enum Step {
    NeedMore,
    Produced { advance: usize, token: Token },
}

/// Given the buffered bytes
/// seen so far and whether the input stream is exhausted, decide the next
/// token boundary, or report that more bytes are required.
fn scan_step(data: &[u8], at_eof: bool) -> Step {
    if data.is_empty() {
        return Step::NeedMore;
    }

    if data[0] == b'\n' {
        return Step::Produced {
            advance: 1,
            token: Token::Newline,
        };
    }

    if data[0] == CONTROL_BYTE {
        if data.len() == 1 {
            return if at_eof {
                Step::Produced {
                    advance: 1,
                    token: Token::Text(vec![CONTROL_BYTE]),
                }
            } else {
                Step::NeedMore
            };
        }

        if data[1] != b'_' {
            return Step::Produced {
                advance: 1,
                token: Token::Text(vec![CONTROL_BYTE]),
            };
        }

        for idx in 1..data.len() {
            if data[idx - 1] == CONTROL_BYTE && data[idx] == b'\\' {
                return Step::Produced {
                    advance: idx + 1,
                    token: Token::EscCode(data[0..=idx].to_vec()),
                };
            }
        }

        return if at_eof {
            // Partial marker at end of input: surface it as plain text.
            Step::Produced {
                advance: data.len(),
                token: Token::Text(data.to_vec()),
            }
        } else {
            Step::NeedMore
        };
    }

    for (idx, &b) in data.iter().enumerate() {
        if b == CONTROL_BYTE || b == b'\n' {
            return Step::Produced {
                advance: idx,
                token: Token::Text(data[0..idx].to_vec()),
            };
        }
    }

    Step::Produced {
        advance: data.len(),
        token: Token::Text(data.to_vec()),
    }
}

fn is_esc_code(bytes: &[u8]) -> bool {
    bytes.starts_with(&[CONTROL_BYTE, b'_'])
        && bytes.len() >= 2
        && bytes[bytes.len() - 2] == CONTROL_BYTE
        && bytes[bytes.len() - 1] == b'\\'
        && bytes.starts_with(b"\x1b_klio")
}

struct ParsedCode {
    cmd: String,
    args: Vec<String>,
}

fn parse_esc_code(bytes: &[u8]) -> Result<ParsedCode, String> {
    let inner = &bytes[2..bytes.len() - 2];
    let inner = String::from_utf8_lossy(inner);
    let mut parts = inner.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("").to_string();
    let rest = parts.next();

    match cmd.as_str() {
        MARKER_LOG_LEVEL => {
            let raw = rest.ok_or_else(|| format!("{cmd} requires an argument"))?;
            let arg: String =
                serde_json::from_str(raw).map_err(|e| format!("{cmd}: {e}"))?;
            Ok(ParsedCode {
                cmd,
                args: vec![arg],
            })
        }
        MARKER_TAGS => {
            let raw = rest.ok_or_else(|| format!("{cmd} requires an argument"))?;
            let args: Vec<String> =
                serde_json::from_str(raw).map_err(|e| format!("{cmd}: {e}"))?;
            Ok(ParsedCode { cmd, args })
        }
        MARKER_RESET => {
            if rest.is_some() {
                return Err(format!("{cmd} doesn't accept arguments"));
            }
            Ok(ParsedCode {
                cmd,
                args: Vec::new(),
            })
        }
        MARKER_MODE => {
            let raw = rest.ok_or_else(|| format!("{cmd} requires an argument"))?;
            let arg: String =
                serde_json::from_str(raw).map_err(|e| format!("{cmd}: {e}"))?;
            Ok(ParsedCode {
                cmd,
                args: vec![arg],
            })
        }
        other => Err(format!("{other} is not supported")),
    }
}

/// Reads tokens out of an underlying byte stream, buffering only as much
/// as needed to decide the next token boundary.
struct Scanner<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: Read> Scanner<R> {
    fn new(reader: R) -> Self {
        Scanner {
            reader,
            buf: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    fn fill_more(&mut self) -> std::io::Result<bool> {
        if self.pos > 0 {
            self.buf.drain(0..self.pos);
            self.pos = 0;
        }
        let mut chunk = [0u8; 8192];
        let n = self.reader.read(&mut chunk)?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    fn next_token(&mut self) -> std::io::Result<Option<Token>> {
        loop {
            match scan_step(&self.buf[self.pos..], self.eof) {
                Step::Produced { advance, token } => {
                    self.pos += advance;
                    return Ok(Some(token));
                }
                Step::NeedMore => {
                    if self.eof {
                        return Ok(None);
                    }
                    self.fill_more()?;
                }
            }
        }
    }
}

/// Scans one of a child's std streams and re-emits structured log records
/// through a host logger sink.
pub struct Processor<'a, R> {
    default_level: Level,
    logger: &'a Logger,
    input: R,
}

impl<'a, R: Read> Processor<'a, R> {
    pub fn new(default_level: Level, logger: &'a Logger, input: R) -> Self {
        Processor {
            default_level,
            logger,
            input,
        }
    }

    /// Drains the input to completion, emitting flushed records along the
    /// way. Returns once the underlying stream reports EOF.
    pub fn process(self) {
        let mut scanner = Scanner::new(self.input);

        let mut level = self.default_level;
        let mut tags: Vec<String> = Vec::new();
        let mut line = String::new();
        let mut mode = Mode::Line;

        macro_rules! flush {
            () => {
                if !line.is_empty() {
                    self.logger
                        .println(&Message::with_tags(level, tags.clone(), line.clone()));
                    line.clear();
                }
            };
        }

        loop {
            let token = match scanner.next_token() {
                Ok(Some(t)) => t,
                Ok(None) => break,
                Err(e) => {
                    super::error(format!("error while processing logs: {e}"));
                    break;
                }
            };

            match token {
                Token::Newline => {
                    if mode == Mode::Raw {
                        self.logger.write_raw(b"\n");
                    } else {
                        flush!();
                    }
                }
                Token::Text(bytes) => {
                    if mode == Mode::Raw {
                        self.logger.write_raw(&bytes);
                    } else {
                        line.push_str(&String::from_utf8_lossy(&bytes));
                    }
                }
                Token::EscCode(bytes) => {
                    if !is_esc_code(&bytes) {
                        // An ESC _ ... ESC \ sequence that isn't klio_-prefixed:
                        // not a marker, pass it through as literal text.
                        if mode == Mode::Raw {
                            self.logger.write_raw(&bytes);
                        } else {
                            line.push_str(&String::from_utf8_lossy(&bytes));
                        }
                        continue;
                    }

                    let parsed = match parse_esc_code(&bytes) {
                        Ok(p) => p,
                        Err(e) => {
                            super::spam(format!(
                                "failed to parse esc sequence while processing logs: {e}"
                            ));
                            continue;
                        }
                    };

                    if mode == Mode::Raw && parsed.cmd != MARKER_MODE {
                        continue;
                    }

                    match parsed.cmd.as_str() {
                        MARKER_LOG_LEVEL => match parsed.args.first().and_then(|s| s.parse::<Level>().ok())
                        {
                            Some(new_level) => {
                                if new_level != level {
                                    flush!();
                                    level = new_level;
                                }
                            }
                            None => {
                                super::spam(format!(
                                    "failed to parse esc sequence while processing logs: invalid log level: {:?}",
                                    parsed.args.first()
                                ));
                            }
                        },
                        MARKER_TAGS => {
                            if parsed.args != tags {
                                flush!();
                                tags = parsed.args;
                            }
                        }
                        MARKER_RESET => {
                            if !tags.is_empty() || level != self.default_level {
                                flush!();
                                level = self.default_level;
                                tags = Vec::new();
                            }
                        }
                        MARKER_MODE => {
                            let requested = parsed.args.first().map(String::as_str);
                            let new_mode = match requested {
                                Some("line") => Some(Mode::Line),
                                Some("raw") => Some(Mode::Raw),
                                _ => None,
                            };
                            match new_mode {
                                Some(new_mode) => {
                                    if new_mode != mode {
                                        flush!();
                                    }
                                    mode = new_mode;
                                }
                                None => {
                                    super::spam(format!(
                                        "failed to parse esc sequence while processing logs: invalid log mode: {:?}",
                                        requested
                                    ));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        flush!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{Level, Logger, Output};

    fn collect_records(input: &[u8], default_level: Level) -> Vec<(Level, Vec<String>, String)> {
        // We can't easily intercept Logger's stdout writes in a unit test,
        // so exercise the tokenizer + state machine directly instead by
        // reimplementing the minimal driving loop against a Vec sink.
        let mut scanner = Scanner::new(input);
        let mut level = default_level;
        let mut tags: Vec<String> = Vec::new();
        let mut line = String::new();
        let mut records = Vec::new();
        let mut mode = Mode::Line;

        while let Some(token) = scanner.next_token().unwrap() {
            match token {
                Token::Newline => {
                    if mode != Mode::Raw && !line.is_empty() {
                        records.push((level, tags.clone(), line.clone()));
                        line.clear();
                    }
                }
                Token::Text(bytes) => {
                    if mode != Mode::Raw {
                        line.push_str(&String::from_utf8_lossy(&bytes));
                    }
                }
                Token::EscCode(bytes) => {
                    if !is_esc_code(&bytes) {
                        if mode != Mode::Raw {
                            line.push_str(&String::from_utf8_lossy(&bytes));
                        }
                        continue;
                    }

                    let parsed = parse_esc_code(&bytes).unwrap();
                    match parsed.cmd.as_str() {
                        MARKER_LOG_LEVEL => {
                            let new_level: Level = parsed.args[0].parse().unwrap();
                            if new_level != level {
                                if !line.is_empty() {
                                    records.push((level, tags.clone(), line.clone()));
                                    line.clear();
                                }
                                level = new_level;
                            }
                        }
                        MARKER_RESET => {
                            if !tags.is_empty() || level != default_level {
                                if !line.is_empty() {
                                    records.push((level, tags.clone(), line.clone()));
                                    line.clear();
                                }
                                level = default_level;
                                tags.clear();
                            }
                        }
                        MARKER_MODE => {
                            mode = if parsed.args[0] == "raw" {
                                Mode::Raw
                            } else {
                                Mode::Line
                            };
                        }
                        _ => {}
                    }
                }
            }
        }
        if !line.is_empty() {
            records.push((level, tags, line));
        }
        records
    }

    #[test]
    fn scenario_structured_log_filtering() {
        let input = b"hello\n\x1b_klio_log_level \"debug\"\x1b\\debug-detail\n\x1b_klio_reset\x1b\\back\n";
        let records = collect_records(input, Level::Info);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], (Level::Info, vec![], "hello".to_string()));
        assert_eq!(
            records[1],
            (Level::Debug, vec![], "debug-detail".to_string())
        );
        assert_eq!(records[2], (Level::Info, vec![], "back".to_string()));
    }

    #[test]
    fn bare_esc_not_followed_by_underscore_is_text() {
        let input = b"a\x1bb\n";
        let records = collect_records(input, Level::Info);
        assert_eq!(records[0].2, "a\x1bb");
    }

    #[test]
    fn non_klio_esc_sequence_is_passed_through_as_text() {
        let input = b"before\x1b_notklio_cmd\x1b\\after\n";
        let records = collect_records(input, Level::Info);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].2, "before\x1b_notklio_cmd\x1b\\after");
    }

    #[test]
    fn partial_marker_at_eof_is_emitted_as_text() {
        let input = b"tail\x1b_klio_log_lev";
        let records = collect_records(input, Level::Info);
        assert_eq!(records[0].2, "tail\x1b_klio_log_lev");
    }

    #[test]
    fn unknown_level_argument_is_ignored_without_aborting() {
        let logger = Logger::new(Output::Stdout, Level::Spam);
        let input: &[u8] = b"before\n\x1b_klio_log_level \"bogus\"\x1b\\after\n";
        let processor = Processor::new(Level::Info, &logger, input);
        processor.process();
        // No panic means the invalid marker was swallowed as spam, matching
        // the "never abort the stream" requirement.
    }
}
