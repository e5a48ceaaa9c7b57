//! RESP2 parser and command encoder.

use bytes::Bytes;

use super::{MAX_BULK_SIZE, MAX_ELEMENTS, MAX_NESTING_DEPTH, RespValue};

/// Parse result.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult {
    /// Successfully parsed a value, consuming this many bytes.
    Ok(RespValue, usize),
    /// Need more data.
    Incomplete,
    /// Parse error.
    Error(String),
}

/// RESP2 reply parser.
#[derive(Debug, Default)]
pub struct RespParser {
    /// Current nesting depth.
    depth: usize,
}

impl RespParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one value from the front of `data`.
    pub fn parse(&mut self, data: &[u8]) -> ParseResult {
        self.depth = 0;
        self.parse_value(data)
    }

    fn parse_value(&mut self, data: &[u8]) -> ParseResult {
        let Some((&type_byte, rest)) = data.split_first() else {
            return ParseResult::Incomplete;
        };

        if self.depth > MAX_NESTING_DEPTH {
            return ParseResult::Error("maximum nesting depth exceeded".to_string());
        }

        let result = match type_byte {
            b'+' => Self::parse_line(rest, |line| {
                Ok(RespValue::SimpleString(
                    String::from_utf8_lossy(line).into_owned(),
                ))
            }),
            b'-' => Self::parse_line(rest, |line| {
                Ok(RespValue::Error(String::from_utf8_lossy(line).into_owned()))
            }),
            b':' => Self::parse_line(rest, |line| parse_int(line).map(RespValue::Integer)),
            b'$' => Self::parse_bulk_string(rest),
            b'*' => self.parse_array(rest),
            other => ParseResult::Error(format!("unexpected type byte 0x{other:02x}")),
        };

        // Account for the type byte.
        match result {
            ParseResult::Ok(value, consumed) => ParseResult::Ok(value, consumed + 1),
            other => other,
        }
    }

    /// Parse a CRLF-terminated line and convert it.
    fn parse_line(
        data: &[u8],
        convert: impl FnOnce(&[u8]) -> Result<RespValue, String>,
    ) -> ParseResult {
        match find_crlf(data) {
            Some(pos) => match convert(&data[..pos]) {
                Ok(value) => ParseResult::Ok(value, pos + 2),
                Err(e) => ParseResult::Error(e),
            },
            None => ParseResult::Incomplete,
        }
    }

    /// Parse a bulk string ($6\r\nfoobar\r\n).
    fn parse_bulk_string(data: &[u8]) -> ParseResult {
        let Some(len_pos) = find_crlf(data) else {
            return ParseResult::Incomplete;
        };

        let len = match parse_int(&data[..len_pos]) {
            Ok(-1) => return ParseResult::Ok(RespValue::Null, len_pos + 2),
            Ok(len) if len >= 0 => len as usize,
            _ => return ParseResult::Error("invalid bulk string length".to_string()),
        };

        if len > MAX_BULK_SIZE {
            return ParseResult::Error(format!(
                "bulk string too large: {} > {}",
                len, MAX_BULK_SIZE
            ));
        }

        let start = len_pos + 2;
        let end = start + len;
        if data.len() < end + 2 {
            return ParseResult::Incomplete;
        }
        if &data[end..end + 2] != b"\r\n" {
            return ParseResult::Error("missing CRLF after bulk string".to_string());
        }

        ParseResult::Ok(
            RespValue::BulkString(Bytes::copy_from_slice(&data[start..end])),
            end + 2,
        )
    }

    /// Parse an array (*2\r\n...).
    fn parse_array(&mut self, data: &[u8]) -> ParseResult {
        let Some(len_pos) = find_crlf(data) else {
            return ParseResult::Incomplete;
        };

        let len = match parse_int(&data[..len_pos]) {
            Ok(-1) => return ParseResult::Ok(RespValue::Null, len_pos + 2),
            Ok(len) if len >= 0 => len as usize,
            _ => return ParseResult::Error("invalid array length".to_string()),
        };

        if len > MAX_ELEMENTS {
            return ParseResult::Error(format!("array too large: {} > {}", len, MAX_ELEMENTS));
        }

        self.depth += 1;
        let mut elements = Vec::with_capacity(len.min(1024));
        let mut offset = len_pos + 2;

        for _ in 0..len {
            match self.parse_value(&data[offset..]) {
                ParseResult::Ok(value, consumed) => {
                    elements.push(value);
                    offset += consumed;
                }
                other => {
                    self.depth -= 1;
                    return other;
                }
            }
        }

        self.depth -= 1;
        ParseResult::Ok(RespValue::Array(elements), offset)
    }
}

/// Incremental reply framer.
///
/// Finds where the first complete value in a growing input buffer ends,
/// resuming from the last complete element on each call. A large reply that
/// arrives over many socket reads is walked once instead of being re-parsed
/// from the start after every read.
///
/// Between calls the input may only grow; once a frame length is returned
/// the scanner starts over for the next value.
#[derive(Debug, Default)]
pub struct FrameScanner {
    /// End of the last complete element of the current frame.
    offset: usize,
    /// Elements still expected by each open array, innermost last.
    open: Vec<usize>,
}

impl FrameScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any partially scanned frame.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.open.clear();
    }

    /// Length of the first complete value in `data`, or `None` until it has
    /// fully arrived.
    pub fn scan(&mut self, data: &[u8]) -> Result<Option<usize>, String> {
        loop {
            let Some((&type_byte, rest)) = data.get(self.offset..).and_then(<[u8]>::split_first)
            else {
                return Ok(None);
            };
            let Some(line_len) = find_crlf(rest) else {
                return Ok(None);
            };
            let header = &rest[..line_len];
            let mut next = self.offset + 1 + line_len + 2;
            let mut children = 0;

            match type_byte {
                b'+' | b'-' | b':' => {}
                b'$' => match parse_int(header)? {
                    -1 => {}
                    len if len >= 0 => {
                        let len = len as usize;
                        if len > MAX_BULK_SIZE {
                            return Err(format!("bulk string too large: {len} > {MAX_BULK_SIZE}"));
                        }
                        next += len + 2;
                        if data.len() < next {
                            return Ok(None);
                        }
                    }
                    _ => return Err("invalid bulk string length".to_string()),
                },
                b'*' => match parse_int(header)? {
                    -1 | 0 => {}
                    len if len > 0 => {
                        let len = len as usize;
                        if len > MAX_ELEMENTS {
                            return Err(format!("array too large: {len} > {MAX_ELEMENTS}"));
                        }
                        if self.open.len() >= MAX_NESTING_DEPTH {
                            return Err("maximum nesting depth exceeded".to_string());
                        }
                        children = len;
                    }
                    _ => return Err("invalid array length".to_string()),
                },
                other => return Err(format!("unexpected type byte 0x{other:02x}")),
            }

            self.offset = next;
            if children > 0 {
                self.open.push(children);
                continue;
            }

            // A value just completed; close every array it finishes.
            loop {
                match self.open.last_mut() {
                    None => {
                        let len = self.offset;
                        self.offset = 0;
                        return Ok(Some(len));
                    }
                    Some(remaining) => {
                        *remaining -= 1;
                        if *remaining > 0 {
                            break;
                        }
                        self.open.pop();
                    }
                }
            }
        }
    }
}

/// Encode a command as an array of bulk strings.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
    let payload: usize = args.iter().map(|a| a.as_ref().len() + 16).sum();
    let mut buf = Vec::with_capacity(16 + payload);

    buf.push(b'*');
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    for arg in args {
        let arg = arg.as_ref();
        buf.push(b'$');
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

/// Find CRLF in data, returning position of first \r.
fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

fn parse_int(raw: &[u8]) -> Result<i64, String> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| "invalid integer".to_string())
}
