//! Incremental RESP Parser
//!
//! The parser works over a borrowed byte slice and never blocks. Each call
//! returns one of:
//!
//! - `Ok(Some((value, consumed)))` - a whole frame; advance by `consumed`
//! - `Ok(None)` - the frame is incomplete, read more and retry
//! - `Err(ParseError)` - the bytes can never form a valid frame
//!
//! Both the blocking [`Decoder`](crate::protocol::Decoder) and the async
//! connection loop drive it the same way: append input to a buffer, call
//! the parser, advance on success.
//!
//! [`RespParser::parse_command`] is the strict form used for requests: the
//! frame must be a multibulk whose children are all bulk strings. A wrong
//! child tag is reported as soon as its first byte is visible, so a bad
//! request is rejected without waiting for the rest of it.

use crate::protocol::types::{tag, EncodeData, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Unknown tag byte at the start of a frame
    #[error("unknown type tag: {0:#04x}")]
    UnknownTag(u8),

    /// A request frame that is not a multibulk
    #[error("expected '*', got {0:#04x}")]
    NotMultiBulk(u8),

    /// A request argument that is not a bulk string
    #[error("expected '$', got {0:#04x}")]
    NotBulk(u8),

    /// Invalid integer format
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a status or error line
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk length is negative (but not -1 for null)
    #[error("invalid bulk length: {0}")]
    InvalidBulkLength(i64),

    /// Multibulk length is negative (but not -1 for null)
    #[error("invalid multibulk length: {0}")]
    InvalidMultiBulkLength(i64),

    /// Protocol violation (missing CRLF, etc.)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The frame exceeds a size limit
    #[error("message too large: {size} (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size of a single bulk string (512 MB)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of elements in one multibulk
pub const MAX_MULTI_BULK_LEN: usize = 1024 * 1024;

/// Maximum multibulk nesting depth
pub const MAX_NESTING_DEPTH: usize = 32;

/// An incremental RESP parser.
///
/// # Example
///
/// ```
/// use quillkv::protocol::RespParser;
///
/// let mut parser = RespParser::new();
/// let input = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
///
/// let (args, consumed) = parser.parse_command(input).unwrap().unwrap();
/// assert_eq!(args, vec!["GET", "name"]);
/// assert_eq!(consumed, input.len());
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    depth: usize,
    /// Buffer length the last incomplete frame needs before a retry
    wanted: usize,
}

impl RespParser {
    pub fn new() -> Self {
        Self {
            depth: 0,
            wanted: 0,
        }
    }

    /// After an `Ok(None)`, the buffer length below which parsing again
    /// cannot succeed. Once a bulk header has been read this is the end of
    /// its payload; otherwise it is one byte more than was offered.
    pub fn wanted(&self) -> usize {
        self.wanted
    }

    /// Parses any RESP frame from the start of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(EncodeData, usize)>> {
        self.depth = 0;
        self.parse_value(buf)
    }

    /// Parses a request frame: a multibulk of bulk strings.
    ///
    /// `*-1` and `*0` yield an empty argument list.
    pub fn parse_command(&mut self, buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        self.wanted = buf.len() + 1;
        let Some(&first) = buf.first() else {
            return Ok(None);
        };
        if first != tag::MULTI_BULK {
            return Err(ParseError::NotMultiBulk(first));
        }

        let Some((count, mut consumed)) = parse_length_line(buf)? else {
            return Ok(None);
        };
        if count < -1 {
            return Err(ParseError::InvalidMultiBulkLength(count));
        }
        if count <= 0 {
            return Ok(Some((Vec::new(), consumed)));
        }
        let count = checked_multi_bulk_len(count)?;

        let mut args = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let rest = &buf[consumed..];
            match rest.first() {
                None => return Ok(None),
                Some(&tag::BULK) => {}
                Some(&other) => return Err(ParseError::NotBulk(other)),
            }
            let mut need = rest.len() + 1;
            match parse_bulk(rest, &mut need)? {
                Some((Some(data), used)) => {
                    args.push(data);
                    consumed += used;
                }
                // a null argument is kept as an empty string
                Some((None, used)) => {
                    args.push(Bytes::new());
                    consumed += used;
                }
                None => {
                    self.wanted = consumed + need;
                    return Ok(None);
                }
            }
        }

        Ok(Some((args, consumed)))
    }

    fn parse_value(&mut self, buf: &[u8]) -> ParseResult<Option<(EncodeData, usize)>> {
        self.wanted = buf.len() + 1;
        let Some(&first) = buf.first() else {
            return Ok(None);
        };

        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::ProtocolError(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match first {
            tag::STATUS => Ok(parse_text_line(buf)?.map(|(s, n)| (EncodeData::Status(s), n))),
            tag::ERROR => Ok(parse_text_line(buf)?.map(|(s, n)| (EncodeData::Error(s), n))),
            tag::INTEGER => {
                Ok(parse_length_line(buf)?.map(|(value, n)| (EncodeData::Integer(value), n)))
            }
            tag::BULK => Ok(parse_bulk(buf, &mut self.wanted)?.map(|(data, n)| match data {
                Some(data) => (EncodeData::Bulk(data), n),
                None => (EncodeData::NullBulk, n),
            })),
            tag::MULTI_BULK => self.parse_multi_bulk(buf),
            other => Err(ParseError::UnknownTag(other)),
        }
    }

    /// `*<count>\r\n<elements...>`
    fn parse_multi_bulk(&mut self, buf: &[u8]) -> ParseResult<Option<(EncodeData, usize)>> {
        let Some((count, mut consumed)) = parse_length_line(buf)? else {
            return Ok(None);
        };
        if count == -1 {
            return Ok(Some((EncodeData::MultiBulk(None), consumed)));
        }
        if count < 0 {
            return Err(ParseError::InvalidMultiBulkLength(count));
        }
        let count = checked_multi_bulk_len(count)?;

        let mut elements = Vec::with_capacity(count.min(64));
        self.depth += 1;
        for _ in 0..count {
            match self.parse_value(&buf[consumed..])? {
                Some((value, used)) => {
                    elements.push(value);
                    consumed += used;
                }
                None => {
                    self.depth -= 1;
                    self.wanted += consumed;
                    return Ok(None);
                }
            }
        }
        self.depth -= 1;

        Ok(Some((EncodeData::MultiBulk(Some(elements)), consumed)))
    }
}

/// Parses a whole frame with a throwaway parser.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(EncodeData, usize)>> {
    RespParser::new().parse(buf)
}

/// `<tag><text>\r\n` → the text as a `String`.
fn parse_text_line(buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
    let Some(pos) = find_crlf(&buf[1..]) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(&buf[1..1 + pos])
        .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    Ok(Some((text.to_string(), 1 + pos + 2)))
}

/// `<tag><integer>\r\n` → the integer.
fn parse_length_line(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let Some(pos) = find_crlf(&buf[1..]) else {
        return Ok(None);
    };
    let digits = &buf[1..1 + pos];
    let value = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ParseError::InvalidInteger(String::from_utf8_lossy(digits).into_owned()))?;
    Ok(Some((value, 1 + pos + 2)))
}

/// `$<len>\r\n<data>\r\n` → `Some(data)`, or `None` for `$-1`. An
/// incomplete payload stores the full frame length in `wanted`.
fn parse_bulk(buf: &[u8], wanted: &mut usize) -> ParseResult<Option<(Option<Bytes>, usize)>> {
    let Some((length, header)) = parse_length_line(buf)? else {
        return Ok(None);
    };
    if length == -1 {
        return Ok(Some((None, header)));
    }
    if length < 0 {
        return Err(ParseError::InvalidBulkLength(length));
    }
    let length = length as usize;
    if length > MAX_BULK_SIZE {
        return Err(ParseError::MessageTooLarge {
            size: length,
            max: MAX_BULK_SIZE,
        });
    }

    let total = header + length + 2;
    if buf.len() < total {
        *wanted = total;
        return Ok(None);
    }
    if &buf[header + length..total] != CRLF {
        return Err(ParseError::ProtocolError(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }
    let data = Bytes::copy_from_slice(&buf[header..header + length]);
    Ok(Some((Some(data), total)))
}

fn checked_multi_bulk_len(count: i64) -> ParseResult<usize> {
    let count = count as usize;
    if count > MAX_MULTI_BULK_LEN {
        return Err(ParseError::MessageTooLarge {
            size: count,
            max: MAX_MULTI_BULK_LEN,
        });
    }
    Ok(count)
}

/// Position of the first CRLF in `buf`.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}
