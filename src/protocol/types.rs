//! RESP Value Tree
//!
//! [`EncodeData`] is the in-memory form of one RESP frame, used both for
//! replies the server writes and for frames the client reads back.
//!
//! ## Wire Format
//!
//! Each frame starts with a tag byte and lines end in CRLF:
//!
//! | Tag | Variant     | Example                           |
//! |-----|-------------|-----------------------------------|
//! | `+` | `Status`    | `+OK\r\n`                         |
//! | `-` | `Error`     | `-ERR unknown command\r\n`        |
//! | `:` | `Integer`   | `:1000\r\n`                       |
//! | `$` | `Bulk`      | `$5\r\nhello\r\n`                 |
//! | `$` | `NullBulk`  | `$-1\r\n`                         |
//! | `*` | `MultiBulk` | `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n` |
//!
//! An empty or absent multibulk is written as `*-1\r\n`.

use bytes::Bytes;
use std::fmt;
use std::io::{self, Write};

/// The CRLF terminator used by every RESP line.
pub const CRLF: &[u8] = b"\r\n";

/// RESP tag bytes.
pub mod tag {
    pub const STATUS: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK: u8 = b'$';
    pub const MULTI_BULK: u8 = b'*';
}

/// One RESP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeData {
    /// Single-line status reply. Must not contain CRLF.
    Status(String),

    /// Single-line error reply.
    Error(String),

    /// Signed 64-bit integer.
    Integer(i64),

    /// Binary-safe bulk string.
    Bulk(Bytes),

    /// `$-1`, the missing-value reply.
    NullBulk,

    /// Array of frames; `None` is the absent array.
    MultiBulk(Option<Vec<EncodeData>>),
}

impl EncodeData {
    pub fn status(s: impl Into<String>) -> Self {
        EncodeData::Status(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        EncodeData::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        EncodeData::Integer(n)
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        EncodeData::Bulk(data.into())
    }

    pub fn null() -> Self {
        EncodeData::NullBulk
    }

    pub fn multi_bulk(values: Vec<EncodeData>) -> Self {
        EncodeData::MultiBulk(Some(values))
    }

    /// A multibulk of bulk strings, the shape of every command.
    pub fn command<I, B>(args: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        EncodeData::MultiBulk(Some(args.into_iter().map(EncodeData::bulk).collect()))
    }

    /// `+OK`
    pub fn ok() -> Self {
        EncodeData::Status("OK".to_string())
    }

    /// `+PONG`
    pub fn pong() -> Self {
        EncodeData::Status("PONG".to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EncodeData::Error(_))
    }

    /// Writes the wire form of this frame to `out`.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        match self {
            EncodeData::Status(s) => write_line(out, tag::STATUS, s.as_bytes()),
            EncodeData::Error(s) => write_line(out, tag::ERROR, s.as_bytes()),
            EncodeData::Integer(n) => write_line(out, tag::INTEGER, n.to_string().as_bytes()),
            EncodeData::Bulk(data) => {
                write_line(out, tag::BULK, data.len().to_string().as_bytes())?;
                out.write_all(data)?;
                out.write_all(CRLF)
            }
            EncodeData::NullBulk => write_line(out, tag::BULK, b"-1"),
            EncodeData::MultiBulk(Some(values)) if !values.is_empty() => {
                write_line(out, tag::MULTI_BULK, values.len().to_string().as_bytes())?;
                values.iter().try_for_each(|value| value.write_to(out))
            }
            EncodeData::MultiBulk(_) => write_line(out, tag::MULTI_BULK, b"-1"),
        }
    }

    /// Serializes to a fresh buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        // writes into a Vec cannot fail
        let _ = self.write_to(buf);
    }
}

fn write_line<W: Write + ?Sized>(out: &mut W, tag: u8, body: &[u8]) -> io::Result<()> {
    out.write_all(&[tag])?;
    out.write_all(body)?;
    out.write_all(CRLF)
}

impl fmt::Display for EncodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeData::Status(s) => write!(f, "{}", s),
            EncodeData::Error(s) => write!(f, "(error) {}", s),
            EncodeData::Integer(n) => write!(f, "(integer) {}", n),
            EncodeData::Bulk(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            EncodeData::NullBulk => write!(f, "(nil)"),
            EncodeData::MultiBulk(None) => write!(f, "(nil)"),
            EncodeData::MultiBulk(Some(values)) if values.is_empty() => {
                write!(f, "(empty array)")
            }
            EncodeData::MultiBulk(Some(values)) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}
