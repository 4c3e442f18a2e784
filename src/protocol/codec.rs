//! Blocking RESP Encoder / Decoder
//!
//! Stream-level API over the frame parser and the blocking buffers:
//!
//! ```text
//!  Write  <── WriteBuffer (10 KiB) <── Encoder::encode(&EncodeData)
//!  Read   ──> ReadBuffer  (2 KiB)  ──> RespParser ──> Decoder::decode*()
//! ```
//!
//! The read-ahead starts small and grows while a frame is incomplete, up to
//! the decoder's frame limit. Parsing is retried only once the buffer holds
//! as many bytes as the parser last asked for.
//!
//! The async server does not use these types; it feeds its own socket
//! buffer to the same [`RespParser`]. The client binary and the replay log
//! do use them.

use crate::protocol::buffer::{ReadBuffer, WriteBuffer, DEFAULT_READ_CAPACITY};
use crate::protocol::parser::{ParseError, ParseResult, RespParser, MAX_BULK_SIZE};
use crate::protocol::types::EncodeData;
use bytes::Bytes;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Largest frame a [`Decoder::new`] accepts: one maximal bulk plus headroom.
pub const MAX_FRAME_SIZE: usize = MAX_BULK_SIZE + 64 * 1024;

/// Errors from the blocking codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("protocol error: {0}")]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A single frame is larger than the decoder's frame limit
    #[error("frame exceeds read buffer of {capacity} bytes")]
    BufferFull { capacity: usize },

    /// The stream ended in the middle of a frame
    #[error("unexpected end of stream inside a frame")]
    UnexpectedEof,
}

/// Writes frames to a `Write` through a write-behind buffer.
#[derive(Debug)]
pub struct Encoder<W: Write> {
    out: WriteBuffer<W>,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: WriteBuffer::new(writer),
        }
    }

    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        Self {
            out: WriteBuffer::with_capacity(writer, capacity),
        }
    }

    /// Encodes one frame, optionally flushing everything buffered so far.
    pub fn encode(&mut self, value: &EncodeData, flush: bool) -> Result<(), CodecError> {
        value.write_to(&mut self.out)?;
        if flush {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CodecError> {
        self.out.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        self.out.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.out.get_mut()
    }
}

/// Reads frames from a `Read` through a growable read-ahead buffer.
#[derive(Debug)]
pub struct Decoder<R: Read> {
    input: ReadBuffer<R>,
    parser: RespParser,
    max_frame: usize,
    /// Buffered length needed before the next parse attempt
    wanted: usize,
}

impl<R: Read> Decoder<R> {
    /// A decoder accepting frames up to [`MAX_FRAME_SIZE`].
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, MAX_FRAME_SIZE)
    }

    /// A decoder whose largest frame is `capacity` bytes.
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            input: ReadBuffer::with_capacity(reader, capacity.min(DEFAULT_READ_CAPACITY)),
            parser: RespParser::new(),
            max_frame: capacity,
            wanted: 0,
        }
    }

    /// Reads the next command frame.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(args))` - one multibulk of bulks
    /// - `Ok(None)` - the stream ended cleanly between frames
    pub fn decode_multi_bulks(&mut self) -> Result<Option<Vec<Bytes>>, CodecError> {
        self.next_frame(RespParser::parse_command)
    }

    /// Reads the next frame of any shape.
    pub fn decode(&mut self) -> Result<Option<EncodeData>, CodecError> {
        self.next_frame(RespParser::parse)
    }

    fn next_frame<T>(
        &mut self,
        parse: fn(&mut RespParser, &[u8]) -> ParseResult<Option<(T, usize)>>,
    ) -> Result<Option<T>, CodecError> {
        loop {
            let buffered = self.input.buffered().len();
            if buffered > 0 && buffered >= self.wanted {
                if let Some((value, used)) = parse(&mut self.parser, self.input.buffered())? {
                    self.input.consume(used);
                    self.wanted = 0;
                    return Ok(Some(value));
                }
                self.wanted = self.parser.wanted();
            }

            if self.wanted > self.max_frame
                || (self.input.is_full() && self.input.capacity() >= self.max_frame)
            {
                return Err(CodecError::BufferFull {
                    capacity: self.max_frame,
                });
            }
            if self.input.is_full() {
                let grown = self
                    .wanted
                    .max(self.input.capacity().saturating_mul(2))
                    .min(self.max_frame);
                self.input.grow(grown);
            }

            if self.input.fill()? == 0 {
                return if self.input.buffered().is_empty() {
                    Ok(None)
                } else {
                    Err(CodecError::UnexpectedEof)
                };
            }
        }
    }

    pub fn get_ref(&self) -> &R {
        self.input.get_ref()
    }
}

/// Encodes one frame and flushes.
pub fn encode<W: Write>(writer: W, value: &EncodeData) -> Result<(), CodecError> {
    Encoder::new(writer).encode(value, true)
}

/// Encodes `args` as a command frame and flushes.
pub fn encode_multi_bulk<W: Write>(writer: W, args: &[Bytes]) -> Result<(), CodecError> {
    let value = EncodeData::command(args.iter().cloned());
    encode(writer, &value)
}

/// Splits `line` on spaces into a command frame. Empty chunks are dropped.
///
/// ```
/// use quillkv::protocol::encode_cmd;
///
/// assert_eq!(encode_cmd("SET  foo bar"), b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
/// ```
pub fn encode_cmd(line: &str) -> Vec<u8> {
    encode_bytes(line.as_bytes())
}

/// Byte-oriented form of [`encode_cmd`].
pub fn encode_bytes(line: &[u8]) -> Vec<u8> {
    let args = line
        .split(|&b| b == b' ')
        .filter(|chunk| !chunk.is_empty())
        .map(Bytes::copy_from_slice);
    EncodeData::command(args).serialize()
}
