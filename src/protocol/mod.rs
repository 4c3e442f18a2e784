//! RESP Protocol Implementation
//!
//! ## Modules
//!
//! - `types`: the [`EncodeData`] frame tree and its wire serialization
//! - `parser`: incremental frame parser shared by every reader
//! - `buffer`: bounded read-ahead / write-behind buffers for blocking I/O
//! - `codec`: [`Encoder`] / [`Decoder`] and the `encode_*` helpers
//!
//! ## Example
//!
//! ```
//! use quillkv::protocol::{encode_cmd, Decoder, EncodeData};
//! use std::io::Cursor;
//!
//! let wire = encode_cmd("SET foo bar");
//! let mut decoder = Decoder::new(Cursor::new(wire));
//! let args = decoder.decode_multi_bulks().unwrap().unwrap();
//! assert_eq!(args, vec!["SET", "foo", "bar"]);
//!
//! assert_eq!(EncodeData::ok().serialize(), b"+OK\r\n");
//! ```

pub mod buffer;
pub mod codec;
pub mod parser;
pub mod types;

pub use codec::{encode, encode_bytes, encode_cmd, encode_multi_bulk, CodecError, Decoder, Encoder};
pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::EncodeData;
