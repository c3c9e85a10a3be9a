//! # Loopline Codec - Framing and String Codecs
//!
//! `loopline-codec` turns a TCP byte stream into whole text messages and back. The
//! connection driver in `loopline-bootstrap` runs these codecs before inbound messages enter
//! a pipeline and after outbound messages leave it, so handlers only ever see `String`s.
//!
//! ## Wire Formats
//!
//! - [`Framing::LengthField`]: every frame carries a 4-byte big-endian length prefix followed
//!   by that many payload bytes. Messages of any length survive arbitrary TCP segmentation.
//! - [`Framing::FixedLength`]: no header. Payload bytes are written as they are and the reader
//!   cuts the stream into frames of exactly `frame_length` bytes.
//!
//! ## Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use loopline_codec::{Framing, StringCodec};
//!
//! let framing = Framing::default();
//! let mut encoder = framing.encoder();
//! let mut decoder = framing.decoder();
//!
//! let mut wire = BytesMut::new();
//! encoder.encode(StringCodec::encode("RES0"), &mut wire).unwrap();
//! assert_eq!(&wire[..], b"\x00\x00\x00\x04RES0");
//!
//! let frame = decoder.decode(&mut wire).unwrap().unwrap();
//! assert_eq!(StringCodec::decode(frame).unwrap(), "RES0");
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

/// Byte-to-message frame decoders for parsing length-delimited and fixed-size streams
pub mod byte_to_message_decoder;

/// Message-to-byte frame encoders
pub mod message_to_byte_encoder;

/// UTF-8 string encoding/decoding
pub mod string_codec;

pub use byte_to_message_decoder::{
    FixedLengthFrameDecoder, LengthFieldBasedFrameDecoder, MessageDecoder,
};
pub use message_to_byte_encoder::{LengthFieldPrepender, MessageEncoder, RawEncoder};
pub use string_codec::StringCodec;

use std::io::{Error, ErrorKind};

/// Default upper bound for a single length-prefixed frame.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8192;

/// Size of the length prefix used by [`Framing::LengthField`].
pub const LENGTH_FIELD_LENGTH: usize = 4;

/// Selects the wire format of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// 4-byte big-endian length prefix, then the payload.
    LengthField {
        /// Frames announcing a longer payload are rejected.
        max_frame_length: usize,
    },
    /// Headerless frames of exactly `frame_length` bytes.
    FixedLength {
        /// Size of every frame.
        frame_length: usize,
    },
}

impl Default for Framing {
    fn default() -> Self {
        Framing::LengthField {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl Framing {
    /// Checks that codecs can be built from this wire format.
    ///
    /// A zero `frame_length` is rejected with [`ErrorKind::InvalidInput`].
    pub fn validate(&self) -> Result<(), Error> {
        match *self {
            Framing::FixedLength { frame_length: 0 } => Err(Error::new(
                ErrorKind::InvalidInput,
                "fixed-length framing needs a positive frame length",
            )),
            _ => Ok(()),
        }
    }

    /// Creates the decoder for this wire format.
    ///
    /// # Panics
    ///
    /// Panics if [`validate`](Self::validate) fails.
    pub fn decoder(&self) -> Box<dyn MessageDecoder> {
        match *self {
            Framing::LengthField { max_frame_length } => {
                Box::new(LengthFieldBasedFrameDecoder::new(max_frame_length))
            }
            Framing::FixedLength { frame_length } => {
                Box::new(FixedLengthFrameDecoder::new(frame_length))
            }
        }
    }

    /// Creates the encoder for this wire format.
    pub fn encoder(&self) -> Box<dyn MessageEncoder> {
        match *self {
            Framing::LengthField { max_frame_length } => {
                Box::new(LengthFieldPrepender::new(max_frame_length))
            }
            Framing::FixedLength { .. } => Box::new(RawEncoder),
        }
    }
}
