use bytes::BytesMut;
use std::io::{Error, ErrorKind};

/// Converts frames to UTF-8 strings and back.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl StringCodec {
    /// Decodes a frame as UTF-8.
    pub fn decode(frame: BytesMut) -> Result<String, Error> {
        String::from_utf8(frame.to_vec()).map_err(|err| Error::new(ErrorKind::InvalidData, err))
    }

    /// Returns the UTF-8 bytes of `msg`.
    pub fn encode(msg: &str) -> &[u8] {
        msg.as_bytes()
    }
}
