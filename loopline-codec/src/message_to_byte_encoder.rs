use bytes::{BufMut, BytesMut};
use std::io::{Error, ErrorKind};

use crate::LENGTH_FIELD_LENGTH;

/// Writes one outbound payload onto the wire buffer.
pub trait MessageEncoder {
    /// Appends the encoded form of `msg` to `dst`.
    fn encode(&mut self, msg: &[u8], dst: &mut BytesMut) -> Result<(), Error>;
}

/// Prefixes every payload with its length as a 4-byte big-endian integer.
#[derive(Debug, Clone, Copy)]
pub struct LengthFieldPrepender {
    max_frame_length: usize,
}

impl LengthFieldPrepender {
    /// Creates an encoder refusing payloads longer than `max_frame_length`.
    pub fn new(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }
}

impl MessageEncoder for LengthFieldPrepender {
    fn encode(&mut self, msg: &[u8], dst: &mut BytesMut) -> Result<(), Error> {
        let length = u32::try_from(msg.len())
            .ok()
            .filter(|length| *length as usize <= self.max_frame_length)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!(
                        "payload of {} bytes exceeds {}",
                        msg.len(),
                        self.max_frame_length
                    ),
                )
            })?;

        dst.reserve(LENGTH_FIELD_LENGTH + msg.len());
        dst.put_u32(length);
        dst.put_slice(msg);
        Ok(())
    }
}

/// Writes payloads without any header, for use with fixed-length framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEncoder;

impl MessageEncoder for RawEncoder {
    fn encode(&mut self, msg: &[u8], dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_slice(msg);
        Ok(())
    }
}
