use bytes::{Buf, BytesMut};
use std::io::{Error, ErrorKind};

use crate::LENGTH_FIELD_LENGTH;

/// Splits an accumulated byte buffer into frames.
///
/// `decode` is called every time new bytes were appended to `buf`. It returns `Ok(None)`
/// while the buffer does not hold a complete frame yet, and must leave partial input in
/// `buf` for the next call.
pub trait MessageDecoder {
    /// Removes and returns the next complete frame, if there is one.
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<BytesMut>, Error>;
}

/// Decodes frames made of a 4-byte big-endian length followed by the payload.
///
/// The length prefix is stripped; the returned frame is the payload only.
#[derive(Debug, Clone, Copy)]
pub struct LengthFieldBasedFrameDecoder {
    max_frame_length: usize,
}

impl LengthFieldBasedFrameDecoder {
    /// Creates a decoder rejecting payloads longer than `max_frame_length`.
    pub fn new(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }
}

impl MessageDecoder for LengthFieldBasedFrameDecoder {
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<BytesMut>, Error> {
        if buf.len() < LENGTH_FIELD_LENGTH {
            return Ok(None);
        }

        let mut header = [0u8; LENGTH_FIELD_LENGTH];
        header.copy_from_slice(&buf[..LENGTH_FIELD_LENGTH]);
        let frame_length = u32::from_be_bytes(header) as usize;
        if frame_length > self.max_frame_length {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "frame length {} exceeds {}",
                    frame_length, self.max_frame_length
                ),
            ));
        }

        let total = LENGTH_FIELD_LENGTH + frame_length;
        if buf.len() < total {
            buf.reserve(total - buf.len());
            return Ok(None);
        }

        buf.advance(LENGTH_FIELD_LENGTH);
        Ok(Some(buf.split_to(frame_length)))
    }
}

/// Cuts the stream into frames of a fixed number of bytes.
#[derive(Debug, Clone, Copy)]
pub struct FixedLengthFrameDecoder {
    frame_length: usize,
}

impl FixedLengthFrameDecoder {
    /// Creates a decoder producing `frame_length`-byte frames.
    ///
    /// # Panics
    ///
    /// Panics if `frame_length` is zero.
    pub fn new(frame_length: usize) -> Self {
        assert!(frame_length > 0, "frame_length must be a positive integer");
        Self { frame_length }
    }
}

impl MessageDecoder for FixedLengthFrameDecoder {
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<BytesMut>, Error> {
        if buf.len() < self.frame_length {
            Ok(None)
        } else {
            Ok(Some(buf.split_to(self.frame_length)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut bytes = (payload.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    fn drain(decoder: &mut dyn MessageDecoder, buf: &mut BytesMut) -> Vec<Vec<u8>> {
        let mut frames = vec![];
        while let Some(frame) = decoder.decode(buf).unwrap() {
            frames.push(frame.to_vec());
        }
        frames
    }

    #[test]
    fn length_field_survives_byte_at_a_time_delivery() {
        let payloads: [&[u8]; 3] = [b"RES0", "héllo wörld".as_bytes(), b""];
        let wire: Vec<u8> = payloads.iter().flat_map(|p| frame(p)).collect();

        let mut decoder = LengthFieldBasedFrameDecoder::new(64);
        let mut buf = BytesMut::new();
        let mut frames = vec![];
        for byte in wire {
            buf.extend_from_slice(&[byte]);
            frames.extend(drain(&mut decoder, &mut buf));
        }

        assert_eq!(frames, payloads.map(<[u8]>::to_vec));
        assert!(buf.is_empty());
    }

    #[test]
    fn length_field_splits_coalesced_frames() {
        let mut buf = BytesMut::new();
        for i in 0..10 {
            buf.extend_from_slice(&frame(format!("RES{i}").as_bytes()));
        }
        // trailing partial frame stays buffered
        buf.extend_from_slice(&frame(b"ABCD")[..6]);

        let mut decoder = LengthFieldBasedFrameDecoder::new(64);
        let frames = drain(&mut decoder, &mut buf);

        let expected: Vec<Vec<u8>> = (0..10).map(|i| format!("RES{i}").into_bytes()).collect();
        assert_eq!(frames, expected);
        assert_eq!(&buf[..], &frame(b"ABCD")[..6]);
    }

    #[test]
    fn length_field_rejects_oversize_frame() {
        let mut buf = BytesMut::from(&frame(&[b'x'; 9])[..]);
        let mut decoder = LengthFieldBasedFrameDecoder::new(8);
        let err = decoder.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn fixed_length_regroups_stream() {
        let mut decoder = FixedLengthFrameDecoder::new(4);
        let mut buf = BytesMut::from(&b"RES0RES1RE"[..]);
        assert_eq!(drain(&mut decoder, &mut buf), [b"RES0".to_vec(), b"RES1".to_vec()]);
        assert_eq!(&buf[..], b"RE");

        buf.extend_from_slice(b"S2");
        assert_eq!(drain(&mut decoder, &mut buf), [b"RES2".to_vec()]);
    }

    #[test]
    #[should_panic(expected = "frame_length must be a positive integer")]
    fn fixed_length_rejects_zero() {
        FixedLengthFrameDecoder::new(0);
    }
}
