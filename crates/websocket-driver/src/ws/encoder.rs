//! WebSocket frame encoder (RFC 6455 §5.2).

use websocket_driver_buffers::Writer;

use super::constants::{Opcode, FIN, MASK, RSV1, RSV2, RSV3};
use super::frames::Frame;

/// WebSocket frame encoder.
///
/// Writes frame headers and payloads into an internal [`Writer`]. The
/// `encode_*` methods return the bytes of one frame; the `write_*` methods
/// accumulate into the writer so several frames can be flushed at once.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    pub writer: Writer,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a complete frame, masking the payload if the frame has a key.
    pub fn encode(&mut self, frame: &Frame) -> Vec<u8> {
        self.write(frame);
        self.writer.flush()
    }

    /// Encodes a close frame carrying `code` followed by `reason`.
    pub fn encode_close(&mut self, code: u16, reason: &str, mask: Option<[u8; 4]>) -> Vec<u8> {
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        let mut frame = Frame::new(Opcode::Close, payload);
        if let Some(key) = mask {
            frame = frame.with_masking_key(key);
        }
        self.encode(&frame)
    }

    /// Writes a complete frame into the internal writer.
    pub fn write(&mut self, frame: &Frame) {
        let length = frame.payload.len() as u64;
        self.write_hdr(frame, length);
        match frame.masking_key {
            Some(key) => self.writer.buf_xor(&frame.payload, key),
            None => self.writer.buf(&frame.payload),
        }
    }

    /// Writes a frame header for a payload of `length` bytes.
    ///
    /// - `length <= 125`: 2-byte header
    /// - `length <= 65535`: 4-byte header with 16-bit extended length
    /// - otherwise: 10-byte header with 64-bit extended length
    ///
    /// The 4-byte masking key follows when the frame has one.
    pub fn write_hdr(&mut self, frame: &Frame, length: u64) {
        let octet1 = if frame.fin { FIN } else { 0 }
            | if frame.rsv1 { RSV1 } else { 0 }
            | if frame.rsv2 { RSV2 } else { 0 }
            | if frame.rsv3 { RSV3 } else { 0 }
            | frame.opcode as u8;
        let mask_bit = if frame.masking_key.is_some() { MASK } else { 0 };
        let writer = &mut self.writer;
        writer.ensure_capacity(14 + length as usize);
        writer.u8(octet1);
        if length <= 125 {
            writer.u8(mask_bit | length as u8);
        } else if length <= 0xffff {
            writer.u8(mask_bit | 126);
            writer.u16(length as u16);
        } else {
            writer.u8(mask_bit | 127);
            writer.u64(length);
        }
        if let Some(key) = frame.masking_key {
            writer.buf(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_frame() {
        let mut encoder = FrameEncoder::new();
        let bytes = encoder.encode(&Frame::new(Opcode::Text, b"Hello".to_vec()));
        assert_eq!(bytes, vec![0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
    }

    #[test]
    fn medium_frame_uses_16_bit_length() {
        let mut encoder = FrameEncoder::new();
        let payload = b"Hello".repeat(40);
        let bytes = encoder.encode(&Frame::new(Opcode::Text, payload.clone()));
        assert_eq!(&bytes[..4], &[0x81, 0x7e, 0x00, 0xc8]);
        assert_eq!(&bytes[4..], payload.as_slice());
    }

    #[test]
    fn large_frame_uses_64_bit_length() {
        let mut encoder = FrameEncoder::new();
        let payload = vec![0u8; 65536];
        let bytes = encoder.encode(&Frame::new(Opcode::Binary, payload));
        assert_eq!(&bytes[..10], &[0x82, 0x7f, 0, 0, 0, 0, 0, 1, 0, 0]);
        assert_eq!(bytes.len(), 10 + 65536);
    }

    #[test]
    fn masked_frame_carries_key_and_masked_payload() {
        let mut encoder = FrameEncoder::new();
        let frame = Frame::new(Opcode::Text, b"Hello".to_vec()).with_masking_key([1, 2, 3, 4]);
        let bytes = encoder.encode(&frame);
        assert_eq!(
            bytes,
            vec![0x81, 0x85, 1, 2, 3, 4, 0x49, 0x67, 0x6f, 0x68, 0x6e]
        );
    }

    #[test]
    fn header_bits() {
        let mut encoder = FrameEncoder::new();
        let frame = Frame::new(Opcode::Continuation, vec![])
            .with_fin(false)
            .with_rsv(true, false, true);
        assert_eq!(encoder.encode(&frame), vec![0x50, 0x00]);
    }

    #[test]
    fn close_frame_payload() {
        let mut encoder = FrameEncoder::new();
        assert_eq!(
            encoder.encode_close(1000, "Hello", None),
            vec![0x88, 0x07, 0x03, 0xe8, 0x48, 0x65, 0x6c, 0x6c, 0x6f]
        );
    }
}
