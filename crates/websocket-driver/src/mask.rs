//! Payload masking (RFC 6455 §5.3).
//!
//! The same XOR transform masks and unmasks, so there is a single entry point
//! for both directions. Every byte is processed; there is no early exit.

/// XORs every byte of `buf` in place with `key[i % 4]`.
#[inline]
pub fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}

/// Returns a masked copy of `payload`.
pub fn mask(payload: &[u8], key: [u8; 4]) -> Vec<u8> {
    let mut out = payload.to_vec();
    apply_mask(&mut out, key);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_with_rotating_key() {
        let out = mask(b"Hello", [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(out, vec![0x49, 0x67, 0x6f, 0x68, 0x6e]);
    }

    #[test]
    fn mask_is_an_involution() {
        let key = [0xde, 0xad, 0xbe, 0xef];
        let payload: Vec<u8> = (0..=255).collect();
        assert_eq!(mask(&mask(&payload, key), key), payload);
    }

    #[test]
    fn empty_payload() {
        assert!(mask(&[], [1, 2, 3, 4]).is_empty());
    }
}
