//! Binary buffer writer with auto-growing capacity.

/// A binary buffer writer that grows automatically as needed.
///
/// Bytes accumulate until [`flush`](Writer::flush) hands everything written
/// since the previous flush back to the caller.
///
/// # Example
///
/// ```
/// use websocket_driver_buffers::Writer;
///
/// let mut writer = Writer::new();
/// writer.u8(0x81);
/// writer.u16(0x0203);
/// let data = writer.flush();
/// assert_eq!(data, [0x81, 0x02, 0x03]);
/// ```
#[derive(Debug, Default)]
pub struct Writer {
    uint8: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer with room for `capacity` bytes before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            uint8: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written since the last flush.
    pub fn len(&self) -> usize {
        self.uint8.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uint8.is_empty()
    }

    /// Ensures at least `capacity` more bytes can be written without growing.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        self.uint8.reserve(capacity);
    }

    /// Returns the written data and resets the writer.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.uint8)
    }

    /// Writes an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.uint8.push(val);
    }

    /// Writes an unsigned 16-bit integer (big-endian).
    #[inline]
    pub fn u16(&mut self, val: u16) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    /// Writes an unsigned 32-bit integer (big-endian).
    #[inline]
    pub fn u32(&mut self, val: u32) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    /// Writes an unsigned 64-bit integer (big-endian).
    #[inline]
    pub fn u64(&mut self, val: u64) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    /// Writes raw bytes.
    pub fn buf(&mut self, data: &[u8]) {
        self.uint8.extend_from_slice(data);
    }

    /// Writes `data` XOR-ed byte by byte with `mask[i % 4]`.
    pub fn buf_xor(&mut self, data: &[u8], mask: [u8; 4]) {
        self.ensure_capacity(data.len());
        self.uint8
            .extend(data.iter().enumerate().map(|(i, b)| b ^ mask[i & 3]));
    }
}
