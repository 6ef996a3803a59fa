//! Streaming byte reader for reading across chunk boundaries.

use std::collections::VecDeque;

/// Error returned by [`StreamReader::push`] when the configured backlog
/// capacity would be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stream backlog of {requested} bytes exceeds capacity of {capacity} bytes")]
pub struct CapacityError {
    pub capacity: usize,
    pub requested: usize,
}

/// A streaming reader that manages a queue of received chunks.
///
/// Chunks are never merged on arrival. A read either returns exactly the
/// requested number of bytes and advances past them, or returns `None` and
/// leaves the queue untouched so the caller can retry once more data has been
/// pushed. Fully consumed chunks are dropped from the front of the queue, so
/// appends and reads are amortized O(1) per byte regardless of how small the
/// pushed chunks are.
///
/// # Example
///
/// ```
/// use websocket_driver_buffers::StreamReader;
///
/// let mut reader = StreamReader::new();
/// reader.push(vec![0x81]).unwrap();
/// assert_eq!(reader.read(2), None);
/// reader.push(vec![0x05]).unwrap();
/// assert_eq!(reader.read(2), Some(vec![0x81, 0x05]));
/// ```
#[derive(Debug, Default)]
pub struct StreamReader {
    chunks: VecDeque<Vec<u8>>,
    /// Current position within the front chunk.
    x: usize,
    /// Total size of all queued chunks, including consumed front bytes.
    chunk_size: usize,
    capacity: Option<usize>,
}

impl StreamReader {
    /// Creates an unbounded reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reader whose unread backlog may never exceed `capacity`.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Returns the number of bytes remaining to be read.
    pub fn size(&self) -> usize {
        self.chunk_size - self.x
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Appends a chunk of received data.
    ///
    /// Empty chunks are ignored. Fails without queueing anything if the unread
    /// backlog would grow past the configured capacity.
    pub fn push(&mut self, chunk: Vec<u8>) -> Result<(), CapacityError> {
        if chunk.is_empty() {
            return Ok(());
        }
        if let Some(capacity) = self.capacity {
            let requested = self.size() + chunk.len();
            if requested > capacity {
                return Err(CapacityError {
                    capacity,
                    requested,
                });
            }
        }
        self.chunk_size += chunk.len();
        self.chunks.push_back(chunk);
        Ok(())
    }

    /// Reads exactly `size` bytes if they are all available.
    pub fn read(&mut self, size: usize) -> Option<Vec<u8>> {
        if size > self.size() {
            return None;
        }
        let mut out = Vec::with_capacity(size);
        let mut remaining = size;
        while remaining > 0 {
            let Some(chunk) = self.chunks.front() else {
                break;
            };
            let available = chunk.len() - self.x;
            let take = available.min(remaining);
            out.extend_from_slice(&chunk[self.x..self.x + take]);
            remaining -= take;
            if take == available {
                self.pop_front();
            } else {
                self.x += take;
            }
        }
        Some(out)
    }

    /// Reads a single byte if one is available.
    pub fn read_u8(&mut self) -> Option<u8> {
        let chunk = self.chunks.front()?;
        let octet = chunk[self.x];
        self.x += 1;
        if self.x >= chunk.len() {
            self.pop_front();
        }
        Some(octet)
    }

    /// Removes and returns every unread byte.
    pub fn drain(&mut self) -> Vec<u8> {
        let size = self.size();
        self.read(size).unwrap_or_default()
    }

    /// Drops every queued byte.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.x = 0;
        self.chunk_size = 0;
    }

    fn pop_front(&mut self) {
        if let Some(chunk) = self.chunks.pop_front() {
            self.chunk_size -= chunk.len();
        }
        self.x = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_chunk() {
        let mut reader = StreamReader::new();
        reader.push(vec![1, 2, 3]).unwrap();
        assert_eq!(reader.read(2), Some(vec![1, 2]));
        assert_eq!(reader.size(), 1);
        assert_eq!(reader.read(1), Some(vec![3]));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_across_chunks() {
        let mut reader = StreamReader::new();
        reader.push(vec![1, 2]).unwrap();
        reader.push(vec![3]).unwrap();
        reader.push(vec![4, 5]).unwrap();
        assert_eq!(reader.read(4), Some(vec![1, 2, 3, 4]));
        assert_eq!(reader.read(1), Some(vec![5]));
    }

    #[test]
    fn test_short_read_leaves_buffer_untouched() {
        let mut reader = StreamReader::new();
        reader.push(vec![1, 2, 3]).unwrap();
        assert_eq!(reader.read(4), None);
        assert_eq!(reader.size(), 3);
        reader.push(vec![4]).unwrap();
        assert_eq!(reader.read(4), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_zero_length_read() {
        let mut reader = StreamReader::new();
        assert_eq!(reader.read(0), Some(vec![]));
    }

    #[test]
    fn test_read_u8() {
        let mut reader = StreamReader::new();
        reader.push(vec![7]).unwrap();
        reader.push(vec![8]).unwrap();
        assert_eq!(reader.read_u8(), Some(7));
        assert_eq!(reader.read_u8(), Some(8));
        assert_eq!(reader.read_u8(), None);
    }

    #[test]
    fn test_capacity_limit() {
        let mut reader = StreamReader::with_capacity_limit(4);
        reader.push(vec![1, 2, 3]).unwrap();
        let err = reader.push(vec![4, 5]).unwrap_err();
        assert_eq!(
            err,
            CapacityError {
                capacity: 4,
                requested: 5
            }
        );
        assert_eq!(reader.size(), 3);
        assert_eq!(reader.read(2), Some(vec![1, 2]));
        reader.push(vec![4, 5]).unwrap();
        assert_eq!(reader.drain(), vec![3, 4, 5]);
    }

    #[test]
    fn test_many_single_byte_chunks() {
        let mut reader = StreamReader::new();
        for i in 0..10_000u32 {
            reader.push(vec![(i % 251) as u8]).unwrap();
        }
        let all = reader.read(10_000).unwrap();
        assert_eq!(all.len(), 10_000);
        assert_eq!(all[250], 250);
        assert_eq!(all[251], 0);
        assert!(reader.is_empty());
    }
}
