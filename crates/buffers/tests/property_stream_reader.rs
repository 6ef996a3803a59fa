use proptest::prelude::*;
use websocket_driver_buffers::{StreamReader, Writer};

proptest! {
    #[test]
    fn reads_see_the_concatenated_stream(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..40), 0..10),
        sizes in proptest::collection::vec(0usize..50, 1..20),
    ) {
        let all: Vec<u8> = chunks.concat();
        let mut reader = StreamReader::new();
        for chunk in chunks {
            reader.push(chunk).unwrap();
        }
        prop_assert_eq!(reader.size(), all.len());

        let mut offset = 0;
        for size in sizes {
            match reader.read(size) {
                Some(bytes) => {
                    prop_assert_eq!(&bytes[..], &all[offset..offset + size]);
                    offset += size;
                }
                None => prop_assert!(offset + size > all.len()),
            }
            prop_assert_eq!(reader.size(), all.len() - offset);
        }
        prop_assert_eq!(reader.drain(), all[offset..].to_vec());
        prop_assert!(reader.is_empty());
    }

    #[test]
    fn capacity_bounds_the_unread_backlog(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..20), 1..10),
        capacity in 1usize..60,
    ) {
        let mut reader = StreamReader::with_capacity_limit(capacity);
        for chunk in chunks {
            let before = reader.size();
            let len = chunk.len();
            match reader.push(chunk) {
                Ok(()) => prop_assert_eq!(reader.size(), before + len),
                Err(err) => {
                    prop_assert_eq!(err.requested, before + len);
                    prop_assert_eq!(reader.size(), before);
                }
            }
            prop_assert!(reader.size() <= capacity);
        }
    }

    #[test]
    fn xor_twice_is_identity(data in proptest::collection::vec(any::<u8>(), 0..100), mask in any::<[u8; 4]>()) {
        let mut writer = Writer::new();
        writer.buf_xor(&data, mask);
        let once = writer.flush();
        writer.buf_xor(&once, mask);
        prop_assert_eq!(writer.flush(), data);
    }
}
