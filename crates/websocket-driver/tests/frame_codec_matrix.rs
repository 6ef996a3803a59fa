use websocket_driver::ws::{CloseCode, Frame, FrameEncoder, FrameHandler, FrameParser, Message, Opcode};
use websocket_driver::DriverError;

#[derive(Default)]
struct Recorder {
    messages: Vec<Message>,
    closes: Vec<(u16, String)>,
    pings: Vec<Vec<u8>>,
    errors: Vec<(CloseCode, String)>,
}

impl FrameHandler for Recorder {
    fn valid_frame_rsv(&self, frame: &Frame) -> bool {
        !(frame.rsv2 || frame.rsv3)
    }

    fn handle_message(&mut self, message: Message) -> Result<(), DriverError> {
        self.messages.push(message);
        Ok(())
    }

    fn handle_close(&mut self, code: u16, reason: String) -> Result<(), DriverError> {
        self.closes.push((code, reason));
        Ok(())
    }

    fn handle_ping(&mut self, payload: Vec<u8>) -> Result<(), DriverError> {
        self.pings.push(payload);
        Ok(())
    }

    fn handle_pong(&mut self, _payload: Vec<u8>) -> Result<(), DriverError> {
        Ok(())
    }

    fn handle_error(&mut self, code: CloseCode, message: String) -> Result<(), DriverError> {
        self.errors.push((code, message));
        Ok(())
    }
}

#[test]
fn header_length_encoding_matrix() {
    let cases: [(usize, &[u8]); 6] = [
        (0, &[0x82, 0x00]),
        (125, &[0x82, 0x7d]),
        (126, &[0x82, 0x7e, 0x00, 0x7e]),
        (65_535, &[0x82, 0x7e, 0xff, 0xff]),
        (65_536, &[0x82, 0x7f, 0, 0, 0, 0, 0, 0x01, 0x00, 0x00]),
        (70_000, &[0x82, 0x7f, 0, 0, 0, 0, 0, 0x01, 0x11, 0x70]),
    ];
    let mut encoder = FrameEncoder::new();
    for (length, header) in cases {
        let bytes = encoder.encode(&Frame::new(Opcode::Binary, vec![0x2a; length]));
        assert_eq!(&bytes[..header.len()], header, "length {length}");
        assert_eq!(bytes.len(), header.len() + length, "length {length}");
    }
}

#[test]
fn boundary_lengths_decode_exactly() {
    let mut encoder = FrameEncoder::new();
    for length in [0usize, 125, 126, 65_535, 65_536] {
        for key in [None, Some([0x11, 0x22, 0x33, 0x44])] {
            let mut frame = Frame::new(Opcode::Binary, vec![0x5a; length]);
            if let Some(key) = key {
                frame = frame.with_masking_key(key);
            }
            let bytes = encoder.encode(&frame);
            let mut parser = FrameParser::new();
            let mut rec = Recorder::default();
            parser.parse(&bytes, &mut rec).unwrap();
            assert!(rec.errors.is_empty(), "length {length}");
            assert_eq!(rec.messages.len(), 1, "length {length}");
            assert_eq!(rec.messages[0].data.len(), length, "length {length}");
            assert!(rec.messages[0].data.iter().all(|&b| b == 0x5a), "length {length}");
        }
    }
}

#[test]
fn masked_headers_carry_the_key() {
    let key = [0xde, 0xad, 0xbe, 0xef];
    let mut encoder = FrameEncoder::new();
    let short = encoder.encode(&Frame::new(Opcode::Text, b"Hi".to_vec()).with_masking_key(key));
    assert_eq!(&short[..6], &[0x81, 0x82, 0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(&short[6..], &[b'H' ^ 0xde, b'i' ^ 0xad]);

    let medium = encoder.encode(&Frame::new(Opcode::Text, vec![0; 200]).with_masking_key(key));
    assert_eq!(&medium[..8], &[0x81, 0xfe, 0x00, 0xc8, 0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn first_byte_matrix() {
    let cases = [
        (Frame::new(Opcode::Text, vec![]), 0x81),
        (Frame::new(Opcode::Binary, vec![]).with_fin(false), 0x02),
        (Frame::new(Opcode::Continuation, vec![]), 0x80),
        (Frame::new(Opcode::Close, vec![]), 0x88),
        (Frame::new(Opcode::Ping, vec![]), 0x89),
        (Frame::new(Opcode::Pong, vec![]), 0x8a),
        (Frame::new(Opcode::Text, vec![]).with_rsv(true, false, false), 0xc1),
        (Frame::new(Opcode::Text, vec![]).with_rsv(false, true, true), 0xb1),
    ];
    let mut encoder = FrameEncoder::new();
    for (frame, first) in cases {
        assert_eq!(encoder.encode(&frame)[0], first, "{frame:?}");
    }
}

#[test]
fn close_frames() {
    let mut encoder = FrameEncoder::new();
    assert_eq!(
        encoder.encode_close(1000, "bye", None),
        vec![0x88, 0x05, 0x03, 0xe8, b'b', b'y', b'e']
    );
    let masked = encoder.encode_close(4000, "", Some([1, 2, 3, 4]));
    assert_eq!(masked, vec![0x88, 0x82, 1, 2, 3, 4, 0x0f ^ 1, 0xa0 ^ 2]);

    let mut parser = FrameParser::new().with_require_masking(true);
    let mut rec = Recorder::default();
    parser.parse(&masked, &mut rec).unwrap();
    assert_eq!(rec.closes, vec![(4000, String::new())]);
}

#[test]
fn fragmented_message_with_an_interleaved_ping() {
    let mut encoder = FrameEncoder::new();
    let mut stream = Vec::new();
    stream.extend(encoder.encode(&Frame::new(Opcode::Text, b"Hel".to_vec()).with_fin(false)));
    stream.extend(encoder.encode(&Frame::new(Opcode::Ping, b"p".to_vec())));
    stream.extend(encoder.encode(&Frame::new(Opcode::Continuation, b"lo".to_vec()).with_fin(false)));
    stream.extend(encoder.encode(&Frame::new(Opcode::Continuation, b"!".to_vec())));

    let mut parser = FrameParser::new();
    let mut rec = Recorder::default();
    parser.parse(&stream, &mut rec).unwrap();
    assert_eq!(rec.pings, vec![b"p".to_vec()]);
    assert_eq!(rec.messages.len(), 1);
    assert_eq!(rec.messages[0].opcode, Opcode::Text);
    assert_eq!(rec.messages[0].data, b"Hello!");
    assert_eq!(rec.messages[0].frames, 3);
    assert!(!parser.has_pending_message());
}

#[test]
fn rsv_bits_reach_the_message() {
    let mut encoder = FrameEncoder::new();
    let bytes = encoder.encode(&Frame::new(Opcode::Binary, vec![1]).with_rsv(true, false, false));
    let mut parser = FrameParser::new();
    let mut rec = Recorder::default();
    parser.parse(&bytes, &mut rec).unwrap();
    assert!(rec.messages[0].rsv1);

    let bytes = encoder.encode(&Frame::new(Opcode::Binary, vec![1]).with_rsv(false, true, false));
    let mut parser = FrameParser::new();
    let mut rec = Recorder::default();
    parser.parse(&bytes, &mut rec).unwrap();
    assert!(rec.messages.is_empty());
    assert_eq!(
        rec.errors,
        vec![(
            CloseCode::ProtocolError,
            "One or more reserved bits are on: reserved1 = 0, reserved2 = 1, reserved3 = 0".to_string()
        )]
    );
}

#[test]
fn large_masked_frame_with_required_masking() {
    let payload: Vec<u8> = (0..70_000u32).map(|i| (i % 251) as u8).collect();
    let mut encoder = FrameEncoder::new();
    let bytes = encoder.encode(&Frame::new(Opcode::Binary, payload.clone()).with_masking_key([9, 8, 7, 6]));
    let mut parser = FrameParser::new().with_require_masking(true);
    let mut rec = Recorder::default();
    for chunk in bytes.chunks(4096) {
        parser.parse(chunk, &mut rec).unwrap();
    }
    assert!(rec.errors.is_empty());
    assert_eq!(rec.messages[0].data, payload);
}

#[test]
fn halted_parser_ignores_input() {
    let mut parser = FrameParser::new();
    let mut rec = Recorder::default();
    parser.parse(&[0x83, 0x00], &mut rec).unwrap();
    assert!(parser.is_halted());
    parser.parse(&[0x81, 0x01, b'x'], &mut rec).unwrap();
    assert!(rec.messages.is_empty());
    assert_eq!(rec.errors.len(), 1);
}
