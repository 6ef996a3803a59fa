mod common;

use common::{draft76_body, draft76_env, draft76_signature, record, Events, Wire};
use websocket_driver::{CloseEvent, Driver, DriverOptions, Env, EventKind, ReadyState};

const RESPONSE: &str = "HTTP/1.1 101 WebSocket Protocol Handshake\r\n\
    Upgrade: WebSocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Origin: http://www.example.com\r\n\
    Sec-WebSocket-Location: ws://www.example.com/socket\r\n\
    \r\n";

fn driver(env: Env) -> (Driver, Wire, Events) {
    let wire = Wire::new();
    let mut driver = Driver::rack(env, wire.transport(), DriverOptions::new());
    let events = record(&mut driver);
    (driver, wire, events)
}

fn open() -> (Driver, Wire, Events) {
    let (mut driver, wire, events) = driver(draft76_env().with_body(draft76_body()));
    driver.start().unwrap();
    wire.take();
    (driver, wire, events)
}

#[test]
fn body_in_the_request_completes_the_handshake_on_start() {
    let (mut driver, wire, events) = driver(draft76_env().with_body(draft76_body()));
    assert_eq!(driver.version(), "hixie-76");
    assert!(driver.start().unwrap());
    let writes = wire.writes();
    assert_eq!(String::from_utf8(writes[0].clone()).unwrap(), RESPONSE);
    assert_eq!(writes[1], draft76_signature());
    assert_eq!(driver.state(), ReadyState::Open);
    assert_eq!(events.kinds(), vec![EventKind::Open]);
}

#[test]
fn signature_waits_for_the_body() {
    let (mut driver, wire, events) = driver(draft76_env());
    driver.start().unwrap();
    assert_eq!(wire.text(), RESPONSE);
    assert_eq!(driver.state(), ReadyState::Connecting);
    assert!(events.all().is_empty());

    let body = draft76_body();
    driver.parse(&body[..3]).unwrap();
    assert_eq!(driver.state(), ReadyState::Connecting);
    driver.parse(&body[3..]).unwrap();
    assert_eq!(wire.last().unwrap(), draft76_signature());
    assert_eq!(driver.state(), ReadyState::Open);
    assert_eq!(events.kinds(), vec![EventKind::Open]);
}

#[test]
fn body_received_before_start_is_kept() {
    let (mut driver, wire, _) = driver(draft76_env());
    driver.parse(&draft76_body()).unwrap();
    assert!(wire.is_empty());
    driver.start().unwrap();
    assert_eq!(wire.last().unwrap(), draft76_signature());
    assert_eq!(driver.state(), ReadyState::Open);
}

#[test]
fn frames_following_the_body_are_parsed() {
    let (mut driver, _, events) = driver(draft76_env());
    driver.start().unwrap();
    let mut data = draft76_body();
    data.extend_from_slice(b"\x00Hello\xff");
    driver.parse(&data).unwrap();
    assert_eq!(events.texts(), vec!["Hello"]);
}

#[test]
fn frames_behind_the_body_survive_a_failing_open_listener() {
    let (mut driver, wire, events) = driver(draft76_env());
    driver.on(EventKind::Open, |_| Err("open refused".into()));
    driver.start().unwrap();

    let mut bytes = draft76_body();
    bytes.extend_from_slice(b"\x00Hi\xff");
    let err = driver.parse(&bytes).unwrap_err();
    assert_eq!(err.to_string(), "event listener failed: open refused");
    assert_eq!(wire.last().unwrap(), draft76_signature());
    assert_eq!(events.texts(), vec!["Hi"]);

    driver.parse(b"\x00Yo\xff").unwrap();
    assert_eq!(events.texts(), vec!["Hi", "Yo"]);
}

#[test]
fn messages_queued_before_open_follow_the_signature() {
    let (mut driver, wire, _) = driver(draft76_env());
    driver.start().unwrap();
    assert!(driver.text("early").unwrap());
    driver.parse(&draft76_body()).unwrap();
    let writes = wire.writes();
    assert_eq!(writes[writes.len() - 2], draft76_signature());
    assert_eq!(writes[writes.len() - 1], b"\x00early\xff");
}

#[test]
fn invalid_keys_get_a_400() {
    let env = draft76_env().with_header("Sec-WebSocket-Key1", "2 L785 8o% s9Sy9@V. 4<1P5");
    let (mut driver, wire, events) = driver(env);
    assert!(driver.start().unwrap());
    assert_eq!(
        wire.text(),
        "HTTP/1.1 400 Bad Request\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: 45\r\n\
         \r\n\
         Client sent invalid Sec-WebSocket-Key headers"
    );
    assert_eq!(
        events.errors(),
        vec!["Client sent invalid Sec-WebSocket-Key headers"]
    );
    assert_eq!(events.closes(), vec![CloseEvent::new(1000, "")]);
    assert_eq!(driver.state(), ReadyState::Closed);

    driver.parse(&draft76_body()).unwrap();
    assert_eq!(events.all().len(), 2);
}

#[test]
fn closing_frame_from_the_peer_is_echoed() {
    let (mut driver, wire, events) = open();
    driver.parse(&[0xff, 0x00]).unwrap();
    assert_eq!(wire.writes(), vec![vec![0xff, 0x00]]);
    assert_eq!(events.closes(), vec![CloseEvent::new(1000, "")]);
    assert_eq!(driver.state(), ReadyState::Closed);
}

#[test]
fn close_sends_a_closing_frame_when_open() {
    let (mut driver, wire, events) = open();
    assert!(driver.close(None, None).unwrap());
    assert_eq!(wire.writes(), vec![vec![0xff, 0x00]]);
    assert_eq!(events.count(EventKind::Close), 1);
    assert!(!driver.close(None, None).unwrap());
}

#[test]
fn close_before_open_writes_nothing() {
    let (mut driver, wire, events) = driver(draft76_env());
    assert!(driver.close(None, None).unwrap());
    assert!(wire.is_empty());
    assert_eq!(events.closes(), vec![CloseEvent::new(1000, "")]);
    assert!(!driver.start().unwrap());
}

#[test]
fn text_frames_round_trip() {
    let (mut driver, wire, events) = open();
    driver.parse(b"\x00\xe2\x80\x9cquoted\xe2\x80\x9d\xff").unwrap();
    assert_eq!(events.texts(), vec!["\u{201c}quoted\u{201d}"]);
    assert!(driver.text("reply").unwrap());
    assert_eq!(wire.last().unwrap(), b"\x00reply\xff");
}
