#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use websocket_driver::{
    CloseEvent, Driver, Env, Event, EventKind, ListenerError, MessageData, Server,
};

pub const ALL_KINDS: [EventKind; 5] = [
    EventKind::Connect,
    EventKind::Open,
    EventKind::Message,
    EventKind::Error,
    EventKind::Close,
];

/// Records every chunk a driver writes.
#[derive(Debug, Clone, Default)]
pub struct Wire(Arc<Mutex<Vec<Vec<u8>>>>);

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> impl FnMut(&[u8]) + Send + 'static {
        let writes = Arc::clone(&self.0);
        move |data: &[u8]| writes.lock().unwrap().push(data.to_vec())
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Vec<u8>> {
        self.0.lock().unwrap().last().cloned()
    }

    pub fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.writes().concat()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

/// Events seen by a driver's listeners, in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct Events(Arc<Mutex<Vec<Event>>>);

impl Events {
    pub fn listener(&self) -> impl FnMut(&Event) -> Result<(), ListenerError> + Send + Sync + 'static {
        let events = Arc::clone(&self.0);
        move |event: &Event| {
            events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    pub fn all(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        use websocket_driver::EventType;
        self.all().iter().map(EventType::kind).collect()
    }

    pub fn messages(&self) -> Vec<MessageData> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Event::Message(data) => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| m.as_text().map(str::to_string))
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(err) => Some(err.message),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<CloseEvent> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Event::Close(close) => Some(close),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

pub fn record(driver: &mut Driver) -> Events {
    let events = Events::default();
    for kind in ALL_KINDS {
        driver.on(kind, events.listener());
    }
    events
}

pub fn record_server(server: &mut Server) -> Events {
    let events = Events::default();
    for kind in ALL_KINDS {
        server.on(kind, events.listener());
    }
    events
}

/// A masked client-to-server frame.
pub fn masked_frame(first_byte: u8, payload: &[u8], key: [u8; 4]) -> Vec<u8> {
    let mut out = vec![first_byte];
    let len = payload.len();
    if len <= 125 {
        out.push(0x80 | len as u8);
    } else if len <= 0xffff {
        out.push(0x80 | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(0x80 | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    out.extend_from_slice(&key);
    out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
    out
}

/// An unmasked server-to-client frame.
pub fn frame_bytes(first_byte: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![first_byte, payload.len() as u8];
    out.extend_from_slice(payload);
    out
}

pub fn hybi_env() -> Env {
    Env::new()
        .with("REQUEST_METHOD", "GET")
        .with("PATH_INFO", "/socket")
        .with("QUERY_STRING", "")
        .with_header("Host", "www.example.com")
        .with_header("Upgrade", "websocket")
        .with_header("Connection", "Upgrade")
        .with_header("Origin", "http://www.example.com")
        .with_header("Sec-WebSocket-Key", "JFBCWHksyIpXV+6Wlq/9pw==")
        .with_header("Sec-WebSocket-Version", "13")
}

pub fn legacy_env() -> Env {
    Env::new()
        .with("REQUEST_METHOD", "GET")
        .with("PATH_INFO", "/socket")
        .with("QUERY_STRING", "")
        .with_header("Host", "www.example.com")
        .with_header("Upgrade", "WebSocket")
        .with_header("Connection", "Upgrade")
        .with_header("Origin", "http://www.example.com")
}

pub fn draft76_body() -> Vec<u8> {
    vec![0x91, 0x25, 0x3e, 0xd3, 0xa9, 0xe7, 0x6a, 0x88]
}

pub fn draft76_env() -> Env {
    legacy_env()
        .with_header("Sec-WebSocket-Key1", "1   38 wZ3f9 23O0 3l 0r")
        .with_header("Sec-WebSocket-Key2", "27   0E 6 2  1665:< ;U 1H")
}

pub fn draft76_signature() -> Vec<u8> {
    vec![
        0xb4, 0x9c, 0x6e, 0x40, 0x53, 0x04, 0x04, 0x26, 0xe5, 0x1b, 0xbf, 0x6c, 0xb7, 0x9f, 0x1d,
        0xf9,
    ]
}
