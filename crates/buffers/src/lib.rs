//! Byte containers shared by the websocket-driver parsers and encoders.
//!
//! - [`StreamReader`]: an append-only queue of received chunks that hands out
//!   exact-size reads once enough bytes have arrived.
//! - [`Writer`]: a growable output buffer with big-endian integer helpers.

mod stream_reader;
mod writer;

pub use stream_reader::{CapacityError, StreamReader};
pub use writer::Writer;
