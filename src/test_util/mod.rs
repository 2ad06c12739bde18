//! Utilities for testing code that consumes datagrams or chunks. They are used by this crate's
//!  own tests, and they are exported for application testing, which is why they are part of the
//!  crate's regular (non-#[cfg(test)]) code.

pub mod datagram;
pub mod sink;
