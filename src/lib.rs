//! Relay for Locator telemetry: decodes the Locator's binary datagrams, and forwards a decimated
//!  stream of raw upstream chunks to any number of downstream TCP clients.

pub mod datagram;
pub mod relay;
pub mod upstream;
pub mod util;
pub mod test_util;
