//! Decoding of the Locator's binary datagrams.
//!
//! Decoding is pure: [decode] looks at a single buffer and has no state, so it can be called
//!  concurrently on independent buffers. There is no framing on the wire, each chunk is expected
//!  to start with a datagram.

pub mod control_mode;
pub mod decode_error;
pub mod laser_scan;
pub mod mode_state;
pub mod pose;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::anyhow;

use crate::datagram::control_mode::ControlModeDatagram;
use crate::datagram::decode_error::{DecodeError, Violations};
use crate::datagram::laser_scan::LaserScanDatagram;
use crate::datagram::pose::PoseDatagram;


#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum DatagramFormat {
    Pose,
    LaserScan,
    ControlMode,
}

impl DatagramFormat {
    /// The port on which a Locator publishes this format by default
    pub fn default_port(&self) -> u16 {
        match self {
            DatagramFormat::Pose => 9011,
            DatagramFormat::LaserScan => 9021,
            DatagramFormat::ControlMode => 9004,
        }
    }

    /// The least number of bytes a buffer must have to possibly hold a datagram of this format
    pub fn min_len(&self) -> usize {
        match self {
            DatagramFormat::Pose => PoseDatagram::SERIALIZED_LEN,
            DatagramFormat::LaserScan => LaserScanDatagram::HEADER_LEN + LaserScanDatagram::TAIL_LEN,
            DatagramFormat::ControlMode => ControlModeDatagram::SERIALIZED_LEN,
        }
    }
}

impl Display for DatagramFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DatagramFormat::Pose => "pose",
            DatagramFormat::LaserScan => "laser-scan",
            DatagramFormat::ControlMode => "control-mode",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DatagramFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<DatagramFormat> {
        match s {
            "pose" => Ok(DatagramFormat::Pose),
            "laser-scan" => Ok(DatagramFormat::LaserScan),
            "control-mode" => Ok(DatagramFormat::ControlMode),
            _ => Err(anyhow!("unknown datagram format {:?} - expected one of pose, laser-scan, control-mode", s)),
        }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub enum Datagram {
    Pose(PoseDatagram),
    LaserScan(LaserScanDatagram),
    ControlMode(ControlModeDatagram),
}

impl Datagram {
    pub fn format(&self) -> DatagramFormat {
        match self {
            Datagram::Pose(_) => DatagramFormat::Pose,
            Datagram::LaserScan(_) => DatagramFormat::LaserScan,
            Datagram::ControlMode(_) => DatagramFormat::ControlMode,
        }
    }
}

/// A successfully framed datagram.
///
/// `violations` holds the field errors ([DecodeError::FieldOutOfRange],
///  [DecodeError::UnmappedState]) found while decoding; the datagram itself is complete
///  regardless.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub datagram: Datagram,
    /// number of bytes the datagram occupied at the start of the buffer
    pub consumed: usize,
    pub violations: Vec<DecodeError>,
}

/// Decodes the datagram at the start of `buf`. Trailing bytes are ignored, see
///  [Decoded::consumed].
///
/// Fails with [DecodeError::Truncated] if the buffer is too short for the fixed part of the format,
///  or if a length-prefixed array extends beyond the end of the buffer.
pub fn decode(buf: &[u8], format: DatagramFormat) -> Result<Decoded, DecodeError> {
    let mut remaining = buf;
    let mut violations = Violations::default();

    let datagram = match format {
        DatagramFormat::Pose => Datagram::Pose(PoseDatagram::try_deser(&mut remaining, &mut violations)?),
        DatagramFormat::LaserScan => Datagram::LaserScan(LaserScanDatagram::try_deser(&mut remaining, &mut violations)?),
        DatagramFormat::ControlMode => Datagram::ControlMode(ControlModeDatagram::try_deser(&mut remaining, &mut violations)?),
    };

    Ok(Decoded {
        datagram,
        consumed: buf.len() - remaining.len(),
        violations: violations.into_vec(),
    })
}
