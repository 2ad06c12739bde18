use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::datagram::decode_error::DecodeError;

/// State of the localization system or of one of its control modes. The same numbering is used
///  for the pose datagram's `state` field and for each 3-bit field of the control mode word.
///
/// Values 3, 5, 6 and 7 (and anything else) are not assigned; they are reported as
///  [DecodeError::UnmappedState] rather than coerced to some state.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum ModeState {
    Init = 0,
    Ready = 1,
    Run = 2,
    NotAvailable = 4,
}

impl ModeState {
    pub fn try_from_raw(field: &'static str, raw: i64) -> Result<ModeState, DecodeError> {
        u8::try_from(raw).ok()
            .and_then(|v| ModeState::try_from_primitive(v).ok())
            .ok_or(DecodeError::UnmappedState { field, value: raw })
    }
}
