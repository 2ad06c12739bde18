use std::fmt::{Debug, Formatter};

use bytes::{Buf, BufMut};

use crate::datagram::decode_error::{DecodeError, Violations};
use crate::datagram::mode_state::ModeState;


/// The control modes packed into a [ControlModeDatagram], in wire order: the first one occupies
///  the three lowest-order bits of the word.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ControlModeField {
    LaserOutput,
    Align,
    Rec,
    Loc,
    Map,
    VisualRecording,
    ExpandMap,
}

impl ControlModeField {
    pub const ALL: [ControlModeField; 7] = [
        ControlModeField::LaserOutput,
        ControlModeField::Align,
        ControlModeField::Rec,
        ControlModeField::Loc,
        ControlModeField::Map,
        ControlModeField::VisualRecording,
        ControlModeField::ExpandMap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ControlModeField::LaserOutput => "LASEROUTPUT",
            ControlModeField::Align => "ALIGN",
            ControlModeField::Rec => "REC",
            ControlModeField::Loc => "LOC",
            ControlModeField::Map => "MAP",
            ControlModeField::VisualRecording => "VISUALRECORDING",
            ControlModeField::ExpandMap => "EXPANDMAP",
        }
    }

    fn shift(&self) -> u32 {
        3 * (*self as u32)
    }
}

/// The Locator's control mode word: seven 3-bit fields, each holding a [ModeState] value, and 11
///  unused high bits.
///
/// The word is read as a little-endian u32 and field `i` is `(word >> 3*i) & 0b111`, i.e. the
///  fields are the octal digits of the word, least significant digit first. Reading the word with
///  swapped byte order is a different (incompatible) interpretation and is not supported.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct ControlModeDatagram {
    pub word: u32,
}

impl ControlModeDatagram {
    pub const SERIALIZED_LEN: usize = 4;
    const FIELD_MASK: u32 = 0b111;

    /// the raw 3-bit value of a field
    pub fn raw(&self, field: ControlModeField) -> u8 {
        ((self.word >> field.shift()) & Self::FIELD_MASK) as u8
    }

    pub fn get(&self, field: ControlModeField) -> Result<ModeState, DecodeError> {
        ModeState::try_from_raw(field.name(), self.raw(field).into())
    }

    pub fn with(mut self, field: ControlModeField, raw: u8) -> ControlModeDatagram {
        let shift = field.shift();
        self.word = (self.word & !(Self::FIELD_MASK << shift)) | ((raw as u32 & Self::FIELD_MASK) << shift);
        self
    }

    pub fn unused_bits(&self) -> u32 {
        self.word >> (3 * ControlModeField::ALL.len())
    }

    pub(crate) fn try_deser(buf: &mut impl Buf, violations: &mut Violations) -> Result<ControlModeDatagram, DecodeError> {
        let result = ControlModeDatagram {
            word: buf.try_get_u32_le()?,
        };

        for field in ControlModeField::ALL {
            if let Err(e) = result.get(field) {
                violations.push(e);
            }
        }
        Ok(result)
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.word);
    }
}

impl Debug for ControlModeDatagram {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("ControlModeDatagram");
        for field in ControlModeField::ALL {
            match self.get(field) {
                Ok(state) => s.field(field.name(), &state),
                Err(_) => s.field(field.name(), &self.raw(field)),
            };
        }
        s.finish()
    }
}
