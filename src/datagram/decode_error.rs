use std::ops::RangeInclusive;

/// Failure to interpret a datagram buffer.
///
/// [DecodeError::Truncated] is a framing error: the chunk cannot be decoded and is dropped. The
///  other variants are field errors: they are collected in [super::Decoded::violations] and never
///  abort decoding of the rest of the record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated datagram: {needed} bytes needed, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("field {field} out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: f64 },

    #[error("field {field} has unmapped state value {value}")]
    UnmappedState { field: &'static str, value: i64 },
}

impl From<bytes::TryGetError> for DecodeError {
    fn from(e: bytes::TryGetError) -> Self {
        DecodeError::Truncated {
            needed: e.requested,
            remaining: e.available,
        }
    }
}


/// Collects field errors while a record is being decoded
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<DecodeError>);

impl Violations {
    pub fn check_range(&mut self, field: &'static str, value: f64, range: RangeInclusive<f64>) {
        // NaN is never in range
        if !range.contains(&value) {
            self.0.push(DecodeError::FieldOutOfRange { field, value });
        }
    }

    pub fn check_all(&mut self, field: &'static str, values: &[f32], range: RangeInclusive<f64>) {
        for &value in values {
            self.check_range(field, value.into(), range.clone());
        }
    }

    pub fn push(&mut self, violation: DecodeError) {
        self.0.push(violation);
    }

    pub fn into_vec(self) -> Vec<DecodeError> {
        self.0
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_buf_getter_failure_is_truncation() {
        use bytes::Buf;

        let mut buf: &[u8] = b"\x01\x02\x03";
        let result: Result<f64, DecodeError> = buf.try_get_f64_le().map_err(Into::into);
        assert_eq!(result, Err(DecodeError::Truncated { needed: 8, remaining: 3 }));
    }

    #[test]
    fn test_check_range() {
        let mut violations = Violations::default();
        violations.check_range("a", 0.0, -1.0..=1.0);
        violations.check_range("b", 1.0, -1.0..=1.0);
        violations.check_range("c", 1.5, -1.0..=1.0);
        violations.check_range("d", f64::NAN, -1.0..=1.0);

        let violations = violations.into_vec();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0], DecodeError::FieldOutOfRange { field: "c", value: 1.5 });
        assert!(matches!(violations[1], DecodeError::FieldOutOfRange { field: "d", .. }));
    }

    #[test]
    fn test_check_all_reports_every_offending_element() {
        let mut violations = Violations::default();
        violations.check_all("ranges", &[1.0, 2e4, -3e4, 5.0], -1e4..=1e4);

        assert_eq!(violations.into_vec(), vec![
            DecodeError::FieldOutOfRange { field: "ranges", value: 2e4 },
            DecodeError::FieldOutOfRange { field: "ranges", value: -3e4 },
        ]);
    }
}
