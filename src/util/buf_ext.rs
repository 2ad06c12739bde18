use crate::datagram::decode_error::DecodeError;


/// Length checks on top of [bytes::Buf]'s fallible getters, failing with [DecodeError::Truncated]
///  instead of panicking like the plain getters.
pub trait BufExt: bytes::Buf {
    fn ensure_remaining(&self, needed: usize) -> Result<(), DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Reads `len` little-endian f32 values. The length is checked up front, so a short buffer
    ///  never yields a partial array.
    fn try_get_f32_le_array(&mut self, len: usize) -> Result<Vec<f32>, DecodeError> {
        let needed = len.checked_mul(size_of::<f32>())
            .ok_or(DecodeError::Truncated { needed: usize::MAX, remaining: self.remaining() })?;
        self.ensure_remaining(needed)?;

        let mut result = Vec::with_capacity(len);
        for _ in 0..len {
            result.push(self.get_f32_le());
        }
        Ok(result)
    }
}

impl <T: bytes::Buf> BufExt for T {
}
