//! Fixed-width scalar values stored inline in table slots.

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width little-endian value that can be stored inline in a slot.
///
/// Implemented for every signed and unsigned integer width from 8 to 64
/// bits and for `f32`/`f64`. Booleans go through the byte slot.
pub trait Scalar: Copy + PartialEq + sealed::Sealed {
    /// Encoded width in bytes. Also used as the inline alignment.
    const WIDTH: usize;

    /// The value a slot reads as when nothing was written.
    const ZERO: Self;

    /// Appends the little-endian encoding of `self`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decodes a value from the first `WIDTH` bytes.
    ///
    /// Returns `None` if fewer than `WIDTH` bytes are available.
    fn read_le(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_scalar {
    ($($t:ty => $zero:expr),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl Scalar for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();
                const ZERO: Self = $zero;

                #[inline]
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Option<Self> {
                    let raw = bytes.get(..Self::WIDTH)?.try_into().ok()?;
                    Some(<$t>::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_scalar!(
    u8 => 0,
    u16 => 0,
    u32 => 0,
    u64 => 0,
    i8 => 0,
    i16 => 0,
    i32 => 0,
    i64 => 0,
    f32 => 0.0,
    f64 => 0.0,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(u8::WIDTH, 1);
        assert_eq!(i16::WIDTH, 2);
        assert_eq!(f32::WIDTH, 4);
        assert_eq!(u64::WIDTH, 8);
    }

    #[test]
    fn little_endian_layout() {
        let mut out = Vec::new();
        0x0102_0304_u32.write_le(&mut out);
        assert_eq!(out, vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn short_input_reads_none() {
        assert_eq!(u32::read_le(&[1, 2, 3]), None);
        assert_eq!(i64::read_le(&[]), None);
        assert_eq!(u16::read_le(&[1, 0, 9]), Some(1));
    }

    #[test]
    fn negative_and_float_values() {
        let mut out = Vec::new();
        (-2_i16).write_le(&mut out);
        1.5_f64.write_le(&mut out);
        assert_eq!(i16::read_le(&out), Some(-2));
        assert_eq!(f64::read_le(&out[2..]), Some(1.5));
    }
}
