use byteorder::{BigEndian, ByteOrder};

/// Numeric value storable in a binned array
///
/// Each element type is identified in files by a one-byte type code and is
/// stored big-endian with a fixed width.
pub trait Element: Copy + PartialEq + std::fmt::Debug + 'static {
    /// One-byte type code written to the file header
    const TYPECODE: u8;

    /// Serialized width in bytes
    const SIZE: usize;

    /// Value used when no default is configured (NaN for floats, zero otherwise)
    const MISSING: Self;

    /// Decodes one value from the first `SIZE` bytes of `buf`
    fn read_be(buf: &[u8]) -> Self;

    /// Encodes the value into the first `SIZE` bytes of `buf`
    fn write_be(self, buf: &mut [u8]);
}

macro_rules! impl_element {
    ($t:ty, $code:literal, $missing:expr, $read:ident, $write:ident) => {
        impl Element for $t {
            const TYPECODE: u8 = $code;
            const SIZE: usize = std::mem::size_of::<$t>();
            const MISSING: Self = $missing;

            #[inline]
            fn read_be(buf: &[u8]) -> Self {
                BigEndian::$read(buf)
            }

            #[inline]
            fn write_be(self, buf: &mut [u8]) {
                BigEndian::$write(buf, self);
            }
        }
    };
}

impl_element!(f32, b'f', f32::NAN, read_f32, write_f32);
impl_element!(f64, b'd', f64::NAN, read_f64, write_f64);
impl_element!(i16, b'h', 0, read_i16, write_i16);
impl_element!(u16, b'H', 0, read_u16, write_u16);
impl_element!(i32, b'i', 0, read_i32, write_i32);
impl_element!(u32, b'I', 0, read_u32, write_u32);

impl Element for u8 {
    const TYPECODE: u8 = b'B';
    const SIZE: usize = 1;
    const MISSING: Self = 0;

    fn read_be(buf: &[u8]) -> Self {
        buf[0]
    }

    fn write_be(self, buf: &mut [u8]) {
        buf[0] = self;
    }
}

impl Element for i8 {
    const TYPECODE: u8 = b'b';
    const SIZE: usize = 1;
    const MISSING: Self = 0;

    fn read_be(buf: &[u8]) -> Self {
        buf[0] as i8
    }

    fn write_be(self, buf: &mut [u8]) {
        buf[0] = self as u8;
    }
}

/// Type codes of every supported element type
pub const KNOWN_TYPECODES: &[u8] = b"fdbBhHiI";

/// Encodes a run of values as contiguous big-endian bytes
pub(crate) fn encode<T: Element>(values: &[T]) -> Vec<u8> {
    let mut bytes = vec![0u8; values.len() * T::SIZE];
    bytes
        .chunks_exact_mut(T::SIZE)
        .zip(values)
        .for_each(|(chunk, &v)| v.write_be(chunk));
    bytes
}

/// Decodes contiguous big-endian bytes; a trailing partial value is ignored
pub(crate) fn decode<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::SIZE).map(T::read_be).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        assert_eq!(encode(&[1u32, 0x0102_0304]), vec![0, 0, 0, 1, 1, 2, 3, 4]);
        assert_eq!(encode(&[-2i16]), vec![0xFF, 0xFE]);
        assert_eq!(encode(&[-1i8, 5]), vec![0xFF, 5]);
        assert_eq!(encode(&[1.0f32]), vec![0x3F, 0x80, 0, 0]);
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode::<u16>(&[0, 7, 1, 0, 9]), vec![7, 256]);
        assert_eq!(decode::<f64>(&encode(&[0.5f64, -3.25])), vec![0.5, -3.25]);
        assert!(decode::<f32>(&encode(&[f32::NAN]))[0].is_nan());
    }

    #[test]
    fn test_typecodes_are_known() {
        for code in [
            f32::TYPECODE,
            f64::TYPECODE,
            i8::TYPECODE,
            u8::TYPECODE,
            i16::TYPECODE,
            u16::TYPECODE,
            i32::TYPECODE,
            u32::TYPECODE,
        ] {
            assert!(KNOWN_TYPECODES.contains(&code));
        }
    }
}
