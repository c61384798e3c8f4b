//! Low-level wire primitives for the Portable Object Format.
//!
//! This module has no notion of user types, property indexes, or frames. It only knows how to
//! turn Rust primitive values into POF's packed and fixed-width byte encodings and back.
//!
//! ```
//! use pof::codec::{write_packed_i32, read_packed_i32};
//!
//! let mut buf = Vec::new();
//! write_packed_i32(&mut buf, 64).unwrap();
//! assert_eq!(buf, vec![0x80, 0x01]);
//!
//! let mut cursor = std::io::Cursor::new(&buf);
//! assert_eq!(read_packed_i32(&mut cursor).unwrap(), 64);
//! ```

use std::io::{Read, Write};

use crate::error::{Error, ErrorKind, MalformedError, Result};

const SIGN_BIT: u8 = 0x40;
const CONTINUATION_BIT: u8 = 0x80;
const FIRST_BYTE_PAYLOAD_MASK: u8 = 0x3F;
const TRAILING_BYTE_PAYLOAD_MASK: u8 = 0x7F;

/// Which packed-integer width a [MalformedError::PackedIntOverflow] was decoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PackedWidth {
    I32,
    I64,
    I128,
}

fn overflow(width: PackedWidth) -> Error {
    Error::from(ErrorKind::from(MalformedError::PackedIntOverflow { width }))
}

// --- packed int32 / int64 --------------------------------------------------------------------

macro_rules! define_packed_signed {
    ($write_fn:ident, $read_fn:ident, $uint:ty, $int:ty, $max_trailing_bytes:expr, $width:expr) => {
        /// Encode a packed signed integer per the POF wire format: a sign bit and six payload bits
        /// in the first byte, then seven payload bits per continuation byte, LSB-first.
        pub fn $write_fn<W: Write>(dst: &mut W, value: $int) -> Result<()> {
            let negative = value < 0;
            // Two's-complement bitwise NOT, not arithmetic negation: matches the encoding
            // contract exactly, including at the minimum value of the type.
            let mut magnitude: $uint = if negative { !(value as $uint) } else { value as $uint };

            let mut first = (magnitude as u8) & FIRST_BYTE_PAYLOAD_MASK;
            if negative {
                first |= SIGN_BIT;
            }
            magnitude >>= 6;

            if magnitude == 0 {
                dst.write_all(&[first])?;
                return Ok(());
            }

            first |= CONTINUATION_BIT;
            dst.write_all(&[first])?;

            loop {
                let mut byte = (magnitude as u8) & TRAILING_BYTE_PAYLOAD_MASK;
                magnitude >>= 7;
                if magnitude != 0 {
                    byte |= CONTINUATION_BIT;
                    dst.write_all(&[byte])?;
                } else {
                    dst.write_all(&[byte])?;
                    break;
                }
            }
            Ok(())
        }

        /// Decode a packed signed integer written by the matching `write_*` function.
        pub fn $read_fn<R: Read>(src: &mut R) -> Result<$int> {
            let mut byte = [0u8; 1];
            src.read_exact(&mut byte)?;
            let first = byte[0];
            let negative = first & SIGN_BIT != 0;
            let mut magnitude: $uint = (first & FIRST_BYTE_PAYLOAD_MASK) as $uint;
            let mut shift: u32 = 6;
            let mut cont = first & CONTINUATION_BIT != 0;
            let mut trailing = 0usize;

            while cont {
                trailing += 1;
                if trailing > $max_trailing_bytes {
                    return Err(overflow($width));
                }
                src.read_exact(&mut byte)?;
                let b = byte[0];
                magnitude |= ((b & TRAILING_BYTE_PAYLOAD_MASK) as $uint) << shift;
                shift += 7;
                cont = b & CONTINUATION_BIT != 0;
            }

            let value: $int = if negative { !magnitude as $int } else { magnitude as $int };
            Ok(value)
        }
    };
}

define_packed_signed!(write_packed_i32, read_packed_i32, u32, i32, 4, PackedWidth::I32);
define_packed_signed!(write_packed_i64, read_packed_i64, u64, i64, 9, PackedWidth::I64);

// --- packed int128 (RawInt128) -----------------------------------------------------------------

/// A two's-complement 128-bit integer represented as a big-endian magnitude plus a sign, the way
/// POF carries values too wide for a native machine integer.
///
/// A magnitude of all-zero bytes is zero regardless of the sign flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawInt128 {
    magnitude: Vec<u8>,
    negative: bool,
}

impl RawInt128 {
    /// Build a value from a big-endian magnitude and a sign. The magnitude is not required to be
    /// pre-trimmed of leading zero bytes.
    pub fn new(magnitude: Vec<u8>, negative: bool) -> Self {
        Self { magnitude, negative }
    }

    pub fn zero() -> Self {
        Self {
            magnitude: vec![0],
            negative: false,
        }
    }

    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// True if every magnitude byte is zero, independent of the sign flag.
    pub fn is_zero(&self) -> bool {
        self.magnitude.iter().all(|&b| b == 0)
    }

    fn as_u128(&self) -> Result<u128> {
        let trimmed = match self.magnitude.iter().position(|&b| b != 0) {
            None => return Ok(0),
            Some(pos) => &self.magnitude[pos..],
        };
        if trimmed.len() > 16 {
            return Err(overflow(PackedWidth::I128));
        }
        let mut buf = [0u8; 16];
        buf[16 - trimmed.len()..].copy_from_slice(trimmed);
        Ok(u128::from_be_bytes(buf))
    }

    fn from_u128(value: u128, negative: bool) -> Self {
        if value == 0 {
            return Self::zero();
        }
        let bytes = value.to_be_bytes();
        let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap();
        Self {
            magnitude: bytes[first_nonzero..].to_vec(),
            negative,
        }
    }
}

/// Encode a [RawInt128], sign bit in the first byte, continuation bytes streaming bits from the
/// least significant end.
pub fn write_packed_i128<W: Write>(dst: &mut W, value: &RawInt128) -> Result<()> {
    let mut magnitude = value.as_u128()?;

    let mut first = (magnitude as u8) & FIRST_BYTE_PAYLOAD_MASK;
    if value.is_negative() {
        first |= SIGN_BIT;
    }
    magnitude >>= 6;

    if magnitude == 0 {
        dst.write_all(&[first])?;
        return Ok(());
    }

    first |= CONTINUATION_BIT;
    dst.write_all(&[first])?;

    loop {
        let mut byte = (magnitude as u8) & TRAILING_BYTE_PAYLOAD_MASK;
        magnitude >>= 7;
        if magnitude != 0 {
            byte |= CONTINUATION_BIT;
            dst.write_all(&[byte])?;
        } else {
            dst.write_all(&[byte])?;
            break;
        }
    }
    Ok(())
}

/// Decode a [RawInt128] written by [write_packed_i128].
pub fn read_packed_i128<R: Read>(src: &mut R) -> Result<RawInt128> {
    let mut byte = [0u8; 1];
    src.read_exact(&mut byte)?;
    let first = byte[0];
    let negative = first & SIGN_BIT != 0;
    let mut magnitude: u128 = (first & FIRST_BYTE_PAYLOAD_MASK) as u128;
    let mut shift: u32 = 6;
    let mut cont = first & CONTINUATION_BIT != 0;
    let mut trailing = 0usize;

    while cont {
        trailing += 1;
        if trailing > 18 {
            return Err(overflow(PackedWidth::I128));
        }
        src.read_exact(&mut byte)?;
        let b = byte[0];
        magnitude |= ((b & TRAILING_BYTE_PAYLOAD_MASK) as u128) << shift;
        shift += 7;
        cont = b & CONTINUATION_BIT != 0;
    }

    Ok(RawInt128::from_u128(magnitude, negative))
}

// --- fixed-width big-endian primitives -----------------------------------------------------------

macro_rules! define_fixed_width {
    ($write_fn:ident, $read_fn:ident, $ty:ty) => {
        pub fn $write_fn<W: Write>(dst: &mut W, value: $ty) -> Result<()> {
            dst.write_all(&value.to_be_bytes())?;
            Ok(())
        }

        pub fn $read_fn<R: Read>(src: &mut R) -> Result<$ty> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            src.read_exact(&mut buf)?;
            Ok(<$ty>::from_be_bytes(buf))
        }
    };
}

define_fixed_width!(write_i16, read_i16, i16);
define_fixed_width!(write_u16, read_u16, u16);
define_fixed_width!(write_i32, read_i32, i32);
define_fixed_width!(write_u32, read_u32, u32);
define_fixed_width!(write_i64, read_i64, i64);
define_fixed_width!(write_u64, read_u64, u64);

/// Single-precision float, written big-endian by reinterpreting its IEEE-754 bit pattern as a u32.
pub fn write_f32<W: Write>(dst: &mut W, value: f32) -> Result<()> {
    write_u32(dst, value.to_bits())
}

pub fn read_f32<R: Read>(src: &mut R) -> Result<f32> {
    Ok(f32::from_bits(read_u32(src)?))
}

/// Double-precision float, written big-endian by reinterpreting its IEEE-754 bit pattern as a u64.
pub fn write_f64<W: Write>(dst: &mut W, value: f64) -> Result<()> {
    write_u64(dst, value.to_bits())
}

pub fn read_f64<R: Read>(src: &mut R) -> Result<f64> {
    Ok(f64::from_bits(read_u64(src)?))
}

// --- length-prefixed strings --------------------------------------------------------------------

/// Write a string as a packed int32 length followed by its UTF-8 bytes. `None` is written as
/// length `-1`; `Some("")` is written as length `0` with no payload bytes.
pub fn write_string<W: Write>(dst: &mut W, value: Option<&str>) -> Result<()> {
    match value {
        None => write_packed_i32(dst, -1),
        Some(s) => {
            write_packed_i32(dst, s.len() as i32)?;
            dst.write_all(s.as_bytes())?;
            Ok(())
        }
    }
}

/// Read a string written by [write_string].
pub fn read_string<R: Read>(src: &mut R) -> Result<Option<String>> {
    let len = read_packed_i32(src)?;
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(Error::from(ErrorKind::from(MalformedError::NegativeStringLength(len))));
    }
    let mut buf = vec![0u8; len as usize];
    src.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| Error::from(ErrorKind::from(MalformedError::InvalidUtf8)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_i32_concrete_scenarios() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (-1, &[0x40]),
            (64, &[0x80, 0x01]),
        ];
        for (value, bytes) in cases {
            let mut buf = Vec::new();
            write_packed_i32(&mut buf, *value).unwrap();
            assert_eq!(&buf, bytes, "encoding {}", value);
            let mut cursor = std::io::Cursor::new(&buf);
            assert_eq!(read_packed_i32(&mut cursor).unwrap(), *value);
        }
    }

    #[test]
    fn packed_i32_round_trip_sample() {
        let samples = [
            0,
            1,
            -1,
            63,
            64,
            -64,
            -65,
            i32::MAX,
            i32::MIN,
            1_000_000,
            -1_000_000,
        ];
        for v in samples {
            let mut buf = Vec::new();
            write_packed_i32(&mut buf, v).unwrap();
            assert!(buf.len() <= 5, "{} encoded to {} bytes", v, buf.len());
            let mut cursor = std::io::Cursor::new(&buf);
            assert_eq!(read_packed_i32(&mut cursor).unwrap(), v);
        }
    }

    #[test]
    fn packed_i32_zero_and_minus_one_are_one_byte() {
        let mut buf = Vec::new();
        write_packed_i32(&mut buf, 0).unwrap();
        assert_eq!(buf.len(), 1);
        buf.clear();
        write_packed_i32(&mut buf, -1).unwrap();
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn packed_i32_extremes_fit_in_five_bytes() {
        let mut buf = Vec::new();
        write_packed_i32(&mut buf, i32::MIN).unwrap();
        assert!(buf.len() <= 5);
        buf.clear();
        write_packed_i32(&mut buf, i32::MAX).unwrap();
        assert!(buf.len() <= 5);
    }

    #[test]
    fn packed_i64_round_trip_sample() {
        let samples = [0i64, 1, -1, i64::MAX, i64::MIN, 1 << 40, -(1i64 << 40)];
        for v in samples {
            let mut buf = Vec::new();
            write_packed_i64(&mut buf, v).unwrap();
            assert!(buf.len() <= 10);
            let mut cursor = std::io::Cursor::new(&buf);
            assert_eq!(read_packed_i64(&mut cursor).unwrap(), v);
        }
    }

    #[test]
    fn packed_i32_overflow_is_malformed() {
        // 6 continuation bytes is one more than i32 can ever need.
        let bytes = [0xC0u8, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        let mut cursor = std::io::Cursor::new(&bytes);
        let err = read_packed_i32(&mut cursor).unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::Malformed(MalformedError::PackedIntOverflow { width: PackedWidth::I32 })
        );
    }

    #[test]
    fn raw_int128_zero_is_one_byte_regardless_of_sign() {
        for negative in [true, false] {
            let v = RawInt128::new(vec![0, 0, 0, 0], negative);
            assert!(v.is_zero());
            let mut buf = Vec::new();
            write_packed_i128(&mut buf, &v).unwrap();
            assert_eq!(buf.len(), 1);
            let mut cursor = std::io::Cursor::new(&buf);
            let back = read_packed_i128(&mut cursor).unwrap();
            assert!(back.is_zero());
        }
    }

    #[test]
    fn raw_int128_matches_an_independent_bignum_implementation() {
        use num_bigint::{BigInt, Sign};

        let cases: &[(&[u8], bool)] = &[
            (&[0x01], false),
            (&[0x01], true),
            (&[0xFF, 0xFF, 0xFF, 0xFF], false),
            (&[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0], true),
        ];
        for (magnitude, negative) in cases {
            let expected = BigInt::from_bytes_be(
                if *negative { Sign::Minus } else { Sign::Plus },
                magnitude,
            );

            let value = RawInt128::new(magnitude.to_vec(), *negative);
            let mut buf = Vec::new();
            write_packed_i128(&mut buf, &value).unwrap();
            let mut cursor = std::io::Cursor::new(&buf);
            let back = read_packed_i128(&mut cursor).unwrap();

            let (sign, bytes) = back.as_u128().map(|m| {
                if back.is_negative() && m != 0 {
                    (Sign::Minus, m)
                } else if m == 0 {
                    (Sign::NoSign, m)
                } else {
                    (Sign::Plus, m)
                }
            }).unwrap();
            let actual = BigInt::from_bytes_be(sign, &bytes.to_be_bytes());
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn raw_int128_round_trip() {
        let cases = [
            (vec![0x01], false),
            (vec![0x01], true),
            (vec![0xFF, 0xFF, 0xFF, 0xFF], false),
            (vec![0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], true),
        ];
        for (magnitude, negative) in cases {
            let v = RawInt128::new(magnitude, negative);
            let mut buf = Vec::new();
            write_packed_i128(&mut buf, &v).unwrap();
            let mut cursor = std::io::Cursor::new(&buf);
            let back = read_packed_i128(&mut cursor).unwrap();
            assert_eq!(back.is_negative(), v.is_negative());
            assert_eq!(back.as_u128().unwrap(), v.as_u128().unwrap());
        }
    }

    #[test]
    fn fixed_width_is_big_endian() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0x01020304).unwrap();
        assert_eq!(buf, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn float_bit_patterns_round_trip() {
        let mut buf = Vec::new();
        write_f32(&mut buf, -1.5f32).unwrap();
        let mut cursor = std::io::Cursor::new(&buf);
        assert_eq!(read_f32(&mut cursor).unwrap(), -1.5f32);

        let mut buf = Vec::new();
        write_f64(&mut buf, std::f64::consts::PI).unwrap();
        let mut cursor = std::io::Cursor::new(&buf);
        assert_eq!(read_f64(&mut cursor).unwrap(), std::f64::consts::PI);
    }

    #[test]
    fn string_hi_encodes_as_spec_example() {
        let mut buf = Vec::new();
        write_string(&mut buf, Some("Hi")).unwrap();
        assert_eq!(buf, vec![0x02, 0x48, 0x69]);
    }

    #[test]
    fn string_null_and_empty_sentinels() {
        let mut buf = Vec::new();
        write_string(&mut buf, None).unwrap();
        assert_eq!(buf, vec![0x40]); // packed -1
        let mut cursor = std::io::Cursor::new(&buf);
        assert_eq!(read_string(&mut cursor).unwrap(), None);

        let mut buf = Vec::new();
        write_string(&mut buf, Some("")).unwrap();
        assert_eq!(buf, vec![0x00]);
        let mut cursor = std::io::Cursor::new(&buf);
        assert_eq!(read_string(&mut cursor).unwrap(), Some(String::new()));
    }

    #[test]
    fn string_round_trip() {
        for s in ["", "Hi", "a longer string with spaces", "unicode: héllo wörld 🎉"] {
            let mut buf = Vec::new();
            write_string(&mut buf, Some(s)).unwrap();
            let mut cursor = std::io::Cursor::new(&buf);
            assert_eq!(read_string(&mut cursor).unwrap().as_deref(), Some(s));
        }
    }

    #[test]
    fn negative_string_length_other_than_minus_one_is_malformed() {
        let mut buf = Vec::new();
        write_packed_i32(&mut buf, -2).unwrap();
        let mut cursor = std::io::Cursor::new(&buf);
        let err = read_string(&mut cursor).unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::Malformed(MalformedError::NegativeStringLength(-2))
        );
    }
}
