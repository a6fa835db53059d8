//! Typed tag values decoded from an IFD entry
//!
//! `IFDEntry` stores a tag's raw, not-yet-interpreted `value_offset`/count
//! pair. `TiffValue` is what you get once that raw form has actually been
//! read off disk and coerced into Rust types, one variant per IFD field
//! type family. This is the type tag consumers (inspect output, ROI
//! metadata, stitcher bookkeeping) should reach for instead of poking at
//! `IFDEntry` directly.

use std::fmt;

use crate::tiff::constants::field_types;
use crate::tiff::errors::{TiffError, TiffResult};

/// A fully decoded TIFF tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum TiffValue {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Long8(Vec<u64>),
    SLong8(Vec<i64>),
    Ifd8(Vec<u64>),
}

impl TiffValue {
    /// The IFD field type code this value would be written back as.
    pub fn field_type(&self) -> u16 {
        match self {
            TiffValue::Byte(_) => field_types::BYTE,
            TiffValue::Ascii(_) => field_types::ASCII,
            TiffValue::Short(_) => field_types::SHORT,
            TiffValue::Long(_) => field_types::LONG,
            TiffValue::Rational(_) => field_types::RATIONAL,
            TiffValue::SByte(_) => field_types::SBYTE,
            TiffValue::Undefined(_) => field_types::UNDEFINED,
            TiffValue::SShort(_) => field_types::SSHORT,
            TiffValue::SLong(_) => field_types::SLONG,
            TiffValue::SRational(_) => field_types::SRATIONAL,
            TiffValue::Float(_) => field_types::FLOAT,
            TiffValue::Double(_) => field_types::DOUBLE,
            TiffValue::Long8(_) => field_types::LONG8,
            TiffValue::SLong8(_) => field_types::SLONG8,
            TiffValue::Ifd8(_) => field_types::IFD8,
        }
    }

    /// Number of individual values this entry holds.
    pub fn count(&self) -> usize {
        match self {
            TiffValue::Byte(v) | TiffValue::Undefined(v) => v.len(),
            TiffValue::Ascii(s) => s.len() + 1, // includes the trailing NUL
            TiffValue::Short(v) => v.len(),
            TiffValue::Long(v) => v.len(),
            TiffValue::Rational(v) => v.len(),
            TiffValue::SByte(v) => v.len(),
            TiffValue::SShort(v) => v.len(),
            TiffValue::SLong(v) => v.len(),
            TiffValue::SRational(v) => v.len(),
            TiffValue::Float(v) => v.len(),
            TiffValue::Double(v) => v.len(),
            TiffValue::Long8(v) => v.len(),
            TiffValue::SLong8(v) => v.len(),
            TiffValue::Ifd8(v) => v.len(),
        }
    }

    /// Coerces this value to a single `u64`, the way tag readers like
    /// `IFD::get_tag_value` treat any integer-ish tag.
    ///
    /// Rational values coerce to their numerator; this matches callers that
    /// only need an approximate scalar (e.g. resolution tags in `inspect`).
    pub fn as_u64(&self) -> TiffResult<u64> {
        match self {
            TiffValue::Byte(v) | TiffValue::Undefined(v) => {
                v.first().map(|b| *b as u64).ok_or_else(Self::empty_err)
            }
            TiffValue::Short(v) => v.first().map(|s| *s as u64).ok_or_else(Self::empty_err),
            TiffValue::Long(v) => v.first().map(|l| *l as u64).ok_or_else(Self::empty_err),
            TiffValue::Long8(v) | TiffValue::Ifd8(v) => {
                v.first().copied().ok_or_else(Self::empty_err)
            }
            TiffValue::Rational(v) => v.first().map(|(n, _)| *n as u64).ok_or_else(Self::empty_err),
            TiffValue::SByte(v) => v.first().map(|b| *b as u64).ok_or_else(Self::empty_err),
            TiffValue::SShort(v) => v.first().map(|s| *s as u64).ok_or_else(Self::empty_err),
            TiffValue::SLong(v) => v.first().map(|l| *l as u64).ok_or_else(Self::empty_err),
            TiffValue::SLong8(v) => v.first().map(|l| *l as u64).ok_or_else(Self::empty_err),
            other => Err(TiffError::GenericError(format!(
                "cannot coerce {:?} to an integer",
                other.field_type()
            ))),
        }
    }

    /// Coerces every element to `u64`, preserving order.
    pub fn as_u64_vec(&self) -> TiffResult<Vec<u64>> {
        Ok(match self {
            TiffValue::Byte(v) | TiffValue::Undefined(v) => v.iter().map(|b| *b as u64).collect(),
            TiffValue::Short(v) => v.iter().map(|s| *s as u64).collect(),
            TiffValue::Long(v) => v.iter().map(|l| *l as u64).collect(),
            TiffValue::Long8(v) | TiffValue::Ifd8(v) => v.clone(),
            TiffValue::Rational(v) => v.iter().map(|(n, _)| *n as u64).collect(),
            other => return Err(TiffError::GenericError(format!("cannot coerce {:?} to an integer vector", other.field_type()))),
        })
    }

    /// Coerces this value to an `f64`, honoring rational division.
    pub fn as_f64(&self) -> TiffResult<f64> {
        match self {
            TiffValue::Rational(v) => v
                .first()
                .map(|(n, d)| if *d == 0 { 0.0 } else { *n as f64 / *d as f64 })
                .ok_or_else(Self::empty_err),
            TiffValue::SRational(v) => v
                .first()
                .map(|(n, d)| if *d == 0 { 0.0 } else { *n as f64 / *d as f64 })
                .ok_or_else(Self::empty_err),
            TiffValue::Float(v) => v.first().map(|f| *f as f64).ok_or_else(Self::empty_err),
            TiffValue::Double(v) => v.first().copied().ok_or_else(Self::empty_err),
            other => other.as_u64().map(|u| u as f64),
        }
    }

    /// Returns the ASCII string, if this is a string-typed value.
    pub fn as_string(&self) -> TiffResult<&str> {
        match self {
            TiffValue::Ascii(s) => Ok(s),
            other => Err(TiffError::GenericError(format!("{:?} is not an ASCII value", other.field_type()))),
        }
    }

    /// Canonical JSON representation used by `inspect --format json`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            TiffValue::Byte(v) | TiffValue::Undefined(v) => json!(v),
            TiffValue::Ascii(s) => json!(s),
            TiffValue::Short(v) => json!(v),
            TiffValue::Long(v) => json!(v),
            TiffValue::Rational(v) => json!(v.iter().map(|(n, d)| json!({"num": n, "den": d})).collect::<Vec<_>>()),
            TiffValue::SByte(v) => json!(v),
            TiffValue::SShort(v) => json!(v),
            TiffValue::SLong(v) => json!(v),
            TiffValue::SRational(v) => json!(v.iter().map(|(n, d)| json!({"num": n, "den": d})).collect::<Vec<_>>()),
            TiffValue::Float(v) => json!(v),
            TiffValue::Double(v) => json!(v),
            TiffValue::Long8(v) | TiffValue::Ifd8(v) => json!(v),
            TiffValue::SLong8(v) => json!(v),
        }
    }

    fn empty_err() -> TiffError {
        TiffError::GenericError("tag value has no elements".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_coerces_to_float_by_division() {
        let v = TiffValue::Rational(vec![(1, 2)]);
        assert_eq!(v.as_f64().unwrap(), 0.5);
    }

    #[test]
    fn short_vec_widens_losslessly_to_u64() {
        let v = TiffValue::Short(vec![1, 2, 3]);
        assert_eq!(v.as_u64_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn ascii_as_string_round_trips() {
        let v = TiffValue::Ascii("hello".to_string());
        assert_eq!(v.as_string().unwrap(), "hello");
    }

    #[test]
    fn non_ascii_as_string_errors() {
        let v = TiffValue::Long(vec![1]);
        assert!(v.as_string().is_err());
    }
}

impl fmt::Display for TiffValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiffValue::Ascii(s) => write!(f, "{}", s),
            TiffValue::Rational(v) if v.len() == 1 => write!(f, "{}/{}", v[0].0, v[0].1),
            TiffValue::SRational(v) if v.len() == 1 => write!(f, "{}/{}", v[0].0, v[0].1),
            other => write!(f, "{}", other.to_json()),
        }
    }
}
