//! Binary table column descriptors and row decoding

use std::fmt;
use std::str::FromStr;

use super::header::Header;
use super::{FitsError, Result};
use crate::value::RawValue;

/// Largest column count a `BINTABLE` header may declare
pub const MAX_FIELDS: usize = 999;

/// Parsed `TFORMn` value: `rTa` with optional repeat `r` and suffix `a`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TForm {
    pub repeat: usize,
    pub code: char,
    pub suffix: String,
}

impl TForm {
    /// Width of the field in a row, in bytes, saturating at `usize::MAX`
    pub fn byte_width(&self) -> usize {
        self.checked_width().unwrap_or(usize::MAX)
    }

    /// Width of the field in a row, `None` when it does not fit in `usize`
    pub fn checked_width(&self) -> Option<usize> {
        let r = self.repeat;
        let unit = match self.code {
            'X' => return Some(r.div_ceil(8)),
            'L' | 'B' | 'A' => 1,
            'I' => 2,
            'J' | 'E' => 4,
            'K' | 'D' | 'C' | 'P' => 8,
            'M' | 'Q' => 16,
            _ => 0,
        };
        r.checked_mul(unit)
    }

    fn is_scalar(&self) -> bool {
        self.repeat == 1
    }
}

impl FromStr for TForm {
    type Err = FitsError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, rest) = s.split_at(digits_end);

        let mut chars = rest.chars();
        let code = chars
            .next()
            .ok_or_else(|| FitsError::UnsupportedFormat(s.to_string()))?
            .to_ascii_uppercase();

        if !"LXBIJKAEDCMPQ".contains(code) {
            return Err(FitsError::UnsupportedFormat(s.to_string()));
        }

        let repeat = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| FitsError::UnsupportedFormat(s.to_string()))?
        };

        Ok(Self {
            repeat,
            code,
            suffix: chars.as_str().to_string(),
        })
    }
}

impl fmt::Display for TForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.repeat, self.code, self.suffix)
    }
}

/// One column of a binary table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub tform: TForm,
    /// Byte offset of the field within a row
    pub offset: usize,
}

impl Column {
    pub fn type_code(&self) -> char {
        self.tform.code
    }
}

/// Layout of a `BINTABLE` extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTable {
    pub hdu_index: usize,
    pub columns: Vec<Column>,
    /// Row length in bytes (`NAXIS1`)
    pub row_len: usize,
    /// Number of rows (`NAXIS2`)
    pub row_count: usize,
    /// Absolute file offset of the first row
    pub data_offset: u64,
}

impl BinaryTable {
    /// Build the table layout from a `BINTABLE` header
    ///
    /// Columns without `TTYPEn` are named `colN`. The summed field widths must
    /// fit within `NAXIS1`.
    pub fn from_header(header: &Header, hdu_index: usize, data_offset: u64) -> Result<Self> {
        let row_len = non_negative(header.require_integer("NAXIS1", hdu_index)?, "NAXIS1", hdu_index)?;
        let row_count = non_negative(header.require_integer("NAXIS2", hdu_index)?, "NAXIS2", hdu_index)?;
        let fields = non_negative(header.require_integer("TFIELDS", hdu_index)?, "TFIELDS", hdu_index)?;
        if fields > MAX_FIELDS {
            return Err(FitsError::InvalidHeader {
                hdu: hdu_index,
                reason: format!("TFIELDS must be at most {MAX_FIELDS}, got {fields}"),
            });
        }

        let mut columns = Vec::with_capacity(fields);
        let mut offset = 0usize;
        for n in 1..=fields {
            let raw = header
                .get(&format!("TFORM{n}"))
                .ok_or_else(|| FitsError::MissingKeyword {
                    keyword: format!("TFORM{n}"),
                    hdu: hdu_index,
                })?;
            let tform: TForm = raw.parse()?;
            let name = header
                .get(&format!("TTYPE{n}"))
                .map(str::to_string)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("col{n}"));

            let end = tform
                .checked_width()
                .and_then(|width| offset.checked_add(width))
                .ok_or_else(|| FitsError::InvalidHeader {
                    hdu: hdu_index,
                    reason: format!("column {n} ({tform}) overflows the row width"),
                })?;
            columns.push(Column { name, tform, offset });
            offset = end;
        }

        if offset > row_len {
            return Err(FitsError::InvalidHeader {
                hdu: hdu_index,
                reason: format!("column widths sum to {offset} bytes but NAXIS1 is {row_len}"),
            });
        }

        Ok(Self {
            hdu_index,
            columns,
            row_len,
            row_count,
            data_offset,
        })
    }

    /// Decode one row of `row_len` bytes into raw values, one per column
    pub fn decode_row(&self, row: &[u8]) -> Vec<RawValue> {
        self.columns
            .iter()
            .map(|column| {
                let end = column.offset.saturating_add(column.tform.byte_width());
                match row.get(column.offset..end) {
                    Some(field) => decode_field(&column.tform, field),
                    None => RawValue::Other,
                }
            })
            .collect()
    }
}

fn non_negative(value: i64, keyword: &str, hdu: usize) -> Result<usize> {
    usize::try_from(value).map_err(|_| FitsError::InvalidHeader {
        hdu,
        reason: format!("{keyword} must be non-negative, got {value}"),
    })
}

fn be<const N: usize>(field: &[u8]) -> Option<[u8; N]> {
    field.get(..N)?.try_into().ok()
}

fn decode_field(tform: &TForm, field: &[u8]) -> RawValue {
    if tform.code == 'A' {
        let end = field
            .iter()
            .rposition(|&b| b != 0 && b != b' ')
            .map_or(0, |i| i + 1);
        return RawValue::Bytes(field[..end].to_vec());
    }

    if !tform.is_scalar() {
        return RawValue::Other;
    }

    let value = match tform.code {
        'L' => match field.first() {
            Some(b'T') => Some(RawValue::Boolean(true)),
            Some(b'F') => Some(RawValue::Boolean(false)),
            _ => None,
        },
        'B' => field.first().map(|&b| RawValue::Integer(i64::from(b))),
        'I' => be::<2>(field).map(|b| RawValue::Integer(i64::from(i16::from_be_bytes(b)))),
        'J' => be::<4>(field).map(|b| RawValue::Integer(i64::from(i32::from_be_bytes(b)))),
        'K' => be::<8>(field).map(|b| RawValue::Integer(i64::from_be_bytes(b))),
        'E' => be::<4>(field).map(|b| RawValue::Float(f64::from(f32::from_be_bytes(b)))),
        'D' => be::<8>(field).map(|b| RawValue::Float(f64::from_be_bytes(b))),
        _ => None,
    };

    value.unwrap_or(RawValue::Other)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fits::Card;

    #[test]
    fn test_tform_parse_repeat_and_code() {
        let t: TForm = "20A".parse().unwrap();
        assert_eq!(t.repeat, 20);
        assert_eq!(t.code, 'A');
        assert_eq!(t.byte_width(), 20);

        let t: TForm = "K".parse().unwrap();
        assert_eq!(t.repeat, 1);
        assert_eq!(t.byte_width(), 8);

        let t: TForm = "1PE(12)".parse().unwrap();
        assert_eq!(t.code, 'P');
        assert_eq!(t.suffix, "E(12)");
        assert_eq!(t.byte_width(), 8);
    }

    #[test]
    fn test_tform_bit_width_rounds_up() {
        let t: TForm = "9X".parse().unwrap();
        assert_eq!(t.byte_width(), 2);
    }

    #[test]
    fn test_tform_rejects_unknown_code() {
        assert!("3Z".parse::<TForm>().is_err());
        assert!("".parse::<TForm>().is_err());
    }

    #[test]
    fn test_decode_scalars() {
        let k: TForm = "K".parse().unwrap();
        assert_eq!(decode_field(&k, &(-5i64).to_be_bytes()), RawValue::Integer(-5));

        let i: TForm = "I".parse().unwrap();
        assert_eq!(decode_field(&i, &300i16.to_be_bytes()), RawValue::Integer(300));

        let d: TForm = "D".parse().unwrap();
        assert_eq!(decode_field(&d, &1.5f64.to_be_bytes()), RawValue::Float(1.5));

        let l: TForm = "L".parse().unwrap();
        assert_eq!(decode_field(&l, b"T"), RawValue::Boolean(true));
        assert_eq!(decode_field(&l, b"\0"), RawValue::Other);
    }

    #[test]
    fn test_decode_string_strips_padding() {
        let a: TForm = "8A".parse().unwrap();
        assert_eq!(
            decode_field(&a, b"Gaia\0\0  "),
            RawValue::Bytes(b"Gaia".to_vec())
        );
    }

    #[test]
    fn test_decode_vector_is_other() {
        let j: TForm = "2J".parse().unwrap();
        assert_eq!(decode_field(&j, &[0u8; 8]), RawValue::Other);
    }

    fn header(cards: &[(&str, &str)]) -> Header {
        Header::new(
            cards
                .iter()
                .map(|(k, v)| Card::parse(format!("{k:<8}= {v:>20}{:50}", "").as_bytes()))
                .collect(),
        )
    }

    #[test]
    fn test_oversized_field_count_is_invalid() {
        let h = header(&[
            ("NAXIS1", "8"),
            ("NAXIS2", "1"),
            ("TFIELDS", "100000000000000"),
            ("TFORM1", "'K       '"),
        ]);

        let err = BinaryTable::from_header(&h, 1, 5760).unwrap_err();
        assert!(matches!(err, FitsError::InvalidHeader { hdu: 1, .. }));
    }

    #[test]
    fn test_overflowing_column_width_is_invalid() {
        let h = header(&[
            ("NAXIS1", "8"),
            ("NAXIS2", "1"),
            ("TFIELDS", "2"),
            ("TFORM1", "'K       '"),
            ("TFORM2", "'9223372036854775807D'"),
        ]);

        let err = BinaryTable::from_header(&h, 1, 5760).unwrap_err();
        assert!(matches!(err, FitsError::InvalidHeader { hdu: 1, .. }));
        assert_eq!("9223372036854775807D".parse::<TForm>().unwrap().checked_width(), None);
    }
}
