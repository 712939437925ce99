//! Minimal writer for single-table catalog files

use std::path::Path;

use super::table::TForm;
use super::{FitsError, Result, BLOCK_LEN, CARD_LEN};
use crate::value::RawValue;

/// Builds a FITS file holding an empty primary HDU and one `BINTABLE` extension
///
/// ```no_run
/// use starcat_ingest::fits::BinTableWriter;
/// use starcat_ingest::value::RawValue;
///
/// BinTableWriter::new()
///     .column("source_id", "K")
///     .column("ra", "D")
///     .row(vec![RawValue::Integer(1), RawValue::Float(10.5)])
///     .write_to("GaiaSource_000.fits")?;
/// # Ok::<(), starcat_ingest::fits::FitsError>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct BinTableWriter {
    columns: Vec<(String, String)>,
    rows: Vec<Vec<RawValue>>,
}

impl BinTableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, tform: impl Into<String>) -> Self {
        self.columns.push((name.into(), tform.into()));
        self
    }

    pub fn row(mut self, values: Vec<RawValue>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<RawValue>>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Encode the whole file
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let forms = self
            .columns
            .iter()
            .map(|(_, raw)| raw.parse::<TForm>())
            .collect::<Result<Vec<_>>>()?;
        let row_len = forms
            .iter()
            .try_fold(0usize, |acc, tform| acc.checked_add(tform.checked_width()?))
            .ok_or_else(|| FitsError::Encode {
                column: String::new(),
                reason: "row width overflows".to_string(),
            })?;

        let mut out = Vec::new();

        let primary = [
            logical_card("SIMPLE", true),
            integer_card("BITPIX", 8),
            integer_card("NAXIS", 0),
            logical_card("EXTEND", true),
        ];
        write_header(&mut out, &primary);

        let mut cards = vec![
            string_card("XTENSION", "BINTABLE"),
            integer_card("BITPIX", 8),
            integer_card("NAXIS", 2),
            integer_card("NAXIS1", row_len as i64),
            integer_card("NAXIS2", self.rows.len() as i64),
            integer_card("PCOUNT", 0),
            integer_card("GCOUNT", 1),
            integer_card("TFIELDS", self.columns.len() as i64),
        ];
        for (n, (name, raw)) in self.columns.iter().enumerate() {
            cards.push(string_card(&format!("TTYPE{}", n + 1), name));
            cards.push(string_card(&format!("TFORM{}", n + 1), raw));
        }
        write_header(&mut out, &cards);

        let data_start = out.len();
        for row in &self.rows {
            if row.len() != self.columns.len() {
                return Err(FitsError::Encode {
                    column: String::new(),
                    reason: format!(
                        "row has {} values for {} columns",
                        row.len(),
                        self.columns.len()
                    ),
                });
            }
            for ((name, _), (tform, value)) in self.columns.iter().zip(forms.iter().zip(row)) {
                encode_field(&mut out, name, tform, value)?;
            }
        }

        let data_len = out.len() - data_start;
        out.resize(out.len() + (BLOCK_LEN - data_len % BLOCK_LEN) % BLOCK_LEN, 0);
        Ok(out)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

fn write_header(out: &mut Vec<u8>, cards: &[String]) {
    let start = out.len();
    for card in cards {
        out.extend_from_slice(card.as_bytes());
    }
    out.extend_from_slice(format!("{:<width$}", "END", width = CARD_LEN).as_bytes());
    let len = out.len() - start;
    out.resize(start + len.div_ceil(BLOCK_LEN) * BLOCK_LEN, b' ');
}

fn fixed_card(keyword: &str, value: &str) -> String {
    let card = format!("{keyword:<8}= {value:>20}");
    format!("{:<width$.width$}", card, width = CARD_LEN)
}

fn integer_card(keyword: &str, value: i64) -> String {
    fixed_card(keyword, &value.to_string())
}

fn logical_card(keyword: &str, value: bool) -> String {
    fixed_card(keyword, if value { "T" } else { "F" })
}

fn string_card(keyword: &str, value: &str) -> String {
    let quoted = format!("'{:<8}'", value.replace('\'', "''"));
    let card = format!("{keyword:<8}= {quoted}");
    format!("{:<width$.width$}", card, width = CARD_LEN)
}

fn encode_field(out: &mut Vec<u8>, column: &str, tform: &TForm, value: &RawValue) -> Result<()> {
    let mismatch = || FitsError::Encode {
        column: column.to_string(),
        reason: format!("{value:?} does not fit format {tform}"),
    };

    match (tform.code, value) {
        ('A', RawValue::Text(s)) => pad_text(out, s.as_bytes(), tform.repeat),
        ('A', RawValue::Bytes(b)) => pad_text(out, b, tform.repeat),
        (_, RawValue::Other) => out.resize(out.len() + tform.byte_width(), 0),
        _ if tform.repeat != 1 => return Err(mismatch()),
        ('L', RawValue::Boolean(b)) => out.push(if *b { b'T' } else { b'F' }),
        ('B', RawValue::Integer(i)) => {
            out.push(u8::try_from(*i).map_err(|_| mismatch())?);
        }
        ('I', RawValue::Integer(i)) => {
            let v = i16::try_from(*i).map_err(|_| mismatch())?;
            out.extend_from_slice(&v.to_be_bytes());
        }
        ('J', RawValue::Integer(i)) => {
            let v = i32::try_from(*i).map_err(|_| mismatch())?;
            out.extend_from_slice(&v.to_be_bytes());
        }
        ('K', RawValue::Integer(i)) => out.extend_from_slice(&i.to_be_bytes()),
        ('E', RawValue::Float(f)) => out.extend_from_slice(&(*f as f32).to_be_bytes()),
        ('D', RawValue::Float(f)) => out.extend_from_slice(&f.to_be_bytes()),
        _ => return Err(mismatch()),
    }
    Ok(())
}

fn pad_text(out: &mut Vec<u8>, bytes: &[u8], width: usize) {
    let take = bytes.len().min(width);
    out.extend_from_slice(&bytes[..take]);
    out.resize(out.len() + (width - take), b' ');
}
