//! HDU enumeration and row access for a FITS file on disk

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::header::Header;
use super::table::BinaryTable;
use super::{padded_len, FitsError, Result};
use crate::value::RawValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HduKind {
    Primary,
    Image,
    BinTable,
    AsciiTable,
    Other(String),
}

impl HduKind {
    fn describe(&self) -> String {
        match self {
            HduKind::Primary => "primary HDU".to_string(),
            HduKind::Image => "IMAGE extension".to_string(),
            HduKind::BinTable => "BINTABLE extension".to_string(),
            HduKind::AsciiTable => "TABLE extension".to_string(),
            HduKind::Other(name) => format!("{name} extension"),
        }
    }
}

/// One header-data unit
#[derive(Debug, Clone)]
pub struct Hdu {
    pub index: usize,
    pub kind: HduKind,
    pub header: Header,
    pub data_offset: u64,
    /// Unpadded data size in bytes
    pub data_len: u64,
}

/// An opened FITS file with every HDU header scanned
#[derive(Debug)]
pub struct FitsFile {
    path: PathBuf,
    reader: BufReader<File>,
    hdus: Vec<Hdu>,
}

impl FitsFile {
    /// Open `path` and scan all HDU headers
    ///
    /// Fails when a header is malformed or the file ends before a declared
    /// data section does.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut hdus = Vec::new();
        let mut position = 0u64;

        while position < file_len {
            let index = hdus.len();
            let Some((header, header_len)) = Header::read(&mut reader, index)? else {
                break;
            };

            let kind = classify(&header, index)?;
            let data_len = data_len(&header, index)?;
            let (data_offset, data_end, next) = position
                .checked_add(header_len)
                .and_then(|offset| {
                    let end = offset.checked_add(data_len)?;
                    let next = offset.checked_add(padded_len(data_len)?)?;
                    Some((offset, end, next))
                })
                .ok_or_else(|| FitsError::InvalidHeader {
                    hdu: index,
                    reason: format!("data size {data_len} overflows the file offset"),
                })?;

            if data_end > file_len {
                return Err(FitsError::Truncated {
                    expected: data_end,
                    actual: file_len,
                });
            }

            hdus.push(Hdu {
                index,
                kind,
                header,
                data_offset,
                data_len,
            });

            if next >= file_len || !starts_extension(&mut reader, next)? {
                break;
            }
            position = next;
        }

        if hdus.is_empty() {
            return Err(FitsError::InvalidHeader {
                hdu: 0,
                reason: "file contains no header".to_string(),
            });
        }

        Ok(Self { path, reader, hdus })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hdus(&self) -> &[Hdu] {
        &self.hdus
    }

    /// Binary table layout of the HDU at `index`
    pub fn binary_table(&self, index: usize) -> Result<BinaryTable> {
        match self.hdus.get(index) {
            Some(hdu) if hdu.kind == HduKind::BinTable => {
                BinaryTable::from_header(&hdu.header, index, hdu.data_offset)
            }
            Some(hdu) => Err(FitsError::MissingTable {
                index,
                found: hdu.kind.describe(),
            }),
            None => Err(FitsError::MissingTable {
                index,
                found: format!("only {} HDUs", self.hdus.len()),
            }),
        }
    }

    /// Read and decode every row of `table`, in file order
    pub fn read_rows(&mut self, table: &BinaryTable) -> Result<Vec<Vec<RawValue>>> {
        if table.row_count == 0 || table.row_len == 0 {
            return Ok(Vec::new());
        }

        self.reader.seek(SeekFrom::Start(table.data_offset))?;
        let mut buf = vec![0u8; table.row_len];
        let mut rows = Vec::with_capacity(table.row_count);

        for _ in 0..table.row_count {
            self.reader.read_exact(&mut buf)?;
            rows.push(table.decode_row(&buf));
        }

        Ok(rows)
    }
}

fn classify(header: &Header, index: usize) -> Result<HduKind> {
    if index == 0 {
        return if header.logical("SIMPLE").is_some() {
            Ok(HduKind::Primary)
        } else {
            Err(FitsError::InvalidHeader {
                hdu: 0,
                reason: "first HDU lacks SIMPLE".to_string(),
            })
        };
    }

    let kind = match header.get("XTENSION") {
        Some("BINTABLE") => HduKind::BinTable,
        Some("TABLE") => HduKind::AsciiTable,
        Some("IMAGE") => HduKind::Image,
        Some(other) => HduKind::Other(other.to_string()),
        None => {
            return Err(FitsError::InvalidHeader {
                hdu: index,
                reason: "extension lacks XTENSION".to_string(),
            })
        }
    };
    Ok(kind)
}

fn data_len(header: &Header, hdu: usize) -> Result<u64> {
    let invalid = |reason: String| FitsError::InvalidHeader { hdu, reason };

    let bitpix = header.require_integer("BITPIX", hdu)?;
    if ![8, 16, 32, 64, -32, -64].contains(&bitpix) {
        return Err(invalid(format!("unsupported BITPIX {bitpix}")));
    }
    let naxis = header.require_integer("NAXIS", hdu)?;
    if !(0..=999).contains(&naxis) {
        return Err(invalid(format!("NAXIS out of range: {naxis}")));
    }
    if naxis == 0 {
        return Ok(0);
    }

    let mut elements: u64 = 1;
    for n in 1..=naxis {
        let axis = header.require_integer(&format!("NAXIS{n}"), hdu)?;
        let axis = u64::try_from(axis).map_err(|_| invalid(format!("NAXIS{n} is negative")))?;
        elements = elements
            .checked_mul(axis)
            .ok_or_else(|| invalid(format!("NAXIS{n} overflows the data size")))?;
    }

    let pcount = header.integer("PCOUNT").unwrap_or(0).max(0) as u64;
    let gcount = header.integer("GCOUNT").unwrap_or(1).max(1) as u64;
    let bytes = bitpix.unsigned_abs() / 8;

    pcount
        .checked_add(elements)
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(bytes))
        .ok_or_else(|| invalid("data size overflows".to_string()))
}

fn starts_extension<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<bool> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut keyword = [0u8; 8];
    match reader.read_exact(&mut keyword) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
        Err(e) => return Err(e.into()),
    }
    reader.seek(SeekFrom::Start(offset))?;
    Ok(&keyword == b"XTENSION")
}
