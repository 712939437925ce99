//! Header cards and keyword lookup

use std::io::Read;

use super::{FitsError, Result, BLOCK_LEN, CARD_LEN};

/// One 80-character header card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Keyword, upper case, trailing blanks removed
    pub keyword: String,
    /// Value field for `KEYWORD = value` cards; strings are unquoted
    pub value: Option<String>,
}

impl Card {
    /// Parse a raw card image
    ///
    /// Handles the value indicator in columns 9-10, quoted strings with `''`
    /// escapes, and inline `/ comment` text after non-string values.
    pub fn parse(raw: &[u8]) -> Self {
        let keyword_end = raw.len().min(8);
        let keyword = ascii(&raw[..keyword_end]).trim_end().to_string();

        let value = if raw.len() > 10 && &raw[8..10] == b"= " {
            Some(parse_value(&ascii(&raw[10..])))
        } else {
            None
        };

        Self { keyword, value }
    }

    pub fn is_end(&self) -> bool {
        self.keyword == "END"
    }
}

fn ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

fn parse_value(field: &str) -> String {
    let field = field.trim_start();

    if let Some(rest) = field.strip_prefix('\'') {
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        // Trailing blanks inside quotes are not significant
        return out.trim_end().to_string();
    }

    field
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Parsed header of one HDU
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Raw value of the first card with `keyword`
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.cards
            .iter()
            .find(|card| card.keyword == keyword)
            .and_then(|card| card.value.as_deref())
    }

    pub fn integer(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(|v| v.parse().ok())
    }

    pub fn logical(&self, keyword: &str) -> Option<bool> {
        match self.get(keyword) {
            Some("T") => Some(true),
            Some("F") => Some(false),
            _ => None,
        }
    }

    /// Integer keyword that must be present
    pub fn require_integer(&self, keyword: &str, hdu: usize) -> Result<i64> {
        self.integer(keyword).ok_or_else(|| FitsError::MissingKeyword {
            keyword: keyword.to_string(),
            hdu,
        })
    }

    /// Read a header from `reader`, block by block, up to and including `END`
    ///
    /// Returns `Ok(None)` when the reader is already at end of file. The reader
    /// is left positioned at the first byte after the header's last block.
    pub fn read<R: Read>(reader: &mut R, hdu: usize) -> Result<Option<(Header, u64)>> {
        let mut block = vec![0u8; BLOCK_LEN];
        let mut cards = Vec::new();
        let mut blocks = 0u64;

        loop {
            let filled = fill_block(reader, &mut block)?;
            if filled == 0 && blocks == 0 {
                return Ok(None);
            }
            if filled < BLOCK_LEN {
                return Err(FitsError::Truncated {
                    expected: (blocks + 1) * BLOCK_LEN as u64,
                    actual: blocks * BLOCK_LEN as u64 + filled as u64,
                });
            }
            blocks += 1;

            for raw in block.chunks_exact(CARD_LEN) {
                let card = Card::parse(raw);
                if card.is_end() {
                    return Ok(Some((Header::new(cards), blocks * BLOCK_LEN as u64)));
                }
                if !card.keyword.is_empty() {
                    cards.push(card);
                }
            }

            if blocks == 1 && !matches!(cards.first(), Some(c) if c.keyword == "SIMPLE" || c.keyword == "XTENSION") {
                return Err(FitsError::InvalidHeader {
                    hdu,
                    reason: "header does not start with SIMPLE or XTENSION".to_string(),
                });
            }
        }
    }
}

/// Fill `block` from `reader`, returning the number of bytes read (short only at EOF)
fn fill_block<R: Read>(reader: &mut R, block: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        match reader.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
