#![forbid(unsafe_code)]

//! Tag-length-value decoding.

use crate::node::StructureNode;
use crate::tag::{Class, Length, Tag};
use ekhagen_core::Error;
use std::sync::Arc;

/// Deepest nesting accepted before the input is rejected.
pub const MAX_DEPTH: usize = 64;

/// Parse exactly one element spanning all of `data`.
///
/// Every length is checked against the remaining input before any slice is
/// taken, so no input can read out of bounds or make the reader allocate
/// more than a small multiple of its size.
pub fn parse(data: &[u8]) -> Result<StructureNode, Error> {
    if data.is_empty() {
        return Err(Error::TruncatedInput("empty input".into()));
    }
    let source: Arc<[u8]> = Arc::from(data);
    let mut reader = Reader {
        source: &source,
        pos: 0,
    };
    let node = reader.element(source.len(), 0)?;
    if reader.pos != source.len() {
        return Err(Error::UnexpectedStructure(format!(
            "{} trailing bytes after top-level element",
            source.len() - reader.pos
        )));
    }
    Ok(node)
}

struct Reader<'a> {
    source: &'a Arc<[u8]>,
    pos: usize,
}

impl Reader<'_> {
    fn byte(&mut self, end: usize, what: &str) -> Result<u8, Error> {
        if self.pos >= end {
            return Err(Error::TruncatedInput(format!(
                "input ends inside {what} at offset {}",
                self.pos
            )));
        }
        let b = self.source[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn tag(&mut self, end: usize) -> Result<Tag, Error> {
        let first = self.byte(end, "tag")?;
        let class = Class::from_bits(first >> 6);
        let constructed = first & 0x20 != 0;
        let mut number = u32::from(first & 0x1f);

        if number == 0x1f {
            number = 0;
            loop {
                let b = self.byte(end, "high tag number")?;
                if number > (u32::MAX >> 7) {
                    return Err(Error::UnexpectedStructure(
                        "tag number does not fit in 32 bits".into(),
                    ));
                }
                number = (number << 7) | u32::from(b & 0x7f);
                if b & 0x80 == 0 {
                    break;
                }
            }
        }

        Ok(Tag {
            class,
            constructed,
            number,
        })
    }

    fn length(&mut self, end: usize, constructed: bool) -> Result<Length, Error> {
        let first = self.byte(end, "length")?;
        match first {
            0x00..=0x7f => Ok(Length::Definite(usize::from(first))),
            0x80 if constructed => Ok(Length::Indefinite),
            0x80 => Err(Error::MalformedLength(format!(
                "indefinite length on primitive element at offset {}",
                self.pos - 1
            ))),
            0xff => Err(Error::MalformedLength(format!(
                "reserved length octet 0xff at offset {}",
                self.pos - 1
            ))),
            _ => {
                let count = usize::from(first & 0x7f);
                if count > std::mem::size_of::<usize>() {
                    return Err(Error::MalformedLength(format!(
                        "{count}-byte length at offset {} exceeds word size",
                        self.pos - 1
                    )));
                }
                let mut len: usize = 0;
                for _ in 0..count {
                    let b = self.byte(end, "length")?;
                    len = (len << 8) | usize::from(b);
                }
                Ok(Length::Definite(len))
            }
        }
    }

    fn element(&mut self, end: usize, depth: usize) -> Result<StructureNode, Error> {
        if depth > MAX_DEPTH {
            return Err(Error::UnexpectedStructure(format!(
                "nesting deeper than {MAX_DEPTH} levels"
            )));
        }

        let start = self.pos;
        let tag = self.tag(end)?;
        let length = self.length(end, tag.constructed)?;
        if tag.is_end_of_contents() {
            return Err(Error::UnexpectedStructure(format!(
                "end-of-contents marker outside indefinite-length element at offset {start}"
            )));
        }
        let header_len = self.pos - start;

        match length {
            Length::Definite(len) => {
                let content_end = self
                    .pos
                    .checked_add(len)
                    .filter(|&e| e <= end)
                    .ok_or_else(|| {
                        Error::TruncatedInput(format!(
                            "{tag} at offset {start} declares {len} content bytes, {} available",
                            end - self.pos
                        ))
                    })?;

                let mut children = Vec::new();
                if tag.constructed {
                    while self.pos < content_end {
                        children.push(self.element(content_end, depth + 1)?);
                    }
                } else {
                    self.pos = content_end;
                }

                Ok(StructureNode::new(
                    Arc::clone(self.source),
                    tag,
                    length,
                    start,
                    header_len,
                    len,
                    children,
                ))
            }
            Length::Indefinite => {
                let mut children = Vec::new();
                loop {
                    if self.at_end_of_contents(end)? {
                        break;
                    }
                    children.push(self.element(end, depth + 1)?);
                }
                // Content excludes the two marker bytes consumed above.
                let content_len = self.pos - 2 - start - header_len;
                Ok(StructureNode::new(
                    Arc::clone(self.source),
                    tag,
                    length,
                    start,
                    header_len,
                    content_len,
                    children,
                ))
            }
        }
    }

    /// Consume `00 00` if it is next. Running out of input here means the
    /// marker is missing.
    fn at_end_of_contents(&mut self, end: usize) -> Result<bool, Error> {
        let remaining = end - self.pos;
        if remaining == 0 {
            return Err(Error::TruncatedInput(format!(
                "missing end-of-contents marker at offset {}",
                self.pos
            )));
        }
        if self.source[self.pos] != 0 {
            return Ok(false);
        }
        if remaining == 1 {
            return Err(Error::TruncatedInput(format!(
                "input ends inside end-of-contents marker at offset {}",
                self.pos
            )));
        }
        if self.source[self.pos + 1] != 0 {
            return Err(Error::MalformedLength(format!(
                "malformed end-of-contents marker at offset {}",
                self.pos
            )));
        }
        self.pos += 2;
        Ok(true)
    }
}
