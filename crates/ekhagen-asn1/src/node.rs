#![forbid(unsafe_code)]

//! Parsed elements and the typed accessors used to walk them.

use crate::tag::{universal, Length, Tag};
use const_oid::ObjectIdentifier;
use ekhagen_core::Error;
use std::fmt;
use std::sync::Arc;

/// One decoded element.
///
/// Nodes share the buffer they were parsed from; [`encoding`](Self::encoding)
/// and [`value`](Self::value) are views into it. A constructed node owns its
/// children in input order. Nodes are immutable once built.
#[derive(Clone)]
pub struct StructureNode {
    source: Arc<[u8]>,
    tag: Tag,
    length: Length,
    start: usize,
    header_len: usize,
    content_len: usize,
    children: Vec<StructureNode>,
}

impl StructureNode {
    pub(crate) fn new(
        source: Arc<[u8]>,
        tag: Tag,
        length: Length,
        start: usize,
        header_len: usize,
        content_len: usize,
        children: Vec<StructureNode>,
    ) -> Self {
        Self {
            source,
            tag,
            length,
            start,
            header_len,
            content_len,
            children,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn length(&self) -> Length {
        self.length
    }

    pub fn is_constructed(&self) -> bool {
        self.tag.constructed
    }

    /// Number of identifier and length octets.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// The complete element as it appeared in the input, including the
    /// end-of-contents marker of an indefinite-length element.
    pub fn encoding(&self) -> &[u8] {
        let trailer = match self.length {
            Length::Definite(_) => 0,
            Length::Indefinite => 2,
        };
        &self.source[self.start..self.start + self.header_len + self.content_len + trailer]
    }

    /// Content octets. For a constructed element these are the raw
    /// encodings of its children.
    pub fn value(&self) -> &[u8] {
        let from = self.start + self.header_len;
        &self.source[from..from + self.content_len]
    }

    pub fn children(&self) -> &[StructureNode] {
        &self.children
    }

    /// Child at `index`, or an error naming `what` was expected there.
    pub fn child(&self, index: usize, what: &str) -> Result<&StructureNode, Error> {
        self.children.get(index).ok_or_else(|| {
            Error::UnexpectedStructure(format!("{what}: missing element {index} in {}", self.tag))
        })
    }

    /// Children of a SEQUENCE.
    pub fn expect_sequence(&self, what: &str) -> Result<&[StructureNode], Error> {
        self.expect_constructed(universal::SEQUENCE, what)
    }

    /// Children of a SET.
    pub fn expect_set(&self, what: &str) -> Result<&[StructureNode], Error> {
        self.expect_constructed(universal::SET, what)
    }

    fn expect_constructed(&self, number: u32, what: &str) -> Result<&[StructureNode], Error> {
        if !self.tag.constructed || !self.tag.is_universal(number) {
            return Err(self.mismatch(what, Tag::universal(number, true)));
        }
        Ok(&self.children)
    }

    /// Unwrap `[n] EXPLICIT`: a constructed context-specific element with
    /// exactly one child.
    pub fn explicit(&self, number: u32, what: &str) -> Result<&StructureNode, Error> {
        if !self.tag.constructed || !self.tag.is_context(number) {
            return Err(self.mismatch(what, Tag::context(number, true)));
        }
        match self.children.as_slice() {
            [inner] => Ok(inner),
            other => Err(Error::UnexpectedStructure(format!(
                "{what}: [{number}] EXPLICIT holds {} elements, expected 1",
                other.len()
            ))),
        }
    }

    /// Non-negative INTEGER that fits in 32 bits.
    pub fn as_u32(&self, what: &str) -> Result<u32, Error> {
        self.expect_primitive(universal::INTEGER, what)?;
        let bytes = self.value();
        let Some(&first) = bytes.first() else {
            return Err(Error::UnexpectedStructure(format!("{what}: empty INTEGER")));
        };
        if first & 0x80 != 0 {
            return Err(Error::UnexpectedStructure(format!("{what}: negative INTEGER")));
        }
        let significant: &[u8] = match bytes.iter().position(|&b| b != 0) {
            Some(i) => &bytes[i..],
            None => &[],
        };
        if significant.len() > 4 {
            return Err(Error::UnexpectedStructure(format!(
                "{what}: INTEGER does not fit in 32 bits"
            )));
        }
        Ok(significant
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }

    pub fn as_oid(&self, what: &str) -> Result<ObjectIdentifier, Error> {
        self.expect_primitive(universal::OBJECT_IDENTIFIER, what)?;
        ObjectIdentifier::from_bytes(self.value())
            .map_err(|e| Error::UnexpectedStructure(format!("{what}: invalid OBJECT IDENTIFIER: {e}")))
    }

    /// Contents of an OCTET STRING.
    ///
    /// BER allows a constructed encoding made of nested segments; those are
    /// concatenated in order. Context-specific tags are accepted too, which
    /// covers `[n] IMPLICIT OCTET STRING` fields.
    pub fn octets(&self, what: &str) -> Result<Vec<u8>, Error> {
        let tag = self.tag;
        let acceptable = tag.is_universal(universal::OCTET_STRING)
            || tag.class == crate::tag::Class::ContextSpecific;
        if !acceptable {
            return Err(self.mismatch(what, Tag::universal(universal::OCTET_STRING, false)));
        }
        if !tag.constructed {
            return Ok(self.value().to_vec());
        }
        let mut out = Vec::with_capacity(self.content_len);
        for segment in &self.children {
            if !segment.tag.is_universal(universal::OCTET_STRING) {
                return Err(segment.mismatch(
                    what,
                    Tag::universal(universal::OCTET_STRING, false),
                ));
            }
            out.extend_from_slice(&segment.octets(what)?);
        }
        Ok(out)
    }

    /// Text of a BMPString, UTF8String, PrintableString or IA5String.
    pub fn as_string(&self, what: &str) -> Result<String, Error> {
        if self.tag.constructed || self.tag.class != crate::tag::Class::Universal {
            return Err(self.mismatch(what, Tag::universal(universal::BMP_STRING, false)));
        }
        let bytes = self.value();
        match self.tag.number {
            universal::BMP_STRING => decode_bmp(bytes)
                .ok_or_else(|| Error::UnexpectedStructure(format!("{what}: invalid BMPString"))),
            universal::UTF8_STRING | universal::PRINTABLE_STRING | universal::IA5_STRING => {
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| Error::UnexpectedStructure(format!("{what}: invalid {}", self.tag)))
            }
            _ => Err(self.mismatch(what, Tag::universal(universal::BMP_STRING, false))),
        }
    }

    pub fn is_null(&self) -> bool {
        self.tag == Tag::universal(universal::NULL, false) && self.content_len == 0
    }

    fn expect_primitive(&self, number: u32, what: &str) -> Result<(), Error> {
        if self.tag != Tag::universal(number, false) {
            return Err(self.mismatch(what, Tag::universal(number, false)));
        }
        Ok(())
    }

    fn mismatch(&self, what: &str, expected: Tag) -> Error {
        Error::UnexpectedStructure(format!("{what}: expected {expected}, found {}", self.tag))
    }
}

/// UTF-16BE without a byte-order mark. A trailing NUL, which some writers
/// append to friendly names, is dropped.
fn decode_bmp(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    if units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16(&units).ok()
}

impl PartialEq for StructureNode {
    fn eq(&self, other: &Self) -> bool {
        self.encoding() == other.encoding()
    }
}

impl Eq for StructureNode {}

impl fmt::Debug for StructureNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("StructureNode");
        s.field("tag", &format_args!("{}", self.tag))
            .field("length", &self.length);
        if self.tag.constructed {
            s.field("children", &self.children);
        } else {
            s.field("content_len", &self.content_len);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::reader::parse;
    use ekhagen_core::Error;

    #[test]
    fn test_as_u32() {
        assert_eq!(parse(&[0x02, 0x02, 0x08, 0x00]).unwrap().as_u32("n").unwrap(), 2048);
        assert_eq!(
            parse(&[0x02, 0x05, 0x00, 0xff, 0xff, 0xff, 0xff]).unwrap().as_u32("n").unwrap(),
            u32::MAX
        );
        assert!(parse(&[0x02, 0x01, 0xff]).unwrap().as_u32("n").is_err());
        assert!(parse(&[0x02, 0x00]).unwrap().as_u32("n").is_err());
        assert!(parse(&[0x02, 0x05, 0x01, 0, 0, 0, 0]).unwrap().as_u32("n").is_err());
        assert!(parse(&[0x04, 0x01, 0x01]).unwrap().as_u32("n").is_err());
    }

    #[test]
    fn test_as_oid() {
        // 1.2.840.113549.1.7.1
        let data = [0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];
        let oid = parse(&data).unwrap().as_oid("contentType").unwrap();
        assert_eq!(oid, ekhagen_core::oid::DATA);
    }

    #[test]
    fn test_constructed_octets() {
        // 24 80 { 04 01 'a', 24 80 { 04 02 'bc' } 00 00 } 00 00
        let data = [
            0x24, 0x80, 0x04, 0x01, b'a', 0x24, 0x80, 0x04, 0x02, b'b', b'c', 0x00, 0x00, 0x00,
            0x00,
        ];
        let node = parse(&data).unwrap();
        assert_eq!(node.octets("content").unwrap(), b"abc");
    }

    #[test]
    fn test_implicit_octets() {
        let primitive = parse(&[0x80, 0x02, 0xde, 0xad]).unwrap();
        assert_eq!(primitive.octets("encryptedContent").unwrap(), vec![0xde, 0xad]);

        let constructed = parse(&[0xa0, 0x06, 0x04, 0x01, 0x01, 0x04, 0x01, 0x02]).unwrap();
        assert_eq!(constructed.octets("encryptedContent").unwrap(), vec![0x01, 0x02]);
    }

    #[test]
    fn test_octets_rejects_other_segments() {
        let node = parse(&[0x24, 0x03, 0x02, 0x01, 0x01]).unwrap();
        assert!(matches!(node.octets("x"), Err(Error::UnexpectedStructure(_))));
    }

    #[test]
    fn test_bmp_string() {
        let node = parse(&[0x1e, 0x04, 0x00, b'h', 0x00, b'i']).unwrap();
        assert_eq!(node.as_string("friendlyName").unwrap(), "hi");

        let with_nul = parse(&[0x1e, 0x04, 0x00, b'a', 0x00, 0x00]).unwrap();
        assert_eq!(with_nul.as_string("friendlyName").unwrap(), "a");

        let odd = parse(&[0x1e, 0x01, 0x00]).unwrap();
        assert!(odd.as_string("friendlyName").is_err());
    }

    #[test]
    fn test_explicit() {
        let node = parse(&[0xa0, 0x03, 0x02, 0x01, 0x05]).unwrap();
        assert_eq!(node.explicit(0, "x").unwrap().as_u32("x").unwrap(), 5);
        assert!(node.explicit(1, "x").is_err());

        let two = parse(&[0xa0, 0x04, 0x05, 0x00, 0x05, 0x00]).unwrap();
        assert!(two.explicit(0, "x").is_err());
    }

    #[test]
    fn test_expect_sequence_on_set() {
        let node = parse(&[0x31, 0x00]).unwrap();
        assert!(node.expect_set("attrs").unwrap().is_empty());
        let err = node.expect_sequence("bags").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected structure: bags: expected SEQUENCE, found SET"
        );
    }

    #[test]
    fn test_child_missing() {
        let node = parse(&[0x30, 0x00]).unwrap();
        assert!(matches!(node.child(0, "version"), Err(Error::UnexpectedStructure(_))));
    }
}
