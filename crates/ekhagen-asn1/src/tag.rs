#![forbid(unsafe_code)]

//! Identifier and length octets.

use std::fmt;

/// Universal tag numbers used by PKCS#12 and the structures it embeds.
pub mod universal {
    pub const END_OF_CONTENTS: u32 = 0;
    pub const BOOLEAN: u32 = 1;
    pub const INTEGER: u32 = 2;
    pub const BIT_STRING: u32 = 3;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const OBJECT_IDENTIFIER: u32 = 6;
    pub const UTF8_STRING: u32 = 12;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
    pub const PRINTABLE_STRING: u32 = 19;
    pub const IA5_STRING: u32 = 22;
    pub const BMP_STRING: u32 = 30;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl Class {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::ContextSpecific,
            _ => Class::Private,
        }
    }
}

/// A decoded identifier: class, primitive/constructed bit and tag number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub class: Class,
    pub constructed: bool,
    pub number: u32,
}

impl Tag {
    pub const fn universal(number: u32, constructed: bool) -> Self {
        Self {
            class: Class::Universal,
            constructed,
            number,
        }
    }

    pub const fn context(number: u32, constructed: bool) -> Self {
        Self {
            class: Class::ContextSpecific,
            constructed,
            number,
        }
    }

    /// Universal class with the given number, either encoding.
    pub fn is_universal(&self, number: u32) -> bool {
        self.class == Class::Universal && self.number == number
    }

    /// Context-specific class with the given number, either encoding.
    pub fn is_context(&self, number: u32) -> bool {
        self.class == Class::ContextSpecific && self.number == number
    }

    /// The end-of-contents marker `00 00` reads as this tag.
    pub fn is_end_of_contents(&self) -> bool {
        self.class == Class::Universal && !self.constructed && self.number == universal::END_OF_CONTENTS
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class == Class::Universal {
            let name = match self.number {
                universal::BOOLEAN => Some("BOOLEAN"),
                universal::INTEGER => Some("INTEGER"),
                universal::BIT_STRING => Some("BIT STRING"),
                universal::OCTET_STRING => Some("OCTET STRING"),
                universal::NULL => Some("NULL"),
                universal::OBJECT_IDENTIFIER => Some("OBJECT IDENTIFIER"),
                universal::UTF8_STRING => Some("UTF8String"),
                universal::SEQUENCE => Some("SEQUENCE"),
                universal::SET => Some("SET"),
                universal::PRINTABLE_STRING => Some("PrintableString"),
                universal::IA5_STRING => Some("IA5String"),
                universal::BMP_STRING => Some("BMPString"),
                _ => None,
            };
            if let Some(name) = name {
                return f.write_str(name);
            }
        }
        let class = match self.class {
            Class::Universal => "UNIVERSAL ",
            Class::Application => "APPLICATION ",
            Class::ContextSpecific => "",
            Class::Private => "PRIVATE ",
        };
        write!(f, "[{class}{}]", self.number)
    }
}

/// Length octets as they appeared in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Definite(usize),
    /// `0x80`; content runs until an end-of-contents marker.
    Indefinite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Tag::universal(universal::SEQUENCE, true).to_string(), "SEQUENCE");
        assert_eq!(Tag::context(0, true).to_string(), "[0]");
        assert_eq!(Tag::universal(9, false).to_string(), "[UNIVERSAL 9]");
        let app = Tag {
            class: Class::Application,
            constructed: false,
            number: 3,
        };
        assert_eq!(app.to_string(), "[APPLICATION 3]");
    }

    #[test]
    fn test_class_bits() {
        assert_eq!(Class::from_bits(0), Class::Universal);
        assert_eq!(Class::from_bits(2), Class::ContextSpecific);
        assert_eq!(Class::from_bits(3), Class::Private);
    }
}
