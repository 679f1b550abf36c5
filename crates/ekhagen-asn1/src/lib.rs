#![forbid(unsafe_code)]

//! Schema-free reader for BER/DER tag-length-value structures.
//!
//! [`parse`] turns a byte buffer into a tree of [`StructureNode`]s without
//! knowing anything about the ASN.1 module that produced it. Callers walk
//! the tree with the typed accessors on [`StructureNode`], which report
//! shape mismatches as [`ekhagen_core::Error::UnexpectedStructure`].
//!
//! Both definite and indefinite lengths are accepted, so BER output from
//! older toolkits (constructed OCTET STRINGs, `80 .. 00 00` framing) reads
//! the same as DER.

pub mod node;
pub mod reader;
pub mod tag;

pub use node::StructureNode;
pub use reader::{parse, MAX_DEPTH};
pub use tag::{universal, Class, Length, Tag};
