#![forbid(unsafe_code)]

//! Shared types for the ekhagen PKCS#12 reader.
//!
//! Every crate in the workspace reports failures through [`Error`], names
//! algorithms through the constants in [`oid`], and consults an
//! [`AlgorithmPolicy`] before using any primitive.

pub mod error;
pub mod oid;
pub mod policy;

pub use error::{Error, Result, Stage};
pub use policy::{AlgorithmPolicy, DisabledAlgorithms, PermitAll};
