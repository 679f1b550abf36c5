#![forbid(unsafe_code)]

use std::fmt;

/// Errors produced while reading a PKCS#12 container.
///
/// Messages carry structural context only. Passwords, derived keys, IVs
/// and decrypted bytes never appear in them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("truncated input: {0}")]
    TruncatedInput(String),

    #[error("malformed length: {0}")]
    MalformedLength(String),

    #[error("unexpected structure: {0}")]
    UnexpectedStructure(String),

    #[error("unsupported PFX version {0}, expected 3")]
    UnsupportedVersion(u32),

    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),

    #[error("unknown or disabled algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid algorithm parameters: {0}")]
    InvalidParameters(String),

    #[error("bad padding: {0}")]
    BadPadding(String),

    #[error("bad password: {0}")]
    BadPassword(String),

    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    #[error("cannot materialize entries: {0}")]
    Materialize(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Error::TruncatedInput(_) | Error::MalformedLength(_) | Error::UnexpectedStructure(_) => {
                Stage::Parse
            }
            Error::UnsupportedVersion(_) | Error::UnexpectedContentType(_) => Stage::Format,
            Error::UnknownAlgorithm(_) | Error::InvalidParameters(_) => Stage::Algorithm,
            Error::BadPadding(_) | Error::BadPassword(_) | Error::Crypto(_) => Stage::Decrypt,
            Error::IntegrityCheckFailed(_) => Stage::Integrity,
            Error::Materialize(_) => Stage::Materialize,
            Error::Io(_) => Stage::Io,
        }
    }
}

/// Where in the load pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Parse,
    Format,
    Algorithm,
    Decrypt,
    Integrity,
    Materialize,
    Io,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parse => "parse",
            Stage::Format => "format",
            Stage::Algorithm => "algorithm",
            Stage::Decrypt => "decrypt",
            Stage::Integrity => "integrity",
            Stage::Materialize => "materialize",
            Stage::Io => "io",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(Error::TruncatedInput("x".into()).stage(), Stage::Parse);
        assert_eq!(Error::UnsupportedVersion(2).stage(), Stage::Format);
        assert_eq!(Error::InvalidParameters("x".into()).stage(), Stage::Algorithm);
        assert_eq!(Error::BadPadding("x".into()).stage(), Stage::Decrypt);
        assert_eq!(Error::IntegrityCheckFailed("x".into()).stage(), Stage::Integrity);
        assert_eq!(Error::Materialize("x".into()).stage(), Stage::Materialize);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::UnsupportedVersion(2).to_string(),
            "unsupported PFX version 2, expected 3"
        );
        assert_eq!(Stage::Integrity.to_string(), "integrity");
    }
}
