// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error taxonomy shared across the FS facade, copy engine, receiver, and
//! self-update loop.
//!
//! No allocator is assumed, so this is a plain enum rather than a boxed
//! error chain. `ProtocolError`'s variants map one-to-one onto the wire
//! tokens the framed receiver emits (`ERR <token>`), so `Display` doubles
//! as the wire encoding.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Error {
    /// Named file absent.
    NotFound,
    /// Malformed path, bad spec, name too long, negative argc, etc.
    InvalidArgument,
    /// Backend cannot allocate the requested capacity.
    OutOfSpace,
    /// Creating over an existing name without `force`.
    AlreadyExists,
    /// Short read, program/erase failure, or device refusal.
    IoError,
    /// Framed receiver wire-protocol violation.
    Protocol(ProtocolError),
    /// Bus acquisition timed out.
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum ProtocolError {
    BadMagic,
    BadLen,
    BadOffset,
    Cap,
    Crc,
    SizeMismatch,
    Finalize,
    Write,
}

impl ProtocolError {
    /// The short wire token this error is reported as, e.g. `ERR bad-magic`.
    pub const fn token(self) -> &'static str {
        match self {
            ProtocolError::BadMagic => "bad-magic",
            ProtocolError::BadLen => "bad-len",
            ProtocolError::BadOffset => "bad-off",
            ProtocolError::Cap => "cap",
            ProtocolError::Crc => "crc",
            ProtocolError::SizeMismatch => "size-mismatch",
            ProtocolError::Finalize => "finalize",
            ProtocolError::Write => "write",
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => f.write_str("not found"),
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::OutOfSpace => f.write_str("out of space"),
            Error::AlreadyExists => f.write_str("already exists"),
            Error::IoError => f.write_str("I/O error"),
            Error::Protocol(p) => write!(f, "protocol error: {p}"),
            Error::Timeout => f.write_str("timeout"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(p: ProtocolError) -> Self {
        Error::Protocol(p)
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_tokens_match_wire_spelling() {
        assert_eq!(ProtocolError::BadMagic.token(), "bad-magic");
        assert_eq!(ProtocolError::Crc.token(), "crc");
        assert_eq!(ProtocolError::SizeMismatch.token(), "size-mismatch");
    }

    #[test]
    fn error_display_wraps_protocol_token() {
        let e = Error::from(ProtocolError::Cap);
        assert_eq!(alloc_free_to_string(&e), "protocol error: cap");
    }

    fn alloc_free_to_string(e: &Error) -> heapless::String<64> {
        use core::fmt::Write;
        let mut s: heapless::String<64> = heapless::String::new();
        write!(s, "{e}").unwrap();
        s
    }
}
