// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Backend spec string parsing and name normalization.
//!
//! Pure logic, no backend I/O — testable on host the same way
//! `crispy-common::boot_fsm` is pure logic kept separate from
//! `crispy-common::flash`.

use crate::backend::BackendId;
use crate::error::Error;

/// Maximum length of a normalized file name, in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// A parsed `<backend>:<path>` argument, with the path already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub backend: BackendId,
    pub path: heapless::String<MAX_NAME_LEN>,
    /// The raw path ended in `/`, i.e. "treat as directory".
    pub trailing_slash: bool,
}

/// Parse `"<backend>:<path>"`. Fails if the colon is absent, the prefix is
/// unknown, or the normalized path is empty or exceeds 32 bytes.
pub fn parse_backend_spec(spec: &str) -> Result<BackendSpec, Error> {
    let colon = spec.find(':').ok_or(Error::InvalidArgument)?;
    let (prefix, rest) = spec.split_at(colon);
    let rest = &rest[1..]; // drop the colon itself

    let backend = BackendId::parse(prefix)?;
    let trailing_slash = rest.ends_with('/');
    let path = normalize_name(rest)?;

    Ok(BackendSpec {
        backend,
        path,
        trailing_slash,
    })
}

/// Strip leading slashes and validate length.
///
/// A name exceeding 32 bytes after normalization is rejected. A path that
/// normalizes to nothing (e.g. `"/"` alone, or the empty string) is also
/// rejected — callers that want "treat destination as directory" semantics
/// detect the trailing slash themselves before calling this on a basename.
pub fn normalize_name(raw: &str) -> Result<heapless::String<MAX_NAME_LEN>, Error> {
    let stripped = raw.trim_start_matches('/');
    // A trailing slash marks "directory"; the basename that gets appended
    // is normalized separately, so trim it here too when present alone.
    let stripped = stripped.strip_suffix('/').unwrap_or(stripped);
    if stripped.is_empty() || stripped.len() > MAX_NAME_LEN {
        return Err(Error::InvalidArgument);
    }
    heapless::String::try_from(stripped).map_err(|_| Error::InvalidArgument)
}

/// Compute the destination basename when a destination spec ends in `/`
/// ("treat as directory").
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_backend_prefixes() {
        let s = parse_backend_spec("flash:/firmware.bin").unwrap();
        assert_eq!(s.backend, BackendId::Flash);
        assert_eq!(&s.path, "firmware.bin");
        assert!(!s.trailing_slash);
    }

    #[test]
    fn rejects_missing_colon() {
        assert_eq!(parse_backend_spec("flash/a"), Err(Error::InvalidArgument));
    }

    #[test]
    fn rejects_unknown_backend_prefix() {
        assert_eq!(parse_backend_spec("sd:/a"), Err(Error::InvalidArgument));
    }

    #[test]
    fn strips_leading_slashes() {
        let s = parse_backend_spec("psram:///a/b").unwrap();
        assert_eq!(&s.path, "a/b");
    }

    #[test]
    fn detects_trailing_slash_as_directory_marker() {
        let s = parse_backend_spec("nand:/dir/").unwrap();
        assert!(s.trailing_slash);
    }

    #[test]
    fn name_of_exactly_32_bytes_is_accepted() {
        let name = "a".repeat(32);
        assert!(normalize_name(&name).is_ok());
    }

    #[test]
    fn name_of_33_bytes_is_rejected() {
        let name = "a".repeat(33);
        assert_eq!(normalize_name(&name), Err(Error::InvalidArgument));
    }

    #[test]
    fn basename_extracts_trailing_component() {
        assert_eq!(basename("a/b/c.bin"), "c.bin");
        assert_eq!(basename("c.bin"), "c.bin");
    }
}
