//! Filename validation.
//!
//! Uploaded filenames come from a client-controlled header, so they must be
//! checked before being joined onto a tier root.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path};

/// Validates a client-supplied filename.
///
/// A valid filename is exactly one normal path component: no separators,
/// no `.`/`..`, no root or prefix, and no null bytes.
///
/// # Examples
///
/// ```
/// use strata_storage::validate_filename;
/// assert!(validate_filename("a.txt").is_ok());
/// assert!(validate_filename("report 2024 (final).pdf").is_ok());
/// assert!(validate_filename("../etc/passwd").is_err());
/// assert!(validate_filename("dir/file.txt").is_err());
/// assert!(validate_filename("").is_err());
/// ```
pub fn validate_filename(name: &str) -> Result<&str> {
    // Null bytes pass through Path::components() on Unix but truncate names
    // in C-based syscalls.
    if name.contains('\0') || name.contains('/') || name.contains('\\') {
        exn::bail!(ErrorKind::InvalidFilename(name.to_string()));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) if segment == name => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidFilename(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a.txt")]
    #[case("archive.tar.gz")]
    #[case(".hidden")]
    #[case("名前.txt")]
    #[case("with spaces.md")]
    fn accepts_plain_names(#[case] name: &str) {
        assert_eq!(validate_filename(name).unwrap(), name);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../passwd")]
    #[case("/etc/passwd")]
    #[case("a/b")]
    #[case("a\\b")]
    #[case("trailing/")]
    #[case("a\0b")]
    fn rejects_anything_that_could_escape(#[case] name: &str) {
        let err = validate_filename(name).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidFilename(_)));
    }
}
