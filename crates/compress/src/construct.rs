use crate::Compression;
use crate::error::{Error, ErrorKind};
use std::str::FromStr;

const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
#[cfg(feature = "xz")]
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
#[cfg(feature = "zstd")]
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Longest magic sequence of any codec; read at least this many bytes
/// before calling [`Compression::detect`].
pub const MAGIC_LEN: usize = 6;

impl FromStr for Compression {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Compression::None),
            #[cfg(feature = "brotli")]
            "br" | "brotli" => Ok(Compression::Brotli),
            #[cfg(not(feature = "brotli"))]
            "br" | "brotli" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            "bz2" | "bzip2" => Ok(Compression::Bzip2),
            "gz" | "gzip" => Ok(Compression::Gzip),
            #[cfg(feature = "xz")]
            "xz" | "lzma" => Ok(Compression::Xz),
            #[cfg(not(feature = "xz"))]
            "xz" | "lzma" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            #[cfg(feature = "zstd")]
            "zst" | "zstd" => Ok(Compression::Zstd),
            #[cfg(not(feature = "zstd"))]
            "zst" | "zstd" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl Compression {
    /// Detect a bundle format from magic bytes.
    ///
    /// Returns the `None` variant if nothing matches or the input is too
    /// short. Brotli streams carry no magic bytes and are never detected.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Compression::Bzip2;
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            return Compression::Gzip;
        }
        #[cfg(feature = "xz")]
        if bytes.starts_with(&XZ_MAGIC) {
            return Compression::Xz;
        }
        #[cfg(feature = "zstd")]
        if bytes.starts_with(&ZSTD_MAGIC) {
            return Compression::Zstd;
        }
        Compression::None
    }

    /// Work out which codec produced a stored artifact.
    ///
    /// Magic bytes win; anything unrecognised is assumed to have been
    /// written with `fallback` (the configured bundle format). This keeps
    /// artifacts readable after the configured format changes, as long as
    /// the old format had magic bytes.
    #[must_use]
    pub fn detect(head: &[u8], fallback: Compression) -> Self {
        match Self::from_magic_bytes(head) {
            Compression::None => fallback,
            detected => detected,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;

    #[rstest]
    #[case("none", Compression::None)]
    #[case("bz2", Compression::Bzip2)]
    #[case("bzip2", Compression::Bzip2)]
    #[case("BZIP2", Compression::Bzip2)]
    #[case("gz", Compression::Gzip)]
    #[case(" gzip ", Compression::Gzip)]
    #[cfg_attr(feature = "brotli", case("brotli", Compression::Brotli))]
    #[cfg_attr(feature = "xz", case("lzma", Compression::Xz))]
    #[cfg_attr(feature = "zstd", case("zstd", Compression::Zstd))]
    fn test_from_str(#[case] test: &str, #[case] expected: Compression) {
        assert_eq!(test.parse::<Compression>().unwrap(), expected);
    }

    #[rstest]
    #[case("lz4")]
    #[case("snappy")]
    #[case("")]
    fn test_from_str_unsupported(#[case] test: &str) {
        assert!(test.parse::<Compression>().is_err());
    }

    #[rstest]
    #[case(b"hello world", Compression::None)]
    #[case(b"", Compression::None)]
    #[case(&[0x42, 0x5A, 0x68, 0x39], Compression::Bzip2)]
    #[case(&[0x1F, 0x8B, 0x08, 0x00], Compression::Gzip)]
    #[cfg_attr(feature = "xz", case(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, 0x00], Compression::Xz))]
    #[cfg_attr(feature = "zstd", case(&[0x28, 0xB5, 0x2F, 0xFD], Compression::Zstd))]
    fn test_from_magic_bytes(#[case] bytes: &[u8], #[case] expected: Compression) {
        assert_eq!(Compression::from_magic_bytes(bytes), expected);
    }

    #[test]
    fn detect_prefers_magic_over_fallback() {
        let gzipped = Compression::Gzip.compress(b"payload").unwrap();
        assert_eq!(Compression::detect(&gzipped, Compression::Bzip2), Compression::Gzip);
        assert_eq!(Compression::detect(b"no magic here", Compression::Bzip2), Compression::Bzip2);
    }
}
