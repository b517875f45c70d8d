//! Bundle formats for the deep storage tier.
//!
//! A "bundle format" is the codec used to shrink files placed in the deep
//! tier. Every supported codec is a variant of [`Compression`], which
//! provides:
//!
//! - **Parsing** from configuration strings ([`FromStr`](std::str::FromStr))
//! - **Detection** from the leading bytes of a stored artifact
//!   ([`Compression::from_magic_bytes`], [`Compression::detect`])
//! - **In-memory** encoding/decoding ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Streaming** decoding straight into a file ([`Compression::decompress_stream`])
//!
//! Bzip2 and Gzip are always available. Brotli, XZ and Zstd are behind
//! feature flags of the same name.
//!
//! Every codec runs at its highest level: deep storage trades CPU time for
//! disk space.

mod construct;
pub use crate::construct::MAGIC_LEN;
pub mod error;
mod ops;
mod util;

/// A supported bundle format.
///
/// Defaults to [`None`](Self::None), which passes bytes through untouched.
/// `None` is never a valid deep-tier bundle format; it exists so that
/// detection has something to return for unrecognised data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Brotli
    #[cfg(feature = "brotli")]
    Brotli,
    /// Bzip2
    Bzip2,
    /// Gzip (deflate with a gzip header)
    Gzip,
    /// XZ/LZMA
    #[cfg(feature = "xz")]
    Xz,
    /// Zstandard
    #[cfg(feature = "zstd")]
    Zstd,
}

#[cfg(test)]
mod tests {
    use crate::Compression;

    #[test]
    fn default_is_passthrough() {
        assert_eq!(Compression::default(), Compression::None);
        assert!(!Compression::default().is_compressed());
    }
}
