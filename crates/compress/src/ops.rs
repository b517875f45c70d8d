//! Encoding and decoding.

use crate::Compression;
use crate::error::{ErrorKind, Result};
#[cfg(feature = "brotli")]
use brotli::{CompressorWriter as BrotliEncoder, Decompressor as BrotliDecoder};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::GzDecoder, write::GzEncoder};
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::{read::XzDecoder, write::XzEncoder};
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

const BZIP2_LEVEL: BzCompression = BzCompression::best();
const GZIP_LEVEL: GzCompression = GzCompression::best();
#[cfg(feature = "xz")]
const XZ_LEVEL: u32 = 9;
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 19;
#[cfg(feature = "brotli")]
const BROTLI_LEVEL: u32 = 11;
#[cfg(feature = "brotli")]
const BROTLI_BUFFER_SIZE: usize = 4096;
#[cfg(feature = "brotli")]
const BROTLI_LG_WINDOW_SIZE: u32 = 22;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_compress::Compression;
    ///
    /// let zeros = vec![0u8; 1000];
    /// let bundled = Compression::Gzip.compress(&zeros).unwrap();
    /// assert!(bundled.len() < zeros.len());
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.compress_into(input, &mut output)?;
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    ///
    /// ```
    /// use strata_compress::Compression;
    ///
    /// let bundled = Compression::Bzip2.compress(b"hello world").unwrap();
    /// assert_eq!(Compression::Bzip2.decompress(&bundled).unwrap(), b"hello world");
    /// ```
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.decompress_stream(input, &mut output)?;
        Ok(output)
    }

    /// Compress `input`, appending to `output`. Every encoder is finished
    /// explicitly so trailer write failures surface as errors instead of
    /// being swallowed on drop.
    #[instrument(skip(input, output), fields(format = %self, input_size = input.len(), output_size))]
    pub fn compress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let before = output.len();
        match self {
            Compression::None => output.extend_from_slice(input),
            #[cfg(feature = "brotli")]
            Compression::Brotli => {
                let mut encoder =
                    BrotliEncoder::new(&mut *output, BROTLI_BUFFER_SIZE, BROTLI_LEVEL, BROTLI_LG_WINDOW_SIZE);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.flush().or_raise(|| ErrorKind::Io)?;
                // The final metadata block is only emitted on drop.
                drop(encoder);
            },
            Compression::Bzip2 => {
                let mut encoder = BzEncoder::new(&mut *output, BZIP2_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(&mut *output, GZIP_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            #[cfg(feature = "xz")]
            Compression::Xz => {
                let mut encoder = XzEncoder::new(&mut *output, XZ_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let mut encoder = ZstdEncoder::new(&mut *output, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?;
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
        }
        let size = output.len() - before;
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }

    /// Wrap a reader with the matching decoder.
    fn decoder<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => Box::new(reader),
            #[cfg(feature = "brotli")]
            Compression::Brotli => Box::new(BrotliDecoder::new(reader, BROTLI_BUFFER_SIZE)),
            Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
            Compression::Gzip => Box::new(GzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Encoder)?),
        })
    }

    /// Decode everything `reader` yields into `writer`, returning the
    /// number of decoded bytes written.
    ///
    /// The writer is not flushed; buffered writers must be flushed by the
    /// caller.
    ///
    /// ```
    /// use std::io::Cursor;
    /// use strata_compress::Compression;
    ///
    /// let bundled = Compression::Gzip.compress(b"hello world").unwrap();
    /// let mut plain = Vec::new();
    /// let written = Compression::Gzip.decompress_stream(Cursor::new(bundled), &mut plain).unwrap();
    /// assert_eq!(written, 11);
    /// assert_eq!(plain, b"hello world");
    /// ```
    #[instrument(skip_all, fields(format = %self, output_size))]
    pub fn decompress_stream<'a, R: Read + 'a, W: Write>(&self, reader: R, mut writer: W) -> Result<u64> {
        let mut decoder = self.decoder(reader)?;
        // Read errors from a decoder almost always mean corrupt input.
        let size = std::io::copy(&mut decoder, &mut writer).or_raise(|| ErrorKind::InvalidData)?;
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }
}
