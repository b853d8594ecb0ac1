//! Transparent decompression for file sources (and compression for JSONL output).
//!
//! Detection is extension-first (`.gz`, `.zst`), falling back to magic bytes for
//! readers. Codecs are compiled in per feature flag:
//! - **Gzip** via `flate2` (feature: `compression-gzip`)
//! - **Zstd** via `zstd` (feature: `compression-zstd`)
//!
//! A file whose codec is not compiled in is read as-is.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Zstd,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Zstd => "zstd",
        }
    }

    fn magic(self) -> &'static [u8] {
        match self {
            Codec::Gzip => &[0x1f, 0x8b],
            Codec::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
        }
    }

    fn enabled(self) -> bool {
        match self {
            Codec::Gzip => cfg!(feature = "compression-gzip"),
            Codec::Zstd => cfg!(feature = "compression-zstd"),
        }
    }
}

/// Codec implied by the file extension, if any.
pub fn detect_from_extension(path: impl AsRef<Path>) -> Option<Codec> {
    match path.as_ref().extension()?.to_str()? {
        "gz" | "gzip" => Some(Codec::Gzip),
        "zst" | "zstd" => Some(Codec::Zstd),
        _ => None,
    }
}

fn detect_from_magic<R: BufRead>(reader: &mut R) -> std::io::Result<Option<Codec>> {
    let head = reader.fill_buf()?;
    Ok([Codec::Gzip, Codec::Zstd]
        .into_iter()
        .find(|c| head.starts_with(c.magic())))
}

fn wrap_reader(codec: Codec, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
    match codec {
        #[cfg(feature = "compression-gzip")]
        Codec::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
        #[cfg(feature = "compression-zstd")]
        Codec::Zstd => Ok(Box::new(zstd::stream::read::Decoder::new(reader)?)),
        #[allow(unreachable_patterns)]
        _ => Ok(reader),
    }
}

fn wrap_writer(codec: Codec, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
    match codec {
        #[cfg(feature = "compression-gzip")]
        Codec::Gzip => Ok(Box::new(flate2::write::GzEncoder::new(
            writer,
            flate2::Compression::default(),
        ))),
        #[cfg(feature = "compression-zstd")]
        Codec::Zstd => Ok(Box::new(
            zstd::stream::write::Encoder::new(writer, 3)?.auto_finish(),
        )),
        #[allow(unreachable_patterns)]
        _ => Ok(writer),
    }
}

/// Wrap `reader` with the decompressor its path or leading bytes call for.
///
/// # Errors
/// Returns an error if the leading bytes cannot be read or the decoder fails to start.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> std::io::Result<Box<dyn BufRead>> {
    let mut buffered = BufReader::new(reader);
    let codec = match detect_from_extension(&path_hint) {
        Some(codec) => Some(codec),
        None => detect_from_magic(&mut buffered)?,
    };
    match codec {
        Some(codec) if codec.enabled() => Ok(Box::new(BufReader::new(wrap_reader(
            codec,
            Box::new(buffered),
        )?))),
        _ => Ok(Box::new(buffered)),
    }
}

/// Wrap `writer` with the compressor its path extension calls for.
///
/// # Errors
/// Returns an error if the encoder fails to start.
pub fn auto_detect_writer<W: Write + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> std::io::Result<Box<dyn Write>> {
    match detect_from_extension(&path_hint) {
        Some(codec) if codec.enabled() => wrap_writer(codec, Box::new(writer)),
        _ => Ok(Box::new(writer)),
    }
}
