//! Compression wrappers around the archive stream

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};

/// zstd level used when none is configured
pub const DEFAULT_LEVEL: i32 = 3;

/// How archive streams are encoded in storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Uncompressed tar
    #[default]
    Tar,
    /// gzip-compressed tar
    Gzip,
    /// zstd-compressed tar
    Zstd,
}

impl Compression {
    /// Range of levels accepted by this format, if it takes one
    #[must_use]
    pub const fn level_range(self) -> Option<(i32, i32)> {
        match self {
            Self::Tar => None,
            Self::Gzip => Some((0, 9)),
            Self::Zstd => Some((1, 22)),
        }
    }

    /// Wrap `sink` so that everything written to it is compressed
    pub fn encoder<W: Write>(self, sink: W, level: i32) -> io::Result<Encoder<W>> {
        Ok(match self {
            Self::Tar => Encoder::Plain(sink),
            Self::Gzip => {
                let level = u32::try_from(level.clamp(0, 9)).unwrap_or(6);
                Encoder::Gzip(flate2::write::GzEncoder::new(
                    sink,
                    flate2::Compression::new(level),
                ))
            }
            Self::Zstd => Encoder::Zstd(zstd::Encoder::new(sink, level)?),
        })
    }

    /// Wrap `source` so that reads yield the decompressed stream
    pub fn decoder<'a, R: Read + 'a>(self, source: R) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::Tar => Box::new(source),
            Self::Gzip => Box::new(flate2::read::GzDecoder::new(source)),
            Self::Zstd => Box::new(zstd::Decoder::new(source)?),
        })
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tar => "tar",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        })
    }
}

/// A compressing writer; call [`Encoder::finish`] to write the trailer
pub enum Encoder<W: Write> {
    /// No compression
    Plain(W),
    /// gzip
    Gzip(flate2::write::GzEncoder<W>),
    /// zstd
    Zstd(zstd::Encoder<'static, W>),
}

impl<W: Write> Encoder<W> {
    /// Flush the compressed trailer and return the inner writer
    pub fn finish(self) -> io::Result<W> {
        let mut inner = match self {
            Self::Plain(w) => w,
            Self::Gzip(e) => e.finish()?,
            Self::Zstd(e) => e.finish()?,
        };
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(e) => e.write(buf),
            Self::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(e) => e.flush(),
            Self::Zstd(e) => e.flush(),
        }
    }
}
