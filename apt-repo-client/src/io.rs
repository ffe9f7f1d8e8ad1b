// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! I/O helpers. */

use std::io::{Cursor, Read};

/// Compression format of a retrieved index document.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Compression {
    /// No compression (no extension).
    None,

    /// Gzip compression (.gz extension).
    Gzip,
}

impl Compression {
    /// Filename extension for files compressed in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
        }
    }

    /// Retrieval order for index documents: compressed first, then plain.
    pub fn fetch_order() -> impl Iterator<Item = Compression> {
        [Self::Gzip, Self::None].into_iter()
    }

    /// Resolve the compression of a response.
    ///
    /// Content is gzip if the transport says so via `Content-Encoding` or if the
    /// requested URL carries the `.gz` extension.
    pub fn detect(url: &str, content_encoding: Option<&str>) -> Self {
        let header_gzip = content_encoding
            .map(|v| {
                v.split(',')
                    .any(|enc| matches!(enc.trim().to_ascii_lowercase().as_str(), "gzip" | "x-gzip"))
            })
            .unwrap_or_default();

        if header_gzip || url.ends_with(Self::Gzip.extension()) {
            Self::Gzip
        } else {
            Self::None
        }
    }
}

/// Decompress data fully in memory, returning a reader over the decompressed bytes.
pub fn read_decompressed(data: Vec<u8>, compression: Compression) -> std::io::Result<Cursor<Vec<u8>>> {
    Ok(match compression {
        Compression::None => Cursor::new(data),
        Compression::Gzip => {
            let mut decoder = libflate::gzip::MultiDecoder::new(Cursor::new(data))?;
            let mut decoded = vec![];
            decoder.read_to_end(&mut decoded)?;

            Cursor::new(decoded)
        }
    })
}

#[cfg(test)]
pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    use std::io::Write;

    let mut encoder = libflate::gzip::Encoder::new(vec![]).expect("gzip encoder should construct");
    encoder.write_all(data).expect("in-memory write should succeed");
    encoder
        .finish()
        .into_result()
        .expect("in-memory gzip should finish")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn detect_compression() {
        assert_eq!(
            Compression::detect("http://example.com/Packages.gz", None),
            Compression::Gzip
        );
        assert_eq!(
            Compression::detect("http://example.com/Packages", Some("gzip")),
            Compression::Gzip
        );
        assert_eq!(
            Compression::detect("http://example.com/Packages", Some("identity")),
            Compression::None
        );
        assert_eq!(
            Compression::detect("http://example.com/Packages", None),
            Compression::None
        );
    }

    #[test]
    fn gzip_decompression() -> std::io::Result<()> {
        let mut reader = read_decompressed(gzip(b"Package: foo\n"), Compression::Gzip)?;

        let mut s = String::new();
        reader.read_to_string(&mut s)?;
        assert_eq!(s, "Package: foo\n");

        Ok(())
    }
}
