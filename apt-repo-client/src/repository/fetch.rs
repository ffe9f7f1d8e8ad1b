// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Retrieval of index documents.

An [IndexTransport] performs single requests against a URL. [IndexFetcher]
layers the index retrieval protocol on top: the gzip compressed variant of a
document is requested first, falling back to the plain variant if the
compressed one does not exist.
*/

use {
    crate::{
        error::{DebianError, Result},
        io::{read_decompressed, Compression},
        repository::filesystem::FilesystemTransport,
    },
    log::{debug, warn},
    std::io::{BufRead, Cursor, Read},
};

/// The result of a successful transport request.
#[derive(Clone, Debug, Default)]
pub struct TransportResponse {
    /// Value of a `Content-Encoding` header, if the transport has such a concept.
    pub content_encoding: Option<String>,
    /// Raw response body.
    pub data: Vec<u8>,
}

/// Performs requests for individual URLs.
///
/// Implementations must report absent documents as [DebianError::FetchNotFound] so the
/// fallback protocol can distinguish them from other failures.
pub trait IndexTransport {
    /// Retrieve the content at a URL.
    ///
    /// `accept_gzip` indicates the caller can handle gzip encoded content.
    fn get(&self, url: &str, accept_gzip: bool) -> Result<TransportResponse>;
}

/// An [IndexTransport] choosing an implementation based on the URL scheme.
///
/// `http://` and `https://` go over HTTP (when the `http` feature is enabled).
/// `file:` URLs and values without a scheme are read from the local filesystem.
#[derive(Debug, Default)]
pub struct DispatchTransport {
    #[cfg(feature = "http")]
    http: crate::repository::http::HttpTransport,
    filesystem: FilesystemTransport,
}

impl DispatchTransport {
    #[cfg(feature = "http")]
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: crate::repository::http::HttpTransport::new()?,
            filesystem: FilesystemTransport::default(),
        })
    }

    #[cfg(not(feature = "http"))]
    pub fn new() -> Result<Self> {
        Ok(Self::default())
    }
}

impl IndexTransport for DispatchTransport {
    fn get(&self, url: &str, accept_gzip: bool) -> Result<TransportResponse> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .filter(|scheme| scheme.len() > 1);

        match scheme.as_deref() {
            #[cfg(feature = "http")]
            Some("http" | "https") => self.http.get(url, accept_gzip),
            Some("file") | None => self.filesystem.get(url, accept_gzip),
            Some(scheme) => Err(DebianError::Fetch {
                url: url.to_string(),
                message: format!("unsupported URL scheme: {}", scheme),
            }),
        }
    }
}

/// A decompressed index document.
#[derive(Debug)]
pub struct FetchedIndex {
    /// The URL the content was retrieved from.
    pub url: String,
    /// Compression the content was retrieved in.
    pub compression: Compression,
    reader: Cursor<Vec<u8>>,
}

impl Read for FetchedIndex {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl BufRead for FetchedIndex {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

/// Retrieves index documents using the compressed-then-plain fallback protocol.
pub struct IndexFetcher {
    transport: Box<dyn IndexTransport>,
}

impl IndexFetcher {
    /// Construct an instance using a given transport.
    pub fn new(transport: impl IndexTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// Construct an instance using [DispatchTransport].
    pub fn new_default() -> Result<Self> {
        Ok(Self::new(DispatchTransport::new()?))
    }

    /// Fetch the index document at `url`.
    ///
    /// `<url>.gz` is tried first, then `<url>`. If neither exists, `Ok(None)` is
    /// returned when `ignore_errors` is set. Otherwise an error is raised. Errors other
    /// than absence of the document are always raised.
    pub fn fetch(&self, url: &str, ignore_errors: bool) -> Result<Option<FetchedIndex>> {
        for compression in Compression::fetch_order() {
            let request_url = format!("{}{}", url, compression.extension());
            debug!("fetching {}", request_url);

            let response = match self.transport.get(&request_url, true) {
                Ok(response) => response,
                Err(e) if e.is_not_found() => {
                    debug!("{} not found", request_url);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let compression =
                Compression::detect(&request_url, response.content_encoding.as_deref());

            let reader = read_decompressed(response.data, compression).map_err(|e| {
                DebianError::Fetch {
                    url: request_url.clone(),
                    message: format!("error decompressing content: {}", e),
                }
            })?;

            return Ok(Some(FetchedIndex {
                url: request_url,
                compression,
                reader,
            }));
        }

        if ignore_errors {
            warn!("no index document at {}; skipping", url);
            Ok(None)
        } else {
            Err(DebianError::Fetch {
                url: url.to_string(),
                message: "404 not found (compressed and plain)".to_string(),
            })
        }
    }
}
