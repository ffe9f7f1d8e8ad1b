// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Filesystem backed repositories. */

use {
    crate::{
        error::{DebianError, Result},
        repository::fetch::{IndexTransport, TransportResponse},
    },
    std::path::PathBuf,
    url::Url,
};

/// Resolve a `file:` URL or plain path to a filesystem path.
pub fn url_to_path(url: &str) -> Result<PathBuf> {
    match Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "file" => {
            parsed.to_file_path().map_err(|_| DebianError::Fetch {
                url: url.to_string(),
                message: "URL does not refer to a local path".to_string(),
            })
        }
        Ok(parsed) => Err(DebianError::Fetch {
            url: url.to_string(),
            message: format!("not a file URL (scheme {})", parsed.scheme()),
        }),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(PathBuf::from(url)),
        Err(e) => Err(e.into()),
    }
}

/// An [IndexTransport] reading from the local filesystem.
///
/// Accepts `file:` URLs and bare paths.
#[derive(Clone, Debug, Default)]
pub struct FilesystemTransport {}

impl IndexTransport for FilesystemTransport {
    fn get(&self, url: &str, _accept_gzip: bool) -> Result<TransportResponse> {
        let path = url_to_path(url)?;

        let data = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DebianError::FetchNotFound {
                    url: url.to_string(),
                }
            } else {
                DebianError::Fetch {
                    url: url.to_string(),
                    message: format!("error reading {}: {}", path.display(), e),
                }
            }
        })?;

        Ok(TransportResponse {
            content_encoding: None,
            data,
        })
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{io::gzip, repository::fetch::IndexFetcher},
        std::io::Read,
    };

    #[test]
    fn file_urls() -> Result<()> {
        assert_eq!(url_to_path("file:/srv/repo/Packages")?, PathBuf::from("/srv/repo/Packages"));
        assert_eq!(url_to_path("file:///srv/repo")?, PathBuf::from("/srv/repo"));
        assert_eq!(url_to_path("/srv/repo")?, PathBuf::from("/srv/repo"));
        assert!(url_to_path("http://example.com/").is_err());

        Ok(())
    }

    #[test]
    fn fetch_from_directory() -> Result<()> {
        let td = tempfile::Builder::new()
            .prefix("apt-repo-client-test")
            .tempdir()?;

        std::fs::write(td.path().join("Sources.gz"), gzip(b"Package: zstd\n"))?;
        std::fs::write(td.path().join("Packages"), b"Package: libzstd1\n")?;

        let base = format!("file:{}", td.path().display());
        let fetcher = IndexFetcher::new(FilesystemTransport::default());

        let mut s = String::new();
        fetcher
            .fetch(&format!("{}/Sources", base), false)?
            .unwrap()
            .read_to_string(&mut s)?;
        assert_eq!(s, "Package: zstd\n");

        s.clear();
        fetcher
            .fetch(&format!("{}/Packages", base), false)?
            .unwrap()
            .read_to_string(&mut s)?;
        assert_eq!(s, "Package: libzstd1\n");

        assert!(fetcher.fetch(&format!("{}/Missing", base), true)?.is_none());

        Ok(())
    }
}
