// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! HTTP transport for index documents. */

use {
    crate::{
        error::{DebianError, Result},
        repository::fetch::{IndexTransport, TransportResponse},
    },
    reqwest::{
        blocking::{Client, ClientBuilder},
        header::{ACCEPT_ENCODING, CONTENT_ENCODING},
        StatusCode,
    },
};

const USER_AGENT: &str = concat!("apt-repo-client/", env!("CARGO_PKG_VERSION"));

/// Obtain an HTTP client for fetching repository content.
///
/// Proxy settings from the environment are honored.
pub fn get_http_client() -> Result<Client> {
    Ok(ClientBuilder::new().user_agent(USER_AGENT).build()?)
}

/// An [IndexTransport] performing blocking HTTP GET requests.
#[derive(Debug, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Construct an instance with a default configured client.
    pub fn new() -> Result<Self> {
        Ok(Self::new_client(get_http_client()?))
    }

    /// Construct an instance using the given [Client].
    pub fn new_client(client: Client) -> Self {
        Self { client }
    }
}

impl IndexTransport for HttpTransport {
    fn get(&self, url: &str, accept_gzip: bool) -> Result<TransportResponse> {
        let mut request = self.client.get(url);
        if accept_gzip {
            request = request.header(ACCEPT_ENCODING, "gzip");
        }

        let res = request.send().map_err(|e| DebianError::Fetch {
            url: url.to_string(),
            message: format!("error sending HTTP request: {:?}", e),
        })?;

        if res.status() == StatusCode::NOT_FOUND {
            return Err(DebianError::FetchNotFound {
                url: url.to_string(),
            });
        }

        let res = res.error_for_status().map_err(|e| DebianError::Fetch {
            url: url.to_string(),
            message: format!("bad HTTP status code: {:?}", e),
        })?;

        let content_encoding = res
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let data = res.bytes().map_err(|e| DebianError::Fetch {
            url: url.to_string(),
            message: format!("error reading HTTP response: {:?}", e),
        })?;

        Ok(TransportResponse {
            content_encoding,
            data: data.to_vec(),
        })
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::repository::fetch::IndexFetcher,
        std::{
            io::{BufRead, BufReader, Read, Write},
            net::TcpListener,
            thread,
        },
    };

    /// Serve `count` connections, answering `/Packages` and 404 for everything else.
    fn serve(count: usize) -> Result<(String, thread::JoinHandle<()>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("http://{}", listener.local_addr()?);

        let handle = thread::spawn(move || {
            for stream in listener.incoming().take(count) {
                let mut stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    if header.trim().is_empty() {
                        break;
                    }
                }

                let path = request_line.split_whitespace().nth(1).unwrap_or_default();
                let (status, body) = if path == "/Packages" {
                    ("200 OK", "Package: served\n")
                } else {
                    ("404 Not Found", "")
                };

                write!(
                    stream,
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
                .unwrap();
            }
        });

        Ok((url, handle))
    }

    fn local_transport() -> Result<HttpTransport> {
        Ok(HttpTransport::new_client(
            ClientBuilder::new().no_proxy().build()?,
        ))
    }

    #[test]
    fn not_found_then_plain() -> Result<()> {
        let (url, handle) = serve(2)?;

        let fetcher = IndexFetcher::new(local_transport()?);
        let mut index = fetcher
            .fetch(&format!("{}/Packages", url), false)?
            .unwrap();

        let mut s = String::new();
        index.read_to_string(&mut s)?;
        assert_eq!(s, "Package: served\n");

        handle.join().unwrap();

        Ok(())
    }

    #[test]
    fn not_found_is_tolerated() -> Result<()> {
        let (url, handle) = serve(2)?;

        let fetcher = IndexFetcher::new(local_transport()?);
        assert!(fetcher.fetch(&format!("{}/Sources", url), true)?.is_none());

        handle.join().unwrap();

        Ok(())
    }
}
