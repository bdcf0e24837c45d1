//! Fragment sources: where component HTML comes from.
//!
//! The [`FragmentSource`] trait is the loader's only view of the outside
//! world. A fragment path looks like `/components/header.html`; each source
//! decides how to turn that into bytes:
//!
//! - [`DirSource`] reads it relative to a site root on disk.
//! - [`HttpSource`] GETs it relative to a base URL.
//!
//! Both report failures as [`FetchError`]. A missing file is reported the
//! same way a web server would: `HTTP 404: Not Found`.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FetchError {
    pub fn not_found() -> Self {
        Self::Status {
            status: 404,
            reason: "Not Found".to_string(),
        }
    }
}

/// Trait for fragment sources.
///
/// Sources are shared by every concurrent load, so they must be `Sync`.
pub trait FragmentSource: Send + Sync {
    /// Fetch the fragment at `path` (e.g. `/components/header.html`).
    fn fetch(&self, path: &str) -> Result<String, FetchError>;
}

/// Reads fragments from a site directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a fragment path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl FragmentSource for DirSource {
    fn fetch(&self, path: &str) -> Result<String, FetchError> {
        match std::fs::read_to_string(self.resolve(path)) {
            Ok(html) => Ok(html),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(FetchError::not_found()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Fetches fragments over HTTP from a deployed site.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("inflapy-components/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl FragmentSource for HttpSource {
    fn fetch(&self, path: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }
        response
            .text()
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;
    use tempfile::TempDir;

    /// Answer one request on a loopback port with `response`. The handle
    /// yields the request head the server received.
    fn serve_once(response: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (base_url, server)
    }

    fn response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn dir_source_reads_relative_to_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("components")).unwrap();
        fs::write(tmp.path().join("components/header.html"), "<header></header>").unwrap();

        let source = DirSource::new(tmp.path());
        assert_eq!(
            source.fetch("/components/header.html").unwrap(),
            "<header></header>"
        );
    }

    #[test]
    fn dir_source_missing_file_is_404() {
        let tmp = TempDir::new().unwrap();
        let err = DirSource::new(tmp.path())
            .fetch("/components/footer.html")
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }

    #[test]
    fn http_source_joins_urls() {
        let source = HttpSource::new("https://inflablesparafiestas.com.mx/").unwrap();
        assert_eq!(
            source.url("/components/header.html"),
            "https://inflablesparafiestas.com.mx/components/header.html"
        );
    }

    #[test]
    fn http_source_unreachable_host_is_network_error() {
        // Port 9 (discard) on loopback refuses connections.
        let source = HttpSource::new("http://127.0.0.1:9").unwrap();
        let err = source.fetch("/components/header.html").unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
    }

    #[test]
    fn http_source_returns_body_unchanged() {
        let body = "<footer><p>Contáctanos: <a href=\"#contacto\">aquí</a></p></footer>";
        let (base_url, server) = serve_once(response("200 OK", body));

        let source = HttpSource::new(base_url).unwrap();
        let html = source.fetch("/components/footer.html").unwrap();

        assert_eq!(html, body);
        let request = server.join().unwrap();
        assert!(request.starts_with("GET /components/footer.html HTTP/1.1\r\n"), "{request}");
    }

    #[test]
    fn http_source_not_found_is_status_error() {
        let (base_url, server) = serve_once(response("404 Not Found", "no such page"));

        let source = HttpSource::new(base_url).unwrap();
        let err = source.fetch("/components/footer.html").unwrap_err();
        server.join().unwrap();

        match &err {
            FetchError::Status { status, reason } => {
                assert_eq!(*status, 404);
                assert_eq!(reason, "Not Found");
            }
            other => panic!("expected a status error, got {other:?}"),
        }
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }

    #[test]
    fn http_source_server_error_is_status_error() {
        let (base_url, server) = serve_once(response("500 Internal Server Error", "boom"));

        let source = HttpSource::new(base_url).unwrap();
        let err = source.fetch("/components/header.html").unwrap_err();
        server.join().unwrap();

        assert!(
            matches!(&err, FetchError::Status { status: 500, reason } if reason == "Internal Server Error"),
            "got {err:?}"
        );
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");
    }
}
