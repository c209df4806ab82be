//! Where model artifacts are fetched from on a cache miss.

use crate::core::errors::{OCRError, OcrResult};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Progress callback: `(received_bytes, total_bytes)`. The total is `None`
/// when the source does not disclose it.
pub type FetchProgress<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// A location that serves artifacts by relative path.
pub trait ArtifactSource: Send + Sync {
    /// Human-readable location of `path`, for logs and errors.
    fn locate(&self, path: &str) -> String;

    /// Fetches the bytes at `path` on behalf of artifact `name`.
    ///
    /// # Errors
    ///
    /// * [`OCRError::ModelFetch`] on transport failure or a non-success status.
    /// * [`OCRError::ModelNotFound`] when the path does not hold an artifact.
    fn fetch(&self, name: &str, path: &str, progress: FetchProgress<'_>) -> OcrResult<Vec<u8>>;
}

/// Fetches artifacts over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpArtifactSource {
    base: String,
    client: reqwest::blocking::Client,
}

const READ_CHUNK: usize = 64 * 1024;

impl HttpArtifactSource {
    /// Creates a source rooted at `base` (e.g. `https://host/models`).
    pub fn new(base: impl Into<String>) -> OcrResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|e| OCRError::model_fetch_with_source("http client", "cannot build client", e))?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl ArtifactSource for HttpArtifactSource {
    fn locate(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn fetch(&self, name: &str, path: &str, progress: FetchProgress<'_>) -> OcrResult<Vec<u8>> {
        let url = self.locate(path);
        info!("Downloading {name} from {url}");

        let mut response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| OCRError::model_fetch_with_source(name, format!("request to {url} failed"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OCRError::model_fetch(name, format!("HTTP {status} from {url}")));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/html"));
        if is_html {
            return Err(OCRError::model_not_found(name, url));
        }

        let total = response.content_length();
        if let Some(size) = total {
            debug!("Download size for {name}: {size} bytes");
        }

        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = response.read(&mut chunk).map_err(|e| {
                OCRError::model_fetch_with_source(name, format!("reading {url} failed"), e)
            })?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            progress(bytes.len() as u64, total);
        }

        info!("Downloaded {} bytes for {name}", bytes.len());
        Ok(bytes)
    }
}

/// Reads artifacts from a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryArtifactSource {
    root: PathBuf,
}

impl DirectoryArtifactSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactSource for DirectoryArtifactSource {
    fn locate(&self, path: &str) -> String {
        self.root.join(path).display().to_string()
    }

    fn fetch(&self, name: &str, path: &str, progress: FetchProgress<'_>) -> OcrResult<Vec<u8>> {
        let full = self.root.join(path);
        let bytes = match std::fs::read(&full) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OCRError::model_not_found(name, full.display().to_string()));
            }
            Err(e) => {
                return Err(OCRError::model_fetch_with_source(
                    name,
                    format!("cannot read {}", full.display()),
                    e,
                ));
            }
        };
        let len = bytes.len() as u64;
        progress(len, Some(len));
        Ok(bytes)
    }
}

/// Builds the source matching a base string: HTTP(S) URLs go over the network,
/// anything else is a directory.
pub fn source_for(base: &str) -> OcrResult<Box<dyn ArtifactSource>> {
    if base.starts_with("http://") || base.starts_with("https://") {
        Ok(Box::new(HttpArtifactSource::new(base)?))
    } else {
        Ok(Box::new(DirectoryArtifactSource::new(base)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    /// Answers a single request with `response` and returns the base URL.
    fn serve_once(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 4096];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(response);
                let _ = stream.flush();
            }
        });
        format!("http://{addr}/models")
    }

    fn local_source(base: String) -> HttpArtifactSource {
        HttpArtifactSource {
            base,
            client: reqwest::blocking::Client::builder()
                .no_proxy()
                .build()
                .unwrap(),
        }
    }

    #[test]
    fn test_directory_source_reads_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("layout.onnx"), [7u8; 12]).unwrap();
        let source = DirectoryArtifactSource::new(dir.path());

        let mut seen = Vec::new();
        let bytes = source
            .fetch("layout", "layout.onnx", &mut |r, t| seen.push((r, t)))
            .unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(seen, vec![(12, Some(12))]);
    }

    #[test]
    fn test_directory_source_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryArtifactSource::new(dir.path());
        let err = source.fetch("layout", "nope.onnx", &mut |_, _| {}).unwrap_err();
        assert!(matches!(err, OCRError::ModelNotFound { .. }));
    }

    #[test]
    fn test_http_locate_joins_paths() {
        let source = HttpArtifactSource::new("https://example.org/models/").unwrap();
        assert_eq!(
            source.locate("/layout.onnx"),
            "https://example.org/models/layout.onnx"
        );
    }

    #[test]
    fn test_http_download_reports_progress() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: 4\r\nConnection: close\r\n\r\nonnx",
        );
        let mut seen = Vec::new();
        let bytes = local_source(base)
            .fetch("layout", "layout.onnx", &mut |r, t| seen.push((r, t)))
            .unwrap();
        assert_eq!(bytes, b"onnx");
        assert_eq!(seen.last(), Some(&(4, Some(4))));
        assert!(seen.iter().all(|&(_, total)| total == Some(4)));
    }

    #[test]
    fn test_http_html_page_is_not_found() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: 13\r\nConnection: close\r\n\r\n<html></html>",
        );
        let err = local_source(base)
            .fetch("recognition30", "recognition30.onnx", &mut |_, _| {})
            .unwrap_err();
        assert!(matches!(err, OCRError::ModelNotFound { .. }));
    }

    #[test]
    fn test_http_error_status_is_fetch_error() {
        let base = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let err = local_source(base)
            .fetch("layout", "layout.onnx", &mut |_, _| {})
            .unwrap_err();
        match err {
            OCRError::ModelFetch { name, reason, .. } => {
                assert_eq!(name, "layout");
                assert!(reason.contains("404"));
            }
            other => panic!("expected ModelFetch, got {other:?}"),
        }
    }
}
