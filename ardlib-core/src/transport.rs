//! HTTP transport seam
//!
//! The pipeline only needs "GET this URL and hand me the body, in chunks if
//! possible". [`HttpTransport`] does that with reqwest. With the `testing`
//! feature, `MemoryTransport` serves canned bodies and counts requests.

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(any(test, feature = "testing"))]
use std::collections::HashMap;
#[cfg(any(test, feature = "testing"))]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(any(test, feature = "testing"))]
use std::sync::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};

/// Performs GET requests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start a GET request, failing on transport errors and non-success statuses
    async fn get(&self, url: &str) -> Result<Box<dyn Body>>;
}

/// A response body that can be drained chunk by chunk
#[async_trait]
pub trait Body: Send {
    /// Total body size, when the server announced it
    fn content_length(&self) -> Option<u64>;

    /// Next chunk of the body, `None` once drained
    async fn chunk(&mut self) -> Result<Option<Bytes>>;

    /// Read the remaining body in one go
    async fn bytes(self: Box<Self>) -> Result<Bytes>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Fetch {
                url: config.index_url.clone(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Box<dyn Body>> {
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| Error::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        Ok(Box::new(HttpBody {
            url: url.to_string(),
            response,
        }))
    }
}

struct HttpBody {
    url: String,
    response: reqwest::Response,
}

#[async_trait]
impl Body for HttpBody {
    fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        self.response.chunk().await.map_err(|e| Error::Fetch {
            url: self.url.clone(),
            reason: format!("failed to read response body: {e}"),
        })
    }

    async fn bytes(self: Box<Self>) -> Result<Bytes> {
        let url = self.url;
        self.response.bytes().await.map_err(|e| Error::Fetch {
            url,
            reason: format!("failed to read response body: {e}"),
        })
    }
}

#[cfg(any(test, feature = "testing"))]
/// In-memory transport serving fixed bodies keyed by URL
#[derive(Default)]
pub struct MemoryTransport {
    bodies: Mutex<HashMap<String, MemoryBody>>,
    requests: AtomicUsize,
}

#[cfg(any(test, feature = "testing"))]
#[derive(Clone)]
struct MemoryBody {
    data: Bytes,
    announce_length: bool,
    chunk_size: usize,
}

#[cfg(any(test, feature = "testing"))]
impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` at `url` with a Content-Length, in 1 KiB chunks
    pub fn with_body(self, url: &str, data: impl Into<Bytes>) -> Self {
        self.insert(url, data.into(), true);
        self
    }

    /// Serve `data` at `url` without announcing its length
    pub fn with_unsized_body(self, url: &str, data: impl Into<Bytes>) -> Self {
        self.insert(url, data.into(), false);
        self
    }

    fn insert(&self, url: &str, data: Bytes, announce_length: bool) {
        let body = MemoryBody {
            data,
            announce_length,
            chunk_size: 1024,
        };
        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.insert(url.to_string(), body);
        }
    }

    /// Number of GET requests served or refused so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&self, url: &str) -> Result<Box<dyn Body>> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let body = self
            .bodies
            .lock()
            .ok()
            .and_then(|bodies| bodies.get(url).cloned())
            .ok_or_else(|| Error::Fetch {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })?;

        Ok(Box::new(MemoryStream { body, offset: 0 }))
    }
}

#[cfg(any(test, feature = "testing"))]
struct MemoryStream {
    body: MemoryBody,
    offset: usize,
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl Body for MemoryStream {
    fn content_length(&self) -> Option<u64> {
        self.body
            .announce_length
            .then_some(self.body.data.len() as u64)
    }

    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if self.offset >= self.body.data.len() {
            return Ok(None);
        }
        let end = (self.offset + self.body.chunk_size).min(self.body.data.len());
        let chunk = self.body.data.slice(self.offset..end);
        self.offset = end;
        Ok(Some(chunk))
    }

    async fn bytes(self: Box<Self>) -> Result<Bytes> {
        Ok(self.body.data.slice(self.offset..))
    }
}

#[cfg(test)]
mod transport_tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_chunks_body() {
        let data = vec![7u8; 2500];
        let transport = MemoryTransport::new().with_body("https://example.com/a.zip", data.clone());

        let mut body = transport.get("https://example.com/a.zip").await.unwrap();
        assert_eq!(body.content_length(), Some(2500));

        let mut collected = Vec::new();
        let mut chunks = 0;
        while let Some(chunk) = body.chunk().await.unwrap() {
            collected.extend_from_slice(&chunk);
            chunks += 1;
        }
        assert_eq!(chunks, 3);
        assert_eq!(collected, data);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_transport_unknown_url() {
        let transport = MemoryTransport::new();
        let err = transport.get("https://example.com/missing").await.err().unwrap();
        assert!(matches!(err, Error::Fetch { .. }));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_unsized_body() {
        let transport = MemoryTransport::new().with_unsized_body("https://example.com/x", "hello");
        let body = transport.get("https://example.com/x").await.unwrap();
        assert_eq!(body.content_length(), None);
        assert_eq!(&body.bytes().await.unwrap()[..], b"hello");
    }
}
