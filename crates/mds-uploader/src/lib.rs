// SPDX-License-Identifier: Apache-2.0

//! # mds-uploader
//!
//! Reference HTTP delivery for diagnostic chunks: one POST per chunk to the
//! device-provided URI, with the device-provided authorization header and an
//! opaque-binary content type. Success is any 2xx status.
//!
//! [`HttpUploader`] implements the protocol engine's
//! [`ChunkUploader`](mds_protocol::ChunkUploader) hook. Delivery is
//! fire-once: no retries, no buffering; a failed chunk is counted and
//! reported, nothing more. Statistics live behind a shared handle so the
//! caller can keep a clone for inspection while the session owns the hook:
//!
//! ```no_run
//! use mds_uploader::HttpUploader;
//!
//! let uploader = HttpUploader::new()?;
//! # let backend: Box<dyn mds_protocol::Backend> = unimplemented!();
//! let mut session = mds_protocol::Session::new(backend);
//! session.set_upload_hook(uploader.clone());
//! // ... process stream ...
//! println!("{:?}", uploader.stats());
//! # Ok::<(), mds_protocol::UploadError>(())
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mds_protocol::{ChunkUpload, ChunkUploader, UploadError};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Running delivery statistics.
///
/// Counters only ever increase (until an explicit
/// [`HttpUploader::reset_stats`]); `last_status` is the most recent HTTP
/// status observed, 0 when the last attempt produced no response at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStats {
    /// Chunks delivered with a success status
    pub chunks_uploaded: u64,
    /// Payload bytes delivered with a success status
    pub bytes_uploaded: u64,
    /// Failed delivery attempts (including rejected auth headers)
    pub upload_failures: u64,
    /// Most recent HTTP status (0 = no response obtained)
    pub last_status: u16,
}

struct Shared {
    stats: UploadStats,
    timeout: Duration,
    verbose: bool,
}

/// HTTP chunk uploader.
///
/// Cloning is cheap and clones share statistics and configuration; hand one
/// clone to the session as its upload hook and keep another for stats.
#[derive(Clone)]
pub struct HttpUploader {
    client: reqwest::blocking::Client,
    shared: Arc<Mutex<Shared>>,
}

impl HttpUploader {
    /// Create an uploader with the default 30 s request timeout.
    pub fn new() -> Result<Self, UploadError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create an uploader with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| UploadError::Network(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            shared: Arc::new(Mutex::new(Shared {
                stats: UploadStats::default(),
                timeout,
                verbose: false,
            })),
        })
    }

    /// Change the per-request timeout; applies to subsequent uploads.
    pub fn set_timeout(&self, timeout: Duration) {
        self.shared.lock().timeout = timeout;
    }

    /// Toggle per-request logging of URI and payload size.
    pub fn set_verbose(&self, verbose: bool) {
        self.shared.lock().verbose = verbose;
    }

    /// Snapshot of the running statistics.
    pub fn stats(&self) -> UploadStats {
        self.shared.lock().stats
    }

    /// Zero all counters, `last_status` included.
    pub fn reset_stats(&self) {
        self.shared.lock().stats = UploadStats::default();
    }

    fn record_no_response(&self) {
        let mut shared = self.shared.lock();
        shared.stats.upload_failures += 1;
        shared.stats.last_status = 0;
    }

    fn record_rejected(&self, status: u16) {
        let mut shared = self.shared.lock();
        shared.stats.upload_failures += 1;
        shared.stats.last_status = status;
    }

    fn record_delivered(&self, status: u16, bytes: usize) {
        let mut shared = self.shared.lock();
        shared.stats.chunks_uploaded += 1;
        shared.stats.bytes_uploaded += bytes as u64;
        shared.stats.last_status = status;
    }
}

/// Split a `HeaderName:HeaderValue` authorization string at the first colon.
///
/// Surrounding whitespace is trimmed from both halves. A string without a
/// colon is rejected; the reference uploader treats that as a failed
/// delivery before any network traffic.
pub fn split_auth_header(header: &str) -> Result<(&str, &str), UploadError> {
    match header.split_once(':') {
        Some((name, value)) => Ok((name.trim(), value.trim())),
        None => Err(UploadError::InvalidAuthHeader(header.to_string())),
    }
}

impl ChunkUploader for HttpUploader {
    fn upload_chunk(&mut self, chunk: &ChunkUpload<'_>) -> Result<(), UploadError> {
        let (header_name, header_value) = match split_auth_header(chunk.authorization) {
            Ok(parts) => parts,
            Err(err) => {
                // Counted as a failure, but no request goes out and the last
                // observed status is left alone.
                self.shared.lock().stats.upload_failures += 1;
                return Err(err);
            }
        };

        let (timeout, verbose) = {
            let shared = self.shared.lock();
            (shared.timeout, shared.verbose)
        };
        if verbose {
            info!(
                uri = chunk.uri,
                bytes = chunk.payload.len(),
                "uploading chunk"
            );
        }

        let response = self
            .client
            .post(chunk.uri)
            .header(header_name, header_value)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .timeout(timeout)
            .body(chunk.payload.to_vec())
            .send();

        match response {
            Err(err) => {
                self.record_no_response();
                Err(UploadError::Network(err.to_string()))
            }
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    self.record_delivered(status.as_u16(), chunk.payload.len());
                    debug!(status = status.as_u16(), "chunk delivered");
                    Ok(())
                } else {
                    self.record_rejected(status.as_u16());
                    Err(UploadError::Status(status.as_u16()))
                }
            }
        }
    }
}
