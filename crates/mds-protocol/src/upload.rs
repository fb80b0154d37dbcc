// SPDX-License-Identifier: Apache-2.0

//! Chunk upload hook contract
//!
//! A session forwards every received chunk to at most one registered
//! [`ChunkUploader`]. The reference HTTP implementation lives in the
//! `mds-uploader` crate; embeddings supply their own by implementing the
//! trait (closures with the matching signature work directly).

use thiserror::Error;

/// One chunk delivery request, borrowed from the session for the duration of
/// the hook call.
#[derive(Debug, Clone, Copy)]
pub struct ChunkUpload<'a> {
    /// Endpoint to deliver to (from the device config)
    pub uri: &'a str,
    /// Authorization header, `HeaderName:HeaderValue` (from the device config)
    pub authorization: &'a str,
    /// Opaque chunk bytes
    pub payload: &'a [u8],
}

/// Delivery failure reported by an upload hook.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// Authorization header lacks the `Name:Value` colon separator
    #[error("authorization header has no ':' separator: {0:?}")]
    InvalidAuthHeader(String),

    /// Request never produced a response (connect/DNS/timeout/TLS)
    #[error("upload request failed: {0}")]
    Network(String),

    /// Server answered outside the success range
    #[error("upload rejected with HTTP status {0}")]
    Status(u16),
}

/// Receives each chunk a session processes, exactly once per chunk.
///
/// Delivery is fire-once: the session never retries a chunk, and a hook
/// failure is surfaced as the processing call's result without disturbing
/// session state (sequence tracking has already advanced).
pub trait ChunkUploader: Send {
    fn upload_chunk(&mut self, chunk: &ChunkUpload<'_>) -> Result<(), UploadError>;
}

impl<F> ChunkUploader for F
where
    F: FnMut(&ChunkUpload<'_>) -> Result<(), UploadError> + Send,
{
    fn upload_chunk(&mut self, chunk: &ChunkUpload<'_>) -> Result<(), UploadError> {
        self(chunk)
    }
}
