// SPDX-License-Identifier: Apache-2.0

//! Protocol error type
//!
//! Session methods surface the first failing sub-operation verbatim; nothing
//! is wrapped, retried, or downgraded. Backend and upload errors pass
//! through transparently so a caller can match on the original kind.

use mds_transports::BackendError;
use thiserror::Error;

use crate::upload::UploadError;

/// Errors surfaced by the protocol engine.
#[derive(Debug, Clone, Error)]
pub enum MdsError {
    /// Transport backend failure (including timeouts)
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Stream report without even a sequence byte
    #[error("stream packet is empty: need at least the sequence byte")]
    EmptyStreamPacket,

    /// Feature report shorter than its fixed-size field
    #[error("feature report {report_id:#04x} too short: got {got} bytes, need {need}")]
    ShortFeatureReport { report_id: u8, got: usize, need: usize },

    /// Upload hook rejected the chunk
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl MdsError {
    /// True for the expected "no packet this tick" case; a gateway loop
    /// continues on this and treats everything else as fatal.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MdsError::Backend(BackendError::Timeout))
    }
}
