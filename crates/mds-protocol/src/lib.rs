// SPDX-License-Identifier: Apache-2.0

//! # mds-protocol
//!
//! Transport-agnostic engine for bridging diagnostic chunk streams from an
//! embedded device to an ingestion endpoint.
//!
//! The device exposes a handful of fixed-purpose binary reports: feature
//! reports carrying its configuration (identity, upload URI, authorization),
//! a one-byte control report toggling streaming, and a sequence-numbered
//! stream report carrying opaque chunk payloads. A [`Session`] owns one
//! transport [`Backend`](mds_transports::Backend), reads the configuration,
//! toggles streaming, and forwards each received chunk to an optional
//! [`ChunkUploader`] hook.
//!
//! Bytes can arrive two ways and both paths share one decode/track/forward
//! core:
//!
//! - [`Session::process_from_backend`] pulls a report from the backend
//!   (blocking with a bound), for plain loop-driven gateways;
//! - [`Session::process_from_bytes`] accepts a report the caller already
//!   received, for event-driven embeddings with their own I/O loop.
//!
//! Sequence gaps and duplicates are deliberately non-fatal: the transport is
//! assumed lossy and there is no retransmission. Anomalies are logged,
//! counted, and processing continues.

pub mod config;
pub mod error;
pub mod sequence;
pub mod session;
pub mod upload;
pub mod wire;

pub use config::DeviceConfig;
pub use error::MdsError;
pub use sequence::{SequenceCheck, SequenceTracker};
pub use session::Session;
pub use upload::{ChunkUpload, ChunkUploader, UploadError};
pub use wire::StreamPacket;

// Re-exported so embedders depending on this crate alone can name the
// transport contract.
pub use mds_transports::{Backend, BackendError, ReadTimeout};
