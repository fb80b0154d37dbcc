// SPDX-License-Identifier: Apache-2.0

//! # mds-bridge
//!
//! Bridge diagnostic chunk streams from an embedded device to a cloud
//! ingestion endpoint.
//!
//! A device exposes a small set of binary reports over a point-to-point
//! transport (USB-HID in the reference deployment). This crate reads the
//! device's upload configuration, enables its streaming mode, receives
//! sequence-numbered chunk packets, and forwards each chunk to an HTTP
//! ingestion service while tracking delivery statistics.
//!
//! ## Feature Flags
//!
//! - **`hid`** (default): USB-HID transport backend and the
//!   `Session::open_hid*` convenience constructors
//! - **`uploader`** (default): reference HTTP uploader (`reqwest`-based)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mds_bridge::{HttpUploader, ReadTimeout, Session};
//!
//! let mut session = Session::open_hid(0x1234, 0x5678, None)?;
//! let config = session.read_config()?;
//!
//! let uploader = HttpUploader::new()?;
//! session.set_upload_hook(uploader.clone());
//!
//! session.enable_streaming()?;
//! loop {
//!     match session.process_from_backend(&config, ReadTimeout::from_millis(1000)) {
//!         Ok(_packet) => {}
//!         Err(err) if err.is_timeout() => continue, // nothing this tick
//!         Err(err) => break,
//!     }
//! }
//! println!("{:?}", uploader.stats());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Event-driven embeddings that own their transport I/O skip the backend
//! pull and hand received report bytes to
//! [`Session::process_from_bytes`](mds_protocol::Session::process_from_bytes)
//! instead; both paths share the same decode, sequence-check, and forward
//! core.

pub use mds_protocol as protocol;
pub use mds_transports as transports;

#[cfg(feature = "uploader")]
pub use mds_uploader as uploader;

// Primary API surface, re-exported flat for convenience.
pub use mds_protocol::{
    Backend, BackendError, ChunkUpload, ChunkUploader, DeviceConfig, MdsError, ReadTimeout,
    SequenceCheck, SequenceTracker, Session, StreamPacket, UploadError,
};

#[cfg(feature = "hid")]
pub use mds_transports::HidBackend;

#[cfg(feature = "uploader")]
pub use mds_uploader::{HttpUploader, UploadStats};
