// SPDX-License-Identifier: Apache-2.0

//! # mds-transports
//!
//! Transport backend abstraction for the MDS bridge.
//!
//! The protocol engine talks to a device through a small capability trait
//! ([`Backend`]): read a report by identifier with a timeout, write a report
//! by identifier, release the underlying resources. Concrete bindings map
//! that contract onto a physical link. What a "report" is depends on the
//! binding: a HID feature/input report, a serial framing tag, a BLE
//! characteristic.
//!
//! ## Feature Flags
//!
//! - `hid`: USB-HID binding built on `hidapi`
//!
//! The in-memory [`mock::MockBackend`] is always available; it exists so
//! session-level tests can inject a scripted device instead of touching
//! process-global state.

pub mod error;
pub mod mock;
pub mod traits;

#[cfg(feature = "hid")]
pub mod hid;

pub use error::{BackendError, BackendResult};
pub use traits::{Backend, ReadTimeout};

#[cfg(feature = "hid")]
pub use hid::HidBackend;
