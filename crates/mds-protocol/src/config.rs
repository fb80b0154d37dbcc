// SPDX-License-Identifier: Apache-2.0

//! Device configuration

use serde::{Deserialize, Serialize};

/// Configuration read from the device's feature reports.
///
/// Immutable once read; re-read it at any time via
/// [`Session::read_config`](crate::Session::read_config) or the individual
/// accessors. The session keeps no copy of it between processing calls - the
/// caller owns this and passes it back in for each chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Supported-features bitmask (currently always zero; reserved)
    pub supported_features: u32,
    /// Device identifier string
    pub device_identifier: String,
    /// HTTP endpoint chunks are POSTed to
    pub data_uri: String,
    /// Authorization header, `HeaderName:HeaderValue`
    pub authorization: String,
}
