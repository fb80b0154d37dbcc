// SPDX-License-Identifier: Apache-2.0

//! USB-HID backend
//!
//! Maps the report contract onto hidapi. Report 0x06 is the continuously
//! streamed input report; every other identifier is request/response feature
//! traffic, and all writes go out as feature reports.

use std::ffi::CString;

use hidapi::{HidApi, HidDevice};
use tracing::debug;

use crate::error::{BackendError, BackendResult};
use crate::traits::{Backend, ReadTimeout};

/// Report identifier delivered as an input report rather than a feature report.
const STREAM_DATA_REPORT_ID: u8 = 0x06;

/// USB-HID transport backend
pub struct HidBackend {
    device: Option<HidDevice>,
}

impl HidBackend {
    /// Open the first device matching the vendor/product pair, optionally
    /// narrowed to a serial number.
    pub fn open(vendor_id: u16, product_id: u16, serial: Option<&str>) -> BackendResult<Self> {
        let api = HidApi::new().map_err(|e| BackendError::OpenFailed(e.to_string()))?;
        let device = match serial {
            Some(serial) => api.open_serial(vendor_id, product_id, serial),
            None => api.open(vendor_id, product_id),
        }
        .map_err(|e| BackendError::OpenFailed(e.to_string()))?;

        debug!(vendor_id, product_id, "opened HID device");
        Ok(Self {
            device: Some(device),
        })
    }

    /// Open a device by platform path (as reported by enumeration tools).
    pub fn open_path(path: &str) -> BackendResult<Self> {
        let api = HidApi::new().map_err(|e| BackendError::OpenFailed(e.to_string()))?;
        let cpath = CString::new(path)
            .map_err(|_| BackendError::InvalidArgument("device path contains a NUL byte"))?;
        let device = api
            .open_path(&cpath)
            .map_err(|e| BackendError::OpenFailed(e.to_string()))?;

        debug!(path, "opened HID device by path");
        Ok(Self {
            device: Some(device),
        })
    }

    fn device(&self) -> BackendResult<&HidDevice> {
        self.device
            .as_ref()
            .ok_or_else(|| BackendError::Io("HID device already released".into()))
    }
}

impl Backend for HidBackend {
    fn read(&mut self, report_id: u8, buffer: &mut [u8], timeout: ReadTimeout) -> BackendResult<usize> {
        let device = self.device()?;

        if report_id == STREAM_DATA_REPORT_ID {
            // Input report: the device prefixes the data with the report ID.
            let mut raw = vec![0u8; buffer.len() + 1];
            let n = device.read_timeout(&mut raw, timeout.as_millis_i32())?;
            if n == 0 {
                return Err(BackendError::Timeout);
            }
            if raw[0] != report_id {
                return Err(BackendError::Io(format!(
                    "expected input report {report_id:#04x}, got {:#04x}",
                    raw[0]
                )));
            }
            let len = n - 1;
            buffer[..len].copy_from_slice(&raw[1..n]);
            Ok(len)
        } else {
            // Feature report: first byte of the exchange buffer selects the
            // report, and the returned count includes that byte.
            let mut raw = vec![0u8; buffer.len() + 1];
            raw[0] = report_id;
            let n = device.get_feature_report(&mut raw)?;
            if n == 0 {
                return Err(BackendError::Io(format!(
                    "empty feature report {report_id:#04x}"
                )));
            }
            let len = n - 1;
            buffer[..len].copy_from_slice(&raw[1..n]);
            Ok(len)
        }
    }

    fn write(&mut self, report_id: u8, data: &[u8]) -> BackendResult<usize> {
        let device = self.device()?;

        let mut raw = Vec::with_capacity(data.len() + 1);
        raw.push(report_id);
        raw.extend_from_slice(data);
        device.send_feature_report(&raw)?;
        Ok(data.len())
    }

    fn release(&mut self) {
        if self.device.take().is_some() {
            debug!("released HID device");
        }
    }
}
