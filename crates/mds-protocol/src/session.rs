// SPDX-License-Identifier: Apache-2.0

//! Session engine
//!
//! A [`Session`] coordinates one device over one exclusively-owned backend:
//! configuration reads, the streaming toggle, and per-chunk forwarding to the
//! upload hook. It is single-threaded and synchronous; all blocking happens
//! inside the backend (bounded by the read timeout) and inside the hook
//! (bounded by whatever the hook configures). Callers needing concurrent
//! producers serialize at the session boundary themselves.

use tracing::{debug, warn};

use mds_transports::{Backend, ReadTimeout};

use crate::config::DeviceConfig;
use crate::error::MdsError;
use crate::sequence::{SequenceCheck, SequenceTracker};
use crate::upload::{ChunkUpload, ChunkUploader, UploadError};
use crate::wire::{self, report_id, StreamPacket};

/// One device session over one transport backend.
///
/// The backend is owned exclusively: it is released when the session is
/// dropped, after a best-effort streaming disable. No two sessions may share
/// a backend instance.
pub struct Session {
    backend: Box<dyn Backend>,
    tracker: SequenceTracker,
    streaming_enabled: bool,
    uploader: Option<Box<dyn ChunkUploader>>,
    sequence_anomalies: u64,
}

impl Session {
    /// Create a session, taking ownership of `backend`.
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            tracker: SequenceTracker::new(),
            streaming_enabled: false,
            uploader: None,
            sequence_anomalies: 0,
        }
    }

    /// Open a session over the first HID device matching `vendor_id` /
    /// `product_id`, optionally narrowed to a serial number.
    ///
    /// On open failure no session exists and the caller owes no cleanup.
    #[cfg(feature = "hid")]
    pub fn open_hid(
        vendor_id: u16,
        product_id: u16,
        serial: Option<&str>,
    ) -> Result<Self, MdsError> {
        let backend = mds_transports::HidBackend::open(vendor_id, product_id, serial)?;
        Ok(Self::new(Box::new(backend)))
    }

    /// Open a session over the HID device at a platform device path.
    #[cfg(feature = "hid")]
    pub fn open_hid_path(path: &str) -> Result<Self, MdsError> {
        let backend = mds_transports::HidBackend::open_path(path)?;
        Ok(Self::new(Box::new(backend)))
    }

    // ------------------------------------------------------------------
    // Device configuration
    // ------------------------------------------------------------------

    /// Read the full device configuration (four feature reports).
    ///
    /// Failure of any one read aborts the decode and surfaces that read's
    /// error.
    pub fn read_config(&mut self) -> Result<DeviceConfig, MdsError> {
        Ok(DeviceConfig {
            supported_features: self.supported_features()?,
            device_identifier: self.device_identifier()?,
            data_uri: self.data_uri()?,
            authorization: self.authorization()?,
        })
    }

    /// Supported-features bitmask (currently always zero; reserved).
    pub fn supported_features(&mut self) -> Result<u32, MdsError> {
        let mut buf = [0u8; 4];
        let n = self
            .backend
            .read(report_id::SUPPORTED_FEATURES, &mut buf, ReadTimeout::Blocking)?;
        wire::decode_supported_features(&buf[..n])
    }

    /// Device identifier string.
    pub fn device_identifier(&mut self) -> Result<String, MdsError> {
        self.read_text_report(report_id::DEVICE_IDENTIFIER, wire::MAX_DEVICE_IDENTIFIER_LEN)
    }

    /// Upload endpoint URI.
    pub fn data_uri(&mut self) -> Result<String, MdsError> {
        self.read_text_report(report_id::DATA_URI, wire::MAX_DATA_URI_LEN)
    }

    /// Authorization header, `HeaderName:HeaderValue`.
    pub fn authorization(&mut self) -> Result<String, MdsError> {
        self.read_text_report(report_id::AUTHORIZATION, wire::MAX_AUTHORIZATION_LEN)
    }

    fn read_text_report(&mut self, report_id: u8, max_len: usize) -> Result<String, MdsError> {
        let mut buf = vec![0u8; max_len];
        let n = self.backend.read(report_id, &mut buf, ReadTimeout::Blocking)?;
        Ok(wire::decode_text_report(&buf[..n], max_len))
    }

    // ------------------------------------------------------------------
    // Stream control
    // ------------------------------------------------------------------

    /// Ask the device to start streaming chunk data.
    ///
    /// Failure leaves the streaming state unchanged.
    pub fn enable_streaming(&mut self) -> Result<(), MdsError> {
        self.write_stream_control(true)?;
        self.streaming_enabled = true;
        debug!("streaming enabled");
        Ok(())
    }

    /// Ask the device to stop streaming chunk data.
    pub fn disable_streaming(&mut self) -> Result<(), MdsError> {
        self.write_stream_control(false)?;
        self.streaming_enabled = false;
        debug!("streaming disabled");
        Ok(())
    }

    /// Whether this session has streaming switched on.
    ///
    /// The session does not gate packet consumption on this: the transport,
    /// not the session, decides whether stream reports actually arrive.
    pub fn is_streaming(&self) -> bool {
        self.streaming_enabled
    }

    fn write_stream_control(&mut self, enable: bool) -> Result<(), MdsError> {
        let frame = wire::encode_stream_control(enable);
        self.backend.write(report_id::STREAM_CONTROL, &frame)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Upload hook
    // ------------------------------------------------------------------

    /// Register the hook invoked once per received chunk, replacing any
    /// previous one.
    pub fn set_upload_hook<U>(&mut self, hook: U)
    where
        U: ChunkUploader + 'static,
    {
        self.uploader = Some(Box::new(hook));
    }

    /// Drop the upload hook; chunks are still received and sequence-tracked,
    /// just not forwarded. Streaming state is unaffected.
    pub fn clear_upload_hook(&mut self) {
        self.uploader = None;
    }

    // ------------------------------------------------------------------
    // Stream reception
    // ------------------------------------------------------------------

    /// Read and decode one stream report from the backend.
    ///
    /// Sequence tracking advances unconditionally, anomaly or not.
    pub fn read_packet(&mut self, timeout: ReadTimeout) -> Result<StreamPacket, MdsError> {
        let mut buf = [0u8; wire::MAX_STREAM_REPORT_LEN];
        let n = self.backend.read(report_id::STREAM_DATA, &mut buf, timeout)?;
        let packet = wire::decode_stream_packet(&buf[..n])?;
        self.track_sequence(&packet);
        Ok(packet)
    }

    /// Pull one packet from the backend and run it through the processing
    /// core: sequence check, then the upload hook if one is registered.
    ///
    /// A hook failure is this call's result even though the packet itself
    /// arrived intact; session state is already advanced and the next call
    /// proceeds normally.
    pub fn process_from_backend(
        &mut self,
        config: &DeviceConfig,
        timeout: ReadTimeout,
    ) -> Result<StreamPacket, MdsError> {
        let packet = self.read_packet(timeout)?;
        self.forward_chunk(config, &packet)?;
        Ok(packet)
    }

    /// Process a stream report the caller already received, for event-driven
    /// embeddings that own their transport I/O. No backend access happens.
    ///
    /// `buffer` is the report body: sequence byte plus payload, without any
    /// transport framing.
    pub fn process_from_bytes(
        &mut self,
        config: &DeviceConfig,
        buffer: &[u8],
    ) -> Result<StreamPacket, MdsError> {
        let packet = wire::decode_stream_packet(buffer)?;
        self.track_sequence(&packet);
        self.forward_chunk(config, &packet)?;
        Ok(packet)
    }

    /// Last sequence number seen, if any packet has been processed.
    pub fn last_sequence(&self) -> Option<u8> {
        self.tracker.last()
    }

    /// Count of out-of-order observations since the session was created.
    /// Anomalies never fail processing; this is how they stay visible.
    pub fn sequence_anomalies(&self) -> u64 {
        self.sequence_anomalies
    }

    fn track_sequence(&mut self, packet: &StreamPacket) {
        if let SequenceCheck::OutOfOrder { expected } = self.tracker.observe(packet.sequence) {
            self.sequence_anomalies += 1;
            warn!(
                expected,
                got = packet.sequence,
                "stream sequence anomaly (gap or duplicate)"
            );
        }
    }

    fn forward_chunk(
        &mut self,
        config: &DeviceConfig,
        packet: &StreamPacket,
    ) -> Result<(), UploadError> {
        if let Some(hook) = self.uploader.as_mut() {
            hook.upload_chunk(&ChunkUpload {
                uri: &config.data_uri,
                authorization: &config.authorization,
                payload: &packet.payload,
            })?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Best effort: teardown proceeds regardless of the disable outcome.
        if self.streaming_enabled {
            if let Err(err) = self.write_stream_control(false) {
                debug!(%err, "stream disable during teardown failed");
            }
        }
        self.backend.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mds_transports::mock::MockBackend;
    use mds_transports::BackendError;
    use std::sync::{Arc, Mutex};

    fn scripted_config(handle: &mds_transports::mock::MockHandle) {
        handle.set_report(report_id::SUPPORTED_FEATURES, &[0, 0, 0, 0]);
        handle.set_report(report_id::DEVICE_IDENTIFIER, b"DEVICE-42\0");
        handle.set_report(report_id::DATA_URI, b"https://ingest.example/chunks\0");
        handle.set_report(report_id::AUTHORIZATION, b"Project-Key:secret\0");
    }

    #[test]
    fn read_config_decodes_all_four_reports() {
        let (backend, handle) = MockBackend::new();
        scripted_config(&handle);
        let mut session = Session::new(Box::new(backend));

        let config = session.read_config().unwrap();
        assert_eq!(config.supported_features, 0);
        assert_eq!(config.device_identifier, "DEVICE-42");
        assert_eq!(config.data_uri, "https://ingest.example/chunks");
        assert_eq!(config.authorization, "Project-Key:secret");

        // Re-readable at any time.
        assert_eq!(session.device_identifier().unwrap(), "DEVICE-42");
    }

    #[test]
    fn read_config_aborts_on_first_failing_read() {
        let (backend, handle) = MockBackend::new();
        scripted_config(&handle);
        handle.fail_next_read(BackendError::Io("unplugged".into()));
        let mut session = Session::new(Box::new(backend));

        assert!(matches!(
            session.read_config(),
            Err(MdsError::Backend(BackendError::Io(_)))
        ));
    }

    #[test]
    fn streaming_toggle_writes_control_report() {
        let (backend, handle) = MockBackend::new();
        let mut session = Session::new(Box::new(backend));

        session.enable_streaming().unwrap();
        assert!(session.is_streaming());
        session.disable_streaming().unwrap();
        assert!(!session.is_streaming());

        assert_eq!(
            handle.written(),
            vec![
                (report_id::STREAM_CONTROL, vec![1]),
                (report_id::STREAM_CONTROL, vec![0]),
            ]
        );
    }

    #[test]
    fn enable_failure_leaves_state_unchanged() {
        let (backend, handle) = MockBackend::new();
        handle.fail_next_write(BackendError::Io("nack".into()));
        let mut session = Session::new(Box::new(backend));

        assert!(session.enable_streaming().is_err());
        assert!(!session.is_streaming());
    }

    #[test]
    fn drop_disables_streaming_and_releases_backend_once() {
        let (backend, handle) = MockBackend::new();
        {
            let mut session = Session::new(Box::new(backend));
            session.enable_streaming().unwrap();
        }
        assert_eq!(handle.release_count(), 1);
        // enable, then the teardown disable
        assert_eq!(
            handle.written(),
            vec![
                (report_id::STREAM_CONTROL, vec![1]),
                (report_id::STREAM_CONTROL, vec![0]),
            ]
        );
    }

    #[test]
    fn drop_releases_backend_even_if_disable_fails() {
        let (backend, handle) = MockBackend::new();
        {
            let mut session = Session::new(Box::new(backend));
            session.enable_streaming().unwrap();
            handle.fail_next_write(BackendError::Io("gone".into()));
        }
        assert_eq!(handle.release_count(), 1);
    }

    #[test]
    fn process_from_backend_forwards_chunks_in_order() {
        let (backend, handle) = MockBackend::new();
        scripted_config(&handle);
        handle.queue_report(report_id::STREAM_DATA, &[0x00, 0xDE]);
        handle.queue_report(report_id::STREAM_DATA, &[0x01, 0xAD]);
        handle.queue_report(report_id::STREAM_DATA, &[0x02, 0xBE]);

        let mut session = Session::new(Box::new(backend));
        let config = session.read_config().unwrap();

        let delivered: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        session.set_upload_hook(move |chunk: &ChunkUpload<'_>| {
            assert_eq!(chunk.uri, "https://ingest.example/chunks");
            assert_eq!(chunk.authorization, "Project-Key:secret");
            sink.lock().unwrap().push(chunk.payload.to_vec());
            Ok(())
        });

        for _ in 0..3 {
            session
                .process_from_backend(&config, ReadTimeout::from_millis(100))
                .unwrap();
        }

        assert_eq!(
            *delivered.lock().unwrap(),
            vec![vec![0xDE], vec![0xAD], vec![0xBE]]
        );
        assert_eq!(session.sequence_anomalies(), 0);
        assert_eq!(session.last_sequence(), Some(2));
    }

    #[test]
    fn process_from_bytes_shares_the_same_core() {
        let (backend, _handle) = MockBackend::new();
        let mut session = Session::new(Box::new(backend));
        let config = DeviceConfig {
            data_uri: "https://x/y".into(),
            authorization: "Key:abc".into(),
            ..DeviceConfig::default()
        };

        let count = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&count);
        session.set_upload_hook(move |_chunk: &ChunkUpload<'_>| {
            *sink.lock().unwrap() += 1;
            Ok(())
        });

        session.process_from_bytes(&config, &[0x00, 0x01]).unwrap();
        session.process_from_bytes(&config, &[0x01, 0x02]).unwrap();
        assert_eq!(*count.lock().unwrap(), 2);
        assert_eq!(session.last_sequence(), Some(1));
    }

    #[test]
    fn sequence_anomaly_is_counted_not_fatal() {
        let (backend, _handle) = MockBackend::new();
        let mut session = Session::new(Box::new(backend));
        let config = DeviceConfig::default();

        session.process_from_bytes(&config, &[0x00]).unwrap();
        // Gap: 0 -> 4
        session.process_from_bytes(&config, &[0x04]).unwrap();
        assert_eq!(session.sequence_anomalies(), 1);
        // Re-synced: 5 is in order again.
        session.process_from_bytes(&config, &[0x05]).unwrap();
        assert_eq!(session.sequence_anomalies(), 1);
    }

    #[test]
    fn hook_failure_surfaces_but_sequence_still_advances() {
        let (backend, _handle) = MockBackend::new();
        let mut session = Session::new(Box::new(backend));
        let config = DeviceConfig::default();

        session.set_upload_hook(|_chunk: &ChunkUpload<'_>| {
            Err(UploadError::Network("connection refused".into()))
        });

        let err = session.process_from_bytes(&config, &[0x00, 0xFF]).unwrap_err();
        assert!(matches!(err, MdsError::Upload(UploadError::Network(_))));
        assert_eq!(session.last_sequence(), Some(0));
    }

    #[test]
    fn cleared_hook_stops_forwarding_without_touching_streaming() {
        let (backend, _handle) = MockBackend::new();
        let mut session = Session::new(Box::new(backend));
        let config = DeviceConfig::default();

        session.set_upload_hook(|_chunk: &ChunkUpload<'_>| -> Result<(), UploadError> {
            panic!("hook should not run after clear");
        });
        session.clear_upload_hook();
        session.process_from_bytes(&config, &[0x00, 0x01]).unwrap();
        assert_eq!(session.last_sequence(), Some(0));
    }

    #[test]
    fn timeout_is_surfaced_as_timeout() {
        let (backend, _handle) = MockBackend::new();
        let mut session = Session::new(Box::new(backend));
        let config = DeviceConfig::default();

        let err = session
            .process_from_backend(&config, ReadTimeout::from_millis(10))
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(session.last_sequence(), None);
    }

    #[test]
    fn empty_stream_report_is_invalid() {
        let (backend, handle) = MockBackend::new();
        handle.queue_report(report_id::STREAM_DATA, &[]);
        let mut session = Session::new(Box::new(backend));

        let err = session
            .read_packet(ReadTimeout::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, MdsError::EmptyStreamPacket));
        assert_eq!(session.last_sequence(), None);
    }
}
