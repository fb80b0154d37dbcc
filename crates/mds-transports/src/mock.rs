// SPDX-License-Identifier: Apache-2.0

//! In-memory backend test double
//!
//! Scripted per-instance replacement for a real transport. Each test builds
//! its own [`MockBackend`] and hands it to the code under test; the paired
//! [`MockHandle`] stays behind for scripting and inspection, which keeps
//! working after the backend itself has been moved into a session.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{BackendError, BackendResult};
use crate::traits::{Backend, ReadTimeout};

#[derive(Default)]
struct MockState {
    /// Re-readable report values (feature-report style)
    reports: HashMap<u8, Vec<u8>>,
    /// One-shot report frames, consumed in FIFO order (input-report style)
    queued: HashMap<u8, VecDeque<Vec<u8>>>,
    /// Every write that reached the backend, in order
    written: Vec<(u8, Vec<u8>)>,
    fail_next_read: Option<BackendError>,
    fail_next_write: Option<BackendError>,
    release_count: usize,
}

/// Backend half of the double; implements [`Backend`] and is moved into the
/// code under test.
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

/// Scripting/inspection half of the double.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> (MockBackend, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            MockBackend {
                state: Arc::clone(&state),
            },
            MockHandle { state },
        )
    }
}

impl MockHandle {
    /// Set the persistent value returned for reads of `report_id`.
    pub fn set_report(&self, report_id: u8, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.reports.insert(report_id, data.to_vec());
    }

    /// Queue a one-shot frame for `report_id`; consumed before any persistent
    /// value.
    pub fn queue_report(&self, report_id: u8, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state
            .queued
            .entry(report_id)
            .or_default()
            .push_back(data.to_vec());
    }

    /// Make the next read fail with `err`.
    pub fn fail_next_read(&self, err: BackendError) {
        self.state.lock().unwrap().fail_next_read = Some(err);
    }

    /// Make the next write fail with `err`.
    pub fn fail_next_write(&self, err: BackendError) {
        self.state.lock().unwrap().fail_next_write = Some(err);
    }

    /// All writes the backend has accepted, in order.
    pub fn written(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.lock().unwrap().written.clone()
    }

    /// Number of times `release()` has been called.
    pub fn release_count(&self) -> usize {
        self.state.lock().unwrap().release_count
    }
}

impl Backend for MockBackend {
    fn read(&mut self, report_id: u8, buffer: &mut [u8], _timeout: ReadTimeout) -> BackendResult<usize> {
        let mut state = self.state.lock().unwrap();

        if let Some(err) = state.fail_next_read.take() {
            return Err(err);
        }

        let data = match state.queued.get_mut(&report_id).and_then(VecDeque::pop_front) {
            Some(frame) => frame,
            None => match state.reports.get(&report_id) {
                Some(value) => value.clone(),
                // Nothing scripted: behave like a bounded wait that elapsed.
                None => return Err(BackendError::Timeout),
            },
        };

        let len = data.len().min(buffer.len());
        buffer[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, report_id: u8, data: &[u8]) -> BackendResult<usize> {
        let mut state = self.state.lock().unwrap();

        if let Some(err) = state.fail_next_write.take() {
            return Err(err);
        }

        state.written.push((report_id, data.to_vec()));
        Ok(data.len())
    }

    fn release(&mut self) {
        self.state.lock().unwrap().release_count += 1;
    }
}
