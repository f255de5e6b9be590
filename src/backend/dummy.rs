//! No-op output backend.
//!
//! Accepts every device and silently drops every write. Used by the
//! tick-driver tests and as a stand-in for `device_probe` in contexts
//! that don't have a live speaker, the same role the teacher's
//! `testing::mock_raop_server` fixtures play for the RTSP layer.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{BackendCallback, CallbackId, OutputBackend, OutputBuffer};
use crate::error::CoreError;
use crate::quality::MediaQuality;
use crate::registry::{DeviceState, OutputDevice};

/// Backend that accepts any device and discards all audio.
#[derive(Default)]
pub struct DummyBackend {
    writes: Mutex<u64>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks written to any device since construction.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        *self.writes.lock().expect("dummy backend mutex poisoned")
    }
}

#[async_trait]
impl OutputBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn init(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn deinit(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn device_start(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        cb.on_state(device.id, cb_id, DeviceState::Connected).await;
        cb.on_state(device.id, cb_id, DeviceState::Streaming).await;
        Ok(())
    }

    async fn device_stop(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        cb.on_state(device.id, cb_id, DeviceState::Stopped).await;
        Ok(())
    }

    async fn device_flush(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        cb.on_state(device.id, cb_id, DeviceState::Connected).await;
        Ok(())
    }

    async fn device_probe(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        cb.on_state(device.id, cb_id, DeviceState::Connected).await;
        cb.on_state(device.id, cb_id, DeviceState::Stopped).await;
        Ok(())
    }

    async fn volume_set(&self, _device: &OutputDevice, _cb_id: CallbackId) -> Result<bool, CoreError> {
        Ok(false)
    }

    fn volume_to_pct(&self, value: &str) -> Option<u8> {
        value.parse::<u8>().ok()
    }

    async fn quality_set(
        &self,
        _device: &OutputDevice,
        _quality: MediaQuality,
        _cb_id: CallbackId,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    async fn authorize(&self, _device: &OutputDevice, _pin: &str, _cb_id: CallbackId) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("dummy backend has no pairing flow".to_string()))
    }

    async fn write(&self, _device: &OutputDevice, _buffer: &OutputBuffer<'_>) -> Result<(), CoreError> {
        *self.writes.lock().expect("dummy backend mutex poisoned") += 1;
        Ok(())
    }

    async fn metadata_prepare(&self, _device: &OutputDevice, _item_id: u64) -> Result<Vec<u8>, CoreError> {
        Ok(Vec::new())
    }

    async fn metadata_send(
        &self,
        _device: &OutputDevice,
        _metadata: &[u8],
        _rtptime: u32,
        _offset_ms: u32,
        _startup: bool,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    async fn metadata_purge(&self, _device: &OutputDevice) -> Result<(), CoreError> {
        Ok(())
    }

    async fn metadata_prune(&self, _device: &OutputDevice, _rtptime: u32) -> Result<(), CoreError> {
        Ok(())
    }
}
