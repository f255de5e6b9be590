//! Output backend interface.
//!
//! One implementation per sink kind (RAOP, Chromecast, ALSA,
//! PulseAudio, FIFO, RCP, dummy). Generalizes the teacher's
//! `audio::AudioOutput` trait (open/start/stop/volume/state) from a
//! single local device to the registry-driven, multi-device,
//! callback-reporting shape this core needs.

pub mod chromecast;
pub mod dummy;
pub mod raop;
pub mod simple;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::quality::MediaQuality;
use crate::registry::{DeviceState, OutputDevice};

/// One quality-tagged chunk of audio handed to every backend on a
/// player tick.
#[derive(Debug, Clone)]
pub struct OutputData<'a> {
    /// Quality this chunk was synthesised at.
    pub quality: MediaQuality,
    /// Raw PCM payload for one tick's worth of frames.
    pub samples: &'a [u8],
    /// Frame count represented by `samples`.
    pub frame_count: u32,
}

/// The set of quality-tagged chunks produced for one player tick.
///
/// Index 0 is always the source quality; indices 1.. hold at most
/// [`OutputBuffer::MAX_QUALITY_SUBSCRIPTIONS`] backend-requested
/// subscriptions. A backend scans for the slot matching the quality
/// it previously subscribed to via [`OutputBackend::quality_set`].
#[derive(Debug, Clone)]
pub struct OutputBuffer<'a> {
    /// Presentation timestamp, in nanoseconds, for this tick's chunk.
    pub pts_ns: u64,
    /// Quality-tagged chunks, source quality first.
    pub data: &'a [OutputData<'a>],
}

impl<'a> OutputBuffer<'a> {
    /// Maximum number of distinct quality subscriptions a tick can
    /// carry beyond the source-quality slot.
    pub const MAX_QUALITY_SUBSCRIPTIONS: usize = 5;

    /// Find the chunk matching `quality`, if one was synthesised this
    /// tick.
    #[must_use]
    pub fn matching(&self, quality: MediaQuality) -> Option<&OutputData<'a>> {
        self.data.iter().find(|d| d.quality == quality)
    }
}

/// Opaque token identifying which backend-originated request a
/// [`OutputBackend`] callback corresponds to, so the registry can
/// dispatch the right continuation.
pub type CallbackId = u64;

/// Collaborator the registry hands to a backend so it can report
/// session state transitions back onto the player task without ever
/// touching player/registry state directly.
#[async_trait]
pub trait BackendCallback: Send + Sync {
    /// Report a state transition for `device_id`, tagged with the
    /// `cb_id` the backend was given for the originating request.
    async fn on_state(&self, device_id: u64, cb_id: CallbackId, state: DeviceState);
}

/// Capability-set interface every output backend implements.
///
/// Methods are async to match the teacher's `tokio`-task-per-backend
/// model (§5): a backend's event loop lives on its own task and only
/// ever reaches the player/registry through this trait and
/// [`BackendCallback`], never by direct state mutation.
#[async_trait]
pub trait OutputBackend: Send + Sync {
    /// Backend name, for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Process-wide start. Failure marks the backend disabled for the
    /// remainder of the process.
    async fn init(&self) -> Result<(), CoreError>;

    /// Process-wide teardown.
    async fn deinit(&self) -> Result<(), CoreError>;

    /// Open a session for `device`. On success, the backend later
    /// invokes `cb` with `Connected`, then `Streaming` once the tick
    /// driver begins feeding it.
    async fn device_start(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError>;

    /// Gracefully close a device's session. Must invoke `cb` with
    /// `Stopped` (or `Failed`) once finished.
    async fn device_stop(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError>;

    /// Drop unsent buffered packets for a device's session.
    async fn device_flush(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError>;

    /// Establish then immediately tear down a session, to test
    /// reachability and/or provision an auth key.
    async fn device_probe(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError>;

    /// Apply `device.volume`. Returns `true` if async work was
    /// scheduled, `false` if the change was a no-op (e.g. device
    /// unreachable).
    async fn volume_set(&self, device: &OutputDevice, cb_id: CallbackId) -> Result<bool, CoreError>;

    /// Pure conversion from a backend-specific wire value to a 0-100
    /// percentage.
    fn volume_to_pct(&self, value: &str) -> Option<u8>;

    /// Ask the device to renegotiate quality. Optional; backends that
    /// don't support renegotiation return `Ok(())` without doing
    /// anything.
    async fn quality_set(
        &self,
        device: &OutputDevice,
        quality: MediaQuality,
        cb_id: CallbackId,
    ) -> Result<(), CoreError>;

    /// Submit a user-entered PIN to complete a pairing handshake.
    /// Optional; backends without a pairing flow return
    /// [`CoreError::NotImplemented`].
    async fn authorize(&self, device: &OutputDevice, pin: &str, cb_id: CallbackId) -> Result<(), CoreError>;

    /// Called each player tick with this tick's quality-tagged
    /// chunks; the backend writes the chunk matching its subscribed
    /// quality. A mismatch (no matching slot) is a hard abort of that
    /// backend's session.
    async fn write(&self, device: &OutputDevice, buffer: &OutputBuffer<'_>) -> Result<(), CoreError>;

    /// Produce backend-shaped metadata off the player task.
    async fn metadata_prepare(&self, device: &OutputDevice, item_id: u64) -> Result<Vec<u8>, CoreError>;

    /// Send previously prepared metadata on the player task.
    async fn metadata_send(
        &self,
        device: &OutputDevice,
        metadata: &[u8],
        rtptime: u32,
        offset_ms: u32,
        startup: bool,
    ) -> Result<(), CoreError>;

    /// Discard any pending metadata for a device (called on stop).
    async fn metadata_purge(&self, device: &OutputDevice) -> Result<(), CoreError>;

    /// Drop metadata older than `rtptime` (called as playback
    /// advances).
    async fn metadata_prune(&self, device: &OutputDevice, rtptime: u32) -> Result<(), CoreError>;
}
