//! Tick-driven write fan-out: the production path from one
//! [`PlayerSession::tick`] to every registered output backend (§2/§4.4
//! "tick-driven write fan-out to all outputs"), plus the
//! quality-subscription bookkeeping `quality_set` needs (§4.3: "up to
//! 5 subscribed qualities plus source slot").
//!
//! Mirrors the teacher's per-tick dispatch in its player thread —
//! build one buffer, then loop every live output and hand it the
//! buffer — generalized from a single local sink to the
//! registry-driven multi-backend shape this core needs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::{CallbackId, OutputBackend, OutputBuffer, OutputData};
use crate::error::CoreError;
use crate::quality::{BitDepth, MediaQuality};
use crate::registry::{DeviceKind, DeviceState, OutputDeviceRegistry};

use super::player::{InputSource, PlayerSession, TickOutcome};

/// Per-device set of qualities a backend has asked to additionally
/// receive beyond the source quality. Enforces
/// [`OutputBuffer::MAX_QUALITY_SUBSCRIPTIONS`].
#[derive(Default)]
pub struct QualitySubscriptions {
    by_device: Mutex<HashMap<u64, Vec<MediaQuality>>>,
}

impl QualitySubscriptions {
    /// Create an empty subscription table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `device_id` wants chunks synthesised at `quality`
    /// in addition to the source quality.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] once this device already
    /// holds [`OutputBuffer::MAX_QUALITY_SUBSCRIPTIONS`] distinct
    /// subscriptions.
    pub async fn subscribe(&self, device_id: u64, quality: MediaQuality) -> Result<(), CoreError> {
        let mut map = self.by_device.lock().await;
        let list = map.entry(device_id).or_default();
        if list.contains(&quality) {
            return Ok(());
        }
        if list.len() >= OutputBuffer::MAX_QUALITY_SUBSCRIPTIONS {
            return Err(CoreError::InvalidState {
                message: "quality subscription cap reached".to_string(),
                current_state: format!("{} subscriptions already held", list.len()),
            });
        }
        list.push(quality);
        Ok(())
    }

    /// Drop a device's subscription to `quality`, if held.
    pub async fn unsubscribe(&self, device_id: u64, quality: MediaQuality) {
        let mut map = self.by_device.lock().await;
        if let Some(list) = map.get_mut(&device_id) {
            list.retain(|q| *q != quality);
        }
    }

    /// Drop every subscription for `device_id` (called on `device_stop`).
    pub async fn clear(&self, device_id: u64) {
        self.by_device.lock().await.remove(&device_id);
    }

    /// Every distinct quality subscribed across all devices; the
    /// driver synthesises each at most once per tick regardless of
    /// how many devices share it.
    async fn all_distinct(&self) -> Vec<MediaQuality> {
        let map = self.by_device.lock().await;
        let mut out: Vec<MediaQuality> = Vec::new();
        for list in map.values() {
            for q in list {
                if !out.contains(q) {
                    out.push(*q);
                }
            }
        }
        out
    }
}

/// Owns the registered backends and drives the per-tick fan-out:
/// build this tick's [`OutputBuffer`] from the player's scratch
/// buffer (source quality, plus one synthesised chunk per distinct
/// subscribed quality) and call [`OutputBackend::write`] on every
/// selected, streaming device.
pub struct OutputFanout {
    registry: Arc<OutputDeviceRegistry>,
    backends: HashMap<DeviceKind, Arc<dyn OutputBackend>>,
    /// Quality-subscription table, shared with callers that invoke
    /// `quality_set` on a device's backend.
    pub subscriptions: Arc<QualitySubscriptions>,
}

impl OutputFanout {
    /// Create an empty fan-out over `registry`.
    #[must_use]
    pub fn new(registry: Arc<OutputDeviceRegistry>) -> Self {
        Self {
            registry,
            backends: HashMap::new(),
            subscriptions: Arc::new(QualitySubscriptions::new()),
        }
    }

    /// Register the backend that drives every device of `kind`.
    pub fn register_backend(&mut self, kind: DeviceKind, backend: Arc<dyn OutputBackend>) {
        self.backends.insert(kind, backend);
    }

    /// Look up the backend driving `kind`, if one is registered.
    #[must_use]
    pub fn backend_for(&self, kind: DeviceKind) -> Option<&Arc<dyn OutputBackend>> {
        self.backends.get(&kind)
    }

    /// Ask `device`'s backend to renegotiate quality, and on success
    /// record the subscription so future ticks synthesise a chunk at
    /// `quality` for it.
    ///
    /// # Errors
    ///
    /// Propagates the backend's [`OutputBackend::quality_set`] error,
    /// or [`CoreError::DeviceNotFound`] if no backend is registered
    /// for the device's kind.
    pub async fn quality_subscribe(
        &self,
        device: &crate::registry::OutputDevice,
        quality: MediaQuality,
        cb_id: CallbackId,
    ) -> Result<(), CoreError> {
        let backend = self
            .backend_for(device.kind)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;
        backend.quality_set(device, quality, cb_id).await?;
        self.subscriptions.subscribe(device.id, quality).await
    }

    /// Drive one full tick: call [`PlayerSession::tick`] against
    /// `input`, then fan the chunk it read out to every registered
    /// backend via [`Self::fan_out`]. This is the production call
    /// site the tick driver's `tokio::time::interval` loop invokes
    /// each 10ms (§2/§4.4); tests that only need the fan-out half can
    /// call [`Self::fan_out`] directly against a pre-populated buffer.
    ///
    /// # Errors
    ///
    /// Propagates [`PlayerSession::tick`]'s error. Per-backend write
    /// failures are reported in the returned `Vec`, not as an `Err`.
    pub async fn tick(
        &self,
        session: &mut PlayerSession,
        input: &mut dyn InputSource,
        late_ticks: u32,
        pts_ns: u64,
    ) -> Result<(TickOutcome, Vec<(u64, CoreError)>), CoreError> {
        let outcome = session.tick(input, late_ticks)?;
        let errors = self.fan_out(session, pts_ns).await;
        Ok((outcome, errors))
    }

    /// Build the `OutputBuffer` for `session`'s current scratch
    /// buffer and hand it to every selected, streaming device's
    /// backend. Returns the `(device_id, error)` pairs for any
    /// backend whose `write` failed this tick.
    pub async fn fan_out(&self, session: &PlayerSession, pts_ns: u64) -> Vec<(u64, CoreError)> {
        let extra_qualities = self.subscriptions.all_distinct().await;

        let mut chunks: Vec<(MediaQuality, Vec<u8>)> = vec![(session.quality, session.buffer.clone())];
        for quality in extra_qualities {
            if quality == session.quality {
                continue;
            }
            chunks.push((quality, convert_quality(&session.buffer, session.quality, quality)));
        }

        let data: Vec<OutputData<'_>> = chunks
            .iter()
            .map(|(quality, bytes)| OutputData {
                quality: *quality,
                samples: bytes.as_slice(),
                frame_count: (bytes.len() as u32) / quality.bytes_per_frame().max(1),
            })
            .collect();
        let buffer = OutputBuffer { pts_ns, data: &data };

        let mut errors = Vec::new();
        for device in self.registry.all_devices().await {
            if !device.selected || !matches!(device.state, DeviceState::Streaming) {
                continue;
            }
            let Some(backend) = self.backends.get(&device.kind) else {
                continue;
            };
            if let Err(e) = backend.write(&device, &buffer).await {
                errors.push((device.id, e));
            }
        }
        errors
    }
}

/// Convert one tick's raw 16-bit PCM bytes (interleaved, little-endian,
/// `from.channels()` channels at `from.sample_rate()`) into the layout
/// a backend subscribed at `to` expects: linear-interpolation
/// resampling, plus channel downmix-by-averaging or duplicate-to-fill
/// upmix, and bit-depth widening by left-shifting into the wider
/// sample.
fn convert_quality(samples: &[u8], from: MediaQuality, to: MediaQuality) -> Vec<u8> {
    let in_channels = usize::from(from.channels()).max(1);
    let bytes_per_in_frame = 2 * in_channels;
    let frame_count = samples.len() / bytes_per_in_frame;

    let mut per_channel: Vec<Vec<i32>> = vec![Vec::with_capacity(frame_count); in_channels];
    for frame in samples.chunks_exact(bytes_per_in_frame) {
        for (ch, sample_bytes) in frame.chunks_exact(2).enumerate() {
            per_channel[ch].push(i32::from(i16::from_le_bytes([sample_bytes[0], sample_bytes[1]])));
        }
    }

    let out_channels = usize::from(to.channels()).max(1);
    let remapped: Vec<Vec<i32>> = if out_channels <= in_channels {
        per_channel[..out_channels].to_vec()
    } else {
        let mut v = per_channel.clone();
        let filler = per_channel.last().cloned().unwrap_or_default();
        while v.len() < out_channels {
            v.push(filler.clone());
        }
        v
    };

    let ratio = f64::from(from.sample_rate().max(1)) / f64::from(to.sample_rate().max(1));
    let out_frames = ((frame_count as f64) / ratio).round() as usize;

    let mut out = Vec::with_capacity(out_frames * out_channels * usize::from(to.bit_depth().bytes()));
    for i in 0..out_frames {
        let src_pos = i as f64 * ratio;
        let idx0 = src_pos.floor() as usize;
        let frac = src_pos - idx0 as f64;
        for channel in &remapped {
            let s0 = f64::from(*channel.get(idx0).unwrap_or(&0));
            let s1 = f64::from(*channel.get(idx0 + 1).unwrap_or(&(s0 as i32)));
            let interpolated = s0 + (s1 - s0) * frac;
            push_sample(&mut out, interpolated.round() as i32, to.bit_depth());
        }
    }
    out
}

fn push_sample(out: &mut Vec<u8>, sample_16: i32, depth: BitDepth) {
    let clamped = sample_16.clamp(i32::from(i16::MIN), i32::from(i16::MAX));
    match depth {
        BitDepth::Sixteen => out.extend_from_slice(&(clamped as i16).to_le_bytes()),
        BitDepth::TwentyFour => {
            let widened = clamped << 8;
            out.extend_from_slice(&widened.to_le_bytes()[0..3]);
        }
        BitDepth::ThirtyTwo => {
            let widened = clamped << 16;
            out.extend_from_slice(&widened.to_le_bytes());
        }
    }
}
