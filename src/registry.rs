//! Output device registry.
//!
//! Holds the authoritative, process-wide list of discovered and
//! configured sinks. Mirrors the teacher's `group::manager` shape (an
//! `RwLock`-guarded map plus a thin handle type) but keyed by the
//! 64-bit device id from the data model instead of a group id, and
//! carrying the volume-arbitration and advertised/session-liveness
//! rules this core needs instead of multi-room grouping.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::quality::MediaQuality;

/// Kind tag distinguishing which backend drives a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// AirPlay / RAOP speaker.
    Raop,
    /// Chromecast receiver.
    Chromecast,
    /// Local ALSA sink.
    Alsa,
    /// Local PulseAudio sink.
    PulseAudio,
    /// POSIX FIFO sink.
    Fifo,
    /// Roku RCP receiver.
    Rcp,
    /// No-op sink used by tests.
    Dummy,
}

/// Session/connection state of a device, mirroring the common backend
/// state machine (`NONE -> STARTUP -> CONNECTED <-> STREAMING ->
/// STOPPED`, with `FAILED` and `PASSWORD` side branches).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// No session; device is merely known to the registry.
    None,
    /// A session is being established.
    Startup,
    /// Session established, not yet streaming.
    Connected,
    /// Actively streaming audio.
    Streaming,
    /// Session closed normally.
    Stopped,
    /// Session closed due to an unrecoverable error.
    Failed,
    /// Awaiting a user-supplied PIN to complete pairing.
    Password,
}

/// A sink known to the registry, whether currently live or merely
/// remembered from a previous mDNS advertisement or static config
/// entry.
#[derive(Debug, Clone)]
pub struct OutputDevice {
    /// Stable, globally unique id.
    pub id: u64,
    /// Human-readable name.
    pub name: String,
    /// Which backend owns this device.
    pub kind: DeviceKind,
    /// IPv4 endpoint, if advertised over that family.
    pub addr_v4: Option<(Ipv4Addr, u16)>,
    /// IPv6 endpoint, if advertised over that family.
    pub addr_v6: Option<(Ipv6Addr, u16)>,
    /// Device password, if one was configured.
    pub password: Option<String>,
    /// Persisted pairing/auth key, if this device requires one.
    pub auth_key: Option<Vec<u8>>,
    /// Device-reported maximum volume (0-100).
    pub max_volume: u8,
    /// Current absolute volume (0-100).
    pub volume: u8,
    /// Volume relative to the group/master volume (0-100).
    pub relative_volume: u8,
    /// Whether this device is selected for output.
    pub selected: bool,
    /// Whether the device is currently advertised over at least one
    /// address family.
    pub advertised: bool,
    /// Whether a backend handshake requires auth before streaming.
    pub requires_auth: bool,
    /// Quality this device can accept.
    pub quality: MediaQuality,
    /// Current session state.
    pub state: DeviceState,
}

impl OutputDevice {
    /// Whether this record may be evicted: it is not currently
    /// advertised over any address family and holds no live session.
    #[must_use]
    pub fn is_evictable(&self) -> bool {
        !self.advertised
            && self.addr_v4.is_none()
            && self.addr_v6.is_none()
            && matches!(self.state, DeviceState::None | DeviceState::Stopped | DeviceState::Failed)
    }
}

/// Process-wide device registry.
///
/// Operations never block on I/O; persistence failures are logged and
/// ignored, leaving the in-memory record authoritative for the life
/// of the process.
pub struct OutputDeviceRegistry {
    devices: RwLock<HashMap<u64, OutputDevice>>,
    master_volume: RwLock<Option<u8>>,
}

impl OutputDeviceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            master_volume: RwLock::new(None),
        }
    }

    /// Add or update a device by id. If a device with this id already
    /// exists, its address/advertised fields are updated in place and
    /// the merged record is returned; volume, selection, and session
    /// state are preserved across the merge.
    pub async fn device_add(&self, mut device: OutputDevice) -> OutputDevice {
        let mut devices = self.devices.write().await;
        if let Some(existing) = devices.get_mut(&device.id) {
            existing.name = device.name.clone();
            existing.addr_v4 = device.addr_v4;
            existing.addr_v6 = device.addr_v6;
            existing.advertised = device.advertised;
            existing.quality = device.quality;
            return existing.clone();
        }
        device.relative_volume = device.volume;
        devices.insert(device.id, device.clone());
        device
    }

    /// Mark an address family gone for a device. The device is
    /// evicted only once both address families are absent and it
    /// holds no live session.
    pub async fn device_remove(&self, id: u64, family: AddressFamily) {
        let mut devices = self.devices.write().await;
        let Some(device) = devices.get_mut(&id) else {
            return;
        };

        match family {
            AddressFamily::V4 => device.addr_v4 = None,
            AddressFamily::V6 => device.addr_v6 = None,
        }
        if device.addr_v4.is_none() && device.addr_v6.is_none() {
            device.advertised = false;
        }

        if device.is_evictable() {
            devices.remove(&id);
        }
    }

    /// Look up a device by id.
    pub async fn device_get(&self, id: u64) -> Option<OutputDevice> {
        self.devices.read().await.get(&id).cloned()
    }

    /// Snapshot of every device currently known.
    pub async fn all_devices(&self) -> Vec<OutputDevice> {
        self.devices.read().await.values().cloned().collect()
    }

    /// Select a device for output.
    ///
    /// Sets its volume to `min(master_volume, device_volume)` and
    /// recomputes its relative volume. If no master volume is set
    /// yet, this device's volume becomes the master.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeviceNotFound`] if `id` is unknown.
    pub async fn select_device(&self, id: u64) -> Result<(), CoreError> {
        let mut devices = self.devices.write().await;
        let mut master = self.master_volume.write().await;

        let device = devices.get_mut(&id).ok_or_else(|| CoreError::DeviceNotFound {
            device_id: id.to_string(),
        })?;

        device.selected = true;
        match *master {
            None => {
                *master = Some(device.volume);
            }
            Some(m) => {
                device.volume = device.volume.min(m);
            }
        }
        device.relative_volume = relative_volume(device.volume, *master);
        Ok(())
    }

    /// Deselect a device. If it held the max volume among selected
    /// devices, the master volume is recomputed from the remaining
    /// selection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeviceNotFound`] if `id` is unknown.
    pub async fn deselect_device(&self, id: u64) -> Result<(), CoreError> {
        let mut devices = self.devices.write().await;

        {
            let device = devices.get_mut(&id).ok_or_else(|| CoreError::DeviceNotFound {
                device_id: id.to_string(),
            })?;
            device.selected = false;
        }

        let new_master = devices
            .values()
            .filter(|d| d.selected)
            .map(|d| d.volume)
            .max();
        *self.master_volume.write().await = new_master;

        for device in devices.values_mut().filter(|d| d.selected) {
            device.relative_volume = relative_volume(device.volume, new_master);
        }
        Ok(())
    }

    /// Apply a volume update pushed from the backend (e.g. the device
    /// itself changed volume out of band). Updates absolute volume
    /// only; relative volume is recomputed from the current master.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeviceNotFound`] if `id` is unknown.
    pub async fn update_volume_from_device(&self, id: u64, volume_pct: u8) -> Result<(), CoreError> {
        let mut devices = self.devices.write().await;
        let master = *self.master_volume.read().await;

        let device = devices.get_mut(&id).ok_or_else(|| CoreError::DeviceNotFound {
            device_id: id.to_string(),
        })?;
        device.volume = volume_pct;
        device.relative_volume = relative_volume(volume_pct, master);
        Ok(())
    }

    /// Transition a device's session state, as reported by its
    /// backend's callback.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeviceNotFound`] if `id` is unknown.
    pub async fn set_device_state(&self, id: u64, state: DeviceState) -> Result<(), CoreError> {
        let mut devices = self.devices.write().await;
        let device = devices.get_mut(&id).ok_or_else(|| CoreError::DeviceNotFound {
            device_id: id.to_string(),
        })?;
        device.state = state;
        Ok(())
    }

    /// Current master volume, if any device is selected.
    pub async fn master_volume(&self) -> Option<u8> {
        *self.master_volume.read().await
    }
}

impl Default for OutputDeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Which address family a `device_remove` notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

fn relative_volume(volume: u8, master: Option<u8>) -> u8 {
    match master {
        Some(m) if m != 0 => ((100u32 * u32::from(volume)) / u32::from(m)) as u8,
        _ => 0,
    }
}
