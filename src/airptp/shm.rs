//! Cross-process clock-id publication via POSIX shared memory.
//!
//! §4.6: "the daemon opens a POSIX SHM object `/airptp_shm` containing
//! version major/minor, clock id, and a last-updated monotonic
//! timestamp refreshed every 5 s. A client process... mmaps the SHM
//! read-only; the handle is deemed stale if its timestamp is older
//! than 15 s."
//!
//! `/dev/shm/airptp_shm` stands in for the named POSIX SHM object;
//! `memmap2` maps it the same way on the daemon (read-write) and
//! client (read-only) sides.

use std::fs::OpenOptions;
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use memmap2::{Mmap, MmapMut};

const SHM_PATH: &str = "/dev/shm/airptp_shm";
const LAYOUT_SIZE: usize = 1 + 1 + 8 + 8; // major, minor, clock_id, last_updated_secs
const VERSION_MAJOR: u8 = 1;
const VERSION_MINOR: u8 = 0;

/// A client's read-only view of the daemon's published clock id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedClockInfo {
    /// Wire layout version.
    pub version_major: u8,
    /// Wire layout version.
    pub version_minor: u8,
    /// The daemon's clock id, top 16 bits forced to `0xFFFF`.
    pub clock_id: u64,
    /// Seconds since the Unix epoch when the daemon last refreshed
    /// this record.
    pub last_updated_secs: u64,
}

impl SharedClockInfo {
    /// Whether this record's `last_updated_secs` is older than 15 s,
    /// implying the daemon may have died without cleaning up.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        now_secs().saturating_sub(self.last_updated_secs) > 15
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < LAYOUT_SIZE {
            return None;
        }
        Some(Self {
            version_major: buf[0],
            version_minor: buf[1],
            clock_id: u64::from_be_bytes(buf[2..10].try_into().ok()?),
            last_updated_secs: u64::from_be_bytes(buf[10..18].try_into().ok()?),
        })
    }

    fn encode(self) -> [u8; LAYOUT_SIZE] {
        let mut buf = [0u8; LAYOUT_SIZE];
        buf[0] = self.version_major;
        buf[1] = self.version_minor;
        buf[2..10].copy_from_slice(&self.clock_id.to_be_bytes());
        buf[10..18].copy_from_slice(&self.last_updated_secs.to_be_bytes());
        buf
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Daemon-side handle: owns the backing file and a writable mapping,
/// refreshed every 5 s from the daemon's event loop.
pub struct SharedClockHandle {
    map: MmapMut,
}

impl SharedClockHandle {
    /// Create (or truncate) and map `/airptp_shm`, publishing
    /// `clock_id` immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing file can't be created or
    /// mapped.
    pub fn publish(clock_id: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(SHM_PATH)?;
        file.set_len(LAYOUT_SIZE as u64)?;

        let mut map = unsafe { MmapMut::map_mut(&file)? };
        let handle = Self { map: std::mem::take(&mut map) };
        let mut handle = handle;
        handle.refresh(clock_id);
        Ok(handle)
    }

    /// Re-stamp `last_updated_secs` with the current time, keeping
    /// `clock_id`. Call this every 5 s from the daemon's event loop.
    pub fn refresh(&mut self, clock_id: u64) {
        let info = SharedClockInfo {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            clock_id,
            last_updated_secs: now_secs(),
        };
        self.map[..LAYOUT_SIZE].copy_from_slice(&info.encode());
    }
}

/// `airptp_daemon_find`: map `/airptp_shm` read-only and decode its
/// contents, if present.
///
/// # Errors
///
/// Returns an error if the SHM object doesn't exist or can't be
/// mapped.
pub fn find() -> io::Result<Option<SharedClockInfo>> {
    let file = match OpenOptions::new().read(true).open(SHM_PATH) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let map = unsafe { Mmap::map(&file)? };
    Ok(SharedClockInfo::decode(&map))
}
