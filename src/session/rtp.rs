//! RTP session and master session bookkeeping.
//!
//! `RtpSession` wraps the teacher's `protocol::rtp::packet_buffer`
//! ring with the sequence/timestamp/SSRC counters and sync-interval
//! bookkeeping the data model calls for; `MasterSession` is the
//! quality-keyed, reference-counted object shared by every
//! `DeviceSession` that streams at the same `(quality, encrypt)` pair.

use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;

use crate::protocol::rtp::packet::{RtpHeader, RtpPacket};
use crate::protocol::rtp::packet_buffer::{BufferedPacket, PacketBuffer};
use crate::quality::MediaQuality;

/// Default retransmit ring size for RAOP sessions (≈1000 packets).
pub const RAOP_RING_SIZE: usize = 1000;

/// Default retransmit ring size for Chromecast sessions.
pub const CHROMECAST_RING_SIZE: usize = 300;

/// Per-master-session RTP state: SSRC, sequence/timestamp cursors,
/// and the retransmit ring.
pub struct RtpSession {
    ssrc: u32,
    sequence: AtomicU32,
    rtptime: AtomicU32,
    ring: std::sync::Mutex<PacketBuffer>,
    sync_interval_samples: u32,
    since_last_sync: AtomicU32,
}

impl RtpSession {
    /// Create a new RTP session with a random SSRC and the given ring
    /// capacity / sync interval (in samples, default one second's
    /// worth at the session's sample rate).
    #[must_use]
    pub fn new(ring_size: usize, sync_interval_samples: u32) -> Self {
        Self {
            ssrc: rand::thread_rng().r#gen(),
            sequence: AtomicU32::new(0),
            rtptime: AtomicU32::new(0),
            ring: std::sync::Mutex::new(PacketBuffer::new(ring_size)),
            sync_interval_samples,
            since_last_sync: AtomicU32::new(sync_interval_samples),
        }
    }

    /// This session's SSRC.
    #[must_use]
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Build, ring-buffer, and return the next audio packet, advancing
    /// the sequence number and rtp-time cursor by `frames`.
    pub fn build_audio_packet(&self, payload: Vec<u8>, frames: u32, buffered: bool) -> RtpPacket {
        let seq = (self.sequence.fetch_add(1, Ordering::SeqCst) & 0xFFFF) as u16;
        let timestamp = self.rtptime.fetch_add(frames, Ordering::SeqCst);

        let packet = RtpPacket {
            header: RtpHeader::new_audio(seq, timestamp, self.ssrc, buffered),
            payload,
        };

        let mut ring = self.ring.lock().expect("rtp session ring mutex poisoned");
        ring.push(BufferedPacket {
            sequence: seq,
            timestamp,
            data: bytes::Bytes::from(packet.encode()),
        });

        packet
    }

    /// Retrieve buffered packets for a NACK-driven retransmit request.
    pub fn retransmit_range(&self, start: u16, count: u16) -> Vec<BufferedPacket> {
        let ring = self.ring.lock().expect("rtp session ring mutex poisoned");
        ring.get_range(start, count).cloned().collect()
    }

    /// Whether `frames` have accumulated past the sync interval; if
    /// so, the internal counter is reset and the caller should emit a
    /// periodic sync packet this tick.
    pub fn tick_sync_due(&self, frames: u32) -> bool {
        let remaining = self.since_last_sync.load(Ordering::SeqCst);
        if frames >= remaining {
            self.since_last_sync
                .store(self.sync_interval_samples, Ordering::SeqCst);
            true
        } else {
            self.since_last_sync.fetch_sub(frames, Ordering::SeqCst);
            false
        }
    }

    /// Current rtp-time cursor, without advancing it.
    #[must_use]
    pub fn current_rtptime(&self) -> u32 {
        self.rtptime.load(Ordering::SeqCst)
    }
}

/// Shared session for one distinct `(quality, encrypt)` pair. Created
/// on the first RAOP session needing that quality, destroyed once the
/// last referring device session is torn down — `Arc`'s refcount gives
/// this deferred-free behaviour for free (§9 design note 3).
pub struct MasterSession {
    /// Negotiated quality.
    pub quality: MediaQuality,
    /// Whether audio payloads are AES-CBC encrypted.
    pub encrypt: bool,
    /// Output-buffer delay, in samples (`OUTPUTS_BUFFER_DURATION` ×
    /// sample rate, nominally 2s).
    pub output_delay_samples: u32,
    /// Shared RTP session (sequence/timestamp/ring).
    pub rtp: RtpSession,
    /// Optional artwork RTP session (RAOP devices that request
    /// artwork get their own sequence space).
    pub artwork_rtp: Option<RtpSession>,
}

impl MasterSession {
    /// Create a master session for `quality`, sized for RAOP framing.
    #[must_use]
    pub fn new_raop(quality: MediaQuality, encrypt: bool, output_buffer_secs: u32) -> Self {
        let sync_interval = quality.sample_rate();
        Self {
            quality,
            encrypt,
            output_delay_samples: quality.sample_rate() * output_buffer_secs,
            rtp: RtpSession::new(RAOP_RING_SIZE, sync_interval),
            artwork_rtp: None,
        }
    }

    /// Create a master session for `quality`, sized for Chromecast
    /// framing.
    #[must_use]
    pub fn new_chromecast(quality: MediaQuality, output_buffer_secs: u32) -> Self {
        let sync_interval = quality.sample_rate();
        Self {
            quality,
            encrypt: false,
            output_delay_samples: quality.sample_rate() * output_buffer_secs,
            rtp: RtpSession::new(CHROMECAST_RING_SIZE, sync_interval),
            artwork_rtp: None,
        }
    }
}
