//! The `airptp` companion daemon: an IEEE-1588 PTP grandmaster serving
//! `AirPlay` 2 devices that require a clock, grounded on the teacher's
//! `protocol::ptp` message/clock machinery but restructured as a
//! standalone peer-table-driven event loop (§4.6) instead of the
//! client-embedded master/slave handlers in `protocol::ptp::handler`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::error::CoreError;
use crate::protocol::ptp::{PtpMessage, PtpPortIdentity, PtpTimestamp};

use super::peer::PeerTable;
use super::shm::SharedClockHandle;

/// Standard PTP event-message port.
pub const PTP_EVENT_PORT: u16 = 319;
/// Standard PTP general-message port.
pub const PTP_GENERAL_PORT: u16 = 320;

const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);
const SYNC_INTERVAL: Duration = Duration::from_millis(125);
const SIGNALING_INTERVAL: Duration = Duration::from_secs(1);
const SHM_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
const TWO_STEP_FLAG: u16 = 0x0200;

/// IEEE organisation-unique id for standard PTP TLVs.
const ORG_IEEE: [u8; 3] = [0x00, 0x80, 0xc2];
/// Apple's organisation-unique id; its TLVs are logged, not acted on.
const ORG_APPLE: [u8; 3] = [0x00, 0x0d, 0x93];
/// This daemon's own organisation id, used for loopback peer add/remove.
const ORG_OWNTONE: [u8; 3] = [0x99, 0x99, 0x99];

const OWNTONE_SUBTYPE_ADD: u8 = 0;
const OWNTONE_SUBTYPE_DEL: u8 = 1;

/// Every organisation-unique id this daemon recognises in Signaling
/// TLVs; kept alongside `ORG_IEEE`/`ORG_APPLE`/`ORG_OWNTONE` so the
/// match in `handle_general_datagram` can't silently drift out of sync
/// with the set it's meant to cover.
const KNOWN_ORGS: [[u8; 3]; 3] = [ORG_IEEE, ORG_APPLE, ORG_OWNTONE];

/// Force the top 16 bits of a clock id to `0xFFFF`, marking it
/// non-EUI-64 per IEEE 1588 §7.5.2.2.3.
#[must_use]
pub fn make_clock_id(seed: u64) -> u64 {
    (0xFFFFu64 << 48) | (seed & 0x0000_FFFF_FFFF_FFFF)
}

/// The `airptp` daemon: owns the event/general UDP sockets, the peer
/// table, and (optionally) the shared-memory clock-id publication.
pub struct AirptpDaemon {
    clock_id: u64,
    event_sock: UdpSocket,
    general_sock: UdpSocket,
    peers: Mutex<PeerTable>,
    announce_seq: AtomicU16,
    sync_seq: AtomicU16,
    signaling_seq: AtomicU16,
    shm: Option<Mutex<SharedClockHandle>>,
}

impl AirptpDaemon {
    /// Bind both PTP sockets and construct the daemon. Does not start
    /// its event loop; call [`AirptpDaemon::run`] (typically via
    /// `tokio::spawn`) to do that.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IoError`] if either port fails to bind.
    pub async fn bind(
        seed: u64,
        event_port: u16,
        general_port: u16,
        is_shared: bool,
    ) -> Result<Self, CoreError> {
        let event_sock = UdpSocket::bind(("0.0.0.0", event_port))
            .await
            .map_err(CoreError::from)?;
        let general_sock = UdpSocket::bind(("0.0.0.0", general_port))
            .await
            .map_err(CoreError::from)?;

        let clock_id = make_clock_id(seed);
        let shm = if is_shared {
            match SharedClockHandle::publish(clock_id) {
                Ok(handle) => Some(Mutex::new(handle)),
                Err(e) => {
                    tracing::warn!(error = %e, "airptp: failed to publish shared clock handle");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            clock_id,
            event_sock,
            general_sock,
            peers: Mutex::new(PeerTable::new()),
            announce_seq: AtomicU16::new(0),
            sync_seq: AtomicU16::new(0),
            signaling_seq: AtomicU16::new(0),
            shm,
        })
    }

    /// This daemon's clock id (top 16 bits `0xFFFF`).
    #[must_use]
    pub fn clock_id(&self) -> u64 {
        self.clock_id
    }

    fn source_identity(&self) -> PtpPortIdentity {
        PtpPortIdentity::new(self.clock_id, 1)
    }

    /// Run the daemon's event loop until cancelled. Spawns the
    /// periodic Announce/Sync+Follow-Up/Signaling senders and the
    /// shared-memory refresher as cooperating tasks on the same
    /// runtime, then services incoming event/general datagrams
    /// (Delay_Req, PDelay_Req, Signaling) until an I/O error occurs.
    pub async fn run(self: Arc<Self>) -> Result<(), CoreError> {
        let announce = self.clone();
        tokio::spawn(async move { announce.announce_loop().await });

        let sync = self.clone();
        tokio::spawn(async move { sync.sync_loop().await });

        let signaling = self.clone();
        tokio::spawn(async move { signaling.signaling_loop().await });

        if self.shm.is_some() {
            let shm = self.clone();
            tokio::spawn(async move { shm.shm_refresh_loop().await });
        }

        self.serve_incoming().await
    }

    async fn announce_loop(self: Arc<Self>) {
        let mut tick = interval(ANNOUNCE_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if self.peers.lock().await.is_empty() {
                continue;
            }
            let seq = self.announce_seq.fetch_add(1, Ordering::Relaxed);
            let msg = PtpMessage::announce(self.source_identity(), seq, self.clock_id, 128, 128);
            self.broadcast(&self.general_sock, &msg.encode()).await;
        }
    }

    async fn sync_loop(self: Arc<Self>) {
        let mut tick = interval(SYNC_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if self.peers.lock().await.is_empty() {
                continue;
            }
            let seq = self.sync_seq.fetch_add(1, Ordering::Relaxed);

            let mut sync = PtpMessage::sync(self.source_identity(), seq, PtpTimestamp::from_nanos(0));
            sync.header.flags |= TWO_STEP_FLAG;
            self.broadcast(&self.event_sock, &sync.encode()).await;

            tokio::time::sleep(Duration::from_micros(100)).await;

            let follow_up = PtpMessage::follow_up(self.source_identity(), seq, PtpTimestamp::now());
            self.broadcast(&self.general_sock, &follow_up.encode()).await;
        }
    }

    async fn signaling_loop(self: Arc<Self>) {
        let mut tick = interval(SIGNALING_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if self.peers.lock().await.is_empty() {
                continue;
            }
            let seq = self.signaling_seq.fetch_add(1, Ordering::Relaxed);
            let frame = encode_signaling(self.source_identity(), seq, &apple_announce_tlvs());
            self.broadcast(&self.general_sock, &frame).await;
        }
    }

    async fn shm_refresh_loop(self: Arc<Self>) {
        let Some(shm) = &self.shm else { return };
        let mut tick = interval(SHM_REFRESH_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            shm.lock().await.refresh(self.clock_id);
        }
    }

    async fn broadcast(&self, sock: &UdpSocket, bytes: &[u8]) {
        let peers: Vec<SocketAddr> = self.peers.lock().await.peers().iter().map(|p| p.addr).collect();
        for addr in peers {
            if let Err(e) = sock.send_to(bytes, addr).await {
                tracing::debug!(%addr, error = %e, "airptp: send failed");
            }
        }
    }

    async fn serve_incoming(&self) -> Result<(), CoreError> {
        let mut buf = [0u8; 256];
        loop {
            tokio::select! {
                res = self.event_sock.recv_from(&mut buf) => {
                    let (n, from) = res.map_err(CoreError::from)?;
                    self.handle_event_datagram(&buf[..n], from).await;
                }
                res = self.general_sock.recv_from(&mut buf) => {
                    let (n, from) = res.map_err(CoreError::from)?;
                    self.handle_general_datagram(&buf[..n], from).await;
                }
            }
        }
    }

    async fn handle_event_datagram(&self, data: &[u8], from: SocketAddr) {
        if data.is_empty() {
            return;
        }
        match data[0] & 0x0F {
            // Delay_Req
            0x01 => {
                if let Ok(msg) = PtpMessage::decode(data) {
                    self.reply_delay_resp(&msg, from).await;
                }
            }
            // PDelay_Req (not modelled in the shared message codec; answered raw).
            0x02 => self.reply_pdelay_resp(data, from).await,
            _ => {}
        }
    }

    async fn handle_general_datagram(&self, data: &[u8], from: SocketAddr) {
        debug_assert!(KNOWN_ORGS.len() == 3);
        if data.len() < 34 || (data[0] & 0x0F) != 0x0C {
            return; // only Signaling carries our TLVs
        }
        for (org, subtype, body) in iter_tlvs(&data[34..]) {
            if !KNOWN_ORGS.contains(&org) {
                continue;
            }
            match org {
                ORG_IEEE => tracing::debug!(%from, subtype, "airptp: IEEE TLV"),
                ORG_APPLE => tracing::debug!(%from, subtype, "airptp: Apple TLV (logged only)"),
                ORG_OWNTONE => self.handle_owntone_tlv(subtype, body).await,
                _ => unreachable!("org checked against KNOWN_ORGS above"),
            }
        }
    }

    async fn handle_owntone_tlv(&self, subtype: u8, body: &[u8]) {
        let Some((peer_id, addr)) = decode_owntone_peer(body) else {
            return;
        };
        let mut peers = self.peers.lock().await;
        match subtype {
            OWNTONE_SUBTYPE_ADD => {
                peers.add(addr);
            }
            OWNTONE_SUBTYPE_DEL => peers.remove(peer_id),
            _ => {}
        }
    }

    async fn reply_delay_resp(&self, request: &PtpMessage, from: SocketAddr) {
        let requesting_port = request.header.source_port_identity;
        let resp = PtpMessage::delay_resp(
            self.source_identity(),
            request.header.sequence_id,
            PtpTimestamp::now(),
            requesting_port,
        );
        if let Err(e) = self.general_sock.send_to(&resp.encode(), from).await {
            tracing::debug!(%from, error = %e, "airptp: delay_resp send failed");
        }
    }

    async fn reply_pdelay_resp(&self, request: &[u8], from: SocketAddr) {
        if request.len() < 44 {
            return;
        }
        let sequence_id = u16::from_be_bytes([request[30], request[31]]);
        let requesting_port = request[20..30].to_vec();

        let resp = encode_pdelay_resp(self.source_identity(), sequence_id, &requesting_port);
        if let Err(e) = self.event_sock.send_to(&resp, from).await {
            tracing::debug!(%from, error = %e, "airptp: pdelay_resp send failed");
        }
    }
}

/// Encode a raw Signaling message (IEEE 1588 type `0x0C`, not present
/// in [`PtpMessageType`] since the shared codec only models the
/// message types the client/receiver side exchanges).
fn encode_signaling(source: PtpPortIdentity, sequence_id: u16, tlvs: &[u8]) -> Vec<u8> {
    let target_port_identity = [0xFFu8; 10]; // all-ones: "all PTP ports"
    let mut header = raw_header(0x0C, source, sequence_id, 0x05);
    header.extend_from_slice(&target_port_identity);
    header.extend_from_slice(tlvs);
    patch_length(&mut header);
    header
}

/// Encode a raw `PDelay_Resp` (IEEE 1588 type `0x03`).
fn encode_pdelay_resp(source: PtpPortIdentity, sequence_id: u16, requesting_port: &[u8]) -> Vec<u8> {
    let mut msg = raw_header(0x03, source, sequence_id, 0x05);
    msg.extend_from_slice(&PtpTimestamp::now().encode_ieee1588());
    msg.extend_from_slice(requesting_port);
    patch_length(&mut msg);
    msg
}

fn raw_header(message_type_nibble: u8, source: PtpPortIdentity, sequence_id: u16, control_field: u8) -> Vec<u8> {
    let mut buf = vec![0u8; 34];
    buf[0] = message_type_nibble & 0x0F;
    buf[1] = 2; // PTP version 2
    buf[4] = 0; // domain
    buf[20..30].copy_from_slice(&source.encode());
    buf[30..32].copy_from_slice(&sequence_id.to_be_bytes());
    buf[32] = control_field;
    buf
}

fn patch_length(buf: &mut [u8]) {
    let len = buf.len() as u16;
    buf[2..4].copy_from_slice(&len.to_be_bytes());
}

/// The fixed-content Apple signaling TLVs 1 and 2 this daemon always
/// announces alongside its own timing, per §4.6.
fn apple_announce_tlvs() -> Vec<u8> {
    let mut out = Vec::new();
    for subtype in [1u8, 2u8] {
        out.extend_from_slice(&tlv(ORG_APPLE, subtype, &[]));
    }
    out
}

fn tlv(org: [u8; 3], subtype: u8, body: &[u8]) -> Vec<u8> {
    // Organisation-TLV layout: type(2)=0x0003, length(2), org-id(3),
    // subtype(3, left-padded), data.
    let value_len = 3 + 3 + body.len();
    let mut out = Vec::with_capacity(4 + value_len);
    out.extend_from_slice(&3u16.to_be_bytes());
    out.extend_from_slice(&(value_len as u16).to_be_bytes());
    out.extend_from_slice(&org);
    out.extend_from_slice(&[0, 0, subtype]);
    out.extend_from_slice(body);
    out
}

/// Encode an OwnTone loopback TLV: subtype (add/del) + 32-bit peer id
/// + address length + packed `SocketAddr`.
#[must_use]
pub fn encode_owntone_peer_tlv(subtype: u8, peer_id: u32, addr: SocketAddr) -> Vec<u8> {
    let packed = match addr {
        SocketAddr::V4(a) => {
            let mut buf = vec![4u8];
            buf.extend_from_slice(&a.ip().octets());
            buf.extend_from_slice(&a.port().to_be_bytes());
            buf
        }
        SocketAddr::V6(a) => {
            let mut buf = vec![6u8];
            buf.extend_from_slice(&a.ip().octets());
            buf.extend_from_slice(&a.port().to_be_bytes());
            buf
        }
    };

    let mut body = Vec::with_capacity(4 + 1 + packed.len());
    body.extend_from_slice(&peer_id.to_be_bytes());
    body.push(packed.len() as u8);
    body.extend_from_slice(&packed);

    tlv(ORG_OWNTONE, subtype, &body)
}

fn decode_owntone_peer(body: &[u8]) -> Option<(u32, SocketAddr)> {
    if body.len() < 5 {
        return None;
    }
    let peer_id = u32::from_be_bytes(body[0..4].try_into().ok()?);
    let addr_len = usize::from(body[4]);
    let packed = body.get(5..5 + addr_len)?;

    let addr = match packed.first()? {
        4 if packed.len() == 7 => {
            let ip = std::net::Ipv4Addr::new(packed[1], packed[2], packed[3], packed[4]);
            let port = u16::from_be_bytes([packed[5], packed[6]]);
            SocketAddr::from((ip, port))
        }
        6 if packed.len() == 19 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&packed[1..17]);
            let ip = std::net::Ipv6Addr::from(octets);
            let port = u16::from_be_bytes([packed[17], packed[18]]);
            SocketAddr::from((ip, port))
        }
        _ => return None,
    };
    Some((peer_id, addr))
}

/// Walk a TLV-encoded organisation-extension blob, yielding
/// `(org_id, subtype, body)` for each well-formed entry.
fn iter_tlvs(mut data: &[u8]) -> Vec<([u8; 3], u8, &[u8])> {
    let mut out = Vec::new();
    while data.len() >= 4 {
        let tlv_type = u16::from_be_bytes([data[0], data[1]]);
        let len = usize::from(u16::from_be_bytes([data[2], data[3]]));
        let Some(value) = data.get(4..4 + len) else { break };

        if tlv_type == 3 && value.len() >= 6 {
            let org = [value[0], value[1], value[2]];
            let subtype = value[5];
            out.push((org, subtype, &value[6..]));
        }

        data = &data[4 + len..];
    }
    out
}
