//! RAOP (AirPlay 1/2 audio) output backend.
//!
//! Drives the RTSP state machine from [`crate::protocol::raop`] over a
//! real TCP connection, using the teacher's sans-IO `RtspCodec` framed
//! over `tokio::net::TcpStream`, and streams audio over real UDP
//! sockets the way the teacher's `client::session` sets up its
//! `audio_socket`/`control_socket` pair — generalized here to the
//! audio/control/timing triple AirPlay's RTSP `SETUP` negotiates, with
//! NACK-driven retransmission and periodic sync/timing exchange wired
//! in on top of [`crate::session::rtp::RtpSession`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::CoreError;
use crate::protocol::raop::RaopSessionKeys;
use crate::protocol::raop::session::{RaopRtspSession, RaopSessionState, RaopTransport};
use crate::protocol::rtp::packet::RtpHeader;
use crate::protocol::rtp::packet_buffer::BufferedPacket;
use crate::protocol::rtp::timing::{NtpTimestamp, TimingRequest, TimingResponse};
use crate::protocol::rtp::{ControlPacket, RetransmitRequest};
use crate::protocol::rtsp::{Method, RtspCodec, RtspResponse};
use crate::quality::MediaQuality;
use crate::registry::{DeviceState, OutputDevice};
use crate::session::rtp::MasterSession;

use super::{BackendCallback, CallbackId, OutputBackend, OutputBuffer};

/// Interval between unsolicited timing requests the client sends to
/// re-measure clock offset, matching `RaopTimingRequest`'s "sent every
/// 3 seconds" precedent.
const TIMING_REQUEST_INTERVAL: Duration = Duration::from_secs(3);

/// Live per-device RAOP connection: the sans-IO session state machine,
/// the TCP socket and incremental response codec it drives, the three
/// UDP sockets SETUP negotiated, and the background tasks that answer
/// NACKs and timing queries for as long as the connection lives.
struct RaopConnection {
    rtsp: RaopRtspSession,
    stream: TcpStream,
    codec: RtspCodec,
    master: Arc<MasterSession>,
    audio_socket: Arc<UdpSocket>,
    control_socket: Arc<UdpSocket>,
    timing_socket: Arc<UdpSocket>,
    background: Vec<JoinHandle<()>>,
}

impl RaopConnection {
    async fn roundtrip(&mut self, method: Method, request: crate::protocol::rtsp::RtspRequest) -> Result<RtspResponse, CoreError> {
        rtsp_roundtrip(&mut self.rtsp, &mut self.stream, &mut self.codec, method, request).await
    }
}

impl Drop for RaopConnection {
    fn drop(&mut self) {
        for task in &self.background {
            task.abort();
        }
    }
}

/// A connection still mid-handshake: the TCP socket and sans-IO
/// session state machine exist, but the UDP audio/control/timing
/// sockets SETUP's response determines have not been opened yet.
struct PendingConnection {
    rtsp: RaopRtspSession,
    stream: TcpStream,
    codec: RtspCodec,
}

impl PendingConnection {
    async fn roundtrip(&mut self, method: Method, request: crate::protocol::rtsp::RtspRequest) -> Result<RtspResponse, CoreError> {
        rtsp_roundtrip(&mut self.rtsp, &mut self.stream, &mut self.codec, method, request).await
    }
}

async fn rtsp_roundtrip(
    rtsp: &mut RaopRtspSession,
    stream: &mut TcpStream,
    codec: &mut RtspCodec,
    method: Method,
    request: crate::protocol::rtsp::RtspRequest,
) -> Result<RtspResponse, CoreError> {
    stream.write_all(&request.encode()).await.map_err(CoreError::from)?;

    let mut chunk = [0u8; 4096];
    loop {
        if let Some(response) = codec
            .decode()
            .map_err(|e| CoreError::RtspError { message: e.to_string(), status_code: None })?
        {
            rtsp.process_response(method, &response)
                .map_err(|message| CoreError::RtspError { message, status_code: Some(response.status.as_u16()) })?;
            return Ok(response);
        }

        let n = stream.read(&mut chunk).await.map_err(CoreError::from)?;
        if n == 0 {
            return Err(CoreError::RtspError { message: "connection closed".to_string(), status_code: None });
        }
        codec
            .feed(&chunk[..n])
            .map_err(|e| CoreError::RtspError { message: e.to_string(), status_code: None })?;
    }
}

/// Backend driving AirPlay (RAOP) speakers over RTSP+RTP.
pub struct RaopBackend {
    connections: Mutex<HashMap<u64, RaopConnection>>,
}

impl RaopBackend {
    /// Create a new, empty RAOP backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn server_addr(device: &OutputDevice) -> Result<SocketAddr, CoreError> {
        device
            .addr_v4
            .map(|(ip, port)| SocketAddr::from((ip, port)))
            .or_else(|| device.addr_v6.map(|(ip, port)| SocketAddr::from((ip, port))))
            .ok_or_else(|| CoreError::InvalidParameter {
                name: "device".to_string(),
                message: "device has no known address".to_string(),
            })
    }

    /// Bind the three UDP sockets SETUP needs, connecting each to
    /// `server_ip` once the server's ports are known from the SETUP
    /// response's `Transport` header (teacher's `setup_udp_socket`:
    /// bind ephemeral, then `connect` to the fixed remote).
    async fn open_sockets(server_ip: std::net::IpAddr, transport: &RaopTransport) -> Result<(UdpSocket, UdpSocket, UdpSocket), CoreError> {
        let audio = UdpSocket::bind("0.0.0.0:0").await.map_err(CoreError::from)?;
        audio
            .connect(SocketAddr::new(server_ip, transport.server_port))
            .await
            .map_err(CoreError::from)?;

        let control = UdpSocket::bind("0.0.0.0:0").await.map_err(CoreError::from)?;
        control
            .connect(SocketAddr::new(server_ip, transport.control_port))
            .await
            .map_err(CoreError::from)?;

        let timing = UdpSocket::bind("0.0.0.0:0").await.map_err(CoreError::from)?;
        timing
            .connect(SocketAddr::new(server_ip, transport.timing_port))
            .await
            .map_err(CoreError::from)?;

        Ok((audio, control, timing))
    }

    /// Background task answering the device's NACKs: on a
    /// `RetransmitRequest` over the control channel, pull the
    /// requested range out of the RTP session's ring and resend each
    /// packet wrapped in a retransmit-response header.
    fn spawn_retransmit_responder(control_socket: Arc<UdpSocket>, master: Arc<MasterSession>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                let n = match control_socket.recv(&mut buf).await {
                    Ok(n) => n,
                    Err(_) => return,
                };
                let Ok(ControlPacket::RetransmitRequest(RetransmitRequest { sequence_start, count })) =
                    ControlPacket::decode(&buf[..n])
                else {
                    continue;
                };

                for packet in master.rtp.retransmit_range(sequence_start, count) {
                    let resend = encode_retransmit_response(&packet);
                    if control_socket.send(&resend).await.is_err() {
                        break;
                    }
                }
            }
        })
    }

    /// Background task running the NTP-style timing exchange: sends a
    /// `TimingRequest` every [`TIMING_REQUEST_INTERVAL`] and answers
    /// any `TimingRequest` the device sends us with a `TimingResponse`
    /// carrying our receive/send timestamps.
    fn spawn_timing_responder(timing_socket: Arc<UdpSocket>, ssrc: u32, device_name: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TIMING_REQUEST_INTERVAL);
            let mut buf = [0u8; 2048];
            let mut seq: u16 = 0;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        seq = seq.wrapping_add(1);
                        let request = TimingRequest::new();
                        if timing_socket.send(&request.encode(seq, ssrc)).await.is_err() {
                            return;
                        }
                    }
                    received = timing_socket.recv(&mut buf) => {
                        let Ok(n) = received else { return; };
                        if n < RtpHeader::SIZE + 8 {
                            continue;
                        }
                        let payload_type = buf[1] & 0x7F;
                        if payload_type == 0x52 && n >= TimingRequest::SIZE {
                            // Device queried our clock; reply with a
                            // TimingResponse carrying its reference
                            // time back plus our receive/send times.
                            let reference_time = NtpTimestamp::decode(&buf[16..24]);
                            let receive_time = NtpTimestamp::now();
                            let response = TimingResponse {
                                reference_time,
                                receive_time,
                                send_time: NtpTimestamp::now(),
                            };
                            if timing_socket.send(&response.encode(seq, ssrc)).await.is_err() {
                                return;
                            }
                        } else if payload_type == 0x53 && n >= 24 + 16 {
                            let response = TimingResponse::decode(&buf[16..n]);
                            if let Ok(response) = response {
                                let offset = response.calculate_offset(NtpTimestamp::now());
                                tracing::trace!(device = %device_name, offset_us = offset, "raop: timing offset");
                            }
                        }
                    }
                }
            }
        })
    }
}

impl Default for RaopBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputBackend for RaopBackend {
    fn name(&self) -> &'static str {
        "raop"
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
        let addr = Self::server_addr(device)?;
        tracing::info!(device = %device.name, %addr, "raop: opening session");

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| CoreError::ConnectionFailed {
                device_name: device.name.clone(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;

        let mut rtsp = RaopRtspSession::new(&addr.ip().to_string(), addr.port());
        rtsp.prepare_announce().map_err(|message| CoreError::CodecError { message })?;

        let master = Arc::new(MasterSession::new_raop(device.quality, device.requires_auth, 2));

        let mut stage = PendingConnection { rtsp, stream, codec: RtspCodec::default() };

        let options_req = stage.rtsp.options_request();
        stage.roundtrip(Method::Options, options_req).await?;

        let sdp = crate::protocol::sdp::create_raop_announce_sdp(
            &stage.rtsp.client_instance,
            &addr.ip().to_string(),
            &addr.ip().to_string(),
            &stage
                .rtsp
                .session_keys()
                .map(RaopSessionKeys::rsaaeskey)
                .unwrap_or_default(),
            &stage
                .rtsp
                .session_keys()
                .map(RaopSessionKeys::aesiv)
                .unwrap_or_default(),
        );
        let announce_req = stage.rtsp.announce_request(&sdp);
        stage.roundtrip(Method::Announce, announce_req).await?;

        // Bind the client-side control/timing sockets before SETUP so
        // their ephemeral local ports can be advertised in the
        // transport header.
        let local_control = UdpSocket::bind("0.0.0.0:0").await.map_err(CoreError::from)?;
        let local_timing = UdpSocket::bind("0.0.0.0:0").await.map_err(CoreError::from)?;
        let local_control_port = local_control.local_addr().map_err(CoreError::from)?.port();
        let local_timing_port = local_timing.local_addr().map_err(CoreError::from)?.port();

        let setup_req = stage.rtsp.setup_request(local_control_port, local_timing_port);
        stage.roundtrip(Method::Setup, setup_req).await?;

        let transport = stage
            .rtsp
            .transport()
            .cloned()
            .ok_or_else(|| CoreError::RtspError { message: "SETUP response missing Transport header".to_string(), status_code: None })?;

        let audio_socket = UdpSocket::bind("0.0.0.0:0").await.map_err(CoreError::from)?;
        audio_socket
            .connect(SocketAddr::new(addr.ip(), transport.server_port))
            .await
            .map_err(CoreError::from)?;
        local_control
            .connect(SocketAddr::new(addr.ip(), transport.control_port))
            .await
            .map_err(CoreError::from)?;
        local_timing
            .connect(SocketAddr::new(addr.ip(), transport.timing_port))
            .await
            .map_err(CoreError::from)?;

        let control_socket = Arc::new(local_control);
        let timing_socket = Arc::new(local_timing);

        let mut background = Vec::new();
        background.push(Self::spawn_retransmit_responder(control_socket.clone(), master.clone()));
        background.push(Self::spawn_timing_responder(timing_socket.clone(), master.rtp.ssrc(), device.name.clone()));

        let mut conn = RaopConnection {
            rtsp: stage.rtsp,
            stream: stage.stream,
            codec: stage.codec,
            master: master.clone(),
            audio_socket: Arc::new(audio_socket),
            control_socket,
            timing_socket,
            background,
        };

        let record_req = conn
            .rtsp
            .record_request(0, conn.master.rtp.current_rtptime());
        conn.roundtrip(Method::Record, record_req).await?;

        debug_assert_eq!(conn.rtsp.state(), RaopSessionState::Recording);

        self.connections.lock().await.insert(device.id, conn);

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
        let mut connections = self.connections.lock().await;
        if let Some(mut conn) = connections.remove(&device.id) {
            let teardown = conn.rtsp.teardown_request();
            let _ = conn.roundtrip(Method::Teardown, teardown).await;
        }
        cb.on_state(device.id, cb_id, DeviceState::Stopped).await;
        Ok(())
    }

    async fn device_flush(
        &self,
        device: &OutputDevice,
        cb_id: CallbackId,
        cb: &dyn BackendCallback,
    ) -> Result<(), CoreError> {
        let mut connections = self.connections.lock().await;
        let conn = connections
            .get_mut(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;

        let seq = 0u16;
        let rtptime = conn.master.rtp.current_rtptime();
        let flush = conn.rtsp.flush_request(seq, rtptime);
        conn.roundtrip(Method::Flush, flush).await?;

        cb.on_state(device.id, cb_id, DeviceState::Connected).await;
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
        let Some(conn) = connections.get_mut(&device.id) else {
            return Ok(false);
        };

        let db = percent_to_db(device.volume);
        let req = conn.rtsp.set_volume_request(db);
        conn.roundtrip(Method::SetParameter, req).await?;
        Ok(true)
    }

    fn volume_to_pct(&self, value: &str) -> Option<u8> {
        let db: f32 = value.trim().parse().ok()?;
        Some(db_to_percent(db))
    }

    async fn quality_set(
        &self,
        _device: &OutputDevice,
        _quality: MediaQuality,
        _cb_id: CallbackId,
    ) -> Result<(), CoreError> {
        // RAOP's quality is fixed at the RTSP ANNOUNCE/SETUP handshake;
        // renegotiating mid-stream would require a fresh RTSP session.
        Err(CoreError::NotImplemented("RAOP quality renegotiation".to_string()))
    }

    async fn authorize(&self, _device: &OutputDevice, _pin: &str, _cb_id: CallbackId) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("RAOP pair-pin flow".to_string()))
    }

    async fn write(&self, device: &OutputDevice, buffer: &OutputBuffer<'_>) -> Result<(), CoreError> {
        let connections = self.connections.lock().await;
        let conn = connections
            .get(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;

        let chunk = buffer
            .matching(conn.master.quality)
            .ok_or_else(|| CoreError::RtpError { message: "no chunk for subscribed quality".to_string() })?;

        let payload = crate::protocol::raop::alac_frame(chunk.samples, conn.master.quality.channels());
        let packet = conn.master.rtp.build_audio_packet(payload, chunk.frame_count, false);
        let rtp_timestamp = packet.header.timestamp;

        conn.audio_socket
            .send(&packet.encode())
            .await
            .map_err(CoreError::from)?;

        if conn.master.rtp.tick_sync_due(chunk.frame_count) {
            let sync = ControlPacket::Sync {
                rtp_timestamp,
                ntp_timestamp: NtpTimestamp::now(),
                next_timestamp: rtp_timestamp.wrapping_add(chunk.frame_count),
            };
            conn.control_socket
                .send(&sync.encode())
                .await
                .map_err(CoreError::from)?;
        }

        Ok(())
    }

    async fn metadata_prepare(&self, _device: &OutputDevice, _item_id: u64) -> Result<Vec<u8>, CoreError> {
        Ok(Vec::new())
    }

    async fn metadata_send(
        &self,
        device: &OutputDevice,
        metadata: &[u8],
        _rtptime: u32,
        _offset_ms: u32,
        _startup: bool,
    ) -> Result<(), CoreError> {
        let mut connections = self.connections.lock().await;
        let conn = connections
            .get_mut(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;

        let body = format!(
            "progress: {}/{}/{}\r\n",
            0,
            0,
            metadata.len()
        );
        let req = conn.rtsp.set_progress_request(0, 0, body.len() as u32);
        conn.roundtrip(Method::SetParameter, req).await?;
        Ok(())
    }

    async fn metadata_purge(&self, _device: &OutputDevice) -> Result<(), CoreError> {
        Ok(())
    }

    async fn metadata_prune(&self, _device: &OutputDevice, _rtptime: u32) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Wrap a buffered audio packet in a retransmit-response header
/// (`0x80 0xD6 <original seq>` followed by the original encoded RTP
/// packet), the shape a NACKing device expects back on the control
/// channel.
fn encode_retransmit_response(packet: &BufferedPacket) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + packet.data.len());
    buf.push(0x80);
    buf.push(0xD6); // M=1, PT=0x56 (retransmit response)
    buf.extend_from_slice(&packet.sequence.to_be_bytes());
    buf.extend_from_slice(&packet.data);
    buf
}

/// Convert a 0-100 volume percentage to AirPlay's logarithmic dB scale
/// (-144 silent .. 0 max), matching the teacher's `control::volume`
/// conversion.
fn percent_to_db(percent: u8) -> f32 {
    if percent == 0 {
        -144.0
    } else {
        20.0 * (f32::from(percent) / 100.0).log10()
    }
}

/// Inverse of [`percent_to_db`], used to interpret a device-pushed
/// volume string in `volume_to_pct`.
fn db_to_percent(db: f32) -> u8 {
    if db <= -144.0 {
        0
    } else {
        ((10f32.powf(db / 20.0)) * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_db_round_trip_at_extremes() {
        assert_eq!(percent_to_db(0), -144.0);
        assert_eq!(db_to_percent(-144.0), 0);
        assert_eq!(db_to_percent(percent_to_db(100)), 100);
    }

    #[test]
    fn retransmit_response_preserves_sequence_and_payload() {
        let packet = BufferedPacket {
            sequence: 42,
            timestamp: 1000,
            data: bytes::Bytes::from_static(&[1, 2, 3, 4]),
        };
        let encoded = encode_retransmit_response(&packet);
        assert_eq!(&encoded[0..2], &[0x80, 0xD6]);
        assert_eq!(u16::from_be_bytes([encoded[2], encoded[3]]), 42);
        assert_eq!(&encoded[4..], &[1, 2, 3, 4]);
    }
}
