//! Chromecast output backend.
//!
//! Session establishment over the namespaced `CastMessage` protobuf
//! wire (CONNECT → GET_STATUS → LAUNCH → in-app CONNECT → MEDIA
//! GET_STATUS → OFFER/ANSWER), then Opus audio over UDP framed with
//! an 11-byte Cast header (§6). Reuses the RAOP backend's manual
//! length-prefixed roundtrip pattern, generalized to Cast framing
//! instead of RTSP.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::quality::{BitDepth, MediaQuality};
use crate::registry::{DeviceState, OutputDevice};

use super::{BackendCallback, CallbackId, OutputBackend, OutputBuffer};

const APP_ID_DEFAULT: &str = "85CDB22F";
const APP_ID_FALLBACK: &str = "0F5096E8";

const NS_CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";
const NS_RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";
const NS_MEDIA: &str = "urn:x-cast:com.google.cast.media";
const NS_WEBRTC: &str = "urn:x-cast:com.google.cast.webrtc";

/// Opus is negotiated at a fixed 48kHz/16-bit rate regardless of the
/// source quality; the driver's per-quality conversion produces this
/// exact shape when a backend subscribes to it.
const OPUS_SAMPLE_RATE: u32 = 48_000;
/// One Opus frame, 20ms at 48kHz, samples per channel.
const OPUS_FRAME_SAMPLES: usize = 960;
/// Largest Opus packet this backend will produce (well above any
/// expected size at these bitrates; `opus::Encoder::encode` errors if
/// the output buffer is too small rather than truncating silently).
const OPUS_MAX_PACKET: usize = 4000;

/// Fixed quality this backend subscribes to: Opus only runs at 48kHz.
#[must_use]
pub fn chromecast_quality() -> MediaQuality {
    MediaQuality::new(OPUS_SAMPLE_RATE, BitDepth::Sixteen, 2)
        .expect("48kHz/16-bit/stereo is always a valid quality")
}

/// Minimal protobuf varint + length-delimited string encoding for the
/// subset of `CastMessage` fields this backend needs (protocol_version,
/// source_id, destination_id, namespace, payload_type, payload_utf8).
mod wire {
    pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    pub fn encode_string_field(field_num: u32, value: &str, out: &mut Vec<u8>) {
        encode_varint(u64::from((field_num << 3) | 2), out);
        encode_varint(value.len() as u64, out);
        out.extend_from_slice(value.as_bytes());
    }

    pub fn encode_varint_field(field_num: u32, value: u64, out: &mut Vec<u8>) {
        encode_varint(u64::from((field_num << 3)), out);
        encode_varint(value, out);
    }

    /// Walk top-level fields, yielding `(field_num, wire_type, payload)`.
    /// Only wire types 0 (varint) and 2 (length-delimited) are handled,
    /// which covers every field `CastMessage` uses.
    pub fn iter_fields(mut data: &[u8]) -> Vec<(u32, u8, &[u8])> {
        let mut out = Vec::new();
        while !data.is_empty() {
            let Some((tag, rest)) = decode_varint(data) else { break };
            let field_num = (tag >> 3) as u32;
            let wire_type = (tag & 0x7) as u8;
            data = rest;
            match wire_type {
                0 => {
                    let Some((value, rest)) = decode_varint(data) else { break };
                    let consumed = data.len() - rest.len();
                    out.push((field_num, wire_type, &data[..consumed]));
                    let _ = value;
                    data = rest;
                }
                2 => {
                    let Some((len, rest)) = decode_varint(data) else { break };
                    let len = len as usize;
                    if rest.len() < len {
                        break;
                    }
                    out.push((field_num, wire_type, &rest[..len]));
                    data = &rest[len..];
                }
                _ => break,
            }
        }
        out
    }

    fn decode_varint(data: &[u8]) -> Option<(u64, &[u8])> {
        let mut value = 0u64;
        for (i, &byte) in data.iter().enumerate().take(10) {
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Some((value, &data[i + 1..]));
            }
        }
        None
    }
}

/// Build a `CastMessage` frame: 4-byte big-endian length prefix over
/// the protobuf-encoded message.
fn encode_cast_message(namespace: &str, source_id: &str, destination_id: &str, payload_utf8: &str) -> Vec<u8> {
    let mut msg = Vec::new();
    wire::encode_varint_field(1, 0, &mut msg); // protocol_version = CASTV2_1_0
    wire::encode_string_field(2, source_id, &mut msg);
    wire::encode_string_field(3, destination_id, &mut msg);
    wire::encode_string_field(4, namespace, &mut msg);
    wire::encode_varint_field(5, 0, &mut msg); // payload_type = STRING
    wire::encode_string_field(6, payload_utf8, &mut msg);

    let mut framed = Vec::with_capacity(4 + msg.len());
    framed.extend_from_slice(&(msg.len() as u32).to_be_bytes());
    framed.extend_from_slice(&msg);
    framed
}

/// Decode one `CastMessage`'s `(namespace, payload_utf8)`, given the
/// protobuf bytes (length prefix already stripped).
fn decode_cast_message(msg: &[u8]) -> Option<(String, String)> {
    let mut namespace = None;
    let mut payload = None;
    for (field_num, wire_type, value) in wire::iter_fields(msg) {
        if wire_type != 2 {
            continue;
        }
        match field_num {
            4 => namespace = std::str::from_utf8(value).ok().map(str::to_string),
            6 => payload = std::str::from_utf8(value).ok().map(str::to_string),
            _ => {}
        }
    }
    Some((namespace?, payload.unwrap_or_default()))
}

/// WebRTC-style OFFER sent after MEDIA GET_STATUS (§6): one Opus audio
/// stream plus a VP8 video placeholder, since the receiver app expects
/// both tracks even when only audio is actually produced.
#[derive(Debug, Serialize)]
struct OfferMessage {
    #[serde(rename = "requestId")]
    request_id: u32,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "seqNum")]
    seq_num: u32,
    offer: OfferBody,
}

#[derive(Debug, Serialize)]
struct OfferBody {
    #[serde(rename = "castMode")]
    cast_mode: &'static str,
    #[serde(rename = "receiverGetStatus")]
    receiver_get_status: bool,
    #[serde(rename = "supportedStreams")]
    supported_streams: Vec<StreamOffer>,
}

#[derive(Debug, Serialize)]
struct StreamOffer {
    index: u32,
    #[serde(rename = "type")]
    stream_type: &'static str,
    #[serde(rename = "codecName")]
    codec_name: &'static str,
    #[serde(rename = "receiverRtcpEventLog")]
    receiver_rtcp_event_log: bool,
    #[serde(rename = "rtpExtensions")]
    rtp_extensions: Vec<&'static str>,
    #[serde(rename = "timeBase")]
    time_base: String,
    ssrc: u32,
    #[serde(rename = "targetDelay")]
    target_delay: u32,
    #[serde(rename = "aesKey")]
    aes_key: String,
    #[serde(rename = "aesIvMask")]
    aes_iv_mask: String,
    #[serde(rename = "sampleRate", skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    #[serde(rename = "channels", skip_serializing_if = "Option::is_none")]
    channels: Option<u8>,
}

fn offer_for(quality: MediaQuality, request_id: u32) -> OfferMessage {
    let audio = StreamOffer {
        index: 0,
        stream_type: "audio_source",
        codec_name: "opus",
        receiver_rtcp_event_log: false,
        rtp_extensions: vec!["adaptive_playout_delay"],
        time_base: format!("1/{}", quality.sample_rate()),
        ssrc: 1,
        target_delay: 400,
        aes_key: "00000000000000000000000000000000".to_string(),
        aes_iv_mask: "00000000000000000000000000000000".to_string(),
        sample_rate: Some(quality.sample_rate()),
        channels: Some(quality.channels()),
    };
    let video_placeholder = StreamOffer {
        index: 1,
        stream_type: "video_source",
        codec_name: "vp8",
        receiver_rtcp_event_log: false,
        rtp_extensions: vec![],
        time_base: "1/90000".to_string(),
        ssrc: 2,
        target_delay: 400,
        aes_key: "00000000000000000000000000000000".to_string(),
        aes_iv_mask: "00000000000000000000000000000000".to_string(),
        sample_rate: None,
        channels: None,
    };
    OfferMessage {
        request_id,
        kind: "OFFER",
        seq_num: request_id,
        offer: OfferBody {
            cast_mode: "mirroring",
            receiver_get_status: true,
            supported_streams: vec![audio, video_placeholder],
        },
    }
}

#[derive(Debug, Deserialize)]
struct AnswerMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    answer: Option<AnswerBody>,
}

#[derive(Debug, Deserialize)]
struct AnswerBody {
    #[serde(rename = "udpPort")]
    udp_port: u16,
    #[serde(rename = "sendIndexes", default)]
    send_indexes: Vec<u32>,
}

/// Parse an ANSWER payload, returning the UDP port the receiver wants
/// streamed to.
fn parse_answer(payload: &str) -> Result<u16, CoreError> {
    let answer: AnswerMessage = serde_json::from_str(payload).map_err(|e| CoreError::CodecError {
        message: format!("malformed Cast ANSWER: {e}"),
    })?;
    if answer.kind.as_deref() == Some("ERROR") {
        return Err(CoreError::RtspError {
            message: "receiver rejected OFFER".to_string(),
            status_code: None,
        });
    }
    let body = answer.answer.ok_or_else(|| CoreError::CodecError {
        message: "ANSWER missing `answer` body".to_string(),
    })?;
    if body.send_indexes.is_empty() {
        tracing::warn!("chromecast: ANSWER accepted no stream indexes");
    }
    Ok(body.udp_port)
}

/// 11-byte Cast audio/video RTP-adjacent framing header (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastHeader {
    /// Key frame flag.
    pub key_frame: bool,
    /// Reference frame flag.
    pub reference_frame: bool,
    /// Frame sequence number.
    pub frame_id: u32,
    /// Packet index within the frame.
    pub packet_id: u16,
    /// Highest packet index in the frame.
    pub max_packet_id: u16,
    /// Frame this packet references (for partial retransmission).
    pub ref_frame_id: u32,
    /// Playout delay extension, milliseconds.
    pub new_playout_delay_ms: u16,
}

impl CastHeader {
    /// Wire size in bytes.
    pub const SIZE: usize = 11;

    /// Encode to the 11-byte wire header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = (u8::from(self.key_frame) << 7) | (u8::from(self.reference_frame) << 6);
        buf[1..3].copy_from_slice(&(self.frame_id as u16).to_be_bytes());
        buf[3..5].copy_from_slice(&self.packet_id.to_be_bytes());
        buf[5..7].copy_from_slice(&self.max_packet_id.to_be_bytes());
        buf[7] = 0x04; // ext_type
        buf[8] = 0x02; // ext_size
        buf[9..11].copy_from_slice(&self.new_playout_delay_ms.to_be_bytes());
        buf
    }
}

/// Interleaved-PCM accumulator feeding fixed-size Opus frames.
///
/// `write()` is called once per player tick with whatever frame count
/// the tick happens to carry; Opus only accepts its own fixed frame
/// durations, so leftover samples are carried to the next call.
struct OpusPacketizer {
    encoder: opus::Encoder,
    channels: usize,
    pending: Vec<i16>,
}

impl OpusPacketizer {
    fn new(quality: MediaQuality) -> Result<Self, CoreError> {
        let channels = if quality.channels() <= 1 {
            opus::Channels::Mono
        } else {
            opus::Channels::Stereo
        };
        let encoder =
            opus::Encoder::new(quality.sample_rate(), channels, opus::Application::Audio).map_err(|e| {
                CoreError::CodecError {
                    message: format!("opus encoder init failed: {e}"),
                }
            })?;
        Ok(Self {
            encoder,
            channels: if matches!(channels, opus::Channels::Mono) { 1 } else { 2 },
            pending: Vec::new(),
        })
    }

    /// Feed little-endian interleaved PCM, draining as many complete
    /// Opus frames as are now available.
    fn push(&mut self, pcm_le: &[u8]) -> Result<Vec<Vec<u8>>, CoreError> {
        for sample_le in pcm_le.chunks_exact(2) {
            self.pending.push(i16::from_le_bytes([sample_le[0], sample_le[1]]));
        }

        let frame_len = OPUS_FRAME_SAMPLES * self.channels;
        let mut frames = Vec::new();
        let mut out = [0u8; OPUS_MAX_PACKET];
        while self.pending.len() >= frame_len {
            let frame: Vec<i16> = self.pending.drain(..frame_len).collect();
            let len = self.encoder.encode(&frame, &mut out).map_err(|e| CoreError::CodecError {
                message: format!("opus encode failed: {e}"),
            })?;
            frames.push(out[..len].to_vec());
        }
        Ok(frames)
    }
}

struct ChromecastConnection {
    stream: TcpStream,
    audio_sock: Option<UdpSocket>,
    frame_id: u32,
    quality: MediaQuality,
    packetizer: OpusPacketizer,
    request_id: u32,
}

impl ChromecastConnection {
    async fn send(&mut self, namespace: &str, destination_id: &str, payload: &str) -> Result<(), CoreError> {
        let frame = encode_cast_message(namespace, "sender-0", destination_id, payload);
        self.stream.write_all(&frame).await.map_err(CoreError::from)
    }

    async fn recv(&mut self) -> Result<(String, String), CoreError> {
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await.map_err(CoreError::from)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body).await.map_err(CoreError::from)?;

        decode_cast_message(&body).ok_or_else(|| CoreError::CodecError {
            message: "malformed CastMessage".to_string(),
        })
    }

    /// Send an OFFER for `quality` and wait for the matching ANSWER,
    /// reconnecting the audio socket to the port it names and resetting
    /// the Opus encoder for the new quality. Used at startup and again
    /// whenever the driver subscribes this device to a new quality.
    async fn negotiate(&mut self, addr: SocketAddr, quality: MediaQuality) -> Result<(), CoreError> {
        self.request_id += 1;
        let offer = offer_for(quality, self.request_id);
        let payload = serde_json::to_string(&offer).map_err(|e| CoreError::CodecError {
            message: format!("failed to encode OFFER: {e}"),
        })?;
        self.send(NS_WEBRTC, "app-session", &payload).await?;

        let (_, answer_payload) = self.recv().await?;
        let udp_port = parse_answer(&answer_payload)?;

        let udp = UdpSocket::bind(("0.0.0.0", 0)).await.map_err(CoreError::from)?;
        udp.connect(SocketAddr::new(addr.ip(), udp_port)).await.map_err(CoreError::from)?;
        self.audio_sock = Some(udp);
        self.packetizer = OpusPacketizer::new(quality)?;
        self.quality = quality;
        Ok(())
    }
}

/// Backend driving Google Cast (Chromecast) receivers.
pub struct ChromecastBackend {
    connections: Mutex<HashMap<u64, ChromecastConnection>>,
}

impl ChromecastBackend {
    /// Create a new, empty Chromecast backend.
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
}

impl Default for ChromecastBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputBackend for ChromecastBackend {
    fn name(&self) -> &'static str {
        "chromecast"
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
        tracing::info!(device = %device.name, %addr, "chromecast: connecting");

        // TODO(tls): wrap in a TLS stream (the device presents a
        // self-signed cert); plumbing a `tokio-rustls` connector with
        // certificate-verification disabled is the next step here.
        let stream = TcpStream::connect(addr).await.map_err(|e| CoreError::ConnectionFailed {
            device_name: device.name.clone(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;

        let quality = chromecast_quality();
        let packetizer = OpusPacketizer::new(quality)?;
        let mut conn = ChromecastConnection {
            stream,
            audio_sock: None,
            frame_id: 0,
            quality,
            packetizer,
            request_id: 0,
        };

        conn.send(NS_CONNECTION, "receiver-0", "{\"type\":\"CONNECT\"}").await?;
        conn.send(NS_RECEIVER, "receiver-0", "{\"type\":\"GET_STATUS\",\"requestId\":1}").await?;
        let _ = conn.recv().await?;

        let launch = format!(
            "{{\"type\":\"LAUNCH\",\"appId\":\"{APP_ID_DEFAULT}\",\"requestId\":2}}"
        );
        conn.send(NS_RECEIVER, "receiver-0", &launch).await?;
        let (_, status) = conn.recv().await?;
        if status.is_empty() {
            let fallback = format!(
                "{{\"type\":\"LAUNCH\",\"appId\":\"{APP_ID_FALLBACK}\",\"requestId\":2}}"
            );
            conn.send(NS_RECEIVER, "receiver-0", &fallback).await?;
        }

        conn.send(NS_CONNECTION, "app-session", "{\"type\":\"CONNECT\"}").await?;
        conn.send(NS_MEDIA, "app-session", "{\"type\":\"GET_STATUS\",\"requestId\":3}").await?;
        let _ = conn.recv().await?;

        conn.negotiate(addr, quality).await?;

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
            let _ = conn.send(NS_CONNECTION, "app-session", "{\"type\":\"CLOSE\"}").await;
        }
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
        let Some(conn) = connections.get_mut(&device.id) else {
            return Ok(false);
        };
        let level = f64::from(device.volume) / 100.0;
        let msg = format!("{{\"type\":\"SET_VOLUME\",\"volume\":{{\"level\":{level:.3}}},\"requestId\":4}}");
        conn.send(NS_RECEIVER, "receiver-0", &msg).await?;
        Ok(true)
    }

    fn volume_to_pct(&self, value: &str) -> Option<u8> {
        let level: f64 = value.trim().parse().ok()?;
        Some((level.clamp(0.0, 1.0) * 100.0).round() as u8)
    }

    async fn quality_set(
        &self,
        device: &OutputDevice,
        quality: MediaQuality,
        _cb_id: CallbackId,
    ) -> Result<(), CoreError> {
        if quality.sample_rate() != OPUS_SAMPLE_RATE {
            return Err(CoreError::NotImplemented(
                "Chromecast Opus stream only runs at 48kHz".to_string(),
            ));
        }
        let addr = Self::server_addr(device)?;
        let mut connections = self.connections.lock().await;
        let conn = connections
            .get_mut(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;
        conn.negotiate(addr, quality).await
    }

    async fn authorize(&self, _device: &OutputDevice, _pin: &str, _cb_id: CallbackId) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("Chromecast has no pairing PIN flow".to_string()))
    }

    async fn write(&self, device: &OutputDevice, buffer: &OutputBuffer<'_>) -> Result<(), CoreError> {
        let mut connections = self.connections.lock().await;
        let conn = connections
            .get_mut(&device.id)
            .ok_or_else(|| CoreError::DeviceNotFound { device_id: device.id.to_string() })?;

        let chunk = buffer
            .matching(conn.quality)
            .ok_or_else(|| CoreError::RtpError { message: "no chunk for subscribed quality".to_string() })?;

        let Some(sock) = &conn.audio_sock else {
            return Err(CoreError::DeviceNotFound { device_id: device.id.to_string() });
        };

        let opus_frames = conn.packetizer.push(chunk.samples)?;
        for payload in opus_frames {
            let header = CastHeader {
                key_frame: true,
                reference_frame: false,
                frame_id: conn.frame_id,
                packet_id: 0,
                max_packet_id: 0,
                ref_frame_id: conn.frame_id,
                new_playout_delay_ms: 0,
            };
            conn.frame_id = conn.frame_id.wrapping_add(1);

            let mut packet = Vec::with_capacity(CastHeader::SIZE + payload.len());
            packet.extend_from_slice(&header.encode());
            packet.extend_from_slice(&payload);
            sock.send(&packet).await.map_err(CoreError::from)?;
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
