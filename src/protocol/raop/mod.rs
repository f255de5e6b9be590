//! RAOP (`AirPlay` 1) protocol implementation

mod auth;
mod key_exchange;
pub mod session;

#[cfg(test)]
mod tests;

pub use auth::{
    AuthState, CHALLENGE_SIZE, RaopAuthenticator, build_response_message, decode_challenge,
    encode_challenge, generate_challenge, generate_response, verify_response,
};

pub use key_exchange::{AES_IV_SIZE, AES_KEY_SIZE, RaopSessionKeys, parse_session_keys};

/// Frame one tick's worth of little-endian PCM samples as an ALAC
/// payload (§4.5: uncompressed passthrough encoder).
///
/// The payload is `0b001` (3 bits, channels=1 meaning "stereo" per
/// ALAC's magic numbering) followed by 15 structural zero bits, then
/// the PCM samples re-emitted as big-endian octets. Payload length is
/// `3 + samples * channels * bytes_per_sample`.
#[must_use]
pub fn alac_frame(pcm_le: &[u8], channels: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + pcm_le.len());
    // 3 bits `001`, 15 zero bits -> two header bytes: 0b0010_0000, 0x00
    out.push(0b0010_0000);
    out.push(0x00);

    let bytes_per_sample = 2usize;
    let frame_size = bytes_per_sample * usize::from(channels).max(1);
    for frame in pcm_le.chunks_exact(frame_size) {
        for sample_le in frame.chunks_exact(bytes_per_sample) {
            out.push(sample_le[1]);
            out.push(sample_le[0]);
        }
    }

    out
}

#[cfg(test)]
mod alac_tests {
    use super::*;

    #[test]
    fn frame_reorders_to_big_endian_after_two_byte_header() {
        // One stereo frame: left=0x0102 little-endian, right=0x0304 little-endian.
        let pcm = [0x02, 0x01, 0x04, 0x03];
        let framed = alac_frame(&pcm, 2);
        assert_eq!(&framed[0..2], &[0b0010_0000, 0x00]);
        assert_eq!(&framed[2..], &[0x01, 0x02, 0x03, 0x04]);
    }
}
