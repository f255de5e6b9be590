//! Stream quality negotiated between the player and an output backend.

use crate::error::CoreError;

/// Bits per sample an output backend may be asked to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    /// 16-bit integer PCM (the RAOP/ALAC baseline).
    Sixteen,
    /// 24-bit integer PCM.
    TwentyFour,
    /// 32-bit integer PCM.
    ThirtyTwo,
}

impl BitDepth {
    /// Width in bits.
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Self::Sixteen => 16,
            Self::TwentyFour => 24,
            Self::ThirtyTwo => 32,
        }
    }

    /// Width in bytes, for buffer sizing.
    #[must_use]
    pub fn bytes(self) -> u32 {
        self.bits() / 8
    }
}

/// Sample rate, bit depth, and channel count for one output stream.
///
/// All three fields are non-zero for the lifetime of an active
/// playback session; a quality of zero in any field is only valid
/// before a source is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaQuality {
    sample_rate: u32,
    bit_depth: BitDepth,
    channels: u8,
}

/// Default quality used for RAOP/ALAC streams: 44.1kHz/16-bit stereo.
pub const CD_QUALITY: MediaQuality = MediaQuality {
    sample_rate: 44_100,
    bit_depth: BitDepth::Sixteen,
    channels: 2,
};

impl MediaQuality {
    /// Maximum channel count a backend may advertise or request.
    pub const MAX_CHANNELS: u8 = 8;

    /// Construct a quality, validating sample rate and channel count.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidParameter`] if `sample_rate` is zero,
    /// `channels` is zero, or `channels` exceeds [`Self::MAX_CHANNELS`].
    pub fn new(sample_rate: u32, bit_depth: BitDepth, channels: u8) -> Result<Self, CoreError> {
        if sample_rate == 0 {
            return Err(CoreError::InvalidParameter {
                name: "sample_rate".to_string(),
                message: "sample rate must be non-zero".to_string(),
            });
        }
        if channels == 0 || channels > Self::MAX_CHANNELS {
            return Err(CoreError::InvalidParameter {
                name: "channels".to_string(),
                message: format!("channel count must be in 1..={}", Self::MAX_CHANNELS),
            });
        }

        Ok(Self {
            sample_rate,
            bit_depth,
            channels,
        })
    }

    /// Sample rate in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bit depth.
    #[must_use]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Channel count.
    #[must_use]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Bytes per frame (one sample per channel).
    #[must_use]
    pub fn bytes_per_frame(&self) -> u32 {
        self.bit_depth.bytes() * u32::from(self.channels)
    }

    /// Bytes of PCM data corresponding to `frames` frames at this
    /// quality.
    #[must_use]
    pub fn bytes_for_frames(&self, frames: u32) -> u64 {
        u64::from(self.bytes_per_frame()) * u64::from(frames)
    }

    /// Duration, in frames, equivalent to `millis` milliseconds at this
    /// sample rate.
    #[must_use]
    pub fn frames_for_millis(&self, millis: u32) -> u32 {
        ((u64::from(self.sample_rate) * u64::from(millis)) / 1000) as u32
    }
}

impl Default for MediaQuality {
    fn default() -> Self {
        CD_QUALITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_sample_rate() {
        let err = MediaQuality::new(0, BitDepth::Sixteen, 2).unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter { .. }));
    }

    #[test]
    fn rejects_out_of_range_channels() {
        assert!(MediaQuality::new(44_100, BitDepth::Sixteen, 0).is_err());
        assert!(MediaQuality::new(44_100, BitDepth::Sixteen, 9).is_err());
        assert!(MediaQuality::new(44_100, BitDepth::Sixteen, 8).is_ok());
    }

    #[test]
    fn bytes_per_frame_accounts_for_depth_and_channels() {
        let q = MediaQuality::new(44_100, BitDepth::TwentyFour, 2).unwrap();
        assert_eq!(q.bytes_per_frame(), 6);
        assert_eq!(q.bytes_for_frames(100), 600);
    }

    #[test]
    fn frames_for_millis_matches_sample_rate() {
        assert_eq!(CD_QUALITY.frames_for_millis(10), 441);
        assert_eq!(CD_QUALITY.frames_for_millis(1000), 44_100);
    }
}
