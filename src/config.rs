//! Process-wide configuration for the playback core.
//!
//! Mirrors the teacher's `types::config` shape (a `Default` struct plus
//! a builder) but covers the knobs this core actually needs: tick
//! cadence, buffer thresholds, per-backend ports, and where to persist
//! the speaker table.

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the player tick driver, output backends, and
/// persistence.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Player tick interval (default: 10ms).
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,

    /// Maximum frames the player is allowed to read ahead of the
    /// current playback position before throttling (default: 1500).
    pub read_behind_max: u32,

    /// Maximum frames an output is allowed to lag behind the player
    /// before it is considered stalled (default: 1500).
    pub write_behind_max: u32,

    /// Target output buffer duration, in seconds (default: 2).
    pub output_buffer_secs: u32,

    /// Maximum number of concurrent quality-subscribed outputs
    /// (default: 5).
    pub max_quality_subscriptions: u32,

    /// RAOP/RTP control port (default: 6001).
    pub rtp_control_port: u16,

    /// RAOP/RTP timing port (default: 6002).
    pub rtp_timing_port: u16,

    /// Chromecast TLS control port (default: 8009).
    pub chromecast_port: u16,

    /// PTP event port (default: 319).
    pub ptp_event_port: u16,

    /// PTP general port (default: 320).
    pub ptp_general_port: u16,

    /// Path to persist the speaker/device table between runs (`None`
    /// disables persistence).
    pub speaker_table_path: Option<PathBuf>,

    /// Enable verbose per-message protocol tracing (RTSP/RTP/PTP) in
    /// addition to the default state-transition logging.
    pub debug_protocol: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            read_behind_max: 1500,
            write_behind_max: 1500,
            output_buffer_secs: 2,
            max_quality_subscriptions: 5,
            rtp_control_port: 6001,
            rtp_timing_port: 6002,
            chromecast_port: 8009,
            ptp_event_port: 319,
            ptp_general_port: 320,
            speaker_table_path: None,
            debug_protocol: false,
        }
    }
}

impl CoreConfig {
    /// Create a new config builder.
    #[must_use]
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Set the player tick interval.
    #[must_use]
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    /// Set the read-behind threshold, in frames.
    #[must_use]
    pub fn read_behind_max(mut self, frames: u32) -> Self {
        self.config.read_behind_max = frames;
        self
    }

    /// Set the write-behind threshold, in frames.
    #[must_use]
    pub fn write_behind_max(mut self, frames: u32) -> Self {
        self.config.write_behind_max = frames;
        self
    }

    /// Set the target output buffer duration, in seconds.
    #[must_use]
    pub fn output_buffer_secs(mut self, secs: u32) -> Self {
        self.config.output_buffer_secs = secs;
        self
    }

    /// Set the maximum number of concurrent quality-subscribed outputs.
    #[must_use]
    pub fn max_quality_subscriptions(mut self, max: u32) -> Self {
        self.config.max_quality_subscriptions = max;
        self
    }

    /// Set the path used to persist the speaker table.
    #[must_use]
    pub fn speaker_table_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.speaker_table_path = Some(path.into());
        self
    }

    /// Enable or disable verbose protocol tracing.
    #[must_use]
    pub fn debug_protocol(mut self, enable: bool) -> Self {
        self.config.debug_protocol = enable;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CoreConfig {
        self.config
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.tick_interval, Duration::from_millis(10));
        assert_eq!(cfg.read_behind_max, 1500);
        assert_eq!(cfg.write_behind_max, 1500);
        assert_eq!(cfg.output_buffer_secs, 2);
        assert_eq!(cfg.max_quality_subscriptions, 5);
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = CoreConfig::builder()
            .tick_interval(Duration::from_millis(20))
            .read_behind_max(3000)
            .speaker_table_path("/tmp/speakers.json")
            .build();

        assert_eq!(cfg.tick_interval, Duration::from_millis(20));
        assert_eq!(cfg.read_behind_max, 3000);
        assert_eq!(cfg.speaker_table_path, Some(PathBuf::from("/tmp/speakers.json")));
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = CoreConfig::default();
        let json = serde_json::to_string(&cfg).expect("serialize");
        let back: CoreConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.tick_interval, cfg.tick_interval);
        assert_eq!(back.rtp_control_port, cfg.rtp_control_port);
    }
}
