//! # owntone-core
//!
//! The playback-and-output core of a home media server: the per-tick
//! playback clock, the session-abstracted output registry, the
//! AirPlay (RAOP) RTSP+RTP driver with retransmission and clock sync,
//! the AirPlay-2 time-sync auxiliary (`airptp`), and the tick-driven
//! write fan-out to every output backend (RAOP, Chromecast, ALSA,
//! PulseAudio, FIFO, RCP).
//!
//! This crate does not render audio, decode media, resolve hostnames,
//! persist library state beyond the speaker table, or serve HTTP
//! clients; those are collaborators with named contracts this crate
//! consumes through traits ([`backend::OutputBackend`]) rather than
//! implementations.
//!
//! ## Example
//!
//! ```rust,no_run
//! use owntone_core::{CoreConfig, registry::OutputDeviceRegistry};
//!
//! # async fn example() -> Result<(), owntone_core::CoreError> {
//! let config = CoreConfig::default();
//! let registry = OutputDeviceRegistry::new();
//! # let _ = config;
//! # let _ = registry;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Configuration for the playback core.
pub mod config;
/// Error types.
pub mod error;
/// Media quality (sample rate / bit depth / channels).
pub mod quality;
/// Process-wide output device registry.
pub mod registry;

/// Output backend interface and implementations.
pub mod backend;
/// RAOP/RTSP/RTP/PTP/crypto wire protocol layer.
pub mod protocol;
/// Player session, tick driver, and command mailbox.
pub mod session;

/// AirPlay-2 PTP clock-sync daemon.
pub mod airptp;

/// mDNS TXT-field parsing contract for discovered devices.
pub mod discovery;

pub use config::CoreConfig;
pub use error::CoreError;
pub use quality::MediaQuality;
