//! Error types for the core playback-and-output subsystem.
//!
//! Variants map onto the error taxonomy from the design: transient
//! network faults, session-fatal device errors, authentication
//! failures, playback-fatal aborts, and discovery faults. Callers use
//! [`CoreError::is_recoverable`] and [`CoreError::is_connection_lost`]
//! to choose between retrying, detaching a single device, or aborting
//! playback entirely.

use std::io;

/// Main error type for the playback core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// TCP/RTSP connection to a device could not be established.
    #[error("connection to {device_name} failed: {message}")]
    ConnectionFailed {
        /// Device display name.
        device_name: String,
        /// Underlying failure description.
        message: String,
        /// Underlying I/O error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection attempt exceeded the configured deadline.
    #[error("connection timed out after {duration:?}")]
    ConnectionTimeout {
        /// Configured timeout that elapsed.
        duration: std::time::Duration,
    },

    /// Device became unreachable mid-session.
    #[error("disconnected from {device_name}")]
    Disconnected {
        /// Device display name.
        device_name: String,
    },

    /// RTSP 401/403 handshake or pair-verify failed.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Human-readable failure reason.
        message: String,
        /// Whether the caller may retry (e.g. with a fresh PIN).
        recoverable: bool,
    },

    /// Referenced device id is not present in the registry.
    #[error("device not found: {device_id}")]
    DeviceNotFound {
        /// The id that was looked up.
        device_id: String,
    },

    /// A device-level operation could not proceed because the device
    /// already has an in-flight request of the same kind.
    #[error("device busy")]
    DeviceBusy,

    /// mDNS / discovery collaborator reported a failure.
    #[error("discovery failed: {message}")]
    DiscoveryFailed {
        /// Failure description from the discovery collaborator.
        message: String,
    },

    /// RTSP request/response framing error.
    #[error("RTSP error: {message}")]
    RtspError {
        /// Description of the framing failure.
        message: String,
        /// Status code, if the error originated from a response.
        status_code: Option<u16>,
    },

    /// RTP packet build/parse error.
    #[error("RTP error: {message}")]
    RtpError {
        /// Description of the failure.
        message: String,
    },

    /// DMAP/plist/codec encode-decode failure.
    #[error("codec error: {message}")]
    CodecError {
        /// Description of the failure.
        message: String,
    },

    /// Caller passed an invalid argument.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Description of why it is invalid.
        message: String,
    },

    /// An operation was requested in a state that cannot service it.
    #[error("invalid state: {message} (current state: {current_state})")]
    InvalidState {
        /// Description of the conflicting requirement.
        message: String,
        /// Current state name, for diagnostics.
        current_state: String,
    },

    /// Generic I/O failure (file, FIFO, socket).
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the failure.
        message: String,
        /// Underlying I/O error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Network transport failure not covered by a more specific variant.
    #[error("network error: {0}")]
    NetworkError(#[source] io::Error),

    /// Feature not implemented by this backend.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl CoreError {
    /// Whether the caller may retry the operation without tearing down
    /// the whole playback session.
    ///
    /// Transient network faults, busy devices, and timeouts are
    /// recoverable; authentication failures are recoverable only when
    /// explicitly marked so (e.g. "re-enter PIN", not "key rejected").
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout | Self::DeviceBusy | Self::ConnectionTimeout { .. } => true,
            Self::AuthenticationFailed { recoverable, .. } => *recoverable,
            Self::NetworkError(_) => true,
            _ => false,
        }
    }

    /// Whether this error represents the device dropping an
    /// established connection, as opposed to never connecting.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Disconnected { .. } | Self::ConnectionFailed { .. })
    }
}

impl From<io::Error> for CoreError {
    fn from(e: io::Error) -> Self {
        Self::NetworkError(e)
    }
}
