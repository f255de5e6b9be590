//! `airptp`: the optional companion PTP (IEEE 1588) clock daemon used
//! to give `AirPlay` 2 devices a grandmaster when none exists on the
//! network (§4.6).

mod daemon;
mod peer;
mod shm;

pub use daemon::{AirptpDaemon, PTP_EVENT_PORT, PTP_GENERAL_PORT, encode_owntone_peer_tlv, make_clock_id};
pub use peer::{AirptpPeer, MAX_PEERS, PEER_STALE_AFTER, PeerTable, djb2_hash};
pub use shm::{SharedClockHandle, SharedClockInfo, find as find_shared_clock};
