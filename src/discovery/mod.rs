//! mDNS discovery contract.
//!
//! Browsing `_raop._tcp` over the network is an external collaborator
//! (only its callback shape matters here); this module keeps the
//! callback's data shape — TXT-record parsing and the `md`
//! metadata-wanted bitmask — and turns one discovered service instance
//! into the shape the registry can merge, without owning the
//! `mdns-sd` browser socket itself.

pub mod parser;
pub mod raop;

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::quality::MediaQuality;
use crate::registry::{DeviceKind, DeviceState, OutputDevice};

/// Which metadata kinds a discovered device wants, decoded from the
/// `md` TXT field (0=text, 1=artwork, 2=progress).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataWanted {
    /// Wants DMAP-tagged text (title/album/artist).
    pub text: bool,
    /// Wants artwork.
    pub artwork: bool,
    /// Wants scrubber progress.
    pub progress: bool,
}

impl MetadataWanted {
    /// Decode from the comma-separated `md` TXT field value.
    #[must_use]
    pub fn from_md_field(value: &str) -> Self {
        let mut wanted = Self::default();
        for part in value.split(',') {
            match part.trim() {
                "0" => wanted.text = true,
                "1" => wanted.artwork = true,
                "2" => wanted.progress = true,
                _ => {}
            }
        }
        wanted
    }
}

/// One mDNS service-instance event, as the browsing collaborator would
/// report it, reduced to what this core needs to merge into the
/// registry.
#[derive(Debug, Clone)]
pub struct DiscoveredService {
    /// Raw service instance name (`{MAC}@{device name}` for RAOP).
    pub instance_name: String,
    /// IPv4 endpoint, if resolved over that family.
    pub addr_v4: Option<(Ipv4Addr, u16)>,
    /// IPv6 endpoint, if resolved over that family.
    pub addr_v6: Option<(Ipv6Addr, u16)>,
    /// Raw TXT records (`key=value` strings, as advertised).
    pub txt_records: Vec<String>,
}

/// Turn a [`DiscoveredService`] into the [`OutputDevice`] shape the
/// registry's `device_add` expects. The stable id is the MAC-address
/// prefix of the RAOP instance name; services whose name doesn't parse
/// are not representable here and return `None`.
#[must_use]
pub fn to_output_device(service: &DiscoveredService) -> Option<OutputDevice> {
    let (mac, name) = raop::parse_raop_service_name(&service.instance_name)?;
    let id = u64::from_str_radix(&mac, 16).ok()?;

    let txt = parser::parse_txt_records(&service.txt_records);
    let requires_auth = txt
        .get(parser::txt_keys::PASSWORD)
        .is_some_and(|v| v == "true")
        || txt.get(parser::txt_keys::PIN).is_some_and(|v| v == "true");

    Some(OutputDevice {
        id,
        name,
        kind: DeviceKind::Raop,
        addr_v4: service.addr_v4,
        addr_v6: service.addr_v6,
        password: None,
        auth_key: None,
        max_volume: 100,
        volume: 100,
        relative_volume: 0,
        selected: false,
        advertised: true,
        requires_auth,
        quality: MediaQuality::default(),
        state: DeviceState::None,
    })
}
