//! Device identity and network segment types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Identity of the network segment a device is reachable on.
///
/// Two fingerprints are equal when the device sits on the same IPv4 network
/// with the same prefix, regardless of the host part of its address. A
/// device that comes back with a different DHCP lease on the same segment
/// still matches; a device that moved to another segment does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubnetFingerprint {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl SubnetFingerprint {
    /// Build a fingerprint from an interface address and netmask.
    ///
    /// Only the leading run of one bits counts, so a non-contiguous mask is
    /// treated as its longest contiguous prefix.
    pub fn from_interface(address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self::from_prefix(address, u32::from(netmask).leading_ones() as u8)
    }

    /// Build a fingerprint from an address and CIDR prefix length.
    ///
    /// Prefix lengths above 32 are clamped.
    pub fn from_prefix(address: Ipv4Addr, prefix_len: u8) -> Self {
        let prefix_len = prefix_len.min(32);
        let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - u32::from(prefix_len)) };
        Self { network: Ipv4Addr::from(u32::from(address) & mask), prefix_len }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Whether `address` falls inside this segment.
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        Self::from_prefix(address, self.prefix_len) == *self
    }
}

impl fmt::Display for SubnetFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// A device found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Vendor serial number, stable across power cycles
    pub serial: String,

    /// Model name as reported by the device
    pub model: String,

    /// Current IPv4 address
    pub address: Ipv4Addr,

    /// Netmask of the interface the device was discovered on
    pub netmask: Ipv4Addr,
}

impl DeviceDescriptor {
    pub fn new(
        serial: impl Into<String>,
        model: impl Into<String>,
        address: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> Self {
        Self { serial: serial.into(), model: model.into(), address, netmask }
    }

    /// Network segment this descriptor was discovered on.
    pub fn fingerprint(&self) -> SubnetFingerprint {
        SubnetFingerprint::from_interface(self.address, self.netmask)
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.model, self.serial, self.address)
    }
}

/// Handle to an opened device, returned by a successful reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub descriptor: DeviceDescriptor,

    /// Number of times the source has opened a device, starting at 1
    pub generation: u32,
}
