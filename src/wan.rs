// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

//! WAN connection status as reported over UPnP IGD.
//!
//! There is no link-state tracking here: an interface is reported as
//! connected when it has an IPv4 address and disconnected otherwise.

use std::fmt;
use std::net::Ipv4Addr;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// `ConnectionStatus` values of a WANIPConnection service.
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ConnectionStatus {
    Unconfigured = 0,
    Connecting = 1,
    Connected = 2,
    PendingDisconnect = 3,
    Disconnecting = 4,
    Disconnected = 5,
}

impl ConnectionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionStatus::Unconfigured => "Unconfigured",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::PendingDisconnect => "PendingDisconnect",
            ConnectionStatus::Disconnecting => "Disconnecting",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that can tell whether a network interface has an address.
pub trait AddressProbe {
    fn has_address(&self, ifname: &str) -> bool;
}

impl<F: Fn(&str) -> bool> AddressProbe for F {
    fn has_address(&self, ifname: &str) -> bool {
        self(ifname)
    }
}

/// Connection status of `ifname`.
pub fn wan_connection_status<P: AddressProbe + ?Sized>(probe: &P, ifname: &str) -> ConnectionStatus {
    if probe.has_address(ifname) {
        ConnectionStatus::Connected
    } else {
        ConnectionStatus::Disconnected
    }
}

/// [`AddressProbe`] using the system interface list.
#[cfg(unix)]
#[derive(Copy, Clone, Debug, Default)]
pub struct InterfaceAddresses;

#[cfg(unix)]
impl InterfaceAddresses {
    /// First IPv4 address assigned to `ifname`, if any.
    pub fn ipv4_address(&self, ifname: &str) -> Option<Ipv4Addr> {
        use std::ffi::CStr;

        let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
        if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
            log::debug!("getifaddrs failed: {}", std::io::Error::last_os_error());
            return None;
        }

        let mut found = None;
        let mut cur = ifap;
        while !cur.is_null() {
            let ifa = unsafe { &*cur };
            cur = ifa.ifa_next;
            if ifa.ifa_name.is_null() || ifa.ifa_addr.is_null() {
                continue;
            }
            let name = unsafe { CStr::from_ptr(ifa.ifa_name) };
            if name.to_bytes() != ifname.as_bytes() {
                continue;
            }
            if unsafe { (*ifa.ifa_addr).sa_family } as libc::c_int != libc::AF_INET {
                continue;
            }
            let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
            found = Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
            break;
        }

        unsafe { libc::freeifaddrs(ifap) };
        log::trace!("{ifname}: address {found:?}");
        found
    }
}

#[cfg(unix)]
impl AddressProbe for InterfaceAddresses {
    fn has_address(&self, ifname: &str) -> bool {
        self.ipv4_address(ifname).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_probe() {
        let probe = |ifname: &str| ifname == "eth0";
        assert_eq!(wan_connection_status(&probe, "eth0"), ConnectionStatus::Connected);
        assert_eq!(wan_connection_status(&probe, "ppp0"), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_status_values() {
        assert_eq!(u8::from(ConnectionStatus::Unconfigured), 0);
        assert_eq!(u8::from(ConnectionStatus::Disconnected), 5);
        assert_eq!(ConnectionStatus::try_from(3u8).unwrap(), ConnectionStatus::PendingDisconnect);
        assert!(ConnectionStatus::try_from(6u8).is_err());
        assert_eq!(ConnectionStatus::PendingDisconnect.to_string(), "PendingDisconnect");
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_interface() {
        let probe = InterfaceAddresses;
        assert!(!probe.has_address("no-such-interface0"));
        assert_eq!(
            wan_connection_status(&probe, "no-such-interface0"),
            ConnectionStatus::Disconnected
        );
    }
}
