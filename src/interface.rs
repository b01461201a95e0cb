//! Switch ports as seen by the rest of the controller.
//!
//! An `Interface` is created the first time a port is reported and then only ever
//! updated in place, so a handle taken before a port goes away still refers to the
//! same object after it comes back.

use std::fmt;
use std::sync::Mutex;

use crate::ofp_utils::{format_mac, lock, MacAddr};
use crate::openflow0x01;
use crate::openflow0x04;
use crate::switch::Dpid;

pub type PortNo = u32;

/// Version-independent description of a port, as carried by features replies, port
/// descriptions and port status messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDescription {
    pub port_no: PortNo,
    pub name: String,
    pub hw_addr: MacAddr,
    /// Bits per second.
    pub speed: Option<u64>,
    pub admin_down: bool,
    pub link_down: bool,
    pub no_forward: bool,
}

impl<'a> From<&'a openflow0x01::PortDesc> for PortDescription {
    fn from(desc: &openflow0x01::PortDesc) -> PortDescription {
        PortDescription {
            port_no: desc.port_no as PortNo,
            name: desc.name.clone(),
            hw_addr: desc.hw_addr,
            speed: openflow0x01::PortFeatures::speed_bps(&desc.curr),
            admin_down: desc.config.down,
            link_down: desc.state.down,
            no_forward: desc.config.no_fwd || desc.state.down,
        }
    }
}

impl<'a> From<&'a openflow0x04::PortDesc> for PortDescription {
    fn from(desc: &openflow0x04::PortDesc) -> PortDescription {
        PortDescription {
            port_no: desc.port_no,
            name: desc.name.clone(),
            hw_addr: desc.hw_addr,
            speed: desc.speed_bps(),
            admin_down: desc.config.port_down,
            link_down: desc.state.link_down,
            no_forward: desc.config.no_fwd || desc.state.link_down,
        }
    }
}

/// Mutable attributes of an interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceState {
    pub name: String,
    pub hw_addr: MacAddr,
    pub speed: Option<u64>,
    pub admin_down: bool,
    pub link_up: bool,
    /// Set when the switch reports the link down or the port refuses to forward.
    pub no_forward: bool,
    pub active: bool,
}

/// What an update did to an interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InterfaceChange {
    /// The interface was inactive (or new) before the update.
    pub reactivated: bool,
    /// `Some(up)` when the link state flipped.
    pub link: Option<bool>,
    /// Any attribute changed.
    pub modified: bool,
}

pub struct Interface {
    dpid: Dpid,
    port_no: PortNo,
    state: Mutex<InterfaceState>,
}

impl Interface {
    pub fn new(dpid: Dpid, desc: &PortDescription) -> Interface {
        Interface {
            dpid,
            port_no: desc.port_no,
            state: Mutex::new(InterfaceState {
                name: desc.name.clone(),
                hw_addr: desc.hw_addr,
                speed: desc.speed,
                admin_down: desc.admin_down,
                link_up: !desc.link_down,
                no_forward: desc.no_forward,
                active: true,
            }),
        }
    }

    pub fn dpid(&self) -> Dpid {
        self.dpid
    }

    pub fn port_no(&self) -> PortNo {
        self.port_no
    }

    /// Copy of the current attributes.
    pub fn state(&self) -> InterfaceState {
        lock(&self.state).clone()
    }

    pub fn name(&self) -> String {
        lock(&self.state).name.clone()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).active
    }

    pub fn is_link_up(&self) -> bool {
        lock(&self.state).link_up
    }

    pub fn no_forward(&self) -> bool {
        lock(&self.state).no_forward
    }

    pub fn speed(&self) -> Option<u64> {
        lock(&self.state).speed
    }

    /// Overwrite the attributes with a fresh description and mark the interface active.
    /// The port number never changes.
    pub fn update(&self, desc: &PortDescription) -> InterfaceChange {
        let mut state = lock(&self.state);
        let before = state.clone();
        state.name = desc.name.clone();
        state.hw_addr = desc.hw_addr;
        state.speed = desc.speed;
        state.admin_down = desc.admin_down;
        state.link_up = !desc.link_down;
        state.no_forward = desc.no_forward;
        state.active = true;
        InterfaceChange {
            reactivated: !before.active,
            link: if before.link_up != state.link_up { Some(state.link_up) } else { None },
            modified: before != *state,
        }
    }

    /// Mark the port as removed. Returns whether it was active.
    pub fn deactivate(&self) -> bool {
        let mut state = lock(&self.state);
        let was_active = state.active;
        state.active = false;
        state.link_up = false;
        was_active
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Interface")
            .field("dpid", &format_args!("{:016x}", self.dpid))
            .field("port_no", &self.port_no)
            .field("name", &state.name)
            .field("active", &state.active)
            .finish()
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = lock(&self.state);
        write!(f, "{:016x}:{} ({}, {})", self.dpid, self.port_no, state.name, format_mac(&state.hw_addr))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn description(port_no: PortNo) -> PortDescription {
        PortDescription {
            port_no,
            name: format!("eth{}", port_no),
            hw_addr: [0, 0x1b, 0x21, 0, 0, port_no as u8],
            speed: Some(1_000_000_000),
            admin_down: false,
            link_down: false,
            no_forward: false,
        }
    }

    #[test]
    fn test_update_reports_link_changes() {
        let iface = Interface::new(1, &description(3));
        assert!(iface.is_link_up());

        let down = PortDescription { link_down: true, no_forward: true, ..description(3) };
        let change = iface.update(&down);
        assert_eq!(change, InterfaceChange { reactivated: false, link: Some(false), modified: true });
        assert!(iface.no_forward());

        let change = iface.update(&down);
        assert_eq!(change, InterfaceChange { reactivated: false, link: None, modified: false });
    }

    #[test]
    fn test_deactivate_keeps_port_number() {
        let iface = Interface::new(1, &description(7));
        assert!(iface.deactivate());
        assert!(!iface.deactivate());
        assert_eq!(iface.port_no(), 7);
        assert!(!iface.is_active());

        let change = iface.update(&description(7));
        assert!(change.reactivated);
        assert!(iface.is_active());
    }

    #[test]
    fn test_description_from_1_0_port() {
        let mut desc = openflow0x01::tests::port_desc(2);
        desc.state.down = true;
        let converted = PortDescription::from(&desc);
        assert_eq!(converted.port_no, 2);
        assert!(converted.link_down);
        assert!(converted.no_forward);
    }

    #[test]
    fn test_description_from_1_3_port_uses_curr_speed() {
        let desc = openflow0x04::PortDesc {
            port_no: 9,
            hw_addr: [1, 2, 3, 4, 5, 6],
            name: "s1-eth9".to_string(),
            config: openflow0x04::PortConfig { no_fwd: true, ..Default::default() },
            state: openflow0x04::PortState { link_down: false, blocked: false, live: true },
            curr: 0,
            advertised: 0,
            supported: 0,
            peer: 0,
            curr_speed: 10_000_000,
            max_speed: 10_000_000,
        };
        let converted = PortDescription::from(&desc);
        assert_eq!(converted.speed, Some(10_000_000_000));
        assert!(converted.no_forward);
        assert!(!converted.link_down);
    }
}
