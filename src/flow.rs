//! Forwarding rules installed on a switch, one representation per protocol version.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::message::{FlowModCmd, Message, Timeout};
use crate::ofp_header::{OPENFLOW_0_01_VERSION, OPENFLOW_0_04_VERSION};
use crate::openflow0x01;
use crate::openflow0x04;
use crate::switch::Dpid;

/// Mid-range of the 16 bit priority space.
pub const DEFAULT_PRIORITY: u16 = 0x8000;

const FLOW_ID_BYTES: usize = 16;

/// Stable identifier of a flow: a digest of the switch, the match, the table, the
/// priority and the cookie. Equal inputs give equal ids across restarts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(String);

impl FlowId {
    pub fn compute(version: u8, dpid: Dpid, table_id: u8, priority: u16, cookie: u64,
                   match_bytes: &[u8]) -> FlowId {
        let mut hasher = Sha256::new();
        hasher.update([version]);
        hasher.update(dpid.to_be_bytes());
        hasher.update([table_id]);
        hasher.update(priority.to_be_bytes());
        hasher.update(cookie.to_be_bytes());
        hasher.update((match_bytes.len() as u32).to_be_bytes());
        hasher.update(match_bytes);
        let digest = hasher.finalize();
        FlowId(digest[..FLOW_ID_BYTES].iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire form of the match, hashed into the flow id. Falls back to the debug form if
/// the match cannot be encoded.
fn pattern_bytes(pattern: &openflow0x01::Pattern) -> Vec<u8> {
    let mut bytes = vec![];
    match openflow0x01::Pattern::marshal(pattern, &mut bytes) {
        Ok(()) => bytes,
        Err(e) => {
            error!("Cannot encode match {:?} for its flow id: {}", pattern, e);
            format!("{:?}", pattern).into_bytes()
        }
    }
}

fn match_bytes(pattern: &openflow0x04::Match) -> Vec<u8> {
    let mut bytes = vec![];
    match openflow0x04::Match::marshal(pattern, &mut bytes) {
        Ok(()) => bytes,
        Err(e) => {
            error!("Cannot encode match {:?} for its flow id: {}", pattern, e);
            format!("{:?}", pattern).into_bytes()
        }
    }
}

/// An OpenFlow 1.0 flow entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flow0x01 {
    pub dpid: Dpid,
    pub table_id: u8,
    pub priority: u16,
    pub cookie: u64,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub pattern: openflow0x01::Pattern,
    pub actions: Vec<openflow0x01::Action>,
}

impl Flow0x01 {
    pub fn new(dpid: Dpid, pattern: openflow0x01::Pattern, actions: Vec<openflow0x01::Action>)
               -> Flow0x01 {
        Flow0x01 {
            dpid,
            table_id: 0,
            priority: DEFAULT_PRIORITY,
            cookie: 0,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            pattern,
            actions,
        }
    }

    pub fn from_stats(dpid: Dpid, stats: &openflow0x01::FlowStats) -> Flow0x01 {
        Flow0x01 {
            dpid,
            table_id: stats.table_id,
            priority: stats.priority,
            cookie: stats.cookie,
            idle_timeout: stats.idle_timeout,
            hard_timeout: stats.hard_timeout,
            pattern: stats.pattern.clone(),
            actions: stats.actions.clone(),
        }
    }

    pub fn id(&self) -> FlowId {
        FlowId::compute(OPENFLOW_0_01_VERSION, self.dpid, self.table_id, self.priority,
                        self.cookie, &pattern_bytes(&self.pattern))
    }

    /// 1.0 removal notices carry no table id, so they are matched on the other
    /// defining fields.
    pub fn is_removed_by(&self, removed: &openflow0x01::FlowRemoved) -> bool {
        self.pattern == removed.pattern
            && self.priority == removed.priority
            && self.cookie == removed.cookie
    }

    pub fn to_flow_mod(&self, command: FlowModCmd) -> openflow0x01::FlowMod {
        openflow0x01::FlowMod {
            command,
            pattern: self.pattern.clone(),
            priority: self.priority,
            actions: if command.is_delete() { vec![] } else { self.actions.clone() },
            cookie: self.cookie,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            notify_when_removed: true,
            apply_to_packet: None,
            out_port: None,
            check_overlap: false,
            emergency: false,
        }
    }
}

/// An OpenFlow 1.3 flow entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flow0x04 {
    pub dpid: Dpid,
    pub table_id: u8,
    pub priority: u16,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub pattern: openflow0x04::Match,
    pub instructions: Vec<openflow0x04::Instruction>,
}

impl Flow0x04 {
    pub fn new(dpid: Dpid, pattern: openflow0x04::Match,
               instructions: Vec<openflow0x04::Instruction>) -> Flow0x04 {
        Flow0x04 {
            dpid,
            table_id: 0,
            priority: DEFAULT_PRIORITY,
            cookie: 0,
            cookie_mask: 0,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            pattern,
            instructions,
        }
    }

    pub fn from_stats(dpid: Dpid, stats: &openflow0x04::FlowStats) -> Flow0x04 {
        Flow0x04 {
            dpid,
            table_id: stats.table_id,
            priority: stats.priority,
            cookie: stats.cookie,
            cookie_mask: 0,
            idle_timeout: stats.idle_timeout,
            hard_timeout: stats.hard_timeout,
            pattern: stats.pattern.clone(),
            instructions: stats.instructions.clone(),
        }
    }

    pub fn id(&self) -> FlowId {
        Flow0x04::id_of(self.dpid, self.table_id, self.priority, self.cookie, &self.pattern)
    }

    pub fn id_of(dpid: Dpid, table_id: u8, priority: u16, cookie: u64,
                 pattern: &openflow0x04::Match) -> FlowId {
        FlowId::compute(OPENFLOW_0_04_VERSION, dpid, table_id, priority, cookie,
                        &match_bytes(pattern))
    }

    /// Id of the flow a removal notice refers to.
    pub fn removed_id(dpid: Dpid, removed: &openflow0x04::FlowRemoved) -> FlowId {
        Flow0x04::id_of(dpid, removed.table_id, removed.priority, removed.cookie, &removed.pattern)
    }

    pub fn to_flow_mod(&self, command: FlowModCmd) -> openflow0x04::FlowMod {
        openflow0x04::FlowMod {
            cookie: self.cookie,
            cookie_mask: self.cookie_mask,
            table_id: self.table_id,
            command,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            priority: self.priority,
            apply_to_packet: None,
            out_port: None,
            out_group: openflow0x04::ANY_GROUP,
            notify_when_removed: true,
            check_overlap: false,
            reset_counts: false,
            pattern: self.pattern.clone(),
            instructions: if command.is_delete() { vec![] } else { self.instructions.clone() },
        }
    }
}

/// A flow entry of either protocol version. Immutable: changes produce a new value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    V0x01(Flow0x01),
    V0x04(Flow0x04),
}

impl Flow {
    pub fn id(&self) -> FlowId {
        match *self {
            Flow::V0x01(ref f) => f.id(),
            Flow::V0x04(ref f) => f.id(),
        }
    }

    pub fn version(&self) -> u8 {
        match *self {
            Flow::V0x01(_) => OPENFLOW_0_01_VERSION,
            Flow::V0x04(_) => OPENFLOW_0_04_VERSION,
        }
    }

    pub fn dpid(&self) -> Dpid {
        match *self {
            Flow::V0x01(ref f) => f.dpid,
            Flow::V0x04(ref f) => f.dpid,
        }
    }

    pub fn table_id(&self) -> u8 {
        match *self {
            Flow::V0x01(ref f) => f.table_id,
            Flow::V0x04(ref f) => f.table_id,
        }
    }

    pub fn priority(&self) -> u16 {
        match *self {
            Flow::V0x01(ref f) => f.priority,
            Flow::V0x04(ref f) => f.priority,
        }
    }

    pub fn cookie(&self) -> u64 {
        match *self {
            Flow::V0x01(ref f) => f.cookie,
            Flow::V0x04(ref f) => f.cookie,
        }
    }

    /// The flow-mod installing (or modifying, or deleting) this flow.
    pub fn to_message(&self, command: FlowModCmd) -> Message {
        match *self {
            Flow::V0x01(ref f) => Message::V0x01(openflow0x01::Message::FlowMod(f.to_flow_mod(command))),
            Flow::V0x04(ref f) => Message::V0x04(openflow0x04::Message::FlowMod(f.to_flow_mod(command))),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "flow {} on {:016x} (table {}, priority {}, cookie {:#x})",
               self.id(), self.dpid(), self.table_id(), self.priority(), self.cookie())
    }
}
