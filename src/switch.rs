//! Controller-wide switch model and the registry holding it.
//!
//! Switches are never removed from the registry: a reconnecting datapath gets back
//! the same `Arc<Switch>` with its interfaces and flows, only the connection changes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::flow::{Flow, FlowId};
use crate::interface::{Interface, InterfaceChange, PortDescription, PortNo};
use crate::message::DescStats;
use crate::ofp_header::Xid;
use crate::ofp_utils::{lock, read_lock, write_lock};
use crate::openflow0x01;
use crate::openflow0x04;
use crate::stats::{FlowStats, PortStats};

/// Datapath identifier.
pub type Dpid = u64;

/// Features snapshot from the last Features-Reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwitchFeatures {
    V0x01(openflow0x01::SwitchFeatures),
    V0x04(openflow0x04::SwitchFeatures),
}

impl SwitchFeatures {
    pub fn datapath_id(&self) -> Dpid {
        match *self {
            SwitchFeatures::V0x01(ref f) => f.datapath_id,
            SwitchFeatures::V0x04(ref f) => f.datapath_id,
        }
    }

    pub fn num_tables(&self) -> u8 {
        match *self {
            SwitchFeatures::V0x01(ref f) => f.num_tables,
            SwitchFeatures::V0x04(ref f) => f.num_tables,
        }
    }

    pub fn num_buffers(&self) -> u32 {
        match *self {
            SwitchFeatures::V0x01(ref f) => f.num_buffers,
            SwitchFeatures::V0x04(ref f) => f.num_buffers,
        }
    }
}

/// Periodic statistics requests a switch may have outstanding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatsKind {
    Flow,
    Port,
}

/// Result of inserting or refreshing an interface.
#[derive(Clone, Debug)]
pub struct InterfaceUpsert {
    pub interface: Arc<Interface>,
    pub created: bool,
    pub change: InterfaceChange,
}

struct SwitchInner {
    connection: Option<Arc<ConnectionHandle>>,
    interfaces: BTreeMap<PortNo, Arc<Interface>>,
    flows: HashMap<FlowId, Flow>,
    flow_stats: Vec<FlowStats>,
    port_stats: BTreeMap<PortNo, PortStats>,
    features: Option<SwitchFeatures>,
    description: Option<DescStats>,
    last_seen: Option<Instant>,
    outstanding: HashMap<StatsKind, Xid>,
}

pub struct Switch {
    dpid: Dpid,
    inner: Mutex<SwitchInner>,
}

impl Switch {
    pub fn new(dpid: Dpid) -> Switch {
        Switch {
            dpid,
            inner: Mutex::new(SwitchInner {
                connection: None,
                interfaces: BTreeMap::new(),
                flows: HashMap::new(),
                flow_stats: vec![],
                port_stats: BTreeMap::new(),
                features: None,
                description: None,
                last_seen: None,
                outstanding: HashMap::new(),
            }),
        }
    }

    pub fn dpid(&self) -> Dpid {
        self.dpid
    }

    pub fn connection(&self) -> Option<Arc<ConnectionHandle>> {
        lock(&self.inner).connection.clone()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.inner).connection.is_some()
    }

    /// Negotiated version of the current connection.
    pub fn version(&self) -> Option<u8> {
        lock(&self.inner).connection.as_ref().and_then(|c| c.version())
    }

    /// Make `handle` the switch's connection. Returns the connection it replaced, if
    /// that was a different one.
    pub fn attach(&self, handle: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>> {
        let mut inner = lock(&self.inner);
        inner.outstanding.clear();
        match inner.connection.replace(handle.clone()) {
            Some(ref old) if old.id() == handle.id() => None,
            old => old,
        }
    }

    /// Clear the connection reference if it still points at `id`.
    pub fn detach(&self, id: ConnectionId) -> bool {
        let mut inner = lock(&self.inner);
        match inner.connection {
            Some(ref current) if current.id() == id => {
                inner.connection = None;
                inner.outstanding.clear();
                true
            }
            _ => false,
        }
    }

    pub fn touch(&self, now: Instant) {
        lock(&self.inner).last_seen = Some(now);
    }

    pub fn last_seen(&self) -> Option<Instant> {
        lock(&self.inner).last_seen
    }

    pub fn features(&self) -> Option<SwitchFeatures> {
        lock(&self.inner).features.clone()
    }

    pub fn set_features(&self, features: SwitchFeatures) {
        lock(&self.inner).features = Some(features);
    }

    pub fn description(&self) -> Option<DescStats> {
        lock(&self.inner).description.clone()
    }

    pub fn set_description(&self, description: DescStats) {
        lock(&self.inner).description = Some(description);
    }

    /// Interfaces ordered by port number, inactive ones included.
    pub fn interfaces(&self) -> Vec<Arc<Interface>> {
        lock(&self.inner).interfaces.values().cloned().collect()
    }

    pub fn interface(&self, port_no: PortNo) -> Option<Arc<Interface>> {
        lock(&self.inner).interfaces.get(&port_no).cloned()
    }

    /// Update the interface of `desc.port_no` in place, creating it if the port is new.
    pub fn upsert_interface(&self, desc: &PortDescription) -> InterfaceUpsert {
        let mut inner = lock(&self.inner);
        if let Some(existing) = inner.interfaces.get(&desc.port_no) {
            let change = existing.update(desc);
            return InterfaceUpsert { interface: existing.clone(), created: false, change };
        }
        let interface = Arc::new(Interface::new(self.dpid, desc));
        inner.interfaces.insert(desc.port_no, interface.clone());
        InterfaceUpsert {
            interface,
            created: true,
            change: InterfaceChange { reactivated: true, link: None, modified: true },
        }
    }

    /// Mark a port removed. The interface stays registered under its port number.
    pub fn deactivate_interface(&self, port_no: PortNo) -> Option<Arc<Interface>> {
        let inner = lock(&self.inner);
        let interface = inner.interfaces.get(&port_no)?;
        interface.deactivate();
        Some(interface.clone())
    }

    pub fn flows(&self) -> Vec<Flow> {
        lock(&self.inner).flows.values().cloned().collect()
    }

    pub fn flow(&self, id: &FlowId) -> Option<Flow> {
        lock(&self.inner).flows.get(id).cloned()
    }

    /// Insert `flow` under its id, superseding an equal-id flow.
    pub fn insert_flow(&self, flow: Flow) -> FlowId {
        let id = flow.id();
        lock(&self.inner).flows.insert(id.clone(), flow);
        id
    }

    pub fn remove_flow(&self, id: &FlowId) -> Option<Flow> {
        lock(&self.inner).flows.remove(id)
    }

    /// Remove every flow for which `predicate` holds.
    pub fn remove_flows_where<F>(&self, predicate: F) -> Vec<Flow>
        where F: Fn(&Flow) -> bool
    {
        let mut inner = lock(&self.inner);
        let ids: Vec<FlowId> = inner
            .flows
            .iter()
            .filter(|&(_, flow)| predicate(flow))
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| inner.flows.remove(id)).collect()
    }

    /// Replace the flow table and its counters with a complete statistics reply.
    pub fn replace_flow_stats(&self, stats: Vec<FlowStats>) {
        let mut inner = lock(&self.inner);
        inner.flows = stats.iter().map(|s| (s.flow.id(), s.flow.clone())).collect();
        inner.flow_stats = stats;
    }

    pub fn flow_stats(&self) -> Vec<FlowStats> {
        lock(&self.inner).flow_stats.clone()
    }

    pub fn replace_port_stats(&self, stats: Vec<PortStats>) {
        lock(&self.inner).port_stats = stats.into_iter().map(|s| (s.port_no, s)).collect();
    }

    pub fn port_stats(&self) -> Vec<PortStats> {
        lock(&self.inner).port_stats.values().cloned().collect()
    }

    pub fn record_request(&self, kind: StatsKind, xid: Xid) {
        lock(&self.inner).outstanding.insert(kind, xid);
    }

    /// Forget the outstanding request `xid` of `kind`, if it is the latest one.
    /// Returns whether it was.
    pub fn complete_request(&self, kind: StatsKind, xid: Xid) -> bool {
        let mut inner = lock(&self.inner);
        if inner.outstanding.get(&kind) == Some(&xid) {
            inner.outstanding.remove(&kind);
            true
        } else {
            false
        }
    }

    pub fn outstanding_request(&self, kind: StatsKind) -> Option<Xid> {
        lock(&self.inner).outstanding.get(&kind).cloned()
    }
}

impl fmt::Debug for Switch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Switch")
            .field("dpid", &format_args!("{:016x}", self.dpid))
            .field("connection", &inner.connection.as_ref().map(|c| c.id()))
            .field("interfaces", &inner.interfaces.len())
            .field("flows", &inner.flows.len())
            .finish()
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016x}", self.dpid)
    }
}

/// Every switch ever seen, by dpid.
#[derive(Default)]
pub struct SwitchRegistry {
    switches: RwLock<HashMap<Dpid, Arc<Switch>>>,
}

impl SwitchRegistry {
    pub fn new() -> SwitchRegistry {
        SwitchRegistry::default()
    }

    pub fn get(&self, dpid: Dpid) -> Option<Arc<Switch>> {
        read_lock(&self.switches).get(&dpid).cloned()
    }

    /// The switch of `dpid`, and whether it was just created.
    pub fn get_or_create(&self, dpid: Dpid) -> (Arc<Switch>, bool) {
        if let Some(switch) = self.get(dpid) {
            return (switch, false);
        }
        let mut switches = write_lock(&self.switches);
        if let Some(switch) = switches.get(&dpid) {
            return (switch.clone(), false);
        }
        let switch = Arc::new(Switch::new(dpid));
        switches.insert(dpid, switch.clone());
        (switch, true)
    }

    /// All switches ordered by dpid.
    pub fn all(&self) -> Vec<Arc<Switch>> {
        let mut switches: Vec<Arc<Switch>> = read_lock(&self.switches).values().cloned().collect();
        switches.sort_by_key(|s| s.dpid());
        switches
    }

    pub fn connected(&self) -> Vec<Arc<Switch>> {
        self.all().into_iter().filter(|s| s.is_connected()).collect()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.switches).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
