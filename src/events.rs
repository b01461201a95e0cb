//! Domain events published by the protocol core, and an in-process bus delivering
//! them to controller apps and stream subscribers.

use std::fmt;
use std::sync::{Arc, Mutex};

use futures::channel::mpsc;

use crate::connection::{CloseReason, ConnectionId};
use crate::flow::Flow;
use crate::interface::Interface;
use crate::message::{FlowRemovedReason, Payload};
use crate::ofp_utils::lock;
use crate::stats::{FlowStats, PortStats};
use crate::switch::{Dpid, Switch};

/// Packet sent to the controller, in version-independent form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketInInfo {
    pub in_port: Option<u32>,
    pub table_id: Option<u8>,
    pub total_len: u16,
    pub payload: Payload,
}

#[derive(Clone, Debug)]
pub enum ControllerEvent {
    HandshakeCompleted {
        switch: Arc<Switch>,
    },
    InterfaceCreated {
        interface: Arc<Interface>,
    },
    InterfaceUpdated {
        interface: Arc<Interface>,
    },
    /// The port was removed; the interface is deactivated, not dropped.
    InterfaceDeleted {
        interface: Arc<Interface>,
    },
    InterfaceLinkUp {
        interface: Arc<Interface>,
    },
    InterfaceLinkDown {
        interface: Arc<Interface>,
    },
    /// Every port of a port description, or of a 1.0 Features-Reply, at once.
    InterfacesCreated {
        switch: Arc<Switch>,
        interfaces: Vec<Arc<Interface>>,
    },
    FlowStatsReceived {
        switch: Arc<Switch>,
        stats: Vec<FlowStats>,
    },
    PortStatsReceived {
        switch: Arc<Switch>,
        stats: Vec<PortStats>,
    },
    FlowRemoved {
        switch: Arc<Switch>,
        flow: Option<Flow>,
        reason: FlowRemovedReason,
    },
    PacketIn {
        switch: Arc<Switch>,
        packet: PacketInInfo,
    },
    ConnectionLost {
        connection: ConnectionId,
        dpid: Option<Dpid>,
        reason: CloseReason,
    },
}

impl ControllerEvent {
    pub fn name(&self) -> &'static str {
        match *self {
            ControllerEvent::HandshakeCompleted { .. } => "switch.handshake_completed",
            ControllerEvent::InterfaceCreated { .. } => "switch.interface.created",
            ControllerEvent::InterfaceUpdated { .. } => "switch.interface.updated",
            ControllerEvent::InterfaceDeleted { .. } => "switch.interface.deleted",
            ControllerEvent::InterfaceLinkUp { .. } => "switch.interface.link_up",
            ControllerEvent::InterfaceLinkDown { .. } => "switch.interface.link_down",
            ControllerEvent::InterfacesCreated { .. } => "switch.interfaces.created",
            ControllerEvent::FlowStatsReceived { .. } => "flow_stats.received",
            ControllerEvent::PortStatsReceived { .. } => "port_stats.received",
            ControllerEvent::FlowRemoved { .. } => "flow.removed",
            ControllerEvent::PacketIn { .. } => "switch.packet_in",
            ControllerEvent::ConnectionLost { .. } => "connection.lost",
        }
    }

    /// The switch the event is about, if known.
    pub fn dpid(&self) -> Option<Dpid> {
        match *self {
            ControllerEvent::HandshakeCompleted { ref switch }
            | ControllerEvent::InterfacesCreated { ref switch, .. }
            | ControllerEvent::FlowStatsReceived { ref switch, .. }
            | ControllerEvent::PortStatsReceived { ref switch, .. }
            | ControllerEvent::FlowRemoved { ref switch, .. }
            | ControllerEvent::PacketIn { ref switch, .. } => Some(switch.dpid()),
            ControllerEvent::InterfaceCreated { ref interface }
            | ControllerEvent::InterfaceUpdated { ref interface }
            | ControllerEvent::InterfaceDeleted { ref interface }
            | ControllerEvent::InterfaceLinkUp { ref interface }
            | ControllerEvent::InterfaceLinkDown { ref interface } => Some(interface.dpid()),
            ControllerEvent::ConnectionLost { dpid, .. } => dpid,
        }
    }
}

impl fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.dpid() {
            Some(dpid) => write!(f, "{} ({:016x})", self.name(), dpid),
            None => f.write_str(self.name()),
        }
    }
}

/// Where the core publishes its events.
pub trait EventEmitter: Send + Sync {
    fn publish(&self, event: ControllerEvent);
}

/// Something reacting to controller events.
pub trait ControllerApp: Send {
    fn name(&self) -> &str;

    /// Called once when the controller starts.
    fn start(&mut self) {}

    fn event(&mut self, event: Arc<ControllerEvent>);
}

/// In-process event bus: apps are called in registration order, then every live
/// subscriber stream receives the event.
#[derive(Default)]
pub struct EventBus {
    apps: Mutex<Vec<Box<dyn ControllerApp>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Arc<ControllerEvent>>>>,
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus::default()
    }

    pub fn register_app(&self, app: Box<dyn ControllerApp>) {
        info!("Registering app {}", app.name());
        lock(&self.apps).push(app);
    }

    pub fn start_apps(&self) {
        for app in lock(&self.apps).iter_mut() {
            debug!("Starting app {}", app.name());
            app.start();
        }
    }

    /// A stream of every event published from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Arc<ControllerEvent>> {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.subscribers).push(tx);
        rx
    }
}

impl EventEmitter for EventBus {
    fn publish(&self, event: ControllerEvent) {
        trace!("Publishing {}", event);
        let event = Arc::new(event);
        for app in lock(&self.apps).iter_mut() {
            app.event(event.clone());
        }
        lock(&self.subscribers).retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Keeps every published event.
    #[derive(Default)]
    pub struct RecordingEmitter {
        events: Mutex<Vec<ControllerEvent>>,
    }

    impl RecordingEmitter {
        pub fn events(&self) -> Vec<ControllerEvent> {
            lock(&self.events).clone()
        }

        pub fn names(&self) -> Vec<&'static str> {
            lock(&self.events).iter().map(|e| e.name()).collect()
        }
    }

    impl EventEmitter for RecordingEmitter {
        fn publish(&self, event: ControllerEvent) {
            lock(&self.events).push(event);
        }
    }

    struct CountingApp {
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ControllerApp for CountingApp {
        fn name(&self) -> &str {
            "counting"
        }

        fn event(&mut self, event: Arc<ControllerEvent>) {
            lock(&self.seen).push(event.name());
        }
    }

    fn lost() -> ControllerEvent {
        ControllerEvent::ConnectionLost {
            connection: ConnectionId(3),
            dpid: Some(0xa),
            reason: CloseReason::Eof,
        }
    }

    #[test]
    fn test_bus_delivers_to_apps_and_subscribers() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(vec![]));
        bus.register_app(Box::new(CountingApp { seen: seen.clone() }));
        let mut rx = bus.subscribe();

        bus.publish(lost());

        assert_eq!(*lock(&seen), vec!["connection.lost"]);
        let received = rx.try_next().unwrap().unwrap();
        assert_eq!(received.dpid(), Some(0xa));
    }

    #[test]
    fn test_dropped_subscribers_are_forgotten() {
        let bus = EventBus::new();
        drop(bus.subscribe());
        bus.publish(lost());
        assert!(lock(&bus.subscribers).is_empty());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(lost().to_string(), "connection.lost (000000000000000a)");
    }
}
