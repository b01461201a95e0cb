//! Per-version handling of messages received from switches.
//!
//! Each protocol version has its own `VersionHandler` working on that version's
//! message type. `dispatch` picks the handler from the message's version tag.

use std::sync::Arc;
use std::time::Instant;

use crate::connection::{CloseReason, ConnectionError, ConnectionHandle};
use crate::events::{ControllerEvent, EventEmitter};
use crate::interface::{PortDescription, PortNo};
use crate::message::{ErrorMsg, Message, PortReason};
use crate::multipart::{ExchangeKey, MultipartAggregator, MultipartExchanges};
use crate::ofp_header::{Xid, OPENFLOW_0_01_VERSION, OPENFLOW_0_04_VERSION};
use crate::openflow::MsgCode;
use crate::switch::{Dpid, StatsKind, Switch, SwitchFeatures, SwitchRegistry};

/// What a handler may touch while processing one message of one connection.
pub struct HandlerContext<'a> {
    pub registry: &'a SwitchRegistry,
    pub events: &'a dyn EventEmitter,
    pub multipart: &'a MultipartExchanges,
    pub connection: &'a Arc<ConnectionHandle>,
    pub now: Instant,
}

impl<'a> HandlerContext<'a> {
    fn reply(&self, xid: Xid, message: Message) {
        if let Err(e) = self.connection.send_with_xid(xid, message) {
            error!("Cannot reply to xid {} on connection {}: {}", xid, self.connection.id(), e);
        }
    }

    fn exchange_key(&self, xid: Xid) -> ExchangeKey {
        (self.connection.id(), xid)
    }
}

pub trait VersionHandler {
    type Message;
    type Features;

    fn wrap(message: Self::Message) -> Message;

    /// Requests sent once right after the handshake, besides the statistics.
    fn handshake_requests() -> Vec<Self::Message>;

    fn stats_request(kind: StatsKind) -> Self::Message;

    /// Take in the Features-Reply completing the handshake. Returns the switch the
    /// connection now belongs to.
    fn on_features(ctx: &HandlerContext, features: Self::Features) -> Arc<Switch>;

    fn handle(ctx: &HandlerContext, switch: &Arc<Switch>, xid: Xid, message: Self::Message);
}

pub fn dispatch(ctx: &HandlerContext, switch: &Arc<Switch>, xid: Xid, message: Message) {
    match message {
        Message::V0x01(m) => openflow0x01::Handler::handle(ctx, switch, xid, m),
        Message::V0x04(m) => openflow0x04::Handler::handle(ctx, switch, xid, m),
    }
}

/// Complete the handshake with a Features-Reply. `None` if `message` is not one.
pub fn handshake_features(ctx: &HandlerContext, message: Message) -> Option<Arc<Switch>> {
    match message {
        Message::V0x01(crate::openflow0x01::Message::FeaturesReply(f)) => {
            Some(openflow0x01::Handler::on_features(ctx, f))
        }
        Message::V0x04(crate::openflow0x04::Message::FeaturesReply(f)) => {
            Some(openflow0x04::Handler::on_features(ctx, f))
        }
        _ => None,
    }
}

pub fn handshake_requests(version: u8) -> Vec<Message> {
    match version {
        OPENFLOW_0_01_VERSION => openflow0x01::Handler::handshake_requests()
            .into_iter()
            .map(openflow0x01::Handler::wrap)
            .collect(),
        OPENFLOW_0_04_VERSION => openflow0x04::Handler::handshake_requests()
            .into_iter()
            .map(openflow0x04::Handler::wrap)
            .collect(),
        _ => vec![],
    }
}

pub fn stats_request(version: u8, kind: StatsKind) -> Option<Message> {
    match version {
        OPENFLOW_0_01_VERSION => Some(openflow0x01::Handler::wrap(openflow0x01::Handler::stats_request(kind))),
        OPENFLOW_0_04_VERSION => Some(openflow0x04::Handler::wrap(openflow0x04::Handler::stats_request(kind))),
        _ => None,
    }
}

/// Send a flow and a port statistics request to `switch`, recording their xids as
/// the outstanding requests.
pub fn request_stats(switch: &Switch) -> Result<(), ConnectionError> {
    let not_connected = || ConnectionError::NotConnected { dpid: switch.dpid() };
    let connection = switch.connection().ok_or_else(not_connected)?;
    let version = connection.version().ok_or_else(not_connected)?;
    for kind in &[StatsKind::Flow, StatsKind::Port] {
        let request = stats_request(version, *kind).ok_or_else(not_connected)?;
        let xid = connection.send(request)?;
        trace!("Requested {:?} stats from {} with xid {}", kind, switch, xid);
        switch.record_request(*kind, xid);
    }
    Ok(())
}

/// Log an Error message from a switch. Returns the close reason to use when it
/// arrives during the handshake.
pub fn log_peer_error(dpid: Option<Dpid>, xid: Xid, version: u8, error: &ErrorMsg) -> CloseReason {
    let type_name = match version {
        OPENFLOW_0_01_VERSION => crate::openflow0x01::error_type_name(error.error_type),
        _ => crate::openflow0x04::error_type_name(error.error_type),
    };
    let switch = dpid.map(|d| format!("{:016x}", d)).unwrap_or_else(|| "(handshake)".to_string());
    error!("Switch {} reported error {} ({}) code {} for xid {}",
           switch, type_name, error.error_type, error.code, xid);
    CloseReason::PeerError { error_type: error.error_type, code: error.code }
}

fn unexpected(switch: &Switch, xid: Xid, version: u8, code: MsgCode) {
    error!("Dropping unexpected {} (version {}) from switch {} xid {}", code, version, switch, xid);
}

/// Get or create the switch, hand it the connection and store the features.
fn attach_switch(ctx: &HandlerContext, features: SwitchFeatures) -> Arc<Switch> {
    let dpid = features.datapath_id();
    let (switch, created) = ctx.registry.get_or_create(dpid);
    if created {
        info!("New switch {} on connection {}", switch, ctx.connection.id());
    } else {
        info!("Switch {} reconnected on connection {}", switch, ctx.connection.id());
    }
    if let Some(old) = switch.attach(ctx.connection.clone()) {
        warn!("Connection {} of switch {} replaced by {}", old.id(), switch, ctx.connection.id());
        old.close(CloseReason::Replaced);
    }
    switch.set_features(features);
    switch.touch(ctx.now);
    switch
}

fn upsert_port(ctx: &HandlerContext, switch: &Switch, desc: &PortDescription) {
    let upsert = switch.upsert_interface(desc);
    let interface = upsert.interface;
    if upsert.created || upsert.change.reactivated {
        debug!("Interface {} created", interface);
        ctx.events.publish(ControllerEvent::InterfaceCreated { interface: interface.clone() });
    } else {
        debug!("Interface {} updated", interface);
        ctx.events.publish(ControllerEvent::InterfaceUpdated { interface: interface.clone() });
    }
    if upsert.created {
        return;
    }
    match upsert.change.link {
        Some(true) => ctx.events.publish(ControllerEvent::InterfaceLinkUp { interface }),
        Some(false) => ctx.events.publish(ControllerEvent::InterfaceLinkDown { interface }),
        None => (),
    }
}

fn delete_port(ctx: &HandlerContext, switch: &Switch, port_no: PortNo) {
    match switch.deactivate_interface(port_no) {
        Some(interface) => {
            debug!("Interface {} deactivated", interface);
            ctx.events.publish(ControllerEvent::InterfaceDeleted { interface });
        }
        None => warn!("Switch {} removed unknown port {}", switch, port_no),
    }
}

fn port_status(ctx: &HandlerContext, switch: &Switch, reason: PortReason, desc: PortDescription) {
    match reason {
        PortReason::PortAdd | PortReason::PortModify => upsert_port(ctx, switch, &desc),
        PortReason::PortDelete => delete_port(ctx, switch, desc.port_no),
    }
}

/// Upsert every described port and announce them with a single event.
fn bulk_ports(ctx: &HandlerContext, switch: &Arc<Switch>, descs: Vec<PortDescription>) {
    let interfaces = descs
        .iter()
        .map(|desc| switch.upsert_interface(desc).interface)
        .collect::<Vec<_>>();
    debug!("Switch {} reported {} ports", switch, interfaces.len());
    ctx.events.publish(ControllerEvent::InterfacesCreated { switch: switch.clone(), interfaces });
}

fn collect<T>(ctx: &HandlerContext, aggregator: &MultipartAggregator<T>, xid: Xid, items: Vec<T>,
              more: bool) -> Option<Vec<T>> {
    aggregator.push(ctx.exchange_key(xid), items, more, ctx.now)
}

/// Statistics replies to the controller's own outstanding request replace the
/// switch's table wholesale. Other replies are only announced.
fn flow_stats(ctx: &HandlerContext, switch: &Arc<Switch>, xid: Xid,
              items: Vec<crate::stats::FlowStats>, more: bool) {
    if let Some(stats) = collect(ctx, &ctx.multipart.flow_stats, xid, items, more) {
        debug!("Switch {} reported {} flows", switch, stats.len());
        if switch.complete_request(StatsKind::Flow, xid) {
            switch.replace_flow_stats(stats.clone());
        } else {
            debug!("Flow stats xid {} from {} answer no request of ours", xid, switch);
        }
        ctx.events.publish(ControllerEvent::FlowStatsReceived { switch: switch.clone(), stats });
    }
}

fn port_stats(ctx: &HandlerContext, switch: &Arc<Switch>, xid: Xid,
              items: Vec<crate::stats::PortStats>, more: bool) {
    if let Some(stats) = collect(ctx, &ctx.multipart.port_stats, xid, items, more) {
        if switch.complete_request(StatsKind::Port, xid) {
            switch.replace_port_stats(stats.clone());
        } else {
            debug!("Port stats xid {} from {} answer no request of ours", xid, switch);
        }
        ctx.events.publish(ControllerEvent::PortStatsReceived { switch: switch.clone(), stats });
    }
}

pub mod openflow0x01 {
    use super::*;

    use crate::events::PacketInInfo;
    use crate::flow::Flow;
    use crate::ofp_message::OfpMessage;
    use crate::openflow0x01::{Message, StatsReq, StatsRespBody, SwitchFeatures as Features};
    use crate::stats::{FlowStats, PortStats};

    pub struct Handler;

    impl VersionHandler for Handler {
        type Message = Message;
        type Features = Features;

        fn wrap(message: Message) -> super::Message {
            super::Message::V0x01(message)
        }

        fn handshake_requests() -> Vec<Message> {
            vec![Message::StatsRequest(StatsReq::desc())]
        }

        fn stats_request(kind: StatsKind) -> Message {
            match kind {
                StatsKind::Flow => Message::StatsRequest(StatsReq::all_flows()),
                StatsKind::Port => Message::StatsRequest(StatsReq::all_ports()),
            }
        }

        fn on_features(ctx: &HandlerContext, features: Features) -> Arc<Switch> {
            let ports: Vec<PortDescription> = features.ports.iter().map(PortDescription::from).collect();
            let switch = attach_switch(ctx, SwitchFeatures::V0x01(features));
            bulk_ports(ctx, &switch, ports);
            switch
        }

        fn handle(ctx: &HandlerContext, switch: &Arc<Switch>, xid: Xid, message: Message) {
            let dpid = switch.dpid();
            match message {
                Message::EchoRequest(data) => {
                    ctx.reply(xid, super::Message::V0x01(Message::EchoReply(data)));
                    switch.touch(ctx.now);
                }
                Message::EchoReply(_) => switch.touch(ctx.now),
                Message::Error(ref err) => {
                    log_peer_error(Some(dpid), xid, OPENFLOW_0_01_VERSION, err);
                }
                Message::FeaturesReply(features) => switch.set_features(SwitchFeatures::V0x01(features)),
                Message::PortStatus(status) => {
                    port_status(ctx, switch, status.reason, PortDescription::from(&status.desc))
                }
                Message::PacketIn(pi) => ctx.events.publish(ControllerEvent::PacketIn {
                    switch: switch.clone(),
                    packet: PacketInInfo {
                        in_port: Some(pi.port as u32),
                        table_id: None,
                        total_len: pi.total_len,
                        payload: pi.input_payload,
                    },
                }),
                Message::FlowRemoved(removed) => {
                    let flows = switch.remove_flows_where(|flow| match *flow {
                        Flow::V0x01(ref f) => f.is_removed_by(&removed),
                        Flow::V0x04(_) => false,
                    });
                    debug!("Switch {} removed {} flow(s): {:?}", switch, flows.len(), removed.reason);
                    let flows: Vec<Option<Flow>> = if flows.is_empty() {
                        vec![None]
                    } else {
                        flows.into_iter().map(Some).collect()
                    };
                    for flow in flows {
                        ctx.events.publish(ControllerEvent::FlowRemoved {
                            switch: switch.clone(),
                            flow,
                            reason: removed.reason,
                        });
                    }
                }
                Message::StatsReply(reply) => {
                    let more = reply.more();
                    match reply.body {
                        StatsRespBody::DescBody(desc) => switch.set_description(desc),
                        StatsRespBody::FlowStatsBody(items) => {
                            let items = items.iter().map(|s| FlowStats::from_0x01(dpid, s)).collect();
                            flow_stats(ctx, switch, xid, items, more)
                        }
                        StatsRespBody::PortBody(items) => {
                            port_stats(ctx, switch, xid, items.iter().map(PortStats::from).collect(), more)
                        }
                        StatsRespBody::Other { stats_type, .. } => {
                            debug!("Ignoring stats reply type {} from {}", stats_type, switch)
                        }
                    }
                }
                Message::GetConfigReply(config) => debug!("Switch {} config {:?}", switch, config),
                Message::BarrierReply => debug!("Barrier reply from {} xid {}", switch, xid),
                other => unexpected(switch, xid, OPENFLOW_0_01_VERSION, Message::msg_code(&other)),
            }
        }
    }
}

pub mod openflow0x04 {
    use super::*;

    use crate::events::PacketInInfo;
    use crate::flow::Flow0x04;
    use crate::ofp_message::OfpMessage;
    use crate::openflow0x04::{Message, MultipartReq, MultipartRespBody, SwitchFeatures as Features};
    use crate::stats::{FlowStats, PortStats};

    pub struct Handler;

    impl VersionHandler for Handler {
        type Message = Message;
        type Features = Features;

        fn wrap(message: Message) -> super::Message {
            super::Message::V0x04(message)
        }

        fn handshake_requests() -> Vec<Message> {
            vec![
                Message::MultipartRequest(MultipartReq::desc()),
                Message::MultipartRequest(MultipartReq::port_desc()),
            ]
        }

        fn stats_request(kind: StatsKind) -> Message {
            match kind {
                StatsKind::Flow => Message::MultipartRequest(MultipartReq::all_flows()),
                StatsKind::Port => Message::MultipartRequest(MultipartReq::all_ports()),
            }
        }

        /// 1.3 Features-Replies list no ports; they come with the port description.
        fn on_features(ctx: &HandlerContext, features: Features) -> Arc<Switch> {
            attach_switch(ctx, SwitchFeatures::V0x04(features))
        }

        fn handle(ctx: &HandlerContext, switch: &Arc<Switch>, xid: Xid, message: Message) {
            let dpid = switch.dpid();
            match message {
                Message::EchoRequest(data) => {
                    ctx.reply(xid, super::Message::V0x04(Message::EchoReply(data)));
                    switch.touch(ctx.now);
                }
                Message::EchoReply(_) => switch.touch(ctx.now),
                Message::Error(ref err) => {
                    log_peer_error(Some(dpid), xid, OPENFLOW_0_04_VERSION, err);
                }
                Message::FeaturesReply(features) => switch.set_features(SwitchFeatures::V0x04(features)),
                Message::PortStatus(status) => {
                    port_status(ctx, switch, status.reason, PortDescription::from(&status.desc))
                }
                Message::PacketIn(pi) => ctx.events.publish(ControllerEvent::PacketIn {
                    switch: switch.clone(),
                    packet: PacketInInfo {
                        in_port: pi.pattern.in_port(),
                        table_id: Some(pi.table_id),
                        total_len: pi.total_len,
                        payload: pi.input_payload,
                    },
                }),
                Message::FlowRemoved(removed) => {
                    let flow = switch.remove_flow(&Flow0x04::removed_id(dpid, &removed));
                    if flow.is_none() {
                        debug!("Switch {} removed a flow unknown to the controller", switch);
                    }
                    ctx.events.publish(ControllerEvent::FlowRemoved {
                        switch: switch.clone(),
                        flow,
                        reason: removed.reason,
                    });
                }
                Message::MultipartReply(reply) => {
                    let more = reply.more();
                    match reply.body {
                        MultipartRespBody::Desc(desc) => switch.set_description(desc),
                        MultipartRespBody::Flow(items) => {
                            let items = items.iter().map(|s| FlowStats::from_0x04(dpid, s)).collect();
                            flow_stats(ctx, switch, xid, items, more)
                        }
                        MultipartRespBody::PortStats(items) => {
                            port_stats(ctx, switch, xid, items.iter().map(PortStats::from).collect(), more)
                        }
                        MultipartRespBody::PortDesc(ports) => {
                            let ports = ports.iter().map(PortDescription::from).collect();
                            if let Some(ports) = collect(ctx, &ctx.multipart.port_descs, xid, ports, more) {
                                bulk_ports(ctx, switch, ports);
                            }
                        }
                        MultipartRespBody::Other { multipart_type, .. } => {
                            debug!("Ignoring multipart reply type {} from {}", multipart_type, switch)
                        }
                    }
                }
                Message::GetConfigReply(config) => debug!("Switch {} config {:?}", switch, config),
                Message::BarrierReply => debug!("Barrier reply from {} xid {}", switch, xid),
                other => unexpected(switch, xid, OPENFLOW_0_04_VERSION, Message::msg_code(&other)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::handle;
    use crate::events::tests::RecordingEmitter;
    use crate::interface::tests::description;
    use crate::message::{DescStats, FlowModCmd, Timeout};
    use crate::openflow0x01 as of10;
    use crate::openflow0x04 as of13;
    use tokio::sync::mpsc;

    struct Fixture {
        registry: SwitchRegistry,
        events: RecordingEmitter,
        multipart: MultipartExchanges,
        connection: Arc<ConnectionHandle>,
        writer: mpsc::Receiver<(Xid, Message)>,
        _control: mpsc::Receiver<CloseReason>,
    }

    impl Fixture {
        fn new(version: u8) -> Fixture {
            let (connection, writer, control) = handle(1, 64);
            connection.set_version(version);
            Fixture {
                registry: SwitchRegistry::new(),
                events: RecordingEmitter::default(),
                multipart: MultipartExchanges::new(),
                connection: Arc::new(connection),
                writer,
                _control: control,
            }
        }

        fn ctx(&self) -> HandlerContext<'_> {
            HandlerContext {
                registry: &self.registry,
                events: &self.events,
                multipart: &self.multipart,
                connection: &self.connection,
                now: Instant::now(),
            }
        }

        fn switch(&self, dpid: Dpid) -> Arc<Switch> {
            let (switch, _) = self.registry.get_or_create(dpid);
            switch.attach(self.connection.clone());
            switch
        }
    }

    fn features_1_3(dpid: Dpid) -> of13::SwitchFeatures {
        of13::SwitchFeatures {
            datapath_id: dpid,
            num_buffers: 256,
            num_tables: 254,
            auxiliary_id: 0,
            supported_capabilities: Default::default(),
        }
    }

    fn port_status_1_3(reason: PortReason, port: of13::PortDesc) -> Message {
        Message::V0x04(of13::Message::PortStatus(of13::PortStatus { reason, desc: port }))
    }

    fn flow_stats_1_0(priority: u16) -> of10::FlowStats {
        of10::FlowStats {
            table_id: 0,
            pattern: of10::Pattern::match_all(),
            duration_sec: 0,
            duration_nsec: 0,
            priority,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            cookie: 0,
            packet_count: 0,
            byte_count: 0,
            actions: vec![],
        }
    }

    fn flow_stats_reply_1_0(flags: u16, priorities: Vec<u16>) -> Message {
        let body = of10::StatsRespBody::FlowStatsBody(priorities.into_iter().map(flow_stats_1_0).collect());
        Message::V0x01(of10::Message::StatsReply(of10::StatsResp { flags, body }))
    }

    #[test]
    fn test_echo_request_is_answered_with_same_payload_and_xid() {
        let mut fx = Fixture::new(4);
        let switch = fx.switch(1);
        dispatch(&fx.ctx(), &switch, 42, Message::V0x04(of13::Message::EchoRequest(b"abc".to_vec())));
        let (xid, reply) = fx.writer.try_recv().unwrap();
        assert_eq!(xid, 42);
        assert_eq!(reply, Message::V0x04(of13::Message::EchoReply(b"abc".to_vec())));
        assert!(switch.last_seen().is_some());
    }

    #[test]
    fn test_features_1_0_populates_interfaces_in_bulk() {
        let fx = Fixture::new(1);
        let features = of10::SwitchFeatures {
            datapath_id: 0xab,
            num_buffers: 0,
            num_tables: 1,
            supported_capabilities: Default::default(),
            supported_actions: 0,
            ports: vec![of10::tests::port_desc(1), of10::tests::port_desc(2), of10::tests::port_desc(3)],
        };
        let message = Message::V0x01(of10::Message::FeaturesReply(features));
        let switch = handshake_features(&fx.ctx(), message).unwrap();
        assert_eq!(switch.dpid(), 0xab);
        assert_eq!(switch.interfaces().len(), 3);
        assert_eq!(switch.features().map(|f| f.num_tables()), Some(1));
        assert_eq!(fx.events.names(), vec!["switch.interfaces.created"]);
        assert_eq!(switch.connection().unwrap().id(), fx.connection.id());
    }

    #[test]
    fn test_reconnect_reuses_switch_and_closes_old_connection() {
        let fx = Fixture::new(4);
        let (old, _old_writer, mut old_control) = handle(9, 4);
        let (existing, _) = fx.registry.get_or_create(0x5);
        existing.attach(Arc::new(old));
        existing.upsert_interface(&description(1));

        let switch = handshake_features(&fx.ctx(), Message::V0x04(of13::Message::FeaturesReply(features_1_3(0x5)))).unwrap();
        assert!(Arc::ptr_eq(&existing, &switch));
        assert_eq!(switch.interfaces().len(), 1);
        assert_eq!(switch.connection().unwrap().id(), fx.connection.id());
        assert_eq!(old_control.try_recv().unwrap(), CloseReason::Replaced);
    }

    #[test]
    fn test_port_status_lifecycle() {
        let fx = Fixture::new(4);
        let switch = fx.switch(1);
        let ctx = fx.ctx();

        dispatch(&ctx, &switch, 1, port_status_1_3(PortReason::PortAdd, of13::tests::port(2)));
        let held = switch.interface(2).unwrap();

        let mut down = of13::tests::port(2);
        down.state.link_down = true;
        dispatch(&ctx, &switch, 2, port_status_1_3(PortReason::PortModify, down.clone()));
        assert!(held.no_forward());

        dispatch(&ctx, &switch, 3, port_status_1_3(PortReason::PortDelete, down));
        assert!(!held.is_active());
        assert!(Arc::ptr_eq(&held, &switch.interface(2).unwrap()));

        assert_eq!(fx.events.names(), vec![
            "switch.interface.created",
            "switch.interface.updated",
            "switch.interface.link_down",
            "switch.interface.deleted",
        ]);
    }

    #[test]
    fn test_port_description_reply_emits_one_bulk_event() {
        let fx = Fixture::new(4);
        let switch = fx.switch(1);
        let ports = (1..=4).map(of13::tests::port).collect();
        let reply = of13::MultipartResp { flags: 0, body: of13::MultipartRespBody::PortDesc(ports) };
        dispatch(&fx.ctx(), &switch, 7, Message::V0x04(of13::Message::MultipartReply(reply)));
        assert_eq!(fx.events.names(), vec!["switch.interfaces.created"]);
        assert_eq!(switch.interfaces().len(), 4);
    }

    #[test]
    fn test_fragmented_flow_stats_emit_once() {
        let fx = Fixture::new(1);
        let switch = fx.switch(1);
        switch.record_request(StatsKind::Flow, 20);
        for (priority, flags) in vec![(1, 1), (2, 1), (3, 0)] {
            dispatch(&fx.ctx(), &switch, 20, flow_stats_reply_1_0(flags, vec![priority]));
        }
        assert_eq!(fx.events.names(), vec!["flow_stats.received"]);
        match fx.events.events()[0] {
            ControllerEvent::FlowStatsReceived { ref stats, .. } => {
                let priorities: Vec<u16> = stats.iter().map(|s| s.flow.priority()).collect();
                assert_eq!(priorities, vec![1, 2, 3]);
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(switch.flows().len(), 3);
        assert_eq!(switch.flow_stats().len(), 3);
        assert_eq!(switch.outstanding_request(StatsKind::Flow), None);
    }

    #[test]
    fn test_unsolicited_flow_stats_leave_flow_map_alone() {
        let fx = Fixture::new(1);
        let switch = fx.switch(1);
        for priority in 1..=3 {
            let mut flow = crate::flow::Flow0x01::new(1, of10::Pattern::match_all(), vec![]);
            flow.priority = priority;
            switch.insert_flow(crate::flow::Flow::V0x01(flow));
        }
        switch.record_request(StatsKind::Flow, 30);

        dispatch(&fx.ctx(), &switch, 99, flow_stats_reply_1_0(0, vec![7]));
        assert_eq!(fx.events.names(), vec!["flow_stats.received"]);
        assert_eq!(switch.flows().len(), 3);
        assert!(switch.flow_stats().is_empty());
        assert_eq!(switch.outstanding_request(StatsKind::Flow), Some(30));

        dispatch(&fx.ctx(), &switch, 30, flow_stats_reply_1_0(0, vec![7]));
        assert_eq!(switch.flows().len(), 1);
        assert_eq!(switch.outstanding_request(StatsKind::Flow), None);
    }

    #[test]
    fn test_late_final_fragment_after_purge_is_dropped() {
        let fx = Fixture::new(1);
        let switch = fx.switch(1);
        switch.insert_flow(crate::flow::Flow::V0x01(crate::flow::Flow0x01::new(1, of10::Pattern::match_all(), vec![])));
        switch.record_request(StatsKind::Flow, 20);
        dispatch(&fx.ctx(), &switch, 20, flow_stats_reply_1_0(1, vec![1]));
        dispatch(&fx.ctx(), &switch, 20, flow_stats_reply_1_0(1, vec![2]));

        let timeout = std::time::Duration::from_secs(30);
        assert_eq!(fx.multipart.purge_stale(Instant::now() + std::time::Duration::from_secs(31), timeout), 1);
        dispatch(&fx.ctx(), &switch, 20, flow_stats_reply_1_0(0, vec![3]));

        assert!(fx.events.names().is_empty());
        assert_eq!(switch.flows().len(), 1);
    }

    #[test]
    fn test_port_stats_1_0_replace_counters() {
        let fx = Fixture::new(1);
        let switch = fx.switch(1);
        let stats = |port_no: u16, rx: u64| of10::PortStats {
            port_no,
            packets: of10::TransmissionCounter { rx, tx: 1 },
            ..Default::default()
        };
        let reply = |xid: Xid, body: Vec<of10::PortStats>| {
            let resp = of10::StatsResp { flags: 0, body: of10::StatsRespBody::PortBody(body) };
            dispatch(&fx.ctx(), &switch, xid, Message::V0x01(of10::Message::StatsReply(resp)));
        };

        switch.record_request(StatsKind::Port, 5);
        reply(5, vec![stats(1, 10), stats(2, 20)]);
        let mut ports = switch.port_stats();
        ports.sort_by_key(|p| p.port_no);
        assert_eq!(ports.iter().map(|p| (p.port_no, p.rx_packets)).collect::<Vec<_>>(), vec![(1, 10), (2, 20)]);
        assert_eq!(ports[0].duration_sec, None);

        // a later reply replaces the counters wholesale
        switch.record_request(StatsKind::Port, 6);
        reply(6, vec![stats(2, 25)]);
        let ports = switch.port_stats();
        assert_eq!(ports.len(), 1);
        assert_eq!((ports[0].port_no, ports[0].rx_packets), (2, 25));
        assert_eq!(fx.events.names(), vec!["port_stats.received", "port_stats.received"]);
        assert_eq!(switch.outstanding_request(StatsKind::Port), None);
    }

    #[test]
    fn test_fragmented_port_stats_1_3() {
        let fx = Fixture::new(4);
        let switch = fx.switch(1);
        switch.record_request(StatsKind::Port, 11);
        let stats = |port_no: u32| of13::PortStats { port_no, tx_bytes: 100, duration_sec: 9, ..Default::default() };
        for (flags, port_no) in vec![(1, 1), (0, 2)] {
            let resp = of13::MultipartResp { flags, body: of13::MultipartRespBody::PortStats(vec![stats(port_no)]) };
            dispatch(&fx.ctx(), &switch, 11, Message::V0x04(of13::Message::MultipartReply(resp)));
        }
        assert_eq!(fx.events.names(), vec!["port_stats.received"]);
        match fx.events.events()[0] {
            ControllerEvent::PortStatsReceived { ref stats, .. } => assert_eq!(stats.len(), 2),
            ref other => panic!("unexpected {:?}", other),
        }
        let mut ports = switch.port_stats();
        ports.sort_by_key(|p| p.port_no);
        assert_eq!(ports.iter().map(|p| p.port_no).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(ports[1].duration_sec, Some(9));
        assert_eq!(ports[1].tx_bytes, 100);
    }

    #[test]
    fn test_flow_removed_1_0_announces_every_removed_flow() {
        let fx = Fixture::new(1);
        let switch = fx.switch(1);
        let mut ids = vec![];
        for table_id in 0..2 {
            let mut flow = crate::flow::Flow0x01::new(1, of10::Pattern::match_all(), vec![]);
            flow.table_id = table_id;
            flow.cookie = 0x5;
            ids.push(switch.insert_flow(crate::flow::Flow::V0x01(flow)));
        }
        let removed = of10::FlowRemoved {
            pattern: of10::Pattern::match_all(),
            cookie: 0x5,
            priority: crate::flow::DEFAULT_PRIORITY,
            reason: crate::message::FlowRemovedReason::HardTimeout,
            duration_sec: 0,
            duration_nsec: 0,
            idle_timeout: Timeout::Permanent,
            packet_count: 0,
            byte_count: 0,
        };
        dispatch(&fx.ctx(), &switch, 4, Message::V0x01(of10::Message::FlowRemoved(removed.clone())));
        assert_eq!(fx.events.names(), vec!["flow.removed", "flow.removed"]);
        assert!(switch.flows().is_empty());
        let mut announced: Vec<_> = fx.events.events().iter().filter_map(|e| match *e {
            ControllerEvent::FlowRemoved { flow: Some(ref f), .. } => Some(f.id()),
            _ => None,
        }).collect();
        announced.sort();
        ids.sort();
        assert_eq!(announced, ids);

        // nothing left to match
        dispatch(&fx.ctx(), &switch, 5, Message::V0x01(of10::Message::FlowRemoved(removed)));
        match fx.events.events()[2] {
            ControllerEvent::FlowRemoved { flow: None, .. } => (),
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_flow_removed_1_3() {
        let fx = Fixture::new(4);
        let switch = fx.switch(1);
        let mut flow = crate::flow::Flow0x04::new(1, of13::tests::sample_match(), vec![]);
        flow.cookie = 0x77;
        let id = switch.insert_flow(crate::flow::Flow::V0x04(flow.clone()));
        let removed = of13::FlowRemoved {
            cookie: flow.cookie,
            priority: flow.priority,
            reason: crate::message::FlowRemovedReason::Delete,
            table_id: flow.table_id,
            duration_sec: 0,
            duration_nsec: 0,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            packet_count: 0,
            byte_count: 0,
            pattern: flow.pattern.clone(),
        };
        dispatch(&fx.ctx(), &switch, 3, Message::V0x04(of13::Message::FlowRemoved(removed)));
        assert!(switch.flow(&id).is_none());
        match fx.events.events()[0] {
            ControllerEvent::FlowRemoved { flow: Some(ref f), .. } => assert_eq!(f.id(), id),
            ref other => panic!("unexpected {:?}", other),
        }
        // delete commands carry no instructions
        assert!(flow.to_flow_mod(FlowModCmd::DeleteFlow).instructions.is_empty());
    }

    #[test]
    fn test_description_is_stored() {
        let fx = Fixture::new(4);
        let switch = fx.switch(1);
        let desc = DescStats { manufacturer_desc: "Nicira".to_string(), ..Default::default() };
        let reply = of13::MultipartResp { flags: 0, body: of13::MultipartRespBody::Desc(desc.clone()) };
        dispatch(&fx.ctx(), &switch, 1, Message::V0x04(of13::Message::MultipartReply(reply)));
        assert_eq!(switch.description(), Some(desc));
        assert!(fx.events.names().is_empty());
    }

    #[test]
    fn test_unexpected_message_is_dropped() {
        let mut fx = Fixture::new(1);
        let switch = fx.switch(1);
        dispatch(&fx.ctx(), &switch, 1, Message::V0x01(of10::Message::FeaturesReq));
        assert!(fx.events.names().is_empty());
        assert!(fx.writer.try_recv().is_err());
    }

    #[test]
    fn test_request_stats_records_outstanding_xids() {
        let mut fx = Fixture::new(4);
        let switch = fx.switch(3);
        request_stats(&switch).unwrap();
        let (flow_xid, flow) = fx.writer.try_recv().unwrap();
        let (port_xid, _) = fx.writer.try_recv().unwrap();
        assert_eq!(flow, stats_request(4, StatsKind::Flow).unwrap());
        assert_eq!(switch.outstanding_request(StatsKind::Flow), Some(flow_xid));
        assert_eq!(switch.outstanding_request(StatsKind::Port), Some(port_xid));

        let offline = Switch::new(4);
        match request_stats(&offline) {
            Err(ConnectionError::NotConnected { dpid }) => assert_eq!(dpid, 4),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_handshake_requests_per_version() {
        assert_eq!(handshake_requests(1).len(), 1);
        assert_eq!(handshake_requests(4).len(), 2);
        assert!(stats_request(4, StatsKind::Port).is_some());
        assert!(stats_request(2, StatsKind::Port).is_none());
    }
}
