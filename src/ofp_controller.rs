use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use crate::apps::StatsPoller;
use crate::connection::{CloseReason, ConnectionError, ConnectionId};
use crate::events::EventEmitter;
use crate::flow::Flow;
use crate::message::{FlowModCmd, Message};
use crate::negotiation::NegotiationError;
use crate::ofp_device::DeviceContext;
use crate::ofp_handler;
use crate::ofp_header::Xid;
use crate::ofp_serialization::{MessageCodec, OfpCodec};
use crate::ofp_utils::now;
use crate::settings::Settings;
use crate::switch::{Dpid, Switch, SwitchRegistry};

/// Entry point of the protocol core: accepts switch connections and sends to
/// connected switches.
pub struct Controller {
    context: Arc<DeviceContext>,
    next_connection: AtomicU64,
}

impl Controller {
    pub fn new(settings: Settings, events: Arc<dyn EventEmitter>) -> Result<Controller, NegotiationError> {
        Controller::with_codec(settings, Arc::new(OfpCodec), events)
    }

    pub fn with_codec(settings: Settings, codec: Arc<dyn MessageCodec>, events: Arc<dyn EventEmitter>)
                      -> Result<Controller, NegotiationError> {
        Ok(Controller {
            context: Arc::new(DeviceContext::new(settings, codec, events)?),
            next_connection: AtomicU64::new(1),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.context.settings
    }

    pub fn registry(&self) -> &SwitchRegistry {
        &self.context.registry
    }

    pub fn switch(&self, dpid: Dpid) -> Option<Arc<Switch>> {
        self.context.registry.get(dpid)
    }

    /// Start the background tasks: statistics polling and the multipart sweeper.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!("Starting controller with versions {:?}", self.context.negotiator.versions());
        let poller = StatsPoller::new(self.clone());
        vec![tokio::spawn(poller.run()), tokio::spawn(sweep_multipart(self.context.clone()))]
    }

    /// Take over a freshly accepted transport. The returned task ends with the reason
    /// the connection closed.
    pub fn accept<S>(&self, stream: S, peer: String) -> JoinHandle<CloseReason>
        where S: AsyncRead + AsyncWrite + Send + Unpin + 'static
    {
        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        self.context.spawn(id, peer, stream)
    }

    fn connected(&self, dpid: Dpid) -> Result<Arc<Switch>, ConnectionError> {
        match self.context.registry.get(dpid) {
            Some(ref switch) if switch.is_connected() => Ok(switch.clone()),
            _ => Err(ConnectionError::NotConnected { dpid }),
        }
    }

    pub fn send_message(&self, dpid: Dpid, message: Message) -> Result<Xid, ConnectionError> {
        let switch = self.connected(dpid)?;
        let connection = switch.connection().ok_or(ConnectionError::NotConnected { dpid })?;
        connection.send(message)
    }

    /// Send a Flow-Mod for `flow` and track it in the switch's flow map once queued.
    pub fn send_flow_mod(&self, flow: &Flow, command: FlowModCmd) -> Result<Xid, ConnectionError> {
        let switch = self.connected(flow.dpid())?;
        let xid = self.send_message(flow.dpid(), flow.to_message(command))?;
        if command.is_delete() {
            switch.remove_flow(&flow.id());
        } else {
            switch.insert_flow(flow.clone());
        }
        debug!("Sent {:?} for flow {} with xid {}", command, flow, xid);
        Ok(xid)
    }

    pub fn request_stats(&self, dpid: Dpid) -> Result<(), ConnectionError> {
        ofp_handler::request_stats(&*self.connected(dpid)?)
    }

    /// Ask the switch's connection to close.
    pub fn disconnect(&self, dpid: Dpid) -> Result<(), ConnectionError> {
        let switch = self.connected(dpid)?;
        if let Some(connection) = switch.connection() {
            connection.close(CloseReason::Shutdown);
        }
        Ok(())
    }
}

async fn sweep_multipart(context: Arc<DeviceContext>) {
    let timeout = context.settings.multipart_timeout();
    let mut ticker = tokio::time::interval(timeout);
    loop {
        ticker.tick().await;
        let purged = context.multipart.purge_stale(now(), timeout);
        if purged > 0 {
            debug!("Purged {} stale multipart replies", purged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::handle;
    use crate::events::tests::RecordingEmitter;
    use crate::flow::Flow0x04;
    use crate::openflow0x04 as of13;

    fn controller() -> Controller {
        Controller::new(Settings::default(), Arc::new(RecordingEmitter::default())).unwrap()
    }

    #[test]
    fn test_unsupported_versions_are_rejected() {
        let settings = Settings { openflow_versions: vec![2, 3], ..Settings::default() };
        assert!(Controller::new(settings, Arc::new(RecordingEmitter::default())).is_err());
    }

    #[test]
    fn test_sending_to_unknown_switch_fails() {
        let controller = controller();
        match controller.send_message(5, Message::features_request(4).unwrap()) {
            Err(ConnectionError::NotConnected { dpid }) => assert_eq!(dpid, 5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_flow_mod_updates_flow_map() {
        let controller = controller();
        let (connection, mut writer, _control) = handle(1, 8);
        connection.set_version(4);
        let (switch, _) = controller.registry().get_or_create(0x10);
        switch.attach(Arc::new(connection));

        let flow = Flow::V0x04(Flow0x04::new(0x10, of13::tests::sample_match(), vec![]));
        controller.send_flow_mod(&flow, FlowModCmd::AddFlow).unwrap();
        assert_eq!(switch.flow(&flow.id()), Some(flow.clone()));
        match writer.try_recv().unwrap().1 {
            Message::V0x04(of13::Message::FlowMod(ref fm)) => assert!(fm.notify_when_removed),
            ref other => panic!("unexpected {:?}", other),
        }

        controller.send_flow_mod(&flow, FlowModCmd::DeleteFlow).unwrap();
        assert!(switch.flows().is_empty());
    }

    #[test]
    fn test_failed_flow_mod_leaves_flow_map_alone() {
        let controller = controller();
        let (connection, writer, _control) = handle(1, 8);
        connection.set_version(4);
        let (switch, _) = controller.registry().get_or_create(0x10);
        switch.attach(Arc::new(connection));
        drop(writer);

        let flow = Flow::V0x04(Flow0x04::new(0x10, of13::tests::sample_match(), vec![]));
        assert!(controller.send_flow_mod(&flow, FlowModCmd::AddFlow).is_err());
        assert!(switch.flows().is_empty());
    }

    #[test]
    fn test_disconnect_asks_connection_to_shut_down() {
        let controller = controller();
        let (connection, _writer, mut control) = handle(1, 8);
        connection.set_version(1);
        let (switch, _) = controller.registry().get_or_create(0x20);
        switch.attach(Arc::new(connection));

        controller.disconnect(0x20).unwrap();
        assert_eq!(control.try_recv().unwrap(), CloseReason::Shutdown);
        assert!(controller.disconnect(0x21).is_err());
    }

    #[tokio::test]
    async fn test_accept_assigns_distinct_connection_ids() {
        let controller = controller();
        let (_a, server_a) = tokio::io::duplex(1024);
        let (_b, server_b) = tokio::io::duplex(1024);
        let first = controller.accept(server_a, "a".to_string());
        let second = controller.accept(server_b, "b".to_string());
        assert_eq!(controller.next_connection.load(Ordering::Relaxed), 3);
        first.abort();
        second.abort();
    }
}
