//! Runtime of one switch connection.
//!
//! Three tasks per connection: the reader frames bytes by the OpenFlow header
//! length and queues them, the processor drives the handshake and dispatches, and
//! the writer encodes and writes queued messages. Established connections also get
//! a keepalive task.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::connection::{Admission, CloseReason, Connection, ConnectionHandle, ConnectionId,
                        HelloOutcome};
use crate::events::{ControllerEvent, EventEmitter};
use crate::keepalive::{KeepaliveAction, KeepaliveConfig, KeepaliveTracker, ECHO_PAYLOAD};
use crate::message::{ErrorMsg, Message, SwitchConfig};
use crate::multipart::MultipartExchanges;
use crate::negotiation::VersionNegotiator;
use crate::ofp_handler::{self, HandlerContext};
use crate::ofp_header::{OfpHeader, Xid};
use crate::ofp_serialization::MessageCodec;
use crate::ofp_utils::{lock, now};
use crate::openflow0x01;
use crate::openflow0x04;
use crate::settings::Settings;
use crate::switch::{Switch, SwitchRegistry};

/// Everything connections share.
pub struct DeviceContext {
    pub settings: Settings,
    pub negotiator: VersionNegotiator,
    pub codec: Arc<dyn MessageCodec>,
    pub registry: SwitchRegistry,
    pub events: Arc<dyn EventEmitter>,
    pub multipart: MultipartExchanges,
}

type Frame = Result<Vec<u8>, CloseReason>;

/// Splits a byte stream into OpenFlow frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    socket: R,
    rd: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(socket: R) -> Self {
        FrameReader { socket, rd: BytesMut::new() }
    }

    fn frame_length(&self) -> Option<usize> {
        if self.rd.len() < OfpHeader::size() {
            return None;
        }
        Some(((self.rd[2] as usize) << 8) + self.rd[3] as usize)
    }

    /// The next complete frame, header included. `None` on a clean end of stream.
    pub async fn next_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(length) = self.frame_length() {
                if length < OfpHeader::size() {
                    return Err(io::Error::new(io::ErrorKind::InvalidData,
                                              format!("frame length {} below header size", length)));
                }
                if self.rd.len() >= length {
                    return Ok(Some(self.rd.split_to(length).to_vec()));
                }
                self.rd.reserve(length - self.rd.len());
            } else {
                self.rd.reserve(OfpHeader::size());
            }
            if self.socket.read_buf(&mut self.rd).await? == 0 {
                if self.rd.is_empty() {
                    return Ok(None);
                }
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended inside a frame"));
            }
        }
    }
}

async fn read_frames<R>(mut reader: FrameReader<R>, frames: mpsc::Sender<Frame>,
                        tracker: Arc<Mutex<KeepaliveTracker>>)
    where R: AsyncRead + Unpin
{
    loop {
        let frame = match reader.next_frame().await {
            Ok(Some(frame)) => {
                lock(&tracker).record_activity(now());
                Ok(frame)
            }
            Ok(None) => Err(CloseReason::Eof),
            Err(e) => Err(CloseReason::Io(e.to_string())),
        };
        let last = frame.is_err();
        if frames.send(frame).await.is_err() || last {
            return;
        }
    }
}

async fn write_frames<W>(mut socket: W, mut rx: mpsc::Receiver<(Xid, Message)>,
                         mut shutdown: oneshot::Receiver<()>, codec: Arc<dyn MessageCodec>,
                         id: ConnectionId)
    where W: AsyncWrite + Unpin
{
    let mut draining = false;
    loop {
        let next = if draining {
            rx.recv().await
        } else {
            tokio::select! {
                biased;
                next = rx.recv() => next,
                _ = &mut shutdown => {
                    draining = true;
                    rx.close();
                    rx.recv().await
                }
            }
        };
        let (xid, message) = match next {
            Some(next) => next,
            None => break,
        };
        trace!("Connection {} sending {} xid {}", id, message, xid);
        let bytes = match codec.encode(xid, message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Connection {} cannot encode message xid {}: {}", id, xid, e);
                continue;
            }
        };
        if let Err(e) = socket.write_all(&bytes).await {
            warn!("Connection {} write failed: {}", id, e);
            break;
        }
    }
    if let Err(e) = socket.shutdown().await {
        debug!("Connection {} shutdown: {}", id, e);
    }
}

async fn keepalive(handle: Arc<ConnectionHandle>, tracker: Arc<Mutex<KeepaliveTracker>>, version: u8) {
    loop {
        let action = lock(&tracker).poll(now());
        match action {
            KeepaliveAction::Wait(duration) => tokio::time::sleep(duration).await,
            KeepaliveAction::Probe => {
                let probe = match Message::echo_request(version, ECHO_PAYLOAD.to_vec()) {
                    Ok(probe) => probe,
                    Err(e) => {
                        error!("Connection {} cannot build echo request: {}", handle.id(), e);
                        return;
                    }
                };
                if let Err(e) = handle.send(probe) {
                    debug!("Connection {} keepalive stopped: {}", handle.id(), e);
                    return;
                }
                lock(&tracker).record_probe(now());
            }
            KeepaliveAction::Expired => {
                warn!("Connection {} did not answer echo requests", handle.id());
                handle.close(CloseReason::KeepaliveTimeout);
                return;
            }
        }
    }
}

fn peer_error(message: &Message) -> Option<&ErrorMsg> {
    match *message {
        Message::V0x01(openflow0x01::Message::Error(ref e)) => Some(e),
        Message::V0x04(openflow0x04::Message::Error(ref e)) => Some(e),
        _ => None,
    }
}

struct Processor {
    ctx: Arc<DeviceContext>,
    conn: Connection,
    handle: Arc<ConnectionHandle>,
    switch: Option<Arc<Switch>>,
    tracker: Arc<Mutex<KeepaliveTracker>>,
    keepalive: Option<JoinHandle<()>>,
}

impl Processor {
    fn handler_context(&self, now: Instant) -> HandlerContext<'_> {
        HandlerContext {
            registry: &self.ctx.registry,
            events: &*self.ctx.events,
            multipart: &self.ctx.multipart,
            connection: &self.handle,
            now,
        }
    }

    fn send(&self, message: Message) {
        if let Err(e) = self.handle.send(message) {
            error!("Connection {} cannot queue message: {}", self.conn.id(), e);
        }
    }

    fn reply(&self, xid: Xid, message: Message) {
        if let Err(e) = self.handle.send_with_xid(xid, message) {
            error!("Connection {} cannot queue reply to xid {}: {}", self.conn.id(), xid, e);
        }
    }

    /// Handle one frame. Returns why the connection must close, if it must.
    fn on_frame(&mut self, frame: Vec<u8>) -> Option<CloseReason> {
        let now = now();
        self.conn.touch(now);
        let version = match self.conn.version() {
            Some(version) => version,
            None => {
                return match self.ctx.codec.decode_hello(&frame) {
                    Ok(hello) => self.on_hello(&hello),
                    Err(e) => Some(CloseReason::MalformedHandshake(e.to_string())),
                };
            }
        };
        let (xid, message) = match self.ctx.codec.decode(version, &frame) {
            Ok(decoded) => decoded,
            Err(e) if self.conn.state().is_handshake() => {
                return Some(CloseReason::MalformedHandshake(e.to_string()));
            }
            Err(e) => {
                error!("Connection {} dropping malformed message: {}", self.conn.id(), e);
                return None;
            }
        };
        let code = message.msg_code();
        match self.conn.admit(code) {
            Admission::Handshake => self.on_handshake_message(xid, message, now),
            Admission::Echo => {
                if let Some(reply) = message.echo_reply_to() {
                    self.reply(xid, reply);
                }
                None
            }
            Admission::Defer => {
                if !self.conn.defer(xid, message) {
                    warn!("Connection {} dropping {} received during the handshake", self.conn.id(), code);
                }
                None
            }
            Admission::Dispatch => {
                self.dispatch(xid, message, now);
                None
            }
            Admission::Hello | Admission::Ignore => {
                debug!("Connection {} ignoring {} in state {}", self.conn.id(), code, self.conn.state());
                None
            }
            Admission::Reject => Some(CloseReason::UnexpectedMessage(code)),
        }
    }

    fn on_hello(&mut self, hello: &crate::message::GenericHello) -> Option<CloseReason> {
        match self.conn.on_hello(&self.ctx.negotiator, hello) {
            Ok(HelloOutcome::Agreed { version, replies }) => {
                info!("Connection {} ({}) agreed on version {}", self.conn.id(), self.conn.peer(), version);
                self.handle.set_version(version);
                for reply in replies {
                    self.send(reply);
                }
                None
            }
            Ok(HelloOutcome::Rejected { error, xid, reply }) => {
                error!("Connection {} ({}): {}", self.conn.id(), self.conn.peer(), error);
                self.reply(xid, reply);
                Some(CloseReason::NegotiationFailed)
            }
            Err(e) => Some(CloseReason::MalformedHandshake(e.to_string())),
        }
    }

    fn on_handshake_message(&mut self, xid: Xid, message: Message, now: Instant) -> Option<CloseReason> {
        if let Some(error) = peer_error(&message) {
            return Some(ofp_handler::log_peer_error(None, xid, message.version(), error));
        }
        let code = message.msg_code();
        let version = message.version();
        let switch = {
            let ctx = self.handler_context(now);
            ofp_handler::handshake_features(&ctx, message)
        };
        let switch = match switch {
            Some(switch) => switch,
            None => return Some(CloseReason::UnexpectedMessage(code)),
        };
        let deferred = match self.conn.establish(switch.dpid()) {
            Ok(deferred) => deferred,
            Err(e) => return Some(CloseReason::MalformedHandshake(e.to_string())),
        };
        info!("Switch {} connected from {} (connection {}, version {})",
              switch, self.conn.peer(), self.conn.id(), version);

        if self.ctx.settings.send_set_config {
            match Message::set_config(version, SwitchConfig::full_packet_in()) {
                Ok(config) => self.send(config),
                Err(e) => error!("Cannot build set-config for {}: {}", switch, e),
            }
        }
        self.ctx.events.publish(ControllerEvent::HandshakeCompleted { switch: switch.clone() });
        for request in ofp_handler::handshake_requests(version) {
            self.send(request);
        }
        if let Err(e) = ofp_handler::request_stats(&switch) {
            warn!("Cannot request initial statistics from {}: {}", switch, e);
        }
        if self.ctx.settings.send_echo_requests {
            lock(&self.tracker).record_activity(now);
            self.keepalive = Some(tokio::spawn(keepalive(self.handle.clone(), self.tracker.clone(), version)));
        }
        self.switch = Some(switch);

        if !deferred.is_empty() {
            debug!("Connection {} replaying {} deferred messages", self.conn.id(), deferred.len());
        }
        for (xid, message) in deferred {
            self.dispatch(xid, message, now);
        }
        None
    }

    fn dispatch(&self, xid: Xid, message: Message, now: Instant) {
        if let Some(ref switch) = self.switch {
            let ctx = self.handler_context(now);
            ofp_handler::dispatch(&ctx, switch, xid, message);
        }
    }

    /// Release everything the connection holds. Runs once per connection.
    fn finish(&mut self, reason: &CloseReason) {
        if !self.conn.terminate() {
            return;
        }
        if let Some(keepalive) = self.keepalive.take() {
            keepalive.abort();
        }
        let id = self.conn.id();
        if let Some(ref switch) = self.switch {
            if switch.detach(id) {
                debug!("Switch {} lost its connection", switch);
            }
        }
        let discarded = self.ctx.multipart.discard_connection(id);
        if discarded > 0 {
            debug!("Connection {} discarded {} incomplete multipart replies", id, discarded);
        }
        info!("Connection {} ({}) {}: {}", id, self.conn.peer(), self.conn.state(), reason);
        self.ctx.events.publish(ControllerEvent::ConnectionLost {
            connection: id,
            dpid: self.conn.dpid(),
            reason: reason.clone(),
        });
    }
}

/// Run one connection over `stream` until it closes, and return why it closed.
pub async fn run<S>(ctx: Arc<DeviceContext>, id: ConnectionId, peer: String, stream: S) -> CloseReason
    where S: AsyncRead + AsyncWrite + Send + Unpin + 'static
{
    let settings = &ctx.settings;
    let (read, write) = tokio::io::split(stream);
    let (frame_tx, mut frame_rx) = mpsc::channel(settings.message_queue_size);
    let (writer_tx, writer_rx) = mpsc::channel(settings.writer_queue_size);
    let (control_tx, mut control_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let started = now();
    let handle = Arc::new(ConnectionHandle::new(id, peer.clone(), writer_tx, control_tx));
    let tracker = Arc::new(Mutex::new(KeepaliveTracker::new(
        KeepaliveConfig {
            interval: settings.keepalive_interval(),
            timeout: settings.keepalive_timeout(),
        },
        started,
    )));

    let reader = tokio::spawn(read_frames(FrameReader::new(read), frame_tx, tracker.clone()));
    let writer = tokio::spawn(write_frames(write, writer_rx, shutdown_rx, ctx.codec.clone(), id));

    info!("Connection {} accepted from {}", id, peer);
    let mut processor = Processor {
        conn: Connection::new(id, peer, settings.max_deferred_messages, started),
        ctx: ctx.clone(),
        handle,
        switch: None,
        tracker,
        keepalive: None,
    };

    let reason = match processor.conn.start(&ctx.negotiator) {
        Ok(hello) => {
            processor.send(hello);
            let deadline = tokio::time::sleep(ctx.settings.handshake_timeout());
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    frame = frame_rx.recv() => match frame {
                        Some(Ok(frame)) => {
                            if let Some(reason) = processor.on_frame(frame) {
                                break reason;
                            }
                        }
                        Some(Err(reason)) => break reason,
                        None => break CloseReason::Eof,
                    },
                    reason = control_rx.recv() => break reason.unwrap_or(CloseReason::Shutdown),
                    _ = &mut deadline, if processor.conn.state().is_handshake() => {
                        break CloseReason::HandshakeTimeout;
                    }
                }
            }
        }
        Err(e) => CloseReason::MalformedHandshake(e.to_string()),
    };

    processor.finish(&reason);
    reader.abort();
    let _ = shutdown_tx.send(());
    if let Err(e) = writer.await {
        debug!("Connection {} writer ended abnormally: {}", id, e);
    }
    reason
}

impl DeviceContext {
    pub fn new(settings: Settings, codec: Arc<dyn MessageCodec>, events: Arc<dyn EventEmitter>)
               -> Result<DeviceContext, crate::negotiation::NegotiationError> {
        let negotiator = VersionNegotiator::new(&settings.openflow_versions)?;
        Ok(DeviceContext {
            settings,
            negotiator,
            codec,
            registry: SwitchRegistry::new(),
            events,
            multipart: MultipartExchanges::new(),
        })
    }

    /// Spawn the tasks of a newly accepted connection.
    pub fn spawn<S>(self: &Arc<Self>, id: ConnectionId, peer: String, stream: S) -> JoinHandle<CloseReason>
        where S: AsyncRead + AsyncWrite + Send + Unpin + 'static
    {
        tokio::spawn(run(self.clone(), id, peer, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::tests::RecordingEmitter;
    use crate::message::Payload;
    use crate::ofp_serialization::OfpCodec;
    use crate::openflow0x01 as of10;
    use crate::openflow0x04 as of13;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    struct Peer {
        reader: FrameReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Peer {
        async fn send(&mut self, xid: Xid, message: Message) {
            let bytes = OfpCodec.encode(xid, message).unwrap();
            self.writer.write_all(&bytes).await.unwrap();
        }

        async fn frame(&mut self) -> Vec<u8> {
            self.reader.next_frame().await.unwrap().expect("connection closed")
        }

        async fn message(&mut self, version: u8) -> (Xid, Message) {
            let frame = self.frame().await;
            OfpCodec.decode(version, &frame).unwrap()
        }

        async fn close(&mut self) {
            self.writer.shutdown().await.unwrap();
        }
    }

    fn start(settings: Settings) -> (Arc<DeviceContext>, Arc<RecordingEmitter>, Peer,
                                      JoinHandle<CloseReason>) {
        let events = Arc::new(RecordingEmitter::default());
        let ctx = Arc::new(DeviceContext::new(settings, Arc::new(OfpCodec), events.clone()).unwrap());
        let (client, server) = tokio::io::duplex(64 * 1024);
        let task = ctx.spawn(ConnectionId(1), "10.0.0.1:50000".to_string(), server);
        let (read, write) = tokio::io::split(client);
        (ctx, events, Peer { reader: FrameReader::new(read), writer: write }, task)
    }

    fn features_1_0(dpid: u64) -> Message {
        Message::V0x01(of10::Message::FeaturesReply(of10::SwitchFeatures {
            datapath_id: dpid,
            num_buffers: 256,
            num_tables: 1,
            supported_capabilities: Default::default(),
            supported_actions: 0,
            ports: vec![of10::tests::port_desc(1), of10::tests::port_desc(2)],
        }))
    }

    fn features_1_3(dpid: u64) -> Message {
        Message::V0x04(of13::Message::FeaturesReply(of13::SwitchFeatures {
            datapath_id: dpid,
            num_buffers: 256,
            num_tables: 254,
            auxiliary_id: 0,
            supported_capabilities: Default::default(),
        }))
    }

    /// Drive a 1.3 handshake up to the last post-handshake request.
    async fn establish_1_3(peer: &mut Peer, dpid: u64) {
        let hello = OfpCodec.decode_hello(&peer.frame().await).unwrap();
        assert_eq!(hello.version, 4);
        peer.send(1, Message::hello(4, &[4]).unwrap()).await;
        assert_eq!(peer.message(4).await.1, Message::features_request(4).unwrap());
        peer.send(2, features_1_3(dpid)).await;
        // set-config, description, port description, flow and port stats
        for _ in 0..5 {
            peer.message(4).await;
        }
    }

    #[tokio::test]
    async fn test_handshake_with_1_0_peer() {
        let (ctx, events, mut peer, task) = start(Settings::default());

        let hello = OfpCodec.decode_hello(&peer.frame().await).unwrap();
        assert_eq!((hello.version, hello.versions), (4, Some(vec![1, 4])));
        peer.send(7, Message::hello(1, &[1]).unwrap()).await;

        let rehello = OfpCodec.decode_hello(&peer.frame().await).unwrap();
        assert_eq!(rehello.version, 1);
        assert_eq!(peer.message(1).await.1, Message::features_request(1).unwrap());

        peer.send(8, features_1_0(0xab)).await;
        let expected = vec![
            Message::set_config(1, SwitchConfig::full_packet_in()).unwrap(),
            Message::V0x01(of10::Message::StatsRequest(of10::StatsReq::desc())),
            Message::V0x01(of10::Message::StatsRequest(of10::StatsReq::all_flows())),
            Message::V0x01(of10::Message::StatsRequest(of10::StatsReq::all_ports())),
        ];
        for message in expected {
            assert_eq!(peer.message(1).await.1, message);
        }
        assert_eq!(events.names(), vec!["switch.interfaces.created", "switch.handshake_completed"]);
        let switch = ctx.registry.get(0xab).unwrap();
        assert_eq!(switch.interfaces().len(), 2);
        assert_eq!(switch.version(), Some(1));

        peer.close().await;
        assert_eq!(task.await.unwrap(), CloseReason::Eof);
        assert!(!switch.is_connected());
        assert_eq!(events.names().last(), Some(&"connection.lost"));
    }

    #[tokio::test]
    async fn test_bitmap_peer_skips_rehello_and_defers_steady_state_messages() {
        let (_ctx, events, mut peer, task) = start(Settings::default());

        OfpCodec.decode_hello(&peer.frame().await).unwrap();
        peer.send(1, Message::hello(4, &[1, 4]).unwrap()).await;
        assert_eq!(peer.message(4).await.1, Message::features_request(4).unwrap());

        let packet_in = of13::PacketIn {
            input_payload: Payload::NotBuffered(vec![0xde, 0xad]),
            total_len: 2,
            reason: of13::PacketInReason::NoMatch,
            table_id: 0,
            cookie: 0,
            pattern: of13::tests::sample_match(),
        };
        peer.send(2, Message::V0x04(of13::Message::PacketIn(packet_in))).await;
        peer.send(3, Message::echo_request(4, b"hs".to_vec()).unwrap()).await;
        assert_eq!(peer.message(4).await, (3, Message::V0x04(of13::Message::EchoReply(b"hs".to_vec()))));
        assert!(events.names().is_empty());

        peer.send(4, features_1_3(0x1)).await;
        for _ in 0..5 {
            peer.message(4).await;
        }
        assert_eq!(events.names(), vec!["switch.handshake_completed", "switch.packet_in"]);

        peer.close().await;
        assert_eq!(task.await.unwrap(), CloseReason::Eof);
    }

    #[tokio::test]
    async fn test_incompatible_peer_gets_hello_failed() {
        let settings = Settings { openflow_versions: vec![4], ..Settings::default() };
        let (ctx, events, mut peer, task) = start(settings);

        OfpCodec.decode_hello(&peer.frame().await).unwrap();
        peer.send(21, Message::hello(1, &[1]).unwrap()).await;
        match peer.message(4).await {
            (21, Message::V0x04(of13::Message::Error(ref error))) => {
                assert_eq!(error.error_type, crate::message::ERROR_TYPE_HELLO_FAILED);
                assert_eq!(error.code, crate::message::HELLO_FAILED_INCOMPATIBLE);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(task.await.unwrap(), CloseReason::NegotiationFailed);
        assert!(peer.reader.next_frame().await.unwrap().is_none());
        assert_eq!(events.names(), vec!["connection.lost"]);
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_message_before_hello_is_fatal() {
        let (_ctx, events, mut peer, task) = start(Settings::default());
        peer.frame().await;
        peer.send(1, Message::features_request(4).unwrap()).await;
        match task.await.unwrap() {
            CloseReason::MalformedHandshake(_) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(events.names(), vec!["connection.lost"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout() {
        let (_ctx, events, mut peer, task) = start(Settings::default());
        peer.frame().await;
        assert_eq!(task.await.unwrap(), CloseReason::HandshakeTimeout);
        assert_eq!(events.names(), vec!["connection.lost"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_switch_times_out_after_probes() {
        let (ctx, events, mut peer, task) = start(Settings::default());
        establish_1_3(&mut peer, 0x9).await;

        let (_, probe) = peer.message(4).await;
        assert_eq!(probe, Message::echo_request(4, ECHO_PAYLOAD.to_vec()).unwrap());

        assert_eq!(task.await.unwrap(), CloseReason::KeepaliveTimeout);
        let lost: Vec<&str> = events.names().into_iter().filter(|n| *n == "connection.lost").collect();
        assert_eq!(lost.len(), 1);
        assert!(!ctx.registry.get(0x9).unwrap().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_answered_probes_keep_connection_alive() {
        let (ctx, _events, mut peer, task) = start(Settings::default());
        establish_1_3(&mut peer, 0x2).await;

        for _ in 0..5 {
            let (xid, probe) = peer.message(4).await;
            peer.send(xid, probe.echo_reply_to().unwrap()).await;
        }
        assert!(ctx.registry.get(0x2).unwrap().is_connected());
        peer.close().await;
        assert_eq!(task.await.unwrap(), CloseReason::Eof);
    }

    #[tokio::test]
    async fn test_new_connection_replaces_old_one() {
        let events = Arc::new(RecordingEmitter::default());
        let ctx = Arc::new(DeviceContext::new(Settings::default(), Arc::new(OfpCodec), events.clone()).unwrap());
        let mut tasks = vec![];
        let mut peers = vec![];
        for id in 1..=2 {
            let (client, server) = tokio::io::duplex(64 * 1024);
            tasks.push(ctx.spawn(ConnectionId(id), format!("peer{}", id), server));
            let (read, write) = tokio::io::split(client);
            let mut peer = Peer { reader: FrameReader::new(read), writer: write };
            establish_1_3(&mut peer, 0x77).await;
            peers.push(peer);
        }
        let first = tasks.remove(0);
        assert_eq!(first.await.unwrap(), CloseReason::Replaced);
        let switch = ctx.registry.get(0x77).unwrap();
        assert_eq!(switch.connection().unwrap().id(), ConnectionId(2));
        assert_eq!(ctx.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_keeps_switch_interfaces_and_flows() {
        let (ctx, events, mut peer, task) = start(Settings::default());
        establish_1_3(&mut peer, 0x33).await;
        let status = of13::PortStatus { reason: crate::message::PortReason::PortAdd, desc: of13::tests::port(3) };
        peer.send(9, Message::V0x04(of13::Message::PortStatus(status))).await;
        peer.close().await;
        assert_eq!(task.await.unwrap(), CloseReason::Eof);

        let switch = ctx.registry.get(0x33).unwrap();
        assert!(!switch.is_connected());
        let interface = switch.interface(3).unwrap();
        let flow = crate::flow::Flow::V0x04(crate::flow::Flow0x04::new(0x33, of13::tests::sample_match(), vec![]));
        let flow_id = switch.insert_flow(flow.clone());

        let (client, server) = tokio::io::duplex(64 * 1024);
        let second = ctx.spawn(ConnectionId(2), "10.0.0.1:50001".to_string(), server);
        let (read, write) = tokio::io::split(client);
        let mut peer = Peer { reader: FrameReader::new(read), writer: write };
        establish_1_3(&mut peer, 0x33).await;

        let again = ctx.registry.get(0x33).unwrap();
        assert!(Arc::ptr_eq(&switch, &again));
        assert!(Arc::ptr_eq(&interface, &again.interface(3).unwrap()));
        assert_eq!(again.flow(&flow_id), Some(flow));
        assert_eq!(again.connection().unwrap().id(), ConnectionId(2));
        assert_eq!(ctx.registry.len(), 1);
        let completed = events.names().into_iter().filter(|n| *n == "switch.handshake_completed").count();
        assert_eq!(completed, 2);

        peer.close().await;
        assert_eq!(second.await.unwrap(), CloseReason::Eof);
    }

    #[tokio::test]
    async fn test_frame_reader_splits_coalesced_frames() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut bytes = OfpCodec.encode(1, Message::features_request(1).unwrap()).unwrap();
        bytes.extend(OfpCodec.encode(2, Message::echo_request(1, vec![1, 2, 3]).unwrap()).unwrap());
        client.write_all(&bytes).await.unwrap();
        drop(client);

        let mut reader = FrameReader::new(server);
        assert_eq!(reader.next_frame().await.unwrap().unwrap().len(), 8);
        assert_eq!(reader.next_frame().await.unwrap().unwrap().len(), 11);
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frame_reader_rejects_short_length() {
        let (mut client, server) = tokio::io::duplex(1024);
        client.write_all(&[4, 0, 0, 4, 0, 0, 0, 1]).await.unwrap();
        let mut reader = FrameReader::new(server);
        assert_eq!(reader.next_frame().await.unwrap_err().kind(), io::ErrorKind::InvalidData);
    }
}
