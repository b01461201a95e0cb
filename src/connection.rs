//! Handshake and lifecycle state of one switch connection.
//!
//! `Connection` is the state machine proper. It performs no I/O: it validates
//! transitions, decides what to do with each incoming message type and returns the
//! messages to send. `ConnectionHandle` is the shareable sending side of a running
//! connection.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::message::{ErrorMsg, GenericHello, Message};
use crate::negotiation::{NegotiationError, VersionNegotiator};
use crate::ofp_header::Xid;
use crate::ofp_message::OfpSerializationError;
use crate::openflow::MsgCode;
use crate::switch::Dpid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Created,
    HelloSent,
    VersionNegotiated,
    FeaturesRequested,
    Established,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed || self == ConnectionState::Failed
    }

    /// Whether the handshake is still running.
    pub fn is_handshake(self) -> bool {
        match self {
            ConnectionState::Created
            | ConnectionState::HelloSent
            | ConnectionState::VersionNegotiated
            | ConnectionState::FeaturesRequested => true,
            _ => false,
        }
    }

    fn can_become(self, next: ConnectionState) -> bool {
        use self::ConnectionState::*;
        match (self, next) {
            (Created, HelloSent)
            | (HelloSent, VersionNegotiated)
            | (VersionNegotiated, FeaturesRequested)
            | (FeaturesRequested, Established) => true,
            (from, Closed) | (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a connection went away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The switch closed the transport.
    Eof,
    Io(String),
    HandshakeTimeout,
    KeepaliveTimeout,
    NegotiationFailed,
    /// The switch reported an error while the handshake was running.
    PeerError { error_type: u16, code: u16 },
    MalformedHandshake(String),
    UnexpectedMessage(MsgCode),
    /// A newer connection of the same switch took over.
    Replaced,
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CloseReason::Eof => write!(f, "connection closed by peer"),
            CloseReason::Io(ref e) => write!(f, "I/O error: {}", e),
            CloseReason::HandshakeTimeout => write!(f, "handshake timed out"),
            CloseReason::KeepaliveTimeout => write!(f, "keepalive timed out"),
            CloseReason::NegotiationFailed => write!(f, "version negotiation failed"),
            CloseReason::PeerError { error_type, code } => {
                write!(f, "peer error type {} code {} during handshake", error_type, code)
            }
            CloseReason::MalformedHandshake(ref e) => write!(f, "malformed handshake message: {}", e),
            CloseReason::UnexpectedMessage(code) => write!(f, "unexpected {} during handshake", code),
            CloseReason::Replaced => write!(f, "replaced by a newer connection"),
            CloseReason::Shutdown => write!(f, "controller shutdown"),
        }
    }
}

#[derive(Debug, Fail)]
pub enum ConnectionError {
    #[fail(display = "Invalid connection state transition from {} to {}", from, to)]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
    #[fail(display = "Switch {:016x} is not connected", dpid)]
    NotConnected {
        dpid: Dpid,
    },
    #[fail(display = "Connection {} is closed", id)]
    WriterClosed {
        id: ConnectionId,
    },
    #[fail(display = "Writer queue of connection {} is full", id)]
    WriterFull {
        id: ConnectionId,
    },
    #[fail(display = "Message of version {} sent on a connection speaking version {}", actual, expected)]
    VersionMismatch {
        expected: u8,
        actual: u8,
    },
    #[fail(display = "{}", error)]
    Serialization {
        error: OfpSerializationError,
    },
}

impl From<OfpSerializationError> for ConnectionError {
    fn from(error: OfpSerializationError) -> Self {
        ConnectionError::Serialization { error }
    }
}

/// Sending side of a connection, shared with the switch model and the controller.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: String,
    /// Zero until the version is negotiated.
    version: AtomicU8,
    next_xid: AtomicU32,
    writer: mpsc::Sender<(Xid, Message)>,
    control: mpsc::Sender<CloseReason>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, peer: String, writer: mpsc::Sender<(Xid, Message)>,
               control: mpsc::Sender<CloseReason>) -> ConnectionHandle {
        ConnectionHandle {
            id,
            peer,
            version: AtomicU8::new(0),
            next_xid: AtomicU32::new(1),
            writer,
            control,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Negotiated version, if any.
    pub fn version(&self) -> Option<u8> {
        match self.version.load(Ordering::SeqCst) {
            0 => None,
            v => Some(v),
        }
    }

    pub(crate) fn set_version(&self, version: u8) {
        self.version.store(version, Ordering::SeqCst);
    }

    pub fn next_xid(&self) -> Xid {
        self.next_xid.fetch_add(1, Ordering::Relaxed)
    }

    /// Queue `message` under a fresh transaction id and return that id.
    pub fn send(&self, message: Message) -> Result<Xid, ConnectionError> {
        let xid = self.next_xid();
        self.send_with_xid(xid, message)?;
        Ok(xid)
    }

    /// Queue `message` under `xid`. Once negotiated, only messages of the connection's
    /// version are accepted.
    pub fn send_with_xid(&self, xid: Xid, message: Message) -> Result<(), ConnectionError> {
        if let Some(expected) = self.version() {
            if message.version() != expected {
                return Err(ConnectionError::VersionMismatch { expected, actual: message.version() });
            }
        }
        self.writer.try_send((xid, message)).map_err(|e| match e {
            TrySendError::Full(_) => ConnectionError::WriterFull { id: self.id },
            TrySendError::Closed(_) => ConnectionError::WriterClosed { id: self.id },
        })
    }

    /// Ask the connection to shut down. A connection that already stopped ignores it.
    pub fn close(&self, reason: CloseReason) {
        if self.control.try_send(reason).is_err() {
            debug!("Connection {} already closing", self.id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }
}

/// What to do with an incoming message in the current state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The peer Hello, decoded before a version is known.
    Hello,
    /// Features-Reply or Error while the handshake runs.
    Handshake,
    /// Echo traffic, answered during the handshake too.
    Echo,
    /// Held back until the handshake completes.
    Defer,
    Dispatch,
    /// Logged and dropped.
    Ignore,
    /// Fatal to the connection.
    Reject,
}

/// Result of handling the peer Hello.
#[derive(Clone, Debug, PartialEq)]
pub enum HelloOutcome {
    /// `replies` go out in order: a Hello in the agreed version when it differs from
    /// the one already sent, then the Features-Request.
    Agreed { version: u8, replies: Vec<Message> },
    /// `reply` is the incompatibility error, to be sent under `xid`.
    Rejected { error: NegotiationError, xid: Xid, reply: Message },
}

pub struct Connection {
    id: ConnectionId,
    peer: String,
    state: ConnectionState,
    version: Option<u8>,
    hello_version: Option<u8>,
    dpid: Option<Dpid>,
    last_activity: Instant,
    deferred: VecDeque<(Xid, Message)>,
    max_deferred: usize,
}

impl Connection {
    pub fn new(id: ConnectionId, peer: String, max_deferred: usize, now: Instant) -> Connection {
        Connection {
            id,
            peer,
            state: ConnectionState::Created,
            version: None,
            hello_version: None,
            dpid: None,
            last_activity: now,
            deferred: VecDeque::new(),
            max_deferred,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn dpid(&self) -> Option<Dpid> {
        self.dpid
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    fn transition(&mut self, next: ConnectionState) -> Result<(), ConnectionError> {
        if !self.state.can_become(next) {
            return Err(ConnectionError::InvalidTransition { from: self.state, to: next });
        }
        trace!("Connection {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// The Hello sent on acceptance: the highest local version, listing every local
    /// version in a bitmap when that version carries one.
    pub fn start(&mut self, negotiator: &VersionNegotiator) -> Result<Message, ConnectionError> {
        let hello = Message::hello(negotiator.highest(), negotiator.versions())?;
        self.transition(ConnectionState::HelloSent)?;
        self.hello_version = Some(negotiator.highest());
        Ok(hello)
    }

    pub fn on_hello(&mut self, negotiator: &VersionNegotiator, hello: &GenericHello)
                    -> Result<HelloOutcome, ConnectionError> {
        if self.state != ConnectionState::HelloSent {
            return Err(ConnectionError::InvalidTransition {
                from: self.state,
                to: ConnectionState::VersionNegotiated,
            });
        }
        match negotiator.negotiate(hello) {
            Ok(version) => {
                let mut replies = vec![];
                if self.hello_version != Some(version) {
                    replies.push(Message::hello(version, &[version])?);
                }
                replies.push(Message::features_request(version)?);
                self.transition(ConnectionState::VersionNegotiated)?;
                self.version = Some(version);
                self.transition(ConnectionState::FeaturesRequested)?;
                Ok(HelloOutcome::Agreed { version, replies })
            }
            Err(error) => {
                let detail = error.to_string().into_bytes();
                let reply = Message::error(negotiator.highest(), ErrorMsg::hello_failed(detail))?;
                Ok(HelloOutcome::Rejected { error, xid: hello.xid, reply })
            }
        }
    }

    pub fn admit(&self, code: MsgCode) -> Admission {
        match self.state {
            ConnectionState::Created => Admission::Reject,
            ConnectionState::HelloSent => {
                if code == MsgCode::Hello { Admission::Hello } else { Admission::Reject }
            }
            ConnectionState::VersionNegotiated | ConnectionState::FeaturesRequested => match code {
                MsgCode::FeaturesResp | MsgCode::Error => Admission::Handshake,
                c if c.is_echo() => Admission::Echo,
                MsgCode::Hello => Admission::Ignore,
                _ => Admission::Defer,
            },
            ConnectionState::Established => {
                if code == MsgCode::Hello { Admission::Ignore } else { Admission::Dispatch }
            }
            ConnectionState::Closed | ConnectionState::Failed => Admission::Ignore,
        }
    }

    /// Hold a steady-state message until the handshake completes. Returns false when
    /// the queue is full and the message was dropped.
    pub fn defer(&mut self, xid: Xid, message: Message) -> bool {
        if self.deferred.len() >= self.max_deferred {
            return false;
        }
        self.deferred.push_back((xid, message));
        true
    }

    /// Complete the handshake for `dpid`, returning the deferred messages in arrival
    /// order.
    pub fn establish(&mut self, dpid: Dpid) -> Result<Vec<(Xid, Message)>, ConnectionError> {
        self.transition(ConnectionState::Established)?;
        self.dpid = Some(dpid);
        Ok(self.deferred.drain(..).collect())
    }

    /// Move to the terminal state matching how far the connection got. Returns false
    /// when it was already terminal.
    pub fn terminate(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        let next = if self.state == ConnectionState::Established {
            ConnectionState::Closed
        } else {
            ConnectionState::Failed
        };
        self.deferred.clear();
        self.state = next;
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::openflow0x01;
    use crate::openflow0x04;

    pub fn handle(id: u64, capacity: usize)
                  -> (ConnectionHandle, mpsc::Receiver<(Xid, Message)>, mpsc::Receiver<CloseReason>) {
        let (writer, writer_rx) = mpsc::channel(capacity);
        let (control, control_rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new(ConnectionId(id), "127.0.0.1:40000".to_string(),
                                           writer, control);
        (handle, writer_rx, control_rx)
    }

    fn negotiator() -> VersionNegotiator {
        VersionNegotiator::new(&[1, 4]).unwrap()
    }

    fn started() -> Connection {
        let mut conn = Connection::new(ConnectionId(1), "peer".to_string(), 2, Instant::now());
        conn.start(&negotiator()).unwrap();
        conn
    }

    #[test]
    fn test_start_sends_highest_hello_with_bitmap() {
        let mut conn = Connection::new(ConnectionId(1), "peer".to_string(), 2, Instant::now());
        let hello = conn.start(&negotiator()).unwrap();
        assert_eq!(conn.state(), ConnectionState::HelloSent);
        match hello {
            Message::V0x04(openflow0x04::Message::Hello(ref h)) => assert_eq!(h.versions(), Some(vec![1, 4])),
            ref other => panic!("unexpected {:?}", other),
        }
        assert!(conn.start(&negotiator()).is_err());
    }

    #[test]
    fn test_hello_1_0_peer_gets_rehello() {
        let mut conn = started();
        let outcome = conn.on_hello(&negotiator(), &GenericHello { version: 1, xid: 5, versions: None });
        assert_eq!(outcome.unwrap(), HelloOutcome::Agreed {
            version: 1,
            replies: vec![
                Message::V0x01(openflow0x01::Message::Hello),
                Message::V0x01(openflow0x01::Message::FeaturesReq),
            ],
        });
        assert_eq!(conn.state(), ConnectionState::FeaturesRequested);
        assert_eq!(conn.version(), Some(1));
    }

    #[test]
    fn test_hello_bitmap_peer_agrees_on_1_3() {
        let mut conn = started();
        let outcome = conn
            .on_hello(&negotiator(), &GenericHello { version: 4, xid: 5, versions: Some(vec![1, 4]) })
            .unwrap();
        assert_eq!(outcome, HelloOutcome::Agreed {
            version: 4,
            replies: vec![Message::V0x04(openflow0x04::Message::FeaturesReq)],
        });
    }

    #[test]
    fn test_incompatible_hello_fails_with_error_reply() {
        let mut conn = started();
        let outcome = conn
            .on_hello(&negotiator(), &GenericHello { version: 6, xid: 77, versions: Some(vec![6]) })
            .unwrap();
        match outcome {
            HelloOutcome::Rejected { xid, reply: Message::V0x04(openflow0x04::Message::Error(ref e)), .. } => {
                assert_eq!(xid, 77);
                assert_eq!((e.error_type, e.code), (0, 0));
            }
            other => panic!("unexpected {:?}", other),
        }
        // the runtime closes the connection, which makes it fail
        assert_eq!(conn.state(), ConnectionState::HelloSent);
        assert!(conn.terminate());
        assert_eq!(conn.state(), ConnectionState::Failed);
        assert!(!conn.terminate());
    }

    #[test]
    fn test_admission_by_state() {
        let mut conn = started();
        assert_eq!(conn.admit(MsgCode::Hello), Admission::Hello);
        assert_eq!(conn.admit(MsgCode::PortStatus), Admission::Reject);

        conn.on_hello(&negotiator(), &GenericHello { version: 4, xid: 1, versions: None }).unwrap();
        assert_eq!(conn.admit(MsgCode::FeaturesResp), Admission::Handshake);
        assert_eq!(conn.admit(MsgCode::Error), Admission::Handshake);
        assert_eq!(conn.admit(MsgCode::EchoReq), Admission::Echo);
        assert_eq!(conn.admit(MsgCode::PortStatus), Admission::Defer);

        conn.establish(0x1).unwrap();
        assert_eq!(conn.admit(MsgCode::PortStatus), Admission::Dispatch);
        assert_eq!(conn.admit(MsgCode::Hello), Admission::Ignore);
    }

    #[test]
    fn test_deferred_messages_are_bounded_and_replayed_in_order() {
        let mut conn = started();
        conn.on_hello(&negotiator(), &GenericHello { version: 1, xid: 1, versions: None }).unwrap();
        assert!(conn.defer(10, Message::V0x01(openflow0x01::Message::BarrierReply)));
        assert!(conn.defer(11, Message::V0x01(openflow0x01::Message::GetConfigReq)));
        assert!(!conn.defer(12, Message::V0x01(openflow0x01::Message::BarrierRequest)));

        let replay = conn.establish(0x2).unwrap();
        assert_eq!(replay.iter().map(|&(xid, _)| xid).collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(conn.deferred_len(), 0);
        assert_eq!(conn.dpid(), Some(0x2));
    }

    #[test]
    fn test_terminate_once() {
        let mut conn = started();
        conn.on_hello(&negotiator(), &GenericHello { version: 1, xid: 1, versions: None }).unwrap();
        conn.establish(3).unwrap();
        assert!(conn.terminate());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!conn.terminate());
        assert!(conn.establish(3).is_err());
    }

    #[test]
    fn test_handle_enforces_version_and_assigns_xids() {
        let (handle, mut rx, _control) = handle(1, 4);
        handle.set_version(1);
        assert!(handle.send(Message::features_request(4).unwrap()).is_err());
        let first = handle.send(Message::features_request(1).unwrap()).unwrap();
        let second = handle.send(Message::features_request(1).unwrap()).unwrap();
        assert_ne!(first, second);
        assert_eq!(rx.try_recv().unwrap().0, first);
    }

    #[test]
    fn test_handle_reports_full_queue() {
        let (handle, _rx, _control) = handle(1, 1);
        handle.send(Message::features_request(1).unwrap()).unwrap();
        match handle.send(Message::features_request(1).unwrap()) {
            Err(ConnectionError::WriterFull { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }
}
