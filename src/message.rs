//! Wire-level types shared by every protocol version, and the version-tagged
//! `Message` the rest of the crate passes around.

use std::fmt;

use crate::ofp_header::{Xid, OPENFLOW_0_01_VERSION, OPENFLOW_0_04_VERSION};
use crate::ofp_message::{OfpMessage, OfpSerializationError};
use crate::openflow::MsgCode;
use crate::openflow0x01;
use crate::openflow0x04;

/// `OFPET_HELLO_FAILED`, identical in 1.0 and 1.3.
pub const ERROR_TYPE_HELLO_FAILED: u16 = 0;
/// `OFPHFC_INCOMPATIBLE`.
pub const HELLO_FAILED_INCOMPATIBLE: u16 = 0;

/// Buffer id meaning "no buffer".
pub const NO_BUFFER: u32 = 0xffff_ffff;

/// How long before a flow entry expires.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Timeout {
    Permanent,
    ExpiresAfter(u16),
}

impl Timeout {
    pub fn of_int(tm: u16) -> Timeout {
        match tm {
            0 => Timeout::Permanent,
            d => Timeout::ExpiresAfter(d),
        }
    }

    pub fn to_int(tm: Timeout) -> u16 {
        match tm {
            Timeout::Permanent => 0,
            Timeout::ExpiresAfter(d) => d,
        }
    }
}

/// The data associated with a packet received by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Buffered(u32, Vec<u8>),
    NotBuffered(Vec<u8>),
}

impl Payload {
    pub fn of_buffer_id(buffer_id: u32, data: Vec<u8>) -> Payload {
        match buffer_id {
            NO_BUFFER => Payload::NotBuffered(data),
            n => Payload::Buffered(n, data),
        }
    }

    pub fn buffer_id(&self) -> u32 {
        match *self {
            Payload::Buffered(n, _) => n,
            Payload::NotBuffered(_) => NO_BUFFER,
        }
    }

    pub fn data(&self) -> &[u8] {
        match *self {
            Payload::Buffered(_, ref buf) | Payload::NotBuffered(ref buf) => buf,
        }
    }
}

/// What changed about a physical port.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PortReason {
    PortAdd,
    PortDelete,
    PortModify,
}

impl PortReason {
    pub fn of_int(reason: u8) -> Result<PortReason, OfpSerializationError> {
        match reason {
            0 => Ok(PortReason::PortAdd),
            1 => Ok(PortReason::PortDelete),
            2 => Ok(PortReason::PortModify),
            r => Err(OfpSerializationError::UnexpectedValueError {
                value: format!("{:x}", r),
                field: "reason".to_string(),
                message: "port status".to_string(),
            }),
        }
    }

    pub fn to_int(self) -> u8 {
        match self {
            PortReason::PortAdd => 0,
            PortReason::PortDelete => 1,
            PortReason::PortModify => 2,
        }
    }
}

/// Reason a flow was removed from a switch
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FlowRemovedReason {
    IdleTimeout,
    HardTimeout,
    Delete,
    GroupDelete,
}

impl FlowRemovedReason {
    pub fn of_int(reason: u8) -> Result<FlowRemovedReason, OfpSerializationError> {
        match reason {
            0 => Ok(FlowRemovedReason::IdleTimeout),
            1 => Ok(FlowRemovedReason::HardTimeout),
            2 => Ok(FlowRemovedReason::Delete),
            3 => Ok(FlowRemovedReason::GroupDelete),
            r => Err(OfpSerializationError::UnexpectedValueError {
                value: format!("{:x}", r),
                field: "reason".to_string(),
                message: "flow removed".to_string(),
            }),
        }
    }

    pub fn to_int(self) -> u8 {
        match self {
            FlowRemovedReason::IdleTimeout => 0,
            FlowRemovedReason::HardTimeout => 1,
            FlowRemovedReason::Delete => 2,
            FlowRemovedReason::GroupDelete => 3,
        }
    }
}

/// Type of modification to perform on a flow table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowModCmd {
    AddFlow,
    ModFlow,
    ModStrictFlow,
    DeleteFlow,
    DeleteStrictFlow,
}

impl FlowModCmd {
    pub fn of_int(cmd: u16) -> Result<FlowModCmd, OfpSerializationError> {
        match cmd {
            0 => Ok(FlowModCmd::AddFlow),
            1 => Ok(FlowModCmd::ModFlow),
            2 => Ok(FlowModCmd::ModStrictFlow),
            3 => Ok(FlowModCmd::DeleteFlow),
            4 => Ok(FlowModCmd::DeleteStrictFlow),
            c => Err(OfpSerializationError::UnexpectedValueError {
                value: format!("{:x}", c),
                field: "command".to_string(),
                message: "flow mod".to_string(),
            }),
        }
    }

    pub fn to_int(self) -> u16 {
        match self {
            FlowModCmd::AddFlow => 0,
            FlowModCmd::ModFlow => 1,
            FlowModCmd::ModStrictFlow => 2,
            FlowModCmd::DeleteFlow => 3,
            FlowModCmd::DeleteStrictFlow => 4,
        }
    }

    pub fn is_delete(self) -> bool {
        match self {
            FlowModCmd::DeleteFlow | FlowModCmd::DeleteStrictFlow => true,
            _ => false,
        }
    }
}

/// Error message (datapath <-> controller). The meaning of `error_type` and `code`
/// depends on the protocol version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorMsg {
    pub error_type: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

impl ErrorMsg {
    pub fn hello_failed(data: Vec<u8>) -> ErrorMsg {
        ErrorMsg {
            error_type: ERROR_TYPE_HELLO_FAILED,
            code: HELLO_FAILED_INCOMPATIBLE,
            data,
        }
    }
}

/// Flags and packet-in size the controller configures after the handshake.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SwitchConfig {
    pub flags: u16,
    pub miss_send_len: u16,
}

/// `OFPC_FRAG_NORMAL`: no special handling for IP fragments.
pub const CONFIG_FRAG_NORMAL: u16 = 0;
/// Send the whole packet on packet-in.
pub const MISS_SEND_LEN_FULL: u16 = 0xffff;

impl SwitchConfig {
    /// Fragments handled by the switch, complete packets sent on packet-in.
    pub fn full_packet_in() -> SwitchConfig {
        SwitchConfig {
            flags: CONFIG_FRAG_NORMAL,
            miss_send_len: MISS_SEND_LEN_FULL,
        }
    }
}

/// Body of a description statistics reply.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DescStats {
    pub manufacturer_desc: String,
    pub hardware_desc: String,
    pub software_desc: String,
    pub serial_number: String,
    pub datapath_desc: String,
}

/// A Hello as seen before any version has been agreed upon: the header version, the
/// transaction id and, if the peer sent a version bitmap element, the versions it lists.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenericHello {
    pub version: u8,
    pub xid: Xid,
    pub versions: Option<Vec<u8>>,
}

/// A typed OpenFlow message tagged with its protocol version.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    V0x01(openflow0x01::Message),
    V0x04(openflow0x04::Message),
}

impl Message {
    pub fn version(&self) -> u8 {
        match *self {
            Message::V0x01(_) => OPENFLOW_0_01_VERSION,
            Message::V0x04(_) => OPENFLOW_0_04_VERSION,
        }
    }

    pub fn msg_code(&self) -> MsgCode {
        match *self {
            Message::V0x01(ref m) => openflow0x01::Message::msg_code(m),
            Message::V0x04(ref m) => openflow0x04::Message::msg_code(m),
        }
    }

    /// A plain Hello in the given version. 1.3 Hellos also advertise `versions` in a
    /// bitmap element.
    pub fn hello(version: u8, versions: &[u8]) -> Result<Message, OfpSerializationError> {
        match version {
            OPENFLOW_0_01_VERSION => Ok(Message::V0x01(openflow0x01::Message::Hello)),
            OPENFLOW_0_04_VERSION => Ok(Message::V0x04(openflow0x04::Message::Hello(
                openflow0x04::Hello::with_versions(versions),
            ))),
            v => Err(OfpSerializationError::UnsupportedVersion { version: v }),
        }
    }

    pub fn features_request(version: u8) -> Result<Message, OfpSerializationError> {
        match version {
            OPENFLOW_0_01_VERSION => Ok(Message::V0x01(openflow0x01::Message::FeaturesReq)),
            OPENFLOW_0_04_VERSION => Ok(Message::V0x04(openflow0x04::Message::FeaturesReq)),
            v => Err(OfpSerializationError::UnsupportedVersion { version: v }),
        }
    }

    pub fn echo_request(version: u8, data: Vec<u8>) -> Result<Message, OfpSerializationError> {
        match version {
            OPENFLOW_0_01_VERSION => Ok(Message::V0x01(openflow0x01::Message::EchoRequest(data))),
            OPENFLOW_0_04_VERSION => Ok(Message::V0x04(openflow0x04::Message::EchoRequest(data))),
            v => Err(OfpSerializationError::UnsupportedVersion { version: v }),
        }
    }

    /// The Echo-Reply answering this message, if it is an Echo-Request.
    pub fn echo_reply_to(&self) -> Option<Message> {
        match *self {
            Message::V0x01(openflow0x01::Message::EchoRequest(ref data)) => {
                Some(Message::V0x01(openflow0x01::Message::EchoReply(data.clone())))
            }
            Message::V0x04(openflow0x04::Message::EchoRequest(ref data)) => {
                Some(Message::V0x04(openflow0x04::Message::EchoReply(data.clone())))
            }
            _ => None,
        }
    }

    pub fn error(version: u8, error: ErrorMsg) -> Result<Message, OfpSerializationError> {
        match version {
            OPENFLOW_0_01_VERSION => Ok(Message::V0x01(openflow0x01::Message::Error(error))),
            OPENFLOW_0_04_VERSION => Ok(Message::V0x04(openflow0x04::Message::Error(error))),
            v => Err(OfpSerializationError::UnsupportedVersion { version: v }),
        }
    }

    pub fn set_config(version: u8, config: SwitchConfig) -> Result<Message, OfpSerializationError> {
        match version {
            OPENFLOW_0_01_VERSION => Ok(Message::V0x01(openflow0x01::Message::SetConfig(config))),
            OPENFLOW_0_04_VERSION => Ok(Message::V0x04(openflow0x04::Message::SetConfig(config))),
            v => Err(OfpSerializationError::UnsupportedVersion { version: v }),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(v0x{:02x})", self.msg_code(), self.version())
    }
}
