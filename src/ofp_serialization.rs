use crate::message::{GenericHello, Message};
use crate::ofp_header::{OfpHeader, Xid, OPENFLOW_0_01_VERSION, OPENFLOW_0_04_VERSION};
use crate::ofp_message::{OfpMessage, OfpSerializationError};
use crate::openflow0x01;
use crate::openflow0x04;
use crate::openflow0x04::MessageType;

/// Hello carries type code 0 in every protocol version.
const HELLO_TYPE_CODE: u8 = 0;

/// Converts between complete OpenFlow frames (header included) and typed messages.
pub trait MessageCodec: Send + Sync {
    /// Decode a frame of the negotiated `version`.
    fn decode(&self, version: u8, frame: &[u8]) -> Result<(Xid, Message), OfpSerializationError>;
    /// Decode a Hello of any version, before a version has been agreed upon.
    fn decode_hello(&self, frame: &[u8]) -> Result<GenericHello, OfpSerializationError>;
    fn encode(&self, xid: Xid, message: Message) -> Result<Vec<u8>, OfpSerializationError>;
}

/// Codec for the OpenFlow 1.0 and 1.3 messages implemented by this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfpCodec;

fn split_frame(frame: &[u8]) -> Result<(OfpHeader, &[u8]), OfpSerializationError> {
    let header = OfpHeader::parse(frame)?;
    if header.length() != frame.len() {
        return Err(OfpSerializationError::UnexpectedValueError {
            value: header.length().to_string(),
            field: "length".to_string(),
            message: format!("frame of {} bytes", frame.len()),
        });
    }
    Ok((header, &frame[OfpHeader::size()..]))
}

pub fn parse(header: &OfpHeader, body: &[u8]) -> Result<(Xid, Message), OfpSerializationError> {
    match header.version() {
        OPENFLOW_0_01_VERSION => {
            openflow0x01::Message::parse(header, body).map(|(xid, m)| (xid, Message::V0x01(m)))
        }
        OPENFLOW_0_04_VERSION => {
            openflow0x04::Message::parse(header, body).map(|(xid, m)| (xid, Message::V0x04(m)))
        }
        v => Err(OfpSerializationError::UnsupportedVersion { version: v }),
    }
}

pub fn marshal(xid: Xid, message: Message) -> Result<Vec<u8>, OfpSerializationError> {
    match message {
        Message::V0x01(m) => openflow0x01::Message::marshal(xid, m),
        Message::V0x04(m) => openflow0x04::Message::marshal(xid, m),
    }
}

impl MessageCodec for OfpCodec {
    fn decode(&self, version: u8, frame: &[u8]) -> Result<(Xid, Message), OfpSerializationError> {
        let (header, body) = split_frame(frame)?;
        if header.version() != version {
            return Err(OfpSerializationError::UnexpectedValueError {
                value: header.version().to_string(),
                field: "version".to_string(),
                message: format!("connection negotiated at version {}", version),
            });
        }
        parse(&header, body)
    }

    fn decode_hello(&self, frame: &[u8]) -> Result<GenericHello, OfpSerializationError> {
        let (header, body) = split_frame(frame)?;
        if header.type_code() != HELLO_TYPE_CODE {
            return Err(OfpSerializationError::UnexpectedValueError {
                value: header.type_code().to_string(),
                field: "type".to_string(),
                message: "hello".to_string(),
            });
        }
        // Hello elements exist from 1.3 on; older peers send a bare header.
        let versions = if header.version() >= OPENFLOW_0_04_VERSION {
            openflow0x04::Hello::parse(body)?.versions()
        } else {
            None
        };
        Ok(GenericHello {
            version: header.version(),
            xid: header.xid(),
            versions,
        })
    }

    fn encode(&self, xid: Xid, message: Message) -> Result<Vec<u8>, OfpSerializationError> {
        marshal(xid, message)
    }
}
