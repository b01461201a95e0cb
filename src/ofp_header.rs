use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use crate::ofp_message::OfpSerializationError;

pub const OFP_HEADER_LENGTH: usize = 8;

pub type Xid = u32;

pub const OPENFLOW_0_01_VERSION: u8 = 1; // 1.0
pub const OPENFLOW_0_04_VERSION: u8 = 4; // 1.3

/// Protocol versions this crate can speak, lowest first.
pub const SUPPORTED_VERSIONS: [u8; 2] = [OPENFLOW_0_01_VERSION, OPENFLOW_0_04_VERSION];

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol version.
/// This is parsed to determine version and length of the remaining message, so that
/// it can be properly handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: u32,
}

impl OfpHeader {
    /// Create an `OfpHeader` out of the arguments.
    pub fn new(version: u8, typ: u8, length: u16, xid: u32) -> OfpHeader {
        OfpHeader {
            version,
            typ,
            length,
            xid,
        }
    }

    /// Return the byte-size of an `OfpHeader`.
    pub fn size() -> usize {
        OFP_HEADER_LENGTH
    }

    /// Fills a message buffer with the header fields of an `OfpHeader`.
    pub fn marshal(bytes: &mut Vec<u8>, header: OfpHeader) {
        bytes.push(header.version);
        bytes.push(header.typ);
        bytes.extend_from_slice(&header.length.to_be_bytes());
        bytes.extend_from_slice(&header.xid.to_be_bytes());
    }

    /// Takes a message buffer (at least sized for an `OfpHeader`) and returns an `OfpHeader`.
    pub fn parse(buf: &[u8]) -> Result<Self, OfpSerializationError> {
        if buf.len() < OFP_HEADER_LENGTH {
            return Err(OfpSerializationError::truncated("OpenFlow header"));
        }
        let mut bytes = Cursor::new(buf);
        OfpHeader::parse_from_cursor(&mut bytes)
    }

    pub fn parse_from_cursor(bytes: &mut Cursor<&[u8]>) -> Result<Self, OfpSerializationError> {
        let header = OfpHeader {
            version: bytes.read_u8()?,
            typ: bytes.read_u8()?,
            length: bytes.read_u16::<BigEndian>()?,
            xid: bytes.read_u32::<BigEndian>()?,
        };
        if header.length() < OFP_HEADER_LENGTH {
            return Err(OfpSerializationError::UnexpectedValueError {
                value: header.length.to_string(),
                field: "length".to_string(),
                message: "OpenFlow header".to_string(),
            });
        }
        Ok(header)
    }

    /// Return the `version` field of a header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Return the raw OpenFlow message type code of a header. Its meaning depends on
    /// the header version.
    pub fn type_code(&self) -> u8 {
        self.typ
    }

    /// Return the `length` field of a header. Includes the length of the header itself.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Return the `xid` field of a header, the transaction id associated with this packet.
    ///  Replies use the same id to facilitate pairing.
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

/// Rewrite the header length field of a fully marshaled message to its actual size.
pub fn patch_length(bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
    let length = bytes.len();
    if length < OFP_HEADER_LENGTH || length > u16::max_value() as usize {
        return Err(OfpSerializationError::UnexpectedValueError {
            value: length.to_string(),
            field: "length".to_string(),
            message: "OpenFlow header".to_string(),
        });
    }
    bytes[2..4].copy_from_slice(&(length as u16).to_be_bytes());
    Ok(())
}
