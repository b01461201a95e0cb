use std::io;

use crate::ofp_header::{OfpHeader, Xid};
use crate::openflow::MsgCode;

#[derive(Debug, Fail)]
pub enum OfpSerializationError {
    #[fail(display = "IO Error: {}", error)]
    IoError {
        error: io::Error,
    },
    #[fail(display = "Unexpected value '{}' at field '{}' of '{}'", value, field, message)]
    UnexpectedValueError {
        value: String,
        field: String,
        message: String,
    },
    #[fail(display = "Parsing error: {}", message)]
    ParsingError {
        message: String,
    },
    #[fail(display = "Unsupported OpenFlow version: {}", version)]
    UnsupportedVersion {
        version: u8
    },
    #[fail(display = "Unsupported OpenFlow message code {} for version: {}", code, version)]
    UnsupportedMessageCode {
        version: u8,
        code: u8
    },
    #[fail(display = "{} is not implemented for OpenFlow version {}", feature, version)]
    UnimplementedFeatureInVersion {
        version: u8,
        feature: String
    },
}

impl OfpSerializationError {
    pub fn from_io_result(result: io::Result<()>) -> Result<(), OfpSerializationError> {
        result.map_err(OfpSerializationError::from)
    }

    pub fn truncated(message: &str) -> OfpSerializationError {
        OfpSerializationError::ParsingError {
            message: format!("{} is truncated", message)
        }
    }
}

impl From<io::Error> for OfpSerializationError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => OfpSerializationError::ParsingError {
                message: "unexpected end of message".to_string()
            },
            _ => OfpSerializationError::IoError { error },
        }
    }
}

/// OpenFlow Message
///
/// Version-specific API for handling OpenFlow messages at the byte-buffer level.
/// Each protocol version implements it for its own message enum.
pub trait OfpMessage: Sized {
    /// Return the wire version spoken by this message type.
    fn version() -> u8;
    /// Map a message to its OpenFlow message type code.
    fn msg_code(msg: &Self) -> MsgCode;
    /// Return a marshaled buffer containing an OpenFlow header and the message `msg`.
    fn marshal(xid: Xid, msg: Self) -> Result<Vec<u8>, OfpSerializationError>;
    /// Returns a pair `(Xid, OfpMessage)` of the transaction id and OpenFlow message parsed from
    /// the given OpenFlow header `header`, and body buffer `buf`.
    fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(Xid, Self), OfpSerializationError>;
}
