use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::{bit, bitmap_members, test_bit};
use crate::message::{DescStats, ErrorMsg, FlowModCmd, FlowRemovedReason, Payload, PortReason,
                     SwitchConfig, Timeout, NO_BUFFER};
use crate::ofp_header::{patch_length, OfpHeader, Xid, OPENFLOW_0_04_VERSION};
use crate::ofp_message::{OfpMessage, OfpSerializationError};
use crate::ofp_utils::{align_8, pad_to_8, read_bytes, read_fixed_size_string, read_mac,
                       read_to_end, remaining, skip, write_fixed_size_string, write_padding_bytes,
                       MacAddr};
use crate::openflow::MsgCode;
use crate::openflow0x01::{marshal_desc_stats, parse_desc_stats};

pub const ALL_TABLES: u8 = 0xff;
/// `OFPG_ANY`: no restriction on the output group.
pub const ANY_GROUP: u32 = 0xffff_ffff;

const OFP_MAX_PORT_NAME_LEN: usize = 16;

const PORT_LENGTH: usize = 64;
const SWITCH_FEATURES_LENGTH: usize = 24;
const FLOW_MOD_FIXED_LENGTH: usize = 40;
const FLOW_REMOVED_FIXED_LENGTH: usize = 40;
const FLOW_STATS_FIXED_LENGTH: usize = 48;
const PORT_STATS_LENGTH: usize = 112;

/// `OFPMPF_REPLY_MORE`: more replies follow for this transaction.
pub const MULTIPART_REPLY_MORE: u16 = 1;

/// Common API for the body of messages implementing OpenFlow Message Codes (see `MsgCode` enum).
pub trait MessageType: Sized {
    /// Parse a body buffer into a message.
    fn parse(buf: &[u8]) -> Result<Self, OfpSerializationError>;
    /// Marshal a message body into a `u8` buffer.
    fn marshal(msg: &Self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError>;
}

fn bad_length(len: usize, message: &str) -> OfpSerializationError {
    OfpSerializationError::UnexpectedValueError {
        value: len.to_string(),
        field: "length".to_string(),
        message: message.to_string(),
    }
}

const OFPHET_VERSIONBITMAP: u16 = 1;

/// An element carried in the body of a Hello.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HelloElement {
    /// Bitmap of supported versions: bit `n` of the bitmap stands for wire version `n`.
    VersionBitmap(Vec<u32>),
    Unknown(u16, Vec<u8>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hello {
    pub elements: Vec<HelloElement>,
}

impl Hello {
    /// A Hello advertising every version of `versions` in a bitmap element.
    pub fn with_versions(versions: &[u8]) -> Hello {
        let mut words = vec![];
        for v in versions {
            let word = (*v / 32) as usize;
            if words.len() <= word {
                words.resize(word + 1, 0u32);
            }
            words[word] = bit((*v % 32) as u64, words[word] as u64, true) as u32;
        }
        Hello {
            elements: if words.is_empty() { vec![] } else { vec![HelloElement::VersionBitmap(words)] },
        }
    }

    /// The versions listed in the first bitmap element, if there is one.
    pub fn versions(&self) -> Option<Vec<u8>> {
        self.elements.iter().filter_map(|e| match *e {
            HelloElement::VersionBitmap(ref words) => Some(
                bitmap_members(words).into_iter().filter(|v| *v <= 0xff).map(|v| v as u8).collect()
            ),
            HelloElement::Unknown(..) => None,
        }).next()
    }
}

impl MessageType for Hello {
    fn parse(buf: &[u8]) -> Result<Hello, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let mut elements = vec![];
        while remaining(&bytes) >= 4 {
            let typ = bytes.read_u16::<BigEndian>()?;
            let len = bytes.read_u16::<BigEndian>()? as usize;
            if len < 4 || remaining(&bytes) < len - 4 {
                return Err(bad_length(len, "hello element"));
            }
            let body = read_bytes(&mut bytes, len - 4)?;
            let element = if typ == OFPHET_VERSIONBITMAP {
                let mut words = vec![];
                let mut body = Cursor::new(&body[..]);
                while remaining(&body) >= 4 {
                    words.push(body.read_u32::<BigEndian>()?);
                }
                HelloElement::VersionBitmap(words)
            } else {
                HelloElement::Unknown(typ, body)
            };
            elements.push(element);
            let padding = (align_8(len) - len).min(remaining(&bytes));
            skip(&mut bytes, padding)?;
        }
        Ok(Hello { elements })
    }

    fn marshal(hello: &Hello, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        for element in &hello.elements {
            let start = bytes.len();
            match *element {
                HelloElement::VersionBitmap(ref words) => {
                    bytes.write_u16::<BigEndian>(OFPHET_VERSIONBITMAP)?;
                    bytes.write_u16::<BigEndian>((4 + 4 * words.len()) as u16)?;
                    for w in words {
                        bytes.write_u32::<BigEndian>(*w)?;
                    }
                }
                HelloElement::Unknown(typ, ref body) => {
                    bytes.write_u16::<BigEndian>(typ)?;
                    bytes.write_u16::<BigEndian>((4 + body.len()) as u16)?;
                    bytes.extend_from_slice(body);
                }
            }
            pad_to_8(bytes, start);
        }
        Ok(())
    }
}

#[repr(u32)]
pub enum OfpPort {
    OFPPMax = 0xffff_ff00,
    OFPPInPort = 0xffff_fff8,
    OFPPTable = 0xffff_fff9,
    OFPPNormal = 0xffff_fffa,
    OFPPFlood = 0xffff_fffb,
    OFPPAll = 0xffff_fffc,
    OFPPController = 0xffff_fffd,
    OFPPLocal = 0xffff_fffe,
    OFPPAny = 0xffff_ffff,
}

/// Port behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PseudoPort {
    PhysicalPort(u32),
    InPort,
    Table,
    Normal,
    Flood,
    AllPorts,
    /// Send to the controller, including at most this many bytes of the packet.
    Controller(u16),
    Local,
}

/// `OFPCML_NO_BUFFER`: send the complete packet to the controller.
pub const CONTROLLER_MAX_LEN_NO_BUFFER: u16 = 0xffff;

impl PseudoPort {
    pub fn of_int(p: u32) -> Result<Option<PseudoPort>, OfpSerializationError> {
        if (OfpPort::OFPPAny as u32) == p {
            Ok(None)
        } else {
            Ok(Some(PseudoPort::make(p, 0)?))
        }
    }

    pub fn make(p: u32, len: u16) -> Result<PseudoPort, OfpSerializationError> {
        let res = match p {
            p if p == (OfpPort::OFPPInPort as u32) => PseudoPort::InPort,
            p if p == (OfpPort::OFPPTable as u32) => PseudoPort::Table,
            p if p == (OfpPort::OFPPNormal as u32) => PseudoPort::Normal,
            p if p == (OfpPort::OFPPFlood as u32) => PseudoPort::Flood,
            p if p == (OfpPort::OFPPAll as u32) => PseudoPort::AllPorts,
            p if p == (OfpPort::OFPPController as u32) => PseudoPort::Controller(len),
            p if p == (OfpPort::OFPPLocal as u32) => PseudoPort::Local,
            _ => {
                if p <= (OfpPort::OFPPMax as u32) {
                    PseudoPort::PhysicalPort(p)
                } else {
                    return Err(OfpSerializationError::UnexpectedValueError {
                        value: format!("{:x}", p),
                        field: "port number".to_string(),
                        message: "pseudo port".to_string(),
                    });
                }
            }
        };
        Ok(res)
    }

    pub fn to_int(pp: PseudoPort) -> u32 {
        match pp {
            PseudoPort::PhysicalPort(p) => p,
            PseudoPort::InPort => OfpPort::OFPPInPort as u32,
            PseudoPort::Table => OfpPort::OFPPTable as u32,
            PseudoPort::Normal => OfpPort::OFPPNormal as u32,
            PseudoPort::Flood => OfpPort::OFPPFlood as u32,
            PseudoPort::AllPorts => OfpPort::OFPPAll as u32,
            PseudoPort::Controller(_) => OfpPort::OFPPController as u32,
            PseudoPort::Local => OfpPort::OFPPLocal as u32,
        }
    }

    fn option_to_int(pp: Option<PseudoPort>) -> u32 {
        pp.map(PseudoPort::to_int).unwrap_or(OfpPort::OFPPAny as u32)
    }
}

const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;

const OXM_IN_PORT: u8 = 0;
const OXM_ETH_DST: u8 = 3;
const OXM_ETH_SRC: u8 = 4;
const OXM_ETH_TYPE: u8 = 5;
const OXM_VLAN_VID: u8 = 6;
const OXM_VLAN_PCP: u8 = 7;
const OXM_IP_PROTO: u8 = 10;
const OXM_IPV4_SRC: u8 = 11;
const OXM_IPV4_DST: u8 = 12;
const OXM_TCP_SRC: u8 = 13;
const OXM_TCP_DST: u8 = 14;
const OXM_UDP_SRC: u8 = 15;
const OXM_UDP_DST: u8 = 16;

/// A single OXM TLV. Masked variants carry `Some(mask)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OxmField {
    InPort(u32),
    EthDst(MacAddr, Option<MacAddr>),
    EthSrc(MacAddr, Option<MacAddr>),
    EthType(u16),
    VlanVid(u16, Option<u16>),
    VlanPcp(u8),
    IpProto(u8),
    Ipv4Src(u32, Option<u32>),
    Ipv4Dst(u32, Option<u32>),
    TcpSrc(u16),
    TcpDst(u16),
    UdpSrc(u16),
    UdpDst(u16),
    /// A field this crate does not model; `value` holds the raw payload, mask included.
    Other {
        class: u16,
        field: u8,
        hasmask: bool,
        value: Vec<u8>,
    },
}

fn be_value(raw: &[u8]) -> u64 {
    raw.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

fn mac_of_slice(raw: &[u8]) -> MacAddr {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&raw[..6]);
    mac
}

impl OxmField {
    /// Payload width of a known basic field, and whether it may carry a mask.
    fn width(field: u8) -> Option<(usize, bool)> {
        match field {
            OXM_IN_PORT => Some((4, false)),
            OXM_ETH_DST | OXM_ETH_SRC => Some((6, true)),
            OXM_ETH_TYPE => Some((2, false)),
            OXM_VLAN_VID => Some((2, true)),
            OXM_VLAN_PCP | OXM_IP_PROTO => Some((1, false)),
            OXM_IPV4_SRC | OXM_IPV4_DST => Some((4, true)),
            OXM_TCP_SRC | OXM_TCP_DST | OXM_UDP_SRC | OXM_UDP_DST => Some((2, false)),
            _ => None,
        }
    }

    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<OxmField, OfpSerializationError> {
        let class = bytes.read_u16::<BigEndian>()?;
        let field_and_mask = bytes.read_u8()?;
        let len = bytes.read_u8()? as usize;
        let field = field_and_mask >> 1;
        let hasmask = field_and_mask & 1 == 1;
        let payload = read_bytes(bytes, len)?;

        let width = match OxmField::width(field) {
            Some((w, maskable)) if class == OFPXMC_OPENFLOW_BASIC
                && (!hasmask || maskable)
                && len == (if hasmask { 2 * w } else { w }) => w,
            _ => return Ok(OxmField::Other { class, field, hasmask, value: payload }),
        };
        let (value, mask) = payload.split_at(width);
        let mask = if hasmask { Some(mask) } else { None };
        let v = be_value(value);
        Ok(match field {
            OXM_IN_PORT => OxmField::InPort(v as u32),
            OXM_ETH_DST => OxmField::EthDst(mac_of_slice(value), mask.map(mac_of_slice)),
            OXM_ETH_SRC => OxmField::EthSrc(mac_of_slice(value), mask.map(mac_of_slice)),
            OXM_ETH_TYPE => OxmField::EthType(v as u16),
            OXM_VLAN_VID => OxmField::VlanVid(v as u16, mask.map(|m| be_value(m) as u16)),
            OXM_VLAN_PCP => OxmField::VlanPcp(v as u8),
            OXM_IP_PROTO => OxmField::IpProto(v as u8),
            OXM_IPV4_SRC => OxmField::Ipv4Src(v as u32, mask.map(|m| be_value(m) as u32)),
            OXM_IPV4_DST => OxmField::Ipv4Dst(v as u32, mask.map(|m| be_value(m) as u32)),
            OXM_TCP_SRC => OxmField::TcpSrc(v as u16),
            OXM_TCP_DST => OxmField::TcpDst(v as u16),
            OXM_UDP_SRC => OxmField::UdpSrc(v as u16),
            _ => OxmField::UdpDst(v as u16),
        })
    }

    /// Returns `(class, field, value, mask)`.
    fn components(f: &OxmField) -> (u16, u8, Vec<u8>, Option<Vec<u8>>) {
        let basic = |field: u8, value: Vec<u8>, mask: Option<Vec<u8>>| {
            (OFPXMC_OPENFLOW_BASIC, field, value, mask)
        };
        match *f {
            OxmField::InPort(p) => basic(OXM_IN_PORT, p.to_be_bytes().to_vec(), None),
            OxmField::EthDst(ref v, ref m) => basic(OXM_ETH_DST, v.to_vec(), m.map(|m| m.to_vec())),
            OxmField::EthSrc(ref v, ref m) => basic(OXM_ETH_SRC, v.to_vec(), m.map(|m| m.to_vec())),
            OxmField::EthType(t) => basic(OXM_ETH_TYPE, t.to_be_bytes().to_vec(), None),
            OxmField::VlanVid(v, m) => basic(OXM_VLAN_VID, v.to_be_bytes().to_vec(),
                                             m.map(|m| m.to_be_bytes().to_vec())),
            OxmField::VlanPcp(p) => basic(OXM_VLAN_PCP, vec![p], None),
            OxmField::IpProto(p) => basic(OXM_IP_PROTO, vec![p], None),
            OxmField::Ipv4Src(v, m) => basic(OXM_IPV4_SRC, v.to_be_bytes().to_vec(),
                                             m.map(|m| m.to_be_bytes().to_vec())),
            OxmField::Ipv4Dst(v, m) => basic(OXM_IPV4_DST, v.to_be_bytes().to_vec(),
                                             m.map(|m| m.to_be_bytes().to_vec())),
            OxmField::TcpSrc(p) => basic(OXM_TCP_SRC, p.to_be_bytes().to_vec(), None),
            OxmField::TcpDst(p) => basic(OXM_TCP_DST, p.to_be_bytes().to_vec(), None),
            OxmField::UdpSrc(p) => basic(OXM_UDP_SRC, p.to_be_bytes().to_vec(), None),
            OxmField::UdpDst(p) => basic(OXM_UDP_DST, p.to_be_bytes().to_vec(), None),
            OxmField::Other { class, field, hasmask, ref value } => {
                if hasmask {
                    let (v, m) = value.split_at(value.len() / 2);
                    (class, field, v.to_vec(), Some(m.to_vec()))
                } else {
                    (class, field, value.clone(), None)
                }
            }
        }
    }

    pub fn size_of(f: &OxmField) -> usize {
        let (_, _, value, mask) = OxmField::components(f);
        4 + value.len() + mask.map(|m| m.len()).unwrap_or(0)
    }

    pub fn marshal(f: &OxmField, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let (class, field, value, mask) = OxmField::components(f);
        let len = value.len() + mask.as_ref().map(|m| m.len()).unwrap_or(0);
        bytes.write_u16::<BigEndian>(class)?;
        bytes.write_u8((field << 1) | mask.is_some() as u8)?;
        bytes.write_u8(len as u8)?;
        bytes.extend_from_slice(&value);
        if let Some(mask) = mask {
            bytes.extend_from_slice(&mask);
        }
        Ok(())
    }
}

const OFPMT_OXM: u16 = 1;

/// An OXM match. An empty field list matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Match {
    pub fields: Vec<OxmField>,
}

impl Match {
    pub fn match_all() -> Match {
        Match::default()
    }

    /// The matched input port, if any.
    pub fn in_port(&self) -> Option<u32> {
        self.fields.iter().filter_map(|f| match *f {
            OxmField::InPort(p) => Some(p),
            _ => None,
        }).next()
    }

    /// Wire size including trailing padding.
    pub fn size_of(m: &Match) -> usize {
        align_8(4 + m.fields.iter().map(OxmField::size_of).sum::<usize>())
    }

    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Match, OfpSerializationError> {
        let typ = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if typ != OFPMT_OXM {
            return Err(OfpSerializationError::UnexpectedValueError {
                value: typ.to_string(),
                field: "type".to_string(),
                message: "match".to_string(),
            });
        }
        if len < 4 || remaining(bytes) < align_8(len) - 4 {
            return Err(bad_length(len, "match"));
        }
        let raw = read_bytes(bytes, len - 4)?;
        skip(bytes, align_8(len) - len)?;
        let mut oxm = Cursor::new(&raw[..]);
        let mut fields = vec![];
        while remaining(&oxm) > 0 {
            fields.push(OxmField::parse(&mut oxm)?);
        }
        Ok(Match { fields })
    }

    pub fn marshal(m: &Match, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let start = bytes.len();
        let len = 4 + m.fields.iter().map(OxmField::size_of).sum::<usize>();
        bytes.write_u16::<BigEndian>(OFPMT_OXM)?;
        bytes.write_u16::<BigEndian>(len as u16)?;
        for f in &m.fields {
            OxmField::marshal(f, bytes)?;
        }
        pad_to_8(bytes, start);
        Ok(())
    }
}

/// Actions associated with flows and packets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Output(PseudoPort),
    Group(u32),
    SetQueue(u32),
    PushVlan(u16),
    PopVlan,
    DecNwTtl,
    SetField(OxmField),
    /// An action this crate does not model, kept as raw body bytes.
    Unknown(u16, Vec<u8>),
}

const OFPAT_OUTPUT: u16 = 0;
const OFPAT_PUSH_VLAN: u16 = 17;
const OFPAT_POP_VLAN: u16 = 18;
const OFPAT_SET_QUEUE: u16 = 21;
const OFPAT_GROUP: u16 = 22;
const OFPAT_DEC_NW_TTL: u16 = 24;
const OFPAT_SET_FIELD: u16 = 25;

impl Action {
    fn type_code(a: &Action) -> u16 {
        match *a {
            Action::Output(_) => OFPAT_OUTPUT,
            Action::Group(_) => OFPAT_GROUP,
            Action::SetQueue(_) => OFPAT_SET_QUEUE,
            Action::PushVlan(_) => OFPAT_PUSH_VLAN,
            Action::PopVlan => OFPAT_POP_VLAN,
            Action::DecNwTtl => OFPAT_DEC_NW_TTL,
            Action::SetField(_) => OFPAT_SET_FIELD,
            Action::Unknown(t, _) => t,
        }
    }

    pub fn size_of(a: &Action) -> usize {
        match *a {
            Action::Output(_) => 16,
            Action::SetField(ref f) => align_8(4 + OxmField::size_of(f)),
            Action::Unknown(_, ref body) => 4 + body.len(),
            _ => 8,
        }
    }

    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Action, OfpSerializationError> {
        let typ = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < 8 || remaining(bytes) < len - 4 {
            return Err(bad_length(len, "action"));
        }
        let body = read_bytes(bytes, len - 4)?;
        let mut body_bytes = Cursor::new(&body[..]);
        let action = match typ {
            OFPAT_OUTPUT => {
                if len != 16 {
                    return Err(bad_length(len, "output action"));
                }
                let port = body_bytes.read_u32::<BigEndian>()?;
                let max_len = body_bytes.read_u16::<BigEndian>()?;
                Action::Output(PseudoPort::make(port, max_len)?)
            }
            OFPAT_GROUP => Action::Group(body_bytes.read_u32::<BigEndian>()?),
            OFPAT_SET_QUEUE => Action::SetQueue(body_bytes.read_u32::<BigEndian>()?),
            OFPAT_PUSH_VLAN => Action::PushVlan(body_bytes.read_u16::<BigEndian>()?),
            OFPAT_POP_VLAN => Action::PopVlan,
            OFPAT_DEC_NW_TTL => Action::DecNwTtl,
            OFPAT_SET_FIELD => Action::SetField(OxmField::parse(&mut body_bytes)?),
            t => Action::Unknown(t, body),
        };
        Ok(action)
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>) -> Result<Vec<Action>, OfpSerializationError> {
        let mut actions = vec![];
        while remaining(bytes) > 0 {
            actions.push(Action::parse(bytes)?);
        }
        Ok(actions)
    }

    pub fn marshal(act: &Action, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let start = bytes.len();
        bytes.write_u16::<BigEndian>(Action::type_code(act))?;
        bytes.write_u16::<BigEndian>(Action::size_of(act) as u16)?;
        match *act {
            Action::Output(pp) => {
                bytes.write_u32::<BigEndian>(PseudoPort::to_int(pp))?;
                match pp {
                    PseudoPort::Controller(w) => bytes.write_u16::<BigEndian>(w)?,
                    _ => bytes.write_u16::<BigEndian>(0)?,
                }
                write_padding_bytes(bytes, 6);
            }
            Action::Group(id) | Action::SetQueue(id) => bytes.write_u32::<BigEndian>(id)?,
            Action::PushVlan(ethertype) => {
                bytes.write_u16::<BigEndian>(ethertype)?;
                write_padding_bytes(bytes, 2);
            }
            Action::PopVlan | Action::DecNwTtl => write_padding_bytes(bytes, 4),
            Action::SetField(ref f) => {
                OxmField::marshal(f, bytes)?;
                pad_to_8(bytes, start);
            }
            Action::Unknown(_, ref body) => bytes.extend_from_slice(body),
        }
        Ok(())
    }

    pub fn marshal_sequence(actions: &[Action], bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        for act in actions {
            Action::marshal(act, bytes)?;
        }
        Ok(())
    }
}

/// Instructions attached to a flow entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    GotoTable(u8),
    WriteMetadata { metadata: u64, mask: u64 },
    WriteActions(Vec<Action>),
    ApplyActions(Vec<Action>),
    ClearActions,
    Meter(u32),
    Unknown(u16, Vec<u8>),
}

const OFPIT_GOTO_TABLE: u16 = 1;
const OFPIT_WRITE_METADATA: u16 = 2;
const OFPIT_WRITE_ACTIONS: u16 = 3;
const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPIT_CLEAR_ACTIONS: u16 = 5;
const OFPIT_METER: u16 = 6;

impl Instruction {
    fn type_code(i: &Instruction) -> u16 {
        match *i {
            Instruction::GotoTable(_) => OFPIT_GOTO_TABLE,
            Instruction::WriteMetadata { .. } => OFPIT_WRITE_METADATA,
            Instruction::WriteActions(_) => OFPIT_WRITE_ACTIONS,
            Instruction::ApplyActions(_) => OFPIT_APPLY_ACTIONS,
            Instruction::ClearActions => OFPIT_CLEAR_ACTIONS,
            Instruction::Meter(_) => OFPIT_METER,
            Instruction::Unknown(t, _) => t,
        }
    }

    pub fn size_of(i: &Instruction) -> usize {
        match *i {
            Instruction::WriteMetadata { .. } => 24,
            Instruction::WriteActions(ref acts) | Instruction::ApplyActions(ref acts) => {
                8 + acts.iter().map(Action::size_of).sum::<usize>()
            }
            Instruction::Unknown(_, ref body) => 4 + body.len(),
            _ => 8,
        }
    }

    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Instruction, OfpSerializationError> {
        let typ = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < 8 || remaining(bytes) < len - 4 {
            return Err(bad_length(len, "instruction"));
        }
        let body = read_bytes(bytes, len - 4)?;
        let mut body_bytes = Cursor::new(&body[..]);
        let instruction = match typ {
            OFPIT_GOTO_TABLE => Instruction::GotoTable(body_bytes.read_u8()?),
            OFPIT_WRITE_METADATA => {
                skip(&mut body_bytes, 4)?;
                let metadata = body_bytes.read_u64::<BigEndian>()?;
                let mask = body_bytes.read_u64::<BigEndian>()?;
                Instruction::WriteMetadata { metadata, mask }
            }
            OFPIT_WRITE_ACTIONS | OFPIT_APPLY_ACTIONS => {
                skip(&mut body_bytes, 4)?;
                let actions = Action::parse_sequence(&mut body_bytes)?;
                if typ == OFPIT_WRITE_ACTIONS {
                    Instruction::WriteActions(actions)
                } else {
                    Instruction::ApplyActions(actions)
                }
            }
            OFPIT_CLEAR_ACTIONS => Instruction::ClearActions,
            OFPIT_METER => Instruction::Meter(body_bytes.read_u32::<BigEndian>()?),
            t => Instruction::Unknown(t, body),
        };
        Ok(instruction)
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>) -> Result<Vec<Instruction>, OfpSerializationError> {
        let mut instructions = vec![];
        while remaining(bytes) > 0 {
            instructions.push(Instruction::parse(bytes)?);
        }
        Ok(instructions)
    }

    pub fn marshal(i: &Instruction, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(Instruction::type_code(i))?;
        bytes.write_u16::<BigEndian>(Instruction::size_of(i) as u16)?;
        match *i {
            Instruction::GotoTable(table) => {
                bytes.write_u8(table)?;
                write_padding_bytes(bytes, 3);
            }
            Instruction::WriteMetadata { metadata, mask } => {
                write_padding_bytes(bytes, 4);
                bytes.write_u64::<BigEndian>(metadata)?;
                bytes.write_u64::<BigEndian>(mask)?;
            }
            Instruction::WriteActions(ref acts) | Instruction::ApplyActions(ref acts) => {
                write_padding_bytes(bytes, 4);
                Action::marshal_sequence(acts, bytes)?;
            }
            Instruction::ClearActions => write_padding_bytes(bytes, 4),
            Instruction::Meter(id) => bytes.write_u32::<BigEndian>(id)?,
            Instruction::Unknown(_, ref body) => bytes.extend_from_slice(body),
        }
        Ok(())
    }

    pub fn marshal_sequence(instructions: &[Instruction], bytes: &mut Vec<u8>)
                            -> Result<(), OfpSerializationError> {
        for i in instructions {
            Instruction::marshal(i, bytes)?;
        }
        Ok(())
    }
}

/// Capabilities supported by the datapath.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub flow_stats: bool,
    pub table_stats: bool,
    pub port_stats: bool,
    pub group_stats: bool,
    pub ip_reasm: bool,
    pub queue_stats: bool,
    pub port_blocked: bool,
}

impl Capabilities {
    pub fn of_int(d: u32) -> Capabilities {
        let d = d as u64;
        Capabilities {
            flow_stats: test_bit(0, d),
            table_stats: test_bit(1, d),
            port_stats: test_bit(2, d),
            group_stats: test_bit(3, d),
            ip_reasm: test_bit(5, d),
            queue_stats: test_bit(6, d),
            port_blocked: test_bit(8, d),
        }
    }

    pub fn to_int(c: &Capabilities) -> u32 {
        let ret = bit(0, 0, c.flow_stats);
        let ret = bit(1, ret, c.table_stats);
        let ret = bit(2, ret, c.port_stats);
        let ret = bit(3, ret, c.group_stats);
        let ret = bit(5, ret, c.ip_reasm);
        let ret = bit(6, ret, c.queue_stats);
        bit(8, ret, c.port_blocked) as u32
    }
}

/// Switch features. Ports are not part of the 1.3 reply; they are requested separately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub auxiliary_id: u8,
    pub supported_capabilities: Capabilities,
}

impl MessageType for SwitchFeatures {
    fn parse(buf: &[u8]) -> Result<SwitchFeatures, OfpSerializationError> {
        if buf.len() < SWITCH_FEATURES_LENGTH {
            return Err(OfpSerializationError::truncated("features reply"));
        }
        let mut bytes = Cursor::new(buf);
        let datapath_id = bytes.read_u64::<BigEndian>()?;
        let num_buffers = bytes.read_u32::<BigEndian>()?;
        let num_tables = bytes.read_u8()?;
        let auxiliary_id = bytes.read_u8()?;
        skip(&mut bytes, 2)?;
        let supported_capabilities = Capabilities::of_int(bytes.read_u32::<BigEndian>()?);
        Ok(SwitchFeatures {
            datapath_id,
            num_buffers,
            num_tables,
            auxiliary_id,
            supported_capabilities,
        })
    }

    fn marshal(sf: &SwitchFeatures, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u64::<BigEndian>(sf.datapath_id)?;
        bytes.write_u32::<BigEndian>(sf.num_buffers)?;
        bytes.write_u8(sf.num_tables)?;
        bytes.write_u8(sf.auxiliary_id)?;
        write_padding_bytes(bytes, 2);
        bytes.write_u32::<BigEndian>(Capabilities::to_int(&sf.supported_capabilities))?;
        bytes.write_u32::<BigEndian>(0)?;
        Ok(())
    }
}

impl MessageType for SwitchConfig {
    fn parse(buf: &[u8]) -> Result<SwitchConfig, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        Ok(SwitchConfig {
            flags: bytes.read_u16::<BigEndian>()?,
            miss_send_len: bytes.read_u16::<BigEndian>()?,
        })
    }

    fn marshal(sc: &SwitchConfig, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(sc.flags)?;
        bytes.write_u16::<BigEndian>(sc.miss_send_len)?;
        Ok(())
    }
}

/// Flags to indicate behavior of the physical port.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortConfig {
    pub port_down: bool,
    pub no_recv: bool,
    pub no_fwd: bool,
    pub no_packet_in: bool,
}

impl PortConfig {
    pub fn of_int(d: u32) -> PortConfig {
        let d = d as u64;
        PortConfig {
            port_down: test_bit(0, d),
            no_recv: test_bit(2, d),
            no_fwd: test_bit(5, d),
            no_packet_in: test_bit(6, d),
        }
    }

    pub fn to_int(c: &PortConfig) -> u32 {
        let ret = bit(0, 0, c.port_down);
        let ret = bit(2, ret, c.no_recv);
        let ret = bit(5, ret, c.no_fwd);
        bit(6, ret, c.no_packet_in) as u32
    }
}

/// Current state of the physical port. Not configurable by the controller.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortState {
    pub link_down: bool,
    pub blocked: bool,
    pub live: bool,
}

impl PortState {
    pub fn of_int(d: u32) -> PortState {
        let d = d as u64;
        PortState {
            link_down: test_bit(0, d),
            blocked: test_bit(1, d),
            live: test_bit(2, d),
        }
    }

    pub fn to_int(s: &PortState) -> u32 {
        let ret = bit(0, 0, s.link_down);
        let ret = bit(1, ret, s.blocked);
        bit(2, ret, s.live) as u32
    }
}

/// Description of a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDesc {
    pub port_no: u32,
    pub hw_addr: MacAddr,
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
    /// `ofp_port_features` bitmaps.
    pub curr: u32,
    pub advertised: u32,
    pub supported: u32,
    pub peer: u32,
    /// Current and maximum bit rate, in kbps.
    pub curr_speed: u32,
    pub max_speed: u32,
}

impl PortDesc {
    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<PortDesc, OfpSerializationError> {
        if remaining(bytes) < PORT_LENGTH {
            return Err(OfpSerializationError::truncated("port"));
        }
        let port_no = bytes.read_u32::<BigEndian>()?;
        skip(bytes, 4)?;
        let hw_addr = read_mac(bytes)?;
        skip(bytes, 2)?;
        let name = read_fixed_size_string(bytes, OFP_MAX_PORT_NAME_LEN)?;
        Ok(PortDesc {
            port_no,
            hw_addr,
            name,
            config: PortConfig::of_int(bytes.read_u32::<BigEndian>()?),
            state: PortState::of_int(bytes.read_u32::<BigEndian>()?),
            curr: bytes.read_u32::<BigEndian>()?,
            advertised: bytes.read_u32::<BigEndian>()?,
            supported: bytes.read_u32::<BigEndian>()?,
            peer: bytes.read_u32::<BigEndian>()?,
            curr_speed: bytes.read_u32::<BigEndian>()?,
            max_speed: bytes.read_u32::<BigEndian>()?,
        })
    }

    pub fn marshal(pd: &PortDesc, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u32::<BigEndian>(pd.port_no)?;
        write_padding_bytes(bytes, 4);
        bytes.extend_from_slice(&pd.hw_addr);
        write_padding_bytes(bytes, 2);
        write_fixed_size_string(bytes, &pd.name, OFP_MAX_PORT_NAME_LEN);
        bytes.write_u32::<BigEndian>(PortConfig::to_int(&pd.config))?;
        bytes.write_u32::<BigEndian>(PortState::to_int(&pd.state))?;
        bytes.write_u32::<BigEndian>(pd.curr)?;
        bytes.write_u32::<BigEndian>(pd.advertised)?;
        bytes.write_u32::<BigEndian>(pd.supported)?;
        bytes.write_u32::<BigEndian>(pd.peer)?;
        bytes.write_u32::<BigEndian>(pd.curr_speed)?;
        bytes.write_u32::<BigEndian>(pd.max_speed)?;
        Ok(())
    }

    /// Current bit rate in bits per second, if the port reports one.
    pub fn speed_bps(&self) -> Option<u64> {
        if self.curr_speed > 0 {
            return Some(self.curr_speed as u64 * 1000);
        }
        let features = self.curr as u64;
        [(9, 1_000_000_000_000u64), (8, 100_000_000_000), (7, 40_000_000_000),
         (6, 10_000_000_000), (5, 1_000_000_000), (4, 1_000_000_000),
         (3, 100_000_000), (2, 100_000_000), (1, 10_000_000), (0, 10_000_000)]
            .iter()
            .find(|&&(b, _)| test_bit(b, features))
            .map(|&(_, speed)| speed)
    }
}

/// A port has changed in the datapath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStatus {
    pub reason: PortReason,
    pub desc: PortDesc,
}

impl MessageType for PortStatus {
    fn parse(buf: &[u8]) -> Result<PortStatus, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let reason = PortReason::of_int(bytes.read_u8()?)?;
        skip(&mut bytes, 7)?;
        let desc = PortDesc::parse(&mut bytes)?;
        Ok(PortStatus { reason, desc })
    }

    fn marshal(ps: &PortStatus, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u8(ps.reason.to_int())?;
        write_padding_bytes(bytes, 7);
        PortDesc::marshal(&ps.desc, bytes)
    }
}

/// Reason a packet was sent to the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketInReason {
    NoMatch,
    Action,
    InvalidTtl,
}

/// Represents packets received by the datapath and sent to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketIn {
    pub input_payload: Payload,
    pub total_len: u16,
    pub reason: PacketInReason,
    pub table_id: u8,
    pub cookie: u64,
    pub pattern: Match,
}

impl MessageType for PacketIn {
    fn parse(buf: &[u8]) -> Result<PacketIn, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        let total_len = bytes.read_u16::<BigEndian>()?;
        let reason = match bytes.read_u8()? {
            0 => PacketInReason::NoMatch,
            1 => PacketInReason::Action,
            2 => PacketInReason::InvalidTtl,
            r => {
                return Err(OfpSerializationError::UnexpectedValueError {
                    value: format!("{:x}", r),
                    field: "reason".to_string(),
                    message: "packet in".to_string(),
                })
            }
        };
        let table_id = bytes.read_u8()?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let pattern = Match::parse(&mut bytes)?;
        skip(&mut bytes, 2)?;
        let data = read_to_end(&mut bytes);
        Ok(PacketIn {
            input_payload: Payload::of_buffer_id(buffer_id, data),
            total_len,
            reason,
            table_id,
            cookie,
            pattern,
        })
    }

    fn marshal(pi: &PacketIn, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u32::<BigEndian>(pi.input_payload.buffer_id())?;
        bytes.write_u16::<BigEndian>(pi.total_len)?;
        bytes.write_u8(match pi.reason {
            PacketInReason::NoMatch => 0,
            PacketInReason::Action => 1,
            PacketInReason::InvalidTtl => 2,
        })?;
        bytes.write_u8(pi.table_id)?;
        bytes.write_u64::<BigEndian>(pi.cookie)?;
        Match::marshal(&pi.pattern, bytes)?;
        write_padding_bytes(bytes, 2);
        bytes.extend_from_slice(pi.input_payload.data());
        Ok(())
    }
}

/// Flow removed (datapath -> controller).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowRemoved {
    pub cookie: u64,
    pub priority: u16,
    pub reason: FlowRemovedReason,
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub packet_count: u64,
    pub byte_count: u64,
    pub pattern: Match,
}

impl MessageType for FlowRemoved {
    fn parse(buf: &[u8]) -> Result<FlowRemoved, OfpSerializationError> {
        if buf.len() < FLOW_REMOVED_FIXED_LENGTH {
            return Err(OfpSerializationError::truncated("flow removed"));
        }
        let mut bytes = Cursor::new(buf);
        Ok(FlowRemoved {
            cookie: bytes.read_u64::<BigEndian>()?,
            priority: bytes.read_u16::<BigEndian>()?,
            reason: FlowRemovedReason::of_int(bytes.read_u8()?)?,
            table_id: bytes.read_u8()?,
            duration_sec: bytes.read_u32::<BigEndian>()?,
            duration_nsec: bytes.read_u32::<BigEndian>()?,
            idle_timeout: Timeout::of_int(bytes.read_u16::<BigEndian>()?),
            hard_timeout: Timeout::of_int(bytes.read_u16::<BigEndian>()?),
            packet_count: bytes.read_u64::<BigEndian>()?,
            byte_count: bytes.read_u64::<BigEndian>()?,
            pattern: Match::parse(&mut bytes)?,
        })
    }

    fn marshal(f: &FlowRemoved, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u64::<BigEndian>(f.cookie)?;
        bytes.write_u16::<BigEndian>(f.priority)?;
        bytes.write_u8(f.reason.to_int())?;
        bytes.write_u8(f.table_id)?;
        bytes.write_u32::<BigEndian>(f.duration_sec)?;
        bytes.write_u32::<BigEndian>(f.duration_nsec)?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(f.idle_timeout))?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(f.hard_timeout))?;
        bytes.write_u64::<BigEndian>(f.packet_count)?;
        bytes.write_u64::<BigEndian>(f.byte_count)?;
        Match::marshal(&f.pattern, bytes)
    }
}

/// Represents modifications to a flow table from the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: FlowModCmd,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub priority: u16,
    pub apply_to_packet: Option<u32>,
    pub out_port: Option<PseudoPort>,
    pub out_group: u32,
    pub notify_when_removed: bool,
    pub check_overlap: bool,
    pub reset_counts: bool,
    pub pattern: Match,
    pub instructions: Vec<Instruction>,
}

impl FlowMod {
    fn flags_to_int(fm: &FlowMod) -> u16 {
        let ret = bit(0, 0, fm.notify_when_removed);
        let ret = bit(1, ret, fm.check_overlap);
        bit(2, ret, fm.reset_counts) as u16
    }
}

impl MessageType for FlowMod {
    fn parse(buf: &[u8]) -> Result<FlowMod, OfpSerializationError> {
        if buf.len() < FLOW_MOD_FIXED_LENGTH {
            return Err(OfpSerializationError::truncated("flow mod"));
        }
        let mut bytes = Cursor::new(buf);
        let cookie = bytes.read_u64::<BigEndian>()?;
        let cookie_mask = bytes.read_u64::<BigEndian>()?;
        let table_id = bytes.read_u8()?;
        let command = FlowModCmd::of_int(bytes.read_u8()? as u16)?;
        let idle_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let hard_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let priority = bytes.read_u16::<BigEndian>()?;
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        let out_port = PseudoPort::of_int(bytes.read_u32::<BigEndian>()?)?;
        let out_group = bytes.read_u32::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()? as u64;
        skip(&mut bytes, 2)?;
        let pattern = Match::parse(&mut bytes)?;
        let instructions = Instruction::parse_sequence(&mut bytes)?;
        Ok(FlowMod {
            cookie,
            cookie_mask,
            table_id,
            command,
            idle_timeout,
            hard_timeout,
            priority,
            apply_to_packet: match buffer_id {
                NO_BUFFER => None,
                n => Some(n),
            },
            out_port,
            out_group,
            notify_when_removed: test_bit(0, flags),
            check_overlap: test_bit(1, flags),
            reset_counts: test_bit(2, flags),
            pattern,
            instructions,
        })
    }

    fn marshal(fm: &FlowMod, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u64::<BigEndian>(fm.cookie)?;
        bytes.write_u64::<BigEndian>(fm.cookie_mask)?;
        bytes.write_u8(fm.table_id)?;
        bytes.write_u8(fm.command.to_int() as u8)?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fm.idle_timeout))?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fm.hard_timeout))?;
        bytes.write_u16::<BigEndian>(fm.priority)?;
        bytes.write_u32::<BigEndian>(fm.apply_to_packet.unwrap_or(NO_BUFFER))?;
        bytes.write_u32::<BigEndian>(PseudoPort::option_to_int(fm.out_port))?;
        bytes.write_u32::<BigEndian>(fm.out_group)?;
        bytes.write_u16::<BigEndian>(FlowMod::flags_to_int(fm))?;
        write_padding_bytes(bytes, 2);
        Match::marshal(&fm.pattern, bytes)?;
        Instruction::marshal_sequence(&fm.instructions, bytes)
    }
}

impl MessageType for ErrorMsg {
    fn parse(buf: &[u8]) -> Result<ErrorMsg, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let error_type = bytes.read_u16::<BigEndian>()?;
        let code = bytes.read_u16::<BigEndian>()?;
        Ok(ErrorMsg {
            error_type,
            code,
            data: read_to_end(&mut bytes),
        })
    }

    fn marshal(err: &ErrorMsg, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(err.error_type)?;
        bytes.write_u16::<BigEndian>(err.code)?;
        bytes.extend_from_slice(&err.data);
        Ok(())
    }
}

/// Name of an `ofp_error_type` value, for logging.
pub fn error_type_name(error_type: u16) -> &'static str {
    match error_type {
        0 => "HELLO_FAILED",
        1 => "BAD_REQUEST",
        2 => "BAD_ACTION",
        3 => "BAD_INSTRUCTION",
        4 => "BAD_MATCH",
        5 => "FLOW_MOD_FAILED",
        6 => "GROUP_MOD_FAILED",
        7 => "PORT_MOD_FAILED",
        8 => "TABLE_MOD_FAILED",
        9 => "QUEUE_OP_FAILED",
        10 => "SWITCH_CONFIG_FAILED",
        11 => "ROLE_REQUEST_FAILED",
        12 => "METER_MOD_FAILED",
        13 => "TABLE_FEATURES_FAILED",
        0xffff => "EXPERIMENTER",
        _ => "UNKNOWN",
    }
}

const OFPMP_DESC: u16 = 0;
const OFPMP_FLOW: u16 = 1;
const OFPMP_PORT_STATS: u16 = 4;
const OFPMP_PORT_DESC: u16 = 13;

/// Body of a multipart request; the variant determines the request type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MultipartReqBody {
    Desc,
    Flow {
        table_id: u8,
        out_port: Option<PseudoPort>,
        out_group: u32,
        cookie: u64,
        cookie_mask: u64,
        pattern: Match,
    },
    PortStats {
        port_no: Option<PseudoPort>,
    },
    PortDesc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartReq {
    pub flags: u16,
    pub body: MultipartReqBody,
}

impl MultipartReq {
    pub fn desc() -> MultipartReq {
        MultipartReq { flags: 0, body: MultipartReqBody::Desc }
    }

    pub fn port_desc() -> MultipartReq {
        MultipartReq { flags: 0, body: MultipartReqBody::PortDesc }
    }

    /// Every flow of every table.
    pub fn all_flows() -> MultipartReq {
        MultipartReq {
            flags: 0,
            body: MultipartReqBody::Flow {
                table_id: ALL_TABLES,
                out_port: None,
                out_group: ANY_GROUP,
                cookie: 0,
                cookie_mask: 0,
                pattern: Match::match_all(),
            },
        }
    }

    /// Counters of every port.
    pub fn all_ports() -> MultipartReq {
        MultipartReq { flags: 0, body: MultipartReqBody::PortStats { port_no: None } }
    }

    fn multipart_type(body: &MultipartReqBody) -> u16 {
        match *body {
            MultipartReqBody::Desc => OFPMP_DESC,
            MultipartReqBody::Flow { .. } => OFPMP_FLOW,
            MultipartReqBody::PortStats { .. } => OFPMP_PORT_STATS,
            MultipartReqBody::PortDesc => OFPMP_PORT_DESC,
        }
    }
}

impl MessageType for MultipartReq {
    fn parse(buf: &[u8]) -> Result<MultipartReq, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        skip(&mut bytes, 4)?;
        let body = match typ {
            OFPMP_DESC => MultipartReqBody::Desc,
            OFPMP_FLOW => {
                let table_id = bytes.read_u8()?;
                skip(&mut bytes, 3)?;
                let out_port = PseudoPort::of_int(bytes.read_u32::<BigEndian>()?)?;
                let out_group = bytes.read_u32::<BigEndian>()?;
                skip(&mut bytes, 4)?;
                let cookie = bytes.read_u64::<BigEndian>()?;
                let cookie_mask = bytes.read_u64::<BigEndian>()?;
                let pattern = Match::parse(&mut bytes)?;
                MultipartReqBody::Flow { table_id, out_port, out_group, cookie, cookie_mask, pattern }
            }
            OFPMP_PORT_STATS => {
                let port_no = PseudoPort::of_int(bytes.read_u32::<BigEndian>()?)?;
                skip(&mut bytes, 4)?;
                MultipartReqBody::PortStats { port_no }
            }
            OFPMP_PORT_DESC => MultipartReqBody::PortDesc,
            t => {
                return Err(OfpSerializationError::UnimplementedFeatureInVersion {
                    version: OPENFLOW_0_04_VERSION,
                    feature: format!("multipart request type {}", t),
                })
            }
        };
        Ok(MultipartReq { flags, body })
    }

    fn marshal(mr: &MultipartReq, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(MultipartReq::multipart_type(&mr.body))?;
        bytes.write_u16::<BigEndian>(mr.flags)?;
        write_padding_bytes(bytes, 4);
        match mr.body {
            MultipartReqBody::Desc | MultipartReqBody::PortDesc => (),
            MultipartReqBody::Flow { table_id, out_port, out_group, cookie, cookie_mask, ref pattern } => {
                bytes.write_u8(table_id)?;
                write_padding_bytes(bytes, 3);
                bytes.write_u32::<BigEndian>(PseudoPort::option_to_int(out_port))?;
                bytes.write_u32::<BigEndian>(out_group)?;
                write_padding_bytes(bytes, 4);
                bytes.write_u64::<BigEndian>(cookie)?;
                bytes.write_u64::<BigEndian>(cookie_mask)?;
                Match::marshal(pattern, bytes)?;
            }
            MultipartReqBody::PortStats { port_no } => {
                bytes.write_u32::<BigEndian>(PseudoPort::option_to_int(port_no))?;
                write_padding_bytes(bytes, 4);
            }
        }
        Ok(())
    }
}

/// Counters of one flow entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStats {
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub flags: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub pattern: Match,
    pub instructions: Vec<Instruction>,
}

impl FlowStats {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<FlowStats, OfpSerializationError> {
        let length = bytes.read_u16::<BigEndian>()? as usize;
        if length < FLOW_STATS_FIXED_LENGTH || remaining(bytes) < length - 2 {
            return Err(bad_length(length, "flow stats"));
        }
        let raw = read_bytes(bytes, length - 2)?;
        let mut entry = Cursor::new(&raw[..]);
        let table_id = entry.read_u8()?;
        skip(&mut entry, 1)?;
        let duration_sec = entry.read_u32::<BigEndian>()?;
        let duration_nsec = entry.read_u32::<BigEndian>()?;
        let priority = entry.read_u16::<BigEndian>()?;
        let idle_timeout = Timeout::of_int(entry.read_u16::<BigEndian>()?);
        let hard_timeout = Timeout::of_int(entry.read_u16::<BigEndian>()?);
        let flags = entry.read_u16::<BigEndian>()?;
        skip(&mut entry, 4)?;
        let cookie = entry.read_u64::<BigEndian>()?;
        let packet_count = entry.read_u64::<BigEndian>()?;
        let byte_count = entry.read_u64::<BigEndian>()?;
        let pattern = Match::parse(&mut entry)?;
        let instructions = Instruction::parse_sequence(&mut entry)?;
        Ok(FlowStats {
            table_id,
            duration_sec,
            duration_nsec,
            priority,
            idle_timeout,
            hard_timeout,
            flags,
            cookie,
            packet_count,
            byte_count,
            pattern,
            instructions,
        })
    }

    fn marshal(fs: &FlowStats, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let length = FLOW_STATS_FIXED_LENGTH
            + Match::size_of(&fs.pattern)
            + fs.instructions.iter().map(Instruction::size_of).sum::<usize>();
        bytes.write_u16::<BigEndian>(length as u16)?;
        bytes.write_u8(fs.table_id)?;
        write_padding_bytes(bytes, 1);
        bytes.write_u32::<BigEndian>(fs.duration_sec)?;
        bytes.write_u32::<BigEndian>(fs.duration_nsec)?;
        bytes.write_u16::<BigEndian>(fs.priority)?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fs.idle_timeout))?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fs.hard_timeout))?;
        bytes.write_u16::<BigEndian>(fs.flags)?;
        write_padding_bytes(bytes, 4);
        bytes.write_u64::<BigEndian>(fs.cookie)?;
        bytes.write_u64::<BigEndian>(fs.packet_count)?;
        bytes.write_u64::<BigEndian>(fs.byte_count)?;
        Match::marshal(&fs.pattern, bytes)?;
        Instruction::marshal_sequence(&fs.instructions, bytes)
    }
}

/// Counters of one port.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortStats {
    pub port_no: u32,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_frame_err: u64,
    pub rx_over_err: u64,
    pub rx_crc_err: u64,
    pub collisions: u64,
    pub duration_sec: u32,
    pub duration_nsec: u32,
}

impl PortStats {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<PortStats, OfpSerializationError> {
        if remaining(bytes) < PORT_STATS_LENGTH {
            return Err(OfpSerializationError::truncated("port stats"));
        }
        let port_no = bytes.read_u32::<BigEndian>()?;
        skip(bytes, 4)?;
        Ok(PortStats {
            port_no,
            rx_packets: bytes.read_u64::<BigEndian>()?,
            tx_packets: bytes.read_u64::<BigEndian>()?,
            rx_bytes: bytes.read_u64::<BigEndian>()?,
            tx_bytes: bytes.read_u64::<BigEndian>()?,
            rx_dropped: bytes.read_u64::<BigEndian>()?,
            tx_dropped: bytes.read_u64::<BigEndian>()?,
            rx_errors: bytes.read_u64::<BigEndian>()?,
            tx_errors: bytes.read_u64::<BigEndian>()?,
            rx_frame_err: bytes.read_u64::<BigEndian>()?,
            rx_over_err: bytes.read_u64::<BigEndian>()?,
            rx_crc_err: bytes.read_u64::<BigEndian>()?,
            collisions: bytes.read_u64::<BigEndian>()?,
            duration_sec: bytes.read_u32::<BigEndian>()?,
            duration_nsec: bytes.read_u32::<BigEndian>()?,
        })
    }

    fn marshal(ps: &PortStats, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u32::<BigEndian>(ps.port_no)?;
        write_padding_bytes(bytes, 4);
        for counter in &[ps.rx_packets, ps.tx_packets, ps.rx_bytes, ps.tx_bytes, ps.rx_dropped,
                         ps.tx_dropped, ps.rx_errors, ps.tx_errors, ps.rx_frame_err,
                         ps.rx_over_err, ps.rx_crc_err, ps.collisions] {
            bytes.write_u64::<BigEndian>(*counter)?;
        }
        bytes.write_u32::<BigEndian>(ps.duration_sec)?;
        bytes.write_u32::<BigEndian>(ps.duration_nsec)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MultipartRespBody {
    Desc(DescStats),
    Flow(Vec<FlowStats>),
    PortStats(Vec<PortStats>),
    PortDesc(Vec<PortDesc>),
    /// A reply type this crate does not interpret.
    Other { multipart_type: u16, body: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartResp {
    pub flags: u16,
    pub body: MultipartRespBody,
}

impl MultipartResp {
    /// Whether more fragments of this reply follow.
    pub fn more(&self) -> bool {
        self.flags & MULTIPART_REPLY_MORE != 0
    }
}

impl MessageType for MultipartResp {
    fn parse(buf: &[u8]) -> Result<MultipartResp, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        skip(&mut bytes, 4)?;
        let body = match typ {
            OFPMP_DESC => MultipartRespBody::Desc(parse_desc_stats(&mut bytes)?),
            OFPMP_FLOW => {
                let mut flows = vec![];
                while remaining(&bytes) > 0 {
                    flows.push(FlowStats::parse(&mut bytes)?);
                }
                MultipartRespBody::Flow(flows)
            }
            OFPMP_PORT_STATS => {
                let mut ports = vec![];
                while remaining(&bytes) > 0 {
                    ports.push(PortStats::parse(&mut bytes)?);
                }
                MultipartRespBody::PortStats(ports)
            }
            OFPMP_PORT_DESC => {
                let mut ports = vec![];
                while remaining(&bytes) > 0 {
                    ports.push(PortDesc::parse(&mut bytes)?);
                }
                MultipartRespBody::PortDesc(ports)
            }
            t => MultipartRespBody::Other {
                multipart_type: t,
                body: read_to_end(&mut bytes),
            },
        };
        Ok(MultipartResp { flags, body })
    }

    fn marshal(mr: &MultipartResp, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let typ = match mr.body {
            MultipartRespBody::Desc(_) => OFPMP_DESC,
            MultipartRespBody::Flow(_) => OFPMP_FLOW,
            MultipartRespBody::PortStats(_) => OFPMP_PORT_STATS,
            MultipartRespBody::PortDesc(_) => OFPMP_PORT_DESC,
            MultipartRespBody::Other { multipart_type, .. } => multipart_type,
        };
        bytes.write_u16::<BigEndian>(typ)?;
        bytes.write_u16::<BigEndian>(mr.flags)?;
        write_padding_bytes(bytes, 4);
        match mr.body {
            MultipartRespBody::Desc(ref desc) => marshal_desc_stats(desc, bytes),
            MultipartRespBody::Flow(ref flows) => {
                for flow in flows {
                    FlowStats::marshal(flow, bytes)?;
                }
            }
            MultipartRespBody::PortStats(ref ports) => {
                for port in ports {
                    PortStats::marshal(port, bytes)?;
                }
            }
            MultipartRespBody::PortDesc(ref ports) => {
                for port in ports {
                    PortDesc::marshal(port, bytes)?;
                }
            }
            MultipartRespBody::Other { ref body, .. } => bytes.extend_from_slice(body),
        }
        Ok(())
    }
}

/// Abstractions of OpenFlow 1.3 messages mapping to message codes.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Hello(Hello),
    Error(ErrorMsg),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    FeaturesReq,
    FeaturesReply(SwitchFeatures),
    GetConfigReq,
    GetConfigReply(SwitchConfig),
    SetConfig(SwitchConfig),
    PacketIn(PacketIn),
    FlowRemoved(FlowRemoved),
    PortStatus(PortStatus),
    FlowMod(FlowMod),
    MultipartRequest(MultipartReq),
    MultipartReply(MultipartResp),
    BarrierRequest,
    BarrierReply,
}

pub fn msg_code_to_u8(msgcode: MsgCode) -> Result<u8, OfpSerializationError> {
    match msgcode {
        MsgCode::Hello => Ok(0),
        MsgCode::Error => Ok(1),
        MsgCode::EchoReq => Ok(2),
        MsgCode::EchoResp => Ok(3),
        MsgCode::Experimenter => Ok(4),
        MsgCode::FeaturesReq => Ok(5),
        MsgCode::FeaturesResp => Ok(6),
        MsgCode::GetConfigReq => Ok(7),
        MsgCode::GetConfigResp => Ok(8),
        MsgCode::SetConfig => Ok(9),
        MsgCode::PacketIn => Ok(10),
        MsgCode::FlowRemoved => Ok(11),
        MsgCode::PortStatus => Ok(12),
        MsgCode::PacketOut => Ok(13),
        MsgCode::FlowMod => Ok(14),
        MsgCode::GroupMod => Ok(15),
        MsgCode::PortMod => Ok(16),
        MsgCode::TableMod => Ok(17),
        MsgCode::MultipartReq => Ok(18),
        MsgCode::MultipartResp => Ok(19),
        MsgCode::BarrierReq => Ok(20),
        MsgCode::BarrierResp => Ok(21),
        MsgCode::QueueGetConfigReq => Ok(22),
        MsgCode::QueueGetConfigResp => Ok(23),
        MsgCode::RoleReq => Ok(24),
        MsgCode::RoleResp => Ok(25),
        MsgCode::GetAsyncReq => Ok(26),
        MsgCode::GetAsyncResp => Ok(27),
        MsgCode::SetAsync => Ok(28),
        MsgCode::MeterMod => Ok(29),
        c => Err(OfpSerializationError::UnimplementedFeatureInVersion {
            version: OPENFLOW_0_04_VERSION,
            feature: c.to_string(),
        }),
    }
}

pub fn msg_code_of_u8(code: u8) -> Result<MsgCode, OfpSerializationError> {
    let msg_code = match code {
        0 => MsgCode::Hello,
        1 => MsgCode::Error,
        2 => MsgCode::EchoReq,
        3 => MsgCode::EchoResp,
        4 => MsgCode::Experimenter,
        5 => MsgCode::FeaturesReq,
        6 => MsgCode::FeaturesResp,
        7 => MsgCode::GetConfigReq,
        8 => MsgCode::GetConfigResp,
        9 => MsgCode::SetConfig,
        10 => MsgCode::PacketIn,
        11 => MsgCode::FlowRemoved,
        12 => MsgCode::PortStatus,
        13 => MsgCode::PacketOut,
        14 => MsgCode::FlowMod,
        15 => MsgCode::GroupMod,
        16 => MsgCode::PortMod,
        17 => MsgCode::TableMod,
        18 => MsgCode::MultipartReq,
        19 => MsgCode::MultipartResp,
        20 => MsgCode::BarrierReq,
        21 => MsgCode::BarrierResp,
        22 => MsgCode::QueueGetConfigReq,
        23 => MsgCode::QueueGetConfigResp,
        24 => MsgCode::RoleReq,
        25 => MsgCode::RoleResp,
        26 => MsgCode::GetAsyncReq,
        27 => MsgCode::GetAsyncResp,
        28 => MsgCode::SetAsync,
        29 => MsgCode::MeterMod,
        c => {
            return Err(OfpSerializationError::UnsupportedMessageCode {
                version: OPENFLOW_0_04_VERSION,
                code: c,
            })
        }
    };
    Ok(msg_code)
}

impl Message {
    /// Marshal the body of the OpenFlow message `msg`.
    fn marshal_body(msg: &Message, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        match *msg {
            Message::FeaturesReq
            | Message::GetConfigReq
            | Message::BarrierRequest
            | Message::BarrierReply => Ok(()),
            Message::Hello(ref hello) => Hello::marshal(hello, bytes),
            Message::Error(ref err) => ErrorMsg::marshal(err, bytes),
            Message::EchoRequest(ref buf) | Message::EchoReply(ref buf) => {
                bytes.extend_from_slice(buf);
                Ok(())
            }
            Message::FeaturesReply(ref sf) => SwitchFeatures::marshal(sf, bytes),
            Message::GetConfigReply(ref sc) | Message::SetConfig(ref sc) => {
                SwitchConfig::marshal(sc, bytes)
            }
            Message::PacketIn(ref pi) => PacketIn::marshal(pi, bytes),
            Message::FlowRemoved(ref fr) => FlowRemoved::marshal(fr, bytes),
            Message::PortStatus(ref ps) => PortStatus::marshal(ps, bytes),
            Message::FlowMod(ref fm) => FlowMod::marshal(fm, bytes),
            Message::MultipartRequest(ref mr) => MultipartReq::marshal(mr, bytes),
            Message::MultipartReply(ref mr) => MultipartResp::marshal(mr, bytes),
        }
    }
}

impl OfpMessage for Message {
    fn version() -> u8 {
        OPENFLOW_0_04_VERSION
    }

    fn msg_code(msg: &Message) -> MsgCode {
        match *msg {
            Message::Hello(_) => MsgCode::Hello,
            Message::Error(_) => MsgCode::Error,
            Message::EchoRequest(_) => MsgCode::EchoReq,
            Message::EchoReply(_) => MsgCode::EchoResp,
            Message::FeaturesReq => MsgCode::FeaturesReq,
            Message::FeaturesReply(_) => MsgCode::FeaturesResp,
            Message::GetConfigReq => MsgCode::GetConfigReq,
            Message::GetConfigReply(_) => MsgCode::GetConfigResp,
            Message::SetConfig(_) => MsgCode::SetConfig,
            Message::PacketIn(_) => MsgCode::PacketIn,
            Message::FlowRemoved(_) => MsgCode::FlowRemoved,
            Message::PortStatus(_) => MsgCode::PortStatus,
            Message::FlowMod(_) => MsgCode::FlowMod,
            Message::MultipartRequest(_) => MsgCode::MultipartReq,
            Message::MultipartReply(_) => MsgCode::MultipartResp,
            Message::BarrierRequest => MsgCode::BarrierReq,
            Message::BarrierReply => MsgCode::BarrierResp,
        }
    }

    fn marshal(xid: Xid, msg: Message) -> Result<Vec<u8>, OfpSerializationError> {
        let typ = msg_code_to_u8(Message::msg_code(&msg))?;
        let mut bytes = vec![];
        OfpHeader::marshal(&mut bytes, OfpHeader::new(OPENFLOW_0_04_VERSION, typ, 0, xid));
        Message::marshal_body(&msg, &mut bytes)?;
        patch_length(&mut bytes)?;
        Ok(bytes)
    }

    fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(Xid, Message), OfpSerializationError> {
        let msg = match msg_code_of_u8(header.type_code())? {
            MsgCode::Hello => Message::Hello(Hello::parse(buf)?),
            MsgCode::Error => Message::Error(ErrorMsg::parse(buf)?),
            MsgCode::EchoReq => Message::EchoRequest(buf.to_vec()),
            MsgCode::EchoResp => Message::EchoReply(buf.to_vec()),
            MsgCode::FeaturesReq => Message::FeaturesReq,
            MsgCode::FeaturesResp => Message::FeaturesReply(SwitchFeatures::parse(buf)?),
            MsgCode::GetConfigReq => Message::GetConfigReq,
            MsgCode::GetConfigResp => Message::GetConfigReply(SwitchConfig::parse(buf)?),
            MsgCode::SetConfig => Message::SetConfig(SwitchConfig::parse(buf)?),
            MsgCode::PacketIn => Message::PacketIn(PacketIn::parse(buf)?),
            MsgCode::FlowRemoved => Message::FlowRemoved(FlowRemoved::parse(buf)?),
            MsgCode::PortStatus => Message::PortStatus(PortStatus::parse(buf)?),
            MsgCode::FlowMod => Message::FlowMod(FlowMod::parse(buf)?),
            MsgCode::MultipartReq => Message::MultipartRequest(MultipartReq::parse(buf)?),
            MsgCode::MultipartResp => Message::MultipartReply(MultipartResp::parse(buf)?),
            MsgCode::BarrierReq => Message::BarrierRequest,
            MsgCode::BarrierResp => Message::BarrierReply,
            code => {
                return Err(OfpSerializationError::UnimplementedFeatureInVersion {
                    version: OPENFLOW_0_04_VERSION,
                    feature: code.to_string(),
                })
            }
        };
        Ok((header.xid(), msg))
    }
}
