use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::{bit, test_bit};
use crate::message::{DescStats, ErrorMsg, FlowModCmd, FlowRemovedReason, Payload, PortReason,
                     SwitchConfig, Timeout, NO_BUFFER};
use crate::ofp_header::{patch_length, OfpHeader, Xid, OPENFLOW_0_01_VERSION};
use crate::ofp_message::{OfpMessage, OfpSerializationError};
use crate::ofp_utils::{read_bytes, read_fixed_size_string, read_mac, read_to_end, remaining, skip,
                       write_fixed_size_string, write_padding_bytes, MacAddr};
use crate::openflow::MsgCode;

const DESC_STR_LENGTH: usize = 256;
const SERIAL_NUM_LENGTH: usize = 32;
const OFP_MAX_PORT_NAME_LEN: usize = 16;

pub const ALL_TABLES: u8 = 0xff;

const MATCH_LENGTH: usize = 40;
const PHY_PORT_LENGTH: usize = 48;
const FEATURES_REPLY_FIXED_LENGTH: usize = 24;
const FLOW_MOD_FIXED_LENGTH: usize = 64;
const FLOW_REMOVED_LENGTH: usize = 80;
const FLOW_STATS_FIXED_LENGTH: usize = 88;
const PORT_STATS_LENGTH: usize = 104;

/// `OFPSF_REPLY_MORE`: more replies follow for this transaction.
pub const STATS_REPLY_MORE: u16 = 1;

/// Common API for the body of messages implementing OpenFlow Message Codes (see `MsgCode` enum).
pub trait MessageType: Sized {
    /// Parse a body buffer into a message.
    fn parse(buf: &[u8]) -> Result<Self, OfpSerializationError>;
    /// Marshal a message body into a `u8` buffer.
    fn marshal(msg: &Self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError>;
}

/// A field value with an optional mask. For 1.0 network addresses the mask is the number
/// of low-order bits that are wildcarded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mask<T> {
    pub value: T,
    pub mask: Option<T>,
}

/// Which fields of a 1.0 match are wildcarded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Wildcards {
    pub in_port: bool,
    pub dl_vlan: bool,
    pub dl_src: bool,
    pub dl_dst: bool,
    pub dl_type: bool,
    pub nw_proto: bool,
    pub tp_src: bool,
    pub tp_dst: bool,
    pub nw_src: u32,
    pub nw_dst: u32,
    pub dl_vlan_pcp: bool,
    pub nw_tos: bool,
}

impl Wildcards {
    fn set_nw_mask(f: u32, offset: usize, v: u32) -> u32 {
        let value = (0x3f & v) << offset;
        f | value
    }

    fn get_nw_mask(f: u32, offset: usize) -> u32 {
        (f >> offset) & 0x3f
    }

    fn mask_bits(x: &Option<Mask<u32>>) -> u32 {
        match *x {
            None => 32,
            Some(ref x) => x.mask.unwrap_or(0),
        }
    }

    pub fn to_int(w: &Wildcards) -> u32 {
        let ret = 0u64;
        let ret = bit(0, ret, w.in_port);
        let ret = bit(1, ret, w.dl_vlan);
        let ret = bit(2, ret, w.dl_src);
        let ret = bit(3, ret, w.dl_dst);
        let ret = bit(4, ret, w.dl_type);
        let ret = bit(5, ret, w.nw_proto);
        let ret = bit(6, ret, w.tp_src);
        let ret = bit(7, ret, w.tp_dst);
        let ret = Wildcards::set_nw_mask(ret as u32, 8, w.nw_src);
        let ret = Wildcards::set_nw_mask(ret, 14, w.nw_dst);
        let ret = bit(20, ret as u64, w.dl_vlan_pcp);
        bit(21, ret, w.nw_tos) as u32
    }

    pub fn of_int(bits: u32) -> Wildcards {
        let b = bits as u64;
        Wildcards {
            in_port: test_bit(0, b),
            dl_vlan: test_bit(1, b),
            dl_src: test_bit(2, b),
            dl_dst: test_bit(3, b),
            dl_type: test_bit(4, b),
            nw_proto: test_bit(5, b),
            tp_src: test_bit(6, b),
            tp_dst: test_bit(7, b),
            nw_src: Wildcards::get_nw_mask(bits, 8),
            nw_dst: Wildcards::get_nw_mask(bits, 14),
            dl_vlan_pcp: test_bit(20, b),
            nw_tos: test_bit(21, b),
        }
    }
}

/// Fields to match against flows. `None` means the field is wildcarded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    pub in_port: Option<u16>,
    pub dl_src: Option<MacAddr>,
    pub dl_dst: Option<MacAddr>,
    /// `Some(None)` matches packets without a VLAN tag.
    pub dl_vlan: Option<Option<u16>>,
    pub dl_vlan_pcp: Option<u8>,
    pub dl_typ: Option<u16>,
    pub nw_tos: Option<u8>,
    pub nw_proto: Option<u8>,
    pub nw_src: Option<Mask<u32>>,
    pub nw_dst: Option<Mask<u32>>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
}

const OFP_VLAN_NONE: u16 = 0xffff;

impl Pattern {
    pub fn match_all() -> Pattern {
        Pattern::default()
    }

    pub fn wildcards_of_pattern(m: &Pattern) -> Wildcards {
        Wildcards {
            in_port: m.in_port.is_none(),
            dl_vlan: m.dl_vlan.is_none(),
            dl_src: m.dl_src.is_none(),
            dl_dst: m.dl_dst.is_none(),
            dl_type: m.dl_typ.is_none(),
            nw_proto: m.nw_proto.is_none(),
            tp_src: m.tp_src.is_none(),
            tp_dst: m.tp_dst.is_none(),
            nw_src: Wildcards::mask_bits(&m.nw_src),
            nw_dst: Wildcards::mask_bits(&m.nw_dst),
            dl_vlan_pcp: m.dl_vlan_pcp.is_none(),
            nw_tos: m.nw_tos.is_none(),
        }
    }

    fn nw_addr(wildcarded_bits: u32, value: u32) -> Option<Mask<u32>> {
        if wildcarded_bits >= 32 {
            None
        } else if wildcarded_bits == 0 {
            Some(Mask { value, mask: None })
        } else {
            Some(Mask { value, mask: Some(wildcarded_bits) })
        }
    }

    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Pattern, OfpSerializationError> {
        if remaining(bytes) < MATCH_LENGTH {
            return Err(OfpSerializationError::truncated("match"));
        }
        let w = Wildcards::of_int(bytes.read_u32::<BigEndian>()?);
        let in_port = bytes.read_u16::<BigEndian>()?;
        let dl_src = read_mac(bytes)?;
        let dl_dst = read_mac(bytes)?;
        let dl_vlan = bytes.read_u16::<BigEndian>()?;
        let dl_vlan_pcp = bytes.read_u8()?;
        skip(bytes, 1)?;
        let dl_typ = bytes.read_u16::<BigEndian>()?;
        let nw_tos = bytes.read_u8()?;
        let nw_proto = bytes.read_u8()?;
        skip(bytes, 2)?;
        let nw_src = bytes.read_u32::<BigEndian>()?;
        let nw_dst = bytes.read_u32::<BigEndian>()?;
        let tp_src = bytes.read_u16::<BigEndian>()?;
        let tp_dst = bytes.read_u16::<BigEndian>()?;

        Ok(Pattern {
            in_port: if w.in_port { None } else { Some(in_port) },
            dl_src: if w.dl_src { None } else { Some(dl_src) },
            dl_dst: if w.dl_dst { None } else { Some(dl_dst) },
            dl_vlan: if w.dl_vlan {
                None
            } else if dl_vlan == OFP_VLAN_NONE {
                Some(None)
            } else {
                Some(Some(dl_vlan))
            },
            dl_vlan_pcp: if w.dl_vlan_pcp { None } else { Some(dl_vlan_pcp) },
            dl_typ: if w.dl_type { None } else { Some(dl_typ) },
            nw_tos: if w.nw_tos { None } else { Some(nw_tos) },
            nw_proto: if w.nw_proto { None } else { Some(nw_proto) },
            nw_src: Pattern::nw_addr(w.nw_src, nw_src),
            nw_dst: Pattern::nw_addr(w.nw_dst, nw_dst),
            tp_src: if w.tp_src { None } else { Some(tp_src) },
            tp_dst: if w.tp_dst { None } else { Some(tp_dst) },
        })
    }

    pub fn marshal(p: &Pattern, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let w = Pattern::wildcards_of_pattern(p);
        bytes.write_u32::<BigEndian>(Wildcards::to_int(&w))?;
        bytes.write_u16::<BigEndian>(p.in_port.unwrap_or(0))?;
        bytes.extend_from_slice(&p.dl_src.unwrap_or([0; 6]));
        bytes.extend_from_slice(&p.dl_dst.unwrap_or([0; 6]));
        let vlan = match p.dl_vlan {
            Some(Some(v)) => v,
            Some(None) => OFP_VLAN_NONE,
            None => 0,
        };
        bytes.write_u16::<BigEndian>(vlan)?;
        bytes.write_u8(p.dl_vlan_pcp.unwrap_or(0))?;
        write_padding_bytes(bytes, 1);
        bytes.write_u16::<BigEndian>(p.dl_typ.unwrap_or(0))?;
        bytes.write_u8(p.nw_tos.unwrap_or(0))?;
        bytes.write_u8(p.nw_proto.unwrap_or(0))?;
        write_padding_bytes(bytes, 2);
        bytes.write_u32::<BigEndian>(p.nw_src.map(|m| m.value).unwrap_or(0))?;
        bytes.write_u32::<BigEndian>(p.nw_dst.map(|m| m.value).unwrap_or(0))?;
        bytes.write_u16::<BigEndian>(p.tp_src.unwrap_or(0))?;
        bytes.write_u16::<BigEndian>(p.tp_dst.unwrap_or(0))?;
        Ok(())
    }
}

#[repr(u16)]
pub enum OfpPort {
    OFPPMax = 0xff00,
    OFPPInPort = 0xfff8,
    OFPPTable = 0xfff9,
    OFPPNormal = 0xfffa,
    OFPPFlood = 0xfffb,
    OFPPAll = 0xfffc,
    OFPPController = 0xfffd,
    OFPPLocal = 0xfffe,
    OFPPNone = 0xffff,
}

/// Port behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PseudoPort {
    PhysicalPort(u16),
    InPort,
    Table,
    Normal,
    Flood,
    AllPorts,
    /// Send to the controller, including at most this many bytes of the packet.
    Controller(u16),
    Local,
}

impl PseudoPort {
    pub fn of_int(p: u16) -> Result<Option<PseudoPort>, OfpSerializationError> {
        if (OfpPort::OFPPNone as u16) == p {
            Ok(None)
        } else {
            Ok(Some(PseudoPort::make(p, 0)?))
        }
    }

    pub fn make(p: u16, len: u16) -> Result<PseudoPort, OfpSerializationError> {
        let res = match p {
            p if p == (OfpPort::OFPPInPort as u16) => PseudoPort::InPort,
            p if p == (OfpPort::OFPPTable as u16) => PseudoPort::Table,
            p if p == (OfpPort::OFPPNormal as u16) => PseudoPort::Normal,
            p if p == (OfpPort::OFPPFlood as u16) => PseudoPort::Flood,
            p if p == (OfpPort::OFPPAll as u16) => PseudoPort::AllPorts,
            p if p == (OfpPort::OFPPController as u16) => PseudoPort::Controller(len),
            p if p == (OfpPort::OFPPLocal as u16) => PseudoPort::Local,
            _ => {
                if p <= (OfpPort::OFPPMax as u16) {
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

    pub fn to_int(pp: PseudoPort) -> u16 {
        match pp {
            PseudoPort::PhysicalPort(p) => p,
            PseudoPort::InPort => OfpPort::OFPPInPort as u16,
            PseudoPort::Table => OfpPort::OFPPTable as u16,
            PseudoPort::Normal => OfpPort::OFPPNormal as u16,
            PseudoPort::Flood => OfpPort::OFPPFlood as u16,
            PseudoPort::AllPorts => OfpPort::OFPPAll as u16,
            PseudoPort::Controller(_) => OfpPort::OFPPController as u16,
            PseudoPort::Local => OfpPort::OFPPLocal as u16,
        }
    }

    fn option_to_int(pp: Option<PseudoPort>) -> u16 {
        pp.map(PseudoPort::to_int).unwrap_or(OfpPort::OFPPNone as u16)
    }
}

/// Actions associated with flows and packets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Output(PseudoPort),
    /// `None` strips the VLAN tag.
    SetDlVlan(Option<u16>),
    SetDlVlanPcp(u8),
    SetDlSrc(MacAddr),
    SetDlDst(MacAddr),
    SetNwSrc(u32),
    SetNwDst(u32),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
    Enqueue(PseudoPort, u32),
    /// An action this crate does not model, kept as raw body bytes.
    Unknown(u16, Vec<u8>),
}

impl Action {
    fn type_code(a: &Action) -> u16 {
        match *a {
            Action::Output(_) => 0,
            Action::SetDlVlan(Some(_)) => 1,
            Action::SetDlVlanPcp(_) => 2,
            Action::SetDlVlan(None) => 3,
            Action::SetDlSrc(_) => 4,
            Action::SetDlDst(_) => 5,
            Action::SetNwSrc(_) => 6,
            Action::SetNwDst(_) => 7,
            Action::SetNwTos(_) => 8,
            Action::SetTpSrc(_) => 9,
            Action::SetTpDst(_) => 10,
            Action::Enqueue(_, _) => 11,
            Action::Unknown(t, _) => t,
        }
    }

    pub fn size_of(a: &Action) -> usize {
        match *a {
            Action::SetDlSrc(_) | Action::SetDlDst(_) | Action::Enqueue(_, _) => 16,
            Action::Unknown(_, ref body) => 4 + body.len(),
            _ => 8,
        }
    }

    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Action, OfpSerializationError> {
        let start = bytes.position();
        let typ = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < 8 || remaining(bytes) < len - 4 {
            return Err(OfpSerializationError::UnexpectedValueError {
                value: len.to_string(),
                field: "length".to_string(),
                message: "action".to_string(),
            });
        }
        let action = match typ {
            0 => {
                let port = bytes.read_u16::<BigEndian>()?;
                let max_len = bytes.read_u16::<BigEndian>()?;
                Action::Output(PseudoPort::make(port, max_len)?)
            }
            1 => {
                let vid = bytes.read_u16::<BigEndian>()?;
                skip(bytes, 2)?;
                if vid == OFP_VLAN_NONE {
                    Action::SetDlVlan(None)
                } else {
                    Action::SetDlVlan(Some(vid))
                }
            }
            2 => {
                let pcp = bytes.read_u8()?;
                skip(bytes, 3)?;
                Action::SetDlVlanPcp(pcp)
            }
            3 => {
                skip(bytes, 4)?;
                Action::SetDlVlan(None)
            }
            4 | 5 => {
                let mac = read_mac(bytes)?;
                skip(bytes, 6)?;
                if typ == 4 {
                    Action::SetDlSrc(mac)
                } else {
                    Action::SetDlDst(mac)
                }
            }
            6 => Action::SetNwSrc(bytes.read_u32::<BigEndian>()?),
            7 => Action::SetNwDst(bytes.read_u32::<BigEndian>()?),
            8 => {
                let tos = bytes.read_u8()?;
                skip(bytes, 3)?;
                Action::SetNwTos(tos)
            }
            9 | 10 => {
                let port = bytes.read_u16::<BigEndian>()?;
                skip(bytes, 2)?;
                if typ == 9 {
                    Action::SetTpSrc(port)
                } else {
                    Action::SetTpDst(port)
                }
            }
            11 => {
                let port = bytes.read_u16::<BigEndian>()?;
                skip(bytes, 6)?;
                let queue_id = bytes.read_u32::<BigEndian>()?;
                Action::Enqueue(PseudoPort::make(port, 0)?, queue_id)
            }
            t => Action::Unknown(t, read_bytes(bytes, len - 4)?),
        };
        if bytes.position() - start != len as u64 {
            return Err(OfpSerializationError::UnexpectedValueError {
                value: len.to_string(),
                field: "length".to_string(),
                message: format!("action type {}", typ),
            });
        }
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
        bytes.write_u16::<BigEndian>(Action::type_code(act))?;
        bytes.write_u16::<BigEndian>(Action::size_of(act) as u16)?;
        match *act {
            Action::Output(pp) => {
                bytes.write_u16::<BigEndian>(PseudoPort::to_int(pp))?;
                match pp {
                    PseudoPort::Controller(w) => bytes.write_u16::<BigEndian>(w)?,
                    _ => bytes.write_u16::<BigEndian>(0)?,
                }
            }
            Action::SetDlVlan(None) => write_padding_bytes(bytes, 4),
            Action::SetDlVlan(Some(vid)) => {
                bytes.write_u16::<BigEndian>(vid)?;
                write_padding_bytes(bytes, 2);
            }
            Action::SetDlVlanPcp(n) | Action::SetNwTos(n) => {
                bytes.write_u8(n)?;
                write_padding_bytes(bytes, 3);
            }
            Action::SetDlSrc(mac) | Action::SetDlDst(mac) => {
                bytes.extend_from_slice(&mac);
                write_padding_bytes(bytes, 6);
            }
            Action::SetNwSrc(addr) | Action::SetNwDst(addr) => {
                bytes.write_u32::<BigEndian>(addr)?
            }
            Action::SetTpSrc(pt) | Action::SetTpDst(pt) => {
                bytes.write_u16::<BigEndian>(pt)?;
                write_padding_bytes(bytes, 2);
            }
            Action::Enqueue(pp, qid) => {
                bytes.write_u16::<BigEndian>(PseudoPort::to_int(pp))?;
                write_padding_bytes(bytes, 6);
                bytes.write_u32::<BigEndian>(qid)?;
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

/// Capabilities supported by the datapath.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub flow_stats: bool,
    pub table_stats: bool,
    pub port_stats: bool,
    pub stp: bool,
    pub ip_reasm: bool,
    pub queue_stats: bool,
    pub arp_match_ip: bool,
}

impl Capabilities {
    pub fn of_int(d: u32) -> Capabilities {
        let d = d as u64;
        Capabilities {
            flow_stats: test_bit(0, d),
            table_stats: test_bit(1, d),
            port_stats: test_bit(2, d),
            stp: test_bit(3, d),
            ip_reasm: test_bit(5, d),
            queue_stats: test_bit(6, d),
            arp_match_ip: test_bit(7, d),
        }
    }

    pub fn to_int(c: &Capabilities) -> u32 {
        let ret = bit(0, 0, c.flow_stats);
        let ret = bit(1, ret, c.table_stats);
        let ret = bit(2, ret, c.port_stats);
        let ret = bit(3, ret, c.stp);
        let ret = bit(5, ret, c.ip_reasm);
        let ret = bit(6, ret, c.queue_stats);
        bit(7, ret, c.arp_match_ip) as u32
    }
}

/// Switch features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub supported_capabilities: Capabilities,
    /// Bitmap of supported action types.
    pub supported_actions: u32,
    pub ports: Vec<PortDesc>,
}

impl MessageType for SwitchFeatures {
    fn parse(buf: &[u8]) -> Result<SwitchFeatures, OfpSerializationError> {
        if buf.len() < FEATURES_REPLY_FIXED_LENGTH
            || (buf.len() - FEATURES_REPLY_FIXED_LENGTH) % PHY_PORT_LENGTH != 0 {
            return Err(OfpSerializationError::UnexpectedValueError {
                value: buf.len().to_string(),
                field: "length".to_string(),
                message: "features reply".to_string(),
            });
        }
        let mut bytes = Cursor::new(buf);
        let datapath_id = bytes.read_u64::<BigEndian>()?;
        let num_buffers = bytes.read_u32::<BigEndian>()?;
        let num_tables = bytes.read_u8()?;
        skip(&mut bytes, 3)?;
        let supported_capabilities = Capabilities::of_int(bytes.read_u32::<BigEndian>()?);
        let supported_actions = bytes.read_u32::<BigEndian>()?;
        let mut ports = vec![];
        while remaining(&bytes) > 0 {
            ports.push(PortDesc::parse(&mut bytes)?);
        }
        Ok(SwitchFeatures {
            datapath_id,
            num_buffers,
            num_tables,
            supported_capabilities,
            supported_actions,
            ports,
        })
    }

    fn marshal(sf: &SwitchFeatures, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u64::<BigEndian>(sf.datapath_id)?;
        bytes.write_u32::<BigEndian>(sf.num_buffers)?;
        bytes.write_u8(sf.num_tables)?;
        write_padding_bytes(bytes, 3);
        bytes.write_u32::<BigEndian>(Capabilities::to_int(&sf.supported_capabilities))?;
        bytes.write_u32::<BigEndian>(sf.supported_actions)?;
        for port in &sf.ports {
            PortDesc::marshal(port, bytes)?;
        }
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

/// Represents modifications to a flow table from the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCmd,
    pub pattern: Pattern,
    pub priority: u16,
    pub actions: Vec<Action>,
    pub cookie: u64,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub notify_when_removed: bool,
    pub apply_to_packet: Option<u32>,
    pub out_port: Option<PseudoPort>,
    pub check_overlap: bool,
    pub emergency: bool,
}

impl FlowMod {
    fn flags_to_int(fm: &FlowMod) -> u16 {
        let ret = bit(0, 0, fm.notify_when_removed);
        let ret = bit(1, ret, fm.check_overlap);
        bit(2, ret, fm.emergency) as u16
    }
}

impl MessageType for FlowMod {
    fn parse(buf: &[u8]) -> Result<FlowMod, OfpSerializationError> {
        if buf.len() < FLOW_MOD_FIXED_LENGTH {
            return Err(OfpSerializationError::truncated("flow mod"));
        }
        let mut bytes = Cursor::new(buf);
        let pattern = Pattern::parse(&mut bytes)?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let command = FlowModCmd::of_int(bytes.read_u16::<BigEndian>()?)?;
        let idle = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let hard = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let priority = bytes.read_u16::<BigEndian>()?;
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        let out_port = PseudoPort::of_int(bytes.read_u16::<BigEndian>()?)?;
        let flags = bytes.read_u16::<BigEndian>()? as u64;
        let actions = Action::parse_sequence(&mut bytes)?;
        Ok(FlowMod {
            command,
            pattern,
            priority,
            actions,
            cookie,
            idle_timeout: idle,
            hard_timeout: hard,
            notify_when_removed: test_bit(0, flags),
            apply_to_packet: match buffer_id {
                NO_BUFFER => None,
                n => Some(n),
            },
            out_port,
            check_overlap: test_bit(1, flags),
            emergency: test_bit(2, flags),
        })
    }

    fn marshal(fm: &FlowMod, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        Pattern::marshal(&fm.pattern, bytes)?;
        bytes.write_u64::<BigEndian>(fm.cookie)?;
        bytes.write_u16::<BigEndian>(fm.command.to_int())?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fm.idle_timeout))?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fm.hard_timeout))?;
        bytes.write_u16::<BigEndian>(fm.priority)?;
        bytes.write_u32::<BigEndian>(fm.apply_to_packet.unwrap_or(NO_BUFFER))?;
        bytes.write_u16::<BigEndian>(PseudoPort::option_to_int(fm.out_port))?;
        bytes.write_u16::<BigEndian>(FlowMod::flags_to_int(fm))?;
        Action::marshal_sequence(&fm.actions, bytes)
    }
}

/// Reason a packet was sent to the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketInReason {
    NoMatch,
    ExplicitSend,
}

/// Represents packets received by the datapath and sent to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketIn {
    pub input_payload: Payload,
    pub total_len: u16,
    pub port: u16,
    pub reason: PacketInReason,
}

impl MessageType for PacketIn {
    fn parse(buf: &[u8]) -> Result<PacketIn, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let buf_id = bytes.read_u32::<BigEndian>()?;
        let total_len = bytes.read_u16::<BigEndian>()?;
        let port = bytes.read_u16::<BigEndian>()?;
        let reason = match bytes.read_u8()? {
            0 => PacketInReason::NoMatch,
            1 => PacketInReason::ExplicitSend,
            r => {
                return Err(OfpSerializationError::UnexpectedValueError {
                    value: format!("{:x}", r),
                    field: "reason".to_string(),
                    message: "packet in".to_string(),
                })
            }
        };
        skip(&mut bytes, 1)?;
        let pk = read_to_end(&mut bytes);
        Ok(PacketIn {
            input_payload: Payload::of_buffer_id(buf_id, pk),
            total_len,
            port,
            reason,
        })
    }

    fn marshal(pi: &PacketIn, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u32::<BigEndian>(pi.input_payload.buffer_id())?;
        bytes.write_u16::<BigEndian>(pi.total_len)?;
        bytes.write_u16::<BigEndian>(pi.port)?;
        bytes.write_u8(match pi.reason {
            PacketInReason::NoMatch => 0,
            PacketInReason::ExplicitSend => 1,
        })?;
        write_padding_bytes(bytes, 1);
        bytes.extend_from_slice(pi.input_payload.data());
        Ok(())
    }
}

/// Flow removed (datapath -> controller).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowRemoved {
    pub pattern: Pattern,
    pub cookie: u64,
    pub priority: u16,
    pub reason: FlowRemovedReason,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: Timeout,
    pub packet_count: u64,
    pub byte_count: u64,
}

impl MessageType for FlowRemoved {
    fn parse(buf: &[u8]) -> Result<FlowRemoved, OfpSerializationError> {
        if buf.len() < FLOW_REMOVED_LENGTH {
            return Err(OfpSerializationError::truncated("flow removed"));
        }
        let mut bytes = Cursor::new(buf);
        let pattern = Pattern::parse(&mut bytes)?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let reason = FlowRemovedReason::of_int(bytes.read_u8()?)?;
        skip(&mut bytes, 1)?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let duration_nsec = bytes.read_u32::<BigEndian>()?;
        let idle = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        skip(&mut bytes, 2)?;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        Ok(FlowRemoved {
            pattern,
            cookie,
            priority,
            reason,
            duration_sec,
            duration_nsec,
            idle_timeout: idle,
            packet_count,
            byte_count,
        })
    }

    fn marshal(f: &FlowRemoved, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        Pattern::marshal(&f.pattern, bytes)?;
        bytes.write_u64::<BigEndian>(f.cookie)?;
        bytes.write_u16::<BigEndian>(f.priority)?;
        bytes.write_u8(f.reason.to_int())?;
        write_padding_bytes(bytes, 1);
        bytes.write_u32::<BigEndian>(f.duration_sec)?;
        bytes.write_u32::<BigEndian>(f.duration_nsec)?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(f.idle_timeout))?;
        write_padding_bytes(bytes, 2);
        bytes.write_u64::<BigEndian>(f.packet_count)?;
        bytes.write_u64::<BigEndian>(f.byte_count)?;
        Ok(())
    }
}

/// Flags to indicate behavior of the physical port.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortConfig {
    pub down: bool,
    pub no_stp: bool,
    pub no_recv: bool,
    pub no_recv_stp: bool,
    pub no_flood: bool,
    pub no_fwd: bool,
    pub no_packet_in: bool,
}

impl PortConfig {
    pub fn of_int(d: u32) -> PortConfig {
        let d = d as u64;
        PortConfig {
            down: test_bit(0, d),
            no_stp: test_bit(1, d),
            no_recv: test_bit(2, d),
            no_recv_stp: test_bit(3, d),
            no_flood: test_bit(4, d),
            no_fwd: test_bit(5, d),
            no_packet_in: test_bit(6, d),
        }
    }

    pub fn to_int(c: &PortConfig) -> u32 {
        let ret = bit(0, 0, c.down);
        let ret = bit(1, ret, c.no_stp);
        let ret = bit(2, ret, c.no_recv);
        let ret = bit(3, ret, c.no_recv_stp);
        let ret = bit(4, ret, c.no_flood);
        let ret = bit(5, ret, c.no_fwd);
        bit(6, ret, c.no_packet_in) as u32
    }
}

/// STP state of a port.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StpState {
    Listen,
    Learn,
    Forward,
    Block,
}

/// Current state of the physical port. Not configurable by the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PortState {
    pub down: bool,
    pub stp_state: StpState,
}

impl PortState {
    pub fn of_int(d: u32) -> PortState {
        PortState {
            down: test_bit(0, d as u64),
            stp_state: match (d >> 8) & 3 {
                0 => StpState::Listen,
                1 => StpState::Learn,
                2 => StpState::Forward,
                _ => StpState::Block,
            },
        }
    }

    pub fn to_int(s: &PortState) -> u32 {
        let stp = match s.stp_state {
            StpState::Listen => 0,
            StpState::Learn => 1,
            StpState::Forward => 2,
            StpState::Block => 3,
        };
        (bit(0, 0, s.down) as u32) | (stp << 8)
    }
}

/// Features of physical ports available in a datapath.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortFeatures {
    pub f_10mbhd: bool,
    pub f_10mbfd: bool,
    pub f_100mbhd: bool,
    pub f_100mbfd: bool,
    pub f_1gbhd: bool,
    pub f_1gbfd: bool,
    pub f_10gbfd: bool,
    pub copper: bool,
    pub fiber: bool,
    pub autoneg: bool,
    pub pause: bool,
    pub pause_asym: bool,
}

impl PortFeatures {
    pub fn of_int(d: u32) -> PortFeatures {
        let d = d as u64;
        PortFeatures {
            f_10mbhd: test_bit(0, d),
            f_10mbfd: test_bit(1, d),
            f_100mbhd: test_bit(2, d),
            f_100mbfd: test_bit(3, d),
            f_1gbhd: test_bit(4, d),
            f_1gbfd: test_bit(5, d),
            f_10gbfd: test_bit(6, d),
            copper: test_bit(7, d),
            fiber: test_bit(8, d),
            autoneg: test_bit(9, d),
            pause: test_bit(10, d),
            pause_asym: test_bit(11, d),
        }
    }

    pub fn to_int(f: &PortFeatures) -> u32 {
        let ret = bit(0, 0, f.f_10mbhd);
        let ret = bit(1, ret, f.f_10mbfd);
        let ret = bit(2, ret, f.f_100mbhd);
        let ret = bit(3, ret, f.f_100mbfd);
        let ret = bit(4, ret, f.f_1gbhd);
        let ret = bit(5, ret, f.f_1gbfd);
        let ret = bit(6, ret, f.f_10gbfd);
        let ret = bit(7, ret, f.copper);
        let ret = bit(8, ret, f.fiber);
        let ret = bit(9, ret, f.autoneg);
        let ret = bit(10, ret, f.pause);
        bit(11, ret, f.pause_asym) as u32
    }

    /// Highest link rate advertised, in bits per second.
    pub fn speed_bps(f: &PortFeatures) -> Option<u64> {
        if f.f_10gbfd {
            Some(10_000_000_000)
        } else if f.f_1gbfd || f.f_1gbhd {
            Some(1_000_000_000)
        } else if f.f_100mbfd || f.f_100mbhd {
            Some(100_000_000)
        } else if f.f_10mbfd || f.f_10mbhd {
            Some(10_000_000)
        } else {
            None
        }
    }
}

/// Description of a physical port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDesc {
    pub port_no: u16,
    pub hw_addr: MacAddr,
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
    pub curr: PortFeatures,
    pub advertised: PortFeatures,
    pub supported: PortFeatures,
    pub peer: PortFeatures,
}

impl PortDesc {
    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<PortDesc, OfpSerializationError> {
        if remaining(bytes) < PHY_PORT_LENGTH {
            return Err(OfpSerializationError::truncated("physical port"));
        }
        let port_no = bytes.read_u16::<BigEndian>()?;
        let hw_addr = read_mac(bytes)?;
        let name = read_fixed_size_string(bytes, OFP_MAX_PORT_NAME_LEN)?;
        let config = PortConfig::of_int(bytes.read_u32::<BigEndian>()?);
        let state = PortState::of_int(bytes.read_u32::<BigEndian>()?);
        let curr = PortFeatures::of_int(bytes.read_u32::<BigEndian>()?);
        let advertised = PortFeatures::of_int(bytes.read_u32::<BigEndian>()?);
        let supported = PortFeatures::of_int(bytes.read_u32::<BigEndian>()?);
        let peer = PortFeatures::of_int(bytes.read_u32::<BigEndian>()?);
        Ok(PortDesc {
            port_no,
            hw_addr,
            name,
            config,
            state,
            curr,
            advertised,
            supported,
            peer,
        })
    }

    pub fn marshal(pd: &PortDesc, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(pd.port_no)?;
        bytes.extend_from_slice(&pd.hw_addr);
        write_fixed_size_string(bytes, &pd.name, OFP_MAX_PORT_NAME_LEN);
        bytes.write_u32::<BigEndian>(PortConfig::to_int(&pd.config))?;
        bytes.write_u32::<BigEndian>(PortState::to_int(&pd.state))?;
        bytes.write_u32::<BigEndian>(PortFeatures::to_int(&pd.curr))?;
        bytes.write_u32::<BigEndian>(PortFeatures::to_int(&pd.advertised))?;
        bytes.write_u32::<BigEndian>(PortFeatures::to_int(&pd.supported))?;
        bytes.write_u32::<BigEndian>(PortFeatures::to_int(&pd.peer))?;
        Ok(())
    }
}

/// A physical port has changed in the datapath.
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
        3 => "FLOW_MOD_FAILED",
        4 => "PORT_MOD_FAILED",
        5 => "QUEUE_OP_FAILED",
        _ => "UNKNOWN",
    }
}

/// Body of a statistics request; the variant determines the request type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatsReqBody {
    DescBody,
    FlowStatsBody {
        pattern: Pattern,
        table_id: u8,
        out_port: Option<PseudoPort>,
    },
    TableBody,
    PortBody {
        port_no: u16,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsReq {
    pub flags: u16,
    pub body: StatsReqBody,
}

const OFPST_DESC: u16 = 0;
const OFPST_FLOW: u16 = 1;
const OFPST_TABLE: u16 = 3;
const OFPST_PORT: u16 = 4;

impl StatsReq {
    pub fn desc() -> StatsReq {
        StatsReq { flags: 0, body: StatsReqBody::DescBody }
    }

    /// Every flow of every table.
    pub fn all_flows() -> StatsReq {
        StatsReq {
            flags: 0,
            body: StatsReqBody::FlowStatsBody {
                pattern: Pattern::match_all(),
                table_id: ALL_TABLES,
                out_port: None,
            },
        }
    }

    /// Counters of every port.
    pub fn all_ports() -> StatsReq {
        StatsReq {
            flags: 0,
            body: StatsReqBody::PortBody { port_no: OfpPort::OFPPNone as u16 },
        }
    }

    fn stats_type(body: &StatsReqBody) -> u16 {
        match *body {
            StatsReqBody::DescBody => OFPST_DESC,
            StatsReqBody::FlowStatsBody { .. } => OFPST_FLOW,
            StatsReqBody::TableBody => OFPST_TABLE,
            StatsReqBody::PortBody { .. } => OFPST_PORT,
        }
    }
}

impl MessageType for StatsReq {
    fn parse(buf: &[u8]) -> Result<StatsReq, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        let body = match typ {
            OFPST_DESC => StatsReqBody::DescBody,
            OFPST_FLOW => {
                let pattern = Pattern::parse(&mut bytes)?;
                let table_id = bytes.read_u8()?;
                skip(&mut bytes, 1)?;
                let out_port = PseudoPort::of_int(bytes.read_u16::<BigEndian>()?)?;
                StatsReqBody::FlowStatsBody { pattern, table_id, out_port }
            }
            OFPST_TABLE => StatsReqBody::TableBody,
            OFPST_PORT => {
                let port_no = bytes.read_u16::<BigEndian>()?;
                skip(&mut bytes, 6)?;
                StatsReqBody::PortBody { port_no }
            }
            t => {
                return Err(OfpSerializationError::UnimplementedFeatureInVersion {
                    version: OPENFLOW_0_01_VERSION,
                    feature: format!("stats request type {}", t),
                })
            }
        };
        Ok(StatsReq { flags, body })
    }

    fn marshal(sr: &StatsReq, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(StatsReq::stats_type(&sr.body))?;
        bytes.write_u16::<BigEndian>(sr.flags)?;
        match sr.body {
            StatsReqBody::DescBody | StatsReqBody::TableBody => (),
            StatsReqBody::FlowStatsBody { ref pattern, table_id, out_port } => {
                Pattern::marshal(pattern, bytes)?;
                bytes.write_u8(table_id)?;
                write_padding_bytes(bytes, 1);
                bytes.write_u16::<BigEndian>(PseudoPort::option_to_int(out_port))?;
            }
            StatsReqBody::PortBody { port_no } => {
                bytes.write_u16::<BigEndian>(port_no)?;
                write_padding_bytes(bytes, 6);
            }
        }
        Ok(())
    }
}

/// Counters of one flow entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStats {
    pub table_id: u8,
    pub pattern: Pattern,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub actions: Vec<Action>,
}

impl FlowStats {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<FlowStats, OfpSerializationError> {
        let length = bytes.read_u16::<BigEndian>()? as usize;
        if length < FLOW_STATS_FIXED_LENGTH || remaining(bytes) < length - 2 {
            return Err(OfpSerializationError::UnexpectedValueError {
                value: length.to_string(),
                field: "length".to_string(),
                message: "flow stats".to_string(),
            });
        }
        let table_id = bytes.read_u8()?;
        skip(bytes, 1)?;
        let pattern = Pattern::parse(bytes)?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let duration_nsec = bytes.read_u32::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let idle_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let hard_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        skip(bytes, 6)?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        let raw_actions = read_bytes(bytes, length - FLOW_STATS_FIXED_LENGTH)?;
        let actions = Action::parse_sequence(&mut Cursor::new(&raw_actions[..]))?;
        Ok(FlowStats {
            table_id,
            pattern,
            duration_sec,
            duration_nsec,
            priority,
            idle_timeout,
            hard_timeout,
            cookie,
            packet_count,
            byte_count,
            actions,
        })
    }

    fn marshal(fs: &FlowStats, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let actions_len: usize = fs.actions.iter().map(Action::size_of).sum();
        bytes.write_u16::<BigEndian>((FLOW_STATS_FIXED_LENGTH + actions_len) as u16)?;
        bytes.write_u8(fs.table_id)?;
        write_padding_bytes(bytes, 1);
        Pattern::marshal(&fs.pattern, bytes)?;
        bytes.write_u32::<BigEndian>(fs.duration_sec)?;
        bytes.write_u32::<BigEndian>(fs.duration_nsec)?;
        bytes.write_u16::<BigEndian>(fs.priority)?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fs.idle_timeout))?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fs.hard_timeout))?;
        write_padding_bytes(bytes, 6);
        bytes.write_u64::<BigEndian>(fs.cookie)?;
        bytes.write_u64::<BigEndian>(fs.packet_count)?;
        bytes.write_u64::<BigEndian>(fs.byte_count)?;
        Action::marshal_sequence(&fs.actions, bytes)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransmissionCounter {
    pub rx: u64,
    pub tx: u64,
}

/// Counters of one port.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortStats {
    pub port_no: u16,
    pub packets: TransmissionCounter,
    pub bytes: TransmissionCounter,
    pub dropped: TransmissionCounter,
    pub errors: TransmissionCounter,
    pub rx_frame_errors: u64,
    pub rx_over_errors: u64,
    pub rx_crc_errors: u64,
    pub collisions: u64,
}

impl PortStats {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<PortStats, OfpSerializationError> {
        if remaining(bytes) < PORT_STATS_LENGTH {
            return Err(OfpSerializationError::truncated("port stats"));
        }
        let port_no = bytes.read_u16::<BigEndian>()?;
        skip(bytes, 6)?;
        let mut counter = || bytes.read_u64::<BigEndian>();
        let packets = TransmissionCounter { rx: counter()?, tx: counter()? };
        let octets = TransmissionCounter { rx: counter()?, tx: counter()? };
        let dropped = TransmissionCounter { rx: counter()?, tx: counter()? };
        let errors = TransmissionCounter { rx: counter()?, tx: counter()? };
        Ok(PortStats {
            port_no,
            packets,
            bytes: octets,
            dropped,
            errors,
            rx_frame_errors: counter()?,
            rx_over_errors: counter()?,
            rx_crc_errors: counter()?,
            collisions: counter()?,
        })
    }

    fn marshal(ps: &PortStats, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(ps.port_no)?;
        write_padding_bytes(bytes, 6);
        for counter in &[ps.packets, ps.bytes, ps.dropped, ps.errors] {
            bytes.write_u64::<BigEndian>(counter.rx)?;
            bytes.write_u64::<BigEndian>(counter.tx)?;
        }
        bytes.write_u64::<BigEndian>(ps.rx_frame_errors)?;
        bytes.write_u64::<BigEndian>(ps.rx_over_errors)?;
        bytes.write_u64::<BigEndian>(ps.rx_crc_errors)?;
        bytes.write_u64::<BigEndian>(ps.collisions)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatsRespBody {
    DescBody(DescStats),
    FlowStatsBody(Vec<FlowStats>),
    PortBody(Vec<PortStats>),
    /// A reply type this crate does not interpret.
    Other { stats_type: u16, body: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsResp {
    pub flags: u16,
    pub body: StatsRespBody,
}

impl StatsResp {
    /// Whether more fragments of this reply follow.
    pub fn more(&self) -> bool {
        self.flags & STATS_REPLY_MORE != 0
    }
}

pub fn parse_desc_stats(bytes: &mut Cursor<&[u8]>) -> Result<DescStats, OfpSerializationError> {
    Ok(DescStats {
        manufacturer_desc: read_fixed_size_string(bytes, DESC_STR_LENGTH)?,
        hardware_desc: read_fixed_size_string(bytes, DESC_STR_LENGTH)?,
        software_desc: read_fixed_size_string(bytes, DESC_STR_LENGTH)?,
        serial_number: read_fixed_size_string(bytes, SERIAL_NUM_LENGTH)?,
        datapath_desc: read_fixed_size_string(bytes, DESC_STR_LENGTH)?,
    })
}

pub fn marshal_desc_stats(desc: &DescStats, bytes: &mut Vec<u8>) {
    write_fixed_size_string(bytes, &desc.manufacturer_desc, DESC_STR_LENGTH);
    write_fixed_size_string(bytes, &desc.hardware_desc, DESC_STR_LENGTH);
    write_fixed_size_string(bytes, &desc.software_desc, DESC_STR_LENGTH);
    write_fixed_size_string(bytes, &desc.serial_number, SERIAL_NUM_LENGTH);
    write_fixed_size_string(bytes, &desc.datapath_desc, DESC_STR_LENGTH);
}

impl MessageType for StatsResp {
    fn parse(buf: &[u8]) -> Result<StatsResp, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        let body = match typ {
            OFPST_DESC => StatsRespBody::DescBody(parse_desc_stats(&mut bytes)?),
            OFPST_FLOW => {
                let mut flows = vec![];
                while remaining(&bytes) > 0 {
                    flows.push(FlowStats::parse(&mut bytes)?);
                }
                StatsRespBody::FlowStatsBody(flows)
            }
            OFPST_PORT => {
                let mut ports = vec![];
                while remaining(&bytes) > 0 {
                    ports.push(PortStats::parse(&mut bytes)?);
                }
                StatsRespBody::PortBody(ports)
            }
            t => StatsRespBody::Other {
                stats_type: t,
                body: read_to_end(&mut bytes),
            },
        };
        Ok(StatsResp { flags, body })
    }

    fn marshal(sr: &StatsResp, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let typ = match sr.body {
            StatsRespBody::DescBody(_) => OFPST_DESC,
            StatsRespBody::FlowStatsBody(_) => OFPST_FLOW,
            StatsRespBody::PortBody(_) => OFPST_PORT,
            StatsRespBody::Other { stats_type, .. } => stats_type,
        };
        bytes.write_u16::<BigEndian>(typ)?;
        bytes.write_u16::<BigEndian>(sr.flags)?;
        match sr.body {
            StatsRespBody::DescBody(ref desc) => marshal_desc_stats(desc, bytes),
            StatsRespBody::FlowStatsBody(ref flows) => {
                for flow in flows {
                    FlowStats::marshal(flow, bytes)?;
                }
            }
            StatsRespBody::PortBody(ref ports) => {
                for port in ports {
                    PortStats::marshal(port, bytes)?;
                }
            }
            StatsRespBody::Other { ref body, .. } => bytes.extend_from_slice(body),
        }
        Ok(())
    }
}

/// Abstractions of OpenFlow 1.0 messages mapping to message codes.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Hello,
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
    StatsRequest(StatsReq),
    StatsReply(StatsResp),
    BarrierRequest,
    BarrierReply,
}

pub fn msg_code_to_u8(msgcode: MsgCode) -> Result<u8, OfpSerializationError> {
    match msgcode {
        MsgCode::Hello => Ok(0),
        MsgCode::Error => Ok(1),
        MsgCode::EchoReq => Ok(2),
        MsgCode::EchoResp => Ok(3),
        MsgCode::Vendor => Ok(4),
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
        MsgCode::PortMod => Ok(15),
        MsgCode::StatsReq => Ok(16),
        MsgCode::StatsResp => Ok(17),
        MsgCode::BarrierReq => Ok(18),
        MsgCode::BarrierResp => Ok(19),
        MsgCode::QueueGetConfigReq => Ok(20),
        MsgCode::QueueGetConfigResp => Ok(21),
        c => Err(OfpSerializationError::UnimplementedFeatureInVersion {
            version: OPENFLOW_0_01_VERSION,
            feature: c.to_string(),
        }),
    }
}

pub fn msg_code_of_u8(code: u8) -> Result<MsgCode, OfpSerializationError> {
    match code {
        0 => Ok(MsgCode::Hello),
        1 => Ok(MsgCode::Error),
        2 => Ok(MsgCode::EchoReq),
        3 => Ok(MsgCode::EchoResp),
        4 => Ok(MsgCode::Vendor),
        5 => Ok(MsgCode::FeaturesReq),
        6 => Ok(MsgCode::FeaturesResp),
        7 => Ok(MsgCode::GetConfigReq),
        8 => Ok(MsgCode::GetConfigResp),
        9 => Ok(MsgCode::SetConfig),
        10 => Ok(MsgCode::PacketIn),
        11 => Ok(MsgCode::FlowRemoved),
        12 => Ok(MsgCode::PortStatus),
        13 => Ok(MsgCode::PacketOut),
        14 => Ok(MsgCode::FlowMod),
        15 => Ok(MsgCode::PortMod),
        16 => Ok(MsgCode::StatsReq),
        17 => Ok(MsgCode::StatsResp),
        18 => Ok(MsgCode::BarrierReq),
        19 => Ok(MsgCode::BarrierResp),
        20 => Ok(MsgCode::QueueGetConfigReq),
        21 => Ok(MsgCode::QueueGetConfigResp),
        c => Err(OfpSerializationError::UnsupportedMessageCode {
            version: OPENFLOW_0_01_VERSION,
            code: c,
        }),
    }
}

impl Message {
    /// Marshal the body of the OpenFlow message `msg`.
    fn marshal_body(msg: &Message, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        match *msg {
            Message::Hello
            | Message::FeaturesReq
            | Message::GetConfigReq
            | Message::BarrierRequest
            | Message::BarrierReply => Ok(()),
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
            Message::StatsRequest(ref sr) => StatsReq::marshal(sr, bytes),
            Message::StatsReply(ref sr) => StatsResp::marshal(sr, bytes),
        }
    }
}

impl OfpMessage for Message {
    fn version() -> u8 {
        OPENFLOW_0_01_VERSION
    }

    fn msg_code(msg: &Message) -> MsgCode {
        match *msg {
            Message::Hello => MsgCode::Hello,
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
            Message::StatsRequest(_) => MsgCode::StatsReq,
            Message::StatsReply(_) => MsgCode::StatsResp,
            Message::BarrierRequest => MsgCode::BarrierReq,
            Message::BarrierReply => MsgCode::BarrierResp,
        }
    }

    fn marshal(xid: Xid, msg: Message) -> Result<Vec<u8>, OfpSerializationError> {
        let typ = msg_code_to_u8(Message::msg_code(&msg))?;
        let mut bytes = vec![];
        OfpHeader::marshal(&mut bytes, OfpHeader::new(OPENFLOW_0_01_VERSION, typ, 0, xid));
        Message::marshal_body(&msg, &mut bytes)?;
        patch_length(&mut bytes)?;
        Ok(bytes)
    }

    fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(Xid, Message), OfpSerializationError> {
        let msg = match msg_code_of_u8(header.type_code())? {
            MsgCode::Hello => Message::Hello,
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
            MsgCode::StatsReq => Message::StatsRequest(StatsReq::parse(buf)?),
            MsgCode::StatsResp => Message::StatsReply(StatsResp::parse(buf)?),
            MsgCode::BarrierReq => Message::BarrierRequest,
            MsgCode::BarrierResp => Message::BarrierReply,
            code => {
                return Err(OfpSerializationError::UnimplementedFeatureInVersion {
                    version: OPENFLOW_0_01_VERSION,
                    feature: code.to_string(),
                })
            }
        };
        Ok((header.xid(), msg))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Return a `FlowMod` adding a flow parameterized by the given `priority`, `pattern`,
    /// and `actions`.
    fn add_flow(prio: u16, pattern: Pattern, actions: Vec<Action>) -> FlowMod {
        FlowMod {
            command: FlowModCmd::AddFlow,
            pattern,
            priority: prio,
            actions,
            cookie: 0,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            notify_when_removed: false,
            apply_to_packet: None,
            out_port: None,
            check_overlap: false,
            emergency: false,
        }
    }

    const TEST_XID: u32 = 0x12345678;
    const TEST_DPID: u64 = 0x0011_2233_4455_6677;

    fn roundtrip(msg: Message) -> (OfpHeader, Message) {
        let data = Message::marshal(TEST_XID, msg).unwrap();
        let header = OfpHeader::parse(&data).unwrap();
        assert_eq!(header.length(), data.len());
        let (xid, parsed) = Message::parse(&header, &data[OfpHeader::size()..]).unwrap();
        assert_eq!(xid, TEST_XID);
        (header, parsed)
    }

    pub fn port_desc(port_no: u16) -> PortDesc {
        PortDesc {
            port_no,
            hw_addr: [0x00, 0x1b, 0x21, 0x00, 0x00, port_no as u8],
            name: format!("eth{}", port_no),
            config: PortConfig::default(),
            state: PortState { down: false, stp_state: StpState::Forward },
            curr: PortFeatures { f_1gbfd: true, copper: true, ..PortFeatures::default() },
            advertised: PortFeatures::default(),
            supported: PortFeatures::default(),
            peer: PortFeatures::default(),
        }
    }

    fn flow_mod_pattern() -> Pattern {
        Pattern {
            in_port: Some(1),
            dl_typ: Some(0x0800),
            nw_src: Some(Mask { value: 0x0a00_0000, mask: Some(8) }),
            nw_proto: Some(6),
            tp_dst: Some(80),
            ..Pattern::match_all()
        }
    }

    #[test]
    fn test_hello_is_header_only() {
        let data = Message::marshal(TEST_XID, Message::Hello).unwrap();
        assert_eq!(data, vec![1, 0, 0, 8, 0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_echo_request_keeps_payload() {
        let (header, msg) = roundtrip(Message::EchoRequest(b"ofcore".to_vec()));
        assert_eq!(header.type_code(), 2);
        assert_eq!(msg, Message::EchoRequest(b"ofcore".to_vec()));
    }

    #[test]
    fn test_features_reply_with_ports() {
        let features = SwitchFeatures {
            datapath_id: TEST_DPID,
            num_buffers: 256,
            num_tables: 2,
            supported_capabilities: Capabilities { flow_stats: true, port_stats: true, ..Capabilities::default() },
            supported_actions: 0xfff,
            ports: vec![port_desc(1), port_desc(2)],
        };
        let data = Message::marshal(TEST_XID, Message::FeaturesReply(features.clone())).unwrap();
        assert_eq!(data.len(), 8 + 24 + 2 * 48);

        let (_, msg) = roundtrip(Message::FeaturesReply(features.clone()));
        assert_eq!(msg, Message::FeaturesReply(features));
    }

    #[test]
    fn test_features_reply_with_partial_port_is_rejected() {
        let header = OfpHeader::new(1, 6, 8 + 24 + 20, TEST_XID);
        let body = vec![0; 24 + 20];
        assert!(Message::parse(&header, &body).is_err());
    }

    #[test]
    fn test_flow_mod_layout() {
        let fm = FlowMod {
            cookie: 0xdead,
            notify_when_removed: true,
            ..add_flow(0x8000, flow_mod_pattern(), vec![
                Action::SetDlDst([1, 2, 3, 4, 5, 6]),
                Action::Output(PseudoPort::PhysicalPort(2)),
                Action::Output(PseudoPort::Controller(128)),
            ])
        };
        let data = Message::marshal(TEST_XID, Message::FlowMod(fm.clone())).unwrap();
        assert_eq!(data.len(), 8 + 64 + 16 + 8 + 8);
        assert_eq!(data[1], 14);

        let (_, msg) = roundtrip(Message::FlowMod(fm.clone()));
        assert_eq!(msg, Message::FlowMod(fm));
    }

    #[test]
    fn test_match_all_wildcards_everything() {
        let w = Pattern::wildcards_of_pattern(&Pattern::match_all());
        assert_eq!(Wildcards::to_int(&w), 0x0038_20ff);
        let mut bytes = vec![];
        Pattern::marshal(&Pattern::match_all(), &mut bytes).unwrap();
        assert_eq!(bytes.len(), 40);
        let parsed = Pattern::parse(&mut Cursor::new(&bytes[..])).unwrap();
        assert_eq!(parsed, Pattern::match_all());
    }

    #[test]
    fn test_untagged_vlan_match() {
        let p = Pattern { dl_vlan: Some(None), ..Pattern::match_all() };
        let mut bytes = vec![];
        Pattern::marshal(&p, &mut bytes).unwrap();
        assert_eq!(&bytes[18..20], &[0xff, 0xff]);
        assert_eq!(Pattern::parse(&mut Cursor::new(&bytes[..])).unwrap(), p);
    }

    #[test]
    fn test_action_with_bad_length_is_rejected() {
        let raw = [0u8, 0, 0, 16, 0, 1, 0, 0];
        assert!(Action::parse(&mut Cursor::new(&raw[..])).is_err());
    }

    #[test]
    fn test_unknown_action_is_kept() {
        let raw = [0xff, 0xff, 0, 8, 0, 0, 0x23, 0x20];
        let action = Action::parse(&mut Cursor::new(&raw[..])).unwrap();
        assert_eq!(action, Action::Unknown(0xffff, vec![0, 0, 0x23, 0x20]));
    }

    #[test]
    fn test_flow_removed() {
        let fr = FlowRemoved {
            pattern: flow_mod_pattern(),
            cookie: 7,
            priority: 100,
            reason: FlowRemovedReason::IdleTimeout,
            duration_sec: 30,
            duration_nsec: 5,
            idle_timeout: Timeout::ExpiresAfter(10),
            packet_count: 3,
            byte_count: 300,
        };
        let data = Message::marshal(TEST_XID, Message::FlowRemoved(fr.clone())).unwrap();
        assert_eq!(data.len(), 8 + 80);
        let (_, msg) = roundtrip(Message::FlowRemoved(fr.clone()));
        assert_eq!(msg, Message::FlowRemoved(fr));
    }

    #[test]
    fn test_port_status_delete() {
        let ps = PortStatus { reason: PortReason::PortDelete, desc: port_desc(3) };
        let (header, msg) = roundtrip(Message::PortStatus(ps.clone()));
        assert_eq!(header.length(), 8 + 8 + 48);
        assert_eq!(msg, Message::PortStatus(ps));
    }

    #[test]
    fn test_port_speed_from_features() {
        assert_eq!(PortFeatures::speed_bps(&port_desc(1).curr), Some(1_000_000_000));
        assert_eq!(PortFeatures::speed_bps(&PortFeatures::default()), None);
    }

    #[test]
    fn test_flow_stats_request_layout() {
        let data = Message::marshal(TEST_XID, Message::StatsRequest(StatsReq::all_flows())).unwrap();
        assert_eq!(data.len(), 8 + 4 + 44);
        assert_eq!(data[1], 16);
        assert_eq!(&data[8..10], &[0, 1]);
        assert_eq!(data[8 + 4 + 40], ALL_TABLES);
        assert_eq!(&data[data.len() - 2..], &[0xff, 0xff]);
    }

    #[test]
    fn test_port_stats_request_layout() {
        let data = Message::marshal(TEST_XID, Message::StatsRequest(StatsReq::all_ports())).unwrap();
        assert_eq!(data.len(), 8 + 4 + 8);
        assert_eq!(&data[12..14], &[0xff, 0xff]);
    }

    #[test]
    fn test_flow_stats_reply_more_flag() {
        let stats = FlowStats {
            table_id: 0,
            pattern: flow_mod_pattern(),
            duration_sec: 1,
            duration_nsec: 2,
            priority: 10,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::ExpiresAfter(60),
            cookie: 0x1,
            packet_count: 10,
            byte_count: 1000,
            actions: vec![Action::Output(PseudoPort::PhysicalPort(1))],
        };
        let reply = StatsResp {
            flags: STATS_REPLY_MORE,
            body: StatsRespBody::FlowStatsBody(vec![stats.clone(), stats]),
        };
        let data = Message::marshal(TEST_XID, Message::StatsReply(reply.clone())).unwrap();
        assert_eq!(data.len(), 8 + 4 + 2 * (88 + 8));
        let (_, msg) = roundtrip(Message::StatsReply(reply.clone()));
        match msg {
            Message::StatsReply(ref resp) => assert!(resp.more()),
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(msg, Message::StatsReply(reply));
    }

    #[test]
    fn test_port_stats_reply() {
        let stats = PortStats {
            port_no: 1,
            packets: TransmissionCounter { rx: 1, tx: 2 },
            bytes: TransmissionCounter { rx: 100, tx: 200 },
            ..PortStats::default()
        };
        let reply = StatsResp { flags: 0, body: StatsRespBody::PortBody(vec![stats]) };
        let data = Message::marshal(TEST_XID, Message::StatsReply(reply.clone())).unwrap();
        assert_eq!(data.len(), 8 + 4 + 104);
        let (_, msg) = roundtrip(Message::StatsReply(reply.clone()));
        assert_eq!(msg, Message::StatsReply(reply));
    }

    #[test]
    fn test_desc_stats_reply() {
        let desc = DescStats {
            manufacturer_desc: "Nicira, Inc.".to_string(),
            hardware_desc: "Open vSwitch".to_string(),
            software_desc: "2.5.0".to_string(),
            serial_number: "None".to_string(),
            datapath_desc: "None".to_string(),
        };
        let reply = StatsResp { flags: 0, body: StatsRespBody::DescBody(desc.clone()) };
        let data = Message::marshal(TEST_XID, Message::StatsReply(reply)).unwrap();
        assert_eq!(data.len(), 8 + 4 + 1056);
        let header = OfpHeader::parse(&data).unwrap();
        let (_, msg) = Message::parse(&header, &data[8..]).unwrap();
        assert_eq!(msg, Message::StatsReply(StatsResp { flags: 0, body: StatsRespBody::DescBody(desc) }));
    }

    #[test]
    fn test_set_config() {
        let (header, msg) = roundtrip(Message::SetConfig(SwitchConfig::full_packet_in()));
        assert_eq!(header.type_code(), 9);
        assert_eq!(header.length(), 12);
        assert_eq!(msg, Message::SetConfig(SwitchConfig { flags: 0, miss_send_len: 0xffff }));
    }

    #[test]
    fn test_error_keeps_data() {
        let err = ErrorMsg { error_type: 1, code: 6, data: vec![0xAB; 10] };
        let (_, msg) = roundtrip(Message::Error(err.clone()));
        assert_eq!(msg, Message::Error(err));
        assert_eq!(error_type_name(1), "BAD_REQUEST");
    }

    #[test]
    fn test_packet_in_buffered() {
        let pi = PacketIn {
            input_payload: Payload::Buffered(42, vec![1, 2, 3, 4]),
            total_len: 4,
            port: 3,
            reason: PacketInReason::NoMatch,
        };
        let (_, msg) = roundtrip(Message::PacketIn(pi.clone()));
        assert_eq!(msg, Message::PacketIn(pi));
    }

    #[test]
    fn test_unknown_type_code_is_rejected() {
        let header = OfpHeader::new(1, 0x42, 8, TEST_XID);
        match Message::parse(&header, &[]) {
            Err(OfpSerializationError::UnsupportedMessageCode { version: 1, code: 0x42 }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_barrier_codes() {
        assert_eq!(msg_code_to_u8(MsgCode::BarrierReq).unwrap(), 18);
        assert_eq!(msg_code_of_u8(19).unwrap(), MsgCode::BarrierResp);
        assert!(msg_code_to_u8(MsgCode::MultipartReq).is_err());
    }
}
