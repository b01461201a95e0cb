//! Point-in-time counters reported by statistics replies.

use crate::flow::{Flow, Flow0x01, Flow0x04};
use crate::interface::PortNo;
use crate::openflow0x01;
use crate::openflow0x04;
use crate::switch::Dpid;

/// Counters of one flow entry, together with the entry they describe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStats {
    pub flow: Flow,
    pub packet_count: u64,
    pub byte_count: u64,
    pub duration_sec: u32,
    pub duration_nsec: u32,
}

impl FlowStats {
    pub fn from_0x01(dpid: Dpid, stats: &openflow0x01::FlowStats) -> FlowStats {
        FlowStats {
            flow: Flow::V0x01(Flow0x01::from_stats(dpid, stats)),
            packet_count: stats.packet_count,
            byte_count: stats.byte_count,
            duration_sec: stats.duration_sec,
            duration_nsec: stats.duration_nsec,
        }
    }

    pub fn from_0x04(dpid: Dpid, stats: &openflow0x04::FlowStats) -> FlowStats {
        FlowStats {
            flow: Flow::V0x04(Flow0x04::from_stats(dpid, stats)),
            packet_count: stats.packet_count,
            byte_count: stats.byte_count,
            duration_sec: stats.duration_sec,
            duration_nsec: stats.duration_nsec,
        }
    }
}

/// Counters of one port. 1.0 switches do not report how long the port has been up.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortStats {
    pub port_no: PortNo,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_frame_errors: u64,
    pub rx_over_errors: u64,
    pub rx_crc_errors: u64,
    pub collisions: u64,
    pub duration_sec: Option<u32>,
}

impl<'a> From<&'a openflow0x01::PortStats> for PortStats {
    fn from(ps: &openflow0x01::PortStats) -> PortStats {
        PortStats {
            port_no: ps.port_no as PortNo,
            rx_packets: ps.packets.rx,
            tx_packets: ps.packets.tx,
            rx_bytes: ps.bytes.rx,
            tx_bytes: ps.bytes.tx,
            rx_dropped: ps.dropped.rx,
            tx_dropped: ps.dropped.tx,
            rx_errors: ps.errors.rx,
            tx_errors: ps.errors.tx,
            rx_frame_errors: ps.rx_frame_errors,
            rx_over_errors: ps.rx_over_errors,
            rx_crc_errors: ps.rx_crc_errors,
            collisions: ps.collisions,
            duration_sec: None,
        }
    }
}

impl<'a> From<&'a openflow0x04::PortStats> for PortStats {
    fn from(ps: &openflow0x04::PortStats) -> PortStats {
        PortStats {
            port_no: ps.port_no,
            rx_packets: ps.rx_packets,
            tx_packets: ps.tx_packets,
            rx_bytes: ps.rx_bytes,
            tx_bytes: ps.tx_bytes,
            rx_dropped: ps.rx_dropped,
            tx_dropped: ps.tx_dropped,
            rx_errors: ps.rx_errors,
            tx_errors: ps.tx_errors,
            rx_frame_errors: ps.rx_frame_err,
            rx_over_errors: ps.rx_over_err,
            rx_crc_errors: ps.rx_crc_err,
            collisions: ps.collisions,
            duration_sec: Some(ps.duration_sec),
        }
    }
}
