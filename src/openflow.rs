use std::fmt::{Display, Error, Formatter};

/// OpenFlow message type codes, used by headers to identify meaning of the rest of a message.
/// This is the union of the type names of every supported protocol version; the numeric
/// value of each code is defined by the version modules.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MsgCode {
    Hello,
    Error,
    EchoReq,
    EchoResp,
    Vendor,
    Experimenter,
    FeaturesReq,
    FeaturesResp,
    GetConfigReq,
    GetConfigResp,
    SetConfig,
    PacketIn,
    FlowRemoved,
    PortStatus,
    PacketOut,
    FlowMod,
    GroupMod,
    PortMod,
    TableMod,
    StatsReq,
    StatsResp,
    MultipartReq,
    MultipartResp,
    BarrierReq,
    BarrierResp,
    QueueGetConfigReq,
    QueueGetConfigResp,
    RoleReq,
    RoleResp,
    GetAsyncReq,
    GetAsyncResp,
    SetAsync,
    MeterMod,
}

impl MsgCode {
    /// Whether the message is a liveness probe or its answer.
    pub fn is_echo(self) -> bool {
        self == MsgCode::EchoReq || self == MsgCode::EchoResp
    }
}

impl Display for MsgCode {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let text = match self {
            MsgCode::Hello => "Hello",
            MsgCode::Error => "Error",
            MsgCode::EchoReq => "EchoReq",
            MsgCode::EchoResp => "EchoResp",
            MsgCode::Vendor => "Vendor",
            MsgCode::Experimenter => "Experimenter",
            MsgCode::FeaturesReq => "FeaturesReq",
            MsgCode::FeaturesResp => "FeaturesResp",
            MsgCode::GetConfigReq => "GetConfigReq",
            MsgCode::GetConfigResp => "GetConfigResp",
            MsgCode::SetConfig => "SetConfig",
            MsgCode::PacketIn => "PacketIn",
            MsgCode::FlowRemoved => "FlowRemoved",
            MsgCode::PortStatus => "PortStatus",
            MsgCode::PacketOut => "PacketOut",
            MsgCode::FlowMod => "FlowMod",
            MsgCode::GroupMod => "GroupMod",
            MsgCode::PortMod => "PortMod",
            MsgCode::TableMod => "TableMod",
            MsgCode::StatsReq => "StatsReq",
            MsgCode::StatsResp => "StatsResp",
            MsgCode::MultipartReq => "MultipartReq",
            MsgCode::MultipartResp => "MultipartResp",
            MsgCode::BarrierReq => "BarrierReq",
            MsgCode::BarrierResp => "BarrierResp",
            MsgCode::QueueGetConfigReq => "QueueGetConfigReq",
            MsgCode::QueueGetConfigResp => "QueueGetConfigResp",
            MsgCode::RoleReq => "RoleReq",
            MsgCode::RoleResp => "RoleResp",
            MsgCode::GetAsyncReq => "GetAsyncReq",
            MsgCode::GetAsyncResp => "GetAsyncResp",
            MsgCode::SetAsync => "SetAsync",
            MsgCode::MeterMod => "MeterMod",
        };
        f.write_str(text)
    }
}
