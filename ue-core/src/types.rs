//! Shared domain value types (§3, §GLOSSARY). Small, `Copy` where sensible,
//! so cell-selection candidate lists can be filtered and sorted cheaply.

use serde::{Deserialize, Serialize};

/// Public Land Mobile Network identity (MCC+MNC). `is_long_mnc` distinguishes
/// a 2-digit from a 3-digit MNC the same way the original's
/// `isLongMnc` flag does, since `012` and `12` are different MNCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plmn {
    pub mcc: u16,
    pub mnc: u16,
    pub is_long_mnc: bool,
}

/// Tracking Area Identity: PLMN + TAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tai {
    pub plmn: Plmn,
    pub tac: u32,
}

/// Result of RRC cell selection (§4.E). Serialized for log lines only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellCategory {
    Suitable,
    Acceptable,
}

/// Zero value ("no active cell") is represented by `cell_id == 0`, matching
/// `ActiveCellInfo` in §3: there is deliberately no `Option` wrapper here,
/// since downstream code (RLS control) keys pending state off the raw id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCellInfo {
    pub cell_id: u32,
    pub plmn: Plmn,
    pub tac: u32,
    pub category: CellCategory,
}

impl ActiveCellInfo {
    pub const NONE: ActiveCellInfo = ActiveCellInfo {
        cell_id: 0,
        plmn: Plmn {
            mcc: 0,
            mnc: 0,
            is_long_mnc: false,
        },
        tac: 0,
        category: CellCategory::Acceptable,
    };

    pub fn is_active(&self) -> bool {
        self.cell_id != 0
    }

    pub fn tai(&self) -> Tai {
        Tai {
            plmn: self.plmn,
            tac: self.tac,
        }
    }
}

impl Default for ActiveCellInfo {
    fn default() -> Self {
        Self::NONE
    }
}

/// RRC logical channels carrying encoded RRC PDUs (§6). Broadcast channels
/// can be decoded from any known cell; dedicated channels require the
/// sending cell to be the currently active one (§4.E `handleDownlinkRrc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrcChannel {
    BcchBch,
    BcchDlSch,
    DlCcch,
    DlDcch,
    Pcch,
    UlCcch,
    UlCcch1,
    UlDcch,
}

impl RrcChannel {
    pub fn is_broadcast(self) -> bool {
        matches!(
            self,
            RrcChannel::BcchBch | RrcChannel::BcchDlSch | RrcChannel::DlCcch
        )
    }

    pub fn is_dedicated(self) -> bool {
        matches!(self, RrcChannel::DlDcch | RrcChannel::Pcch)
    }

    /// Numeric form carried in the RLS `PDU_TRANSMISSION` payload/channel
    /// hint field (§4.A) for RRC-bearing PDUs.
    pub fn to_wire(self) -> u32 {
        match self {
            RrcChannel::BcchBch => 0,
            RrcChannel::BcchDlSch => 1,
            RrcChannel::DlCcch => 2,
            RrcChannel::DlDcch => 3,
            RrcChannel::Pcch => 4,
            RrcChannel::UlCcch => 5,
            RrcChannel::UlCcch1 => 6,
            RrcChannel::UlDcch => 7,
        }
    }

    pub fn from_wire(value: u32) -> Option<Self> {
        Some(match value {
            0 => RrcChannel::BcchBch,
            1 => RrcChannel::BcchDlSch,
            2 => RrcChannel::DlCcch,
            3 => RrcChannel::DlDcch,
            4 => RrcChannel::Pcch,
            5 => RrcChannel::UlCcch,
            6 => RrcChannel::UlCcch1,
            7 => RrcChannel::UlDcch,
            _ => return None,
        })
    }
}

/// PDU session type, carried in session templates (§6). Kept as a plain
/// enum even though only the NAS layer above the core interprets it: the
/// core still validates it at config time (§7 "Fatal config error").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PduSessionType {
    Ipv4,
    Ipv6,
    Ipv4v6,
    Ethernet,
    Unstructured,
}
