//! Trait boundaries for the external collaborators listed in spec §6. The
//! core only ever talks to these through the interfaces below; concrete
//! implementations (real NAS stack, ASN.1 codec, TUN device) live outside
//! this crate. Kept deliberately thin: spec §1 treats all of these as
//! opaque bytes-in/bytes-out or event producers, never logic the core
//! owns.

use bytes::Bytes;

use crate::types::Tai;

/// Parsed contents of an RRC broadcast/dedicated message, to the extent the
/// core needs to act on it. Real ASN.1 decoding is out of scope (§1); this
/// is the shape a real `RrcCodec` implementation is expected to produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRrc {
    /// MIB barred flag (§3 `CellDesc`).
    Mib { is_barred: bool },
    /// SIB1 PLMN/TAC/reserved flag (§3 `CellDesc`).
    Sib1 {
        plmn: crate::types::Plmn,
        tac: u32,
        is_reserved: bool,
    },
    /// Any other dedicated/paging RRC message; the core does not need to
    /// interpret it further, only to know decoding succeeded.
    Other,
}

/// The ASN.1 RRC codec collaborator (§6): encode/decode over
/// `{BCCH-BCH, BCCH-DL-SCH, DL-CCCH, DL-DCCH, PCCH, UL-CCCH, UL-CCCH1,
/// UL-DCCH}`.
pub trait RrcCodec {
    /// Returns `None` on decode failure; the caller logs and drops.
    fn decode(&self, channel: crate::types::RrcChannel, bytes: &[u8]) -> Option<ParsedRrc>;
}

/// The NAS layer above RRC (§6): opaque uplink producer / downlink
/// consumer, plus the two hooks called out in SPEC_FULL §3 that the
/// original's `ue/nas/sm/sap.cpp` gates uplink data delivery on.
pub trait NasUplink {
    /// Delivers decoded downlink NAS bytes carried inside an RRC message.
    fn handle_downlink_nas(&mut self, bytes: Bytes);

    /// Called whenever the active cell changes, carrying the *previous*
    /// active cell's `Tai` (SPEC_FULL §3, matching `notifyCellLost`'s
    /// `Tai{lastActiveCell.plmn, lastActiveCell.tac}` call).
    fn on_active_cell_changed(&mut self, previous: Option<Tai>);

    /// Whether NAS currently considers itself ready to send user-plane
    /// data for this PDU session (CM-CONNECTED-equivalent gate).
    fn is_uplink_ready(&self, psi: u8) -> bool;
}

/// Per-PSI TUN boundary (§6): downlink DATA PDUs are written here.
pub trait DataPlane {
    fn write_to_psi(&mut self, psi: u8, bytes: Bytes);
}
