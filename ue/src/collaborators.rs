//! Minimal collaborator implementations (§6 Non-goals: ASN.1 RRC encoding,
//! the NAS stack, and the TUN device are all out of scope for `ue-core`
//! itself). These exist only to wire a runnable binary end to end; a real
//! deployment would replace all three with the genuine ASN.1 codec, NAS
//! state machine, and TUN/platform networking layer.

use bytes::Bytes;
use log::{debug, info};

use ue_core::types::{RrcChannel, Tai};
use ue_core::{DataPlane, NasUplink, ParsedRrc, RrcCodec};

/// Treats every RRC PDU as already-decoded "other" content: enough to let
/// broadcast/dedicated dispatch in `RrcLayer` exercise its channel rules
/// without requiring a real ASN.1 decoder.
pub struct PassthroughRrcCodec;

impl RrcCodec for PassthroughRrcCodec {
    fn decode(&self, channel: RrcChannel, bytes: &[u8]) -> Option<ParsedRrc> {
        debug!("decoding {} bytes on {channel:?} (stub codec)", bytes.len());
        Some(ParsedRrc::Other)
    }
}

/// A NAS stack stand-in that is always ready to send and just logs what it
/// receives.
#[derive(Default)]
pub struct NoopNas;

impl NasUplink for NoopNas {
    fn handle_downlink_nas(&mut self, bytes: Bytes) {
        debug!("received {} bytes of downlink NAS content (stub NAS)", bytes.len());
    }

    fn on_active_cell_changed(&mut self, previous: Option<Tai>) {
        info!("active cell changed, previous tai: {previous:?}");
    }

    fn is_uplink_ready(&self, _psi: u8) -> bool {
        true
    }
}

/// A TUN device stand-in that logs what it would have written.
#[derive(Default)]
pub struct LoggingDataPlane;

impl DataPlane for LoggingDataPlane {
    fn write_to_psi(&mut self, psi: u8, bytes: Bytes) {
        debug!("would write {} bytes to psi {psi} (stub data plane)", bytes.len());
    }
}
