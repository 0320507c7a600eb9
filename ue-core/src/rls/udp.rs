//! RLS UDP layer (spec §4.C): heartbeat cycle, receive dispatch, cell
//! add/drop. Grounded on `udp_layer.hpp`/`udp_layer.cpp`'s `RlsUdpLayer`
//! (`checkHeartbeat`, `receiveRlsPdu`, `heartbeatCycle`, `send`).

use std::net::SocketAddr;

use bytes::BytesMut;

use crate::cell_table::CellTable;
use crate::error::CodecError;
use crate::pdu::{self, RlsMessage, SimPosition};
use crate::rls::sockets::Sockets;

/// §4.C: "at most once per `LOOP_PERIOD`".
pub const LOOP_PERIOD_MS: u64 = 1000;

/// What the task loop must do in response to a received datagram, once the
/// UDP layer has classified it. Heartbeat-acks are fully handled inside
/// this layer (cell table update); everything else either needs RRC
/// (signal change) or the RLS control layer (PDU delivery/acks).
pub enum RlsInboundEvent {
    SignalChanged { cell_id: u32, dbm: i32 },
    Forward { cell_id: u32, message: RlsMessage },
}

pub struct RlsUdpLayer {
    sti: u64,
    search_space: Vec<SocketAddr>,
    cells: CellTable,
    last_loop: Option<u64>,
    sim_pos: SimPosition,
    send_buf: BytesMut,
}

impl RlsUdpLayer {
    pub fn new(sti: u64, search_space: Vec<SocketAddr>) -> Self {
        Self {
            sti,
            search_space,
            cells: CellTable::new(),
            last_loop: None,
            sim_pos: SimPosition {
                x: 0.0,
                y: 0.0,
                z: 0.0,
            },
            send_buf: BytesMut::with_capacity(2048),
        }
    }

    pub fn cells(&self) -> &CellTable {
        &self.cells
    }

    /// `checkHeartbeat()` (§4.C). Gated internally to at most once per
    /// `LOOP_PERIOD_MS`, so the task loop can call it unconditionally on
    /// every iteration exactly like the original's `onLoop`. Returns the
    /// ids of cells dropped this cycle; the caller notifies RRC for each.
    pub fn check_heartbeat(&mut self, now_ms: u64, sockets: &Sockets) -> Vec<u32> {
        if let Some(last) = self.last_loop {
            if now_ms.saturating_sub(last) <= LOOP_PERIOD_MS {
                return Vec::new();
            }
        }
        self.last_loop = Some(now_ms);

        let expired = self.cells.expire(now_ms);

        pdu::encode_heartbeat(&mut self.send_buf, self.sti, self.sim_pos);
        for addr in &self.search_space {
            if let Err(e) = sockets.send_to(*addr, &self.send_buf) {
                log::warn!("heartbeat send to {addr} failed: {e}");
            }
        }

        expired
    }

    /// `send(cellId, buffer)` (§4.C): resolves `cellId` to its current
    /// remote address and picks the matching address-family socket.
    /// Silently no-ops if the cell is no longer known, matching the
    /// original's `if (m_cellIdToSti.count(cellId))` guard.
    pub fn send(&self, cell_id: u32, bytes: &[u8], sockets: &Sockets) {
        if let Some(info) = self.cells.lookup_by_cell(cell_id) {
            if let Err(e) = sockets.send_to(info.address, bytes) {
                log::warn!("send to cell {cell_id} failed: {e}");
            }
        }
    }

    /// `receiveRlsPdu(address, bytes)` (§4.C). Malformed datagrams are the
    /// caller's responsibility to log (§7 "Malformed input"); this returns
    /// the decode error so the caller can do so uniformly.
    pub fn receive(
        &mut self,
        from: SocketAddr,
        buffer: &[u8],
        now_ms: u64,
    ) -> Result<Option<RlsInboundEvent>, CodecError> {
        let message = match pdu::decode(buffer)? {
            Some(message) => message,
            None => return Ok(None), // reserved/deprecated opcode, ignored
        };

        if let RlsMessage::HeartbeatAck { sti, dbm } = message {
            let (cell_id, changed) = self.cells.upsert_from_ack(sti, from, now_ms, dbm);
            return Ok(if changed {
                Some(RlsInboundEvent::SignalChanged { cell_id, dbm })
            } else {
                None
            });
        }

        // Any non-ack message from an STI we've never heard a heartbeat-ack
        // from is dropped silently: this prevents undiscovered peers from
        // injecting control traffic (§4.C, §7 "Unknown peer").
        match self.cells.lookup_by_sti(message.sti()) {
            Some(info) => Ok(Some(RlsInboundEvent::Forward {
                cell_id: info.cell_id,
                message,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4997".parse().unwrap()
    }

    #[test]
    fn unknown_peer_non_ack_is_dropped() {
        let mut layer = RlsUdpLayer::new(1, vec![addr()]);
        let mut buf = BytesMut::new();
        pdu::encode_pdu_transmission_ack(&mut buf, 99, &[1]);
        let event = layer.receive(addr(), &buf, 0).unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn first_heartbeat_ack_registers_cell_and_reports_change() {
        let mut layer = RlsUdpLayer::new(1, vec![addr()]);
        let mut buf = BytesMut::new();
        pdu::encode_heartbeat_ack(&mut buf, 99, -80);
        let event = layer.receive(addr(), &buf, 0).unwrap();
        match event {
            Some(RlsInboundEvent::SignalChanged { cell_id, dbm }) => {
                assert_eq!(cell_id, 1);
                assert_eq!(dbm, -80);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn known_peer_pdu_transmission_is_forwarded() {
        let mut layer = RlsUdpLayer::new(1, vec![addr()]);
        let mut buf = BytesMut::new();
        pdu::encode_heartbeat_ack(&mut buf, 99, -80);
        layer.receive(addr(), &buf, 0).unwrap();

        pdu::encode_pdu_transmission(&mut buf, 99, pdu::PduType::Data, 5, 0, b"x");
        let event = layer.receive(addr(), &buf, 10).unwrap();
        match event {
            Some(RlsInboundEvent::Forward { cell_id, .. }) => assert_eq!(cell_id, 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    impl std::fmt::Debug for RlsInboundEvent {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                RlsInboundEvent::SignalChanged { cell_id, dbm } => {
                    write!(f, "SignalChanged({cell_id}, {dbm})")
                }
                RlsInboundEvent::Forward { cell_id, .. } => write!(f, "Forward({cell_id})"),
            }
        }
    }
}
