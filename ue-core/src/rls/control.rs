//! RLS control layer (spec §4.D): outgoing PDU ids, pending-ack set,
//! retransmission, and inbound ack batching. There is no single source
//! file for this in `original_source/` (UERANSIM's `RlsCtlLayer` itself
//! was not part of the retrieved file set) so this is grounded on the two
//! collaborators it sits between: `udp_layer.cpp`'s `send`/fd-selection
//! contract, and `rls_pdu.hpp`'s wire types, combined per spec §4.D.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::UeTaskError;
use crate::pdu::{self, PduType, RlsMessage};
use crate::rls::sockets::Sockets;
use crate::rls::udp::RlsUdpLayer;

/// §4.D: "per-PDU retry limit = 3".
pub const RETRY_LIMIT: u8 = 3;
/// §4.D `RLS_ACK_SEND` period; recommended retransmit threshold is "one
/// ack-send period" (SPEC_FULL §4, open question resolved this way).
pub const RETRANSMIT_THRESHOLD_MS: u64 = 2250;

struct PendingAck {
    cell_id: u32,
    bytes: Bytes,
    first_sent_ms: u64,
    last_sent_ms: u64,
    retries: u8,
}

/// Raised when a pending ack exceeds the retry cap (§7 "Delivery
/// failure"): the caller surfaces this to RRC as a potential link issue.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryFailure {
    pub cell_id: u32,
    pub pdu_id: u32,
}

/// What an inbound `PDU_TRANSMISSION` should be handed to next (§4.D).
pub enum ControlInboundEffect {
    DeliverRrc { channel_hint: u32, pdu: Bytes },
    DeliverData { psi: u8, pdu: Bytes },
}

pub struct RlsControlLayer {
    sti: u64,
    pdu_id_counter: u32,
    pending_acks: HashMap<u32, PendingAck>,
    ack_outbox: HashMap<u32, Vec<u32>>,
    current_cell: u32,
    send_buf: bytes::BytesMut,
}

impl RlsControlLayer {
    pub fn new(sti: u64) -> Self {
        Self {
            sti,
            pdu_id_counter: 0,
            pending_acks: HashMap::new(),
            ack_outbox: HashMap::new(),
            current_cell: 0,
            send_buf: bytes::BytesMut::with_capacity(2048),
        }
    }

    pub fn current_cell(&self) -> u32 {
        self.current_cell
    }

    pub fn pending_ack_count(&self) -> usize {
        self.pending_acks.len()
    }

    fn deliver(
        &mut self,
        cell_id: u32,
        pdu_type: PduType,
        payload: u32,
        pdu: &[u8],
        rls_udp: &RlsUdpLayer,
        sockets: &Sockets,
        now_ms: u64,
    ) -> Result<u32, UeTaskError> {
        let pdu_id = self
            .pdu_id_counter
            .checked_add(1)
            .ok_or(UeTaskError::PduIdOverflow)?;
        self.pdu_id_counter = pdu_id;

        pdu::encode_pdu_transmission(&mut self.send_buf, self.sti, pdu_type, pdu_id, payload, pdu);
        let frame = self.send_buf.clone().freeze();
        rls_udp.send(cell_id, &frame, sockets);

        self.pending_acks.insert(
            pdu_id,
            PendingAck {
                cell_id,
                bytes: frame,
                first_sent_ms: now_ms,
                last_sent_ms: now_ms,
                retries: 0,
            },
        );

        Ok(pdu_id)
    }

    /// `handleUplinkRrcDelivery(cellId, payloadHint, channel, bytes)`. The
    /// RRC channel itself is opaque to this layer (§1); only the numeric
    /// hint travels on the wire (§4.A `payload`).
    pub fn handle_uplink_rrc_delivery(
        &mut self,
        cell_id: u32,
        payload_hint: u32,
        pdu: &[u8],
        rls_udp: &RlsUdpLayer,
        sockets: &Sockets,
        now_ms: u64,
    ) -> Result<u32, UeTaskError> {
        self.deliver(cell_id, PduType::Rrc, payload_hint, pdu, rls_udp, sockets, now_ms)
    }

    /// `handleUplinkDataDelivery(psi, bytes)`: targets whatever cell is
    /// currently assigned via `assignCurrentCell` (§4.D).
    pub fn handle_uplink_data_delivery(
        &mut self,
        psi: u8,
        pdu: &[u8],
        rls_udp: &RlsUdpLayer,
        sockets: &Sockets,
        now_ms: u64,
    ) -> Result<u32, UeTaskError> {
        let cell_id = self.current_cell;
        self.deliver(cell_id, PduType::Data, psi as u32, pdu, rls_udp, sockets, now_ms)
    }

    /// `RLS_ACK_SEND` timer (§4.D): one batched ack per cell with a
    /// non-empty outbox, ids in enqueue order (§5 ordering guarantee c).
    pub fn ack_send_tick(&mut self, rls_udp: &RlsUdpLayer, sockets: &Sockets) {
        let cell_ids: Vec<u32> = self
            .ack_outbox
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(cell_id, _)| *cell_id)
            .collect();

        for cell_id in cell_ids {
            let ids = self.ack_outbox.remove(&cell_id).unwrap_or_default();
            pdu::encode_pdu_transmission_ack(&mut self.send_buf, self.sti, &ids);
            rls_udp.send(cell_id, &self.send_buf, sockets);
        }
    }

    /// `RLS_ACK_CONTROL` timer (§4.D): resend anything whose last send is
    /// older than [`RETRANSMIT_THRESHOLD_MS`], dropping and reporting
    /// entries that have already exhausted [`RETRY_LIMIT`] retries.
    pub fn ack_control_tick(
        &mut self,
        now_ms: u64,
        rls_udp: &RlsUdpLayer,
        sockets: &Sockets,
    ) -> Vec<DeliveryFailure> {
        let mut failures = Vec::new();
        let mut drop_ids = Vec::new();
        let mut resend = Vec::new();

        for (pdu_id, pending) in self.pending_acks.iter_mut() {
            if now_ms.saturating_sub(pending.last_sent_ms) <= RETRANSMIT_THRESHOLD_MS {
                continue;
            }
            if pending.retries >= RETRY_LIMIT {
                drop_ids.push(*pdu_id);
                failures.push(DeliveryFailure {
                    cell_id: pending.cell_id,
                    pdu_id: *pdu_id,
                });
                continue;
            }
            pending.retries += 1;
            pending.last_sent_ms = now_ms;
            resend.push((pending.cell_id, pending.bytes.clone()));
        }

        for id in drop_ids {
            self.pending_acks.remove(&id);
        }
        for (cell_id, bytes) in resend {
            rls_udp.send(cell_id, &bytes, sockets);
        }

        failures
    }

    /// `handleRlsMessage(cellId, msgType, bytes)` for the two message
    /// types the RLS UDP layer forwards here (§4.D). Heartbeat variants
    /// never reach this layer (handled entirely in [`RlsUdpLayer`]).
    pub fn handle_rls_message(
        &mut self,
        cell_id: u32,
        message: RlsMessage,
    ) -> Option<ControlInboundEffect> {
        match message {
            RlsMessage::PduTransmission {
                pdu_type,
                pdu_id,
                payload,
                pdu,
                ..
            } => {
                self.ack_outbox.entry(cell_id).or_default().push(pdu_id);
                match pdu_type {
                    PduType::Rrc => Some(ControlInboundEffect::DeliverRrc {
                        channel_hint: payload,
                        pdu,
                    }),
                    PduType::Data => Some(ControlInboundEffect::DeliverData {
                        psi: payload as u8,
                        pdu,
                    }),
                }
            }
            RlsMessage::PduTransmissionAck { pdu_ids, .. } => {
                for id in pdu_ids {
                    self.pending_acks.remove(&id);
                }
                None
            }
            RlsMessage::Heartbeat { .. } | RlsMessage::HeartbeatAck { .. } => None,
        }
    }

    /// `assignCurrentCell(cellId)` (§4.D). Clears state owed to the
    /// previous cell when it changes to something else.
    pub fn assign_current_cell(&mut self, new_cell_id: u32) {
        let old = self.current_cell;
        if old == new_cell_id {
            return;
        }
        if old != 0 {
            self.pending_acks.retain(|_, pending| pending.cell_id != old);
            self.ack_outbox.remove(&old);
        }
        self.current_cell = new_cell_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rls::udp::RlsUdpLayer;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:4997".parse().unwrap()
    }

    fn rls_with_cell(cell_id_sti: u64) -> RlsUdpLayer {
        let mut udp = RlsUdpLayer::new(1, vec![addr()]);
        let mut buf = bytes::BytesMut::new();
        pdu::encode_heartbeat_ack(&mut buf, cell_id_sti, -80);
        udp.receive(addr(), &buf, 0).unwrap();
        udp
    }

    #[tokio::test]
    async fn pdu_ids_start_at_one_and_retransmit_then_fail() {
        let sockets = Sockets::bind_ephemeral().await.unwrap();
        let peer = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();

        let mut rls_udp = RlsUdpLayer::new(1, vec![peer_addr]);
        let mut buf = bytes::BytesMut::new();
        pdu::encode_heartbeat_ack(&mut buf, 99, -80);
        rls_udp.receive(peer_addr, &buf, 0).unwrap();

        let mut ctl = RlsControlLayer::new(7);
        let id1 = ctl
            .handle_uplink_rrc_delivery(1, 0, b"hello", &rls_udp, &sockets, 0)
            .unwrap();
        let id2 = ctl
            .handle_uplink_rrc_delivery(1, 0, b"world", &rls_udp, &sockets, 0)
            .unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(ctl.pending_ack_count(), 2);

        let mut now = RETRANSMIT_THRESHOLD_MS + 1;
        for _ in 0..RETRY_LIMIT {
            let failures = ctl.ack_control_tick(now, &rls_udp, &sockets);
            assert!(failures.is_empty());
            now += RETRANSMIT_THRESHOLD_MS + 1;
        }
        assert_eq!(ctl.pending_ack_count(), 2);

        let failures = ctl.ack_control_tick(now, &rls_udp, &sockets);
        assert_eq!(failures.len(), 2);
        assert_eq!(ctl.pending_ack_count(), 0);
    }

    #[test]
    fn assign_current_cell_clears_old_pending_acks() {
        let mut ctl = RlsControlLayer::new(7);
        ctl.assign_current_cell(3);
        // synthesize pending ack state directly since deliver() needs real sockets
        ctl.pending_acks.insert(
            1,
            PendingAck {
                cell_id: 3,
                bytes: Bytes::from_static(b"x"),
                first_sent_ms: 0,
                last_sent_ms: 0,
                retries: 0,
            },
        );
        ctl.ack_outbox.insert(3, vec![10]);
        ctl.assign_current_cell(4);
        assert!(ctl.pending_ack_count() == 0);
        assert!(!ctl.ack_outbox.contains_key(&3));
        assert_eq!(ctl.current_cell(), 4);
    }

    #[test]
    fn ack_batching_preserves_enqueue_order() {
        let mut ctl = RlsControlLayer::new(7);
        let msg1 = RlsMessage::PduTransmission {
            sti: 99,
            pdu_type: PduType::Data,
            pdu_id: 41,
            payload: 0,
            pdu: Bytes::from_static(b"a"),
        };
        let msg2 = RlsMessage::PduTransmission {
            sti: 99,
            pdu_type: PduType::Data,
            pdu_id: 42,
            payload: 0,
            pdu: Bytes::from_static(b"b"),
        };
        ctl.handle_rls_message(7, msg1);
        ctl.handle_rls_message(7, msg2);
        assert_eq!(ctl.ack_outbox.get(&7).unwrap(), &vec![41, 42]);
    }

    #[test]
    fn inbound_ack_clears_pending() {
        let mut ctl = RlsControlLayer::new(7);
        ctl.pending_acks.insert(
            5,
            PendingAck {
                cell_id: 1,
                bytes: Bytes::from_static(b"x"),
                first_sent_ms: 0,
                last_sent_ms: 0,
                retries: 0,
            },
        );
        let ack = RlsMessage::PduTransmissionAck {
            sti: 99,
            pdu_ids: vec![5, 999],
        };
        ctl.handle_rls_message(1, ack);
        assert_eq!(ctl.pending_ack_count(), 0);
    }
}
