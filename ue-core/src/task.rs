//! The cooperative single-thread-per-UE task loop (spec §4.F). Grounded on
//! `ue/task.hpp`/`task.cpp`'s `UeTask`: the `onStart`/`onLoop`/`onQuit`
//! shape, the `TimerPeriod` constants, and `checkTimers`'s priority chain.
//! The original's blocking `fdBase->performSelect()` becomes a single
//! `tokio::select!`, which is this loop's only suspension point (§5).

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::collaborators::{DataPlane, NasUplink, RrcCodec};
use crate::error::UeTaskError;
use crate::rls::control::{ControlInboundEffect, RlsControlLayer};
use crate::rls::sockets::Sockets;
use crate::rls::udp::{RlsInboundEvent, RlsUdpLayer};
use crate::rrc::{RrcLayer, LOST_SIGNAL_DBM};
use crate::types::{Plmn, RrcChannel};

/// `TimerPeriod` (§4.F).
const L3_MACHINE_CYCLE_MS: u64 = 2500;
const L3_TIMER_MS: u64 = 1000;
const RLS_ACK_CONTROL_MS: u64 = 1500;
const RLS_ACK_SEND_MS: u64 = 2250;
const SWITCH_OFF_MS: u64 = 500;

const RECV_BUFFER_SIZE: usize = 32 * 1024;

struct Timer {
    deadline_ms: Option<u64>,
    period_ms: u64,
}

impl Timer {
    fn armed(now_ms: u64, period_ms: u64) -> Self {
        Self { deadline_ms: Some(now_ms + period_ms), period_ms }
    }

    fn is_due(&self, now_ms: u64) -> bool {
        matches!(self.deadline_ms, Some(d) if d <= now_ms)
    }

    fn rearm(&mut self, now_ms: u64) {
        self.deadline_ms = Some(now_ms + self.period_ms);
    }
}

/// One UE's full radio-link core: RLS UDP + control, RRC, and the three
/// external collaborators wired in from outside this crate (§6).
pub struct UeTask<N, C, D> {
    sockets: Sockets,
    rls_udp: RlsUdpLayer,
    rls_ctl: RlsControlLayer,
    rrc: RrcLayer,
    nas: N,
    codec: C,
    data_plane: D,
    uplink_rx: mpsc::UnboundedReceiver<(u8, Bytes)>,

    epoch: Instant,
    l3_machine_cycle: Timer,
    l3_timer: Timer,
    rls_ack_control: Timer,
    rls_ack_send: Timer,
    switch_off_at: Option<u64>,
    immediate_cycle: bool,
}

impl<N, C, D> UeTask<N, C, D>
where
    N: NasUplink,
    C: RrcCodec,
    D: DataPlane,
{
    /// The channel a TUN-reading collaborator (outside this crate, §6) uses
    /// to hand uplink user-plane data to this task: `(psi, payload)` pairs,
    /// one per PDU session. Call before [`UeTask::new`] and keep the sender
    /// half alive for the task's lifetime.
    pub fn uplink_channel() -> (mpsc::UnboundedSender<(u8, Bytes)>, mpsc::UnboundedReceiver<(u8, Bytes)>) {
        mpsc::unbounded_channel()
    }

    pub fn new(
        sti: u64,
        search_space: Vec<SocketAddr>,
        selected_plmn: Option<Plmn>,
        sockets: Sockets,
        nas: N,
        codec: C,
        data_plane: D,
        uplink_rx: mpsc::UnboundedReceiver<(u8, Bytes)>,
    ) -> Self {
        let epoch = Instant::now();
        Self {
            sockets,
            rls_udp: RlsUdpLayer::new(sti, search_space),
            rls_ctl: RlsControlLayer::new(sti),
            rrc: RrcLayer::new(selected_plmn, 0),
            nas,
            codec,
            data_plane,
            uplink_rx,
            epoch,
            l3_machine_cycle: Timer::armed(0, L3_MACHINE_CYCLE_MS),
            l3_timer: Timer::armed(0, L3_TIMER_MS),
            rls_ack_control: Timer::armed(0, RLS_ACK_CONTROL_MS),
            rls_ack_send: Timer::armed(0, RLS_ACK_SEND_MS),
            switch_off_at: None,
            immediate_cycle: true,
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn deadline(&self, at_ms: u64) -> Instant {
        self.epoch + Duration::from_millis(at_ms)
    }

    /// Runs until `shutdown` is signalled or a fatal runtime invariant
    /// break occurs (§7). Mirrors the original's `onStart`/`onLoop` split:
    /// `new` plays the role of `onStart`, everything below of `onLoop`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), UeTaskError> {
        let mut recv_buf4 = vec![0u8; RECV_BUFFER_SIZE];
        let mut recv_buf6 = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let now = self.now_ms();
            let expired = self.rls_udp.check_heartbeat(now, &self.sockets);
            for cell_id in expired {
                self.rrc
                    .handle_cell_signal_change(cell_id, LOST_SIGNAL_DBM - 1, &mut self.rls_ctl, &mut self.nas);
            }

            if self.check_timers(now) {
                return Ok(());
            }

            if self.immediate_cycle {
                self.immediate_cycle = false;
                self.rrc.perform_cell_selection(now, &mut self.rls_ctl, &mut self.nas);
                continue;
            }

            let sleep_until = self.next_deadline(now);

            tokio::select! {
                _ = tokio::time::sleep_until(sleep_until) => {}
                result = self.sockets.ip4.recv_from(&mut recv_buf4) => {
                    self.handle_datagram(result, &recv_buf4)?;
                }
                result = self.sockets.ip6.recv_from(&mut recv_buf6) => {
                    self.handle_datagram(result, &recv_buf6)?;
                }
                uplink = self.uplink_rx.recv() => {
                    if let Some((psi, pdu)) = uplink {
                        self.deliver_uplink_data(psi, &pdu)?;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_ok() && *shutdown.borrow() {
                        self.switch_off_at = Some(self.now_ms() + SWITCH_OFF_MS);
                    }
                }
            }
        }
    }

    fn next_deadline(&self, now_ms: u64) -> Instant {
        let mut candidates = [
            self.l3_machine_cycle.deadline_ms,
            self.l3_timer.deadline_ms,
            self.rls_ack_control.deadline_ms,
            self.rls_ack_send.deadline_ms,
            self.switch_off_at,
        ]
        .into_iter()
        .flatten();
        let earliest = candidates.by_ref().min().unwrap_or(now_ms + L3_TIMER_MS);
        self.deadline(earliest.max(now_ms))
    }

    fn handle_datagram(
        &mut self,
        result: std::io::Result<(usize, SocketAddr)>,
        buf: &[u8],
    ) -> Result<(), UeTaskError> {
        let (n, from) = result.map_err(|source| UeTaskError::Socket { role: "RLS_RECV", source })?;
        let now = self.now_ms();
        match self.rls_udp.receive(from, &buf[..n], now) {
            Ok(Some(RlsInboundEvent::SignalChanged { cell_id, dbm })) => {
                self.rrc
                    .handle_cell_signal_change(cell_id, dbm, &mut self.rls_ctl, &mut self.nas);
            }
            Ok(Some(RlsInboundEvent::Forward { cell_id, message })) => {
                if let Some(effect) = self.rls_ctl.handle_rls_message(cell_id, message) {
                    self.apply_inbound_effect(cell_id, effect);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("malformed RLS datagram from {from}: {e}"),
        }
        Ok(())
    }

    /// Gates uplink user-plane data on `nas.is_uplink_ready(psi) &&
    /// rrc.has_radio_resources(active_cell)` before handing it to the RLS
    /// control layer (SPEC_FULL §3, resolving spec.md's open question about
    /// an additional `hasRadioResources` gate on top of NAS readiness).
    /// Returns the assigned PDU id, or `None` if the data was dropped
    /// because the gate wasn't open.
    fn deliver_uplink_data(&mut self, psi: u8, pdu: &[u8]) -> Result<Option<u32>, UeTaskError> {
        let active_cell = self.rrc.active_cell().cell_id;
        if !self.nas.is_uplink_ready(psi) || !self.rrc.has_radio_resources(active_cell) {
            log::debug!("dropping uplink data for psi {psi}: radio resources not ready");
            return Ok(None);
        }

        let now = self.now_ms();
        let pdu_id = self
            .rls_ctl
            .handle_uplink_data_delivery(psi, pdu, &self.rls_udp, &self.sockets, now)?;
        Ok(Some(pdu_id))
    }

    fn apply_inbound_effect(&mut self, cell_id: u32, effect: ControlInboundEffect) {
        match effect {
            ControlInboundEffect::DeliverRrc { channel_hint, pdu } => match RrcChannel::from_wire(channel_hint) {
                Some(channel) => self
                    .rrc
                    .handle_downlink_rrc(cell_id, channel, &pdu, &self.codec, &mut self.nas),
                None => log::error!("unknown RRC channel hint {channel_hint} from cell {cell_id}"),
            },
            ControlInboundEffect::DeliverData { psi, pdu } => self.data_plane.write_to_psi(psi, pdu),
        }
    }

    /// `checkTimers()` (§4.F): the original's if/else-if priority chain,
    /// checked most-urgent-first so only one fires per loop iteration.
    fn check_timers(&mut self, now: u64) -> bool {
        if self.l3_machine_cycle.is_due(now) {
            self.l3_machine_cycle.rearm(now);
            self.rrc.perform_cell_selection(now, &mut self.rls_ctl, &mut self.nas);
        } else if self.l3_timer.is_due(now) {
            self.l3_timer.rearm(now);
            self.rrc.perform_cell_selection(now, &mut self.rls_ctl, &mut self.nas);
        } else if self.rls_ack_control.is_due(now) {
            self.rls_ack_control.rearm(now);
            let failures = self.rls_ctl.ack_control_tick(now, &self.rls_udp, &self.sockets);
            for failure in failures {
                log::warn!(
                    "delivery failure: pdu {} to cell {} exceeded retry limit",
                    failure.pdu_id,
                    failure.cell_id
                );
            }
        } else if self.rls_ack_send.is_due(now) {
            self.rls_ack_send.rearm(now);
            self.rls_ctl.ack_send_tick(&self.rls_udp, &self.sockets);
        } else if matches!(self.switch_off_at, Some(d) if d <= now) {
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ParsedRrc;

    struct NoopNas;
    impl NasUplink for NoopNas {
        fn handle_downlink_nas(&mut self, _bytes: Bytes) {}
        fn on_active_cell_changed(&mut self, _previous: Option<crate::types::Tai>) {}
        fn is_uplink_ready(&self, _psi: u8) -> bool {
            false
        }
    }

    struct NoopCodec;
    impl RrcCodec for NoopCodec {
        fn decode(&self, _channel: RrcChannel, _bytes: &[u8]) -> Option<ParsedRrc> {
            None
        }
    }

    #[derive(Default)]
    struct RecordingDataPlane {
        writes: Vec<(u8, Bytes)>,
    }
    impl DataPlane for RecordingDataPlane {
        fn write_to_psi(&mut self, psi: u8, bytes: Bytes) {
            self.writes.push((psi, bytes));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn new_task_schedules_an_immediate_cycle() {
        let sockets = Sockets::bind_ephemeral().await.unwrap();
        let (_tx, rx) = UeTask::<NoopNas, NoopCodec, RecordingDataPlane>::uplink_channel();
        let task = UeTask::new(1, vec![], None, sockets, NoopNas, NoopCodec, RecordingDataPlane::default(), rx);
        assert!(task.immediate_cycle);
    }

    #[test]
    fn timer_rearm_moves_deadline_forward_by_its_period() {
        let mut timer = Timer::armed(0, 1000);
        assert!(!timer.is_due(999));
        assert!(timer.is_due(1000));
        timer.rearm(1000);
        assert_eq!(timer.deadline_ms, Some(2000));
    }

    #[test]
    fn apply_inbound_effect_routes_data_to_data_plane() {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let sockets = Sockets::bind_ephemeral().await.unwrap();
            let (_tx, rx) = UeTask::<NoopNas, NoopCodec, RecordingDataPlane>::uplink_channel();
            let mut task = UeTask::new(1, vec![], None, sockets, NoopNas, NoopCodec, RecordingDataPlane::default(), rx);
            task.apply_inbound_effect(1, ControlInboundEffect::DeliverData { psi: 5, pdu: Bytes::from_static(b"hi") });
            assert_eq!(task.data_plane.writes.len(), 1);
            assert_eq!(task.data_plane.writes[0].0, 5);
        });
    }

    struct ReadyNas;
    impl NasUplink for ReadyNas {
        fn handle_downlink_nas(&mut self, _bytes: Bytes) {}
        fn on_active_cell_changed(&mut self, _previous: Option<crate::types::Tai>) {}
        fn is_uplink_ready(&self, _psi: u8) -> bool {
            true
        }
    }

    #[test]
    fn uplink_data_is_dropped_without_radio_resources() {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let sockets = Sockets::bind_ephemeral().await.unwrap();
            let (_tx, rx) = UeTask::<ReadyNas, NoopCodec, RecordingDataPlane>::uplink_channel();
            let mut task = UeTask::new(1, vec![], None, sockets, ReadyNas, NoopCodec, RecordingDataPlane::default(), rx);
            let result = task.deliver_uplink_data(5, b"hello").unwrap();
            assert!(result.is_none());
        });
    }

    #[test]
    fn uplink_data_is_dropped_when_nas_is_not_ready_even_with_resources() {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let sockets = Sockets::bind_ephemeral().await.unwrap();
            let (_tx, rx) = UeTask::<NoopNas, NoopCodec, RecordingDataPlane>::uplink_channel();
            let mut task = UeTask::new(1, vec![], None, sockets, NoopNas, NoopCodec, RecordingDataPlane::default(), rx);
            let result = task.deliver_uplink_data(5, b"hello").unwrap();
            assert!(result.is_none());
        });
    }
}
