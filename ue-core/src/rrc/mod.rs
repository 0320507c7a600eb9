//! RRC cell selection (spec §4.E). Grounded on `ue/rrc/cells.cpp` (signal
//! change handling, RLF declaration) and `ue/rrc/idle.cpp` (the two-filter
//! selection algorithm), with `channel.cpp`'s downlink dispatch rules for
//! broadcast vs. dedicated channels.

mod selection;

use std::collections::HashMap;

use bytes::Bytes;

use crate::collaborators::{NasUplink, ParsedRrc, RrcCodec};
use crate::rls::control::RlsControlLayer;
use crate::types::{ActiveCellInfo, Plmn, RrcChannel, Tai};

/// `dbm < -120` is "considered lost" (§4.E, §8 boundary: -120 lost, -119 not).
pub const LOST_SIGNAL_DBM: i32 = -120;

/// Selection waits this long after RRC start before treating "no cells" as
/// a reportable failure (§4.E).
pub const NO_CELLS_GRACE_MS: u64 = 1000;
/// ...and this long before treating "no selected PLMN" as one.
pub const NO_PLMN_GRACE_MS: u64 = 4000;
/// Selection-failure warnings are rate-limited to once per this interval.
pub const FAILURE_LOG_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrcState {
    Idle,
    Connected,
    Inactive,
}

/// Cause reported alongside a radio link failure (§4.E, §8 scenario 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlfCause {
    SignalLostToConnectedCell,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mib {
    pub is_barred: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Sib1 {
    pub plmn: Plmn,
    pub tac: u32,
    pub is_reserved: bool,
}

/// RRC's per-cell view (§3 `CellDesc`): latest signal plus whatever
/// broadcast system information has been decoded so far.
#[derive(Debug, Clone, Default)]
pub struct CellDesc {
    pub dbm: i32,
    pub mib: Option<Mib>,
    pub sib1: Option<Sib1>,
}

/// Tally of why candidates were rejected, surfaced in the rate-limited
/// warning logs (`idle.cpp`'s `CellSelectionReport`).
#[derive(Debug, Default, Clone, Copy)]
pub struct CellSelectionReport {
    pub si_missing_cells: u32,
    pub out_of_plmn_cells: u32,
    pub reserved_cells: u32,
    pub barred_cells: u32,
    pub forbidden_tai_cells: u32,
}

pub struct RrcLayer {
    state: RrcState,
    cell_desc: HashMap<u32, CellDesc>,
    active_cell: ActiveCellInfo,
    selected_plmn: Option<Plmn>,
    forbidden_tai_roaming: Vec<Tai>,
    forbidden_tai_rps: Vec<Tai>,
    available_plmns: std::collections::HashSet<Plmn>,
    started_at_ms: u64,
    last_failure_logged_ms: Option<u64>,
}

impl RrcLayer {
    pub fn new(selected_plmn: Option<Plmn>, started_at_ms: u64) -> Self {
        Self {
            state: RrcState::Idle,
            cell_desc: HashMap::new(),
            active_cell: ActiveCellInfo::NONE,
            selected_plmn,
            forbidden_tai_roaming: Vec::new(),
            forbidden_tai_rps: Vec::new(),
            available_plmns: std::collections::HashSet::new(),
            started_at_ms,
            last_failure_logged_ms: None,
        }
    }

    pub fn state(&self) -> RrcState {
        self.state
    }

    pub fn active_cell(&self) -> ActiveCellInfo {
        self.active_cell
    }

    pub fn set_forbidden_tai_lists(&mut self, roaming: Vec<Tai>, rps: Vec<Tai>) {
        self.forbidden_tai_roaming = roaming;
        self.forbidden_tai_rps = rps;
    }

    pub fn has_signal_to_cell(&self, cell_id: u32) -> bool {
        self.cell_desc.contains_key(&cell_id)
    }

    pub fn is_active_cell(&self, cell_id: u32) -> bool {
        self.active_cell.cell_id == cell_id
    }

    /// `hasRadioResources(cellId)` (SPEC_FULL §3 / spec §9 open question):
    /// the active cell must be both signalled and RRC-connected before
    /// uplink user-plane data is allowed through.
    pub fn has_radio_resources(&self, cell_id: u32) -> bool {
        self.state == RrcState::Connected && self.is_active_cell(cell_id) && self.has_signal_to_cell(cell_id)
    }

    /// `handleCellSignalChange(cellId, dbm)` (§4.E / `cells.cpp`).
    pub fn handle_cell_signal_change(
        &mut self,
        cell_id: u32,
        dbm: i32,
        rls_ctl: &mut RlsControlLayer,
        nas: &mut dyn NasUplink,
    ) {
        let considered_lost = dbm < LOST_SIGNAL_DBM;

        match self.cell_desc.get_mut(&cell_id) {
            None => {
                if !considered_lost {
                    self.cell_desc.insert(cell_id, CellDesc { dbm, ..Default::default() });
                    log::debug!(
                        "new signal detected for cell[{cell_id}], total [{}] cells in coverage",
                        self.cell_desc.len()
                    );
                    self.update_available_plmns();
                }
            }
            Some(desc) => {
                if considered_lost {
                    self.cell_desc.remove(&cell_id);
                    log::debug!(
                        "signal lost for cell[{cell_id}], total [{}] cells in coverage",
                        self.cell_desc.len()
                    );

                    if self.active_cell.cell_id == cell_id {
                        let previous = self.active_cell;
                        self.active_cell = ActiveCellInfo::NONE;
                        rls_ctl.assign_current_cell(0);

                        if self.state != RrcState::Idle {
                            self.declare_radio_link_failure(RlfCause::SignalLostToConnectedCell);
                        } else {
                            nas.on_active_cell_changed(Some(previous.tai()));
                        }
                    }

                    self.update_available_plmns();
                } else {
                    desc.dbm = dbm;
                }
            }
        }
    }

    fn declare_radio_link_failure(&mut self, cause: RlfCause) {
        log::warn!("radio link failure declared: {cause:?}");
        self.state = RrcState::Idle;
    }

    fn update_available_plmns(&mut self) {
        self.available_plmns = self
            .cell_desc
            .values()
            .filter_map(|desc| desc.sib1.map(|sib1| sib1.plmn))
            .collect();
    }

    pub fn available_plmns(&self) -> &std::collections::HashSet<Plmn> {
        &self.available_plmns
    }

    /// `handleDownlinkRrc(cellId, channel, bytes)` (§4.E / `channel.cpp`).
    pub fn handle_downlink_rrc(
        &mut self,
        cell_id: u32,
        channel: RrcChannel,
        bytes: &Bytes,
        codec: &dyn RrcCodec,
        nas: &mut dyn NasUplink,
    ) {
        if !self.has_signal_to_cell(cell_id) {
            return;
        }
        if channel.is_dedicated() && !self.is_active_cell(cell_id) {
            return;
        }

        match codec.decode(channel, bytes) {
            None => log::error!("RRC PDU decoding failed on channel {channel:?}"),
            Some(ParsedRrc::Mib { is_barred }) => {
                self.cell_desc.entry(cell_id).or_default().mib = Some(Mib { is_barred });
            }
            Some(ParsedRrc::Sib1 { plmn, tac, is_reserved }) => {
                self.cell_desc.entry(cell_id).or_default().sib1 = Some(Sib1 { plmn, tac, is_reserved });
                self.update_available_plmns();
            }
            Some(ParsedRrc::Other) => {
                // Dedicated-channel traffic the core does not interpret
                // further; NAS-bearing messages would be unwrapped by a
                // real RRC state machine, out of scope here (§1).
                let _ = &nas;
            }
        }
    }

    /// Cell-selection cycle (§4.E). Runs only while not connected.
    pub fn perform_cell_selection(
        &mut self,
        now_ms: u64,
        rls_ctl: &mut RlsControlLayer,
        nas: &mut dyn NasUplink,
    ) {
        if self.state == RrcState::Connected {
            return;
        }

        if now_ms.saturating_sub(self.started_at_ms) <= NO_CELLS_GRACE_MS && self.cell_desc.is_empty() {
            return;
        }
        if now_ms.saturating_sub(self.started_at_ms) <= NO_PLMN_GRACE_MS && self.selected_plmn.is_none() {
            return;
        }

        let last_cell = self.active_cell;
        let should_log = last_cell.cell_id != 0
            || self
                .last_failure_logged_ms
                .map(|t| now_ms.saturating_sub(t) >= FAILURE_LOG_INTERVAL_MS)
                .unwrap_or(true);

        let mut report = CellSelectionReport::default();
        let mut result = self.selected_plmn.and_then(|plmn| {
            let (candidate, r) = selection::look_for_suitable_cell(&self.cell_desc, plmn, &self.forbidden_tai_roaming, &self.forbidden_tai_rps);
            report = r;
            candidate
        });

        if result.is_none() && should_log {
            self.log_selection_failure("suitable", &report);
        }

        if result.is_none() {
            let (candidate, r) = selection::look_for_acceptable_cell(
                &self.cell_desc,
                self.selected_plmn,
                &self.forbidden_tai_roaming,
                &self.forbidden_tai_rps,
            );
            report = r;
            result = candidate;
            if result.is_none() && should_log {
                self.log_selection_failure("acceptable", &report);
                log::error!("cell selection failure, no suitable or acceptable cell found");
                self.last_failure_logged_ms = Some(now_ms);
            }
        }

        let selected = result.unwrap_or(ActiveCellInfo::NONE);
        self.active_cell = selected;

        if selected.cell_id != 0 && selected.cell_id != last_cell.cell_id {
            log::info!(
                "selected cell plmn={:?} tac={} category={:?}",
                selected.plmn,
                selected.tac,
                selected.category
            );
        }

        if selected.cell_id != last_cell.cell_id {
            rls_ctl.assign_current_cell(selected.cell_id);
            if selected.cell_id != 0 {
                self.state = RrcState::Connected;
            }
            nas.on_active_cell_changed(if last_cell.is_active() {
                Some(last_cell.tai())
            } else {
                None
            });
        }
    }

    fn log_selection_failure(&self, kind: &str, report: &CellSelectionReport) {
        if self.cell_desc.is_empty() {
            log::warn!("{kind} cell selection failed, no cell is in coverage");
        } else {
            log::warn!(
                "{kind} cell selection failed in [{}] cells: {:?}",
                self.cell_desc.len(),
                report
            );
        }
    }
}

pub use selection::{look_for_acceptable_cell, look_for_suitable_cell};
