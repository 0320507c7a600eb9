//! Cell table (spec §4.B): per-remote bookkeeping keyed by STI, with a
//! reverse `cellId -> sti` index. Grounded on `RlsUdpLayer`'s private
//! `m_cells`/`m_cellIdToSti` maps in `udp_layer.hpp`/`udp_layer.cpp`.

use std::collections::HashMap;
use std::net::SocketAddr;

/// How long a cell may go unheard from before it is dropped (§3, §4.C).
pub const HEARTBEAT_THRESHOLD_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct CellInfo {
    pub address: SocketAddr,
    pub last_seen: u64,
    pub dbm: i32,
    pub cell_id: u32,
}

#[derive(Default)]
pub struct CellTable {
    by_sti: HashMap<u64, CellInfo>,
    sti_by_cell: HashMap<u32, u64>,
    next_cell_id: u32,
}

impl CellTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a heartbeat-ack from `sti`. Allocates a fresh, never-reused
    /// `cellId` the first time this STI is seen (§3 invariant); updates
    /// address/lastSeen unconditionally and reports whether `dbm` differed
    /// from the previous reading (or from "unknown" on first contact).
    pub fn upsert_from_ack(
        &mut self,
        sti: u64,
        address: SocketAddr,
        now_ms: u64,
        dbm: i32,
    ) -> (u32, bool) {
        if let Some(existing) = self.by_sti.get_mut(&sti) {
            let changed = existing.dbm != dbm;
            existing.address = address;
            existing.last_seen = now_ms;
            existing.dbm = dbm;
            return (existing.cell_id, changed);
        }

        self.next_cell_id += 1;
        let cell_id = self.next_cell_id;
        self.by_sti.insert(
            sti,
            CellInfo {
                address,
                last_seen: now_ms,
                dbm,
                cell_id,
            },
        );
        self.sti_by_cell.insert(cell_id, sti);
        (cell_id, true)
    }

    /// Removes and returns the ids of every cell whose `lastSeen` is older
    /// than `HEARTBEAT_THRESHOLD_MS` (exclusive boundary: exactly
    /// `HEARTBEAT_THRESHOLD_MS` old is still within threshold, per §8).
    pub fn expire(&mut self, now_ms: u64) -> Vec<u32> {
        let stale: Vec<u64> = self
            .by_sti
            .iter()
            .filter(|(_, info)| now_ms.saturating_sub(info.last_seen) > HEARTBEAT_THRESHOLD_MS)
            .map(|(sti, _)| *sti)
            .collect();

        let mut removed_ids = Vec::with_capacity(stale.len());
        for sti in stale {
            if let Some(info) = self.by_sti.remove(&sti) {
                self.sti_by_cell.remove(&info.cell_id);
                removed_ids.push(info.cell_id);
            }
        }
        removed_ids
    }

    pub fn lookup_by_sti(&self, sti: u64) -> Option<&CellInfo> {
        self.by_sti.get(&sti)
    }

    pub fn lookup_by_cell(&self, cell_id: u32) -> Option<&CellInfo> {
        self.sti_by_cell.get(&cell_id).and_then(|sti| self.by_sti.get(sti))
    }

    pub fn contains_sti(&self, sti: u64) -> bool {
        self.by_sti.contains_key(&sti)
    }

    pub fn sti_of(&self, cell_id: u32) -> Option<u64> {
        self.sti_by_cell.get(&cell_id).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_sti.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4997".parse().unwrap()
    }

    #[test]
    fn first_ack_allocates_cell_id_one() {
        let mut table = CellTable::new();
        let (id, changed) = table.upsert_from_ack(1, addr(), 0, -80);
        assert_eq!(id, 1);
        assert!(changed);
    }

    #[test]
    fn cell_ids_never_reused_within_a_run() {
        let mut table = CellTable::new();
        let (a, _) = table.upsert_from_ack(1, addr(), 0, -80);
        table.expire(HEARTBEAT_THRESHOLD_MS + 1);
        let (b, _) = table.upsert_from_ack(2, addr(), HEARTBEAT_THRESHOLD_MS + 1, -80);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn dbm_changed_flag_reflects_previous_value() {
        let mut table = CellTable::new();
        table.upsert_from_ack(1, addr(), 0, -80);
        let (_, changed) = table.upsert_from_ack(1, addr(), 10, -80);
        assert!(!changed);
        let (_, changed) = table.upsert_from_ack(1, addr(), 20, -81);
        assert!(changed);
    }

    #[test]
    fn expire_boundary_is_exclusive() {
        let mut table = CellTable::new();
        table.upsert_from_ack(1, addr(), 0, -80);
        assert!(table.expire(HEARTBEAT_THRESHOLD_MS).is_empty());
        assert_eq!(table.expire(HEARTBEAT_THRESHOLD_MS + 1), vec![1]);
    }

    #[test]
    fn reverse_index_stays_in_sync() {
        let mut table = CellTable::new();
        let (id, _) = table.upsert_from_ack(1, addr(), 0, -80);
        assert_eq!(table.sti_of(id), Some(1));
        table.expire(HEARTBEAT_THRESHOLD_MS + 1);
        assert_eq!(table.sti_of(id), None);
        assert!(table.lookup_by_cell(id).is_none());
    }
}
