//! The two-filter cell ranking used by [`super::RrcLayer::perform_cell_selection`]:
//! suitable cells first (serving PLMN, not reserved, not forbidden), falling
//! back to any acceptable cell (not barred, not forbidden) when none
//! qualify. Grounded on `idle.cpp`'s `lookForSuitableCell` /
//! `lookForAcceptableCell`, simplified to the fields SPEC_FULL §3 keeps.

use std::collections::HashMap;

use crate::types::{ActiveCellInfo, CellCategory, Plmn, Tai};

use super::{CellDesc, CellSelectionReport};

fn is_forbidden(tai: Tai, roaming: &[Tai], rps: &[Tai]) -> bool {
    roaming.contains(&tai) || rps.contains(&tai)
}

/// Best signal among cells broadcasting `plmn`, not barred/reserved, and not
/// in either forbidden-TAI list.
pub fn look_for_suitable_cell(
    cells: &HashMap<u32, CellDesc>,
    plmn: Plmn,
    forbidden_roaming: &[Tai],
    forbidden_rps: &[Tai],
) -> (Option<ActiveCellInfo>, CellSelectionReport) {
    let mut report = CellSelectionReport::default();
    let mut best: Option<(u32, i32, ActiveCellInfo)> = None;

    for (&cell_id, desc) in cells {
        let Some(sib1) = desc.sib1 else {
            report.si_missing_cells += 1;
            continue;
        };
        let Some(mib) = desc.mib else {
            report.si_missing_cells += 1;
            continue;
        };
        if sib1.plmn != plmn {
            report.out_of_plmn_cells += 1;
            continue;
        }
        if sib1.is_reserved {
            report.reserved_cells += 1;
            continue;
        }
        if mib.is_barred {
            report.barred_cells += 1;
            continue;
        }
        let tai = Tai { plmn: sib1.plmn, tac: sib1.tac };
        if is_forbidden(tai, forbidden_roaming, forbidden_rps) {
            report.forbidden_tai_cells += 1;
            continue;
        }

        let candidate = ActiveCellInfo {
            cell_id,
            plmn: sib1.plmn,
            tac: sib1.tac,
            category: CellCategory::Suitable,
        };
        if best.map(|(_, dbm, _)| desc.dbm > dbm).unwrap_or(true) {
            best = Some((cell_id, desc.dbm, candidate));
        }
    }

    (best.map(|(_, _, candidate)| candidate), report)
}

/// Best signal among cells with decoded system information that are not
/// barred, not reserved, and not forbidden, regardless of PLMN (used once
/// no suitable cell can be found, per `idle.cpp`'s fallback: same filters as
/// [`look_for_suitable_cell`] except the PLMN match is dropped).
///
/// Ranking mirrors `idle.cpp`'s `std::sort` by dbm followed by a
/// `std::stable_sort` on PLMN match: a cell matching `plmn` always outranks
/// one that doesn't, regardless of signal strength; only within a group is
/// the strongest signal picked.
pub fn look_for_acceptable_cell(
    cells: &HashMap<u32, CellDesc>,
    plmn: Option<Plmn>,
    forbidden_roaming: &[Tai],
    forbidden_rps: &[Tai],
) -> (Option<ActiveCellInfo>, CellSelectionReport) {
    let mut report = CellSelectionReport::default();
    let mut best_matching: Option<(i32, ActiveCellInfo)> = None;
    let mut best_other: Option<(i32, ActiveCellInfo)> = None;

    for (&cell_id, desc) in cells {
        let Some(sib1) = desc.sib1 else {
            report.si_missing_cells += 1;
            continue;
        };
        let Some(mib) = desc.mib else {
            report.si_missing_cells += 1;
            continue;
        };
        if sib1.is_reserved {
            report.reserved_cells += 1;
            continue;
        }
        if mib.is_barred {
            report.barred_cells += 1;
            continue;
        }
        let tai = Tai { plmn: sib1.plmn, tac: sib1.tac };
        if is_forbidden(tai, forbidden_roaming, forbidden_rps) {
            report.forbidden_tai_cells += 1;
            continue;
        }

        let matches_plmn = plmn.map_or(false, |wanted| sib1.plmn == wanted);
        if !matches_plmn {
            report.out_of_plmn_cells += 1;
            // An acceptable cell may still serve a foreign PLMN, so this
            // doesn't disqualify it; the count is informational only.
        }

        let candidate = ActiveCellInfo {
            cell_id,
            plmn: sib1.plmn,
            tac: sib1.tac,
            category: CellCategory::Acceptable,
        };
        let slot = if matches_plmn { &mut best_matching } else { &mut best_other };
        if slot.as_ref().map(|(dbm, _)| desc.dbm > *dbm).unwrap_or(true) {
            *slot = Some((desc.dbm, candidate));
        }
    }

    let winner = best_matching.or(best_other).map(|(_, candidate)| candidate);
    (winner, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrc::{Mib, Sib1};

    fn plmn(mcc: u16) -> Plmn {
        Plmn { mcc, mnc: 1, is_long_mnc: false }
    }

    fn desc(dbm: i32, plmn: Plmn, tac: u32, barred: bool, reserved: bool) -> CellDesc {
        CellDesc {
            dbm,
            mib: Some(Mib { is_barred: barred }),
            sib1: Some(Sib1 { plmn, tac, is_reserved: reserved }),
        }
    }

    #[test]
    fn suitable_picks_strongest_matching_plmn() {
        let mut cells = HashMap::new();
        cells.insert(1, desc(-90, plmn(1), 10, false, false));
        cells.insert(2, desc(-70, plmn(1), 10, false, false));
        cells.insert(3, desc(-60, plmn(2), 10, false, false));

        let (result, _) = look_for_suitable_cell(&cells, plmn(1), &[], &[]);
        assert_eq!(result.unwrap().cell_id, 2);
    }

    #[test]
    fn suitable_excludes_barred_reserved_and_forbidden() {
        let mut cells = HashMap::new();
        cells.insert(1, desc(-60, plmn(1), 10, true, false));
        cells.insert(2, desc(-60, plmn(1), 20, false, true));
        cells.insert(3, desc(-60, plmn(1), 30, false, false));

        let forbidden = vec![Tai { plmn: plmn(1), tac: 30 }];
        let (result, report) = look_for_suitable_cell(&cells, plmn(1), &forbidden, &[]);
        assert!(result.is_none());
        assert_eq!(report.barred_cells, 1);
        assert_eq!(report.reserved_cells, 1);
        assert_eq!(report.forbidden_tai_cells, 1);
    }

    #[test]
    fn acceptable_falls_back_across_plmns() {
        let mut cells = HashMap::new();
        cells.insert(1, desc(-60, plmn(9), 1, false, false));

        let (result, _) = look_for_acceptable_cell(&cells, Some(plmn(1)), &[], &[]);
        assert_eq!(result.unwrap().cell_id, 1);
        assert_eq!(result.unwrap().category, CellCategory::Acceptable);
    }

    #[test]
    fn acceptable_excludes_reserved_cells() {
        let mut cells = HashMap::new();
        cells.insert(1, desc(-60, plmn(1), 10, false, true));

        let (result, report) = look_for_acceptable_cell(&cells, Some(plmn(1)), &[], &[]);
        assert!(result.is_none());
        assert_eq!(report.reserved_cells, 1);
    }

    #[test]
    fn acceptable_ranks_plmn_match_over_raw_signal_strength() {
        let mut cells = HashMap::new();
        cells.insert(1, desc(-95, plmn(1), 10, false, false));
        cells.insert(2, desc(-60, plmn(2), 20, false, false));

        let (result, _) = look_for_acceptable_cell(&cells, Some(plmn(1)), &[], &[]);
        assert_eq!(result.unwrap().cell_id, 1);
    }

    #[test]
    fn acceptable_ranks_by_strongest_signal_within_each_plmn_group() {
        let mut cells = HashMap::new();
        cells.insert(1, desc(-95, plmn(1), 10, false, false));
        cells.insert(2, desc(-60, plmn(1), 20, false, false));
        cells.insert(3, desc(-50, plmn(2), 30, false, false));

        let (result, _) = look_for_acceptable_cell(&cells, Some(plmn(1)), &[], &[]);
        assert_eq!(result.unwrap().cell_id, 2);
    }

    #[test]
    fn missing_system_information_is_never_a_candidate() {
        let mut cells = HashMap::new();
        cells.insert(1, CellDesc { dbm: -60, mib: None, sib1: None });

        let (result, report) = look_for_suitable_cell(&cells, plmn(1), &[], &[]);
        assert!(result.is_none());
        assert_eq!(report.si_missing_cells, 1);
    }
}
