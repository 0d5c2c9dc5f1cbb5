use log::debug;

use crate::config::*;
use crate::index::TabularIndex;

pub const DEM: &str = "DEM";
pub const REP: &str = "REP";

fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Computes the summary of one (precinct, year, office).
///
/// Missing data is not an error: an unknown key sums to zero votes and an
/// unknown precinct has zero registered voters, which gives a zero KPI.
pub fn kpis_for(index: &TabularIndex, precinct_id: &str, year: u32, office: &str) -> Kpi {
    let mut dem: u64 = 0;
    let mut rep: u64 = 0;
    let mut oth: u64 = 0;
    for r in index.bucket(precinct_id, year, office) {
        match r.party.as_str() {
            DEM => dem = dem.saturating_add(r.votes),
            REP => rep = rep.saturating_add(r.votes),
            _ => oth = oth.saturating_add(r.votes),
        }
    }
    let total = dem.saturating_add(rep).saturating_add(oth);

    let empty = PrecinctMeta::default();
    let meta = index.meta(precinct_id).unwrap_or(&empty);
    let registered = meta.registered;

    // Same-day registrations can push the raw ratio past 100.
    let turnout_pct = if total > 0 {
        pct(total, registered).min(100.0)
    } else {
        0.0
    };
    let margin = if total > 0 {
        (dem as f64 - rep as f64) / total as f64 * 100.0
    } else {
        0.0
    };

    let kpi = Kpi {
        precinct_id: precinct_id.to_string(),
        precinct_name: meta.precinct_name.clone(),
        county: meta.county.clone(),
        registered,
        turnout_pct,
        dem,
        gop: rep,
        oth,
        total,
        dem_share: pct(dem, total),
        gop_share: pct(rep, total),
        margin,
    };
    debug!("kpis_for: {} {} {}: {:?}", precinct_id, year, office, kpi);
    kpi
}

impl Kpi {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::TurnoutPct => self.turnout_pct,
            Metric::DemShare => self.dem_share,
            Metric::GopShare => self.gop_share,
            Metric::Margin => self.margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pid: &str, party: &str, votes: u64, registered: u64) -> ElectionRow {
        ElectionRow {
            precinct_id: pid.to_string(),
            year: 2024,
            office: "POTUS".to_string(),
            party: party.to_string(),
            votes,
            registered,
            county: "Ramsey".to_string(),
            precinct_name: "Roseville P-1".to_string(),
            turnout_eligible: registered,
        }
    }

    #[test]
    fn sums_by_party() {
        let idx = TabularIndex::build(&[
            row("p1", "DEM", 60, 200),
            row("p1", "REP", 30, 200),
            row("p1", "LIB", 5, 200),
            row("p1", "WI", 5, 200),
        ]);
        let k = kpis_for(&idx, "p1", 2024, "POTUS");
        assert_eq!((k.dem, k.gop, k.oth, k.total), (60, 30, 10, 100));
        assert_eq!(k.dem + k.gop + k.oth, k.total);
        assert_eq!(k.turnout_pct, 50.0);
        assert_eq!(k.dem_share, 60.0);
        assert_eq!(k.gop_share, 30.0);
        assert_eq!(k.margin, 30.0);
        assert_eq!(k.value(Metric::Margin), 30.0);
        assert_eq!(k.precinct_name, "Roseville P-1");
    }

    #[test]
    fn huge_counts_saturate() {
        let idx = TabularIndex::build(&[
            row("p1", "DEM", u64::MAX, 200),
            row("p1", "DEM", u64::MAX, 200),
            row("p1", "REP", 10, 200),
        ]);
        let k = kpis_for(&idx, "p1", 2024, "POTUS");
        assert_eq!(k.dem, u64::MAX);
        assert_eq!(k.total, u64::MAX);
        assert_eq!(k.turnout_pct, 100.0);
        assert!(k.dem_share <= 100.0);
        assert!(k.margin >= -100.0 && k.margin <= 100.0);
    }

    #[test]
    fn unknown_key_is_zero() {
        let idx = TabularIndex::build(&[row("p1", "DEM", 60, 200)]);
        let k = kpis_for(&idx, "p9", 2024, "POTUS");
        assert_eq!(k.total, 0);
        assert_eq!(k.turnout_pct, 0.0);
        assert_eq!(k.margin, 0.0);
        assert_eq!(k.county, "");
        let k = kpis_for(&idx, "p1", 2022, "POTUS");
        assert_eq!(k.total, 0);
        assert_eq!(k.dem_share, 0.0);
        assert_eq!(k.gop_share, 0.0);
    }

    #[test]
    fn zero_registered_has_zero_turnout() {
        let idx = TabularIndex::build(&[row("p1", "REP", 12, 0)]);
        let k = kpis_for(&idx, "p1", 2024, "POTUS");
        assert_eq!(k.turnout_pct, 0.0);
        assert_eq!(k.margin, -100.0);
        assert_eq!(k.gop_share, 100.0);
    }

    #[test]
    fn metrics_stay_in_range() {
        for (d, r, o, reg) in [(0, 0, 0, 0), (5, 0, 0, 1), (0, 9, 3, 10), (7, 7, 7, 7), (1, 2, 3, 1000)] {
            let idx = TabularIndex::build(&[
                row("p", "DEM", d, reg),
                row("p", "REP", r, reg),
                row("p", "GRN", o, reg),
            ]);
            let k = kpis_for(&idx, "p", 2024, "POTUS");
            for v in [k.turnout_pct, k.dem_share, k.gop_share] {
                assert!((0.0..=100.0).contains(&v), "{:?}", k);
            }
            assert!((-100.0..=100.0).contains(&k.margin), "{:?}", k);
        }
    }
}
