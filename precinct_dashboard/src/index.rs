use log::{debug, info};

use std::collections::{BTreeSet, HashMap};

use crate::config::*;

/// Bucket key: (precinct id, year, office). Several parties share a bucket.
pub type IndexKey = (String, u32, String);

/// Groups the rows by (precinct, year, office).
///
/// Every row lands in exactly one bucket, and the rows of a bucket keep the
/// order of the input.
pub fn build_index(rows: &[ElectionRow]) -> HashMap<IndexKey, Vec<ElectionRow>> {
    let mut buckets: HashMap<IndexKey, Vec<ElectionRow>> = HashMap::new();
    for r in rows.iter() {
        let key = (r.precinct_id.clone(), r.year, r.office.clone());
        buckets.entry(key).or_default().push(r.clone());
    }
    buckets
}

/// Folds the rows into one descriptive record per precinct.
///
/// The years are visited in ascending order and, for each of them, the rows in
/// input order. Each visited row replaces the whole record of its precinct, so
/// the last row of the latest year wins. Rows whose year is not listed are
/// ignored.
pub fn build_meta(rows: &[ElectionRow], year_order: &[u32]) -> HashMap<String, PrecinctMeta> {
    let mut years: Vec<u32> = year_order.to_vec();
    years.sort_unstable();
    years.dedup();

    let mut meta: HashMap<String, PrecinctMeta> = HashMap::new();
    for yr in years {
        for r in rows.iter().filter(|r| r.year == yr) {
            meta.insert(
                r.precinct_id.clone(),
                PrecinctMeta {
                    county: r.county.clone(),
                    precinct_name: r.precinct_name.clone(),
                    registered: r.registered,
                    turnout_eligible: r.turnout_eligible,
                },
            );
        }
    }
    meta
}

/// The in-memory tabular data: the buckets, the precinct metadata and the
/// listings derived from the rows.
#[derive(Debug, Clone, Default)]
pub struct TabularIndex {
    buckets: HashMap<IndexKey, Vec<ElectionRow>>,
    meta: HashMap<String, PrecinctMeta>,
    years: Vec<u32>,
    offices: Vec<String>,
    num_rows: usize,
}

impl TabularIndex {
    pub fn build(rows: &[ElectionRow]) -> TabularIndex {
        let years: Vec<u32> = rows
            .iter()
            .map(|r| r.year)
            .collect::<BTreeSet<u32>>()
            .into_iter()
            .collect();
        let offices: Vec<String> = rows
            .iter()
            .map(|r| r.office.clone())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        debug!("TabularIndex::build: years: {:?} offices: {:?}", years, offices);

        let buckets = build_index(rows);
        let meta = build_meta(rows, &years);
        info!(
            "Indexed {} rows in {} buckets for {} precincts",
            rows.len(),
            buckets.len(),
            meta.len()
        );
        TabularIndex {
            buckets,
            meta,
            years,
            offices,
            num_rows: rows.len(),
        }
    }

    /// The rows for the given key. Unknown keys yield an empty slice.
    pub fn bucket(&self, precinct_id: &str, year: u32, office: &str) -> &[ElectionRow] {
        let key = (precinct_id.to_string(), year, office.to_string());
        self.buckets.get(&key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn meta(&self, precinct_id: &str) -> Option<&PrecinctMeta> {
        self.meta.get(precinct_id)
    }

    /// Distinct years, ascending.
    pub fn years(&self) -> &[u32] {
        &self.years
    }

    /// Distinct offices, sorted.
    pub fn offices(&self) -> &[String] {
        &self.offices
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn num_precincts(&self) -> usize {
        self.meta.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pid: &str, year: u32, office: &str, party: &str, votes: u64) -> ElectionRow {
        ElectionRow {
            precinct_id: pid.to_string(),
            year,
            office: office.to_string(),
            party: party.to_string(),
            votes,
            registered: 100,
            county: "Ramsey".to_string(),
            precinct_name: format!("{} {}", pid, year),
            turnout_eligible: 90,
        }
    }

    #[test]
    fn buckets_keep_input_order() {
        let rows = vec![
            row("p1", 2024, "POTUS", "DEM", 10),
            row("p2", 2024, "POTUS", "DEM", 3),
            row("p1", 2024, "POTUS", "REP", 7),
            row("p1", 2022, "POTUS", "REP", 1),
        ];
        let idx = build_index(&rows);
        assert_eq!(idx.len(), 3);
        let b = &idx[&("p1".to_string(), 2024, "POTUS".to_string())];
        let parties: Vec<&str> = b.iter().map(|r| r.party.as_str()).collect();
        assert_eq!(parties, vec!["DEM", "REP"]);
        let total: usize = idx.values().map(|v| v.len()).sum();
        assert_eq!(total, rows.len());
    }

    #[test]
    fn meta_latest_year_wins() {
        let mut r22 = row("p1", 2022, "POTUS", "DEM", 1);
        r22.registered = 50;
        r22.turnout_eligible = 40;
        let mut r24 = row("p1", 2024, "POTUS", "DEM", 1);
        r24.registered = 75;
        r24.turnout_eligible = 70;
        r24.county = "St. Louis".to_string();
        // The 2024 row comes first in the input: the year order still decides.
        let meta = build_meta(&[r24.clone(), r22], &[2024, 2022]);
        assert_eq!(
            meta["p1"],
            PrecinctMeta {
                county: "St. Louis".to_string(),
                precinct_name: "p1 2024".to_string(),
                registered: 75,
                turnout_eligible: 70,
            }
        );
    }

    #[test]
    fn meta_replaces_whole_record() {
        let r22 = row("p1", 2022, "POTUS", "DEM", 1);
        let mut r24 = row("p1", 2024, "POTUS", "DEM", 1);
        r24.precinct_name = String::new();
        r24.registered = 0;
        let meta = build_meta(&[r22, r24], &[2022, 2024]);
        assert_eq!(meta["p1"].precinct_name, "");
        assert_eq!(meta["p1"].registered, 0);
    }

    #[test]
    fn one_meta_per_precinct() {
        let rows = vec![
            row("p1", 2022, "POTUS", "DEM", 1),
            row("p1", 2024, "US_SENATE", "REP", 1),
            row("p2", 2024, "POTUS", "DEM", 1),
        ];
        let idx = TabularIndex::build(&rows);
        assert_eq!(idx.num_precincts(), 2);
        assert_eq!(idx.years(), &[2022, 2024]);
        assert_eq!(idx.offices(), &["POTUS".to_string(), "US_SENATE".to_string()]);
        assert!(idx.bucket("p3", 2024, "POTUS").is_empty());
        assert_eq!(idx.bucket("p1", 2024, "US_SENATE").len(), 1);
    }
}
