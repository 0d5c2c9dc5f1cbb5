// Primitives for reading the tall results files.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use csv::{ReaderBuilder, StringRecord};

use crate::insight::{
    io_common::{coerce_count, fetch_text},
    *,
};

/// The columns of a tall results file, in the order `melt` writes them.
pub const RESULT_COLUMNS: [&str; 9] = [
    "precinct_id",
    "year",
    "office",
    "party",
    "votes",
    "county",
    "precinct_name",
    "registered",
    "turnout_eligible",
];

fn header_map(header: &StringRecord) -> HashMap<String, usize> {
    header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_string(), idx))
        .collect()
}

fn cell_at<'a>(line: &'a StringRecord, cols: &HashMap<String, usize>, name: &str) -> &'a str {
    cols.get(name)
        .and_then(|i| line.get(*i))
        .unwrap_or_default()
}

/// Parses a tall results file. Quotes are not interpreted, rows shorter than
/// the header get blank cells and extra cells are ignored.
pub fn parse_election_csv<R: Read>(rdr: R, path: &str) -> InsightResult<Vec<ElectionRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(rdr);
    let cols = header_map(reader.headers().context(CsvOpenSnafu { path })?);
    debug!("parse_election_csv: {}: columns {:?}", path, cols);
    for c in RESULT_COLUMNS.iter() {
        if !cols.contains_key(*c) {
            debug!("parse_election_csv: {}: no column {}, using defaults", path, c);
        }
    }

    let mut res: Vec<ElectionRow> = Vec::new();
    for (idx, line_r) in reader.records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        let cell = |name: &str| cell_at(&line, &cols, name);
        let year = coerce_count(cell("year"));
        res.push(ElectionRow {
            precinct_id: cell("precinct_id").to_string(),
            year: u32::try_from(year).unwrap_or_default(),
            office: cell("office").to_string(),
            party: cell("party").to_string(),
            votes: coerce_count(cell("votes")),
            county: cell("county").to_string(),
            precinct_name: cell("precinct_name").to_string(),
            registered: coerce_count(cell("registered")),
            turnout_eligible: coerce_count(cell("turnout_eligible")),
        });
    }
    info!("Read {} rows from {}", res.len(), path);
    Ok(res)
}

pub fn read_election_csv(source: &str, timeout: Duration) -> InsightResult<Vec<ElectionRow>> {
    let text = fetch_text(source, timeout)?;
    parse_election_csv(text.as_bytes(), source)
}
