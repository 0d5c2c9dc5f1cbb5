// Converts the wide precinct results published by the state into the tall
// results files read by the dashboard.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use calamine::{open_workbook_auto, DataType, Range, Reader};
use encoding_rs::WINDOWS_1252;

use crate::insight::{
    io_common::{coerce_count, title_case},
    io_csv::RESULT_COLUMNS,
    *,
};

/// The columns every raw file must carry.
pub const KEY_COLUMNS: [&str; 5] = ["VTDID", "COUNTYNAME", "PCTNAME", "REG7AM", "TOTVOTING"];

/// The worksheet holding the results in the workbooks published by the state.
pub const RESULTS_SHEET: &str = "PrecinctResults";

/// An office of the raw file: its column prefix, the label used in the tall
/// file and the mapping from vote columns to parties.
#[derive(Debug)]
pub struct OfficeColumns {
    pub label: &'static str,
    pub parties: &'static [(&'static str, &'static str)],
}

pub const OFFICES: [OfficeColumns; 3] = [
    OfficeColumns {
        label: "POTUS",
        parties: &[
            ("USPRSR", "REP"),
            ("USPRSDFL", "DEM"),
            ("USPRSLIB", "LIB"),
            ("USPRSWTP", "WTP"),
            ("USPRSG", "GRN"),
            ("USPRSSLP", "SLP"),
            ("USPRSSWP", "SWP"),
            ("USPRSJFA", "JFA"),
            ("USPRSIND", "IND"),
            ("USPRSWI", "WI"),
        ],
    },
    OfficeColumns {
        label: "US_SENATE",
        parties: &[
            ("USSENR", "REP"),
            ("USSENDFL", "DEM"),
            ("USSENLIB", "LIB"),
            ("USSENIA", "IA"),
            ("USSENWI", "WI"),
        ],
    },
    OfficeColumns {
        label: "US_HOUSE",
        parties: &[("USREPR", "REP"), ("USREPDFL", "DEM"), ("USREPWI", "WI")],
    },
];

/// A raw results table: the header and the rows, as text.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// UTF-8 when the bytes are valid UTF-8, Windows-1252 otherwise.
fn decode_text<'a>(bytes: &'a [u8], path: &str) -> Cow<'a, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s.strip_prefix('\u{feff}').unwrap_or(s)),
        Err(e) => {
            warn!(
                "{} is not UTF-8 ({}), decoding it as Windows-1252",
                path, e
            );
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text
        }
    }
}

fn read_raw_csv(path: &str) -> InsightResult<RawTable> {
    let bytes = fs::read(path).context(OpeningFileSnafu { path })?;
    let text = decode_text(&bytes, path);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let header: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        let line = line_r.context(CsvLineParseSnafu {
            path,
            lineno: idx + 2,
        })?;
        rows.push(line.iter().map(|s| s.to_string()).collect());
    }
    Ok(RawTable { header, rows })
}

fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 => format!("{:.0}", f),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn has_column(range: &Range<DataType>, column: &str) -> bool {
    range
        .rows()
        .next()
        .map(|header| header.iter().any(|c| cell_text(c).trim() == column))
        .unwrap_or(false)
}

/// Opens any workbook calamine knows. Without an explicit worksheet name,
/// the results sheet is used when present, else the first sheet whose
/// header has a VTDID column.
fn read_raw_excel(path: &str, worksheet_name: Option<&str>) -> InsightResult<RawTable> {
    let mut workbook = open_workbook_auto(path).context(OpeningExcelSnafu { path })?;
    let names: Vec<String> = workbook.sheet_names().to_vec();
    debug!("read_raw_excel: {}: sheets {:?}", path, names);
    let wrange = match worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
        None => {
            let mut candidates: Vec<&String> =
                names.iter().filter(|n| n.as_str() == RESULTS_SHEET).collect();
            candidates.extend(names.iter().filter(|n| n.as_str() != RESULTS_SHEET));
            let mut found: Option<Range<DataType>> = None;
            for name in candidates {
                let range = match workbook.worksheet_range(name) {
                    Some(r) => r.context(OpeningExcelSnafu { path })?,
                    None => continue,
                };
                if name == RESULTS_SHEET || has_column(&range, KEY_COLUMNS[0]) {
                    info!("Using worksheet {:?} of {}", name, path);
                    found = Some(range);
                    break;
                }
            }
            found.context(NoResultsSheetSnafu { path })?
        }
    };
    let mut iter = wrange.rows();
    let header: Vec<String> = iter
        .next()
        .context(EmptyExcelSnafu { path })?
        .iter()
        .map(|c| cell_text(c).trim().to_string())
        .collect();
    debug!("read_raw_excel: header: {:?}", header);
    let rows: Vec<Vec<String>> = iter
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    Ok(RawTable { header, rows })
}

/// Reads a raw file, choosing the reader from the extension.
pub fn read_raw_table(path: &str, worksheet_name: Option<&str>) -> InsightResult<RawTable> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    info!("Attempting to read raw results {:?}", path);
    match ext.as_deref() {
        Some("csv") | Some("txt") => read_raw_csv(path),
        Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") => {
            read_raw_excel(path, worksheet_name)
        }
        _ => UnsupportedFileTypeSnafu { path }.fail(),
    }
}

/// Turns a raw table into tall rows: one row per (precinct, office, party)
/// column present in the table.
pub fn melt(table: &RawTable, year: u32, path: &str) -> InsightResult<Vec<ElectionRow>> {
    let cols: HashMap<&str, usize> = table
        .header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    let mut key_idx: Vec<usize> = Vec::new();
    for c in KEY_COLUMNS.iter() {
        let idx = cols.get(c).context(MissingColumnSnafu { column: *c, path })?;
        key_idx.push(*idx);
    }
    let cell = |row: &[String], idx: usize| -> String { row.get(idx).cloned().unwrap_or_default() };

    let mut res: Vec<ElectionRow> = Vec::new();
    for office in OFFICES.iter() {
        let party_of: HashMap<&str, &str> = office.parties.iter().copied().collect();
        // Vote columns are taken in the order of the file.
        let vote_cols: Vec<(usize, &str)> = table
            .header
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| party_of.get(name.as_str()).map(|p| (idx, *p)))
            .collect();
        if vote_cols.is_empty() {
            debug!("melt: {}: no columns for {}", path, office.label);
            continue;
        }
        for (col, party) in vote_cols.iter() {
            for row in table.rows.iter() {
                res.push(ElectionRow {
                    precinct_id: cell(row, key_idx[0]),
                    year,
                    office: office.label.to_string(),
                    party: party.to_string(),
                    votes: coerce_count(&cell(row, *col)),
                    county: title_case(&cell(row, key_idx[1])),
                    precinct_name: title_case(&cell(row, key_idx[2])),
                    registered: coerce_count(&cell(row, key_idx[3])),
                    turnout_eligible: coerce_count(&cell(row, key_idx[4])),
                });
            }
        }
    }
    if res.is_empty() {
        warn!("No office columns found in {}: the output will be empty", path);
    }
    Ok(res)
}

pub fn write_tall(rows: &[ElectionRow], out: &str) -> InsightResult<()> {
    if let Some(parent) = Path::new(out).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(OpeningFileSnafu {
            path: parent.display().to_string(),
        })?;
    }
    let mut wtr = csv::Writer::from_path(out).context(CsvWriteSnafu { path: out })?;
    wtr.write_record(RESULT_COLUMNS.iter())
        .context(CsvWriteSnafu { path: out })?;
    for r in rows.iter() {
        wtr.write_record(&[
            r.precinct_id.clone(),
            r.year.to_string(),
            r.office.clone(),
            r.party.clone(),
            r.votes.to_string(),
            r.county.clone(),
            r.precinct_name.clone(),
            r.registered.to_string(),
            r.turnout_eligible.to_string(),
        ])
        .context(CsvWriteSnafu { path: out })?;
    }
    wtr.flush().context(OpeningFileSnafu { path: out })?;
    Ok(())
}

/// Reads a raw file, melts it and writes the tall file. Returns the number
/// of rows written.
pub fn run_melt(
    input: &str,
    year: u32,
    out: &str,
    worksheet_name: Option<&str>,
) -> InsightResult<usize> {
    let table = read_raw_table(input, worksheet_name)?;
    debug!(
        "run_melt: {}: {} columns, {} rows",
        input,
        table.header.len(),
        table.rows.len()
    );
    let rows = melt(&table, year, input)?;
    write_tall(&rows, out)?;
    info!("Wrote {} rows to {}", rows.len(), out);
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn melt_offices() {
        let t = table(
            &[
                "VTDID", "COUNTYNAME", "PCTNAME", "REG7AM", "TOTVOTING", "USPRSDFL", "USPRSR",
                "USSENDFL", "OTHER",
            ],
            &[
                &["270010005", "ST. LOUIS", "DULUTH P-5", "900", "800", "500", "280", "510", "1"],
                &["270010006", "ST. LOUIS", "HIBBING P-6", "", "700", "x", "400", "300", "2"],
            ],
        );
        let rows = melt(&t, 2024, "mem").unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].office, "POTUS");
        assert_eq!(rows[0].party, "DEM");
        assert_eq!(rows[0].county, "St. Louis");
        assert_eq!(rows[0].precinct_name, "Duluth P-5");
        assert_eq!(rows[1].precinct_id, "270010006");
        assert_eq!(rows[1].votes, 0);
        assert_eq!(rows[1].registered, 0);
        assert_eq!(rows[2].party, "REP");
        assert_eq!(rows[4].office, "US_SENATE");
        assert_eq!(rows[4].votes, 510);
        assert!(rows.iter().all(|r| r.year == 2024));
    }

    #[test]
    fn melt_requires_key_columns() {
        let t = table(&["VTDID", "COUNTYNAME", "PCTNAME", "REG7AM"], &[]);
        assert!(matches!(
            melt(&t, 2024, "mem"),
            Err(InsightError::MissingColumn { .. })
        ));
    }

    #[test]
    fn melt_without_offices_is_empty() {
        let t = table(&KEY_COLUMNS, &[&["1", "A", "B", "3", "2"]]);
        assert!(melt(&t, 2022, "mem").unwrap().is_empty());
    }

    #[test]
    fn csv_round() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        fs::write(
            &input,
            "VTDID,COUNTYNAME,PCTNAME,REG7AM,TOTVOTING,USREPR,USREPDFL\n\
             271230001,RAMSEY,\"ST. PAUL W-1 P-1\",700,690,100,550\n",
        )
        .unwrap();
        let out = dir.path().join("out/election_results_2022.csv");
        let n = run_melt(
            &input.display().to_string(),
            2022,
            &out.display().to_string(),
            None,
        )
        .unwrap();
        assert_eq!(n, 2);
        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], RESULT_COLUMNS.join(","));
        assert_eq!(
            lines[1],
            "271230001,2022,US_HOUSE,REP,100,Ramsey,St. Paul W-1 P-1,700,690"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn latin1_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        let mut bytes: Vec<u8> =
            b"VTDID,COUNTYNAME,PCTNAME,REG7AM,TOTVOTING,USPRSDFL\n270010007,ST. LOUIS,SAINT-CL".to_vec();
        bytes.push(0xC9);
        bytes.extend_from_slice(b"MENT,50,40,30\n");
        fs::write(&input, &bytes).unwrap();
        let t = read_raw_table(&input.display().to_string(), None).unwrap();
        assert_eq!(t.rows[0][2], "SAINT-CL\u{c9}MENT");
        let rows = melt(&t, 2024, "mem").unwrap();
        assert_eq!(rows[0].precinct_name, "Saint-Cl\u{e9}ment");
        assert_eq!(rows[0].votes, 30);
    }

    fn column_name(idx: usize) -> char {
        (b'A' + idx as u8) as char
    }

    /// Writes a minimal workbook: text cells go to the shared strings,
    /// cells that parse as numbers are stored as values.
    fn write_xlsx(path: &Path, sheets: &[(&str, Vec<Vec<&str>>)]) {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut strings: Vec<String> = Vec::new();
        let mut sheet_xml: Vec<String> = Vec::new();
        for (_, rows) in sheets.iter() {
            let mut data = String::new();
            for (r, row) in rows.iter().enumerate() {
                data.push_str(&format!("<row r=\"{}\">", r + 1));
                for (c, value) in row.iter().enumerate() {
                    let cref = format!("{}{}", column_name(c), r + 1);
                    if value.parse::<f64>().is_ok() {
                        data.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", cref, value));
                    } else {
                        let idx = match strings.iter().position(|s| s == value) {
                            Some(i) => i,
                            None => {
                                strings.push(value.to_string());
                                strings.len() - 1
                            }
                        };
                        data.push_str(&format!("<c r=\"{}\" t=\"s\"><v>{}</v></c>", cref, idx));
                    }
                }
                data.push_str("</row>");
            }
            sheet_xml.push(format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
                 <sheetData>{}</sheetData></worksheet>",
                data
            ));
        }

        let sheet_entries: String = sheets
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                format!(
                    "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
                    name,
                    i + 1,
                    i + 1
                )
            })
            .collect();
        let workbook = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
             <sheets>{}</sheets></workbook>",
            sheet_entries
        );
        let mut rels: String = (0..sheets.len())
            .map(|i| {
                format!(
                    "<Relationship Id=\"rId{}\" \
                     Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" \
                     Target=\"worksheets/sheet{}.xml\"/>",
                    i + 1,
                    i + 1
                )
            })
            .collect();
        rels.push_str(&format!(
            "<Relationship Id=\"rId{}\" \
             Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings\" \
             Target=\"sharedStrings.xml\"/>",
            sheets.len() + 1
        ));
        let workbook_rels = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{}</Relationships>",
            rels
        );
        let shared: String = strings
            .iter()
            .map(|s| format!("<si><t>{}</t></si>", s))
            .collect();
        let shared_strings = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <sst xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             count=\"{n}\" uniqueCount=\"{n}\">{}</sst>",
            shared,
            n = strings.len()
        );
        let overrides: String = (0..sheets.len())
            .map(|i| {
                format!(
                    "<Override PartName=\"/xl/worksheets/sheet{}.xml\" \
                     ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>",
                    i + 1
                )
            })
            .collect();
        let content_types = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
             <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
             <Override PartName=\"/xl/workbook.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
             <Override PartName=\"/xl/sharedStrings.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml\"/>\
             {}</Types>",
            overrides
        );
        let root_rels = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             <Relationship Id=\"rId1\" \
             Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" \
             Target=\"xl/workbook.xml\"/></Relationships>";

        let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
        let mut entries: Vec<(String, String)> = vec![
            ("[Content_Types].xml".to_string(), content_types),
            ("_rels/.rels".to_string(), root_rels.to_string()),
            ("xl/workbook.xml".to_string(), workbook),
            ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels),
            ("xl/sharedStrings.xml".to_string(), shared_strings),
        ];
        for (i, xml) in sheet_xml.into_iter().enumerate() {
            entries.push((format!("xl/worksheets/sheet{}.xml", i + 1), xml));
        }
        for (name, content) in entries.iter() {
            zip.start_file(name.as_str(), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn excel_sheet_selection() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let header = vec!["VTDID", "COUNTYNAME", "PCTNAME", "REG7AM", "TOTVOTING", "USPRSR"];

        // The first sheet with a VTDID column.
        let p = dir.path().join("general.xlsx");
        write_xlsx(
            &p,
            &[
                ("Notes", vec![vec!["Unofficial results"]]),
                (
                    "Results",
                    vec![
                        header.clone(),
                        vec!["270010005", "ST. LOUIS", "DULUTH P-5", "900", "800", "280"],
                    ],
                ),
            ],
        );
        let path = p.display().to_string();
        let t = read_raw_table(&path, None).unwrap();
        assert_eq!(t.header[0], "VTDID");
        assert_eq!(t.rows[0][0], "270010005");
        let rows = melt(&t, 2024, &path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].votes, 280);
        assert_eq!(rows[0].registered, 900);
        let notes = read_raw_table(&path, Some("Notes")).unwrap();
        assert_eq!(notes.header, vec!["Unofficial results"]);

        // The results sheet wins over an earlier sheet with a VTDID column.
        let p = dir.path().join("published.xlsx");
        write_xlsx(
            &p,
            &[
                ("Summary", vec![header.clone(), vec!["1", "A", "B", "0", "0", "0"]]),
                (
                    RESULTS_SHEET,
                    vec![
                        header.clone(),
                        vec!["270010006", "ST. LOUIS", "HIBBING P-6", "700", "650", "400"],
                    ],
                ),
            ],
        );
        let t = read_raw_table(&p.display().to_string(), None).unwrap();
        assert_eq!(t.rows[0][0], "270010006");

        // No candidate sheet.
        let p = dir.path().join("other.xlsx");
        write_xlsx(&p, &[("Notes", vec![vec!["Unofficial results"]])]);
        let path = p.display().to_string();
        let err = read_raw_table(&path, None).unwrap_err();
        assert!(matches!(err, InsightError::NoResultsSheet { .. }));
        assert!(err
            .to_string()
            .starts_with("Could not find a sheet with a VTDID column"));
        assert!(matches!(
            read_raw_table(&path, Some("Missing")),
            Err(InsightError::EmptyExcel { .. })
        ));
    }

    #[test]
    fn unsupported_extension() {
        assert!(matches!(
            read_raw_table("results.pdf", None),
            Err(InsightError::UnsupportedFileType { .. })
        ));
    }
}
