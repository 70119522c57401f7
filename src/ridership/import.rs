//! Import of the hourly ridership workbook.
//!
//! The workbook is exported to JSON with its original layout preserved: one
//! entry per sheet (e.g. "HOURLY 2020"), each sheet split into month sections
//! introduced by a header such as "January 2020", and each data row holding a
//! time label followed by one `[entry, exit]` pair per station in
//! [`STATION_NAMES`] order.

use crate::ridership::Sample;
use crate::stations::{STATION_NAMES, StationCatalog};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const UNKNOWN_LABEL: &str = "Unknown";

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

#[derive(Debug, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
pub struct Row {
    pub time: Option<String>,
    #[serde(default)]
    pub counts: Vec<Option<[Option<Cell>; 2]>>,
}

/// A spreadsheet cell as exported: numeric, or text that may hold a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    fn numeric_value(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            Cell::Text(text) => text.trim().parse::<f64>().ok(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read ridership file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse ridership file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("station not found: {0}")]
    UnknownStation(String),
}

pub fn load_workbook_from_path(path: impl AsRef<Path>) -> Result<Workbook, ImportError> {
    let contents = std::fs::read_to_string(path)?;
    let workbook: Workbook = serde_json::from_str(&contents)?;
    Ok(workbook)
}

pub fn import_from_path(
    path: impl AsRef<Path>,
    catalog: &StationCatalog,
) -> Result<Vec<Sample>, ImportError> {
    let workbook = load_workbook_from_path(path)?;
    import_workbook(&workbook, catalog)
}

pub fn import_workbook(
    workbook: &Workbook,
    catalog: &StationCatalog,
) -> Result<Vec<Sample>, ImportError> {
    let mut samples = Vec::new();

    for sheet in &workbook.sheets {
        let sheet_name = sheet.name.trim();
        let year = extract_year(sheet_name);
        info!(sheet = sheet_name, year = %year, "Importing sheet");

        for section in &sheet.sections {
            let month = extract_month(&section.header);
            debug!(month = %month, year = %year, rows = section.rows.len(), "Importing month");

            for row in &section.rows {
                let Some(time) = row.time.as_deref().map(str::trim) else {
                    continue;
                };
                if time.is_empty() || time.eq_ignore_ascii_case("Time") {
                    continue;
                }

                for (name, pair) in STATION_NAMES.iter().zip(row.counts.iter()) {
                    let Some([entry, exit]) = pair else {
                        continue;
                    };
                    let entry = entry.as_ref().and_then(Cell::numeric_value);
                    let exit = exit.as_ref().and_then(Cell::numeric_value);
                    if entry.is_none() && exit.is_none() {
                        continue;
                    }

                    let station = catalog
                        .find_by_name(name)
                        .ok_or_else(|| ImportError::UnknownStation((*name).to_string()))?;

                    samples.push(Sample {
                        station_id: station.id,
                        year: year.clone(),
                        month: month.clone(),
                        time: Some(time.to_string()),
                        entry_count: Some(to_count(entry)),
                        exit_count: Some(to_count(exit)),
                    });
                }
            }
        }
    }

    info!(samples = samples.len(), "Ridership import complete");
    Ok(samples)
}

fn to_count(value: Option<f64>) -> u32 {
    // `as` saturates and truncates toward zero, matching integer cell reads.
    value.map_or(0, |v| v.max(0.0) as u32)
}

/// First `20xx` year in a sheet name such as "HOURLY 2020".
pub fn extract_year(sheet_name: &str) -> String {
    let cleaned = sheet_name.to_ascii_lowercase().replace("hourly", "");
    let bytes = cleaned.trim().as_bytes();
    bytes
        .windows(4)
        .find(|w| w.starts_with(b"20") && w[2].is_ascii_digit() && w[3].is_ascii_digit())
        .and_then(|w| std::str::from_utf8(w).ok())
        .map_or_else(|| UNKNOWN_LABEL.to_string(), str::to_string)
}

/// First month name in a section header, capitalized ("JANUARY 2020" -> "January").
pub fn extract_month(header: &str) -> String {
    let lower = header.to_lowercase();
    MONTHS
        .iter()
        .filter_map(|month| lower.find(month).map(|pos| (pos, *month)))
        .min_by_key(|(pos, _)| *pos)
        .map_or_else(|| UNKNOWN_LABEL.to_string(), |(_, month)| capitalize(month))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
