//! Synchronous, blocking sheet parsing. Each `load_*_sheet` function is
//! run inside `spawn_blocking` by the repository so the six sheets can be
//! read concurrently without blocking the async runtime.
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum WorkbookError {
    #[error("path is not a file: {0}")]
    NotAFile(String),
    #[error("failed to open workbook: {0}")]
    OpenFailed(String),
}

#[derive(Error, Debug, Clone)]
pub enum SheetError {
    #[error("sheet not found: {0}")]
    SheetNotFound(String),
    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

/// Excel's epoch for numeric date serials (1899-12-30, the traditional
/// "Lotus 1-2-3 bug" epoch every spreadsheet engine still honors).
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(EXCEL_EPOCH.0, EXCEL_EPOCH.1, EXCEL_EPOCH.2)?;
    epoch.checked_add_signed(chrono::Duration::days(serial.trunc() as i64))
}

fn parse_date_cell(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
        Data::Float(f) => excel_serial_to_date(*f),
        Data::Int(i) => excel_serial_to_date(*i as f64),
        Data::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| NaiveDate::parse_from_str(s.trim(), "%m/%d/%Y").ok()),
        _ => None,
    }
}

fn parse_f64_cell(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "_" || trimmed.eq_ignore_ascii_case("n/a") {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

fn parse_string_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

fn open(path: &Path) -> Result<Xlsx<BufReader<File>>, WorkbookError> {
    if !path.is_file() {
        return Err(WorkbookError::NotAFile(path.display().to_string()));
    }
    open_workbook(path).map_err(|e| WorkbookError::OpenFailed(e.to_string()))
}

fn header_index(range: &Range<Data>, header_row: usize) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    if let Some(row) = range.rows().nth(header_row) {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(name) = parse_string_cell(cell) {
                map.insert(name, idx);
            }
        }
    }
    map
}

fn col<'a>(
    row: &'a [Data],
    headers: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a Data> {
    headers.get(name).and_then(|&idx| row.get(idx))
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentalRow {
    pub rainfall_mm: Option<f64>,
    pub evaporation_mm: Option<f64>,
    pub pan_coefficient: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct StorageRow {
    pub facility_code: String,
    pub inflow_m3: Option<f64>,
    pub outflow_m3: Option<f64>,
    pub abstraction_m3: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductionRow {
    pub concentrate_tonnes: Option<f64>,
    pub concentrate_moisture_pct: Option<f64>,
    pub slurry_density: Option<f64>,
    pub tailings_tonnes: Option<f64>,
    pub tailings_moisture_pct: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ConsumptionRow {
    pub dust_suppression_m3: Option<f64>,
    pub mining_m3: Option<f64>,
    pub domestic_m3: Option<f64>,
    pub irrigation_m3: Option<f64>,
    pub other_m3: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SeepageRow {
    pub seepage_loss_m3: Option<f64>,
    pub seepage_gain_m3: Option<f64>,
    pub unaccounted_losses_m3: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct DischargeRecord {
    pub facility_code: String,
    pub discharge_volume_m3: Option<f64>,
    pub discharge_type: Option<String>,
    pub reason: Option<String>,
    pub approval_reference: Option<String>,
}

type PeriodKey = (i32, u32);

fn period_and_row<'a>(
    range: &'a Range<Data>,
    headers: &HashMap<String, usize>,
    header_row: usize,
) -> impl Iterator<Item = (PeriodKey, &'a [Data])> + 'a {
    let date_idx = headers.get("Date").copied();
    range.rows().skip(header_row + 1).filter_map(move |row| {
        let date_idx = date_idx?;
        let date = parse_date_cell(row.get(date_idx)?)?;
        Some(((date.year(), date.month()), row))
    })
}

use chrono::Datelike;

pub fn load_environmental_sheet(
    path: &Path,
) -> Result<HashMap<PeriodKey, EnvironmentalRow>, SheetError> {
    let mut wb = open(path)?;
    let range = wb
        .worksheet_range("Environmental")
        .map_err(|_| SheetError::SheetNotFound("Environmental".into()))?;
    let headers = header_index(&range, 0);
    let mut out = HashMap::new();
    for (period, row) in period_and_row(&range, &headers, 0) {
        let record = EnvironmentalRow {
            rainfall_mm: col(row, &headers, "Rainfall_mm").and_then(parse_f64_cell),
            evaporation_mm: col(row, &headers, "Custom_Evaporation_mm").and_then(parse_f64_cell),
            pan_coefficient: col(row, &headers, "Pan_Coefficient").and_then(parse_f64_cell),
        };
        out.insert(period, record);
    }
    Ok(out)
}

/// `Storage_Facilities` carries a 3-row preamble above the header in the
/// reference workbook, so the header lives at row index 3.
pub fn load_storage_sheet(
    path: &Path,
) -> Result<HashMap<PeriodKey, Vec<StorageRow>>, SheetError> {
    const HEADER_ROW: usize = 3;
    let mut wb = open(path)?;
    let range = wb
        .worksheet_range("Storage_Facilities")
        .map_err(|_| SheetError::SheetNotFound("Storage_Facilities".into()))?;
    let headers = header_index(&range, HEADER_ROW);
    let mut out: HashMap<PeriodKey, Vec<StorageRow>> = HashMap::new();
    for (period, row) in period_and_row(&range, &headers, HEADER_ROW) {
        let facility_code = col(row, &headers, "Facility_Code")
            .and_then(parse_string_cell)
            .unwrap_or_default();
        if facility_code.is_empty() {
            continue;
        }
        let record = StorageRow {
            facility_code,
            inflow_m3: col(row, &headers, "Inflow_m3").and_then(parse_f64_cell),
            outflow_m3: col(row, &headers, "Outflow_m3").and_then(parse_f64_cell),
            abstraction_m3: col(row, &headers, "Abstraction_m3").and_then(parse_f64_cell),
        };
        out.entry(period).or_default().push(record);
    }
    Ok(out)
}

pub fn load_production_sheet(
    path: &Path,
) -> Result<HashMap<PeriodKey, ProductionRow>, SheetError> {
    let mut wb = open(path)?;
    let range = wb
        .worksheet_range("Production")
        .map_err(|_| SheetError::SheetNotFound("Production".into()))?;
    let headers = header_index(&range, 0);
    let mut out = HashMap::new();
    for (period, row) in period_and_row(&range, &headers, 0) {
        let record = ProductionRow {
            concentrate_tonnes: col(row, &headers, "Concentrate_Produced_t").and_then(parse_f64_cell),
            concentrate_moisture_pct: col(row, &headers, "Concentrate_Moisture_Percent")
                .and_then(parse_f64_cell),
            slurry_density: col(row, &headers, "Slurry_Density_t_per_m3").and_then(parse_f64_cell),
            tailings_tonnes: col(row, &headers, "Tailings_Produced_t").and_then(parse_f64_cell),
            tailings_moisture_pct: col(row, &headers, "Tailings_Moisture_Percent")
                .and_then(parse_f64_cell),
        };
        out.insert(period, record);
    }
    Ok(out)
}

pub fn load_consumption_sheet(
    path: &Path,
) -> Result<HashMap<PeriodKey, ConsumptionRow>, SheetError> {
    let mut wb = open(path)?;
    let range = wb
        .worksheet_range("Consumption")
        .map_err(|_| SheetError::SheetNotFound("Consumption".into()))?;
    let headers = header_index(&range, 0);
    let mut out = HashMap::new();
    for (period, row) in period_and_row(&range, &headers, 0) {
        let record = ConsumptionRow {
            dust_suppression_m3: col(row, &headers, "Dust_Suppression_m3").and_then(parse_f64_cell),
            mining_m3: col(row, &headers, "Mining_m3").and_then(parse_f64_cell),
            domestic_m3: col(row, &headers, "Domestic_m3").and_then(parse_f64_cell),
            irrigation_m3: col(row, &headers, "Irrigation_m3").and_then(parse_f64_cell),
            other_m3: col(row, &headers, "Other_m3").and_then(parse_f64_cell),
        };
        out.insert(period, record);
    }
    Ok(out)
}

pub fn load_seepage_sheet(path: &Path) -> Result<HashMap<PeriodKey, SeepageRow>, SheetError> {
    let mut wb = open(path)?;
    let range = wb
        .worksheet_range("Seepage_Losses")
        .map_err(|_| SheetError::SheetNotFound("Seepage_Losses".into()))?;
    let headers = header_index(&range, 0);
    let mut out = HashMap::new();
    for (period, row) in period_and_row(&range, &headers, 0) {
        let record = SeepageRow {
            seepage_loss_m3: col(row, &headers, "Seepage_Loss_m3").and_then(parse_f64_cell),
            seepage_gain_m3: col(row, &headers, "Seepage_Gain_m3").and_then(parse_f64_cell),
            unaccounted_losses_m3: col(row, &headers, "Unaccounted_Losses_m3")
                .and_then(parse_f64_cell),
        };
        out.insert(period, record);
    }
    Ok(out)
}

pub fn load_discharge_sheet(
    path: &Path,
) -> Result<HashMap<PeriodKey, Vec<DischargeRecord>>, SheetError> {
    let mut wb = open(path)?;
    let range = wb
        .worksheet_range("Discharge")
        .map_err(|_| SheetError::SheetNotFound("Discharge".into()))?;
    let headers = header_index(&range, 0);
    let mut out: HashMap<PeriodKey, Vec<DischargeRecord>> = HashMap::new();
    for (period, row) in period_and_row(&range, &headers, 0) {
        let record = DischargeRecord {
            facility_code: col(row, &headers, "Facility_Code")
                .and_then(parse_string_cell)
                .unwrap_or_default(),
            discharge_volume_m3: col(row, &headers, "Discharge_Volume_m3").and_then(parse_f64_cell),
            discharge_type: col(row, &headers, "Discharge_Type").and_then(parse_string_cell),
            reason: col(row, &headers, "Reason").and_then(parse_string_cell),
            approval_reference: col(row, &headers, "Approval_Reference")
                .and_then(parse_string_cell),
        };
        out.entry(period).or_default().push(record);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excel_serial_matches_known_date() {
        // 45200 == 2023-10-01, a value the reference FOPR parser checks against.
        let date = excel_serial_to_date(45200.0).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 10, 1).unwrap());
    }

    #[test]
    fn parse_f64_cell_treats_sentinels_as_null() {
        assert_eq!(parse_f64_cell(&Data::String("_".into())), None);
        assert_eq!(parse_f64_cell(&Data::String("n/a".into())), None);
        assert_eq!(parse_f64_cell(&Data::String("".into())), None);
        assert_eq!(parse_f64_cell(&Data::Float(12.5)), Some(12.5));
    }

    #[test]
    fn parse_date_cell_handles_iso_string() {
        let d = parse_date_cell(&Data::String("2026-03-01".into())).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn missing_workbook_path_errors() {
        let err = open(Path::new("/nonexistent/workbook.xlsx"));
        assert!(matches!(err, Err(WorkbookError::NotAFile(_))));
    }
}
