use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::record::{
    ATTRIBUTE_COLUMNS, DERIVED_COLUMNS, DateQuality, PlayerMatchRecord, RawDataset, ScoredDataset,
};

pub const REQUIRED_COLUMNS: [&str; 3] = ["player_id", "stamina", "sprint_speed"];

const SYNTHETIC_START: (i32, u32, u32) = (2015, 1, 1);
const SYNTHETIC_STEP_DAYS: i64 = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Any CSV kept as strings, for loosely-typed side inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn numeric_column(&self, idx: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| row.get(idx).and_then(|raw| parse_number(raw)))
            .collect()
    }
}

pub fn load_records(path: &Path) -> Result<RawDataset> {
    let file =
        fs::File::open(path).with_context(|| format!("open player csv {}", path.display()))?;
    let dataset =
        read_records(file).with_context(|| format!("read player csv {}", path.display()))?;
    log::info!(
        "loaded {} records from {}",
        dataset.records.len(),
        path.display()
    );
    Ok(dataset)
}

pub fn read_records<R: Read>(rdr: R) -> Result<RawDataset> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers: Vec<String> = reader
        .headers()
        .context("read csv header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DataError::MissingColumns(missing).into());
    }

    let col = |name: &str| headers.iter().position(|h| h == name);
    let id_idx = col("player_id");
    let name_idx = col("player_name");
    let minutes_idx = col("minutes_played");
    let attr_idx: Vec<Option<usize>> = ATTRIBUTE_COLUMNS.iter().map(|name| col(*name)).collect();
    let date_idx = detect_date_column(&headers);
    if let Some(idx) = date_idx {
        log::debug!("using date column {:?}", headers[idx]);
    } else {
        log::warn!("no date column found; creating synthetic dates");
    }
    let extra_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(idx, h)| Some(*idx) != date_idx && !is_known_column(h))
        .map(|(idx, _)| idx)
        .collect();

    let mut records = Vec::new();
    let mut missing_dates = 0usize;
    let mut skipped_rows = 0usize;
    for (row_idx, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("read csv row {}", row_idx + 1))?;
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(str::trim);

        let raw_id = cell(id_idx).unwrap_or_default();
        let Some(player_id) = parse_player_id(raw_id) else {
            log::debug!("row {}: skipping invalid player_id {raw_id:?}", row_idx + 1);
            skipped_rows += 1;
            continue;
        };

        let match_date = match date_idx {
            Some(_) => {
                let parsed = cell(date_idx).and_then(parse_date);
                if parsed.is_none() {
                    missing_dates += 1;
                }
                parsed
            }
            None => Some(synthetic_date(row_idx)),
        };

        let attr = |name: &str| {
            ATTRIBUTE_COLUMNS
                .iter()
                .position(|c| *c == name)
                .and_then(|pos| cell(attr_idx[pos]))
                .and_then(parse_number)
        };

        records.push(PlayerMatchRecord {
            player_id,
            player_name: cell(name_idx)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            match_date,
            stamina: attr("stamina"),
            sprint_speed: attr("sprint_speed"),
            overall_rating: attr("overall_rating"),
            strength: attr("strength"),
            agility: attr("agility"),
            reactions: attr("reactions"),
            potential: attr("potential"),
            minutes_played: cell(minutes_idx).and_then(parse_number),
            extra: extra_idx
                .iter()
                .map(|idx| row.get(*idx).unwrap_or_default().to_string())
                .collect(),
        });
    }
    if skipped_rows > 0 {
        log::warn!("skipped {skipped_rows} rows with a missing or invalid player_id");
    }

    let date_quality = if date_idx.is_none() {
        DateQuality::Synthetic
    } else if missing_dates > 0 {
        DateQuality::Partial {
            missing: missing_dates,
        }
    } else {
        DateQuality::Observed
    };

    Ok(RawDataset {
        records,
        date_quality,
        minutes_column: minutes_idx.is_some(),
        extra_columns: extra_idx.iter().map(|idx| headers[*idx].clone()).collect(),
        skipped_rows,
    })
}

// Columns the loader maps onto record fields or recomputes when scoring.
fn is_known_column(name: &str) -> bool {
    matches!(name, "player_id" | "player_name" | "match_date" | "minutes_played")
        || ATTRIBUTE_COLUMNS.contains(&name)
        || DERIVED_COLUMNS.contains(&name)
}

/// First header mentioning "date", case-insensitively.
pub fn detect_date_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.to_ascii_lowercase().contains("date"))
}

pub fn synthetic_date(row_idx: usize) -> NaiveDate {
    let (y, m, d) = SYNTHETIC_START;
    let start = NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
    start + Duration::days(SYNTHETIC_STEP_DAYS * row_idx as i64)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M",
        "%d-%m-%Y %H:%M",
    ];
    const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"];

    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(cleaned, fmt) {
            return Some(d);
        }
    }
    None
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

fn parse_player_id(raw: &str) -> Option<i64> {
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }
    // Ids that went through a float column come back as "505942.0".
    let value = parse_number(raw)?;
    (value.fract() == 0.0).then_some(value as i64)
}

pub fn scored_headers() -> Vec<&'static str> {
    let mut headers = vec!["player_id", "player_name", "match_date"];
    headers.extend(ATTRIBUTE_COLUMNS);
    headers.push("minutes_played");
    headers.extend(DERIVED_COLUMNS);
    headers
}

pub fn raw_headers() -> Vec<&'static str> {
    let mut headers = vec!["player_id", "player_name", "match_date"];
    headers.extend(ATTRIBUTE_COLUMNS);
    headers
}

/// Fixed scored schema followed by the passed-through input columns.
pub fn output_headers(dataset: &ScoredDataset) -> Vec<String> {
    scored_headers()
        .into_iter()
        .map(str::to_string)
        .chain(dataset.extra_columns.iter().cloned())
        .collect()
}

pub fn write_scored(path: &Path, dataset: &ScoredDataset) -> Result<()> {
    write_atomic(path, |file| write_scored_to(file, dataset))
}

/// Writes unscored records, the input shape `read_records` expects.
pub fn write_records(path: &Path, records: &[PlayerMatchRecord]) -> Result<()> {
    write_atomic(path, |file| write_records_to(file, records))
}

pub fn write_records_to<W: Write>(out: W, records: &[PlayerMatchRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    let headers = raw_headers();
    writer.write_record(&headers).context("write header")?;
    for record in records {
        let mut cells = identity_cells(record);
        for name in ATTRIBUTE_COLUMNS {
            cells.push(format_cell(record.attribute(name)));
        }
        writer.write_record(&cells).context("write record row")?;
    }
    writer.flush().context("flush record csv")?;
    Ok(())
}

pub(crate) fn write_atomic(
    path: &Path,
    write: impl FnOnce(fs::File) -> Result<()>,
) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }
    let tmp = path.with_extension("csv.tmp");
    let file = fs::File::create(&tmp).with_context(|| format!("create csv {}", tmp.display()))?;
    write(file)?;
    fs::rename(&tmp, path).with_context(|| format!("swap csv {}", path.display()))?;
    Ok(())
}

fn identity_cells(record: &PlayerMatchRecord) -> Vec<String> {
    vec![
        record.player_id.to_string(),
        record.player_name.clone().unwrap_or_default(),
        record
            .match_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    ]
}

pub fn write_scored_to<W: Write>(out: W, dataset: &ScoredDataset) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    let base = scored_headers();
    writer
        .write_record(output_headers(dataset))
        .context("write scored header")?;
    let extras = dataset.extra_columns.len();
    for row in &dataset.rows {
        let mut cells = identity_cells(&row.record);
        for name in &base[3..] {
            cells.push(format_cell(row.value(name)));
        }
        cells.extend(
            (0..extras).map(|idx| row.record.extra.get(idx).cloned().unwrap_or_default()),
        );
        writer.write_record(&cells).context("write scored row")?;
    }
    writer.flush().context("flush scored csv")?;
    Ok(())
}

fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn load_table(path: &Path) -> Result<CsvTable> {
    let file = fs::File::open(path).with_context(|| format!("open csv {}", path.display()))?;
    read_table(file).with_context(|| format!("read csv {}", path.display()))
}

pub fn read_table<R: Read>(rdr: R) -> Result<CsvTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers = reader
        .headers()
        .context("read csv header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.context("read csv row")?;
        rows.push(row.iter().map(str::to_string).collect());
    }
    Ok(CsvTable { headers, rows })
}

/// Missing side files are treated as empty, not as errors.
pub fn load_table_or_empty(path: &Path) -> CsvTable {
    if !path.exists() {
        log::info!("no table at {}", path.display());
        return CsvTable::default();
    }
    match load_table(path) {
        Ok(table) => table,
        Err(err) => {
            log::warn!("{err:#}");
            CsvTable::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_sqlite_and_day_first() {
        let expected = NaiveDate::from_ymd_opt(2016, 2, 18);
        assert_eq!(parse_date("2016-02-18 00:00:00"), expected);
        assert_eq!(parse_date("2016-02-18"), expected);
        assert_eq!(parse_date("18/02/2016"), expected);
        assert_eq!(parse_date("18.02.2016"), expected);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn parse_number_rejects_non_finite() {
        assert_eq!(parse_number(" 71 "), Some(71.0));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn player_id_accepts_float_text() {
        assert_eq!(parse_player_id("505942"), Some(505942));
        assert_eq!(parse_player_id("505942.0"), Some(505942));
        assert_eq!(parse_player_id("12.5"), None);
        assert_eq!(parse_player_id(""), None);
    }

    #[test]
    fn synthetic_dates_step_weekly() {
        assert_eq!(synthetic_date(0), NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        assert_eq!(synthetic_date(2), NaiveDate::from_ymd_opt(2015, 1, 15).unwrap());
    }

    #[test]
    fn date_column_detection_is_case_insensitive() {
        let headers = vec!["player_id".to_string(), "Match_Date".to_string()];
        assert_eq!(detect_date_column(&headers), Some(1));
        assert_eq!(detect_date_column(&headers[..1]), None);
    }
}
