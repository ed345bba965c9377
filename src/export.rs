use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::dataset::{output_headers, parse_number, scored_headers};
use crate::record::ScoredDataset;
use crate::summary::{Describe, ENGINEERED_FEATURES, feature_summary};

pub struct ExportReport {
    pub rows: usize,
    pub columns: usize,
    pub degraded: bool,
}

/// Writes the scored rows and the feature summary into an xlsx workbook.
pub fn export_scored_xlsx(path: &Path, dataset: &ScoredDataset) -> Result<ExportReport> {
    let headers = output_headers(dataset);
    let base_len = scored_headers().len();
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("FatigueIndex")?;
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
        write_header(sheet, &header_refs)?;
        for (idx, row) in dataset.rows.iter().enumerate() {
            let r = (idx + 1) as u32;
            sheet
                .write_number(r, 0, row.record.player_id as f64)
                .with_context(|| format!("write cell ({r},0)"))?;
            sheet
                .write_string(r, 1, row.record.player_name.as_deref().unwrap_or(""))
                .with_context(|| format!("write cell ({r},1)"))?;
            let date = row
                .record
                .match_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            sheet
                .write_string(r, 2, &date)
                .with_context(|| format!("write cell ({r},2)"))?;
            for (col_idx, name) in headers.iter().enumerate().take(base_len).skip(3) {
                if let Some(value) = row.value(name) {
                    sheet
                        .write_number(r, col_idx as u16, value)
                        .with_context(|| format!("write cell ({r},{col_idx})"))?;
                }
            }
            for (offset, raw) in row.record.extra.iter().enumerate() {
                let col_idx = base_len + offset;
                if col_idx >= headers.len() || raw.is_empty() {
                    continue;
                }
                match parse_number(raw) {
                    Some(value) => sheet.write_number(r, col_idx as u16, value),
                    None => sheet.write_string(r, col_idx as u16, raw),
                }
                .with_context(|| format!("write cell ({r},{col_idx})"))?;
            }
        }
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_header(
            sheet,
            &["feature", "count", "mean", "std", "min", "25%", "50%", "75%", "max"],
        )?;
        for (idx, (name, stats)) in feature_summary(dataset).into_iter().enumerate() {
            let r = (idx + 1) as u32;
            sheet
                .write_string(r, 0, name)
                .with_context(|| format!("write summary name {name}"))?;
            if let Some(d) = stats {
                for (col_idx, value) in summary_cells(&d).into_iter().enumerate() {
                    if value.is_finite() {
                        sheet
                            .write_number(r, (col_idx + 1) as u16, value)
                            .with_context(|| format!("write summary {name}"))?;
                    }
                }
            }
        }
        if dataset.date_quality.is_degraded() {
            let r = (ENGINEERED_FEATURES.len() + 2) as u32;
            sheet
                .write_string(r, 0, format!("degraded: {}", dataset.date_quality.describe()))
                .context("write degraded note")?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        rows: dataset.rows.len(),
        columns: headers.len(),
        degraded: dataset.date_quality.is_degraded(),
    })
}

fn summary_cells(d: &Describe) -> [f64; 8] {
    [
        d.count as f64,
        d.mean,
        d.std,
        d.min,
        d.q25,
        d.q50,
        d.q75,
        d.max,
    ]
}

fn write_header(worksheet: &mut Worksheet, headers: &[&str]) -> Result<()> {
    for (col_idx, value) in headers.iter().enumerate() {
        worksheet
            .write_string(0, col_idx as u16, *value)
            .with_context(|| format!("write header ({col_idx})"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::fatigue::{FatigueModel, score_records};
    use crate::record::{DateQuality, PlayerMatchRecord};

    #[test]
    fn writes_workbook_with_report() {
        let records: Vec<PlayerMatchRecord> = (0..3)
            .map(|idx| PlayerMatchRecord {
                stamina: Some(70.0),
                sprint_speed: Some(80.0),
                ..PlayerMatchRecord::new(1, NaiveDate::from_ymd_opt(2015, 1, 1 + idx * 5))
            })
            .collect();
        let dataset = ScoredDataset {
            rows: score_records(&records, &FatigueModel::default(), false),
            date_quality: DateQuality::Synthetic,
            extra_columns: Vec::new(),
        };
        let path = std::env::temp_dir().join(format!("fatigue_export_{}.xlsx", std::process::id()));
        let report = export_scored_xlsx(&path, &dataset).unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.columns, scored_headers().len());
        assert!(report.degraded);
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
