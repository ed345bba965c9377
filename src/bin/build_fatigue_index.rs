use std::path::PathBuf;

use anyhow::{Result, anyhow};

use fatigue_terminal::config::{self, AppConfig};
use fatigue_terminal::dataset;
use fatigue_terminal::export::export_scored_xlsx;
use fatigue_terminal::fatigue::{FatigueModel, score_dataset};
use fatigue_terminal::model::{LinearModel, Predictor, predict_latest, write_predictions};
use fatigue_terminal::summary::{feature_summary, format_summary};

const RAW_INPUT: &str = "data/processed/player_attributes.csv";
const CLEANED_INPUT: &str = "data/final/cleaned_player_data.csv";
const DEFAULT_OUTPUT: &str = "data/final/cleaned_player_data.csv";

fn main() -> Result<()> {
    config::load_env_files();
    config::init_logging("info");
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let input = config::arg_path(&args, "input")
        .or_else(default_input)
        .ok_or_else(|| anyhow!("no input csv found; pass --input or run build_player_dataset"))?;
    let output =
        config::arg_path(&args, "output").unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let raw = dataset::load_records(&input)?;
    let skipped = raw.skipped_rows;
    let scored = score_dataset(raw, &FatigueModel::default());
    dataset::write_scored(&output, &scored)?;

    println!("Fatigue index written");
    println!("In: {}", input.display());
    println!("Out: {}", output.display());
    println!("Rows: {}", scored.rows.len());
    if skipped > 0 {
        println!("Skipped rows (bad player_id): {skipped}");
    }
    if !scored.extra_columns.is_empty() {
        println!("Passed through: {}", scored.extra_columns.join(", "));
    }
    if scored.date_quality.is_degraded() {
        println!("WARNING: {}", scored.date_quality.describe());
    }
    println!();
    print!("{}", format_summary(&feature_summary(&scored)));

    if let Some(xlsx) = config::arg_path(&args, "xlsx") {
        let report = export_scored_xlsx(&xlsx, &scored)?;
        println!(
            "Workbook: {} rows={} cols={}{}",
            xlsx.display(),
            report.rows,
            report.columns,
            if report.degraded { " (degraded dates)" } else { "" }
        );
    }

    let cfg = AppConfig::from_env();
    if let Some(model_path) = config::arg_path(&args, "model").or(cfg.model_path) {
        let model = LinearModel::load(&model_path)?;
        let predictions = predict_latest(&scored, &model)?;
        let predictions_path =
            config::arg_path(&args, "predictions").unwrap_or(cfg.predictions_path);
        write_predictions(&predictions_path, &predictions)?;
        println!(
            "Predictions: {} players -> {} [{}]",
            predictions.len(),
            predictions_path.display(),
            model.label()
        );
    }
    Ok(())
}

fn default_input() -> Option<PathBuf> {
    [RAW_INPUT, CLEANED_INPUT]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}
