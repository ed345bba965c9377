use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::dataset::{CsvTable, parse_date, parse_number, synthetic_date};
use crate::model::{FeatureVector, Predictor, missing_features};
use crate::record::{DateQuality, ScoredDataset};

pub const TREND_TAIL: usize = 10;
pub const TOP_PLAYERS: usize = 10;
pub const TOP_FEATURES_CHART: usize = 10;
pub const TOP_FEATURES_LISTED: usize = 5;
pub const PREDICTION_PREVIEW_ROWS: usize = 20;
pub const SHAP_PREFIX: &str = "SHAP_";

const DATE_COLUMNS: [&str; 4] = ["match_date", "date", "game_date", "matchday"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Fatigue,
    Predictions,
    Importance,
    TopFatigued,
    Live,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Fatigue,
        Tab::Predictions,
        Tab::Importance,
        Tab::TopFatigued,
        Tab::Live,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Fatigue => "Fatigue",
            Tab::Predictions => "Predictions",
            Tab::Importance => "SHAP Importance",
            Tab::TopFatigued => "Top 10 Fatigued",
            Tab::Live => "Live Prediction",
        }
    }

    pub fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn prev(self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRow {
    pub player_id: String,
    pub player_name: String,
    pub match_date: Option<NaiveDate>,
    pub values: HashMap<String, f64>,
}

impl DashboardRow {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    pub match_date: NaiveDate,
    pub fatigue_index: f64,
}

/// Scored rows as the dashboard sees them: loosely typed, column-addressed.
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub columns: Vec<String>,
    pub rows: Vec<DashboardRow>,
    pub date_quality: DateQuality,
}

impl DashboardData {
    /// Same view as loading the CSV that `write_scored` produces for `dataset`.
    pub fn from_scored(dataset: &ScoredDataset) -> Self {
        let columns = crate::dataset::output_headers(dataset);
        let base_len = crate::dataset::scored_headers().len();
        let rows = dataset
            .rows
            .iter()
            .map(|row| {
                let extras = dataset.extra_columns.iter().zip(&row.record.extra);
                let values = columns[..base_len]
                    .iter()
                    .filter_map(|c| row.value(c).map(|v| (c.clone(), v)))
                    .chain(extras.filter_map(|(c, raw)| parse_number(raw).map(|v| (c.clone(), v))))
                    .collect();
                DashboardRow {
                    player_id: row.record.player_id.to_string(),
                    player_name: row.record.display_name(),
                    match_date: row.record.match_date,
                    values,
                }
            })
            .collect();
        Self {
            columns,
            rows,
            date_quality: dataset.date_quality,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            fs::File::open(path).with_context(|| format!("open scored csv {}", path.display()))?;
        Self::read(file).with_context(|| format!("read scored csv {}", path.display()))
    }

    pub fn read<R: Read>(rdr: R) -> Result<Self> {
        let table = crate::dataset::read_table(rdr)?;
        let lower: Vec<String> = table
            .headers
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        let date_idx = lower
            .iter()
            .position(|h| DATE_COLUMNS.contains(&h.as_str()));
        let id_idx = table.column_index("player_id");
        let name_idx = table.column_index("player_name");
        if date_idx.is_none() {
            log::warn!("no explicit date column found; using row order instead");
        }

        let mut missing_dates = 0usize;
        let rows = table
            .rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                let cell = |idx: Option<usize>| {
                    idx.and_then(|i| row.get(i))
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default()
                };
                let player_id = cell(id_idx);
                let player_name = Some(cell(name_idx))
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| player_id.clone());
                let match_date = match date_idx {
                    Some(idx) => {
                        let parsed = row.get(idx).and_then(|raw| parse_date(raw));
                        if parsed.is_none() {
                            missing_dates += 1;
                        }
                        parsed
                    }
                    None => Some(synthetic_date(row_idx)),
                };
                let values = table
                    .headers
                    .iter()
                    .zip(row.iter())
                    .filter_map(|(h, raw)| parse_number(raw).map(|v| (h.clone(), v)))
                    .collect();
                DashboardRow {
                    player_id,
                    player_name,
                    match_date,
                    values,
                }
            })
            .collect();

        let date_quality = match (date_idx, missing_dates) {
            (None, _) => DateQuality::Synthetic,
            (Some(_), 0) => DateQuality::Observed,
            (Some(_), missing) => DateQuality::Partial { missing },
        };
        Ok(Self {
            columns: table.headers,
            rows,
            date_quality,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn player_names(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.player_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = self.rows.iter().filter_map(|r| r.match_date);
        let min = dates.clone().min()?;
        let max = dates.max()?;
        Some((min, max))
    }

    /// Last `per_player` rows of each player, in dataset order.
    pub fn recent_rows(&self, per_player: usize) -> Vec<&DashboardRow> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut keep = vec![false; self.rows.len()];
        for (idx, row) in self.rows.iter().enumerate().rev() {
            let seen = counts.entry(row.player_id.as_str()).or_default();
            if *seen < per_player {
                keep[idx] = true;
                *seen += 1;
            }
        }
        self.rows
            .iter()
            .zip(keep)
            .filter_map(|(row, k)| k.then_some(row))
            .collect()
    }

    /// Recent fatigue for one player inside an inclusive date range.
    pub fn fatigue_trend(&self, player_name: &str, from: NaiveDate, to: NaiveDate) -> Vec<TrendPoint> {
        if !self.has_column("fatigue_index") {
            return Vec::new();
        }
        self.recent_rows(TREND_TAIL)
            .into_iter()
            .filter(|r| r.player_name == player_name)
            .filter_map(|r| {
                let match_date = r.match_date?;
                if match_date < from || match_date > to {
                    return None;
                }
                Some(TrendPoint {
                    match_date,
                    fatigue_index: r.value("fatigue_index")?,
                })
            })
            .collect()
    }

    /// Players ranked by mean fatigue, highest first.
    pub fn top_fatigued(&self, n: usize) -> Vec<(String, f64)> {
        let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
        for row in &self.rows {
            if let Some(fi) = row.value("fatigue_index") {
                let entry = sums.entry(row.player_name.as_str()).or_default();
                entry.0 += fi;
                entry.1 += 1;
            }
        }
        let mut ranked: Vec<(String, f64)> = sums
            .into_iter()
            .map(|(name, (sum, count))| (name.to_string(), sum / count as f64))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Most recent dated row for a player. Undated rows only count when the
    /// player has no dated row at all, and then the last one wins.
    pub fn latest_for_player(&self, player_name: &str) -> Option<&DashboardRow> {
        self.rows
            .iter()
            .filter(|r| r.player_name == player_name)
            .max_by(|a, b| match (a.match_date, b.match_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    }
}

pub fn count_above(points: &[TrendPoint], threshold: f64) -> usize {
    points.iter().filter(|p| p.fatigue_index > threshold).count()
}

/// Mean absolute SHAP value per `SHAP_` column, highest first.
pub fn shap_importance(table: &CsvTable) -> Vec<(String, f64)> {
    let mut out: Vec<(String, f64)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.starts_with(SHAP_PREFIX))
        .filter_map(|(idx, h)| {
            let values: Vec<f64> = table.numeric_column(idx).into_iter().flatten().collect();
            if values.is_empty() {
                return None;
            }
            let mean_abs = values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64;
            Some((h.clone(), mean_abs))
        })
        .collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1));
    out
}

pub fn strip_shap_prefix(name: &str) -> &str {
    name.strip_prefix(SHAP_PREFIX).unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum LivePrediction {
    Predicted { player: String, value: f64, model: String },
    NoModel,
    MissingFeatures(Vec<&'static str>),
    NoData { player: String },
    Failed(String),
}

impl LivePrediction {
    pub fn message(&self) -> String {
        match self {
            LivePrediction::Predicted { player, value, model } => {
                format!("Predicted next-match performance for {player}: {value:.2} [{model}]")
            }
            LivePrediction::NoModel => {
                "No trained model configured (set FATIGUE_MODEL_PATH)".to_string()
            }
            LivePrediction::MissingFeatures(missing) => format!(
                "Missing required features in dataset: {}. Rebuild the fatigue index.",
                missing.join(", ")
            ),
            LivePrediction::NoData { player } => format!("No recent data available for {player}"),
            LivePrediction::Failed(err) => format!("Prediction failed: {err}"),
        }
    }
}

pub fn live_prediction(
    data: &DashboardData,
    player_name: &str,
    predictor: Option<&dyn Predictor>,
) -> LivePrediction {
    let Some(predictor) = predictor else {
        return LivePrediction::NoModel;
    };
    let missing = missing_features(data.columns.iter().map(String::as_str));
    if !missing.is_empty() {
        return LivePrediction::MissingFeatures(missing);
    }
    let Some(latest) = data.latest_for_player(player_name) else {
        return LivePrediction::NoData {
            player: player_name.to_string(),
        };
    };
    let features = FeatureVector::from_lookup(|name| latest.value(name));
    match predictor.predict(&features) {
        Ok(value) => LivePrediction::Predicted {
            player: player_name.to_string(),
            value,
            model: predictor.label(),
        },
        Err(err) => LivePrediction::Failed(format!("{err:#}")),
    }
}

/// Everything the terminal front end renders.
pub struct DashboardState {
    pub data: DashboardData,
    pub predictions: CsvTable,
    pub shap: CsvTable,
    pub players: Vec<String>,
    pub selected: usize,
    pub tab: Tab,
    pub threshold: f64,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub live: Option<LivePrediction>,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,
}

impl DashboardState {
    pub fn new(data: DashboardData, predictions: CsvTable, shap: CsvTable, threshold: f64) -> Self {
        let players = data.player_names();
        let bounds = data.date_bounds();
        let mut state = Self {
            data,
            predictions,
            shap,
            players,
            selected: 0,
            tab: Tab::Fatigue,
            threshold: threshold.clamp(0.0, 1.0),
            date_from: bounds.map(|b| b.0),
            date_to: bounds.map(|b| b.1),
            live: None,
            help_overlay: false,
            logs: VecDeque::new(),
        };
        if state.data.date_quality.is_degraded() {
            let note = state.data.date_quality.describe();
            state.push_log(format!("[WARN] Degraded dates: {note}"));
        }
        if !state.data.has_column("fatigue_index") {
            state.push_log("[WARN] Fatigue index not found in dataset");
        }
        state
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        if from.is_some() {
            self.date_from = from;
        }
        if to.is_some() {
            self.date_to = to;
        }
        self
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn selected_player(&self) -> Option<&str> {
        self.players.get(self.selected).map(String::as_str)
    }

    pub fn select_next(&mut self) {
        if !self.players.is_empty() {
            self.selected = (self.selected + 1).min(self.players.len() - 1);
            self.live = None;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.live = None;
    }

    pub fn adjust_threshold(&mut self, delta: f64) {
        self.threshold = ((self.threshold + delta).clamp(0.0, 1.0) * 100.0).round() / 100.0;
    }

    pub fn trend(&self) -> Vec<TrendPoint> {
        let (Some(player), Some(from), Some(to)) =
            (self.selected_player(), self.date_from, self.date_to)
        else {
            return Vec::new();
        };
        self.data.fatigue_trend(player, from, to)
    }

    pub fn threshold_exceeded(&self) -> usize {
        count_above(&self.trend(), self.threshold)
    }

    pub fn run_live_prediction(&mut self, predictor: Option<&dyn Predictor>) {
        let Some(player) = self.selected_player().map(str::to_string) else {
            self.push_log("[INFO] No player selected");
            return;
        };
        let result = live_prediction(&self.data, &player, predictor);
        let level = match result {
            LivePrediction::Predicted { .. } => "[INFO]",
            _ => "[WARN]",
        };
        self.push_log(format!("{level} {}", result.message()));
        self.live = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_cycle_both_ways() {
        assert_eq!(Tab::Fatigue.next(), Tab::Predictions);
        assert_eq!(Tab::Live.next(), Tab::Fatigue);
        assert_eq!(Tab::Fatigue.prev(), Tab::Live);
    }

    #[test]
    fn strip_prefix_only_when_present() {
        assert_eq!(strip_shap_prefix("SHAP_stamina"), "stamina");
        assert_eq!(strip_shap_prefix("stamina"), "stamina");
    }

    #[test]
    fn threshold_steps_stay_in_range() {
        let mut state = DashboardState::new(
            DashboardData::default(),
            CsvTable::default(),
            CsvTable::default(),
            0.95,
        );
        state.adjust_threshold(0.05);
        state.adjust_threshold(0.05);
        assert_eq!(state.threshold, 1.0);
        state.adjust_threshold(-0.25);
        assert!((state.threshold - 0.75).abs() < 1e-12);
        assert!(state.selected_player().is_none());
        assert!(state.trend().is_empty());
    }
}
