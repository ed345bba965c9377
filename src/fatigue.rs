use std::cmp::Ordering;
use std::ops::Range;

use crate::record::{PlayerMatchRecord, RawDataset, ScoredDataset, ScoredRecord};

const ROLLING_WINDOW: usize = 3;
// rolling_minutes_3m falls back to rating_rolling scaled by this when minutes are absent.
const MINUTES_PROXY_SCALE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FatigueModel {
    pub recovery_tau_days: f64,
    pub layoff_penalty_strength: f64,
    pub layoff_threshold_days: f64,
    pub layoff_scale_days: f64,
    pub sharpness_peak_days: f64,
    pub sharpness_width_days: f64,
    pub stamina_weight: f64,
    pub sprint_weight: f64,
    pub recovery_weight: f64,
    // Rest assumed before a player's first observed match.
    pub baseline_rest_days: f64,
}

impl Default for FatigueModel {
    fn default() -> Self {
        Self {
            recovery_tau_days: 7.0,
            layoff_penalty_strength: 0.12,
            layoff_threshold_days: 30.0,
            layoff_scale_days: 90.0,
            sharpness_peak_days: 30.0,
            sharpness_width_days: 40.0,
            stamina_weight: 0.5,
            sprint_weight: 0.3,
            recovery_weight: 0.2,
            baseline_rest_days: 7.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryTerms {
    pub rec_base: f64,
    pub penalty: f64,
    pub sharpness_decay: f64,
    pub recovery_factor: f64,
}

impl FatigueModel {
    pub fn rest_recovery(&self, days: f64) -> f64 {
        1.0 - (-days / self.recovery_tau_days).exp()
    }

    pub fn layoff_penalty(&self, days: f64) -> f64 {
        let excess = (days - self.layoff_threshold_days).max(0.0);
        self.layoff_penalty_strength * (1.0 - (-excess / self.layoff_scale_days).exp())
    }

    pub fn sharpness_decay(&self, days: f64) -> f64 {
        let offset = days - self.sharpness_peak_days;
        let width = self.sharpness_width_days;
        (-(offset * offset) / (2.0 * width * width)).exp()
    }

    pub fn recovery(&self, days: f64) -> RecoveryTerms {
        let rec_base = self.rest_recovery(days);
        let penalty = self.layoff_penalty(days);
        let sharpness_decay = self.sharpness_decay(days);
        let recovery_factor = (rec_base * (1.0 - penalty) * sharpness_decay).clamp(0.0, 1.0);
        RecoveryTerms {
            rec_base,
            penalty,
            sharpness_decay,
            recovery_factor,
        }
    }

    /// Weighted blend of stamina deficit, sprint load under poor recovery and raw
    /// recovery deficit. Inputs are expected already normalized to [0,1].
    pub fn fatigue_index(&self, stamina_norm: f64, sprint_norm: f64, recovery_factor: f64) -> f64 {
        let deficit = 1.0 - recovery_factor;
        self.stamina_weight * (1.0 - stamina_norm)
            + self.sprint_weight * (sprint_norm * deficit)
            + self.recovery_weight * deficit
    }
}

pub fn normalize_attribute(value: f64) -> f64 {
    value.clamp(0.0, 100.0) / 100.0
}

/// Stable sort by player, then date ascending with unknown dates last.
pub fn prepare(records: &mut [PlayerMatchRecord]) {
    records.sort_by(|a, b| {
        a.player_id
            .cmp(&b.player_id)
            .then_with(|| match (a.match_date, b.match_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
}

/// Contiguous index ranges sharing a player id. Assumes grouped input.
pub fn player_groups(records: &[PlayerMatchRecord]) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0usize;
    for idx in 1..=records.len() {
        if idx == records.len() || records[idx].player_id != records[start].player_id {
            if start < idx {
                groups.push(start..idx);
            }
            start = idx;
        }
    }
    groups
}

pub fn forward_fill(records: &mut [PlayerMatchRecord]) {
    for group in player_groups(records) {
        for idx in (group.start + 1)..group.end {
            let (head, tail) = records.split_at_mut(idx);
            tail[0].fill_missing_from(&head[idx - 1]);
        }
    }
}

pub fn days_since_last_match(records: &[PlayerMatchRecord], baseline_days: f64) -> Vec<f64> {
    let mut out = vec![baseline_days; records.len()];
    for group in player_groups(records) {
        for idx in (group.start + 1)..group.end {
            if let (Some(prev), Some(cur)) = (records[idx - 1].match_date, records[idx].match_date)
            {
                out[idx] = (cur - prev).num_days() as f64;
            }
        }
    }
    out
}

/// Trailing mean over the last `window` slots, skipping missing values.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|idx| {
            let start = (idx + 1).saturating_sub(window);
            let present: Vec<f64> = values[start..=idx].iter().flatten().copied().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect()
}

fn grouped_rolling_mean(
    records: &[PlayerMatchRecord],
    values: &[Option<f64>],
    window: usize,
) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for group in player_groups(records) {
        let rolled = rolling_mean(&values[group.clone()], window);
        out[group].copy_from_slice(&rolled);
    }
    out
}

/// Scores records already grouped by player and sorted by date.
///
/// Numeric gaps are forward-filled within each player before scoring.
/// `minutes_column` selects whether `rolling_minutes_3m` averages
/// `minutes_played` or falls back to the rolling rating proxy.
pub fn score_records(
    records: &[PlayerMatchRecord],
    model: &FatigueModel,
    minutes_column: bool,
) -> Vec<ScoredRecord> {
    let mut filled = records.to_vec();
    forward_fill(&mut filled);

    let days = days_since_last_match(&filled, model.baseline_rest_days);
    let ratings: Vec<Option<f64>> = filled.iter().map(|r| r.overall_rating).collect();
    let rating_rolling = grouped_rolling_mean(&filled, &ratings, ROLLING_WINDOW);
    let rolling_minutes = if minutes_column {
        let minutes: Vec<Option<f64>> = filled.iter().map(|r| r.minutes_played).collect();
        grouped_rolling_mean(&filled, &minutes, ROLLING_WINDOW)
    } else {
        grouped_rolling_mean(&filled, &rating_rolling, ROLLING_WINDOW)
            .into_iter()
            .map(|v| v.map(|x| x * MINUTES_PROXY_SCALE))
            .collect()
    };

    filled
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            let days = days[idx];
            let terms = model.recovery(days);
            let stamina_norm = record.stamina.map(normalize_attribute);
            let sprint_norm = record.sprint_speed.map(normalize_attribute);
            let fatigue_index = match (stamina_norm, sprint_norm) {
                (Some(s), Some(sp)) => Some(model.fatigue_index(s, sp, terms.recovery_factor)),
                _ => None,
            };
            let pressures =
                sprint_norm.map(|sp| ((1.0 - terms.recovery_factor) * sp * 100.0).clamp(0.0, 100.0));
            let sprints = match (record.sprint_speed, fatigue_index) {
                (Some(speed), Some(fi)) => Some((speed * fi / 2.0).clamp(0.0, 100.0)),
                _ => None,
            };
            ScoredRecord {
                record,
                rating_rolling: rating_rolling[idx],
                days_since_last_match: days,
                stamina_norm,
                sprint_norm,
                sharpness_decay: terms.sharpness_decay,
                recovery_factor: terms.recovery_factor,
                fatigue_index,
                rolling_minutes_3m: rolling_minutes[idx],
                pressures,
                sprints,
                previous_match_gap_days: days,
            }
        })
        .collect()
}

/// Sorts, fills and scores a loaded dataset in one pass.
pub fn score_dataset(mut raw: RawDataset, model: &FatigueModel) -> ScoredDataset {
    prepare(&mut raw.records);
    if raw.date_quality.is_degraded() {
        log::warn!(
            "fatigue scores are degraded: {}",
            raw.date_quality.describe()
        );
    }
    let rows = score_records(&raw.records, model, raw.minutes_column);
    log::info!(
        "scored {} rows across {} players",
        rows.len(),
        player_groups(&raw.records).len()
    );
    ScoredDataset {
        rows,
        date_quality: raw.date_quality,
        extra_columns: raw.extra_columns,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn recovery_is_zero_without_rest() {
        let model = FatigueModel::default();
        let terms = model.recovery(0.0);
        assert_eq!(terms.rec_base, 0.0);
        assert_eq!(terms.recovery_factor, 0.0);
    }

    #[test]
    fn penalty_only_after_threshold() {
        let model = FatigueModel::default();
        assert_eq!(model.layoff_penalty(10.0), 0.0);
        assert_eq!(model.layoff_penalty(30.0), 0.0);
        assert!(model.layoff_penalty(31.0) > 0.0);
        assert!(model.layoff_penalty(1.0e6) <= 0.12);
        assert!((model.layoff_penalty(1.0e6) - 0.12).abs() < 1e-9);
    }

    #[test]
    fn negative_gap_clips_to_zero_recovery() {
        let model = FatigueModel::default();
        assert_eq!(model.recovery(-5.0).recovery_factor, 0.0);
    }

    #[test]
    fn player_groups_split_on_id_change() {
        let records = vec![
            PlayerMatchRecord::new(1, None),
            PlayerMatchRecord::new(1, None),
            PlayerMatchRecord::new(2, None),
            PlayerMatchRecord::new(3, None),
            PlayerMatchRecord::new(3, None),
        ];
        assert_eq!(player_groups(&records), vec![0..2, 2..3, 3..5]);
        assert!(player_groups(&[]).is_empty());
    }

    #[test]
    fn prepare_puts_unknown_dates_last() {
        let mut records = vec![
            PlayerMatchRecord::new(2, date(2015, 1, 1)),
            PlayerMatchRecord::new(1, None),
            PlayerMatchRecord::new(1, date(2016, 3, 1)),
            PlayerMatchRecord::new(1, date(2015, 3, 1)),
        ];
        prepare(&mut records);
        let order: Vec<(i64, Option<NaiveDate>)> =
            records.iter().map(|r| (r.player_id, r.match_date)).collect();
        assert_eq!(
            order,
            vec![
                (1, date(2015, 3, 1)),
                (1, date(2016, 3, 1)),
                (1, None),
                (2, date(2015, 1, 1)),
            ]
        );
    }

    #[test]
    fn rolling_mean_uses_partial_windows() {
        let out = rolling_mean(&[Some(60.0), Some(70.0), None, Some(90.0), None, None, None], 3);
        assert_eq!(out[0], Some(60.0));
        assert_eq!(out[1], Some(65.0));
        assert_eq!(out[2], Some(65.0));
        assert_eq!(out[3], Some(80.0));
        assert_eq!(out[4], Some(90.0));
        assert_eq!(out[5], Some(90.0));
        assert_eq!(out[6], None);
    }

    #[test]
    fn unknown_dates_fall_back_to_baseline_gap() {
        let records = vec![
            PlayerMatchRecord::new(1, date(2015, 1, 1)),
            PlayerMatchRecord::new(1, date(2015, 1, 11)),
            PlayerMatchRecord::new(1, None),
        ];
        assert_eq!(days_since_last_match(&records, 7.0), vec![7.0, 10.0, 7.0]);
    }

    #[test]
    fn minutes_proxy_scales_rolling_rating() {
        let mut a = PlayerMatchRecord::new(1, date(2015, 1, 1));
        a.overall_rating = Some(60.0);
        let mut b = PlayerMatchRecord::new(1, date(2015, 1, 8));
        b.overall_rating = Some(80.0);
        let rows = score_records(&[a, b], &FatigueModel::default(), false);
        assert_eq!(rows[1].rating_rolling, Some(70.0));
        // mean(60, 70) * 0.9
        let expected = 65.0 * 0.9;
        assert!((rows[1].rolling_minutes_3m.unwrap() - expected).abs() < 1e-12);
    }
}
