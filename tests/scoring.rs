use chrono::NaiveDate;

use fatigue_terminal::fatigue::{
    FatigueModel, days_since_last_match, normalize_attribute, prepare, score_records,
};
use fatigue_terminal::record::PlayerMatchRecord;

fn day(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn record(player_id: i64, date: Option<NaiveDate>, stamina: f64, sprint: f64) -> PlayerMatchRecord {
    PlayerMatchRecord {
        stamina: Some(stamina),
        sprint_speed: Some(sprint),
        overall_rating: Some(70.0),
        ..PlayerMatchRecord::new(player_id, date)
    }
}

#[test]
fn recovery_is_zero_right_after_a_match() {
    let terms = FatigueModel::default().recovery(0.0);
    assert_eq!(terms.rec_base, 0.0);
    assert_eq!(terms.recovery_factor, 0.0);
}

#[test]
fn recovery_peaks_at_thirty_days() {
    let model = FatigueModel::default();
    let terms = model.recovery(30.0);
    assert_eq!(terms.penalty, 0.0);
    assert!((terms.sharpness_decay - 1.0).abs() < 1e-12);
    let expected = 1.0 - (-30.0_f64 / 7.0).exp();
    assert!((terms.recovery_factor - expected).abs() < 1e-12);
    assert!(model.recovery(20.0).recovery_factor < terms.recovery_factor);
    assert!(model.recovery(45.0).recovery_factor < terms.recovery_factor);
}

#[test]
fn long_layoff_decays_to_zero() {
    let terms = FatigueModel::default().recovery(10_000.0);
    assert!(terms.recovery_factor >= 0.0);
    assert!(terms.recovery_factor < 1e-9);
    assert!(terms.penalty > 0.11 && terms.penalty <= 0.12);
}

#[test]
fn weekly_rest_composes_all_terms() {
    let terms = FatigueModel::default().recovery(7.0);
    let rec_base = 1.0 - (-1.0_f64).exp();
    let sharpness = (-(23.0_f64 * 23.0) / (2.0 * 40.0 * 40.0)).exp();
    assert!((terms.rec_base - rec_base).abs() < 1e-12);
    assert_eq!(terms.penalty, 0.0);
    assert!((terms.sharpness_decay - sharpness).abs() < 1e-12);
    assert!((terms.recovery_factor - rec_base * sharpness).abs() < 1e-12);
}

#[test]
fn fatigue_falls_as_stamina_rises() {
    let model = FatigueModel::default();
    let tired = model.fatigue_index(normalize_attribute(40.0), 0.7, 0.5);
    let fresh = model.fatigue_index(normalize_attribute(90.0), 0.7, 0.5);
    assert!(tired > fresh);
}

#[test]
fn fatigue_stays_in_unit_interval() {
    let model = FatigueModel::default();
    for stamina in [0.0, 25.0, 50.0, 100.0, 140.0] {
        for sprint in [0.0, 60.0, 100.0, 250.0] {
            for days in [0.0, 3.0, 7.0, 30.0, 400.0, 10_000.0] {
                let r = model.recovery(days).recovery_factor;
                let fi = model.fatigue_index(
                    normalize_attribute(stamina),
                    normalize_attribute(sprint),
                    r,
                );
                assert!((0.0..=1.0).contains(&fi), "fi={fi} s={stamina} sp={sprint} d={days}");
            }
        }
    }
}

#[test]
fn single_record_gets_baseline_gap() {
    let records = vec![record(1, day(2015, 3, 1), 70.0, 80.0)];
    let rows = score_records(&records, &FatigueModel::default(), false);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].days_since_last_match, 7.0);
    assert_eq!(rows[0].previous_match_gap_days, 7.0);
}

#[test]
fn same_day_records_have_no_recovery() {
    let records = vec![
        record(1, day(2015, 4, 4), 70.0, 80.0),
        record(1, day(2015, 4, 4), 50.0, 0.0),
    ];
    let rows = score_records(&records, &FatigueModel::default(), false);
    assert_eq!(rows[1].days_since_last_match, 0.0);
    assert_eq!(rows[1].recovery_factor, 0.0);
    // 0.5 * (1 - 0.5) + 0.3 * 0 + 0.2 * 1
    assert!((rows[1].fatigue_index.unwrap() - 0.45).abs() < 1e-12);
    assert_eq!(rows[1].pressures, Some(0.0));
}

#[test]
fn gaps_restart_for_each_player() {
    let mut records = vec![
        record(2, day(2015, 1, 20), 60.0, 60.0),
        record(1, day(2015, 1, 11), 70.0, 80.0),
        record(1, day(2015, 1, 1), 70.0, 80.0),
        record(2, day(2015, 1, 1), 60.0, 60.0),
    ];
    prepare(&mut records);
    let days = days_since_last_match(&records, 7.0);
    assert_eq!(days, vec![7.0, 10.0, 7.0, 19.0]);
}

#[test]
fn unknown_dates_sort_last_and_use_baseline() {
    let mut records = vec![
        record(1, None, 70.0, 80.0),
        record(1, day(2015, 1, 1), 70.0, 80.0),
        record(1, day(2015, 1, 4), 70.0, 80.0),
    ];
    prepare(&mut records);
    assert_eq!(records[2].match_date, None);
    assert_eq!(days_since_last_match(&records, 7.0), vec![7.0, 3.0, 7.0]);
}

#[test]
fn forward_fill_does_not_cross_players() {
    let mut second = record(2, day(2015, 1, 1), 0.0, 75.0);
    second.stamina = None;
    let mut later = record(1, day(2015, 1, 8), 0.0, 80.0);
    later.stamina = None;
    let records = vec![record(1, day(2015, 1, 1), 70.0, 80.0), later, second];

    let rows = score_records(&records, &FatigueModel::default(), false);
    assert_eq!(rows[1].record.stamina, Some(70.0));
    assert!(rows[1].fatigue_index.is_some());
    assert_eq!(rows[2].record.stamina, None);
    assert_eq!(rows[2].stamina_norm, None);
    assert_eq!(rows[2].fatigue_index, None);
    assert!(rows[2].pressures.is_some());
}

#[test]
fn rolling_minutes_falls_back_to_rating_proxy() {
    let records: Vec<PlayerMatchRecord> = [60.0, 70.0, 80.0]
        .into_iter()
        .enumerate()
        .map(|(idx, rating)| PlayerMatchRecord {
            overall_rating: Some(rating),
            ..record(1, day(2015, 1, 1 + idx as u32 * 7), 70.0, 80.0)
        })
        .collect();
    let rows = score_records(&records, &FatigueModel::default(), false);
    let rolling: Vec<f64> = rows.iter().filter_map(|r| r.rating_rolling).collect();
    assert_eq!(rolling, vec![60.0, 65.0, 70.0]);
    let minutes: Vec<f64> = rows.iter().filter_map(|r| r.rolling_minutes_3m).collect();
    for (got, want) in minutes.iter().zip([54.0, 56.25, 58.5]) {
        assert!((got - want).abs() < 1e-9, "{got} != {want}");
    }
}

#[test]
fn rolling_minutes_uses_minutes_column_when_present() {
    let records: Vec<PlayerMatchRecord> = [90.0, 60.0, 30.0, 0.0]
        .into_iter()
        .enumerate()
        .map(|(idx, minutes)| PlayerMatchRecord {
            minutes_played: Some(minutes),
            ..record(1, day(2015, 2, 1 + idx as u32 * 4), 70.0, 80.0)
        })
        .collect();
    let rows = score_records(&records, &FatigueModel::default(), true);
    let minutes: Vec<f64> = rows.iter().filter_map(|r| r.rolling_minutes_3m).collect();
    assert_eq!(minutes, vec![90.0, 75.0, 60.0, 30.0]);
}

#[test]
fn load_proxies_follow_fatigue() {
    let records = vec![record(1, day(2015, 1, 1), 50.0, 80.0)];
    let model = FatigueModel::default();
    let row = &score_records(&records, &model, false)[0];
    let r = row.recovery_factor;
    let fi = row.fatigue_index.unwrap();
    assert!((row.pressures.unwrap() - (1.0 - r) * 0.8 * 100.0).abs() < 1e-9);
    assert!((row.sprints.unwrap() - 80.0 * fi / 2.0).abs() < 1e-9);
    assert!((fi - model.fatigue_index(0.5, 0.8, r)).abs() < 1e-12);
}
