use chrono::{Duration, NaiveDate};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use fatigue_terminal::dashboard::DashboardData;
use fatigue_terminal::dataset::{read_records, write_scored_to};
use fatigue_terminal::fatigue::{FatigueModel, prepare, score_dataset, score_records};
use fatigue_terminal::record::{PlayerMatchRecord, ScoredDataset};
use fatigue_terminal::summary::feature_summary;

const PLAYERS: i64 = 500;
const MATCHES_PER_PLAYER: i64 = 20;

fn synthetic_records() -> Vec<PlayerMatchRecord> {
    let start = NaiveDate::from_ymd_opt(2010, 8, 1).unwrap();
    let mut out = Vec::with_capacity((PLAYERS * MATCHES_PER_PLAYER) as usize);
    for player in 0..PLAYERS {
        let mut date = start;
        for idx in 0..MATCHES_PER_PLAYER {
            date += Duration::days(3 + (player + idx) % 40);
            let base = 50.0 + ((player * 7 + idx * 3) % 45) as f64;
            out.push(PlayerMatchRecord {
                player_name: Some(format!("Player {player}")),
                stamina: (idx % 9 != 0).then_some(base),
                sprint_speed: Some(100.0 - base / 2.0),
                overall_rating: Some(base + 5.0),
                strength: Some(base),
                agility: Some(base - 3.0),
                reactions: Some(base + 1.0),
                potential: Some(base + 10.0),
                ..PlayerMatchRecord::new(player, Some(date))
            });
        }
    }
    out
}

fn bench_score_records(c: &mut Criterion) {
    let mut records = synthetic_records();
    prepare(&mut records);
    let model = FatigueModel::default();
    c.bench_function("score_records_10k", |b| {
        b.iter(|| {
            let rows = score_records(black_box(&records), &model, false);
            black_box(rows.len());
        })
    });
}

fn bench_csv_pipeline(c: &mut Criterion) {
    let mut records = synthetic_records();
    prepare(&mut records);
    let scored = ScoredDataset {
        rows: score_records(&records, &FatigueModel::default(), false),
        ..ScoredDataset::default()
    };
    let mut scored_csv = Vec::new();
    write_scored_to(&mut scored_csv, &scored).unwrap();

    c.bench_function("read_score_summarize_csv", |b| {
        b.iter(|| {
            let raw = read_records(black_box(scored_csv.as_slice())).unwrap();
            let scored = score_dataset(raw, &FatigueModel::default());
            black_box(feature_summary(&scored));
        })
    });

    c.bench_function("dashboard_top_fatigued", |b| {
        let data = DashboardData::read(scored_csv.as_slice()).unwrap();
        b.iter(|| {
            let top = data.top_fatigued(black_box(10));
            black_box(top.len());
        })
    });
}

criterion_group!(perf, bench_score_records, bench_csv_pipeline);
criterion_main!(perf);
