use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use fatigue_terminal::config;
use fatigue_terminal::dataset;
use fatigue_terminal::fatigue::player_groups;
use fatigue_terminal::source_db;

const DEFAULT_OUT: &str = "data/processed/player_attributes.csv";

fn main() -> Result<()> {
    config::load_env_files();
    config::init_logging("info");
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let db_path = config::arg_path(&args, "db").unwrap_or_else(source_db::default_db_path);
    if !db_path.exists() {
        return Err(anyhow!("sqlite database not found at {}", db_path.display()));
    }
    let out_path = config::arg_path(&args, "out").unwrap_or_else(|| PathBuf::from(DEFAULT_OUT));

    let conn = source_db::open_db(&db_path)?;
    if config::has_flag(&args, "list-tables") {
        println!("Tables in {}:", db_path.display());
        for name in source_db::list_tables(&conn)? {
            println!("  {name}");
        }
    }

    let raw = source_db::load_player_attributes(&conn)
        .with_context(|| format!("extract player attributes from {}", db_path.display()))?;
    if raw.date_quality.is_degraded() {
        log::warn!("{}", raw.date_quality.describe());
    }
    dataset::write_records(&out_path, &raw.records)?;

    println!("Player dataset written");
    println!("DB: {}", db_path.display());
    println!("Out: {}", out_path.display());
    println!(
        "Rows: {} players={}",
        raw.records.len(),
        player_groups(&raw.records).len()
    );
    Ok(())
}
