use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};

use crate::dataset::parse_date;
use crate::fatigue;
use crate::record::{DateQuality, PlayerMatchRecord, RawDataset};

const PLAYER_ATTRIBUTES_QUERY: &str = r#"
    SELECT
        pa.player_api_id AS player_id,
        p.player_name,
        pa.date,
        pa.overall_rating,
        pa.potential,
        pa.stamina,
        pa.strength,
        pa.sprint_speed,
        pa.agility,
        pa.reactions
    FROM Player_Attributes pa
    JOIN Player p ON pa.player_api_id = p.player_api_id
"#;

pub fn default_db_path() -> PathBuf {
    PathBuf::from("database.sqlite")
}

pub fn open_db(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("open sqlite db {}", path.display()))
}

pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .context("prepare table listing")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query table listing")?;
    let mut out = Vec::new();
    for name in rows {
        out.push(name.context("read table name")?);
    }
    Ok(out)
}

/// Reads every attribute snapshot joined to its player, sorted by player and date.
pub fn load_player_attributes(conn: &Connection) -> Result<RawDataset> {
    let mut stmt = conn
        .prepare(PLAYER_ATTRIBUTES_QUERY)
        .context("prepare player attributes query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                [
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, Option<f64>>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                    row.get::<_, Option<f64>>(8)?,
                    row.get::<_, Option<f64>>(9)?,
                ],
            ))
        })
        .context("query player attributes")?;

    let mut records = Vec::new();
    let mut missing_dates = 0usize;
    for row in rows {
        let (player_id, player_name, raw_date, attrs) = row.context("read player attributes row")?;
        let [overall_rating, potential, stamina, strength, sprint_speed, agility, reactions] =
            attrs.map(|v| v.filter(|x| x.is_finite()));
        let match_date = raw_date.as_deref().and_then(parse_date);
        if match_date.is_none() {
            missing_dates += 1;
        }
        records.push(PlayerMatchRecord {
            player_id,
            player_name,
            match_date,
            stamina,
            sprint_speed,
            overall_rating,
            strength,
            agility,
            reactions,
            potential,
            minutes_played: None,
            extra: Vec::new(),
        });
    }
    fatigue::prepare(&mut records);

    let date_quality = if missing_dates > 0 {
        DateQuality::Partial {
            missing: missing_dates,
        }
    } else {
        DateQuality::Observed
    };
    Ok(RawDataset {
        records,
        date_quality,
        ..RawDataset::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(
            r#"
            CREATE TABLE Player (player_api_id INTEGER PRIMARY KEY, player_name TEXT);
            CREATE TABLE Player_Attributes (
                id INTEGER PRIMARY KEY,
                player_api_id INTEGER,
                date TEXT,
                overall_rating INTEGER,
                potential INTEGER,
                stamina REAL,
                strength INTEGER,
                sprint_speed INTEGER,
                agility INTEGER,
                reactions INTEGER
            );
            INSERT INTO Player VALUES (10, 'Alpha'), (20, 'Beta');
            INSERT INTO Player_Attributes VALUES
                (1, 20, '2015-09-21 00:00:00', 70, 75, 60, 65, 80, 70, 68),
                (2, 10, '2016-02-18 00:00:00', 67, 71, 54, 76, 64, 59, 47),
                (3, 10, '2015-11-19 00:00:00', 67, 71, NULL, 76, 64, 59, 47);
            "#,
        )
        .expect("seed schema");
        conn
    }

    #[test]
    fn lists_tables_by_name() {
        let conn = seeded();
        assert_eq!(list_tables(&conn).unwrap(), vec!["Player", "Player_Attributes"]);
    }

    #[test]
    fn loads_joined_rows_sorted() {
        let conn = seeded();
        let data = load_player_attributes(&conn).unwrap();
        assert_eq!(data.date_quality, DateQuality::Observed);
        let ids: Vec<i64> = data.records.iter().map(|r| r.player_id).collect();
        assert_eq!(ids, vec![10, 10, 20]);
        assert_eq!(data.records[0].stamina, None);
        assert_eq!(data.records[1].stamina, Some(54.0));
        assert_eq!(data.records[2].player_name.as_deref(), Some("Beta"));
        assert_eq!(data.records[2].sprint_speed, Some(80.0));
    }
}
