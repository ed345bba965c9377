use chrono::NaiveDate;

pub const ATTRIBUTE_COLUMNS: [&str; 7] = [
    "stamina",
    "sprint_speed",
    "overall_rating",
    "strength",
    "agility",
    "reactions",
    "potential",
];

pub const DERIVED_COLUMNS: [&str; 11] = [
    "rating_rolling",
    "days_since_last_match",
    "stamina_norm",
    "sprint_norm",
    "sharpness_decay",
    "recovery_factor",
    "fatigue_index",
    "rolling_minutes_3m",
    "pressures",
    "sprints",
    "previous_match_gap_days",
];

/// One observation of a player's attributes on a given date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerMatchRecord {
    pub player_id: i64,
    pub player_name: Option<String>,
    pub match_date: Option<NaiveDate>,
    pub stamina: Option<f64>,
    pub sprint_speed: Option<f64>,
    pub overall_rating: Option<f64>,
    pub strength: Option<f64>,
    pub agility: Option<f64>,
    pub reactions: Option<f64>,
    pub potential: Option<f64>,
    pub minutes_played: Option<f64>,
    // Raw cells of columns outside the known schema, aligned with the
    // dataset's `extra_columns`.
    pub extra: Vec<String>,
}

impl PlayerMatchRecord {
    pub fn new(player_id: i64, match_date: Option<NaiveDate>) -> Self {
        Self {
            player_id,
            match_date,
            ..Default::default()
        }
    }

    pub fn attribute(&self, column: &str) -> Option<f64> {
        match column {
            "stamina" => self.stamina,
            "sprint_speed" => self.sprint_speed,
            "overall_rating" => self.overall_rating,
            "strength" => self.strength,
            "agility" => self.agility,
            "reactions" => self.reactions,
            "potential" => self.potential,
            "minutes_played" => self.minutes_played,
            _ => None,
        }
    }

    pub fn display_name(&self) -> String {
        match self.player_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.player_id.to_string(),
        }
    }

    /// Fills every missing numeric attribute from `prev`.
    pub fn fill_missing_from(&mut self, prev: &PlayerMatchRecord) {
        fill(&mut self.stamina, prev.stamina);
        fill(&mut self.sprint_speed, prev.sprint_speed);
        fill(&mut self.overall_rating, prev.overall_rating);
        fill(&mut self.strength, prev.strength);
        fill(&mut self.agility, prev.agility);
        fill(&mut self.reactions, prev.reactions);
        fill(&mut self.potential, prev.potential);
        fill(&mut self.minutes_played, prev.minutes_played);
    }
}

fn fill(slot: &mut Option<f64>, prev: Option<f64>) {
    if slot.is_none() {
        *slot = prev;
    }
}

/// A record after forward-fill, augmented with recovery and fatigue fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: PlayerMatchRecord,
    pub rating_rolling: Option<f64>,
    pub days_since_last_match: f64,
    pub stamina_norm: Option<f64>,
    pub sprint_norm: Option<f64>,
    pub sharpness_decay: f64,
    pub recovery_factor: f64,
    pub fatigue_index: Option<f64>,
    pub rolling_minutes_3m: Option<f64>,
    pub pressures: Option<f64>,
    pub sprints: Option<f64>,
    pub previous_match_gap_days: f64,
}

impl ScoredRecord {
    /// Looks up a raw or derived numeric column by name.
    pub fn value(&self, column: &str) -> Option<f64> {
        match column {
            "player_id" => Some(self.record.player_id as f64),
            "rating_rolling" => self.rating_rolling,
            "days_since_last_match" => Some(self.days_since_last_match),
            "stamina_norm" => self.stamina_norm,
            "sprint_norm" => self.sprint_norm,
            "sharpness_decay" => Some(self.sharpness_decay),
            "recovery_factor" => Some(self.recovery_factor),
            "fatigue_index" => self.fatigue_index,
            "rolling_minutes_3m" => self.rolling_minutes_3m,
            "pressures" => self.pressures,
            "sprints" => self.sprints,
            "previous_match_gap_days" => Some(self.previous_match_gap_days),
            other => self.record.attribute(other),
        }
    }
}

/// How trustworthy the date ordering behind a dataset is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateQuality {
    #[default]
    Observed,
    // No date column at all; dates were generated from row order.
    Synthetic,
    Partial {
        missing: usize,
    },
}

impl DateQuality {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, DateQuality::Observed)
    }

    pub fn describe(&self) -> String {
        match self {
            DateQuality::Observed => "dates observed".to_string(),
            DateQuality::Synthetic => {
                "no date column; synthetic weekly dates from row order".to_string()
            }
            DateQuality::Partial { missing } => {
                format!("{missing} rows with missing or unparseable dates")
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    pub records: Vec<PlayerMatchRecord>,
    pub date_quality: DateQuality,
    // Whether the source carried a minutes_played column.
    pub minutes_column: bool,
    pub extra_columns: Vec<String>,
    // Rows dropped on load because their player_id was unusable.
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScoredDataset {
    pub rows: Vec<ScoredRecord>,
    pub date_quality: DateQuality,
    pub extra_columns: Vec<String>,
}

impl ScoredDataset {
    pub fn column(&self, name: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.value(name)).collect()
    }
}
