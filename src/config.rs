use std::env;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::dataset::parse_date;

pub const DEFAULT_DATA_PATH: &str = "data/final/cleaned_player_data.csv";
pub const DEFAULT_PREDICTIONS_PATH: &str = "ML-deliverables/predictions.csv";
pub const DEFAULT_SHAP_PATH: &str = "ML-deliverables/shap_values.csv";
pub const DEFAULT_FATIGUE_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub predictions_path: PathBuf,
    pub shap_path: PathBuf,
    pub model_path: Option<PathBuf>,
    pub fatigue_threshold: f64,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            predictions_path: PathBuf::from(DEFAULT_PREDICTIONS_PATH),
            shap_path: PathBuf::from(DEFAULT_SHAP_PATH),
            model_path: None,
            fatigue_threshold: DEFAULT_FATIGUE_THRESHOLD,
            date_from: None,
            date_to: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
                .map(PathBuf::from)
        };
        let defaults = Self::default();
        Self {
            data_path: path("FATIGUE_DATA_PATH").unwrap_or(defaults.data_path),
            predictions_path: path("FATIGUE_PREDICTIONS_PATH")
                .unwrap_or(defaults.predictions_path),
            shap_path: path("FATIGUE_SHAP_PATH").unwrap_or(defaults.shap_path),
            model_path: path("FATIGUE_MODEL_PATH"),
            fatigue_threshold: lookup("FATIGUE_THRESHOLD")
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(defaults.fatigue_threshold),
            date_from: lookup("FATIGUE_DATE_FROM").and_then(|raw| parse_date(&raw)),
            date_to: lookup("FATIGUE_DATE_TO").and_then(|raw| parse_date(&raw)),
        }
    }
}

pub fn load_env_files() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn init_logging(default_level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .try_init();
}

/// Value of `--name=value` or `--name value` in `args`.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let flag = format!("--{name}");
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

pub fn arg_path(args: &[String], name: &str) -> Option<PathBuf> {
    arg_value(args, name).map(PathBuf::from)
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    let flag = format!("--{name}");
    args.iter().any(|arg| *arg == flag)
}
