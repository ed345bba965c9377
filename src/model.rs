use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::record::{ScoredDataset, ScoredRecord};

pub const FEATURE_NAMES: [&str; 13] = [
    "sharpness_decay",
    "sprint_speed",
    "potential",
    "rating_rolling",
    "stamina",
    "days_since_last_match",
    "sprint_norm",
    "strength",
    "overall_rating",
    "reactions",
    "agility",
    "recovery_factor",
    "stamina_norm",
];

/// Model inputs for one player's latest record, in `FEATURE_NAMES` order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureVector(pub [f64; 13]);

impl FeatureVector {
    /// Builds the vector from a column lookup; absent values become 0.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<f64>) -> Self {
        let mut values = [0.0; 13];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
            *slot = lookup(name).filter(|v| v.is_finite()).unwrap_or(0.0);
        }
        Self(values)
    }

    pub fn from_scored(row: &ScoredRecord) -> Self {
        Self::from_lookup(|name| row.value(name))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.0[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

/// Anything that can turn a feature vector into a single prediction.
pub trait Predictor {
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    fn label(&self) -> String {
        "model".to_string()
    }
}

/// Required features absent from `columns`, in canonical order.
pub fn missing_features<'a, I>(columns: I) -> Vec<&'static str>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<&str> = columns.into_iter().collect();
    FEATURE_NAMES
        .iter()
        .copied()
        .filter(|name| !present.contains(name))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelArtifact {
    pub version: u32,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub target: Option<String>,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub feature_means: Vec<f64>,
    #[serde(default)]
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

/// Standardized linear model over a subset of the canonical features.
#[derive(Debug, Clone)]
pub struct LinearModel {
    artifact: LinearModelArtifact,
    // Position in FeatureVector for each artifact feature.
    slots: Vec<usize>,
}

impl LinearModel {
    pub fn from_artifact(artifact: LinearModelArtifact) -> Result<Self> {
        let n = artifact.feature_names.len();
        if artifact.coeffs.len() != n {
            bail!(
                "model has {} features but {} coefficients",
                n,
                artifact.coeffs.len()
            );
        }
        for (label, len) in [
            ("means", artifact.feature_means.len()),
            ("stds", artifact.feature_stds.len()),
        ] {
            if len != 0 && len != n {
                bail!("model has {n} features but {len} feature {label}");
            }
        }
        let slots = artifact
            .feature_names
            .iter()
            .map(|name| {
                FEATURE_NAMES
                    .iter()
                    .position(|known| known == name)
                    .ok_or_else(|| anyhow!("model uses unknown feature {name:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { artifact, slots })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read model artifact {}", path.display()))?;
        let artifact = serde_json::from_str::<LinearModelArtifact>(&raw)
            .with_context(|| format!("parse model artifact {}", path.display()))?;
        let model = Self::from_artifact(artifact)
            .with_context(|| format!("validate model artifact {}", path.display()))?;
        log::info!(
            "loaded linear model ({} features) from {}",
            model.slots.len(),
            path.display()
        );
        Ok(model)
    }

    pub fn artifact(&self) -> &LinearModelArtifact {
        &self.artifact
    }

    fn standardized(&self, raw: f64, idx: usize) -> f64 {
        let mean = self.artifact.feature_means.get(idx).copied().unwrap_or(0.0);
        let std = self
            .artifact
            .feature_stds
            .get(idx)
            .copied()
            .unwrap_or(1.0)
            .max(1e-6);
        (raw - mean) / std
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let mut sum = self.artifact.intercept;
        for (idx, (slot, coeff)) in self.slots.iter().zip(&self.artifact.coeffs).enumerate() {
            sum += coeff * self.standardized(features.0[*slot], idx);
        }
        if !sum.is_finite() {
            bail!("model produced a non-finite prediction");
        }
        Ok(sum)
    }

    fn label(&self) -> String {
        match &self.artifact.target {
            Some(target) => format!("linear v{} ({target})", self.artifact.version),
            None => format!("linear v{}", self.artifact.version),
        }
    }
}

/// Prediction for one player's most recent scored row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerPrediction {
    pub player_id: i64,
    pub player_name: String,
    pub value: f64,
}

/// Runs `predictor` on each player's latest dated row (the last row when
/// none is dated). Rows must be grouped by player, as scoring leaves them.
pub fn predict_latest(
    dataset: &ScoredDataset,
    predictor: &dyn Predictor,
) -> Result<Vec<PlayerPrediction>> {
    let mut out = Vec::new();
    let mut start = 0usize;
    while start < dataset.rows.len() {
        let player_id = dataset.rows[start].record.player_id;
        let end = dataset.rows[start..]
            .iter()
            .position(|r| r.record.player_id != player_id)
            .map_or(dataset.rows.len(), |len| start + len);
        let group = &dataset.rows[start..end];
        let latest = group
            .iter()
            .rev()
            .find(|r| r.record.match_date.is_some())
            .or_else(|| group.last());
        if let Some(row) = latest {
            let value = predictor
                .predict(&FeatureVector::from_scored(row))
                .with_context(|| format!("predict player {player_id}"))?;
            out.push(PlayerPrediction {
                player_id,
                player_name: row.record.display_name(),
                value,
            });
        }
        start = end;
    }
    Ok(out)
}

pub fn write_predictions(path: &Path, predictions: &[PlayerPrediction]) -> Result<()> {
    crate::dataset::write_atomic(path, |file| write_predictions_to(file, predictions))
}

pub fn write_predictions_to<W: std::io::Write>(
    out: W,
    predictions: &[PlayerPrediction],
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(["player_id", "player_name", "predicted"])
        .context("write predictions header")?;
    for p in predictions {
        writer
            .write_record([p.player_id.to_string(), p.player_name.clone(), p.value.to_string()])
            .context("write prediction row")?;
    }
    writer.flush().context("flush predictions csv")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(names: &[&str], coeffs: &[f64]) -> LinearModelArtifact {
        LinearModelArtifact {
            version: 1,
            generated_at: "t".into(),
            target: None,
            feature_names: names.iter().map(|s| s.to_string()).collect(),
            feature_means: Vec::new(),
            feature_stds: Vec::new(),
            coeffs: coeffs.to_vec(),
            intercept: 0.5,
        }
    }

    #[test]
    fn feature_vector_zero_fills() {
        let fv = FeatureVector::from_lookup(|name| match name {
            "stamina" => Some(70.0),
            "agility" => Some(f64::NAN),
            _ => None,
        });
        assert_eq!(fv.get("stamina"), Some(70.0));
        assert_eq!(fv.get("agility"), Some(0.0));
        assert_eq!(fv.get("unknown"), None);
        assert_eq!(fv.iter().count(), 13);
    }

    #[test]
    fn rejects_unknown_features() {
        let err = LinearModel::from_artifact(artifact(&["shoe_size"], &[1.0])).unwrap_err();
        assert!(err.to_string().contains("shoe_size"));
    }

    #[test]
    fn rejects_coefficient_mismatch() {
        assert!(LinearModel::from_artifact(artifact(&["stamina"], &[1.0, 2.0])).is_err());
    }

    #[test]
    fn missing_features_in_canonical_order() {
        let missing = missing_features(["stamina", "sprint_speed", "agility"]);
        assert_eq!(missing.len(), 10);
        assert_eq!(missing[0], "sharpness_decay");
        assert!(!missing.contains(&"stamina"));
    }
}
