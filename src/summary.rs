use crate::record::ScoredDataset;

pub const ENGINEERED_FEATURES: [&str; 5] = [
    "fatigue_index",
    "rolling_minutes_3m",
    "pressures",
    "sprints",
    "previous_match_gap_days",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    // Sample standard deviation (n - 1); NaN for a single value.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

pub fn describe<I>(values: I) -> Option<Describe>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut xs: Vec<f64> = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    if xs.is_empty() {
        return None;
    }
    xs.sort_by(|a, b| a.total_cmp(b));

    let n = xs.len();
    let mean = xs.iter().sum::<f64>() / n as f64;
    let std = if n > 1 {
        let ss: f64 = xs.iter().map(|x| (x - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };

    Some(Describe {
        count: n,
        mean,
        std,
        min: xs[0],
        q25: quantile(&xs, 0.25),
        q50: quantile(&xs, 0.50),
        q75: quantile(&xs, 0.75),
        max: xs[n - 1],
    })
}

/// Linear-interpolated quantile over sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn feature_summary(dataset: &ScoredDataset) -> Vec<(&'static str, Option<Describe>)> {
    ENGINEERED_FEATURES
        .iter()
        .map(|name| (*name, describe(dataset.column(name))))
        .collect()
}

pub fn format_summary(rows: &[(&str, Option<Describe>)]) -> String {
    let mut out = format!(
        "{:<24}{:>9}{:>9}{:>9}{:>9}{:>9}{:>9}{:>9}{:>9}\n",
        "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for (name, stats) in rows {
        match stats {
            Some(d) => out.push_str(&format!(
                "{:<24}{:>9}{:>9.2}{:>9.2}{:>9.2}{:>9.2}{:>9.2}{:>9.2}{:>9.2}\n",
                name, d.count, d.mean, d.std, d.min, d.q25, d.q50, d.q75, d.max
            )),
            None => out.push_str(&format!("{name:<24}{:>9}\n", 0)),
        }
    }
    out
}
