//! Summary statistics over numeric columns.
//!
//! [`ColumnStats`] accumulates values one at a time and answers count,
//! mean, median, min, max, sample standard deviation, and linear-interpolated
//! percentiles. It backs both the grouped views and `describe`.

use serde::Serialize;

use crate::filter::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Count,
    Mean,
    Median,
    Min,
    Max,
}

impl Statistic {
    pub fn label(self) -> &'static str {
        match self {
            Statistic::Count => "count",
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Min => "min",
            Statistic::Max => "max",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnStats {
    values: Vec<f64>,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl ColumnStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut stats = Self::new();
        for value in values {
            stats.add_value(value);
        }
        stats
    }

    pub fn add_value(&mut self, value: f64) {
        self.sum += value;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
        self.values.push(value);
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.values.len() as f64)
        }
    }

    pub fn median(&self) -> Option<f64> {
        self.percentile(0.5)
    }

    /// Sample standard deviation (n - 1 denominator).
    pub fn std_dev(&self) -> Option<f64> {
        let count = self.values.len();
        if count < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / (count as f64 - 1.0);
        Some(variance.max(0.0).sqrt())
    }

    /// Percentile `q` in `[0, 1]` with linear interpolation between closest ranks.
    pub fn percentile(&self, q: f64) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
        let lower = position.floor() as usize;
        let upper = position.ceil() as usize;
        let weight = position - lower as f64;
        Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
    }

    pub fn statistic(&self, stat: Statistic) -> Option<f64> {
        match stat {
            Statistic::Count => Some(self.count() as f64),
            Statistic::Mean => self.mean(),
            Statistic::Median => self.median(),
            Statistic::Min => self.min(),
            Statistic::Max => self.max(),
        }
    }
}

/// One row of a `describe` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericDescription {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Count, mean, spread, and quartiles for every numeric column of the selection.
pub fn describe(selection: &Selection<'_>) -> Vec<NumericDescription> {
    let dataset = selection.dataset();
    dataset
        .schema()
        .kinds()
        .iter()
        .enumerate()
        .filter(|(_, kind)| **kind == crate::schema::FieldKind::Numeric)
        .map(|(column, _)| {
            let stats = ColumnStats::from_values(selection.numbers(column));
            NumericDescription {
                column: dataset.headers()[column].clone(),
                count: stats.count(),
                mean: stats.mean(),
                std_dev: stats.std_dev(),
                min: stats.min(),
                p25: stats.percentile(0.25),
                median: stats.median(),
                p75: stats.percentile(0.75),
                max: stats.max(),
            }
        })
        .collect()
}

/// Absent-cell count for every column of the selection that has any.
pub fn missing_counts(selection: &Selection<'_>) -> Vec<(String, usize)> {
    let dataset = selection.dataset();
    dataset
        .headers()
        .iter()
        .enumerate()
        .filter_map(|(column, name)| {
            let missing = selection
                .rows()
                .iter()
                .filter(|&&row| dataset.cell(row, column).is_none())
                .count();
            (missing > 0).then(|| (name.clone(), missing))
        })
        .collect()
}

/// Renders a statistic for aligned table output.
pub fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{v:.0}"),
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => String::new(),
    }
}
