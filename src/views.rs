//! Aggregate views over a filtered selection.
//!
//! Every function here is pure over a [`Selection`] and its parameters. Views
//! whose input is too small to summarize return
//! [`ViewOutcome::InsufficientData`] instead of a degenerate result.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use log::debug;
use serde::Serialize;

use crate::{
    data::Value,
    filter::Selection,
    schema::FieldKind,
    stats::{ColumnStats, Statistic},
};

/// Scatter-style views need more than this many points.
pub const MIN_SCATTER_ROWS: usize = 10;
/// Bar-style views keep only groups with more than this many rows.
pub const MIN_GROUP_ROWS: usize = 10;
pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum ViewOutcome<T> {
    Ready(T),
    /// The view needed more than `required_more_than` rows but saw `actual`.
    InsufficientData {
        required_more_than: usize,
        actual: usize,
    },
}

impl<T> ViewOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ViewOutcome::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewOutcome::Ready(view) => Some(view),
            ViewOutcome::InsufficientData { .. } => None,
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            ViewOutcome::Ready(view) => Some(view),
            ViewOutcome::InsufficientData { .. } => None,
        }
    }
}

/// Wraps `view` unless `actual` fails to exceed `required_more_than`.
pub fn require_more_than<T>(required_more_than: usize, actual: usize, view: T) -> ViewOutcome<T> {
    if actual > required_more_than {
        ViewOutcome::Ready(view)
    } else {
        insufficient(required_more_than, actual)
    }
}

fn insufficient<T>(required_more_than: usize, actual: usize) -> ViewOutcome<T> {
    debug!("Insufficient data: {actual} row(s), need more than {required_more_than}");
    ViewOutcome::InsufficientData {
        required_more_than,
        actual,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measure {
    pub field: String,
    pub stats: Vec<Statistic>,
}

impl Measure {
    pub fn new(field: &str, stats: &[Statistic]) -> Self {
        Self {
            field: field.to_string(),
            stats: stats.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    Descending { field: String, stat: Statistic },
    Ascending { field: String, stat: Statistic },
    KeyAscending,
}

impl GroupOrder {
    pub fn descending(field: &str, stat: Statistic) -> Self {
        GroupOrder::Descending {
            field: field.to_string(),
            stat,
        }
    }

    pub fn ascending(field: &str, stat: Statistic) -> Self {
        GroupOrder::Ascending {
            field: field.to_string(),
            stat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSpec {
    pub key: String,
    pub measures: Vec<Measure>,
    pub order: GroupOrder,
    pub top: Option<usize>,
    /// The view needs more than this many rows with a present key.
    pub min_rows: usize,
    /// Groups with this many rows or fewer are dropped.
    pub min_group_rows: Option<usize>,
}

impl GroupSpec {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            measures: Vec::new(),
            order: GroupOrder::KeyAscending,
            top: None,
            min_rows: 0,
            min_group_rows: None,
        }
    }

    pub fn measure(mut self, field: &str, stats: &[Statistic]) -> Self {
        self.measures.push(Measure::new(field, stats));
        self
    }

    pub fn order(mut self, order: GroupOrder) -> Self {
        self.order = order;
        self
    }

    pub fn top(mut self, n: usize) -> Self {
        self.top = Some(n);
        self
    }

    pub fn min_rows(mut self, threshold: usize) -> Self {
        self.min_rows = threshold;
        self
    }

    pub fn min_group_rows(mut self, threshold: usize) -> Self {
        self.min_group_rows = Some(threshold);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryColumn {
    pub field: String,
    pub stat: Statistic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub key: Value,
    pub rows: usize,
    /// One entry per [`GroupSummary::columns`].
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub columns: Vec<SummaryColumn>,
    pub groups: Vec<GroupRow>,
}

impl GroupSummary {
    pub fn column_index(&self, field: &str, stat: Statistic) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.field == field && c.stat == stat)
    }

    pub fn value(&self, group: usize, field: &str, stat: Statistic) -> Option<f64> {
        let column = self.column_index(field, stat)?;
        self.groups.get(group)?.values.get(column).copied().flatten()
    }

    pub fn keys(&self) -> Vec<&Value> {
        self.groups.iter().map(|g| &g.key).collect()
    }

    fn sort_by_column(&mut self, column: usize, descending: bool) {
        self.groups.sort_by(|a, b| {
            let ordering = match (a.values[column], b.values[column]) {
                (Some(x), Some(y)) => {
                    if descending {
                        y.total_cmp(&x)
                    } else {
                        x.total_cmp(&y)
                    }
                }
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            ordering.then_with(|| a.key.cmp(&b.key))
        });
    }

    /// Headers and display rows for the aligned table renderer.
    pub fn to_table(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let mut headers = vec![self.key.clone(), "rows".to_string()];
        headers.extend(
            self.columns
                .iter()
                .map(|c| format!("{}_{}", c.field, c.stat.label())),
        );
        let rows = self
            .groups
            .iter()
            .map(|group| {
                let mut row = vec![group.key.as_display(), group.rows.to_string()];
                row.extend(group.values.iter().map(|v| crate::stats::format_metric(*v)));
                row
            })
            .collect();
        (headers, rows)
    }
}

/// Groups the selection by `spec.key` and summarizes each measure per group.
///
/// Rows with an absent key are skipped. Groups tie-break by key ascending.
pub fn group_summary(
    selection: &Selection<'_>,
    spec: &GroupSpec,
) -> Result<ViewOutcome<GroupSummary>> {
    let dataset = selection.dataset();
    let schema = dataset.schema();
    let key_column = schema.label_field(&spec.key)?;
    // Count-only measures may target any column; other statistics need numbers.
    let measure_columns = spec
        .measures
        .iter()
        .map(|m| {
            if m.stats.iter().all(|s| *s == Statistic::Count) {
                schema.column(&m.field)
            } else {
                schema.field(&m.field, FieldKind::Numeric)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let columns: Vec<SummaryColumn> = spec
        .measures
        .iter()
        .flat_map(|m| {
            m.stats.iter().map(|stat| SummaryColumn {
                field: m.field.clone(),
                stat: *stat,
            })
        })
        .collect();

    let order_column = match &spec.order {
        GroupOrder::Descending { field, stat } | GroupOrder::Ascending { field, stat } => Some(
            columns
                .iter()
                .position(|c| &c.field == field && c.stat == *stat)
                .ok_or_else(|| {
                    anyhow!(
                        "Cannot order '{}' groups by {} of '{field}': statistic not requested",
                        spec.key,
                        stat.label()
                    )
                })?,
        ),
        GroupOrder::KeyAscending => None,
    };

    let mut grouped: BTreeMap<&Value, Vec<usize>> = BTreeMap::new();
    for &row in selection.rows() {
        if let Some(key) = dataset.cell(row, key_column) {
            grouped.entry(key).or_default().push(row);
        }
    }

    let keyed_rows = grouped.values().map(Vec::len).sum::<usize>();
    if keyed_rows <= spec.min_rows {
        return Ok(insufficient(spec.min_rows, keyed_rows));
    }
    let largest_group = grouped.values().map(Vec::len).max().unwrap_or(0);
    let mut groups = Vec::with_capacity(grouped.len());
    for (key, rows) in grouped {
        if spec.min_group_rows.is_some_and(|threshold| rows.len() <= threshold) {
            continue;
        }
        let mut values = Vec::with_capacity(columns.len());
        for (measure, &column) in spec.measures.iter().zip(&measure_columns) {
            if schema.kind_at(column) == FieldKind::Numeric {
                let stats = ColumnStats::from_values(
                    rows.iter().filter_map(|&row| dataset.number(row, column)),
                );
                values.extend(measure.stats.iter().map(|stat| stats.statistic(*stat)));
            } else {
                let present = rows
                    .iter()
                    .filter(|&&row| dataset.cell(row, column).is_some())
                    .count();
                values.extend(measure.stats.iter().map(|_| Some(present as f64)));
            }
        }
        groups.push(GroupRow {
            key: key.clone(),
            rows: rows.len(),
            values,
        });
    }

    if let Some(threshold) = spec.min_group_rows {
        if groups.is_empty() {
            return Ok(insufficient(threshold, largest_group));
        }
    }

    let mut summary = GroupSummary {
        key: spec.key.clone(),
        columns,
        groups,
    };
    match (&spec.order, order_column) {
        (GroupOrder::Descending { .. }, Some(column)) => summary.sort_by_column(column, true),
        (GroupOrder::Ascending { .. }, Some(column)) => summary.sort_by_column(column, false),
        _ => {}
    }
    if let Some(n) = spec.top {
        summary.groups.truncate(n);
    }
    Ok(ViewOutcome::Ready(summary))
}

/// Orders a summary by one of its statistics, descending, and keeps the first `n` groups.
pub fn top_n(
    mut summary: GroupSummary,
    field: &str,
    stat: Statistic,
    n: usize,
) -> Result<GroupSummary> {
    let column = summary.column_index(field, stat).ok_or_else(|| {
        anyhow!(
            "Summary has no {} of '{field}' to rank by",
            stat.label()
        )
    })?;
    summary.sort_by_column(column, true);
    summary.groups.truncate(n);
    Ok(summary)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: Value,
    pub count: usize,
    pub percent: f64,
}

/// Occurrences of each distinct value, most frequent first (ties by value).
///
/// Percentages are relative to the non-absent total. `top == 0` keeps all values.
/// A field with no present values reports insufficient data.
pub fn value_counts(
    selection: &Selection<'_>,
    field: &str,
    top: usize,
) -> Result<ViewOutcome<Vec<ValueCount>>> {
    let dataset = selection.dataset();
    let column = dataset.schema().label_field(field)?;
    let mut counts: BTreeMap<&Value, usize> = BTreeMap::new();
    for &row in selection.rows() {
        if let Some(value) = dataset.cell(row, column) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return Ok(insufficient(0, 0));
    }
    let mut items = counts.into_iter().collect::<Vec<_>>();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    if top > 0 && items.len() > top {
        items.truncate(top);
    }
    Ok(ViewOutcome::Ready(
        items
            .into_iter()
            .map(|(value, count)| ValueCount {
                value: value.clone(),
                count,
                percent: (count as f64 / total as f64) * 100.0,
            })
            .collect(),
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioView {
    pub positive: String,
    pub negative: String,
    pub positive_count: usize,
    pub negative_count: usize,
    pub positive_pct: f64,
    pub negative_pct: f64,
}

/// Share of `positive` versus `negative` among rows holding either label.
///
/// With no eligible rows both percentages are zero.
pub fn ratio_view(
    selection: &Selection<'_>,
    field: &str,
    positive: &str,
    negative: &str,
) -> Result<RatioView> {
    let dataset = selection.dataset();
    let column = dataset.schema().label_field(field)?;
    let (mut positive_count, mut negative_count) = (0usize, 0usize);
    for &row in selection.rows() {
        match dataset.cell(row, column).map(Value::as_display) {
            Some(label) if label == positive => positive_count += 1,
            Some(label) if label == negative => negative_count += 1,
            _ => {}
        }
    }
    let total = positive_count + negative_count;
    let (positive_pct, negative_pct) = if total == 0 {
        (0.0, 0.0)
    } else {
        let share = positive_count as f64 / total as f64 * 100.0;
        (share, negative_count as f64 / total as f64 * 100.0)
    };
    Ok(RatioView {
        positive: positive.to_string(),
        negative: negative.to_string(),
        positive_count,
        negative_count,
        positive_pct,
        negative_pct,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterSpec {
    pub x: String,
    pub y: String,
    pub size: String,
    pub min_rows: usize,
}

impl ScatterSpec {
    pub fn new(x: &str, y: &str, size: &str) -> Self {
        Self {
            x: x.to_string(),
            y: y.to_string(),
            size: size.to_string(),
            min_rows: MIN_SCATTER_ROWS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub row: usize,
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

/// Points whose three fields are all present and strictly positive.
pub fn scatter(selection: &Selection<'_>, spec: &ScatterSpec) -> Result<ViewOutcome<Vec<ScatterPoint>>> {
    let dataset = selection.dataset();
    let schema = dataset.schema();
    let x = schema.field(&spec.x, FieldKind::Numeric)?;
    let y = schema.field(&spec.y, FieldKind::Numeric)?;
    let size = schema.field(&spec.size, FieldKind::Numeric)?;
    let positive = |row: usize, column: usize| dataset.number(row, column).filter(|v| *v > 0.0);
    let points: Vec<ScatterPoint> = selection
        .rows()
        .iter()
        .filter_map(|&row| {
            Some(ScatterPoint {
                row,
                x: positive(row, x)?,
                y: positive(row, y)?,
                size: positive(row, size)?,
            })
        })
        .collect();
    let actual = points.len();
    Ok(require_more_than(spec.min_rows, actual, points))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width bins spanning the observed range of `field`.
///
/// The last bin is closed on the right. A single distinct value yields one bin.
/// A field with no present values reports insufficient data.
pub fn histogram(
    selection: &Selection<'_>,
    field: &str,
    bins: usize,
) -> Result<ViewOutcome<Vec<HistogramBin>>> {
    let column = selection
        .dataset()
        .schema()
        .field(field, FieldKind::Numeric)?;
    let values = selection.numbers(column);
    let stats = ColumnStats::from_values(values.iter().copied());
    let (Some(min), Some(max)) = (stats.min(), stats.max()) else {
        return Ok(insufficient(0, 0));
    };
    if bins == 0 || min == max {
        return Ok(ViewOutcome::Ready(vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }]));
    }
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for value in &values {
        let idx = (((value - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Ok(ViewOutcome::Ready(
        counts
            .into_iter()
            .enumerate()
            .map(|(idx, count)| HistogramBin {
                lower: min + width * idx as f64,
                upper: if idx + 1 == bins {
                    max
                } else {
                    min + width * (idx + 1) as f64
                },
                count,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Cell,
        dataset::Dataset,
        filter::FilterPredicate,
        schema::{FieldSpec, Schema},
    };

    fn market_dataset(rows: &[(&str, Option<f64>, &str)]) -> Dataset {
        let schema = Schema {
            fields: vec![
                FieldSpec::new("market", FieldKind::Categorical),
                FieldSpec::new("price", FieldKind::Numeric),
                FieldSpec::new("nri", FieldKind::Categorical),
            ],
        };
        let headers = vec!["market".to_string(), "price".to_string(), "nri".to_string()];
        let resolved = schema.resolve(&headers).unwrap();
        let rows = rows
            .iter()
            .map(|(market, price, nri)| -> Vec<Cell> {
                vec![
                    Some(Value::Text(market.to_string())),
                    price.map(Value::Number),
                    Some(Value::Text(nri.to_string())),
                ]
            })
            .collect();
        Dataset::new(headers, resolved, rows)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn group_summary_orders_by_mean_descending() {
        let data = market_dataset(&[
            ("A", Some(1.0), "Yes"),
            ("A", Some(3.0), "No"),
            ("B", Some(5.0), "No"),
            ("C", Some(2.0), "No"),
            ("C", None, "No"),
        ]);
        let spec = GroupSpec::new("market")
            .measure("price", &[Statistic::Mean, Statistic::Count])
            .order(GroupOrder::descending("price", Statistic::Mean));
        let summary = group_summary(&Selection::all(&data), &spec)
            .unwrap()
            .into_ready()
            .unwrap();
        assert_eq!(summary.keys(), vec![&text("B"), &text("A"), &text("C")]);
        assert_eq!(summary.value(1, "price", Statistic::Mean), Some(2.0));
        assert_eq!(summary.value(2, "price", Statistic::Count), Some(1.0));
        assert_eq!(summary.groups[2].rows, 2);
    }

    #[test]
    fn group_summary_ties_break_by_key() {
        let data = market_dataset(&[
            ("Z", Some(2.0), "No"),
            ("M", Some(2.0), "No"),
            ("A", Some(2.0), "No"),
        ]);
        let spec = GroupSpec::new("market")
            .measure("price", &[Statistic::Mean])
            .order(GroupOrder::descending("price", Statistic::Mean))
            .top(2);
        let summary = group_summary(&Selection::all(&data), &spec)
            .unwrap()
            .into_ready()
            .unwrap();
        assert_eq!(summary.keys(), vec![&text("A"), &text("M")]);
    }

    #[test]
    fn group_summary_rejects_unrequested_order_statistic() {
        let data = market_dataset(&[("A", Some(1.0), "No")]);
        let spec = GroupSpec::new("market")
            .measure("price", &[Statistic::Mean])
            .order(GroupOrder::descending("price", Statistic::Median));
        assert!(group_summary(&Selection::all(&data), &spec).is_err());
    }

    #[test]
    fn group_threshold_is_exclusive() {
        let mut rows = vec![("A", Some(1.0), "No"); 10];
        let data = market_dataset(&rows);
        let spec = GroupSpec::new("market")
            .measure("price", &[Statistic::Mean])
            .min_group_rows(MIN_GROUP_ROWS);
        let outcome = group_summary(&Selection::all(&data), &spec).unwrap();
        assert_eq!(
            outcome,
            ViewOutcome::InsufficientData {
                required_more_than: 10,
                actual: 10
            }
        );

        rows.push(("A", Some(1.0), "No"));
        let data = market_dataset(&rows);
        let outcome = group_summary(&Selection::all(&data), &spec).unwrap();
        assert!(outcome.is_ready());
    }

    #[test]
    fn top_n_ranks_by_primary_statistic() {
        let data = market_dataset(&[
            ("A", Some(1.0), "No"),
            ("B", Some(9.0), "No"),
            ("C", Some(5.0), "No"),
        ]);
        let spec = GroupSpec::new("market").measure("price", &[Statistic::Max]);
        let summary = group_summary(&Selection::all(&data), &spec)
            .unwrap()
            .into_ready()
            .unwrap();
        let ranked = top_n(summary, "price", Statistic::Max, 2).unwrap();
        assert_eq!(ranked.keys(), vec![&text("B"), &text("C")]);
    }

    #[test]
    fn ratio_view_handles_zero_total() {
        let data = market_dataset(&[("A", Some(1.0), "Yes")]);
        let empty = FilterPredicate::new()
            .with_members("market", ["nowhere"])
            .apply(&data)
            .unwrap();
        let ratio = ratio_view(&empty, "nri", "Yes", "No").unwrap();
        assert_eq!((ratio.positive_pct, ratio.negative_pct), (0.0, 0.0));
    }

    #[test]
    fn ratio_view_ignores_other_labels() {
        let data = market_dataset(&[
            ("A", Some(1.0), "Yes"),
            ("A", Some(1.0), "No"),
            ("A", Some(1.0), "No"),
            ("A", Some(1.0), "No"),
            ("A", Some(1.0), "Unknown"),
        ]);
        let ratio = ratio_view(&Selection::all(&data), "nri", "Yes", "No").unwrap();
        assert_eq!(ratio.positive_pct, 25.0);
        assert_eq!(ratio.negative_pct, 75.0);
    }

    #[test]
    fn value_counts_sort_by_frequency_then_value() {
        let data = market_dataset(&[
            ("B", Some(1.0), "No"),
            ("A", Some(1.0), "No"),
            ("C", Some(1.0), "No"),
            ("C", Some(1.0), "No"),
        ]);
        let counts = value_counts(&Selection::all(&data), "market", 2)
            .unwrap()
            .into_ready()
            .unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].value, text("C"));
        assert_eq!(counts[0].percent, 50.0);
        assert_eq!(counts[1].value, text("A"));
    }

    #[test]
    fn histogram_spans_observed_range() {
        let data = market_dataset(&[
            ("A", Some(0.0), "No"),
            ("A", Some(5.0), "No"),
            ("A", Some(10.0), "No"),
            ("A", None, "No"),
        ]);
        let bins = histogram(&Selection::all(&data), "price", 2)
            .unwrap()
            .into_ready()
            .unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[1].count, 2);
        assert_eq!(bins[1].upper, 10.0);
    }

    #[test]
    fn empty_selection_is_insufficient_for_every_summary() {
        let data = market_dataset(&[("A", Some(1.0), "No"), ("B", Some(2.0), "No")]);
        let empty = FilterPredicate::new()
            .with_members("market", ["nowhere"])
            .apply(&data)
            .unwrap();
        let spec = GroupSpec::new("market").measure("price", &[Statistic::Mean]);
        assert_eq!(group_summary(&empty, &spec).unwrap(), insufficient(0, 0));
        assert_eq!(histogram(&empty, "price", 10).unwrap(), insufficient(0, 0));
        assert_eq!(value_counts(&empty, "market", 0).unwrap(), insufficient(0, 0));
    }

    #[test]
    fn group_summary_min_rows_counts_keyed_rows() {
        let data = market_dataset(&[
            ("A", Some(1.0), "No"),
            ("B", Some(2.0), "No"),
            ("C", Some(3.0), "No"),
        ]);
        let spec = GroupSpec::new("market")
            .measure("price", &[Statistic::Mean])
            .min_rows(3);
        assert_eq!(
            group_summary(&Selection::all(&data), &spec).unwrap(),
            ViewOutcome::InsufficientData {
                required_more_than: 3,
                actual: 3
            }
        );
        assert!(group_summary(&Selection::all(&data), &spec.min_rows(2))
            .unwrap()
            .is_ready());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome: ViewOutcome<Vec<u8>> = ViewOutcome::InsufficientData {
            required_more_than: 10,
            actual: 3,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "insufficient_data");
        assert_eq!(json["data"]["actual"], 3);
    }
}
