//! The named views a listing dashboard renders for one filter state.

use anyhow::Result;
use log::info;
use serde::Serialize;

use crate::{
    dataset::Dataset,
    filter::{FilterPredicate, Selection},
    schema::{
        AMENITY, BEDROOMS, BUYER_TYPE, CONFIGURATION, CONNECTIVITY, DEVELOPER, FISCAL_QUARTER,
        FieldKind, MICRO_MARKET, NRI_BUYER, POSSESSION_STATUS, PRICE_CR, PROPERTY_ID,
        SALES_CHANNEL, TRANSACTION_TYPE, UNIT_SIZE,
    },
    stats::{self, ColumnStats, NumericDescription, Statistic, format_metric},
    table,
    views::{
        self, DEFAULT_HISTOGRAM_BINS, GroupOrder, GroupSpec, GroupSummary, HistogramBin,
        MIN_GROUP_ROWS, RatioView, ScatterPoint, ScatterSpec, ValueCount, ViewOutcome,
    },
};

pub const TOP_MARKETS: usize = 10;
pub const TOP_CONFIGURATIONS: usize = 10;
pub const TOP_DEVELOPERS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub total_properties: usize,
    pub mean_price_cr: Option<f64>,
    pub median_price_cr: Option<f64>,
    pub mean_size_sqft: Option<f64>,
    pub mean_connectivity: Option<f64>,
}

pub fn key_metrics(selection: &Selection<'_>) -> Result<KeyMetrics> {
    let schema = selection.dataset().schema();
    let price = ColumnStats::from_values(selection.numbers(schema.field(PRICE_CR, FieldKind::Numeric)?));
    let size = ColumnStats::from_values(selection.numbers(schema.field(UNIT_SIZE, FieldKind::Numeric)?));
    let connectivity =
        ColumnStats::from_values(selection.numbers(schema.field(CONNECTIVITY, FieldKind::Numeric)?));
    Ok(KeyMetrics {
        total_properties: selection.len(),
        mean_price_cr: price.mean(),
        median_price_cr: price.median(),
        mean_size_sqft: size.mean(),
        mean_connectivity: connectivity.mean(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub filter: FilterPredicate,
    pub key_metrics: KeyMetrics,
    pub price_distribution: ViewOutcome<Vec<HistogramBin>>,
    pub price_vs_size: ViewOutcome<Vec<ScatterPoint>>,
    pub top_markets_by_price: ViewOutcome<GroupSummary>,
    pub configuration_distribution: ViewOutcome<Vec<ValueCount>>,
    pub infrastructure_scores: ViewOutcome<Vec<ScatterPoint>>,
    pub buyer_types: ViewOutcome<GroupSummary>,
    pub possession_status: ViewOutcome<Vec<ValueCount>>,
    pub transaction_types: ViewOutcome<Vec<ValueCount>>,
    pub price_by_bedrooms: ViewOutcome<GroupSummary>,
    pub nri_share: RatioView,
    pub quarterly_trend: ViewOutcome<GroupSummary>,
    pub sales_channels: ViewOutcome<GroupSummary>,
    pub market_comparison: ViewOutcome<GroupSummary>,
    pub developer_performance: ViewOutcome<GroupSummary>,
    pub summary_statistics: Vec<NumericDescription>,
    pub missing_values: Vec<(String, usize)>,
}

impl Dashboard {
    /// Applies `filter` to `dataset` and computes every named view.
    pub fn build(dataset: &Dataset, filter: &FilterPredicate) -> Result<Self> {
        let selection = filter.apply(dataset)?;
        info!(
            "Filter selected {} of {} row(s)",
            selection.len(),
            dataset.len()
        );
        let dashboard = Self {
            filter: filter.clone(),
            key_metrics: key_metrics(&selection)?,
            price_distribution: views::histogram(&selection, PRICE_CR, DEFAULT_HISTOGRAM_BINS)?,
            price_vs_size: views::scatter(
                &selection,
                &ScatterSpec::new(UNIT_SIZE, PRICE_CR, BEDROOMS),
            )?,
            top_markets_by_price: views::group_summary(&selection, &top_markets_spec())?,
            configuration_distribution: views::value_counts(
                &selection,
                CONFIGURATION,
                TOP_CONFIGURATIONS,
            )?,
            infrastructure_scores: views::scatter(
                &selection,
                &ScatterSpec::new(CONNECTIVITY, AMENITY, PRICE_CR),
            )?,
            buyer_types: views::group_summary(
                &selection,
                &GroupSpec::new(BUYER_TYPE).measure(PRICE_CR, &[Statistic::Mean, Statistic::Count]),
            )?,
            possession_status: views::value_counts(&selection, POSSESSION_STATUS, 0)?,
            transaction_types: views::value_counts(&selection, TRANSACTION_TYPE, 0)?,
            price_by_bedrooms: views::group_summary(&selection, &bedroom_spec())?,
            nri_share: views::ratio_view(&selection, NRI_BUYER, "Yes", "No")?,
            quarterly_trend: views::group_summary(
                &selection,
                &GroupSpec::new(FISCAL_QUARTER).measure(PRICE_CR, &[Statistic::Mean, Statistic::Count]),
            )?,
            sales_channels: views::group_summary(
                &selection,
                &GroupSpec::new(SALES_CHANNEL)
                    .measure(PRICE_CR, &[Statistic::Mean])
                    .measure(PROPERTY_ID, &[Statistic::Count]),
            )?,
            market_comparison: views::group_summary(&selection, &market_comparison_spec())?,
            developer_performance: views::group_summary(&selection, &developer_spec())?,
            summary_statistics: stats::describe(&selection),
            missing_values: stats::missing_counts(&selection),
        };
        Ok(dashboard)
    }

    /// Names of the views that reported insufficient data.
    pub fn insufficient_views(&self) -> Vec<&'static str> {
        [
            ("price_distribution", self.price_distribution.is_ready()),
            ("price_vs_size", self.price_vs_size.is_ready()),
            ("top_markets_by_price", self.top_markets_by_price.is_ready()),
            (
                "configuration_distribution",
                self.configuration_distribution.is_ready(),
            ),
            ("infrastructure_scores", self.infrastructure_scores.is_ready()),
            ("buyer_types", self.buyer_types.is_ready()),
            ("possession_status", self.possession_status.is_ready()),
            ("transaction_types", self.transaction_types.is_ready()),
            ("price_by_bedrooms", self.price_by_bedrooms.is_ready()),
            ("quarterly_trend", self.quarterly_trend.is_ready()),
            ("sales_channels", self.sales_channels.is_ready()),
            ("market_comparison", self.market_comparison.is_ready()),
            ("developer_performance", self.developer_performance.is_ready()),
        ]
        .into_iter()
        .filter(|(_, ready)| !ready)
        .map(|(name, _)| name)
        .collect()
    }
}

impl Dashboard {
    /// Every view as a titled plain-text table, in dashboard order.
    pub fn render(&self) -> String {
        let metrics = &self.key_metrics;
        let mut out = table::render_pairs(
            "Key Metrics",
            &[
                ("total_properties".to_string(), metrics.total_properties.to_string()),
                ("mean_price_cr".to_string(), format_metric(metrics.mean_price_cr)),
                ("median_price_cr".to_string(), format_metric(metrics.median_price_cr)),
                ("mean_size_sqft".to_string(), format_metric(metrics.mean_size_sqft)),
                ("mean_connectivity".to_string(), format_metric(metrics.mean_connectivity)),
            ],
        );
        out.push_str(&render_histogram("Price Distribution", &self.price_distribution));
        out.push_str(&render_scatter("Price vs Size", &self.price_vs_size));
        out.push_str(&render_groups("Top Micro Markets by Price", &self.top_markets_by_price));
        out.push_str(&render_counts("Configurations", &self.configuration_distribution));
        out.push_str(&render_scatter("Infrastructure Scores", &self.infrastructure_scores));
        out.push_str(&render_groups("Buyer Types", &self.buyer_types));
        out.push_str(&render_counts("Possession Status", &self.possession_status));
        out.push_str(&render_counts("Transaction Types", &self.transaction_types));
        out.push_str(&render_groups("Price by Bedrooms", &self.price_by_bedrooms));
        let nri = &self.nri_share;
        out.push_str(&table::render_pairs(
            "NRI Share",
            &[
                (format!("{}_pct", nri.positive), format!("{:.2}", nri.positive_pct)),
                (format!("{}_pct", nri.negative), format!("{:.2}", nri.negative_pct)),
            ],
        ));
        out.push_str(&render_groups("Quarterly Trend", &self.quarterly_trend));
        out.push_str(&render_groups("Sales Channels", &self.sales_channels));
        out.push_str(&render_groups("Market Comparison", &self.market_comparison));
        out.push_str(&render_groups("Developer Performance", &self.developer_performance));
        out.push_str(&render_description(&self.summary_statistics));
        let missing = self
            .missing_values
            .iter()
            .map(|(column, count)| (column.clone(), count.to_string()))
            .collect::<Vec<_>>();
        out.push_str(&table::render_pairs("Missing Values", &missing));
        out
    }
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn render_outcome<T>(
    title: &str,
    outcome: &ViewOutcome<T>,
    render: impl FnOnce(&T) -> String,
) -> String {
    match outcome {
        ViewOutcome::Ready(view) => render(view),
        ViewOutcome::InsufficientData {
            required_more_than,
            actual,
        } => format!(
            "== {title} ==\nInsufficient data: {actual} row(s), need more than {required_more_than}\n\n"
        ),
    }
}

fn render_groups(title: &str, outcome: &ViewOutcome<GroupSummary>) -> String {
    render_outcome(title, outcome, |summary| {
        let (headers, rows) = summary.to_table();
        table::render_section(title, &headers, &rows)
    })
}

fn render_scatter(title: &str, outcome: &ViewOutcome<Vec<ScatterPoint>>) -> String {
    render_outcome(title, outcome, |points| {
        let rows = points
            .iter()
            .map(|p| {
                vec![
                    (p.row + 1).to_string(),
                    format_metric(Some(p.x)),
                    format_metric(Some(p.y)),
                    format_metric(Some(p.size)),
                ]
            })
            .collect::<Vec<_>>();
        table::render_section(title, &headers(&["row", "x", "y", "size"]), &rows)
    })
}

fn render_counts(title: &str, outcome: &ViewOutcome<Vec<ValueCount>>) -> String {
    render_outcome(title, outcome, |counts| {
        let rows = counts
            .iter()
            .map(|c| {
                vec![
                    c.value.as_display(),
                    c.count.to_string(),
                    format!("{:.2}", c.percent),
                ]
            })
            .collect::<Vec<_>>();
        table::render_section(title, &headers(&["value", "count", "percent"]), &rows)
    })
}

fn render_histogram(title: &str, outcome: &ViewOutcome<Vec<HistogramBin>>) -> String {
    render_outcome(title, outcome, |bins| {
        let rows = bins
            .iter()
            .map(|b| {
                vec![
                    format_metric(Some(b.lower)),
                    format_metric(Some(b.upper)),
                    b.count.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        table::render_section(title, &headers(&["lower", "upper", "count"]), &rows)
    })
}

fn render_description(descriptions: &[NumericDescription]) -> String {
    let rows = descriptions
        .iter()
        .map(|d| {
            vec![
                d.column.clone(),
                d.count.to_string(),
                format_metric(d.mean),
                format_metric(d.std_dev),
                format_metric(d.min),
                format_metric(d.p25),
                format_metric(d.median),
                format_metric(d.p75),
                format_metric(d.max),
            ]
        })
        .collect::<Vec<_>>();
    table::render_section(
        "Summary Statistics",
        &headers(&["column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"]),
        &rows,
    )
}

fn top_markets_spec() -> GroupSpec {
    GroupSpec::new(MICRO_MARKET)
        .measure(PRICE_CR, &[Statistic::Mean])
        .order(GroupOrder::descending(PRICE_CR, Statistic::Mean))
        .top(TOP_MARKETS)
}

fn bedroom_spec() -> GroupSpec {
    GroupSpec::new(BEDROOMS)
        .measure(PRICE_CR, &[Statistic::Mean, Statistic::Count])
        .min_group_rows(MIN_GROUP_ROWS)
}

fn market_comparison_spec() -> GroupSpec {
    GroupSpec::new(MICRO_MARKET)
        .measure(
            PRICE_CR,
            &[
                Statistic::Count,
                Statistic::Mean,
                Statistic::Median,
                Statistic::Min,
                Statistic::Max,
            ],
        )
        .measure(UNIT_SIZE, &[Statistic::Mean])
        .measure(CONNECTIVITY, &[Statistic::Mean])
        .order(GroupOrder::descending(PRICE_CR, Statistic::Mean))
}

fn developer_spec() -> GroupSpec {
    GroupSpec::new(DEVELOPER)
        .measure(PROPERTY_ID, &[Statistic::Count])
        .measure(PRICE_CR, &[Statistic::Mean, Statistic::Median])
        .measure(CONNECTIVITY, &[Statistic::Mean])
        .measure(AMENITY, &[Statistic::Mean])
        .order(GroupOrder::descending(PROPERTY_ID, Statistic::Count))
        .top(TOP_DEVELOPERS)
}
