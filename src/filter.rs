//! Row selection by numeric ranges and categorical set membership.
//!
//! A [`FilterPredicate`] is a plain value rebuilt for every query and applied
//! to a [`Dataset`] to produce a [`Selection`]. Every constraint is ANDed.

use std::collections::BTreeSet;

use anyhow::Result;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    data::Value,
    dataset::Dataset,
    error::PipelineError,
    schema::{self, FieldKind},
};

const DEFAULT_CONFIGURATION_CHOICES: usize = 5;
const DEFAULT_MARKET_CHOICES: usize = 10;

/// Inclusive `[lo, hi]` bound on a numeric field. Absent values never match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeConstraint {
    pub field: String,
    pub lo: f64,
    pub hi: f64,
}

/// Membership of a label field in `allowed`. Absent values never match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetConstraint {
    pub field: String,
    pub allowed: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterPredicate {
    pub ranges: Vec<RangeConstraint>,
    pub sets: Vec<SetConstraint>,
}

impl FilterPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, field: &str, lo: f64, hi: f64) -> Self {
        self.ranges.push(RangeConstraint {
            field: field.to_string(),
            lo,
            hi,
        });
        self
    }

    pub fn with_members<I, S>(mut self, field: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets.push(SetConstraint {
            field: field.to_string(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.sets.is_empty()
    }

    /// Parses `field=lo..hi` into a range constraint.
    pub fn parse_range(spec: &str) -> Result<RangeConstraint, PipelineError> {
        let invalid = |reason: &str| PipelineError::InvalidFilter {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };
        let (field, bounds) = split_assignment(spec).ok_or_else(|| invalid("expected field=lo..hi"))?;
        let (lo, hi) = bounds
            .split_once("..")
            .ok_or_else(|| invalid("expected a lo..hi range"))?;
        let lo = lo
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("lower bound is not a number"))?;
        let hi = hi
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("upper bound is not a number"))?;
        if lo > hi {
            return Err(invalid("lower bound exceeds upper bound"));
        }
        Ok(RangeConstraint {
            field: field.to_string(),
            lo,
            hi,
        })
    }

    /// Parses `field=a,b,c` into a set constraint. `field=` selects nothing.
    pub fn parse_members(spec: &str) -> Result<SetConstraint, PipelineError> {
        let (field, values) = split_assignment(spec).ok_or_else(|| PipelineError::InvalidFilter {
            spec: spec.to_string(),
            reason: "expected field=value[,value...]".to_string(),
        })?;
        let allowed = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        Ok(SetConstraint {
            field: field.to_string(),
            allowed,
        })
    }

    /// The selection a dashboard opens with before the user touches any filter.
    ///
    /// Covers the full positive price range, the first five configurations,
    /// every buyer type, and the first ten micro markets, with distinct values
    /// taken in sorted order.
    pub fn dashboard_defaults(dataset: &Dataset) -> Result<Self> {
        let price = dataset
            .schema()
            .field(schema::PRICE_INR, FieldKind::Numeric)?;
        let (lo, hi) = (0..dataset.len())
            .filter_map(|row| dataset.number(row, price))
            .minmax()
            .into_option()
            .unwrap_or((0.0, 0.0));
        let configurations = distinct_labels(dataset, schema::CONFIGURATION)?;
        let buyer_types = distinct_labels(dataset, schema::BUYER_TYPE)?;
        let markets = distinct_labels(dataset, schema::MICRO_MARKET)?;
        Ok(Self::new()
            .with_range(schema::PRICE_INR, lo, hi)
            .with_members(
                schema::CONFIGURATION,
                configurations.into_iter().take(DEFAULT_CONFIGURATION_CHOICES),
            )
            .with_members(schema::BUYER_TYPE, buyer_types)
            .with_members(
                schema::MICRO_MARKET,
                markets.into_iter().take(DEFAULT_MARKET_CHOICES),
            ))
    }

    /// Selects the rows of `dataset` satisfying every constraint.
    ///
    /// Fields are validated before any row is visited, so an unknown or
    /// mistyped field fails without partial work.
    pub fn apply<'a>(&self, dataset: &'a Dataset) -> Result<Selection<'a>> {
        let schema = dataset.schema();
        let ranges = self
            .ranges
            .iter()
            .map(|r| Ok((schema.field(&r.field, FieldKind::Numeric)?, r)))
            .collect::<Result<Vec<_>, PipelineError>>()?;
        let sets = self
            .sets
            .iter()
            .map(|s| Ok((schema.label_field(&s.field)?, s)))
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let rows = (0..dataset.len())
            .filter(|&row| {
                ranges.iter().all(|(column, range)| {
                    dataset
                        .number(row, *column)
                        .is_some_and(|v| v >= range.lo && v <= range.hi)
                }) && sets.iter().all(|(column, set)| {
                    dataset
                        .cell(row, *column)
                        .is_some_and(|v| set.allowed.contains(&v.as_display()))
                })
            })
            .collect();
        Ok(Selection { dataset, rows })
    }
}

fn split_assignment(spec: &str) -> Option<(&str, &str)> {
    let (field, rest) = spec.split_once('=')?;
    let field = field.trim();
    if field.is_empty() {
        None
    } else {
        Some((field, rest.trim()))
    }
}

/// Distinct non-absent values of a label field, sorted.
pub fn distinct_labels(dataset: &Dataset, field: &str) -> Result<Vec<String>> {
    let column = dataset.schema().label_field(field)?;
    Ok((0..dataset.len())
        .filter_map(|row| dataset.cell(row, column).map(Value::as_display))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect())
}

/// The rows of a dataset that passed a [`FilterPredicate`], in table order.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    dataset: &'a Dataset,
    rows: Vec<usize>,
}

impl<'a> Selection<'a> {
    /// Every row of `dataset`.
    pub fn all(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            rows: (0..dataset.len()).collect(),
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-absent numeric values of `column` across the selected rows.
    pub fn numbers(&self, column: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|&row| self.dataset.number(row, column))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Cell,
        schema::{FieldSpec, Schema},
    };

    fn dataset() -> Dataset {
        let schema = Schema {
            fields: vec![
                FieldSpec::new("price", FieldKind::Numeric),
                FieldSpec::new("config", FieldKind::Categorical),
            ],
        };
        let headers = vec!["price".to_string(), "config".to_string()];
        let resolved = schema.resolve(&headers).unwrap();
        let row = |p: Option<f64>, c: Option<&str>| -> Vec<Cell> {
            vec![p.map(Value::Number), c.map(|s| Value::Text(s.to_string()))]
        };
        Dataset::new(
            headers,
            resolved,
            vec![
                row(Some(1.0), Some("2BHK")),
                row(Some(5.0), Some("3BHK")),
                row(None, Some("3BHK")),
                row(Some(10.0), None),
                row(Some(5.0), Some("4BHK")),
            ],
        )
    }

    #[test]
    fn range_bounds_are_inclusive_and_skip_absent() {
        let data = dataset();
        let selection = FilterPredicate::new()
            .with_range("price", 1.0, 5.0)
            .apply(&data)
            .unwrap();
        assert_eq!(selection.rows(), &[0, 1, 4]);
    }

    #[test]
    fn constraints_combine_with_and() {
        let data = dataset();
        let selection = FilterPredicate::new()
            .with_range("price", 0.0, 100.0)
            .with_members("config", ["3BHK", "4BHK"])
            .apply(&data)
            .unwrap();
        assert_eq!(selection.rows(), &[1, 4]);
    }

    #[test]
    fn empty_member_set_selects_nothing() {
        let data = dataset();
        let selection = FilterPredicate::new()
            .with_members("config", Vec::<String>::new())
            .apply(&data)
            .unwrap();
        assert!(selection.is_empty());
    }

    #[test]
    fn no_constraints_select_everything() {
        let data = dataset();
        assert_eq!(FilterPredicate::new().apply(&data).unwrap().len(), 5);
    }

    #[test]
    fn range_on_categorical_field_is_rejected() {
        let data = dataset();
        let err = FilterPredicate::new()
            .with_range("config", 0.0, 1.0)
            .apply(&data)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::FieldKindMismatch { .. })
        ));
    }

    #[test]
    fn parse_range_and_members() {
        let range = FilterPredicate::parse_range("ticket_price_inr=1e7..5e7").unwrap();
        assert_eq!(range.field, "ticket_price_inr");
        assert_eq!((range.lo, range.hi), (1e7, 5e7));
        assert!(FilterPredicate::parse_range("price=9..1").is_err());
        assert!(FilterPredicate::parse_range("price").is_err());

        let members = FilterPredicate::parse_members("configuration=3BHK, 4BHK").unwrap();
        assert_eq!(
            members.allowed.into_iter().collect::<Vec<_>>(),
            vec!["3BHK".to_string(), "4BHK".to_string()]
        );
    }
}
