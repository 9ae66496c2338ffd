//! Typed schema for the cleaned listing table.
//!
//! A [`Schema`] declares each canonical field together with its [`FieldKind`].
//! It is resolved once against a table's header row ([`Schema::resolve`]) so
//! that view code can look fields up by name and fail fast on a missing or
//! mistyped column instead of deep inside an aggregation.
//!
//! Schemas persist as YAML via `serde_yaml`:
//!
//! ```yaml
//! fields:
//!   - name: ticket_price_cr
//!     kind: numeric
//!   - name: micro_market
//!     kind: categorical
//! ```

use std::{collections::HashMap, fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const PRICE_CR: &str = "ticket_price_cr";
pub const PRICE_INR: &str = "ticket_price_inr";
pub const UNIT_SIZE: &str = "unit_size_sqft";
pub const BEDROOMS: &str = "bedrooms";
pub const CONNECTIVITY: &str = "connectivity_score";
pub const AMENITY: &str = "amenity_score";
pub const MICRO_MARKET: &str = "micro_market";
pub const CONFIGURATION: &str = "configuration";
pub const BUYER_TYPE: &str = "buyer_type";
pub const DEVELOPER: &str = "developer_name";
pub const POSSESSION_STATUS: &str = "possession_status";
pub const TRANSACTION_TYPE: &str = "transaction_type";
pub const SALES_CHANNEL: &str = "sales_channel";
pub const NRI_BUYER: &str = "nri_buyer";
pub const FISCAL_QUARTER: &str = "fiscal_quarter";
pub const PROPERTY_ID: &str = "property_id";
pub const PROJECT_NAME: &str = "project_name";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Categorical,
    Text,
}

impl FieldKind {
    /// Whether values of this kind can be matched against a set of labels.
    pub fn is_label(self) -> bool {
        matches!(self, FieldKind::Categorical | FieldKind::Text)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FieldKind::Numeric => "numeric",
            FieldKind::Categorical => "categorical",
            FieldKind::Text => "text",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Schema {
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    /// The luxury-housing listing layout produced by the cleaning pipeline.
    pub fn listing() -> Self {
        use FieldKind::*;
        let fields = [
            (PROPERTY_ID, Text),
            (MICRO_MARKET, Categorical),
            (PROJECT_NAME, Text),
            (DEVELOPER, Categorical),
            (UNIT_SIZE, Numeric),
            (CONFIGURATION, Categorical),
            (PRICE_CR, Numeric),
            (TRANSACTION_TYPE, Categorical),
            (BUYER_TYPE, Categorical),
            (FISCAL_QUARTER, Categorical),
            (CONNECTIVITY, Numeric),
            (AMENITY, Numeric),
            (POSSESSION_STATUS, Categorical),
            (SALES_CHANNEL, Categorical),
            (NRI_BUYER, Categorical),
            (BEDROOMS, Numeric),
            (PRICE_INR, Numeric),
        ]
        .into_iter()
        .map(|(name, kind)| FieldSpec::new(name, kind))
        .collect();
        Schema { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|_| PipelineError::not_found(path))?;
        let reader = BufReader::new(file);
        let schema: Schema = serde_yaml::from_reader(reader)
            .with_context(|| format!("Parsing schema YAML {path:?}"))?;
        Ok(schema)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing schema to YAML string")
    }

    /// Binds every declared field to its column position in `headers`.
    ///
    /// Columns the schema does not declare are kept as [`FieldKind::Text`].
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedSchema> {
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), idx))
            .collect();
        for field in &self.fields {
            if !positions.contains_key(field.name.as_str()) {
                return Err(PipelineError::MissingColumn {
                    column: field.name.clone(),
                }
                .into());
            }
        }
        let kinds = headers
            .iter()
            .map(|name| self.field(name).map_or(FieldKind::Text, |f| f.kind))
            .collect();
        let index = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Ok(ResolvedSchema { kinds, index })
    }
}

/// A schema bound to concrete column positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    kinds: Vec<FieldKind>,
    index: HashMap<String, usize>,
}

impl ResolvedSchema {
    pub fn kind_at(&self, column: usize) -> FieldKind {
        self.kinds.get(column).copied().unwrap_or(FieldKind::Text)
    }

    pub fn kinds(&self) -> &[FieldKind] {
        &self.kinds
    }

    pub fn column(&self, name: &str) -> Result<usize, PipelineError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| PipelineError::UnknownField {
                field: name.to_string(),
            })
    }

    /// Looks up `name` and checks that it holds `expected` values.
    pub fn field(&self, name: &str, expected: FieldKind) -> Result<usize, PipelineError> {
        let column = self.column(name)?;
        let actual = self.kind_at(column);
        if actual != expected {
            return Err(PipelineError::FieldKindMismatch {
                field: name.to_string(),
                expected,
                actual,
            });
        }
        Ok(column)
    }

    /// Looks up a field usable as a grouping or membership key.
    pub fn label_field(&self, name: &str) -> Result<usize, PipelineError> {
        let column = self.column(name)?;
        let actual = self.kind_at(column);
        if actual.is_label() || actual == FieldKind::Numeric {
            Ok(column)
        } else {
            Err(PipelineError::FieldKindMismatch {
                field: name.to_string(),
                expected: FieldKind::Categorical,
                actual,
            })
        }
    }
}
