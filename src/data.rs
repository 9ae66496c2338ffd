use std::{cmp::Ordering, fmt};

use serde::{Serialize, Serializer};

use crate::{coerce::format_number, schema::FieldKind};

/// A typed cell of the cleaned table. Absent cells are `None` at the call sites.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
}

pub type Cell = Option<Value>;

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            Value::Text(s) => s.clone(),
        }
    }

    /// The form written back to CSV files.
    pub fn as_csv_field(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Parses one raw CSV field according to its declared kind.
///
/// Empty fields are absent. A numeric field that does not parse as a finite
/// number is also absent; text kinds keep the raw string.
pub fn parse_cell(raw: &str, kind: FieldKind) -> Cell {
    if raw.is_empty() {
        return None;
    }
    match kind {
        FieldKind::Numeric => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number),
        FieldKind::Categorical | FieldKind::Text => Some(Value::Text(raw.to_string())),
    }
}

pub fn cell_to_csv(cell: &Cell) -> String {
    cell.as_ref().map(Value::as_csv_field).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cell_respects_kind() {
        assert_eq!(parse_cell("", FieldKind::Numeric), None);
        assert_eq!(parse_cell("", FieldKind::Text), None);
        assert_eq!(
            parse_cell(" 4.25 ", FieldKind::Numeric),
            Some(Value::Number(4.25))
        );
        assert_eq!(parse_cell("inf", FieldKind::Numeric), None);
        assert_eq!(parse_cell("abc", FieldKind::Numeric), None);
        assert_eq!(
            parse_cell("3BHK", FieldKind::Categorical),
            Some(Value::Text("3BHK".to_string()))
        );
    }

    #[test]
    fn values_order_numbers_before_text() {
        let mut values = vec![
            Value::Text("b".into()),
            Value::Number(10.0),
            Value::Text("a".into()),
            Value::Number(2.0),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Number(2.0),
                Value::Number(10.0),
                Value::Text("a".into()),
                Value::Text("b".into()),
            ]
        );
    }

    #[test]
    fn equality_agrees_with_ordering() {
        let (pos, neg) = (Value::Number(0.0), Value::Number(-0.0));
        assert_ne!(pos, neg);
        assert_eq!(pos == neg, pos.cmp(&neg) == Ordering::Equal);
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn display_trims_integral_numbers() {
        assert_eq!(Value::Number(3.0).as_display(), "3");
        assert_eq!(Value::Number(3.5).as_display(), "3.5");
        assert_eq!(Value::Number(3.0).as_csv_field(), "3.0");
        assert_eq!(cell_to_csv(&None), "");
    }
}
