//! FILENAME: engine/src/value.rs
//! PURPOSE: Defines the value stored in a single matrix cell.
//! CONTEXT: A cell is either a finite number or one of four special tokens
//! (NA, EPS, +INF, -INF). The tokens are sentinels, not numbers: code that
//! does arithmetic must check `is_special()` first. An absent cell means
//! "zero or out of scope" and is never represented by a `CellValue`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four non-numeric sentinel values a model instance can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialValue {
    NotApplicable,
    Epsilon,
    PositiveInfinity,
    NegativeInfinity,
}

impl SpecialValue {
    pub const ALL: [SpecialValue; 4] = [
        SpecialValue::NotApplicable,
        SpecialValue::Epsilon,
        SpecialValue::PositiveInfinity,
        SpecialValue::NegativeInfinity,
    ];

    /// Canonical text token, as shown in the matrix views.
    pub fn token(self) -> &'static str {
        match self {
            SpecialValue::NotApplicable => "NA",
            SpecialValue::Epsilon => "EPS",
            SpecialValue::PositiveInfinity => "+INF",
            SpecialValue::NegativeInfinity => "-INF",
        }
    }

    /// Case-insensitive token lookup. `INF` is accepted as `+INF`.
    pub fn from_token(token: &str) -> Option<SpecialValue> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("NA") {
            Some(SpecialValue::NotApplicable)
        } else if token.eq_ignore_ascii_case("EPS") {
            Some(SpecialValue::Epsilon)
        } else if token.eq_ignore_ascii_case("+INF") || token.eq_ignore_ascii_case("INF") {
            Some(SpecialValue::PositiveInfinity)
        } else if token.eq_ignore_ascii_case("-INF") {
            Some(SpecialValue::NegativeInfinity)
        } else {
            None
        }
    }
}

/// Represents the raw or aggregated content of a matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Number(f64),
    NotApplicable,
    Epsilon,
    PositiveInfinity,
    NegativeInfinity,
}

impl CellValue {
    /// Converts a float coming from a model loader. Non-finite floats are
    /// mapped to their token so a `Number` is always finite.
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            CellValue::NotApplicable
        } else if value == f64::INFINITY {
            CellValue::PositiveInfinity
        } else if value == f64::NEG_INFINITY {
            CellValue::NegativeInfinity
        } else {
            CellValue::Number(value)
        }
    }

    pub fn is_special(&self) -> bool {
        !matches!(self, CellValue::Number(_))
    }

    /// Returns the special token this value carries, if any.
    pub fn special(&self) -> Option<SpecialValue> {
        match self {
            CellValue::Number(_) => None,
            CellValue::NotApplicable => Some(SpecialValue::NotApplicable),
            CellValue::Epsilon => Some(SpecialValue::Epsilon),
            CellValue::PositiveInfinity => Some(SpecialValue::PositiveInfinity),
            CellValue::NegativeInfinity => Some(SpecialValue::NegativeInfinity),
        }
    }

    /// Returns the finite number, or `None` for a special token.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<SpecialValue> for CellValue {
    fn from(value: SpecialValue) -> Self {
        match value {
            SpecialValue::NotApplicable => CellValue::NotApplicable,
            SpecialValue::Epsilon => CellValue::Epsilon,
            SpecialValue::PositiveInfinity => CellValue::PositiveInfinity,
            SpecialValue::NegativeInfinity => CellValue::NegativeInfinity,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::from_f64(value)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => {
                // Format without unnecessary decimal places
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            other => match other.special() {
                Some(token) => f.write_str(token.token()),
                None => Ok(()),
            },
        }
    }
}

/// Error returned when text is neither a special token nor a number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueParseError {
    #[error("Empty cell text")]
    Empty,

    #[error("Not a number or special value: {0}")]
    Invalid(String),
}

impl FromStr for CellValue {
    type Err = ValueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValueParseError::Empty);
        }
        if let Some(special) = SpecialValue::from_token(trimmed) {
            return Ok(special.into());
        }
        trimmed
            .parse::<f64>()
            .map(CellValue::from_f64)
            .map_err(|_| ValueParseError::Invalid(trimmed.to_string()))
    }
}
