//! Preprocessing definitions turning raw datasource columns into the
//! categorical or discretized attributes used by the mining engines.

use super::miner::ColumnType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub value_id: i64,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Closure {
    Closed,
    Open,
}

impl Closure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub left_margin: f64,
    pub right_margin: f64,
    pub left_closure: Closure,
    pub right_closure: Closure,
}

impl Interval {
    pub fn new(
        left_closure: Closure,
        left_margin: f64,
        right_margin: f64,
        right_closure: Closure,
    ) -> Self {
        Self {
            left_margin,
            right_margin,
            left_closure,
            right_closure,
        }
    }

    /// PMML closure token: left flag followed by the capitalised right flag
    /// (`closedOpen`, `openClosed`, ...)
    pub fn pmml_closure(&self) -> String {
        let right = match self.right_closure {
            Closure::Closed => "Closed",
            Closure::Open => "Open",
        };
        format!("{}{}", self.left_closure.as_str(), right)
    }
}

/// Named discretization bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuesBin {
    pub values_bin_id: i64,
    pub name: String,
    #[serde(default)]
    pub values: Vec<Value>,
    #[serde(default)]
    pub intervals: Vec<Interval>,
}

impl ValuesBin {
    pub fn with_values(values_bin_id: i64, name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            values_bin_id,
            name: name.into(),
            values,
            intervals: Vec::new(),
        }
    }

    pub fn with_intervals(
        values_bin_id: i64,
        name: impl Into<String>,
        intervals: Vec<Interval>,
    ) -> Self {
        Self {
            values_bin_id,
            name: name.into(),
            values: Vec::new(),
            intervals,
        }
    }
}

/// Shape of a preprocessing definition, decided by its first bin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessingKind {
    /// One category per distinct raw value
    EachOne,
    /// Bins defined by numeric intervals
    Intervals,
    /// Bins defined by enumerated raw values
    Enumeration,
    /// No usable bins
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    pub preprocessing_id: i64,
    /// Each distinct raw value becomes its own category
    #[serde(default)]
    pub each_one: bool,
    #[serde(default)]
    pub values_bins: Vec<ValuesBin>,
}

impl Preprocessing {
    pub fn each_one(preprocessing_id: i64) -> Self {
        Self {
            preprocessing_id,
            each_one: true,
            values_bins: Vec::new(),
        }
    }

    pub fn with_bins(preprocessing_id: i64, values_bins: Vec<ValuesBin>) -> Self {
        Self {
            preprocessing_id,
            each_one: false,
            values_bins,
        }
    }

    /// Intervals take precedence over values when the first bin carries both.
    pub fn kind(&self) -> PreprocessingKind {
        if self.each_one {
            return PreprocessingKind::EachOne;
        }
        match self.values_bins.first() {
            Some(bin) if !bin.intervals.is_empty() => PreprocessingKind::Intervals,
            Some(bin) if !bin.values.is_empty() => PreprocessingKind::Enumeration,
            _ => PreprocessingKind::Empty,
        }
    }
}

/// Derived attribute of a metasource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: ColumnType,
    /// Name of the raw datasource column the attribute is derived from
    pub datasource_column: String,
    pub preprocessing: Option<Preprocessing>,
}
