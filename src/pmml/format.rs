//! Numeric-to-text conversion for PMML attribute and text values.

use std::fmt::Display;

/// Formatting applied to every number written into a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumberFormat {
    float_precision: Option<usize>,
}

impl NumberFormat {
    /// `None` keeps the shortest representation that round-trips
    pub fn new(float_precision: Option<usize>) -> Self {
        Self { float_precision }
    }

    pub fn float_precision(&self) -> Option<usize> {
        self.float_precision
    }

    pub fn float(&self, value: f64) -> String {
        match self.float_precision {
            Some(precision) if value.is_finite() => format!("{value:.precision$}"),
            _ => value.to_string(),
        }
    }

    pub fn integer(&self, value: impl Display) -> String {
        value.to_string()
    }
}
