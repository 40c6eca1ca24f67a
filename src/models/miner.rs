//! # Miner Model
//!
//! A miner binds a raw datasource and its preprocessed metasource to one
//! external mining engine. Tasks belong to exactly one miner.

use super::attribute::Attribute;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine type backing a miner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MinerType {
    /// LISp-Miner compatible engine
    LispMiner,
    /// R based apriori miner
    R,
    /// Any other engine, identified by its raw type string
    Other(String),
}

impl MinerType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::LispMiner => "lm",
            Self::R => "r",
            Self::Other(raw) => raw,
        }
    }

    /// `(subsystem, module)` header values for this engine
    pub fn header_fields(&self) -> (&str, &str) {
        match self {
            Self::LispMiner => ("4ft-Miner", "LMConnect"),
            Self::R => ("R", "Apriori-R"),
            Self::Other(raw) => (raw, raw),
        }
    }
}

impl From<String> for MinerType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "lm" => Self::LispMiner,
            "r" => Self::R,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for MinerType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<MinerType> for String {
    fn from(value: MinerType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MinerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw column type of a datasource or attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "int")]
    Integer,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "string")]
    String,
}

impl ColumnType {
    /// PMML `dataType` attribute value
    pub fn pmml_data_type(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
        }
    }

    /// PMML `optype` attribute value
    pub fn pmml_optype(&self) -> &'static str {
        match self {
            Self::String => "categorical",
            Self::Integer | Self::Float => "continuous",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::String)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasourceColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Raw data table as uploaded by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datasource {
    pub datasource_id: i64,
    pub db_table: String,
    pub columns: Vec<DatasourceColumn>,
}

/// Preprocessed attribute table derived from a datasource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metasource {
    pub metasource_id: i64,
    pub attributes_table: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Miner {
    pub miner_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub miner_type: MinerType,
    /// Display name of the owning user
    pub user_name: Option<String>,
    pub datasource: Datasource,
    pub metasource: Metasource,
}
