//! # GUHA-PMML Serialization
//!
//! Builds the PMML document describing a mining task: provenance header, data
//! dictionary, transformation dictionary, task settings and the association
//! rule body with deduplicated cedent and attribute cross-references.

pub mod format;
pub mod serializer;
pub mod settings;
pub mod xml;

pub use format::NumberFormat;
pub use serializer::{GuhaPmmlSerializer, SerializerOptions, SerializerStage};
pub use settings::{GuhaTaskSettingsSerializer, TaskSettingsSerializer};
pub use xml::{XmlDocument, XmlElement, XmlNode};

use crate::error::MiningError;
use crate::models::RuleGraphError;
use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SerializerError {
    /// Document sections must be appended in order
    #[error("Cannot append {requested} after {current}")]
    OutOfOrder {
        current: SerializerStage,
        requested: SerializerStage,
    },

    #[error("Malformed rule graph: {0}")]
    MalformedRuleGraph(#[from] RuleGraphError),

    #[error("Invalid task settings: {0}")]
    InvalidSettings(String),

    #[error("Column statistics unavailable: {0}")]
    Statistics(#[from] RepositoryError),

    #[error("Document is missing element {0}")]
    MissingElement(String),

    #[error("XML writer error: {0}")]
    Xml(String),
}

pub type SerializerResult<T> = Result<T, SerializerError>;

impl From<SerializerError> for MiningError {
    fn from(err: SerializerError) -> Self {
        match err {
            SerializerError::MalformedRuleGraph(err) => MiningError::MalformedRuleGraph {
                reason: err.to_string(),
            },
            SerializerError::InvalidSettings(reason) => MiningError::InvalidSettings { reason },
            SerializerError::Statistics(err) => MiningError::Repository(err.to_string()),
            other => MiningError::Serialization(other.to_string()),
        }
    }
}
