//! # GUHA-PMML Serializer
//!
//! Staged builder of the PMML document of one task. Stages run in a fixed
//! order: header, task settings, data dictionary, transformation dictionary,
//! rules. A stage may be skipped but never repeated or run after a later one.
//!
//! Every stage builds its section off to the side and attaches it only on
//! success, so an error leaves the document exactly as the previous stage left it.

use super::format::NumberFormat;
use super::settings::TaskSettingsSerializer;
use super::xml::{XmlDocument, XmlElement};
use super::{SerializerError, SerializerResult};
use crate::config::PmmlConfig;
use crate::constants::pmml::*;
use crate::models::{
    CedentId, Miner, PreprocessingKind, Rule, RuleAttributeId, RuleGraph, Task, TaskRuleSet,
};
use crate::models::{Attribute, Connective, Preprocessing};
use crate::repository::ColumnStatisticsProvider;
use chrono::{DateTime, Datelike, FixedOffset, Local};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

const HEADER: &str = "Header";
const DATA_DICTIONARY: &str = "DataDictionary";
const TRANSFORMATION_DICTIONARY: &str = "TransformationDictionary";
const ASSOCIATION_MODEL: &str = "guha:AssociationModel";

/// Progress of a document, in the only order sections may be appended
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SerializerStage {
    Blank,
    Header,
    TaskSettings,
    DataDictionary,
    TransformationDictionary,
    Rules,
}

impl SerializerStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blank => "blank",
            Self::Header => "header",
            Self::TaskSettings => "task_settings",
            Self::DataDictionary => "data_dictionary",
            Self::TransformationDictionary => "transformation_dictionary",
            Self::Rules => "rules",
        }
    }
}

impl fmt::Display for SerializerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance and formatting applied to generated documents
#[derive(Debug, Clone, PartialEq)]
pub struct SerializerOptions {
    pub application_name: String,
    pub application_version: String,
    pub copyright_holder: String,
    pub number_format: NumberFormat,
}

impl From<&PmmlConfig> for SerializerOptions {
    fn from(config: &PmmlConfig) -> Self {
        Self {
            application_name: config.application_name.clone(),
            application_version: config.application_version.clone(),
            copyright_holder: config.copyright_holder.clone(),
            number_format: NumberFormat::new(config.float_precision),
        }
    }
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self::from(&PmmlConfig::default())
    }
}

pub struct GuhaPmmlSerializer<'a> {
    task: &'a Task,
    miner: &'a Miner,
    statistics: &'a dyn ColumnStatisticsProvider,
    options: SerializerOptions,
    stage: SerializerStage,
    document: Option<XmlDocument>,
}

impl<'a> GuhaPmmlSerializer<'a> {
    pub fn new(
        task: &'a Task,
        miner: &'a Miner,
        statistics: &'a dyn ColumnStatisticsProvider,
        options: SerializerOptions,
    ) -> Self {
        Self {
            task,
            miner,
            statistics,
            options,
            stage: SerializerStage::Blank,
            document: None,
        }
    }

    pub fn stage(&self) -> SerializerStage {
        self.stage
    }

    pub fn document(&self) -> Option<&XmlDocument> {
        self.document.as_ref()
    }

    /// Create the document skeleton stamped with the current local time
    pub fn initialize(&mut self) -> SerializerResult<()> {
        self.initialize_at(Local::now().fixed_offset())
    }

    /// Create the document skeleton with an explicit generation time
    pub fn initialize_at(&mut self, generated_at: DateTime<FixedOffset>) -> SerializerResult<()> {
        if self.stage != SerializerStage::Blank {
            return Err(SerializerError::OutOfOrder {
                current: self.stage,
                requested: SerializerStage::Header,
            });
        }

        let root = XmlElement::new("PMML")
            .with_attribute("xmlns", PMML_NAMESPACE)
            .with_attribute("version", PMML_VERSION)
            .with_attribute("xmlns:xsi", XSI_NAMESPACE)
            .with_attribute("xmlns:pmml", PMML_NAMESPACE)
            .with_attribute("xsi:schemaLocation", SCHEMA_LOCATION)
            .with_child(self.header(generated_at))
            .with_child(XmlElement::new(DATA_DICTIONARY))
            .with_child(XmlElement::new(TRANSFORMATION_DICTIONARY))
            .with_child(
                XmlElement::new(ASSOCIATION_MODEL)
                    .with_attribute("xmlns", "")
                    .with_attribute("xmlns:guha", GUHA_NAMESPACE),
            );

        let mut document = XmlDocument::new(root);
        document
            .processing_instructions
            .push(SCHEMATRON_INSTRUCTION.to_string());

        self.document = Some(document);
        self.stage = SerializerStage::Header;
        Ok(())
    }

    fn header(&self, generated_at: DateTime<FixedOffset>) -> XmlElement {
        let (subsystem, module) = self.miner.miner_type.header_fields();
        let author = self.miner.user_name.as_deref().unwrap_or_default();

        XmlElement::new(HEADER)
            .with_attribute(
                "copyright",
                format!(
                    "Copyright (c) {}, {}",
                    self.options.copyright_holder,
                    generated_at.year()
                ),
            )
            .with_child(extension("author", author))
            .with_child(extension("subsystem", subsystem))
            .with_child(extension("module", module))
            .with_child(extension("format", TASK_FORMAT))
            .with_child(extension("dataset", &self.miner.metasource.attributes_table))
            .with_child(
                XmlElement::new("Application")
                    .with_attribute("name", self.options.application_name.as_str())
                    .with_attribute("version", self.options.application_version.as_str()),
            )
            .with_child(XmlElement::new("Timestamp").with_text(format_timestamp(generated_at)))
    }

    /// Append the task configuration produced by `settings`
    pub fn append_task_settings(
        &mut self,
        settings: &dyn TaskSettingsSerializer,
    ) -> SerializerResult<()> {
        self.ensure_can_append(SerializerStage::TaskSettings)?;

        let fragment = settings.serialize_settings(self.task)?;

        let model = self.section_mut(ASSOCIATION_MODEL)?;
        for (key, value) in fragment.model_attributes {
            model.set_attribute(key, value);
        }
        for child in fragment.children {
            model.push(child);
        }
        self.stage = SerializerStage::TaskSettings;
        Ok(())
    }

    /// Append one `DataField` per raw datasource column
    pub async fn append_data_dictionary(
        &mut self,
        include_frequencies: bool,
    ) -> SerializerResult<()> {
        self.ensure_can_append(SerializerStage::DataDictionary)?;

        let datasource = &self.miner.datasource;
        let mut fields = Vec::with_capacity(datasource.columns.len());
        for column in &datasource.columns {
            let mut field = XmlElement::new("DataField")
                .with_attribute("name", column.name.as_str())
                .with_attribute("dataType", column.column_type.pmml_data_type())
                .with_attribute("optype", column.column_type.pmml_optype());

            if include_frequencies {
                if column.column_type.is_numeric() {
                    let summary = self
                        .statistics
                        .numeric_summary(&datasource.db_table, &column.name)
                        .await?;
                    if let Some(summary) = summary.filter(|s| s.min <= s.max) {
                        let format = self.options.number_format;
                        field.add_extension(
                            EXTENSION_AVG,
                            &format.float(summary.avg),
                            Some(EXTENSION_AVG),
                        );
                        field.push(
                            XmlElement::new("Interval")
                                .with_attribute("closure", "closedClosed")
                                .with_attribute("leftMargin", format.float(summary.min))
                                .with_attribute("rightMargin", format.float(summary.max)),
                        );
                    }
                } else {
                    let values = self
                        .statistics
                        .value_frequencies(&datasource.db_table, &column.name)
                        .await?;
                    for (value, count) in &values {
                        let mut value_element =
                            XmlElement::new("Value").with_attribute("value", value.as_str());
                        value_element.add_extension(
                            EXTENSION_FREQUENCY,
                            &self.options.number_format.integer(count),
                            Some(value.as_str()),
                        );
                        field.push(value_element);
                    }
                }
            }
            fields.push(field);
        }

        if !fields.is_empty() {
            let dictionary = self.section_mut(DATA_DICTIONARY)?;
            dictionary.set_attribute("numberOfFields", fields.len().to_string());
            for field in fields {
                dictionary.push(field);
            }
        }
        self.stage = SerializerStage::DataDictionary;
        Ok(())
    }

    /// Append one `DerivedField` per preprocessed metasource attribute
    pub async fn append_transformation_dictionary(
        &mut self,
        include_frequencies: bool,
    ) -> SerializerResult<()> {
        self.ensure_can_append(SerializerStage::TransformationDictionary)?;

        let mut derived_fields = Vec::new();
        for attribute in &self.miner.metasource.attributes {
            let Some(preprocessing) = &attribute.preprocessing else {
                continue;
            };
            derived_fields.push(
                self.derived_field(attribute, preprocessing, include_frequencies)
                    .await?,
            );
        }

        let dictionary = self.section_mut(TRANSFORMATION_DICTIONARY)?;
        for field in derived_fields {
            dictionary.push(field);
        }
        self.stage = SerializerStage::TransformationDictionary;
        Ok(())
    }

    async fn derived_field(
        &self,
        attribute: &Attribute,
        preprocessing: &Preprocessing,
        include_frequencies: bool,
    ) -> SerializerResult<XmlElement> {
        let mut derived_field = XmlElement::new("DerivedField")
            .with_attribute("name", attribute.name.as_str())
            .with_attribute("dataType", attribute.attribute_type.pmml_data_type())
            .with_attribute("optype", attribute.attribute_type.pmml_optype());

        let kind = preprocessing.kind();
        if kind == PreprocessingKind::Empty {
            return Ok(derived_field);
        }

        let frequencies = self
            .statistics
            .value_frequencies(&self.miner.metasource.attributes_table, &attribute.name)
            .await?;

        match kind {
            PreprocessingKind::EachOne => {
                let mut table = self.inline_table(&frequencies, include_frequencies);
                for value in frequencies.keys() {
                    table.push(table_row(value, value));
                }
                derived_field.push(map_values(&attribute.datasource_column, table));
            }
            PreprocessingKind::Intervals => {
                let mut discretize = XmlElement::new("Discretize")
                    .with_attribute("field", attribute.datasource_column.as_str());
                if include_frequencies {
                    self.add_frequencies(&mut discretize, &frequencies);
                }
                for bin in &preprocessing.values_bins {
                    if bin.intervals.is_empty() {
                        continue;
                    }
                    if !is_occupied(&frequencies, &bin.name) {
                        debug!(
                            attribute = %attribute.name,
                            bin = %bin.name,
                            "Skipping unoccupied interval bin"
                        );
                        continue;
                    }
                    for interval in &bin.intervals {
                        let format = self.options.number_format;
                        discretize.push(
                            XmlElement::new("DiscretizeBin")
                                .with_attribute("binValue", bin.name.as_str())
                                .with_child(
                                    XmlElement::new("Interval")
                                        .with_attribute("closure", interval.pmml_closure())
                                        .with_attribute(
                                            "leftMargin",
                                            format.float(interval.left_margin),
                                        )
                                        .with_attribute(
                                            "rightMargin",
                                            format.float(interval.right_margin),
                                        ),
                                ),
                        );
                    }
                }
                derived_field.push(discretize);
            }
            PreprocessingKind::Enumeration => {
                let mut table = self.inline_table(&frequencies, include_frequencies);
                for bin in &preprocessing.values_bins {
                    if bin.values.is_empty() {
                        continue;
                    }
                    if !is_occupied(&frequencies, &bin.name) {
                        debug!(
                            attribute = %attribute.name,
                            bin = %bin.name,
                            "Skipping unoccupied values bin"
                        );
                        continue;
                    }
                    for value in &bin.values {
                        table.push(table_row(&value.value, &bin.name));
                    }
                }
                derived_field.push(map_values(&attribute.datasource_column, table));
            }
            PreprocessingKind::Empty => {}
        }

        Ok(derived_field)
    }

    fn inline_table(
        &self,
        frequencies: &IndexMap<String, u64>,
        include_frequencies: bool,
    ) -> XmlElement {
        let mut table = XmlElement::new("InlineTable");
        if include_frequencies {
            self.add_frequencies(&mut table, frequencies);
        }
        table
    }

    fn add_frequencies(&self, element: &mut XmlElement, frequencies: &IndexMap<String, u64>) {
        for (value, count) in frequencies {
            element.add_extension(
                EXTENSION_FREQUENCY,
                &self.options.number_format.integer(count),
                Some(value.as_str()),
            );
        }
    }

    /// Append the association rules with their cedent and attribute records.
    ///
    /// The rule graph is validated first; a malformed graph leaves the
    /// document untouched.
    pub fn append_rules(&mut self, rule_set: &TaskRuleSet) -> SerializerResult<()> {
        self.ensure_can_append(SerializerStage::Rules)?;
        rule_set.validate()?;

        if !rule_set.rules.is_empty() {
            let mut builder = RulesBuilder::new(&rule_set.graph, self.options.number_format);
            for rule in &rule_set.rules {
                builder.append_rule(rule)?;
            }
            let association_rules = builder.finish();
            self.section_mut(ASSOCIATION_MODEL)?.push(association_rules);
        }

        self.stage = SerializerStage::Rules;
        Ok(())
    }

    /// Render the document built so far
    pub fn to_xml_string(&self) -> SerializerResult<String> {
        match &self.document {
            Some(document) => document.to_xml_string(),
            None => Err(SerializerError::OutOfOrder {
                current: self.stage,
                requested: SerializerStage::Header,
            }),
        }
    }

    pub fn finish(self) -> SerializerResult<String> {
        self.to_xml_string()
    }

    fn ensure_can_append(&self, requested: SerializerStage) -> SerializerResult<()> {
        if self.stage == SerializerStage::Blank || requested <= self.stage {
            return Err(SerializerError::OutOfOrder {
                current: self.stage,
                requested,
            });
        }
        Ok(())
    }

    fn section_mut(&mut self, name: &str) -> SerializerResult<&mut XmlElement> {
        self.document
            .as_mut()
            .and_then(|document| document.root.child_mut(name))
            .ok_or_else(|| SerializerError::MissingElement(name.to_string()))
    }
}

/// `YYYY-MM-DD HH:MM:SS GMT + HH:MM`
pub fn format_timestamp(generated_at: DateTime<FixedOffset>) -> String {
    let offset = generated_at.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "{} GMT {} {:02}:{:02}",
        generated_at.format("%Y-%m-%d %H:%M:%S"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}

fn extension(name: &str, value: &str) -> XmlElement {
    XmlElement::new("Extension")
        .with_attribute("name", name)
        .with_attribute("value", value)
}

fn map_values(column: &str, table: XmlElement) -> XmlElement {
    XmlElement::new("MapValues")
        .with_attribute("outputColumn", "field")
        .with_child(
            XmlElement::new("FieldColumnPair")
                .with_attribute("column", "column")
                .with_attribute("field", column),
        )
        .with_child(table)
}

fn table_row(column: &str, field: &str) -> XmlElement {
    XmlElement::new("row")
        .with_child(XmlElement::new("column").with_text(column))
        .with_child(XmlElement::new("field").with_text(field))
}

fn is_occupied(frequencies: &IndexMap<String, u64>, bin: &str) -> bool {
    frequencies.get(bin).is_some_and(|count| *count > 0)
}

fn cedent_ref(id: CedentId) -> String {
    format!("{CEDENT_ID_PREFIX}{id}")
}

fn bba_ref(id: RuleAttributeId) -> String {
    format!("{BBA_ID_PREFIX}{id}")
}

fn dba_ref(id: RuleAttributeId) -> String {
    format!("{DBA_ID_PREFIX}{id}")
}

fn ba_ref(target: String) -> XmlElement {
    XmlElement::new("BARef").with_text(target)
}

/// Collects the three rule fragments while walking each rule's cedent trees
struct RulesBuilder<'g> {
    graph: &'g RuleGraph,
    number_format: NumberFormat,
    bbas: Vec<XmlElement>,
    dbas: Vec<XmlElement>,
    rules: Vec<XmlElement>,
    emitted_cedents: HashSet<CedentId>,
    emitted_rule_attributes: HashSet<RuleAttributeId>,
}

impl<'g> RulesBuilder<'g> {
    fn new(graph: &'g RuleGraph, number_format: NumberFormat) -> Self {
        Self {
            graph,
            number_format,
            bbas: Vec::new(),
            dbas: Vec::new(),
            rules: Vec::new(),
            emitted_cedents: HashSet::new(),
            emitted_rule_attributes: HashSet::new(),
        }
    }

    fn append_rule(&mut self, rule: &Rule) -> SerializerResult<()> {
        let format = self.number_format;
        let mut element =
            XmlElement::new("AssociationRule").with_attribute("id", rule.rule_id.to_string());
        if let Some(antecedent) = rule.antecedent {
            element.set_attribute("antecedent", cedent_ref(antecedent));
        }
        if let Some(consequent) = rule.consequent {
            element.set_attribute("consequent", cedent_ref(consequent));
        }
        if rule.in_rule_clipboard {
            element.add_extension(EXTENSION_MARK, MARK_INTERESTING, None);
        }

        element.push(XmlElement::new("Text").with_text(rule.text.as_str()));
        element.push(
            XmlElement::new("IMValue")
                .with_attribute("name", IM_BASE)
                .with_attribute("type", IM_TYPE_RELATIVE_TO_ALL)
                .with_text(format.float(rule.support)),
        );
        element.push(
            XmlElement::new("IMValue")
                .with_attribute("name", IM_CONFIDENCE)
                .with_attribute("type", IM_TYPE_RELATIVE_TO_ALL)
                .with_text(format.float(rule.confidence)),
        );
        element.push(
            XmlElement::new("FourFtTable")
                .with_attribute("a", format.integer(rule.a))
                .with_attribute("b", format.integer(rule.b))
                .with_attribute("c", format.integer(rule.c))
                .with_attribute("d", format.integer(rule.d)),
        );
        self.rules.push(element);

        for cedent_id in rule.antecedent.into_iter().chain(rule.consequent) {
            self.serialize_cedent(cedent_id)?;
        }
        Ok(())
    }

    /// Depth-first; each cedent record is placed before the records of its children
    fn serialize_cedent(&mut self, id: CedentId) -> SerializerResult<()> {
        if !self.emitted_cedents.insert(id) {
            return Ok(());
        }
        let graph = self.graph;
        let cedent = graph.cedent(id)?;

        let slot = self.dbas.len();
        self.dbas.push(XmlElement::default());

        let mut dba = XmlElement::new("DBA")
            .with_attribute("id", cedent_ref(id))
            .with_attribute("connective", cedent.connective.pmml_name());
        for child in &cedent.cedents {
            dba.push(ba_ref(cedent_ref(*child)));
            self.serialize_cedent(*child)?;
        }

        if !cedent.rule_attributes.is_empty() {
            let attributes_ref = format!("{}{CEDENT_ATTRIBUTES_SUFFIX}", cedent_ref(id));
            dba.push(ba_ref(attributes_ref.clone()));

            let attributes_slot = self.dbas.len();
            self.dbas.push(XmlElement::default());
            let mut attributes_dba = XmlElement::new("DBA")
                .with_attribute("id", attributes_ref)
                .with_attribute("connective", Connective::Conjunction.pmml_name())
                .with_attribute("literal", "false");
            for rule_attribute_id in &cedent.rule_attributes {
                attributes_dba.push(ba_ref(dba_ref(*rule_attribute_id)));
                self.serialize_rule_attribute(*rule_attribute_id)?;
            }
            self.dbas[attributes_slot] = attributes_dba;
        }

        self.dbas[slot] = dba;
        Ok(())
    }

    fn serialize_rule_attribute(&mut self, id: RuleAttributeId) -> SerializerResult<()> {
        if !self.emitted_rule_attributes.insert(id) {
            return Ok(());
        }
        let graph = self.graph;
        let rule_attribute = graph.rule_attribute(id)?;

        self.bbas.push(
            XmlElement::new("BBA")
                .with_attribute("id", bba_ref(id))
                .with_attribute("literal", "false")
                .with_child(
                    XmlElement::new("FieldRef").with_text(rule_attribute.attribute.name.as_str()),
                )
                .with_child(XmlElement::new("CatRef").with_text(rule_attribute.category_name())),
        );
        self.dbas.push(
            XmlElement::new("DBA")
                .with_attribute("id", dba_ref(id))
                .with_attribute("connective", Connective::Conjunction.pmml_name())
                .with_attribute("literal", "true")
                .with_child(ba_ref(bba_ref(id))),
        );
        Ok(())
    }

    /// Bindings first, then wrappers, then rules
    fn finish(self) -> XmlElement {
        let mut association_rules = XmlElement::new("AssociationRules");
        for element in self.bbas.into_iter().chain(self.dbas).chain(self.rules) {
            association_rules.push(element);
        }
        association_rules
    }
}
