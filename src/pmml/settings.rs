//! Conversion of the opaque task settings JSON into the `TaskSetting` subtree
//! of a GUHA association model.

use super::format::NumberFormat;
use super::xml::XmlElement;
use super::{SerializerError, SerializerResult};
use crate::models::Task;
use serde_json::{Map, Value};

/// Association model attributes plus the children placed before the rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsFragment {
    pub model_attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

/// Builds the task configuration part of the document from a task's settings
pub trait TaskSettingsSerializer: Send + Sync {
    fn serialize_settings(&self, task: &Task) -> SerializerResult<SettingsFragment>;
}

const DEFAULT_COMPARE_TYPE: &str = "Greater than or equal";

/// Default serializer for the EasyMiner settings format
/// (`taskName`, `limitHits`, `rule0.antecedent`, `rule0.succedent`, `rule0.IMs`)
#[derive(Debug, Clone, Default)]
pub struct GuhaTaskSettingsSerializer {
    number_format: NumberFormat,
}

impl GuhaTaskSettingsSerializer {
    pub fn new(number_format: NumberFormat) -> Self {
        Self { number_format }
    }
}

impl TaskSettingsSerializer for GuhaTaskSettingsSerializer {
    fn serialize_settings(&self, task: &Task) -> SerializerResult<SettingsFragment> {
        let settings: Value = serde_json::from_str(&task.task_settings_json)
            .map_err(|e| SerializerError::InvalidSettings(e.to_string()))?;
        let Value::Object(settings) = settings else {
            return Err(SerializerError::InvalidSettings(
                "task settings must be a JSON object".to_string(),
            ));
        };

        let model_name = settings
            .get("taskName")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&task.name);

        let mut builder = TaskSettingBuilder::new(self.number_format);
        let task_setting = builder.build(&settings);

        Ok(SettingsFragment {
            model_attributes: vec![
                ("modelName".to_string(), model_name.to_string()),
                ("functionName".to_string(), "associationRules".to_string()),
                ("algorithmName".to_string(), "4ft".to_string()),
            ],
            children: vec![task_setting],
        })
    }
}

/// Walks one settings document, numbering BBA and DBA settings as it goes
struct TaskSettingBuilder {
    number_format: NumberFormat,
    next_id: u32,
    bba_settings: XmlElement,
    dba_settings: XmlElement,
}

impl TaskSettingBuilder {
    fn new(number_format: NumberFormat) -> Self {
        Self {
            number_format,
            next_id: 0,
            bba_settings: XmlElement::new("BBASettings"),
            dba_settings: XmlElement::new("DBASettings"),
        }
    }

    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn build(&mut self, settings: &Map<String, Value>) -> XmlElement {
        let mut task_setting = XmlElement::new("TaskSetting");

        if let Some(limit) = settings.get("limitHits").and_then(json_number_text) {
            let mut extension = XmlElement::new("Extension").with_attribute("name", "LISp-Miner");
            extension.push(XmlElement::new("HypothesesCountMax").with_text(limit));
            task_setting.push(extension);
        }

        let rule = settings.get("rule0").and_then(Value::as_object);
        let antecedent = rule
            .and_then(|rule| rule.get("antecedent"))
            .and_then(|cedent| self.cedent_setting(cedent));
        let consequent = rule
            .and_then(|rule| rule.get("succedent"))
            .and_then(|cedent| self.cedent_setting(cedent));

        task_setting.push(std::mem::replace(
            &mut self.bba_settings,
            XmlElement::new("BBASettings"),
        ));
        task_setting.push(std::mem::replace(
            &mut self.dba_settings,
            XmlElement::new("DBASettings"),
        ));
        if let Some(id) = antecedent {
            task_setting.push(XmlElement::new("AntecedentSetting").with_text(id));
        }
        if let Some(id) = consequent {
            task_setting.push(XmlElement::new("ConsequentSetting").with_text(id));
        }

        let ims = rule
            .and_then(|rule| rule.get("IMs"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        task_setting.push(self.interest_measure_setting(ims));

        task_setting
    }

    /// Serialize a cedent pattern; returns the id of its `DBASetting`
    fn cedent_setting(&mut self, cedent: &Value) -> Option<String> {
        let cedent = cedent.as_object()?;
        let children = cedent.get("children").and_then(Value::as_array)?;

        let mut references = Vec::new();
        for child in children {
            let reference = if child.get("connective").is_some() {
                self.cedent_setting(child)
            } else {
                self.attribute_setting(child)
            };
            references.extend(reference);
        }
        if references.is_empty() {
            return None;
        }

        let connective = cedent
            .get("connective")
            .and_then(|connective| connective.get("name").or(connective.get("type")))
            .and_then(Value::as_str)
            .map(connective_name)
            .unwrap_or("Conjunction");

        let id = self.next_id();
        let mut dba = XmlElement::new("DBASetting")
            .with_attribute("id", id.as_str())
            .with_attribute("type", connective);
        for reference in references {
            dba.push(XmlElement::new("BASettingRef").with_text(reference));
        }
        dba.push(XmlElement::new("MinimalLength").with_text("1"));
        self.dba_settings.push(dba);
        Some(id)
    }

    /// Serialize an attribute leaf as a `BBASetting` wrapped in a literal `DBASetting`
    fn attribute_setting(&mut self, attribute: &Value) -> Option<String> {
        let name = attribute.get("name").and_then(Value::as_str)?;
        let field = attribute
            .get("ref")
            .and_then(Value::as_str)
            .unwrap_or(name);

        let mut coefficient = XmlElement::new("Coefficient");
        if let Some(category) = attribute.get("category").and_then(Value::as_str) {
            coefficient.push(XmlElement::new("Type").with_text(category));
        }
        for (field_name, value) in named_fields(attribute) {
            let element = match field_name {
                "category" => "Category",
                "minLength" => "MinimalLength",
                "maxLength" => "MaximalLength",
                _ => continue,
            };
            if let Some(text) = json_scalar_text(value) {
                coefficient.push(XmlElement::new(element).with_text(text));
            }
        }

        let bba_id = self.next_id();
        self.bba_settings.push(
            XmlElement::new("BBASetting")
                .with_attribute("id", bba_id.as_str())
                .with_child(XmlElement::new("Text").with_text(name))
                .with_child(XmlElement::new("Name").with_text(name))
                .with_child(XmlElement::new("FieldRef").with_text(field))
                .with_child(coefficient),
        );

        let sign = match attribute.get("sign").and_then(Value::as_str) {
            Some("negative") => "Negative",
            _ => "Positive",
        };
        let literal_id = self.next_id();
        self.dba_settings.push(
            XmlElement::new("DBASetting")
                .with_attribute("id", literal_id.as_str())
                .with_attribute("type", "Literal")
                .with_child(XmlElement::new("BASettingRef").with_text(bba_id))
                .with_child(XmlElement::new("LiteralSign").with_text(sign)),
        );
        Some(literal_id)
    }

    fn interest_measure_setting(&mut self, ims: &[Value]) -> XmlElement {
        let mut setting = XmlElement::new("InterestMeasureSetting");
        for im in ims {
            let Some(name) = im.get("name").and_then(Value::as_str) else {
                continue;
            };
            let threshold = im.get("threshold").and_then(Value::as_f64).or_else(|| {
                named_fields(im)
                    .find(|(field, _)| *field == "threshold")
                    .and_then(|(_, value)| value.as_f64())
            });
            let compare_type = im
                .get("compareType")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_COMPARE_TYPE);

            let mut element = XmlElement::new("InterestMeasureThreshold")
                .with_attribute("id", self.next_id())
                .with_child(XmlElement::new("InterestMeasure").with_text(name));
            if let Some(threshold) = threshold {
                element.push(
                    XmlElement::new("Threshold").with_text(self.number_format.float(threshold)),
                );
            }
            if let Some(threshold_type) = im.get("thresholdType").and_then(Value::as_str) {
                element.push(XmlElement::new("ThresholdType").with_text(threshold_type));
            }
            element.push(XmlElement::new("CompareType").with_text(compare_type));
            setting.push(element);
        }
        setting
    }
}

fn connective_name(raw: &str) -> &'static str {
    match raw.to_ascii_lowercase().as_str() {
        "or" | "disjunction" => "Disjunction",
        "neg" | "not" | "negation" => "Negation",
        _ => "Conjunction",
    }
}

/// `fields: [{name, value}]` pairs of a settings entry
fn named_fields(entry: &Value) -> impl Iterator<Item = (&str, &Value)> {
    entry
        .get("fields")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|field| {
            let name = field.get("name")?.as_str()?;
            Some((name, field.get("value")?))
        })
}

fn json_number_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if text.trim().parse::<u64>().is_ok() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn json_scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::test_task;
    use serde_json::json;

    fn settings_task(settings: Value) -> Task {
        let mut task = test_task();
        task.task_settings_json = settings.to_string();
        task
    }

    fn sample_settings() -> Value {
        json!({
            "taskName": "Heart risk",
            "limitHits": 250,
            "rule0": {
                "antecedent": {
                    "type": "cedent",
                    "connective": {"id": 1, "name": "AND", "type": "and"},
                    "children": [
                        {"name": "age", "category": "One category",
                         "fields": [{"name": "category", "value": "[40;50)"}]},
                        {"name": "sex", "category": "Subset", "sign": "negative",
                         "fields": [{"name": "minLength", "value": 1}, {"name": "maxLength", "value": 2}]}
                    ]
                },
                "succedent": {
                    "connective": {"name": "AND"},
                    "children": [{"name": "disease", "category": "One category",
                                  "fields": [{"name": "category", "value": "yes"}]}]
                },
                "IMs": [
                    {"name": "FUI", "thresholdType": "% of all", "fields": [{"name": "threshold", "value": 0.7}]},
                    {"name": "SUPP", "threshold": 0.05, "compareType": "Greater than"}
                ]
            }
        })
    }

    #[test]
    fn test_model_attributes() {
        let fragment = GuhaTaskSettingsSerializer::default()
            .serialize_settings(&settings_task(sample_settings()))
            .unwrap();

        assert_eq!(
            fragment.model_attributes,
            vec![
                ("modelName".to_string(), "Heart risk".to_string()),
                ("functionName".to_string(), "associationRules".to_string()),
                ("algorithmName".to_string(), "4ft".to_string()),
            ]
        );
    }

    #[test]
    fn test_task_setting_structure() {
        let fragment = GuhaTaskSettingsSerializer::default()
            .serialize_settings(&settings_task(sample_settings()))
            .unwrap();
        let task_setting = &fragment.children[0];

        let names: Vec<&str> = task_setting.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Extension",
                "BBASettings",
                "DBASettings",
                "AntecedentSetting",
                "ConsequentSetting",
                "InterestMeasureSetting"
            ]
        );

        let extension = task_setting.child("Extension").unwrap();
        assert_eq!(extension.attribute("name"), Some("LISp-Miner"));
        assert_eq!(extension.child("HypothesesCountMax").unwrap().text(), "250");

        let bbas = task_setting.child("BBASettings").unwrap();
        assert_eq!(bbas.children_named("BBASetting").count(), 3);
        let age = bbas.children_named("BBASetting").next().unwrap();
        assert_eq!(age.child("FieldRef").unwrap().text(), "age");
        let coefficient = age.child("Coefficient").unwrap();
        assert_eq!(coefficient.child("Type").unwrap().text(), "One category");
        assert_eq!(coefficient.child("Category").unwrap().text(), "[40;50)");

        // three literals plus two cedents
        let dbas = task_setting.child("DBASettings").unwrap();
        assert_eq!(dbas.children_named("DBASetting").count(), 5);
        let antecedent_id = task_setting.child("AntecedentSetting").unwrap().text();
        let antecedent = dbas
            .find_child_by_attribute("DBASetting", "id", &antecedent_id)
            .unwrap();
        assert_eq!(antecedent.attribute("type"), Some("Conjunction"));
        assert_eq!(antecedent.children_named("BASettingRef").count(), 2);

        let negative = dbas
            .children_named("DBASetting")
            .find(|dba| dba.child("LiteralSign").map(|s| s.text()) == Some("Negative".to_string()));
        assert!(negative.is_some());
    }

    #[test]
    fn test_interest_measures() {
        let fragment = GuhaTaskSettingsSerializer::new(NumberFormat::new(Some(2)))
            .serialize_settings(&settings_task(sample_settings()))
            .unwrap();
        let ims = fragment.children[0].child("InterestMeasureSetting").unwrap();
        let thresholds: Vec<&XmlElement> = ims.children_named("InterestMeasureThreshold").collect();
        assert_eq!(thresholds.len(), 2);

        assert_eq!(thresholds[0].child("InterestMeasure").unwrap().text(), "FUI");
        assert_eq!(thresholds[0].child("Threshold").unwrap().text(), "0.70");
        assert_eq!(
            thresholds[0].child("CompareType").unwrap().text(),
            DEFAULT_COMPARE_TYPE
        );
        assert_eq!(thresholds[1].child("Threshold").unwrap().text(), "0.05");
        assert_eq!(
            thresholds[1].child("CompareType").unwrap().text(),
            "Greater than"
        );
    }

    #[test]
    fn test_missing_keys_are_skipped() {
        let fragment = GuhaTaskSettingsSerializer::default()
            .serialize_settings(&settings_task(json!({})))
            .unwrap();

        assert_eq!(fragment.model_attributes[0].1, "test task");
        let task_setting = &fragment.children[0];
        assert!(task_setting.child("Extension").is_none());
        assert!(task_setting.child("AntecedentSetting").is_none());
        assert!(task_setting
            .child("BBASettings")
            .unwrap()
            .children
            .is_empty());
    }

    #[test]
    fn test_non_object_settings_rejected() {
        let serializer = GuhaTaskSettingsSerializer::default();

        let err = serializer
            .serialize_settings(&settings_task(json!([1, 2])))
            .unwrap_err();
        assert!(matches!(err, SerializerError::InvalidSettings(_)));

        let mut task = test_task();
        task.task_settings_json = "{broken".to_string();
        assert!(matches!(
            serializer.serialize_settings(&task),
            Err(SerializerError::InvalidSettings(_))
        ));
    }
}
