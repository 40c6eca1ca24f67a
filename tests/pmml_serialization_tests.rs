//! GUHA-PMML serialization integration tests.

mod common;

use chrono::{FixedOffset, TimeZone};
use common::*;
use miner_core::error::MiningError;
use miner_core::models::{
    AttributeRef, Cedent, Connective, MinerType, RuleAttribute, RuleGraph, RuleGraphError,
    RuleAttributeId, TaskRuleSet, Value, ValuesBinRef,
};
use miner_core::pmml::{
    GuhaPmmlSerializer, GuhaTaskSettingsSerializer, SerializerError, SerializerOptions,
    SerializerStage, XmlElement,
};
use miner_core::state_machine::{ImportState, TaskState};
use miner_core::Task;

fn solved_task() -> Task {
    let mut task = Task::from_new(
        1,
        miner_core::models::NewTask::new(HEART_MINER_ID, uuid::Uuid::new_v4()),
    );
    task.name = "Heart risk".to_string();
    task.state = TaskState::Solved;
    task.import_state = ImportState::Done;
    task.task_settings_json = settings_payload();
    task
}

fn initialized<'a>(
    task: &'a Task,
    miner: &'a miner_core::models::Miner,
    stats: &'a miner_core::repository::InMemoryColumnStatistics,
) -> GuhaPmmlSerializer<'a> {
    let mut serializer = GuhaPmmlSerializer::new(task, miner, stats, SerializerOptions::default());
    let generated_at = FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2026, 10, 19, 8, 0, 0)
        .unwrap();
    serializer.initialize_at(generated_at).unwrap();
    serializer
}

fn association_rules<'a>(serializer: &'a GuhaPmmlSerializer<'_>) -> &'a XmlElement {
    serializer
        .document()
        .unwrap()
        .root
        .child("guha:AssociationModel")
        .unwrap()
        .child("AssociationRules")
        .unwrap()
}

fn count(rules: &XmlElement, name: &str, id_prefix: &str) -> usize {
    rules
        .children_named(name)
        .filter(|e| {
            e.attribute("id")
                .is_some_and(|id| id.starts_with(id_prefix))
        })
        .count()
}

#[test]
fn test_single_rule_with_two_attributes() {
    let task = solved_task();
    let miner = heart_miner(MinerType::LispMiner);
    let stats = heart_statistics();
    let mut serializer = initialized(&task, &miner, &stats);

    serializer.append_rules(&single_rule_set()).unwrap();

    let rules = association_rules(&serializer);
    assert_eq!(rules.children_named("AssociationRule").count(), 1);
    assert_eq!(count(rules, "BBA", "bba_"), 2);
    assert_eq!(count(rules, "DBA", "dba_"), 2);

    let cedent = rules.find_child_by_attribute("DBA", "id", "cdnt_1").unwrap();
    let refs: Vec<String> = cedent.children_named("BARef").map(XmlElement::text).collect();
    assert_eq!(refs, vec!["cdnt_1_attr"]);

    let conjunction = rules
        .find_child_by_attribute("DBA", "id", "cdnt_1_attr")
        .unwrap();
    assert_eq!(conjunction.attribute("connective"), Some("Conjunction"));
    assert_eq!(conjunction.attribute("literal"), Some("false"));
    let refs: Vec<String> = conjunction
        .children_named("BARef")
        .map(XmlElement::text)
        .collect();
    assert_eq!(refs, vec!["dba_10", "dba_11"]);

    let names: Vec<&str> = rules.elements().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["BBA", "BBA", "DBA", "DBA", "DBA", "DBA", "AssociationRule"]
    );

    let rule = rules.child("AssociationRule").unwrap();
    assert_eq!(rule.attribute("antecedent"), Some("cdnt_1"));
    let table = rule.child("FourFtTable").unwrap();
    assert_eq!(table.attribute("a"), Some("11"));
    assert_eq!(table.attribute("d"), Some("82"));
    let measures: Vec<(Option<&str>, String)> = rule
        .children_named("IMValue")
        .map(|im| (im.attribute("name"), im.text()))
        .collect();
    assert_eq!(
        measures,
        vec![
            (Some("BASE"), "0.25".to_string()),
            (Some("CONF"), "0.5".to_string())
        ]
    );
}

#[test]
fn test_shared_cedent_subtree_is_written_once() {
    let task = solved_task();
    let miner = heart_miner(MinerType::LispMiner);
    let stats = heart_statistics();
    let mut serializer = initialized(&task, &miner, &stats);

    serializer.append_rules(&shared_cedent_rule_set()).unwrap();

    let rules = association_rules(&serializer);
    assert_eq!(rules.children_named("AssociationRule").count(), 2);
    for id in ["cdnt_1", "cdnt_2", "cdnt_1_attr", "cdnt_2_attr", "dba_10", "dba_11"] {
        let occurrences = rules
            .children_named("DBA")
            .filter(|e| e.attribute("id") == Some(id))
            .count();
        assert_eq!(occurrences, 1, "{id} should be written exactly once");
    }
    assert_eq!(count(rules, "BBA", "bba_"), 4);

    let antecedents: Vec<Option<&str>> = rules
        .children_named("AssociationRule")
        .map(|r| r.attribute("antecedent"))
        .collect();
    assert_eq!(antecedents, vec![Some("cdnt_1"), Some("cdnt_1")]);
    let consequents: Vec<Option<&str>> = rules
        .children_named("AssociationRule")
        .map(|r| r.attribute("consequent"))
        .collect();
    assert_eq!(consequents, vec![Some("cdnt_3"), Some("cdnt_4")]);
}

#[test]
fn test_rule_attribute_requires_exactly_one_binding() {
    let attribute = AttributeRef {
        attribute_id: 1,
        name: "age".to_string(),
    };
    let value = Value {
        value_id: 1,
        value: "42".to_string(),
    };
    let bin = ValuesBinRef {
        values_bin_id: 1,
        name: "old".to_string(),
    };

    assert_eq!(
        RuleAttribute::new(5, attribute.clone(), Some(value), Some(bin)).unwrap_err(),
        RuleGraphError::AmbiguousBinding(RuleAttributeId(5))
    );
    assert_eq!(
        RuleAttribute::new(6, attribute, None, None).unwrap_err(),
        RuleGraphError::MissingBinding(RuleAttributeId(6))
    );
}

#[test]
fn test_malformed_graph_fails_without_touching_document() {
    let task = solved_task();
    let miner = heart_miner(MinerType::LispMiner);
    let stats = heart_statistics();
    let mut serializer = initialized(&task, &miner, &stats);
    let before = serializer.document().cloned();

    let mut graph = RuleGraph::new();
    graph
        .insert_cedent(Cedent::new(1, Connective::Conjunction).with_cedents([2]))
        .unwrap();
    graph
        .insert_cedent(Cedent::new(2, Connective::Conjunction).with_cedents([1]))
        .unwrap();
    let err = serializer
        .append_rules(&TaskRuleSet::new(vec![rule(1, Some(1), None)], graph))
        .unwrap_err();

    assert!(matches!(err, SerializerError::MalformedRuleGraph(_)));
    assert_eq!(serializer.document().cloned(), before);
    assert_eq!(serializer.stage(), SerializerStage::Header);

    let mapped: MiningError = err.into();
    assert!(matches!(mapped, MiningError::MalformedRuleGraph { .. }));
}

#[tokio::test]
async fn test_categorical_frequencies_follow_statistics_order() {
    let task = solved_task();
    let miner = heart_miner(MinerType::LispMiner);
    let stats = heart_statistics();
    let mut serializer = initialized(&task, &miner, &stats);

    serializer.append_data_dictionary(true).await.unwrap();

    let dictionary = serializer
        .document()
        .unwrap()
        .root
        .child("DataDictionary")
        .unwrap();
    assert_eq!(dictionary.attribute("numberOfFields"), Some("2"));

    let sex = dictionary
        .find_child_by_attribute("DataField", "name", "sex")
        .unwrap();
    assert_eq!(sex.attribute("optype"), Some("categorical"));
    assert_eq!(sex.attribute("dataType"), Some("string"));
    let values: Vec<(Option<&str>, Option<&str>)> = sex
        .children_named("Value")
        .map(|v| (v.attribute("value"), v.extension_value("Frequency")))
        .collect();
    assert_eq!(values, vec![(Some("a"), Some("3")), (Some("b"), Some("5"))]);

    let age = dictionary
        .find_child_by_attribute("DataField", "name", "age")
        .unwrap();
    assert_eq!(age.attribute("optype"), Some("continuous"));
    assert_eq!(age.attribute("dataType"), Some("integer"));
    assert_eq!(age.extension_value("Avg"), Some("49.5"));
    let interval = age.child("Interval").unwrap();
    assert_eq!(interval.attribute("closure"), Some("closedClosed"));
    assert_eq!(interval.attribute("leftMargin"), Some("21"));
    assert_eq!(interval.attribute("rightMargin"), Some("77"));
}

#[tokio::test]
async fn test_stages_may_be_skipped_but_not_reordered() {
    let task = solved_task();
    let miner = heart_miner(MinerType::LispMiner);
    let stats = heart_statistics();
    let mut serializer = initialized(&task, &miner, &stats);

    serializer
        .append_transformation_dictionary(false)
        .await
        .unwrap();
    let err = serializer.append_data_dictionary(false).await.unwrap_err();
    assert_eq!(
        err,
        SerializerError::OutOfOrder {
            current: SerializerStage::TransformationDictionary,
            requested: SerializerStage::DataDictionary,
        }
    );

    let err = serializer
        .append_task_settings(&GuhaTaskSettingsSerializer::default())
        .unwrap_err();
    assert!(matches!(err, SerializerError::OutOfOrder { .. }));
}

#[tokio::test]
async fn test_full_export_through_service() {
    let harness = MiningHarness::new();
    let identity = harness.identity();
    harness.driver.on_start(Ok(solved_waiting(1)));
    harness
        .service
        .start_or_check_mining(identity, &settings_payload())
        .await
        .unwrap();
    let task_id = harness.stored_task(identity).await.task_id;
    harness.driver.on_import_with_rules(
        snapshot(TaskState::Solved, ImportState::Done, 1),
        single_rule_set(),
    );
    harness.service.continue_import(task_id).await.unwrap();

    let xml = harness.service.get_full_pmml(identity).await.unwrap();

    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(xml.contains("<?oxygen SCHSchema="));
    assert!(xml.contains(r#"<Extension name="subsystem" value="4ft-Miner"/>"#));
    assert!(xml.contains(r#"<Extension name="module" value="LMConnect"/>"#));
    assert!(xml.contains(r#"<Extension name="dataset" value="heart_attributes"/>"#));
    assert!(xml.contains(r#"modelName="Heart risk""#));
    assert!(xml.contains(r#"<DataDictionary numberOfFields="2">"#));
    assert!(xml.contains(r#"<DiscretizeBin binValue="old">"#));
    assert!(xml.contains(r#"<AssociationRule id="1" antecedent="cdnt_1">"#));
    assert!(xml.contains("<HypothesesCountMax>100</HypothesesCountMax>"));
}

#[tokio::test]
async fn test_settings_export_has_no_rules_or_frequencies() {
    let harness = MiningHarness::new();
    let identity = harness.identity();
    harness
        .driver
        .on_start(Ok(snapshot(TaskState::InProgress, ImportState::None, 0)));
    harness
        .service
        .start_or_check_mining(identity, &settings_payload())
        .await
        .unwrap();

    let xml = harness.service.get_settings_pmml(identity).await.unwrap();

    assert!(xml.contains("<TaskSetting>"));
    assert!(xml.contains(r#"<DataField name="sex" dataType="string" optype="categorical"/>"#));
    assert!(!xml.contains("AssociationRules"));
    assert!(!xml.contains(r#"name="Frequency""#));
}

#[tokio::test]
async fn test_malformed_rules_fail_export_and_keep_task_state() {
    let harness = MiningHarness::new();
    let identity = harness.identity();
    harness.driver.on_start(Ok(solved_waiting(1)));
    harness
        .service
        .start_or_check_mining(identity, &settings_payload())
        .await
        .unwrap();
    let task_id = harness.stored_task(identity).await.task_id;

    let mut dangling = single_rule_set();
    dangling.rules.push(rule(2, Some(9), None));
    harness.driver.on_import_with_rules(
        snapshot(TaskState::Solved, ImportState::Done, 2),
        dangling,
    );
    harness.service.continue_import(task_id).await.unwrap();
    let before = harness.stored_task(identity).await;

    let err = harness.service.get_full_pmml(identity).await.unwrap_err();

    assert!(matches!(err, MiningError::MalformedRuleGraph { .. }));
    assert_eq!(harness.stored_task(identity).await, before);
}
