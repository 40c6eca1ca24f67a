//! # System Constants
//!
//! Wire-contract constants shared by the task lifecycle and the GUHA-PMML
//! serializer. Existing consumers parse these values literally, so they must not
//! change without a coordinated release.

/// Task lifecycle events published through [`crate::events::EventPublisher`]
pub mod events {
    pub const TASK_STATE_CHANGED: &str = "task.state_changed";
    pub const TASK_IMPORT_SCHEDULED: &str = "task.import_scheduled";
    pub const TASK_IMPORT_ROUND_COMPLETED: &str = "task.import_round_completed";
    pub const TASK_RENAMED: &str = "task.renamed";
}

/// PMML document namespaces and schema hints
pub mod pmml {
    pub const PMML_NAMESPACE: &str = "http://www.dmg.org/PMML-4_0";
    pub const PMML_VERSION: &str = "4.0";
    pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
    pub const GUHA_NAMESPACE: &str = "http://keg.vse.cz/ns/GUHA0.1rev1";
    pub const SCHEMA_LOCATION: &str =
        "http://www.dmg.org/PMML-4_0 http://easyminer.eu/schemas/PMML4.0+GUHA0.1.xsd";
    pub const SCHEMATRON_INSTRUCTION: &str =
        "oxygen SCHSchema=\"http://easyminer.eu/schemas/GUHARestr0_1.sch\"";

    pub const TASK_FORMAT: &str = "4ftMiner.Task";

    pub const CEDENT_ID_PREFIX: &str = "cdnt_";
    pub const CEDENT_ATTRIBUTES_SUFFIX: &str = "_attr";
    pub const BBA_ID_PREFIX: &str = "bba_";
    pub const DBA_ID_PREFIX: &str = "dba_";

    pub const IM_BASE: &str = "BASE";
    pub const IM_CONFIDENCE: &str = "CONF";
    pub const IM_TYPE_RELATIVE_TO_ALL: &str = "%All";

    pub const EXTENSION_FREQUENCY: &str = "Frequency";
    pub const EXTENSION_AVG: &str = "Avg";
    pub const EXTENSION_MARK: &str = "mark";
    pub const MARK_INTERESTING: &str = "interesting";
}

/// Defaults for configuration values
pub mod defaults {
    pub const APPLICATION_NAME: &str = "EasyMiner";
    pub const COPYRIGHT_HOLDER: &str = "KIZI UEP";
    pub const DATABASE_URL: &str = "postgresql://localhost/miner_core_development";
    pub const DISPATCH_BASE_URL: &str = "http://localhost:8080";
    pub const IMPORT_PATH: &str = "/em/tasks/import-mining-results?task={task_id}";
    pub const RULES_DEFAULT_LIMIT: u32 = 25;
    pub const RULES_MAX_LIMIT: u32 = 1000;
}

/// Placeholder substituted into the import path template
pub const TASK_ID_PLACEHOLDER: &str = "{task_id}";
