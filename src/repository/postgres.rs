//! PostgreSQL repositories.
//!
//! Runtime-checked `sqlx` queries over the schema in `migrations/`. Miners are
//! stored as a JSONB definition; cedents and rule attributes are stored per task
//! as JSONB nodes keyed by their identifier.

use super::{
    ColumnStatisticsProvider, MinerRepository, NumericSummary, RepositoryError,
    RepositoryResult, RuleQuery, RuleRepository, TaskRepository,
};
use crate::config::DatabaseConfig;
use crate::models::{
    Cedent, CedentId, Miner, NewTask, Rule, RuleAttribute, RuleGraph, Task, TaskRuleSet,
};
use crate::state_machine::{ImportState, TaskState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Open a pool using the database section of the configuration
pub async fn connect(config: &DatabaseConfig) -> RepositoryResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        "Connected to mining database"
    );
    Ok(pool)
}

/// Apply the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> RepositoryResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
    debug!("Mining schema migrations applied");
    Ok(())
}

/// Quote a table or column name coming from miner metadata
pub fn quote_identifier(name: &str) -> RepositoryResult<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(RepositoryError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

#[derive(Debug, FromRow)]
struct TaskRow {
    task_id: i64,
    task_uuid: Uuid,
    miner_id: i64,
    name: String,
    state: String,
    import_state: String,
    task_settings_json: String,
    rules_count: i64,
    import_data: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = RepositoryError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let state: TaskState = row.state.parse().map_err(RepositoryError::Serialization)?;
        let import_state: ImportState = row
            .import_state
            .parse()
            .map_err(RepositoryError::Serialization)?;

        Ok(Task {
            task_id: row.task_id,
            task_uuid: row.task_uuid,
            miner_id: row.miner_id,
            name: row.name,
            state,
            import_state,
            task_settings_json: row.task_settings_json,
            rules_count: row.rules_count,
            import_data: row.import_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TASK_COLUMNS: &str = "task_id, task_uuid, miner_id, name, state, import_state, \
     task_settings_json, rules_count, import_data, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn find_task(&self, task_id: i64) -> RepositoryResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM mining_tasks WHERE task_id = $1");
        sqlx::query_as::<_, TaskRow>(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn find_task_by_uuid(
        &self,
        miner_id: i64,
        task_uuid: Uuid,
    ) -> RepositoryResult<Option<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM mining_tasks WHERE miner_id = $1 AND task_uuid = $2"
        );
        sqlx::query_as::<_, TaskRow>(&sql)
            .bind(miner_id)
            .bind(task_uuid)
            .fetch_optional(&self.pool)
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn create_task(&self, new_task: NewTask) -> RepositoryResult<Task> {
        let sql = format!(
            "INSERT INTO mining_tasks (task_uuid, miner_id, name, state, import_state) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (miner_id, task_uuid) DO NOTHING \
             RETURNING {TASK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(new_task.task_uuid)
            .bind(new_task.miner_id)
            .bind(&new_task.name)
            .bind(TaskState::New.as_str())
            .bind(ImportState::None.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Task::try_from(row),
            None => Err(RepositoryError::DuplicateTask {
                miner_id: new_task.miner_id,
                task_uuid: new_task.task_uuid,
            }),
        }
    }

    async fn save_task(&self, task: &Task) -> RepositoryResult<Task> {
        let sql = format!(
            "UPDATE mining_tasks SET name = $2, state = $3, import_state = $4, \
             task_settings_json = $5, rules_count = $6, import_data = $7, updated_at = NOW() \
             WHERE task_id = $1 RETURNING {TASK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(task.task_id)
            .bind(&task.name)
            .bind(task.state.as_str())
            .bind(task.import_state.as_str())
            .bind(&task.task_settings_json)
            .bind(task.rules_count)
            .bind(&task.import_data)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::TaskNotFound(task.task_id))?;

        Task::try_from(row)
    }

    async fn update_import_state(
        &self,
        task_id: i64,
        import_state: ImportState,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE mining_tasks SET import_state = $2, updated_at = NOW() WHERE task_id = $1",
        )
        .bind(task_id)
        .bind(import_state.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::TaskNotFound(task_id));
        }
        Ok(())
    }

    async fn compare_and_set_import_state(
        &self,
        task_id: i64,
        expected: ImportState,
        new: ImportState,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE mining_tasks SET import_state = $3, updated_at = NOW() \
             WHERE task_id = $1 AND import_state = $2",
        )
        .bind(task_id)
        .bind(expected.as_str())
        .bind(new.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, FromRow)]
struct RuleRow {
    rule_id: i64,
    task_id: i64,
    text: String,
    a: i64,
    b: i64,
    c: i64,
    d: i64,
    confidence: f64,
    support: f64,
    lift: Option<f64>,
    antecedent: Option<i64>,
    consequent: Option<i64>,
    in_rule_clipboard: bool,
}

impl From<RuleRow> for Rule {
    fn from(row: RuleRow) -> Self {
        Rule {
            rule_id: row.rule_id,
            task_id: row.task_id,
            text: row.text,
            a: row.a,
            b: row.b,
            c: row.c,
            d: row.d,
            confidence: row.confidence,
            support: row.support,
            lift: row.lift,
            antecedent: row.antecedent.map(CedentId),
            consequent: row.consequent.map(CedentId),
            in_rule_clipboard: row.in_rule_clipboard,
        }
    }
}

const RULE_COLUMNS: &str =
    "rule_id, task_id, text, a, b, c, d, confidence, support, lift, antecedent, consequent, \
     in_rule_clipboard";

#[derive(Debug, Clone)]
pub struct PgRuleRepository {
    pool: PgPool,
}

impl PgRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleRepository for PgRuleRepository {
    async fn find_rules(&self, task_id: i64, query: RuleQuery) -> RepositoryResult<Vec<Rule>> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM mining_rules WHERE task_id = $1 \
             ORDER BY {} LIMIT $2 OFFSET $3",
            query.order.sql_order_by()
        );
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(task_id)
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Rule::from).collect())
    }

    async fn find_rule(&self, task_id: i64, rule_id: i64) -> RepositoryResult<Option<Rule>> {
        let sql =
            format!("SELECT {RULE_COLUMNS} FROM mining_rules WHERE task_id = $1 AND rule_id = $2");
        let row = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(task_id)
            .bind(rule_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Rule::from))
    }

    async fn set_rule_clipboard(
        &self,
        task_id: i64,
        rule_id: i64,
        in_rule_clipboard: bool,
    ) -> RepositoryResult<Rule> {
        let sql = format!(
            "UPDATE mining_rules SET in_rule_clipboard = $3 \
             WHERE task_id = $1 AND rule_id = $2 RETURNING {RULE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(task_id)
            .bind(rule_id)
            .bind(in_rule_clipboard)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::RuleNotFound { task_id, rule_id })?;

        Ok(Rule::from(row))
    }

    async fn load_task_rules(&self, task_id: i64) -> RepositoryResult<TaskRuleSet> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM mining_rules WHERE task_id = $1 ORDER BY position ASC"
        );
        let rules: Vec<Rule> = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Rule::from)
            .collect();

        let cedents: Vec<(Json<Cedent>,)> =
            sqlx::query_as("SELECT definition FROM mining_cedents WHERE task_id = $1")
                .bind(task_id)
                .fetch_all(&self.pool)
                .await?;
        let rule_attributes: Vec<(Json<RuleAttribute>,)> =
            sqlx::query_as("SELECT definition FROM mining_rule_attributes WHERE task_id = $1")
                .bind(task_id)
                .fetch_all(&self.pool)
                .await?;

        let mut graph = RuleGraph::new();
        for (Json(cedent),) in cedents {
            graph
                .insert_cedent(cedent)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        }
        for (Json(rule_attribute),) in rule_attributes {
            graph
                .insert_rule_attribute(rule_attribute)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        }

        Ok(TaskRuleSet::new(rules, graph))
    }

    async fn store_rules(&self, task_id: i64, rule_set: TaskRuleSet) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        for cedent in rule_set.graph.cedents() {
            sqlx::query(
                "INSERT INTO mining_cedents (task_id, cedent_id, definition) VALUES ($1, $2, $3) \
                 ON CONFLICT (task_id, cedent_id) DO NOTHING",
            )
            .bind(task_id)
            .bind(cedent.cedent_id.0)
            .bind(Json(cedent))
            .execute(&mut *tx)
            .await?;
        }

        for rule_attribute in rule_set.graph.rule_attributes() {
            sqlx::query(
                "INSERT INTO mining_rule_attributes (task_id, rule_attribute_id, definition) \
                 VALUES ($1, $2, $3) ON CONFLICT (task_id, rule_attribute_id) DO NOTHING",
            )
            .bind(task_id)
            .bind(rule_attribute.rule_attribute_id.0)
            .bind(Json(rule_attribute))
            .execute(&mut *tx)
            .await?;
        }

        for rule in &rule_set.rules {
            sqlx::query(
                "INSERT INTO mining_rules (task_id, rule_id, text, a, b, c, d, confidence, \
                 support, lift, antecedent, consequent, in_rule_clipboard) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 ON CONFLICT (task_id, rule_id) DO NOTHING",
            )
            .bind(task_id)
            .bind(rule.rule_id)
            .bind(&rule.text)
            .bind(rule.a)
            .bind(rule.b)
            .bind(rule.c)
            .bind(rule.d)
            .bind(rule.confidence)
            .bind(rule.support)
            .bind(rule.lift)
            .bind(rule.antecedent.map(|id| id.0))
            .bind(rule.consequent.map(|id| id.0))
            .bind(rule.in_rule_clipboard)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(task_id, rules = rule_set.rules.len(), "Stored imported rules");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PgMinerRepository {
    pool: PgPool,
}

impl PgMinerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MinerRepository for PgMinerRepository {
    async fn find_miner(&self, miner_id: i64) -> RepositoryResult<Option<Miner>> {
        let row: Option<(Json<Miner>,)> =
            sqlx::query_as("SELECT definition FROM mining_miners WHERE miner_id = $1")
                .bind(miner_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(miner),)| miner))
    }

    async fn save_miner(&self, miner: &Miner) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO mining_miners (miner_id, definition) VALUES ($1, $2) \
             ON CONFLICT (miner_id) DO UPDATE SET definition = EXCLUDED.definition, \
             updated_at = NOW()",
        )
        .bind(miner.miner_id)
        .bind(Json(miner))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Statistics computed directly over the datasource and metasource tables
#[derive(Debug, Clone)]
pub struct PgColumnStatistics {
    pool: PgPool,
}

impl PgColumnStatistics {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ColumnStatisticsProvider for PgColumnStatistics {
    async fn value_frequencies(
        &self,
        table: &str,
        column: &str,
    ) -> RepositoryResult<IndexMap<String, u64>> {
        let column = quote_identifier(column)?;
        let sql = format!(
            "SELECT {column}::text AS value, COUNT(*) AS frequency FROM {} \
             WHERE {column} IS NOT NULL GROUP BY {column} ORDER BY {column}",
            quote_identifier(table)?
        );
        let rows: Vec<(String, i64)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(value, frequency)| (value, u64::try_from(frequency).unwrap_or_default()))
            .collect())
    }

    async fn numeric_summary(
        &self,
        table: &str,
        column: &str,
    ) -> RepositoryResult<Option<NumericSummary>> {
        let column = quote_identifier(column)?;
        let sql = format!(
            "SELECT MIN({column})::float8, MAX({column})::float8, AVG({column})::float8 FROM {}",
            quote_identifier(table)?
        );
        let row: (Option<f64>, Option<f64>, Option<f64>) =
            sqlx::query_as(&sql).fetch_one(&self.pool).await?;

        Ok(match row {
            (Some(min), Some(max), Some(avg)) => Some(NumericSummary { min, max, avg }),
            _ => None,
        })
    }
}
