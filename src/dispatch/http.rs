//! HTTP dispatcher issuing a GET against the continue-import endpoint.

use super::{DispatchError, ImportDispatcher};
use crate::config::DispatchConfig;
use crate::constants::TASK_ID_PLACEHOLDER;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpImportDispatcher {
    client: reqwest::Client,
    base_url: String,
    import_path: String,
}

impl HttpImportDispatcher {
    pub fn new(config: &DispatchConfig) -> Result<Self, DispatchError> {
        if !config.import_path.contains(TASK_ID_PLACEHOLDER) {
            return Err(DispatchError::InvalidUrl(format!(
                "import path '{}' does not contain {TASK_ID_PLACEHOLDER}",
                config.import_path
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| DispatchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            import_path: config.import_path.clone(),
        })
    }

    /// Continue-import URL for a task
    pub fn import_url(&self, task_id: i64) -> String {
        let path = self
            .import_path
            .replace(TASK_ID_PLACEHOLDER, &task_id.to_string());
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

impl ImportDispatcher for HttpImportDispatcher {
    fn dispatch(&self, task_id: i64) {
        let url = self.import_url(task_id);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(task_id, url = %url, "No async runtime available, import trigger dropped");
            return;
        };

        let client = self.client.clone();
        runtime.spawn(async move {
            match client.get(&url).send().await {
                Ok(response) => {
                    debug!(task_id, status = %response.status(), "Import continuation triggered")
                }
                Err(e) => {
                    warn!(task_id, url = %url, error = %e, "Import continuation trigger failed")
                }
            }
        });
    }

    fn description(&self) -> &'static str {
        "http continue-import trigger"
    }
}
