//! Website catalog — the administrative registry of external destinations.
//! Read-only from the orchestrator's point of view.

use std::sync::Arc;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::storage::{NewWebsiteRecord, Storage, WebsitePatchRecord, WebsiteRow};

#[derive(Debug, Clone)]
pub struct NewWebsite {
    pub name: String,
    pub url: String,
    pub category: String,
    /// Site-specific automation parameters as a JSON object string.
    pub config: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WebsitePatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub config: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct WebsiteCatalog {
    storage: Arc<Storage>,
}

impl WebsiteCatalog {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn create(&self, input: NewWebsite) -> Result<WebsiteRow> {
        // The config blob is opaque to the core but must at least be JSON,
        // or the downstream executor cannot parse it.
        serde_json::from_str::<serde_json::Value>(&input.config)
            .map_err(|e| CoreError::InvalidInput(format!("website config is not valid JSON: {e}")))?;

        let rec = NewWebsiteRecord {
            name: input.name,
            url: input.url,
            category: input.category,
            config: input.config,
            is_active: input.is_active,
        };
        let website = self.storage.insert_website(&rec).await?;
        info!(website_id = %website.id, name = %website.name, "website added");
        Ok(website)
    }

    pub async fn update(&self, id: &str, patch: WebsitePatch) -> Result<WebsiteRow> {
        if let Some(config) = &patch.config {
            serde_json::from_str::<serde_json::Value>(config).map_err(|e| {
                CoreError::InvalidInput(format!("website config is not valid JSON: {e}"))
            })?;
        }
        let rec = WebsitePatchRecord {
            name: patch.name,
            url: patch.url,
            category: patch.category,
            config: patch.config,
            is_active: patch.is_active,
        };
        let website = self.storage.update_website(id, &rec).await?;
        info!(website_id = %website.id, "website updated");
        Ok(website)
    }

    pub async fn get(&self, id: &str) -> Result<WebsiteRow> {
        self.storage
            .get_website(id)
            .await?
            .ok_or_else(|| CoreError::not_found("website", id))
    }

    /// All websites ordered by name; `active_only = Some(true)` narrows to
    /// sites provisioning may target.
    pub async fn list(&self, active_only: Option<bool>) -> Result<Vec<WebsiteRow>> {
        self.storage.list_websites(active_only).await
    }
}
