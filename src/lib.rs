pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod ledger;
pub mod onboarding;
pub mod registry;
pub mod storage;
pub mod vault;

use std::sync::Arc;

use catalog::WebsiteCatalog;
use config::OnboardConfig;
use dashboard::Dashboard;
use ledger::ProvisioningLedger;
use onboarding::Orchestrator;
use registry::ClientRegistry;
use storage::audit::AuditLog;
use storage::Storage;
use vault::PiiVault;

pub use error::{CoreError, Result};

/// Shared application state — every component is constructed explicitly
/// over the storage handle it needs; no global database client exists.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<OnboardConfig>,
    pub storage: Arc<Storage>,
    pub registry: ClientRegistry,
    pub catalog: WebsiteCatalog,
    pub ledger: ProvisioningLedger,
    pub orchestrator: Orchestrator,
    pub dashboard: Dashboard,
}

impl AppContext {
    /// Wire up storage, vault, and every component over the config's data
    /// directory.
    pub async fn init(config: OnboardConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::new(&config.data_dir).await?);

        let vault = match &config.vault_key {
            Some(hex_key) => {
                let raw = hex::decode(hex_key)
                    .map_err(|e| anyhow::anyhow!("vault_key is not valid hex: {e}"))?;
                let key: [u8; 32] = raw
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("vault_key must be 32 bytes"))?;
                PiiVault::new(&key)
            }
            None => PiiVault::load_or_generate(&config.data_dir)?,
        };
        let vault = Arc::new(vault);
        let audit = Arc::new(AuditLog::new(&config.data_dir));

        let registry = ClientRegistry::new(storage.clone(), vault, audit);
        let catalog = WebsiteCatalog::new(storage.clone());
        let ledger = ProvisioningLedger::new(storage.clone());
        let orchestrator = Orchestrator::new(registry.clone(), catalog.clone(), ledger.clone());
        let dashboard = Dashboard::new(
            storage.clone(),
            config.recent_event_days,
            config.recent_event_limit,
        );

        Ok(Self {
            config: Arc::new(config),
            storage,
            registry,
            catalog,
            ledger,
            orchestrator,
            dashboard,
        })
    }
}
