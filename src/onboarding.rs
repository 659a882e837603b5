//! Onboarding orchestrator — reconciles the provisioning ledger for a
//! client against a set of target websites.
//!
//! The orchestrator only does bookkeeping: it decides which provisioning
//! records should exist and returns them annotated with whether each was
//! newly created. Handing new records to an executor is the caller's job,
//! via the `ExecutionDispatcher` seam.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::catalog::WebsiteCatalog;
use crate::error::{CoreError, Result};
use crate::ledger::ProvisioningLedger;
use crate::registry::ClientRegistry;
use crate::storage::AccountRow;

/// One reconciled (client, website) record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OnboardingOutcome {
    #[serde(flatten)]
    pub account: AccountRow,
    /// True when this call created the record; false when it already
    /// existed. Callers enqueue downstream execution only for created ones.
    pub created: bool,
}

/// Seam to the out-of-scope execution collaborator that would actually
/// drive registrations on external sites. The core makes no assumption
/// about when — or whether — execution happens.
#[async_trait]
pub trait ExecutionDispatcher: Send + Sync {
    async fn enqueue(&self, account: &AccountRow) -> anyhow::Result<()>;
}

/// Dispatcher that records the handoff in the log and does nothing else.
pub struct NoopDispatcher;

#[async_trait]
impl ExecutionDispatcher for NoopDispatcher {
    async fn enqueue(&self, account: &AccountRow) -> anyhow::Result<()> {
        debug!(account_id = %account.id, "execution dispatch skipped (noop dispatcher)");
        Ok(())
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: ClientRegistry,
    catalog: WebsiteCatalog,
    ledger: ProvisioningLedger,
}

impl Orchestrator {
    pub fn new(
        registry: ClientRegistry,
        catalog: WebsiteCatalog,
        ledger: ProvisioningLedger,
    ) -> Self {
        Self {
            registry,
            catalog,
            ledger,
        }
    }

    /// Establish exactly one provisioning record per (client, website) pair.
    ///
    /// - `NotFound` when the client does not exist.
    /// - `InvalidInput` when the website set is empty, contains an unknown
    ///   id, or targets an inactive site.
    /// - Duplicate ids in the input collapse to one request per unique id.
    ///
    /// Safe to re-invoke and to race: record creation is an atomic
    /// conditional insert, so concurrent calls for the same pair produce
    /// one record, with exactly one caller seeing `created = true`.
    /// Abandoning the call mid-batch leaves a valid partial state that the
    /// next invocation completes.
    pub async fn start_onboarding(
        &self,
        client_id: &str,
        website_ids: &[String],
    ) -> Result<Vec<OnboardingOutcome>> {
        self.registry.get(client_id).await?;

        let unique: BTreeSet<&str> = website_ids.iter().map(String::as_str).collect();
        if unique.is_empty() {
            return Err(CoreError::InvalidInput(
                "website set must not be empty".into(),
            ));
        }

        // Validate the whole set before touching the ledger, so a bad id
        // cannot leave a half-reconciled batch behind on first contact.
        for website_id in &unique {
            let website = match self.catalog.get(website_id).await {
                Ok(w) => w,
                Err(CoreError::NotFound { .. }) => {
                    return Err(CoreError::InvalidInput(format!(
                        "unknown website id '{website_id}'"
                    )))
                }
                Err(e) => return Err(e),
            };
            if !website.is_active {
                return Err(CoreError::InvalidInput(format!(
                    "website '{}' is inactive and cannot be provisioned",
                    website.name
                )));
            }
        }

        let mut outcomes = Vec::with_capacity(unique.len());
        for website_id in unique {
            let (account, created) = self.ledger.get_or_create(client_id, website_id).await?;
            outcomes.push(OnboardingOutcome { account, created });
        }

        let created = outcomes.iter().filter(|o| o.created).count();
        info!(
            client_id,
            total = outcomes.len(),
            created,
            "onboarding reconciled"
        );
        Ok(outcomes)
    }
}
