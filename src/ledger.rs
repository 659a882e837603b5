//! Provisioning ledger — the per-(client, website) account records, their
//! registration state machine, and the append-only event log.
//!
//! Step graph (one-directional, no regression from a terminal state):
//!
//! ```text
//! PENDING -> IN_PROGRESS -> SUBMITTED -> COMPLETED
//!                                     \-> FAILED
//! ```
//!
//! `retry` is the single sanctioned exit from a terminal state: it moves
//! FAILED back to PENDING. Every transition appends exactly one event, in
//! the same storage transaction as the step update.

use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::storage::{AccountEventRow, AccountRow, Storage};

/// Fine-grained progress of a provisioning record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStep {
    Pending,
    InProgress,
    Submitted,
    Completed,
    Failed,
}

/// Coarse outcome, derived from the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Pending,
    Completed,
    Failed,
}

impl RegistrationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Submitted => "SUBMITTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Coarse status this step maps to.
    pub fn status(&self) -> AccountStatus {
        match self {
            Self::Pending | Self::InProgress | Self::Submitted => AccountStatus::Pending,
            Self::Completed => AccountStatus::Completed,
            Self::Failed => AccountStatus::Failed,
        }
    }

    /// Steps reachable via `transition`. Terminal states return the empty
    /// slice — the only way out of FAILED is `retry`.
    pub fn next_steps(&self) -> &'static [RegistrationStep] {
        match self {
            Self::Pending => &[Self::InProgress],
            Self::InProgress => &[Self::Submitted],
            Self::Submitted => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl FromStr for RegistrationStep {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "SUBMITTED" => Ok(Self::Submitted),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(CoreError::InvalidInput(format!(
                "unknown registration step '{other}'"
            ))),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(CoreError::InvalidInput(format!(
                "unknown account status '{other}'"
            ))),
        }
    }
}

// ─── Ledger ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ProvisioningLedger {
    storage: Arc<Storage>,
}

impl ProvisioningLedger {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Idempotent record creation for a (client, website) pair.
    ///
    /// Returns `(record, created)`. A pre-existing record is returned
    /// unchanged with `created = false` — the idempotence guarantee the
    /// orchestrator builds on. Creation is an atomic conditional insert at
    /// the storage layer; under concurrent invocation exactly one caller
    /// observes `created = true`.
    pub async fn get_or_create(
        &self,
        client_id: &str,
        website_id: &str,
    ) -> Result<(AccountRow, bool)> {
        if self.storage.get_client(client_id).await?.is_none() {
            return Err(CoreError::not_found("client", client_id));
        }
        if self.storage.get_website(website_id).await?.is_none() {
            return Err(CoreError::not_found("website", website_id));
        }

        let (row, created) = self
            .storage
            .insert_account_if_absent(client_id, website_id)
            .await?;
        if created {
            info!(account_id = %row.id, client_id, website_id, "provisioning record created");
        }
        Ok((row, created))
    }

    pub async fn get(&self, account_id: &str) -> Result<AccountRow> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| CoreError::not_found("account", account_id))
    }

    /// Move a record to `to`, appending exactly one event with the
    /// before/after steps and the supplied cause.
    ///
    /// Fails with `InvalidTransition` when `to` is not adjacent to the
    /// current step. The storage update is guarded on the observed step, so
    /// two racing transitions cannot both apply; the loser re-reads and
    /// gets the `InvalidTransition` its stale view deserves.
    pub async fn transition(
        &self,
        account_id: &str,
        to: RegistrationStep,
        cause: &str,
    ) -> Result<AccountRow> {
        loop {
            let current = self.get(account_id).await?;
            let from = RegistrationStep::from_str(&current.registration_step)?;

            if !from.next_steps().contains(&to) {
                return Err(CoreError::InvalidTransition {
                    from: from.as_str().to_string(),
                    to: to.as_str().to_string(),
                });
            }

            let message = format!("{} -> {}: {cause}", from.as_str(), to.as_str());
            let applied = self
                .storage
                .advance_account(
                    account_id,
                    from.as_str(),
                    to.as_str(),
                    to.status().as_str(),
                    &message,
                )
                .await?;
            if applied {
                info!(account_id, from = from.as_str(), to = to.as_str(), "account transitioned");
                return self.get(account_id).await;
            }
            // Lost a race with another writer; re-read and re-validate.
        }
    }

    /// Move a FAILED record back to PENDING, appending one retry event.
    ///
    /// Idempotent by design: retrying a record in any other state is a
    /// no-op that returns the record unchanged, so callers can retry
    /// blindly.
    pub async fn retry(&self, account_id: &str) -> Result<AccountRow> {
        loop {
            let current = self.get(account_id).await?;
            let from = RegistrationStep::from_str(&current.registration_step)?;
            if from != RegistrationStep::Failed {
                return Ok(current);
            }

            let applied = self
                .storage
                .advance_account(
                    account_id,
                    from.as_str(),
                    RegistrationStep::Pending.as_str(),
                    AccountStatus::Pending.as_str(),
                    "FAILED -> PENDING: retry requested",
                )
                .await?;
            if applied {
                info!(account_id, "account retry — back to PENDING");
                return self.get(account_id).await;
            }
        }
    }

    pub async fn list_by_client(&self, client_id: &str) -> Result<Vec<AccountRow>> {
        self.storage.list_accounts_by_client(client_id).await
    }

    pub async fn list_by_website(
        &self,
        website_id: &str,
        status: Option<AccountStatus>,
    ) -> Result<Vec<AccountRow>> {
        self.storage
            .list_accounts_by_website(website_id, status.map(|s| s.as_str()))
            .await
    }

    /// Admin listing across all records with optional filters, newest
    /// update first.
    pub async fn list(
        &self,
        client_id: Option<&str>,
        website_id: Option<&str>,
        status: Option<AccountStatus>,
    ) -> Result<Vec<AccountRow>> {
        self.storage
            .list_accounts(client_id, website_id, status.map(|s| s.as_str()))
            .await
    }

    /// Trailing events for a record, newest first.
    pub async fn events(&self, account_id: &str, limit: i64) -> Result<Vec<AccountEventRow>> {
        self.get(account_id).await?;
        self.storage.list_events(account_id, limit).await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
