//! Client registry — identity records, lifecycle status, and the sealed
//! sensitive identifier.
//!
//! Field-level validation (email syntax, phone pattern, date formats) is the
//! boundary layer's job; the registry defends its own invariants —
//! contact uniqueness, existence, deletion guard — independently.

use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::storage::audit::{AuditEntry, AuditLog};
use crate::storage::{
    AccountEventRow, AccountRow, ClientPatchRecord, ClientRow, NewClientRecord, Storage,
    VerificationRow,
};
use crate::vault::PiiVault;

/// How many trailing events are attached per account in the detail view.
const DETAIL_EVENT_LIMIT: i64 = 10;

// ─── Types ────────────────────────────────────────────────────────────────────

/// Client lifecycle status. Transitions are deliberately unrestricted
/// (any-to-any administrative toggle), not a guarded state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientStatus {
    Active,
    Inactive,
    Suspended,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl FromStr for ClientStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "SUSPENDED" => Ok(Self::Suspended),
            other => Err(CoreError::InvalidInput(format!(
                "unknown client status '{other}'"
            ))),
        }
    }
}

/// Registration input. `national_id` is the only field that never reaches
/// storage in the clear.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    /// Defaults to "US" when empty.
    pub country: String,
    /// Optional government-style identifier; sealed before persistence.
    pub national_id: Option<String>,
}

/// Partial update. Email and date of birth are immutable after
/// registration.
#[derive(Debug, Clone, Default)]
pub struct ClientPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub status: Option<ClientStatus>,
}

impl ClientPatch {
    fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.zip_code.is_none()
            && self.status.is_none()
    }
}

/// Enumerated list filter — replaces the original's dynamic where-clause
/// construction with an explicit configuration structure.
#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    /// Case-insensitive substring match over first name, last name, email.
    pub search: Option<String>,
    /// Exact lifecycle status match.
    pub status: Option<ClientStatus>,
}

/// Offset/limit pagination.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

/// An account with its trailing event log, as shown on the client detail
/// view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AccountWithEvents {
    #[serde(flatten)]
    pub account: AccountRow,
    pub events: Vec<AccountEventRow>,
}

/// The full per-client view: identity record, provisioning records with
/// recent events, and verification history.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: ClientRow,
    pub accounts: Vec<AccountWithEvents>,
    pub verifications: Vec<VerificationRow>,
}

// ─── Registry ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ClientRegistry {
    storage: Arc<Storage>,
    vault: Arc<PiiVault>,
    audit: Arc<AuditLog>,
}

impl ClientRegistry {
    pub fn new(storage: Arc<Storage>, vault: Arc<PiiVault>, audit: Arc<AuditLog>) -> Self {
        Self {
            storage,
            vault,
            audit,
        }
    }

    /// Register a new client with lifecycle status ACTIVE.
    ///
    /// Fails with `DuplicateContact` when the email already belongs to a
    /// client (case-insensitive). A supplied national id is sealed through
    /// the vault; the plaintext is dropped here and never persisted.
    pub async fn register(&self, input: NewClient) -> Result<ClientRow> {
        let encrypted_national_id = match &input.national_id {
            Some(plain) => Some(self.vault.seal(plain)?),
            None => None,
        };

        let country = if input.country.is_empty() {
            "US".to_string()
        } else {
            input.country
        };

        let rec = NewClientRecord {
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            date_of_birth: input.date_of_birth,
            address: input.address,
            city: input.city,
            state: input.state,
            zip_code: input.zip_code,
            country,
            encrypted_national_id,
        };

        let client = self.storage.insert_client(&rec).await?;
        info!(client_id = %client.id, "client registered");
        self.audit
            .append(&AuditEntry::new("register", &client.id, &client.email))
            .await;
        Ok(client)
    }

    /// Apply a partial update. Absent fields are untouched; status changes
    /// are unrestricted.
    pub async fn update(&self, id: &str, patch: ClientPatch) -> Result<ClientRow> {
        if patch.is_empty() {
            // Nothing to apply — still surface NotFound for a bad id.
            return self
                .storage
                .get_client(id)
                .await?
                .ok_or_else(|| CoreError::not_found("client", id));
        }

        let rec = ClientPatchRecord {
            first_name: patch.first_name,
            last_name: patch.last_name,
            phone: patch.phone,
            address: patch.address,
            city: patch.city,
            state: patch.state,
            zip_code: patch.zip_code,
            status: patch.status.map(|s| s.as_str().to_string()),
        };

        let client = self.storage.update_client(id, &rec).await?;
        info!(client_id = %client.id, "client updated");
        self.audit
            .append(&AuditEntry::new("update", &client.id, &client.email))
            .await;
        Ok(client)
    }

    pub async fn get(&self, id: &str) -> Result<ClientRow> {
        self.storage
            .get_client(id)
            .await?
            .ok_or_else(|| CoreError::not_found("client", id))
    }

    /// Client + accounts (each with trailing events) + verification history.
    pub async fn detail(&self, id: &str) -> Result<ClientDetail> {
        let client = self.get(id).await?;
        let rows = self.storage.list_accounts_by_client(id).await?;
        let mut accounts = Vec::with_capacity(rows.len());
        for account in rows {
            let events = self
                .storage
                .list_events(&account.id, DETAIL_EVENT_LIMIT)
                .await?;
            accounts.push(AccountWithEvents { account, events });
        }
        let verifications = self.storage.list_verifications_for_client(id).await?;
        Ok(ClientDetail {
            client,
            accounts,
            verifications,
        })
    }

    /// Decrypt the stored national id for an operator that needs it.
    /// Returns `None` when the identifier was never collected.
    pub async fn reveal_national_id(&self, id: &str) -> Result<Option<String>> {
        let client = self.get(id).await?;
        match client.encrypted_national_id {
            Some(blob) => Ok(Some(self.vault.open(&blob)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self, filter: &ClientFilter, page: Page) -> Result<(Vec<ClientRow>, i64)> {
        self.storage
            .list_clients(
                filter.search.as_deref(),
                filter.status.map(|s| s.as_str()),
                page.limit,
                page.offset,
            )
            .await
    }

    /// Remove a client. Fails with `Conflict` while any provisioning record
    /// references it; the ledger must never point at a vanished client.
    pub async fn remove(&self, id: &str) -> Result<()> {
        // Fetch first so the audit entry can carry the contact hash.
        let client = self.get(id).await?;
        self.storage.delete_client(id).await?;
        info!(client_id = %id, "client removed");
        self.audit
            .append(&AuditEntry::new("remove", id, &client.email))
            .await;
        Ok(())
    }

    pub async fn verifications(&self, client_id: &str) -> Result<Vec<VerificationRow>> {
        // Existence check so an unknown id is NotFound, not an empty list.
        self.get(client_id).await?;
        self.storage.list_verifications_for_client(client_id).await
    }

    pub async fn get_verification(&self, id: &str) -> Result<VerificationRow> {
        self.storage
            .get_verification(id)
            .await?
            .ok_or_else(|| CoreError::not_found("verification", id))
    }
}
