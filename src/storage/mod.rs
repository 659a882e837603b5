pub mod audit;

use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Default timeout for individual SQLite queries.
/// Prevents a hung query from blocking a caller indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::Storage(sqlx::Error::PoolTimedOut)),
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

// ─── Rows ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ClientRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Globally unique, case-insensitive (UNIQUE COLLATE NOCASE).
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    /// ACTIVE | INACTIVE | SUSPENDED — permissive administrative toggle.
    pub status: String,
    /// Vault blob (`v1:…`). There is no plaintext column; None means the
    /// identifier was never collected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_national_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Derived: number of provisioning records owned by this client.
    pub account_count: i64,
    /// Derived: number of identity verifications recorded for this client.
    pub verification_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct WebsiteRow {
    pub id: String,
    pub name: String,
    pub url: String,
    pub category: String,
    /// Site-specific automation parameters, stored as an opaque JSON string.
    pub config: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    /// Derived: number of provisioning records targeting this site.
    pub account_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct AccountRow {
    pub id: String,
    pub client_id: String,
    pub website_id: String,
    /// Coarse outcome: PENDING | COMPLETED | FAILED.
    pub status: String,
    /// Fine-grained progress: PENDING | IN_PROGRESS | SUBMITTED | COMPLETED | FAILED.
    pub registration_step: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Append-only log entry attached to a provisioning record.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct AccountEventRow {
    pub id: String,
    pub account_id: String,
    /// None for the creation event.
    pub from_step: Option<String>,
    pub to_step: Option<String>,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct VerificationRow {
    pub id: String,
    pub client_id: String,
    pub kind: String,
    pub outcome: String,
    pub created_at: String,
}

/// A recent account event joined with display identifiers for the dashboard.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct RecentEventRow {
    pub id: String,
    pub account_id: String,
    pub from_step: Option<String>,
    pub to_step: Option<String>,
    pub message: String,
    pub created_at: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub website_name: String,
}

// ─── Insert / patch records ───────────────────────────────────────────────────

/// Fields persisted for a new client. The sensitive identifier arrives here
/// already sealed — the storage layer never sees plaintext.
#[derive(Debug, Clone)]
pub struct NewClientRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub encrypted_national_id: Option<String>,
}

/// Partial client update — `None` fields are left untouched. Email and date
/// of birth are immutable after registration.
#[derive(Debug, Clone, Default)]
pub struct ClientPatchRecord {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewWebsiteRecord {
    pub name: String,
    pub url: String,
    pub category: String,
    pub config: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WebsitePatchRecord {
    pub name: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub config: Option<String>,
    pub is_active: Option<bool>,
}

// ─── Storage ──────────────────────────────────────────────────────────────────

/// Client select with the derived counts the registry exposes on every read.
const CLIENT_SELECT: &str = "SELECT c.*,
    (SELECT COUNT(*) FROM accounts a WHERE a.client_id = c.id) AS account_count,
    (SELECT COUNT(*) FROM verifications v WHERE v.client_id = c.id) AS verification_count
    FROM clients c";

const WEBSITE_SELECT: &str = "SELECT w.*,
    (SELECT COUNT(*) FROM accounts a WHERE a.website_id = w.id) AS account_count
    FROM websites w";

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding
    /// it are logged at WARN level. Set to 0 to disable.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| CoreError::Storage(sqlx::Error::Io(e)))?;
        let db_path = data_dir.join("onboardd.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .foreign_keys(true)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            use sqlx::ConnectOptions;
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        // Idempotent schema bootstrap. The UNIQUE(client_id, website_id)
        // constraint on `accounts` is the serialization point for concurrent
        // onboarding — every other concurrency guarantee reduces to it.
        let stmts = [
            "CREATE TABLE IF NOT EXISTS clients (
                id                    TEXT PRIMARY KEY,
                first_name            TEXT NOT NULL,
                last_name             TEXT NOT NULL,
                email                 TEXT NOT NULL UNIQUE COLLATE NOCASE,
                phone                 TEXT NOT NULL,
                date_of_birth         TEXT NOT NULL,
                address               TEXT NOT NULL,
                city                  TEXT NOT NULL,
                state                 TEXT NOT NULL,
                zip_code              TEXT NOT NULL,
                country               TEXT NOT NULL DEFAULT 'US',
                status                TEXT NOT NULL DEFAULT 'ACTIVE',
                encrypted_national_id TEXT,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS websites (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                url        TEXT NOT NULL,
                category   TEXT NOT NULL,
                config     TEXT NOT NULL DEFAULT '{}',
                is_active  INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS accounts (
                id                TEXT PRIMARY KEY,
                client_id         TEXT NOT NULL REFERENCES clients(id),
                website_id        TEXT NOT NULL REFERENCES websites(id),
                status            TEXT NOT NULL DEFAULT 'PENDING',
                registration_step TEXT NOT NULL DEFAULT 'PENDING',
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL,
                UNIQUE (client_id, website_id)
            )",
            "CREATE TABLE IF NOT EXISTS account_events (
                id         TEXT PRIMARY KEY,
                account_id TEXT NOT NULL REFERENCES accounts(id),
                from_step  TEXT,
                to_step    TEXT,
                message    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS verifications (
                id         TEXT PRIMARY KEY,
                client_id  TEXT NOT NULL REFERENCES clients(id),
                kind       TEXT NOT NULL,
                outcome    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_accounts_client ON accounts (client_id)",
            "CREATE INDEX IF NOT EXISTS idx_accounts_website ON accounts (website_id)",
            "CREATE INDEX IF NOT EXISTS idx_events_account ON account_events (account_id)",
            "CREATE INDEX IF NOT EXISTS idx_events_created ON account_events (created_at)",
        ];
        for stmt in stmts {
            sqlx::query(stmt).execute(pool).await?;
        }
        Ok(())
    }

    // ─── Clients ────────────────────────────────────────────────────────────

    /// Insert a new client with lifecycle status ACTIVE.
    ///
    /// A UNIQUE violation on the email column maps to `DuplicateContact`;
    /// the uniqueness check and the insert are a single atomic statement.
    pub async fn insert_client(&self, rec: &NewClientRecord) -> Result<ClientRow> {
        let id = Uuid::new_v4().to_string();
        let now = now();
        let result = sqlx::query(
            "INSERT INTO clients (id, first_name, last_name, email, phone, date_of_birth,
                                  address, city, state, zip_code, country, status,
                                  encrypted_national_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'ACTIVE', ?, ?, ?)",
        )
        .bind(&id)
        .bind(&rec.first_name)
        .bind(&rec.last_name)
        .bind(&rec.email)
        .bind(&rec.phone)
        .bind(&rec.date_of_birth)
        .bind(&rec.address)
        .bind(&rec.city)
        .bind(&rec.state)
        .bind(&rec.zip_code)
        .bind(&rec.country)
        .bind(&rec.encrypted_national_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(CoreError::DuplicateContact(rec.email.clone()));
            }
            return Err(e.into());
        }
        self.get_client(&id)
            .await?
            .ok_or_else(|| CoreError::not_found("client", &id))
    }

    pub async fn get_client(&self, id: &str) -> Result<Option<ClientRow>> {
        Ok(
            sqlx::query_as(&format!("{CLIENT_SELECT} WHERE c.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Filtered, paginated client listing.
    ///
    /// `search` is a case-insensitive substring match over first name, last
    /// name, and email. `status` is an exact match. Ordering is
    /// `created_at DESC, id DESC` — the id tiebreak keeps pagination stable
    /// when rows share a timestamp.
    pub async fn list_clients(
        &self,
        search: Option<&str>,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ClientRow>, i64)> {
        let pattern = search.map(|s| format!("%{s}%"));
        with_timeout(async {
            let rows: Vec<ClientRow> = sqlx::query_as(&format!(
                "{CLIENT_SELECT}
                 WHERE (?1 IS NULL OR c.first_name LIKE ?1 OR c.last_name LIKE ?1 OR c.email LIKE ?1)
                   AND (?2 IS NULL OR c.status = ?2)
                 ORDER BY c.created_at DESC, c.id DESC
                 LIMIT ?3 OFFSET ?4"
            ))
            .bind(&pattern)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM clients c
                 WHERE (?1 IS NULL OR c.first_name LIKE ?1 OR c.last_name LIKE ?1 OR c.email LIKE ?1)
                   AND (?2 IS NULL OR c.status = ?2)",
            )
            .bind(&pattern)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

            Ok((rows, total))
        })
        .await
    }

    /// Apply a partial update; untouched fields keep their value.
    /// Returns `NotFound` when the id does not exist.
    pub async fn update_client(&self, id: &str, p: &ClientPatchRecord) -> Result<ClientRow> {
        let now = now();
        let result = sqlx::query(
            "UPDATE clients SET
                first_name = COALESCE(?, first_name),
                last_name  = COALESCE(?, last_name),
                phone      = COALESCE(?, phone),
                address    = COALESCE(?, address),
                city       = COALESCE(?, city),
                state      = COALESCE(?, state),
                zip_code   = COALESCE(?, zip_code),
                status     = COALESCE(?, status),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&p.first_name)
        .bind(&p.last_name)
        .bind(&p.phone)
        .bind(&p.address)
        .bind(&p.city)
        .bind(&p.state)
        .bind(&p.zip_code)
        .bind(&p.status)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("client", id));
        }
        self.get_client(id)
            .await?
            .ok_or_else(|| CoreError::not_found("client", id))
    }

    /// Delete a client, refusing with `Conflict` while any provisioning
    /// record references it. The ownership check runs inside the delete
    /// transaction so a concurrent `insert_account_if_absent` cannot slip
    /// between check and delete. Owned verifications are removed explicitly
    /// in the same transaction — no implicit cascades.
    pub async fn delete_client(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let accounts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE client_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if accounts > 0 {
            return Err(CoreError::Conflict(format!(
                "client {id} owns {accounts} provisioning record(s)"
            )));
        }

        sqlx::query("DELETE FROM verifications WHERE client_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(CoreError::not_found("client", id));
        }

        tx.commit().await?;
        Ok(())
    }

    // ─── Websites ───────────────────────────────────────────────────────────

    pub async fn insert_website(&self, rec: &NewWebsiteRecord) -> Result<WebsiteRow> {
        let id = Uuid::new_v4().to_string();
        let now = now();
        sqlx::query(
            "INSERT INTO websites (id, name, url, category, config, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&rec.name)
        .bind(&rec.url)
        .bind(&rec.category)
        .bind(&rec.config)
        .bind(rec.is_active)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_website(&id)
            .await?
            .ok_or_else(|| CoreError::not_found("website", &id))
    }

    pub async fn get_website(&self, id: &str) -> Result<Option<WebsiteRow>> {
        Ok(
            sqlx::query_as(&format!("{WEBSITE_SELECT} WHERE w.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn update_website(&self, id: &str, p: &WebsitePatchRecord) -> Result<WebsiteRow> {
        let now = now();
        let result = sqlx::query(
            "UPDATE websites SET
                name       = COALESCE(?, name),
                url        = COALESCE(?, url),
                category   = COALESCE(?, category),
                config     = COALESCE(?, config),
                is_active  = COALESCE(?, is_active),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&p.name)
        .bind(&p.url)
        .bind(&p.category)
        .bind(&p.config)
        .bind(p.is_active)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("website", id));
        }
        self.get_website(id)
            .await?
            .ok_or_else(|| CoreError::not_found("website", id))
    }

    pub async fn list_websites(&self, active_only: Option<bool>) -> Result<Vec<WebsiteRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(&format!(
                "{WEBSITE_SELECT}
                 WHERE (?1 IS NULL OR w.is_active = ?1)
                 ORDER BY w.name ASC"
            ))
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    // ─── Accounts (provisioning records) ────────────────────────────────────

    /// Atomic conditional insert of the (client, website) provisioning
    /// record. Under concurrent invocation exactly one caller creates the
    /// row; every other caller transparently reads the existing one.
    ///
    /// Returns `(row, created)`. The creation event is appended in the same
    /// transaction as the insert, so a record never exists without its
    /// creation log entry.
    pub async fn insert_account_if_absent(
        &self,
        client_id: &str,
        website_id: &str,
    ) -> Result<(AccountRow, bool)> {
        let id = Uuid::new_v4().to_string();
        let now = now();

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO accounts (id, client_id, website_id, status, registration_step,
                                   created_at, updated_at)
             VALUES (?, ?, ?, 'PENDING', 'PENDING', ?, ?)
             ON CONFLICT (client_id, website_id) DO NOTHING",
        )
        .bind(&id)
        .bind(client_id)
        .bind(website_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 1 {
            sqlx::query(
                "INSERT INTO account_events (id, account_id, from_step, to_step, message, created_at)
                 VALUES (?, ?, NULL, 'PENDING', 'provisioning record created', ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        let row: AccountRow = sqlx::query_as(
            "SELECT * FROM accounts WHERE client_id = ? AND website_id = ?",
        )
        .bind(client_id)
        .bind(website_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((row, inserted == 1))
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<AccountRow>> {
        Ok(sqlx::query_as("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Guarded step advance: the UPDATE only applies while the row is still
    /// at `from_step`, closing the TOCTOU window between reading the current
    /// step and writing the next one. Returns `false` when another writer
    /// got there first (or the row vanished); the caller re-reads and
    /// re-validates. The transition event is appended in the same
    /// transaction as the update.
    pub async fn advance_account(
        &self,
        id: &str,
        from_step: &str,
        to_step: &str,
        to_status: &str,
        message: &str,
    ) -> Result<bool> {
        let now = now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE accounts SET registration_step = ?, status = ?, updated_at = ?
             WHERE id = ? AND registration_step = ?",
        )
        .bind(to_step)
        .bind(to_status)
        .bind(&now)
        .bind(id)
        .bind(from_step)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO account_events (id, account_id, from_step, to_step, message, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(id)
        .bind(from_step)
        .bind(to_step)
        .bind(message)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn list_accounts_by_client(&self, client_id: &str) -> Result<Vec<AccountRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM accounts WHERE client_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn list_accounts_by_website(
        &self,
        website_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<AccountRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM accounts
             WHERE website_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id DESC",
        )
        .bind(website_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Cross-entity account listing for the admin surface, newest update
    /// first. All filters optional.
    pub async fn list_accounts(
        &self,
        client_id: Option<&str>,
        website_id: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<AccountRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT * FROM accounts
                 WHERE (?1 IS NULL OR client_id = ?1)
                   AND (?2 IS NULL OR website_id = ?2)
                   AND (?3 IS NULL OR status = ?3)
                 ORDER BY updated_at DESC, id DESC",
            )
            .bind(client_id)
            .bind(website_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    // ─── Account events ─────────────────────────────────────────────────────

    pub async fn list_events(&self, account_id: &str, limit: i64) -> Result<Vec<AccountEventRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM account_events WHERE account_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn count_events(&self, account_id: &str) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM account_events WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    /// Events newer than `since` (RFC-3339), joined with client and website
    /// display identifiers. Inner joins over FK-consistent rows — a row is
    /// either fully joined or absent, never dangling.
    pub async fn recent_events(&self, since: &str, limit: i64) -> Result<Vec<RecentEventRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT e.id, e.account_id, e.from_step, e.to_step, e.message, e.created_at,
                        c.first_name AS client_first_name,
                        c.last_name  AS client_last_name,
                        w.name       AS website_name
                 FROM account_events e
                 JOIN accounts a ON a.id = e.account_id
                 JOIN clients  c ON c.id = a.client_id
                 JOIN websites w ON w.id = a.website_id
                 WHERE e.created_at >= ?
                 ORDER BY e.created_at DESC, e.id DESC
                 LIMIT ?",
            )
            .bind(since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    // ─── Verifications ──────────────────────────────────────────────────────

    /// Record an identity-verification outcome against a client. Written by
    /// the external verification collaborator; the core itself only reads.
    pub async fn insert_verification(
        &self,
        client_id: &str,
        kind: &str,
        outcome: &str,
    ) -> Result<VerificationRow> {
        let id = Uuid::new_v4().to_string();
        let now = now();
        sqlx::query(
            "INSERT INTO verifications (id, client_id, kind, outcome, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(client_id)
        .bind(kind)
        .bind(outcome)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        let row = sqlx::query_as("SELECT * FROM verifications WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_verification(&self, id: &str) -> Result<Option<VerificationRow>> {
        Ok(sqlx::query_as("SELECT * FROM verifications WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_verifications_for_client(
        &self,
        client_id: &str,
    ) -> Result<Vec<VerificationRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM verifications WHERE client_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // ─── Aggregation counts ─────────────────────────────────────────────────

    pub async fn count_clients_with_status(&self, status: &str) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM clients WHERE status = ?")
                .bind(status)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    pub async fn count_active_websites(&self) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM websites WHERE is_active = 1")
                .fetch_one(&self.pool)
                .await?,
        )
    }

    pub async fn count_accounts(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn count_accounts_with_status(&self, status: &str) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE status = ?")
                .bind(status)
                .fetch_one(&self.pool)
                .await?,
        )
    }
}

/// SQLite reports constraint violations as database errors with an extended
/// code; sqlx exposes the classification directly.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
