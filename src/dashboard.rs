//! Aggregation engine — derived, read-only rollups over the ledger and
//! registry for reporting. Recomputed on demand; tolerates being slightly
//! stale relative to concurrent writers, never blocks them.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::error::Result;
use crate::storage::{RecentEventRow, Storage};

/// Counts by coarse status plus the completion rate, as shown on the
/// dashboard header.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DashboardStats {
    pub active_clients: i64,
    pub active_websites: i64,
    pub total_accounts: i64,
    pub pending_accounts: i64,
    pub completed_accounts: i64,
    pub failed_accounts: i64,
    /// completed / total × 100, one decimal. Exactly 0.0 when there are no
    /// accounts — never a division fault.
    pub completion_rate: f64,
}

#[derive(Clone)]
pub struct Dashboard {
    storage: Arc<Storage>,
    /// Recent-activity window in days.
    window_days: i64,
    /// Maximum rows returned by `recent_events`.
    event_limit: i64,
}

impl Dashboard {
    pub fn new(storage: Arc<Storage>, window_days: i64, event_limit: i64) -> Self {
        Self {
            storage,
            window_days,
            event_limit,
        }
    }

    pub async fn stats(&self) -> Result<DashboardStats> {
        let active_clients = self.storage.count_clients_with_status("ACTIVE").await?;
        let active_websites = self.storage.count_active_websites().await?;
        let total_accounts = self.storage.count_accounts().await?;
        let pending_accounts = self.storage.count_accounts_with_status("PENDING").await?;
        let completed_accounts = self.storage.count_accounts_with_status("COMPLETED").await?;
        let failed_accounts = self.storage.count_accounts_with_status("FAILED").await?;

        let completion_rate = if total_accounts > 0 {
            let pct = completed_accounts as f64 / total_accounts as f64 * 100.0;
            (pct * 10.0).round() / 10.0
        } else {
            0.0
        };

        Ok(DashboardStats {
            active_clients,
            active_websites,
            total_accounts,
            pending_accounts,
            completed_accounts,
            failed_accounts,
            completion_rate,
        })
    }

    /// Ledger events from the configured window, newest first, joined with
    /// client and website display names.
    pub async fn recent_events(&self) -> Result<Vec<RecentEventRow>> {
        let since = (Utc::now() - Duration::days(self.window_days)).to_rfc3339();
        self.storage.recent_events(&since, self.event_limit).await
    }
}
