//! Append-only audit trail for client-registry mutations.
//!
//! Writes one JSON line per register/update/remove to
//! `{data_dir}/registry_audit.log`. The contact email is stored as a SHA-256
//! hex digest so the log carries no PII while still allowing correlation.
//! Rotates to `registry_audit.log.1` at 50 MB.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

/// Maximum audit log file size before rotation (50 MB).
const ROTATE_BYTES: u64 = 50 * 1024 * 1024;

// ─── Entry ────────────────────────────────────────────────────────────────────

/// One structured JSON line per registry mutation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// RFC-3339 timestamp of the mutation.
    pub timestamp: String,
    /// `"register"` | `"update"` | `"remove"`.
    pub action: String,
    /// Client row id the mutation targeted.
    pub client_id: String,
    /// Lowercase hex SHA-256 of the lowercased contact email.
    /// Allows correlation without storing the address itself.
    pub contact_hash: String,
}

impl AuditEntry {
    pub fn new(
        action: impl Into<String>,
        client_id: impl Into<String>,
        contact: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(contact.to_lowercase().as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        Self {
            timestamp: Utc::now().to_rfc3339(),
            action: action.into(),
            client_id: client_id.into(),
            contact_hash: hash,
        }
    }
}

// ─── Log ──────────────────────────────────────────────────────────────────────

/// Append-only structured audit log for registry mutations.
///
/// The file handle is cached for the process lifetime to avoid an `open()`
/// syscall per mutation.
pub struct AuditLog {
    path: PathBuf,
    /// Cached, open file handle; `None` until the first write.
    file: Mutex<Option<tokio::fs::File>>,
}

impl AuditLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("registry_audit.log"),
            file: Mutex::new(None),
        }
    }

    /// Append one entry. Errors are logged at WARN level and never
    /// propagated — a broken audit log must not fail the mutation it
    /// records.
    pub async fn append(&self, entry: &AuditEntry) {
        if let Err(e) = self.try_append(entry).await {
            tracing::warn!(err = %e, "registry audit log write failed");
        }
    }

    async fn try_append(&self, entry: &AuditEntry) -> Result<()> {
        let line = serde_json::to_string(entry)? + "\n";
        let bytes = line.as_bytes();

        let mut guard = self.file.lock().await;

        // Rotation check before (re)opening.
        if guard.is_some() {
            if let Ok(meta) = tokio::fs::metadata(&self.path).await {
                if meta.len() >= ROTATE_BYTES {
                    *guard = None; // drop file handle (flushes on drop)
                    let rotated = self.path.with_extension("log.1");
                    let _ = tokio::fs::rename(&self.path, &rotated).await;
                }
            }
        }

        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(f);
        }

        guard.as_mut().unwrap().write_all(bytes).await?;
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_hash_is_sha256_hex_and_case_insensitive() {
        let a = AuditEntry::new("register", "c1", "A@X.com");
        let b = AuditEntry::new("register", "c1", "a@x.com");
        assert_eq!(a.contact_hash.len(), 64);
        assert!(a.contact_hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.contact_hash, b.contact_hash);
    }

    #[test]
    fn entry_serialises_to_camel_case_without_contact() {
        let entry = AuditEntry::new("remove", "c2", "someone@example.com");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"clientId\""));
        assert!(json.contains("\"contactHash\""));
        assert!(!json.contains("someone@example.com"));
    }

    #[tokio::test]
    async fn appends_line_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        log.append(&AuditEntry::new("register", "c3", "x@y.com"))
            .await;

        let content = tokio::fs::read_to_string(dir.path().join("registry_audit.log"))
            .await
            .unwrap();
        assert!(content.contains("\"clientId\":\"c3\""));
        assert!(content.ends_with('\n'));
    }
}
