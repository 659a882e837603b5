//! PII vault — selective field encryption for the client's optional
//! national-id before it is persisted.
//!
//! Cipher: ChaCha20-Poly1305 AEAD, key derived via HKDF-SHA256 from either a
//! raw 32-byte key or a secret string.
//!
//! Blob format (self-describing for future key rotation):
//!   `v1:<base64url-nopad of: nonce_12 || ciphertext+tag>`
//!
//! A fresh random nonce is drawn per `seal`, so sealing the same plaintext
//! twice yields different blobs; both decrypt to the same value. The vault
//! holds no state beyond the cipher — it does not know which rows were
//! sealed.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Format version prefix. Bump (and keep the old arm in `open`) when the
/// algorithm or layout changes.
const V1_PREFIX: &str = "v1:";
const NONCE_LEN: usize = 12;

/// HKDF info string — versioned so a future v2 derives an independent key
/// from the same master secret.
const KDF_INFO: &[u8] = b"onboardd-pii-v1";

/// Name of the generated key file under the data directory.
const KEY_FILE: &str = "vault.key";

pub struct PiiVault {
    cipher: ChaCha20Poly1305,
}

impl PiiVault {
    /// Build a vault from a raw 32-byte key.
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Derive the cipher key from an arbitrary secret string (HKDF-SHA256).
    pub fn from_secret(secret: &str) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(KDF_INFO, &mut okm)
            .map_err(|_| CoreError::Decryption("HKDF expand failed".into()))?;
        Ok(Self::new(&okm))
    }

    /// Load the key from `{data_dir}/vault.key` (hex), generating a random
    /// key on first run. The key file is the only copy — losing it makes
    /// every stored blob permanently unreadable.
    pub fn load_or_generate(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(KEY_FILE);
        if path.exists() {
            let hex_key = std::fs::read_to_string(&path)?;
            let raw = hex::decode(hex_key.trim())
                .map_err(|e| anyhow::anyhow!("vault key file is not valid hex: {e}"))?;
            let key: [u8; 32] = raw
                .try_into()
                .map_err(|_| anyhow::anyhow!("vault key must be 32 bytes"))?;
            return Ok(Self::new(&key));
        }

        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(&path, hex::encode(key))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        tracing::info!(path = %path.display(), "generated new vault key");
        Ok(Self::new(&key))
    }

    /// Encrypt a plaintext field into a storable blob.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ct = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CoreError::Decryption("AEAD encrypt failed".into()))?;

        let mut payload = nonce_bytes.to_vec();
        payload.extend_from_slice(&ct);
        Ok(format!("{V1_PREFIX}{}", URL_SAFE_NO_PAD.encode(payload)))
    }

    /// Decrypt a blob produced by `seal`. Fails with `CoreError::Decryption`
    /// on any malformation — never returns garbage plaintext (the Poly1305
    /// tag authenticates the ciphertext).
    pub fn open(&self, blob: &str) -> Result<String> {
        let Some(b64) = blob.strip_prefix(V1_PREFIX) else {
            return Err(CoreError::Decryption(
                "unknown vault blob version".into(),
            ));
        };
        let data = URL_SAFE_NO_PAD
            .decode(b64)
            .map_err(|_| CoreError::Decryption("invalid blob encoding".into()))?;
        if data.len() < NONCE_LEN {
            return Err(CoreError::Decryption("blob too short".into()));
        }
        let (nonce_bytes, ct) = data.split_at(NONCE_LEN);

        let pt = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ct)
            .map_err(|_| CoreError::Decryption("AEAD decrypt failed".into()))?;
        String::from_utf8(pt)
            .map_err(|_| CoreError::Decryption("plaintext is not valid UTF-8".into()))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
