//! Local Secret Encryption
//!
//! API keys are stored as AES-256-GCM ciphertext. The key is derived with
//! PBKDF2-HMAC-SHA256 from a per-install passphrase kept in `secret.key`,
//! outside the database.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_dir;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const PASSPHRASE_SIZE: usize = 32;

fn derive_cipher(passphrase: &str, salt: &[u8]) -> Aes256Gcm {
    let mut derived_key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut derived_key);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived_key))
}

/// Encrypt `plaintext`. Returns base64 of `salt[16] || nonce[12] || ciphertext_with_tag`.
pub fn encrypt_secret(plaintext: &str, passphrase: &str) -> AppResult<String> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = derive_cipher(passphrase, &salt)
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| AppError::secret(format!("Encryption failed: {}", e)))?;

    let mut combined = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&salt);
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(combined))
}

/// Decrypt a value produced by [`encrypt_secret`].
pub fn decrypt_secret(encrypted: &str, passphrase: &str) -> AppResult<String> {
    let data = BASE64
        .decode(encrypted.trim())
        .map_err(|e| AppError::secret(format!("Base64 decode failed: {}", e)))?;

    // At least one byte of ciphertext
    if data.len() <= SALT_SIZE + NONCE_SIZE {
        return Err(AppError::secret("Invalid encrypted data: too short"));
    }

    let (salt, rest) = data.split_at(SALT_SIZE);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

    let plaintext = derive_cipher(passphrase, salt)
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| AppError::secret("Decryption failed: wrong secret key or corrupted data"))?;

    String::from_utf8(plaintext)
        .map_err(|e| AppError::secret(format!("Decrypted data is not valid UTF-8: {}", e)))
}

/// Read the install passphrase from `path`, generating it on first use.
pub fn load_or_create_passphrase(path: &Path) -> AppResult<String> {
    if path.exists() {
        let passphrase = std::fs::read_to_string(path)?.trim().to_string();
        if passphrase.is_empty() {
            return Err(AppError::secret(format!(
                "Secret key file is empty: {}",
                path.display()
            )));
        }
        return Ok(passphrase);
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut bytes = [0u8; PASSPHRASE_SIZE];
    OsRng.fill_bytes(&mut bytes);
    let passphrase = BASE64.encode(bytes);
    std::fs::write(path, &passphrase)?;
    restrict_permissions(path)?;
    tracing::info!(path = %path.display(), "generated local secret key");
    Ok(passphrase)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> AppResult<()> {
    Ok(())
}
