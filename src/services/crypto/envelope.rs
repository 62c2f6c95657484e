//! AES-256-GCM envelope with PBKDF2 key derivation.
//!
//! Blob layout (base64, standard alphabet):
//! `[format (1)] [iterations u32 BE (4)] [salt (16)] [nonce (12)] [ciphertext+tag]`

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use async_lock::{Mutex, OnceCell};
use base64::{Engine, engine::general_purpose::STANDARD as B64};
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

const FORMAT_VERSION: u8 = 1;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const KEY_SIZE: usize = 32;
const HEADER_SIZE: usize = 1 + 4 + SALT_SIZE + NONCE_SIZE;
const MAX_KDF_ITERATIONS: u32 = 1_000_000;

/// PBKDF2 rounds used when the caller does not pick a count
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("passphrase must not be empty")]
    EmptyPassphrase,
    #[error("failed to encrypt secrets: {0}")]
    Encrypt(String),
    #[error("encrypted data is malformed: {0}")]
    Malformed(String),
    #[error("unsupported encrypted data format {0}")]
    UnsupportedFormat(u8),
    #[error("decryption failed: wrong passphrase or corrupted data")]
    Decrypt,
    #[error("encrypted records were not sealed with one shared key")]
    MixedKeys,
}

type Result<T> = std::result::Result<T, EnvelopeError>;

fn validate_iterations(iterations: u32) -> Result<()> {
    if iterations == 0 || iterations > MAX_KDF_ITERATIONS {
        return Err(EnvelopeError::Malformed(format!(
            "iteration count {} out of range",
            iterations
        )));
    }
    Ok(())
}

/// Derive a 256-bit key and build the cipher from it. Runs on the blocking pool.
async fn derive_cipher(
    passphrase: Zeroizing<String>,
    salt: [u8; SALT_SIZE],
    iterations: u32,
) -> Result<Aes256Gcm> {
    smol::unblock(move || {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), &salt, iterations, &mut *key);
        Aes256Gcm::new_from_slice(&*key).map_err(|e| EnvelopeError::Encrypt(e.to_string()))
    })
    .await
}

/// Encryption context for one export.
///
/// The salt is drawn once and the key derived on first use, so every blob
/// produced by the same `Encrypter` shares one derivation.
pub struct Encrypter {
    passphrase: Zeroizing<String>,
    iterations: u32,
    salt: [u8; SALT_SIZE],
    cipher: OnceCell<Aes256Gcm>,
}

impl Encrypter {
    pub fn new(passphrase: &str) -> Result<Self> {
        Self::with_iterations(passphrase, DEFAULT_KDF_ITERATIONS)
    }

    pub fn with_iterations(passphrase: &str, iterations: u32) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(EnvelopeError::EmptyPassphrase);
        }
        validate_iterations(iterations)?;

        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        Ok(Self {
            passphrase: Zeroizing::new(passphrase.to_string()),
            iterations,
            salt,
            cipher: OnceCell::new(),
        })
    }

    async fn cipher(&self) -> Result<&Aes256Gcm> {
        self.cipher
            .get_or_try_init(|| derive_cipher(self.passphrase.clone(), self.salt, self.iterations))
            .await
    }

    /// Seal `plaintext` into an opaque base64 string
    pub async fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher().await?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| EnvelopeError::Encrypt(e.to_string()))?;

        let mut output = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        output.push(FORMAT_VERSION);
        output.extend_from_slice(&self.iterations.to_be_bytes());
        output.extend_from_slice(&self.salt);
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);

        Ok(B64.encode(&output))
    }
}

type KeyParams = ([u8; SALT_SIZE], u32);

/// Decryption context for one import.
///
/// Every blob it opens must carry the same salt and iteration count, as blobs
/// from one `Encrypter` do, so at most one key is ever derived.
pub struct Decrypter {
    passphrase: Zeroizing<String>,
    key: Mutex<Option<(KeyParams, Aes256Gcm)>>,
}

impl Decrypter {
    pub fn new(passphrase: &str) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(EnvelopeError::EmptyPassphrase);
        }
        Ok(Self {
            passphrase: Zeroizing::new(passphrase.to_string()),
            key: Mutex::new(None),
        })
    }

    /// Open a blob produced by `Encrypter::encrypt`
    pub async fn decrypt(&self, blob: &str) -> Result<String> {
        let data = B64
            .decode(blob.trim())
            .map_err(|e| EnvelopeError::Malformed(format!("invalid base64: {}", e)))?;

        if data.is_empty() {
            return Err(EnvelopeError::Malformed("empty payload".into()));
        }
        if data[0] != FORMAT_VERSION {
            return Err(EnvelopeError::UnsupportedFormat(data[0]));
        }
        if data.len() < HEADER_SIZE + TAG_SIZE {
            return Err(EnvelopeError::Malformed("encrypted data too short".into()));
        }

        let mut iterations_bytes = [0u8; 4];
        iterations_bytes.copy_from_slice(&data[1..5]);
        let iterations = u32::from_be_bytes(iterations_bytes);
        validate_iterations(iterations)?;

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&data[5..5 + SALT_SIZE]);
        let nonce_bytes = &data[5 + SALT_SIZE..HEADER_SIZE];
        let ciphertext = &data[HEADER_SIZE..];

        let cipher = self.cipher_for(salt, iterations).await?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| EnvelopeError::Decrypt)?;

        String::from_utf8(plaintext)
            .map_err(|e| EnvelopeError::Malformed(format!("invalid UTF-8: {}", e)))
    }

    async fn cipher_for(&self, salt: [u8; SALT_SIZE], iterations: u32) -> Result<Aes256Gcm> {
        // Held across derivation so concurrent records derive only once
        let mut key = self.key.lock().await;
        match key.as_ref() {
            Some((params, cipher)) if *params == (salt, iterations) => return Ok(cipher.clone()),
            Some(_) => return Err(EnvelopeError::MixedKeys),
            None => {}
        }
        let cipher = derive_cipher(self.passphrase.clone(), salt, iterations).await?;
        *key = Some(((salt, iterations), cipher.clone()));
        Ok(cipher)
    }

    #[cfg(test)]
    async fn has_derived_key(&self) -> bool {
        self.key.lock().await.is_some()
    }
}
