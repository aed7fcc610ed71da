//! Passphrase sealing of key material
//!
//! A secret is encrypted with AES-256-GCM under a key derived from the
//! account passphrase. The AEAD tag doubles as the passphrase check: a wrong
//! passphrase fails authentication and nothing else has to be stored.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

pub const CIPHER_NAME: &str = "aes-256-gcm";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid passphrase")]
    InvalidPassphrase,
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("sealed key is malformed: {0}")]
    Malformed(&'static str),
}

/// Key derivation function used for newly sealed keys
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "function")]
pub enum KdfSettings {
    #[serde(rename = "pbkdf2-sha256")]
    Pbkdf2 { iterations: u32 },
    #[serde(rename = "argon2id")]
    Argon2id {
        iterations: u32,
        memory_kib: u32,
        parallelism: u32,
    },
}

impl Default for KdfSettings {
    fn default() -> Self {
        Self::Pbkdf2 { iterations: 262_144 }
    }
}

/// KDF settings plus the per-key salt
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct KdfParams {
    #[serde(flatten)]
    pub settings: KdfSettings,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub salt: Vec<u8>,
}

/// An encrypted secret as persisted by the keystore backends
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SealedKey {
    pub cipher: String,
    pub kdf: KdfParams,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Derive the 256-bit encryption key for `passphrase`
pub fn derive_encryption_key(
    passphrase: &str,
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, AuthError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);

    match &params.settings {
        KdfSettings::Pbkdf2 { iterations } => {
            if *iterations == 0 {
                return Err(AuthError::KeyDerivation("pbkdf2 needs at least one iteration".to_string()));
            }
            pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), &params.salt, *iterations, &mut key[..]);
        }
        KdfSettings::Argon2id {
            iterations,
            memory_kib,
            parallelism,
        } => {
            let argon_params = Params::new(*memory_kib, *iterations, *parallelism, Some(KEY_LEN))
                .map_err(|e| AuthError::KeyDerivation(e.to_string()))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params)
                .hash_password_into(passphrase.as_bytes(), &params.salt, &mut key[..])
                .map_err(|e| AuthError::KeyDerivation(e.to_string()))?;
        }
    }

    Ok(key)
}

/// Encrypt `secret` under `passphrase` with a fresh salt and nonce
pub fn seal(secret: &[u8], passphrase: &str, settings: &KdfSettings) -> Result<SealedKey, AuthError> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let kdf = KdfParams {
        settings: settings.clone(),
        salt,
    };

    let key = derive_encryption_key(passphrase, &kdf)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| AuthError::EncryptionFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), secret)
        .map_err(|_| AuthError::EncryptionFailed)?;

    Ok(SealedKey {
        cipher: CIPHER_NAME.to_string(),
        kdf,
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Decrypt a sealed secret. Fails with `InvalidPassphrase` on a wrong passphrase.
pub fn unseal(sealed: &SealedKey, passphrase: &str) -> Result<Zeroizing<Vec<u8>>, AuthError> {
    if sealed.cipher != CIPHER_NAME {
        return Err(AuthError::Malformed("unsupported cipher"));
    }
    if sealed.nonce.len() != NONCE_LEN {
        return Err(AuthError::Malformed("bad nonce length"));
    }

    let key = derive_encryption_key(passphrase, &sealed.kdf)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| AuthError::EncryptionFailed)?;

    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| AuthError::InvalidPassphrase)
}
