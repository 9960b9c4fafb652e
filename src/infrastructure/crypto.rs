//! Asymmetric body encryption
//!
//! Request bodies are split into chunks that fit one RSA-OAEP (SHA-256) block
//! each; the ciphertext is the concatenation of the encrypted chunks, every one
//! exactly `key size` bytes long. Keys are read from PEM, PKCS#8 or PKCS#1.

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::path::Path;
use thiserror::Error;

/// SHA-256 digest length, used for the OAEP padding overhead
const DIGEST_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("cannot load key {path}: {reason}")]
    Key { path: String, reason: String },

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Agent side: encrypts outgoing bodies with the server's public key
#[derive(Clone, Debug)]
pub struct MessageEncryptor {
    key: RsaPublicKey,
}

impl MessageEncryptor {
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::Key {
                path: "<inline>".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { key })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let pem = read_pem(path.as_ref())?;
        Self::from_pem(&pem).map_err(|e| with_path(e, path.as_ref()))
    }

    fn chunk_len(&self) -> usize {
        self.key.size() - 2 * DIGEST_LEN - 2
    }

    pub fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut rng = OsRng;
        let mut out = Vec::with_capacity(plain.len().div_ceil(self.chunk_len()) * self.key.size());
        for chunk in plain.chunks(self.chunk_len()) {
            let block = self
                .key
                .encrypt(&mut rng, Oaep::new::<Sha256>(), chunk)
                .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
            out.extend_from_slice(&block);
        }
        Ok(out)
    }
}

/// Server side: decrypts incoming bodies with the private key
#[derive(Clone)]
pub struct MessageDecryptor {
    key: RsaPrivateKey,
}

impl MessageDecryptor {
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::Key {
                path: "<inline>".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { key })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let pem = read_pem(path.as_ref())?;
        Self::from_pem(&pem).map_err(|e| with_path(e, path.as_ref()))
    }

    pub fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let block = self.key.size();
        if cipher.len() % block != 0 {
            return Err(CryptoError::Decrypt(format!(
                "ciphertext length {} is not a multiple of {}",
                cipher.len(),
                block
            )));
        }

        let mut out = Vec::with_capacity(cipher.len());
        for chunk in cipher.chunks(block) {
            let plain = self
                .key
                .decrypt(Oaep::new::<Sha256>(), chunk)
                .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
            out.extend_from_slice(&plain);
        }
        Ok(out)
    }
}

fn read_pem(path: &Path) -> Result<String, CryptoError> {
    std::fs::read_to_string(path).map_err(|e| CryptoError::Key {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn with_path(err: CryptoError, path: &Path) -> CryptoError {
    match err {
        CryptoError::Key { reason, .. } => CryptoError::Key {
            path: path.display().to_string(),
            reason,
        },
        other => other,
    }
}
