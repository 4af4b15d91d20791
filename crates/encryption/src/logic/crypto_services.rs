use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng},
};
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use utoipa::ToSchema;

use crate::logic::workspace_key::{WORKSPACE_KEY_LEN, WorkspaceKey};

const NONCE_LEN: usize = 12;

/// Base64 of `[nonce (12 bytes) | AES-256-GCM ciphertext]`
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
#[serde(transparent)]
pub struct EncryptedString(pub String);

impl std::fmt::Debug for EncryptedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptedString(************)")
    }
}

// encryption services

#[derive(Clone, Debug)]
pub struct CryptoService {
    workspace_key: WorkspaceKey,
}

impl CryptoService {
    pub fn new(workspace_key: WorkspaceKey) -> Self {
        Self { workspace_key }
    }

    fn cipher(&self) -> Result<Aes256Gcm, CommonError> {
        let key_bytes = self.workspace_key.as_bytes();
        if key_bytes.len() != WORKSPACE_KEY_LEN {
            return Err(CommonError::Unknown(anyhow::anyhow!(
                "Invalid key length: expected 32 bytes for AES-256, got {}",
                key_bytes.len()
            )));
        }
        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Aes256Gcm::new(key))
    }
}

#[derive(Clone, Debug)]
pub struct EncryptionService(pub CryptoService);

impl EncryptionService {
    pub fn new(crypto_service: CryptoService) -> Self {
        Self(crypto_service)
    }

    pub fn encrypt_data(&self, data: &str) -> Result<EncryptedString, CommonError> {
        let cipher = self.0.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, data.as_bytes())
            .map_err(|e| CommonError::Unknown(anyhow::anyhow!("Encryption failed: {e}")))?;

        let mut result = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        let encoded = base64::engine::general_purpose::STANDARD.encode(&result);
        Ok(EncryptedString(encoded))
    }
}

#[derive(Clone, Debug)]
pub struct DecryptionService(pub CryptoService);

impl DecryptionService {
    pub fn new(crypto_service: CryptoService) -> Self {
        Self(crypto_service)
    }

    pub fn decrypt_data(&self, data: &EncryptedString) -> Result<String, CommonError> {
        let encrypted_data = base64::engine::general_purpose::STANDARD
            .decode(&data.0)
            .map_err(|e| CommonError::Unknown(anyhow::anyhow!("Failed to decode base64: {e}")))?;

        if encrypted_data.len() < NONCE_LEN {
            return Err(CommonError::Unknown(anyhow::anyhow!(
                "Invalid encrypted data: too short (expected at least 12 bytes for nonce)"
            )));
        }

        let (nonce, ciphertext) = encrypted_data.split_at(NONCE_LEN);
        let cipher = self.0.cipher()?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CommonError::Unknown(anyhow::anyhow!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext).map_err(|e| {
            CommonError::Unknown(anyhow::anyhow!("Invalid UTF-8 in decrypted data: {e}"))
        })
    }
}

/// Build both directions of the capability from one workspace key
pub fn crypto_services_for(workspace_key: &WorkspaceKey) -> (EncryptionService, DecryptionService) {
    let crypto_service = CryptoService::new(workspace_key.clone());
    (
        EncryptionService::new(crypto_service.clone()),
        DecryptionService::new(crypto_service),
    )
}
