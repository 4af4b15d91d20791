// Workspace key material
// One symmetric key per workspace; every secret value and comment of the workspace is sealed with it

use base64::Engine;
use rand::RngCore;
use shared::error::CommonError;
use tracing::debug;

pub const WORKSPACE_KEY_LEN: usize = 32;

#[derive(Clone, PartialEq, Eq, zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct WorkspaceKey(Vec<u8>);

impl std::fmt::Debug for WorkspaceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WorkspaceKey(************)")
    }
}

impl WorkspaceKey {
    /// Generate a fresh random 256-bit key
    pub fn generate() -> Self {
        let mut key_bytes = vec![0u8; WORKSPACE_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        debug!("Generated workspace key");
        Self(key_bytes)
    }

    pub fn from_bytes(key_bytes: Vec<u8>) -> Result<Self, CommonError> {
        if key_bytes.len() != WORKSPACE_KEY_LEN {
            return Err(CommonError::InvalidRequest {
                msg: format!(
                    "Invalid workspace key length: expected {WORKSPACE_KEY_LEN} bytes, got {}",
                    key_bytes.len()
                ),
                source: None,
            });
        }
        Ok(Self(key_bytes))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CommonError> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CommonError::InvalidRequest {
                msg: "Workspace key is not valid base64".to_string(),
                source: Some(e.into()),
            })?;
        Self::from_bytes(key_bytes)
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
