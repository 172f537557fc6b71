use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subiquity_core::types::IdentityData;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityModel {
    pub data: Option<IdentityData>,
    #[serde(skip)]
    configured: bool,
}

impl IdentityModel {
    /// Hashes a plaintext password with crypt(3) SHA-512, matching the
    /// on-disk `crypted_password` shape curtin expects.
    pub fn hash_password(plaintext: &str) -> Result<String, sha_crypt::CryptError> {
        let params = sha_crypt::Sha512Params::new(10_000).expect("rounds in range");
        sha_crypt::sha512_simple(plaintext, &params)
    }
}

#[async_trait]
impl Controller for IdentityModel {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("identity")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        self.data = Some(
            serde_json::from_value(slice)
                .map_err(|_| AutoinstallError::Malformed("identity".to_string()))?,
        );
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        self.data
            .as_ref()
            .and_then(|d| serde_json::to_value(d).ok())
            .unwrap_or(Value::Null)
    }

    fn configured(&self) -> bool {
        self.configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_produces_a_sha512_crypt_string() {
        let hash = IdentityModel::hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$6$"));
    }
}
