use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subiquity_core::types::SshData;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshModel {
    pub data: SshData,
    #[serde(skip)]
    configured: bool,
}

#[async_trait]
impl Controller for SshModel {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("ssh")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        self.data = serde_json::from_value(slice)
            .map_err(|_| AutoinstallError::Malformed("ssh".to_string()))?;
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        serde_json::to_value(&self.data).unwrap_or(Value::Null)
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
