use async_trait::async_trait;
use serde_json::Value;
use subiquity_core::types::{RefreshStatus, SnapInfo, SnapSelection};

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Default)]
pub struct SnaplistModel {
    pub status: RefreshStatus,
    pub available: Vec<SnapInfo>,
    pub selections: Vec<SnapSelection>,
    configured: bool,
}

#[async_trait]
impl Controller for SnaplistModel {
    fn name(&self) -> &'static str {
        "snaplist"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("snaps")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        self.selections = serde_json::from_value(slice)
            .map_err(|_| AutoinstallError::Malformed("snaps".to_string()))?;
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        serde_json::to_value(&self.selections).unwrap_or(Value::Null)
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
