use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorModel {
    pub uri: Option<String>,
    pub geoip_done: bool,
    #[serde(skip)]
    configured: bool,
}

#[async_trait]
impl Controller for MirrorModel {
    fn name(&self) -> &'static str {
        "mirror"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("mirror")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        let uri = slice
            .get("uri")
            .and_then(|v| v.as_str())
            .or_else(|| slice.as_str())
            .ok_or_else(|| AutoinstallError::Malformed("mirror".to_string()))?;
        self.uri = Some(uri.to_string());
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        match &self.uri {
            Some(uri) => serde_json::json!({"uri": uri}),
            None => Value::Null,
        }
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
