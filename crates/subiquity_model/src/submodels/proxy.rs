use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyModel {
    pub proxy: Option<String>,
    #[serde(skip)]
    configured: bool,
}

#[async_trait]
impl Controller for ProxyModel {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("proxy")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        if slice.is_null() {
            self.proxy = None;
            return Ok(());
        }
        let proxy = slice
            .as_str()
            .ok_or_else(|| AutoinstallError::Malformed("proxy".to_string()))?;
        self.proxy = Some(proxy.to_string());
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        self.proxy.clone().map(Value::String).unwrap_or(Value::Null)
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
