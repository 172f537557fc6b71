use async_trait::async_trait;
use serde_json::Value;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Default)]
pub struct TimezoneModel {
    pub timezone: Option<String>,
    configured: bool,
}

#[async_trait]
impl Controller for TimezoneModel {
    fn name(&self) -> &'static str {
        "timezone"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("timezone")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        let tz = slice
            .as_str()
            .ok_or_else(|| AutoinstallError::Malformed("timezone".to_string()))?;
        self.timezone = Some(tz.to_string());
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        self.timezone.clone().map(Value::String).unwrap_or(Value::Null)
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
