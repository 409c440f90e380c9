use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppError;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

/// GPIO pin wired to each controllable light.
const DEVICE_PINS: &[(&str, u8)] = &[("livingroom-light", 0), ("bedroom-light", 1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchAction {
    On,
    Off,
}

impl SwitchAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "on" => Some(SwitchAction::On),
            "off" => Some(SwitchAction::Off),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchOutcome {
    pub pin: u8,
    pub level: bool,
    pub gateway_reply: Value,
}

pub fn pin_for(device_id: &str) -> Option<u8> {
    DEVICE_PINS
        .iter()
        .find(|(id, _)| *id == device_id)
        .map(|(_, pin)| *pin)
}

/// Forwards light switches to the local GPIO gateway.
pub struct SmartHomeGateway {
    client: Client,
    endpoint: String,
}

impl SmartHomeGateway {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    pub async fn switch(&self, device_id: &str, action: SwitchAction) -> Result<SwitchOutcome, AppError> {
        let pin = pin_for(device_id).ok_or_else(|| AppError::UnknownDevice(device_id.to_string()))?;
        let level = action == SwitchAction::On;

        tracing::info!("Smart home control: {} -> pin {}, level {}", device_id, pin, level);

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(GATEWAY_TIMEOUT)
            .json(&json!({ "pin": pin, "level": level }))
            .send()
            .await
            .map_err(|e| AppError::DeviceUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::DeviceUnreachable(format!("Gateway returned {}", status)));
        }

        // Gateways are not required to answer with JSON.
        let gateway_reply = response
            .json::<Value>()
            .await
            .unwrap_or_else(|_| json!({ "status": "ok" }));

        Ok(SwitchOutcome {
            pin,
            level,
            gateway_reply,
        })
    }
}
