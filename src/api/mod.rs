pub mod handlers;
pub mod routes;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::smart_home::SwitchAction;
use crate::speech::VoiceDescriptor;

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    pub language: String,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct SpeakResponse {
    pub submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<VoiceDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct SupportQuery {
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub cards: Option<String>,
    pub language: Option<String>,
    pub context: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceControlRequest {
    pub device_id: Option<String>,
    pub action: Option<String>,
    pub device_type: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceControlResponse {
    pub success: bool,
    pub device_id: String,
    pub action: SwitchAction,
    pub pin: u8,
    pub level: bool,
    pub timestamp: String,
    pub esp_response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFailureResponse {
    pub error: String,
    pub details: String,
    pub device_id: String,
    pub action: SwitchAction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub speech_available: bool,
}
