use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::{Arc, Mutex, PoisonError};

use super::{
    DeviceControlRequest, DeviceControlResponse, DeviceFailureResponse, HealthResponse,
    SpeakRequest, SpeakResponse, StopResponse, SuggestionRequest, SupportQuery, VoicesResponse,
};
use crate::api::routes::AppState;
use crate::error::AppError;
use crate::smart_home::SwitchAction;
use crate::speech::{SpeakCallbacks, SpeechSupport, UtteranceRequest};
use crate::suggestions::prompts::{Context, Language};
use crate::suggestions::SuggestionResponse;

const MAX_TEXT_CHARS: usize = 10000;

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn speak(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpeakRequest>,
) -> Result<Json<SpeakResponse>, AppError> {
    // Validate input
    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("Text cannot be empty".into()));
    }

    if request.text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::BadRequest(
            "Text too long (max 10000 chars)".into(),
        ));
    }

    let mut utterance = UtteranceRequest::new(request.text, request.language);
    if let Some(rate) = request.rate {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(AppError::BadRequest("Rate must be greater than zero".into()));
        }
        utterance = utterance.with_rate(rate);
    }
    if let Some(pitch) = request.pitch {
        if !(pitch.is_finite() && pitch >= 0.0) {
            return Err(AppError::BadRequest("Pitch cannot be negative".into()));
        }
        utterance = utterance.with_pitch(pitch);
    }

    let failure = Arc::new(Mutex::new(None::<String>));
    let callbacks = SpeakCallbacks::new().on_error({
        let failure = Arc::clone(&failure);
        move |reason| {
            failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_or_insert_with(|| reason.to_string());
        }
    });

    let submitted = state.speech.speak(utterance, callbacks).await;
    let error = if submitted {
        None
    } else {
        failure.lock().unwrap_or_else(PoisonError::into_inner).take()
    };

    Ok(Json(SpeakResponse { submitted, error }))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    state.speech.stop().await;
    Json(StopResponse {
        status: "stopped".to_string(),
    })
}

pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: state.speech.list_voices(),
    })
}

pub async fn speech_support(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SupportQuery>,
) -> Json<SpeechSupport> {
    let language = query.language.unwrap_or_else(|| "en".to_string());
    Json(state.speech.check_support(&language).await)
}

pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SuggestionRequest>,
) -> Result<Json<SuggestionResponse>, AppError> {
    let (Some(cards), Some(language)) = (required(request.cards), required(request.language)) else {
        return Err(AppError::BadRequest("Missing required fields".into()));
    };

    if !request.categories.is_empty() {
        tracing::debug!("Suggestion categories: {:?}", request.categories);
    }

    let response = state
        .suggestions
        .suggest(
            &cards,
            Language::from_tag(&language),
            Context::from_key(request.context.as_deref()),
        )
        .await;

    Ok(Json(response))
}

pub async fn smart_home_control(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeviceControlRequest>,
) -> Result<Response, AppError> {
    let (Some(device_id), Some(action), Some(device_type)) = (
        required(request.device_id),
        required(request.action),
        required(request.device_type),
    ) else {
        return Err(AppError::BadRequest("Missing required fields".into()));
    };

    let action = SwitchAction::parse(&action)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown action '{}'", action)))?;

    tracing::debug!(
        "Switching {} ({}) in {}",
        device_id,
        device_type,
        request.room.as_deref().unwrap_or("unknown room")
    );

    match state.smart_home.switch(&device_id, action).await {
        Ok(outcome) => Ok(Json(DeviceControlResponse {
            success: true,
            device_id,
            action,
            pin: outcome.pin,
            level: outcome.level,
            timestamp: chrono::Utc::now().to_rfc3339(),
            esp_response: outcome.gateway_reply,
        })
        .into_response()),
        Err(AppError::DeviceUnreachable(details)) => {
            tracing::error!("Smart home gateway call failed: {}", details);
            Ok((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DeviceFailureResponse {
                    error: "Failed to communicate with smart home device".to_string(),
                    details,
                    device_id,
                    action,
                }),
            )
                .into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        speech_available: state.speech.is_available(),
    })
}
