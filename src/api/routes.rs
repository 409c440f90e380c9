use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers;
use crate::smart_home::SmartHomeGateway;
use crate::speech::SpeechController;
use crate::suggestions::SuggestionService;

pub struct AppState {
    pub speech: SpeechController,
    pub suggestions: SuggestionService,
    pub smart_home: SmartHomeGateway,
}

pub fn create_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/speak", post(handlers::speak))
        .route("/stop", post(handlers::stop))
        .route("/voices", get(handlers::list_voices))
        .route("/voices/support", get(handlers::speech_support))
        .route("/suggestions", post(handlers::suggestions))
        .route("/smart-home/control", post(handlers::smart_home_control))
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
