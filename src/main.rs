use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod smart_home;
mod speech;
mod suggestions;

use api::routes::{create_router, AppState};
use config::Config;
use smart_home::SmartHomeGateway;
use speech::{PlaybackTiming, SpeechController, SpeechEngine};
use suggestions::SuggestionService;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid address");

    tracing::info!("AAC Speech Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Starting server on http://{}", addr);
    tracing::info!("Static UI directory: {}", config.static_dir.display());

    let timing = PlaybackTiming {
        settle_delay: config.settle_delay,
        ..PlaybackTiming::default()
    };
    let speech = SpeechController::new(detect_engine(&config), timing);

    let state = Arc::new(AppState {
        speech,
        suggestions: SuggestionService::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            config.suggestions_model.clone(),
        ),
        smart_home: SmartHomeGateway::new(config.smart_home_endpoint.clone()),
    });

    let app = create_router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

#[cfg(feature = "audio-playback")]
fn detect_engine(config: &Config) -> Option<Arc<dyn SpeechEngine>> {
    match speech::espeak::EspeakEngine::detect(&config.espeak_binary) {
        Ok(engine) => {
            tracing::info!("Speech engine: {}", config.espeak_binary);
            Some(Arc::new(engine))
        }
        Err(e) => {
            tracing::warn!("Speech output disabled: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "audio-playback"))]
fn detect_engine(_config: &Config) -> Option<Arc<dyn SpeechEngine>> {
    tracing::warn!("Built without audio-playback, speech output disabled");
    None
}
