use std::path::PathBuf;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

/// Runtime settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub espeak_binary: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub suggestions_model: String,
    pub smart_home_endpoint: String,
    pub settle_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port: parse_number("PORT", lookup("PORT"), 3000)?,
            static_dir: var("STATIC_DIR", "./static").into(),
            espeak_binary: var("ESPEAK_BINARY", "espeak-ng"),
            openai_api_key: lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty()),
            openai_base_url: var("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            suggestions_model: var("SUGGESTIONS_MODEL", "gpt-4o-mini"),
            smart_home_endpoint: var("SMART_HOME_ENDPOINT", "http://node.local/esp/gpio/write"),
            settle_delay: Duration::from_millis(parse_number(
                "SPEECH_SETTLE_MS",
                lookup("SPEECH_SETTLE_MS"),
                100,
            )?),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}
