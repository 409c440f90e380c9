pub mod parser;
pub mod prompts;

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use prompts::{Context, Language};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const UNAVAILABLE_MESSAGE: &str = "AI service temporarily unavailable";
const MIN_VALID_SUGGESTIONS: usize = 2;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionResponse {
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_generated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SuggestionResponse {
    fn fallback(cards: &str, language: Language, error: Option<&str>) -> Self {
        Self {
            suggestions: prompts::fallback_suggestions(cards, language),
            ai_generated: None,
            fallback: Some(true),
            error: error.map(str::to_string),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Generates sentence suggestions from the selected cards with a hosted
/// chat-completion model, degrading to fixed templates.
pub struct SuggestionService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl SuggestionService {
    pub fn new(api_key: Option<String>, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    pub async fn suggest(&self, cards: &str, language: Language, context: Context) -> SuggestionResponse {
        let Some(api_key) = &self.api_key else {
            tracing::warn!("OpenAI API key not configured, using fallback suggestions");
            return SuggestionResponse::fallback(cards, language, None);
        };

        let reply = match self.generate(api_key, cards, language, context).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Error generating AI suggestions: {}", e);
                return SuggestionResponse::fallback(cards, language, Some(UNAVAILABLE_MESSAGE));
            }
        };

        let valid: Vec<String> = parser::extract_sentences(&reply)
            .into_iter()
            .filter(|sentence| parser::mentions_cards(sentence, cards))
            .collect();

        if valid.len() >= MIN_VALID_SUGGESTIONS {
            SuggestionResponse {
                suggestions: valid,
                ai_generated: Some(true),
                fallback: None,
                error: None,
            }
        } else {
            tracing::debug!("Only {} usable suggestions, using fallback", valid.len());
            SuggestionResponse {
                suggestions: prompts::fallback_suggestions(cards, language),
                ai_generated: Some(false),
                fallback: None,
                error: None,
            }
        }
    }

    async fn generate(
        &self,
        api_key: &str,
        cards: &str,
        language: Language,
        context: Context,
    ) -> Result<String, AppError> {
        let user_prompt = prompts::user_prompt(cards, language, context);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts::system_prompt(language),
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 150,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Completion request returned {}",
                response.status()
            )));
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Upstream("Completion had no content".to_string()))
    }
}
