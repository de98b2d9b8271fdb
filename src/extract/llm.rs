//! LLM-backed extraction over OpenAI-compatible chat completion APIs

use super::heuristic::pre_extract;
use super::{finish_record, ExtractionError, ExtractionRecord, Extractor, PageDocument, ResearchEntity, SchemaHint};
use crate::config::ExtractionConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You extract structured data about science and engineering \
research labs, their publications and their equipment from a single web page. Reply with \
exactly one JSON object following the schema you are given. Fill a field only when the page \
gives explicit evidence for it and leave everything else empty. If the page is not about a \
research lab, its research activities or a research-driven startup, return the schema with \
every field empty.";

/// One OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct LlmProvider {
    pub name: String,
    /// Base URL, e.g. `https://api.groq.com/openai/v1`
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Extractor that asks each configured provider in turn until one answers
pub struct LlmExtractor {
    client: Client,
    providers: Vec<LlmProvider>,
}

impl LlmExtractor {
    pub fn new(client: Client, providers: Vec<LlmProvider>) -> Self {
        Self { client, providers }
    }

    /// Builds providers from config, reading API keys from the environment
    ///
    /// Providers whose key variable is unset are skipped with a warning.
    pub fn from_config(client: Client, config: &ExtractionConfig) -> Self {
        let providers = config
            .providers
            .iter()
            .filter_map(|entry| match std::env::var(&entry.api_key_env) {
                Ok(api_key) if !api_key.is_empty() => Some(LlmProvider {
                    name: entry.name.clone(),
                    base_url: entry.base_url.trim_end_matches('/').to_string(),
                    model: entry.model.clone(),
                    api_key,
                }),
                _ => {
                    warn!(
                        "Provider '{}' disabled: {} is not set",
                        entry.name, entry.api_key_env
                    );
                    None
                }
            })
            .collect();

        Self::new(client, providers)
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    fn build_prompt(&self, page: &PageDocument, hint: &SchemaHint) -> String {
        let schema = serde_json::to_string_pretty(&ResearchEntity::default()).unwrap_or_default();
        let pre_extracted =
            serde_json::to_string_pretty(&pre_extract(&page.html, &page.url)).unwrap_or_default();
        let text: String = page.text.chars().take(hint.max_content_chars).collect();

        format!(
            "### Schema\n{}\n\n### Pre-extracted data (prefer these values)\n{}\n\n\
             ### Page URL\n{}\n\n### Page content\n{}\n\n### Output\n\
             Return one JSON object that follows the schema.",
            schema, pre_extracted, page.url, text
        )
    }

    /// Sends the prompt to one provider and returns the completion text
    async fn complete(&self, provider: &LlmProvider, prompt: &str) -> Result<String, String> {
        let request = ChatRequest {
            model: &provider.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", provider.base_url))
            .bearer_auth(&provider.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status.as_u16(), body));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| e.to_string())?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "empty completion".to_string())
    }
}

/// Parses the span from the first `{` to the last `}` as an entity
pub(crate) fn parse_entity(completion: &str) -> Result<ResearchEntity, ExtractionError> {
    let (Some(start), Some(end)) = (completion.find('{'), completion.rfind('}')) else {
        return Err(ExtractionError::Malformed(
            "no JSON object in completion".to_string(),
        ));
    };
    if end < start {
        return Err(ExtractionError::Malformed(
            "no JSON object in completion".to_string(),
        ));
    }

    serde_json::from_str(&completion[start..=end])
        .map_err(|e| ExtractionError::Malformed(e.to_string()))
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(
        &self,
        page: &PageDocument,
        hint: &SchemaHint,
    ) -> Result<ExtractionRecord, ExtractionError> {
        if self.providers.is_empty() {
            return Err(ExtractionError::UpstreamUnavailable(
                "no LLM provider configured".to_string(),
            ));
        }

        let prompt = self.build_prompt(page, hint);
        let mut malformed: Option<ExtractionError> = None;
        let mut unreachable = Vec::new();

        for provider in &self.providers {
            let completion = match self.complete(provider, &prompt).await {
                Ok(completion) => completion,
                Err(e) => {
                    warn!("Provider '{}' failed: {}", provider.name, e);
                    unreachable.push(format!("{}: {}", provider.name, e));
                    continue;
                }
            };

            match parse_entity(&completion) {
                Ok(entity) => {
                    debug!("Provider '{}' extracted {}", provider.name, page.url);
                    return finish_record(entity, hint);
                }
                Err(e) => {
                    warn!("Provider '{}' returned unusable output: {}", provider.name, e);
                    malformed = Some(e);
                }
            }
        }

        Err(malformed.unwrap_or_else(|| {
            ExtractionError::UpstreamUnavailable(unreachable.join("; "))
        }))
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}
