//! Text and image generation through the chat completions endpoint.

use serde_json::{Map, Value};
use tracing::debug;

use crate::api::images::{normalize_images, preview_url};
use crate::api::{ChatMessage, CompletionResponse};
use crate::core::chat_stream::decode_stream;
use crate::core::error::StoreError;
use crate::core::store::OpenRouterStore;
use crate::utils::url::{endpoint_url, CHAT_COMPLETIONS_ENDPOINT};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Progress callback for streamed generation: `(delta, text_so_far)`.
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(&str, &str) + Send);

/// Per-request options. Body overrides are applied on top of the defaults,
/// so anything set here wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub stream: bool,
    overrides: Map<String, Value>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming() -> Self {
        Self {
            stream: true,
            ..Self::default()
        }
    }

    pub fn temperature(self, temperature: f64) -> Self {
        self.param("temperature", temperature)
    }

    pub fn max_tokens(self, max_tokens: u32) -> Self {
        self.param("max_tokens", max_tokens)
    }

    /// Set an arbitrary request body field (`top_p`, `seed`, `provider`, ...).
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn overrides(&self) -> &Map<String, Value> {
        &self.overrides
    }
}

/// Result of an image generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedImages {
    /// Image URLs in response order; usually `data:` URLs.
    pub images: Vec<String>,
    /// Accompanying text, empty when the model returned none.
    pub text: String,
}

fn base_body(model: &str, prompt: &str) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::from(model));
    body.insert(
        "messages".to_string(),
        serde_json::to_value(vec![ChatMessage::user(prompt)]).unwrap_or(Value::Null),
    );
    body
}

pub(crate) fn text_request_body(
    model: &str,
    prompt: &str,
    options: &GenerationOptions,
    stream: bool,
) -> Map<String, Value> {
    let mut body = base_body(model, prompt);
    body.insert("temperature".to_string(), Value::from(DEFAULT_TEMPERATURE));
    body.insert("max_tokens".to_string(), Value::from(DEFAULT_MAX_TOKENS));
    body.extend(options.overrides().clone());
    if stream {
        body.insert("stream".to_string(), Value::Bool(true));
    } else {
        body.remove("stream");
    }
    body
}

pub(crate) fn image_request_body(
    model: &str,
    prompt: &str,
    options: &GenerationOptions,
) -> Map<String, Value> {
    let mut body = base_body(model, prompt);
    body.insert("modalities".to_string(), serde_json::json!(["image", "text"]));
    body.extend(options.overrides().clone());
    // The response is read as a single JSON document.
    body.insert("stream".to_string(), Value::Bool(false));
    body
}

impl OpenRouterStore {
    /// Generate text for a single user prompt.
    ///
    /// Streams when `options.stream` is set and `on_update` is given; the
    /// callback then sees every non-empty delta along with the text so far.
    /// Either way the complete text is returned.
    pub async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
        on_update: Option<ProgressCallback<'_>>,
    ) -> Result<String, StoreError> {
        let api_key = self.require_api_key().await?;

        match on_update.filter(|_| options.stream) {
            Some(on_update) => {
                let body = text_request_body(model, prompt, options, true);
                let response = self.post_completion(&api_key, body).await?;
                decode_stream(response.bytes_stream(), |delta, text| on_update(delta, text)).await
            }
            None => {
                let body = text_request_body(model, prompt, options, false);
                let response = self.post_completion(&api_key, body).await?;
                let message = read_first_message(response).await?;
                match message.content {
                    Some(Value::String(content)) if !content.is_empty() => Ok(content),
                    _ => Err(StoreError::invalid_response(
                        "missing choices[0].message.content",
                    )),
                }
            }
        }
    }

    /// Generate images (and optional text) for a single user prompt.
    pub async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GeneratedImages, StoreError> {
        let api_key = self.require_api_key().await?;

        let body = image_request_body(model, prompt, options);
        let response = self.post_completion(&api_key, body).await?;
        let message = read_first_message(response).await?;

        let images = normalize_images(message.images.as_ref());
        let text = match message.content {
            Some(Value::String(text)) => text,
            _ => String::new(),
        };

        debug!(
            model,
            images = ?images.iter().map(|url| preview_url(url)).collect::<Vec<_>>(),
            "extracted image URLs"
        );
        Ok(GeneratedImages { images, text })
    }

    async fn post_completion(
        &self,
        api_key: &str,
        body: Map<String, Value>,
    ) -> Result<reqwest::Response, StoreError> {
        let settings = self.settings();
        let mut request = self
            .http()
            .post(endpoint_url(&settings.base_url, CHAT_COMPLETIONS_ENDPOINT))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("X-Title", settings.app_title.as_str());
        if let Some(referer) = &settings.referer {
            request = request.header("HTTP-Referer", referer.as_str());
        }

        let response = request.json(&Value::Object(body)).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Http { status, body });
        }
        Ok(response)
    }
}

async fn read_first_message(
    response: reqwest::Response,
) -> Result<crate::api::CompletionMessage, StoreError> {
    let body = response.text().await?;
    let parsed: CompletionResponse = serde_json::from_str(&body)
        .map_err(|err| StoreError::invalid_response(format!("completion body: {err}")))?;
    parsed
        .into_first_message()
        .ok_or_else(|| StoreError::invalid_response("missing choices[0].message"))
}
