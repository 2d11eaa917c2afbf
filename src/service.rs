use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::codec::{decode_base64, encode_base64};
use crate::error::{LabError, LabResult};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";
const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];
const API_BASE_ENV_VAR: &str = "VISION_LAB_API_BASE";

/// The external image generation and analysis provider.
///
/// Calls block the current thread; the UI runs them on worker threads. There
/// is no retry: one failed attempt is reported as-is.
pub trait GenerativeImageService: Send + Sync {
    fn generate(&self, prompt: &str, model: &str) -> LabResult<Vec<u8>>;

    fn edit(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        prompt: &str,
        model: &str,
    ) -> LabResult<Vec<u8>>;

    fn analyze(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        prompt: &str,
        model: &str,
    ) -> LabResult<String>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: normalize_base_url(base_url),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    /// Reads the API key and optional base URL override from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = API_KEY_ENV_VARS
            .iter()
            .find_map(|name| env::var(name).ok())
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            log::warn!("No API key found in GEMINI_API_KEY or API_KEY; requests will fail");
        }
        let base_url =
            env::var(API_BASE_ENV_VAR).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Self::new(&base_url, api_key)
    }

    fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("No API key configured. Set GEMINI_API_KEY.");
        };
        let url = generate_content_url(&self.base_url, model);
        log::info!("Calling {model} generateContent");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .with_context(|| format!("HTTP request failed for {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .unwrap_or_else(|_| String::from("unable to read error body"));
            bail!("HTTP {status} for {url}: {detail}");
        }

        let body = response
            .text()
            .with_context(|| format!("Could not read response body from {url}"))?;
        parse_response(&body)
    }

    fn request_image(&self, model: &str, request: &GenerateContentRequest) -> Result<Vec<u8>> {
        let response = self.generate_content(model, request)?;
        let payload = first_inline_image(&response)?;
        decode_base64(payload).map_err(anyhow::Error::new)
    }
}

impl GenerativeImageService for GeminiClient {
    fn generate(&self, prompt: &str, model: &str) -> LabResult<Vec<u8>> {
        let request = image_request(None, prompt);
        self.request_image(model, &request)
            .map_err(|err| service_error("Failed to generate image.", err))
    }

    fn edit(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        prompt: &str,
        model: &str,
    ) -> LabResult<Vec<u8>> {
        let request = image_request(Some((image_bytes, mime_type)), prompt);
        self.request_image(model, &request)
            .map_err(|err| service_error("Failed to edit image.", err))
    }

    fn analyze(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        prompt: &str,
        model: &str,
    ) -> LabResult<String> {
        let request = GenerateContentRequest {
            contents: content_parts(Some((image_bytes, mime_type)), prompt),
            generation_config: None,
        };
        self.generate_content(model, &request)
            .and_then(|response| response_text(&response))
            .map_err(|err| service_error("Failed to analyze image.", err))
    }
}

fn service_error(action: &str, err: anyhow::Error) -> LabError {
    log::error!("{action} {err:#}");
    LabError::service(format!("{action} {err:#}"))
}

fn build_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(120))
        .build()
        .context("Could not initialize HTTP client for the image service")
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_API_BASE.to_string();
    }
    trimmed.to_string()
}

fn generate_content_url(base: &str, model: &str) -> String {
    format!("{base}/v1beta/models/{}:generateContent", model.trim())
}

fn content_parts(image: Option<(&[u8], &str)>, prompt: &str) -> Content {
    let mut parts = Vec::with_capacity(2);
    if let Some((bytes, mime_type)) = image {
        parts.push(Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: encode_base64(bytes),
            }),
        });
    }
    parts.push(Part {
        text: Some(prompt.to_string()),
        inline_data: None,
    });
    Content { parts }
}

fn image_request(image: Option<(&[u8], &str)>, prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: content_parts(image, prompt),
        generation_config: Some(GenerationConfig {
            response_modalities: vec!["IMAGE".to_string()],
        }),
    }
}

fn parse_response(body: &str) -> Result<GenerateContentResponse> {
    serde_json::from_str(body).context("Response was not valid generateContent JSON")
}

fn first_inline_image(response: &GenerateContentResponse) -> Result<&str> {
    let Some(candidate) = response.candidates.first() else {
        bail!("No image data found in response");
    };
    candidate
        .content
        .parts
        .iter()
        .find_map(|part| part.inline_data.as_ref())
        .map(|inline| inline.data.as_str())
        .context("No image data found in response")
}

fn response_text(response: &GenerateContentResponse) -> Result<String> {
    let text = response
        .candidates
        .first()
        .map(|candidate| {
            candidate
                .content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        bail!("Empty response from model");
    }
    Ok(text)
}
