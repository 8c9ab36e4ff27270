use std::collections::BTreeMap;
use std::env;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use roast_contracts::error::EMPTY_REPLY_MESSAGE;
use roast_contracts::RoastError;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::prompt::CritiqueRequest;

/// Raw answer from a hosted model, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub text: String,
    pub endpoint: String,
    pub model: String,
}

/// One outbound call per critique: no retries, no batching, transport-default timeout.
pub trait CritiqueGateway: Send + Sync {
    fn name(&self) -> &str;
    fn endpoint(&self, model: &str) -> String;
    fn generate(&self, model: &str, request: &CritiqueRequest) -> Result<GatewayReply, RoastError>;
}

#[derive(Default)]
pub struct GatewayRegistry {
    gateways: BTreeMap<String, Box<dyn CritiqueGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<G: CritiqueGateway + 'static>(&mut self, gateway: G) {
        self.gateways
            .insert(gateway.name().to_string(), Box::new(gateway));
    }

    pub fn get(&self, name: &str) -> Option<&dyn CritiqueGateway> {
        self.gateways.get(name).map(|gateway| gateway.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.gateways.keys().cloned().collect()
    }
}

pub fn default_gateway_registry() -> GatewayRegistry {
    let mut gateways = GatewayRegistry::new();
    gateways.register(DryrunGateway);
    gateways.register(GeminiGateway::new());
    gateways.register(OpenAiGateway::new());
    gateways
}

pub struct GeminiGateway {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl GeminiGateway {
    pub fn new() -> Self {
        let api_base = first_non_empty_env(&["GEMINI_API_BASE"])
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());
        Self::with_settings(api_base, None)
    }

    pub fn with_settings(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
            http: HttpClient::new(),
        }
    }

    fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| first_non_empty_env(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]))
    }

    fn build_payload(request: &CritiqueRequest) -> Value {
        json!({
            "systemInstruction": {
                "parts": [{ "text": request.system_instruction }],
            },
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": request.image.mime_type,
                            "data": request.image.data,
                        }
                    },
                    { "text": request.user_prompt },
                ],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.schema.to_gemini_schema(),
            },
        })
    }

    fn extract_text(response_payload: &Value) -> Result<String, RoastError> {
        if let Some(reason) = response_payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
        {
            return Err(RoastError::gateway(format!(
                "Gemini declined to answer ({reason})"
            )));
        }

        let candidate = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first());
        let text = candidate
            .and_then(|row| row.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            if let Some(reason) = candidate
                .and_then(|row| row.get("finishReason"))
                .and_then(Value::as_str)
                .filter(|reason| matches!(*reason, "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST"))
            {
                return Err(RoastError::gateway(format!(
                    "Gemini declined to answer ({reason})"
                )));
            }
        }
        Ok(text)
    }

    fn post_json(&self, endpoint: &str, api_key: &str, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(endpoint)
            .header("x-goog-api-key", api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        response_json_or_error("Gemini", response)
    }
}

impl Default for GeminiGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl CritiqueGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    fn endpoint(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn generate(&self, model: &str, request: &CritiqueRequest) -> Result<GatewayReply, RoastError> {
        let Some(api_key) = self.api_key() else {
            return Err(RoastError::gateway(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set",
            ));
        };
        let endpoint = self.endpoint(model);
        let payload = Self::build_payload(request);
        let response_payload = self
            .post_json(&endpoint, &api_key, &payload)
            .map_err(|err| RoastError::gateway(error_chain_text(&err, 600)))?;
        let text = require_text(Self::extract_text(&response_payload)?)?;
        Ok(GatewayReply {
            text,
            endpoint,
            model: model.to_string(),
        })
    }
}

pub struct OpenAiGateway {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl OpenAiGateway {
    pub fn new() -> Self {
        Self::with_settings(openai_api_base(), None)
    }

    pub fn with_settings(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
            http: HttpClient::new(),
        }
    }

    fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| first_non_empty_env(&["OPENAI_API_KEY", "OPENAI_API_KEY_BACKUP"]))
    }

    fn build_payload(model: &str, request: &CritiqueRequest) -> Value {
        json!({
            "model": model,
            "instructions": request.system_instruction,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_image", "image_url": request.image.data_url() },
                    { "type": "input_text", "text": request.user_prompt },
                ],
            }],
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": "critique",
                    "strict": true,
                    "schema": request.schema.to_json_schema(),
                }
            },
        })
    }

    fn extract_text(response: &Value) -> Result<String, RoastError> {
        if let Some(text) = response.get("output_text").and_then(Value::as_str) {
            if !text.trim().is_empty() {
                return Ok(text.trim().to_string());
            }
        }

        let mut parts: Vec<String> = Vec::new();
        let rows = response
            .get("output")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for row in rows {
            let content = row
                .get("content")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for chunk in content {
                let kind = chunk
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if kind == "refusal" {
                    let reason = chunk
                        .get("refusal")
                        .and_then(Value::as_str)
                        .unwrap_or("refused");
                    return Err(RoastError::gateway(format!(
                        "OpenAI declined to answer ({})",
                        truncate_text(reason, 200)
                    )));
                }
                if !matches!(kind, "output_text" | "text") {
                    continue;
                }
                if let Some(text) = chunk.get("text").and_then(Value::as_str) {
                    if !text.trim().is_empty() {
                        parts.push(text.trim().to_string());
                    }
                }
            }
        }
        Ok(parts.join("\n").trim().to_string())
    }

    fn post_json(&self, endpoint: &str, api_key: &str, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(endpoint)
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .with_context(|| format!("OpenAI request failed ({endpoint})"))?;
        response_json_or_error("OpenAI", response)
    }
}

impl Default for OpenAiGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl CritiqueGateway for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    fn endpoint(&self, _model: &str) -> String {
        format!("{}/responses", self.api_base)
    }

    fn generate(&self, model: &str, request: &CritiqueRequest) -> Result<GatewayReply, RoastError> {
        let Some(api_key) = self.api_key() else {
            return Err(RoastError::gateway(
                "OPENAI_API_KEY or OPENAI_API_KEY_BACKUP not set",
            ));
        };
        let endpoint = self.endpoint(model);
        let payload = Self::build_payload(model, request);
        let response_payload = self
            .post_json(&endpoint, &api_key, &payload)
            .map_err(|err| RoastError::gateway(error_chain_text(&err, 600)))?;
        let text = require_text(Self::extract_text(&response_payload)?)?;
        Ok(GatewayReply {
            text,
            endpoint,
            model: model.to_string(),
        })
    }
}

/// Offline gateway: a stable critique derived from the image bytes.
pub struct DryrunGateway;

const DRYRUN_TITLES: &[(&str, &str)] = &[
    (
        "Typography Nightmares",
        "Three font families and a fourth one sneaking in through the footer.",
    ),
    (
        "Color Vomit",
        "The palette looks like it was picked by spinning a wheel at a paint store.",
    ),
    (
        "Spacing Roulette",
        "Padding changes every section, as if each one was built by a stranger.",
    ),
    (
        "Contrast Crimes",
        "Light grey text on a white background is not minimalism, it is hiding.",
    ),
    (
        "Stock Photo Museum",
        "The smiling people pointing at laptops have been retired since 2014.",
    ),
    (
        "Template Energy",
        "Hero, three cards, testimonial carousel. The default theme called, it wants its layout back.",
    ),
];

impl DryrunGateway {
    fn critique_json(request: &CritiqueRequest) -> Value {
        let mut hasher = Sha256::new();
        hasher.update(request.image.data.as_bytes());
        hasher.update(request.user_prompt.as_bytes());
        let digest = hasher.finalize();

        let score = i64::from(digest[0]) * 100 / 255;
        let sections: Vec<Value> = ["critical", "bad", "nitpick"]
            .iter()
            .enumerate()
            .map(|(idx, severity)| {
                let pick = (usize::from(digest[idx + 1]) + idx) % DRYRUN_TITLES.len();
                let (title, content) = DRYRUN_TITLES[pick];
                json!({
                    "title": title,
                    "content": content,
                    "severity": severity,
                })
            })
            .collect();

        json!({
            "score": score,
            "oneLiner": format!(
                "Screenshot {} looks like a first draft that escaped into production.",
                hex::encode(&digest[..4])
            ),
            "sections": sections,
            "verdict": "Pick one font, one accent color, and an 8px grid. Today.",
        })
    }
}

impl CritiqueGateway for DryrunGateway {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn endpoint(&self, _model: &str) -> String {
        "dryrun-native".to_string()
    }

    fn generate(&self, model: &str, request: &CritiqueRequest) -> Result<GatewayReply, RoastError> {
        Ok(GatewayReply {
            text: Self::critique_json(request).to_string(),
            endpoint: self.endpoint(model),
            model: model.to_string(),
        })
    }
}

/// An empty answer cannot become a critique, so it is a gateway failure.
fn require_text(text: String) -> Result<String, RoastError> {
    if text.trim().is_empty() {
        return Err(RoastError::gateway(EMPTY_REPLY_MESSAGE));
    }
    Ok(text)
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn first_non_empty_env(keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Ok(value) = env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn openai_api_base() -> String {
    let raw = first_non_empty_env(&["OPENAI_API_BASE", "OPENAI_BASE_URL"])
        .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
    let mut base = raw.trim().trim_end_matches('/').to_string();
    if let Ok(parsed) = reqwest::Url::parse(&base) {
        if parsed.path().trim().is_empty() || parsed.path() == "/" {
            base = format!("{base}/v1");
        }
    }
    base.trim_end_matches('/').to_string()
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
