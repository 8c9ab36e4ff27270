pub mod encoder;
pub mod gateway;
pub mod parser;
pub mod prompt;

use std::env;
use std::time::Instant;

use roast_contracts::events::{
    EventPayload, EventWriter, GATEWAY_REQUEST, GATEWAY_RESPONSE, IMAGE_ENCODED, ROAST_COMPLETED,
    ROAST_FAILED, ROAST_STARTED,
};
use roast_contracts::models::{ModelSelection, ModelSelector, CRITIQUE_CAPABILITY};
use roast_contracts::request::{ImagePayload, ImageSource, RoastRequest};
use roast_contracts::{Critique, RoastError};
use serde_json::{json, Map, Value};

pub use encoder::{encode_image, image_payload_from_path, strip_data_url_prefix, EncodedImage};
pub use gateway::{
    default_gateway_registry, CritiqueGateway, DryrunGateway, GatewayRegistry, GatewayReply,
    GeminiGateway, OpenAiGateway,
};
pub use parser::parse_critique;
pub use prompt::{build_critique_request, build_user_prompt, CritiqueRequest, SYSTEM_INSTRUCTION};

/// Runs the encode -> build -> call -> parse chain for one request at a time.
pub struct RoastEngine {
    events: EventWriter,
    selection: ModelSelection,
    gateways: GatewayRegistry,
}

impl RoastEngine {
    /// `model` falls back to `ROAST_MODEL`, then to the registry default.
    pub fn new(events: EventWriter, model: Option<String>) -> Result<Self, RoastError> {
        let requested = model.or_else(|| {
            env::var("ROAST_MODEL")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        });
        let selection = ModelSelector::new(None)
            .select(requested.as_deref(), CRITIQUE_CAPABILITY)
            .map_err(RoastError::precondition)?;
        Ok(Self {
            events,
            selection,
            gateways: default_gateway_registry(),
        })
    }

    /// Replaces the gateway serving the selected model's provider.
    pub fn with_gateway<G: CritiqueGateway + 'static>(mut self, gateway: G) -> Self {
        self.selection.model.provider = gateway.name().to_string();
        self.gateways.register(gateway);
        self
    }

    pub fn model(&self) -> &str {
        &self.selection.model.name
    }

    pub fn provider(&self) -> &str {
        &self.selection.model.provider
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.selection.fallback_reason.as_deref()
    }

    /// Entry point for callers holding an optional selection.
    ///
    /// No image means no pipeline run: the gateway is never reached.
    pub fn roast_selection(
        &self,
        image: Option<ImagePayload>,
        url: Option<String>,
    ) -> Result<Critique, RoastError> {
        let Some(image) = image else {
            return Err(RoastError::precondition("Select a screenshot first."));
        };
        if !image.is_image() {
            return Err(RoastError::not_an_image());
        }
        self.roast(&RoastRequest::new(image, url))
    }

    pub fn roast(&self, request: &RoastRequest) -> Result<Critique, RoastError> {
        let outcome = self.run_pipeline(request);
        match &outcome {
            Ok(critique) => self.events.emit_quiet(
                ROAST_COMPLETED,
                map_object(json!({
                    "score": critique.score,
                    "sections": critique.sections.len(),
                    "tier": critique.tier().as_str(),
                })),
            ),
            Err(err) => self.events.emit_quiet(
                ROAST_FAILED,
                map_object(json!({
                    "kind": err.kind().as_str(),
                    "message": err.user_message(),
                })),
            ),
        }
        outcome
    }

    fn run_pipeline(&self, request: &RoastRequest) -> Result<Critique, RoastError> {
        let gateway = self.gateways.get(self.provider()).ok_or_else(|| {
            RoastError::gateway(format!(
                "no gateway registered for provider '{}' (available: {})",
                self.provider(),
                self.gateways.names().join(", ")
            ))
        })?;

        self.events.emit_quiet(
            ROAST_STARTED,
            map_object(json!({
                "mime_type": request.image.mime_type,
                "image_name": request.image.name,
                "source": source_label(&request.image.source),
                "has_url": request.url_context().is_some(),
                "gateway": gateway.name(),
                "model": self.model(),
            })),
        );

        let encoded = encode_image(&request.image)?;
        self.events.emit_quiet(
            IMAGE_ENCODED,
            map_object(json!({
                "mime_type": encoded.mime_type,
                "encoded_chars": encoded.data.len(),
            })),
        );

        let critique_request = build_critique_request(encoded, request.url_context());

        self.events.emit_quiet(
            GATEWAY_REQUEST,
            map_object(json!({
                "endpoint": gateway.endpoint(self.model()),
                "model": self.model(),
            })),
        );
        let started = Instant::now();
        let reply = gateway.generate(self.model(), &critique_request)?;
        self.events.emit_quiet(
            GATEWAY_RESPONSE,
            map_object(json!({
                "chars": reply.text.chars().count(),
                "latency_ms": started.elapsed().as_millis() as u64,
            })),
        );

        parse_critique(&reply.text)
    }
}

fn source_label(source: &ImageSource) -> &'static str {
    match source {
        ImageSource::Bytes(_) => "bytes",
        ImageSource::Path(_) => "path",
        ImageSource::DataUrl(_) => "data_url",
    }
}

fn map_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_else(Map::new)
}
