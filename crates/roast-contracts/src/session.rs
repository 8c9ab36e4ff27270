//! Four-state roast lifecycle: Idle -> Analyzing -> Roasted | Error -> Idle.
//!
//! Submission is only reachable from `Idle`, so at most one pipeline run is
//! in flight per session. Reset only drops the session's reference to an
//! outcome; it does not cancel anything.

use serde_json::{json, Map, Value};

use crate::critique::Critique;
use crate::error::RoastError;
use crate::events::{EventWriter, SESSION_STATE};
use crate::request::{ImagePayload, RoastRequest};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoastState {
    #[default]
    Idle,
    Analyzing,
    Roasted(Critique),
    Error(String),
}

impl RoastState {
    pub fn name(&self) -> &'static str {
        match self {
            RoastState::Idle => "idle",
            RoastState::Analyzing => "analyzing",
            RoastState::Roasted(_) => "roasted",
            RoastState::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoastState::Roasted(_) | RoastState::Error(_))
    }
}

#[derive(Debug, Default)]
pub struct RoastSession {
    state: RoastState,
    image: Option<ImagePayload>,
    url: String,
    events: Option<EventWriter>,
}

impl RoastSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: EventWriter) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn state(&self) -> &RoastState {
        &self.state
    }

    pub fn selected_image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn critique(&self) -> Option<&Critique> {
        match &self.state {
            RoastState::Roasted(critique) => Some(critique),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            RoastState::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }

    /// Non-image payloads are rejected and leave the session untouched.
    pub fn select_image(&mut self, image: ImagePayload) -> Result<(), RoastError> {
        self.require_idle("reset before choosing another image")?;
        if !image.is_image() {
            return Err(RoastError::not_an_image());
        }
        self.image = Some(image);
        Ok(())
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Moves Idle -> Analyzing and hands back the request to run.
    pub fn begin(&mut self) -> Result<RoastRequest, RoastError> {
        self.require_idle("reset before roasting again")?;
        let Some(image) = self.image.clone() else {
            return Err(RoastError::precondition("Select a screenshot first."));
        };
        let url = Some(self.url.clone()).filter(|value| !value.is_empty());
        self.transition(RoastState::Analyzing);
        Ok(RoastRequest::new(image, url))
    }

    pub fn finish(&mut self, outcome: Result<Critique, RoastError>) -> Result<(), RoastError> {
        if self.state != RoastState::Analyzing {
            return Err(RoastError::precondition(format!(
                "no roast in progress (state is {})",
                self.state.name()
            )));
        }
        let next = match outcome {
            Ok(critique) => RoastState::Roasted(critique),
            Err(err) => RoastState::Error(err.user_message()),
        };
        self.transition(next);
        Ok(())
    }

    /// `begin`, run, `finish`. `run` is never called when `begin` fails.
    pub fn submit<F>(&mut self, run: F) -> Result<&RoastState, RoastError>
    where
        F: FnOnce(RoastRequest) -> Result<Critique, RoastError>,
    {
        let request = self.begin()?;
        let outcome = run(request);
        self.finish(outcome)?;
        Ok(&self.state)
    }

    /// Back to Idle from any state, dropping the outcome and the draft form.
    pub fn reset(&mut self) {
        self.image = None;
        self.url.clear();
        self.transition(RoastState::Idle);
    }

    fn require_idle(&self, terminal_hint: &str) -> Result<(), RoastError> {
        match self.state {
            RoastState::Idle => Ok(()),
            RoastState::Analyzing => Err(RoastError::precondition(
                "a roast is already in progress",
            )),
            RoastState::Roasted(_) | RoastState::Error(_) => {
                Err(RoastError::precondition(terminal_hint.to_string()))
            }
        }
    }

    fn transition(&mut self, next: RoastState) {
        let from = self.state.name();
        let to = next.name();
        self.state = next;
        if let Some(events) = self.events.as_ref() {
            events.emit_quiet(SESSION_STATE, transition_payload(from, to));
        }
    }
}

fn transition_payload(from: &str, to: &str) -> Map<String, Value> {
    json!({ "from": from, "to": to })
        .as_object()
        .cloned()
        .unwrap_or_default()
}
