pub mod chat;
pub mod critique;
pub mod error;
pub mod events;
pub mod models;
pub mod request;
pub mod schema;
pub mod session;

pub use critique::{Critique, Finding, ScoreTier, Severity};
pub use error::{RoastError, RoastErrorKind};
pub use request::{ImagePayload, ImageSource, RoastRequest};
pub use session::{RoastSession, RoastState};
