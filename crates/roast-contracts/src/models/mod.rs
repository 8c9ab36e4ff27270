mod registry;
mod selectors;

pub use registry::{
    provider_for_model_name, ModelRegistry, ModelSpec, CRITIQUE_CAPABILITY,
    DEFAULT_CRITIQUE_MODEL,
};
pub use selectors::{ModelSelection, ModelSelector};
