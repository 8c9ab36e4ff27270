use indexmap::IndexMap;

pub const CRITIQUE_CAPABILITY: &str = "critique";
pub const DEFAULT_CRITIQUE_MODEL: &str = "gemini-3-flash-preview";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

/// Provider implied by a model name that is not registered.
pub fn provider_for_model_name(name: &str) -> Option<&'static str> {
    let lowered = name.trim().to_ascii_lowercase();
    let lowered = lowered.strip_prefix("models/").unwrap_or(&lowered);
    if lowered.starts_with("gemini-") {
        return Some("gemini");
    }
    if lowered.starts_with("gpt-") || lowered.starts_with("o4-") {
        return Some("openai");
    }
    if lowered.starts_with("dryrun") {
        return Some("dryrun");
    }
    None
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    // First entry is the default.
    for (name, provider) in [
        (DEFAULT_CRITIQUE_MODEL, "gemini"),
        ("gemini-3-pro-preview", "gemini"),
        ("gemini-2.5-flash", "gemini"),
        ("gpt-4o-mini", "openai"),
        ("gpt-4.1-mini", "openai"),
        ("dryrun-critique-1", "dryrun"),
    ] {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: vec![CRITIQUE_CAPABILITY.to_string()],
            },
        );
    }

    map
}
