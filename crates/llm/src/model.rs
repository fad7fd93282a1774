/// Model the gateway uses when the caller passes an empty identifier.
pub const DEFAULT_GATEWAY_MODEL: &str = "llama-3.3-70b-versatile";

/// Model preselected in a fresh preferences file.
pub const DEFAULT_PREFERENCE_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl Model {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Models offered by the settings model picker, in display order.
pub fn selectable_models() -> Vec<Model> {
    vec![
        Model::new("gpt-4o", "GPT-4o").with_description("High quality general model"),
        Model::new("gpt-4", "GPT-4"),
        Model::new("gpt-3.5-turbo", "GPT-3.5 Turbo"),
        Model::new("claude-3-opus", "Claude 3 Opus"),
        Model::new("claude-3-sonnet", "Claude 3 Sonnet"),
        Model::new("llama-3-70b", "Llama 3 70B"),
        Model::new(DEFAULT_GATEWAY_MODEL, "Llama 3.3 70B Versatile")
            .with_description("Default chat model"),
    ]
}

/// Catalog entry for `id`. Ids outside the catalog are still valid to send.
pub fn find_model(id: &str) -> Option<Model> {
    let id = id.trim();
    selectable_models().into_iter().find(|model| model.id == id)
}

/// Resolves the identifier actually sent to the provider.
pub fn resolve_model_id(model_id: &str) -> String {
    let trimmed = model_id.trim();
    if trimmed.is_empty() {
        DEFAULT_GATEWAY_MODEL.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_model_id_resolves_to_gateway_default() {
        assert_eq!(resolve_model_id(""), DEFAULT_GATEWAY_MODEL);
        assert_eq!(resolve_model_id("   "), DEFAULT_GATEWAY_MODEL);
        assert_eq!(resolve_model_id(" gpt-4o "), "gpt-4o");
    }

    #[test]
    fn catalog_contains_both_defaults() {
        assert!(find_model(DEFAULT_GATEWAY_MODEL).is_some());
        let preferred = find_model(DEFAULT_PREFERENCE_MODEL).expect("preference default listed");
        assert_eq!(preferred.name, "GPT-4o");
        assert!(find_model("unknown-model").is_none());
    }
}
