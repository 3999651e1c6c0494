use super::provider::ReplyCategory;

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

pub const FIMUM_BASIC: &str = "Fimum Basic";
pub const FIMUM_VISION: &str = "Fimum Vision";
pub const FIMUM_CODER: &str = "Fimum Coder";
pub const FIMUM_DEEPTHINK: &str = "Fimum DeepThink";

/// Display name of the model that answers a given reply category.
pub fn model_for_category(category: ReplyCategory) -> &'static str {
    match category {
        ReplyCategory::Normal => FIMUM_BASIC,
        ReplyCategory::Image => FIMUM_VISION,
        ReplyCategory::Coding => FIMUM_CODER,
        ReplyCategory::Thinking => FIMUM_DEEPTHINK,
    }
}

pub fn fimum_models() -> Vec<Model> {
    vec![
        Model::new("fimum-basic", FIMUM_BASIC).with_description("General conversation"),
        Model::new("fimum-vision", FIMUM_VISION).with_description("Image understanding"),
        Model::new("fimum-coder", FIMUM_CODER).with_description("Programming help"),
        Model::new("fimum-deepthink", FIMUM_DEEPTHINK).with_description("Multi-step reasoning"),
    ]
}
