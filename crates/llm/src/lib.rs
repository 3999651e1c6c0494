use std::sync::Arc;

mod canned;
mod model;
mod provider;

pub use canned::{
    CANNED_GENERATOR_ID, CannedReplyConfig, CannedReplyGenerator, DEFAULT_CANNED_LATENCY, classify,
};
pub use model::{
    FIMUM_BASIC, FIMUM_CODER, FIMUM_DEEPTHINK, FIMUM_VISION, Model, fimum_models,
    model_for_category,
};
pub use provider::{
    AttachmentInfo, ProviderError, ProviderMessage, ProviderResult, ReplyCategory, ReplyContent,
    ReplyGenerator, ReplyRequest, Role, generate_with_timeout,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub generator_id: String,
    pub canned: CannedReplyConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            generator_id: CANNED_GENERATOR_ID.to_string(),
            canned: CannedReplyConfig::default(),
        }
    }
}

pub fn create_generator(config: GeneratorConfig) -> ProviderResult<Arc<dyn ReplyGenerator>> {
    let generator_id = config.generator_id.trim();
    let generator_id = if generator_id.is_empty() {
        CANNED_GENERATOR_ID
    } else {
        generator_id
    };

    match generator_id {
        CANNED_GENERATOR_ID | "mock" => Ok(Arc::new(CannedReplyGenerator::new(config.canned))),
        _ => Err(ProviderError::UnsupportedGenerator {
            stage: "create-generator",
            generator_id: generator_id.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_generator_id_falls_back_to_canned() {
        let generator = create_generator(GeneratorConfig {
            generator_id: "  ".to_string(),
            ..GeneratorConfig::default()
        })
        .unwrap();
        assert_eq!(generator.id(), CANNED_GENERATOR_ID);
    }

    #[test]
    fn unknown_generator_is_rejected() {
        let result = create_generator(GeneratorConfig {
            generator_id: "openrouter".to_string(),
            ..GeneratorConfig::default()
        });
        assert!(matches!(
            result,
            Err(ProviderError::UnsupportedGenerator { .. })
        ));
    }
}
