//! LLM provider implementations for the SGR research agent.
//!
//! All providers implement the `sgr_research_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;

use sgr_research_config::LlmConfig;
use sgr_research_core::error::ProviderError;
use sgr_research_core::provider::Provider;

const OPENAI_HOST: &str = "api.openai.com";

/// Build the LLM provider described by the `[llm]` config section.
///
/// The hosted OpenAI endpoint requires an API key; self-hosted compatible
/// endpoints may run without one.
pub fn build_from_config(config: &LlmConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let hosted = config.base_url.contains(OPENAI_HOST);
    let api_key = match (&config.api_key, hosted) {
        (Some(key), _) => key.clone(),
        (None, true) => {
            return Err(ProviderError::NotConfigured(
                "no API key set (use llm.api_key, SGR_RESEARCH_API_KEY or OPENAI_API_KEY)".into(),
            ));
        }
        (None, false) => String::new(),
    };

    let name = if hosted { "openai" } else { "openai-compat" };
    tracing::debug!(provider = name, base_url = %config.base_url, "Building LLM provider");

    let provider = OpenAiCompatProvider::with_proxy(
        name,
        &config.base_url,
        api_key,
        config.proxy.as_deref(),
    )?;
    Ok(Arc::new(provider))
}
