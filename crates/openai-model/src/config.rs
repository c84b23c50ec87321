use std::fmt::{self, Debug};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-5.2";
/// Endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REDACTED: &str = "<redacted>";

/// Builder for [`OpenAIConfig`].
///
/// Only the API key is required. Any server speaking the chat completions
/// protocol can be targeted through [`with_base_url`](Self::with_base_url).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
        }
    }

    /// Sets the model, [`DEFAULT_MODEL`] otherwise.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the endpoint, [`DEFAULT_BASE_URL`] otherwise.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OpenAIConfig {
        let base_url = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        OpenAIConfig {
            api_key: self.api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &REDACTED)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Configuration of [`OpenAIProvider`](crate::OpenAIProvider).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    // Without a trailing slash.
    pub(crate) base_url: String,
}

impl OpenAIConfig {
    /// Returns the model requests are sent to.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the URL of the chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &REDACTED)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}
