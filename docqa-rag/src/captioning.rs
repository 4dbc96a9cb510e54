//! Image captioning through a vision-language model service.
//!
//! Captioning is best effort: a [`Captioner`] always returns text, and a
//! failure is reported inside the caption itself so that one broken image
//! never aborts the parse of a whole document.

use async_trait::async_trait;

/// Prompt sent along with every image unless overridden.
pub const DEFAULT_CAPTION_PROMPT: &str = "Describe this image.";

/// Default captioning endpoint. Defined in every build so callers can
/// expose it as a setting even without the `vlm` feature.
pub const DEFAULT_VLM_URL: &str = "http://localhost:8000/caption_image";

/// Produces a caption for a base64-encoded image.
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Caption one image. Never fails; errors come back as caption text.
    async fn caption(&self, image_base64: &str, prompt: &str) -> String;
}

#[cfg(feature = "vlm")]
pub use vlm::VlmCaptioner;

#[cfg(feature = "vlm")]
mod vlm {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, warn};

    use super::Captioner;
    use crate::error::{RagError, Result};

    #[derive(Serialize)]
    struct CaptionRequest<'a> {
        image_base64: &'a str,
        prompt: &'a str,
    }

    /// Accepted response bodies: `{"description": ...}` or a bare JSON string.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CaptionResponse {
        Described { description: String },
        Bare(String),
    }

    /// A [`Captioner`] that POSTs `{image_base64, prompt}` JSON to an HTTP endpoint.
    ///
    /// One request per image, no retry.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use docqa_rag::captioning::{VlmCaptioner, DEFAULT_CAPTION_PROMPT};
    ///
    /// let captioner = VlmCaptioner::new("http://localhost:8000/caption_image")?;
    /// let caption = captioner.caption(&image_base64, DEFAULT_CAPTION_PROMPT).await;
    /// ```
    pub struct VlmCaptioner {
        client: reqwest::Client,
        url: String,
    }

    impl VlmCaptioner {
        /// Create a captioner for the given endpoint with a 120 second timeout.
        pub fn new(url: impl Into<String>) -> Result<Self> {
            Self::with_timeout(url, Duration::from_secs(120))
        }

        /// Create a captioner with an explicit request timeout.
        pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))?;
            Ok(Self { client, url: url.into() })
        }

        /// The endpoint this captioner calls.
        pub fn url(&self) -> &str {
            &self.url
        }
    }

    #[async_trait]
    impl Captioner for VlmCaptioner {
        async fn caption(&self, image_base64: &str, prompt: &str) -> String {
            debug!(url = %self.url, image_len = image_base64.len(), "requesting caption");
            let response = match self
                .client
                .post(&self.url)
                .json(&CaptionRequest { image_base64, prompt })
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %self.url, error = %e, "caption request failed");
                    return format!("API request failed: {e}");
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => return format!("API request failed: {e}"),
            };
            if !status.is_success() {
                warn!(url = %self.url, %status, "caption service returned an error");
                return format!("Error: {}, {body}", status.as_u16());
            }

            match serde_json::from_str::<CaptionResponse>(&body) {
                Ok(CaptionResponse::Described { description }) => description,
                Ok(CaptionResponse::Bare(caption)) => caption,
                // Anything else is passed through as the caption.
                Err(_) => body,
            }
        }
    }
}
