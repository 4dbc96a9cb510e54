//! Answer synthesis: turning ranked chunks into a single answer.
//!
//! Two merges are offered. [`extractive_merge`] joins chunks verbatim and
//! costs nothing. [`AnswerSynthesizer::summarize`] asks a generative
//! [`SummarizationModel`] for an abstractive summary; it may take seconds.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// A generative sequence-to-sequence model used for abstractive merging.
#[async_trait]
pub trait SummarizationModel: Send + Sync {
    /// Generate text for `prompt`, producing at most `max_output_tokens` tokens.
    async fn generate(&self, prompt: &str, max_output_tokens: usize) -> Result<String>;

    /// Name used in logs and errors.
    fn name(&self) -> &str;
}

/// Settings for abstractive synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Task instruction placed in front of the merged chunks.
    pub instruction: String,
    /// Longest prompt, in chars, handed to the model. Longer prompts lose their end.
    pub max_input_chars: usize,
    /// Upper bound on the generated answer, in tokens.
    pub max_output_tokens: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            instruction: "Summarize this text: ".to_string(),
            max_input_chars: 8_000,
            max_output_tokens: 500,
        }
    }
}

/// Join chunks with a newline, keeping their order.
pub fn extractive_merge<S: AsRef<str>>(chunks: &[S]) -> String {
    chunks.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n")
}

/// Cut `text` to at most `max_chars` chars, dropping the end.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Produces abstractive answers through a [`SummarizationModel`].
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{AnswerSynthesizer, SynthesisConfig};
///
/// let synthesizer = AnswerSynthesizer::new(Arc::new(model), SynthesisConfig::default())?;
/// let answer = synthesizer.summarize(&["first chunk", "second chunk"]).await?;
/// ```
pub struct AnswerSynthesizer {
    model: Arc<dyn SummarizationModel>,
    config: SynthesisConfig,
}

impl AnswerSynthesizer {
    /// Create a synthesizer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `max_input_chars` does not leave
    /// room for any text after the instruction, or `max_output_tokens == 0`.
    pub fn new(model: Arc<dyn SummarizationModel>, config: SynthesisConfig) -> Result<Self> {
        if config.max_input_chars <= config.instruction.chars().count() {
            return Err(RagError::ConfigError(format!(
                "max_input_chars ({}) must exceed the instruction length",
                config.max_input_chars
            )));
        }
        if config.max_output_tokens == 0 {
            return Err(RagError::ConfigError(
                "max_output_tokens must be greater than zero".to_string(),
            ));
        }
        Ok(Self { model, config })
    }

    /// The synthesis settings.
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Build the model prompt for a set of chunks.
    ///
    /// Chunks are joined with a space behind the instruction. A prompt longer
    /// than `max_input_chars` is truncated from the end; this loses the
    /// lowest-ranked text rather than failing.
    pub fn prompt<S: AsRef<str>>(&self, chunks: &[S]) -> String {
        let merged = chunks.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        let prompt = format!("{}{merged}", self.config.instruction);
        let truncated = truncate_chars(&prompt, self.config.max_input_chars);
        if truncated.len() < prompt.len() {
            debug!(
                model = self.model.name(),
                max_input_chars = self.config.max_input_chars,
                "synthesis prompt truncated"
            );
        }
        truncated.to_string()
    }

    /// Summarize chunks into a single answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::SynthesisError`] if the model fails.
    pub async fn summarize<S: AsRef<str> + Sync>(&self, chunks: &[S]) -> Result<String> {
        let prompt = self.prompt(chunks);
        self.model.generate(&prompt, self.config.max_output_tokens).await.map_err(|e| {
            error!(model = self.model.name(), error = %e, "synthesis failed");
            match e {
                RagError::SynthesisError { .. } => e,
                other => RagError::SynthesisError {
                    model: self.model.name().to_string(),
                    message: other.to_string(),
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl SummarizationModel for RecordingModel {
        async fn generate(&self, prompt: &str, max_output_tokens: usize) -> Result<String> {
            self.prompts.lock().unwrap().push((prompt.to_string(), max_output_tokens));
            Ok("summary".to_string())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct FailingModel;

    #[async_trait]
    impl SummarizationModel for FailingModel {
        async fn generate(&self, _prompt: &str, _max: usize) -> Result<String> {
            Err(RagError::ConfigError("model not loaded".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn extractive_joins_with_newline() {
        assert_eq!(extractive_merge(&["A", "B"]), "A\nB");
        assert_eq!(extractive_merge::<&str>(&[]), "");
    }

    #[tokio::test]
    async fn prompt_is_instruction_plus_space_joined_chunks() {
        let model = Arc::new(RecordingModel::default());
        let synthesizer =
            AnswerSynthesizer::new(model.clone(), SynthesisConfig::default()).unwrap();
        let answer = synthesizer.summarize(&["first.", "second."]).await.unwrap();
        assert_eq!(answer, "summary");
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0], ("Summarize this text: first. second.".to_string(), 500));
    }

    #[test]
    fn long_prompts_are_truncated_from_the_end() {
        let config = SynthesisConfig {
            instruction: "S: ".into(),
            max_input_chars: 10,
            ..SynthesisConfig::default()
        };
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(RecordingModel::default()), config).unwrap();
        assert_eq!(synthesizer.prompt(&["ééééé", "fffff"]), "S: ééééé f");
    }

    #[tokio::test]
    async fn model_failures_become_synthesis_errors() {
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(FailingModel), SynthesisConfig::default()).unwrap();
        let err = synthesizer.summarize(&["x"]).await.unwrap_err();
        assert!(matches!(err, RagError::SynthesisError { model, .. } if model == "failing"));
    }

    #[test]
    fn rejects_unusable_limits() {
        let config = SynthesisConfig { max_input_chars: 5, ..SynthesisConfig::default() };
        assert!(AnswerSynthesizer::new(Arc::new(FailingModel), config).is_err());
        let config = SynthesisConfig { max_output_tokens: 0, ..SynthesisConfig::default() };
        assert!(AnswerSynthesizer::new(Arc::new(FailingModel), config).is_err());
    }
}
