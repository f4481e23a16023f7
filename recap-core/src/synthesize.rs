//! Answer synthesizer: rewrites raw interview summaries into a short
//! conversational answer.

use std::sync::Arc;

use thiserror::Error;

use crate::llm::{ChatMessage, LanguageModel, LlmError};

const SYNTHESIS_TEMPERATURE: f32 = 0.4;

const PERSONA: &str = "You are an assistant that summarizes past buyer and interviewee \
meetings. Read the raw summaries provided and answer the user's question kindly and \
concisely. Organize the answer as 3-5 bullet points, avoid unnecessary jargon, and finish \
with one suggested next step.";

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("model returned an empty answer")]
    EmptyAnswer,
}

impl SynthesisError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SynthesisError::Model(e) if e.is_timeout())
    }
}

pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    model_name: String,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }

    /// One model call, no retry.
    pub async fn synthesize(
        &self,
        question: &str,
        summaries: &[String],
    ) -> Result<String, SynthesisError> {
        let joined = summaries.join("\n\n");
        let messages = [
            ChatMessage::system(PERSONA),
            ChatMessage::user(format!("Question: {}", question)),
            ChatMessage::assistant(format!("Raw summaries:\n{}", joined)),
        ];

        let answer = self
            .model
            .complete(&self.model_name, &messages, SYNTHESIS_TEMPERATURE)
            .await?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(SynthesisError::EmptyAnswer);
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::ScriptedModel;
    use crate::llm::Role;

    #[tokio::test]
    async fn test_summaries_are_sent_as_prior_context() {
        let model = ScriptedModel::replying(Ok(
            "  - Pricing was discussed.\nNext step: send a quote.\n".to_string(),
        ));
        let synthesizer = AnswerSynthesizer::new(model.clone(), "gpt-4o-mini");

        let summaries = vec![
            "● Kim | ABC Corp | 2024-07-10\nDiscussed pricing.".to_string(),
            "● Lee | ABC Corp | 2024-07-09\n[no summary]".to_string(),
        ];
        let answer = synthesizer
            .synthesize("What did we discuss?", &summaries)
            .await
            .unwrap();

        assert_eq!(answer, "- Pricing was discussed.\nNext step: send a quote.");

        let seen = model.seen.lock().unwrap();
        let (messages, temperature) = &seen[0];
        assert_eq!(*temperature, 0.4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("next step"));
        assert_eq!(messages[1].content, "Question: What did we discuss?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert!(messages[2].content.contains("Discussed pricing.\n\n● Lee"));
    }

    #[tokio::test]
    async fn test_blank_answer_is_an_error() {
        let model = ScriptedModel::replying(Ok("   \n".to_string()));
        let synthesizer = AnswerSynthesizer::new(model, "gpt-4o-mini");

        let result = synthesizer.synthesize("q", &["s".to_string()]).await;
        assert!(matches!(result, Err(SynthesisError::EmptyAnswer)));
    }

    #[tokio::test]
    async fn test_model_failure_is_not_retried() {
        let model = ScriptedModel::replying(Err(LlmError::Api {
            code: 500,
            message: "boom".to_string(),
        }));
        let synthesizer = AnswerSynthesizer::new(model.clone(), "gpt-4o-mini");

        assert!(synthesizer.synthesize("q", &["s".to_string()]).await.is_err());
        assert_eq!(model.seen.lock().unwrap().len(), 1);
    }
}
