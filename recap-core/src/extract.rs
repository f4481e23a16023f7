//! Parameter extractor: turns a free-text question into search filters via
//! a forced `extract_parameters` function call.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::llm::{ChatMessage, FunctionSpec, LanguageModel, LlmError};
use crate::models::query::ExtractionArgs;
use crate::models::ExtractedQuery;

pub const EXTRACTION_FUNCTION: &str = "extract_parameters";

const SYSTEM_PROMPT: &str = "Extract search parameters for past interview meetings from the \
user's question: the interviewee's company name, the interviewee's name if one is mentioned, \
and the meeting date as YYYY-MM-DD when one is mentioned. Respond only by calling \
extract_parameters. Leave a field empty when the question does not mention it.";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("malformed extraction payload: {reason}")]
    Malformed { reason: String, raw: String },
}

impl ExtractionError {
    /// Raw model output, when the model answered at all.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            ExtractionError::Malformed { raw, .. } => Some(raw),
            ExtractionError::Model(LlmError::MissingToolCall { raw, .. }) => Some(raw),
            ExtractionError::Model(_) => None,
        }
    }
}

/// JSON schema declared to the model for `extract_parameters`.
pub fn extraction_function() -> FunctionSpec {
    FunctionSpec {
        name: EXTRACTION_FUNCTION.to_string(),
        description: "Extract company, interviewee name and date from a question".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "company": {"type": "string", "description": "Company name of the interviewee"},
                "name": {"type": "string", "description": "Interviewee name, if mentioned"},
                "date": {"type": "string", "description": "Meeting date as YYYY-MM-DD"}
            },
            "required": ["company"],
            "additionalProperties": false
        }),
    }
}

pub struct ParameterExtractor {
    model: Arc<dyn LanguageModel>,
    model_name: String,
    function: FunctionSpec,
}

impl ParameterExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            function: extraction_function(),
        }
    }

    /// Extract `{company, name, date}` at temperature 0.
    ///
    /// The arguments must match the declared schema exactly; anything else is
    /// rejected rather than partially parsed. A blank company is returned as
    /// such and left for the caller to reject.
    pub async fn extract(&self, question: &str) -> Result<ExtractedQuery, ExtractionError> {
        let messages = [
            ChatMessage::system(format!(
                "{} Today is {}.",
                SYSTEM_PROMPT,
                Utc::now().format("%Y-%m-%d")
            )),
            ChatMessage::user(question),
        ];

        let raw = self
            .model
            .call_function(&self.model_name, &messages, &self.function, 0.0)
            .await?;

        tracing::debug!(model = %self.model_name, raw = %raw, "Extraction payload received");

        let args = ExtractionArgs::parse(&raw).map_err(|e| ExtractionError::Malformed {
            reason: e.to_string(),
            raw: raw.clone(),
        })?;

        Ok(ExtractedQuery::from(args))
    }
}
