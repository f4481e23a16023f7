//! Pipeline controller: sequences extraction, authorization, search,
//! aggregation and synthesis for one question.
//!
//! Each stage gates the next; the first failure is terminal and no later
//! stage runs.

use std::fmt;
use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::config::{RecapConfig, Secrets};
use crate::error::{PipelineError, RecapError, Stage};
use crate::extract::{ExtractionError, ParameterExtractor};
use crate::llm::{LanguageModel, OpenAiClient};
use crate::records::{RecordFetcher, RecordsError};
use crate::session::{SessionError, SessionManager};
use crate::synthesize::{AnswerSynthesizer, SynthesisError};

/// Progress of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Extracted,
    Authorized,
    Searched,
    Aggregated,
    Answered,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct Pipeline {
    extractor: ParameterExtractor,
    sessions: Arc<SessionManager>,
    records: RecordFetcher,
    synthesizer: AnswerSynthesizer,
}

impl Pipeline {
    pub fn new(
        extractor: ParameterExtractor,
        sessions: Arc<SessionManager>,
        records: RecordFetcher,
        synthesizer: AnswerSynthesizer,
    ) -> Self {
        Self {
            extractor,
            sessions,
            records,
            synthesizer,
        }
    }

    /// Wire every component from configuration and startup secrets.
    pub fn from_config(config: &RecapConfig, secrets: Secrets) -> Result<Self, RecapError> {
        let model: Arc<dyn LanguageModel> = Arc::new(
            OpenAiClient::new(&config.llm, secrets.llm_api_key)
                .map_err(|e| RecapError::Startup(e.to_string()))?,
        );
        let sessions = Arc::new(
            SessionManager::new(&config.backend, secrets.credential)
                .map_err(|e| RecapError::Startup(e.to_string()))?,
        );
        let records = RecordFetcher::new(&config.backend, Arc::clone(&sessions))
            .map_err(|e| RecapError::Startup(e.to_string()))?;

        tracing::info!(
            backend = %config.backend.base_url,
            llm = model.name(),
            extraction_model = %config.llm.extraction_model,
            synthesis_model = %config.llm.synthesis_model,
            "Pipeline initialised"
        );

        Ok(Self::new(
            ParameterExtractor::new(Arc::clone(&model), config.llm.extraction_model.clone()),
            sessions,
            records,
            AnswerSynthesizer::new(model, config.llm.synthesis_model.clone()),
        ))
    }

    /// Verify the service account can obtain a token. Reuses the cached token
    /// when it is still valid.
    pub async fn check_backend(&self) -> Result<(), PipelineError> {
        self.sessions
            .get_token()
            .await
            .map(|_| ())
            .map_err(session_failure)
    }

    /// Answer one question. Runs inside a span tagged with a fresh request id.
    pub async fn answer(&self, question: &str) -> Result<String, PipelineError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("question", %request_id);

        async {
            let mut state = PipelineState::Start;
            let result = self.run(question, &mut state).await;
            match &result {
                Ok(_) => tracing::info!("Question answered"),
                Err(e) => tracing::warn!(
                    reached = %state,
                    kind = e.kind(),
                    error = %e,
                    "Question failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        question: &str,
        state: &mut PipelineState,
    ) -> Result<String, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        let query = self
            .extractor
            .extract(question)
            .await
            .map_err(extraction_failure)?;
        if !query.has_company() {
            return Err(PipelineError::MissingCompany);
        }
        advance(state, PipelineState::Extracted);

        let token = self.sessions.get_token().await.map_err(session_failure)?;
        advance(state, PipelineState::Authorized);

        let candidates = self
            .records
            .search(&token, &query)
            .await
            .map_err(|e| records_failure(e, Stage::Search))?;
        if candidates.is_empty() {
            return Err(PipelineError::NoCandidateFound {
                company: query.company,
                name: query.name,
                date: query.date,
            });
        }
        tracing::info!(candidates = candidates.len(), "Interviewees found");
        advance(state, PipelineState::Searched);

        let summaries = self
            .records
            .collect_summaries(&token, &candidates)
            .await
            .map_err(|e| records_failure(e, Stage::DetailFetch))?;
        if summaries.is_empty() {
            return Err(PipelineError::NoSummaryFound {
                candidates: candidates.len(),
            });
        }
        advance(state, PipelineState::Aggregated);

        let answer = self
            .synthesizer
            .synthesize(question, &summaries)
            .await
            .map_err(synthesis_failure)?;
        advance(state, PipelineState::Answered);

        Ok(answer)
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    tracing::debug!(from = %state, to = %next, "Pipeline transition");
    *state = next;
}

fn extraction_failure(e: ExtractionError) -> PipelineError {
    if let ExtractionError::Model(model_err) = &e {
        if model_err.is_timeout() {
            return PipelineError::UpstreamTimeout {
                stage: Stage::Extraction,
            };
        }
        if model_err.is_unavailable() {
            return PipelineError::ModelUnavailable(model_err.to_string());
        }
    }
    PipelineError::Extraction {
        raw: e.raw_output().unwrap_or_default().to_string(),
        reason: e.to_string(),
    }
}

fn session_failure(e: SessionError) -> PipelineError {
    if e.is_timeout() {
        return PipelineError::UpstreamTimeout {
            stage: Stage::Authorization,
        };
    }
    PipelineError::Auth(e.to_string())
}

fn records_failure(e: RecordsError, stage: Stage) -> PipelineError {
    match e {
        RecordsError::Session(inner) => session_failure(inner),
        RecordsError::Unauthorized => {
            PipelineError::Auth(RecordsError::Unauthorized.to_string())
        }
        e if e.is_timeout() => PipelineError::UpstreamTimeout { stage },
        e => PipelineError::SearchFailed(e.to_string()),
    }
}

fn synthesis_failure(e: SynthesisError) -> PipelineError {
    if e.is_timeout() {
        return PipelineError::UpstreamTimeout {
            stage: Stage::Synthesis,
        };
    }
    PipelineError::Synthesis(e.to_string())
}
