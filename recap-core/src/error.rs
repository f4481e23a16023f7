use std::fmt;

use thiserror::Error;

/// Startup and configuration errors.
#[derive(Error, Debug)]
pub enum RecapError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("Startup error: {0}")]
    Startup(String),
}

/// Pipeline stage an upstream call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Authorization,
    Search,
    DetailFetch,
    Synthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extraction => "extraction",
            Stage::Authorization => "authorization",
            Stage::Search => "search",
            Stage::DetailFetch => "detail fetch",
            Stage::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of a failed question.
///
/// `Display` carries upstream detail for logs. Use [`PipelineError::client_message`]
/// for anything that leaves the process.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("parameter extraction failed: {reason} (raw output: {raw})")]
    Extraction { reason: String, raw: String },

    #[error("no company resolved from question")]
    MissingCompany,

    #[error("no interviewee matched company={company:?} name={name:?} date={date:?}")]
    NoCandidateFound {
        company: String,
        name: String,
        date: Option<String>,
    },

    #[error("{candidates} candidate(s) found but none yielded a summary")]
    NoSummaryFound { candidates: usize },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("interviewee search failed: {0}")]
    SearchFailed(String),

    #[error("language model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("answer synthesis failed: {0}")]
    Synthesis(String),

    #[error("upstream call timed out during {stage}")]
    UpstreamTimeout { stage: Stage },
}

impl PipelineError {
    /// HTTP-equivalent status category.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::EmptyQuestion
            | PipelineError::Extraction { .. }
            | PipelineError::MissingCompany => 400,
            PipelineError::NoCandidateFound { .. } | PipelineError::NoSummaryFound { .. } => 404,
            PipelineError::Auth(_)
            | PipelineError::SearchFailed(_)
            | PipelineError::ModelUnavailable(_)
            | PipelineError::Synthesis(_) => 502,
            PipelineError::UpstreamTimeout { .. } => 504,
        }
    }

    /// Stable machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EmptyQuestion => "empty_question",
            PipelineError::Extraction { .. } => "extraction_error",
            PipelineError::MissingCompany => "missing_company",
            PipelineError::NoCandidateFound { .. } => "no_candidate_found",
            PipelineError::NoSummaryFound { .. } => "no_summary_found",
            PipelineError::Auth(_) => "auth_error",
            PipelineError::SearchFailed(_) => "search_failed",
            PipelineError::ModelUnavailable(_) => "model_unavailable",
            PipelineError::Synthesis(_) => "synthesis_error",
            PipelineError::UpstreamTimeout { .. } => "upstream_timeout",
        }
    }

    /// Human-readable detail safe to return to a caller: no credentials,
    /// tokens or upstream bodies.
    pub fn client_message(&self) -> String {
        match self {
            PipelineError::EmptyQuestion => "question must not be empty".to_string(),
            PipelineError::Extraction { .. } => {
                "could not read search parameters from the question; try rephrasing it with a company name and date".to_string()
            }
            PipelineError::MissingCompany => {
                "no company name found in the question. Example: 'On July 10 what did we discuss with ABC Corp?'".to_string()
            }
            PipelineError::NoCandidateFound { .. } => {
                "no interview records matched the question".to_string()
            }
            PipelineError::NoSummaryFound { .. } => {
                "matching interviews were found but none has a usable summary".to_string()
            }
            PipelineError::Auth(_) => {
                "the records service rejected the service account; try again later".to_string()
            }
            PipelineError::SearchFailed(_) => {
                "the records service failed to answer the search; try again later".to_string()
            }
            PipelineError::ModelUnavailable(_) => {
                "the language model service is unavailable; try again later".to_string()
            }
            PipelineError::Synthesis(_) => {
                "the answer could not be generated; try again".to_string()
            }
            PipelineError::UpstreamTimeout { stage } => {
                format!("the {} step timed out; try again", stage)
            }
        }
    }
}
