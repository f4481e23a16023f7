pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod records;
pub mod session;
pub mod synthesize;

pub use config::{RecapConfig, Secrets};
pub use error::{PipelineError, RecapError, Stage};
pub use extract::{ExtractionError, ParameterExtractor};
pub use llm::{ChatMessage, FunctionSpec, LanguageModel, LlmError, OpenAiClient};
pub use pipeline::{Pipeline, PipelineState};
pub use records::{RecordFetcher, RecordsError};
pub use session::{SessionError, SessionManager};
pub use synthesize::{AnswerSynthesizer, SynthesisError};
