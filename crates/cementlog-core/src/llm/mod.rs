mod gemini;
mod replay;
mod settings;

use async_trait::async_trait;
use thiserror::Error;

use crate::ingest::LogPayload;
use crate::model::{AnalysisResult, ResultValidationError};

pub use gemini::{response_schema, GeminiInterpreter, LAS_CHAR_LIMIT};
pub use replay::ReplayInterpreter;
pub use settings::{InterpreterSettings, ProviderKind};

/// Client abstraction for the structured-inference service that interprets a log.
#[async_trait]
pub trait InterpretationService: Send + Sync {
    /// Produce exactly one complete result for the payload, or fail. Never partial.
    async fn interpret(&self, payload: &LogPayload) -> Result<AnalysisResult, AnalysisError>;
}

/// Failure kinds of one interpretation attempt.
///
/// Kept distinct for diagnostics; users see [`AnalysisError::USER_MESSAGE`] for all of them.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("API key is missing; set {env}")]
    MissingCredential { env: &'static str },
    #[error("inference service call failed: {0}")]
    Service(String),
    #[error("malformed inference response: {0}")]
    MalformedResponse(String),
}

impl AnalysisError {
    pub const USER_MESSAGE: &'static str =
        "The AI could not process the file. Please ensure it's a valid LAS or high-quality CBL PDF log.";

    /// Short stable identifier for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "missing_credential",
            Self::Service(_) => "service_failure",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl From<ResultValidationError> for AnalysisError {
    fn from(err: ResultValidationError) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// Parse the model's JSON text into a validated result.
pub fn parse_result(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let result: AnalysisResult = serde_json::from_str(text)
        .map_err(|err| AnalysisError::MalformedResponse(format!("expected AnalysisResult JSON: {err}")))?;
    result.validate()?;
    Ok(result)
}

/// Build the service selected by `settings`.
pub fn build_service(settings: &InterpreterSettings) -> anyhow::Result<Box<dyn InterpretationService>> {
    match settings.provider {
        ProviderKind::Gemini => Ok(Box::new(GeminiInterpreter::new(settings)?)),
        ProviderKind::Replay => Ok(Box::new(ReplayInterpreter::from_settings(settings)?)),
    }
}
