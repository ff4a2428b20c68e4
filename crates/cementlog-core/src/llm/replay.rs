use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{parse_result, AnalysisError, InterpretationService, InterpreterSettings};
use crate::ingest::LogPayload;
use crate::model::AnalysisResult;

/// Offline provider that answers every request with a stored result file.
///
/// The file is re-read and re-validated on each call, so it goes through the
/// same parse path as a live response.
#[derive(Debug, Clone)]
pub struct ReplayInterpreter {
    path: PathBuf,
}

impl ReplayInterpreter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_settings(settings: &InterpreterSettings) -> Result<Self> {
        let path = settings.replay_file.clone().with_context(|| {
            format!(
                "{} must be set when the replay provider is selected",
                InterpreterSettings::REPLAY_FILE_ENV
            )
        })?;
        Ok(Self::new(path))
    }
}

#[async_trait]
impl InterpretationService for ReplayInterpreter {
    async fn interpret(&self, payload: &LogPayload) -> Result<AnalysisResult, AnalysisError> {
        tracing::debug!(file = %self.path.display(), kind = payload.kind().label(), "replaying stored result");
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            AnalysisError::Service(format!(
                "failed to read replay file {}: {err}",
                self.path.display()
            ))
        })?;
        parse_result(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::two_zone_result;
    use std::fs;

    #[tokio::test]
    async fn replays_stored_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        fs::write(&path, serde_json::to_string(&two_zone_result()).unwrap()).unwrap();

        let service = ReplayInterpreter::new(&path);
        let payload = LogPayload::Las { text: "~V\n".into() };
        assert_eq!(service.interpret(&payload).await.unwrap(), two_zone_result());
    }

    #[tokio::test]
    async fn missing_file_is_a_service_failure() {
        let service = ReplayInterpreter::new("/definitely/missing/result.json");
        let payload = LogPayload::Las { text: "~V\n".into() };
        let err = service.interpret(&payload).await.unwrap_err();
        assert_eq!(err.kind(), "service_failure");
    }

    #[test]
    fn requires_replay_file_setting() {
        let err = ReplayInterpreter::from_settings(&InterpreterSettings::default()).unwrap_err();
        assert!(err.to_string().contains("CEMENTLOG_REPLAY_FILE"));
    }
}
