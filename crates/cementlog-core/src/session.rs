use std::path::Path;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::ingest::{ingest_file, IngestError, LogKind};
use crate::llm::{AnalysisError, InterpretationService};
use crate::model::{AnalysisResult, SessionStatus};
use crate::report::{Language, ReportView};

/// Identifies one submission; completions carrying an older ticket are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Why a submitted file ended in the error state.
#[derive(Debug, Error)]
pub enum SessionFailure {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl SessionFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ingest(_) => "rejected_read",
            Self::Analysis(err) => err.kind(),
        }
    }
}

/// Inputs to the session state machine.
#[derive(Debug)]
pub enum SessionEvent {
    FileSubmitted,
    ResultReceived { ticket: Ticket, result: AnalysisResult },
    Failed { ticket: Ticket, failure: SessionFailure },
    /// Completed → Idle.
    Reset,
    /// Error → Idle.
    Retry,
    /// Analyzing → Idle; the in-flight call is left to finish and its outcome dropped.
    Abandon,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::FileSubmitted => "file_submitted",
            Self::ResultReceived { .. } => "result_received",
            Self::Failed { .. } => "failed",
            Self::Reset => "reset",
            Self::Retry => "retry",
            Self::Abandon => "abandon",
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Unsupported(IngestError),
    #[error("an analysis session is already {status:?}; reset before submitting another file")]
    Busy { status: SessionStatus },
    #[error("event `{event}` is not valid while {status:?}")]
    InvalidTransition {
        status: SessionStatus,
        event: &'static str,
    },
    #[error("completion for an abandoned submission was ignored")]
    StaleTicket,
}

#[derive(Debug)]
enum State {
    Idle,
    Analyzing { ticket: Ticket },
    Completed(AnalysisResult),
    Error(SessionFailure),
}

/// Owns the status, the single stored result and the selected report language.
#[derive(Debug)]
pub struct SessionController {
    state: State,
    next_ticket: u64,
    language: Language,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            next_ticket: 0,
            language: Language::default(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self.state {
            State::Idle => SessionStatus::Idle,
            State::Analyzing { .. } => SessionStatus::Analyzing,
            State::Completed(_) => SessionStatus::Completed,
            State::Error(_) => SessionStatus::Error,
        }
    }

    /// Only `Some` while Completed.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            State::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// Only `Some` while in the error state.
    pub fn failure(&self) -> Option<&SessionFailure> {
        match &self.state {
            State::Error(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Render the stored result in the current language; never re-runs the analysis.
    pub fn view(&self, generated_at: NaiveDateTime) -> Option<ReportView<'_>> {
        self.result()
            .map(|result| ReportView::build(result, self.language, generated_at))
    }

    /// The transition function. Every state change goes through here.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionStatus, SessionError> {
        let from = self.status();
        let name = event.name();
        let next = match (&self.state, event) {
            (State::Idle, SessionEvent::FileSubmitted) => {
                self.next_ticket += 1;
                State::Analyzing {
                    ticket: Ticket(self.next_ticket),
                }
            }
            (_, SessionEvent::FileSubmitted) => return Err(SessionError::Busy { status: from }),
            (State::Analyzing { ticket }, SessionEvent::ResultReceived { ticket: got, result })
                if *ticket == got =>
            {
                State::Completed(result)
            }
            (State::Analyzing { ticket }, SessionEvent::Failed { ticket: got, failure })
                if *ticket == got =>
            {
                tracing::warn!(kind = failure.kind(), error = %failure, "analysis failed");
                State::Error(failure)
            }
            (_, SessionEvent::ResultReceived { .. } | SessionEvent::Failed { .. }) => {
                tracing::debug!(status = ?from, "dropping completion of an abandoned submission");
                return Err(SessionError::StaleTicket);
            }
            (State::Completed(_), SessionEvent::Reset)
            | (State::Error(_), SessionEvent::Retry)
            | (State::Analyzing { .. }, SessionEvent::Abandon) => State::Idle,
            (_, SessionEvent::Reset | SessionEvent::Retry | SessionEvent::Abandon) => {
                return Err(SessionError::InvalidTransition {
                    status: from,
                    event: name,
                })
            }
        };
        self.state = next;
        let to = self.status();
        tracing::info!(from = ?from, to = ?to, event = name, "session transition");
        Ok(to)
    }

    /// Accept a file for analysis. Unsupported files are rejected without changing state.
    pub fn begin(&mut self, path: &Path) -> Result<Ticket, SessionError> {
        LogKind::from_path(path).map_err(SessionError::Unsupported)?;
        self.apply(SessionEvent::FileSubmitted)?;
        Ok(Ticket(self.next_ticket))
    }

    /// Deliver the outcome of the submission identified by `ticket`.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<AnalysisResult, SessionFailure>,
    ) -> Result<SessionStatus, SessionError> {
        match outcome {
            Ok(result) => self.apply(SessionEvent::ResultReceived { ticket, result }),
            Err(failure) => self.apply(SessionEvent::Failed { ticket, failure }),
        }
    }

    pub fn reset(&mut self) -> Result<SessionStatus, SessionError> {
        self.apply(SessionEvent::Reset)
    }

    pub fn retry(&mut self) -> Result<SessionStatus, SessionError> {
        self.apply(SessionEvent::Retry)
    }

    pub fn abandon(&mut self) -> Result<SessionStatus, SessionError> {
        self.apply(SessionEvent::Abandon)
    }

    /// Idle → Analyzing → Completed | Error for one file.
    pub async fn analyze(
        &mut self,
        path: &Path,
        service: &dyn InterpretationService,
    ) -> Result<SessionStatus, SessionError> {
        let ticket = self.begin(path)?;
        let outcome = run_analysis(path, service).await;
        self.complete(ticket, outcome)
    }
}

/// Ingest `path` and interpret it. Holds no session state, so callers may abandon it.
pub async fn run_analysis(
    path: &Path,
    service: &dyn InterpretationService,
) -> Result<AnalysisResult, SessionFailure> {
    let payload = ingest_file(path).await?;
    Ok(service.interpret(&payload).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::LogPayload;
    use crate::model::fixtures::two_zone_result;
    use crate::model::DepthUnit;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedService {
        outcomes: Mutex<VecDeque<Result<AnalysisResult, AnalysisError>>>,
        calls: AtomicUsize,
        payloads: Mutex<Vec<LogPayload>>,
    }

    impl ScriptedService {
        fn new(outcomes: Vec<Result<AnalysisResult, AnalysisError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
                payloads: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InterpretationService for ScriptedService {
        async fn interpret(&self, payload: &LogPayload) -> Result<AnalysisResult, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payloads.lock().unwrap().push(payload.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AnalysisError::Service("no scripted outcome".into())))
        }
    }

    fn write_las(dir: &Path) -> PathBuf {
        let path = dir.join("WELL-12.las");
        let las = "~Version Information\n VERS. 2.0 : CWLS LOG ASCII STANDARD\n WRAP. NO :\n\
~Well Information\n STRT.M 1200.0 :\n STOP.M 1310.5 :\n\
~Curve Information\n DEPT.M : Depth\n CBL.MV : Cement bond amplitude\n\
~ASCII\n1200.0 8.2\n";
        fs::write(&path, las).unwrap();
        path
    }

    fn render_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn las_submission_completes_with_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_las(dir.path());
        let service = ScriptedService::new(vec![Ok(two_zone_result())]);
        let mut session = SessionController::new();

        let status = session.analyze(&path, &service).await.unwrap();
        assert_eq!(status, SessionStatus::Completed);
        let view = session.view(render_time()).expect("completed session has a view");
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.depth_unit, DepthUnit::Meters);
        assert!(session.failure().is_none());
        assert!(matches!(
            service.payloads.lock().unwrap()[0],
            LogPayload::Las { ref text } if text.starts_with("~Version Information")
        ));
    }

    #[tokio::test]
    async fn unsupported_file_leaves_session_idle() {
        let service = ScriptedService::new(vec![Ok(two_zone_result())]);
        let mut session = SessionController::new();
        let err = session
            .analyze(Path::new("notes.txt"), &service)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Unsupported(ref e) if e.is_unsupported_format()));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn service_failure_moves_to_error_then_retry_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_las(dir.path());
        let service = ScriptedService::new(vec![Err(AnalysisError::Service(
            "connection refused".into(),
        ))]);
        let mut session = SessionController::new();

        let status = session.analyze(&path, &service).await.unwrap();
        assert_eq!(status, SessionStatus::Error);
        assert!(session.result().is_none());
        assert_eq!(session.failure().unwrap().kind(), "service_failure");

        assert_eq!(session.retry().unwrap(), SessionStatus::Idle);
        assert!(session.result().is_none());
        assert!(session.failure().is_none());
    }

    #[tokio::test]
    async fn unreadable_file_is_an_error_not_a_rejection() {
        let service = ScriptedService::new(vec![]);
        let mut session = SessionController::new();
        let status = session
            .analyze(Path::new("/definitely/missing/well.las"), &service)
            .await
            .unwrap();
        assert_eq!(status, SessionStatus::Error);
        assert_eq!(session.failure().unwrap().kind(), "rejected_read");
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn reset_discards_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_las(dir.path());
        let service = ScriptedService::new(vec![Ok(two_zone_result())]);
        let mut session = SessionController::new();
        session.analyze(&path, &service).await.unwrap();

        assert_eq!(session.reset().unwrap(), SessionStatus::Idle);
        assert!(session.result().is_none());
        assert!(session.view(render_time()).is_none());
    }

    #[tokio::test]
    async fn language_toggle_never_calls_the_service() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_las(dir.path());
        let service = ScriptedService::new(vec![Ok(two_zone_result())]);
        let mut session = SessionController::new();
        session.analyze(&path, &service).await.unwrap();

        let english = session.view(render_time()).unwrap().summary.to_string();
        session.set_language(session.language().toggled());
        let arabic = session.view(render_time()).unwrap().summary.to_string();
        assert_ne!(english, arabic);
        assert_eq!(service.calls(), 1);
    }

    #[test]
    fn second_submission_while_analyzing_is_rejected() {
        let mut session = SessionController::new();
        session.begin(Path::new("a.las")).unwrap();
        let err = session.begin(Path::new("b.pdf")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Busy {
                status: SessionStatus::Analyzing
            }
        ));
        assert_eq!(session.status(), SessionStatus::Analyzing);
    }

    #[test]
    fn submission_is_rejected_until_completed_session_is_reset() {
        let mut session = SessionController::new();
        let ticket = session.begin(Path::new("a.las")).unwrap();
        session.complete(ticket, Ok(two_zone_result())).unwrap();
        assert!(matches!(
            session.begin(Path::new("b.las")),
            Err(SessionError::Busy { .. })
        ));
        session.reset().unwrap();
        assert!(session.begin(Path::new("b.las")).is_ok());
    }

    #[test]
    fn abandoned_submission_completion_is_ignored() {
        let mut session = SessionController::new();
        let stale = session.begin(Path::new("slow.pdf")).unwrap();
        assert_eq!(session.abandon().unwrap(), SessionStatus::Idle);

        let fresh = session.begin(Path::new("fast.las")).unwrap();
        assert_ne!(stale, fresh);
        let err = session.complete(stale, Ok(two_zone_result())).unwrap_err();
        assert!(matches!(err, SessionError::StaleTicket));
        assert_eq!(session.status(), SessionStatus::Analyzing);
        assert!(session.result().is_none());

        session
            .complete(fresh, Err(AnalysisError::MissingCredential { env: "X" }.into()))
            .unwrap();
        assert_eq!(session.status(), SessionStatus::Error);
    }

    #[test]
    fn invalid_transitions_are_reported() {
        let mut session = SessionController::new();
        for result in [session.reset(), session.retry(), session.abandon()] {
            assert!(matches!(
                result,
                Err(SessionError::InvalidTransition {
                    status: SessionStatus::Idle,
                    ..
                })
            ));
        }
        let ticket = session.begin(Path::new("a.las")).unwrap();
        assert!(session.reset().is_err());
        session
            .complete(ticket, Err(AnalysisError::MalformedResponse("bad".into()).into()))
            .unwrap();
        assert!(session.reset().is_err());
        assert_eq!(session.retry().unwrap(), SessionStatus::Idle);
    }

    #[test]
    fn only_completed_state_holds_a_result() {
        let mut session = SessionController::new();
        assert!(session.result().is_none());
        let ticket = session.begin(Path::new("a.las")).unwrap();
        assert!(session.result().is_none());
        session.complete(ticket, Ok(two_zone_result())).unwrap();
        assert!(session.result().is_some());
        session.reset().unwrap();
        assert!(session.result().is_none());
    }
}
