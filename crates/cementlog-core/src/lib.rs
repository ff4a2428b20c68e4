pub mod ingest;
pub mod llm;
pub mod model;
pub mod report;
pub mod session;

pub use ingest::{ingest_bytes, ingest_file, IngestError, LogKind, LogPayload};
pub use llm::{
    build_service, parse_result, response_schema, AnalysisError, GeminiInterpreter, InterpretationService,
    InterpreterSettings, ProviderKind, ReplayInterpreter,
};
pub use model::{AnalysisResult, BondQuality, BondZone, DepthUnit, SessionStatus};
pub use report::{render_report, BadgeTier, Language, OutputFormat, ReportView};
pub use session::{run_analysis, SessionController, SessionError, SessionFailure, Ticket};
