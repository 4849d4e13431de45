pub mod engine;
pub mod error;
pub mod metrics;

pub use engine::orchestrator::Orchestrator;
pub use engine::session::{run_session, SessionReport, SessionSettings, ACTIVE_CONNECTIONS};
pub use error::{ProbeError, SessionError, SessionPhase};
