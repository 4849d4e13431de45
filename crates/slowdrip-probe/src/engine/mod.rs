pub mod jitter;
pub mod orchestrator;
pub mod payload;
pub mod session;
pub mod stream;
