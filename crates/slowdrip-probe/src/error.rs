use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Step of the probe cycle a session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Sending,
    PostSendPause,
    Receiving,
    Closing,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Sending => "sending",
            SessionPhase::PostSendPause => "post_send_pause",
            SessionPhase::Receiving => "receiving",
            SessionPhase::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Terminal failure of one probe session. None of these are retried.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not resolve host '{host}': {source}")]
    HostResolution {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("connection to {target} refused: {source}")]
    ConnectionRefused {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("connection to {target} timed out after {timeout:?}")]
    ConnectionTimeout { target: String, timeout: Duration },
    #[error("connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("write failed at header offset {offset}: {source}")]
    WriteFailure {
        offset: usize,
        #[source]
        source: io::Error,
    },
    #[error("response read failed: {source}")]
    ReadFailure {
        #[source]
        source: io::Error,
    },
    #[error("session cancelled while {phase}")]
    Cancelled { phase: SessionPhase },
}

impl SessionError {
    /// Phase the session was in when it failed.
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionError::HostResolution { .. }
            | SessionError::ConnectionRefused { .. }
            | SessionError::ConnectionTimeout { .. }
            | SessionError::Connect { .. } => SessionPhase::Connecting,
            SessionError::WriteFailure { .. } => SessionPhase::Sending,
            SessionError::ReadFailure { .. } => SessionPhase::Receiving,
            SessionError::Cancelled { phase } => *phase,
        }
    }
}

/// Overall outcome of a probe run that did not fully succeed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("session {session} failed: {source}")]
    Session {
        session: usize,
        #[source]
        source: SessionError,
    },
    #[error("session task aborted: {source}")]
    Join {
        #[source]
        source: tokio::task::JoinError,
    },
}

impl ProbeError {
    /// The session-level cause, when the failure came from a session.
    pub fn session_error(&self) -> Option<&SessionError> {
        match self {
            ProbeError::Session { source, .. } => Some(source),
            ProbeError::Join { .. } => None,
        }
    }
}
