//! Fan-out and join of probe sessions.
//!
//! Every session runs to completion even after a sibling fails; the first
//! failure in completion order is what the run reports. Cancellation only
//! comes from the run's token (e.g. Ctrl-C in the binary).

use crate::engine::session::{run_session, SessionSettings};
use crate::error::ProbeError;
use slowdrip_common::Target;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Orchestrator {
    target: Arc<Target>,
    settings: Arc<SessionSettings>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(target: Target, settings: SessionSettings) -> Self {
        Self {
            target: Arc::new(target),
            settings: Arc::new(settings),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` instead of a private token, so a caller can stop the run.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Runs `workers` sessions concurrently and waits for all of them.
    pub async fn run(&self, workers: NonZeroUsize) -> Result<(), ProbeError> {
        let workers = workers.get();
        info!(target_addr = %self.target, workers, "Spawning probe sessions");

        let mut sessions = JoinSet::new();
        for id in 0..workers {
            let target = Arc::clone(&self.target);
            let settings = Arc::clone(&self.settings);
            let cancel = self.cancel.clone();
            sessions.spawn(async move {
                let outcome = run_session(id, &target, &settings, &cancel).await;
                (id, outcome)
            });
        }

        let mut first_error: Option<ProbeError> = None;
        let mut completed = 0usize;
        while let Some(joined) = sessions.join_next().await {
            match joined {
                Ok((_, Ok(_))) => completed += 1,
                Ok((id, Err(source))) => {
                    if first_error.is_none() {
                        first_error = Some(ProbeError::Session {
                            session: id,
                            source,
                        });
                    }
                }
                Err(source) => {
                    warn!(error = %source, "Session task aborted");
                    if first_error.is_none() {
                        first_error = Some(ProbeError::Join { source });
                    }
                }
            }
        }

        debug!(completed, failed = workers - completed, "All sessions finished");
        match first_error {
            Some(e) => Err(e),
            None => {
                info!(workers, "All sessions completed");
                Ok(())
            }
        }
    }
}
