use crate::core::container::{ContentContainer, Replacement};
use crate::core::models::{PollOutcome, PollState, ReloadResponse, ResponseClass};
use crate::core::schedule::RearmSchedule;
use crate::source::ReloadSource;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Keeps a content container in sync with the server's rendered markup.
pub struct PreviewPoller {
    source: Arc<dyn ReloadSource>,
    container: Arc<dyn ContentContainer>,
    schedule: RearmSchedule,
}

impl PreviewPoller {
    pub fn new(
        source: Arc<dyn ReloadSource>,
        container: Arc<dyn ContentContainer>,
        schedule: RearmSchedule,
    ) -> Self {
        Self {
            source,
            container,
            schedule,
        }
    }

    /// Runs a single poll cycle. Never fails: anything unexpected is logged
    /// and reported as a soft outcome.
    pub async fn poll(&self, is_first_request: bool) -> PollOutcome {
        tracing::debug!(
            target_url = %self.source.target(),
            is_first_request,
            "Polling for changes"
        );

        match self.source.fetch().await {
            Ok(response) => self.apply_response(response).await,
            Err(e) => {
                tracing::warn!(error = %e, "Reload request failed");
                PollOutcome::TransportFailure {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn apply_response(&self, response: ReloadResponse) -> PollOutcome {
        match response.class() {
            ResponseClass::Changed => {
                let bytes = response.body.len();
                match self.container.replace_contents(&response.body).await {
                    Ok(Replacement::Replaced) => {
                        tracing::info!(bytes, etag = ?response.etag, "Preview updated");
                        self.source.commit_validator(response.etag.as_deref()).await;
                        PollOutcome::Updated { bytes }
                    }
                    Ok(Replacement::Missing) => {
                        // No element to retry against; let the server long-poll.
                        self.source.commit_validator(response.etag.as_deref()).await;
                        PollOutcome::NotApplied {
                            bytes,
                            reason: "no element matches the content selector".to_string(),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to update preview");
                        PollOutcome::NotApplied {
                            bytes,
                            reason: e.to_string(),
                        }
                    }
                }
            }
            ResponseClass::Unchanged => {
                tracing::trace!("Preview unchanged");
                PollOutcome::NotModified
            }
            ResponseClass::Anomaly => {
                tracing::warn!(
                    status = response.status,
                    reason = response.reason.as_deref().unwrap_or(""),
                    "Unexpected reload status"
                );
                PollOutcome::SoftError {
                    status: response.status,
                    reason: response.reason,
                }
            }
        }
    }

    /// Spawns the polling loop. It runs until the returned handle is stopped
    /// or dropped.
    pub fn start(self) -> PollerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);

        tracing::info!(
            target_url = %self.source.target(),
            policy = ?self.schedule.policy(),
            ceiling_ms = self.schedule.ceiling().as_millis() as u64,
            "Polling loop started"
        );

        let task = tokio::spawn(self.run(stop_rx));
        PollerHandle { stop_tx, task }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        let mut is_first_request = true;

        loop {
            let state = PollState::begin(is_first_request);

            let outcome = tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                outcome = self.poll(state.is_first_request) => outcome,
            };
            is_first_request = false;

            let delay = self
                .schedule
                .next_delay(&outcome, state.cycle_start.elapsed());
            tracing::trace!(
                outcome = outcome.label(),
                delay_ms = delay.as_millis() as u64,
                "Cycle complete"
            );

            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        tracing::info!("Polling loop stopped");
    }
}

pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the loop at its next suspension point and waits for it to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);

        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Polling task ended abnormally");
        }
    }
}
