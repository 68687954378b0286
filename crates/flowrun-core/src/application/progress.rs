//! Fire-and-forget progress reporting.
//!
//! Updates are observed effects, not synchronization points: the run loop
//! spawns them and moves on, and they may land after the run has finished.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{warn, Instrument};

use crate::{
    domain::{constants::EngineConstants, context::ExecutionContext},
    CoreError,
};

/// Snapshot of a run sent to the progress service
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Constants of the run
    pub constants: EngineConstants,
    /// Context at the step boundary
    pub context: ExecutionContext,
    /// Measured duration of the step that just finished, if any
    pub last_step_duration: Option<Duration>,
    /// When the update was produced
    pub sent_at: DateTime<Utc>,
}

/// Destination of progress updates
#[async_trait]
pub trait ProgressService: Send + Sync {
    /// Deliver one update
    async fn send_update(&self, update: ProgressUpdate) -> Result<(), CoreError>;
}

/// Progress service that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressService;

#[async_trait]
impl ProgressService for NoopProgressService {
    async fn send_update(&self, _update: ProgressUpdate) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Spawns progress updates off the run's critical path
#[derive(Clone)]
pub struct ProgressReporter {
    service: Arc<dyn ProgressService>,
}

impl ProgressReporter {
    /// Reporter delivering to `service`
    pub fn new(service: Arc<dyn ProgressService>) -> Self {
        Self { service }
    }

    /// Reporter that sends nothing
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopProgressService))
    }

    /// Spawn delivery of a snapshot of `context`
    ///
    /// Delivery errors are logged inside the task and never reach the
    /// caller. The handle is returned for observation only.
    pub fn report(
        &self,
        constants: &EngineConstants,
        context: &ExecutionContext,
        last_step_duration: Option<Duration>,
    ) -> JoinHandle<()> {
        let update = ProgressUpdate {
            constants: constants.clone(),
            context: context.clone(),
            last_step_duration,
            sent_at: Utc::now(),
        };
        let service = self.service.clone();

        tokio::spawn(
            async move {
                let flow_run_id = update.constants.flow_run_id.clone();
                if let Err(error) = service.send_update(update).await {
                    warn!(
                        flow_run_id = %flow_run_id,
                        error = %error,
                        "Error sending progress update"
                    );
                }
            }
            .in_current_span(),
        )
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingProgressService, RecordingProgressService};

    #[tokio::test]
    async fn test_report_delivers_snapshot() {
        let service = Arc::new(RecordingProgressService::new());
        let reporter = ProgressReporter::new(service.clone());
        let constants = EngineConstants::for_flow("flow-1");
        let context = ExecutionContext::new();

        reporter
            .report(&constants, &context, Some(Duration::from_millis(12)))
            .await
            .unwrap();

        let updates = service.updates().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].constants.flow_id, "flow-1");
        assert_eq!(updates[0].last_step_duration, Some(Duration::from_millis(12)));
        assert_eq!(updates[0].context, context);
    }

    #[tokio::test]
    async fn test_report_swallows_delivery_errors() {
        let service = Arc::new(FailingProgressService::new());
        let reporter = ProgressReporter::new(service.clone());

        // The spawned task completes normally even though delivery failed
        let outcome = reporter
            .report(&EngineConstants::default(), &ExecutionContext::new(), None)
            .await;

        assert!(outcome.is_ok());
        assert_eq!(service.attempts(), 1);
    }
}
