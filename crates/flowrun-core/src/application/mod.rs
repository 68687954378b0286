/// Step type to executor mapping
pub mod dispatch;

/// Run loop over action chains
pub mod flow_executor;

/// HTTP delivery of progress updates
pub mod http_progress;

/// Fire-and-forget progress reporting
pub mod progress;

/// Step executor contract
pub mod step_executor;

/// Trigger start hook
pub mod trigger;
