use async_trait::async_trait;
use serde_json::Value;

use crate::{
    domain::{constants::EngineConstants, flow_definition::Trigger},
    CoreError,
};

/// Start-of-flow hook run before the first action of a fresh run
#[async_trait]
pub trait TriggerHook: Send + Sync {
    /// Prepare the trigger; an error aborts the run
    async fn execute_on_start(
        &self,
        trigger: &Trigger,
        constants: &EngineConstants,
        payload: Option<&Value>,
    ) -> Result<(), CoreError>;
}

/// Trigger hook with nothing to prepare
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTriggerHook;

#[async_trait]
impl TriggerHook for NoopTriggerHook {
    async fn execute_on_start(
        &self,
        _trigger: &Trigger,
        _constants: &EngineConstants,
        _payload: Option<&Value>,
    ) -> Result<(), CoreError> {
        Ok(())
    }
}
