use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{
    application::step_executor::StepExecutor,
    domain::{action::ActionType, step::DefaultConditionEvaluator},
    executors::{BranchExecutor, CodeExecutor, CodeRunner, LoopExecutor, PieceExecutor, PieceRunner},
    CoreError,
};

/// Maps step types to their executors
#[derive(Clone, Default)]
pub struct DispatchTable {
    executors: HashMap<ActionType, Arc<dyn StepExecutor>>,
}

impl DispatchTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in executor for every step type
    pub fn standard(code_runner: Arc<dyn CodeRunner>, piece_runner: Arc<dyn PieceRunner>) -> Self {
        Self::new()
            .with_executor(ActionType::Code, Arc::new(CodeExecutor::new(code_runner)))
            .with_executor(
                ActionType::Branch,
                Arc::new(BranchExecutor::new(Arc::new(DefaultConditionEvaluator))),
            )
            .with_executor(ActionType::LoopOnItems, Arc::new(LoopExecutor::new()))
            .with_executor(ActionType::Piece, Arc::new(PieceExecutor::new(piece_runner)))
    }

    /// Register `executor` for `action_type`, replacing any previous one
    pub fn with_executor(mut self, action_type: ActionType, executor: Arc<dyn StepExecutor>) -> Self {
        self.register(action_type, executor);
        self
    }

    /// Register `executor` for `action_type`, returning the one it replaced
    pub fn register(
        &mut self,
        action_type: ActionType,
        executor: Arc<dyn StepExecutor>,
    ) -> Option<Arc<dyn StepExecutor>> {
        self.executors.insert(action_type, executor)
    }

    /// Executor for `action_type`
    ///
    /// A missing entry means a step type was added without a handler; the
    /// error must abort the run.
    pub fn resolve(&self, action_type: ActionType) -> Result<&Arc<dyn StepExecutor>, CoreError> {
        self.executors
            .get(&action_type)
            .ok_or(CoreError::ExecutorNotRegistered(action_type))
    }

    /// Step types with a registered executor, in declaration order
    pub fn registered_types(&self) -> Vec<ActionType> {
        ActionType::ALL
            .into_iter()
            .filter(|t| self.executors.contains_key(t))
            .collect()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("registered", &self.registered_types())
            .finish()
    }
}
