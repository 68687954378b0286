//! Action chains: the immutable, singly linked step definitions a flow is
//! built from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Step type tag used by the dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Inline script
    Code,
    /// Conditional fork into one of two sub-chains
    Branch,
    /// Iteration over a collection
    LoopOnItems,
    /// External integration action
    Piece,
}

impl ActionType {
    /// All step types, in declaration order
    pub const ALL: [ActionType; 4] = [
        ActionType::Code,
        ActionType::Branch,
        ActionType::LoopOnItems,
        ActionType::Piece,
    ];

    /// Wire label of the step type
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Code => "CODE",
            ActionType::Branch => "BRANCH",
            ActionType::LoopOnItems => "LOOP_ON_ITEMS",
            ActionType::Piece => "PIECE",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step in a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Unique name within the flow, used as the key for outputs and timings
    pub name: String,

    /// Human-readable label from the flow builder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Type tag plus type-specific settings and sub-chains
    #[serde(flatten)]
    pub kind: ActionKind,

    /// Following step, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<Action>>,
}

/// Type-specific part of an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Inline script step
    Code {
        /// Script and its inputs
        settings: CodeSettings,
    },

    /// Conditional step
    Branch {
        /// Condition to evaluate
        settings: BranchSettings,
        /// Chain run when the condition holds
        #[serde(rename = "onSuccessAction", default, skip_serializing_if = "Option::is_none")]
        on_success_action: Option<Box<Action>>,
        /// Chain run when it does not
        #[serde(rename = "onFailureAction", default, skip_serializing_if = "Option::is_none")]
        on_failure_action: Option<Box<Action>>,
    },

    /// Iteration step
    LoopOnItems {
        /// Collection to iterate
        settings: LoopSettings,
        /// Body chain, run once per item
        #[serde(rename = "firstLoopAction", default, skip_serializing_if = "Option::is_none")]
        first_loop_action: Option<Box<Action>>,
    },

    /// Integration step
    Piece {
        /// Piece, action and inputs
        settings: PieceSettings,
    },
}

/// Settings of a code step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSettings {
    /// Script source handed to the code runner
    pub source_code: String,

    /// Input template; `$`-prefixed strings are resolved against the context
    #[serde(default)]
    pub input: Value,
}

/// Settings of a branch step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSettings {
    /// Condition deciding which arm runs
    pub condition: ConditionExpression,
}

/// Condition expression for a branch step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionExpression {
    /// The condition expression
    pub expression: String,

    /// The language of the expression
    #[serde(default = "default_condition_language")]
    pub language: String,
}

fn default_condition_language() -> String {
    "jmespath".to_string()
}

/// Settings of a loop step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSettings {
    /// Literal array or `$`-prefixed expression resolving to one
    pub items: Value,
}

/// Settings of a piece step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceSettings {
    /// Integration package name (e.g. "@flowrun/piece-slack")
    pub piece_name: String,

    /// Pinned package version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece_version: Option<String>,

    /// Action exposed by the piece
    pub action_name: String,

    /// Input template; `$`-prefixed strings are resolved against the context
    #[serde(default)]
    pub input: Value,
}

impl Action {
    /// Create an action with no successor
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            kind,
            next_action: None,
        }
    }

    /// Code step running `source_code` with an input template
    pub fn code(name: impl Into<String>, source_code: impl Into<String>, input: Value) -> Self {
        Self::new(
            name,
            ActionKind::Code {
                settings: CodeSettings {
                    source_code: source_code.into(),
                    input,
                },
            },
        )
    }

    /// Branch step evaluating a JMESPath condition
    pub fn branch(
        name: impl Into<String>,
        expression: impl Into<String>,
        on_success: Option<Action>,
        on_failure: Option<Action>,
    ) -> Self {
        Self::new(
            name,
            ActionKind::Branch {
                settings: BranchSettings {
                    condition: ConditionExpression {
                        expression: expression.into(),
                        language: default_condition_language(),
                    },
                },
                on_success_action: on_success.map(Box::new),
                on_failure_action: on_failure.map(Box::new),
            },
        )
    }

    /// Loop step over `items` with an optional body chain
    pub fn loop_on_items(name: impl Into<String>, items: Value, body: Option<Action>) -> Self {
        Self::new(
            name,
            ActionKind::LoopOnItems {
                settings: LoopSettings { items },
                first_loop_action: body.map(Box::new),
            },
        )
    }

    /// Piece step invoking `action_name` of `piece_name`
    pub fn piece(
        name: impl Into<String>,
        piece_name: impl Into<String>,
        action_name: impl Into<String>,
        input: Value,
    ) -> Self {
        Self::new(
            name,
            ActionKind::Piece {
                settings: PieceSettings {
                    piece_name: piece_name.into(),
                    piece_version: None,
                    action_name: action_name.into(),
                    input,
                },
            },
        )
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the successor
    pub fn with_next(mut self, next: Action) -> Self {
        self.next_action = Some(Box::new(next));
        self
    }

    /// Type tag of this action
    pub fn action_type(&self) -> ActionType {
        match self.kind {
            ActionKind::Code { .. } => ActionType::Code,
            ActionKind::Branch { .. } => ActionType::Branch,
            ActionKind::LoopOnItems { .. } => ActionType::LoopOnItems,
            ActionKind::Piece { .. } => ActionType::Piece,
        }
    }

    /// Successor in the chain
    pub fn next(&self) -> Option<&Action> {
        self.next_action.as_deref()
    }

    /// Iterate this action and its successors (nested chains excluded)
    pub fn chain(&self) -> ChainIter<'_> {
        ChainIter {
            current: Some(self),
        }
    }

    /// Sub-chains owned by this action (branch arms, loop body)
    pub fn children(&self) -> Vec<&Action> {
        match &self.kind {
            ActionKind::Branch {
                on_success_action,
                on_failure_action,
                ..
            } => on_success_action
                .iter()
                .chain(on_failure_action.iter())
                .map(|a| &**a)
                .collect(),
            ActionKind::LoopOnItems {
                first_loop_action, ..
            } => first_loop_action.iter().map(|a| &**a).collect(),
            ActionKind::Code { .. } | ActionKind::Piece { .. } => Vec::new(),
        }
    }

    /// Names of every step reachable from this action, nested chains included,
    /// in depth-first chain order
    pub fn step_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_names(self, &mut names);
        names
    }
}

fn collect_names<'a>(action: &'a Action, names: &mut Vec<&'a str>) {
    for step in action.chain() {
        names.push(step.name.as_str());
        for child in step.children() {
            collect_names(child, names);
        }
    }
}

/// Iterator over a linked chain
pub struct ChainIter<'a> {
    current: Option<&'a Action>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a Action;

    fn next(&mut self) -> Option<Self::Item> {
        let action = self.current?;
        self.current = action.next();
        Some(action)
    }
}

/// Link `actions` in order, each one's successor being the next in the list.
/// Existing successors on the inputs are replaced.
pub fn link_chain(actions: Vec<Action>) -> Option<Action> {
    actions.into_iter().rev().fold(None, |next, mut action| {
        action.next_action = next.map(Box::new);
        Some(action)
    })
}
