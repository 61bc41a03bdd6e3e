use thiserror::Error;

use crate::types::ActionId;

/// Failure reported by an external collaborator (dependency probe, store,
/// effect host). Carries a machine-readable code alongside the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct CollaboratorError {
    pub code: String,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Structural failure while resolving a Definition. Always fatal: the
/// Definition is corrupted and nothing is partially resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReifyError {
    #[error("node '{id}' is referenced but does not exist")]
    DanglingReference { id: ActionId },

    #[error("node '{node}' chooses '{chosen}', which is not one of its alternatives")]
    ChoiceNotAmongAlternatives { node: ActionId, chosen: ActionId },

    #[error("node '{id}' is reachable from itself")]
    Cycle { id: ActionId },

    #[error("node '{id}' defers to '{source_ref}', which could not be found")]
    DeferredSourceMissing { id: ActionId, source_ref: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// A rejected update. The input Definition is never touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("node not found: {0}")]
    NodeNotFound(ActionId),

    #[error("node '{id}' is {found}, expected {expected}")]
    InvalidSelectionType {
        id: ActionId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{chosen}' is not an alternative of node '{node}'")]
    AlternativeNotFound { node: ActionId, chosen: ActionId },

    #[error("node '{id}' is still referenced by {referenced_by:?}")]
    NodeInUse {
        id: ActionId,
        referenced_by: Vec<ActionId>,
    },

    #[error("update would make node '{0}' reachable from itself")]
    Cycle(ActionId),

    #[error("node already exists: {0}")]
    NodeExists(ActionId),

    #[error("node '{from}' references unknown node '{to}'")]
    DanglingReference { from: ActionId, to: ActionId },

    #[error("root for target '{0}' is not an AllOf group")]
    InvalidRoot(String),

    #[error("cannot materialize node '{id}': {reason}")]
    Materialize { id: ActionId, reason: String },
}

/// An effect failed during setup. Steps applied before it stay applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("setup failed at '{action_id}': {message}")]
pub struct EffectError {
    pub action_id: ActionId,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("not initialized: run 'deckpipe init'")]
    NotInitialized,

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("profile already exists: {0}")]
    ProfileExists(String),

    #[error("context not found: {0}")]
    ContextNotFound(String),

    #[error("no profile applies to context '{0}'; set a default profile or tag one")]
    NoProfileForContext(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("invalid id '{0}': must be lowercase alphanumeric with '-' or '_'")]
    InvalidId(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("pipeline was resolved for '{resolved}' but setup was requested for '{requested}'")]
    TargetMismatch { resolved: String, requested: String },

    #[error("teardown log error: {0}")]
    TeardownDb(String),

    #[error(transparent)]
    Reify(#[from] ReifyError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Effect(#[from] EffectError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeckError>;
