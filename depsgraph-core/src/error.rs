//! Error types.
//!
//! Building the graph never fails for a well-formed scene, so the builder
//! itself does not return `Result`. These errors surface from the lower
//! layers: the node model rejecting a duplicate key, the consistency checker,
//! and loading a scene description.

use thiserror::Error;

use crate::graph::OpCode;
use crate::scene::EntityId;

/// Structural errors of the node/component/operation model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An operation with the same (opcode, name, name tag) already exists in
    /// the component. Carries the index of the pre-existing operation.
    #[error("operation {opcode:?} '{name}' [{name_tag}] already exists in component {component} (index {existing})")]
    DuplicateOperation {
        component: String,
        opcode: OpCode,
        name: String,
        name_tag: i32,
        existing: usize,
    },

    /// No id node exists for the entity.
    #[error("no id node for entity {0}")]
    MissingIdNode(EntityId),

    /// A component or operation handle does not address a live node.
    #[error("invalid node handle {0}")]
    InvalidHandle(String),

    /// A reference stored in the flat operation list does not resolve.
    #[error("operation reference {0} does not resolve")]
    DanglingOperation(String),

    /// A node's owner back-reference does not point at its actual owner.
    #[error("inconsistent owner: {0}")]
    InconsistentOwner(String),

    /// Two nodes share a key that must be unique.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
}

/// Errors raised while assembling or loading a scene database.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The scene description is not valid JSON for the data model.
    #[error("invalid scene description: {0}")]
    Json(#[from] serde_json::Error),

    /// Two entities were given the same session identifier.
    #[error("duplicate entity {0}")]
    DuplicateEntity(EntityId),

    /// The unset identifier was used for an entity.
    #[error("entity '{0}' has no session identifier")]
    UnsetId(String),

    /// Two items of one list share the name their operations are keyed by.
    #[error("{entity} has two {kind}s named '{name}'")]
    DuplicateName {
        entity: String,
        kind: &'static str,
        name: String,
    },
}
